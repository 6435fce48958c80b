//! Session bootstrap and target-account navigation.
//!
//! Everything here is driven through the best-effort probe layer: cookie
//! banners, "save your login" and notification dialogs are affordances that
//! may simply not exist for a given cohort, and their absence is never an
//! error. The only hard failure is a visible login form with no credentials
//! configured.

use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::browser::manager::wait_until_stable;
use crate::browser::probe::{Locator, ProbeAction, Prober};
use crate::core::config::{ScoutConfig, ENV_LOGIN_PASSWORD, ENV_LOGIN_USERNAME};
use crate::core::error::ScoutError;

const HOME_URL: &str = "https://www.instagram.com/";
const LOGIN_PATH_MARKER: &str = "/accounts/login";

/// Short bound for probes against affordances that are usually absent.
const BANNER_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Reach the service root logged in, reusing the injected session when the
/// login form never appears.
pub async fn login_if_needed(prober: &Prober, cfg: &ScoutConfig) -> Result<()> {
    let page = prober.page();
    let nav_ms = cfg.navigation_timeout().as_millis() as u64;

    page.goto(HOME_URL)
        .await
        .map_err(|e| anyhow::anyhow!("initial navigation failed: {e}"))?;
    wait_until_stable(page, 1_500, nav_ms).await?;

    dismiss_cookie_banner(prober).await;

    // A session restored from disk usually lands straight on the feed.
    let login_form = Locator::css(r#"input[name="username"]"#);
    if !prober.element_present(&login_form, BANNER_TIMEOUT).await {
        info!("login: no login form — existing session is live");
        return Ok(());
    }

    let Some((username, password)) = cfg.login_credentials() else {
        return Err(ScoutError::Config(format!(
            "login form detected but {ENV_LOGIN_USERNAME}/{ENV_LOGIN_PASSWORD} are not set"
        ))
        .into());
    };

    info!("login: filling credentials for automated sign-in");
    let filled_user = prober
        .resolve_and_act(
            &[(
                Locator::css(r#"input[name="username"]"#),
                ProbeAction::Fill(username),
            )],
            cfg.selector_timeout(),
        )
        .await;
    let filled_pass = prober
        .resolve_and_act(
            &[(
                Locator::css(r#"input[name="password"]"#),
                ProbeAction::Fill(password),
            )],
            cfg.selector_timeout(),
        )
        .await;
    if !filled_user || !filled_pass {
        return Err(anyhow::anyhow!("login form fields could not be filled"));
    }

    prober
        .resolve_and_act(
            &[(Locator::css(r#"button[type="submit"]"#), ProbeAction::Click)],
            cfg.selector_timeout(),
        )
        .await;

    // Login challenges / 2FA can be completed by hand in the visible browser;
    // we just wait for the URL to leave the login path.
    let left_login = wait_until_off_login(prober, cfg.navigation_timeout()).await;
    if !left_login {
        warn!("login: still on the login path after timeout — continuing anyway");
    }
    wait_until_stable(page, 1_500, nav_ms).await?;

    // Post-login interstitials.
    let not_now = [
        Locator::css_with_text("button", "Not now"),
        Locator::css_with_text(r#"div[role="dialog"] button"#, "Not now"),
    ];
    prober.click_any(&not_now, BANNER_TIMEOUT).await;
    prober.click_any(&not_now, BANNER_TIMEOUT).await; // second dialog, same shape

    Ok(())
}

async fn dismiss_cookie_banner(prober: &Prober) {
    let candidates = [
        (
            Locator::css_with_text("button", "Allow all cookies"),
            ProbeAction::Click,
        ),
        (
            Locator::css_with_text("button", "Allow essential cookies"),
            ProbeAction::Click,
        ),
        (Locator::css_with_text("button", "Accept"), ProbeAction::Click),
    ];
    if prober.resolve_and_act(&candidates, BANNER_TIMEOUT).await {
        info!("login: cookie banner dismissed");
    }
}

async fn wait_until_off_login(prober: &Prober, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(Some(url)) = prober.page().url().await {
            if url.contains("instagram.com") && !url.contains(LOGIN_PATH_MARKER) {
                return true;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

/// Open the target account's profile, preferring the visible search UI so the
/// run is observable; falls back to direct profile navigation.
pub async fn open_target_profile(
    prober: &Prober,
    cfg: &ScoutConfig,
    handle: &str,
    query: &str,
) -> Result<()> {
    match search_and_open_account(prober, cfg, handle, query).await {
        Ok(true) => {
            info!("account: opened @{handle} via search UI");
            return Ok(());
        }
        Ok(false) => {}
        Err(e) => warn!("account: search path errored: {e:#}"),
    }

    warn!("account: search path failed — navigating directly to profile");
    let page = prober.page();
    page.goto(format!("https://www.instagram.com/{handle}/"))
        .await
        .map_err(|e| anyhow::anyhow!("profile navigation failed: {e}"))?;
    wait_until_stable(page, 1_500, cfg.navigation_timeout().as_millis() as u64).await?;
    Ok(())
}

async fn search_and_open_account(
    prober: &Prober,
    cfg: &ScoutConfig,
    handle: &str,
    query: &str,
) -> Result<bool> {
    let page = prober.page();
    let nav_ms = cfg.navigation_timeout().as_millis() as u64;

    page.goto(HOME_URL)
        .await
        .map_err(|e| anyhow::anyhow!("home navigation failed: {e}"))?;
    wait_until_stable(page, 1_500, nav_ms).await?;

    // Entry points to the search UI vary by layout.
    let search_entries = [
        Locator::css(r#"a[href="/explore/search/"]"#),
        Locator::css(r#"svg[aria-label="Search"]"#),
        Locator::css_with_text("a", "Search"),
        Locator::css(r#"input[placeholder="Search"]"#),
        Locator::css(r#"input[aria-label*="Search"]"#),
    ];
    if !prober.click_any(&search_entries, Duration::from_millis(6_000)).await {
        return Ok(false);
    }

    // Focus whichever search input rendered and type the query.
    let inputs = [
        (
            Locator::css(r#"input[placeholder="Search"]"#),
            ProbeAction::Fill(query.to_string()),
        ),
        (
            Locator::css(r#"input[aria-label*="Search"]"#),
            ProbeAction::Fill(query.to_string()),
        ),
        (
            Locator::css(r#"input[type="search"]"#),
            ProbeAction::Fill(query.to_string()),
        ),
        (
            Locator::css(r#"input[type="text"]"#),
            ProbeAction::Fill(query.to_string()),
        ),
    ];
    if !prober.resolve_and_act(&inputs, BANNER_TIMEOUT).await {
        return Ok(false);
    }

    // Let the result list populate.
    tokio::time::sleep(Duration::from_millis(1_000)).await;

    let results = [
        Locator::css(format!(r#"a[href$="/{handle}/"]"#)),
        Locator::css(format!(r#"a[href*="/{handle}/"]"#)),
        Locator::css_with_text("a", handle),
    ];
    if prober.click_any(&results, cfg.selector_timeout()).await {
        wait_until_stable(page, 1_500, nav_ms).await?;
        return Ok(true);
    }

    Ok(false)
}
