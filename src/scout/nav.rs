//! Multi-strategy navigation.
//!
//! Reaching the liked-by view fails in two distinct ways: transiently (the
//! client-side router swallows the load, an interstitial overlay eats it) and
//! structurally (the view wants a different entry path). Retrying the *same*
//! transport is useless against the second kind, so the chain tries
//! independent transports in a fixed priority order — direct load, in-page
//! script redirect, fresh tab — each under its own timeout and each judged
//! solely by whether the surface URL ends up matching the destination's
//! success predicate.
//!
//! Surfaces are capabilities, not concrete pages: the chain is generic over
//! [`Surface`] so the fallback ordering is exercised in tests with synthetic
//! surfaces and no browser.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use regex::Regex;
use tracing::{debug, info, warn};

use super::shortcode;

const URL_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A target URL plus the predicate the settled surface URL must satisfy.
/// Computed per post, discarded after use.
#[derive(Debug, Clone)]
pub struct NavigationDestination {
    pub url: String,
    pub success: Regex,
}

fn liked_by_predicate() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/liked_by/?").expect("valid regex"))
}

impl NavigationDestination {
    /// The liked-by view for a post shortcode.
    pub fn liked_by(code: &str) -> Self {
        Self {
            url: shortcode::liked_by_url(code),
            success: liked_by_predicate().clone(),
        }
    }
}

/// The transports, in the fixed order they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavStrategy {
    /// Command the origin surface to load the destination URL.
    DirectLoad,
    /// Set `window.location` from inside the origin's script environment —
    /// covers loads the router intercepts.
    ScriptRedirect,
    /// Open a fresh tab in the same session, leaving the origin untouched.
    NewTab,
}

pub const DEFAULT_STRATEGIES: [NavStrategy; 3] = [
    NavStrategy::DirectLoad,
    NavStrategy::ScriptRedirect,
    NavStrategy::NewTab,
];

/// An interactive browsing context the chain can drive.
#[async_trait]
pub trait Surface: Send + Sync + Sized {
    /// Issue a top-level navigation on this surface.
    async fn load(&self, url: &str) -> anyhow::Result<()>;
    /// Ask the surface's script environment to redirect itself.
    async fn redirect_via_script(&self, url: &str) -> anyhow::Result<()>;
    /// The surface's current URL, if it can still be read.
    async fn current_url(&self) -> Option<String>;
    /// Open a sibling surface in the same session, already loading `url`.
    async fn open_sibling(&self, url: &str) -> anyhow::Result<Self>;
    /// Dispose of this surface.
    async fn close(self);
}

/// Result of a chain run: `surface` is `Some` only when a new tab became the
/// active surface (the caller must close it after extraction); `None` means
/// the origin surface is active.
pub struct NavOutcome<S> {
    pub surface: Option<S>,
    pub success: bool,
}

/// Try each strategy in order until the destination predicate matches.
///
/// A failed `NewTab` attempt closes the tab it opened before moving on. When
/// every strategy exhausts, the outcome is `(origin, false)` — the caller
/// treats that as "skip this post", never as fatal.
pub async fn reach_destination<S: Surface>(
    origin: &S,
    destination: &NavigationDestination,
    strategies: &[NavStrategy],
    per_strategy_timeout: Duration,
) -> NavOutcome<S> {
    for strategy in strategies {
        debug!("nav: trying {:?} → {}", strategy, destination.url);
        match strategy {
            NavStrategy::DirectLoad => {
                if let Err(e) = origin.load(&destination.url).await {
                    debug!("nav: direct load failed to issue: {}", e);
                    continue;
                }
                if wait_for_url(origin, &destination.success, per_strategy_timeout).await {
                    info!("nav: reached {} via direct load", destination.url);
                    return NavOutcome {
                        surface: None,
                        success: true,
                    };
                }
            }
            NavStrategy::ScriptRedirect => {
                if let Err(e) = origin.redirect_via_script(&destination.url).await {
                    debug!("nav: script redirect failed to issue: {}", e);
                    continue;
                }
                if wait_for_url(origin, &destination.success, per_strategy_timeout).await {
                    info!("nav: reached {} via script redirect", destination.url);
                    return NavOutcome {
                        surface: None,
                        success: true,
                    };
                }
            }
            NavStrategy::NewTab => {
                let tab = match origin.open_sibling(&destination.url).await {
                    Ok(tab) => tab,
                    Err(e) => {
                        debug!("nav: new tab failed to open: {}", e);
                        continue;
                    }
                };
                if wait_for_url(&tab, &destination.success, per_strategy_timeout).await {
                    info!("nav: reached {} via new tab", destination.url);
                    return NavOutcome {
                        surface: Some(tab),
                        success: true,
                    };
                }
                // Abandoned strategy may not leak its tab.
                tab.close().await;
            }
        }
    }

    warn!("nav: all strategies exhausted for {}", destination.url);
    NavOutcome {
        surface: None,
        success: false,
    }
}

/// Poll the surface URL until it matches `predicate` or `timeout` elapses.
pub async fn wait_for_url<S: Surface>(surface: &S, predicate: &Regex, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(url) = surface.current_url().await {
            if predicate.is_match(&url) {
                return true;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(URL_POLL_INTERVAL).await;
    }
}

// ── chromiumoxide-backed surface ─────────────────────────────────────────────

/// A CDP tab in the shared visible session.
pub struct TabSurface<'a> {
    browser: &'a Browser,
    page: Page,
}

impl<'a> TabSurface<'a> {
    pub fn new(browser: &'a Browser, page: Page) -> Self {
        Self { browser, page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }
}

#[async_trait]
impl<'a> Surface for TabSurface<'a> {
    async fn load(&self, url: &str) -> anyhow::Result<()> {
        self.page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("goto({url}) failed: {e}"))
    }

    async fn redirect_via_script(&self, url: &str) -> anyhow::Result<()> {
        let url_js = serde_json::json!(url);
        // The evaluation context is torn down by the navigation it triggers —
        // an evaluate error here is not a failure signal.
        let _ = self
            .page
            .evaluate(format!("window.location.href = {url_js};"))
            .await;
        Ok(())
    }

    async fn current_url(&self) -> Option<String> {
        self.page.url().await.ok().flatten()
    }

    async fn open_sibling(&self, url: &str) -> anyhow::Result<Self> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow::anyhow!("new tab failed: {e}"))?;
        let _ = page.goto(url).await;
        Ok(Self {
            browser: self.browser,
            page,
        })
    }

    async fn close(self) {
        if let Err(e) = self.page.close().await {
            debug!("nav: tab close error (ignored): {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liked_by_destination_predicate() {
        let dest = NavigationDestination::liked_by("ABCDEFGHIJK");
        assert_eq!(dest.url, "https://www.instagram.com/p/ABCDEFGHIJK/liked_by");
        assert!(dest.success.is_match("https://www.instagram.com/p/ABCDEFGHIJK/liked_by/"));
        assert!(dest.success.is_match(&dest.url));
        assert!(!dest.success.is_match("https://www.instagram.com/p/ABCDEFGHIJK/"));
    }
}
