//! The two concrete extraction surfaces.
//!
//! Both readers are thin JS-reading shells: the page hands back raw anchor
//! hrefs and all username filtering happens in pure functions here, so the
//! accept/reject rules are unit-tested without a browser.
//!
//! * [`DialogReader`] — the in-page likers modal. Growth signal is the scroll
//!   container's content extent.
//! * [`LikedByPageReader`] — the dedicated `/liked_by/` page. No single
//!   scrollable container is reliably identifiable there, so the growth
//!   signal is the distinct-username count instead.

use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use regex::Regex;

use super::extract::SurfaceReader;

// ── Pure href filters ────────────────────────────────────────────────────────

fn username_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._]{1,30}$").expect("valid regex"))
}

/// Site-chrome anchor labels that also look like single-segment profile
/// links. Matched case-insensitively; extend via [`page_denylist`].
const CHROME_DENYLIST: &[&str] = &[
    "about",
    "help",
    "press",
    "api",
    "jobs",
    "privacy",
    "terms",
    "locations",
    "meta verified",
    "home",
    "search",
    "explore",
    "reels",
    "messages",
    "notifications",
    "create",
    "profile",
    "more",
    "also from meta",
];

/// Build the full-page denylist: fixed site-chrome labels plus the active
/// session's own handle (its profile link is page chrome, not a liker).
pub fn page_denylist(own_handle: Option<&str>) -> HashSet<String> {
    let mut deny: HashSet<String> = CHROME_DENYLIST.iter().map(|s| s.to_string()).collect();
    if let Some(handle) = own_handle {
        if !handle.is_empty() {
            deny.insert(handle.to_lowercase());
        }
    }
    deny
}

/// Usernames from anchors inside the likers dialog.
///
/// Accepts root-relative hrefs with exactly one path segment (a profile
/// root), excluding post/reel paths. Order preserved, duplicates dropped.
pub fn dialog_usernames(hrefs: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for href in hrefs {
        if !href.starts_with('/') || href.contains("/p/") || href.contains("/reel/") {
            continue;
        }
        let segments: Vec<&str> = href.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() != 1 {
            continue;
        }
        let username = segments[0];
        if !out.iter().any(|u| u == username) {
            out.push(username.to_string());
        }
    }
    out
}

/// Usernames from anchors on the full liked-by page.
///
/// Stricter than the dialog filter: also excludes explore/reels chrome paths,
/// requires a username-shaped token, and drops denylisted labels. Identifiers
/// stay case-sensitive; only the denylist match is lowercased.
pub fn page_usernames(hrefs: &[String], denylist: &HashSet<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for href in hrefs {
        if !href.starts_with('/')
            || href.contains("/p/")
            || href.contains("/reel/")
            || href.starts_with("/explore/")
            || href.starts_with("/reels/")
        {
            continue;
        }
        let segments: Vec<&str> = href.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() != 1 {
            continue;
        }
        let username = segments[0];
        if !username_re().is_match(username) {
            continue;
        }
        if denylist.contains(&username.to_lowercase()) {
            continue;
        }
        if !out.iter().any(|u| u == username) {
            out.push(username.to_string());
        }
    }
    out
}

// ── Dialog surface ───────────────────────────────────────────────────────────

const DIALOG_ROOT: &str = r#"div[role="dialog"]"#;

/// The scrollable sub-region inside the dialog varies; these are tried in
/// order, falling back to the dialog root, then the document itself.
const DIALOG_SCROLL_JS: &str = r#"
    const candidates = [
        'div[role="dialog"] div[style*="overflow"]',
        'div[role="dialog"] ul',
        'div[role="dialog"] div[role="dialog"]',
    ];
    let container = null;
    for (const sel of candidates) {
        const el = document.querySelector(sel);
        if (el) { container = el; break; }
    }
    if (!container) container = document.querySelector('div[role="dialog"]');
"#;

pub struct DialogReader {
    page: Page,
}

impl DialogReader {
    /// Attach to the likers dialog, polling up to `timeout` for it to exist.
    /// `None` when no dialog appears — the caller returns an empty result
    /// rather than erroring.
    pub async fn attach(page: Page, timeout: Duration) -> Option<Self> {
        let deadline = tokio::time::Instant::now() + timeout;
        let probe = format!("!!document.querySelector('{DIALOG_ROOT}')");
        loop {
            let present = page
                .evaluate(probe.as_str())
                .await
                .ok()
                .and_then(|v| v.into_value::<bool>().ok())
                .unwrap_or(false);
            if present {
                return Some(Self { page });
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }
}

#[async_trait]
impl SurfaceReader for DialogReader {
    async fn read_visible(&mut self) -> Vec<String> {
        let hrefs: Vec<String> = self
            .page
            .evaluate(
                r#"Array.from(document.querySelectorAll('div[role="dialog"] a[href]'))
                    .map(a => a.getAttribute('href') || '')"#,
            )
            .await
            .ok()
            .and_then(|v| v.into_value::<Vec<String>>().ok())
            .unwrap_or_default();
        dialog_usernames(&hrefs)
    }

    async fn scroll(&mut self) {
        let script = format!(
            r#"(function() {{
{DIALOG_SCROLL_JS}
    if (container) {{ container.scrollBy(0, container.clientHeight); }}
    else {{ window.scrollBy(0, 1000); }}
    return true;
}})();"#
        );
        let _ = self.page.evaluate(script).await;
    }

    async fn growth_signal(&mut self) -> i64 {
        let script = format!(
            r#"(function() {{
{DIALOG_SCROLL_JS}
    if (container) return container.scrollHeight;
    return document.body ? document.body.scrollHeight : 0;
}})();"#
        );
        self.page
            .evaluate(script)
            .await
            .ok()
            .and_then(|v| v.into_value::<i64>().ok())
            .unwrap_or(0)
    }
}

// ── Full liked-by page surface ───────────────────────────────────────────────

pub struct LikedByPageReader {
    page: Page,
    denylist: HashSet<String>,
    /// Every distinct username this reader has ever surfaced; its size is the
    /// growth signal for this surface.
    distinct: HashSet<String>,
}

impl LikedByPageReader {
    pub fn new(page: Page, own_handle: Option<&str>) -> Self {
        Self {
            page,
            denylist: page_denylist(own_handle),
            distinct: HashSet::new(),
        }
    }
}

#[async_trait]
impl SurfaceReader for LikedByPageReader {
    async fn read_visible(&mut self) -> Vec<String> {
        let hrefs: Vec<String> = self
            .page
            .evaluate(
                r#"Array.from(document.querySelectorAll('a[href^="/"]'))
                    .map(a => a.getAttribute('href') || '')"#,
            )
            .await
            .ok()
            .and_then(|v| v.into_value::<Vec<String>>().ok())
            .unwrap_or_default();
        let usernames = page_usernames(&hrefs, &self.denylist);
        for u in &usernames {
            self.distinct.insert(u.clone());
        }
        usernames
    }

    async fn scroll(&mut self) {
        let _ = self.page.evaluate("window.scrollBy(0, 1500); true").await;
    }

    async fn growth_signal(&mut self) -> i64 {
        self.distinct.len() as i64
    }
}
