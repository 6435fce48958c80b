//! Cookie-jar persistence — the run's login state across restarts.
//!
//! One opaque JSON file (path from config) holding the raw CDP cookie array.
//! Loaded and injected via `Network.setCookies` before the first navigation so
//! a previous run's login is reused; saved unconditionally at shutdown. Both
//! directions are best-effort: a missing or malformed file just means a fresh
//! login, and a failed save never crashes the run.

use std::path::Path;

use chromiumoxide::Page;
use tracing::{info, warn};

/// Load stored cookies from `path` as raw JSON values.
///
/// Returns `None` when the file is absent, unreadable, or empty.
fn load_raw(path: &Path) -> Option<Vec<serde_json::Value>> {
    if !path.exists() {
        return None;
    }
    let content = std::fs::read_to_string(path).ok()?;
    let cookies: Vec<serde_json::Value> = serde_json::from_str(&content).ok()?;
    if cookies.is_empty() {
        return None;
    }
    info!(
        "session: 🍪 loaded {} cookies from {}",
        cookies.len(),
        path.display()
    );
    Some(cookies)
}

/// Inject stored session cookies into a live page **before** navigation.
///
/// Any individual cookie that fails to deserialize is silently skipped so a
/// partially-malformed session file never blocks the run.
async fn inject_into_page(page: &Page, raw_cookies: &[serde_json::Value]) {
    use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetCookiesParams};

    let cookie_params: Vec<CookieParam> = raw_cookies
        .iter()
        .filter_map(|v| serde_json::from_value::<CookieParam>(v.clone()).ok())
        .collect();

    if cookie_params.is_empty() {
        warn!("session: stored file contained no valid cookies — starting unauthenticated");
        return;
    }

    let count = cookie_params.len();
    match page.execute(SetCookiesParams::new(cookie_params)).await {
        Ok(_) => info!("session: 💉 injected {} cookies", count),
        Err(e) => warn!("session: cookie injection failed: {}", e),
    }
}

/// Load the session file (if present) and inject it into `page`.
/// Returns `true` when cookies were found and injected.
pub async fn restore(page: &Page, path: &Path) -> bool {
    match load_raw(path) {
        Some(raw) => {
            inject_into_page(page, &raw).await;
            true
        }
        None => false,
    }
}

/// Serialize the page's current cookie jar to `path`. Best-effort: every
/// failure is a warning, never an error — losing the session only costs the
/// next run a manual login.
pub async fn persist(page: &Page, path: &Path) {
    let cookies = match page.get_cookies().await {
        Ok(c) => c,
        Err(e) => {
            warn!("session: could not read cookies for persistence: {}", e);
            return;
        }
    };

    let raw: Vec<serde_json::Value> = cookies
        .iter()
        .filter_map(|c| serde_json::to_value(c).ok())
        .collect();

    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("session: could not create {}: {}", parent.display(), e);
            return;
        }
    }

    match serde_json::to_string_pretty(&raw)
        .map_err(anyhow::Error::from)
        .and_then(|body| std::fs::write(path, body).map_err(anyhow::Error::from))
    {
        Ok(()) => info!("session: 💾 saved {} cookies to {}", raw.len(), path.display()),
        Err(e) => warn!("session: save failed (non-fatal): {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_raw_missing_file_is_none() {
        assert!(load_raw(Path::new("/nonexistent/gram-scout-session.json")).is_none());
    }

    #[test]
    fn test_load_raw_rejects_empty_and_malformed() {
        let dir = std::env::temp_dir().join("gram-scout-session-test");
        std::fs::create_dir_all(&dir).unwrap();

        let empty = dir.join("empty.json");
        std::fs::write(&empty, "[]").unwrap();
        assert!(load_raw(&empty).is_none());

        let malformed = dir.join("malformed.json");
        std::fs::write(&malformed, "{not json").unwrap();
        assert!(load_raw(&malformed).is_none());
    }

    #[test]
    fn test_load_raw_reads_cookie_array() {
        let dir = std::env::temp_dir().join("gram-scout-session-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("jar.json");
        std::fs::write(
            &path,
            r#"[{"name":"sessionid","value":"abc","domain":".instagram.com","path":"/"}]"#,
        )
        .unwrap();

        let raw = load_raw(&path).expect("one cookie");
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0]["name"], "sessionid");
    }
}
