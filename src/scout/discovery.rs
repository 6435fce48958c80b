//! Profile-grid post discovery.
//!
//! Reads post/reel anchors straight off the grid without assuming any wrapper
//! structure. An empty first read gets one scroll-and-retry (the grid lazy
//! loads below the fold on some cohorts) before giving up.

use std::collections::HashSet;
use std::time::Duration;

use chromiumoxide::Page;
use tracing::debug;
use url::Url;

use crate::core::types::PostReference;

const GRID_ANCHOR_JS: &str = r#"Array.from(
    document.querySelectorAll('a[href*="/p/"], a[href*="/reel/"]')
).map(a => a.getAttribute('href') || '')"#;

const SITE_ORIGIN: &str = "https://www.instagram.com";

/// Normalize, dedup, and cap raw grid hrefs.
///
/// Relative hrefs are resolved against `origin` before dedup so `/p/X/` and
/// its absolute form count as one post. Order = document order at read time.
pub fn collect_post_urls(hrefs: &[String], origin: &str, limit: usize) -> Vec<PostReference> {
    let base = Url::parse(origin).ok();
    let mut seen: HashSet<String> = HashSet::new();
    let mut posts: Vec<PostReference> = Vec::new();

    for href in hrefs {
        if href.is_empty() {
            continue;
        }
        let absolute = if href.starts_with('/') {
            match base.as_ref().and_then(|b| b.join(href).ok()) {
                Some(u) => u.to_string(),
                None => continue,
            }
        } else {
            href.clone()
        };
        if seen.insert(absolute.clone()) {
            posts.push(PostReference::new(absolute));
            if posts.len() >= limit {
                break;
            }
        }
    }
    posts
}

/// Read recent post references from the currently-open profile page.
///
/// Returns at most `limit` references; an empty result after the retry means
/// the profile has no readable grid (private, empty, or blocked).
pub async fn discover_posts(page: &Page, limit: usize) -> Vec<PostReference> {
    let mut hrefs = read_grid_anchors(page).await;

    if hrefs.is_empty() {
        // One nudge to trigger lazy load, then re-query.
        debug!("discovery: empty grid read — scrolling and retrying once");
        let _ = page.evaluate("window.scrollBy(0, 1200); true").await;
        tokio::time::sleep(Duration::from_millis(800)).await;
        hrefs = read_grid_anchors(page).await;
    }

    collect_post_urls(&hrefs, SITE_ORIGIN, limit)
}

async fn read_grid_anchors(page: &Page) -> Vec<String> {
    page.evaluate(GRID_ANCHOR_JS)
        .await
        .ok()
        .and_then(|v| v.into_value::<Vec<String>>().ok())
        .unwrap_or_default()
}
