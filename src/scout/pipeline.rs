//! Per-post orchestration.
//!
//! Deliberately sequential: one browser session, one post at a time, so the
//! request rate against the target service stays low. Posts are processed in
//! discovery order; within a post, likers keep first-seen order into the
//! output rows.
//!
//! Reader selection: the liked-by page is the primary surface (reached via
//! the navigation strategy chain). When every strategy fails, the retained
//! legacy path probes the likers affordance on the post page and reads the
//! in-page dialog instead. A post that yields nothing either way is skipped,
//! never fatal.

use anyhow::Result;
use chromiumoxide::Page;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::browser::manager::{wait_until_stable, BrowserSession};
use crate::browser::probe::{Locator, Prober};
use crate::core::config::ScoutConfig;
use crate::core::error::{ScoutError, ScoutResult};
use crate::core::types::{OutputRow, PostReference, RunSummary};
use crate::sink::RowSink;

use super::discovery;
use super::extract::{extract, ExtractOptions};
use super::nav::{reach_destination, NavigationDestination, Surface, TabSurface, DEFAULT_STRATEGIES};
use super::readers::{DialogReader, LikedByPageReader};
use super::shortcode;
use super::{account, SETTLE_DIALOG_MS, SETTLE_PAGE_MS};

/// Build one batch of output rows for a post, stamped once per batch.
pub fn build_rows(account_handle: &str, post_url: &str, usernames: &[String]) -> Vec<OutputRow> {
    let timestamp_utc = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    usernames
        .iter()
        .map(|u| OutputRow {
            timestamp_utc: timestamp_utc.clone(),
            account_handle: account_handle.to_string(),
            post_url: post_url.to_string(),
            username: u.clone(),
        })
        .collect()
}

/// Forward one post's batch to the sink and fold it into the summary.
pub async fn forward_batch<S: RowSink + ?Sized>(
    sink: &S,
    rows: &[OutputRow],
    summary: &mut RunSummary,
) -> ScoutResult<u64> {
    let appended = sink.append_rows(rows).await?;
    summary.posts_processed += 1;
    summary.rows_appended += appended;
    Ok(appended)
}

pub struct Pipeline<'a, S: RowSink> {
    session: &'a BrowserSession,
    page: Page,
    prober: Prober,
    cfg: &'a ScoutConfig,
    sink: S,
}

impl<'a, S: RowSink> Pipeline<'a, S> {
    pub fn new(session: &'a BrowserSession, page: Page, cfg: &'a ScoutConfig, sink: S) -> Self {
        let prober = Prober::new(page.clone(), cfg.slow_mo());
        Self {
            session,
            page,
            prober,
            cfg,
            sink,
        }
    }

    /// The full run: login → open profile → discover posts → per-post
    /// collect-and-forward. Fatal only on configuration problems, an empty
    /// profile grid, or a sink failure; post-level trouble is skipped.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let handle = self.cfg.resolve_target_handle()?;
        let query = self.cfg.resolve_target_query()?;

        account::login_if_needed(&self.prober, self.cfg).await?;
        account::open_target_profile(&self.prober, self.cfg, &handle, &query).await?;

        let posts = discovery::discover_posts(&self.page, self.cfg.resolve_num_posts()).await;
        if posts.is_empty() {
            anyhow::bail!("no posts found on the profile grid for @{handle}");
        }
        info!("pipeline: {} posts discovered for @{handle}", posts.len());

        let mut summary = RunSummary::default();
        let total = posts.len();

        for (idx, post) in posts.iter().enumerate() {
            let n = idx + 1;
            let usernames = self.collect_likers(post).await;
            if usernames.is_empty() {
                warn!("[{n}/{total}] no likers readable for {}", post.url);
                summary.posts_skipped += 1;
                continue;
            }

            let rows = build_rows(&handle, &post.url, &usernames);
            match forward_batch(&self.sink, &rows, &mut summary).await {
                Ok(appended) => {
                    info!("[{n}/{total}] appended {appended} rows for {}", post.url);
                }
                Err(e) => {
                    // Surface the failure, but tell the operator how far the
                    // run got first.
                    error!(
                        "pipeline: sink failed after {} rows appended across {} posts",
                        summary.rows_appended, summary.posts_processed
                    );
                    return Err(e.into());
                }
            }
        }

        Ok(summary)
    }

    /// Collect likers for one post. Every failure path returns an empty list;
    /// the caller decides that means "skip".
    async fn collect_likers(&self, post: &PostReference) -> Vec<String> {
        let nav_timeout = self.cfg.navigation_timeout();
        let nav_ms = nav_timeout.as_millis() as u64;

        // Load the post first so the canonical URL (with shortcode) settles.
        if let Err(e) = self.page.goto(post.url.as_str()).await {
            warn!("post load failed for {}: {e}", post.url);
            return Vec::new();
        }
        let _ = wait_until_stable(&self.page, 1_500, nav_ms).await;

        let settled_url = self
            .page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| post.url.clone());
        let code = match shortcode::extract_shortcode(&settled_url) {
            Ok(code) => code,
            Err(e) => {
                warn!("skipping post: {e}");
                return Vec::new();
            }
        };

        let destination = NavigationDestination::liked_by(&code);
        let origin = TabSurface::new(&self.session.browser, self.page.clone());
        let outcome =
            reach_destination(&origin, &destination, &DEFAULT_STRATEGIES, nav_timeout).await;

        if outcome.success {
            let active = outcome
                .surface
                .as_ref()
                .map(|tab| tab.page().clone())
                .unwrap_or_else(|| self.page.clone());
            let _ = wait_until_stable(&active, 1_500, nav_ms).await;

            let mut reader = LikedByPageReader::new(active, self.cfg.own_handle().as_deref());
            let usernames = extract(
                &mut reader,
                &ExtractOptions {
                    max_items: self.cfg.resolve_max_likes_per_post(),
                    stability_threshold: self.cfg.resolve_stability_rounds(),
                    settle: self.cfg.scroll_settle(SETTLE_PAGE_MS),
                },
            )
            .await;

            if let Some(tab) = outcome.surface {
                tab.close().await;
            }
            return usernames;
        }

        // Recovered here, not propagated: the dialog path still gets a shot.
        let timeout = ScoutError::NavigationTimeout {
            destination: destination.url,
            timeout_ms: nav_ms,
        };
        warn!("{timeout} — falling back to the likers dialog");
        self.collect_from_dialog(post).await
    }

    /// Legacy fallback: reopen the post and read the likers dialog in place.
    async fn collect_from_dialog(&self, post: &PostReference) -> Vec<String> {
        if let Err(e) = self.page.goto(post.url.as_str()).await {
            warn!("post reload failed for {}: {e}", post.url);
            return Vec::new();
        }
        let _ = wait_until_stable(
            &self.page,
            1_500,
            self.cfg.navigation_timeout().as_millis() as u64,
        )
        .await;

        let likers_affordance = [
            Locator::css(r#"a[href$="/liked_by/"]"#),
            Locator::css(r#"div[role="dialog"] a[href$="/liked_by/"]"#),
            Locator::css_with_text("section a", " likes"),
            Locator::css_with_text("button", " likes"),
            Locator::css_with_text(r#"div[role="button"]"#, " likes"),
            Locator::css(r#"button[aria-label*="likes"]"#),
        ];
        if !self
            .prober
            .click_any(&likers_affordance, self.cfg.selector_timeout())
            .await
        {
            return Vec::new();
        }

        let Some(mut reader) =
            DialogReader::attach(self.page.clone(), self.cfg.selector_timeout()).await
        else {
            // No modal appeared: empty result, not an error.
            return Vec::new();
        };

        extract(
            &mut reader,
            &ExtractOptions {
                max_items: self.cfg.resolve_max_likes_per_post(),
                stability_threshold: self.cfg.resolve_stability_rounds(),
                settle: self.cfg.scroll_settle(SETTLE_DIALOG_MS),
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ScoutError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        calls: AtomicUsize,
        fail_on_call: Option<usize>,
    }

    impl CountingSink {
        fn new(fail_on_call: Option<usize>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on_call,
            }
        }
    }

    #[async_trait]
    impl RowSink for CountingSink {
        async fn append_rows(&self, rows: &[OutputRow]) -> ScoutResult<u64> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_call == Some(call) {
                return Err(ScoutError::Sink("simulated outage".into()));
            }
            Ok(rows.len() as u64)
        }
    }

    fn usernames(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("user_{i}")).collect()
    }

    /// Scenario from the system's acceptance picture: 3 posts × 5 likers →
    /// 15 rows over 3 sink calls, cumulative total 15.
    #[test]
    fn test_three_posts_of_five_forward_fifteen_rows() {
        tokio_test::block_on(async {
            let sink = CountingSink::new(None);
            let mut summary = RunSummary::default();
            for i in 0..3 {
                let post_url = format!("https://www.instagram.com/p/POST{i}/");
                let rows = build_rows("natgeo", &post_url, &usernames(5));
                assert_eq!(rows.len(), 5);
                forward_batch(&sink, &rows, &mut summary).await.unwrap();
            }
            assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
            assert_eq!(summary.rows_appended, 15);
            assert_eq!(summary.posts_processed, 3);
        });
    }

    /// A sink failure surfaces as an error while the summary retains the
    /// running total from the batches that landed.
    #[test]
    fn test_sink_failure_keeps_running_total() {
        tokio_test::block_on(async {
            let sink = CountingSink::new(Some(2));
            let mut summary = RunSummary::default();

            let rows = build_rows("natgeo", "https://x/p/AAA/", &usernames(4));
            forward_batch(&sink, &rows, &mut summary).await.unwrap();

            let err = forward_batch(&sink, &rows, &mut summary).await.unwrap_err();
            assert!(matches!(err, ScoutError::Sink(_)));
            assert_eq!(summary.rows_appended, 4);
            assert_eq!(summary.posts_processed, 1);
        });
    }

    #[test]
    fn test_rows_preserve_username_order_and_share_timestamp() {
        let rows = build_rows(
            "natgeo",
            "https://www.instagram.com/p/ABCDEFGHIJK/",
            &["carol".into(), "alice".into(), "bob".into()],
        );
        let names: Vec<&str> = rows.iter().map(|r| r.username.as_str()).collect();
        assert_eq!(names, vec!["carol", "alice", "bob"]);
        assert!(rows.iter().all(|r| r.timestamp_utc == rows[0].timestamp_utc));
        assert!(rows[0].timestamp_utc.ends_with('Z'));
    }
}
