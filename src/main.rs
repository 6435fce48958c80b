use tracing::{error, info};

use gram_scout::browser::manager::BrowserSession;
use gram_scout::browser::session;
use gram_scout::{load_scout_config, Pipeline, SheetsSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cfg = load_scout_config();

    // Fail fast on configuration before any browser work starts.
    let sink_url = cfg.resolve_sink_url()?;
    let handle = cfg.resolve_target_handle()?;
    let sink = SheetsSink::new(sink_url, cfg.resolve_worksheet_name())?;

    info!("gram-scout starting for @{handle}");

    let browser_session = BrowserSession::launch().await?;
    let page = browser_session.new_page().await?;

    // Reuse a previous run's login when a session file exists.
    let session_path = cfg.resolve_session_path();
    session::restore(&page, &session_path).await;

    let mut pipeline = Pipeline::new(&browser_session, page.clone(), &cfg, sink);
    let result = pipeline.run().await;
    drop(pipeline);

    // Save the session for the next run no matter how this one ended.
    session::persist(&page, &session_path).await;
    browser_session.shutdown().await;

    match result {
        Ok(summary) => {
            info!(
                "run complete: {} posts processed, {} skipped",
                summary.posts_processed, summary.posts_skipped
            );
            println!("Done. Total rows appended: {}", summary.rows_appended);
            Ok(())
        }
        Err(e) => {
            error!("run failed: {e:#}");
            Err(e)
        }
    }
}
