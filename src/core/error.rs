use thiserror::Error;

/// Run-level error taxonomy.
///
/// Best-effort UI probes (cookie banners, "Not now" dialogs) never surface
/// here — absence of an affordance is a `false` at the probe boundary, not an
/// error. Everything that *can* abort a post or the whole run is one of these.
#[derive(Debug, Error)]
pub enum ScoutError {
    /// A required setting is absent. Fatal before any navigation starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// A navigation strategy or selector probe exceeded its bound.
    /// Recovered locally by the caller (next fallback, or skip the post).
    #[error("navigation to {destination} timed out after {timeout_ms}ms")]
    NavigationTimeout { destination: String, timeout_ms: u64 },

    /// No shortcode pattern matched the post URL. Skip the post, keep the run.
    #[error("could not parse post shortcode from URL: {0}")]
    ShortcodeParse(String),

    /// The sink rejected or failed a batch. Propagated to the run level after
    /// the cumulative appended total has been logged.
    #[error("sink request failed: {0}")]
    Sink(String),
}

pub type ScoutResult<T> = std::result::Result<T, ScoutError>;
