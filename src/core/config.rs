use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::{ScoutError, ScoutResult};

// ---------------------------------------------------------------------------
// ScoutConfig — file-based config loader (gram-scout.json) with env-var fallback
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "GRAM_SCOUT_CONFIG";
pub const ENV_LOGIN_USERNAME: &str = "GRAM_SCOUT_USERNAME";
pub const ENV_LOGIN_PASSWORD: &str = "GRAM_SCOUT_PASSWORD";
pub const ENV_SINK_URL: &str = "GRAM_SCOUT_SINK_URL";

/// Top-level config loaded from `gram-scout.json`.
///
/// Every field is optional in the file; `resolve_*` accessors apply env-var
/// fallbacks and defaults so component behavior is fully determined by the
/// values handed to it at construction.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ScoutConfig {
    /// Profile whose recent posts are harvested, e.g. `"natgeo"`.
    pub target_handle: Option<String>,
    /// Free-text query typed into the search UI. Defaults to the handle.
    pub target_query: Option<String>,
    /// How many recent posts to process. Default: 6.
    pub num_posts: Option<usize>,
    /// Per-post cap on collected likers. Default: 200.
    pub max_likes_per_post: Option<usize>,
    /// Upper bound for each navigation strategy, in ms. Default: 30 000.
    pub navigation_timeout_ms: Option<u64>,
    /// Per-candidate selector wait, in ms. Default: 8 000.
    pub selector_timeout_ms: Option<u64>,
    /// Delay appended after each probe action so the visible run is watchable.
    /// Default: 100 ms. Set 0 to disable.
    pub slow_mo_ms: Option<u64>,
    /// Consecutive no-growth scroll rounds before extraction converges.
    /// Default: 4. Empirically chosen; tune against the live surface.
    pub scroll_stability_rounds: Option<u32>,
    /// Post-scroll settle delay override, in ms. When unset the dialog surface
    /// waits 800 ms and the full liked-by page 1 000 ms.
    pub scroll_settle_ms: Option<u64>,
    /// Where the serialized cookie jar lives between runs.
    /// Default: `~/.gram-scout/session.json`.
    pub session_path: Option<String>,
    /// Apps Script web-app endpoint the rows are POSTed to. Required.
    pub sink_url: Option<String>,
    /// Worksheet tab name inside the target spreadsheet. Default: `"likers"`.
    pub worksheet_name: Option<String>,
}

impl ScoutConfig {
    pub fn resolve_target_handle(&self) -> ScoutResult<String> {
        self.target_handle
            .as_deref()
            .map(|h| h.trim_matches('/').to_string())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ScoutError::Config("target_handle must be set in gram-scout.json".into()))
    }

    pub fn resolve_target_query(&self) -> ScoutResult<String> {
        match self.target_query.as_deref() {
            Some(q) if !q.trim().is_empty() => Ok(q.trim().to_string()),
            _ => self.resolve_target_handle(),
        }
    }

    pub fn resolve_num_posts(&self) -> usize {
        self.num_posts.unwrap_or(6).max(1)
    }

    pub fn resolve_max_likes_per_post(&self) -> usize {
        self.max_likes_per_post.unwrap_or(200).max(1)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms.unwrap_or(30_000))
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms.unwrap_or(8_000))
    }

    pub fn slow_mo(&self) -> Duration {
        Duration::from_millis(self.slow_mo_ms.unwrap_or(100))
    }

    pub fn resolve_stability_rounds(&self) -> u32 {
        self.scroll_stability_rounds.unwrap_or(4).max(1)
    }

    /// Settle delay for a surface whose natural default is `default_ms`.
    pub fn scroll_settle(&self, default_ms: u64) -> Duration {
        Duration::from_millis(self.scroll_settle_ms.unwrap_or(default_ms))
    }

    /// Session file: JSON field → `~/.gram-scout/session.json` → cwd fallback.
    pub fn resolve_session_path(&self) -> PathBuf {
        if let Some(p) = self.session_path.as_deref() {
            if !p.trim().is_empty() {
                return PathBuf::from(p);
            }
        }
        match dirs::home_dir() {
            Some(home) => home.join(".gram-scout").join("session.json"),
            None => PathBuf::from("gram-scout-session.json"),
        }
    }

    /// Sink endpoint: JSON field → `GRAM_SCOUT_SINK_URL` env var → error.
    /// Checked before any navigation so a misconfigured run fails fast.
    pub fn resolve_sink_url(&self) -> ScoutResult<String> {
        if let Some(u) = self.sink_url.as_deref() {
            if !u.trim().is_empty() {
                return Ok(u.trim().to_string());
            }
        }
        std::env::var(ENV_SINK_URL)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                ScoutError::Config(format!(
                    "sink_url must be set in gram-scout.json (or {ENV_SINK_URL}) — rows have nowhere to go"
                ))
            })
    }

    pub fn resolve_worksheet_name(&self) -> String {
        self.worksheet_name
            .clone()
            .filter(|w| !w.trim().is_empty())
            .unwrap_or_else(|| "likers".to_string())
    }

    /// Login credentials from env only — never from the config file, never logged.
    pub fn login_credentials(&self) -> Option<(String, String)> {
        let user = std::env::var(ENV_LOGIN_USERNAME).ok().filter(|v| !v.is_empty())?;
        let pass = std::env::var(ENV_LOGIN_PASSWORD).ok().filter(|v| !v.is_empty())?;
        Some((user, pass))
    }

    /// The logged-in handle, used to keep the session's own profile link out
    /// of extracted liker lists.
    pub fn own_handle(&self) -> Option<String> {
        std::env::var(ENV_LOGIN_USERNAME).ok().filter(|v| !v.is_empty())
    }
}

/// Load `gram-scout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `GRAM_SCOUT_CONFIG` env var path
/// 2. `./gram-scout.json`  (process cwd)
/// 3. `../gram-scout.json` (one level up, for `cargo run` from a subdir)
///
/// Missing file → `ScoutConfig::default()` (env-var fallbacks still apply).
/// Parse error → log a warning, return defaults.
pub fn load_scout_config() -> ScoutConfig {
    let candidates: Vec<PathBuf> = {
        let mut v = vec![
            PathBuf::from("gram-scout.json"),
            PathBuf::from("../gram-scout.json"),
        ];
        if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
            v.insert(0, PathBuf::from(env_path));
        }
        v
    };

    for path in &candidates {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<ScoutConfig>(&contents) {
                Ok(cfg) => {
                    tracing::info!("gram-scout.json loaded from {}", path.display());
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        "gram-scout.json parse error at {}: {} — using defaults",
                        path.display(),
                        e
                    );
                    return ScoutConfig::default();
                }
            },
            Err(_) => continue, // not at this path — try next
        }
    }

    ScoutConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied_when_fields_absent() {
        let cfg = ScoutConfig::default();
        assert_eq!(cfg.resolve_num_posts(), 6);
        assert_eq!(cfg.resolve_max_likes_per_post(), 200);
        assert_eq!(cfg.resolve_stability_rounds(), 4);
        assert_eq!(cfg.navigation_timeout(), Duration::from_millis(30_000));
        assert_eq!(cfg.scroll_settle(800), Duration::from_millis(800));
        assert_eq!(cfg.resolve_worksheet_name(), "likers");
    }

    #[test]
    fn test_settle_override_applies_to_both_surfaces() {
        let cfg = ScoutConfig {
            scroll_settle_ms: Some(1234),
            ..Default::default()
        };
        assert_eq!(cfg.scroll_settle(800), Duration::from_millis(1234));
        assert_eq!(cfg.scroll_settle(1000), Duration::from_millis(1234));
    }

    #[test]
    fn test_missing_target_handle_is_a_config_error() {
        let cfg = ScoutConfig::default();
        assert!(matches!(
            cfg.resolve_target_handle(),
            Err(crate::core::error::ScoutError::Config(_))
        ));
    }

    #[test]
    fn test_query_falls_back_to_handle() {
        let cfg = ScoutConfig {
            target_handle: Some("natgeo".into()),
            ..Default::default()
        };
        assert_eq!(cfg.resolve_target_query().unwrap(), "natgeo");
    }

    #[test]
    fn test_partial_json_deserializes() {
        let cfg: ScoutConfig =
            serde_json::from_str(r#"{"target_handle": "natgeo", "num_posts": 3}"#).unwrap();
        assert_eq!(cfg.resolve_target_handle().unwrap(), "natgeo");
        assert_eq!(cfg.resolve_num_posts(), 3);
        assert_eq!(cfg.resolve_max_likes_per_post(), 200);
    }
}
