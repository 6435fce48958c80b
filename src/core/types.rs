use serde::{Deserialize, Serialize};

/// A post discovered on the profile grid. Uniqueness is enforced by absolute
/// URL equality at discovery time; consumed once per pipeline pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostReference {
    pub url: String,
}

impl PostReference {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// One appended spreadsheet row: produced once per (post, username) pair.
///
/// Serialized on the wire as a positional array
/// `[timestamp_utc, account_handle, post_url, username]` — see `sink`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRow {
    pub timestamp_utc: String,
    pub account_handle: String,
    pub post_url: String,
    pub username: String,
}

impl OutputRow {
    /// Positional array form expected by the Apps Script web app.
    pub fn as_cells(&self) -> [&str; 4] {
        [
            &self.timestamp_utc,
            &self.account_handle,
            &self.post_url,
            &self.username,
        ]
    }
}

/// Final run accounting reported to the user.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub posts_processed: usize,
    pub posts_skipped: usize,
    pub rows_appended: u64,
}
