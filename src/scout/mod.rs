//! The harvesting engine: navigation, extraction, and orchestration.

pub mod account;
pub mod discovery;
pub mod extract;
pub mod nav;
pub mod pipeline;
pub mod readers;
pub mod shortcode;

pub use extract::{extract, ExtractOptions, SurfaceReader};
pub use nav::{reach_destination, NavOutcome, NavStrategy, NavigationDestination, Surface};
pub use pipeline::Pipeline;
pub use shortcode::extract_shortcode;

/// Post-scroll settle defaults per surface, in ms. The dialog tends to render
/// faster than the full page; both defer to the `scroll_settle_ms` config
/// override.
pub const SETTLE_DIALOG_MS: u64 = 800;
pub const SETTLE_PAGE_MS: u64 = 1_000;
