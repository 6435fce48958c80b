pub mod browser;
pub mod core;
pub mod scout;
pub mod sink;

// --- Primary exports ---
pub use core::config::{load_scout_config, ScoutConfig};
pub use core::error::{ScoutError, ScoutResult};
pub use core::types::{OutputRow, PostReference, RunSummary};
pub use scout::Pipeline;
pub use sink::{RowSink, SheetsSink};
