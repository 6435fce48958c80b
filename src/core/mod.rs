pub mod config;
pub mod error;
pub mod types;

pub use config::{load_scout_config, ScoutConfig};
pub use error::{ScoutError, ScoutResult};
