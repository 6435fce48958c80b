pub mod manager;
pub mod probe;
pub mod session;

pub use manager::{wait_until_stable, BrowserSession};
pub use probe::{Locator, ProbeAction, Prober};
