//! Render stored UI-test snapshots of chat messages into PNG previews.
//!
//! Fixtures are discovered under an input root, every snapshot entry is parsed
//! and normalized into a message group, and each group is rendered through a
//! browser session and written to `{out}/{category}/{snapshot name}.png`.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod internal;
pub mod utils;

pub use app::{RunSummary, run};
pub use config::{AppConfig, CliOverrides, Settings};
pub use error::{Error, Result};
