//! Application configuration
//!
//! Settings shared by the scan core and the command-line front end.

mod config;

pub use config::{CaptureConfig, Config, PatternConfig, ScanConfig};
