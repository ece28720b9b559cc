//! reel-core: transport-agnostic errors and configuration for ReelRS.

pub mod config;
pub mod errors;

pub use config::{ReelConfig, ReelConfigSnapshot};
pub use errors::{ErrorKind, ReelError};
