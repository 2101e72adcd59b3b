//! Surveyor shared protocol types.
//!
//! Everything a front end needs to talk to the core without depending on the
//! storage layer: the stable error code set, the error payload shape, the
//! system configuration and its defaults.

pub mod config;
pub mod defaults;
pub mod http_types;
pub mod paths;

pub use config::SystemConfig;
pub use http_types::{ErrorBody, ErrorCode};
