//! Shared configuration, error and domain types for the Eureka incident desk.

pub mod config;
pub mod error;
pub mod types;

pub use config::EurekaConfig;
pub use error::{EurekaError, Result};
pub use types::*;
