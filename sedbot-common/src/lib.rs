//! Sedbot Common - Shared configuration, logging and error types for sedbot.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup
//! - Small string helpers used in log output

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{Config, ObservabilityConfig, SedConfig};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};

