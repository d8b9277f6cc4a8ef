//! # wfpt-core
//!
//! Core types and error handling for wfpt.
//!
//! This crate provides:
//! - Common error types
//! - Trial-level data types (response coding, diffusion parameters)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Response, WienerParams};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
