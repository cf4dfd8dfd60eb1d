//! # Street Gender Common Library
//!
//! Shared code for the street gender workspace including:
//! - The closed `Gender` label and its data-boundary codes
//! - Error types
//! - Configuration loading and resolution

pub mod config;
pub mod error;
pub mod gender;

pub use error::{Error, Result};
pub use gender::Gender;
