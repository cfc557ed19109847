//! blocksim Common - Shared types and utilities
//!
//! This crate provides the types, error definitions and configuration
//! shared by the storage, scheduling and dispatch crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::SimConfig;
pub use error::{Error, Result};
pub use types::*;
