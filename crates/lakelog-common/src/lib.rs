//! Lakelog Common - Shared types and utilities
//!
//! This crate provides the error type, configuration structures and the
//! table collaborator types shared by the metadata store, the coordinated
//! commits core and the server binary.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
