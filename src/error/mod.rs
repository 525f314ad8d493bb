//! Error handling built on `thiserror`.
//!
//! This module provides both domain-specific error types returned across the
//! adapter boundary and operational reporting of recoverable failures.

pub mod domain;
pub mod operational;

pub use {
    domain::{AdapterError, ArtworkError, BridgeError, LocatorError, Result},
    operational::{ErrorReporter, ResultExt},
};
