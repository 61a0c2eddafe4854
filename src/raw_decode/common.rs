//! Shared utilities for the decoding engine.

pub mod error;

pub use error::{DecodeError, ErrorKind, Result};
