//! # limiquantix Common
//!
//! Shared utilities for the limiquantix storage components.
//!
//! ## Logging
//!
//! ```rust
//! use limiquantix_common::try_init_logging;
//!
//! // Safe to call more than once, later calls are no-ops
//! try_init_logging("info");
//! tracing::info!(pool = "default", "Storage pool installed");
//! ```

pub mod logging;

pub use logging::{init_logging, init_logging_json, try_init_logging};
