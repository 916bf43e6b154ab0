//! Error handling utilities
//!
//! This module provides utilities for error handling and context management
//! across the flowforge workspace.
//!
//! - `ErrorContext` trait for adding contextual information to errors
//! - Error chain formatting and analysis
//! - Root cause extraction

mod context;

pub use context::{error_chain_length, format_error_chain, root_cause, ErrorContext};
