//! Error Types
//!
//! This module defines the host-facing error types of the crate.
//!
//! # Overview
//!
//! Two channels exist and are never mixed:
//! - [`WebGlError`] covers failures the *host* must handle: context creation,
//!   settings parsing and native restore failures.
//! - Latched GL errors (see [`crate::context::GlError`]) cover malformed API
//!   calls. They are recorded on the context and consumed with `get_error`,
//!   exactly like a GL driver would.
//!
//! # Usage
//!
//! ```rust,ignore
//! use webgl_core::errors::{WebGlError, Result};
//!
//! fn make_context() -> Result<()> {
//!     // Context creation returns Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main host-facing error type.
#[derive(Error, Debug)]
pub enum WebGlError {
    // ========================================================================
    // Context Creation
    // ========================================================================
    /// The requested drawing buffer size cannot be represented.
    #[error("Invalid drawing buffer size: {width}x{height}")]
    InvalidSize {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// The native driver could not provide a usable context.
    #[error("Failed to create native context: {0}")]
    NativeContextCreation(String),

    /// The native driver does not expose the requested API version.
    #[error("Unsupported context version: {0}")]
    UnsupportedVersion(String),

    // ========================================================================
    // Context Loss
    // ========================================================================
    /// The native context could not be recreated.
    #[error("Failed to restore context: {0}")]
    RestoreFailed(String),

    // ========================================================================
    // Configuration
    // ========================================================================
    /// Settings could not be parsed.
    #[error("Settings parse error: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Alias for `Result<T, WebGlError>`.
pub type Result<T> = std::result::Result<T, WebGlError>;
