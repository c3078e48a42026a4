//! Error Types
//!
//! This module defines the error types used throughout the shading core.
//!
//! # Overview
//!
//! The main error type [`MythError`] only covers *misconfiguration*:
//! - Materials constructed without a capability configuration
//! - Materials referencing a shader the library has never heard of
//! - Shader templates that fail to parse or render
//!
//! Transient conditions (a texture still loading, a program still compiling)
//! are never errors. They surface as a `false` readiness answer and are retried
//! on the next frame. Driver compile failures are effect states reported
//! through the material's `on_error` hook.
//!
//! # Usage
//!
//! ```rust,ignore
//! use myth_shading::errors::{MythError, Result};
//!
//! fn build() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the shading core.
#[derive(Error, Debug)]
pub enum MythError {
    // ========================================================================
    // Construction Errors
    // ========================================================================
    /// A material was built without a render capability configuration.
    #[error("Material `{0}` was built without a render capability configuration")]
    MissingCapabilities(String),

    /// A material references a shader that was never registered.
    #[error("Unknown shader: {0}")]
    UnknownShader(String),

    // ========================================================================
    // Shader Source Errors
    // ========================================================================
    /// Template syntax configuration, parsing or rendering failed.
    #[error("Shader template error: {0}")]
    ShaderTemplate(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Settings could not be decoded.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

// ============================================================================
// Convenient conversion implementations
// ============================================================================

impl From<minijinja::Error> for MythError {
    fn from(err: minijinja::Error) -> Self {
        MythError::ShaderTemplate(err.to_string())
    }
}

/// Alias for `Result<T, MythError>`.
pub type Result<T> = std::result::Result<T, MythError>;
