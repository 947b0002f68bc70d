//! Error types for the snapprompt-core library.
//!
//! This module provides granular error variants for the failure modes of the
//! capture → dispatch → response pipeline. None of them is fatal: the
//! orchestrator recovers every one of them at its event boundary.

use thiserror::Error;

/// Errors that can occur within the snapprompt-core library.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (missing keys, invalid values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Interactive or immediate screen capture failed.
    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),

    /// Requested screen/monitor index was not found.
    #[error("Screen not found: index {0}")]
    ScreenNotFound(usize),

    /// Image processing or encoding failed.
    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    /// The selection area is empty or has zero dimensions.
    #[error("Selection area is empty or invalid")]
    EmptySelection,

    /// Settings name a provider that is not known or not configured.
    #[error("Unknown AI provider: {0}")]
    UnknownProvider(String),

    /// Network, auth or quota failure reported by a provider adapter.
    #[error("{provider} request failed: {message}")]
    ProviderRequest { provider: String, message: String },

    /// Rate limited by the provider API.
    #[error("Rate limited by {0}, please retry later")]
    RateLimited(String),

    /// A capture or dispatch was requested while another one is active.
    #[error("Request rejected: a capture is already {0}")]
    ConcurrentRequestRejected(&'static str),

    /// A single hotkey binding could not be registered.
    #[error("Failed to register hotkey '{0}'")]
    HotkeyRegistration(String),

    /// Clipboard access failed.
    #[error("Clipboard error: {0}")]
    Clipboard(String),

    /// UI-related errors (window creation, event loop).
    #[error("UI error: {0}")]
    Ui(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a screen capture error with the given message.
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::CaptureFailed(msg.into())
    }

    /// Creates an image processing error with the given message.
    pub fn image(msg: impl Into<String>) -> Self {
        Self::ImageProcessing(msg.into())
    }

    /// Creates a provider request error for the named backend.
    pub fn provider(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ProviderRequest {
            provider: provider.into(),
            message: msg.into(),
        }
    }

    /// Creates a UI error with the given message.
    pub fn ui(msg: impl Into<String>) -> Self {
        Self::Ui(msg.into())
    }
}

/// A convenient alias for Result with [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
