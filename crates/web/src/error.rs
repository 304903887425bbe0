//! Error types of the web layer.

use crate::router::HookKind;
use std::error::Error;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error type returned by flow handlers; any error converts into it with `?`.
pub type HandlerError = Box<dyn Error + Send + Sync>;

/// Result type returned by flow handlers.
pub type HandlerResult = Result<(), HandlerError>;

/// Failures while running the hook chain or producing the response.
///
/// None of them stops the chain: they are logged and, when nothing else
/// produced output, turned into a 404 or 500 response.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("{hook:?} hook '{pattern}' failed: {source}")]
    HandlerFailure { hook: HookKind, pattern: String, source: HandlerError },

    #[error("{hook:?} hook '{pattern}' panicked: {message}")]
    HandlerPanic { hook: HookKind, pattern: String, message: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl FlowError {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }
}

/// Errors raised while building or starting a server.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("router must be set")]
    MissingRouter,

    #[error("invalid address {address}")]
    InvalidAddress { address: String },

    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error("can't bind {address}: {source}")]
    Bind { address: String, source: io::Error },
}
