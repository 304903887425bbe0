use http::StatusCode;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

/// Errors raised while reading a request off the wire.
///
/// None of these can be recovered by a handler: no request exists yet, so the
/// connection is always closed after the error is reported.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The request line or header section can't be parsed.
    #[error("malformed request: {reason}")]
    MalformedRequest { reason: String },

    /// The request is well formed but uses a method, version or framing we don't serve.
    #[error("unsupported protocol: {reason}")]
    UnsupportedProtocol { reason: String },

    /// Header section plus declared body exceed the configured limit.
    #[error("request too large, current: {current_size} exceed the limit {max_size}")]
    RequestTooLarge { current_size: u64, max_size: u64 },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn malformed<S: ToString>(str: S) -> Self {
        Self::MalformedRequest { reason: str.to_string() }
    }

    pub fn unsupported<S: ToString>(str: S) -> Self {
        Self::UnsupportedProtocol { reason: str.to_string() }
    }

    pub fn too_large(current_size: u64, max_size: u64) -> Self {
        Self::RequestTooLarge { current_size, max_size }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// The status to answer with before closing, if the error deserves a response at all.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            ParseError::UnsupportedProtocol { .. } => Some(StatusCode::NOT_IMPLEMENTED),
            ParseError::RequestTooLarge { .. } => Some(StatusCode::PAYLOAD_TOO_LARGE),
            ParseError::MalformedRequest { .. } | ParseError::Io { .. } => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
