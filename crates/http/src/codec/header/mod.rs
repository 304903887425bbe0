//! HTTP header processing module for encoding and decoding headers
//!
//! # Components
//!
//! - [`HeaderDecoder`]: Decodes the request line and header fields from raw bytes
//!   and enforces the request byte limit
//! - [`HeaderEncoder`]: Writes the status line and header fields of a response,
//!   including the framing header

mod header_decoder;
mod header_encoder;

pub use header_decoder::DEFAULT_REQUEST_LIMIT;
pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
pub(crate) use header_encoder::FastWrite;
