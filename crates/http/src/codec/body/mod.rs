//! Response body encoders.
//!
//! - [`ChunkedEncoder`](chunked_encoder::ChunkedEncoder): chunked transfer encoding, empty chunks skipped
//! - [`LengthEncoder`](length_encoder::LengthEncoder): exact `Content-Length` bodies
//! - [`PayloadEncoder`]: picks one of the above from a `PayloadSize`

mod chunked_encoder;
mod length_encoder;
mod payload_encoder;

pub use payload_encoder::PayloadEncoder;
