//! HTTP codec module for encoding and decoding HTTP messages
//!
//! Both directions are `tokio_util` codecs, meant to be driven by
//! `FramedRead` / `FramedWrite`.
//!
//! - Request handling:
//!   - [`RequestDecoder`]: decodes a complete request, `Content-Length` body included
//!   - [`HeaderDecoder`]: the request line and header part, with the byte limit
//!
//! - Response handling:
//!   - [`ResponseEncoder`]: encodes a response head followed by its payload
//!   - Payload framing is either `Content-Length` or chunked
//!
//! # Example
//!
//! ```
//! use bytes::{Bytes, BytesMut};
//! use http::Response;
//! use tokio_util::codec::Encoder;
//! use wisp_http::codec::ResponseEncoder;
//! use wisp_http::protocol::{Message, PayloadItem, PayloadSize, ResponseHead};
//!
//! let mut encoder = ResponseEncoder::new();
//! let mut buffer = BytesMut::new();
//!
//! let head = Response::builder().status(200).body(()).unwrap();
//! encoder.encode(Message::<_, Bytes>::Header((head, PayloadSize::Length(2))), &mut buffer).unwrap();
//! encoder.encode(Message::<(ResponseHead, PayloadSize)>::from(Bytes::from_static(b"ok")), &mut buffer).unwrap();
//! encoder.encode(Message::<(ResponseHead, PayloadSize), Bytes>::Payload(PayloadItem::Eof), &mut buffer).unwrap();
//!
//! assert!(buffer.ends_with(b"\r\n\r\nok"));
//! ```

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use header::{DEFAULT_REQUEST_LIMIT, HeaderDecoder};
pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
