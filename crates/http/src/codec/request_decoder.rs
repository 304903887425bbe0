//! HTTP request decoder module
//!
//! Decodes one whole request at a time: the header section first, then the
//! `Content-Length` body once every byte of it has been buffered.
//!
//! # Example
//!
//! ```
//! use wisp_http::codec::RequestDecoder;
//! use tokio_util::codec::Decoder;
//! use bytes::BytesMut;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from("POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhel");
//! assert!(decoder.decode(&mut buffer).unwrap().is_none());
//!
//! buffer.extend_from_slice(b"lo");
//! let request = decoder.decode(&mut buffer).unwrap().unwrap();
//! assert_eq!(request.body().as_ref(), b"hello");
//! ```

use crate::codec::header::HeaderDecoder;
use crate::protocol::{ParseError, PayloadSize, RequestHeader};
use bytes::{Bytes, BytesMut};
use http::Request;
use tokio_util::codec::Decoder;
use tracing::trace;

/// A decoder for HTTP requests that yields a request together with its body.
///
/// # State Machine
///
/// The decoder keeps its state in the `pending` field:
/// - `None`: currently parsing headers
/// - `Some(_)`: header parsed, waiting for the rest of the body
#[derive(Debug, Default)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    pending: Option<(RequestHeader, u64)>,
}

impl RequestDecoder {
    /// Creates a decoder with the default byte limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder that rejects requests whose header section plus body exceed `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self { header_decoder: HeaderDecoder::new(limit), pending: None }
    }

    pub fn limit(&self) -> usize {
        self.header_decoder.limit()
    }
}

impl Decoder for RequestDecoder {
    type Item = Request<Bytes>;
    type Error = ParseError;

    /// Attempts to decode an HTTP request from the provided buffer
    ///
    /// # Returns
    ///
    /// - `Ok(Some(request))`: a complete request, body included
    /// - `Ok(None)`: need more data to proceed
    /// - `Err(_)`: encountered a parsing error
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.pending.is_none() {
            let Some((header, payload_size)) = self.header_decoder.decode(src)? else {
                return Ok(None);
            };

            if let PayloadSize::Empty = payload_size {
                return Ok(Some(header.body(Bytes::new())));
            }

            src.reserve(usize::try_from(payload_size.length()).unwrap_or(0).saturating_sub(src.len()));
            self.pending = Some((header, payload_size.length()));
        }

        let Some((_, length)) = &self.pending else {
            return Ok(None);
        };

        if (src.len() as u64) < *length {
            trace!(received = src.len(), expected = length, "waiting for request body");
            return Ok(None);
        }

        let Some((header, length)) = self.pending.take() else {
            return Ok(None);
        };

        // length fits in usize: it is no larger than the buffered bytes
        let body = src.split_to(length as usize).freeze();
        Ok(Some(header.body(body)))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(request) => Ok(Some(request)),
            None if buf.is_empty() && self.pending.is_none() => Ok(None),
            None => Err(ParseError::io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before the request was complete",
            ))),
        }
    }
}
