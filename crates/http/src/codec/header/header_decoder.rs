//! HTTP header decoder implementation for parsing HTTP request headers
//!
//! This module decodes the request line and header fields from raw bytes into
//! a [`RequestHeader`], then works out how many body bytes follow.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Header section plus declared body must fit in the configured byte limit
//! - Only HTTP/1.0 and HTTP/1.1 are accepted
//! - Only the standard methods are accepted
//! - Request bodies must be framed by `Content-Length`
//!
//! # Implementation Details
//!
//! The decoder works in multiple stages:
//!
//! 1. Parse raw bytes using `httparse`
//! 2. Record header name/value byte ranges
//! 3. Convert to typed `http::Request` structure
//! 4. Work out the body size from `Content-Length`
//!
//! The implementation records the byte ranges of header names and values so
//! header values can share the frozen header buffer instead of being copied.

use std::mem::MaybeUninit;

use bytes::BytesMut;
use http::{HeaderName, HeaderValue, Method, Request};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;

use crate::protocol::{ParseError, PayloadSize, RequestHeader};

/// Maximum number of headers allowed in a request
const MAX_HEADER_NUM: usize = 64;

/// Default byte limit for header section plus body
pub const DEFAULT_REQUEST_LIMIT: usize = 8 * 1024;

/// Decoder for HTTP request headers implementing the [`Decoder`] trait.
///
/// This decoder parses raw bytes into a structured [`RequestHeader`] and reads
/// the body size from the `Content-Length` header.
#[derive(Debug, Clone, Copy)]
pub struct HeaderDecoder {
    limit: usize,
}

impl HeaderDecoder {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for HeaderDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_LIMIT)
    }
}

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    /// Attempts to decode HTTP headers from the provided bytes buffer.
    ///
    /// # Returns
    ///
    /// - `Ok(Some((header, payload_size)))` if a complete header was successfully parsed
    /// - `Ok(None)` if more data is needed
    /// - `Err(ParseError)` if parsing failed
    ///
    /// # Errors
    ///
    /// - `MalformedRequest` for unparsable request lines, headers or `Content-Length`
    /// - `UnsupportedProtocol` for other HTTP versions, unknown methods or `Transfer-Encoding`
    /// - `RequestTooLarge` if the header section or the declared body exceed the limit
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Minimum valid HTTP request needs at least "GET / HTTP/1.1\r\n\r\n"
        if src.len() < 14 {
            return Ok(None);
        }

        let limit = self.limit as u64;

        let mut req = httparse::Request::new(&mut []);
        let mut headers = [const { MaybeUninit::<httparse::Header>::uninit() }; MAX_HEADER_NUM];

        let parsed_result = req.parse_with_uninit_headers(src, &mut headers).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::malformed(format!("header number exceed the limit {MAX_HEADER_NUM}")),
            Error::Version => ParseError::unsupported("http version"),
            e => ParseError::malformed(e),
        });

        match parsed_result? {
            Status::Complete(body_offset) => {
                trace!(header_size = body_offset, "parsed header section");
                ensure!(body_offset <= self.limit, ParseError::too_large(body_offset as u64, limit));

                let header_count = req.headers.len();

                let mut header_index: [HeaderIndex; MAX_HEADER_NUM] = EMPTY_HEADER_INDEX_ARRAY;
                HeaderIndex::record(src, req.headers, &mut header_index);

                let version = match req.version {
                    Some(0) => http::Version::HTTP_10,
                    Some(1) => http::Version::HTTP_11,
                    v => return Err(ParseError::unsupported(format!("http version {v:?}"))),
                };

                let method = parse_method(req.method.ok_or_else(|| ParseError::malformed("missing method"))?)?;
                let path = req.path.ok_or_else(|| ParseError::malformed("missing request target"))?;

                let mut header_builder = Request::builder().method(method).uri(path).version(version);

                let Some(headers) = header_builder.headers_mut() else {
                    return Err(ParseError::malformed(format!("invalid request target {path}")));
                };
                headers.reserve(header_count);

                let header_bytes = src.split_to(body_offset).freeze();
                for index in &header_index[..header_count] {
                    let name = HeaderName::from_bytes(&header_bytes[index.name.0..index.name.1]).map_err(ParseError::malformed)?;

                    // SAFETY: httparse only accepts visible ASCII, tabs, spaces and obs-text in
                    // header values, which is exactly what `HeaderValue` allows.
                    let value = unsafe { HeaderValue::from_maybe_shared_unchecked(header_bytes.slice(index.value.0..index.value.1)) };

                    headers.append(name, value);
                }

                let header = RequestHeader::from(header_builder.body(()).map_err(ParseError::malformed)?);
                let payload_size = parse_payload(&header)?;

                let total = body_offset as u64 + payload_size.length();
                ensure!(total <= limit, ParseError::too_large(total, limit));

                Ok(Some((header, payload_size)))
            }
            Status::Partial => {
                ensure!(src.len() <= self.limit, ParseError::too_large(src.len() as u64, limit));
                Ok(None)
            }
        }
    }
}

/// Stores the byte range positions of a header's name and value within the original buffer.
#[derive(Clone, Copy)]
struct HeaderIndex {
    /// Start and end byte positions of the header name
    pub(crate) name: (usize, usize),
    /// Start and end byte positions of the header value
    pub(crate) value: (usize, usize),
}

const EMPTY_HEADER_INDEX: HeaderIndex = HeaderIndex { name: (0, 0), value: (0, 0) };

const EMPTY_HEADER_INDEX_ARRAY: [HeaderIndex; MAX_HEADER_NUM] = [EMPTY_HEADER_INDEX; MAX_HEADER_NUM];

impl HeaderIndex {
    /// Records the byte positions of header names and values from the parsed headers.
    fn record(bytes: &[u8], headers: &[httparse::Header<'_>], indices: &mut [HeaderIndex]) {
        let bytes_ptr = bytes.as_ptr() as usize;
        for (header, indices) in headers.iter().zip(indices.iter_mut()) {
            let name_start = header.name.as_ptr() as usize - bytes_ptr;
            let name_end = name_start + header.name.len();
            indices.name = (name_start, name_end);
            let value_start = header.value.as_ptr() as usize - bytes_ptr;
            let value_end = value_start + header.value.len();
            indices.value = (value_start, value_end);
        }
    }
}

/// Normalizes the method token to uppercase and rejects anything outside the standard set.
fn parse_method(method: &str) -> Result<Method, ParseError> {
    let method = match method.to_ascii_uppercase().as_str() {
        "GET" => Method::GET,
        "HEAD" => Method::HEAD,
        "POST" => Method::POST,
        "PUT" => Method::PUT,
        "DELETE" => Method::DELETE,
        "CONNECT" => Method::CONNECT,
        "OPTIONS" => Method::OPTIONS,
        "TRACE" => Method::TRACE,
        "PATCH" => Method::PATCH,
        other => return Err(ParseError::unsupported(format!("http method {other}"))),
    };
    Ok(method)
}

/// Determines the body size from the request headers.
///
/// Only `Content-Length` framing is supported; a request carrying
/// `Transfer-Encoding` is rejected as unsupported.
fn parse_payload(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    let te_header = header.headers().get(http::header::TRANSFER_ENCODING);
    let mut cl_headers = header.headers().get_all(http::header::CONTENT_LENGTH).iter();

    match (te_header, cl_headers.next()) {
        (None, None) => Ok(PayloadSize::Empty),

        (Some(_), None) => Err(ParseError::unsupported("transfer-encoding request body")),

        (None, Some(cl_value)) => {
            if cl_headers.any(|other| other != cl_value) {
                return Err(ParseError::malformed("conflicting content-length headers"));
            }

            let cl_str = cl_value.to_str().map_err(|e| ParseError::malformed(format!("content-length: {e}")))?;

            let length =
                cl_str.trim().parse::<u64>().map_err(|e| ParseError::malformed(format!("content-length {cl_str}: {e}")))?;

            if length == 0 { Ok(PayloadSize::Empty) } else { Ok(PayloadSize::Length(length)) }
        }

        (Some(_), Some(_)) => Err(ParseError::malformed("transfer_encoding and content_length both present in headers")),
    }
}
