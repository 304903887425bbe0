//! The per-request flow context.
//!
//! A [`Flow`] is created for every request and handed to each matched hook in
//! turn. It carries the [`Request`] in, and the response out: status, reason,
//! outgoing headers (`tail`), cookies and the [`Output`] payload. Setting the
//! output more than once overwrites it; the last value set is sent.
//!
//! The `send_*` methods only replace the output. A status or reason set
//! earlier in the chain stays: after the built-in 404, a `send_json` from an
//! after hook is still answered 404 unless the hook calls
//! [`Flow::set_status`] too. [`Flow::send_file_with`] sets all three at once.

use crate::request::Request;
use bytes::Bytes;
use futures::Stream;
use futures::stream::LocalBoxStream;
use http::header::{CACHE_CONTROL, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::PathBuf;

const TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
const TEXT_HTML: HeaderValue = HeaderValue::from_static("text/html; charset=utf-8");
const APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");
const APPLICATION_FORM: HeaderValue = HeaderValue::from_static("application/x-www-form-urlencoded");
const NO_STORE: HeaderValue = HeaderValue::from_static("no-store");

/// Characters left as-is in cookie names and values.
const COOKIE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~').remove(b'/');

const EXPIRED: &str = "; Expires=Thu, 01 Jan 1970 00:00:01 GMT; Max-Age=0";

/// Pipeline position of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parsed,
    BeforeHooks,
    MainHandler,
    AfterHooks,
    Responding,
}

/// What will be sent as the response body.
pub enum Output {
    /// Nothing yet: answered with the explicit status, or 404.
    Unset,
    File(PathBuf),
    Bytes(Bytes),
    Json(serde_json::Value),
    Redirect(String),
    /// Sent with chunked transfer encoding as chunks are produced.
    Stream(LocalBoxStream<'static, io::Result<Bytes>>),
}

impl Output {
    pub fn is_unset(&self) -> bool {
        matches!(self, Output::Unset)
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Unset => f.write_str("Unset"),
            Output::File(path) => f.debug_tuple("File").field(path).finish(),
            Output::Bytes(bytes) => f.debug_tuple("Bytes").field(bytes).finish(),
            Output::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Output::Redirect(location) => f.debug_tuple("Redirect").field(location).finish(),
            Output::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for Output {
    fn from(bytes: Bytes) -> Self {
        Output::Bytes(bytes)
    }
}

impl From<String> for Output {
    fn from(value: String) -> Self {
        Output::Bytes(Bytes::from(value))
    }
}

impl From<&'static str> for Output {
    fn from(value: &'static str) -> Self {
        Output::Bytes(Bytes::from_static(value.as_bytes()))
    }
}

impl From<Vec<u8>> for Output {
    fn from(value: Vec<u8>) -> Self {
        Output::Bytes(Bytes::from(value))
    }
}

/// Attributes of a `Set-Cookie` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: Option<String>,
    pub domain: Option<String>,
    pub expires: Option<String>,
    pub max_age: Option<u64>,
    pub secure: bool,
    pub http_only: bool,
    pub partitioned: bool,
}

/// Scratch values passed between the hooks of one flow.
#[derive(Default)]
pub struct Vars {
    inner: HashMap<String, Box<dyn Any>>,
}

impl Vars {
    /// Stores `value`, returning the previous value under `key` if any.
    pub fn insert<T: Any>(&mut self, key: impl Into<String>, value: T) -> Option<Box<dyn Any>> {
        self.inner.insert(key.into(), Box::new(value))
    }

    /// The value under `key`, if it is a `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.inner.get(key).and_then(|value| value.downcast_ref())
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.inner.get_mut(key).and_then(|value| value.downcast_mut())
    }

    pub fn remove(&mut self, key: &str) -> Option<Box<dyn Any>> {
        self.inner.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for Vars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.inner.keys()).finish()
    }
}

/// Per-request context threaded through the hook chain.
#[derive(Debug)]
pub struct Flow {
    request: Request,
    /// Scratch values shared by the hooks of this flow.
    pub var: Vars,
    /// Outgoing response headers.
    pub tail: HeaderMap,
    status: Option<StatusCode>,
    reason: Option<Cow<'static, str>>,
    output: Output,
    set_cookies: Vec<(String, String)>,
    wildcard: Option<String>,
    stage: Stage,
}

impl Flow {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            var: Vars::default(),
            tail: HeaderMap::new(),
            status: None,
            reason: None,
            output: Output::Unset,
            set_cookies: vec![],
            wildcard: None,
            stage: Stage::Parsed,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Percent-decoded path without the leading `/`.
    pub fn path(&self) -> &str {
        self.request.path()
    }

    /// Rewrites the path; takes effect for main and after hook matching.
    pub fn set_path(&mut self, path: impl Into<String>) {
        self.request.set_path(path.into());
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn head(&self) -> &HeaderMap {
        self.request.headers()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    pub fn query(&self) -> &HashMap<String, String> {
        self.request.query()
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.request.query().get(name).map(String::as_str)
    }

    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    pub fn recv_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(self.request.body())
    }

    /// Parses an `application/x-www-form-urlencoded` body, e.g. into `Vec<(String, String)>`.
    pub fn recv_form<T: DeserializeOwned>(&self) -> Result<T, serde_urlencoded::de::Error> {
        serde_urlencoded::from_bytes(self.request.body())
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.request.cookies().get(name).map(String::as_str)
    }

    /// Sets a cookie, replacing any cookie of the same name set earlier in this flow.
    pub fn set_cookie(&mut self, name: &str, value: &str, max_age: Option<u64>) {
        self.set_cookie_with(name, value, &CookieOptions { max_age, ..CookieOptions::default() });
    }

    pub fn set_cookie_with(&mut self, name: &str, value: &str, options: &CookieOptions) {
        let mut cookie = utf8_percent_encode(value, COOKIE_ENCODE_SET).to_string();
        if let Some(path) = &options.path {
            cookie.push_str("; Path=");
            cookie.push_str(path);
        }
        if let Some(domain) = &options.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        if let Some(expires) = &options.expires {
            cookie.push_str("; Expires=");
            cookie.push_str(expires);
        }
        if let Some(max_age) = options.max_age {
            cookie.push_str(&format!("; Max-Age={max_age}"));
        }
        if options.secure {
            cookie.push_str("; Secure");
        }
        if options.http_only {
            cookie.push_str("; HttpOnly");
        }
        if options.partitioned {
            cookie.push_str("; Partitioned");
        }
        self.push_cookie(name, cookie);
    }

    /// Tells the client to drop the cookie.
    pub fn del_cookie(&mut self, name: &str) {
        self.push_cookie(name, EXPIRED.to_string());
    }

    fn push_cookie(&mut self, name: &str, value: String) {
        let name = utf8_percent_encode(name, COOKIE_ENCODE_SET).to_string();
        self.set_cookies.retain(|(n, _)| *n != name);
        self.set_cookies.push((name, value));
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = Some(status);
        self
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn set_reason(&mut self, reason: impl Into<Cow<'static, str>>) -> &mut Self {
        self.reason = Some(reason.into());
        self
    }

    /// Adds `Cache-Control: public, max-age=<seconds>`.
    pub fn set_max_age(&mut self, seconds: u64) -> &mut Self {
        if let Ok(value) = HeaderValue::try_from(format!("public, max-age={seconds}")) {
            self.tail.insert(CACHE_CONTROL, value);
        }
        self
    }

    pub fn send(&mut self, output: impl Into<Output>) {
        self.output = output.into();
    }

    pub fn send_bytes(&mut self, bytes: impl Into<Bytes>) {
        self.output = Output::Bytes(bytes.into());
    }

    pub fn send_text(&mut self, text: impl Into<String>) {
        self.tail.insert(CONTENT_TYPE, TEXT_PLAIN);
        self.output = Output::from(text.into());
    }

    pub fn send_html(&mut self, html: impl Into<String>) {
        self.tail.insert(CONTENT_TYPE, TEXT_HTML);
        self.output = Output::from(html.into());
    }

    /// Sends `value` as JSON; `Cache-Control: no-store` unless a cache policy is already set.
    pub fn send_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.tail.insert(CONTENT_TYPE, APPLICATION_JSON);
        if !self.tail.contains_key(CACHE_CONTROL) {
            self.tail.insert(CACHE_CONTROL, NO_STORE);
        }
        self.output = Output::Json(value);
        Ok(())
    }

    /// Sends `value` as an `application/x-www-form-urlencoded` body.
    pub fn send_form<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_urlencoded::ser::Error> {
        let form = serde_urlencoded::to_string(value)?;
        self.tail.insert(CONTENT_TYPE, APPLICATION_FORM);
        if !self.tail.contains_key(CACHE_CONTROL) {
            self.tail.insert(CACHE_CONTROL, NO_STORE);
        }
        self.output = Output::from(form);
        Ok(())
    }

    /// Sends a file; it is opened when the response is written.
    ///
    /// Keeps any status and reason set before.
    pub fn send_file(&mut self, path: impl Into<PathBuf>) {
        self.output = Output::File(path.into());
    }

    /// Sends a file under `status`; `reason` replaces any custom reason set
    /// before, `None` falls back to the canonical one.
    pub fn send_file_with(&mut self, path: impl Into<PathBuf>, status: StatusCode, reason: Option<Cow<'static, str>>) {
        self.status = Some(status);
        self.reason = reason;
        self.send_file(path);
    }

    pub fn send_redirect(&mut self, location: impl Into<String>) {
        self.output = Output::Redirect(location.into());
    }

    /// Streams the body chunk by chunk, as the stream produces them.
    pub fn send_stream<S>(&mut self, stream: S)
    where
        S: Stream<Item = io::Result<Bytes>> + 'static,
    {
        self.output = Output::Stream(Box::pin(stream));
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    /// The wildcard tail captured by the route currently running.
    pub fn wildcard(&self) -> Option<&str> {
        self.wildcard.as_deref()
    }

    pub(crate) fn set_wildcard(&mut self, wildcard: Option<String>) {
        self.wildcard = wildcard;
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    pub(crate) fn into_parts(self) -> FlowParts {
        FlowParts {
            status: self.status,
            reason: self.reason,
            tail: self.tail,
            output: self.output,
            set_cookies: self.set_cookies,
        }
    }
}

/// What the response writer needs from a finished flow.
pub(crate) struct FlowParts {
    pub(crate) status: Option<StatusCode>,
    pub(crate) reason: Option<Cow<'static, str>>,
    pub(crate) tail: HeaderMap,
    pub(crate) output: Output,
    pub(crate) set_cookies: Vec<(String, String)>,
}
