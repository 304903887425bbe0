//! HTTP response header handling implementation.
//!
//! A response head is a `http::Response<()>`: the body is streamed separately
//! through the encoder. A custom reason phrase travels in the response
//! extensions as a [`ReasonPhrase`].

use http::Response;
use std::borrow::Cow;

/// Type alias for HTTP response headers.
pub type ResponseHead = Response<()>;

/// Reason phrase written on the status line instead of the canonical one.
///
/// Insert it into `Response::extensions_mut()`; the header encoder picks it up.
/// Control characters other than tab are dropped, so a reason can never end
/// the status line early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonPhrase(Cow<'static, str>);

impl ReasonPhrase {
    pub fn new(reason: impl Into<Cow<'static, str>>) -> Self {
        let reason = reason.into();
        if reason.chars().all(is_reason_char) {
            Self(reason)
        } else {
            Self(Cow::Owned(reason.chars().filter(|c| is_reason_char(*c)).collect()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_reason_char(c: char) -> bool {
    c == '\t' || !c.is_control()
}

impl From<&'static str> for ReasonPhrase {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ReasonPhrase {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_reason_is_kept() {
        assert_eq!(ReasonPhrase::from("Short And Stout").as_str(), "Short And Stout");
        assert_eq!(ReasonPhrase::new("tab\tok").as_str(), "tab\tok");
    }

    #[test]
    fn line_breaks_are_dropped() {
        let reason = ReasonPhrase::from("LOST\r\nSet-Cookie: admin=1".to_string());
        assert_eq!(reason.as_str(), "LOSTSet-Cookie: admin=1");
        assert_eq!(ReasonPhrase::new("a\0b\x7fc").as_str(), "abc");
    }
}
