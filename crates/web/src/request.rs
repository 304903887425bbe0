//! The request as seen by flow handlers.
//!
//! Built from the decoded `http::Request<Bytes>`: the path is percent-decoded
//! with its leading `/` removed, the query string and the cookies are parsed on
//! first access.

use bytes::Bytes;
use http::{HeaderMap, Method, Uri, Version};
use once_cell::unsync::OnceCell;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    version: Version,
    path: String,
    headers: HeaderMap,
    body: Bytes,
    query: OnceCell<HashMap<String, String>>,
    cookies: OnceCell<HashMap<String, String>>,
}

impl Request {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Percent-decoded path without the leading `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn set_path(&mut self, path: String) {
        self.path = path;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of the header, if it is visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Query parameters; on duplicate keys the last one wins.
    pub fn query(&self) -> &HashMap<String, String> {
        self.query.get_or_init(|| {
            let Some(query) = self.uri.query() else {
                return HashMap::new();
            };
            match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
                Ok(pairs) => pairs.into_iter().collect(),
                Err(e) => {
                    warn!(cause = %e, query, "can't parse query string");
                    HashMap::new()
                }
            }
        })
    }

    /// Cookies sent with the request, names and values percent-decoded.
    pub fn cookies(&self) -> &HashMap<String, String> {
        self.cookies.get_or_init(|| {
            let mut cookies = HashMap::new();
            for value in self.headers.get_all(http::header::COOKIE) {
                let Ok(value) = value.to_str() else {
                    continue;
                };
                for pair in value.split(';') {
                    let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
                    let name = name.trim();
                    if name.is_empty() {
                        continue;
                    }
                    cookies.insert(decode(name), decode(value.trim()));
                }
            }
            cookies
        })
    }
}

fn decode(str: &str) -> String {
    percent_decode_str(str).decode_utf8_lossy().into_owned()
}

impl From<http::Request<Bytes>> for Request {
    fn from(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        let raw_path = parts.uri.path();
        let path = decode(raw_path.strip_prefix('/').unwrap_or(raw_path));

        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            path,
            headers: parts.headers,
            body,
            query: OnceCell::new(),
            cookies: OnceCell::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str, cookie: Option<&str>) -> Request {
        let mut builder = http::Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(http::header::COOKIE, cookie);
        }
        Request::from(builder.body(Bytes::new()).unwrap())
    }

    #[test]
    fn path_is_decoded_without_leading_slash() {
        let request = request("/files/hello%20world.txt?x=1", None);
        assert_eq!(request.path(), "files/hello world.txt");
        assert_eq!(request.uri().path(), "/files/hello%20world.txt");
    }

    #[test]
    fn query_last_wins() {
        let request = request("/search?q=rust&page=1&q=wisp+http&empty=", None);
        let query = request.query();
        assert_eq!(query.get("q").map(String::as_str), Some("wisp http"));
        assert_eq!(query.get("page").map(String::as_str), Some("1"));
        assert_eq!(query.get("empty").map(String::as_str), Some(""));
        assert_eq!(query.len(), 3);
    }

    #[test]
    fn no_query() {
        assert!(request("/", None).query().is_empty());
    }

    #[test]
    fn cookies_are_parsed_lazily() {
        let request = request("/", Some("user=ann%20lee; theme=dark;flag; =skip"));
        assert!(request.cookies.get().is_none());

        let cookies = request.cookies();
        assert_eq!(cookies.get("user").map(String::as_str), Some("ann lee"));
        assert_eq!(cookies.get("theme").map(String::as_str), Some("dark"));
        assert_eq!(cookies.get("flag").map(String::as_str), Some(""));
        assert_eq!(cookies.len(), 3);
    }
}
