//! Turns a finished [`Flow`] into a response.
//!
//! The output kind decides the body, its framing and the default status:
//!
//! | output     | body                       | status when none was set |
//! |------------|----------------------------|--------------------------|
//! | `Unset`    | empty                      | 404                      |
//! | `Bytes`    | as-is, `Content-Length`    | 200                      |
//! | `Json`     | encoded, `Content-Length`  | 200                      |
//! | `File`     | streamed, `Content-Length` | 200, 404 if missing      |
//! | `Redirect` | empty, `Location` header   | 302 unless 3xx was set   |
//! | `Stream`   | chunked                    | 200                      |

use crate::body::ResponseBody;
use crate::date::http_date;
use crate::error::FlowError;
use crate::flow::{Flow, FlowParts, Output};
use bytes::Bytes;
use http::header::{CACHE_CONTROL, CONTENT_TYPE, DATE, LOCATION, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Response, StatusCode};
use mime::Mime;
use std::ffi::OsStr;
use std::io;
use std::path::Path;
use tracing::{error, warn};
use wisp_http::protocol::ReasonPhrase;

const FILE_CACHE_CONTROL: HeaderValue = HeaderValue::from_static("public, max-age=86400");

pub(crate) async fn respond(flow: Flow) -> Response<ResponseBody> {
    let FlowParts { status, reason, mut tail, output, set_cookies } = flow.into_parts();

    let (status, body) = match output {
        Output::Unset => (status.unwrap_or(StatusCode::NOT_FOUND), ResponseBody::empty()),
        Output::Bytes(bytes) => (status.unwrap_or(StatusCode::OK), ResponseBody::once(bytes)),
        Output::Json(value) => match serde_json::to_vec(&value) {
            Ok(json) => (status.unwrap_or(StatusCode::OK), ResponseBody::once(Bytes::from(json))),
            Err(e) => {
                error!(cause = %e, "can't encode json output");
                (StatusCode::INTERNAL_SERVER_ERROR, ResponseBody::empty())
            }
        },
        Output::Redirect(location) => match HeaderValue::try_from(location) {
            Ok(location) => {
                tail.insert(LOCATION, location);
                (status.filter(StatusCode::is_redirection).unwrap_or(StatusCode::FOUND), ResponseBody::empty())
            }
            Err(e) => {
                error!(cause = %e, "invalid redirect location");
                (StatusCode::INTERNAL_SERVER_ERROR, ResponseBody::empty())
            }
        },
        Output::File(path) => match open_file(&path, &mut tail).await {
            Ok(body) => (status.unwrap_or(StatusCode::OK), body),
            Err(e @ FlowError::NotFound { .. }) => {
                warn!(cause = %e, "can't send file");
                (status.unwrap_or(StatusCode::NOT_FOUND), ResponseBody::empty())
            }
            Err(e) => {
                error!(cause = %e, "can't send file");
                (StatusCode::INTERNAL_SERVER_ERROR, ResponseBody::empty())
            }
        },
        Output::Stream(stream) => (status.unwrap_or(StatusCode::OK), ResponseBody::stream(stream)),
    };

    if !tail.contains_key(DATE) {
        match http_date() {
            Ok(date) => {
                tail.insert(DATE, date);
            }
            Err(e) => warn!(cause = %e, "can't format date header"),
        }
    }

    append_cookies(&mut tail, set_cookies);

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = tail;
    if let Some(reason) = reason {
        response.extensions_mut().insert(ReasonPhrase::new(reason));
    }
    response
}

async fn open_file(path: &Path, tail: &mut HeaderMap) -> Result<ResponseBody, FlowError> {
    let body = ResponseBody::file(path).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => FlowError::not_found(path),
        _ => FlowError::from(e),
    })?;

    if !tail.contains_key(CONTENT_TYPE) {
        if let Ok(content_type) = HeaderValue::from_str(content_type(path).as_ref()) {
            tail.insert(CONTENT_TYPE, content_type);
        }
    }
    if !tail.contains_key(CACHE_CONTROL) {
        tail.insert(CACHE_CONTROL, FILE_CACHE_CONTROL);
    }
    Ok(body)
}

fn append_cookies(tail: &mut HeaderMap, set_cookies: Vec<(String, String)>) {
    for (name, value) in set_cookies {
        match HeaderValue::try_from(format!("{name}={value}")) {
            Ok(cookie) => {
                tail.append(SET_COOKIE, cookie);
            }
            Err(e) => warn!(cause = %e, cookie = %name, "skip invalid cookie"),
        }
    }
}

/// Content type of a file, by extension.
fn content_type(path: &Path) -> Mime {
    let extension = path.extension().and_then(OsStr::to_str).map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("css") => mime::TEXT_CSS_UTF_8,
        Some("gif") => mime::IMAGE_GIF,
        Some("html" | "htm") => mime::TEXT_HTML_UTF_8,
        Some("jpg" | "jpeg") => mime::IMAGE_JPEG,
        Some("js") => mime::APPLICATION_JAVASCRIPT_UTF_8,
        Some("json") => mime::APPLICATION_JSON,
        Some("png") => mime::IMAGE_PNG,
        Some("txt") => mime::TEXT_PLAIN_UTF_8,
        Some("svg") => mime::IMAGE_SVG,
        Some("ico") => "image/x-icon".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}
