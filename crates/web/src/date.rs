//! `Date` header values.

use http::HeaderValue;
use http::header::InvalidHeaderValue;

/// The current time formatted as an HTTP date, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub(crate) fn http_date() -> Result<HeaderValue, InvalidHeaderValue> {
    let mut buf = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut buf);
    HeaderValue::from_bytes(&buf[..])
}
