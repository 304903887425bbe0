//! HTTP connection handling module
//!
//! - [`HttpConnection`]: serves a single request on a reader/writer pair:
//!   - Enforces the request byte limit and the read timeout
//!   - Cancels the handler when the client disconnects
//!   - Always answers with `Connection: close` and shuts the writer down

mod http_connection;

pub use http_connection::HttpConnection;
