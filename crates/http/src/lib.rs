//! The wire layer of the wisp HTTP server
//!
//! This crate reads one HTTP/1.x request per connection, hands it to a
//! [`handler::Handler`] and writes the response back, streaming the body either
//! with `Content-Length` or chunked transfer encoding. It is built on
//! `tokio_util` codecs and runs on the caller's task, so handlers don't need to
//! be `Send`.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::{Request, Response, StatusCode};
//! use http_body_util::Full;
//! use std::error::Error;
//! use std::rc::Rc;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn};
//! use wisp_http::connection::HttpConnection;
//! use wisp_http::handler::make_handler;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Rc::new(make_handler(hello_world));
//!     let local = tokio::task::LocalSet::new();
//!
//!     local.run_until(async move {
//!         loop {
//!             let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!                 Ok(stream_and_addr) => stream_and_addr,
//!                 Err(e) => {
//!                     warn!(cause = %e, "failed to accept");
//!                     continue;
//!                 }
//!             };
//!
//!             let handler = Rc::clone(&handler);
//!             tokio::task::spawn_local(async move {
//!                 let (reader, writer) = tcp_stream.into_split();
//!                 let connection = HttpConnection::new(reader, writer).with_limit(8 * 1024);
//!                 match connection.process(handler.as_ref()).await {
//!                     Ok(()) => info!("finished process, connection shutdown"),
//!                     Err(e) => error!(cause = %e, "service has error, connection shutdown"),
//!                 }
//!             });
//!         }
//!     }).await;
//! }
//!
//! async fn hello_world(request: Request<Bytes>) -> Result<Response<Full<Bytes>>, Box<dyn Error + Send + Sync>> {
//!     info!(path = request.uri().path(), body_size = request.body().len(), "receiving request");
//!
//!     let mut response = Response::new(Full::new(Bytes::from_static(b"Hello World!\r\n")));
//!     *response.status_mut() = StatusCode::OK;
//!     Ok(response)
//! }
//! ```
//!
//! # Architecture
//!
//! - [`connection`]: serves one request on a reader/writer pair
//! - [`protocol`]: message types and errors
//! - [`codec`]: request decoding and response encoding
//! - [`handler`]: the handler trait and [`handler::make_handler`]
//!
//! # Errors
//!
//! - [`protocol::HttpError`]: Top-level error type
//! - [`protocol::ParseError`]: Request parsing errors, some answered with 413 or 501
//! - [`protocol::SendError`]: Response sending errors
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only, one request per connection
//! - Request bodies must use `Content-Length`
//! - Maximum number of headers: 64
//!
//! # Safety
//!
//! Header values are built without re-validation from bytes `httparse` has
//! already checked; that is the only `unsafe` block.

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
