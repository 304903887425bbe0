use std::error::Error;
use std::fmt::Display;
use std::future::Future;
use std::io;
use std::time::Duration;

use bytes::Bytes;

use futures::{SinkExt, StreamExt};
use http::header::CONNECTION;
use http::{HeaderValue, Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Empty};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::select;

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::handler::Handler;
use crate::protocol::{HttpError, Message, ParseError, PayloadItem, PayloadSize, ResponseHead, SendError};

use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{error, info, trace, warn};

const CLOSE_VALUE: HeaderValue = HeaderValue::from_static("close");

/// An HTTP connection that serves exactly one request.
///
/// `HttpConnection` handles the full lifecycle of a connection:
/// - Reading and decoding the request within the byte limit and read timeout
/// - Answering protocol errors with 413 / 501 where a response is due
/// - Running the handler while watching the client for a broken connection
/// - Streaming the response back, then closing the write half
///
/// The response timeout bounds each step after the request was read: the
/// handler call, every body frame and every write. A client that stops reading
/// or a handler that never finishes releases the connection once it elapses.
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
#[derive(Debug)]
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    read_timeout: Option<Duration>,
    response_timeout: Option<Duration>,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), 8 * 1024),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            read_timeout: None,
            response_timeout: None,
        }
    }

    /// Limits header section plus body to `limit` bytes.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        *self.framed_read.decoder_mut() = RequestDecoder::with_limit(limit);
        self
    }

    /// Bounds the time spent waiting for a complete request.
    #[must_use]
    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Bounds the handler call and each step of writing the response.
    #[must_use]
    pub fn with_response_timeout(mut self, response_timeout: Option<Duration>) -> Self {
        self.response_timeout = response_timeout;
        self
    }

    /// Reads one request, hands it to `handler` and writes the response.
    ///
    /// Returns `Ok(())` when the client went away before a request arrived or
    /// its connection failed while the handler was running; the handler future
    /// is dropped in the latter case. A client that only half-closes after its
    /// request still gets the response.
    pub async fn process<H>(mut self, handler: &H) -> Result<(), HttpError>
    where
        H: Handler,
        H::RespBody: Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        let request = match self.read_request().await {
            Ok(Some(request)) => request,
            Ok(None) => {
                info!("client closed before sending a request");
                return Ok(());
            }
            Err(e) => {
                match e.status_code() {
                    Some(status) => {
                        error!(cause = %e, status = status.as_u16(), "can't receive request, send error response");
                        self.do_send_response(build_error_response(status), false).await?;
                    }
                    None => error!(cause = %e, "can't receive request, close connection"),
                }
                self.shutdown().await;
                return Err(e.into());
            }
        };

        trace!(method = %request.method(), uri = %request.uri(), "received request");
        let head_only = request.method() == Method::HEAD;

        let outcome = select! {
            biased;
            response = within(self.response_timeout, handler.call(request)) => Some(response),
            e = watch_connection(self.framed_read.get_mut()) => {
                warn!(cause = %e, "client connection failed, drop the running handler");
                None
            }
        };

        let Some(response_result) = outcome else {
            return Ok(());
        };

        let response_result = match response_result {
            Ok(response_result) => response_result,
            Err(e) => {
                error!(cause = %e, "handler didn't finish in time, close connection");
                self.shutdown().await;
                return Err(SendError::from(e).into());
            }
        };

        match response_result {
            Ok(response) => self.do_send_response(response, head_only).await?,
            Err(e) => {
                let e: Box<dyn Error + Send + Sync> = e.into();
                error!(cause = %e, "handle request error");
                self.do_send_response(build_error_response(StatusCode::INTERNAL_SERVER_ERROR), head_only).await?;
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn read_request(&mut self) -> Result<Option<Request<Bytes>>, ParseError> {
        let next = match self.read_timeout {
            Some(duration) => tokio::time::timeout(duration, self.framed_read.next()).await.map_err(ParseError::io)?,
            None => self.framed_read.next().await,
        };
        next.transpose()
    }

    /// Writes `response`; with `head_only` the head announces the body but the body is left out.
    async fn do_send_response<T>(&mut self, response: Response<T>, head_only: bool) -> Result<(), HttpError>
    where
        T: Body + Unpin,
        T::Error: Display,
    {
        let timeout = self.response_timeout;
        let (mut header_parts, mut body) = response.into_parts();
        header_parts.headers.insert(CONNECTION, CLOSE_VALUE);

        let payload_size = {
            let size_hint = body.size_hint();
            match size_hint.exact() {
                Some(0) => PayloadSize::Empty,
                Some(length) => PayloadSize::Length(length),
                None => PayloadSize::Chunked,
            }
        };

        let header = Message::<_, T::Data>::Header((ResponseHead::from_parts(header_parts, ()), payload_size));
        // an empty response is flushed together with its eof below
        within(timeout, self.framed_write.feed(header)).await.map_err(SendError::from)??;

        if head_only {
            self.framed_write.encoder_mut().skip_payload();
            within(timeout, SinkExt::<Message<(ResponseHead, PayloadSize), T::Data>>::flush(&mut self.framed_write))
                .await
                .map_err(SendError::from)??;
            return Ok(());
        }

        loop {
            match within(timeout, body.frame()).await.map_err(SendError::from)? {
                Some(Ok(frame)) => {
                    let Ok(data) = frame.into_data() else {
                        trace!("skip response trailers");
                        continue;
                    };
                    let chunk = Message::Payload(PayloadItem::Chunk(data));
                    within(timeout, self.framed_write.send(chunk)).await.map_err(SendError::from)??;
                }
                Some(Err(e)) => return Err(SendError::invalid_body(format!("resolve response body error: {e}")).into()),
                None => {
                    // send instead of feed: the whole response must reach the socket before closing
                    let eof = Message::Payload(PayloadItem::<T::Data>::Eof);
                    within(timeout, self.framed_write.send(eof)).await.map_err(SendError::from)??;
                    return Ok(());
                }
            }
        }
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.framed_write.get_mut().shutdown().await {
            warn!(cause = %e, "failed to shutdown connection");
        }
    }
}

/// Runs `future` to completion, or fails with `TimedOut` once `limit` elapses.
async fn within<F: Future>(limit: Option<Duration>, future: F) -> io::Result<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future).await.map_err(io::Error::from),
        None => Ok(future.await),
    }
}

/// Resolves with the error once reading from the client fails.
///
/// Bytes arriving after the request are discarded. End of stream only means
/// the client half-closed its side: from then on a broken connection shows up
/// when the response is written.
async fn watch_connection<R: AsyncRead + Unpin>(reader: &mut R) -> io::Error {
    let mut buf = [0u8; 512];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                trace!("client half-closed the connection");
                return std::future::pending().await;
            }
            Ok(_) => {}
            Err(e) => return e,
        }
    }
}

fn build_error_response(status_code: StatusCode) -> Response<Empty<Bytes>> {
    let mut response = Response::new(Empty::<Bytes>::new());
    *response.status_mut() = status_code;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::make_handler;
    use http_body_util::Full;
    use indoc::indoc;
    use std::cell::Cell;
    use std::convert::Infallible;
    use tokio::io::{duplex, split};

    async fn exchange<H>(request: &str, limit: usize, handler: &H) -> (String, Result<(), HttpError>)
    where
        H: Handler,
        H::RespBody: Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        let (mut client, server) = duplex(16 * 1024);
        let (reader, writer) = split(server);

        client.write_all(request.as_bytes()).await.unwrap();

        let connection = HttpConnection::new(reader, writer).with_limit(limit);
        let result = connection.process(handler).await;

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        (response, result)
    }

    #[tokio::test]
    async fn serve_one_request() {
        let handler = make_handler(|req: Request<Bytes>| async move {
            let body = format!("{} {}", req.method(), String::from_utf8_lossy(req.body()));
            Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(body))))
        });

        let request = indoc! {r##"
        POST /echo HTTP/1.1
        Host: 127.0.0.1
        Content-Length: 4

        ping"##};

        let (response, result) = exchange(request, 8 * 1024, &handler).await;
        result.unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("connection: close\r\n"));
        assert!(response.contains("content-length: 9\r\n"));
        assert!(response.ends_with("\r\n\r\nPOST ping"));
    }

    #[tokio::test]
    async fn too_large_request_never_reaches_handler() {
        let called = Cell::new(false);
        let handler = make_handler(|_req: Request<Bytes>| {
            called.set(true);
            async { Ok::<_, Infallible>(Response::new(Empty::<Bytes>::new())) }
        });

        let request = "POST /upload HTTP/1.1\r\nContent-Length: 500\r\n\r\n";
        let (response, result) = exchange(request, 128, &handler).await;

        assert!(response.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
        assert!(response.ends_with("content-length: 0\r\n\r\n"));
        assert!(matches!(result, Err(HttpError::RequestError { source: ParseError::RequestTooLarge { .. } })));
        assert!(!called.get());
    }

    #[tokio::test]
    async fn unsupported_version_gets_501() {
        let handler = make_handler(|_req: Request<Bytes>| async { Ok::<_, Infallible>(Response::new(Empty::<Bytes>::new())) });

        let (response, result) = exchange("GET / HTTP/2.0\r\nHost: a\r\n\r\n", 8 * 1024, &handler).await;

        assert!(response.starts_with("HTTP/1.1 501 Not Implemented\r\n"));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn malformed_request_closes_silently() {
        let handler = make_handler(|_req: Request<Bytes>| async { Ok::<_, Infallible>(Response::new(Empty::<Bytes>::new())) });

        let (response, result) = exchange("GET / HTTP/1.1\r\nbad header line\r\n\r\n", 8 * 1024, &handler).await;

        assert!(response.is_empty());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn handler_error_becomes_500() {
        let handler = make_handler(|_req: Request<Bytes>| async { Err::<Response<Empty<Bytes>>, _>("boom") });

        let (response, result) = exchange("GET / HTTP/1.1\r\nHost: a\r\n\r\n", 8 * 1024, &handler).await;

        result.unwrap();
        assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[tokio::test]
    async fn vanished_client_releases_connection_after_timeout() {
        let handler = make_handler(|_req: Request<Bytes>| async {
            std::future::pending::<()>().await;
            Ok::<_, Infallible>(Response::new(Empty::<Bytes>::new()))
        });

        let (mut client, server) = duplex(1024);
        let (reader, writer) = split(server);
        client.write_all(b"GET /slow HTTP/1.1\r\nHost: a\r\n\r\n").await.unwrap();
        drop(client);

        let result = HttpConnection::new(reader, writer)
            .with_response_timeout(Some(Duration::from_millis(20)))
            .process(&handler)
            .await;

        assert!(matches!(result, Err(HttpError::ResponseError { source: SendError::Io { .. } })));
    }

    #[tokio::test]
    async fn stuck_handler_times_out() {
        let handler = make_handler(|_req: Request<Bytes>| async {
            std::future::pending::<()>().await;
            Ok::<_, Infallible>(Response::new(Empty::<Bytes>::new()))
        });

        let (mut client, server) = duplex(1024);
        let (reader, writer) = split(server);
        client.write_all(b"GET /forever HTTP/1.1\r\nHost: a\r\n\r\n").await.unwrap();

        let result = HttpConnection::new(reader, writer)
            .with_response_timeout(Some(Duration::from_millis(20)))
            .process(&handler)
            .await;

        assert!(matches!(result, Err(HttpError::ResponseError { source: SendError::Io { .. } })));
        drop(client);
    }

    #[tokio::test]
    async fn client_not_reading_times_out() {
        let handler = make_handler(|_req: Request<Bytes>| async {
            Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(vec![b'x'; 64 * 1024]))))
        });

        // the pipe holds far less than the body and the client never reads
        let (mut client, server) = duplex(256);
        let (reader, writer) = split(server);
        client.write_all(b"GET /big HTTP/1.1\r\nHost: a\r\n\r\n").await.unwrap();

        let result = HttpConnection::new(reader, writer)
            .with_response_timeout(Some(Duration::from_millis(20)))
            .process(&handler)
            .await;

        assert!(matches!(result, Err(HttpError::ResponseError { source: SendError::Io { .. } })));
        drop(client);
    }

    #[tokio::test]
    async fn half_closed_client_gets_response() {
        let handler = make_handler(|_req: Request<Bytes>| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, Infallible>(Response::new(Full::new(Bytes::from_static(b"pong"))))
        });

        let (mut client, server) = duplex(1024);
        let (reader, writer) = split(server);
        client.write_all(b"GET /ping HTTP/1.1\r\nHost: a\r\n\r\n").await.unwrap();
        client.shutdown().await.unwrap();

        HttpConnection::new(reader, writer).process(&handler).await.unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("\r\n\r\npong"));
    }

    #[tokio::test]
    async fn head_request_gets_length_without_body() {
        let handler = make_handler(|_req: Request<Bytes>| async {
            Ok::<_, Infallible>(Response::new(Full::new(Bytes::from_static(b"hello"))))
        });

        let (response, result) = exchange("HEAD /page HTTP/1.1\r\nHost: a\r\n\r\n", 8 * 1024, &handler).await;
        result.unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("content-length: 5\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn read_timeout_closes_connection() {
        let handler = make_handler(|_req: Request<Bytes>| async { Ok::<_, Infallible>(Response::new(Empty::<Bytes>::new())) });

        let (mut client, server) = duplex(1024);
        let (reader, writer) = split(server);
        client.write_all(b"GET / HTTP/1.1\r\nHost:").await.unwrap();

        let result = HttpConnection::new(reader, writer)
            .with_read_timeout(Some(Duration::from_millis(20)))
            .process(&handler)
            .await;

        assert!(matches!(result, Err(HttpError::RequestError { source: ParseError::Io { .. } })));
    }
}
