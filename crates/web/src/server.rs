//! Server configuration and the accept loop.
//!
//! A [`Server`] owns one listener and one [`Router`]. Connections are served
//! as local tasks, so handlers don't need to be `Send`; at most
//! [`ServerConfig::clients`] of them are in flight at once.
//!
//! ```no_run
//! use wisp_web::router::{Router, get};
//! use wisp_web::{Flow, HandlerResult, Server, handler_fn};
//!
//! async fn hello(flow: &mut Flow) -> HandlerResult {
//!     flow.send_text("hello world");
//!     Ok(())
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = Router::builder().route("", get(handler_fn(hello))).build();
//!     Server::builder().router(router).port(8080).build()?.serve().await?;
//!     Ok(())
//! }
//! ```

use crate::body::ResponseBody;
use crate::dispatch::dispatch;
use crate::error::ServerError;
use crate::flow::Flow;
use crate::request::Request as FlowRequest;
use crate::responder::respond;
use crate::router::Router;
use bytes::Bytes;
use http::{Request, Response};
use serde::{Deserialize, Deserializer};
use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::LocalSet;
use tracing::{error, info, trace, warn};
use wisp_http::codec::DEFAULT_REQUEST_LIMIT;
use wisp_http::connection::HttpConnection;
use wisp_http::handler::Handler;

/// Listener and per-connection settings.
///
/// Missing fields fall back to their defaults when deserialized; `timeout` is
/// given in seconds.
///
/// ```
/// use wisp_web::ServerConfig;
///
/// let config: ServerConfig = serde_json::from_str(r#"{ "port": 9000, "timeout": 5 }"#).unwrap();
/// assert_eq!(config.port, 9000);
/// assert_eq!(config.clients, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound of header section plus body, in bytes.
    pub limit: usize,
    /// Connections served at once; further ones wait in the listen backlog.
    pub clients: usize,
    /// Time allowed for receiving a complete request, and for each step of
    /// the response afterwards: running the handler and every body write.
    /// A client that stops reading loses its slot once it elapses.
    #[serde(deserialize_with = "deserialize_seconds")]
    pub timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            limit: DEFAULT_REQUEST_LIMIT,
            clients: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

fn deserialize_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}

#[derive(Debug, Default)]
pub struct ServerBuilder {
    router: Option<Router>,
    config: ServerConfig,
}

impl ServerBuilder {
    fn new() -> Self {
        Self::default()
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Replaces every setting at once; later setters override single fields.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.config.limit = limit;
        self
    }

    pub fn clients(mut self, clients: usize) -> Self {
        self.config.clients = clients;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Server, ServerError> {
        let router = self.router.ok_or(ServerError::MissingRouter)?;
        let config = self.config;

        if config.clients == 0 {
            return Err(ServerError::InvalidConfig { reason: "clients must be greater than 0".to_string() });
        }
        if config.limit == 0 {
            return Err(ServerError::InvalidConfig { reason: "limit must be greater than 0".to_string() });
        }

        let address = format!("{}:{}", config.host, config.port);
        let addresses = match (config.host.as_str(), config.port).to_socket_addrs() {
            Ok(addresses) => addresses.collect::<Vec<_>>(),
            Err(e) => {
                warn!(cause = %e, %address, "can't resolve server address");
                return Err(ServerError::InvalidAddress { address });
            }
        };
        if addresses.is_empty() {
            return Err(ServerError::InvalidAddress { address });
        }

        Ok(Server { inner: ServerInner { router, config }, addresses })
    }
}

#[derive(Debug)]
pub struct Server {
    inner: ServerInner,
    addresses: Vec<SocketAddr>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Binds the configured address and serves until the returned future is dropped.
    pub async fn serve(self) -> Result<(), ServerError> {
        let listener = match TcpListener::bind(self.addresses.as_slice()).await {
            Ok(listener) => listener,
            Err(source) => {
                let address = format!("{}:{}", self.inner.config.host, self.inner.config.port);
                error!(cause = %source, %address, "bind server error");
                return Err(ServerError::Bind { address, source });
            }
        };

        self.serve_on(listener).await;
        Ok(())
    }

    /// Serves connections from an already bound listener.
    pub async fn serve_on(self, listener: TcpListener) {
        match listener.local_addr() {
            Ok(address) => info!(%address, clients = self.inner.config.clients, "start listening"),
            Err(e) => warn!(cause = %e, "can't read listener address"),
        }

        let inner = Rc::new(self.inner);
        let permits = Arc::new(Semaphore::new(inner.config.clients));

        LocalSet::new().run_until(accept_loop(listener, inner, permits)).await;
    }
}

async fn accept_loop(listener: TcpListener, inner: Rc<ServerInner>, permits: Arc<Semaphore>) {
    loop {
        // wait for a free slot first, pending connections stay in the backlog
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            error!("connection semaphore closed, stop accepting");
            return;
        };

        let (tcp_stream, remote_addr) = match listener.accept().await {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        let inner = Rc::clone(&inner);
        tokio::task::spawn_local(async move {
            trace!(%remote_addr, "accepted connection");
            let (reader, writer) = tcp_stream.into_split();
            let connection = HttpConnection::new(reader, writer)
                .with_limit(inner.config.limit)
                .with_read_timeout(Some(inner.config.timeout))
                .with_response_timeout(Some(inner.config.timeout));

            match connection.process(inner.as_ref()).await {
                Ok(()) => info!(%remote_addr, "finished process, connection shutdown"),
                Err(e) => error!(%remote_addr, cause = %e, "service has error, connection shutdown"),
            }
            drop(permit);
        });
    }
}

/// Connection level handler: turns a decoded request into a flow and runs it.
#[derive(Debug)]
struct ServerInner {
    router: Router,
    config: ServerConfig,
}

impl Handler for ServerInner {
    type RespBody = ResponseBody;
    type Error = Infallible;

    async fn call(&self, req: Request<Bytes>) -> Result<Response<Self::RespBody>, Self::Error> {
        let mut flow = Flow::new(FlowRequest::from(req));
        dispatch(&self.router, &mut flow).await;
        Ok(respond(flow).await)
    }
}
