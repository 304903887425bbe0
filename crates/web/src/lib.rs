//! Flow based routing on top of [`wisp_http`].
//!
//! Every request becomes a [`Flow`]: a mutable context that passes through the
//! matching before hooks, one main handler and the matching after hooks, in
//! registration order. Hooks read the request, share values through
//! [`Flow::var`], set headers on [`Flow::tail`] and pick the response with the
//! `send_*` methods; the last call wins. Once the chain is done the flow's
//! [`Output`] is written back and the connection is closed.
//!
//! ```no_run
//! use wisp_web::router::{Router, any, get};
//! use wisp_web::{Flow, HandlerResult, Server, args_handler_fn, handler_fn, sync_handler_fn};
//!
//! fn vhost(flow: &mut Flow) -> HandlerResult {
//!     if flow.header("host") == Some("vhoost") {
//!         let path = format!("vhost/{}", flow.path());
//!         flow.set_path(path);
//!     }
//!     Ok(())
//! }
//!
//! async fn post(flow: &mut Flow) -> HandlerResult {
//!     let id = flow.wildcard().unwrap_or_default().to_string();
//!     flow.send_json(&serde_json::json!({ "id": id }))?;
//!     Ok(())
//! }
//!
//! async fn tagged(flow: &mut Flow, tag: &&'static str) -> HandlerResult {
//!     flow.send_text(*tag);
//!     Ok(())
//! }
//!
//! fn not_found(flow: &mut Flow) -> HandlerResult {
//!     if flow.output().is_unset() {
//!         flow.set_status(http::StatusCode::NOT_FOUND).set_reason("LOST");
//!         flow.send_file("web/404.html");
//!     }
//!     Ok(())
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = Router::builder()
//!         .before("post/*", any(sync_handler_fn(vhost)))
//!         .route("post/*", get(handler_fn(post)))
//!         .route("tag", get(args_handler_fn("tag1", tagged)))
//!         .after("", any(sync_handler_fn(not_found)))
//!         .build();
//!
//!     Server::builder().router(router).port(8080).build()?.serve().await?;
//!     Ok(())
//! }
//! ```

mod body;
mod date;
mod dispatch;
mod error;
mod flow;
mod handler;
mod request;
mod responder;
mod server;

pub mod router;

pub use body::ResponseBody;
pub use error::FlowError;
pub use error::HandlerError;
pub use error::HandlerResult;
pub use error::ServerError;
pub use flow::CookieOptions;
pub use flow::Flow;
pub use flow::Output;
pub use flow::Stage;
pub use flow::Vars;
pub use handler::ArgsFnHandler;
pub use handler::FlowHandler;
pub use handler::FnHandler;
pub use handler::SyncFnHandler;
pub use handler::args_handler_fn;
pub use handler::handler_fn;
pub use handler::sync_handler_fn;
pub use request::Request;
pub use router::Router;
pub use server::Server;
pub use server::ServerBuilder;
pub use server::ServerConfig;
