//! Demo server, run it from `crates/web` so `web/` resolves:
//!
//! ```text
//! cargo run --example flow_server
//! ```

use bytes::Bytes;
use futures::StreamExt;
use http::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;
use wisp_web::router::{Router, any, get, post};
use wisp_web::{Flow, HandlerResult, Server, ServerConfig, args_handler_fn, handler_fn, sync_handler_fn};

// curl -v -H 'Host: vhoost' http://127.0.0.1:8080/post/1
fn vhost(flow: &mut Flow) -> HandlerResult {
    if flow.header("host") == Some("vhoost") {
        let path = format!("vhost/{}", flow.path());
        info!(from = flow.path(), to = %path, "rewrite path");
        flow.set_path(path);
    }
    Ok(())
}

async fn index(flow: &mut Flow) -> HandlerResult {
    flow.send_file("web/index.html");
    Ok(())
}

async fn show_post(flow: &mut Flow) -> HandlerResult {
    let text = format!("post {}\r\n", flow.wildcard().unwrap_or_default());
    flow.send_text(text);
    Ok(())
}

async fn show_vhost_post(flow: &mut Flow) -> HandlerResult {
    let text = format!("vhost post {}\r\n", flow.wildcard().unwrap_or_default());
    flow.send_text(text);
    Ok(())
}

#[derive(Serialize)]
struct Robot<'a> {
    title: &'a str,
    tag: &'a str,
    path: &'a str,
    wildcard: &'a str,
}

// curl -v http://127.0.0.1:8080/test/abc
async fn robot(flow: &mut Flow, (title, tag): &(&'static str, &'static str)) -> HandlerResult {
    tokio::time::sleep(Duration::from_millis(100)).await;
    let path = flow.path().to_string();
    let wildcard = flow.wildcard().unwrap_or_default().to_string();
    flow.send_json(&Robot { title, tag, path: &path, wildcard: &wildcard })?;
    Ok(())
}

// curl -v -d 'name=ann&zip=10001' http://127.0.0.1:8080/form
async fn echo_form(flow: &mut Flow) -> HandlerResult {
    let fields: Vec<(String, String)> = flow.recv_form()?;
    flow.send_form(&fields)?;
    Ok(())
}

// curl -N http://127.0.0.1:8080/events
async fn events(flow: &mut Flow) -> HandlerResult {
    let ticks = ticks(5, Duration::from_millis(500));
    flow.send_stream(ticks);
    Ok(())
}

fn ticks(count: usize, period: Duration) -> impl futures::Stream<Item = std::io::Result<Bytes>> {
    futures::stream::iter(0..count).then(move |n| async move {
        tokio::time::sleep(period).await;
        Ok(Bytes::from(format!("data: tick {n}\n\n")))
    })
}

fn finish(flow: &mut Flow) -> HandlerResult {
    flow.tail.insert("access-control-allow-origin", "*".parse()?);
    flow.set_cookie("visited", "yes", Some(3600));
    if flow.output().is_unset() {
        flow.send_file_with("web/404.html", StatusCode::NOT_FOUND, Some("LOST".into()));
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let router = Router::builder()
        .before("post/*", any(sync_handler_fn(vhost)))
        .route("/", get(handler_fn(index)))
        .route("vhost/post/*", get(handler_fn(show_vhost_post)))
        .route("post/*", get(handler_fn(show_post)))
        .route("test/*", get(args_handler_fn(("I'm robot", "tag1"), robot)))
        .route("form", post(handler_fn(echo_form)))
        .route("events", get(handler_fn(events)))
        .after("", any(sync_handler_fn(finish)))
        .build();

    let config = ServerConfig { host: "127.0.0.1".to_string(), ..ServerConfig::default() };
    let server = match Server::builder().router(router).config(config).build() {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(cause = %e, "can't build server");
            return;
        }
    };

    if let Err(e) = server.serve().await {
        tracing::error!(cause = %e, "server stopped");
    }
}
