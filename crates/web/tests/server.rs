use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use indoc::indoc;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wisp_web::router::{Router, any, get, post};
use wisp_web::{Flow, FlowHandler, HandlerResult, Server, ServerBuilder, handler_fn, sync_handler_fn};

async fn serve<F>(builder: ServerBuilder, client: impl FnOnce(SocketAddr) -> F) -> F::Output
where
    F: Future,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = builder.host("127.0.0.1").port(addr.port()).build().unwrap();

    tokio::select! {
        () = server.serve_on(listener) => panic!("server stopped"),
        output = client(addr) => output,
    }
}

async fn send(addr: SocketAddr, request: impl AsRef<str>) -> Response {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_ref().as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    Response::parse(&String::from_utf8(raw).unwrap())
}

fn get_request(path: &str, host: &str) -> String {
    format!("GET {path} HTTP/1.1\r\nHost: {host}\r\n\r\n")
}

#[derive(Debug)]
struct Response {
    status_line: String,
    head: String,
    body: String,
}

impl Response {
    fn parse(raw: &str) -> Self {
        let (head, body) = raw.split_once("\r\n\r\n").unwrap_or((raw, ""));
        let status_line = head.lines().next().unwrap_or_default().to_string();
        Self { status_line, head: head.to_ascii_lowercase(), body: body.to_string() }
    }

    fn has_header(&self, line: &str) -> bool {
        self.head.lines().any(|l| l == line)
    }
}

#[tokio::test]
async fn oversized_request_is_rejected_before_dispatch() {
    let hits = Rc::new(Cell::new(0));
    let counter = Rc::clone(&hits);
    let router = Router::builder()
        .route(
            "upload",
            post(sync_handler_fn(move |_flow: &mut Flow| {
                counter.set(counter.get() + 1);
                Ok(())
            })),
        )
        .build();

    // only the header goes out, the declared body alone exceeds the limit
    let request = "POST /upload HTTP/1.1\r\nHost: 127.0.0.1\r\nContent-Length: 4096\r\n\r\n";
    let response = serve(Server::builder().router(router).limit(1024), |addr| send(addr, request)).await;

    assert_eq!(response.status_line, "HTTP/1.1 413 Payload Too Large");
    assert!(response.has_header("content-length: 0"));
    assert!(response.has_header("connection: close"));
    assert_eq!(hits.get(), 0);
}

/// Sleeps for a time depending on the wildcard, then logs it.
struct Slow {
    log: Rc<RefCell<Vec<String>>>,
}

#[async_trait(?Send)]
impl FlowHandler for Slow {
    async fn call(&self, flow: &mut Flow) -> HandlerResult {
        let name = flow.wildcard().unwrap_or_default().to_string();
        let delay = if name == "a" { 200 } else { 10 };
        tokio::time::sleep(Duration::from_millis(delay)).await;

        self.log.borrow_mut().push(name.clone());
        flow.send_text(name);
        Ok(())
    }
}

#[tokio::test]
async fn slow_clients_are_served_interleaved() {
    let log = Rc::new(RefCell::new(vec![]));
    let router = Router::builder().route("slow/*", get(Slow { log: Rc::clone(&log) })).build();

    let (a, b) = serve(Server::builder().router(router), |addr| async move {
        tokio::join!(send(addr, get_request("/slow/a", "localhost")), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            send(addr, get_request("/slow/b", "localhost")).await
        })
    })
    .await;

    assert_eq!(a.body, "a");
    assert_eq!(b.body, "b");
    assert_eq!(*log.borrow(), vec!["b", "a"]);
}

fn vhost(flow: &mut Flow) -> HandlerResult {
    if flow.header("host") == Some("vhoost") {
        let path = format!("vhost/{}", flow.path());
        flow.set_path(path);
    }
    Ok(())
}

async fn post_page(flow: &mut Flow) -> HandlerResult {
    let text = format!("{} {}", flow.path(), flow.wildcard().unwrap_or_default());
    flow.send_text(text);
    Ok(())
}

#[tokio::test]
async fn before_hook_rewrites_the_path() {
    let router = Router::builder()
        .before("post/*", any(sync_handler_fn(vhost)))
        .route("vhost/post/*", get(handler_fn(post_page)))
        .route("post/*", get(handler_fn(post_page)))
        .build();

    let (rewritten, plain) = serve(Server::builder().router(router), |addr| async move {
        let rewritten = send(addr, get_request("/post/1", "vhoost")).await;
        let plain = send(addr, get_request("/post/1", "localhost")).await;
        (rewritten, plain)
    })
    .await;

    assert_eq!(rewritten.body, "vhost/post/1 1");
    assert_eq!(plain.body, "post/1 1");
}

#[tokio::test]
async fn stream_is_sent_chunked() {
    let router = Router::builder()
        .route(
            "events",
            get(sync_handler_fn(|flow: &mut Flow| {
                let chunks: Vec<io::Result<Bytes>> =
                    vec![Ok(Bytes::from("hello")), Ok(Bytes::new()), Ok(Bytes::from(" wisp world"))];
                flow.send_stream(stream::iter(chunks));
                Ok(())
            })),
        )
        .build();

    let response = serve(Server::builder().router(router), |addr| send(addr, get_request("/events", "localhost"))).await;

    assert_eq!(response.status_line, "HTTP/1.1 200 OK");
    assert!(response.has_header("transfer-encoding: chunked"));
    assert!(!response.head.contains("content-length"));
    assert_eq!(response.body, "5\r\nhello\r\nB\r\n wisp world\r\n0\r\n\r\n");
}

#[tokio::test]
async fn last_send_wins() {
    let router = Router::builder()
        .route(
            "data",
            post(sync_handler_fn(|flow: &mut Flow| {
                let value: serde_json::Value = flow.recv_json()?;
                flow.send_file("does/not/exist.html");
                flow.send_json(&serde_json::json!({ "echo": value, "n": 2 }))?;
                Ok(())
            })),
        )
        .build();

    let request = indoc! {r##"
        POST /data HTTP/1.1
        Host: 127.0.0.1
        Content-Length: 9

        {"n": 1}
    "##};
    let response = serve(Server::builder().router(router), |addr| send(addr, request)).await;

    assert_eq!(response.status_line, "HTTP/1.1 200 OK");
    assert!(response.has_header("content-type: application/json"));
    let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body, serde_json::json!({ "echo": { "n": 1 }, "n": 2 }));
}

#[tokio::test]
async fn catch_all_after_hook_runs_once_per_request() {
    let hits = Rc::new(Cell::new(0));
    let counter = Rc::clone(&hits);
    let router = Router::builder()
        .route("post/*", get(handler_fn(post_page)))
        .after(
            "",
            any(sync_handler_fn(move |flow: &mut Flow| {
                counter.set(counter.get() + 1);
                flow.tail.insert("access-control-allow-origin", "*".parse()?);
                Ok(())
            })),
        )
        .build();

    let responses = serve(Server::builder().router(router), |addr| async move {
        let mut responses = vec![];
        for path in ["/", "/a/b", "/post/x"] {
            responses.push(send(addr, get_request(path, "localhost")).await);
        }
        responses
    })
    .await;

    assert_eq!(hits.get(), 3);
    assert_eq!(responses[0].status_line, "HTTP/1.1 404 Not Found");
    assert_eq!(responses[1].status_line, "HTTP/1.1 404 Not Found");
    assert_eq!(responses[2].status_line, "HTTP/1.1 200 OK");
    assert!(responses.iter().all(|r| r.has_header("access-control-allow-origin: *")));
}

fn mark(flow: &mut Flow, marker: &'static str) {
    match flow.var.get_mut::<Vec<&'static str>>("markers") {
        Some(markers) => markers.push(marker),
        None => {
            flow.var.insert("markers", vec![marker]);
        }
    }
}

#[tokio::test]
async fn hooks_keep_their_order_when_main_fails() {
    let router = Router::builder()
        .before(
            "",
            any(sync_handler_fn(|flow: &mut Flow| {
                mark(flow, "b");
                Ok(())
            })),
        )
        .route(
            "",
            any(sync_handler_fn(|flow: &mut Flow| {
                mark(flow, "m");
                Err("main failed".into())
            })),
        )
        .after(
            "",
            any(sync_handler_fn(|flow: &mut Flow| {
                mark(flow, "a");
                let markers = flow.var.get::<Vec<&'static str>>("markers").map(|m| m.join(",")).unwrap_or_default();
                flow.send_text(markers);
                Ok(())
            })),
        )
        .build();

    let response = serve(Server::builder().router(router), |addr| send(addr, get_request("/", "localhost"))).await;

    assert_eq!(response.status_line, "HTTP/1.1 200 OK");
    assert_eq!(response.body, "b,m,a");
}

#[tokio::test]
async fn failing_hook_without_output_is_internal_error() {
    let router = Router::builder()
        .route("", any(sync_handler_fn(|_flow: &mut Flow| Err("boom".into()))))
        .build();

    let response = serve(Server::builder().router(router), |addr| send(addr, get_request("/", "localhost"))).await;

    assert_eq!(response.status_line, "HTTP/1.1 500 Internal Server Error");
    assert_eq!(response.body, "");
}

#[tokio::test]
async fn custom_reason_and_cookies() {
    let router = Router::builder()
        .after(
            "",
            any(sync_handler_fn(|flow: &mut Flow| {
                flow.set_cookie("session", "a b", Some(60));
                if flow.output().is_unset() {
                    flow.set_status(http::StatusCode::NOT_FOUND).set_reason("LOST");
                }
                Ok(())
            })),
        )
        .build();

    let response = serve(Server::builder().router(router), |addr| send(addr, get_request("/gone", "localhost"))).await;

    assert_eq!(response.status_line, "HTTP/1.1 404 LOST");
    assert!(response.has_header("set-cookie: session=a%20b; max-age=60"));
    assert!(response.head.contains("\r\ndate: "));
}

#[tokio::test]
async fn unsupported_transfer_encoding() {
    let router = Router::builder().build();
    let request = "POST / HTTP/1.1\r\nHost: 127.0.0.1\r\nTransfer-Encoding: chunked\r\n\r\n";

    let response = serve(Server::builder().router(router), |addr| send(addr, request)).await;

    assert_eq!(response.status_line, "HTTP/1.1 501 Not Implemented");
}

#[tokio::test]
async fn client_that_never_reads_gives_up_its_slot() {
    let router = Router::builder()
        .route(
            "big",
            get(sync_handler_fn(|flow: &mut Flow| {
                flow.send_bytes(vec![b'x'; 32 << 20]);
                Ok(())
            })),
        )
        .route(
            "small",
            get(sync_handler_fn(|flow: &mut Flow| {
                flow.send_text("small");
                Ok(())
            })),
        )
        .build();
    let builder = Server::builder().router(router).clients(1).timeout(Duration::from_secs(1));

    let response = serve(builder, |addr| async move {
        // far more than the socket buffers take, and nobody reads it
        let mut stalled = TcpStream::connect(addr).await.unwrap();
        stalled.write_all(get_request("/big", "localhost").as_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let response = tokio::time::timeout(Duration::from_secs(5), send(addr, get_request("/small", "localhost")))
            .await
            .expect("second client was never served");
        drop(stalled);
        response
    })
    .await;

    assert_eq!(response.status_line, "HTTP/1.1 200 OK");
    assert_eq!(response.body, "small");
}

#[tokio::test]
async fn partial_request_does_not_block_other_clients() {
    let log = Rc::new(RefCell::new(vec![]));
    let seen = Rc::clone(&log);
    let router = Router::builder()
        .route(
            "small",
            get(sync_handler_fn(move |flow: &mut Flow| {
                let from = flow.query_param("from").unwrap_or_default().to_string();
                seen.borrow_mut().push(from.clone());
                flow.send_text(from);
                Ok(())
            })),
        )
        .build();

    let (a, b) = serve(Server::builder().router(router), |addr| async move {
        let trickle = async {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"GET /sm").await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
            stream.write_all(b"all?from=a HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();

            let mut raw = Vec::new();
            stream.read_to_end(&mut raw).await.unwrap();
            Response::parse(&String::from_utf8(raw).unwrap())
        };
        tokio::join!(trickle, async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            send(addr, get_request("/small?from=b", "localhost")).await
        })
    })
    .await;

    assert_eq!(a.status_line, "HTTP/1.1 200 OK");
    assert_eq!(a.body, "a");
    assert_eq!(b.status_line, "HTTP/1.1 200 OK");
    assert_eq!(b.body, "b");
    assert_eq!(*log.borrow(), vec!["b", "a"]);
}

#[tokio::test]
async fn two_servers_share_one_thread() {
    let reply = |text: &'static str| {
        get(sync_handler_fn(move |flow: &mut Flow| {
            flow.send_text(text);
            Ok(())
        }))
    };
    let first = Server::builder().router(Router::builder().route("", reply("one")).build());
    let second = Server::builder().router(Router::builder().route("", reply("two")).build());

    let first_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let second_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let first_addr = first_listener.local_addr().unwrap();
    let second_addr = second_listener.local_addr().unwrap();
    let first = first.host("127.0.0.1").port(first_addr.port()).build().unwrap();
    let second = second.host("127.0.0.1").port(second_addr.port()).build().unwrap();

    let (one, two) = tokio::select! {
        () = first.serve_on(first_listener) => panic!("first server stopped"),
        () = second.serve_on(second_listener) => panic!("second server stopped"),
        output = async {
            tokio::join!(send(first_addr, get_request("/", "localhost")), send(second_addr, get_request("/", "localhost")))
        } => output,
    };

    assert_eq!(one.body, "one");
    assert_eq!(two.body, "two");
}

#[tokio::test]
async fn head_request_keeps_length_but_drops_body() {
    let router = Router::builder()
        .route(
            "",
            any(sync_handler_fn(|flow: &mut Flow| {
                flow.send_text("hello");
                Ok(())
            })),
        )
        .build();

    let request = "HEAD /page HTTP/1.1\r\nHost: localhost\r\n\r\n";
    let response = serve(Server::builder().router(router), |addr| send(addr, request)).await;

    assert_eq!(response.status_line, "HTTP/1.1 200 OK");
    assert!(response.has_header("content-length: 5"));
    assert!(response.body.is_empty());
}
