//! Request handler abstraction for the connection layer.
//!
//! A [`Handler`] receives a fully read request and produces a response whose
//! body implements [`http_body::Body`]. Handlers run on the connection's task
//! and are not required to be `Send`.

use std::error::Error;
use std::future::Future;

use bytes::Bytes;
use http::{Request, Response};

use http_body::Body;

pub trait Handler {
    type RespBody: Body;
    type Error: Into<Box<dyn Error + Send + Sync>>;

    fn call(&self, req: Request<Bytes>) -> impl Future<Output = Result<Response<Self::RespBody>, Self::Error>>;
}

/// A [`Handler`] backed by a plain function or closure, see [`make_handler`].
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<RespBody, Err, F, Fut> Handler for HandlerFn<F>
where
    RespBody: Body,
    F: Fn(Request<Bytes>) -> Fut,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Fut: Future<Output = Result<Response<RespBody>, Err>>,
{
    type RespBody = RespBody;
    type Error = Err;

    fn call(&self, req: Request<Bytes>) -> impl Future<Output = Result<Response<Self::RespBody>, Self::Error>> {
        (self.f)(req)
    }
}

pub fn make_handler<F, RespBody, Err, Ret>(f: F) -> HandlerFn<F>
where
    RespBody: Body,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Ret: Future<Output = Result<Response<RespBody>, Err>>,
    F: Fn(Request<Bytes>) -> Ret,
{
    HandlerFn { f }
}
