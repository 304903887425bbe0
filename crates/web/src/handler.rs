//! Flow handlers.
//!
//! Every hook registered on a [`Router`](crate::Router) is a [`FlowHandler`]. Plain
//! functions are adapted with:
//!
//! - [`handler_fn`]: `async fn(&mut Flow) -> HandlerResult`
//! - [`sync_handler_fn`]: `fn(&mut Flow) -> HandlerResult`
//! - [`args_handler_fn`]: `async fn(&mut Flow, &A) -> HandlerResult`, with `A` bound at registration
//!
//! The dispatcher awaits all of them the same way.

use crate::error::HandlerResult;
use crate::flow::Flow;
use async_trait::async_trait;

#[async_trait(?Send)]
pub trait FlowHandler {
    async fn call(&self, flow: &mut Flow) -> HandlerResult;
}

/// A suspending handler function, see [`handler_fn`].
#[derive(Debug)]
pub struct FnHandler<F> {
    f: F,
}

/// A synchronous handler function, see [`sync_handler_fn`].
#[derive(Debug)]
pub struct SyncFnHandler<F> {
    f: F,
}

/// A handler function called with arguments bound at registration, see [`args_handler_fn`].
#[derive(Debug)]
pub struct ArgsFnHandler<F, A> {
    f: F,
    args: A,
}

pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: AsyncFn(&mut Flow) -> HandlerResult,
{
    FnHandler { f }
}

pub fn sync_handler_fn<F>(f: F) -> SyncFnHandler<F>
where
    F: Fn(&mut Flow) -> HandlerResult,
{
    SyncFnHandler { f }
}

/// Binds `args` to `f`; every call receives a reference to them next to the flow.
///
/// ```
/// use wisp_web::{Flow, HandlerResult, args_handler_fn};
///
/// async fn tagged(flow: &mut Flow, (title, tag): &(&'static str, &'static str)) -> HandlerResult {
///     flow.tail.insert("my-tag", tag.parse()?);
///     flow.send_text(*title);
///     Ok(())
/// }
///
/// let handler = args_handler_fn(("I'm robot", "tag1"), tagged);
/// ```
pub fn args_handler_fn<F, A>(args: A, f: F) -> ArgsFnHandler<F, A>
where
    F: AsyncFn(&mut Flow, &A) -> HandlerResult,
{
    ArgsFnHandler { f, args }
}

#[async_trait(?Send)]
impl<F> FlowHandler for FnHandler<F>
where
    F: AsyncFn(&mut Flow) -> HandlerResult,
{
    async fn call(&self, flow: &mut Flow) -> HandlerResult {
        (self.f)(flow).await
    }
}

#[async_trait(?Send)]
impl<F> FlowHandler for SyncFnHandler<F>
where
    F: Fn(&mut Flow) -> HandlerResult,
{
    async fn call(&self, flow: &mut Flow) -> HandlerResult {
        (self.f)(flow)
    }
}

#[async_trait(?Send)]
impl<F, A> FlowHandler for ArgsFnHandler<F, A>
where
    F: AsyncFn(&mut Flow, &A) -> HandlerResult,
{
    async fn call(&self, flow: &mut Flow) -> HandlerResult {
        (self.f)(flow, &self.args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use bytes::Bytes;

    fn flow() -> Flow {
        let request = http::Request::builder().uri("/test/1").body(Bytes::new()).unwrap();
        Flow::new(Request::from(request))
    }

    async fn suspending(flow: &mut Flow) -> HandlerResult {
        tokio::task::yield_now().await;
        flow.send_text("suspending");
        Ok(())
    }

    fn synchronous(flow: &mut Flow) -> HandlerResult {
        flow.send_text("synchronous");
        Ok(())
    }

    async fn with_args(flow: &mut Flow, title: &String) -> HandlerResult {
        flow.send_text(title.clone());
        Ok(())
    }

    async fn body_text(handler: &dyn FlowHandler) -> Option<Bytes> {
        let mut flow = flow();
        handler.call(&mut flow).await.unwrap();
        match flow.output() {
            crate::Output::Bytes(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn all_handler_kinds_share_one_interface() {
        let handlers: Vec<Box<dyn FlowHandler>> = vec![
            Box::new(handler_fn(suspending)),
            Box::new(sync_handler_fn(synchronous)),
            Box::new(args_handler_fn("with args".to_string(), with_args)),
        ];

        let mut texts = vec![];
        for handler in &handlers {
            texts.push(body_text(handler.as_ref()).await.unwrap());
        }

        assert_eq!(texts, vec!["suspending", "synchronous", "with args"]);
    }

    #[tokio::test]
    async fn errors_propagate() {
        let handler = sync_handler_fn(|_flow: &mut Flow| Err("denied".into()));
        let mut flow = flow();
        let error = handler.call(&mut flow).await.unwrap_err();
        assert_eq!(error.to_string(), "denied");
    }
}
