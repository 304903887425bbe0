//! Runs the hook chain of one flow.
//!
//! Before hooks run in order against the original path. Matching then runs
//! again on the (possibly rewritten) path to pick the main handler and the
//! after hooks. After hooks always run, even when an earlier hook failed.
//! A failing or panicking hook is logged and skipped; if any hook failed and
//! nothing produced output, the flow answers 500.

use crate::error::FlowError;
use crate::flow::{Flow, Stage};
use crate::router::{Matched, Router};
use futures::FutureExt;
use http::StatusCode;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{error, trace};

pub(crate) async fn dispatch(router: &Router, flow: &mut Flow) {
    let mut failed = false;

    flow.set_stage(Stage::BeforeHooks);
    let befores = router.at(flow.path(), flow.method()).befores;
    for matched in befores {
        failed |= run_hook(flow, matched).await.is_err();
    }

    let route_match = router.at(flow.path(), flow.method());

    flow.set_stage(Stage::MainHandler);
    match route_match.main {
        Some(matched) => failed |= run_hook(flow, matched).await.is_err(),
        None => {
            trace!(path = flow.path(), "no main route matched");
            flow.set_status(StatusCode::NOT_FOUND);
        }
    }

    flow.set_stage(Stage::AfterHooks);
    for matched in route_match.afters {
        failed |= run_hook(flow, matched).await.is_err();
    }

    flow.set_wildcard(None);
    if failed && flow.output().is_unset() {
        flow.set_status(StatusCode::INTERNAL_SERVER_ERROR);
    }
    flow.set_stage(Stage::Responding);
}

async fn run_hook(flow: &mut Flow, matched: Matched<'_>) -> Result<(), FlowError> {
    let Matched { route, captured } = matched;
    flow.set_wildcard(captured);

    let result = AssertUnwindSafe(route.handler().call(flow)).catch_unwind().await;

    let e = match result {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(source)) => FlowError::HandlerFailure { hook: route.kind(), pattern: route.pattern().to_string(), source },
        Err(payload) => FlowError::HandlerPanic {
            hook: route.kind(),
            pattern: route.pattern().to_string(),
            message: panic_message(payload.as_ref()),
        },
    };

    error!(hook = ?route.kind(), pattern = route.pattern(), cause = %e, "hook failed");
    Err(e)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
