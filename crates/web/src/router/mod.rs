//! The route table.
//!
//! Routes are registered through a [`RouterBuilder`] and are immutable once the
//! [`Router`] is built. Each route has a [`HookKind`], an optional method filter
//! and a [`FlowHandler`]. For one request, [`Router::at`] returns every matching
//! before hook, the first matching main route and every matching after hook,
//! all in registration order.
//!
//! ```
//! use wisp_web::router::{Router, any, get};
//! use wisp_web::{Flow, HandlerResult, handler_fn, sync_handler_fn};
//!
//! async fn index(flow: &mut Flow) -> HandlerResult {
//!     flow.send_file("web/index.html");
//!     Ok(())
//! }
//!
//! fn cors(flow: &mut Flow) -> HandlerResult {
//!     flow.tail.insert("access-control-allow-origin", "*".parse()?);
//!     Ok(())
//! }
//!
//! let router = Router::builder()
//!     .route("index.html", get(handler_fn(index)))
//!     .after("", any(sync_handler_fn(cors)))
//!     .build();
//! ```

mod pattern;

use crate::handler::FlowHandler;
use http::Method;
use pattern::Pattern;
use std::fmt;

/// Phase of the hook chain a route runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Before,
    Main,
    After,
}

/// A registered route.
pub struct Route {
    pattern: Pattern,
    kind: HookKind,
    method: Option<Method>,
    handler: Box<dyn FlowHandler>,
}

impl Route {
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn kind(&self) -> HookKind {
        self.kind
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn handler(&self) -> &dyn FlowHandler {
        self.handler.as_ref()
    }

    fn matches(&self, path: &str, method: &Method) -> Option<Option<String>> {
        if self.method.as_ref().is_some_and(|m| m != method) {
            return None;
        }
        self.pattern.matches(path)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("kind", &self.kind)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// A route that matched a request, with the wildcard tail it captured.
#[derive(Debug)]
pub struct Matched<'router> {
    pub route: &'router Route,
    pub captured: Option<String>,
}

/// Result of matching a path against the router.
#[derive(Debug, Default)]
pub struct RouteMatch<'router> {
    pub befores: Vec<Matched<'router>>,
    pub main: Option<Matched<'router>>,
    pub afters: Vec<Matched<'router>>,
}

/// Main router structure that holds the ordered route list
#[derive(Debug)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Matches a path and a method against every route
    ///
    /// # Arguments
    /// * `path` - The request path, with or without the leading `/`
    /// * `method` - The request method, checked against method filters
    pub fn at<'router>(&'router self, path: &str, method: &Method) -> RouteMatch<'router> {
        let mut route_match = RouteMatch::default();

        for route in &self.routes {
            if route.kind == HookKind::Main && route_match.main.is_some() {
                continue;
            }

            let Some(captured) = route.matches(path, method) else {
                continue;
            };

            let matched = Matched { route, captured };
            match route.kind {
                HookKind::Before => route_match.befores.push(matched),
                HookKind::Main => route_match.main = Some(matched),
                HookKind::After => route_match.afters.push(matched),
            }
        }

        route_match
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

#[derive(Debug, Default)]
pub struct RouterBuilder {
    routes: Vec<Route>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Adds a route; `method == None` matches every method.
    #[must_use]
    pub fn register<H>(mut self, pattern: impl Into<String>, kind: HookKind, method: Option<Method>, handler: H) -> Self
    where
        H: FlowHandler + 'static,
    {
        self.routes.push(Route { pattern: Pattern::parse(pattern), kind, method, handler: Box::new(handler) });
        self
    }

    #[must_use]
    pub fn before(self, pattern: impl Into<String>, item: RouteItem) -> Self {
        self.push(pattern, HookKind::Before, item)
    }

    #[must_use]
    pub fn route(self, pattern: impl Into<String>, item: RouteItem) -> Self {
        self.push(pattern, HookKind::Main, item)
    }

    #[must_use]
    pub fn after(self, pattern: impl Into<String>, item: RouteItem) -> Self {
        self.push(pattern, HookKind::After, item)
    }

    fn push(mut self, pattern: impl Into<String>, kind: HookKind, item: RouteItem) -> Self {
        self.routes.push(Route { pattern: Pattern::parse(pattern), kind, method: item.method, handler: item.handler });
        self
    }

    pub fn build(self) -> Router {
        Router { routes: self.routes }
    }
}

/// A handler with its method filter, waiting for a pattern and a hook kind.
pub struct RouteItem {
    method: Option<Method>,
    handler: Box<dyn FlowHandler>,
}

impl fmt::Debug for RouteItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteItem").field("method", &self.method).finish_non_exhaustive()
    }
}

/// Matches every method.
pub fn any<H: FlowHandler + 'static>(handler: H) -> RouteItem {
    RouteItem { method: None, handler: Box::new(handler) }
}

/// Matches only `method`.
pub fn method<H: FlowHandler + 'static>(method: Method, handler: H) -> RouteItem {
    RouteItem { method: Some(method), handler: Box::new(handler) }
}

macro_rules! method_route_item {
    ($name:ident, $method:ident) => {
        pub fn $name<H: FlowHandler + 'static>(handler: H) -> RouteItem {
            method(Method::$method, handler)
        }
    };
}

method_route_item!(get, GET);
method_route_item!(post, POST);
method_route_item!(put, PUT);
method_route_item!(delete, DELETE);
method_route_item!(head, HEAD);
method_route_item!(options, OPTIONS);
method_route_item!(connect, CONNECT);
method_route_item!(patch, PATCH);
method_route_item!(trace, TRACE);
