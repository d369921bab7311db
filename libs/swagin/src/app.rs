//! The application registry: routes, groups, mounted sub-applications and
//! the docs endpoints, turned into an axum [`Router`] on init.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::http::Method;
use axum::middleware::{from_fn, Next};
use axum::routing::{on, MethodFilter, MethodRouter};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::docs;
use crate::document::{RouteTable, Swagger};
use crate::error::{default_error_handler, ErrorHandler, InitError, SchemaError};
use crate::group::Group;
use crate::openapi::{OpenApi, Server};
use crate::path::{join, match_key, router_path};
use crate::request_id::{self, NanoRequestId, REQUEST_ID_HEADER};
use crate::route::{Endpoint, Middleware, Route, RouteEnv};
use crate::security::{self, Security};
use crate::validate::{DeriveValidator, ModelValidator};

pub const DEFAULT_ADDR: &str = "0.0.0.0:8081";
pub const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

type Hook = Box<dyn FnOnce() + Send>;

pub struct App {
    swagger: Option<Swagger>,
    routes: RouteTable,
    sub_apps: Vec<(String, App)>,
    middlewares: Vec<Middleware>,
    error_handler: Option<ErrorHandler>,
    validator: Arc<dyn ModelValidator>,
    before_init: Option<Hook>,
    after_init: Option<Hook>,
    cors: bool,
    body_limit: usize,
    timeout: Duration,
}

impl Default for App {
    fn default() -> Self {
        Self::new(None)
    }
}

impl App {
    /// An application documented by `swagger`. Without it the routes are
    /// served but no document or docs pages are.
    pub fn new(swagger: Option<Swagger>) -> Self {
        Self {
            swagger,
            routes: RouteTable::new(),
            sub_apps: Vec::new(),
            middlewares: Vec::new(),
            error_handler: None,
            validator: Arc::new(DeriveValidator),
            before_init: None,
            after_init: None,
            cors: false,
            body_limit: DEFAULT_BODY_LIMIT,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn swagger(&self) -> Option<&Swagger> {
        self.swagger.as_ref()
    }

    /// Registers `route` for `method` on `path`. A second registration of
    /// the same pair replaces the first.
    pub fn handle(&mut self, path: &str, method: Method, route: Route) -> &mut Self {
        tracing::debug!(%method, path, "registering route");
        let methods = self.routes.entry(path.to_owned()).or_default();
        if methods.insert(method.clone(), route).is_some() {
            tracing::warn!(%method, path, "route registered twice, keeping the last one");
        }
        self
    }

    pub fn get(&mut self, path: &str, route: Route) -> &mut Self {
        self.handle(path, Method::GET, route)
    }

    pub fn post(&mut self, path: &str, route: Route) -> &mut Self {
        self.handle(path, Method::POST, route)
    }

    pub fn put(&mut self, path: &str, route: Route) -> &mut Self {
        self.handle(path, Method::PUT, route)
    }

    pub fn patch(&mut self, path: &str, route: Route) -> &mut Self {
        self.handle(path, Method::PATCH, route)
    }

    pub fn delete(&mut self, path: &str, route: Route) -> &mut Self {
        self.handle(path, Method::DELETE, route)
    }

    pub fn head(&mut self, path: &str, route: Route) -> &mut Self {
        self.handle(path, Method::HEAD, route)
    }

    pub fn options(&mut self, path: &str, route: Route) -> &mut Self {
        self.handle(path, Method::OPTIONS, route)
    }

    /// Routes registered through the group share its prefix, tags,
    /// securities and middlewares.
    pub fn group(&mut self, prefix: &str) -> Group<'_> {
        Group::new(self, prefix)
    }

    /// Serves `app` under `prefix`. Its served document lists the full
    /// prefix, parents' prefixes included, as a server, and when it has no
    /// error handler it uses this application's.
    pub fn mount(&mut self, prefix: &str, app: App) -> &mut Self {
        self.sub_apps.push((prefix.to_owned(), app));
        self
    }

    /// Middleware around every endpoint of this application, docs and
    /// mounted applications included.
    pub fn middleware(&mut self, middleware: Middleware) -> &mut Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn with_error_handler(&mut self, handler: ErrorHandler) -> &mut Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn with_validator(&mut self, validator: impl ModelValidator) -> &mut Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn before_init(&mut self, hook: impl FnOnce() + Send + 'static) -> &mut Self {
        self.before_init = Some(Box::new(hook));
        self
    }

    pub fn after_init(&mut self, hook: impl FnOnce() + Send + 'static) -> &mut Self {
        self.after_init = Some(Box::new(hook));
        self
    }

    /// Permissive CORS for every endpoint.
    pub fn cors(&mut self, enabled: bool) -> &mut Self {
        self.cors = enabled;
        self
    }

    pub fn body_limit(&mut self, bytes: usize) -> &mut Self {
        self.body_limit = bytes;
        self
    }

    pub fn request_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Builds this application's document, `None` when it is undocumented.
    pub fn openapi(&self) -> Result<Option<OpenApi>, SchemaError> {
        self.swagger
            .as_ref()
            .map(|swagger| swagger.build_openapi(&self.routes))
            .transpose()
    }

    /// Runs the init hooks, builds the documents and wires every route.
    pub fn into_router(self) -> Result<Router, InitError> {
        let body_limit = self.body_limit;
        let timeout = self.timeout;
        let cors = self.cors;

        let mut wiring = Wiring::default();
        self.wire("", None, &[], &mut wiring)?;
        let mut router = Router::new();
        for (path, method_router) in wiring.paths {
            router = router.route(&path, method_router);
        }

        router = router.layer(RequestBodyLimitLayer::new(body_limit));
        if cors {
            router = router.layer(CorsLayer::permissive());
        }
        router = router
            .layer(TimeoutLayer::new(timeout))
            .layer(from_fn(request_id::expose))
            .layer(TraceLayer::new_for_http().make_span_with(request_id::span_for))
            .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
            .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, NanoRequestId));
        Ok(router)
    }

    /// Serves on `addr` (default [`DEFAULT_ADDR`]) until SIGINT or SIGTERM.
    pub async fn serve(self, addr: Option<&str>) -> anyhow::Result<()> {
        self.serve_until(addr, crate::shutdown::cancel_on_signal()).await
    }

    /// Serves on `addr` until `cancel` fires, then drains in-flight requests.
    pub async fn serve_until(
        self,
        addr: Option<&str>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let addr = addr.unwrap_or(DEFAULT_ADDR);
        let router = self.into_router()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("HTTP server bound on {}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                tracing::info!("HTTP server shutting down gracefully");
            })
            .await
            .map_err(|e| anyhow::anyhow!(e))
    }

    fn wire(
        mut self,
        prefix: &str,
        inherited_handler: Option<ErrorHandler>,
        outer: &[Middleware],
        wiring: &mut Wiring,
    ) -> Result<(), InitError> {
        if let Some(hook) = self.before_init.take() {
            hook();
        }

        let error_handler = self
            .error_handler
            .clone()
            .or(inherited_handler)
            .unwrap_or_else(default_error_handler);
        let env = RouteEnv {
            validator: Arc::clone(&self.validator),
            error_handler: error_handler.clone(),
        };
        let middlewares: Vec<Middleware> = outer
            .iter()
            .chain(self.middlewares.iter())
            .cloned()
            .collect();

        if let Some(mut swagger) = self.swagger.clone() {
            if !prefix.is_empty() {
                swagger.servers.push(Server::new(prefix));
            }
            let document = swagger.build_openapi(&self.routes)?;
            for (path, method_router) in docs::endpoints(
                &swagger,
                &document,
                &join(prefix, &swagger.openapi_url),
                &join(prefix, &swagger.docs_url),
                &join(prefix, &swagger.redoc_url),
            )? {
                wiring.add(path, Method::GET, with_middlewares(method_router, &middlewares))?;
            }
        }

        for (path, methods) in std::mem::take(&mut self.routes) {
            let full_path = router_path(&join(prefix, &path)).into_owned();
            for (method, route) in methods {
                let method_router = route_endpoint(&method, route, env.clone(), &middlewares)?;
                wiring.add(full_path.clone(), method, method_router)?;
            }
        }

        if let Some(hook) = self.after_init.take() {
            hook();
        }

        for (sub_prefix, sub) in std::mem::take(&mut self.sub_apps) {
            sub.wire(
                &join(prefix, &sub_prefix),
                Some(error_handler.clone()),
                &middlewares,
                wiring,
            )?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct Wiring {
    paths: BTreeMap<String, MethodRouter>,
    seen: HashSet<(String, Method)>,
    by_key: HashMap<String, String>,
}

impl Wiring {
    fn add(
        &mut self,
        path: String,
        method: Method,
        method_router: MethodRouter,
    ) -> Result<(), InitError> {
        if !self.seen.insert((path.clone(), method.clone())) {
            return Err(InitError::Conflict { method, path });
        }
        let key = match_key(&path).into_owned();
        let existing = self.by_key.entry(key).or_insert_with(|| path.clone());
        if *existing != path {
            return Err(InitError::AmbiguousPath {
                path,
                existing: existing.clone(),
            });
        }
        let merged = match self.paths.remove(&path) {
            Some(existing) => existing.merge(method_router),
            None => method_router,
        };
        self.paths.insert(path, merged);
        Ok(())
    }
}

/// Route middlewares innermost, then security checks, then the
/// application's middlewares.
fn route_endpoint(
    method: &Method,
    route: Route,
    env: RouteEnv,
    app_middlewares: &[Middleware],
) -> Result<MethodRouter, InitError> {
    let filter = MethodFilter::try_from(method.clone())
        .map_err(|_| InitError::UnsupportedMethod(method.clone()))?;
    let endpoint: Endpoint = route.endpoint;
    let mut method_router = on(filter, move |req: Request| {
        let endpoint = Arc::clone(&endpoint);
        let env = env.clone();
        async move { endpoint(req, env).await }
    });

    method_router = with_middlewares(method_router, &route.middlewares);
    if !route.securities.is_empty() {
        let securities: Arc<[Arc<dyn Security>]> = route.securities.into();
        method_router = method_router.layer(from_fn(move |req: Request, next: Next| {
            security::gate(Arc::clone(&securities), req, next)
        }));
    }
    Ok(with_middlewares(method_router, app_middlewares))
}

/// The first middleware ends up outermost.
fn with_middlewares(mut method_router: MethodRouter, middlewares: &[Middleware]) -> MethodRouter {
    for middleware in middlewares.iter().rev() {
        let middleware = Arc::clone(middleware);
        method_router =
            method_router.layer(from_fn(move |req: Request, next: Next| middleware(req, next)));
    }
    method_router
}
