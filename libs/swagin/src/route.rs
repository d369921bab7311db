//! Route descriptors: the handler, its model and the metadata documented for
//! the operation.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::{request::Parts, Extensions, HeaderMap, Method, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;

use crate::binding;
use crate::error::{ErrorContext, ErrorHandler};
use crate::model::{Model, ModelDoc};
use crate::openapi::Header;
use crate::request_id::{self, RequestId};
use crate::security::{Credentials, Security};
use crate::shape::{Describe, TypeShape};
use crate::validate::ModelValidator;

pub const APPLICATION_JSON: &str = "application/json";

/// Route middleware, applied around binding and the handler.
pub type Middleware = Arc<dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync>;

/// Wraps an async function as a [`Middleware`].
pub fn middleware<F, Fut>(f: F) -> Middleware
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |req, next| Box::pin(f(req, next)))
}

/// Per-application services a route needs at request time.
#[derive(Clone)]
pub(crate) struct RouteEnv {
    pub(crate) validator: Arc<dyn ModelValidator>,
    pub(crate) error_handler: ErrorHandler,
}

pub(crate) type Endpoint = Arc<dyn Fn(Request, RouteEnv) -> BoxFuture<'static, Response> + Send + Sync>;

/// Which side of the exchange a content type documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentTypeKind {
    Request,
    Response,
}

/// Request metadata handed to handlers next to the bound model.
#[derive(Debug)]
pub struct RequestContext {
    parts: Parts,
}

impl RequestContext {
    pub(crate) fn new(parts: Parts) -> Self {
        Self { parts }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    /// Credentials stored by the route's security check, if any.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.parts.extensions.get()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.parts
            .extensions
            .get::<RequestId>()
            .map(|id| id.0.as_str())
            .or_else(|| request_id::from_headers(&self.parts.headers))
    }

    pub fn into_parts(self) -> Parts {
        self.parts
    }
}

/// One documented response.
#[derive(Debug, Clone, Default)]
pub struct ResponseItem {
    pub description: String,
    pub model: Option<TypeShape>,
    pub headers: BTreeMap<String, Header>,
}

impl ResponseItem {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn model<T: Describe>(mut self) -> Self {
        self.model = Some(T::describe());
        self
    }

    pub fn header(mut self, name: impl Into<String>, header: Header) -> Self {
        self.headers.insert(name.into(), header);
        self
    }
}

/// Responses keyed by status code (or `default`).
pub type Responses = BTreeMap<String, ResponseItem>;

pub struct Route {
    pub(crate) endpoint: Endpoint,
    pub(crate) model: ModelDoc,
    pub(crate) summary: String,
    pub(crate) description: String,
    pub(crate) operation_id: String,
    pub(crate) tags: Vec<String>,
    pub(crate) deprecated: bool,
    pub(crate) exclude: bool,
    pub(crate) request_content_type: String,
    pub(crate) response_content_type: String,
    pub(crate) responses: Responses,
    pub(crate) securities: Vec<Arc<dyn Security>>,
    pub(crate) middlewares: Vec<Middleware>,
}

impl Route {
    /// A route whose handler receives the bound and validated model.
    pub fn new<M, H, Fut, R>(handler: H) -> Self
    where
        M: Model,
        H: Fn(RequestContext, M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        let shape = Arc::new(M::shape());
        let model = shape.doc();
        let handler = Arc::new(handler);
        let endpoint: Endpoint = Arc::new(move |req: Request, env: RouteEnv| {
            let shape = Arc::clone(&shape);
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let instance = req.uri().path().to_owned();
                let request_id = request_id::from_headers(req.headers()).map(str::to_owned);
                match binding::bind(&shape, req, env.validator.as_ref()).await {
                    Ok((parts, model)) => {
                        handler(RequestContext::new(parts), model).await.into_response()
                    }
                    Err(err) => {
                        tracing::warn!(path = %instance, error = %err, "request binding failed");
                        let ctx = ErrorContext {
                            status: err.status(),
                            instance,
                            request_id,
                        };
                        (env.error_handler)(&ctx, err)
                    }
                }
            })
        });
        Self::with_endpoint(endpoint, model)
    }

    /// A route that reads the raw request itself. Documents no parameters.
    pub fn raw<H, Fut, R>(handler: H) -> Self
    where
        H: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        let handler = Arc::new(handler);
        let endpoint: Endpoint = Arc::new(move |req: Request, _env: RouteEnv| {
            let handler = Arc::clone(&handler);
            Box::pin(async move { handler(req).await.into_response() })
        });
        Self::with_endpoint(endpoint, ModelDoc::default())
    }

    fn with_endpoint(endpoint: Endpoint, model: ModelDoc) -> Self {
        Self {
            endpoint,
            model,
            summary: String::new(),
            description: String::new(),
            operation_id: String::new(),
            tags: Vec::new(),
            deprecated: false,
            exclude: false,
            request_content_type: APPLICATION_JSON.to_owned(),
            response_content_type: APPLICATION_JSON.to_owned(),
            responses: Responses::new(),
            securities: Vec::new(),
            middlewares: Vec::new(),
        }
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = id.into();
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Keeps the route out of the document. It is still served.
    pub fn exclude(mut self) -> Self {
        self.exclude = true;
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn security(mut self, security: impl Security) -> Self {
        self.securities.push(Arc::new(security));
        self
    }

    pub fn response(mut self, status: impl ToString, item: ResponseItem) -> Self {
        self.responses.insert(status.to_string(), item);
        self
    }

    pub fn responses(mut self, responses: Responses) -> Self {
        self.responses.extend(responses);
        self
    }

    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>, kind: ContentTypeKind) -> Self {
        match kind {
            ContentTypeKind::Request => self.request_content_type = content_type.into(),
            ContentTypeKind::Response => self.response_content_type = content_type.into(),
        }
        self
    }

    /// Prepends inherited tags, securities and middlewares, so that the
    /// outer scope's checks run first.
    pub(crate) fn inherit(
        mut self,
        tags: &[String],
        securities: &[Arc<dyn Security>],
        middlewares: &[Middleware],
    ) -> Self {
        self.tags = tags.iter().cloned().chain(self.tags).collect();
        self.securities = securities.iter().cloned().chain(self.securities).collect();
        self.middlewares = middlewares.iter().cloned().chain(self.middlewares).collect();
        self
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("summary", &self.summary)
            .field("operation_id", &self.operation_id)
            .field("tags", &self.tags)
            .field("exclude", &self.exclude)
            .field("securities", &self.securities.len())
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}
