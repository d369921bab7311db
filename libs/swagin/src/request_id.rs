//! Request ids: generated when the client sent none, echoed on the response,
//! exposed to handlers and recorded on the request span.

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName};
use axum::{middleware::Next, response::Response};
use tower_http::request_id::{MakeRequestId, RequestId as TowerRequestId};
use tracing::field::Empty;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Id of the current request, available in request extensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

#[derive(Clone, Copy, Debug, Default)]
pub struct NanoRequestId;

impl MakeRequestId for NanoRequestId {
    fn make_request_id<B>(&mut self, _req: &axum::http::Request<B>) -> Option<TowerRequestId> {
        let id = nanoid::nanoid!();
        Some(TowerRequestId::new(id.parse().ok()?))
    }
}

pub(crate) fn from_headers(headers: &HeaderMap) -> Option<&str> {
    headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok())
}

pub(crate) async fn expose(mut req: Request, next: Next) -> Response {
    if let Some(id) = from_headers(req.headers()).map(str::to_owned) {
        tracing::Span::current().record("request_id", tracing::field::display(&id));
        req.extensions_mut().insert(RequestId(id));
    }
    next.run(req).await
}

pub(crate) fn span_for(req: &Request) -> tracing::Span {
    tracing::info_span!(
        "http_request",
        method = %req.method(),
        path = %req.uri().path(),
        request_id = from_headers(req.headers()).unwrap_or("n/a"),
        status = Empty,
    )
}
