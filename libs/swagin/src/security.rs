//! Security schemes. Each scheme contributes a `securitySchemes` entry to the
//! document and a request-time check that runs before the route's
//! middlewares, binding and handler.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{header, request::Parts, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use thiserror::Error;

use crate::openapi::{
    OAuthFlows, ParameterLocation, SecurityRequirement, SecurityScheme, SecuritySchemeType,
};
use crate::problem::{Problem, ProblemResponse};
use crate::request_id;

pub const BASIC_AUTH: &str = "BasicAuth";
pub const BEARER_AUTH: &str = "BearerAuth";
pub const API_KEY_AUTH: &str = "ApiKeyAuth";
pub const OPENID_AUTH: &str = "OpenIDAuth";
pub const OAUTH2_AUTH: &str = "OAuth2Auth";

/// What a successful check extracted from the request. Stored in request
/// extensions for handlers to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    Token(String),
    ApiKey(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credentials: {0}")]
    Missing(&'static str),
    #[error("malformed credentials: {0}")]
    Malformed(&'static str),
    #[error("credentials rejected")]
    Rejected,
}

/// Accepts or rejects extracted credentials.
pub type Verifier = Arc<dyn Fn(&Credentials) -> bool + Send + Sync>;

#[async_trait]
pub trait Security: Send + Sync + 'static {
    /// Key of the scheme under `components.securitySchemes`.
    fn provider(&self) -> &str;

    fn scheme(&self) -> SecurityScheme;

    async fn authorize(&self, parts: &Parts) -> Result<Credentials, AuthError>;

    /// Applies the outcome of [`authorize`](Self::authorize). `Err` carries
    /// the response that ends the request.
    async fn callback(
        &self,
        parts: &mut Parts,
        outcome: Result<Credentials, AuthError>,
    ) -> Result<(), Response> {
        match outcome {
            Ok(credentials) => {
                parts.extensions.insert(credentials);
                Ok(())
            }
            Err(err) => {
                tracing::debug!(provider = self.provider(), error = %err, "request not authorized");
                let problem = Problem::new(StatusCode::UNAUTHORIZED, err.to_string())
                    .with_code("UNAUTHORIZED")
                    .with_instance(parts.uri.path())
                    .with_request_id(request_id::from_headers(&parts.headers));
                Err(ProblemResponse(problem).into_response())
            }
        }
    }
}

fn verified(verifier: &Option<Verifier>, credentials: Credentials) -> Result<Credentials, AuthError> {
    match verifier {
        Some(verify) if !verify(&credentials) => Err(AuthError::Rejected),
        _ => Ok(credentials),
    }
}

fn authorization<'a>(parts: &'a Parts, scheme: &'static str) -> Result<&'a str, AuthError> {
    let value = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::Missing("authorization header"))?
        .to_str()
        .map_err(|_| AuthError::Malformed("authorization header is not ASCII"))?;
    match value.split_once(' ') {
        Some((name, rest)) if name.eq_ignore_ascii_case(scheme) => Ok(rest.trim()),
        _ => Err(AuthError::Malformed("unexpected authorization scheme")),
    }
}

fn bearer_token(parts: &Parts) -> Result<Credentials, AuthError> {
    let token = authorization(parts, "Bearer")?;
    if token.is_empty() {
        return Err(AuthError::Missing("bearer token"));
    }
    Ok(Credentials::Token(token.to_owned()))
}

/// HTTP basic authentication.
#[derive(Clone, Default)]
pub struct HttpBasic {
    verifier: Option<Verifier>,
}

impl HttpBasic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verify(mut self, f: impl Fn(&Credentials) -> bool + Send + Sync + 'static) -> Self {
        self.verifier = Some(Arc::new(f));
        self
    }
}

#[async_trait]
impl Security for HttpBasic {
    fn provider(&self) -> &str {
        BASIC_AUTH
    }

    fn scheme(&self) -> SecurityScheme {
        SecurityScheme {
            scheme: Some("basic".into()),
            ..SecurityScheme::new(SecuritySchemeType::Http)
        }
    }

    async fn authorize(&self, parts: &Parts) -> Result<Credentials, AuthError> {
        let encoded = authorization(parts, "Basic")?;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| AuthError::Malformed("basic credentials are not base64"))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| AuthError::Malformed("basic credentials are not UTF-8"))?;
        let (username, password) = decoded
            .split_once(':')
            .ok_or(AuthError::Malformed("basic credentials lack a colon"))?;
        verified(
            &self.verifier,
            Credentials::Basic {
                username: username.to_owned(),
                password: password.to_owned(),
            },
        )
    }
}

/// HTTP bearer authentication.
#[derive(Clone, Default)]
pub struct HttpBearer {
    bearer_format: Option<String>,
    verifier: Option<Verifier>,
}

impl HttpBearer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documented token format, e.g. `JWT`.
    pub fn bearer_format(mut self, format: impl Into<String>) -> Self {
        self.bearer_format = Some(format.into());
        self
    }

    pub fn verify(mut self, f: impl Fn(&Credentials) -> bool + Send + Sync + 'static) -> Self {
        self.verifier = Some(Arc::new(f));
        self
    }
}

#[async_trait]
impl Security for HttpBearer {
    fn provider(&self) -> &str {
        BEARER_AUTH
    }

    fn scheme(&self) -> SecurityScheme {
        SecurityScheme {
            scheme: Some("bearer".into()),
            bearer_format: self.bearer_format.clone(),
            ..SecurityScheme::new(SecuritySchemeType::Http)
        }
    }

    async fn authorize(&self, parts: &Parts) -> Result<Credentials, AuthError> {
        verified(&self.verifier, bearer_token(parts)?)
    }
}

/// API key carried in a header, a query parameter or a cookie.
#[derive(Clone)]
pub struct ApiKey {
    name: String,
    location: ParameterLocation,
    verifier: Option<Verifier>,
}

impl ApiKey {
    pub fn header(name: impl Into<String>) -> Self {
        Self::at(name, ParameterLocation::Header)
    }

    pub fn query(name: impl Into<String>) -> Self {
        Self::at(name, ParameterLocation::Query)
    }

    pub fn cookie(name: impl Into<String>) -> Self {
        Self::at(name, ParameterLocation::Cookie)
    }

    fn at(name: impl Into<String>, location: ParameterLocation) -> Self {
        Self {
            name: name.into(),
            location,
            verifier: None,
        }
    }

    pub fn verify(mut self, f: impl Fn(&Credentials) -> bool + Send + Sync + 'static) -> Self {
        self.verifier = Some(Arc::new(f));
        self
    }

    fn extract(&self, parts: &Parts) -> Option<String> {
        match self.location {
            ParameterLocation::Header => parts
                .headers
                .get(self.name.as_str())
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
            ParameterLocation::Query => form_urlencoded::parse(
                parts.uri.query().unwrap_or_default().as_bytes(),
            )
            .find(|(k, _)| k == self.name.as_str())
            .map(|(_, v)| v.into_owned()),
            ParameterLocation::Cookie => parts
                .headers
                .get_all(header::COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .flat_map(|raw| raw.split(';'))
                .filter_map(|pair| pair.trim().split_once('='))
                .find(|(k, _)| *k == self.name)
                .map(|(_, v)| v.to_owned()),
            ParameterLocation::Path => None,
        }
    }
}

#[async_trait]
impl Security for ApiKey {
    fn provider(&self) -> &str {
        API_KEY_AUTH
    }

    fn scheme(&self) -> SecurityScheme {
        SecurityScheme {
            name: Some(self.name.clone()),
            location: Some(self.location),
            ..SecurityScheme::new(SecuritySchemeType::ApiKey)
        }
    }

    async fn authorize(&self, parts: &Parts) -> Result<Credentials, AuthError> {
        let key = self
            .extract(parts)
            .filter(|k| !k.is_empty())
            .ok_or(AuthError::Missing("api key"))?;
        verified(&self.verifier, Credentials::ApiKey(key))
    }
}

/// OpenID Connect discovery; requests carry a bearer token.
#[derive(Clone)]
pub struct OpenIdConnect {
    url: String,
    verifier: Option<Verifier>,
}

impl OpenIdConnect {
    pub fn new(open_id_connect_url: impl Into<String>) -> Self {
        Self {
            url: open_id_connect_url.into(),
            verifier: None,
        }
    }

    pub fn verify(mut self, f: impl Fn(&Credentials) -> bool + Send + Sync + 'static) -> Self {
        self.verifier = Some(Arc::new(f));
        self
    }
}

#[async_trait]
impl Security for OpenIdConnect {
    fn provider(&self) -> &str {
        OPENID_AUTH
    }

    fn scheme(&self) -> SecurityScheme {
        SecurityScheme {
            open_id_connect_url: Some(self.url.clone()),
            ..SecurityScheme::new(SecuritySchemeType::OpenIdConnect)
        }
    }

    async fn authorize(&self, parts: &Parts) -> Result<Credentials, AuthError> {
        verified(&self.verifier, bearer_token(parts)?)
    }
}

/// OAuth2 with the documented flows; requests carry a bearer token.
#[derive(Clone, Default)]
pub struct OAuth2 {
    flows: OAuthFlows,
    verifier: Option<Verifier>,
}

impl OAuth2 {
    pub fn new(flows: OAuthFlows) -> Self {
        Self {
            flows,
            verifier: None,
        }
    }

    pub fn verify(mut self, f: impl Fn(&Credentials) -> bool + Send + Sync + 'static) -> Self {
        self.verifier = Some(Arc::new(f));
        self
    }
}

#[async_trait]
impl Security for OAuth2 {
    fn provider(&self) -> &str {
        OAUTH2_AUTH
    }

    fn scheme(&self) -> SecurityScheme {
        SecurityScheme {
            flows: Some(self.flows.clone()),
            ..SecurityScheme::new(SecuritySchemeType::OAuth2)
        }
    }

    async fn authorize(&self, parts: &Parts) -> Result<Credentials, AuthError> {
        verified(&self.verifier, bearer_token(parts)?)
    }
}

/// Runs every check in order; the first failure ends the request.
pub(crate) async fn gate(securities: Arc<[Arc<dyn Security>]>, req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();
    for security in securities.iter() {
        let outcome = security.authorize(&parts).await;
        if let Err(rejection) = security.callback(&mut parts, outcome).await {
            return rejection;
        }
    }
    next.run(Request::from_parts(parts, body)).await
}

/// Requirement objects for an operation, one per scheme with no scopes.
pub(crate) fn requirements(securities: &[Arc<dyn Security>]) -> Vec<SecurityRequirement> {
    securities
        .iter()
        .map(|s| BTreeMap::from([(s.provider().to_owned(), Vec::new())]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn parts(name: &str, value: &str, uri: &str) -> Parts {
        axum::http::Request::builder()
            .uri(uri)
            .header(name, value)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[tokio::test]
    async fn basic_credentials_are_decoded() {
        // "ann:secret"
        let p = parts("authorization", "Basic YW5uOnNlY3JldA==", "/");
        let credentials = HttpBasic::new().authorize(&p).await.unwrap();
        assert_eq!(
            credentials,
            Credentials::Basic {
                username: "ann".into(),
                password: "secret".into()
            }
        );
    }

    #[tokio::test]
    async fn verifier_can_reject() {
        let p = parts("authorization", "Bearer nope", "/");
        let bearer = HttpBearer::new().verify(|c| *c == Credentials::Token("ok".into()));
        assert_eq!(bearer.authorize(&p).await, Err(AuthError::Rejected));
    }

    #[tokio::test]
    async fn api_key_locations() {
        let p = parts("x-api-key", "k1", "/?key=k2");
        assert_eq!(
            ApiKey::header("X-API-Key").authorize(&p).await,
            Ok(Credentials::ApiKey("k1".into()))
        );
        assert_eq!(
            ApiKey::query("key").authorize(&p).await,
            Ok(Credentials::ApiKey("k2".into()))
        );
        let p = parts("cookie", "a=1; key=k3", "/");
        assert_eq!(
            ApiKey::cookie("key").authorize(&p).await,
            Ok(Credentials::ApiKey("k3".into()))
        );
    }

    #[tokio::test]
    async fn default_callback_stores_credentials_or_answers_401() {
        let bearer = HttpBearer::new();
        let mut p = parts("authorization", "Bearer t", "/items");
        bearer
            .callback(&mut p, Ok(Credentials::Token("t".into())))
            .await
            .unwrap();
        assert_eq!(
            p.extensions.get::<Credentials>(),
            Some(&Credentials::Token("t".into()))
        );

        let response = bearer
            .callback(&mut p, Err(AuthError::Missing("bearer token")))
            .await
            .unwrap_err();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn schemes_describe_themselves() {
        let scheme = ApiKey::cookie("sid").scheme();
        assert_eq!(scheme.scheme_type, SecuritySchemeType::ApiKey);
        assert_eq!(scheme.location, Some(ParameterLocation::Cookie));
        assert_eq!(HttpBasic::new().scheme().scheme.as_deref(), Some("basic"));
        let value = serde_json::to_value(OpenIdConnect::new("https://id/.well-known").scheme()).unwrap();
        assert_eq!(value["type"], "openIdConnect");
        assert_eq!(value["openIdConnectUrl"], "https://id/.well-known");
    }
}
