//! Documentation settings and assembly of the OpenAPI document from the
//! registered routes.

use std::collections::{BTreeMap, HashMap};

use axum::http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::openapi::{
    Components, Contact, Info, License, OpenApi, Operation, PathItem, Server, OPENAPI_VERSION,
};
use crate::path::document_path;
use crate::route::Route;
use crate::schema::{parameters_for, request_body_for, responses_for};
use crate::security;

/// Routes by registered path, then by method.
pub type RouteTable = BTreeMap<String, HashMap<Method, Route>>;

/// Documentation settings of an application. Every field has a default, so
/// a configuration section may name only what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Swagger {
    pub title: String,
    pub description: String,
    pub version: String,
    pub terms_of_service: Option<String>,
    pub contact: Option<Contact>,
    pub license: Option<License>,
    pub servers: Vec<Server>,
    /// Where the document is served. A `.yml`/`.yaml` suffix serves YAML.
    pub openapi_url: String,
    pub docs_url: String,
    pub redoc_url: String,
    /// Passed verbatim to `SwaggerUIBundle`.
    pub swagger_options: Map<String, Value>,
    /// Passed verbatim to `Redoc.init`.
    pub redoc_options: Map<String, Value>,
}

impl Default for Swagger {
    fn default() -> Self {
        Self {
            title: "API".to_owned(),
            description: String::new(),
            version: "0.1.0".to_owned(),
            terms_of_service: None,
            contact: None,
            license: None,
            servers: Vec::new(),
            openapi_url: "/openapi.json".to_owned(),
            docs_url: "/docs".to_owned(),
            redoc_url: "/redoc".to_owned(),
            swagger_options: Map::new(),
            redoc_options: Map::new(),
        }
    }
}

impl Swagger {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    pub fn with_openapi_url(mut self, url: impl Into<String>) -> Self {
        self.openapi_url = url.into();
        self
    }

    pub fn with_docs_url(mut self, url: impl Into<String>) -> Self {
        self.docs_url = url.into();
        self
    }

    pub fn with_redoc_url(mut self, url: impl Into<String>) -> Self {
        self.redoc_url = url.into();
        self
    }

    pub fn with_server(mut self, server: Server) -> Self {
        self.servers.push(server);
        self
    }

    pub fn with_terms_of_service(mut self, url: impl Into<String>) -> Self {
        self.terms_of_service = Some(url.into());
        self
    }

    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contact = Some(contact);
        self
    }

    pub fn with_license(mut self, license: License) -> Self {
        self.license = Some(license);
        self
    }

    pub fn with_swagger_options(mut self, options: Map<String, Value>) -> Self {
        self.swagger_options = options;
        self
    }

    pub fn with_redoc_options(mut self, options: Map<String, Value>) -> Self {
        self.redoc_options = options;
        self
    }

    pub fn serves_yaml(&self) -> bool {
        self.openapi_url.ends_with(".yml") || self.openapi_url.ends_with(".yaml")
    }

    fn info(&self) -> Info {
        Info {
            title: self.title.clone(),
            description: non_empty(&self.description),
            terms_of_service: self.terms_of_service.clone(),
            contact: self.contact.clone(),
            license: self.license.clone(),
            version: self.version.clone(),
        }
    }

    /// Builds the document. Excluded routes and methods without an OpenAPI
    /// slot are left out; a security scheme used by several routes is
    /// described by the last one visited.
    pub fn build_openapi(&self, routes: &RouteTable) -> Result<OpenApi, SchemaError> {
        let mut components = Components::default();
        let mut paths = BTreeMap::new();

        for (path, methods) in routes {
            let mut item = PathItem::default();
            for (method, route) in methods {
                if route.exclude {
                    continue;
                }
                let Some(slot) = item.slot_mut(method) else {
                    tracing::debug!(%method, path, "method has no OpenAPI slot");
                    continue;
                };
                *slot = Some(operation(route, &mut components)?);
            }
            if !item.is_empty() {
                paths.insert(document_path(path).into_owned(), item);
            }
        }

        tracing::info!(title = %self.title, paths = paths.len(), "built OpenAPI document");
        Ok(OpenApi {
            openapi: OPENAPI_VERSION.to_owned(),
            info: self.info(),
            servers: self.servers.clone(),
            paths,
            components,
        })
    }
}

fn operation(route: &Route, components: &mut Components) -> Result<Operation, SchemaError> {
    for scheme in &route.securities {
        components
            .security_schemes
            .insert(scheme.provider().to_owned(), scheme.scheme());
    }
    Ok(Operation {
        tags: route.tags.clone(),
        summary: non_empty(&route.summary),
        description: non_empty(&route.description),
        operation_id: non_empty(&route.operation_id),
        parameters: parameters_for(&route.model)?,
        request_body: request_body_for(&route.model, &route.request_content_type)?,
        responses: responses_for(&route.responses, &route.response_content_type)?,
        deprecated: route.deprecated,
        security: security::requirements(&route.securities),
    })
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_owned())
}
