//! OpenAPI 3 documents and typed request binding for axum applications.
//!
//! Routes carry a [`Model`] describing the request parts they read (headers,
//! query, cookies, path parameters and body). The same description drives
//! two things: binding and validating incoming requests into the model, and
//! deriving the operation's parameters, request body and responses for the
//! document served next to the API.
//!
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use swagin::{describe, App, Model, ModelShape, RequestContext, ResponseItem, Route, Swagger};
//! use validator::Validate;
//!
//! #[derive(Debug, Default, Deserialize, Validate)]
//! struct Greeting {
//!     #[validate(length(min = 1))]
//!     name: String,
//! }
//!
//! #[derive(Serialize)]
//! struct Reply {
//!     message: String,
//! }
//!
//! describe! {
//!     Greeting { name: String => r#"query:"name" description:"Who to greet""# }
//!     Reply { message: String => r#"json:"message""# }
//! }
//!
//! #[derive(Debug, Default, Validate)]
//! struct Greet {
//!     #[validate(nested)]
//!     query: Greeting,
//! }
//!
//! impl Model for Greet {
//!     fn shape() -> ModelShape<Self> {
//!         ModelShape::new().query(|m: &mut Self, q: Greeting| m.query = q)
//!     }
//! }
//!
//! async fn greet(_: RequestContext, m: Greet) -> axum::Json<Reply> {
//!     axum::Json(Reply { message: format!("hello, {}", m.query.name) })
//! }
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut app = App::new(Some(Swagger::new("Greeter", "", "1.0.0")));
//! app.get(
//!     "/greet",
//!     Route::new(greet)
//!         .summary("Greet someone")
//!         .response("200", ResponseItem::new("Greeting").model::<Reply>()),
//! );
//! app.serve(None).await
//! # }
//! ```

mod app;
mod binding;
mod docs;
mod document;
mod error;
mod group;
mod model;
pub mod openapi;
mod path;
pub mod problem;
pub mod request_id;
mod route;
pub mod rule;
pub mod schema;
pub mod security;
mod shape;
mod shutdown;
pub mod tags;
mod upload;
mod validate;

pub use app::{App, DEFAULT_ADDR, DEFAULT_BODY_LIMIT, DEFAULT_TIMEOUT};
pub use binding::{bind, BodyFormat};
pub use document::{RouteTable, Swagger};
pub use error::{
    default_error_handler, BindError, ErrorContext, ErrorHandler, InitError, RequestError,
    SchemaError,
};
pub use group::Group;
pub use model::{Model, ModelDoc, ModelShape, NoModel, Part};
pub use path::{document_path, join as join_path, router_path};
pub use route::{
    middleware, ContentTypeKind, Middleware, RequestContext, ResponseItem, Responses, Route,
    APPLICATION_JSON,
};
pub use shape::{Describe, FieldShape, StructShape, TypeShape};
pub use shutdown::{cancel_on_signal, wait_for_shutdown};
pub use upload::UploadedFile;
pub use validate::{violations, DeriveValidator, ModelValidator};
