//! Users API demonstrating swagin: typed models, groups, security schemes,
//! a mounted sub-application and configuration-driven docs.

pub mod api;
pub mod settings;
pub mod store;

pub use api::routes::build_app;
