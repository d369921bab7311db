use anyhow::Result;
use runtime::AppConfig;
use serde::{Deserialize, Serialize};
use swagin::Swagger;

/// `modules.demo` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DemoSettings {
    /// Bearer token required by the user write endpoints.
    pub api_token: String,
    /// Value of `X-Admin-Key` required by the admin endpoints.
    pub admin_key: String,
    pub cors: bool,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            api_token: "demo-token".to_owned(),
            admin_key: "demo-admin".to_owned(),
            cors: false,
        }
    }
}

/// Docs settings from `modules.swagger`, with the demo's title by default.
pub fn swagger_from(config: &AppConfig) -> Result<Swagger> {
    Ok(config.module_config::<Swagger>("swagger")?.unwrap_or_else(|| {
        Swagger::new(
            "swagin demo",
            "Users API built on swagin",
            env!("CARGO_PKG_VERSION"),
        )
    }))
}

pub fn demo_from(config: &AppConfig) -> Result<DemoSettings> {
    Ok(config.module_config("demo")?.unwrap_or_default())
}
