//! Documentation endpoints: the document itself, a Swagger UI page and a
//! Redoc page. Pages load their UI bundles from a CDN.

use axum::http::header;
use axum::response::Html;
use axum::routing::{get, MethodRouter};
use bytes::Bytes;
use minijinja::{context, Environment};
use serde_json::{Map, Value};

use crate::document::Swagger;
use crate::error::InitError;
use crate::openapi::OpenApi;

const SWAGGER_PAGE: (&str, &str) = ("swagger-ui.html", SWAGGER_UI);

const SWAGGER_UI: &str = r##"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8"/>
  <meta name="viewport" content="width=device-width, initial-scale=1"/>
  <title>{{ title }}</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css"/>
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.ui = SwaggerUIBundle(Object.assign({
      url: {{ openapi_url|safe }},
      dom_id: "#swagger-ui",
      presets: [SwaggerUIBundle.presets.apis, SwaggerUIBundle.SwaggerUIStandalonePreset],
      layout: "BaseLayout",
      deepLinking: true
    }, {{ options|safe }}));
  </script>
</body>
</html>"##;

const REDOC_PAGE: (&str, &str) = ("redoc.html", REDOC);

const REDOC: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8"/>
  <meta name="viewport" content="width=device-width, initial-scale=1"/>
  <title>{{ title }}</title>
  <style>body { margin: 0; padding: 0; }</style>
</head>
<body>
  <div id="redoc-container"></div>
  <script src="https://cdn.redoc.ly/redoc/latest/bundles/redoc.standalone.js"></script>
  <script>
    Redoc.init({{ openapi_url|safe }}, {{ options|safe }}, document.getElementById("redoc-container"));
  </script>
</body>
</html>"#;

/// Endpoints of one application's docs, as `(full path, handler)` pairs.
pub(crate) fn endpoints(
    swagger: &Swagger,
    document: &OpenApi,
    document_url: &str,
    docs_url: &str,
    redoc_url: &str,
) -> Result<Vec<(String, MethodRouter)>, InitError> {
    let (content_type, body) = if swagger.serves_yaml() {
        let yaml = document
            .to_yaml()
            .map_err(|e| InitError::Serialize(e.to_string()))?;
        ("application/yaml", yaml)
    } else {
        let json = document
            .to_json()
            .map_err(|e| InitError::Serialize(e.to_string()))?;
        ("application/json", json)
    };
    let body = Bytes::from(body);

    let swagger_page = render(
        SWAGGER_PAGE,
        &swagger.title,
        document_url,
        &swagger.swagger_options,
    )?;
    let redoc_page = render(REDOC_PAGE, &swagger.title, document_url, &swagger.redoc_options)?;

    Ok(vec![
        (
            document_url.to_owned(),
            get(move || {
                let body = body.clone();
                async move { ([(header::CONTENT_TYPE, content_type)], body) }
            }),
        ),
        (
            docs_url.to_owned(),
            get(move || {
                let page = swagger_page.clone();
                async move { Html(page) }
            }),
        ),
        (
            redoc_url.to_owned(),
            get(move || {
                let page = redoc_page.clone();
                async move { Html(page) }
            }),
        ),
    ])
}

/// Pages are named `*.html`, so `title` is HTML-escaped on render.
fn render(
    page: (&'static str, &'static str),
    title: &str,
    document_url: &str,
    options: &Map<String, Value>,
) -> Result<String, InitError> {
    let (name, source) = page;
    let mut env = Environment::new();
    let rendered = env
        .add_template(name, source)
        .and_then(|()| env.get_template(name))
        .and_then(|template| {
            template.render(context! {
                title => title,
                openapi_url => script_json(&Value::from(document_url)),
                options => script_json(&Value::Object(options.clone())),
            })
        })
        .map_err(|e| InitError::DocsPage(e.to_string()));
    rendered
}

/// JSON literal safe to embed inside a `<script>` element.
fn script_json(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pages_embed_url_title_and_options() {
        let options = json!({ "docExpansion": "none" });
        let page = render(
            SWAGGER_PAGE,
            "Shop <API>",
            "/v1/openapi.json",
            options.as_object().unwrap(),
        )
        .unwrap();
        assert!(page.contains("<title>Shop &lt;API&gt;</title>"));
        assert!(page.contains(r#"<div id="swagger-ui"></div>"#));
        assert!(page.contains(r##"dom_id: "#swagger-ui","##));
        assert!(page.contains(r#"url: "/v1/openapi.json","#));
        assert!(page.contains(r#"{"docExpansion":"none"}"#));
    }

    #[test]
    fn redoc_defaults_to_empty_options() {
        let page = render(REDOC_PAGE, "Shop", "/openapi.json", &Map::new()).unwrap();
        assert!(page.contains(r#"Redoc.init("/openapi.json", {}, "#));
    }

    #[test]
    fn script_json_cannot_close_the_script() {
        assert_eq!(script_json(&json!("</script>")), r#""<\/script>""#);
    }
}
