mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use swagin::security::{Credentials, HttpBasic, HttpBearer};
use swagin::{
    middleware, App, ErrorContext, ErrorHandler, InitError, RequestContext, RequestError,
    ResponseItem, Route, Swagger,
};

use common::{get, send, ItemBody, UpdateItem};

fn ping() -> Route {
    Route::raw(|_| async { "pong" }).summary("Ping")
}

fn tagging_middleware(value: &'static str) -> swagin::Middleware {
    middleware(move |req: Request, next: Next| async move {
        let mut response = next.run(req).await;
        response
            .headers_mut()
            .append("x-layer", HeaderValue::from_static(value));
        response
    })
}

#[tokio::test]
async fn get_and_post_share_a_path() {
    let mut app = App::new(None);
    app.get("/ping", ping())
        .post("/ping", Route::raw(|_| async { (StatusCode::CREATED, "created") }));
    let router = app.into_router().unwrap();

    let (response, body) = send(&router, get("/ping")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body, b"pong");

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/ping")
        .body(Body::empty())
        .unwrap();
    let (response, _) = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let request = axum::http::Request::builder()
        .method("DELETE")
        .uri("/ping")
        .body(Body::empty())
        .unwrap();
    let (response, _) = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[test]
fn get_and_post_share_one_path_item() {
    let mut app = App::new(Some(Swagger::new("Test", "", "1.0")));
    app.get("/ping", ping())
        .post("/ping", Route::raw(|_| async { (StatusCode::CREATED, "created") }));
    let doc = serde_json::to_value(app.openapi().unwrap().unwrap()).unwrap();

    let mut methods: Vec<_> = doc["paths"]["/ping"]
        .as_object()
        .unwrap()
        .keys()
        .cloned()
        .collect();
    methods.sort();
    assert_eq!(methods, vec!["get", "post"]);
}

#[test]
fn differently_named_parameters_on_one_segment_fail_init() {
    let mut app = App::new(None);
    app.get("/users/:id", ping());
    app.delete("/users/:name", ping());
    assert!(matches!(
        app.into_router(),
        Err(InitError::AmbiguousPath { .. })
    ));
}

#[tokio::test]
async fn re_registration_keeps_the_last_route() {
    let mut app = App::new(None);
    app.get("/ping", ping());
    app.get("/ping", Route::raw(|_| async { "second" }));
    let (_, body) = send(&app.into_router().unwrap(), get("/ping")).await;
    assert_eq!(body, b"second");
}

#[tokio::test]
async fn excluded_routes_are_served_but_not_documented() {
    let mut app = App::new(Some(Swagger::new("Test", "", "1.0")));
    app.get("/ping", ping());
    app.get("/internal", Route::raw(|_| async { "hidden" }).exclude());

    let doc = app.openapi().unwrap().unwrap();
    assert!(doc.paths.contains_key("/ping"));
    assert!(!doc.paths.contains_key("/internal"));

    let router = app.into_router().unwrap();
    let (response, _) = send(&router, get("/internal")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let (_, body) = send(&router, get("/openapi.json")).await;
    let served = common::json(&body);
    assert_eq!(served["openapi"], "3.0.0");
    assert!(served["paths"].get("/internal").is_none());
}

#[tokio::test]
async fn document_describes_the_model() {
    let mut app = App::new(Some(Swagger::new("Shop", "Items", "2.0")));
    app.put(
        "/items/:id",
        Route::new(|_, m: UpdateItem| async move { Json(m.body) })
            .summary("Update an item")
            .operation_id("updateItem")
            .response("200", ResponseItem::new("Updated item").model::<ItemBody>()),
    );
    let router = app.into_router().unwrap();
    let (_, body) = send(&router, get("/openapi.json")).await;
    let doc = common::json(&body);

    let op = &doc["paths"]["/items/{id}"]["put"];
    assert_eq!(op["operationId"], "updateItem");
    let names: Vec<_> = op["parameters"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| (p["in"].as_str().unwrap(), p["name"].as_str().unwrap()))
        .collect();
    assert_eq!(
        names,
        vec![("path", "id"), ("query", "page"), ("query", "tag"), ("header", "X-Token")]
    );
    assert_eq!(op["parameters"][0]["required"], true);
    assert_eq!(op["parameters"][1]["schema"]["default"], "1");

    let body_schema = &op["requestBody"]["content"]["application/json"]["schema"];
    assert_eq!(body_schema["required"], json!(["name"]));
    assert_eq!(body_schema["properties"]["price"]["minimum"], 0.0);
    assert_eq!(op["responses"]["200"]["description"], "Updated item");
}

#[tokio::test]
async fn yaml_document_when_the_url_says_so() {
    let swagger = Swagger::new("Test", "", "1.0").with_openapi_url("/openapi.yaml");
    let mut app = App::new(Some(swagger));
    app.get("/ping", ping());
    let (response, body) = send(&app.into_router().unwrap(), get("/openapi.yaml")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/yaml");
    let doc: serde_yaml::Value = serde_yaml::from_slice(&body).unwrap();
    assert_eq!(doc["info"]["title"], serde_yaml::Value::from("Test"));
}

#[tokio::test]
async fn docs_pages_point_at_the_document() {
    let mut app = App::new(Some(Swagger::new("Shop & Co", "", "1.0")));
    app.get("/ping", ping());
    let router = app.into_router().unwrap();

    let (response, body) = send(&router, get("/docs")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = String::from_utf8(body).unwrap();
    assert!(page.contains("SwaggerUIBundle"));
    assert!(page.contains(r#""/openapi.json""#));
    assert!(page.contains("Shop &amp; Co"));

    let (_, body) = send(&router, get("/redoc")).await;
    assert!(String::from_utf8(body).unwrap().contains("Redoc.init"));
}

#[tokio::test]
async fn mounted_apps_live_under_their_prefix() {
    let handler: ErrorHandler = Arc::new(|ctx: &ErrorContext, _: RequestError| {
        (StatusCode::IM_A_TEAPOT, ctx.instance.clone()).into_response()
    });
    let mut root = App::new(Some(Swagger::new("Root", "", "1.0")));
    root.with_error_handler(handler);
    root.get("/ping", ping());

    let mut v1 = App::new(Some(Swagger::new("V1", "", "1.0")));
    v1.get("/ping", Route::raw(|_| async { "v1 pong" }));
    v1.put("/items/:id", Route::new(|_, m: UpdateItem| async move { Json(m.body) }));
    root.mount("/v1", v1);
    let router = root.into_router().unwrap();

    let (_, body) = send(&router, get("/ping")).await;
    assert_eq!(body, b"pong");
    let (_, body) = send(&router, get("/v1/ping")).await;
    assert_eq!(body, b"v1 pong");

    let (_, body) = send(&router, get("/v1/openapi.json")).await;
    let doc = common::json(&body);
    assert_eq!(doc["info"]["title"], "V1");
    assert_eq!(doc["servers"], json!([{ "url": "/v1" }]));
    assert!(doc["paths"].get("/ping").is_some());

    let (_, body) = send(&router, get("/v1/docs")).await;
    assert!(String::from_utf8(body).unwrap().contains(r#""/v1/openapi.json""#));

    let request = axum::http::Request::builder()
        .method("PUT")
        .uri("/v1/items/nope")
        .body(Body::empty())
        .unwrap();
    let (response, body) = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(body, b"/v1/items/nope");
}

#[tokio::test]
async fn nested_mounts_document_the_full_prefix() {
    let mut inner = App::new(Some(Swagger::new("Inner", "", "1.0")));
    inner.get("/ping", Route::raw(|_| async { "inner pong" }));
    let mut middle = App::new(Some(Swagger::new("Middle", "", "1.0")));
    middle.mount("/admin", inner);
    let mut root = App::new(None);
    root.mount("/v1", middle);
    let router = root.into_router().unwrap();

    let (response, body) = send(&router, get("/v1/admin/ping")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body, b"inner pong");

    let (_, body) = send(&router, get("/v1/admin/openapi.json")).await;
    assert_eq!(common::json(&body)["servers"], json!([{ "url": "/v1/admin" }]));
    let (_, body) = send(&router, get("/v1/openapi.json")).await;
    assert_eq!(common::json(&body)["servers"], json!([{ "url": "/v1" }]));
}

#[tokio::test]
async fn conflicting_mounts_fail_init() {
    let mut root = App::new(None);
    root.get("/v1/ping", ping());
    let mut v1 = App::new(None);
    v1.get("/ping", ping());
    root.mount("/v1", v1);
    assert!(matches!(root.into_router(), Err(InitError::Conflict { .. })));
}

#[tokio::test]
async fn security_runs_before_the_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut app = App::new(None);
    app.get(
        "/me",
        Route::raw(move |req: Request| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                match req.extensions().get::<Credentials>() {
                    Some(Credentials::Basic { username, .. }) => username.clone(),
                    _ => "anonymous".to_owned(),
                }
            }
        })
        .security(HttpBasic::new().verify(|c| {
            matches!(c, Credentials::Basic { password, .. } if password == "secret")
        })),
    );
    let router = app.into_router().unwrap();

    let (response, body) = send(&router, get("/me")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()["content-type"], "application/problem+json");
    assert_eq!(common::json(&body)["instance"], "/me");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // "ann:secret"
    let request = axum::http::Request::builder()
        .uri("/me")
        .header("authorization", "Basic YW5uOnNlY3JldA==")
        .body(Body::empty())
        .unwrap();
    let (response, body) = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body, b"ann");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn groups_share_prefix_tags_security_and_middleware() {
    let mut app = App::new(Some(Swagger::default()));
    app.middleware(tagging_middleware("app"));
    {
        let mut admin = app
            .group("/admin")
            .tags(["admin"])
            .security(HttpBearer::new())
            .middleware(tagging_middleware("group"));
        admin.get(
            "/stats",
            Route::new(|ctx: RequestContext, _: swagin::NoModel| async move {
                match ctx.credentials() {
                    Some(Credentials::Token(token)) => token.clone(),
                    _ => String::new(),
                }
            })
            .tags(["stats"]),
        );
        admin.group("/v2").get("/stats", ping());
    }
    let doc = app.openapi().unwrap().unwrap();
    let op = doc.paths["/admin/stats"].get.as_ref().unwrap();
    assert_eq!(op.tags, vec!["admin", "stats"]);
    assert_eq!(op.security.len(), 1);
    assert!(doc.paths["/admin/v2/stats"].get.is_some());

    let router = app.into_router().unwrap();
    let request = axum::http::Request::builder()
        .uri("/admin/stats")
        .header("authorization", "Bearer t0k")
        .body(Body::empty())
        .unwrap();
    let (response, body) = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body, b"t0k");
    let layers: Vec<_> = response
        .headers()
        .get_all("x-layer")
        .iter()
        .map(|v| v.to_str().unwrap().to_owned())
        .collect();
    assert_eq!(layers, vec!["group", "app"]);

    let (response, _) = send(&router, get("/admin/v2/stats")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn request_ids_are_generated_or_propagated() {
    let mut app = App::new(None);
    app.get(
        "/id",
        Route::new(|ctx: RequestContext, _: swagin::NoModel| async move {
            ctx.request_id().unwrap_or_default().to_owned()
        }),
    );
    let router = app.into_router().unwrap();

    let (response, body) = send(&router, get("/id")).await;
    let generated = response.headers()["x-request-id"].to_str().unwrap().to_owned();
    assert!(!generated.is_empty());
    assert_eq!(String::from_utf8(body).unwrap(), generated);

    let request = axum::http::Request::builder()
        .uri("/id")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let (response, body) = send(&router, request).await;
    assert_eq!(response.headers()["x-request-id"], "abc-123");
    assert_eq!(body, b"abc-123");
}

#[tokio::test]
async fn init_hooks_run_once_in_order() {
    let log = Arc::new(std::sync::Mutex::new(Vec::new()));
    let mut app = App::new(None);
    let before = Arc::clone(&log);
    let after = Arc::clone(&log);
    app.before_init(move || before.lock().unwrap().push("before"))
        .after_init(move || after.lock().unwrap().push("after"));
    app.get("/ping", ping());
    app.into_router().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["before", "after"]);
}
