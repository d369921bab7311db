mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use validator::Validate;
use swagin::{App, ErrorContext, ErrorHandler, RequestContext, RequestError, Route};

use common::{get, send, UpdateItem, UploadAvatar};

async fn update(_: RequestContext, m: UpdateItem) -> Json<serde_json::Value> {
    Json(json!({
        "id": m.uri.id,
        "token": m.header.token,
        "page": m.query.page,
        "tags": m.query.tags,
        "name": m.body.name,
        "price": m.body.price,
    }))
}

fn app() -> axum::Router {
    let mut app = App::new(None);
    app.put("/items/:id", Route::new(update));
    app.post(
        "/avatars",
        Route::new(|_, m: UploadAvatar| async move {
            Json(json!({
                "caption": m.body.caption,
                "file": m.body.image.file_name,
                "size": m.body.image.len(),
            }))
        }),
    );
    app.into_router().unwrap()
}

fn put(uri: &str, content_type: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("x-token", "first")
        .header("x-token", "second")
        .header("content-type", content_type)
        .body(Body::from(body.to_owned()))
        .unwrap()
}

#[tokio::test]
async fn binds_every_part() {
    let (response, body) = send(
        &app(),
        put(
            "/items/42?page=3&tag=a&tag=b",
            "application/json; charset=utf-8",
            r#"{"name":"Lamp","price":"9.5"}"#,
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        common::json(&body),
        json!({
            "id": 42,
            "token": "first",
            "page": 3,
            "tags": ["a", "b"],
            "name": "Lamp",
            "price": 9.5
        })
    );
}

#[tokio::test]
async fn other_body_encodings() {
    let router = app();

    let (response, body) = send(
        &router,
        put("/items/1", "application/x-www-form-urlencoded", "name=Desk&price=120"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::json(&body)["name"], "Desk");
    assert_eq!(common::json(&body)["price"], 120.0);

    let (response, body) = send(
        &router,
        put("/items/1", "application/x-yaml", "name: Chair\nprice: 30\n"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::json(&body)["name"], "Chair");

    let (response, body) = send(
        &router,
        put(
            "/items/1",
            "application/xml",
            "<item><name>Shelf</name><price>12</price></item>",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::json(&body)["name"], "Shelf");
    assert_eq!(common::json(&body)["price"], 12.0);

    let packed = rmp_serde::to_vec_named(&json!({ "name": "Bed", "price": 300.0 })).unwrap();
    let request = Request::builder()
        .method("PUT")
        .uri("/items/1")
        .header("x-token", "t")
        .header("content-type", "application/x-msgpack")
        .body(Body::from(packed))
        .unwrap();
    let (response, body) = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::json(&body)["name"], "Bed");
}

#[tokio::test]
async fn unknown_content_type_leaves_body_default_and_fails_validation() {
    let (response, body) = send(&app(), put("/items/7", "text/plain", "name=ignored")).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let problem = common::json(&body);
    assert_eq!(problem["code"], "VALIDATION_ERROR");
    assert_eq!(problem["instance"], "/items/7");
    assert_eq!(problem["errors"][0]["pointer"], "/body/name");
    assert_eq!(problem["errors"][0]["detail"], "name must not be empty");
}

#[tokio::test]
async fn malformed_values_are_bad_requests() {
    let (response, body) = send(&app(), put("/items/abc", "application/json", "{}")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let problem = common::json(&body);
    assert_eq!(problem["code"], "INVALID_VALUE");
    assert_eq!(problem["errors"][0]["pointer"], "/uri/id");
}

#[tokio::test]
async fn protobuf_without_decoder_is_unsupported() {
    let (response, _) = send(&app(), put("/items/1", "application/x-protobuf", "")).await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn multipart_files_are_bound() {
    let boundary = "XBOUNDARY";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"caption\"\r\n\r\nme\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"me.png\"\r\n\
         Content-Type: image/png\r\n\r\nPNGDATA\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/avatars")
        .header("content-type", format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap();

    let (response, body) = send(&app(), request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        common::json(&body),
        json!({ "caption": "me", "file": "me.png", "size": 7 })
    );
}

#[tokio::test]
async fn custom_error_handler_renders_failures() {
    let handler: ErrorHandler = Arc::new(|ctx: &ErrorContext, err: RequestError| {
        (ctx.status, format!("{}: {err}", ctx.instance)).into_response()
    });
    let mut app = App::new(None);
    app.with_error_handler(handler);
    app.put("/items/:id", Route::new(update));
    let router = app.into_router().unwrap();

    let (response, body) = send(&router, put("/items/x", "application/json", "{}")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(String::from_utf8(body).unwrap().starts_with("/items/x: "));

    let (response, _) = send(&router, get("/missing")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[derive(Clone, PartialEq, prost::Message)]
struct ItemMessage {
    #[prost(string, tag = "1")]
    name: String,
    #[prost(double, tag = "2")]
    price: f64,
}

impl From<ItemMessage> for common::ItemBody {
    fn from(msg: ItemMessage) -> Self {
        Self {
            name: msg.name,
            price: msg.price,
        }
    }
}

#[derive(Debug, Default, validator::Validate)]
struct CreateItem {
    #[validate(nested)]
    body: common::ItemBody,
}

impl swagin::Model for CreateItem {
    fn shape() -> swagin::ModelShape<Self> {
        swagin::ModelShape::new()
            .body_protobuf::<common::ItemBody, ItemMessage, _>(|m: &mut Self, b| m.body = b)
    }
}

#[tokio::test]
async fn protobuf_bodies_are_decoded_when_registered() {
    use prost::Message as _;

    let mut app = App::new(None);
    app.post(
        "/items",
        Route::new(|_, m: CreateItem| async move {
            Json(json!({ "name": m.body.name, "price": m.body.price }))
        }),
    );
    let router = app.into_router().unwrap();

    let encoded = ItemMessage {
        name: "Lamp".into(),
        price: 12.5,
    }
    .encode_to_vec();
    let request = Request::builder()
        .method("POST")
        .uri("/items")
        .header("content-type", "application/x-protobuf")
        .body(Body::from(encoded))
        .unwrap();
    let (response, body) = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::json(&body), json!({ "name": "Lamp", "price": 12.5 }));

    // the same route still accepts JSON
    let request = Request::builder()
        .method("POST")
        .uri("/items")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"name":"Desk","price":3}"#))
        .unwrap();
    let (_, body) = send(&router, request).await;
    assert_eq!(common::json(&body)["name"], "Desk");
}

#[derive(Debug, Default, serde::Deserialize, validator::Validate)]
#[serde(default)]
struct Profile {
    name: String,
    avatar: bytes::Bytes,
    internal: String,
}

swagin::describe! {
    Profile {
        name: String => r#"json:"name""#,
        avatar: bytes::Bytes => r#"json:"avatar""#,
        internal: String => "",
    }
}

#[derive(Debug, Default, validator::Validate)]
struct SaveProfile {
    #[validate(nested)]
    body: Profile,
}

impl swagin::Model for SaveProfile {
    fn shape() -> swagin::ModelShape<Self> {
        swagin::ModelShape::new().body(|m: &mut Self, b: Profile| m.body = b)
    }
}

fn profile_app() -> axum::Router {
    let mut app = App::new(None);
    app.post(
        "/profile",
        Route::new(|_, m: SaveProfile| async move {
            Json(json!({
                "name": m.body.name,
                "avatar": String::from_utf8_lossy(&m.body.avatar),
                "internal": m.body.internal,
            }))
        }),
    );
    app.into_router().unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

#[tokio::test]
async fn untagged_body_fields_keep_their_default() {
    let (response, body) = send(
        &profile_app(),
        post_json("/profile", r#"{"name":"n","internal":"leaked"}"#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::json(&body);
    assert_eq!(body["name"], "n");
    assert_eq!(body["internal"], "");
}

#[tokio::test]
async fn byte_fields_accept_base64() {
    let router = profile_app();
    let (response, body) = send(&router, post_json("/profile", r#"{"avatar":"aGVsbG8="}"#)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::json(&body)["avatar"], "hello");

    let (response, body) = send(&router, post_json("/profile", r#"{"avatar":"%%%"}"#)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(common::json(&body)["errors"][0]["pointer"], "/body/avatar");
}

#[derive(Debug, Default, serde::Deserialize, validator::Validate)]
#[serde(default)]
struct Opaque {
    note: String,
}

swagin::describe! {
    Opaque { note: String => r#"description:"Not bound from anywhere""# }
}

#[derive(Debug, Default, validator::Validate)]
struct Inspect {
    #[validate(nested)]
    query: Opaque,
    #[validate(nested)]
    header: Opaque,
}

impl swagin::Model for Inspect {
    fn shape() -> swagin::ModelShape<Self> {
        swagin::ModelShape::new()
            .query(|m: &mut Self, q: Opaque| m.query = q)
            .header(|m: &mut Self, h: Opaque| m.header = h)
    }
}

#[tokio::test]
async fn parts_without_recognized_fields_bind_nothing() {
    let mut app = App::new(None);
    app.get(
        "/inspect",
        Route::new(|_, m: Inspect| async move { format!("{}|{}", m.query.note, m.header.note) }),
    );
    let request = Request::builder()
        .uri("/inspect?note=q")
        .header("note", "h")
        .body(Body::empty())
        .unwrap();
    let (response, body) = send(&app.into_router().unwrap(), request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body, b"|");
}
