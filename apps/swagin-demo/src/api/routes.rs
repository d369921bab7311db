use std::sync::Arc;

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Json;
use serde_json::json;
use swagin::security::{ApiKey, Credentials, HttpBearer};
use swagin::{middleware, App, ResponseItem, Route, Swagger};

use crate::api::dto::{CreateUser, GetUser, ListUsers, UpdateUser, UserDto, UserListDto};
use crate::api::handlers;
use crate::settings::DemoSettings;
use crate::store::UserStore;

pub const POWERED_BY: &str = "x-powered-by";

/// Builds the demo application: the users API on the root app and the
/// admin endpoints as a mounted sub-application under `/admin`.
pub fn build_app(swagger: Swagger, settings: &DemoSettings, store: Arc<UserStore>) -> App {
    let version = swagger.version.clone();
    let mut app = App::new(Some(swagger));

    app.cors(settings.cors);
    app.middleware(middleware(|req: Request, next: Next| async move {
        let mut response = next.run(req).await;
        response
            .headers_mut()
            .insert(POWERED_BY, HeaderValue::from_static("swagin"));
        response
    }));

    app.get(
        "/health",
        Route::raw(|_| async { Json(json!({ "status": "ok" })) })
            .summary("Liveness probe")
            .tags(["system"]),
    );

    register_users(&mut app, settings, &store);
    app.mount("/admin", admin_app(version, settings, store));
    app
}

fn register_users(app: &mut App, settings: &DemoSettings, store: &Arc<UserStore>) {
    let mut users = app.group("/users").tags(["users"]);

    let s = Arc::clone(store);
    users.get(
        "",
        Route::new(move |ctx, m: ListUsers| handlers::list_users(Arc::clone(&s), ctx, m))
            .summary("List users")
            .operation_id("listUsers")
            .response("200", ResponseItem::new("A page of users").model::<UserListDto>()),
    );

    let s = Arc::clone(store);
    users.get(
        "/:id",
        Route::new(move |ctx, m: GetUser| handlers::get_user(Arc::clone(&s), ctx, m))
            .summary("Get a user")
            .operation_id("getUser")
            .response("200", ResponseItem::new("The user").model::<UserDto>())
            .response("404", ResponseItem::new("No such user")),
    );

    let token = settings.api_token.clone();
    let mut writes = users.group("").security(
        HttpBearer::new()
            .bearer_format("opaque")
            .verify(move |c| matches!(c, Credentials::Token(t) if *t == token)),
    );

    let s = Arc::clone(store);
    writes.post(
        "",
        Route::new(move |ctx, m: CreateUser| handlers::create_user(Arc::clone(&s), ctx, m))
            .summary("Create a user")
            .operation_id("createUser")
            .response("201", ResponseItem::new("Created user").model::<UserDto>())
            .response("409", ResponseItem::new("Email already registered")),
    );

    let s = Arc::clone(store);
    writes.patch(
        "/:id",
        Route::new(move |ctx, m: UpdateUser| handlers::update_user(Arc::clone(&s), ctx, m))
            .summary("Update a user")
            .operation_id("updateUser")
            .response("200", ResponseItem::new("Updated user").model::<UserDto>()),
    );

    let s = Arc::clone(store);
    writes.delete(
        "/:id",
        Route::new(move |ctx, m: GetUser| handlers::delete_user(Arc::clone(&s), ctx, m))
            .summary("Delete a user")
            .operation_id("deleteUser")
            .response("204", ResponseItem::new("Deleted")),
    );
}

fn admin_app(version: String, settings: &DemoSettings, store: Arc<UserStore>) -> App {
    let mut admin = App::new(Some(Swagger::new(
        "swagin demo admin",
        "Operational endpoints",
        version,
    )));

    let key = settings.admin_key.clone();
    admin.get(
        "/stats",
        Route::raw(move |_| {
            let store = Arc::clone(&store);
            async move { Json(json!({ "users": store.count().await })) }
        })
        .summary("Store statistics")
        .tags(["admin"])
        .security(
            ApiKey::header("X-Admin-Key")
                .verify(move |c| matches!(c, Credentials::ApiKey(k) if *k == key)),
        ),
    );
    admin
}
