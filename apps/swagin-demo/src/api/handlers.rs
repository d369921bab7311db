use std::sync::Arc;

use axum::{http::StatusCode, response::Json};
use swagin::problem::{Problem, ProblemResponse};
use swagin::RequestContext;
use tracing::{error, info};

use crate::api::dto::{CreateUser, GetUser, ListUsers, UpdateUser, UserDto, UserListDto};
use crate::store::{StoreError, UserStore};

pub async fn list_users(
    store: Arc<UserStore>,
    _ctx: RequestContext,
    m: ListUsers,
) -> Json<UserListDto> {
    let query = m.query;
    info!(limit = query.limit, offset = query.offset, "listing users");

    let (total, users) = store.list(query.limit as usize, query.offset as usize).await;
    Json(UserListDto {
        users: users.into_iter().map(UserDto::from).collect(),
        total,
        limit: query.limit,
        offset: query.offset,
    })
}

pub async fn get_user(
    store: Arc<UserStore>,
    ctx: RequestContext,
    m: GetUser,
) -> Result<Json<UserDto>, ProblemResponse> {
    match store.get(m.uri.id).await {
        Ok(user) => Ok(Json(user.into())),
        Err(e) => Err(problem(&ctx, &e)),
    }
}

pub async fn create_user(
    store: Arc<UserStore>,
    ctx: RequestContext,
    m: CreateUser,
) -> Result<(StatusCode, Json<UserDto>), ProblemResponse> {
    info!(email = %m.body.email, "creating user");

    match store.create(m.body.into()).await {
        Ok(user) => Ok((StatusCode::CREATED, Json(user.into()))),
        Err(e) => {
            error!("failed to create user: {}", e);
            Err(problem(&ctx, &e))
        }
    }
}

pub async fn update_user(
    store: Arc<UserStore>,
    ctx: RequestContext,
    m: UpdateUser,
) -> Result<Json<UserDto>, ProblemResponse> {
    let id = m.uri.id;
    match store.update(id, m.body.into()).await {
        Ok(user) => Ok(Json(user.into())),
        Err(e) => {
            error!("failed to update user {}: {}", id, e);
            Err(problem(&ctx, &e))
        }
    }
}

pub async fn delete_user(
    store: Arc<UserStore>,
    ctx: RequestContext,
    m: GetUser,
) -> Result<StatusCode, ProblemResponse> {
    match store.delete(m.uri.id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(problem(&ctx, &e)),
    }
}

fn problem(ctx: &RequestContext, e: &StoreError) -> ProblemResponse {
    let (status, code) = match e {
        StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
        StoreError::EmailTaken(_) => (StatusCode::CONFLICT, "EMAIL_TAKEN"),
    };
    Problem::new(status, e.to_string())
        .with_code(code)
        .with_instance(ctx.uri().path())
        .with_request_id(ctx.request_id())
        .into()
}
