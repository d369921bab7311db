use serde::{Deserialize, Serialize};
use swagin::{describe, Model, ModelShape};
use validator::Validate;

use crate::store::{NewUser, User, UserPatch};

pub const DEFAULT_LIMIT: u32 = 50;

/// REST DTO for a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserDto {
    pub id: u64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListDto {
    pub users: Vec<UserDto>,
    pub total: usize,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct ListUsersQuery {
    #[validate(range(min = 1, max = 200))]
    pub limit: u32,
    pub offset: u32,
}

impl Default for ListUsersQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct UserPath {
    #[validate(range(min = 1))]
    pub id: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CreateUserReq {
    #[validate(length(min = 1, max = 100, message = "name must be 1 to 100 characters"))]
    pub name: String,
    #[validate(email(message = "email is not a valid address"))]
    pub email: String,
    #[validate(range(max = 150))]
    pub age: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct UpdateUserReq {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(range(max = 150))]
    pub age: Option<u32>,
}

describe! {
    UserDto {
        id: u64 => r#"json:"id" description:"User id""#,
        name: String => r#"json:"name" example:"Ann""#,
        email: String => r#"json:"email" format:"email""#,
        age: Option<u32> => r#"json:"age,omitempty""#,
    }
    UserListDto {
        users: Vec<UserDto> => r#"json:"users""#,
        total: usize => r#"json:"total" description:"Number of stored users""#,
        limit: u32 => r#"json:"limit""#,
        offset: u32 => r#"json:"offset""#,
    }
    ListUsersQuery {
        limit: u32 => r#"query:"limit" default:"50" rule:"min=1,max=200" description:"Page size""#,
        offset: u32 => r#"query:"offset" default:"0""#,
    }
    UserPath {
        id: u64 => r#"uri:"id" rule:"min=1" description:"User id""#,
    }
    CreateUserReq {
        name: String => r#"json:"name" form:"name" binding:"required" example:"Ann""#,
        email: String => r#"json:"email" form:"email" binding:"required" format:"email""#,
        age: Option<u32> => r#"json:"age" form:"age" rule:"max=150""#,
    }
    UpdateUserReq {
        name: Option<String> => r#"json:"name""#,
        email: Option<String> => r#"json:"email" format:"email""#,
        age: Option<u32> => r#"json:"age" rule:"max=150""#,
    }
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            age: user.age,
        }
    }
}

impl From<CreateUserReq> for NewUser {
    fn from(req: CreateUserReq) -> Self {
        Self {
            name: req.name,
            email: req.email,
            age: req.age,
        }
    }
}

impl From<UpdateUserReq> for UserPatch {
    fn from(req: UpdateUserReq) -> Self {
        Self {
            name: req.name,
            email: req.email,
            age: req.age,
        }
    }
}

// -------- request models --------

#[derive(Debug, Default, Validate)]
pub struct ListUsers {
    #[validate(nested)]
    pub query: ListUsersQuery,
}

impl Model for ListUsers {
    fn shape() -> ModelShape<Self> {
        ModelShape::new().query(|m: &mut Self, q: ListUsersQuery| m.query = q)
    }
}

#[derive(Debug, Default, Validate)]
pub struct GetUser {
    #[validate(nested)]
    pub uri: UserPath,
}

impl Model for GetUser {
    fn shape() -> ModelShape<Self> {
        ModelShape::new().uri(|m: &mut Self, p: UserPath| m.uri = p)
    }
}

#[derive(Debug, Default, Validate)]
pub struct CreateUser {
    #[validate(nested)]
    pub body: CreateUserReq,
}

impl Model for CreateUser {
    fn shape() -> ModelShape<Self> {
        ModelShape::new().body(|m: &mut Self, b: CreateUserReq| m.body = b)
    }
}

#[derive(Debug, Default, Validate)]
pub struct UpdateUser {
    #[validate(nested)]
    pub uri: UserPath,
    #[validate(nested)]
    pub body: UpdateUserReq,
}

impl Model for UpdateUser {
    fn shape() -> ModelShape<Self> {
        ModelShape::new()
            .uri(|m: &mut Self, p: UserPath| m.uri = p)
            .body(|m: &mut Self, b: UpdateUserReq| m.body = b)
    }
}
