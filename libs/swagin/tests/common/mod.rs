#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use serde::{Deserialize, Serialize};
use swagin::{describe, Model, ModelShape, UploadedFile};
use tower::util::ServiceExt; // for `oneshot`
use validator::Validate;

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct Auth {
    pub token: String,
    pub trace: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct Paging {
    pub page: Option<u32>,
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ItemPath {
    pub id: u64,
}

#[derive(Debug, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct ItemBody {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub price: f64,
}

describe! {
    Auth {
        token: String => r#"header:"X-Token" binding:"required""#,
        trace: Option<String> => r#"header:"X-Trace""#,
    }
    Paging {
        page: Option<u32> => r#"query:"page" default:"1""#,
        tags: Vec<String> => r#"query:"tag""#,
    }
    ItemPath {
        id: u64 => r#"uri:"id" description:"Item id""#,
    }
    ItemBody {
        name: String => r#"json:"name" binding:"required" example:"Lamp""#,
        price: f64 => r#"json:"price" rule:"min=0""#,
    }
}

/// Every part at once.
#[derive(Debug, Default, Validate)]
pub struct UpdateItem {
    #[validate(nested)]
    pub header: Auth,
    #[validate(nested)]
    pub query: Paging,
    #[validate(nested)]
    pub uri: ItemPath,
    #[validate(nested)]
    pub body: ItemBody,
}

impl Model for UpdateItem {
    fn shape() -> ModelShape<Self> {
        ModelShape::new()
            .header(|m: &mut Self, h: Auth| m.header = h)
            .query(|m: &mut Self, q: Paging| m.query = q)
            .uri(|m: &mut Self, p: ItemPath| m.uri = p)
            .body(|m: &mut Self, b: ItemBody| m.body = b)
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct AvatarForm {
    pub caption: String,
    pub image: UploadedFile,
}

describe! {
    AvatarForm {
        caption: String => r#"json:"caption" form:"caption""#,
        image: UploadedFile => r#"json:"image" form:"image""#,
    }
}

#[derive(Debug, Default, Validate)]
pub struct UploadAvatar {
    #[validate(nested)]
    pub body: AvatarForm,
}

impl Model for UploadAvatar {
    fn shape() -> ModelShape<Self> {
        ModelShape::new().body(|m: &mut Self, b: AvatarForm| m.body = b)
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> (Response<Body>, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.unwrap();
    (Response::from_parts(parts, Body::empty()), bytes.to_vec())
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn json(value: &[u8]) -> serde_json::Value {
    serde_json::from_slice(value).unwrap()
}
