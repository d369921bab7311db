//! Request binding: fills a [`Model`] from the parts it declares, then
//! validates it.

mod body;
mod source;

pub use body::BodyFormat;

use axum::extract::Request;
use axum::http::request::Parts;
use serde_json::Value;

use crate::error::{BindError, RequestError};
use crate::model::{Model, ModelShape, Part, PartSlot};
use crate::validate::ModelValidator;

/// Binds every declared part in order (header, query, cookie, uri, body) and
/// runs the validator on the result. The request parts are handed back for
/// the handler's context.
pub async fn bind<M: Model>(
    shape: &ModelShape<M>,
    request: Request,
    validator: &dyn ModelValidator,
) -> Result<(Parts, M), RequestError> {
    let (mut parts, body) = request.into_parts();
    let mut model = M::default();

    if let Some(slot) = shape.slot(Part::Header) {
        let source = source::headers(&parts.headers);
        store(slot, &mut model, source::decode(Part::Header, &slot.shape, &source)?)?;
    }
    if let Some(slot) = shape.slot(Part::Query) {
        let source = source::query(parts.uri.query());
        store(slot, &mut model, source::decode(Part::Query, &slot.shape, &source)?)?;
    }
    if let Some(slot) = shape.slot(Part::Cookie) {
        let source = source::cookies(&parts.headers);
        store(slot, &mut model, source::decode(Part::Cookie, &slot.shape, &source)?)?;
    }
    if let Some(slot) = shape.slot(Part::Uri) {
        let source = source::path_params(&mut parts).await;
        store(slot, &mut model, source::decode(Part::Uri, &slot.shape, &source)?)?;
    }
    if let Some(slot) = shape.slot(Part::Body) {
        body::bind(slot, &mut model, &parts, body).await?;
    }

    validator.validate(&model)?;
    Ok((parts, model))
}

fn store<M>(slot: &PartSlot<M>, model: &mut M, value: Value) -> Result<(), BindError> {
    (slot.set)(model, value).map_err(|e| BindError::Decode {
        part: slot.part,
        message: e.to_string(),
    })
}
