//! Request body codecs. The content type picks the codec, the decoded value
//! is normalized against the body shape, then handed to the model's setter.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{FromRequest, Multipart};
use axum::http::{header, request::Parts, Method, Request};
use base64::Engine as _;
use serde_json::{Map, Value};

use super::source::{self, SourceMap};
use crate::error::BindError;
use crate::model::{Part, PartSlot};
use crate::shape::{FieldShape, TypeShape};
use crate::upload::{self, UploadedFile};

/// Body encodings understood by the binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    Xml,
    Form,
    Multipart,
    Yaml,
    Protobuf,
    MsgPack,
}

impl BodyFormat {
    /// Matches the media type essence: parameters are ignored and the
    /// comparison is case-insensitive.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let format = match essence.as_str() {
            "application/json" => BodyFormat::Json,
            "application/xml" | "text/xml" => BodyFormat::Xml,
            "application/x-www-form-urlencoded" => BodyFormat::Form,
            "multipart/form-data" => BodyFormat::Multipart,
            "application/x-yaml" | "application/yaml" | "text/yaml" => BodyFormat::Yaml,
            "application/x-protobuf" => BodyFormat::Protobuf,
            "application/x-msgpack" | "application/msgpack" => BodyFormat::MsgPack,
            _ => return None,
        };
        Some(format)
    }

    /// Tag consulted before `json` for the source key of a field.
    fn tag_key(self) -> Option<&'static str> {
        match self {
            BodyFormat::Xml => Some("xml"),
            BodyFormat::Form | BodyFormat::Multipart => Some("form"),
            BodyFormat::Yaml => Some("yaml"),
            BodyFormat::MsgPack => Some("msgpack"),
            BodyFormat::Json | BodyFormat::Protobuf => None,
        }
    }
}

fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

pub(crate) async fn bind<M>(
    slot: &PartSlot<M>,
    model: &mut M,
    parts: &Parts,
    body: Body,
) -> Result<(), BindError> {
    if !carries_body(&parts.method) {
        return Ok(());
    }
    let Some(content_type) = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return Ok(());
    };
    let Some(format) = BodyFormat::from_content_type(content_type) else {
        tracing::debug!(content_type, "no codec for content type, body left at default");
        return Ok(());
    };

    let mut uploads = Vec::new();
    let value = match format {
        BodyFormat::Protobuf => {
            let Some(decode) = &slot.protobuf else {
                return Err(BindError::UnsupportedMediaType(content_type.to_owned()));
            };
            let bytes = read(body).await?;
            return decode(model, &bytes).map_err(|e| decode_error(e.to_string()));
        }
        BodyFormat::Multipart => {
            let (value, files) = multipart(&slot.shape, content_type, body).await?;
            uploads = files;
            value
        }
        BodyFormat::Form => {
            let bytes = read(body).await?;
            flat_fields(&slot.shape, format, &source::pairs(&bytes), &HashMap::new())?
        }
        BodyFormat::Json => {
            let bytes = read(body).await?;
            serde_json::from_slice(&bytes).map_err(|e| decode_error(e.to_string()))?
        }
        BodyFormat::Xml => {
            let bytes = read(body).await?;
            let text = std::str::from_utf8(&bytes).map_err(|e| decode_error(e.to_string()))?;
            quick_xml::de::from_str(text).map_err(|e| decode_error(e.to_string()))?
        }
        BodyFormat::Yaml => {
            let bytes = read(body).await?;
            serde_yaml::from_slice(&bytes).map_err(|e| decode_error(e.to_string()))?
        }
        BodyFormat::MsgPack => {
            let bytes = read(body).await?;
            rmp_serde::from_slice(&bytes).map_err(|e| decode_error(e.to_string()))?
        }
    };

    let value = normalize(&slot.shape, value, format, "")?;
    upload::with_pending(uploads, || (slot.set)(model, value))
        .map_err(|e| decode_error(e.to_string()))
}

fn decode_error(message: String) -> BindError {
    BindError::Decode {
        part: Part::Body,
        message,
    }
}

async fn read(body: Body) -> Result<bytes::Bytes, BindError> {
    axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| BindError::Body(e.to_string()))
}

/// Text fields are coerced like a form; files are kept aside and referenced
/// from the body value by placeholder.
async fn multipart(
    shape: &TypeShape,
    content_type: &str,
    body: Body,
) -> Result<(Value, Vec<UploadedFile>), BindError> {
    let request = Request::builder()
        .header(header::CONTENT_TYPE, content_type)
        .body(body)
        .map_err(|e| BindError::Body(e.to_string()))?;
    let mut form = Multipart::from_request(request, &())
        .await
        .map_err(|e| decode_error(e.body_text()))?;

    let mut texts = SourceMap::default();
    let mut uploads = Vec::new();
    let mut files: HashMap<String, Vec<usize>> = HashMap::new();
    while let Some(field) = form
        .next_field()
        .await
        .map_err(|e| decode_error(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        match field.file_name().map(str::to_owned) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_owned);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| decode_error(e.body_text()))?;
                files.entry(name.clone()).or_default().push(uploads.len());
                uploads.push(UploadedFile {
                    field_name: name,
                    file_name: Some(file_name),
                    content_type,
                    data,
                });
            }
            None => {
                let text = field.text().await.map_err(|e| decode_error(e.body_text()))?;
                texts.push(&name, text);
            }
        }
    }
    let value = flat_fields(shape, BodyFormat::Multipart, &texts, &files)?;
    Ok((value, uploads))
}

/// Source key of a body field. `None` when the field carries no key tag for
/// the format or `json:"-"`; such fields are never bound.
fn body_key(field: &FieldShape, format: BodyFormat) -> Result<Option<String>, BindError> {
    let tags = field.tags().map_err(|source| BindError::Tags {
        part: Part::Body,
        field: field.name().to_owned(),
        source,
    })?;
    if let Some(name) = format.tag_key().and_then(|key| tags.name(key)) {
        return Ok(Some(name.to_owned()));
    }
    match tags.get("json").map(|t| t.name()) {
        Some("-") => Ok(None),
        Some(name) if !name.is_empty() => Ok(Some(name.to_owned())),
        _ => Ok(None),
    }
}

/// Builds a body object from flat form values, keyed by source key so that
/// [`normalize`] maps it like any other decoded body.
fn flat_fields(
    shape: &TypeShape,
    format: BodyFormat,
    texts: &SourceMap,
    files: &HashMap<String, Vec<usize>>,
) -> Result<Value, BindError> {
    let Some(shape) = shape.as_struct() else {
        return Err(decode_error("form bodies must be described as structs".into()));
    };
    let mut object = Map::new();
    for field in shape.fields() {
        let Some(key) = body_key(field, format)? else {
            continue;
        };
        let field_shape = field.shape();
        let value = match (&field_shape, files.get(&key)) {
            (TypeShape::File, Some(indices)) => indices.first().map(|&i| upload::placeholder(i)),
            (TypeShape::Array(inner), Some(indices)) if matches!(**inner, TypeShape::File) => {
                Some(indices.iter().map(|&i| upload::placeholder(i)).collect())
            }
            _ => None,
        };
        let value = match value {
            Some(placeholder) => placeholder,
            None => match texts.get(&key) {
                Some(values) => source::coerce_all(&field_shape, values).map_err(|message| {
                    BindError::InvalidValue {
                        part: Part::Body,
                        field: key.clone(),
                        message,
                    }
                })?,
                None => continue,
            },
        };
        object.insert(key, value);
    }
    Ok(Value::Object(object))
}

/// Renames source keys to serde field names, coerces textual scalars and
/// wraps single values where the shape expects an array.
pub(crate) fn normalize(
    shape: &TypeShape,
    value: Value,
    format: BodyFormat,
    path: &str,
) -> Result<Value, BindError> {
    let invalid = |message: String| BindError::InvalidValue {
        part: Part::Body,
        field: path.trim_start_matches('/').to_owned(),
        message,
    };

    match (shape, value) {
        (_, Value::Null) => Ok(Value::Null),
        (TypeShape::Struct(s), Value::Object(mut object)) => {
            let mut out = Map::new();
            for field in s.fields() {
                let Some(key) = body_key(field, format)? else {
                    continue;
                };
                let Some(raw) = object.remove(&key) else {
                    continue;
                };
                let nested = normalize(&field.shape(), raw, format, &format!("{path}/{key}"))?;
                out.insert(field.name().to_owned(), nested);
            }
            Ok(Value::Object(out))
        }
        (TypeShape::Struct(s), other) => Err(invalid(format!(
            "expected an object for `{}`, found {}",
            s.name(),
            kind_of(&other)
        ))),
        (TypeShape::Array(inner), Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| normalize(inner, item, format, &format!("{path}/{i}")))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (TypeShape::Array(inner), single) => {
            Ok(Value::Array(vec![normalize(inner, single, format, path)?]))
        }
        (TypeShape::Map(inner), Value::Object(object)) => object
            .into_iter()
            .map(|(k, v)| {
                let nested = normalize(inner, v, format, &format!("{path}/{k}"))?;
                Ok((k, nested))
            })
            .collect::<Result<Map<_, _>, BindError>>()
            .map(Value::Object),
        (_, Value::Object(mut object)) if format == BodyFormat::Xml && is_text_node(&object) => {
            let text = object
                .remove("$text")
                .or_else(|| object.remove("$value"))
                .unwrap_or(Value::Null);
            normalize(shape, text, format, path)
        }
        // `format: byte` in the document: standard base64 text
        (TypeShape::Bytes, Value::String(text)) => base64::engine::general_purpose::STANDARD
            .decode(text.trim())
            .map(|raw| Value::Array(raw.into_iter().map(Value::from).collect()))
            .map_err(|e| invalid(format!("invalid base64: {e}"))),
        (TypeShape::String | TypeShape::DateTime | TypeShape::Bytes | TypeShape::Any, v) => Ok(v),
        (TypeShape::File, v) => Ok(v),
        (scalar, Value::String(text)) => source::coerce(scalar, &text).map_err(invalid),
        (_, other) => Ok(other),
    }
}

/// An XML element holding only text, as decoded by quick-xml.
fn is_text_node(object: &Map<String, Value>) -> bool {
    object.len() == 1 && (object.contains_key("$text") || object.contains_key("$value"))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
