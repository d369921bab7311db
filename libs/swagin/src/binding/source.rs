//! Flat request sources (headers, query string, cookies, path parameters) and
//! the shape-directed coercion of their string values.

use std::collections::HashMap;

use axum::extract::{FromRequestParts, RawPathParams};
use axum::http::{header, request::Parts, HeaderMap};
use serde_json::{Map, Number, Value};

use crate::error::BindError;
use crate::model::Part;
use crate::shape::TypeShape;

/// Raw values of one request part keyed by source name, in arrival order.
#[derive(Debug, Default)]
pub(crate) struct SourceMap {
    values: HashMap<String, Vec<String>>,
    fold_case: bool,
}

impl SourceMap {
    fn case_insensitive() -> Self {
        Self {
            values: HashMap::new(),
            fold_case: true,
        }
    }

    pub(crate) fn push(&mut self, key: &str, value: impl Into<String>) {
        let key = if self.fold_case {
            key.to_ascii_lowercase()
        } else {
            key.to_owned()
        };
        self.values.entry(key).or_default().push(value.into());
    }

    pub(crate) fn get(&self, key: &str) -> Option<&[String]> {
        let found = if self.fold_case {
            self.values.get(&key.to_ascii_lowercase())
        } else {
            self.values.get(key)
        };
        found.map(Vec::as_slice)
    }
}

pub(crate) fn headers(headers: &HeaderMap) -> SourceMap {
    let mut map = SourceMap::case_insensitive();
    for (name, value) in headers {
        map.push(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
    }
    map
}

pub(crate) fn query(query: Option<&str>) -> SourceMap {
    pairs(query.unwrap_or_default().as_bytes())
}

/// `application/x-www-form-urlencoded` pairs.
pub(crate) fn pairs(raw: &[u8]) -> SourceMap {
    let mut map = SourceMap::default();
    for (key, value) in form_urlencoded::parse(raw) {
        map.push(&key, value);
    }
    map
}

pub(crate) fn cookies(headers: &HeaderMap) -> SourceMap {
    let mut map = SourceMap::default();
    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else {
            continue;
        };
        for pair in raw.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                map.push(name.trim(), value.trim().trim_matches('"'));
            }
        }
    }
    map
}

/// Path parameters captured by the router. A route without captures yields
/// an empty map.
pub(crate) async fn path_params(parts: &mut Parts) -> SourceMap {
    let mut map = SourceMap::default();
    if let Ok(params) = RawPathParams::from_request_parts(parts, &()).await {
        for (key, value) in params.iter() {
            map.push(key, value);
        }
    }
    map
}

/// Builds the JSON object for a flat part: each field tagged for the part is
/// looked up by its tag name and stored under its serde name. Cookies fall
/// back to the field name when the `cookie` tag is absent.
pub(crate) fn decode(part: Part, shape: &TypeShape, source: &SourceMap) -> Result<Value, BindError> {
    let Some(shape) = shape.as_struct() else {
        return Err(BindError::Decode {
            part,
            message: "parameter parts must be described as structs".into(),
        });
    };

    let mut object = Map::new();
    for field in shape.fields() {
        let tags = field.tags().map_err(|source| BindError::Tags {
            part,
            field: field.name().to_owned(),
            source,
        })?;
        let key = match tags.name(part.tag_key()) {
            Some(key) => key,
            None if part == Part::Cookie => field.name(),
            None => continue,
        };
        let Some(values) = source.get(key) else {
            continue;
        };
        let value = coerce_all(&field.shape(), values).map_err(|message| {
            BindError::InvalidValue {
                part,
                field: key.to_owned(),
                message,
            }
        })?;
        object.insert(field.name().to_owned(), value);
    }
    Ok(Value::Object(object))
}

/// Scalars take the first value; arrays take every value.
pub(crate) fn coerce_all(shape: &TypeShape, values: &[String]) -> Result<Value, String> {
    match shape {
        TypeShape::Array(inner) => values
            .iter()
            .map(|v| coerce(inner, v))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        _ => match values.first() {
            Some(first) => coerce(shape, first),
            None => Ok(Value::Null),
        },
    }
}

pub(crate) fn coerce(shape: &TypeShape, raw: &str) -> Result<Value, String> {
    match shape {
        TypeShape::Int | TypeShape::Int32 | TypeShape::Int64 => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| format!("`{raw}` is not an integer: {e}")),
        TypeShape::UInt | TypeShape::UInt32 | TypeShape::UInt64 => raw
            .trim()
            .parse::<u64>()
            .map(Value::from)
            .map_err(|e| format!("`{raw}` is not an unsigned integer: {e}")),
        TypeShape::Float => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("`{raw}` is not a number")),
        TypeShape::Bool => parse_bool(raw)
            .map(Value::Bool)
            .ok_or_else(|| format!("`{raw}` is not a boolean")),
        TypeShape::String | TypeShape::DateTime | TypeShape::Bytes | TypeShape::Any => {
            Ok(Value::String(raw.to_owned()))
        }
        TypeShape::Array(inner) => coerce(inner, raw).map(|v| Value::Array(vec![v])),
        TypeShape::Map(_) | TypeShape::Struct(_) => {
            serde_json::from_str(raw).map_err(|e| format!("`{raw}` is not a JSON object: {e}"))
        }
        TypeShape::File => Err("files are only accepted in multipart bodies".into()),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "on" => Some(true),
        "false" | "f" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
