//! Derivation of OpenAPI schemas, parameters, request bodies and responses
//! from [`TypeShape`]s and their field tags.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::SchemaError;
use crate::model::{ModelDoc, Part};
use crate::openapi::{
    MediaType, Parameter, ParameterLocation, RequestBody, Response, Schema, SchemaType,
};
use crate::route::ResponseItem;
use crate::rule::Rules;
use crate::shape::{FieldShape, StructShape, TypeShape};
use crate::tags::{TagError, Tags};

/// Deepest nesting accepted before derivation gives up on a recursive type.
pub const MAX_DEPTH: usize = 32;

pub fn schema_for(shape: &TypeShape) -> Result<Schema, SchemaError> {
    walk(shape, "", 0)
}

fn walk(shape: &TypeShape, owner: &str, depth: usize) -> Result<Schema, SchemaError> {
    if depth > MAX_DEPTH {
        return Err(SchemaError::TooDeep {
            owner: owner.to_owned(),
            limit: MAX_DEPTH,
        });
    }

    let schema = match shape {
        TypeShape::Int => Schema::of(SchemaType::Integer),
        TypeShape::UInt => Schema::of(SchemaType::Integer).with_minimum(0.0),
        TypeShape::Int32 => Schema::of(SchemaType::Integer).with_format("int32"),
        TypeShape::UInt32 => Schema::of(SchemaType::Integer)
            .with_format("int32")
            .with_minimum(0.0),
        TypeShape::Int64 => Schema::of(SchemaType::Integer).with_format("int64"),
        TypeShape::UInt64 => Schema::of(SchemaType::Integer)
            .with_format("int64")
            .with_minimum(0.0),
        TypeShape::Float => Schema::of(SchemaType::Number),
        TypeShape::Bool => Schema::of(SchemaType::Boolean),
        TypeShape::String => Schema::of(SchemaType::String),
        TypeShape::DateTime => Schema::of(SchemaType::String).with_format("date-time"),
        TypeShape::Bytes => Schema::of(SchemaType::String).with_format("byte"),
        TypeShape::File => Schema::of(SchemaType::String).with_format("binary"),
        TypeShape::Array(inner) => Schema::array(walk(inner, owner, depth + 1)?),
        // Maps are string-keyed objects, so the value schema goes in
        // `additionalProperties`; OpenAPI 3.0 gives `items` no meaning on objects.
        TypeShape::Map(inner) => Schema {
            additional_properties: Some(Box::new(walk(inner, owner, depth + 1)?)),
            ..Schema::of(SchemaType::Object)
        },
        TypeShape::Struct(s) => struct_schema(s, depth)?,
        TypeShape::Any => Schema::default(),
    };
    Ok(schema)
}

fn struct_schema(shape: &StructShape, depth: usize) -> Result<Schema, SchemaError> {
    let mut schema = Schema::of(SchemaType::Object);
    for field in shape.fields() {
        let tags = field_tags(shape, field)?;
        let Some(name) = tags.json_name() else {
            continue;
        };
        let meta = FieldMeta::from_tags(&tags).map_err(|source| malformed(shape, field, source))?;

        let mut property = walk(&field.shape(), shape.name(), depth + 1)?;
        meta.apply(&mut property, true);
        if meta.required {
            schema.required.push(name.to_owned());
        }
        schema.properties.insert(name.to_owned(), property);
    }
    Ok(schema)
}

fn field_tags(owner: &StructShape, field: &FieldShape) -> Result<Tags, SchemaError> {
    field.tags().map_err(|source| malformed(owner, field, source))
}

fn malformed(owner: &StructShape, field: &FieldShape, source: TagError) -> SchemaError {
    SchemaError::MalformedTag {
        owner: owner.name().to_owned(),
        field: field.name().to_owned(),
        source,
    }
}

/// Tag-sourced metadata of one field.
#[derive(Debug, Default)]
struct FieldMeta {
    description: Option<String>,
    required: bool,
    default: Option<Value>,
    example: Option<Value>,
    rules: Rules,
    format: Option<String>,
}

impl FieldMeta {
    fn from_tags(tags: &Tags) -> Result<Self, TagError> {
        let rules = match tags.get("rule") {
            Some(tag) => Rules::parse(tag)?,
            None => Rules::default(),
        };
        Ok(Self {
            description: tags.value("description").map(str::to_owned),
            required: tags.binding_required() || rules.required,
            default: tags.value("default").map(|v| Value::String(v.to_owned())),
            example: tags.value("example").map(|v| Value::String(v.to_owned())),
            rules,
            format: tags.value("format").map(str::to_owned),
        })
    }

    /// Overlays metadata in tag precedence order. Parameters keep description
    /// and example on the parameter itself, so `inline` is false for them.
    fn apply(&self, schema: &mut Schema, inline: bool) {
        if inline {
            if let Some(description) = &self.description {
                schema.description = Some(description.clone());
            }
        }
        if let Some(default) = &self.default {
            schema.default = Some(default.clone());
        }
        if inline {
            if let Some(example) = &self.example {
                schema.example = Some(example.clone());
            }
        }
        if let Some(pattern) = &self.rules.pattern {
            schema.pattern = Some(pattern.clone());
        }
        let is_string = schema.is_type(SchemaType::String);
        if let Some(min) = self.rules.minimum {
            if is_string {
                schema.min_length = Some(min.max(0.0) as u64);
            } else {
                schema.minimum = Some(min);
            }
        }
        if let Some(max) = self.rules.maximum {
            if is_string {
                schema.max_length = Some(max.max(0.0) as u64);
            } else {
                schema.maximum = Some(max);
            }
        }
        if let Some(format) = &self.format {
            schema.format = Some(format.clone());
        }
    }
}

/// Parameters for the uri, query, cookie and header parts, in that order.
/// Only fields tagged with the part's source key become parameters.
pub fn parameters_for(doc: &ModelDoc) -> Result<Vec<Parameter>, SchemaError> {
    let mut parameters = Vec::new();
    for part in [Part::Uri, Part::Query, Part::Cookie, Part::Header] {
        let Some(shape) = doc.part(part).and_then(TypeShape::as_struct) else {
            continue;
        };
        let Some(location) = part.location() else {
            continue;
        };
        for field in shape.fields() {
            let tags = field_tags(shape, field)?;
            let Some(name) = tags.name(part.tag_key()) else {
                continue;
            };
            let meta =
                FieldMeta::from_tags(&tags).map_err(|source| malformed(shape, field, source))?;

            let mut schema = walk(&field.shape(), shape.name(), 1)?;
            meta.apply(&mut schema, false);
            parameters.push(Parameter {
                name: name.to_owned(),
                location,
                description: meta.description.clone(),
                required: meta.required || location == ParameterLocation::Path,
                example: meta.example.clone(),
                schema,
            });
        }
    }
    Ok(parameters)
}

/// Request body for the model's body part, `None` when the body schema would
/// be empty.
pub fn request_body_for(
    doc: &ModelDoc,
    content_type: &str,
) -> Result<Option<RequestBody>, SchemaError> {
    let Some(shape) = doc.part(Part::Body) else {
        return Ok(None);
    };
    let schema = schema_for(shape)?;
    let populated = schema.is_populated_object()
        || (schema.is_type(SchemaType::Array)
            && schema
                .items
                .as_deref()
                .is_some_and(Schema::is_populated_object));
    if !populated {
        return Ok(None);
    }

    Ok(Some(RequestBody {
        description: None,
        required: true,
        content: BTreeMap::from([(content_type.to_owned(), MediaType { schema })]),
    }))
}

/// One response per declared status code. Without declarations the operation
/// gets an undescribed `default` response.
pub fn responses_for(
    items: &BTreeMap<String, ResponseItem>,
    content_type: &str,
) -> Result<BTreeMap<String, Response>, SchemaError> {
    if items.is_empty() {
        return Ok(BTreeMap::from([("default".to_owned(), Response::default())]));
    }

    let mut responses = BTreeMap::new();
    for (code, item) in items {
        let mut response = Response {
            description: item.description.clone(),
            headers: item.headers.clone(),
            content: BTreeMap::new(),
        };
        if let Some(model) = &item.model {
            let schema = schema_for(model)?;
            response
                .content
                .insert(content_type.to_owned(), MediaType { schema });
        }
        responses.insert(code.clone(), response);
    }
    Ok(responses)
}
