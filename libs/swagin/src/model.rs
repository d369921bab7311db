//! Request models and the parts they are assembled from.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::{Validate, ValidationErrors};

use crate::openapi::ParameterLocation;
use crate::shape::{Describe, TypeShape};

/// The five request parts a model may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Part {
    Header,
    Query,
    Cookie,
    Uri,
    Body,
}

impl Part {
    /// Parts in binding order.
    pub const ALL: [Part; 5] = [Part::Header, Part::Query, Part::Cookie, Part::Uri, Part::Body];

    pub fn as_str(self) -> &'static str {
        match self {
            Part::Header => "header",
            Part::Query => "query",
            Part::Cookie => "cookie",
            Part::Uri => "uri",
            Part::Body => "body",
        }
    }

    /// Tag key naming the source key of a field in this part.
    pub fn tag_key(self) -> &'static str {
        match self {
            Part::Body => "json",
            other => other.as_str(),
        }
    }

    /// OpenAPI parameter location, `None` for the body.
    pub fn location(self) -> Option<ParameterLocation> {
        match self {
            Part::Header => Some(ParameterLocation::Header),
            Part::Query => Some(ParameterLocation::Query),
            Part::Cookie => Some(ParameterLocation::Cookie),
            Part::Uri => Some(ParameterLocation::Path),
            Part::Body => None,
        }
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed request model.
///
/// ```
/// use serde::Deserialize;
/// use swagin::{describe, Model, ModelShape};
/// use validator::Validate;
///
/// #[derive(Debug, Default, Deserialize, Validate)]
/// struct ItemPath {
///     id: u64,
/// }
///
/// describe! {
///     ItemPath { id: u64 => r#"uri:"id" json:"id" description:"Item id""# }
/// }
///
/// #[derive(Debug, Default, Validate)]
/// struct GetItem {
///     #[validate(nested)]
///     uri: ItemPath,
/// }
///
/// impl Model for GetItem {
///     fn shape() -> ModelShape<Self> {
///         ModelShape::new().uri(|m: &mut Self, p: ItemPath| m.uri = p)
///     }
/// }
/// ```
pub trait Model: Default + Validate + Send + Sync + 'static {
    fn shape() -> ModelShape<Self>;
}

type Setter<M> = Box<dyn Fn(&mut M, Value) -> Result<(), serde_json::Error> + Send + Sync>;
type ProtobufSetter<M> = Box<dyn Fn(&mut M, &[u8]) -> Result<(), prost::DecodeError> + Send + Sync>;

pub(crate) struct PartSlot<M> {
    pub(crate) part: Part,
    pub(crate) shape: TypeShape,
    pub(crate) set: Setter<M>,
    pub(crate) protobuf: Option<ProtobufSetter<M>>,
}

/// Declares which parts a model has and how each one is stored.
pub struct ModelShape<M> {
    slots: Vec<PartSlot<M>>,
}

impl<M: 'static> Default for ModelShape<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: 'static> ModelShape<M> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn header<P, F>(self, set: F) -> Self
    where
        P: Describe + DeserializeOwned + 'static,
        F: Fn(&mut M, P) + Send + Sync + 'static,
    {
        self.part(Part::Header, set)
    }

    pub fn query<P, F>(self, set: F) -> Self
    where
        P: Describe + DeserializeOwned + 'static,
        F: Fn(&mut M, P) + Send + Sync + 'static,
    {
        self.part(Part::Query, set)
    }

    pub fn cookie<P, F>(self, set: F) -> Self
    where
        P: Describe + DeserializeOwned + 'static,
        F: Fn(&mut M, P) + Send + Sync + 'static,
    {
        self.part(Part::Cookie, set)
    }

    pub fn uri<P, F>(self, set: F) -> Self
    where
        P: Describe + DeserializeOwned + 'static,
        F: Fn(&mut M, P) + Send + Sync + 'static,
    {
        self.part(Part::Uri, set)
    }

    pub fn body<P, F>(self, set: F) -> Self
    where
        P: Describe + DeserializeOwned + 'static,
        F: Fn(&mut M, P) + Send + Sync + 'static,
    {
        self.part(Part::Body, set)
    }

    /// Like [`body`](Self::body), and additionally accepts
    /// `application/x-protobuf` bodies decoded as `Msg` and converted into `P`.
    pub fn body_protobuf<P, Msg, F>(self, set: F) -> Self
    where
        P: Describe + DeserializeOwned + From<Msg> + 'static,
        Msg: prost::Message + Default + 'static,
        F: Fn(&mut M, P) + Clone + Send + Sync + 'static,
    {
        let from_protobuf = set.clone();
        let mut shape = self.part(Part::Body, set);
        if let Some(slot) = shape.slots.iter_mut().find(|s| s.part == Part::Body) {
            slot.protobuf = Some(Box::new(move |model, bytes| {
                let message = Msg::decode(bytes)?;
                from_protobuf(model, P::from(message));
                Ok(())
            }));
        }
        shape
    }

    fn part<P, F>(mut self, part: Part, set: F) -> Self
    where
        P: Describe + DeserializeOwned + 'static,
        F: Fn(&mut M, P) + Send + Sync + 'static,
    {
        self.slots.retain(|s| s.part != part);
        self.slots.push(PartSlot {
            part,
            shape: P::describe(),
            set: Box::new(move |model, value| {
                let decoded = serde_json::from_value::<P>(value)?;
                set(model, decoded);
                Ok(())
            }),
            protobuf: None,
        });
        self
    }

    pub(crate) fn slot(&self, part: Part) -> Option<&PartSlot<M>> {
        self.slots.iter().find(|s| s.part == part)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The shape-only view used for document assembly.
    pub fn doc(&self) -> ModelDoc {
        ModelDoc {
            parts: self
                .slots
                .iter()
                .map(|s| (s.part, s.shape.clone()))
                .collect(),
        }
    }
}

/// Shapes of a model's declared parts.
#[derive(Debug, Clone, Default)]
pub struct ModelDoc {
    parts: Vec<(Part, TypeShape)>,
}

impl ModelDoc {
    pub fn from_parts(parts: Vec<(Part, TypeShape)>) -> Self {
        Self { parts }
    }

    pub fn part(&self, part: Part) -> Option<&TypeShape> {
        self.parts.iter().find(|(p, _)| *p == part).map(|(_, s)| s)
    }
}

/// Model for routes that read nothing from the request.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoModel;

impl Validate for NoModel {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }
}

impl Model for NoModel {
    fn shape() -> ModelShape<Self> {
        ModelShape::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Paging {
        page: u32,
    }

    crate::describe! {
        Paging { page: u32 => r#"query:"page""# }
    }

    #[derive(Debug, Default)]
    struct ListItems {
        query: Paging,
    }

    #[test]
    fn setter_stores_decoded_part() {
        let shape = ModelShape::<ListItems>::new().query(|m: &mut ListItems, q: Paging| m.query = q);
        let slot = shape.slot(Part::Query).unwrap();
        let mut model = ListItems::default();
        (slot.set)(&mut model, json!({ "page": 3 })).unwrap();
        assert_eq!(model.query, Paging { page: 3 });
        assert!(shape.slot(Part::Body).is_none());
    }

    #[test]
    fn redeclaring_a_part_replaces_it() {
        let shape = ModelShape::<ListItems>::new()
            .query(|_: &mut ListItems, _: serde_json::Value| {})
            .query(|m: &mut ListItems, q: Paging| m.query = q);
        let doc = shape.doc();
        assert!(doc.part(Part::Query).unwrap().as_struct().is_some());
    }

    #[test]
    fn part_metadata() {
        assert_eq!(Part::Uri.location(), Some(ParameterLocation::Path));
        assert_eq!(Part::Body.tag_key(), "json");
        assert_eq!(Part::Cookie.to_string(), "cookie");
        assert!(NoModel::shape().is_empty());
    }
}
