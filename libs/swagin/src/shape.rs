//! Explicit, compile-time description of the data shapes used by models.
//!
//! A [`TypeShape`] is what schema derivation and request binding walk instead
//! of inspecting values at runtime. Composite types are described once with
//! [`StructShape`], usually through the [`describe!`](crate::describe) macro.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::tags::{TagError, Tags};
use crate::upload::UploadedFile;

#[derive(Debug, Clone)]
pub enum TypeShape {
    /// Signed integer without a fixed width (i8, i16, isize).
    Int,
    /// Unsigned integer without a fixed width (u8, u16, usize).
    UInt,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Bool,
    String,
    DateTime,
    /// Raw bytes, transported base64 encoded.
    Bytes,
    /// A multipart upload.
    File,
    Array(Box<TypeShape>),
    /// String-keyed map with values of the inner shape.
    Map(Box<TypeShape>),
    Struct(StructShape),
    /// Free-form JSON.
    Any,
}

impl TypeShape {
    pub fn array_of<T: Describe>() -> Self {
        TypeShape::Array(Box::new(T::describe()))
    }

    pub fn as_struct(&self) -> Option<&StructShape> {
        match self {
            TypeShape::Struct(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StructShape {
    name: &'static str,
    fields: Vec<FieldShape>,
}

impl StructShape {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
        }
    }

    /// Adds a field. `name` is the serde key of the field, `tags` its struct
    /// tag string.
    pub fn field<T: Describe>(mut self, name: &'static str, tags: &'static str) -> Self {
        self.fields.push(FieldShape {
            name,
            tags,
            shape: T::describe,
        });
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[FieldShape] {
        &self.fields
    }
}

/// One field of a [`StructShape`]. The field's own shape is resolved lazily,
/// which keeps recursive types describable.
#[derive(Debug, Clone)]
pub struct FieldShape {
    name: &'static str,
    tags: &'static str,
    shape: fn() -> TypeShape,
}

impl FieldShape {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn raw_tags(&self) -> &'static str {
        self.tags
    }

    pub fn tags(&self) -> Result<Tags, TagError> {
        Tags::parse(self.tags)
    }

    pub fn shape(&self) -> TypeShape {
        (self.shape)()
    }
}

pub trait Describe {
    fn describe() -> TypeShape;
}

macro_rules! describe_as {
    ($shape:ident: $($ty:ty),+) => {
        $(impl Describe for $ty {
            fn describe() -> TypeShape {
                TypeShape::$shape
            }
        })+
    };
}

describe_as!(Int: i8, i16, isize);
describe_as!(UInt: u8, u16, usize);
describe_as!(Int32: i32);
describe_as!(UInt32: u32);
describe_as!(Int64: i64);
describe_as!(UInt64: u64);
describe_as!(Float: f32, f64);
describe_as!(Bool: bool);
describe_as!(String: String, char);
describe_as!(DateTime: chrono::NaiveDateTime);
describe_as!(Bytes: bytes::Bytes);
describe_as!(File: UploadedFile);
describe_as!(Any: serde_json::Value);

impl Describe for &str {
    fn describe() -> TypeShape {
        TypeShape::String
    }
}

impl<Tz: chrono::TimeZone> Describe for chrono::DateTime<Tz> {
    fn describe() -> TypeShape {
        TypeShape::DateTime
    }
}

// Optional fields are described like required ones; required-ness only comes
// from tags.
impl<T: Describe> Describe for Option<T> {
    fn describe() -> TypeShape {
        T::describe()
    }
}

impl<T: Describe> Describe for Box<T> {
    fn describe() -> TypeShape {
        T::describe()
    }
}

impl<T: Describe> Describe for Arc<T> {
    fn describe() -> TypeShape {
        T::describe()
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn describe() -> TypeShape {
        TypeShape::array_of::<T>()
    }
}

impl<T: Describe, S> Describe for HashSet<T, S> {
    fn describe() -> TypeShape {
        TypeShape::array_of::<T>()
    }
}

impl<T: Describe> Describe for BTreeSet<T> {
    fn describe() -> TypeShape {
        TypeShape::array_of::<T>()
    }
}

impl<K, V: Describe, S> Describe for HashMap<K, V, S> {
    fn describe() -> TypeShape {
        TypeShape::Map(Box::new(V::describe()))
    }
}

impl<K, V: Describe> Describe for BTreeMap<K, V> {
    fn describe() -> TypeShape {
        TypeShape::Map(Box::new(V::describe()))
    }
}

impl Describe for () {
    fn describe() -> TypeShape {
        TypeShape::Struct(StructShape::new("Empty"))
    }
}

/// Implements [`Describe`] for plain structs.
///
/// ```
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct CreateUser {
///     name: String,
///     age: Option<u32>,
/// }
///
/// swagin::describe! {
///     CreateUser {
///         name: String => r#"json:"name" binding:"required" description:"User name""#,
///         age: Option<u32> => r#"json:"age" rule:"min=18""#,
///     }
/// }
/// ```
///
/// Fields are known to serde by their Rust name. A field renamed with
/// `#[serde(rename = "...")]` must repeat the rename with `as`:
///
/// ```
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Page {
///     #[serde(rename = "type")]
///     kind: String,
/// }
///
/// swagin::describe! {
///     Page { kind as "type": String => r#"json:"type""# }
/// }
/// ```
#[macro_export]
macro_rules! describe {
    (@name $field:ident) => { stringify!($field) };
    (@name $field:ident $rename:literal) => { $rename };
    ($($ty:ident { $($field:ident $(as $rename:literal)? : $fty:ty => $tags:expr),* $(,)? })+) => {
        $(impl $crate::Describe for $ty {
            fn describe() -> $crate::TypeShape {
                $crate::TypeShape::Struct(
                    $crate::StructShape::new(stringify!($ty))
                        $(.field::<$fty>($crate::describe!(@name $field $($rename)?), $tags))*
                )
            }
        })+
    };
}
