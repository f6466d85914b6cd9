//! Schema descriptions for request and response data.
//!
//! A schema is a JSON Schema object describing the fields a handler expects.
//! It serves two purposes: it is converted into parameters, request bodies and
//! component schemas when the OpenAPI document is built, and it is compiled
//! into a validator that checks parsed request data at runtime.

use serde_json::{json, Map, Value};
use indexmap::IndexMap;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Trait for types that describe themselves with a JSON Schema.
///
/// This trait is usually implemented with `#[derive(ApiSchema)]`, which maps
/// each named field to the schema of its type. Implementations are provided
/// for primitives, strings, `Option`, sequences and maps, so derived structs
/// can nest any of them.
///
/// # Examples
///
/// ```rust
/// use axum_apispec::ApiSchema;
/// use serde_json::json;
///
/// struct Pagination;
///
/// impl ApiSchema for Pagination {
///     fn schema() -> serde_json::Value {
///         json!({
///             "type": "object",
///             "properties": {
///                 "page": { "type": "integer" },
///                 "per_page": { "type": "integer" }
///             }
///         })
///     }
/// }
///
/// assert_eq!(Pagination::schema()["type"], "object");
/// assert!(Pagination::schema_name().is_none());
/// ```
pub trait ApiSchema {
    /// JSON Schema of this type.
    fn schema() -> Value;

    /// Name under which the schema is registered in `components.schemas`.
    ///
    /// Types without a name are inlined wherever they are used.
    fn schema_name() -> Option<Cow<'static, str>> {
        None
    }

    /// Whether a field of this type must be present in its parent object.
    fn is_required() -> bool {
        true
    }
}

macro_rules! impl_scalar_schema {
    ($json_type:literal => $($ty:ty),+ $(,)?) => {
        $(
            impl ApiSchema for $ty {
                fn schema() -> Value {
                    json!({ "type": $json_type })
                }
            }
        )+
    };
}

impl_scalar_schema!("integer" => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
impl_scalar_schema!("number" => f32, f64);
impl_scalar_schema!("boolean" => bool);
impl_scalar_schema!("string" => String, char);

impl ApiSchema for &str {
    fn schema() -> Value {
        json!({ "type": "string" })
    }
}

impl ApiSchema for Value {
    fn schema() -> Value {
        json!({})
    }
}

impl ApiSchema for Map<String, Value> {
    fn schema() -> Value {
        json!({ "type": "object" })
    }
}

impl<T: ApiSchema> ApiSchema for Option<T> {
    fn schema() -> Value {
        T::schema()
    }

    fn is_required() -> bool {
        false
    }
}

impl<T: ApiSchema> ApiSchema for Box<T> {
    fn schema() -> Value {
        T::schema()
    }

    fn schema_name() -> Option<Cow<'static, str>> {
        T::schema_name()
    }
}

macro_rules! impl_sequence_schema {
    ($($seq:ident),+) => {
        $(
            impl<T: ApiSchema> ApiSchema for $seq<T> {
                fn schema() -> Value {
                    json!({ "type": "array", "items": T::schema() })
                }
            }
        )+
    };
}

impl_sequence_schema!(Vec, HashSet, BTreeSet);

macro_rules! impl_map_schema {
    ($($map:ident),+) => {
        $(
            impl<V: ApiSchema, S> ApiSchema for $map<String, V, S> {
                fn schema() -> Value {
                    json!({ "type": "object", "additionalProperties": V::schema() })
                }
            }
        )+
    };
}

impl_map_schema!(HashMap, IndexMap);

impl<V: ApiSchema> ApiSchema for BTreeMap<String, V> {
    fn schema() -> Value {
        json!({ "type": "object", "additionalProperties": V::schema() })
    }
}

/// A resolved schema: its JSON Schema and optional component name.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDef {
    pub name: Option<Cow<'static, str>>,
    pub schema: Value,
}

impl SchemaDef {
    /// Resolve the schema of `T`.
    pub fn of<T: ApiSchema>() -> Self {
        Self {
            name: T::schema_name(),
            schema: T::schema(),
        }
    }

    /// An unnamed schema that is always inlined.
    pub fn inline(schema: Value) -> Self {
        Self { name: None, schema }
    }

    /// A schema registered under `name` in the document components.
    pub fn named(name: impl Into<Cow<'static, str>>, schema: Value) -> Self {
        Self {
            name: Some(name.into()),
            schema,
        }
    }

    /// Display name used in logs and errors.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<inline>")
    }

    /// Whether the schema describes an object with declared properties.
    pub fn has_properties(&self) -> bool {
        self.schema
            .get("properties")
            .and_then(Value::as_object)
            .is_some_and(|props| !props.is_empty())
    }

    /// Declared properties with their schema and required flag, in
    /// declaration order.
    pub fn properties(&self) -> Vec<PropertyDef<'_>> {
        let required: Vec<&str> = self
            .schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        self.schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, schema)| PropertyDef {
                        name,
                        schema,
                        required: required.contains(&name.as_str()),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One property of an object schema.
#[derive(Debug, Clone, Copy)]
pub struct PropertyDef<'a> {
    pub name: &'a str,
    pub schema: &'a Value,
    pub required: bool,
}

impl PropertyDef<'_> {
    /// The JSON type declared for this property, if any.
    pub fn json_type(&self) -> Option<&str> {
        json_type(self.schema)
    }
}

/// The `type` keyword of a schema, ignoring a `null` alternative.
pub(crate) fn json_type(schema: &Value) -> Option<&str> {
    match schema.get("type")? {
        Value::String(ty) => Some(ty),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|ty| *ty != "null"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nested;

    impl ApiSchema for Nested {
        fn schema() -> Value {
            json!({
                "type": "object",
                "properties": {
                    "id": { "type": "integer" },
                    "name": { "type": "string" }
                },
                "required": ["id"]
            })
        }

        fn schema_name() -> Option<Cow<'static, str>> {
            Some(Cow::Borrowed("Nested"))
        }
    }

    #[test]
    fn test_scalar_schemas() {
        assert_eq!(u32::schema(), json!({ "type": "integer" }));
        assert_eq!(f64::schema(), json!({ "type": "number" }));
        assert_eq!(bool::schema(), json!({ "type": "boolean" }));
        assert_eq!(String::schema(), json!({ "type": "string" }));
    }

    #[test]
    fn test_option_is_not_required() {
        assert!(u32::is_required());
        assert!(!Option::<u32>::is_required());
        assert_eq!(Option::<u32>::schema(), json!({ "type": "integer" }));
    }

    #[test]
    fn test_vec_and_map_schemas() {
        assert_eq!(
            Vec::<i64>::schema(),
            json!({ "type": "array", "items": { "type": "integer" } })
        );
        assert_eq!(
            HashMap::<String, bool>::schema(),
            json!({ "type": "object", "additionalProperties": { "type": "boolean" } })
        );
    }

    #[test]
    fn test_schema_def_properties() {
        let def = SchemaDef::of::<Nested>();
        assert_eq!(def.display_name(), "Nested");
        assert!(def.has_properties());

        let props = def.properties();
        assert_eq!(props.len(), 2);
        let id = props.iter().find(|p| p.name == "id").unwrap();
        assert!(id.required);
        assert_eq!(id.json_type(), Some("integer"));
        let name = props.iter().find(|p| p.name == "name").unwrap();
        assert!(!name.required);
    }

    #[test]
    fn test_inline_schema_without_properties() {
        let def = SchemaDef::inline(json!({ "type": "array", "items": {} }));
        assert!(!def.has_properties());
        assert!(def.properties().is_empty());
        assert_eq!(def.display_name(), "<inline>");
    }

    #[test]
    fn test_json_type_skips_null() {
        assert_eq!(json_type(&json!({ "type": ["null", "string"] })), Some("string"));
        assert_eq!(json_type(&json!({})), None);
    }
}
