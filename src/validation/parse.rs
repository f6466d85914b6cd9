//! Per-location extraction of raw request data and coercion of string
//! values to the types their schema declares.

use super::failure::{FieldErrors, SCHEMA_FIELD};
use crate::metadata::Location;
use crate::schema::{json_type, SchemaDef};
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use url::form_urlencoded;

/// Field name to every value supplied for it.
pub(crate) type MultiMap = IndexMap<String, Vec<String>>;

/// Data read from one location, before schema validation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawData {
    /// An already typed JSON document.
    Json(Value),
    /// String values, keyed by field name.
    Fields { fields: MultiMap, case_insensitive: bool },
}

impl RawData {
    /// Turn the raw data into a JSON value shaped by `schema`.
    ///
    /// String fields are restricted to the declared properties and converted
    /// to their declared types; conversion errors are reported per field.
    pub(crate) fn into_value(self, schema: &SchemaDef) -> (Value, FieldErrors) {
        match self {
            RawData::Json(value) => (value, FieldErrors::new()),
            RawData::Fields {
                fields,
                case_insensitive,
            } => {
                let (object, errors) = coerce_fields(&fields, schema, case_insensitive);
                (Value::Object(object), errors)
            }
        }
    }
}

/// Request pieces the parser reads from.
pub(crate) struct RawRequest<'a> {
    pub parts: &'a Parts,
    pub body: Option<&'a [u8]>,
    pub path_params: &'a [(String, String)],
}

impl RawRequest<'_> {
    pub(crate) fn extract(&self, location: Location) -> Result<RawData, FieldErrors> {
        let fields = |fields| RawData::Fields {
            fields,
            case_insensitive: false,
        };

        match location {
            Location::Query | Location::Querystring => Ok(fields(parse_urlencoded(
                self.parts.uri.query().unwrap_or_default().as_bytes(),
            ))),
            Location::Form => Ok(fields(parse_urlencoded(self.body.unwrap_or_default()))),
            Location::Headers => Ok(RawData::Fields {
                fields: header_fields(&self.parts.headers),
                case_insensitive: true,
            }),
            Location::Cookies => Ok(fields(cookie_fields(&self.parts.headers))),
            Location::MatchInfo | Location::Path => Ok(fields(
                self.path_params
                    .iter()
                    .map(|(key, value)| (key.clone(), vec![value.clone()]))
                    .collect(),
            )),
            Location::Json => parse_json(self.body.unwrap_or_default()).map(RawData::Json),
            Location::Files => Ok(fields(MultiMap::new())),
        }
    }
}

pub(crate) fn parse_urlencoded(input: &[u8]) -> MultiMap {
    let mut fields = MultiMap::new();
    for (key, value) in form_urlencoded::parse(input).into_owned() {
        fields.entry(key).or_default().push(value);
    }
    fields
}

fn header_fields(headers: &HeaderMap) -> MultiMap {
    let mut fields = MultiMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            // Header names are already lowercase.
            fields
                .entry(name.as_str().to_string())
                .or_default()
                .push(value.to_string());
        }
    }
    fields
}

fn cookie_fields(headers: &HeaderMap) -> MultiMap {
    let mut fields = MultiMap::new();
    let pairs = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.split_once('='));

    for (name, value) in pairs {
        let value = value.trim().trim_matches('"');
        fields
            .entry(name.trim().to_string())
            .or_default()
            .push(value.to_string());
    }
    fields
}

/// An empty body reads as an empty object.
fn parse_json(body: &[u8]) -> Result<Value, FieldErrors> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body).map_err(|err| {
        tracing::debug!(error = %err, "request body is not valid JSON");
        FieldErrors::single(SCHEMA_FIELD, "Invalid JSON body.")
    })
}

fn coerce_fields(
    fields: &MultiMap,
    schema: &SchemaDef,
    case_insensitive: bool,
) -> (Map<String, Value>, FieldErrors) {
    let mut object = Map::new();
    let mut errors = FieldErrors::new();

    for property in schema.properties() {
        let values = if case_insensitive {
            fields.get(&property.name.to_ascii_lowercase())
        } else {
            fields.get(property.name)
        };
        let Some(values) = values else {
            continue;
        };

        let coerced = match property.json_type() {
            Some("array") => {
                let item_type = property.schema.get("items").and_then(json_type);
                values
                    .iter()
                    .map(|raw| coerce_scalar(raw, item_type))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            ty => match values.first() {
                Some(raw) => coerce_scalar(raw, ty),
                None => continue,
            },
        };

        match coerced {
            Ok(value) => {
                object.insert(property.name.to_string(), value);
            }
            Err(message) => errors.add(property.name, message),
        }
    }

    (object, errors)
}

fn coerce_scalar(raw: &str, ty: Option<&str>) -> Result<Value, &'static str> {
    match ty {
        Some("integer") => {
            let raw = raw.trim();
            raw.parse::<i64>()
                .map(Value::from)
                .or_else(|_| raw.parse::<u64>().map(Value::from))
                .map_err(|_| "Not a valid integer.")
        }
        Some("number") => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or("Not a valid number."),
        Some("boolean") => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "on" | "1" => Ok(Value::Bool(true)),
            "false" | "f" | "no" | "n" | "off" | "0" => Ok(Value::Bool(false)),
            _ => Err("Not a valid boolean."),
        },
        Some("object") => match serde_json::from_str::<Value>(raw) {
            Ok(value @ Value::Object(_)) => Ok(value),
            _ => Err("Not a valid mapping type."),
        },
        _ => Ok(Value::String(raw.to_string())),
    }
}
