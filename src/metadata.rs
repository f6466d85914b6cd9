//! Handler metadata: documentation attributes and schema bindings.
//!
//! A [`HandlerMetadata`] record accumulates everything declared about one
//! handler. It is filled either by the `#[api_handler]` attribute and its
//! helper attributes, or directly through the builder methods below, which
//! are what the attribute expands to.
//!
//! ```rust
//! use axum_apispec::{json_schema, response_schema, ApiSchema, Docs, HandlerMetadata};
//! # use serde_json::{json, Value};
//! # struct CreatePet;
//! # impl ApiSchema for CreatePet { fn schema() -> Value { json!({"type": "object"}) } }
//! # struct Pet;
//! # impl ApiSchema for Pet { fn schema() -> Value { json!({"type": "object"}) } }
//!
//! let metadata = HandlerMetadata::new()
//!     .docs(Docs::new().tags(["pets"]).summary("Create a pet"))
//!     .request_schema(json_schema::<CreatePet>())?
//!     .response_schema(response_schema::<Pet>(201).description("Created"));
//!
//! assert_eq!(metadata.tags, vec!["pets".to_string()]);
//! assert!(metadata.request_schema(json_schema::<CreatePet>()).is_err());
//! # Ok::<(), axum_apispec::ConfigError>(())
//! ```

use crate::error::ConfigError;
use crate::schema::{ApiSchema, SchemaDef};
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Media type used when a handler declares no `produces` list.
pub const DEFAULT_MEDIA_TYPE: &str = "application/json";

/// Part of an HTTP request that a schema binding is parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Cookies,
    Files,
    Form,
    Headers,
    Json,
    MatchInfo,
    Path,
    Query,
    Querystring,
}

impl Location {
    pub const ALL: [Location; 9] = [
        Location::Cookies,
        Location::Files,
        Location::Form,
        Location::Headers,
        Location::Json,
        Location::MatchInfo,
        Location::Path,
        Location::Query,
        Location::Querystring,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Location::Cookies => "cookies",
            Location::Files => "files",
            Location::Form => "form",
            Location::Headers => "headers",
            Location::Json => "json",
            Location::MatchInfo => "match_info",
            Location::Path => "path",
            Location::Query => "query",
            Location::Querystring => "querystring",
        }
    }

    /// A request carries a single parsed JSON body.
    pub fn is_body(self) -> bool {
        matches!(self, Location::Json)
    }

    /// Media type of the request body this location is documented under.
    pub fn body_media_type(self) -> Option<&'static str> {
        match self {
            Location::Json => Some("application/json"),
            Location::Form => Some("application/x-www-form-urlencoded"),
            Location::Files => Some("multipart/form-data"),
            _ => None,
        }
    }

    /// Parameter location this location is documented under.
    pub fn param_location(self) -> Option<ParamLocation> {
        match self {
            Location::Query | Location::Querystring => Some(ParamLocation::Query),
            Location::Headers => Some(ParamLocation::Header),
            Location::Cookies => Some(ParamLocation::Cookie),
            Location::MatchInfo | Location::Path => Some(ParamLocation::Path),
            Location::Json | Location::Form | Location::Files => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Location::ALL
            .into_iter()
            .find(|location| location.as_str() == s)
            .ok_or_else(|| ConfigError::InvalidLocation(s.to_string()))
    }
}

/// The `in` field of an OpenAPI parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamLocation {
    Query,
    Header,
    Path,
    Cookie,
}

impl ParamLocation {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamLocation::Query => "query",
            ParamLocation::Header => "header",
            ParamLocation::Path => "path",
            ParamLocation::Cookie => "cookie",
        }
    }
}

impl FromStr for ParamLocation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(ParamLocation::Query),
            "header" => Ok(ParamLocation::Header),
            "path" => Ok(ParamLocation::Path),
            "cookie" => Ok(ParamLocation::Cookie),
            other => Err(ConfigError::InvalidLocation(other.to_string())),
        }
    }
}

/// An extra parameter declared through [`Docs::parameter`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDoc {
    pub name: String,
    pub location: ParamLocation,
    pub description: Option<String>,
    pub required: bool,
    pub deprecated: bool,
    pub schema: Value,
}

impl ParameterDoc {
    /// A string parameter. Path parameters are always required.
    pub fn new(name: impl Into<String>, location: ParamLocation) -> Self {
        Self {
            name: name.into(),
            location,
            description: None,
            required: location == ParamLocation::Path,
            deprecated: false,
            schema: json!({ "type": "string" }),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required || self.location == ParamLocation::Path;
        self
    }

    #[must_use]
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    #[must_use]
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }
}

/// A documented response for one status code.
///
/// Only the fields an OpenAPI response object accepts are kept: description,
/// body schema, headers and examples.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDoc {
    pub description: String,
    pub schema: Option<SchemaDef>,
    /// Whether a body must be present; used by response validation only.
    pub required: bool,
    /// Header name to header description.
    pub headers: IndexMap<String, String>,
    /// Example name to example value.
    pub examples: IndexMap<String, Value>,
}

impl ResponseDoc {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            schema: None,
            required: false,
            headers: IndexMap::new(),
            examples: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn schema<T: ApiSchema>(self) -> Self {
        self.schema_def(SchemaDef::of::<T>())
    }

    #[must_use]
    pub fn schema_def(mut self, schema: SchemaDef) -> Self {
        self.schema = Some(schema);
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.headers.insert(name.into(), description.into());
        self
    }

    #[must_use]
    pub fn example(mut self, name: impl Into<String>, value: Value) -> Self {
        self.examples.insert(name.into(), value);
        self
    }
}

/// Documentation attributes merged into a handler by [`HandlerMetadata::docs`].
///
/// Fields left unset keep whatever an earlier declaration provided.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Docs {
    pub tags: Option<Vec<String>>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub operation_id: Option<String>,
    pub deprecated: Option<bool>,
    pub produces: Option<Vec<String>>,
    pub parameters: Vec<ParameterDoc>,
    pub responses: IndexMap<u16, ResponseDoc>,
}

impl Docs {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    #[must_use]
    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = Some(deprecated);
        self
    }

    #[must_use]
    pub fn produces<I, S>(mut self, media_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.produces = Some(media_types.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn parameter(mut self, parameter: ParameterDoc) -> Self {
        self.parameters.push(parameter);
        self
    }

    #[must_use]
    pub fn response(mut self, code: u16, response: ResponseDoc) -> Self {
        self.responses.insert(code, response);
        self
    }
}

/// A (schema, location, target key) triple declared on a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBinding {
    pub schema: SchemaDef,
    pub location: Location,
    /// Request context key the parsed data is stored under. When unset the
    /// data is merged into the shared request data mapping.
    pub put_into: Option<String>,
    pub required: bool,
    pub example: Option<Value>,
    /// Put the example on the component schema instead of the endpoint.
    pub add_to_refs: bool,
}

impl RequestBinding {
    pub fn new<T: ApiSchema>(location: Location) -> Self {
        Self::from_def(SchemaDef::of::<T>(), location)
    }

    pub fn from_def(schema: SchemaDef, location: Location) -> Self {
        Self {
            schema,
            location,
            put_into: None,
            required: false,
            example: None,
            add_to_refs: false,
        }
    }

    #[must_use]
    pub fn put_into(mut self, key: impl Into<String>) -> Self {
        self.put_into = Some(key.into());
        self
    }

    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub fn example(mut self, example: Value) -> Self {
        self.example = Some(example);
        self
    }

    #[must_use]
    pub fn add_to_refs(mut self, add_to_refs: bool) -> Self {
        self.add_to_refs = add_to_refs;
        self
    }
}

/// Bind `T` to `location`, merging the parsed data into the shared mapping.
pub fn request_schema<T: ApiSchema>(location: Location) -> RequestBinding {
    RequestBinding::new::<T>(location)
}

/// Alias of [`request_schema`].
pub fn use_kwargs<T: ApiSchema>(location: Location) -> RequestBinding {
    request_schema::<T>(location)
}

macro_rules! location_shortcut {
    ($(#[$doc:meta] $name:ident => $location:ident),+ $(,)?) => {
        $(
            #[$doc]
            pub fn $name<T: ApiSchema>() -> RequestBinding {
                let location = Location::$location;
                RequestBinding::new::<T>(location).put_into(location.as_str())
            }
        )+
    };
}

location_shortcut! {
    /// Bind `T` to the path parameters, stored under `"match_info"`.
    match_info_schema => MatchInfo,
    /// Bind `T` to the query string, stored under `"querystring"`.
    querystring_schema => Querystring,
    /// Bind `T` to a url-encoded form body, stored under `"form"`.
    form_schema => Form,
    /// Bind `T` to the JSON body, stored under `"json"`.
    json_schema => Json,
    /// Bind `T` to the request headers, stored under `"headers"`.
    headers_schema => Headers,
    /// Bind `T` to the request cookies, stored under `"cookies"`.
    cookies_schema => Cookies,
}

/// An expected response shape for a status code.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseBinding {
    pub schema: SchemaDef,
    pub code: u16,
    pub required: bool,
    pub description: String,
}

impl ResponseBinding {
    pub fn new<T: ApiSchema>(code: u16) -> Self {
        Self {
            schema: SchemaDef::of::<T>(),
            code,
            required: false,
            description: String::new(),
        }
    }

    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Declare that the handler answers `code` with a body of type `T`.
pub fn response_schema<T: ApiSchema>(code: u16) -> ResponseBinding {
    ResponseBinding::new::<T>(code)
}

/// Alias of [`response_schema`].
pub fn marshal_with<T: ApiSchema>(code: u16) -> ResponseBinding {
    response_schema::<T>(code)
}

/// Everything declared about one handler.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerMetadata {
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub operation_id: Option<String>,
    pub deprecated: bool,
    pub produces: Vec<String>,
    pub parameters: Vec<ParameterDoc>,
    pub responses: IndexMap<u16, ResponseDoc>,
    /// Request bindings in declaration order.
    pub request_schemas: Vec<RequestBinding>,
}

impl Default for HandlerMetadata {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            summary: None,
            description: None,
            operation_id: None,
            deprecated: false,
            produces: vec![DEFAULT_MEDIA_TYPE.to_string()],
            parameters: Vec::new(),
            responses: IndexMap::new(),
            request_schemas: Vec::new(),
        }
    }
}

impl HandlerMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge documentation attributes. Parameters are appended, responses
    /// replace earlier ones with the same status code, and every other field
    /// overrides when set.
    #[must_use]
    pub fn docs(mut self, docs: Docs) -> Self {
        let Docs {
            tags,
            summary,
            description,
            operation_id,
            deprecated,
            produces,
            parameters,
            responses,
        } = docs;

        if let Some(tags) = tags {
            self.tags = tags;
        }
        if summary.is_some() {
            self.summary = summary;
        }
        if description.is_some() {
            self.description = description;
        }
        if operation_id.is_some() {
            self.operation_id = operation_id;
        }
        if let Some(deprecated) = deprecated {
            self.deprecated = deprecated;
        }
        match produces {
            Some(produces) if !produces.is_empty() => self.produces = produces,
            _ if self.produces.is_empty() => self.produces = vec![DEFAULT_MEDIA_TYPE.to_string()],
            _ => {}
        }
        self.parameters.extend(parameters);
        self.responses.extend(responses);
        self
    }

    /// Add a request binding.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MultipleBodySchemas`] when a second `json`
    /// binding is added, and [`ConfigError::InvalidSchema`] when a location
    /// other than `json` is bound to a schema without object properties.
    pub fn request_schema(mut self, binding: RequestBinding) -> Result<Self, ConfigError> {
        if binding.location.is_body()
            && self
                .request_schemas
                .iter()
                .any(|existing| existing.location.is_body())
        {
            return Err(ConfigError::MultipleBodySchemas);
        }

        if !binding.location.is_body() && !binding.schema.has_properties() {
            return Err(ConfigError::InvalidSchema {
                schema: binding.schema.display_name().to_string(),
                location: binding.location.as_str(),
                reason: "an object schema with properties is required".to_string(),
            });
        }

        self.request_schemas.push(binding);
        Ok(self)
    }

    /// Record the expected response for a status code.
    #[must_use]
    pub fn response_schema(mut self, binding: ResponseBinding) -> Self {
        let ResponseBinding {
            schema,
            code,
            required,
            description,
        } = binding;
        let mut response = ResponseDoc::new(description).schema_def(schema);
        response.required = required;
        self.responses.insert(code, response);
        self
    }

    /// Whether the validation middleware has anything to do for this handler.
    pub fn has_bindings(&self) -> bool {
        !self.request_schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    struct Request;

    impl ApiSchema for Request {
        fn schema() -> Value {
            json!({
                "type": "object",
                "properties": {
                    "id": { "type": "integer" },
                    "name": { "type": "string", "description": "name" }
                }
            })
        }

        fn schema_name() -> Option<Cow<'static, str>> {
            Some(Cow::Borrowed("Request"))
        }
    }

    #[test]
    fn test_location_round_trip_and_invalid() {
        for location in Location::ALL {
            assert_eq!(location.as_str().parse::<Location>().unwrap(), location);
        }

        let err = "body".parse::<Location>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid location argument: body");
    }

    #[test]
    fn test_docs_view() {
        let metadata = HandlerMetadata::new().docs(
            Docs::new()
                .tags(["mytag"])
                .summary("Test method summary")
                .description("Test method description"),
        );

        assert_eq!(metadata.tags, vec!["mytag".to_string()]);
        assert_eq!(metadata.summary.as_deref(), Some("Test method summary"));
        assert_eq!(metadata.description.as_deref(), Some("Test method description"));
        assert_eq!(metadata.produces, vec![DEFAULT_MEDIA_TYPE.to_string()]);
        assert!(metadata.parameters.is_empty());
        assert!(metadata.responses.is_empty());
    }

    #[test]
    fn test_docs_merge_appends_parameters_and_updates_responses() {
        let metadata = HandlerMetadata::new()
            .docs(
                Docs::new()
                    .summary("first")
                    .parameter(ParameterDoc::new("X-Request-ID", ParamLocation::Header))
                    .response(404, ResponseDoc::new("Not Found")),
            )
            .docs(
                Docs::new()
                    .parameter(ParameterDoc::new("page", ParamLocation::Query))
                    .response(404, ResponseDoc::new("Missing"))
                    .response(500, ResponseDoc::new("Server error")),
            );

        assert_eq!(metadata.summary.as_deref(), Some("first"));
        assert_eq!(metadata.parameters.len(), 2);
        assert_eq!(metadata.responses[&404].description, "Missing");
        assert_eq!(metadata.responses[&500].description, "Server error");
    }

    #[test]
    fn test_request_schema_view() {
        let metadata = HandlerMetadata::new()
            .request_schema(request_schema::<Request>(Location::Query))
            .unwrap();

        assert!(metadata.has_bindings());
        let binding = &metadata.request_schemas[0];
        assert_eq!(binding.location, Location::Query);
        assert_eq!(binding.put_into, None);
        assert_eq!(binding.schema.name.as_deref(), Some("Request"));
    }

    #[test]
    fn test_view_multiple_json_bindings() {
        let err = HandlerMetadata::new()
            .request_schema(request_schema::<Request>(Location::Json))
            .unwrap()
            .request_schema(json_schema::<Request>())
            .unwrap_err();

        assert!(matches!(err, ConfigError::MultipleBodySchemas));
        assert_eq!(err.to_string(), "Multiple json locations are not allowed");
    }

    #[test]
    fn test_json_and_other_locations_coexist() {
        let metadata = HandlerMetadata::new()
            .request_schema(match_info_schema::<Request>())
            .and_then(|m| m.request_schema(querystring_schema::<Request>()))
            .and_then(|m| m.request_schema(json_schema::<Request>()))
            .and_then(|m| m.request_schema(headers_schema::<Request>()))
            .and_then(|m| m.request_schema(cookies_schema::<Request>()))
            .unwrap();

        let keys: Vec<_> = metadata
            .request_schemas
            .iter()
            .map(|b| b.put_into.as_deref().unwrap())
            .collect();
        assert_eq!(keys, ["match_info", "querystring", "json", "headers", "cookies"]);
    }

    #[test]
    fn test_non_object_schema_rejected_for_query() {
        let err = HandlerMetadata::new()
            .request_schema(request_schema::<Vec<u32>>(Location::Query))
            .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidSchema { location: "query", .. }));

        // A list body is fine.
        assert!(HandlerMetadata::new()
            .request_schema(request_schema::<Vec<u32>>(Location::Json))
            .is_ok());
    }

    #[test]
    fn test_marshalling() {
        let metadata = HandlerMetadata::new()
            .response_schema(marshal_with::<Request>(200).description("Method description"));

        let response = &metadata.responses[&200];
        assert_eq!(response.description, "Method description");
        assert_eq!(response.schema.as_ref().and_then(|s| s.name.as_deref()), Some("Request"));
        assert!(!response.required);
    }

    #[test]
    fn test_path_parameter_always_required() {
        let param = ParameterDoc::new("id", ParamLocation::Path).required(false);
        assert!(param.required);

        let param = ParameterDoc::new("q", ParamLocation::Query);
        assert!(!param.required);
    }
}
