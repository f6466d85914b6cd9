use crate::metadata::Location;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Field name used for errors that do not belong to a single field.
pub const SCHEMA_FIELD: &str = "_schema";

/// Per-field error messages of one location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(IndexMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn to_json(&self) -> Value {
        json!(self.0)
    }
}

/// Request data that did not satisfy a bound schema.
#[derive(Debug, Clone, Error)]
#[error("invalid request data in {location}")]
pub struct ValidationFailure {
    pub location: Location,
    pub errors: FieldErrors,
}

impl ValidationFailure {
    pub fn new(location: Location, errors: FieldErrors) -> Self {
        Self { location, errors }
    }

    /// `{"<location>": {"<field>": ["message", ...]}}`
    pub fn to_json(&self) -> Value {
        let mut body = serde_json::Map::new();
        body.insert(self.location.as_str().to_string(), self.errors.to_json());
        Value::Object(body)
    }
}

impl IntoResponse for ValidationFailure {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self.to_json())).into_response()
    }
}

/// Turns a validation failure into the response sent to the client.
#[derive(Clone)]
pub struct ErrorHandler(Arc<dyn Fn(&ValidationFailure, &Parts) -> Response + Send + Sync>);

impl ErrorHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ValidationFailure, &Parts) -> Response + Send + Sync + 'static,
    {
        Self(Arc::new(handler))
    }

    pub fn handle(&self, failure: &ValidationFailure, parts: &Parts) -> Response {
        (self.0)(failure, parts)
    }
}

impl Default for ErrorHandler {
    /// Responds with `400 Bad Request` and the per-field messages as JSON.
    fn default() -> Self {
        Self::new(|failure, _| failure.clone().into_response())
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_body_is_keyed_by_location() {
        let mut errors = FieldErrors::new();
        errors.add("id", "Not a valid integer.");
        errors.add("id", "Missing data for required field.");
        let failure = ValidationFailure::new(Location::Query, errors);

        assert_eq!(
            failure.to_json(),
            json!({ "query": { "id": ["Not a valid integer.", "Missing data for required field."] } })
        );
        assert_eq!(failure.to_string(), "invalid request data in query");
    }

    #[test]
    fn test_default_handler_is_bad_request() {
        let failure = ValidationFailure::new(
            Location::Json,
            FieldErrors::single(SCHEMA_FIELD, "Invalid JSON body."),
        );
        let (parts, ()) = axum::http::Request::new(()).into_parts();

        let response = ErrorHandler::default().handle(&failure, &parts);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
