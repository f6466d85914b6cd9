use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Validated request data, attached to the request by the validation layer.
///
/// Bindings with a `put_into` key are stored under that key; the others are
/// merged into the mapping stored under the configured request data name
/// (`"data"` by default).
///
/// ```rust
/// use axum_apispec::RequestContext;
/// use axum::Json;
/// use serde_json::Value;
///
/// async fn create_user(ctx: RequestContext) -> Json<Value> {
///     let name = ctx.data().get("name").cloned().unwrap_or_default();
///     Json(name)
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    data_name: String,
    values: Map<String, Value>,
}

impl RequestContext {
    pub(crate) fn new(data_name: impl Into<String>) -> Self {
        Self {
            data_name: data_name.into(),
            values: Map::new(),
        }
    }

    pub(crate) fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// The merged request data, or `Value::Null` when validation did not run.
    pub fn data(&self) -> &Value {
        self.values.get(&self.data_name).unwrap_or(&Value::Null)
    }

    pub fn data_name(&self) -> &str {
        &self.data_name
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Deserialize the value stored under `key`.
    pub fn parse<T: DeserializeOwned>(&self, key: &str) -> Result<T, ContextRejection> {
        let value = self
            .values
            .get(key)
            .cloned()
            .ok_or_else(|| ContextRejection::Missing(key.to_string()))?;
        serde_json::from_value(value).map_err(|err| ContextRejection::Deserialize {
            key: key.to_string(),
            reason: err.to_string(),
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    /// Handlers without bindings see an empty context.
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<RequestContext>().cloned().unwrap_or_default())
    }
}

/// The merged request data deserialized into `T`.
///
/// ```rust
/// use axum_apispec::Validated;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Pagination { page: u32 }
///
/// async fn list(Validated(page): Validated<Pagination>) -> String {
///     page.page.to_string()
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Validated<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for Validated<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ContextRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .extensions
            .get::<RequestContext>()
            .ok_or(ContextRejection::NotValidated)?;
        ctx.parse(&ctx.data_name).map(Validated)
    }
}

/// Rejection of the [`Validated`] extractor.
#[derive(Debug, Clone, Error)]
pub enum ContextRejection {
    #[error("request data was not validated for this route")]
    NotValidated,

    #[error("no request data stored under `{0}`")]
    Missing(String),

    #[error("request data under `{key}` does not match the handler type: {reason}")]
    Deserialize { key: String, reason: String },
}

impl IntoResponse for ContextRejection {
    fn into_response(self) -> Response {
        let status = match self {
            ContextRejection::Deserialize { .. } => StatusCode::BAD_REQUEST,
            ContextRejection::NotValidated | ContextRejection::Missing(_) => {
                tracing::error!(error = %self, "handler expects validated request data");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "_schema": [self.to_string()] }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Page {
        page: u32,
    }

    #[test]
    fn test_parse_stored_value() {
        let mut ctx = RequestContext::new("data");
        ctx.insert("data", json!({ "page": 2 }));
        ctx.insert("headers", json!({ "X-Token": "t" }));

        assert_eq!(ctx.parse::<Page>("data").unwrap(), Page { page: 2 });
        assert_eq!(ctx.data(), &json!({ "page": 2 }));
        assert_eq!(ctx.get("headers"), Some(&json!({ "X-Token": "t" })));
    }

    #[test]
    fn test_parse_missing_and_mismatched() {
        let mut ctx = RequestContext::new("data");
        ctx.insert("data", json!({ "page": "two" }));

        assert!(matches!(ctx.parse::<Page>("json"), Err(ContextRejection::Missing(_))));
        assert!(matches!(
            ctx.parse::<Page>("data"),
            Err(ContextRejection::Deserialize { .. })
        ));
    }

    #[test]
    fn test_default_context_is_empty() {
        let ctx = RequestContext::default();
        assert!(ctx.is_empty());
        assert_eq!(ctx.data(), &Value::Null);
    }
}
