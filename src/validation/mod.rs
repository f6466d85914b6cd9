//! Request validation layer.
//!
//! Every documented route whose handler declares request bindings gets a
//! middleware that parses the bound locations, checks them against the
//! compiled schemas and stores the results in a [`RequestContext`] request
//! extension before the handler runs. Failures are answered by the
//! configured [`ErrorHandler`].

mod context;
mod failure;
mod parse;

pub use context::{ContextRejection, RequestContext, Validated};
pub use failure::{ErrorHandler, FieldErrors, ValidationFailure, SCHEMA_FIELD};

use crate::config::ApiSpecConfig;
use crate::error::ConfigError;
use crate::metadata::{HandlerMetadata, Location, RequestBinding};
use crate::registry::HandlerId;
use crate::schema::SchemaDef;
use axum::body::{to_bytes, Body};
use axum::extract::{RawPathParams, Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use indexmap::IndexMap;
use jsonschema::error::ValidationErrorKind;
use jsonschema::JSONSchema;
use parse::RawRequest;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error};

/// A request binding with its compiled validator.
pub(crate) struct CompiledBinding {
    binding: RequestBinding,
    validator: JSONSchema,
}

impl CompiledBinding {
    fn compile(binding: &RequestBinding) -> Result<Self, ConfigError> {
        Ok(Self {
            validator: compile_schema(&binding.schema)?,
            binding: binding.clone(),
        })
    }

    /// Parse, coerce and validate this binding's location.
    fn parse(&self, request: &RawRequest<'_>) -> Result<Value, FieldErrors> {
        let raw = request.extract(self.binding.location)?;
        let (value, mut errors) = raw.into_value(&self.binding.schema);

        // Multipart bodies are documented but not parsed.
        if self.binding.location == Location::Files {
            return Ok(value);
        }

        if let Err(validation_errors) = self.validator.validate(&value) {
            for err in validation_errors {
                match &err.kind {
                    ValidationErrorKind::Required { property } => {
                        let field = match property {
                            Value::String(name) => name.clone(),
                            other => other.to_string(),
                        };
                        if !errors.contains(&field) {
                            errors.add(field, "Missing data for required field.");
                        }
                    }
                    ValidationErrorKind::AdditionalProperties { unexpected } => {
                        for field in unexpected {
                            errors.add(field.clone(), "Unknown field.");
                        }
                    }
                    _ => {
                        let path = err.instance_path.to_string();
                        let field = path
                            .split('/')
                            .find(|segment| !segment.is_empty())
                            .unwrap_or(SCHEMA_FIELD)
                            .to_string();
                        errors.add(field, err.to_string());
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(self.drop_undeclared(value))
        } else {
            Err(errors)
        }
    }

    /// Remove fields the schema does not declare, unless it says anything
    /// about additional properties.
    fn drop_undeclared(&self, value: Value) -> Value {
        let schema = &self.binding.schema;
        let Value::Object(mut fields) = value else {
            return value;
        };
        if schema.has_properties() && schema.schema.get("additionalProperties").is_none() {
            let declared: Vec<&str> = schema.properties().iter().map(|p| p.name).collect();
            fields.retain(|key, _| declared.contains(&key.as_str()));
        }
        Value::Object(fields)
    }
}

/// Expected response body for one status code.
pub(crate) struct CompiledResponse {
    required: bool,
    validator: JSONSchema,
}

/// Everything the validation layer needs for one handler.
pub(crate) struct CompiledHandler {
    id: HandlerId,
    bindings: Vec<CompiledBinding>,
    responses: IndexMap<u16, CompiledResponse>,
}

impl CompiledHandler {
    /// Compile the schemas of a handler. Returns `None` when the handler
    /// needs no validation at all.
    pub(crate) fn compile(
        id: HandlerId,
        metadata: &HandlerMetadata,
        validate_responses: bool,
    ) -> Result<Option<Self>, ConfigError> {
        let bindings = metadata
            .request_schemas
            .iter()
            .map(CompiledBinding::compile)
            .collect::<Result<Vec<_>, _>>()?;

        let mut responses = IndexMap::new();
        if validate_responses {
            for (code, response) in &metadata.responses {
                if let Some(schema) = &response.schema {
                    responses.insert(
                        *code,
                        CompiledResponse {
                            required: response.required,
                            validator: compile_schema(schema)?,
                        },
                    );
                }
            }
        }

        if bindings.is_empty() && responses.is_empty() {
            return Ok(None);
        }

        Ok(Some(Self {
            id,
            bindings,
            responses,
        }))
    }

    fn reads_body(&self) -> bool {
        self.bindings
            .iter()
            .any(|b| b.binding.location.body_media_type().is_some())
    }
}

fn compile_schema(schema: &SchemaDef) -> Result<JSONSchema, ConfigError> {
    JSONSchema::compile(&schema.schema).map_err(|err| ConfigError::SchemaCompile {
        schema: schema.display_name().to_string(),
        reason: err.to_string(),
    })
}

/// Settings shared by every validated route of a router.
#[derive(Debug, Clone)]
pub(crate) struct ValidationSettings {
    pub request_data_name: String,
    pub max_body_bytes: usize,
    pub error_handler: ErrorHandler,
}

impl ValidationSettings {
    pub(crate) fn new(config: &ApiSpecConfig, error_handler: ErrorHandler) -> Self {
        Self {
            request_data_name: config.request_data_name.clone(),
            max_body_bytes: config.max_body_bytes,
            error_handler,
        }
    }
}

/// State of the validation middleware of one route: the handler serving
/// each method.
#[derive(Clone)]
pub(crate) struct RouteValidation {
    pub handlers: Arc<IndexMap<Method, Arc<CompiledHandler>>>,
    pub settings: Arc<ValidationSettings>,
}

impl RouteValidation {
    fn handler_for(&self, method: &Method) -> Option<Arc<CompiledHandler>> {
        self.handlers
            .get(method)
            .or_else(|| {
                // HEAD requests are served by the GET handler.
                (*method == Method::HEAD)
                    .then(|| self.handlers.get(&Method::GET))
                    .flatten()
            })
            .cloned()
    }
}

pub(crate) async fn validation_middleware(
    State(route): State<RouteValidation>,
    path_params: Option<RawPathParams>,
    request: Request,
    next: Next,
) -> Response {
    let Some(handler) = route.handler_for(request.method()) else {
        return next.run(request).await;
    };
    if handler.bindings.is_empty() {
        debug!(handler = %handler.id, "no request bindings, passing through");
        return check_response(&handler, &route.settings, next.run(request).await).await;
    }

    let path_params: Vec<(String, String)> = path_params
        .map(|params| {
            params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let (mut parts, body) = request.into_parts();
    let (body, bytes) = if handler.reads_body() {
        match to_bytes(body, route.settings.max_body_bytes).await {
            Ok(bytes) => (Body::from(bytes.clone()), Some(bytes)),
            Err(err) => {
                debug!(handler = %handler.id, error = %err, "failed to read request body");
                let location = handler
                    .bindings
                    .iter()
                    .map(|b| b.binding.location)
                    .find(|l| l.body_media_type().is_some())
                    .unwrap_or(Location::Json);
                let failure = ValidationFailure::new(
                    location,
                    FieldErrors::single(SCHEMA_FIELD, "Unable to read request body."),
                );
                return route.settings.error_handler.handle(&failure, &parts);
            }
        }
    } else {
        (body, None)
    };

    let mut ctx = RequestContext::new(route.settings.request_data_name.clone());
    let mut data = Value::Object(Map::new());
    {
        let raw = RawRequest {
            parts: &parts,
            body: bytes.as_deref(),
            path_params: &path_params,
        };

        for compiled in &handler.bindings {
            let binding = &compiled.binding;
            let value = match compiled.parse(&raw) {
                Ok(value) => value,
                Err(errors) => {
                    let failure = ValidationFailure::new(binding.location, errors);
                    debug!(
                        handler = %handler.id,
                        location = %binding.location,
                        errors = %failure.errors.to_json(),
                        "request validation failed"
                    );
                    return route.settings.error_handler.handle(&failure, &parts);
                }
            };

            if let Some(key) = &binding.put_into {
                ctx.insert(key.clone(), value);
                continue;
            }
            if is_empty(&value) {
                continue;
            }
            match value {
                Value::Object(fields) => {
                    if let Value::Object(shared) = &mut data {
                        for (key, field) in fields {
                            shared.entry(key).or_insert(field);
                        }
                    }
                }
                other => {
                    // Only mappings merge. Anything else becomes the request data.
                    data = other;
                    break;
                }
            }
        }
    }

    ctx.insert(route.settings.request_data_name.clone(), data);
    parts.extensions.insert(ctx);

    let response = next.run(Request::from_parts(parts, body)).await;
    check_response(&handler, &route.settings, response).await
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Validate a response body against the schema declared for its status.
async fn check_response(
    handler: &CompiledHandler,
    settings: &ValidationSettings,
    response: Response,
) -> Response {
    let Some(expected) = handler.responses.get(&response.status().as_u16()) else {
        return response;
    };

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, settings.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(handler = %handler.id, error = %err, "failed to read response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if bytes.is_empty() && !expected.required {
        return Response::from_parts(parts, Body::from(bytes));
    }

    let problems: Vec<String> = match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) => match expected.validator.validate(&value) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.map(|e| e.to_string()).collect(),
        },
        Err(err) => vec![format!("response body is not valid JSON: {err}")],
    };

    if problems.is_empty() {
        Response::from_parts(parts, Body::from(bytes))
    } else {
        error!(
            handler = %handler.id,
            status = parts.status.as_u16(),
            problems = ?problems,
            "response does not match its declared schema"
        );
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}
