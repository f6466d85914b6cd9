//! Building and holding the OpenAPI document.
//!
//! [`ApiSpec`] attaches the integration to an [`ApiRouter`]: it adds the
//! document routes and arranges for the document to be built from the
//! router's route records, either at once (`in_place`) or when the router
//! is finalized with [`ApiRouter::into_router`].

use crate::config::ApiSpecConfig;
use crate::error::{ConfigError, SpecError};
use crate::exposer;
use crate::metadata::{HandlerMetadata, ParamLocation, ResponseDoc};
use crate::paths::{path_keys, to_openapi_path};
use crate::registry::HandlerRegistry;
use crate::router::{ApiRouter, RouteRecord};
use crate::schema::SchemaDef;
use crate::validation::{ErrorHandler, ValidationFailure};
use axum::http::request::Parts;
use axum::http::Method;
use axum::response::Response;
use indexmap::IndexMap;
use openapiv3::{
    Components, Content, Example, Header, Info, MediaType, OpenAPI, Operation, Parameter,
    ParameterData, ParameterSchemaOrContent, PathItem, ReferenceOr, RequestBody,
    Response as ApiResponse, Responses, Schema, SchemaData, SchemaKind, Server, StatusCode, Type,
};
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Methods that appear in the document.
pub const DOCUMENTED_METHODS: [Method; 5] = [
    Method::GET,
    Method::PUT,
    Method::POST,
    Method::DELETE,
    Method::PATCH,
];

/// Shared, write-once slot for the built document.
#[derive(Debug, Clone, Default)]
pub struct SpecHandle(Arc<OnceLock<OpenAPI>>);

impl SpecHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The document, once it has been built.
    pub fn get(&self) -> Option<&OpenAPI> {
        self.0.get()
    }

    pub fn is_built(&self) -> bool {
        self.0.get().is_some()
    }

    /// Store the document. The first document stored wins.
    pub(crate) fn set(&self, document: OpenAPI) -> bool {
        self.0.set(document).is_ok()
    }

    pub fn document(&self) -> Result<&OpenAPI, SpecError> {
        self.get().ok_or(SpecError::NotBuilt)
    }

    /// The document as a JSON value.
    pub fn to_value(&self) -> Result<Value, SpecError> {
        Ok(serde_json::to_value(self.document()?)?)
    }

    pub fn to_json(&self) -> Result<String, SpecError> {
        Ok(serde_json::to_string_pretty(self.document()?)?)
    }

    pub fn to_yaml(&self) -> Result<String, SpecError> {
        Ok(serde_yaml::to_string(self.document()?)?)
    }
}

/// Integration state installed on a router by [`ApiSpec::register`].
#[derive(Debug, Clone)]
pub(crate) struct Installed {
    pub config: Arc<ApiSpecConfig>,
    pub error_handler: ErrorHandler,
    pub spec: SpecHandle,
    /// Prefix the router is served under, known once it is finalized.
    pub prefix: Arc<OnceLock<String>>,
}

/// The documentation and validation integration.
///
/// ```rust
/// use axum_apispec::{ApiRouter, ApiSpec, ApiSpecConfig};
///
/// async fn index() -> &'static str { "ok" }
///
/// let mut router = ApiRouter::new().get("/", index);
/// let mut apispec = ApiSpec::new(ApiSpecConfig::new("My Documentation", "v1"));
/// apispec.register(&mut router)?;
///
/// let app = router.into_router()?;
/// assert!(apispec.spec().is_built());
/// # Ok::<(), axum_apispec::ConfigError>(())
/// ```
#[derive(Debug)]
pub struct ApiSpec {
    config: Arc<ApiSpecConfig>,
    error_handler: ErrorHandler,
    spec: SpecHandle,
    registered: bool,
}

impl ApiSpec {
    pub fn new(config: ApiSpecConfig) -> Self {
        Self {
            config: Arc::new(config),
            error_handler: ErrorHandler::default(),
            spec: SpecHandle::new(),
            registered: false,
        }
    }

    /// Replace the response produced for invalid requests.
    #[must_use]
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ValidationFailure, &Parts) -> Response + Send + Sync + 'static,
    {
        self.error_handler = ErrorHandler::new(handler);
        self
    }

    pub fn config(&self) -> &ApiSpecConfig {
        &self.config
    }

    /// Handle to the document, filled once it is built.
    pub fn spec(&self) -> SpecHandle {
        self.spec.clone()
    }

    /// The built document as a JSON value.
    pub fn swagger_dict(&self) -> Result<Value, SpecError> {
        self.spec.to_value()
    }

    /// Attach the integration to `router`.
    ///
    /// Adds the document routes and schedules the document build. Registering
    /// again, with this `ApiSpec` or on a router that already has one, does
    /// nothing.
    pub fn register(&mut self, router: &mut ApiRouter) -> Result<(), ConfigError> {
        if self.registered {
            debug!("apispec already registered, skipping");
            return Ok(());
        }
        if router.is_documented() {
            warn!("router already has an apispec registered, skipping");
            return Ok(());
        }

        let installed = Installed {
            config: Arc::clone(&self.config),
            error_handler: self.error_handler.clone(),
            spec: self.spec.clone(),
            prefix: Arc::default(),
        };

        exposer::mount(router, &installed)?;

        if self.config.in_place {
            let document = build_document(&self.config, router.records(), router.registry())?;
            self.spec.set(document);
        }

        router.install(installed);
        self.registered = true;
        info!(
            url = ?self.config.url,
            swagger_path = ?self.config.swagger_path,
            in_place = self.config.in_place,
            "apispec registered"
        );
        Ok(())
    }
}

/// Register the integration on `router` with `config` and return it.
///
/// ```rust
/// use axum_apispec::{setup_apispec, ApiRouter, ApiSpecConfig};
///
/// let router = setup_apispec(ApiRouter::new(), ApiSpecConfig::default().swagger_path("/docs"))?;
/// assert!(router.is_documented());
/// # Ok::<(), axum_apispec::ConfigError>(())
/// ```
pub fn setup_apispec(mut router: ApiRouter, config: ApiSpecConfig) -> Result<ApiRouter, ConfigError> {
    ApiSpec::new(config).register(&mut router)?;
    Ok(router)
}

/// Fold every documented route into one document.
pub(crate) fn build_document<'a>(
    config: &ApiSpecConfig,
    records: impl IntoIterator<Item = &'a RouteRecord>,
    registry: &HandlerRegistry,
) -> Result<OpenAPI, ConfigError> {
    let mut builder = DocumentBuilder::new(config);

    for record in records {
        let Some(path) = &record.path else {
            debug!("route without a path template, skipping");
            continue;
        };
        for (method, handler) in record.target.handlers() {
            if !DOCUMENTED_METHODS.contains(&method) {
                debug!(path = %path, method = %method, "method is not documented, skipping");
                continue;
            }
            let Some(metadata) = registry.resolve(handler)? else {
                debug!(path = %path, handler = %handler, "handler has no metadata, skipping");
                continue;
            };
            builder.add_operation(path, &method, &metadata)?;
        }
    }

    let document = builder.finish();
    info!(
        title = %document.info.title,
        paths = document.paths.paths.len(),
        "built OpenAPI document"
    );
    Ok(document)
}

struct DocumentBuilder {
    openapi: OpenAPI,
    components: IndexMap<String, ReferenceOr<Schema>>,
}

impl DocumentBuilder {
    fn new(config: &ApiSpecConfig) -> Self {
        let openapi = OpenAPI {
            openapi: config.openapi_version.clone(),
            info: Info {
                title: config.title.clone(),
                description: config.description.clone(),
                version: config.version.clone(),
                ..Default::default()
            },
            servers: config
                .servers
                .iter()
                .map(|server| Server {
                    url: server.url.clone(),
                    description: server.description.clone(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        Self {
            openapi,
            components: IndexMap::new(),
        }
    }

    fn finish(mut self) -> OpenAPI {
        if !self.components.is_empty() {
            let components = self.openapi.components.get_or_insert_with(Components::default);
            components.schemas.extend(self.components);
        }
        self.openapi
    }

    /// Insert the operation for `(path, method)`, replacing any earlier one.
    fn add_operation(
        &mut self,
        path: &str,
        method: &Method,
        metadata: &HandlerMetadata,
    ) -> Result<(), ConfigError> {
        let path = to_openapi_path(path);
        let operation = self.operation(&path, metadata)?;

        let item = self
            .openapi
            .paths
            .paths
            .entry(path.clone())
            .or_insert_with(|| ReferenceOr::Item(PathItem::default()));

        let ReferenceOr::Item(item) = item else {
            return Ok(());
        };
        let slot = match *method {
            Method::GET => &mut item.get,
            Method::PUT => &mut item.put,
            Method::POST => &mut item.post,
            Method::DELETE => &mut item.delete,
            Method::PATCH => &mut item.patch,
            _ => return Ok(()),
        };
        if slot.replace(operation).is_some() {
            debug!(path = %path, method = %method, "operation replaced");
        }
        Ok(())
    }

    fn operation(&mut self, path: &str, metadata: &HandlerMetadata) -> Result<Operation, ConfigError> {
        let mut parameters = Vec::new();
        let mut request_body: Option<RequestBody> = None;

        for doc in &metadata.parameters {
            push_parameter(
                &mut parameters,
                build_parameter(
                    &doc.name,
                    doc.location,
                    doc.description.clone(),
                    doc.required,
                    doc.deprecated,
                    to_schema(&doc.schema, &doc.name)?,
                ),
            );
        }

        for binding in &metadata.request_schemas {
            if let Some(media_type) = binding.location.body_media_type() {
                let schema =
                    self.schema_ref(&binding.schema, binding.example.as_ref(), binding.add_to_refs)?;
                let body = request_body.get_or_insert_with(RequestBody::default);
                body.required |= binding.required;
                body.content.insert(
                    media_type.to_string(),
                    MediaType {
                        schema: Some(schema),
                        ..Default::default()
                    },
                );
            } else if let Some(location) = binding.location.param_location() {
                for property in binding.schema.properties() {
                    let description = property
                        .schema
                        .get("description")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    push_parameter(
                        &mut parameters,
                        build_parameter(
                            property.name,
                            location,
                            description,
                            property.required,
                            false,
                            to_schema(property.schema, property.name)?,
                        ),
                    );
                }
            }
        }

        for key in path_keys(path) {
            push_parameter(
                &mut parameters,
                build_parameter(
                    key,
                    ParamLocation::Path,
                    None,
                    true,
                    false,
                    Schema {
                        schema_data: Default::default(),
                        schema_kind: SchemaKind::Type(Type::String(Default::default())),
                    },
                ),
            );
        }

        let mut responses = Responses::default();
        for (code, doc) in &metadata.responses {
            let response = self.response(doc, &metadata.produces)?;
            responses
                .responses
                .insert(StatusCode::Code(*code), ReferenceOr::Item(response));
        }

        Ok(Operation {
            tags: metadata.tags.clone(),
            summary: metadata.summary.clone(),
            description: metadata.description.clone(),
            operation_id: metadata.operation_id.clone(),
            parameters,
            request_body: request_body.map(ReferenceOr::Item),
            responses,
            deprecated: metadata.deprecated,
            ..Default::default()
        })
    }

    /// A response object: description, content per produced media type,
    /// headers and examples.
    fn response(&mut self, doc: &ResponseDoc, produces: &[String]) -> Result<ApiResponse, ConfigError> {
        let mut response = ApiResponse {
            description: doc.description.clone(),
            ..Default::default()
        };

        for (name, description) in &doc.headers {
            let header: Header = from_json(
                json!({ "description": description, "schema": { "type": "string" } }),
                name,
            )?;
            response.headers.insert(name.clone(), ReferenceOr::Item(header));
        }

        let schema = doc
            .schema
            .as_ref()
            .map(|schema| self.schema_ref(schema, None, false))
            .transpose()?;

        if schema.is_some() || !doc.examples.is_empty() {
            let mut examples = IndexMap::new();
            for (name, value) in &doc.examples {
                let example: Example = from_json(json!({ "value": value }), name)?;
                examples.insert(name.clone(), ReferenceOr::Item(example));
            }

            let mut content = Content::default();
            for media_type in produces {
                content.insert(
                    media_type.clone(),
                    MediaType {
                        schema: schema.clone(),
                        examples: examples.clone(),
                        ..Default::default()
                    },
                );
            }
            response.content = content;
        }

        Ok(response)
    }

    /// A reference to the component of a named schema, or the schema itself
    /// when it has no name.
    ///
    /// An example is attached to the component when `add_to_refs` is set and
    /// inlined as `allOf: [$ref]` plus the example otherwise.
    fn schema_ref(
        &mut self,
        def: &SchemaDef,
        example: Option<&Value>,
        add_to_refs: bool,
    ) -> Result<ReferenceOr<Schema>, ConfigError> {
        let mut schema = to_schema(&def.schema, def.display_name())?;

        let Some(name) = &def.name else {
            schema.schema_data.example = example.cloned();
            return Ok(ReferenceOr::Item(schema));
        };

        if add_to_refs && example.is_some() {
            schema.schema_data.example = example.cloned();
            self.components
                .insert(name.to_string(), ReferenceOr::Item(schema));
        } else {
            self.components
                .entry(name.to_string())
                .or_insert(ReferenceOr::Item(schema));
        }

        let reference = ReferenceOr::ref_(&format!("#/components/schemas/{name}"));
        match example {
            Some(example) if !add_to_refs => Ok(ReferenceOr::Item(Schema {
                schema_data: SchemaData {
                    example: Some(example.clone()),
                    ..Default::default()
                },
                schema_kind: SchemaKind::AllOf {
                    all_of: vec![reference],
                },
            })),
            _ => Ok(reference),
        }
    }
}

fn from_json<T: serde::de::DeserializeOwned>(value: Value, name: &str) -> Result<T, ConfigError> {
    serde_json::from_value(value).map_err(|err| ConfigError::InvalidSchema {
        schema: name.to_string(),
        location: "document",
        reason: err.to_string(),
    })
}

fn to_schema(value: &Value, name: &str) -> Result<Schema, ConfigError> {
    from_json(value.clone(), name)
}

/// Add a parameter unless one with the same name and location exists.
fn push_parameter(parameters: &mut Vec<ReferenceOr<Parameter>>, parameter: Parameter) {
    let exists = parameters.iter().any(|existing| match existing {
        ReferenceOr::Item(existing) => {
            existing.parameter_data_ref().name == parameter.parameter_data_ref().name
                && std::mem::discriminant(existing) == std::mem::discriminant(&parameter)
        }
        ReferenceOr::Reference { .. } => false,
    });
    if !exists {
        parameters.push(ReferenceOr::Item(parameter));
    }
}

fn build_parameter(
    name: &str,
    location: ParamLocation,
    description: Option<String>,
    required: bool,
    deprecated: bool,
    schema: Schema,
) -> Parameter {
    let is_array = matches!(schema.schema_kind, SchemaKind::Type(Type::Array(_)));
    let parameter_data = ParameterData {
        name: name.to_string(),
        description,
        required: required || location == ParamLocation::Path,
        deprecated: deprecated.then_some(true),
        format: ParameterSchemaOrContent::Schema(ReferenceOr::Item(schema)),
        example: None,
        examples: Default::default(),
        explode: is_array.then_some(true),
        extensions: Default::default(),
    };

    match location {
        ParamLocation::Query => Parameter::Query {
            parameter_data,
            allow_reserved: false,
            style: Default::default(),
            allow_empty_value: None,
        },
        ParamLocation::Header => Parameter::Header {
            parameter_data,
            style: Default::default(),
        },
        ParamLocation::Path => Parameter::Path {
            parameter_data,
            style: Default::default(),
        },
        ParamLocation::Cookie => Parameter::Cookie {
            parameter_data,
            style: Default::default(),
        },
    }
}
