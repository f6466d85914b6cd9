//! # axum-apispec - OpenAPI documentation and request validation for Axum
//!
//! axum-apispec lets handlers declare what they accept and what they return,
//! then uses those declarations twice: to build an OpenAPI 3 document for the
//! router, and to validate incoming requests before the handler runs.
//!
//! ## Key Features
//!
//! - **Declarative handler metadata** - stack `docs`, `request_schema` and
//!   `response_schema` attributes on a handler, or build [`HandlerMetadata`] by hand
//! - **One document per router** - JSON, YAML and a Swagger UI page served from
//!   configurable paths
//! - **Request validation** - data from the query string, form, JSON body,
//!   headers, cookies and path is parsed, coerced and checked against its schema
//! - **Structured errors** - failures become `400` responses shaped
//!   `{location: {field: [messages]}}`, or whatever a custom [`ErrorHandler`] returns
//! - **Schema derivation** - `#[derive(ApiSchema)]` for request and response types
//!
//! ## Installation
//!
//! ```toml
//! [dependencies]
//! axum-apispec = "0.1"
//! axum = "0.7"
//! tokio = { version = "1", features = ["macros", "rt-multi-thread"] }
//! serde = { version = "1.0", features = ["derive"] }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use axum::Json;
//! use axum_apispec::{api_handler, api_router, ApiSchema, RequestContext};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize, Serialize, ApiSchema)]
//! struct NewUser {
//!     /// Display name
//!     name: String,
//!     #[schema(one_of("f", "m"))]
//!     gender: Option<String>,
//! }
//!
//! #[derive(Deserialize, ApiSchema)]
//! struct Pagination {
//!     page: Option<u32>,
//! }
//!
//! /// Create a user
//! #[api_handler]
//! #[docs(tags = ["users"])]
//! #[querystring_schema(Pagination)]
//! #[json_schema(NewUser)]
//! #[response_schema(NewUser, 201)]
//! async fn create_user(ctx: RequestContext) -> Json<serde_json::Value> {
//!     Json(ctx.data().clone())
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = api_router!("Users API", "1.0.0")?
//!         .post("/users", create_user)
//!         .into_router()?;
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! The document is served at `/api/docs/swagger.json` by default. Set
//! [`ApiSpecConfig::swagger_path`] to also serve the viewer page.
//!
//! ## Handler Metadata
//!
//! Attributes are evaluated top to bottom, and `#[api_handler]` must come
//! first so it can see the others:
//!
//! | Attribute | Effect |
//! |-----------|--------|
//! | `docs(..)` | tags, summary, description, operation id, extra parameters and responses |
//! | `request_schema(T, location = "..")` | validate and document `T` from a location (default `json`) |
//! | `match_info_schema(T)`, `querystring_schema(T)`, `form_schema(T)`, `json_schema(T)`, `headers_schema(T)`, `cookies_schema(T)` | the same with a fixed location, stored under the location name |
//! | `use_kwargs(..)` | alias of `request_schema` |
//! | `response_schema(T, code)`, `marshal_with(..)` | document the response for a status code |
//!
//! Without the macros, pass metadata explicitly:
//!
//! ```rust
//! use axum_apispec::{json_schema, ApiRouter, Docs, HandlerMetadata};
//! use std::collections::HashMap;
//!
//! async fn echo() -> &'static str {
//!     "ok"
//! }
//!
//! let metadata = HandlerMetadata::new()
//!     .docs(Docs::new().tags(["echo"]).summary("Echo"))
//!     .request_schema(json_schema::<HashMap<String, String>>())
//!     .unwrap();
//!
//! let router = ApiRouter::new().describe(&echo, metadata).post("/echo", echo);
//! assert_eq!(router.records().count(), 1);
//! ```
//!
//! ## Reading Validated Data
//!
//! Validated data is merged into a single object stored in [`RequestContext`]
//! under the configured `request_data_name` (default `"data"`). Bindings with
//! `put_into` are also stored under their own key. [`Validated<T>`]
//! deserializes the merged data directly.

// Lets the derive and attribute macros refer to `::axum_apispec` from inside this crate.
extern crate self as axum_apispec;

mod config;
mod error;
mod exposer;
mod metadata;
mod paths;
mod registry;
mod router;
mod schema;
mod spec;
mod validation;

pub use config::{ApiSpecConfig, ServerConfig};
pub use error::{ConfigError, SpecError};
pub use metadata::{
    cookies_schema, form_schema, headers_schema, json_schema, marshal_with, match_info_schema,
    querystring_schema, request_schema, response_schema, use_kwargs, Docs, HandlerMetadata, Location,
    ParamLocation, ParameterDoc, RequestBinding, ResponseBinding, ResponseDoc, DEFAULT_MEDIA_TYPE,
};
pub use registry::{HandlerEntry, HandlerId, HandlerRegistry};
pub use router::{ApiRouter, RouteRecord, RouteTarget, View};
pub use schema::{ApiSchema, PropertyDef, SchemaDef};
pub use spec::{setup_apispec, ApiSpec, SpecHandle, DOCUMENTED_METHODS};
pub use validation::{
    ContextRejection, ErrorHandler, FieldErrors, RequestContext, Validated, ValidationFailure,
    SCHEMA_FIELD,
};

pub use axum_apispec_macros::{api_handler, ApiSchema};
pub use inventory;
pub use openapiv3;
pub use serde;
pub use serde_json;

/// Create an [`ApiRouter`].
///
/// With a title and version, the router is documented: an [`ApiSpec`] is
/// registered on it and the result is a `Result<ApiRouter, ConfigError>`.
///
/// ```rust
/// use axum_apispec::api_router;
///
/// let plain = api_router!();
/// assert!(!plain.is_documented());
///
/// let documented = api_router!("Pets", "1.0.0").unwrap();
/// assert!(documented.is_documented());
/// ```
#[macro_export]
macro_rules! api_router {
    () => {
        $crate::ApiRouter::new()
    };
    ($title:expr, $version:expr) => {
        $crate::setup_apispec(
            $crate::ApiRouter::new(),
            $crate::ApiSpecConfig::new($title, $version),
        )
    };
}
