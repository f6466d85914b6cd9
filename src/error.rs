//! Error types for configuration and document rendering.
//!
//! Request validation failures are not errors in this sense: they are turned
//! into client responses by the validation middleware (see
//! [`ValidationFailure`](crate::ValidationFailure)).

use thiserror::Error;

/// Errors raised while decorating handlers or setting up the integration.
///
/// These are statically detectable mistakes and are meant to stop the
/// application from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A handler declared more than one `json` request schema.
    #[error("Multiple json locations are not allowed")]
    MultipleBodySchemas,

    /// A location string did not name a known request location.
    #[error("Invalid location argument: {0}")]
    InvalidLocation(String),

    /// A schema cannot be bound to the requested location.
    #[error("schema `{schema}` cannot be bound to location `{location}`: {reason}")]
    InvalidSchema {
        schema: String,
        location: &'static str,
        reason: String,
    },

    /// A schema could not be compiled for validation.
    #[error("schema `{schema}` failed to compile: {reason}")]
    SchemaCompile { schema: String, reason: String },

    /// A handler registered through `inventory` produced invalid metadata.
    #[error("invalid metadata for handler `{handler}`: {source}")]
    Handler {
        handler: String,
        #[source]
        source: Box<ConfigError>,
    },

    /// The YAML configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The viewer page template could not be rendered.
    #[error("failed to render viewer page: {0}")]
    Template(#[from] minijinja::Error),
}

/// Errors raised while rendering the specification document.
#[derive(Debug, Error)]
pub enum SpecError {
    /// The document is requested before the router was finalized.
    #[error("specification document has not been built yet")]
    NotBuilt,

    #[error("failed to serialize specification as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to serialize specification as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
