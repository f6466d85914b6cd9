//! Integration settings.

use crate::error::ConfigError;
use serde::Deserialize;

fn default_title() -> String {
    "API documentation".to_string()
}

fn default_version() -> String {
    "0.0.1".to_string()
}

fn default_openapi_version() -> String {
    "3.0.3".to_string()
}

fn default_url() -> Option<String> {
    Some("/api/docs/swagger.json".to_string())
}

fn default_request_data_name() -> String {
    "data".to_string()
}

fn default_static_path() -> String {
    "/static/swagger".to_string()
}

fn default_swagger_ui_url() -> String {
    "https://unpkg.com/swagger-ui-dist@5".to_string()
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

/// A server entry of the generated document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Settings of the documentation and validation integration.
///
/// Every field has a default, so a YAML file only needs the keys it changes:
///
/// ```rust
/// use axum_apispec::ApiSpecConfig;
///
/// let config = ApiSpecConfig::from_yaml_str("title: Pets\nswagger_path: /docs\n")?;
/// assert_eq!(config.title, "Pets");
/// assert_eq!(config.version, "0.0.1");
/// assert_eq!(config.url.as_deref(), Some("/api/docs/swagger.json"));
/// # Ok::<(), axum_apispec::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiSpecConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_openapi_version")]
    pub openapi_version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    /// Route serving the JSON document. `None` disables it.
    #[serde(default = "default_url")]
    pub url: Option<String>,
    /// Route serving the YAML document.
    #[serde(default)]
    pub yaml_url: Option<String>,
    /// Request context key holding the merged request data.
    #[serde(default = "default_request_data_name")]
    pub request_data_name: String,
    /// Route serving the HTML viewer page.
    #[serde(default)]
    pub swagger_path: Option<String>,
    /// Base path of the viewer's static assets.
    #[serde(default = "default_static_path")]
    pub static_path: String,
    /// Directory served under `static_path`.
    #[serde(default)]
    pub static_dir: Option<String>,
    /// Where the viewer loads Swagger UI from when no `static_dir` is set.
    #[serde(default = "default_swagger_ui_url")]
    pub swagger_ui_url: String,
    /// Build the document at registration time instead of at finalization.
    #[serde(default)]
    pub in_place: bool,
    #[serde(default)]
    pub validate_responses: bool,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ApiSpecConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            version: default_version(),
            openapi_version: default_openapi_version(),
            description: None,
            servers: Vec::new(),
            url: default_url(),
            yaml_url: None,
            request_data_name: default_request_data_name(),
            swagger_path: None,
            static_path: default_static_path(),
            static_dir: None,
            swagger_ui_url: default_swagger_ui_url(),
            in_place: false,
            validate_responses: false,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ApiSpecConfig {
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Parse settings from YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn server(mut self, url: impl Into<String>) -> Self {
        self.servers.push(ServerConfig {
            url: url.into(),
            description: None,
        });
        self
    }

    #[must_use]
    pub fn openapi_version(mut self, version: impl Into<String>) -> Self {
        self.openapi_version = version.into();
        self
    }

    #[must_use]
    pub fn url(mut self, url: Option<&str>) -> Self {
        self.url = url.map(str::to_string);
        self
    }

    #[must_use]
    pub fn yaml_url(mut self, url: impl Into<String>) -> Self {
        self.yaml_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn request_data_name(mut self, name: impl Into<String>) -> Self {
        self.request_data_name = name.into();
        self
    }

    #[must_use]
    pub fn swagger_path(mut self, path: impl Into<String>) -> Self {
        self.swagger_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn static_path(mut self, path: impl Into<String>) -> Self {
        self.static_path = path.into();
        self
    }

    #[must_use]
    pub fn static_dir(mut self, dir: impl Into<String>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn swagger_ui_url(mut self, url: impl Into<String>) -> Self {
        self.swagger_ui_url = url.into();
        self
    }

    #[must_use]
    pub fn in_place(mut self, in_place: bool) -> Self {
        self.in_place = in_place;
        self
    }

    #[must_use]
    pub fn validate_responses(mut self, validate: bool) -> Self {
        self.validate_responses = validate;
        self
    }

    #[must_use]
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiSpecConfig::default();
        assert_eq!(config.title, "API documentation");
        assert_eq!(config.version, "0.0.1");
        assert_eq!(config.openapi_version, "3.0.3");
        assert_eq!(config.url.as_deref(), Some("/api/docs/swagger.json"));
        assert_eq!(config.request_data_name, "data");
        assert_eq!(config.static_path, "/static/swagger");
        assert!(config.swagger_ui_url.starts_with("https://unpkg.com/swagger-ui-dist"));
        assert!(config.swagger_path.is_none());
        assert!(!config.in_place);
        assert_eq!(config.max_body_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn test_yaml_matches_defaults() {
        let config = ApiSpecConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, ApiSpecConfig::default());
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = r#"
title: My Documentation
version: v1
url: null
yaml_url: /api/docs/swagger.yaml
request_data_name: validated
servers:
  - url: https://api.example.com
    description: production
"#;
        let config = ApiSpecConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.title, "My Documentation");
        assert_eq!(config.version, "v1");
        assert!(config.url.is_none());
        assert_eq!(config.yaml_url.as_deref(), Some("/api/docs/swagger.yaml"));
        assert_eq!(config.request_data_name, "validated");
        assert_eq!(config.servers[0].description.as_deref(), Some("production"));
    }

    #[test]
    fn test_yaml_rejects_unknown_keys() {
        let err = ApiSpecConfig::from_yaml_str("titel: typo").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}
