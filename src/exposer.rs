//! Routes serving the document and the viewer page.

use crate::error::{ConfigError, SpecError};
use crate::paths::{join, normalize_route};
use crate::router::ApiRouter;
use crate::spec::{Installed, SpecHandle};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use minijinja::Environment;
use serde_json::json;
use std::sync::{Arc, OnceLock};
use tower_http::services::ServeDir;
use tracing::error;

const VIEWER_TEMPLATE: &str = include_str!("../static/index.html");

// No file extension, so the rendered urls are not HTML-escaped.
const VIEWER_NAME: &str = "swagger_ui";

/// Add the document routes configured in `installed` to `router`.
pub(crate) fn mount(router: &mut ApiRouter, installed: &Installed) -> Result<(), ConfigError> {
    let config = &installed.config;

    let json_url = config.url.as_deref().map(normalize_route);
    if let Some(url) = &json_url {
        let spec = installed.spec.clone();
        router.add_exposer_route(
            url,
            get(move || {
                let spec = spec.clone();
                async move { json_document(&spec) }
            }),
        );
    }

    if let Some(url) = config.yaml_url.as_deref().map(normalize_route) {
        let spec = installed.spec.clone();
        router.add_exposer_route(
            &url,
            get(move || {
                let spec = spec.clone();
                async move { yaml_document(&spec) }
            }),
        );
    }

    if let Some(view_path) = config.swagger_path.as_deref().map(normalize_route) {
        let static_path = normalize_route(&config.static_path);
        let viewer = Viewer {
            url: json_url.unwrap_or_default(),
            assets: match &config.static_dir {
                Some(_) => Assets::Local(static_path.clone()),
                None => Assets::Remote(config.swagger_ui_url.trim_end_matches('/').to_string()),
            },
            prefix: Arc::clone(&installed.prefix),
        };
        // Template errors surface at registration, not on the first request.
        viewer.render()?;
        router.add_exposer_route(
            &view_path,
            get(move || {
                let viewer = viewer.clone();
                async move { viewer.page() }
            }),
        );

        if let Some(dir) = &config.static_dir {
            router.add_service(&static_path, ServeDir::new(dir));
        }
    }

    Ok(())
}

#[derive(Debug, Clone)]
enum Assets {
    /// Served by this router under the given path.
    Local(String),
    /// Loaded from a CDN base url.
    Remote(String),
}

/// The viewer page of one router.
///
/// Urls are resolved against the prefix the router ends up mounted under.
#[derive(Debug, Clone)]
struct Viewer {
    url: String,
    assets: Assets,
    prefix: Arc<OnceLock<String>>,
}

impl Viewer {
    fn render(&self) -> Result<String, ConfigError> {
        let prefix = self.prefix.get().map(String::as_str).unwrap_or_default();
        let url = match self.url.as_str() {
            "" => String::new(),
            url => join(prefix, url),
        };
        let assets = match &self.assets {
            Assets::Local(path) => join(prefix, path),
            Assets::Remote(base) => base.clone(),
        };
        render_viewer(&url, &assets)
    }

    fn page(&self) -> Response {
        match self.render() {
            Ok(page) => Html(page).into_response(),
            Err(err) => {
                error!(error = %err, "failed to render viewer page");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Render the viewer page for a document served at `url`.
pub(crate) fn render_viewer(url: &str, static_path: &str) -> Result<String, ConfigError> {
    let mut env = Environment::new();
    env.add_template(VIEWER_NAME, VIEWER_TEMPLATE)?;
    let page = env
        .get_template(VIEWER_NAME)?
        .render(json!({ "path": url, "static": static_path }))?;
    Ok(page)
}

fn json_document(spec: &SpecHandle) -> Result<Response, SpecError> {
    let body = spec.to_json()?;
    Ok(([(CONTENT_TYPE, "application/json")], body).into_response())
}

fn yaml_document(spec: &SpecHandle) -> Result<Response, SpecError> {
    let body = spec.to_yaml()?;
    Ok(([(CONTENT_TYPE, "application/yaml")], body).into_response())
}

impl IntoResponse for SpecError {
    fn into_response(self) -> Response {
        error!(error = %self, "failed to serve specification document");
        let status = match self {
            SpecError::NotBuilt => StatusCode::SERVICE_UNAVAILABLE,
            SpecError::Json(_) | SpecError::Yaml(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_viewer() {
        let page = render_viewer("/api/docs/swagger.json", "/static/swagger").unwrap();
        assert!(page.contains(r#"url: "/api/docs/swagger.json""#));
        assert!(page.contains("/static/swagger/swagger-ui.css"));
        assert!(page.contains("/static/swagger/swagger-ui-bundle.js"));
    }

    #[test]
    fn test_viewer_follows_mount_prefix() {
        let viewer = Viewer {
            url: "/api/docs/swagger.json".to_string(),
            assets: Assets::Local("/static/swagger".to_string()),
            prefix: Arc::default(),
        };
        assert!(viewer.render().unwrap().contains(r#"url: "/api/docs/swagger.json""#));

        viewer.prefix.set("/v1".to_string()).unwrap();
        let page = viewer.render().unwrap();
        assert!(page.contains(r#"url: "/v1/api/docs/swagger.json""#));
        assert!(page.contains("/v1/static/swagger/swagger-ui-bundle.js"));
    }

    #[test]
    fn test_viewer_loads_remote_assets() {
        let viewer = Viewer {
            url: "/swagger.json".to_string(),
            assets: Assets::Remote("https://unpkg.com/swagger-ui-dist@5".to_string()),
            prefix: Arc::default(),
        };
        viewer.prefix.set("/v1".to_string()).unwrap();
        let page = viewer.render().unwrap();
        assert!(page.contains("https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"));
        assert!(page.contains(r#"url: "/v1/swagger.json""#));
    }

    #[test]
    fn test_not_built_is_unavailable() {
        let response = SpecError::NotBuilt.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
