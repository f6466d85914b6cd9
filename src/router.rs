use crate::error::ConfigError;
use crate::metadata::HandlerMetadata;
use crate::paths;
use crate::registry::{HandlerId, HandlerRegistry};
use crate::spec::{build_document, Installed, SpecHandle};
use crate::validation::{validation_middleware, CompiledHandler, RouteValidation, ValidationSettings};
use axum::extract::Request;
use axum::handler::Handler;
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::{on, MethodFilter, MethodRouter};
use axum::Router;
use http::Method;
use indexmap::IndexMap;
use openapiv3::OpenAPI;
use std::convert::Infallible;
use std::sync::Arc;
use tower_service::Service;
use tracing::{debug, warn};

/// What a route dispatches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// A single handler for one method.
    Handler { method: Method, handler: HandlerId },
    /// A [`View`]: one handler per method.
    View(IndexMap<Method, HandlerId>),
    /// A raw method router whose handlers are unknown.
    Undocumented,
}

impl RouteTarget {
    /// Every (method, handler) pair of this target.
    pub fn handlers(&self) -> Vec<(Method, HandlerId)> {
        match self {
            RouteTarget::Handler { method, handler } => vec![(method.clone(), *handler)],
            RouteTarget::View(handlers) => handlers
                .iter()
                .map(|(method, handler)| (method.clone(), *handler))
                .collect(),
            RouteTarget::Undocumented => Vec::new(),
        }
    }
}

/// A route as the router recorded it.
///
/// `path` is the axum path template; services mounted under a prefix have
/// no template and are never documented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRecord {
    pub path: Option<String>,
    pub target: RouteTarget,
}

impl RouteRecord {
    /// This record as seen from a router mounted under `prefix`.
    pub(crate) fn prefixed(&self, prefix: &str) -> RouteRecord {
        RouteRecord {
            path: self.path.as_deref().map(|path| paths::join(prefix, path)),
            target: self.target.clone(),
        }
    }
}

struct Route {
    record: RouteRecord,
    method_router: MethodRouter,
    /// Serves the document or viewer of this router's apispec.
    exposer: bool,
}

/// Nest `other` under `prefix`, merging it when the prefix is the root.
fn mount(router: Router, prefix: &str, other: Router) -> Router {
    match paths::normalize_route(prefix).as_str() {
        "" | "/" => router.merge(other),
        prefix => router.nest(prefix, other),
    }
}

/// A resource with one handler per HTTP method.
///
/// ```rust
/// use axum_apispec::{ApiRouter, View};
///
/// async fn show() -> &'static str { "user" }
/// async fn update() -> &'static str { "updated" }
///
/// let router = ApiRouter::new().view("/users/:id", View::new().get(show).put(update));
/// assert_eq!(router.records().count(), 1);
/// ```
#[derive(Default)]
pub struct View {
    handlers: IndexMap<Method, (HandlerId, MethodRouter)>,
}

macro_rules! view_method {
    ($($name:ident => $method:ident),+ $(,)?) => {
        $(
            #[must_use]
            pub fn $name<H, T>(self, handler: H) -> Self
            where
                H: Handler<T, ()>,
                T: 'static,
            {
                self.on(Method::$method, MethodFilter::$method, handler)
            }
        )+
    };
}

impl View {
    pub fn new() -> Self {
        Self::default()
    }

    view_method! {
        get => GET,
        put => PUT,
        post => POST,
        delete => DELETE,
        patch => PATCH,
        head => HEAD,
        options => OPTIONS,
    }

    fn on<H, T>(mut self, method: Method, filter: MethodFilter, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.handlers
            .insert(method, (HandlerId::of::<H>(), on(filter, handler)));
        self
    }
}

/// A router that records what it routes, for documentation and validation.
///
/// Routes are collected and handed to an [`axum::Router`] by
/// [`into_router`](Self::into_router). When an [`ApiSpec`](crate::ApiSpec)
/// is registered, that is also when the document is built and the
/// validation layer is attached to every route whose handler declares
/// request bindings.
///
/// ```rust
/// use axum_apispec::{api_router, ApiRouter};
///
/// async fn hello() -> &'static str { "hello" }
///
/// let app = api_router!("My API", "1.0.0")?
///     .get("/hello", hello)
///     .into_router()?;
/// # Ok::<(), axum_apispec::ConfigError>(())
/// ```
#[derive(Default)]
pub struct ApiRouter {
    inner: Router,
    has_inner: bool,
    routes: Vec<Route>,
    services: Vec<RouteRecord>,
    subrouters: Vec<(String, ApiRouter)>,
    registry: HandlerRegistry,
    apispec: Option<Installed>,
}

macro_rules! route_method {
    ($($(#[$doc:meta])* $name:ident => $method:ident),+ $(,)?) => {
        $(
            $(#[$doc])*
            #[must_use]
            pub fn $name<H, T>(self, path: &str, handler: H) -> Self
            where
                H: Handler<T, ()>,
                T: 'static,
            {
                self.handler(path, Method::$method, MethodFilter::$method, handler)
            }
        )+
    };
}

impl ApiRouter {
    pub fn new() -> Self {
        Self::default()
    }

    route_method! {
        /// Add a GET route.
        get => GET,
        /// Add a POST route.
        post => POST,
        /// Add a PUT route.
        put => PUT,
        /// Add a DELETE route.
        delete => DELETE,
        /// Add a PATCH route.
        patch => PATCH,
    }

    fn handler<H, T>(mut self, path: &str, method: Method, filter: MethodFilter, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        let record = RouteRecord {
            path: Some(path.to_string()),
            target: RouteTarget::Handler {
                method,
                handler: HandlerId::of::<H>(),
            },
        };
        self.routes.push(Route {
            record,
            method_router: on(filter, handler),
            exposer: false,
        });
        self
    }

    /// Attach metadata to `handler` for this router, taking precedence over
    /// metadata declared with `#[api_handler]`.
    #[must_use]
    pub fn describe<H>(mut self, _handler: &H, metadata: HandlerMetadata) -> Self {
        self.registry.insert(HandlerId::of::<H>(), metadata);
        self
    }

    /// Add a raw method router. Its handlers are not documented.
    #[must_use]
    pub fn route(mut self, path: &str, method_router: MethodRouter) -> Self {
        self.add_route(path, method_router);
        self
    }

    /// Add a [`View`] serving several methods on one path.
    #[must_use]
    pub fn view(mut self, path: &str, view: View) -> Self {
        let mut handlers = IndexMap::new();
        let mut method_router = MethodRouter::new();
        for (method, (id, router)) in view.handlers {
            handlers.insert(method, id);
            method_router = method_router.merge(router);
        }

        self.routes.push(Route {
            record: RouteRecord {
                path: Some(path.to_string()),
                target: RouteTarget::View(handlers),
            },
            method_router,
            exposer: false,
        });
        self
    }

    /// Take over the routes and metadata of another router.
    ///
    /// The other router's [`ApiSpec`](crate::ApiSpec) is not carried over:
    /// its document routes are dropped and its routes are documented and
    /// validated by this router's integration, if any. Use
    /// [`nest`](Self::nest) to keep a separate document.
    #[must_use]
    pub fn merge(mut self, other: ApiRouter) -> Self {
        let documented = other.is_documented();
        if documented {
            warn!("merged router has its own apispec, dropping it and its document routes");
        }
        self.routes.extend(
            other
                .routes
                .into_iter()
                .filter(|route| !(documented && route.exposer)),
        );
        self.services.extend(other.services);
        self.subrouters.extend(other.subrouters);
        self.registry.extend(other.registry);
        self.inner = self.inner.merge(other.inner);
        self.has_inner |= other.has_inner;
        self
    }

    /// Merge a plain axum router. Its routes are not documented.
    #[must_use]
    pub fn merge_router(mut self, other: Router) -> Self {
        self.inner = self.inner.merge(other);
        self.has_inner = true;
        self
    }

    /// Mount another router's routes under `prefix`.
    ///
    /// A router with its own [`ApiSpec`](crate::ApiSpec) keeps its document
    /// and validation settings; it is finalized on its own and its routes do
    /// not appear in this router's document. Its document lists the routes
    /// with the full mount prefix, and its viewer page points at the mounted
    /// document url.
    #[must_use]
    pub fn nest(mut self, prefix: &str, other: ApiRouter) -> Self {
        if other.is_documented() {
            self.subrouters.push((prefix.to_string(), other));
            return self;
        }
        for mut route in other.routes {
            route.record.path = route.record.path.map(|path| paths::join(prefix, &path));
            self.routes.push(route);
        }
        if other.has_inner {
            self.inner = mount(self.inner, prefix, other.inner);
            self.has_inner = true;
        }
        self.services.extend(other.services);
        for (nested_prefix, subrouter) in other.subrouters {
            self.subrouters.push((paths::join(prefix, &nested_prefix), subrouter));
        }
        self.registry.extend(other.registry);
        self
    }

    /// Mount a service under `prefix`. Services have no path template and
    /// are never documented.
    #[must_use]
    pub fn nest_service<T>(mut self, prefix: &str, service: T) -> Self
    where
        T: Service<Request, Error = Infallible> + Clone + Send + 'static,
        T::Response: IntoResponse,
        T::Future: Send + 'static,
    {
        self.add_service(prefix, service);
        self
    }

    /// Every recorded route, in registration order.
    pub fn records(&self) -> impl Iterator<Item = &RouteRecord> {
        self.routes
            .iter()
            .map(|route| &route.record)
            .chain(&self.services)
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Whether an [`ApiSpec`](crate::ApiSpec) is registered on this router.
    pub fn is_documented(&self) -> bool {
        self.apispec.is_some()
    }

    /// Handle to the document of the registered [`ApiSpec`](crate::ApiSpec).
    pub fn spec(&self) -> Option<SpecHandle> {
        self.apispec.as_ref().map(|installed| installed.spec.clone())
    }

    /// The document for the routes known so far.
    ///
    /// Returns the built document when there is one, and builds a fresh one
    /// from the current routes otherwise.
    pub fn openapi_spec(&self) -> Result<OpenAPI, ConfigError> {
        match &self.apispec {
            Some(installed) => match installed.spec.get() {
                Some(document) => Ok(document.clone()),
                None => build_document(&installed.config, self.records(), &self.registry),
            },
            None => build_document(&Default::default(), self.records(), &self.registry),
        }
    }

    pub(crate) fn install(&mut self, installed: Installed) {
        self.apispec = Some(installed);
    }

    pub(crate) fn add_route(&mut self, path: &str, method_router: MethodRouter) {
        self.push_undocumented(path, method_router, false);
    }

    /// Add a route serving the document or the viewer page.
    pub(crate) fn add_exposer_route(&mut self, path: &str, method_router: MethodRouter) {
        self.push_undocumented(path, method_router, true);
    }

    fn push_undocumented(&mut self, path: &str, method_router: MethodRouter, exposer: bool) {
        self.routes.push(Route {
            record: RouteRecord {
                path: Some(path.to_string()),
                target: RouteTarget::Undocumented,
            },
            method_router,
            exposer,
        });
    }

    pub(crate) fn add_service<T>(&mut self, prefix: &str, service: T)
    where
        T: Service<Request, Error = Infallible> + Clone + Send + 'static,
        T::Response: IntoResponse,
        T::Future: Send + 'static,
    {
        let inner = std::mem::take(&mut self.inner);
        self.inner = inner.nest_service(&paths::normalize_route(prefix), service);
        self.has_inner = true;
        self.services.push(RouteRecord {
            path: None,
            target: RouteTarget::Undocumented,
        });
    }

    /// Finalize into an [`axum::Router`].
    ///
    /// With an [`ApiSpec`](crate::ApiSpec) registered, this builds the
    /// document unless it was built in place, compiles the request schemas,
    /// and wraps every route with bindings in the validation layer.
    pub fn into_router(self) -> Result<Router, ConfigError> {
        self.finalize("")
    }

    /// Finalize a router that will be served under `prefix`.
    fn finalize(self, prefix: &str) -> Result<Router, ConfigError> {
        let ApiRouter {
            mut inner,
            has_inner: _,
            routes,
            services: _,
            subrouters,
            registry,
            apispec,
        } = self;

        for (nested_prefix, subrouter) in subrouters {
            let finalized = subrouter.finalize(&paths::join(prefix, &nested_prefix))?;
            inner = mount(inner, &nested_prefix, finalized);
        }

        let Some(installed) = apispec else {
            for route in routes {
                if let Some(path) = route.record.path {
                    inner = inner.route(&path, route.method_router);
                }
            }
            return Ok(inner);
        };

        let _ = installed.prefix.set(prefix.to_string());

        if !installed.spec.is_built() {
            let records: Vec<RouteRecord> = routes
                .iter()
                .map(|route| route.record.prefixed(prefix))
                .collect();
            let document = build_document(&installed.config, &records, &registry)?;
            installed.spec.set(document);
        }

        let settings = Arc::new(ValidationSettings::new(
            &installed.config,
            installed.error_handler.clone(),
        ));
        let mut validated = 0;

        for Route {
            record,
            mut method_router,
            ..
        } in routes
        {
            let Some(path) = record.path else {
                continue;
            };

            let mut handlers = IndexMap::new();
            for (method, id) in record.target.handlers() {
                let Some(metadata) = registry.resolve(id)? else {
                    continue;
                };
                let compiled =
                    CompiledHandler::compile(id, &metadata, installed.config.validate_responses)
                        .map_err(|source| ConfigError::Handler {
                            handler: id.to_string(),
                            source: Box::new(source),
                        })?;
                if let Some(compiled) = compiled {
                    handlers.insert(method, Arc::new(compiled));
                }
            }

            if !handlers.is_empty() {
                validated += handlers.len();
                let state = RouteValidation {
                    handlers: Arc::new(handlers),
                    settings: Arc::clone(&settings),
                };
                method_router = method_router.layer(from_fn_with_state(state, validation_middleware));
            }
            inner = inner.route(&path, method_router);
        }

        debug!(validated, "router finalized");
        Ok(inner)
    }
}
