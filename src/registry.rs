//! Lookup of handler metadata by handler identity.
//!
//! `#[api_handler]` submits a [`HandlerEntry`] to `inventory` for every
//! annotated function. Routers resolve a handler's metadata through
//! [`HandlerRegistry`], which also holds metadata attached to a single
//! router with [`ApiRouter::describe`](crate::ApiRouter::describe).

use crate::error::ConfigError;
use crate::metadata::HandlerMetadata;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Stable identity of a handler function: its fully-qualified path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(&'static str);

impl HandlerId {
    /// Identity of the handler type `H`.
    pub fn of<H>() -> Self {
        Self(std::any::type_name::<H>())
    }

    /// Identity of `handler`'s type.
    pub fn of_val<H>(_handler: &H) -> Self {
        Self::of::<H>()
    }

    pub const fn from_path(path: &'static str) -> Self {
        Self(path)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }

    /// The function name without its module path.
    pub fn short_name(&self) -> &'static str {
        let path = self.0.trim_end_matches("::{{closure}}");
        path.rsplit("::").next().unwrap_or(path)
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Registry entry for an annotated handler.
pub struct HandlerEntry {
    pub id: fn() -> HandlerId,
    pub metadata: fn() -> Result<HandlerMetadata, ConfigError>,
}

inventory::collect!(HandlerEntry);

/// Handler metadata known to a router.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    local: HashMap<HandlerId, Arc<HandlerMetadata>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach metadata to a handler for this registry only. It takes
    /// precedence over metadata submitted by `#[api_handler]`.
    pub fn insert(&mut self, id: HandlerId, metadata: HandlerMetadata) {
        self.local.insert(id, Arc::new(metadata));
    }

    pub fn extend(&mut self, other: HandlerRegistry) {
        self.local.extend(other.local);
    }

    /// Metadata of a handler, or `None` when it was never annotated.
    ///
    /// Only the exact handler type matches; a function with the same name in
    /// another module is a different handler.
    pub fn resolve(&self, id: HandlerId) -> Result<Option<Arc<HandlerMetadata>>, ConfigError> {
        if let Some(metadata) = self.local.get(&id) {
            return Ok(Some(Arc::clone(metadata)));
        }

        let Some(entry) = inventory::iter::<HandlerEntry>
            .into_iter()
            .find(|entry| (entry.id)() == id)
        else {
            return Ok(None);
        };

        (entry.metadata)()
            .map(|metadata| Some(Arc::new(metadata)))
            .map_err(|source| ConfigError::Handler {
                handler: id.to_string(),
                source: Box::new(source),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Docs;

    async fn registered_handler() {}
    async fn unregistered_handler() {}
    async fn broken_handler() {}

    mod other {
        pub async fn registered_handler() {}
    }

    fn registered_id() -> HandlerId {
        HandlerId::of_val(&registered_handler)
    }

    fn broken_id() -> HandlerId {
        HandlerId::of_val(&broken_handler)
    }

    fn registered_metadata() -> Result<HandlerMetadata, ConfigError> {
        Ok(HandlerMetadata::new().docs(Docs::new().summary("registered")))
    }

    fn broken_metadata() -> Result<HandlerMetadata, ConfigError> {
        Err(ConfigError::MultipleBodySchemas)
    }

    inventory::submit! {
        HandlerEntry {
            id: registered_id,
            metadata: registered_metadata,
        }
    }

    inventory::submit! {
        HandlerEntry {
            id: broken_id,
            metadata: broken_metadata,
        }
    }

    fn id_of<H>(handler: &H) -> HandlerId {
        HandlerId::of_val(handler)
    }

    #[test]
    fn test_handler_id_matches_module_path() {
        let id = id_of(&registered_handler);
        assert_eq!(id.as_str(), concat!(module_path!(), "::registered_handler"));
        assert_eq!(id.short_name(), "registered_handler");
    }

    #[test]
    fn test_handler_documentation_lookup() {
        let registry = HandlerRegistry::new();
        let metadata = registry.resolve(id_of(&registered_handler)).unwrap().unwrap();
        assert_eq!(metadata.summary.as_deref(), Some("registered"));
    }

    #[test]
    fn test_handler_documentation_lookup_unknown() {
        let registry = HandlerRegistry::new();
        assert!(registry.resolve(id_of(&unregistered_handler)).unwrap().is_none());
    }

    #[test]
    fn test_same_name_in_other_module_is_not_resolved() {
        let registry = HandlerRegistry::new();
        let other = id_of(&other::registered_handler);
        assert_eq!(other.short_name(), "registered_handler");
        assert!(registry.resolve(other).unwrap().is_none());
    }

    #[test]
    fn test_local_metadata_takes_precedence() {
        let mut registry = HandlerRegistry::new();
        registry.insert(
            id_of(&registered_handler),
            HandlerMetadata::new().docs(Docs::new().summary("local")),
        );

        let metadata = registry.resolve(id_of(&registered_handler)).unwrap().unwrap();
        assert_eq!(metadata.summary.as_deref(), Some("local"));
    }

    #[test]
    fn test_invalid_metadata_names_the_handler() {
        let registry = HandlerRegistry::new();
        let err = registry.resolve(id_of(&broken_handler)).unwrap_err();
        match err {
            ConfigError::Handler { handler, source } => {
                assert!(handler.ends_with("::broken_handler"));
                assert!(matches!(*source, ConfigError::MultipleBodySchemas));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
