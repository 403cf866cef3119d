//! Tool Registry
//!
//! Tools are registered on a [`RegistryBuilder`] during startup. `build()`
//! freezes them into a [`ToolRegistry`] that only supports lookup and
//! enumeration, so it can be shared across connections without locking.

pub mod handler;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use toolbridge_protocol::mcp::methods;
use toolbridge_protocol::ToolDescriptor;
use tracing::{debug, info};

use crate::config::ToolToggles;

pub use handler::{
    async_handler_fn, handler_fn, require_str, HandlerError, HandlerResult, Invoker, MainThreadFn, ToolHandler,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateRegistration(String),

    #[error("'{0}' is a reserved protocol method and cannot be registered as a tool")]
    ReservedName(String),

    #[error("tool name cannot be empty")]
    EmptyName,
}

/// One registered tool
#[derive(Debug, Clone)]
pub struct HandlerEntry {
    pub descriptor: ToolDescriptor,
    pub invoker: Invoker,
}

impl HandlerEntry {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

/// Mutable registration phase
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: Vec<HandlerEntry>,
    index: HashMap<String, usize>,
    toggles: ToolToggles,
    skipped: Vec<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip tools switched off in the given toggles
    pub fn with_toggles(toggles: ToolToggles) -> Self {
        Self {
            toggles,
            ..Self::default()
        }
    }

    /// Register a handler that runs on the dispatching task
    pub fn register(
        &mut self,
        descriptor: ToolDescriptor,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<&mut Self, RegistryError> {
        self.insert(descriptor, Invoker::Inline(handler))
    }

    /// Register a handler that must run on the designated executor thread
    pub fn register_on_main_thread<F>(&mut self, descriptor: ToolDescriptor, handler: F) -> Result<&mut Self, RegistryError>
    where
        F: Fn(Value) -> HandlerResult + Send + Sync + 'static,
    {
        self.insert(descriptor, Invoker::MainThread(Arc::new(handler)))
    }

    pub fn insert(&mut self, descriptor: ToolDescriptor, invoker: Invoker) -> Result<&mut Self, RegistryError> {
        let name = descriptor.name.clone();

        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if methods::is_reserved(&name) {
            return Err(RegistryError::ReservedName(name));
        }
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateRegistration(name));
        }
        if !self.toggles.is_enabled(&name) {
            debug!("Tool {} is disabled by config, skipping registration", name);
            self.skipped.push(name);
            return Ok(self);
        }

        debug!("Registering tool {} ({})", name, invoker.affinity());
        self.index.insert(name, self.entries.len());
        self.entries.push(HandlerEntry { descriptor, invoker });
        Ok(self)
    }

    /// Freeze the registry
    pub fn build(self) -> ToolRegistry {
        info!(
            "Tool registry initialized: {} tools ({} disabled)",
            self.entries.len(),
            self.skipped.len()
        );

        ToolRegistry {
            entries: self.entries,
            index: self.index,
        }
    }
}

/// Frozen name → handler map, in registration order
#[derive(Debug, Default)]
pub struct ToolRegistry {
    entries: Vec<HandlerEntry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Exact, case-sensitive lookup
    pub fn lookup(&self, name: &str) -> Option<&HandlerEntry> {
        self.index.get(name).map(|&idx| &self.entries[idx])
    }

    /// Descriptors in registration order
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.entries.iter().map(|entry| entry.descriptor.clone()).collect()
    }

    pub fn entries(&self) -> &[HandlerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn needs_main_thread(&self) -> bool {
        self.entries.iter().any(|entry| matches!(entry.invoker, Invoker::MainThread(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolbridge_protocol::tool::object_schema;
    use toolbridge_protocol::ToolResult;

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor::new(name, format!("{} tool", name), object_schema(Vec::<(String, Value)>::new()))
    }

    fn reply(text: &'static str) -> Arc<dyn ToolHandler> {
        handler_fn(move |_| Ok(ToolResult::text(text)))
    }

    #[test]
    fn test_list_keeps_registration_order() {
        let mut builder = ToolRegistry::builder();
        builder.register(descriptor("b"), reply("b")).unwrap();
        builder.register(descriptor("a"), reply("a")).unwrap();
        let registry = builder.build();

        let names: Vec<String> = registry.list().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_duplicate_registration_keeps_first() {
        let mut builder = ToolRegistry::builder();
        builder.register(descriptor("echo"), reply("first")).unwrap();
        let err = builder.register(descriptor("echo"), reply("second")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateRegistration("echo".to_string()));

        let registry = builder.build();
        assert_eq!(registry.len(), 1);
        let Invoker::Inline(handler) = &registry.lookup("echo").unwrap().invoker else {
            panic!("expected inline handler");
        };
        assert_eq!(handler.call(json!({})).await.unwrap().joined_text(), "first");
    }

    #[test]
    fn test_reserved_and_empty_names_rejected() {
        let mut builder = ToolRegistry::builder();
        assert_eq!(
            builder.register(descriptor("tools/list"), reply("x")).unwrap_err(),
            RegistryError::ReservedName("tools/list".to_string())
        );
        assert_eq!(
            builder.register(descriptor("notifications/initialized"), reply("x")).unwrap_err(),
            RegistryError::ReservedName("notifications/initialized".to_string())
        );
        assert_eq!(builder.register(descriptor(""), reply("x")).unwrap_err(), RegistryError::EmptyName);
        assert!(builder.build().is_empty());
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let mut builder = ToolRegistry::builder();
        builder.register(descriptor("echo"), reply("x")).unwrap();
        let registry = builder.build();

        assert!(registry.lookup("echo").is_some());
        assert!(registry.lookup("Echo").is_none());
        assert!(registry.lookup("ech").is_none());
    }

    #[test]
    fn test_disabled_tools_are_skipped() {
        let mut toggles = ToolToggles::default();
        toggles.set("build_project", false);

        let mut builder = RegistryBuilder::with_toggles(toggles);
        builder.register(descriptor("build_project"), reply("x")).unwrap();
        builder.register(descriptor("list_scenes"), reply("x")).unwrap();
        let registry = builder.build();

        assert!(registry.lookup("build_project").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_main_thread_registration() {
        let mut builder = ToolRegistry::builder();
        builder
            .register_on_main_thread(descriptor("get_thread_info"), |_| Ok(ToolResult::text("main")))
            .unwrap()
            .register(descriptor("ping"), reply("pong"))
            .unwrap();
        let registry = builder.build();

        assert!(registry.needs_main_thread());
        assert_eq!(registry.lookup("get_thread_info").unwrap().invoker.affinity(), "main-thread");
        assert_eq!(registry.lookup("ping").unwrap().invoker.affinity(), "inline");
    }
}
