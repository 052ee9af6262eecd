//! Plugin registry: plugin names mapped to constructors

use std::collections::BTreeMap;

use super::{EventLogPlugin, Plugin, PluginContext, TriggerPlugin, VoiceKitPlugin};
use crate::{Error, Result};

/// Builds a plugin instance from the startup context
pub type PluginFactory = fn(&PluginContext) -> Result<Box<dyn Plugin>>;

/// Startup-time mapping from plugin name to constructor
#[derive(Debug, Clone)]
pub struct PluginRegistry {
    factories: BTreeMap<String, PluginFactory>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PluginRegistry {
    /// Create an empty registry
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Create a registry with the built-in plugins
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(VoiceKitPlugin::NAME, VoiceKitPlugin::from_context);
        registry.register(TriggerPlugin::NAME, TriggerPlugin::from_context);
        registry.register(EventLogPlugin::NAME, EventLogPlugin::from_context);
        registry
    }

    /// Register a constructor, replacing any previous one with the same name
    pub fn register(&mut self, name: &str, factory: PluginFactory) {
        if self.factories.insert(name.to_string(), factory).is_some() {
            tracing::debug!(plugin = name, "replaced plugin constructor");
        }
    }

    /// Build the plugin registered as `name`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Plugin`] if no such plugin exists or its constructor fails
    pub fn build(&self, name: &str, ctx: &PluginContext) -> Result<Box<dyn Plugin>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::Plugin(format!("unknown plugin: {name}")))?;

        factory(ctx).map_err(|e| match e {
            Error::Plugin(msg) => Error::Plugin(format!("{name}: {msg}")),
            other => Error::Plugin(format!("{name}: {other}")),
        })
    }

    /// Build every named plugin, in order, skipping the ones that fail
    ///
    /// Failures are logged and never abort startup.
    pub fn load_all<S: AsRef<str>>(
        &self,
        names: &[S],
        ctx: &PluginContext,
    ) -> Vec<Box<dyn Plugin>> {
        let mut loaded = Vec::with_capacity(names.len());

        for name in names {
            let name = name.as_ref();
            match self.build(name, ctx) {
                Ok(plugin) => {
                    tracing::info!(plugin = name, "loaded plugin");
                    loaded.push(plugin);
                }
                Err(e) => {
                    tracing::error!(plugin = name, error = %e, "can not load plugin");
                }
            }
        }

        loaded
    }

    /// Registered plugin names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Whether a plugin with this name is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Number of registered plugins
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no plugins are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::assistant::{Event, command_channel};

    struct Named(&'static str);

    impl Plugin for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn process_event(&mut self, _event: &Event) -> Result<()> {
            Ok(())
        }
    }

    fn context() -> PluginContext {
        let (conversation, _rx) = command_channel(Duration::ZERO);
        PluginContext::new(conversation)
    }

    fn alpha(_: &PluginContext) -> Result<Box<dyn Plugin>> {
        Ok(Box::new(Named("alpha")))
    }

    fn beta(_: &PluginContext) -> Result<Box<dyn Plugin>> {
        Ok(Box::new(Named("beta")))
    }

    fn broken(_: &PluginContext) -> Result<Box<dyn Plugin>> {
        Err(Error::Plugin("gpio busy".to_string()))
    }

    #[test]
    fn builtin_plugins_are_registered() {
        let registry = PluginRegistry::builtin();
        assert_eq!(registry.names(), vec!["log", "trigger", "voicekit"]);
        assert!(registry.contains("voicekit"));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn unknown_plugin_is_plugin_error() {
        let registry = PluginRegistry::empty();
        let Err(err) = registry.build("missing", &context()) else {
            panic!("unknown plugin was built");
        };
        assert!(matches!(err, Error::Plugin(msg) if msg.contains("missing")));
    }

    #[test]
    fn load_all_keeps_order_and_skips_failures() {
        let mut registry = PluginRegistry::empty();
        registry.register("alpha", alpha);
        registry.register("beta", beta);
        registry.register("broken", broken);

        let loaded = registry.load_all(&["beta", "broken", "nope", "alpha"], &context());
        let names: Vec<&str> = loaded.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["beta", "alpha"]);
    }

    #[test]
    fn constructor_errors_name_the_plugin() {
        let mut registry = PluginRegistry::empty();
        registry.register("broken", broken);

        let Err(err) = registry.build("broken", &context()) else {
            panic!("failing constructor produced a plugin");
        };
        assert_eq!(err.to_string(), "plugin error: broken: gpio busy");
    }

    #[test]
    fn register_replaces_existing() {
        let mut registry = PluginRegistry::empty();
        registry.register("alpha", broken);
        registry.register("alpha", alpha);

        assert_eq!(registry.len(), 1);
        assert!(registry.build("alpha", &context()).is_ok());
    }
}
