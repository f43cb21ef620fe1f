//! Plugin system for chunk-loading code generation
//!
//! Plugins rewrite generated code by tapping waterfall pipelines: each tap
//! receives the previous tap's output and returns a value of the same shape.
//! Taps must preserve that shape; this is a plugin-authoring contract and is
//! not checked at runtime.

mod attributes;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::chunk::Chunk;
use crate::compilation::Compilation;
use crate::config::PluginConfig;
use crate::error::{Error, Result};
use crate::runtime::TagSpec;

pub use attributes::AttributesPlugin;

/// A single pipeline step: `(value, chunk, hash) -> value`
pub trait Transform<T>: Send + Sync {
    fn transform(&self, value: T, chunk: &Chunk, hash: &str) -> T;
}

impl<T, F> Transform<T> for F
where
    F: Fn(T, &Chunk, &str) -> T + Send + Sync,
{
    fn transform(&self, value: T, chunk: &Chunk, hash: &str) -> T {
        self(value, chunk, hash)
    }
}

struct Tap<T> {
    plugin: String,
    transform: Arc<dyn Transform<T>>,
}

/// Ordered pipeline of transforms sharing one value shape
pub struct Waterfall<T> {
    name: &'static str,
    taps: RwLock<Vec<Tap<T>>>,
}

impl<T> Waterfall<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            taps: RwLock::new(Vec::new()),
        }
    }

    /// Append a transform; taps run in registration order
    pub fn tap(&self, plugin: impl Into<String>, transform: impl Transform<T> + 'static) {
        let plugin = plugin.into();
        debug!("Plugin {} tapped {}", plugin, self.name);
        self.taps.write().push(Tap {
            plugin,
            transform: Arc::new(transform),
        });
    }

    /// Feed `initial` through every tap
    pub fn call(&self, initial: T, chunk: &Chunk, hash: &str) -> T {
        // Snapshot so a transform may tap further hooks without deadlocking
        let taps: Vec<_> = self
            .taps
            .read()
            .iter()
            .map(|tap| (tap.plugin.clone(), tap.transform.clone()))
            .collect();

        taps.into_iter().fold(initial, |value, (plugin, transform)| {
            trace!("Running {} tap from {}", self.name, plugin);
            transform.transform(value, chunk, hash)
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.taps.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.read().is_empty()
    }
}

impl<T> fmt::Debug for Waterfall<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plugins: Vec<String> = self.taps.read().iter().map(|t| t.plugin.clone()).collect();
        f.debug_struct("Waterfall")
            .field("name", &self.name)
            .field("taps", &plugins)
            .finish()
    }
}

/// The four pipelines chunk-loading code flows through
#[derive(Debug)]
pub struct ChunkLoadingHooks {
    /// Whole script-loading block for one chunk request
    pub build_script_tag: Waterfall<String>,

    /// Preload `<link>` creation block
    pub build_preload_link: Waterfall<String>,

    /// Prefetch `<link>` creation block
    pub build_prefetch_link: Waterfall<String>,

    /// Any created tag's creation expression and attributes
    pub mutate_tag: Waterfall<TagSpec>,
}

impl ChunkLoadingHooks {
    pub(crate) fn new() -> Self {
        Self {
            build_script_tag: Waterfall::new("build_script_tag"),
            build_preload_link: Waterfall::new("build_preload_link"),
            build_prefetch_link: Waterfall::new("build_prefetch_link"),
            mutate_tag: Waterfall::new("mutate_tag"),
        }
    }
}

/// Hooks for the given compilation
///
/// The first call creates the pipelines, later calls for the same
/// compilation return the same instance. They are dropped with the
/// compilation. Anything other than a [`Compilation`] is rejected.
pub fn get_hooks(handle: &dyn Any) -> Result<Arc<ChunkLoadingHooks>> {
    handle
        .downcast_ref::<Compilation>()
        .map(Compilation::chunk_loading_hooks)
        .ok_or(Error::InvalidCompilation)
}

/// Plugin trait - implement this to extend chunk-loading code generation
pub trait Plugin: Send + Sync {
    /// Plugin name for logging and debugging
    fn name(&self) -> &str;

    /// Tap the compilation's hooks
    fn apply(&self, hooks: &ChunkLoadingHooks);
}

/// Plugin manager
#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginManager {
    /// Create a new plugin manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the built-in plugins named in configuration
    pub fn from_config(configs: &[PluginConfig]) -> anyhow::Result<Self> {
        let mut manager = Self::new();
        for config in configs {
            match config.name.as_str() {
                "attributes" => manager.register(Arc::new(AttributesPlugin::from_config(config)?)),
                other => anyhow::bail!("Unknown plugin '{}'", other),
            }
        }
        Ok(manager)
    }

    /// Register a plugin
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// Apply every plugin to the compilation's hooks
    pub fn apply(&self, compilation: &Compilation) -> Result<()> {
        let hooks = get_hooks(compilation)?;
        for plugin in &self.plugins {
            debug!("Applying plugin {}", plugin.name());
            plugin.apply(&hooks);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{Chunk, ChunkGraph};
    use crate::config::OutputOptions;

    fn compilation() -> Compilation {
        let mut graph = ChunkGraph::new();
        graph.add_chunk(Chunk::runtime("main", vec![]));
        Compilation::new(OutputOptions::default(), graph)
    }

    #[test]
    fn test_hooks_cached_per_compilation() {
        let first = compilation();
        let second = compilation();

        let a = get_hooks(&first).unwrap();
        let b = get_hooks(&first).unwrap();
        let c = get_hooks(&second).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_hooks_reject_non_compilation() {
        let not_a_compilation = String::from("compilation");
        assert!(matches!(get_hooks(&not_a_compilation), Err(Error::InvalidCompilation)));
    }

    #[test]
    fn test_waterfall_runs_in_registration_order() {
        let hook: Waterfall<String> = Waterfall::new("test");
        hook.tap("first", |code: String, _: &Chunk, _: &str| format!("{}a", code));
        hook.tap("second", |code: String, chunk: &Chunk, hash: &str| {
            format!("{}b[{}:{}]", code, chunk.id, hash)
        });

        let chunk = Chunk::new(3, vec![]);
        assert_eq!(hook.call(String::from(">"), &chunk, "h"), ">ab[3:h]");
        assert_eq!(hook.len(), 2);
    }

    #[test]
    fn test_empty_waterfall_is_identity() {
        let hook: Waterfall<String> = Waterfall::new("test");
        assert!(hook.is_empty());
        assert_eq!(hook.call(String::from("x"), &Chunk::new(1, vec![]), ""), "x");
    }

    #[test]
    fn test_unknown_plugin_rejected() {
        let configs = vec![PluginConfig {
            name: "nope".to_string(),
            options: None,
        }];
        assert!(PluginManager::from_config(&configs).is_err());
    }
}
