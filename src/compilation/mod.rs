//! Compilation: per-build state owned by one rendering pass
//!
//! Owns the chunk graph, the output options, the chunk-loading hook
//! registry, each chunk's capability set and the runtime modules attached to
//! chunks. Hooks and the "chunk loading attached" markers live here rather
//! than in any process-wide registry, so they are dropped with the
//! compilation.

mod hash;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashSet;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::chunk::{Chunk, ChunkGraph, ChunkId, ChunkUkey};
use crate::config::OutputOptions;
use crate::error::{Error, Result};
use crate::plugins::ChunkLoadingHooks;
use crate::runtime::{
    render_bootstrap, render_chunk_manifest, RuntimeGlobals, RuntimeModule, Template, REQUIRE_FN,
};

pub use hash::{update_chunk_hash, HASH_COMPONENT, HASH_FORMAT_VERSION};

static NEXT_COMPILATION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a compilation, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompilationId(u64);

impl fmt::Display for CompilationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "compilation-{}", self.0)
    }
}

/// A runtime module and the chunk it is attached to
#[derive(Debug, Clone)]
struct AttachedRuntimeModule {
    chunk: ChunkUkey,
    module: Arc<dyn RuntimeModule>,
}

/// Output of rendering one chunk
#[derive(Debug, Clone)]
pub struct RenderedChunk {
    pub ukey: ChunkUkey,
    pub id: ChunkId,
    pub filename: String,
    pub code: String,
    pub hash: String,
}

/// One build's chunk-loading state
pub struct Compilation {
    id: CompilationId,
    options: Arc<OutputOptions>,
    graph: ChunkGraph,
    hooks: OnceCell<Arc<ChunkLoadingHooks>>,
    requirements: RwLock<HashMap<ChunkUkey, RuntimeGlobals>>,
    runtime_modules: RwLock<Vec<AttachedRuntimeModule>>,
    chunk_loading_attached: DashSet<ChunkUkey>,
}

impl Compilation {
    /// Create a new compilation over a finished chunk graph
    pub fn new(options: OutputOptions, graph: ChunkGraph) -> Self {
        let id = CompilationId(NEXT_COMPILATION_ID.fetch_add(1, Ordering::Relaxed));
        debug!("Created {} with {} chunk(s)", id, graph.len());

        Self {
            id,
            options: Arc::new(options),
            graph,
            hooks: OnceCell::new(),
            requirements: RwLock::new(HashMap::new()),
            runtime_modules: RwLock::new(Vec::new()),
            chunk_loading_attached: DashSet::new(),
        }
    }

    pub fn id(&self) -> CompilationId {
        self.id
    }

    pub fn options(&self) -> &OutputOptions {
        &self.options
    }

    pub fn chunk_graph(&self) -> &ChunkGraph {
        &self.graph
    }

    /// Get a chunk, failing on keys from another graph
    pub fn chunk(&self, ukey: ChunkUkey) -> Result<&Chunk> {
        self.graph.chunk(ukey).ok_or(Error::UnknownChunk(ukey))
    }

    /// The chunk-loading hook registry, created on first access
    pub fn chunk_loading_hooks(&self) -> Arc<ChunkLoadingHooks> {
        self.hooks
            .get_or_init(|| {
                debug!("Creating chunk loading hooks for {}", self.id);
                Arc::new(ChunkLoadingHooks::new())
            })
            .clone()
    }

    /// Union `set` into the chunk's capability set
    pub fn add_runtime_requirements(&self, ukey: ChunkUkey, set: RuntimeGlobals) {
        *self.requirements.write().entry(ukey).or_default() |= set;
    }

    /// Current capability set of a chunk
    pub fn runtime_requirements(&self, ukey: ChunkUkey) -> RuntimeGlobals {
        self.requirements
            .read()
            .get(&ukey)
            .copied()
            .unwrap_or_default()
    }

    /// Attach the module built by `make` unless one was already attached to
    /// the chunk through this call; true only for the first caller per chunk
    pub fn attach_runtime_module_once<F>(&self, ukey: ChunkUkey, make: F) -> bool
    where
        F: FnOnce() -> Arc<dyn RuntimeModule>,
    {
        if !self.chunk_loading_attached.insert(ukey) {
            return false;
        }
        self.add_runtime_module(ukey, make());
        true
    }

    /// Attach a runtime module to a chunk
    pub fn add_runtime_module(&self, ukey: ChunkUkey, module: Arc<dyn RuntimeModule>) {
        debug!("Attaching runtime module '{}' to chunk {}", module.name(), ukey);
        self.runtime_modules.write().push(AttachedRuntimeModule { chunk: ukey, module });
    }

    /// Runtime modules attached to a chunk, in attachment order
    pub fn runtime_modules_for(&self, ukey: ChunkUkey) -> Vec<Arc<dyn RuntimeModule>> {
        self.runtime_modules
            .read()
            .iter()
            .filter(|attached| attached.chunk == ukey)
            .map(|attached| attached.module.clone())
            .collect()
    }

    /// Generate every runtime module attached to a chunk as banner-prefixed sections
    pub(crate) fn render_runtime_modules(&self, ukey: ChunkUkey) -> Result<Vec<String>> {
        self.runtime_modules_for(ukey)
            .iter()
            .map(|module| {
                let code = module.generate(self)?;
                Ok(format!(
                    "// component/{}\n(function() {{\n{}\n}})();",
                    module.name(),
                    Template::indent(&code)
                ))
            })
            .collect()
    }

    /// Object literal mapping module ids to their factories
    ///
    /// Module bodies are emitted verbatim: re-indenting would change the
    /// value of multi-line template literals.
    pub(crate) fn render_module_map(&self, chunk: &Chunk) -> Result<String> {
        if chunk.modules.is_empty() {
            return Ok("{}".to_string());
        }

        let factories = chunk
            .modules
            .iter()
            .map(|module| {
                let key = serde_json::to_string(&module.id).map_err(Error::serialize("module id"))?;
                Ok(format!(
                    "{}: (function(module, exports, {}) {{\n{}\n}})",
                    key, REQUIRE_FN, module.code
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(format!("{{\n{}\n}}", factories.join(",\n")))
    }

    /// Output filename of a chunk
    pub fn filename(&self, chunk: &Chunk) -> Result<String> {
        let template = if chunk.is_hot_update {
            &self.options.hot_update_chunk_filename
        } else {
            &self.options.chunk_filename
        };

        let mut filename = template
            .replace("[id]", &chunk.id.to_string())
            .replace("[name]", &chunk.display_name());
        if filename.contains("[fullhash]") {
            filename = filename.replace("[fullhash]", &self.full_hash()?);
        }
        Ok(filename)
    }

    /// Render one chunk to its final code
    pub fn render_chunk(&self, ukey: ChunkUkey) -> Result<RenderedChunk> {
        let chunk = self.chunk(ukey)?;

        let code = if chunk.has_runtime && !chunk.is_hot_update {
            render_bootstrap(self, ukey)?
        } else {
            let modules = self.render_module_map(chunk)?;
            let entries = self.graph.entry_info(ukey);
            let sections = self.render_runtime_modules(ukey)?;
            let runtime = if sections.is_empty() {
                None
            } else {
                Some(format!(
                    "function({}) {{\n{}\n}}",
                    REQUIRE_FN,
                    Template::indent(&sections.join("\n\n"))
                ))
            };
            render_chunk_manifest(&self.options, chunk, &modules, &entries, runtime.as_deref())?
        };

        let rendered = RenderedChunk {
            ukey,
            id: chunk.id.clone(),
            filename: self.filename(chunk)?,
            code,
            hash: self.chunk_hash(ukey)?,
        };
        info!("Rendered chunk {} -> {}", rendered.id, rendered.filename);
        Ok(rendered)
    }

    /// Render every chunk in graph order
    pub fn render_all(&self) -> Result<Vec<RenderedChunk>> {
        self.graph.ukeys().map(|ukey| self.render_chunk(ukey)).collect()
    }
}

impl fmt::Debug for Compilation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compilation")
            .field("id", &self.id)
            .field("chunks", &self.graph.len())
            .field("runtime_modules", &self.runtime_modules.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkModule, Entrypoint};
    use crate::runtime::Propagator;
    use pretty_assertions::assert_eq;

    fn split_graph() -> (ChunkGraph, ChunkUkey, ChunkUkey) {
        let mut graph = ChunkGraph::new();
        let main = graph.add_chunk(Chunk::runtime(
            "main",
            vec![ChunkModule::new("./src/main.js", "__component_require__.e(1);")],
        ));
        let lazy = graph.add_chunk(Chunk::new(
            1,
            vec![ChunkModule::new("./src/lazy.js", "module.exports = 42;")],
        ));
        graph.add_entrypoint(Entrypoint::new("main", main, vec!["./src/main.js".to_string()]));
        (graph, main, lazy)
    }

    #[test]
    fn test_requirements_accumulate() {
        let (graph, main, lazy) = split_graph();
        let compilation = Compilation::new(OutputOptions::default(), graph);

        compilation.add_runtime_requirements(main, RuntimeGlobals::ENSURE_CHUNK);
        compilation.add_runtime_requirements(main, RuntimeGlobals::PUBLIC_PATH);

        assert_eq!(
            compilation.runtime_requirements(main),
            RuntimeGlobals::ENSURE_CHUNK | RuntimeGlobals::PUBLIC_PATH
        );
        assert!(compilation.runtime_requirements(lazy).is_empty());
    }

    #[test]
    fn test_unknown_chunk() {
        let (graph, _, _) = split_graph();
        let compilation = Compilation::new(OutputOptions::default(), graph);
        assert!(matches!(
            compilation.chunk(ChunkUkey(9)),
            Err(Error::UnknownChunk(ChunkUkey(9)))
        ));
    }

    #[test]
    fn test_render_lazy_chunk() {
        let (graph, _, lazy) = split_graph();
        let compilation = Compilation::new(OutputOptions::default(), graph);

        let rendered = compilation.render_chunk(lazy).unwrap();
        assert_eq!(rendered.filename, "1.js");
        assert_eq!(
            rendered.code,
            "(self[\"componentChunk\"]=self[\"componentChunk\"]||[]).push([[1],{\n\
\"./src/lazy.js\": (function(module, exports, __component_require__) {\n\
module.exports = 42;\n\
})\n\
}])"
        );
        assert_eq!(rendered.hash.len(), 16);
    }

    #[test]
    fn test_render_runtime_chunk() {
        let (graph, main, _) = split_graph();
        let compilation = Compilation::new(OutputOptions::default(), graph);
        compilation.add_runtime_requirements(main, RuntimeGlobals::ENSURE_CHUNK_HANDLERS);
        Propagator::default().propagate_all(&compilation).unwrap();

        let rendered = compilation.render_chunk(main).unwrap();
        assert!(rendered.code.starts_with("(function() { // component runtime"));
        assert!(rendered.code.contains("// component/jsonp chunk loading"));
        assert!(rendered.code.contains("__component_require__.f.j = function(chunkId, promises) {"));
        assert!(rendered.code.contains("var __component_exports__ = __component_require__(\"./src/main.js\");"));
    }

    #[test]
    fn test_loading_requested_by_lazy_chunk_lives_in_runtime() {
        let (graph, main, lazy) = split_graph();
        let compilation = Compilation::new(OutputOptions::default(), graph);
        compilation.add_runtime_requirements(lazy, RuntimeGlobals::ENSURE_CHUNK_HANDLERS);
        Propagator::default().propagate_all(&compilation).unwrap();

        let rendered = compilation.render_all().unwrap();
        let runtime = &rendered[main.0].code;
        let lazy = &rendered[lazy.0].code;

        // every helper the loading code touches is defined by the runtime
        for helper in [".f = {};", ".e = function(chunkId)", ".p = \"/\";", ".u = function(chunkId)", ".o = function(obj, prop)"] {
            assert!(runtime.contains(&format!("__component_require__{}", helper)), "{}", helper);
        }
        let defined_at = runtime.find("__component_require__.f = {};").unwrap();
        let handler_at = runtime.find("__component_require__.f.j = function(chunkId, promises) {").unwrap();
        assert!(defined_at < handler_at);
        assert_eq!(runtime.matches("var installedChunks").count(), 1);

        // the lazy chunk carries no second copy of the loading state
        assert!(!lazy.contains("installedChunks"));
        assert!(!lazy.contains("function(__component_require__) {\n\t"));
        assert!(lazy.ends_with("})\n}])"), "{}", lazy);
    }

    #[test]
    fn test_module_code_is_not_reindented() {
        let mut graph = ChunkGraph::new();
        let lazy = graph.add_chunk(Chunk::new(
            1,
            vec![ChunkModule::new("./tpl.js", "module.exports = `a\nb`;")],
        ));
        let compilation = Compilation::new(OutputOptions::default(), graph);

        let code = compilation.render_chunk(lazy).unwrap().code;
        assert!(code.contains("{\nmodule.exports = `a\nb`;\n})"), "{}", code);
    }

    #[test]
    fn test_hot_update_filename_uses_full_hash() {
        let mut graph = ChunkGraph::new();
        let hot = graph.add_chunk(Chunk::hot_update(7, vec![ChunkModule::new("a", "")]));
        let compilation = Compilation::new(OutputOptions::default(), graph);

        let rendered = compilation.render_chunk(hot).unwrap();
        let full_hash = compilation.full_hash().unwrap();
        assert_eq!(rendered.filename, format!("7.{}.hot-update.js", full_hash));
        assert!(rendered.code.starts_with("self[\"componentHotUpdate\"](7,{"));
    }
}
