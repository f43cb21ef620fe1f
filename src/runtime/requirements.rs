//! Runtime requirement propagation
//!
//! Listeners react to capabilities appearing in a chunk's set and add the
//! capabilities those depend on. Three narrow triggers (ensure chunk, hot
//! update download, hot update manifest) and one tree-wide deferred-entry
//! check also request chunk loading, which attaches the jsonp runtime module
//! to the chunk exactly once.
//!
//! Only runtime chunks define helper globals, so a non-runtime chunk's set is
//! merged into the runtime chunks serving it and the module is attached there.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::{JsonpChunkLoadingRuntimeModule, RuntimeGlobals};
use crate::chunk::{Chunk, ChunkUkey};
use crate::compilation::Compilation;
use crate::error::Result;

/// What a listener reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listen {
    /// Run when the capability is in the chunk's set
    Requirement(RuntimeGlobals),
    /// Run for every chunk
    Tree,
}

/// Capability set of one chunk while a propagation pass runs
#[derive(Debug, Clone, Default)]
pub struct ChunkRequirements {
    set: RuntimeGlobals,
    chunk_loading: bool,
}

impl ChunkRequirements {
    pub fn new(set: RuntimeGlobals) -> Self {
        Self {
            set,
            chunk_loading: false,
        }
    }

    /// Add capabilities; sets never shrink
    pub fn add(&mut self, set: RuntimeGlobals) {
        self.set |= set;
    }

    pub fn contains(&self, set: RuntimeGlobals) -> bool {
        self.set.contains(set)
    }

    pub fn set(&self) -> RuntimeGlobals {
        self.set
    }

    /// Request the chunk loading runtime module for this chunk
    ///
    /// Adds the two baseline capabilities the module relies on.
    pub fn require_chunk_loading(&mut self) {
        self.add(RuntimeGlobals::MODULE_FACTORIES_ADD_ONLY | RuntimeGlobals::HAS_OWN_PROPERTY);
        self.chunk_loading = true;
    }

    pub fn chunk_loading(&self) -> bool {
        self.chunk_loading
    }
}

/// A reaction to a chunk's capability set
pub trait RequirementListener: Send + Sync {
    fn name(&self) -> &str;

    fn listens(&self) -> Listen;

    fn handle(&self, compilation: &Compilation, chunk: ChunkUkey, requirements: &mut ChunkRequirements);
}

/// `ensure-chunk-handlers`: loading chunks needs their URL
#[derive(Debug, Default)]
pub struct EnsureChunkListener;

impl RequirementListener for EnsureChunkListener {
    fn name(&self) -> &str {
        "ensure-chunk"
    }

    fn listens(&self) -> Listen {
        Listen::Requirement(RuntimeGlobals::ENSURE_CHUNK_HANDLERS)
    }

    fn handle(&self, _: &Compilation, _: ChunkUkey, requirements: &mut ChunkRequirements) {
        requirements.require_chunk_loading();
        requirements.add(RuntimeGlobals::PUBLIC_PATH | RuntimeGlobals::GET_CHUNK_SCRIPT_FILENAME);
    }
}

/// `hmr-download-update-handlers`: applying hot updates
#[derive(Debug, Default)]
pub struct HmrDownloadUpdateListener;

impl RequirementListener for HmrDownloadUpdateListener {
    fn name(&self) -> &str {
        "hmr-download-update"
    }

    fn listens(&self) -> Listen {
        Listen::Requirement(RuntimeGlobals::HMR_DOWNLOAD_UPDATE_HANDLERS)
    }

    fn handle(&self, _: &Compilation, _: ChunkUkey, requirements: &mut ChunkRequirements) {
        requirements.require_chunk_loading();
        requirements.add(
            RuntimeGlobals::PUBLIC_PATH
                | RuntimeGlobals::GET_CHUNK_UPDATE_SCRIPT_FILENAME
                | RuntimeGlobals::MODULE_CACHE
                | RuntimeGlobals::HMR_MODULE_DATA
                | RuntimeGlobals::GET_FULL_HASH,
        );
    }
}

/// `hmr-download-manifest`: fetching the hot update manifest
#[derive(Debug, Default)]
pub struct HmrDownloadManifestListener;

impl RequirementListener for HmrDownloadManifestListener {
    fn name(&self) -> &str {
        "hmr-download-manifest"
    }

    fn listens(&self) -> Listen {
        Listen::Requirement(RuntimeGlobals::HMR_DOWNLOAD_MANIFEST)
    }

    fn handle(&self, _: &Compilation, _: ChunkUkey, requirements: &mut ChunkRequirements) {
        requirements.require_chunk_loading();
        requirements.add(
            RuntimeGlobals::PUBLIC_PATH
                | RuntimeGlobals::GET_UPDATE_MANIFEST_FILENAME
                | RuntimeGlobals::GET_FULL_HASH,
        );
    }
}

/// Decides whether a chunk needs deferred-entry startup code
pub trait EntryDeferPolicy: Send + Sync {
    fn needs_defer(&self, compilation: &Compilation, chunk: &Chunk, ukey: ChunkUkey) -> bool;
}

/// Defer entries in runtime chunks whose entrypoint spans several chunks
#[derive(Debug, Default)]
pub struct SplitEntrypointPolicy;

impl EntryDeferPolicy for SplitEntrypointPolicy {
    fn needs_defer(&self, compilation: &Compilation, chunk: &Chunk, ukey: ChunkUkey) -> bool {
        chunk.has_runtime
            && compilation
                .chunk_graph()
                .entrypoints_of(ukey)
                .any(|ep| ep.runtime_chunk == ukey && ep.chunks.len() > 1)
    }
}

/// Tree-wide deferred-entry check
pub struct DeferredEntryListener {
    policy: Arc<dyn EntryDeferPolicy>,
}

impl DeferredEntryListener {
    pub fn new(policy: Arc<dyn EntryDeferPolicy>) -> Self {
        Self { policy }
    }
}

impl Default for DeferredEntryListener {
    fn default() -> Self {
        Self::new(Arc::new(SplitEntrypointPolicy))
    }
}

impl fmt::Debug for DeferredEntryListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredEntryListener").finish_non_exhaustive()
    }
}

impl RequirementListener for DeferredEntryListener {
    fn name(&self) -> &str {
        "deferred-entry"
    }

    fn listens(&self) -> Listen {
        Listen::Tree
    }

    fn handle(&self, compilation: &Compilation, ukey: ChunkUkey, requirements: &mut ChunkRequirements) {
        let with_defer = match compilation.chunk(ukey) {
            Ok(chunk) => self.policy.needs_defer(compilation, chunk, ukey),
            Err(_) => false,
        };

        if with_defer {
            requirements.add(RuntimeGlobals::STARTUP | RuntimeGlobals::STARTUP_NO_DEFAULT);
            requirements.require_chunk_loading();
        }
        // kept as a second gate on the same condition
        if with_defer {
            requirements.add(RuntimeGlobals::REQUIRE);
        }
    }
}

/// Runs listeners over a chunk until its capability set stops growing
pub struct Propagator {
    listeners: Vec<Box<dyn RequirementListener>>,
}

impl Propagator {
    /// Propagator with an explicit listener list, run in the given order
    pub fn new(listeners: Vec<Box<dyn RequirementListener>>) -> Self {
        Self { listeners }
    }

    /// Default listeners with a custom deferred-entry policy
    pub fn with_policy(policy: Arc<dyn EntryDeferPolicy>) -> Self {
        Self::new(vec![
            Box::new(EnsureChunkListener),
            Box::new(HmrDownloadUpdateListener),
            Box::new(HmrDownloadManifestListener),
            Box::new(DeferredEntryListener::new(policy)),
        ])
    }

    /// Propagate one chunk and store its final set
    ///
    /// A runtime chunk gets chunk loading attached when requested. Any other
    /// chunk hands its set to its runtime chunks, which are propagated in turn.
    pub fn propagate(&self, compilation: &Compilation, ukey: ChunkUkey) -> Result<RuntimeGlobals> {
        self.propagate_chunk(compilation, ukey, false)
    }

    fn propagate_chunk(
        &self,
        compilation: &Compilation,
        ukey: ChunkUkey,
        inherited_loading: bool,
    ) -> Result<RuntimeGlobals> {
        let chunk = compilation.chunk(ukey)?;
        let requirements = self.run_listeners(compilation, ukey);
        let set = requirements.set();
        compilation.add_runtime_requirements(ukey, set);
        debug!("Chunk {} requires [{}]", ukey, set);

        let chunk_loading = inherited_loading || requirements.chunk_loading();

        if !chunk.has_runtime {
            if !set.is_empty() || chunk_loading {
                for runtime in compilation.chunk_graph().runtime_chunks_for(ukey) {
                    debug!("Hoisting requirements of chunk {} into {}", ukey, runtime);
                    compilation.add_runtime_requirements(runtime, set);
                    self.propagate_chunk(compilation, runtime, chunk_loading)?;
                }
            }
            return Ok(set);
        }

        if chunk_loading {
            let hooks = compilation.chunk_loading_hooks();
            let attached = compilation.attach_runtime_module_once(ukey, || {
                Arc::new(JsonpChunkLoadingRuntimeModule::new(ukey, hooks))
            });
            if attached {
                debug!("Attached chunk loading to chunk {}", ukey);
            }
        }

        Ok(set)
    }

    /// Run listeners until the chunk's set stops growing
    fn run_listeners(&self, compilation: &Compilation, ukey: ChunkUkey) -> ChunkRequirements {
        let mut requirements = ChunkRequirements::new(compilation.runtime_requirements(ukey));
        loop {
            let before = requirements.set();
            for listener in &self.listeners {
                let applies = match listener.listens() {
                    Listen::Requirement(flag) => requirements.contains(flag),
                    Listen::Tree => true,
                };
                if applies {
                    listener.handle(compilation, ukey, &mut requirements);
                }
            }
            if requirements.set() == before {
                break;
            }
        }
        requirements
    }

    /// Propagate every chunk in graph order
    pub fn propagate_all(&self, compilation: &Compilation) -> Result<()> {
        for ukey in compilation.chunk_graph().ukeys() {
            self.propagate(compilation, ukey)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl Default for Propagator {
    fn default() -> Self {
        Self::with_policy(Arc::new(SplitEntrypointPolicy))
    }
}

impl fmt::Debug for Propagator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.listeners.iter().map(|l| l.name()).collect();
        f.debug_struct("Propagator").field("listeners", &names).finish()
    }
}
