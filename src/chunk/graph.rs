//! Chunk graph data structures

use std::collections::HashMap;

use serde::ser::{Serialize, SerializeTuple, Serializer};

use super::{Chunk, ChunkId, ChunkUkey, ModuleId};

/// An entrypoint groups the chunks that must be present before its modules run
#[derive(Debug, Clone)]
pub struct Entrypoint {
    /// Entrypoint name
    pub name: String,

    /// Every chunk of the entrypoint, runtime chunk first
    pub chunks: Vec<ChunkUkey>,

    /// Chunk holding the entry modules
    pub entry_chunk: ChunkUkey,

    /// Chunk holding the runtime bootstrap
    pub runtime_chunk: ChunkUkey,

    /// Modules executed once the entrypoint is loaded
    pub modules: Vec<ModuleId>,
}

impl Entrypoint {
    /// Create an entrypoint whose entry chunk also carries the runtime
    pub fn new(name: impl Into<String>, entry_chunk: ChunkUkey, modules: Vec<ModuleId>) -> Self {
        Self {
            name: name.into(),
            chunks: vec![entry_chunk],
            entry_chunk,
            runtime_chunk: entry_chunk,
            modules,
        }
    }

    /// Move the runtime into a separate chunk
    pub fn with_runtime(mut self, runtime_chunk: ChunkUkey) -> Self {
        self.runtime_chunk = runtime_chunk;
        self
    }

    /// Add further initial chunks (shared/vendor chunks)
    pub fn with_chunks(mut self, chunks: Vec<ChunkUkey>) -> Self {
        self.chunks.extend(chunks);
        self
    }

    fn normalize(&mut self) {
        let mut chunks = vec![self.runtime_chunk];
        for ukey in self.chunks.drain(..).chain(std::iter::once(self.entry_chunk)) {
            if !chunks.contains(&ukey) {
                chunks.push(ukey);
            }
        }
        self.chunks = chunks;
    }
}

/// Module id, or ids, an entry runs
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum EntryModules {
    One(ModuleId),
    Many(Vec<ModuleId>),
}

/// What must run once a chunk finishes loading
///
/// Serialized as the pair `[modules, runtime]`. `runtime` is set when the
/// entrypoint spans more than one chunk: the runtime then defers the entry
/// until every chunk in its dependency table is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub modules: EntryModules,
    pub runtime: bool,
}

impl Serialize for EntryInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.modules)?;
        tuple.serialize_element(&self.runtime)?;
        tuple.end()
    }
}

/// The chunk dependency graph
///
/// Read-only once rendering begins: generation only queries it.
#[derive(Debug, Default)]
pub struct ChunkGraph {
    /// All chunks indexed by their key
    chunks: Vec<Chunk>,

    /// Map from chunk id to key
    id_to_ukey: HashMap<ChunkId, ChunkUkey>,

    /// Entrypoints in declaration order
    entrypoints: Vec<Entrypoint>,
}

impl ChunkGraph {
    /// Create a new empty chunk graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk to the graph
    pub fn add_chunk(&mut self, chunk: Chunk) -> ChunkUkey {
        if let Some(&ukey) = self.id_to_ukey.get(&chunk.id) {
            return ukey;
        }

        let ukey = ChunkUkey(self.chunks.len());
        self.id_to_ukey.insert(chunk.id.clone(), ukey);
        self.chunks.push(chunk);

        ukey
    }

    /// Register an entrypoint
    pub fn add_entrypoint(&mut self, mut entrypoint: Entrypoint) {
        entrypoint.normalize();
        self.entrypoints.push(entrypoint);
    }

    /// Get a chunk by key
    pub fn chunk(&self, ukey: ChunkUkey) -> Option<&Chunk> {
        self.chunks.get(ukey.0)
    }

    /// Get chunk key from id
    pub fn chunk_by_id(&self, id: &ChunkId) -> Option<ChunkUkey> {
        self.id_to_ukey.get(id).copied()
    }

    /// All chunk keys in insertion order
    pub fn ukeys(&self) -> impl Iterator<Item = ChunkUkey> {
        (0..self.chunks.len()).map(ChunkUkey)
    }

    pub fn entrypoints(&self) -> &[Entrypoint] {
        &self.entrypoints
    }

    /// Entrypoints the chunk takes part in
    pub fn entrypoints_of(&self, ukey: ChunkUkey) -> impl Iterator<Item = &Entrypoint> {
        self.entrypoints
            .iter()
            .filter(move |ep| ep.chunks.contains(&ukey))
    }

    /// Runtime chunks whose bootstrap serves this chunk
    ///
    /// The runtime chunks of the chunk's entrypoints, or every runtime chunk
    /// when it belongs to none (on-demand and hot-update chunks).
    pub fn runtime_chunks_for(&self, ukey: ChunkUkey) -> Vec<ChunkUkey> {
        let is_runtime = |candidate: ChunkUkey| {
            candidate != ukey && self.chunk(candidate).is_some_and(|chunk| chunk.has_runtime)
        };

        let mut runtimes = Vec::new();
        for ep in self.entrypoints_of(ukey) {
            if is_runtime(ep.runtime_chunk) && !runtimes.contains(&ep.runtime_chunk) {
                runtimes.push(ep.runtime_chunk);
            }
        }
        if runtimes.is_empty() {
            runtimes = self.ukeys().filter(|&candidate| is_runtime(candidate)).collect();
        }
        runtimes
    }

    /// Entry info for every entrypoint whose entry modules live in this chunk
    pub fn entry_info(&self, ukey: ChunkUkey) -> Vec<EntryInfo> {
        self.entrypoints_of(ukey)
            .filter(|ep| ep.entry_chunk == ukey && !ep.modules.is_empty())
            .map(|ep| EntryInfo {
                modules: match ep.modules.as_slice() {
                    [single] => EntryModules::One(single.clone()),
                    many => EntryModules::Many(many.to_vec()),
                },
                runtime: ep.chunks.len() > 1,
            })
            .collect()
    }

    /// Total number of chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Check if graph is empty
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
