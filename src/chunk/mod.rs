//! Chunks: the deployable output units whose loading code we generate

mod graph;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use graph::{ChunkGraph, EntryInfo, EntryModules, Entrypoint};

/// Identifier of a module inside the module map
pub type ModuleId = String;

/// Index of a chunk inside its [`ChunkGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkUkey(pub(crate) usize);

impl fmt::Display for ChunkUkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable chunk identifier as it appears in emitted code
///
/// Numeric ids serialize as JSON numbers, named ids as JSON strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkId {
    Number(u64),
    Name(String),
}

impl ChunkId {
    /// The id as a JavaScript literal
    pub fn to_js(&self) -> String {
        match self {
            ChunkId::Number(n) => n.to_string(),
            ChunkId::Name(name) => {
                serde_json::to_string(name).unwrap_or_else(|_| format!("\"{}\"", name))
            }
        }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkId::Number(n) => write!(f, "{}", n),
            ChunkId::Name(name) => f.write_str(name),
        }
    }
}

impl From<u64> for ChunkId {
    fn from(n: u64) -> Self {
        ChunkId::Number(n)
    }
}

impl From<&str> for ChunkId {
    fn from(name: &str) -> Self {
        ChunkId::Name(name.to_string())
    }
}

impl From<String> for ChunkId {
    fn from(name: String) -> Self {
        ChunkId::Name(name)
    }
}

/// A module's already-compiled factory body, opaque to the generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkModule {
    pub id: ModuleId,
    pub code: String,
}

impl ChunkModule {
    pub fn new(id: impl Into<ModuleId>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
        }
    }
}

/// A chunk is a group of modules delivered to the browser together
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Primary identifier
    pub id: ChunkId,

    /// All ids this chunk answers to; more than one when logical chunks were merged
    pub ids: Vec<ChunkId>,

    /// Optional human-readable name
    pub name: Option<String>,

    /// Whether this chunk bootstraps the module system itself
    pub has_runtime: bool,

    /// Whether this chunk is an incremental hot update
    pub is_hot_update: bool,

    /// Modules carried by this chunk, in emission order
    pub modules: Vec<ChunkModule>,
}

impl Chunk {
    /// Create a regular on-demand chunk
    pub fn new(id: impl Into<ChunkId>, modules: Vec<ChunkModule>) -> Self {
        let id = id.into();
        Self {
            ids: vec![id.clone()],
            id,
            name: None,
            has_runtime: false,
            is_hot_update: false,
            modules,
        }
    }

    /// Create the chunk that carries the runtime bootstrap
    pub fn runtime(id: impl Into<ChunkId>, modules: Vec<ChunkModule>) -> Self {
        Self {
            has_runtime: true,
            ..Self::new(id, modules)
        }
    }

    /// Create a hot-update chunk targeting one concrete chunk
    pub fn hot_update(id: impl Into<ChunkId>, modules: Vec<ChunkModule>) -> Self {
        Self {
            is_hot_update: true,
            ..Self::new(id, modules)
        }
    }

    /// Replace the id set, for chunks that merge several logical chunks
    pub fn with_ids(mut self, ids: Vec<ChunkId>) -> Self {
        if !ids.is_empty() {
            self.ids = ids;
        }
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name if present, otherwise the id
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }

    /// Check if chunk has no modules
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Number of modules in chunk
    pub fn len(&self) -> usize {
        self.modules.len()
    }
}
