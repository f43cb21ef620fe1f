//! Error types for chunk-loading runtime generation

use thiserror::Error;

use crate::chunk::ChunkUkey;

/// Errors raised while generating chunk-loading code
#[derive(Debug, Error)]
pub enum Error {
    /// Hook lookup was handed something that is not a compilation
    #[error("chunk loading hooks can only be requested for a Compilation")]
    InvalidCompilation,

    /// A chunk key does not belong to the compilation's chunk graph
    #[error("unknown chunk {0}")]
    UnknownChunk(ChunkUkey),

    /// Hot-update chunks target exactly one concrete chunk
    #[error("hot update chunk {chunk} must carry exactly one id, found {count}")]
    HotUpdateIds { chunk: String, count: usize },

    /// A runtime requirement name did not match any known capability
    #[error("unknown runtime requirement `{0}`")]
    UnknownRequirement(String),

    /// JSON serialization of an emitted literal failed
    #[error("failed to serialize {what}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub(crate) fn serialize(what: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| Error::Serialize { what, source }
    }
}

/// Result alias for the library
pub type Result<T> = std::result::Result<T, Error>;
