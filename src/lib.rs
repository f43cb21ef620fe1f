//! Component Reborn chunk loading
//!
//! Generates the browser runtime that installs split chunks and hot updates
//! delivered over a global jsonp-style queue.
//!
//! # Features
//! - Chunk wire format for normal and hot-update chunks
//! - Script loading with at-most-once completion, timeouts and nonces
//! - Runtime requirement propagation with a once-per-chunk runtime module
//! - Waterfall hooks letting plugins rewrite generated tags and code
//! - Content hashes that track the chunk-loading configuration

pub mod chunk;
pub mod cli;
pub mod compilation;
pub mod config;
pub mod error;
pub mod plugins;
pub mod runtime;
pub mod utils;

pub use chunk::{Chunk, ChunkGraph, ChunkId, ChunkModule, ChunkUkey, Entrypoint};
pub use cli::Cli;
pub use compilation::{Compilation, RenderedChunk};
pub use config::{Config, OutputOptions};
pub use error::{Error, Result};
pub use plugins::{get_hooks, ChunkLoadingHooks, Plugin, PluginManager};
pub use runtime::{Propagator, RuntimeGlobals, RuntimeModule};
