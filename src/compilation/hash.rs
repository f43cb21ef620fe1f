//! Content hashing
//!
//! A chunk's hash must change whenever anything that shapes its emitted
//! wrapper changes, not only its modules.

use sha2::{Digest, Sha256};

use super::Compilation;
use crate::chunk::{ChunkGraph, ChunkUkey};
use crate::config::OutputOptions;
use crate::error::{Error, Result};
use crate::utils::hash_content;

/// Component tag folded into every non-runtime chunk hash
pub const HASH_COMPONENT: &str = "ComponentJsonpChunkLoading";

/// Bumped whenever the wire format changes
pub const HASH_FORMAT_VERSION: &str = "1";

fn update_part(hasher: &mut Sha256, part: &str) {
    hasher.update(part.as_bytes());
    hasher.update([0u8]);
}

/// Fold the chunk-loading configuration into a chunk's hash
///
/// Runtime chunks are skipped: `Compilation::chunk_hash` folds their whole
/// output configuration in instead.
pub fn update_chunk_hash(
    graph: &ChunkGraph,
    options: &OutputOptions,
    ukey: ChunkUkey,
    hasher: &mut Sha256,
) -> Result<()> {
    let chunk = graph.chunk(ukey).ok_or(Error::UnknownChunk(ukey))?;
    if chunk.has_runtime {
        return Ok(());
    }

    let entries = serde_json::to_string(&graph.entry_info(ukey)).map_err(Error::serialize("entries"))?;

    update_part(hasher, HASH_COMPONENT);
    update_part(hasher, HASH_FORMAT_VERSION);
    update_part(hasher, &entries);
    update_part(hasher, &options.chunk_loading_global);
    update_part(hasher, &options.hot_update_global);
    update_part(hasher, &options.global_object);

    Ok(())
}

impl Compilation {
    /// Hash of a chunk's modules plus its chunk-loading configuration
    pub fn chunk_hash(&self, ukey: ChunkUkey) -> Result<String> {
        let chunk = self.chunk(ukey)?;

        let mut hasher = Sha256::new();
        for module in &chunk.modules {
            update_part(&mut hasher, &module.id);
            update_part(&mut hasher, &module.code);
        }
        update_chunk_hash(self.chunk_graph(), self.options(), ukey, &mut hasher)?;
        if chunk.has_runtime {
            self.update_runtime_hash(ukey, &mut hasher)?;
        }
        for module in self.runtime_modules_for(ukey) {
            update_part(&mut hasher, module.name());
            update_part(&mut hasher, &module.hash_source(self)?);
        }

        Ok(hash_content(&hasher.finalize()))
    }

    /// Everything the bootstrap embeds besides the full hash and runtime modules
    fn update_runtime_hash(&self, ukey: ChunkUkey, hasher: &mut Sha256) -> Result<()> {
        let graph = self.chunk_graph();
        let options = serde_json::to_string(self.options()).map_err(Error::serialize("output options"))?;
        let entries = serde_json::to_string(&graph.entry_info(ukey)).map_err(Error::serialize("entries"))?;

        update_part(hasher, &options);
        update_part(hasher, &self.runtime_requirements(ukey).bits().to_string());
        update_part(hasher, &entries);

        // chunk ids, names and the deferred dependency table are baked in
        for other in graph.ukeys().filter_map(|other| graph.chunk(other)) {
            let ids = serde_json::to_string(&other.ids).map_err(Error::serialize("chunk ids"))?;
            update_part(hasher, &ids);
            update_part(hasher, other.name.as_deref().unwrap_or_default());
            update_part(hasher, if other.has_runtime { "runtime" } else { "" });
        }
        for ep in graph.entrypoints_of(ukey) {
            let chunks: Vec<String> = ep.chunks.iter().map(ChunkUkey::to_string).collect();
            update_part(hasher, &ep.name);
            update_part(hasher, &chunks.join(","));
        }

        Ok(())
    }

    /// Hash over every chunk hash, in graph order
    pub fn full_hash(&self) -> Result<String> {
        let mut combined = String::new();
        for ukey in self.chunk_graph().ukeys() {
            combined.push_str(&self.chunk_hash(ukey)?);
        }
        Ok(hash_content(combined.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::chunk::{Chunk, ChunkModule, Entrypoint};
    use crate::runtime::{Propagator, RuntimeGlobals};

    fn graph(code: &str, with_entry: bool) -> (ChunkGraph, ChunkUkey) {
        let mut graph = ChunkGraph::new();
        let runtime = graph.add_chunk(Chunk::runtime("runtime", vec![]));
        let main = graph.add_chunk(Chunk::new("main", vec![ChunkModule::new("./main.js", code)]));
        if with_entry {
            graph.add_entrypoint(
                Entrypoint::new("main", main, vec!["./main.js".to_string()]).with_runtime(runtime),
            );
        }
        (graph, main)
    }

    fn contribution(graph: &ChunkGraph, options: &OutputOptions, ukey: ChunkUkey) -> String {
        let mut hasher = Sha256::new();
        update_chunk_hash(graph, options, ukey, &mut hasher).unwrap();
        hex::encode(hasher.finalize())
    }

    #[test]
    fn test_contribution_tracks_loading_configuration() {
        let (graph, main) = graph("", false);
        let base = contribution(&graph, &OutputOptions::default(), main);

        let queue = OutputOptions {
            chunk_loading_global: "otherChunk".to_string(),
            ..OutputOptions::default()
        };
        let hot = OutputOptions {
            hot_update_global: "otherHot".to_string(),
            ..OutputOptions::default()
        };
        let global = OutputOptions {
            global_object: "window".to_string(),
            ..OutputOptions::default()
        };
        let unrelated = OutputOptions {
            public_path: "/static/".to_string(),
            ..OutputOptions::default()
        };

        assert_ne!(base, contribution(&graph, &queue, main));
        assert_ne!(base, contribution(&graph, &hot, main));
        assert_ne!(base, contribution(&graph, &global, main));
        assert_eq!(base, contribution(&graph, &unrelated, main));
    }

    #[test]
    fn test_contribution_tracks_entry_info_not_code() {
        let options = OutputOptions::default();
        let (plain, main) = graph("a", false);
        let (changed_code, _) = graph("b", false);
        let (with_entry, _) = graph("a", true);

        let base = contribution(&plain, &options, main);
        assert_eq!(base, contribution(&changed_code, &options, main));
        assert_ne!(base, contribution(&with_entry, &options, main));
    }

    #[test]
    fn test_runtime_chunk_contributes_nothing() {
        let (graph, _) = graph("", true);
        let runtime = graph.chunk_by_id(&"runtime".into()).unwrap();
        let empty = hex::encode(Sha256::new().finalize());
        assert_eq!(contribution(&graph, &OutputOptions::default(), runtime), empty);
    }

    fn runtime_hash(options: OutputOptions) -> String {
        let (graph, _) = graph("a", true);
        let runtime = graph.chunk_by_id(&"runtime".into()).unwrap();
        let compilation = Compilation::new(options, graph);
        compilation.add_runtime_requirements(runtime, RuntimeGlobals::ENSURE_CHUNK_HANDLERS);
        Propagator::default().propagate_all(&compilation).unwrap();
        compilation.chunk_hash(runtime).unwrap()
    }

    #[test]
    fn test_runtime_chunk_hash_tracks_output_options() {
        let base = runtime_hash(OutputOptions::default());
        assert_eq!(base, runtime_hash(OutputOptions::default()));

        let queue_and_timeout = OutputOptions {
            chunk_loading_global: "otherChunk".to_string(),
            chunk_load_timeout: Duration::from_secs(5),
            ..OutputOptions::default()
        };
        let public_path = OutputOptions {
            public_path: "/static/".to_string(),
            ..OutputOptions::default()
        };
        let nonce = OutputOptions {
            nonce: Some("window.__nonce__".to_string()),
            ..OutputOptions::default()
        };

        assert_ne!(base, runtime_hash(queue_and_timeout));
        assert_ne!(base, runtime_hash(public_path));
        assert_ne!(base, runtime_hash(nonce));
    }

    #[test]
    fn test_runtime_chunk_hash_tracks_hook_output() {
        let (graph, _) = graph("a", true);
        let runtime = graph.chunk_by_id(&"runtime".into()).unwrap();
        let compilation = Compilation::new(OutputOptions::default(), graph);
        compilation.add_runtime_requirements(runtime, RuntimeGlobals::ENSURE_CHUNK_HANDLERS);
        Propagator::default().propagate_all(&compilation).unwrap();
        let before = compilation.chunk_hash(runtime).unwrap();

        compilation
            .chunk_loading_hooks()
            .build_script_tag
            .tap("marker", |code: String, _: &Chunk, _: &str| format!("{}\n// marker", code));

        assert_ne!(before, compilation.chunk_hash(runtime).unwrap());
        // the full hash still resolves once the runtime hash covers its modules
        assert_eq!(compilation.full_hash().unwrap().len(), 16);
    }

    #[test]
    fn test_chunk_and_full_hash() {
        let (graph, main) = graph("a", false);
        let compilation = Compilation::new(OutputOptions::default(), graph);
        let (other, _) = self::graph("b", false);
        let other = Compilation::new(OutputOptions::default(), other);

        let hash = compilation.chunk_hash(main).unwrap();
        assert_eq!(hash.len(), 16);
        assert_eq!(hash, compilation.chunk_hash(main).unwrap());
        assert_ne!(hash, other.chunk_hash(main).unwrap());
        assert_ne!(compilation.full_hash().unwrap(), other.full_hash().unwrap());
    }
}
