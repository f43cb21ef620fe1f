//! Render command implementation

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use futures_util::future::try_join_all;
use tracing::{debug, info};

use crate::chunk::{Chunk, ChunkGraph, ChunkId, ChunkModule, ChunkUkey, Entrypoint};
use crate::compilation::{Compilation, RenderedChunk};
use crate::config::{ChunkConfig, Config, ModuleConfig};
use crate::plugins::PluginManager;
use crate::runtime::{Propagator, RuntimeGlobals};
use crate::utils::{format_duration, format_size};

/// Render chunk-loading code for every chunk in the config
#[derive(Args, Debug)]
pub struct RenderCommand {
    /// Only render the chunk with this id
    #[arg(long)]
    pub chunk: Option<String>,

    /// Print `<hash> <filename>` lines instead of code
    #[arg(long)]
    pub hashes_only: bool,
}

impl RenderCommand {
    pub async fn execute(&self, config_path: &str) -> Result<()> {
        let start = Instant::now();

        info!("Loading configuration from {}", config_path);
        let config = Config::load(config_path)?;

        eprintln!("{} Rendering chunks...", "→".blue());

        let compilation = compile(&config).await?;

        let rendered = match &self.chunk {
            Some(id) => {
                let ukey = find_chunk(compilation.chunk_graph(), id)
                    .with_context(|| format!("No chunk with id '{}'", id))?;
                vec![compilation.render_chunk(ukey)?]
            }
            None => compilation.render_all()?,
        };

        for chunk in &rendered {
            print_chunk(chunk, self.hashes_only);
        }

        eprintln!(
            "\n{} Rendered {} chunk(s) in {}\n",
            "✓".green().bold(),
            rendered.len(),
            format_duration(start.elapsed())
        );

        for chunk in &rendered {
            eprintln!(
                "  {} {} {} {}",
                "•".dimmed(),
                chunk.filename.cyan(),
                format_size(chunk.code.len()).dimmed(),
                compilation.runtime_requirements(chunk.ukey).to_string().dimmed()
            );
        }

        eprintln!();

        Ok(())
    }
}

fn print_chunk(chunk: &RenderedChunk, hashes_only: bool) {
    if hashes_only {
        println!("{} {}", chunk.hash, chunk.filename);
    } else {
        println!("// {} [{}]\n{}\n", chunk.filename, chunk.hash, chunk.code);
    }
}

/// Look a chunk up by its id as typed on the command line
fn find_chunk(graph: &ChunkGraph, id: &str) -> Option<ChunkUkey> {
    id.parse::<u64>()
        .ok()
        .and_then(|n| graph.chunk_by_id(&ChunkId::Number(n)))
        .or_else(|| graph.chunk_by_id(&ChunkId::from(id)))
}

/// Build a compilation from configuration, with plugins applied and
/// requirements propagated
pub async fn compile(config: &Config) -> Result<Compilation> {
    let graph = load_graph(config).await?;
    let compilation = Compilation::new(config.output.clone(), graph);
    info!("Compiling {} chunk(s) as {}", compilation.chunk_graph().len(), compilation.id());

    for (chunk, ukey) in config.chunks.iter().zip(compilation.chunk_graph().ukeys()) {
        let seed = RuntimeGlobals::from_names(&chunk.requirements)?;
        compilation.add_runtime_requirements(ukey, seed);
    }

    let plugins = PluginManager::from_config(&config.plugins)?;
    debug!("Applying {} plugin(s)", plugins.len());
    plugins.apply(&compilation)?;

    Propagator::default().propagate_all(&compilation)?;

    Ok(compilation)
}

/// Read module sources and assemble the chunk graph
pub async fn load_graph(config: &Config) -> Result<ChunkGraph> {
    let chunks = try_join_all(config.chunks.iter().map(|chunk| load_chunk(config, chunk))).await?;

    let mut graph = ChunkGraph::new();
    for chunk in chunks {
        graph.add_chunk(chunk);
    }

    for entrypoint in &config.entrypoints {
        let ukey = |id: &ChunkId| {
            graph
                .chunk_by_id(id)
                .with_context(|| format!("Entrypoint '{}' references undeclared chunk '{}'", entrypoint.name, id))
        };

        let mut ep = Entrypoint::new(&entrypoint.name, ukey(&entrypoint.chunk)?, entrypoint.modules.clone());
        if let Some(runtime) = &entrypoint.runtime {
            ep = ep.with_runtime(ukey(runtime)?);
        }
        let extra = entrypoint.chunks.iter().map(ukey).collect::<Result<Vec<_>>>()?;
        graph.add_entrypoint(ep.with_chunks(extra));
    }

    Ok(graph)
}

async fn load_chunk(config: &Config, chunk: &ChunkConfig) -> Result<Chunk> {
    let modules = try_join_all(chunk.modules.iter().map(|module| load_module(config, module))).await?;

    let mut loaded = if chunk.hot_update {
        Chunk::hot_update(chunk.id.clone(), modules)
    } else if chunk.runtime {
        Chunk::runtime(chunk.id.clone(), modules)
    } else {
        Chunk::new(chunk.id.clone(), modules)
    };
    loaded = loaded.with_ids(chunk.ids.clone());
    if let Some(name) = &chunk.name {
        loaded = loaded.with_name(name);
    }

    debug!("Loaded chunk {} with {} module(s)", loaded.id, loaded.len());
    Ok(loaded)
}

async fn load_module(config: &Config, module: &ModuleConfig) -> Result<ChunkModule> {
    let code = match (&module.code, &module.path) {
        (Some(code), _) => code.clone(),
        (None, Some(path)) => {
            let path = config.module_path(path);
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read module {}", path.display()))?
        }
        (None, None) => anyhow::bail!("Module '{}' has neither `code` nor `path`", module.id),
    };

    Ok(ChunkModule::new(module.id.clone(), code))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[[chunks]]
id = "runtime"
runtime = true

[[chunks]]
id = "main"
requirements = ["ensure-chunk-handlers"]
modules = [{ id = "./src/main.js", path = "src/main.js" }]

[[chunks]]
id = 4
ids = [4, 5]
modules = [{ id = "./src/lazy.js", code = "module.exports = 1;" }]

[[entrypoints]]
name = "main"
chunk = "main"
runtime = "runtime"
modules = ["./src/main.js"]
"#;

    fn config(dir: &tempfile::TempDir) -> Config {
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.js"), "__component_require__.e(4);").unwrap();

        let mut config = Config::parse(CONFIG).unwrap();
        config.root = dir.path().to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_load_graph_reads_module_files() {
        let dir = tempfile::tempdir().unwrap();
        let graph = load_graph(&config(&dir)).await.unwrap();

        assert_eq!(graph.len(), 3);
        let main = graph.chunk_by_id(&"main".into()).unwrap();
        assert_eq!(graph.chunk(main).unwrap().modules[0].code, "__component_require__.e(4);");

        let lazy = graph.chunk(find_chunk(&graph, "4").unwrap()).unwrap();
        assert_eq!(lazy.ids, vec![ChunkId::Number(4), ChunkId::Number(5)]);

        let ep = &graph.entrypoints()[0];
        assert_eq!(ep.runtime_chunk, graph.chunk_by_id(&"runtime".into()).unwrap());
    }

    #[tokio::test]
    async fn test_missing_module_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::parse(CONFIG).unwrap();
        config.root = dir.path().to_path_buf();

        let err = load_graph(&config).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read module"));
    }

    #[tokio::test]
    async fn test_compile_seeds_and_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let compilation = compile(&config(&dir)).await.unwrap();
        let graph = compilation.chunk_graph();

        let main = graph.chunk_by_id(&"main".into()).unwrap();
        let runtime = graph.chunk_by_id(&"runtime".into()).unwrap();
        assert!(compilation
            .runtime_requirements(runtime)
            .contains(RuntimeGlobals::PUBLIC_PATH | RuntimeGlobals::GET_CHUNK_SCRIPT_FILENAME));
        assert!(compilation.runtime_modules_for(main).is_empty());
        assert_eq!(compilation.runtime_modules_for(runtime).len(), 1);

        let code = compilation.render_chunk(main).unwrap().code;
        assert!(code.starts_with("(self[\"componentChunk\"]=self[\"componentChunk\"]||[]).push([[\"main\"],"));
        assert!(code.ends_with(",[[\"./src/main.js\",true]]])"), "{}", code);

        let bootstrap = compilation.render_chunk(runtime).unwrap().code;
        assert!(bootstrap.contains("\t__component_require__.f = {};"));
        assert!(bootstrap.contains("__component_require__.f.j = function(chunkId, promises) {"));
        assert!(bootstrap.contains("__component_require__.x([\"./src/main.js\"])"));
    }
}
