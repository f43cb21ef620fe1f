//! Configuration handling
//!
//! Parses and validates chunks.toml: output options plus the chunk graph to render.

mod schema;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::runtime::RuntimeGlobals;

pub use schema::*;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Output options shaping the generated runtime
    #[serde(default)]
    pub output: OutputOptions,

    /// Chunks to render
    #[serde(default)]
    pub chunks: Vec<ChunkConfig>,

    /// Entrypoints over those chunks
    #[serde(default)]
    pub entrypoints: Vec<EntrypointConfig>,

    /// Plugin configuration
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,
}

impl Config {
    /// Load configuration from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let canonical_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let content = fs::read_to_string(&canonical_path)
            .with_context(|| format!("Failed to read config file: {}", canonical_path.display()))?;

        let mut config = Self::parse(&content)?;

        // Set root directory to the directory containing the config file
        config.root = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse chunks.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        let output = &self.output;

        if output.chunk_loading_global == output.hot_update_global {
            anyhow::bail!(
                "output.chunk_loading_global and output.hot_update_global must differ (both are '{}')",
                output.chunk_loading_global
            );
        }

        if output.chunk_load_timeout.is_zero() {
            anyhow::bail!("output.chunk_load_timeout must be greater than zero");
        }

        let mut seen = HashSet::new();
        let mut owners = HashMap::new();
        for chunk in &self.chunks {
            if !seen.insert(&chunk.id) {
                anyhow::bail!("Chunk '{}' is declared more than once", chunk.id);
            }

            let ids = if chunk.ids.is_empty() {
                std::slice::from_ref(&chunk.id)
            } else {
                chunk.ids.as_slice()
            };
            for id in ids {
                if let Some(owner) = owners.insert(id, &chunk.id) {
                    if owner != &chunk.id {
                        anyhow::bail!("Chunk id '{}' is claimed by both '{}' and '{}'", id, owner, chunk.id);
                    }
                }
            }

            if chunk.hot_update && chunk.ids.len() > 1 {
                anyhow::bail!(
                    "Hot update chunk '{}' must carry exactly one id, found {}",
                    chunk.id,
                    chunk.ids.len()
                );
            }

            for name in &chunk.requirements {
                RuntimeGlobals::from_tag_name(name)
                    .with_context(|| format!("Invalid requirement on chunk '{}'", chunk.id))?;
            }

            for module in &chunk.modules {
                if module.code.is_some() == module.path.is_some() {
                    anyhow::bail!(
                        "Module '{}' in chunk '{}' needs exactly one of `code` or `path`",
                        module.id,
                        chunk.id
                    );
                }
            }
        }

        for entrypoint in &self.entrypoints {
            let referenced = std::iter::once(&entrypoint.chunk)
                .chain(entrypoint.runtime.iter())
                .chain(entrypoint.chunks.iter());

            for id in referenced {
                if !seen.contains(id) {
                    anyhow::bail!(
                        "Entrypoint '{}' references undeclared chunk '{}'",
                        entrypoint.name,
                        id
                    );
                }
            }

            let runtime = entrypoint.runtime.as_ref().unwrap_or(&entrypoint.chunk);
            if !self.chunks.iter().any(|chunk| &chunk.id == runtime && chunk.runtime) {
                anyhow::bail!(
                    "Entrypoint '{}' uses chunk '{}' as its runtime, but that chunk is not declared with `runtime = true`",
                    entrypoint.name,
                    runtime
                );
            }
        }

        Ok(())
    }

    /// Resolve a module path relative to the config root
    pub fn module_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}
