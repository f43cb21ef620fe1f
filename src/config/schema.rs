//! Configuration schema definitions

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chunk::{ChunkId, ModuleId};

/// Cross-origin policy applied to chunk requests served from another origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossOriginLoading {
    Anonymous,
    UseCredentials,
}

impl CrossOriginLoading {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrossOriginLoading::Anonymous => "anonymous",
            CrossOriginLoading::UseCredentials => "use-credentials",
        }
    }
}

/// Output options that shape the generated runtime
///
/// Immutable for the lifetime of a compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputOptions {
    /// Expression evaluating to the global object (`self`, `window`, `globalThis`)
    #[serde(default = "default_global_object")]
    pub global_object: String,

    /// Global array normal chunks push themselves onto
    #[serde(default = "default_chunk_loading_global")]
    pub chunk_loading_global: String,

    /// Global function hot-update chunks call
    #[serde(default = "default_hot_update_global")]
    pub hot_update_global: String,

    /// `type` attribute of created script elements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_type: Option<String>,

    /// Emit `charset = 'utf-8'` on created elements
    #[serde(default = "default_true")]
    pub charset: bool,

    /// Time after which a pending chunk request fails with `timeout`
    #[serde(default = "default_chunk_load_timeout", with = "millis")]
    pub chunk_load_timeout: Duration,

    /// Cross-origin policy for chunks served from another origin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_origin_loading: Option<CrossOriginLoading>,

    /// Expression yielding a CSP nonce for created elements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Public URL prefix chunk filenames are resolved against
    #[serde(default = "default_public_path")]
    pub public_path: String,

    /// Filename template for on-demand chunks
    #[serde(default = "default_chunk_filename")]
    pub chunk_filename: String,

    /// Filename template for hot-update chunks
    #[serde(default = "default_hot_update_chunk_filename")]
    pub hot_update_chunk_filename: String,

    /// Filename template for the hot-update manifest
    #[serde(default = "default_hot_update_main_filename")]
    pub hot_update_main_filename: String,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            global_object: default_global_object(),
            chunk_loading_global: default_chunk_loading_global(),
            hot_update_global: default_hot_update_global(),
            script_type: None,
            charset: true,
            chunk_load_timeout: default_chunk_load_timeout(),
            cross_origin_loading: None,
            nonce: None,
            public_path: default_public_path(),
            chunk_filename: default_chunk_filename(),
            hot_update_chunk_filename: default_hot_update_chunk_filename(),
            hot_update_main_filename: default_hot_update_main_filename(),
        }
    }
}

impl OutputOptions {
    /// Timeout as whole seconds, rounded up, for the element `timeout` attribute
    pub fn chunk_load_timeout_secs(&self) -> u64 {
        let millis = self.chunk_load_timeout.as_millis() as u64;
        millis.div_ceil(1000)
    }
}

fn default_global_object() -> String {
    "self".to_string()
}

fn default_chunk_loading_global() -> String {
    "componentChunk".to_string()
}

fn default_hot_update_global() -> String {
    "componentHotUpdate".to_string()
}

fn default_chunk_load_timeout() -> Duration {
    Duration::from_millis(120_000)
}

fn default_public_path() -> String {
    "/".to_string()
}

fn default_chunk_filename() -> String {
    "[id].js".to_string()
}

fn default_hot_update_chunk_filename() -> String {
    "[id].[fullhash].hot-update.js".to_string()
}

fn default_hot_update_main_filename() -> String {
    "[runtime].[fullhash].hot-update.json".to_string()
}

fn default_true() -> bool {
    true
}

/// (De)serialize a `Duration` as integer milliseconds
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// A module carried by a chunk, given inline or as a file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Module id used in the module map
    pub id: ModuleId,

    /// Inline factory body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// File holding the factory body, relative to the config file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Chunk declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Chunk id
    pub id: ChunkId,

    /// Merged id set, defaults to `[id]`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<ChunkId>,

    /// Human-readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Chunk carries the runtime bootstrap
    #[serde(default)]
    pub runtime: bool,

    /// Chunk is a hot update
    #[serde(default)]
    pub hot_update: bool,

    /// Runtime requirements seeding the chunk's capability set
    #[serde(default)]
    pub requirements: Vec<String>,

    /// Modules in emission order
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
}

/// Entrypoint declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrypointConfig {
    /// Entrypoint name
    pub name: String,

    /// Chunk holding the entry modules
    pub chunk: ChunkId,

    /// Chunk holding the runtime, defaults to the entry chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<ChunkId>,

    /// Further initial chunks
    #[serde(default)]
    pub chunks: Vec<ChunkId>,

    /// Entry modules
    #[serde(default)]
    pub modules: Vec<ModuleId>,
}

/// Plugin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Built-in plugin name
    pub name: String,

    /// Plugin-specific options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<toml::Table>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_defaults() {
        let options: OutputOptions = toml::from_str("").unwrap();
        assert_eq!(options, OutputOptions::default());
        assert_eq!(options.chunk_load_timeout_secs(), 120);
    }

    #[test]
    fn test_timeout_rounds_up() {
        let options: OutputOptions = toml::from_str("chunk_load_timeout = 1500").unwrap();
        assert_eq!(options.chunk_load_timeout, Duration::from_millis(1500));
        assert_eq!(options.chunk_load_timeout_secs(), 2);
    }

    #[test]
    fn test_cross_origin_names() {
        let options: OutputOptions =
            toml::from_str("cross_origin_loading = \"use-credentials\"").unwrap();
        assert_eq!(options.cross_origin_loading, Some(CrossOriginLoading::UseCredentials));
        assert_eq!(CrossOriginLoading::Anonymous.as_str(), "anonymous");
    }
}
