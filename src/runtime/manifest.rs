//! Chunk wire format
//!
//! Normal chunks push a positional tuple onto the global queue:
//!
//! ```text
//! (<g>[<q>]=<g>[<q>]||[]).push([<ids>,<modules>,<entries|0>,<runtime>])
//! ```
//!
//! Trailing elements are omitted when empty. Entries become a literal `0`
//! when only runtime statements follow, so positional decoding stays
//! unambiguous. Hot-update chunks call the hot-update function directly:
//!
//! ```text
//! <g>[<hotfn>](<id>,<modules>[,<runtime>])
//! ```
//!
//! The bootstrap's jsonp callback decodes exactly these shapes.

use super::Template;
use crate::chunk::{Chunk, ChunkId, EntryInfo};
use crate::config::OutputOptions;
use crate::error::{Error, Result};

/// Everything carried by a normal chunk's push
#[derive(Debug, Clone, Copy)]
pub struct ChunkManifest<'a> {
    /// Ids the chunk answers to
    pub ids: &'a [ChunkId],

    /// Rendered module map object literal
    pub modules: &'a str,

    /// Entries to run once the chunk is installed
    pub entries: &'a [EntryInfo],

    /// Rendered runtime statements, `function(__component_require__) {...}`
    pub runtime: Option<&'a str>,
}

/// Render the array-push statement for a normal chunk
pub fn render_push(options: &OutputOptions, manifest: &ChunkManifest<'_>) -> Result<String> {
    let queue = Template::property_access(&options.global_object, &options.chunk_loading_global);
    let ids = serde_json::to_string(manifest.ids).map_err(Error::serialize("chunk ids"))?;
    let runtime = manifest.runtime.filter(|code| !code.is_empty());

    let mut elements = vec![ids, manifest.modules.to_string()];

    if !manifest.entries.is_empty() {
        elements.push(serde_json::to_string(manifest.entries).map_err(Error::serialize("entries"))?);
    } else if runtime.is_some() {
        elements.push("0".to_string());
    }

    if let Some(runtime) = runtime {
        elements.push(runtime.to_string());
    }

    Ok(format!("({q}={q}||[]).push([{}])", elements.join(","), q = queue))
}

/// Render the direct call for a hot-update chunk
pub fn render_hot_update(
    options: &OutputOptions,
    id: &ChunkId,
    modules: &str,
    runtime: Option<&str>,
) -> String {
    let callee = Template::property_access(&options.global_object, &options.hot_update_global);

    let mut args = vec![id.to_js(), modules.to_string()];
    if let Some(runtime) = runtime.filter(|code| !code.is_empty()) {
        args.push(runtime.to_string());
    }

    format!("{}({})", callee, args.join(","))
}

/// Render a chunk in the shape its variant requires
pub fn render_chunk_manifest(
    options: &OutputOptions,
    chunk: &Chunk,
    modules: &str,
    entries: &[EntryInfo],
    runtime: Option<&str>,
) -> Result<String> {
    if chunk.is_hot_update {
        return match chunk.ids.as_slice() {
            [id] => Ok(render_hot_update(options, id, modules, runtime)),
            ids => Err(Error::HotUpdateIds {
                chunk: chunk.id.to_string(),
                count: ids.len(),
            }),
        };
    }

    render_push(
        options,
        &ChunkManifest {
            ids: &chunk.ids,
            modules,
            entries,
            runtime,
        },
    )
}
