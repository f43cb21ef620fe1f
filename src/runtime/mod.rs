//! Runtime code generation
//!
//! Everything that ends up as bootstrap code in the browser: the capability
//! set tracking what a chunk's runtime needs, the runtime modules that
//! implement those capabilities, and the emitters for the chunk wire format.

mod attributes;
mod bootstrap;
mod jsonp;
mod load_state;
mod manifest;
mod requirements;
mod script;
mod template;

use std::fmt;

use bitflags::bitflags;

use crate::compilation::Compilation;
use crate::error::{Error, Result};

pub use attributes::{render_attributes, AttributeSpec, AttributeValue, TagSpec};
pub use bootstrap::render_bootstrap;
pub use jsonp::JsonpChunkLoadingRuntimeModule;
pub use load_state::{ChunkLoadError, LoadAttempt, LoadEvent, LoadState};
pub use manifest::{render_chunk_manifest, render_hot_update, render_push, ChunkManifest};
pub use requirements::{
    ChunkRequirements, DeferredEntryListener, EnsureChunkListener, EntryDeferPolicy,
    HmrDownloadManifestListener, HmrDownloadUpdateListener, Listen, Propagator,
    RequirementListener, SplitEntrypointPolicy,
};
pub use script::{link_tag, script_tag, LinkKind};
pub use template::Template;

/// Name of the module require function in generated code
pub const REQUIRE_FN: &str = "__component_require__";

bitflags! {
    /// Capabilities a chunk's runtime must provide
    ///
    /// Sets only ever grow during propagation; union is the only combinator.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RuntimeGlobals: u32 {
        const REQUIRE = 1 << 0;
        const MODULE_FACTORIES_ADD_ONLY = 1 << 1;
        const MODULE_CACHE = 1 << 2;
        const HAS_OWN_PROPERTY = 1 << 3;
        const ENSURE_CHUNK = 1 << 4;
        const ENSURE_CHUNK_HANDLERS = 1 << 5;
        const PUBLIC_PATH = 1 << 6;
        const GET_CHUNK_SCRIPT_FILENAME = 1 << 7;
        const GET_CHUNK_UPDATE_SCRIPT_FILENAME = 1 << 8;
        const GET_UPDATE_MANIFEST_FILENAME = 1 << 9;
        const HMR_DOWNLOAD_UPDATE_HANDLERS = 1 << 10;
        const HMR_DOWNLOAD_MANIFEST = 1 << 11;
        const HMR_MODULE_DATA = 1 << 12;
        const PREFETCH_CHUNK_HANDLERS = 1 << 13;
        const PRELOAD_CHUNK_HANDLERS = 1 << 14;
        const SCRIPT_NONCE = 1 << 15;
        const STARTUP = 1 << 16;
        const STARTUP_NO_DEFAULT = 1 << 17;
        const GET_FULL_HASH = 1 << 18;
    }
}

const GLOBAL_NAMES: &[(RuntimeGlobals, &str, &str)] = &[
    (RuntimeGlobals::REQUIRE, "require", ""),
    (RuntimeGlobals::MODULE_FACTORIES_ADD_ONLY, "module-factories-add-only", ".m"),
    (RuntimeGlobals::MODULE_CACHE, "module-cache", ".c"),
    (RuntimeGlobals::HAS_OWN_PROPERTY, "has-own-property", ".o"),
    (RuntimeGlobals::ENSURE_CHUNK, "ensure-chunk", ".e"),
    (RuntimeGlobals::ENSURE_CHUNK_HANDLERS, "ensure-chunk-handlers", ".f"),
    (RuntimeGlobals::PUBLIC_PATH, "public-path", ".p"),
    (RuntimeGlobals::GET_CHUNK_SCRIPT_FILENAME, "get-chunk-script-filename", ".u"),
    (RuntimeGlobals::GET_CHUNK_UPDATE_SCRIPT_FILENAME, "get-chunk-update-script-filename", ".hu"),
    (RuntimeGlobals::GET_UPDATE_MANIFEST_FILENAME, "get-update-manifest-filename", ".hmrF"),
    (RuntimeGlobals::HMR_DOWNLOAD_UPDATE_HANDLERS, "hmr-download-update-handlers", ".hmrC"),
    (RuntimeGlobals::HMR_DOWNLOAD_MANIFEST, "hmr-download-manifest", ".hmrM"),
    (RuntimeGlobals::HMR_MODULE_DATA, "hmr-module-data", ".hmrD"),
    (RuntimeGlobals::PREFETCH_CHUNK_HANDLERS, "prefetch-chunk-handlers", ".F"),
    (RuntimeGlobals::PRELOAD_CHUNK_HANDLERS, "preload-chunk-handlers", ".H"),
    (RuntimeGlobals::SCRIPT_NONCE, "script-nonce", ".nc"),
    (RuntimeGlobals::STARTUP, "startup", ".x"),
    (RuntimeGlobals::STARTUP_NO_DEFAULT, "startup-no-default", ".x"),
    (RuntimeGlobals::GET_FULL_HASH, "get-full-hash", ".h"),
];

impl RuntimeGlobals {
    /// Look up a single capability by its kebab-case name
    ///
    /// Distinct from the generated `from_name`, which takes the constant name.
    pub fn from_tag_name(name: &str) -> Result<Self> {
        GLOBAL_NAMES
            .iter()
            .find(|(_, n, _)| *n == name)
            .map(|(flag, _, _)| *flag)
            .ok_or_else(|| Error::UnknownRequirement(name.to_string()))
    }

    /// Parse a list of capability names into one set
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(Self::empty(), |set, name| {
            Ok(set | Self::from_tag_name(name.as_ref())?)
        })
    }

    /// Kebab-case names of every capability in the set
    pub fn names(self) -> Vec<&'static str> {
        GLOBAL_NAMES
            .iter()
            .filter(|(flag, _, _)| self.contains(*flag))
            .map(|(_, name, _)| *name)
            .collect()
    }

    /// JavaScript expression for a single capability
    pub fn expr(self) -> String {
        let suffix = GLOBAL_NAMES
            .iter()
            .find(|(flag, _, _)| *flag == self)
            .map(|(_, _, suffix)| *suffix)
            .unwrap_or_default();
        format!("{}{}", REQUIRE_FN, suffix)
    }
}

impl fmt::Display for RuntimeGlobals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(", "))
    }
}

/// A synthesized module implementing a runtime capability
pub trait RuntimeModule: Send + Sync + fmt::Debug {
    /// Name used in the emitted section banner
    fn name(&self) -> &str;

    /// Generate the module's code
    fn generate(&self, compilation: &Compilation) -> Result<String>;

    /// Code folded into the owning chunk's content hash
    ///
    /// Must not depend on the full hash, which is derived from chunk hashes.
    fn hash_source(&self, compilation: &Compilation) -> Result<String> {
        self.generate(compilation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_set() {
        let set = RuntimeGlobals::from_names(["ensure-chunk-handlers", "public-path"]).unwrap();
        assert_eq!(set, RuntimeGlobals::ENSURE_CHUNK_HANDLERS | RuntimeGlobals::PUBLIC_PATH);
        assert_eq!(set.names(), vec!["ensure-chunk-handlers", "public-path"]);
    }

    #[test]
    fn test_unknown_name() {
        assert!(matches!(
            RuntimeGlobals::from_tag_name("nope"),
            Err(Error::UnknownRequirement(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_tag_names_and_constant_names() {
        assert_eq!(
            RuntimeGlobals::from_tag_name("ensure-chunk-handlers").unwrap(),
            RuntimeGlobals::ENSURE_CHUNK_HANDLERS
        );
        assert_eq!(
            RuntimeGlobals::from_name("ENSURE_CHUNK_HANDLERS"),
            Some(RuntimeGlobals::ENSURE_CHUNK_HANDLERS)
        );
        assert_eq!(RuntimeGlobals::from_name("ensure-chunk-handlers"), None);
    }

    #[test]
    fn test_expressions() {
        assert_eq!(RuntimeGlobals::REQUIRE.expr(), "__component_require__");
        assert_eq!(RuntimeGlobals::ENSURE_CHUNK_HANDLERS.expr(), "__component_require__.f");
        assert_eq!(RuntimeGlobals::HMR_DOWNLOAD_MANIFEST.expr(), "__component_require__.hmrM");
    }
}
