//! Jsonp chunk loading runtime module
//!
//! Installs chunks delivered through the global queue, loads missing chunks
//! with script elements, and optionally handles resource hints, hot updates
//! and deferred entries. What gets emitted depends on the chunk's capability
//! set, read when the module is generated so that requirements added after
//! attachment still take effect.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{link_tag, script_tag, LinkKind, RuntimeGlobals, RuntimeModule, Template, REQUIRE_FN};
use crate::chunk::{Chunk, ChunkGraph, ChunkId, ChunkUkey, ModuleId};
use crate::compilation::Compilation;
use crate::config::OutputOptions;
use crate::error::{Error, Result};
use crate::plugins::ChunkLoadingHooks;

/// Runtime module implementing jsonp chunk loading for one chunk
pub struct JsonpChunkLoadingRuntimeModule {
    chunk: ChunkUkey,
    hooks: Arc<ChunkLoadingHooks>,
}

impl JsonpChunkLoadingRuntimeModule {
    pub fn new(chunk: ChunkUkey, hooks: Arc<ChunkLoadingHooks>) -> Self {
        Self { chunk, hooks }
    }

    pub fn chunk(&self) -> ChunkUkey {
        self.chunk
    }
}

impl fmt::Debug for JsonpChunkLoadingRuntimeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonpChunkLoadingRuntimeModule")
            .field("chunk", &self.chunk)
            .finish_non_exhaustive()
    }
}

impl RuntimeModule for JsonpChunkLoadingRuntimeModule {
    fn name(&self) -> &str {
        "jsonp chunk loading"
    }

    fn generate(&self, compilation: &Compilation) -> Result<String> {
        self.generate_with_hash(compilation, &compilation.full_hash()?)
    }

    /// Hook taps see a placeholder instead of the full hash
    fn hash_source(&self, compilation: &Compilation) -> Result<String> {
        self.generate_with_hash(compilation, FULL_HASH_PLACEHOLDER)
    }
}

const FULL_HASH_PLACEHOLDER: &str = "[fullhash]";

impl JsonpChunkLoadingRuntimeModule {
    fn generate_with_hash(&self, compilation: &Compilation, hash: &str) -> Result<String> {
        let chunk = compilation.chunk(self.chunk)?;
        let set = compilation.runtime_requirements(self.chunk);
        let options = compilation.options();

        let with_loading = set.contains(RuntimeGlobals::ENSURE_CHUNK_HANDLERS);
        let with_defer = set.contains(RuntimeGlobals::STARTUP_NO_DEFAULT);
        let with_hmr = set.contains(RuntimeGlobals::HMR_DOWNLOAD_UPDATE_HANDLERS);
        let with_hmr_manifest = set.contains(RuntimeGlobals::HMR_DOWNLOAD_MANIFEST);
        let with_prefetch = with_loading && set.contains(RuntimeGlobals::PREFETCH_CHUNK_HANDLERS);
        let with_preload = with_loading && set.contains(RuntimeGlobals::PRELOAD_CHUNK_HANDLERS);

        let generator = Generator {
            options,
            hooks: &self.hooks,
            chunk,
            hash,
        };

        let mut sections = vec![installed_chunks(chunk)];
        if with_loading || with_hmr {
            sections.push(generator.load_script());
        }
        if with_loading {
            sections.push(ensure_chunk_handler());
        }
        if with_prefetch {
            sections.push(generator.resource_hint(LinkKind::Prefetch));
        }
        if with_preload {
            sections.push(generator.resource_hint(LinkKind::Preload));
        }
        if with_hmr {
            sections.push(hot_update(options));
        }
        if with_hmr_manifest {
            sections.push(hot_update_manifest());
        }
        if with_defer {
            sections.push(deferred_entries(compilation.chunk_graph(), self.chunk)?);
        }
        if with_loading || with_defer {
            sections.push(jsonp_callback(options, with_defer));
        }

        Ok(sections.join("\n\n"))
    }
}

struct Generator<'a> {
    options: &'a OutputOptions,
    hooks: &'a ChunkLoadingHooks,
    chunk: &'a Chunk,
    hash: &'a str,
}

impl Generator<'_> {
    fn load_script(&self) -> String {
        let script = script_tag(self.options, self.hooks, self.chunk, self.hash);
        format!(
            "// load a chunk script, loadingEnded() yields a reporter on failure\n\
var loadScript = function(url, chunkId, loadingEnded) {{\n\
{}\n\
\tdocument.head.appendChild(script);\n\
}};",
            Template::indent(&script)
        )
    }

    fn resource_hint(&self, kind: LinkKind) -> String {
        let (comment, global) = match kind {
            LinkKind::Prefetch => ("// prefetching chunks", RuntimeGlobals::PREFETCH_CHUNK_HANDLERS),
            LinkKind::Preload => ("// preloading chunks", RuntimeGlobals::PRELOAD_CHUNK_HANDLERS),
        };
        let link = link_tag(kind, self.options, self.hooks, self.chunk, self.hash);

        format!(
            "{comment}\n\
{handlers}.j = function(chunkId) {{\n\
\tif (!{r}.o(installedChunks, chunkId) || installedChunks[chunkId] === undefined) {{\n\
\t\tinstalledChunks[chunkId] = null;\n\
\t\tvar url = {r}.p + {r}.u(chunkId);\n\
{link}\n\
\t\tdocument.head.appendChild(link);\n\
\t}}\n\
}};",
            comment = comment,
            handlers = global.expr(),
            r = REQUIRE_FN,
            link = Template::indent(&Template::indent(&link)),
        )
    }
}

fn installed_chunks(chunk: &Chunk) -> String {
    let entries: Vec<String> = chunk
        .ids
        .iter()
        .map(|id| format!("\t{}: 0", id.to_js()))
        .collect();

    format!(
        "// undefined = not loaded, null = preloaded/prefetched\n\
// [resolve, reject, Promise] = loading, 0 = loaded\n\
var installedChunks = {{\n{}\n}};",
        entries.join(",\n")
    )
}

fn ensure_chunk_handler() -> String {
    format!(
        "{f}.j = function(chunkId, promises) {{\n\
\tvar installedChunkData = {r}.o(installedChunks, chunkId) ? installedChunks[chunkId] : undefined;\n\
\tif (installedChunkData !== 0) {{\n\
\t\tif (installedChunkData) {{\n\
\t\t\tpromises.push(installedChunkData[2]);\n\
\t\t}} else {{\n\
\t\t\tvar promise = new Promise(function(resolve, reject) {{\n\
\t\t\t\tinstalledChunkData = installedChunks[chunkId] = [resolve, reject];\n\
\t\t\t}});\n\
\t\t\tpromises.push(installedChunkData[2] = promise);\n\
\t\t\tvar url = {r}.p + {r}.u(chunkId);\n\
\t\t\tvar loadingEnded = function() {{\n\
\t\t\t\tif ({r}.o(installedChunks, chunkId)) {{\n\
\t\t\t\t\tinstalledChunkData = installedChunks[chunkId];\n\
\t\t\t\t\tif (installedChunkData !== 0) installedChunks[chunkId] = undefined;\n\
\t\t\t\t\tif (installedChunkData) return installedChunkData[1];\n\
\t\t\t\t}}\n\
\t\t\t}};\n\
\t\t\tloadScript(url, chunkId, loadingEnded);\n\
\t\t}}\n\
\t}}\n\
}};",
        f = RuntimeGlobals::ENSURE_CHUNK_HANDLERS.expr(),
        r = REQUIRE_FN,
    )
}

fn hot_update(options: &OutputOptions) -> String {
    let hot_fn = Template::property_access(&options.global_object, &options.hot_update_global);

    format!(
        "var currentUpdate;\n\
var currentUpdateRuntime;\n\
var currentUpdatedModulesList;\n\
var waitingUpdateResolves = {{}};\n\
var loadUpdateChunk = function(chunkId) {{\n\
\treturn new Promise(function(resolve, reject) {{\n\
\t\twaitingUpdateResolves[chunkId] = resolve;\n\
\t\tvar url = {r}.p + {r}.hu(chunkId);\n\
\t\tvar loadingEnded = function() {{\n\
\t\t\tif (waitingUpdateResolves[chunkId]) {{\n\
\t\t\t\twaitingUpdateResolves[chunkId] = undefined;\n\
\t\t\t\treturn reject;\n\
\t\t\t}}\n\
\t\t}};\n\
\t\tloadScript(url, chunkId, loadingEnded);\n\
\t}});\n\
}};\n\
\n\
{hot_fn} = function(chunkId, moreModules, runtime) {{\n\
\tfor (var moduleId in moreModules) {{\n\
\t\tif ({r}.o(moreModules, moduleId)) {{\n\
\t\t\tcurrentUpdate[moduleId] = moreModules[moduleId];\n\
\t\t\tif (currentUpdatedModulesList) currentUpdatedModulesList.push(moduleId);\n\
\t\t}}\n\
\t}}\n\
\tif (runtime) currentUpdateRuntime.push(runtime);\n\
\tif (waitingUpdateResolves[chunkId]) {{\n\
\t\twaitingUpdateResolves[chunkId]();\n\
\t\twaitingUpdateResolves[chunkId] = undefined;\n\
\t}}\n\
}};\n\
\n\
var applyHandler = function(options) {{\n\
\tvar update = currentUpdate;\n\
\tvar updateRuntime = currentUpdateRuntime;\n\
\tcurrentUpdate = currentUpdateRuntime = undefined;\n\
\tvar outdatedModules = Object.keys(update);\n\
\treturn {{\n\
\t\tdispose: function() {{\n\
\t\t\toutdatedModules.forEach(function(moduleId) {{\n\
\t\t\t\tvar cached = {r}.c[moduleId];\n\
\t\t\t\tif (!cached) return;\n\
\t\t\t\t{r}.hmrD[moduleId] = cached.hot ? cached.hot.data : {{}};\n\
\t\t\t\tdelete {r}.c[moduleId];\n\
\t\t\t}});\n\
\t\t}},\n\
\t\tapply: function(reportError) {{\n\
\t\t\toutdatedModules.forEach(function(moduleId) {{\n\
\t\t\t\t{r}.m[moduleId] = update[moduleId];\n\
\t\t\t}});\n\
\t\t\tupdateRuntime.forEach(function(runtime) {{\n\
\t\t\t\truntime({r});\n\
\t\t\t}});\n\
\t\t\toutdatedModules.forEach(function(moduleId) {{\n\
\t\t\t\ttry {{\n\
\t\t\t\t\t{r}(moduleId);\n\
\t\t\t\t}} catch (err) {{\n\
\t\t\t\t\tif (options && options.onErrored) {{\n\
\t\t\t\t\t\toptions.onErrored({{ type: 'accept-errored', moduleId: moduleId, error: err }});\n\
\t\t\t\t\t}}\n\
\t\t\t\t\treportError(err);\n\
\t\t\t\t}}\n\
\t\t\t}});\n\
\t\t\treturn outdatedModules;\n\
\t\t}}\n\
\t}};\n\
}};\n\
\n\
{hmr_c}.jsonp = function(chunkIds, removedChunks, removedModules, promises, applyHandlers, updatedModulesList) {{\n\
\tapplyHandlers.push(applyHandler);\n\
\tcurrentUpdate = {{}};\n\
\tcurrentUpdateRuntime = [];\n\
\tcurrentUpdatedModulesList = updatedModulesList;\n\
\tremovedChunks.forEach(function(chunkId) {{\n\
\t\tdelete installedChunks[chunkId];\n\
\t}});\n\
\tchunkIds.forEach(function(chunkId) {{\n\
\t\tif ({r}.o(installedChunks, chunkId) && installedChunks[chunkId] !== undefined) {{\n\
\t\t\tpromises.push(loadUpdateChunk(chunkId));\n\
\t\t}}\n\
\t}});\n\
}};",
        r = REQUIRE_FN,
        hot_fn = hot_fn,
        hmr_c = RuntimeGlobals::HMR_DOWNLOAD_UPDATE_HANDLERS.expr(),
    )
}

fn hot_update_manifest() -> String {
    format!(
        "{m} = function() {{\n\
\tif (typeof fetch === 'undefined') throw new Error('No browser support: need fetch API');\n\
\treturn fetch({r}.p + {r}.hmrF()).then(function(response) {{\n\
\t\tif (response.status === 404) return;\n\
\t\tif (!response.ok) throw new Error('Failed to fetch update manifest ' + response.statusText);\n\
\t\treturn response.json();\n\
\t}});\n\
}};",
        m = RuntimeGlobals::HMR_DOWNLOAD_MANIFEST.expr(),
        r = REQUIRE_FN,
    )
}

/// Chunks, other than the runtime chunk, each deferred entry module waits for
fn entry_dependencies(graph: &ChunkGraph, runtime: ChunkUkey) -> BTreeMap<ModuleId, Vec<ChunkId>> {
    let mut dependencies = BTreeMap::new();

    for ep in graph.entrypoints().iter().filter(|ep| ep.runtime_chunk == runtime) {
        let chunk_ids: Vec<ChunkId> = ep
            .chunks
            .iter()
            .filter(|&&ukey| ukey != runtime)
            .filter_map(|&ukey| graph.chunk(ukey))
            .flat_map(|chunk| chunk.ids.iter().cloned())
            .collect();

        for module in &ep.modules {
            dependencies.insert(module.clone(), chunk_ids.clone());
        }
    }

    dependencies
}

fn deferred_entries(graph: &ChunkGraph, runtime: ChunkUkey) -> Result<String> {
    let dependencies = serde_json::to_string(&entry_dependencies(graph, runtime))
        .map_err(Error::serialize("entry dependencies"))?;

    Ok(format!(
        "var entryDependencies = {deps};\n\
var deferredModules = [];\n\
var deferModule = function(moduleId) {{\n\
\tdeferredModules.push([moduleId].concat(entryDependencies[moduleId] || []));\n\
}};\n\
var checkDeferredModules = function() {{\n\
\tvar result;\n\
\tfor (var i = 0; i < deferredModules.length; i++) {{\n\
\t\tvar deferredModule = deferredModules[i];\n\
\t\tvar fulfilled = true;\n\
\t\tfor (var j = 1; j < deferredModule.length; j++) {{\n\
\t\t\tif (installedChunks[deferredModule[j]] !== 0) fulfilled = false;\n\
\t\t}}\n\
\t\tif (fulfilled) {{\n\
\t\t\tdeferredModules.splice(i--, 1);\n\
\t\t\tresult = {r}(deferredModule[0]);\n\
\t\t}}\n\
\t}}\n\
\treturn result;\n\
}};\n\
{x} = function(entries) {{\n\
\tentries.forEach(deferModule);\n\
\treturn checkDeferredModules();\n\
}};",
        deps = dependencies,
        r = REQUIRE_FN,
        x = RuntimeGlobals::STARTUP.expr(),
    ))
}

fn jsonp_callback(options: &OutputOptions, with_defer: bool) -> String {
    let queue = Template::property_access(&options.global_object, &options.chunk_loading_global);

    let entries = if with_defer {
        format!(
            "\tif (executeModules) executeModules.forEach(function(entry) {{\n\
\t\t[].concat(entry[0]).forEach(function(moduleId) {{\n\
\t\t\tif (entry[1]) deferModule(moduleId);\n\
\t\t\telse {r}(moduleId);\n\
\t\t}});\n\
\t}});\n\
\treturn checkDeferredModules();",
            r = REQUIRE_FN
        )
    } else {
        format!(
            "\tif (executeModules) executeModules.forEach(function(entry) {{\n\
\t\t[].concat(entry[0]).forEach(function(moduleId) {{\n\
\t\t\t{r}(moduleId);\n\
\t\t}});\n\
\t}});",
            r = REQUIRE_FN
        )
    };

    format!(
        "// install a chunk pushed as [chunkIds, modules, entries|0, runtime]\n\
var componentJsonpCallback = function(parentChunkLoadingFunction, data) {{\n\
\tvar chunkIds = data[0];\n\
\tvar moreModules = data[1];\n\
\tvar executeModules = data[2];\n\
\tvar runtime = data[3];\n\
\tvar moduleId, chunkId, i = 0, resolves = [];\n\
\tfor (; i < chunkIds.length; i++) {{\n\
\t\tchunkId = chunkIds[i];\n\
\t\tif ({r}.o(installedChunks, chunkId) && installedChunks[chunkId]) {{\n\
\t\t\tresolves.push(installedChunks[chunkId][0]);\n\
\t\t}}\n\
\t\tinstalledChunks[chunkId] = 0;\n\
\t}}\n\
\tfor (moduleId in moreModules) {{\n\
\t\tif ({r}.o(moreModules, moduleId)) {{\n\
\t\t\t{r}.m[moduleId] = moreModules[moduleId];\n\
\t\t}}\n\
\t}}\n\
\tif (runtime) runtime({r});\n\
\tif (parentChunkLoadingFunction) parentChunkLoadingFunction(data);\n\
\twhile (resolves.length) {{\n\
\t\tresolves.shift()();\n\
\t}}\n\
{entries}\n\
}};\n\
\n\
var chunkLoadingGlobal = {queue} = {queue} || [];\n\
chunkLoadingGlobal.forEach(componentJsonpCallback.bind(null, 0));\n\
chunkLoadingGlobal.push = componentJsonpCallback.bind(null, chunkLoadingGlobal.push.bind(chunkLoadingGlobal));",
        r = REQUIRE_FN,
        entries = entries,
        queue = queue,
    )
}
