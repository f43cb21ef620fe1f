//! Runtime chunk bootstrap
//!
//! A runtime chunk is not pushed onto the queue. It is an IIFE that owns the
//! module registry and require function, defines the helpers its capability
//! set asks for, runs its attached runtime modules and finally starts its
//! entries.

use std::collections::BTreeMap;

use tracing::debug;

use super::{RuntimeGlobals, Template, REQUIRE_FN};
use crate::chunk::{Chunk, ChunkUkey, EntryModules};
use crate::compilation::Compilation;
use crate::error::{Error, Result};

const REQUIRE_FUNCTION: &str = r#"function __component_require__(moduleId) {
	var cachedModule = __component_module_cache__[moduleId];
	if (cachedModule !== undefined) {
		return cachedModule.exports;
	}

	var module = __component_module_cache__[moduleId] = { id: moduleId, exports: {} };
	__component_modules__[moduleId](module, module.exports, __component_require__);

	return module.exports;
}"#;

/// Render the bootstrap code of a runtime chunk
pub fn render_bootstrap(compilation: &Compilation, ukey: ChunkUkey) -> Result<String> {
    let chunk = compilation.chunk(ukey)?;
    let set = compilation.runtime_requirements(ukey);
    debug!("Rendering bootstrap for chunk {} with [{}]", chunk.id, set);

    // module bodies stay at column zero, see `render_module_map`
    let modules = format!("var __component_modules__ = {};", compilation.render_module_map(chunk)?);

    let mut sections = vec![
        "var __component_module_cache__ = {};".to_string(),
        REQUIRE_FUNCTION.to_string(),
        format!("{}.m = __component_modules__;", REQUIRE_FN),
    ];

    let helpers = helpers(compilation, chunk, set)?;
    if !helpers.is_empty() {
        sections.push(Template::as_string(&helpers));
    }

    sections.extend(compilation.render_runtime_modules(ukey)?);

    if let Some(startup) = startup(compilation, ukey, set)? {
        sections.push(startup);
    }

    Ok(format!(
        "(function() {{ // component runtime\n{}\n\n{}\n}})();",
        modules,
        Template::indent(&sections.join("\n\n"))
    ))
}

fn helpers(compilation: &Compilation, chunk: &Chunk, set: RuntimeGlobals) -> Result<Vec<String>> {
    let options = compilation.options();
    let r = REQUIRE_FN;
    let mut lines = Vec::new();

    if set.contains(RuntimeGlobals::MODULE_CACHE) {
        lines.push(format!("{}.c = __component_module_cache__;", r));
    }
    if set.contains(RuntimeGlobals::HAS_OWN_PROPERTY) {
        lines.push(format!(
            "{}.o = function(obj, prop) {{ return Object.prototype.hasOwnProperty.call(obj, prop); }};",
            r
        ));
    }
    if set.contains(RuntimeGlobals::PUBLIC_PATH) {
        lines.push(format!("{}.p = {};", r, Template::string_literal(&options.public_path)));
    }
    if set.contains(RuntimeGlobals::GET_FULL_HASH) {
        lines.push(format!(
            "{}.h = function() {{ return {}; }};",
            r,
            Template::string_literal(&compilation.full_hash()?)
        ));
    }
    if set.contains(RuntimeGlobals::GET_CHUNK_SCRIPT_FILENAME) {
        let template = options.chunk_filename.replace("[fullhash]", &compilation.full_hash()?);
        let names = chunk_names(compilation)?;
        let expr = Template::filename_expr(&template, &[("[id]", "chunkId"), ("[name]", &names)]);
        lines.push(format!("{}.u = function(chunkId) {{ return {}; }};", r, expr));
    }
    if set.contains(RuntimeGlobals::GET_CHUNK_UPDATE_SCRIPT_FILENAME) {
        let hash = format!("{}.h()", r);
        let expr = Template::filename_expr(
            &options.hot_update_chunk_filename,
            &[("[id]", "chunkId"), ("[name]", "chunkId"), ("[fullhash]", &hash)],
        );
        lines.push(format!("{}.hu = function(chunkId) {{ return {}; }};", r, expr));
    }
    if set.contains(RuntimeGlobals::GET_UPDATE_MANIFEST_FILENAME) {
        let hash = format!("{}.h()", r);
        let template = options
            .hot_update_main_filename
            .replace("[runtime]", &chunk.display_name());
        let expr = Template::filename_expr(&template, &[("[fullhash]", &hash)]);
        lines.push(format!("{}.hmrF = function() {{ return {}; }};", r, expr));
    }
    if set.intersects(RuntimeGlobals::ENSURE_CHUNK | RuntimeGlobals::ENSURE_CHUNK_HANDLERS) {
        lines.push(format!("{}.f = {{}};", r));
        lines.push(format!(
            "{r}.e = function(chunkId) {{\n\
\treturn Promise.all(Object.keys({r}.f).reduce(function(promises, key) {{\n\
\t\t{r}.f[key](chunkId, promises);\n\
\t\treturn promises;\n\
\t}}, []));\n\
}};",
            r = r
        ));
    }
    if set.contains(RuntimeGlobals::PREFETCH_CHUNK_HANDLERS) {
        lines.push(format!("{}.F = {{}};", r));
    }
    if set.contains(RuntimeGlobals::PRELOAD_CHUNK_HANDLERS) {
        lines.push(format!("{}.H = {{}};", r));
    }
    if set.contains(RuntimeGlobals::HMR_DOWNLOAD_UPDATE_HANDLERS) {
        lines.push(format!("{}.hmrC = {{}};", r));
    }
    if set.contains(RuntimeGlobals::HMR_MODULE_DATA) {
        lines.push(format!("{}.hmrD = {{}};", r));
    }
    if set.contains(RuntimeGlobals::SCRIPT_NONCE) {
        lines.push(format!("{}.nc = undefined;", r));
    }

    Ok(lines)
}

/// Expression mapping `chunkId` to the chunk's name, falling back to the id
fn chunk_names(compilation: &Compilation) -> Result<String> {
    let graph = compilation.chunk_graph();
    let names: BTreeMap<String, &str> = graph
        .ukeys()
        .filter_map(|ukey| graph.chunk(ukey))
        .filter_map(|chunk| chunk.name.as_deref().map(|name| (chunk, name)))
        .flat_map(|(chunk, name)| chunk.ids.iter().map(move |id| (id.to_string(), name)))
        .collect();

    if names.is_empty() {
        return Ok("chunkId".to_string());
    }
    let map = serde_json::to_string(&names).map_err(Error::serialize("chunk names"))?;
    Ok(format!("({}[chunkId] || chunkId)", map))
}

fn startup(compilation: &Compilation, ukey: ChunkUkey, set: RuntimeGlobals) -> Result<Option<String>> {
    let modules: Vec<String> = compilation
        .chunk_graph()
        .entry_info(ukey)
        .into_iter()
        .flat_map(|info| match info.modules {
            EntryModules::One(id) => vec![id],
            EntryModules::Many(ids) => ids,
        })
        .collect();

    if set.contains(RuntimeGlobals::STARTUP_NO_DEFAULT) {
        let entries = serde_json::to_string(&modules).map_err(Error::serialize("entry modules"))?;
        return Ok(Some(format!(
            "var __component_exports__ = {}({});",
            RuntimeGlobals::STARTUP.expr(),
            entries
        )));
    }

    let Some((last, rest)) = modules.split_last() else {
        return Ok(None);
    };
    let mut lines: Vec<String> = rest
        .iter()
        .map(|id| format!("{}({});", REQUIRE_FN, Template::string_literal(id)))
        .collect();
    lines.push(format!(
        "var __component_exports__ = {}({});",
        REQUIRE_FN,
        Template::string_literal(last)
    ));
    Ok(Some(Template::as_string(&lines)))
}
