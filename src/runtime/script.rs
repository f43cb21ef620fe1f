//! Script and link element generation
//!
//! The emitted script block expects `url`, `chunkId` and `loadingEnded` in
//! scope. `loadingEnded()` returns a reporter when the load failed and a
//! falsy value when the chunk arrived. The completion handler runs at most
//! once: a `done` flag is checked and set before anything else, matching
//! [`LoadAttempt`](super::LoadAttempt).

use tracing::trace;

use super::{Template, TagSpec};
use crate::chunk::Chunk;
use crate::config::OutputOptions;
use crate::plugins::ChunkLoadingHooks;

const CROSS_ORIGIN_SCRIPT: &str = "script.src.indexOf(window.location.origin + '/') !== 0";
const CROSS_ORIGIN_LINK: &str = "link.href.indexOf(window.location.origin + '/') !== 0";

pub(super) const COMPLETION_HANDLER: &str = r#"var onScriptComplete = function(event) {
	if (done) return;
	done = true;
	script.onerror = script.onload = null;
	clearTimeout(timeout);
	var reportError = loadingEnded();
	if (reportError) {
		var errorType = event && (event.type === 'load' ? 'missing' : event.type);
		var realSrc = event && event.target && event.target.src;
		error.message = 'Loading chunk ' + chunkId + ' failed.\n(' + errorType + ': ' + realSrc + ')';
		error.name = 'ChunkLoadError';
		error.type = errorType;
		error.request = realSrc;
		reportError(error);
	}
};"#;

/// Script-loading block for one chunk request
pub fn script_tag(
    options: &OutputOptions,
    hooks: &ChunkLoadingHooks,
    chunk: &Chunk,
    hash: &str,
) -> String {
    let mut tag = TagSpec::element("script");
    let attributes = &mut tag.attributes;

    if let Some(script_type) = &options.script_type {
        attributes.set("type", Template::string_literal(script_type));
    }
    if options.charset {
        attributes.set("charset", "'utf-8'");
    }
    attributes.set("timeout", options.chunk_load_timeout_secs().to_string());
    if let Some(nonce) = &options.nonce {
        attributes.set_guarded("nonce", nonce.clone(), nonce.clone());
    }
    attributes.set("src", "url");
    if let Some(policy) = options.cross_origin_loading {
        attributes.set_guarded(
            "crossOrigin",
            Template::string_literal(policy.as_str()),
            CROSS_ORIGIN_SCRIPT,
        );
    }
    attributes.set("onerror", "onScriptComplete");
    attributes.set("onload", "onScriptComplete");

    let tag = hooks.mutate_tag.call(tag, chunk, hash);
    trace!("Script tag for chunk {} has {} attributes", chunk.id, tag.attributes.len());

    let mut lines = vec![
        "// allocated before the request starts so the stack points at the caller".to_string(),
        "var error = new Error();".to_string(),
        "var done = false;".to_string(),
        COMPLETION_HANDLER.to_string(),
    ];
    lines.extend(tag.render("script"));
    lines.push(format!(
        "var timeout = setTimeout(function() {{\n\tonScriptComplete({{ type: 'timeout', target: script }});\n}}, {});",
        options.chunk_load_timeout.as_millis()
    ));

    hooks
        .build_script_tag
        .call(Template::as_string(&lines), chunk, hash)
}

/// Kind of resource hint link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Preload,
    Prefetch,
}

impl LinkKind {
    fn rel(self) -> &'static str {
        match self {
            LinkKind::Preload => "preload",
            LinkKind::Prefetch => "prefetch",
        }
    }
}

/// `<link>` creation block hinting `url` to the browser
pub fn link_tag(
    kind: LinkKind,
    options: &OutputOptions,
    hooks: &ChunkLoadingHooks,
    chunk: &Chunk,
    hash: &str,
) -> String {
    let mut tag = TagSpec::element("link");
    let attributes = &mut tag.attributes;

    if options.charset {
        attributes.set("charset", "'utf-8'");
    }
    if let Some(nonce) = &options.nonce {
        attributes.set_guarded("nonce", nonce.clone(), nonce.clone());
    }
    attributes.set("rel", Template::string_literal(kind.rel()));
    attributes.set("as", "\"script\"");
    attributes.set("href", "url");
    if kind == LinkKind::Preload {
        if let Some(policy) = options.cross_origin_loading {
            attributes.set_guarded(
                "crossOrigin",
                Template::string_literal(policy.as_str()),
                CROSS_ORIGIN_LINK,
            );
        }
    }

    let tag = hooks.mutate_tag.call(tag, chunk, hash);
    let code = Template::as_string(&tag.render("link"));

    match kind {
        LinkKind::Preload => hooks.build_preload_link.call(code, chunk, hash),
        LinkKind::Prefetch => hooks.build_prefetch_link.call(code, chunk, hash),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::CrossOriginLoading;
    use pretty_assertions::assert_eq;

    fn chunk() -> Chunk {
        Chunk::runtime("main", vec![])
    }

    #[test]
    fn test_default_script_tag() {
        let hooks = ChunkLoadingHooks::new();
        let code = script_tag(&OutputOptions::default(), &hooks, &chunk(), "abc");

        let expected_tail = "var script = document.createElement('script');\n\
script.charset = 'utf-8';\n\
script.timeout = 120;\n\
script.src = url;\n\
script.onerror = onScriptComplete;\n\
script.onload = onScriptComplete;\n\
var timeout = setTimeout(function() {\n\
\tonScriptComplete({ type: 'timeout', target: script });\n\
}, 120000);";
        assert!(code.ends_with(expected_tail), "{}", code);

        // error allocated and flag declared before the element exists
        let error_at = code.find("var error = new Error();").unwrap();
        let element_at = code.find("var script =").unwrap();
        assert!(error_at < element_at);
        assert!(code.contains("if (done) return;\n\tdone = true;"));
        assert!(code.contains(r"failed.\n('"));
        assert!(!code.contains("crossOrigin"));
    }

    #[test]
    fn test_configured_attributes() {
        let options = OutputOptions {
            script_type: Some("module".to_string()),
            chunk_load_timeout: Duration::from_millis(1000),
            cross_origin_loading: Some(CrossOriginLoading::Anonymous),
            nonce: Some("__component_require__.nc".to_string()),
            ..OutputOptions::default()
        };
        let hooks = ChunkLoadingHooks::new();
        let code = script_tag(&options, &hooks, &chunk(), "");

        assert!(code.contains("script.type = \"module\";\nscript.charset = 'utf-8';\nscript.timeout = 1;"));
        assert!(code.contains(
            "if (__component_require__.nc) script.nonce = __component_require__.nc;\nscript.src = url;\n\
if (script.src.indexOf(window.location.origin + '/') !== 0) script.crossOrigin = \"anonymous\";"
        ));
        assert!(code.contains("}, 1000);"));
    }

    #[test]
    fn test_mutate_tag_can_replace_element_and_attributes() {
        let hooks = ChunkLoadingHooks::new();
        hooks.mutate_tag.tap("test", |mut tag: TagSpec, _: &Chunk, _: &str| {
            if tag.tag_name == "script" {
                tag.create_expr = "createTrustedScript()".to_string();
                tag.attributes.remove("charset");
                tag.attributes.set("async", "true");
            }
            tag
        });
        hooks.build_script_tag.tap("wrap", |code: String, chunk: &Chunk, hash: &str| {
            format!("// {} {}\n{}", chunk.id, hash, code)
        });

        let code = script_tag(&OutputOptions::default(), &hooks, &chunk(), "h1");
        assert!(code.starts_with("// main h1\n"));
        assert!(code.contains("var script = createTrustedScript();"));
        assert!(!code.contains("charset"));
        assert!(code.contains("script.onload = onScriptComplete;\nscript.async = true;"));
    }

    #[test]
    fn test_link_tags() {
        let options = OutputOptions {
            cross_origin_loading: Some(CrossOriginLoading::UseCredentials),
            ..OutputOptions::default()
        };
        let hooks = ChunkLoadingHooks::new();

        let preload = link_tag(LinkKind::Preload, &options, &hooks, &chunk(), "");
        assert_eq!(
            preload,
            "var link = document.createElement('link');\n\
link.charset = 'utf-8';\n\
link.rel = \"preload\";\n\
link.as = \"script\";\n\
link.href = url;\n\
if (link.href.indexOf(window.location.origin + '/') !== 0) link.crossOrigin = \"use-credentials\";"
        );

        hooks.build_prefetch_link.tap("mark", |code: String, _: &Chunk, _: &str| {
            format!("{}\nlink.dataset.prefetched = '1';", code)
        });
        let prefetch = link_tag(LinkKind::Prefetch, &options, &hooks, &chunk(), "");
        assert!(prefetch.contains("link.rel = \"prefetch\";"));
        assert!(!prefetch.contains("crossOrigin"));
        assert!(prefetch.ends_with("link.dataset.prefetched = '1';"));
    }
}
