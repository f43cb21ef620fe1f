use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn chunks_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("component-chunks"))
}

const CONFIG: &str = r#"
[output]
nonce = "__component_require__.nc"

[[chunks]]
id = "main"
runtime = true
requirements = ["ensure-chunk-handlers", "script-nonce"]
modules = [{ id = "./main.js", code = "__component_require__.e(1);" }]

[[chunks]]
id = 1
modules = [{ id = "./lazy.js", path = "lazy.js" }]

[[entrypoints]]
name = "main"
chunk = "main"
modules = ["./main.js"]
"#;

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("chunks.toml"), CONFIG).unwrap();
    fs::write(dir.path().join("lazy.js"), "module.exports = 'lazy';").unwrap();
    dir
}

/// Test rendering every chunk of a config
#[test]
fn test_render_all_chunks() {
    let dir = project();

    chunks_cmd()
        .current_dir(dir.path())
        .arg("render")
        .assert()
        .success()
        .stdout(predicate::str::contains("(function() { // component runtime"))
        .stdout(predicate::str::contains(
            "if (__component_require__.nc) script.nonce = __component_require__.nc;",
        ))
        .stdout(predicate::str::contains(
            r#"(self["componentChunk"]=self["componentChunk"]||[]).push([[1],{"#,
        ))
        .stderr(predicate::str::contains("Rendered 2 chunk(s)"));
}

/// Test rendering a single chunk with hashes only
#[test]
fn test_render_single_chunk_hash() {
    let dir = project();

    let output = chunks_cmd()
        .current_dir(dir.path())
        .args(["render", "--chunk", "1", "--hashes-only"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.trim();
    let (hash, filename) = line.split_once(' ').unwrap();
    assert_eq!(hash.len(), 16);
    assert_eq!(filename, "1.js");
}

/// Test that a changed queue name changes the lazy chunk's hash
#[test]
fn test_hash_follows_queue_name() {
    let dir = project();
    let hash = |dir: &TempDir| {
        let output = chunks_cmd()
            .current_dir(dir.path())
            .args(["render", "--chunk", "1", "--hashes-only"])
            .output()
            .unwrap();
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    };

    let before = hash(&dir);
    fs::write(
        dir.path().join("chunks.toml"),
        CONFIG.replace("[output]", "[output]\nchunk_loading_global = \"shopChunk\""),
    )
    .unwrap();
    let after = hash(&dir);

    assert_ne!(before, after);
}

const SPLIT_CONFIG: &str = r#"
[[chunks]]
id = "runtime"
runtime = true

[[chunks]]
id = "main"
requirements = ["ensure-chunk-handlers"]
modules = [{ id = "./main.js", code = "__component_require__.e(4);" }]

[[chunks]]
id = 4
modules = [{ id = "./lazy.js", code = "module.exports = 42;" }]

[[entrypoints]]
name = "main"
chunk = "main"
runtime = "runtime"
modules = ["./main.js"]
"#;

fn render_chunk(dir: &TempDir, chunk: &str, extra: &[&str]) -> String {
    let output = chunks_cmd()
        .current_dir(dir.path())
        .args(["render", "--chunk", chunk])
        .args(extra)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Test loading requested by an entry chunk is served by its runtime chunk
#[test]
fn test_split_runtime_defines_loading_helpers() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("chunks.toml"), SPLIT_CONFIG).unwrap();

    let runtime = render_chunk(&dir, "runtime", &[]);
    assert!(runtime.contains("__component_require__.f = {};"));
    assert!(runtime.contains("__component_require__.u = function(chunkId)"));
    assert!(runtime.contains("__component_require__.f.j = function(chunkId, promises) {"));

    let main = render_chunk(&dir, "main", &[]);
    assert!(!main.contains("installedChunks"));
    assert!(!main.contains("__component_require__.f.j"));
}

/// Test the runtime chunk's hash follows the options baked into it
#[test]
fn test_runtime_hash_follows_output_options() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("chunks.toml"), SPLIT_CONFIG).unwrap();
    let before = render_chunk(&dir, "runtime", &["--hashes-only"]);

    fs::write(
        dir.path().join("chunks.toml"),
        format!("[output]\nchunk_load_timeout = 5000\n{}", SPLIT_CONFIG),
    )
    .unwrap();
    let after = render_chunk(&dir, "runtime", &["--hashes-only"]);

    assert_ne!(before, after);
}

/// Test unknown chunk ids are reported
#[test]
fn test_render_unknown_chunk() {
    let dir = project();

    chunks_cmd()
        .current_dir(dir.path())
        .args(["render", "--chunk", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No chunk with id 'missing'"));
}

/// Test config validation errors reach the user
#[test]
fn test_invalid_config() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("chunks.toml"),
        "[output]\nchunk_loading_global = \"same\"\nhot_update_global = \"same\"\n",
    )
    .unwrap();

    chunks_cmd()
        .current_dir(dir.path())
        .arg("render")
        .assert()
        .failure()
        .stderr(predicate::str::contains("must differ"));
}

/// Test init writes a config that renders
#[test]
fn test_init_then_render() {
    let dir = TempDir::new().unwrap();

    chunks_cmd()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    assert!(dir.path().join("chunks.toml").exists());
    assert!(dir.path().join("src/lazy.js").exists());

    chunks_cmd()
        .current_dir(dir.path())
        .arg("render")
        .assert()
        .success()
        .stdout(predicate::str::contains("script.dataset.component = \"chunk\";"))
        .stdout(predicate::str::contains("__component_require__.F.j = function(chunkId) {"));

    chunks_cmd()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}
