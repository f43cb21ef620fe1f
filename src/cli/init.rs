//! Configuration scaffolding command

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

/// Write a sample chunks.toml and the module files it references
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Target directory
    #[arg(default_value = ".")]
    pub dir: String,

    /// Overwrite an existing chunks.toml
    #[arg(short, long)]
    pub force: bool,
}

const SAMPLE_CONFIG: &str = r#"# Component chunk-loading configuration

[output]
global_object = "self"
chunk_loading_global = "componentChunk"
hot_update_global = "componentHotUpdate"
chunk_load_timeout = 120000
cross_origin_loading = "anonymous"
public_path = "/assets/"
chunk_filename = "[name].[id].js"

# Runtime chunk: bootstraps the module system and loads chunks on demand
[[chunks]]
id = "runtime"
runtime = true
requirements = ["ensure-chunk-handlers", "prefetch-chunk-handlers"]

[[chunks]]
id = "main"
modules = [{ id = "./src/main.js", path = "src/main.js" }]

[[chunks]]
id = 1
name = "lazy"
modules = [{ id = "./src/lazy.js", path = "src/lazy.js" }]

[[entrypoints]]
name = "main"
chunk = "main"
runtime = "runtime"
modules = ["./src/main.js"]

[[plugins]]
name = "attributes"
options = { tag = "script", attributes = { "dataset.component" = "chunk" } }
"#;

const MAIN_JS: &str = r#"__component_require__.e(1).then(function() {
	var lazy = __component_require__("./src/lazy.js");
	console.log(lazy.message);
});
"#;

const LAZY_JS: &str = r#"module.exports = { message: "loaded on demand" };
"#;

impl InitCommand {
    pub async fn execute(&self) -> Result<()> {
        let dir = Path::new(&self.dir);
        let config_path = dir.join("chunks.toml");

        if config_path.exists() && !self.force {
            anyhow::bail!(
                "{} already exists (use --force to overwrite)",
                config_path.display()
            );
        }

        eprintln!("{} Initializing chunk configuration...\n", "→".blue());

        let src_dir = dir.join("src");
        tokio::fs::create_dir_all(&src_dir)
            .await
            .context("Failed to create src directory")?;

        let files = [
            (config_path.clone(), SAMPLE_CONFIG),
            (src_dir.join("main.js"), MAIN_JS),
            (src_dir.join("lazy.js"), LAZY_JS),
        ];
        for (path, content) in &files {
            tokio::fs::write(path, content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("  {} Created {}", "✓".green(), path.display().to_string().cyan());
        }

        eprintln!("\n{} Configuration initialized!\n", "✓".green().bold());
        eprintln!("  Next steps:");
        if self.dir != "." {
            eprintln!("    {} cd {}", "→".dimmed(), self.dir.cyan());
        }
        eprintln!("    {} component-chunks render", "→".dimmed());
        eprintln!();

        Ok(())
    }
}
