//! Command-line interface for Component chunk loading
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `render`: Render chunk-loading code for a chunks.toml
//! - `init`: Write a sample chunks.toml

mod init;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

pub use init::InitCommand;
pub use render::{compile, load_graph, RenderCommand};

/// Component Reborn - chunk-loading runtime generator
#[derive(Parser, Debug)]
#[command(name = "component-chunks")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to chunks.toml config file
    #[arg(short, long, global = true, default_value = "chunks.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render every chunk with its chunk-loading runtime
    Render(RenderCommand),

    /// Write a sample configuration
    Init(InitCommand),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        print_banner();

        match &self.command {
            Commands::Render(cmd) => cmd.execute(&self.config).await,
            Commands::Init(cmd) => cmd.execute().await,
        }
    }
}

/// Print the Component banner
fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "⚡".cyan(),
        "Component chunks".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
