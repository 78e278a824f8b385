//! Audio Enhancer CLI
//!
//! Command-line interface for the enhancement pipeline.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use audio_enhancer::cli::commands::{self, RenderOptions};
use audio_enhancer::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("Audio Enhancer v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Render {
            input,
            output,
            preset,
            amplify,
            volume,
            suppress,
            config,
            block_size,
        } => {
            let options = RenderOptions {
                input,
                output,
                preset,
                amplify,
                volume,
                suppress,
                config,
                block_size,
            };
            let summary = commands::render(&options)
                .with_context(|| format!("failed to render {}", options.input.display()))?;
            commands::print_summary(&summary);
        }
        Commands::Presets => commands::list_presets(),
        Commands::Categories => commands::list_categories(),
    }

    Ok(())
}
