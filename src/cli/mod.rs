//! CLI Module
//!
//! Command-line harness that runs WAV files through the pipeline offline.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Audio Enhancer - speech and clarity enhancement pipeline
#[derive(Parser, Debug)]
#[command(name = "enhancer-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process a WAV file through the enhancement pipeline
    #[command(name = "render")]
    Render {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file (32-bit float)
        #[arg(short, long)]
        output: PathBuf,

        /// Preset id (see `presets`)
        #[arg(short, long)]
        preset: Option<String>,

        /// Amplify quiet sounds, 0-10
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=10))]
        amplify: Option<u8>,

        /// Output volume, 0.0-1.0
        #[arg(long)]
        volume: Option<f32>,

        /// Sound category to suppress (repeatable, see `categories`)
        #[arg(short, long)]
        suppress: Vec<String>,

        /// JSON pipeline config
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Frames per processing block
        #[arg(long, default_value_t = 512)]
        block_size: usize,
    },

    /// List the available presets
    #[command(name = "presets")]
    Presets,

    /// List the known sound categories
    #[command(name = "categories")]
    Categories,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render() {
        let cli = Cli::try_parse_from([
            "enhancer-cli",
            "render",
            "-i",
            "in.wav",
            "-o",
            "out.wav",
            "--suppress",
            "dog_bark",
            "--suppress",
            "fan_noise",
            "--amplify",
            "8",
        ])
        .unwrap();
        match cli.command {
            Commands::Render {
                suppress,
                amplify,
                block_size,
                ..
            } => {
                assert_eq!(suppress, vec!["dog_bark", "fan_noise"]);
                assert_eq!(amplify, Some(8));
                assert_eq!(block_size, 512);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_amplify_out_of_range_rejected() {
        let result =
            Cli::try_parse_from(["enhancer-cli", "render", "-i", "a", "-o", "b", "--amplify", "11"]);
        assert!(result.is_err());
    }
}
