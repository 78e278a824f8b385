//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::PipelineConfig;
use crate::engine::{read_wav, write_wav};
use crate::error::{PipelineError, Result};
use crate::pipeline::{PipelineController, Preset, SoundCategory, SourceHandle};

/// Options for [`render`], mirroring the `render` subcommand
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub preset: Option<String>,
    pub amplify: Option<u8>,
    pub volume: Option<f32>,
    pub suppress: Vec<String>,
    pub config: Option<PathBuf>,
    pub block_size: usize,
}

/// Summary of a finished render
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSummary {
    pub frames: usize,
    pub channels: usize,
    pub sample_rate: u32,
    pub preset: String,
    pub suppressed: Vec<String>,
    pub input_peak_db: f32,
    pub output_peak_db: f32,
}

/// Run a WAV file through the pipeline and write the result.
pub fn render(options: &RenderOptions) -> Result<RenderSummary> {
    let mut config = match &options.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(preset) = &options.preset {
        config.preset = preset.clone();
    }
    if let Some(volume) = options.volume {
        config.volume = volume;
    }
    config.validate()?;

    let mut buffer = read_wav(&options.input)?;
    let input_peak_db = peak_db(&buffer);
    info!(
        "Loaded {} ({} ch, {} Hz, {} frames)",
        options.input.display(),
        buffer.num_channels(),
        buffer.sample_rate(),
        buffer.num_samples()
    );

    let (mut controller, mut processor) = PipelineController::new(config)?;
    let source = SourceHandle::for_buffer(display_name(&options.input), &buffer);
    controller.assemble(&source)?;

    // An explicit amplify level is a user action after load, so it wins
    // over the preset's compressor settings.
    if let Some(level) = options.amplify {
        controller.set_amplify_quiet(level);
    }

    controller.set_detected(SoundCategory::catalog());
    for category in &options.suppress {
        let band = SoundCategory::find(category)
            .map(|c| c.band)
            .ok_or_else(|| PipelineError::UnknownCategory {
                category: category.clone(),
            })?;
        controller.suppress_category(category, band)?;
    }

    processor.process_whole(&mut buffer, options.block_size);
    controller.collect_retired();

    write_wav(&buffer, &options.output)?;
    info!("Wrote {}", options.output.display());

    Ok(RenderSummary {
        frames: buffer.num_samples(),
        channels: buffer.num_channels(),
        sample_rate: buffer.sample_rate(),
        preset: controller.active_preset().id.to_string(),
        suppressed: controller.suppressed(),
        input_peak_db,
        output_peak_db: peak_db(&buffer),
    })
}

/// Print the preset table.
pub fn list_presets() {
    println!("{:<10} {:>6} {:>6} {:>6} {:>5}  {}", "ID", "LOW", "MID", "HIGH", "COMP", "DESCRIPTION");
    println!("{:-<72}", "");
    for preset in Preset::all() {
        println!(
            "{:<10} {:>6.1} {:>6.1} {:>6.1} {:>5}  {}",
            preset.id,
            preset.eq_low_gain_db,
            preset.eq_mid_gain_db,
            preset.eq_high_gain_db,
            preset.compression_level,
            preset.description
        );
    }
}

/// Print the sound category catalogue.
pub fn list_categories() {
    println!("{:<20} {:<28} {:>14}", "ID", "NAME", "BAND");
    println!("{:-<64}", "");
    for category in SoundCategory::catalog() {
        println!(
            "{:<20} {:<28} {:>14}",
            category.id,
            category.display_name,
            category.band.to_string()
        );
    }
}

pub fn print_summary(summary: &RenderSummary) {
    println!("=== Render Complete ===");
    println!(
        "Frames: {} ({} ch @ {} Hz)",
        summary.frames, summary.channels, summary.sample_rate
    );
    println!("Preset: {}", summary.preset);
    if summary.suppressed.is_empty() {
        println!("Suppressed: none");
    } else {
        println!("Suppressed: {}", summary.suppressed.join(", "));
    }
    println!(
        "Peak: {:.1} dBFS -> {:.1} dBFS",
        summary.input_peak_db, summary.output_peak_db
    );
}

fn peak_db(buffer: &crate::engine::AudioBuffer) -> f32 {
    (0..buffer.num_channels())
        .map(|ch| buffer.peak_db(ch))
        .fold(crate::engine::SILENCE_FLOOR_DB, f32::max)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generate_test_tone;
    use tempfile::tempdir;

    #[test]
    fn test_render_round_trip() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");
        write_wav(&generate_test_tone(440.0, 0.25, 48000, 2), &input).unwrap();

        let summary = render(&RenderOptions {
            input,
            output: output.clone(),
            preset: Some("speech".to_string()),
            suppress: vec!["dog_bark".to_string()],
            block_size: 256,
            ..RenderOptions::default()
        })
        .unwrap();

        assert_eq!(summary.frames, 12000);
        assert_eq!(summary.channels, 2);
        assert_eq!(summary.preset, "speech");
        assert_eq!(summary.suppressed, vec!["dog_bark".to_string()]);
        assert!(output.exists());
        assert_eq!(read_wav(&output).unwrap().num_samples(), 12000);
    }

    #[test]
    fn test_render_unknown_category() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.wav");
        write_wav(&generate_test_tone(440.0, 0.05, 48000, 1), &input).unwrap();

        let err = render(&RenderOptions {
            input,
            output: dir.path().join("out.wav"),
            suppress: vec!["thunder".to_string()],
            block_size: 256,
            ..RenderOptions::default()
        })
        .unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_CATEGORY");
    }

    #[test]
    fn test_render_missing_input() {
        let dir = tempdir().unwrap();
        let err = render(&RenderOptions {
            input: dir.path().join("missing.wav"),
            output: dir.path().join("out.wav"),
            block_size: 256,
            ..RenderOptions::default()
        })
        .unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
