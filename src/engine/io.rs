//! WAV file I/O
//!
//! Decoding is outside the pipeline proper; these helpers exist so the CLI
//! and tests can feed real sample data through it. Integer WAVs are scaled
//! to [-1, 1] floats on import; export always writes 32-bit float.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::buffer::{AudioBuffer, MAX_CHANNELS};
use crate::error::{AssemblyError, PipelineError, Result};

/// Read a WAV file into a planar buffer
///
/// # Errors
/// * `Io` - If the file does not exist
/// * `Wav` - If the file is not a readable WAV
/// * `Assembly(UnsupportedCapability)` - If the channel count is outside 1..=8
pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(PipelineError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        )));
    }

    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    if channels == 0 || channels > MAX_CHANNELS {
        return Err(AssemblyError::UnsupportedCapability {
            capability: "channels".to_string(),
            detail: format!("{}-channel audio (1 to {} supported)", channels, MAX_CHANNELS),
        }
        .into());
    }

    let interleaved = read_samples_as_f32(reader, spec)?;
    AudioBuffer::from_interleaved(&interleaved, channels, spec.sample_rate)
}

/// Write a buffer as a 32-bit float WAV file
pub fn write_wav(buffer: &AudioBuffer, path: &Path) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.num_channels() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for sample in buffer.to_interleaved() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(())
}

/// Generate a sine tone on every channel
///
/// Useful for exercising the pipeline without a file on disk.
pub fn generate_test_tone(
    frequency: f32,
    duration_secs: f32,
    sample_rate: u32,
    num_channels: usize,
) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let mut buffer = AudioBuffer::new(num_channels, num_samples, sample_rate);
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;

    for channel in buffer.channels_mut() {
        for (i, sample) in channel.iter_mut().enumerate() {
            *sample = (angular_freq * i as f32).sin();
        }
    }

    buffer
}

fn read_samples_as_f32<R: std::io::Read>(reader: WavReader<R>, spec: WavSpec) -> Result<Vec<f32>> {
    match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map_err(PipelineError::from))
            .collect(),
        SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale).map_err(PipelineError::from))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    #[test]
    fn test_wav_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let tone = generate_test_tone(440.0, 0.05, 48000, 2);

        write_wav(&tone, &path).unwrap();
        let loaded = read_wav(&path).unwrap();

        assert_eq!(loaded.num_channels(), 2);
        assert_eq!(loaded.sample_rate(), 48000);
        assert_eq!(loaded.num_samples(), tone.num_samples());
        assert_relative_eq!(loaded.channel(0)[10], tone.channel(0)[10]);
    }

    #[test]
    fn test_read_int16_scales_to_unit_range() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("int.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(16384_i16).unwrap();
        writer.write_sample(-32768_i16).unwrap();
        writer.finalize().unwrap();

        let loaded = read_wav(&path).unwrap();
        assert_relative_eq!(loaded.channel(0)[0], 0.5);
        assert_relative_eq!(loaded.channel(0)[1], -1.0);
    }

    #[test]
    fn test_missing_file() {
        let err = read_wav(Path::new("/nonexistent/input.wav")).unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
