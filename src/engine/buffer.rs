//! Audio Buffer Management
//!
//! Planar sample blocks as they move through the render path. Blocks are
//! allocated by the caller once and reused; nothing here allocates while
//! processing.

use crate::error::{PipelineError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Floor used when converting silence to decibels
pub const SILENCE_FLOOR_DB: f32 = -96.0;

/// Largest channel count a source may carry
pub const MAX_CHANNELS: usize = 8;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns [`SILENCE_FLOOR_DB`] for zero or negative input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        SILENCE_FLOOR_DB
    } else {
        (20.0 * linear.log10()).max(SILENCE_FLOOR_DB)
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Planar audio block (one `Vec<f32>` per channel)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a zeroed buffer
    pub fn new(num_channels: usize, num_samples: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_samples]; num_channels],
            sample_rate,
        }
    }

    /// Create an audio buffer from interleaved sample data
    ///
    /// Fails when the data length is not a multiple of the channel count.
    pub fn from_interleaved(interleaved: &[f32], num_channels: usize, sample_rate: u32) -> Result<Self> {
        if num_channels == 0 {
            return Err(PipelineError::InvalidConfig {
                reason: "audio buffer needs at least one channel".to_string(),
            });
        }

        if interleaved.len() % num_channels != 0 {
            return Err(PipelineError::InvalidConfig {
                reason: format!(
                    "interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
            });
        }

        let num_samples = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_samples); num_channels];
        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Convert the buffer to interleaved format (L, R, L, R, ...)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.num_channels() * self.num_samples());
        for frame in 0..self.num_samples() {
            for channel in &self.samples {
                interleaved.push(channel[frame]);
            }
        }
        interleaved
    }

    /// Get the number of channels
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer holds no samples
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }

    /// Sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Read-only access to one channel
    ///
    /// # Panics
    /// Panics if `index` is out of range.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Mutable access to one channel
    ///
    /// # Panics
    /// Panics if `index` is out of range.
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    /// Iterate mutably over all channels
    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        self.samples.iter_mut().map(|ch| ch.as_mut_slice())
    }

    /// Get a single sample, `None` when out of range
    pub fn get(&self, channel: usize, index: usize) -> Option<f32> {
        self.samples.get(channel)?.get(index).copied()
    }

    /// Zero every sample in place
    pub fn silence(&mut self) {
        for channel in &mut self.samples {
            channel.fill(0.0);
        }
    }

    /// Check that every sample is finite (no NaN/Inf)
    pub fn is_finite(&self) -> bool {
        self.samples.iter().flatten().all(|s| s.is_finite())
    }

    /// Peak level of one channel in dBFS
    pub fn peak_db(&self, channel: usize) -> f32 {
        let peak = self.samples[channel]
            .iter()
            .map(|s| s.abs())
            .fold(0.0_f32, f32::max);
        linear_to_db(peak)
    }

    /// RMS level of one channel in dBFS
    pub fn rms_db(&self, channel: usize) -> f32 {
        let ch = &self.samples[channel];
        if ch.is_empty() {
            return SILENCE_FLOOR_DB;
        }
        let sum_squares: f64 = ch.iter().map(|&s| (s as f64) * (s as f64)).sum();
        linear_to_db((sum_squares / ch.len() as f64).sqrt() as f32)
    }
}
