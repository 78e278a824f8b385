//! Dynamics processor
//!
//! Feed-forward design: linked peak detection across channels, a soft-knee
//! gain computer and one-pole attack/release smoothing of the applied gain.
//!
//! With `ratio >= 1` the stage is a conventional downward compressor.
//! With `ratio < 1` it lifts material below the threshold towards it
//! (upward compression), which is how the "amplify quiet sounds" control
//! works. Upward gain is capped at [`MAX_UPWARD_GAIN_DB`].

use crate::engine::{db_to_linear, linear_to_db, AudioBuffer};

use super::params::DynamicsSettings;

/// Ceiling on the gain an inverted ratio may apply
pub const MAX_UPWARD_GAIN_DB: f32 = 24.0;

/// Compute the static gain in dB for an input level in dB
pub fn compute_gain_db(settings: &DynamicsSettings, input_db: f32) -> f32 {
    let threshold = settings.threshold_db;
    let ratio = settings.ratio;
    let knee = settings.knee_db;
    let knee_start = threshold - knee / 2.0;
    let knee_end = threshold + knee / 2.0;

    let gain = if ratio >= 1.0 {
        let slope = 1.0 / ratio - 1.0;
        if knee > 0.0 && input_db > knee_start && input_db < knee_end {
            let over = input_db - knee_start;
            slope * over * over / (2.0 * knee)
        } else if input_db >= knee_end.max(threshold) {
            slope * (input_db - threshold)
        } else {
            0.0
        }
    } else {
        let slope = 1.0 - ratio;
        if knee > 0.0 && input_db > knee_start && input_db < knee_end {
            let under = knee_end - input_db;
            slope * under * under / (2.0 * knee)
        } else if input_db <= knee_start.min(threshold) {
            slope * (threshold - input_db)
        } else {
            0.0
        }
    };

    gain.min(MAX_UPWARD_GAIN_DB)
}

/// Per-stage dynamics state owned by the render path
#[derive(Debug, Clone)]
pub struct DynamicsKernel {
    settings: DynamicsSettings,
    attack_coeff: f32,
    release_coeff: f32,
    /// Smoothed gain currently applied (linear)
    gain: f32,
}

impl DynamicsKernel {
    pub fn new(settings: DynamicsSettings, sample_rate: u32) -> Self {
        let mut kernel = Self {
            settings,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            gain: 1.0,
        };
        kernel.configure(settings, sample_rate);
        kernel
    }

    /// Refresh settings and smoothing coefficients
    pub fn configure(&mut self, settings: DynamicsSettings, sample_rate: u32) {
        self.settings = settings;
        self.attack_coeff = time_coeff(settings.attack_secs, sample_rate);
        self.release_coeff = time_coeff(settings.release_secs, sample_rate);
    }

    pub fn settings(&self) -> &DynamicsSettings {
        &self.settings
    }

    /// Gain currently applied, in dB (positive when amplifying)
    pub fn current_gain_db(&self) -> f32 {
        linear_to_db(self.gain)
    }

    pub fn reset(&mut self) {
        self.gain = 1.0;
    }

    /// Carry the envelope over from a previous instance of the same stage
    pub fn adopt(&mut self, previous: &DynamicsKernel) {
        self.gain = previous.gain;
    }

    pub fn process(&mut self, buffer: &mut AudioBuffer) {
        let num_channels = buffer.num_channels();
        let num_samples = buffer.num_samples();

        for frame in 0..num_samples {
            let mut peak: f32 = 0.0;
            for ch in 0..num_channels {
                peak = peak.max(buffer.channel(ch)[frame].abs());
            }

            let target = db_to_linear(compute_gain_db(&self.settings, linear_to_db(peak)));

            // Attack when the gain moves away from unity, release when returning
            let attacking = (target - 1.0).abs() > (self.gain - 1.0).abs();
            let coeff = if attacking {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.gain = coeff * self.gain + (1.0 - coeff) * target;

            for ch in 0..num_channels {
                buffer.channel_mut(ch)[frame] *= self.gain;
            }
        }
    }
}

fn time_coeff(time_secs: f32, sample_rate: u32) -> f32 {
    let samples = time_secs * sample_rate as f32;
    if samples > 0.0 {
        (-1.0 / samples).exp()
    } else {
        0.0
    }
}
