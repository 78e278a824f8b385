//! Level analyzer
//!
//! Pass-through stage that accumulates peak and RMS over a fixed window of
//! frames and publishes the readings into its parameter block when the
//! window fills. Audio is never modified.

use crate::engine::{linear_to_db, AudioBuffer};

use super::params::StageParams;

#[derive(Debug, Clone)]
pub struct MeterKernel {
    window: usize,
    frames: usize,
    peak: f32,
    sum_squares: f64,
}

impl MeterKernel {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            frames: 0,
            peak: 0.0,
            sum_squares: 0.0,
        }
    }

    pub fn adopt(&mut self, previous: &MeterKernel) {
        if previous.window == self.window {
            self.frames = previous.frames;
            self.peak = previous.peak;
            self.sum_squares = previous.sum_squares;
        }
    }

    pub fn reset(&mut self) {
        self.frames = 0;
        self.peak = 0.0;
        self.sum_squares = 0.0;
    }

    pub fn process(&mut self, buffer: &AudioBuffer, params: &StageParams) {
        let num_channels = buffer.num_channels();
        if num_channels == 0 {
            return;
        }

        for frame in 0..buffer.num_samples() {
            for ch in 0..num_channels {
                let sample = buffer.channel(ch)[frame];
                self.peak = self.peak.max(sample.abs());
                self.sum_squares += (sample as f64) * (sample as f64);
            }
            self.frames += 1;

            if self.frames >= self.window {
                let rms = (self.sum_squares / (self.frames * num_channels) as f64).sqrt() as f32;
                params.publish_meter(linear_to_db(self.peak), linear_to_db(rms));
                self.reset();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::params::{DynamicsSettings, FilterSettings};
    use crate::engine::SILENCE_FLOOR_DB;
    use approx::assert_relative_eq;

    fn params() -> StageParams {
        StageParams::new(FilterSettings::new(1000.0, 0.0, 1.0), DynamicsSettings::default(), 1.0)
    }

    #[test]
    fn test_publishes_after_full_window() {
        let params = params();
        let mut meter = MeterKernel::new(8);
        let mut buffer = AudioBuffer::new(1, 4, 48000);
        buffer.channel_mut(0).fill(0.5);

        meter.process(&buffer, &params);
        assert_eq!(params.meter().0, SILENCE_FLOOR_DB);

        meter.process(&buffer, &params);
        let (peak, rms) = params.meter();
        assert_relative_eq!(peak, -6.0206, epsilon = 1e-3);
        assert_relative_eq!(rms, -6.0206, epsilon = 1e-3);
    }

    #[test]
    fn test_audio_passes_unchanged() {
        let params = params();
        let mut meter = MeterKernel::new(2);
        let mut buffer = AudioBuffer::new(2, 16, 48000);
        buffer.channel_mut(1).fill(0.25);
        let before = buffer.clone();
        meter.process(&buffer, &params);
        assert_eq!(buffer, before);
    }
}
