//! Render-side stage state
//!
//! A [`StageKernel`] holds everything a stage needs to process audio that is
//! not shared with the control path: filter delay lines, envelopes, meter
//! accumulators. Kernels are built on the control thread with all storage
//! pre-sized, then moved into a render chain.

use crate::engine::AudioBuffer;

use super::analyzer::MeterKernel;
use super::biquad::{BiquadCoeffs, BiquadState, FilterShape};
use super::compressor::DynamicsKernel;
use super::params::StageParams;
use super::stage::StageKind;

#[derive(Debug, Clone)]
pub enum StageKernel {
    Passthrough,
    Meter(MeterKernel),
    Dynamics(DynamicsKernel),
    Filter {
        shape: FilterShape,
        coeffs: BiquadCoeffs,
        states: Vec<BiquadState>,
    },
    Level {
        /// Gain applied at the end of the previous block
        current: f32,
    },
}

impl StageKernel {
    /// Build a kernel for `kind`, configured from the current parameters
    pub fn build(
        kind: StageKind,
        params: &StageParams,
        sample_rate: u32,
        num_channels: usize,
        meter_window: usize,
    ) -> Self {
        let mut kernel = match kind {
            StageKind::PassthroughSource => StageKernel::Passthrough,
            StageKind::Analyzer => StageKernel::Meter(MeterKernel::new(meter_window)),
            StageKind::DynamicsCompressor => {
                StageKernel::Dynamics(DynamicsKernel::new(params.dynamics(), sample_rate))
            }
            StageKind::Sink => StageKernel::Level {
                current: params.level(),
            },
            StageKind::LowShelfEq | StageKind::PeakingEq | StageKind::HighShelfEq | StageKind::Notch => {
                StageKernel::Filter {
                    shape: FilterShape::for_kind(kind).unwrap_or(FilterShape::Peaking),
                    coeffs: BiquadCoeffs::identity(),
                    states: vec![BiquadState::default(); num_channels],
                }
            }
        };
        kernel.refresh(params, sample_rate);
        kernel
    }

    /// Re-read parameters after a control-side write. Bounded work, no allocation.
    pub fn refresh(&mut self, params: &StageParams, sample_rate: u32) {
        match self {
            StageKernel::Dynamics(dynamics) => dynamics.configure(params.dynamics(), sample_rate),
            StageKernel::Filter { shape, coeffs, .. } => {
                *coeffs = BiquadCoeffs::calculate(*shape, sample_rate as f64, &params.filter());
            }
            StageKernel::Passthrough | StageKernel::Meter(_) | StageKernel::Level { .. } => {}
        }
    }

    /// Carry state over from the previous instance of the same stage
    pub fn adopt(&mut self, previous: &StageKernel) {
        match (self, previous) {
            (StageKernel::Meter(meter), StageKernel::Meter(old)) => meter.adopt(old),
            (StageKernel::Dynamics(dynamics), StageKernel::Dynamics(old)) => dynamics.adopt(old),
            (StageKernel::Filter { states, .. }, StageKernel::Filter { states: old, .. }) => {
                if states.len() == old.len() {
                    states.copy_from_slice(old);
                }
            }
            (StageKernel::Level { current }, StageKernel::Level { current: old }) => *current = *old,
            _ => {}
        }
    }

    pub fn process(&mut self, buffer: &mut AudioBuffer, params: &StageParams) {
        match self {
            StageKernel::Passthrough => {}
            StageKernel::Meter(meter) => meter.process(buffer, params),
            StageKernel::Dynamics(dynamics) => dynamics.process(buffer),
            StageKernel::Filter { coeffs, states, .. } => {
                let channels = buffer.num_channels().min(states.len());
                for (ch, state) in states.iter_mut().enumerate().take(channels) {
                    for sample in buffer.channel_mut(ch) {
                        *sample = state.process(*sample, coeffs);
                    }
                }
            }
            StageKernel::Level { current } => {
                // Ramp across the block so volume moves never click
                let target = params.level();
                let num_samples = buffer.num_samples();
                if num_samples == 0 {
                    return;
                }
                let step = (target - *current) / num_samples as f32;
                for ch in 0..buffer.num_channels() {
                    let mut gain = *current;
                    for sample in buffer.channel_mut(ch) {
                        gain += step;
                        *sample *= gain;
                    }
                }
                *current = target;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::params::{DynamicsSettings, FilterSettings};
    use crate::engine::generate_test_tone;
    use approx::assert_relative_eq;

    fn params(level: f32) -> StageParams {
        StageParams::new(
            FilterSettings::new(692.82, 0.0, 0.866),
            DynamicsSettings::default(),
            level,
        )
    }

    #[test]
    fn test_notch_kernel_removes_tone() {
        let params = params(1.0);
        let mut kernel = StageKernel::build(StageKind::Notch, &params, 48000, 1, 2048);
        let mut buffer = generate_test_tone(692.82, 0.5, 48000, 1);
        kernel.process(&mut buffer, &params);

        let tail = &buffer.channel(0)[12000..];
        let peak = tail.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        assert!(peak < 0.01, "tone should be rejected, peak {}", peak);
    }

    #[test]
    fn test_level_kernel_ramps_to_target() {
        let params = params(1.0);
        let mut kernel = StageKernel::build(StageKind::Sink, &params, 48000, 1, 2048);
        params.store_level(0.5);

        let mut buffer = AudioBuffer::new(1, 64, 48000);
        buffer.channel_mut(0).fill(1.0);
        kernel.process(&mut buffer, &params);

        assert!(buffer.channel(0)[0] < 1.0 && buffer.channel(0)[0] > 0.5);
        assert_relative_eq!(buffer.channel(0)[63], 0.5, epsilon = 1e-5);

        buffer.channel_mut(0).fill(1.0);
        kernel.process(&mut buffer, &params);
        assert_relative_eq!(buffer.channel(0)[0], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_refresh_picks_up_new_filter_settings() {
        let params = params(1.0);
        let mut kernel = StageKernel::build(StageKind::PeakingEq, &params, 48000, 2, 2048);
        params.store_filter(FilterSettings::new(1500.0, 6.0, 1.0));
        kernel.refresh(&params, 48000);
        match kernel {
            StageKernel::Filter { coeffs, states, .. } => {
                assert_relative_eq!(coeffs.magnitude_db(1500.0, 48000.0), 6.0, epsilon = 1e-6);
                assert_eq!(states.len(), 2);
            }
            other => panic!("unexpected kernel {:?}", other),
        }
    }

    #[test]
    fn test_adopt_copies_filter_history() {
        let params = params(1.0);
        let mut old = StageKernel::build(StageKind::Notch, &params, 48000, 1, 2048);
        let mut buffer = generate_test_tone(440.0, 0.01, 48000, 1);
        old.process(&mut buffer, &params);

        let mut fresh = StageKernel::build(StageKind::Notch, &params, 48000, 1, 2048);
        fresh.adopt(&old);
        match (&fresh, &old) {
            (StageKernel::Filter { states: a, .. }, StageKernel::Filter { states: b, .. }) => {
                assert_eq!(a, b)
            }
            _ => panic!("expected filter kernels"),
        }
    }
}
