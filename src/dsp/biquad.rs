//! Biquad filters for the EQ and notch stages
//!
//! Coefficients follow the Audio EQ Cookbook.
//! Reference: https://www.w3.org/2011/audio/audio-eq-cookbook.html

use std::f64::consts::PI;

use super::params::{FilterSettings, MAX_Q, MIN_Q};
use super::stage::StageKind;

/// Filter response shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterShape {
    LowShelf,
    Peaking,
    HighShelf,
    Notch,
}

impl FilterShape {
    pub fn for_kind(kind: StageKind) -> Option<Self> {
        match kind {
            StageKind::LowShelfEq => Some(FilterShape::LowShelf),
            StageKind::PeakingEq => Some(FilterShape::Peaking),
            StageKind::HighShelfEq => Some(FilterShape::HighShelf),
            StageKind::Notch => Some(FilterShape::Notch),
            _ => None,
        }
    }
}

/// Normalized biquad coefficients (all divided by a0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::identity()
    }
}

impl BiquadCoeffs {
    /// Pass-through coefficients
    pub fn identity() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    pub fn calculate(shape: FilterShape, sample_rate: f64, settings: &FilterSettings) -> Self {
        // Keep the corner strictly below Nyquist
        let nyquist = sample_rate / 2.0;
        let freq = (settings.frequency_hz as f64).clamp(1.0, nyquist * 0.999);
        let q = (settings.q as f64).clamp(MIN_Q as f64, MAX_Q as f64);
        let gain_db = settings.gain_db as f64;

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);
        let a = 10.0_f64.powf(gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match shape {
            FilterShape::Peaking => (
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            FilterShape::LowShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            FilterShape::HighShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            FilterShape::Notch => (1.0, -2.0 * cos_w0, 1.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Magnitude response at `frequency` in dB
    pub fn magnitude_db(&self, frequency: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * frequency / sample_rate;
        let (cos1, sin1) = (w.cos(), w.sin());
        let (cos2, sin2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = self.b0 + self.b1 * cos1 + self.b2 * cos2;
        let num_im = -(self.b1 * sin1 + self.b2 * sin2);
        let den_re = 1.0 + self.a1 * cos1 + self.a2 * cos2;
        let den_im = -(self.a1 * sin1 + self.a2 * sin2);

        let num = (num_re * num_re + num_im * num_im).sqrt();
        let den = (den_re * den_re + den_im * den_im).sqrt();
        20.0 * (num / den).max(1e-12).log10()
    }
}

/// Biquad delay line for one channel (Direct Form I)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    #[inline]
    pub fn process(&mut self, input: f32, coeffs: &BiquadCoeffs) -> f32 {
        let input = input as f64;
        let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output as f32
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: f64 = 48000.0;

    #[test]
    fn test_notch_rejects_center() {
        let coeffs = BiquadCoeffs::calculate(
            FilterShape::Notch,
            SR,
            &FilterSettings::new(692.82, 0.0, 0.866),
        );
        assert!(coeffs.magnitude_db(692.82, SR) < -60.0);
        assert!(coeffs.magnitude_db(20.0, SR).abs() < 0.5);
        assert!(coeffs.magnitude_db(15000.0, SR).abs() < 0.5);
    }

    #[test]
    fn test_peaking_gain_at_center() {
        let coeffs = BiquadCoeffs::calculate(
            FilterShape::Peaking,
            SR,
            &FilterSettings::new(1500.0, 3.0, 1.0),
        );
        assert_relative_eq!(coeffs.magnitude_db(1500.0, SR), 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_shelves() {
        let low = BiquadCoeffs::calculate(
            FilterShape::LowShelf,
            SR,
            &FilterSettings::new(250.0, -4.0, 0.7071),
        );
        assert_relative_eq!(low.magnitude_db(10.0, SR), -4.0, epsilon = 0.05);
        assert!(low.magnitude_db(10000.0, SR).abs() < 0.05);

        let high = BiquadCoeffs::calculate(
            FilterShape::HighShelf,
            SR,
            &FilterSettings::new(3500.0, 2.0, 0.7071),
        );
        assert_relative_eq!(high.magnitude_db(20000.0, SR), 2.0, epsilon = 0.1);
        assert!(high.magnitude_db(50.0, SR).abs() < 0.05);
    }

    #[test]
    fn test_zero_gain_eq_is_identity() {
        for shape in [FilterShape::LowShelf, FilterShape::Peaking, FilterShape::HighShelf] {
            let coeffs = BiquadCoeffs::calculate(shape, SR, &FilterSettings::new(1000.0, 0.0, 1.0));
            assert!(coeffs.magnitude_db(440.0, SR).abs() < 1e-9);
        }
    }

    #[test]
    fn test_frequency_above_nyquist_stays_stable() {
        let coeffs = BiquadCoeffs::calculate(
            FilterShape::Notch,
            8000.0,
            &FilterSettings::new(40000.0, 0.0, 1.0),
        );
        let mut state = BiquadState::default();
        let mut last = 0.0;
        for i in 0..4000 {
            last = state.process(if i == 0 { 1.0 } else { 0.0 }, &coeffs);
        }
        assert!(last.is_finite());
        assert!(last.abs() < 1e-2);
    }
}
