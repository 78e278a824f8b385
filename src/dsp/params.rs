//! Shared stage parameters
//!
//! Every stage owns one [`StageParams`] block behind an `Arc`. The control
//! path writes it, the render path reads it; each scalar is an `f32` stored
//! as bits in an `AtomicU32`, so a reader never observes a torn value.
//! Writers bump `version` after a complete update so the render side knows
//! when to recompute coefficients.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::engine::SILENCE_FLOOR_DB;

// Parameter domains. Values outside these are clamped, never rejected.
pub const MIN_FREQUENCY_HZ: f32 = 1.0;
pub const MAX_FREQUENCY_HZ: f32 = 96_000.0;
pub const MIN_Q: f32 = 1.0e-4;
pub const MAX_Q: f32 = 1000.0;
pub const MAX_FILTER_GAIN_DB: f32 = 40.0;
pub const MIN_THRESHOLD_DB: f32 = -100.0;
pub const MAX_THRESHOLD_DB: f32 = 0.0;
/// Ratios below 1 are allowed (they amplify quiet input); zero is not.
pub const MIN_RATIO: f32 = 0.05;
pub const MAX_RATIO: f32 = 20.0;
pub const MAX_KNEE_DB: f32 = 40.0;
pub const MAX_TIME_SECS: f32 = 1.0;

/// An `f32` that can be shared between threads without locking
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Frequency-domain settings for EQ and notch stages
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSettings {
    /// Center or corner frequency in Hz
    pub frequency_hz: f32,
    /// Boost/cut in dB (ignored by notch filters)
    pub gain_db: f32,
    /// Quality factor
    pub q: f32,
}

impl FilterSettings {
    pub fn new(frequency_hz: f32, gain_db: f32, q: f32) -> Self {
        Self {
            frequency_hz,
            gain_db,
            q,
        }
    }

    /// Clamp into the physical domain, keeping `previous` for non-finite input
    pub fn clamped(self, previous: &FilterSettings) -> Self {
        Self {
            frequency_hz: clamp_param(
                "frequency_hz",
                self.frequency_hz,
                previous.frequency_hz,
                MIN_FREQUENCY_HZ,
                MAX_FREQUENCY_HZ,
            ),
            gain_db: clamp_param(
                "gain_db",
                self.gain_db,
                previous.gain_db,
                -MAX_FILTER_GAIN_DB,
                MAX_FILTER_GAIN_DB,
            ),
            q: clamp_param("q", self.q, previous.q, MIN_Q, MAX_Q),
        }
    }
}

/// Dynamics compressor settings
///
/// `ratio` below 1 inverts the usual contract: the stage then lifts material
/// below the threshold instead of attenuating material above it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicsSettings {
    pub threshold_db: f32,
    pub ratio: f32,
    pub knee_db: f32,
    pub attack_secs: f32,
    pub release_secs: f32,
}

impl Default for DynamicsSettings {
    fn default() -> Self {
        Self {
            threshold_db: -24.0,
            ratio: 12.0,
            knee_db: 30.0,
            attack_secs: 0.003,
            release_secs: 0.25,
        }
    }
}

impl DynamicsSettings {
    /// Clamp into the physical domain, keeping `previous` for non-finite input
    pub fn clamped(self, previous: &DynamicsSettings) -> Self {
        Self {
            threshold_db: clamp_param(
                "threshold_db",
                self.threshold_db,
                previous.threshold_db,
                MIN_THRESHOLD_DB,
                MAX_THRESHOLD_DB,
            ),
            ratio: clamp_param("ratio", self.ratio, previous.ratio, MIN_RATIO, MAX_RATIO),
            knee_db: clamp_param("knee_db", self.knee_db, previous.knee_db, 0.0, MAX_KNEE_DB),
            attack_secs: clamp_param(
                "attack_secs",
                self.attack_secs,
                previous.attack_secs,
                0.0,
                MAX_TIME_SECS,
            ),
            release_secs: clamp_param(
                "release_secs",
                self.release_secs,
                previous.release_secs,
                0.0,
                MAX_TIME_SECS,
            ),
        }
    }
}

/// Clamp a single parameter, logging whenever the caller's value is altered
pub(crate) fn clamp_param(name: &str, value: f32, previous: f32, min: f32, max: f32) -> f32 {
    if !value.is_finite() {
        tracing::warn!(param = name, value = %value, "non-finite parameter ignored");
        return previous;
    }
    let clamped = value.clamp(min, max);
    if clamped != value {
        tracing::warn!(param = name, value, clamped, "parameter clamped to domain");
    }
    clamped
}

/// Lock-free parameter block shared by a stage handle and its render kernel
#[derive(Debug)]
pub struct StageParams {
    frequency_hz: AtomicF32,
    gain_db: AtomicF32,
    q: AtomicF32,
    threshold_db: AtomicF32,
    ratio: AtomicF32,
    knee_db: AtomicF32,
    attack_secs: AtomicF32,
    release_secs: AtomicF32,
    level: AtomicF32,
    meter_peak_db: AtomicF32,
    meter_rms_db: AtomicF32,
    version: AtomicU32,
}

impl StageParams {
    pub fn new(filter: FilterSettings, dynamics: DynamicsSettings, level: f32) -> Self {
        Self {
            frequency_hz: AtomicF32::new(filter.frequency_hz),
            gain_db: AtomicF32::new(filter.gain_db),
            q: AtomicF32::new(filter.q),
            threshold_db: AtomicF32::new(dynamics.threshold_db),
            ratio: AtomicF32::new(dynamics.ratio),
            knee_db: AtomicF32::new(dynamics.knee_db),
            attack_secs: AtomicF32::new(dynamics.attack_secs),
            release_secs: AtomicF32::new(dynamics.release_secs),
            level: AtomicF32::new(level),
            meter_peak_db: AtomicF32::new(SILENCE_FLOOR_DB),
            meter_rms_db: AtomicF32::new(SILENCE_FLOOR_DB),
            version: AtomicU32::new(0),
        }
    }

    /// Monotonic counter bumped after each complete write
    #[inline]
    pub fn version(&self) -> u32 {
        self.version.load(Ordering::Acquire)
    }

    pub fn filter(&self) -> FilterSettings {
        FilterSettings {
            frequency_hz: self.frequency_hz.load(),
            gain_db: self.gain_db.load(),
            q: self.q.load(),
        }
    }

    pub fn store_filter(&self, settings: FilterSettings) {
        self.frequency_hz.store(settings.frequency_hz);
        self.gain_db.store(settings.gain_db);
        self.q.store(settings.q);
        self.bump();
    }

    pub fn dynamics(&self) -> DynamicsSettings {
        DynamicsSettings {
            threshold_db: self.threshold_db.load(),
            ratio: self.ratio.load(),
            knee_db: self.knee_db.load(),
            attack_secs: self.attack_secs.load(),
            release_secs: self.release_secs.load(),
        }
    }

    pub fn store_dynamics(&self, settings: DynamicsSettings) {
        self.threshold_db.store(settings.threshold_db);
        self.ratio.store(settings.ratio);
        self.knee_db.store(settings.knee_db);
        self.attack_secs.store(settings.attack_secs);
        self.release_secs.store(settings.release_secs);
        self.bump();
    }

    /// Linear output level (sink volume)
    pub fn level(&self) -> f32 {
        self.level.load()
    }

    pub fn store_level(&self, level: f32) {
        self.level.store(level);
        self.bump();
    }

    /// Latest analyzer readings as (peak dBFS, RMS dBFS)
    pub fn meter(&self) -> (f32, f32) {
        (self.meter_peak_db.load(), self.meter_rms_db.load())
    }

    /// Written by the render side only; does not bump the version
    pub(crate) fn publish_meter(&self, peak_db: f32, rms_db: f32) {
        self.meter_peak_db.store(peak_db);
        self.meter_rms_db.store(rms_db);
    }

    fn bump(&self) {
        self.version.fetch_add(1, Ordering::Release);
    }
}
