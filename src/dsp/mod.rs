//! DSP building blocks
//!
//! Stage handles and their shared parameter blocks live on the control
//! side; kernels (filters, dynamics, metering, output level) live on the
//! render side and read the parameter blocks without locking.

mod analyzer;
mod biquad;
mod compressor;
mod kernel;
mod params;
mod stage;

pub use analyzer::MeterKernel;
pub use biquad::{BiquadCoeffs, BiquadState, FilterShape};
pub use compressor::{compute_gain_db, DynamicsKernel, MAX_UPWARD_GAIN_DB};
pub use kernel::StageKernel;
pub use params::{
    AtomicF32, DynamicsSettings, FilterSettings, StageParams, MAX_FREQUENCY_HZ, MAX_Q, MAX_RATIO,
    MIN_FREQUENCY_HZ, MIN_Q, MIN_RATIO,
};
pub use stage::{Stage, StageId, StageKind, StageSnapshot};
