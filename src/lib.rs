//! Audio Enhancer - live-reconfigurable enhancement pipeline
//!
//! A chain of signal-shaping stages (level analysis, dynamics, three-band EQ
//! and a variable bank of notch filters) that can be retuned and restructured
//! while audio is playing.
//!
//! # Architecture
//!
//! - Control side: [`pipeline::PipelineController`] owns the stage graph and
//!   applies presets, volume, amplify-quiet and category suppression.
//! - Render side: [`pipeline::BlockProcessor`] processes fixed-size blocks
//!   without locking or allocating; it receives new topologies between blocks.
//!
//! ```no_run
//! use audio_enhancer::{PipelineConfig, PipelineController, SourceHandle};
//!
//! let (mut controller, _processor) = PipelineController::new(PipelineConfig::default())?;
//! controller.assemble(&SourceHandle::new("speech.wav", 48000, 2))?;
//! controller.apply_preset("podcast")?;
//! # Ok::<(), audio_enhancer::PipelineError>(())
//! ```

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod pipeline;

pub use config::{EqConfig, PipelineConfig};
pub use error::{AssemblyError, PipelineError, Result};
pub use pipeline::{
    command_channel, AssemblyState, BlockProcessor, ControlCommand, FrequencyBand,
    PipelineController, Preset, SoundCategory, SourceHandle,
};
