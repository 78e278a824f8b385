//! Live-reconfigurable enhancement pipeline
//!
//! The signal path is a single chain:
//! source, analyzer, compressor, three EQ bands, any number of notches, sink.
//! The [`PipelineController`] is the only way to change it; the
//! [`BlockProcessor`] renders it on the audio thread.

pub mod category;
pub mod command;
pub mod controller;
pub mod graph;
pub mod notch;
pub mod preset;
pub mod render;

pub use category::{FrequencyBand, SoundCategory};
pub use command::{command_channel, ControlCommand, DrainReport};
pub use controller::{AssemblyState, PipelineController, PipelineSnapshot, SourceHandle, SourceId};
pub use graph::{Edge, FixedStages, PipelineGraph};
pub use notch::NotchRegistry;
pub use preset::{amplify_quiet_settings, compression_settings, Preset};
pub use render::{BlockProcessor, ChainPublisher, RenderChain};
