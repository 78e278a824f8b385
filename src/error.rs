//! Error handling for the enhancement pipeline
//!
//! Out-of-domain parameter values are never errors: stage setters clamp them.
//! Structural no-ops (re-assembly, restoring an unsuppressed category) succeed silently.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failure to build the fixed stages for an audio source
///
/// Fatal to that source: the graph stays unassembled and nothing is left
/// connected to the sink.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssemblyError {
    #[error("Stage arena exhausted: {requested} stages requested, capacity {capacity}")]
    ResourceExhausted { requested: usize, capacity: usize },

    #[error("Unsupported capability '{capability}': {detail}")]
    UnsupportedCapability { capability: String, detail: String },
}

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Unknown preset: {preset}")]
    UnknownPreset { preset: String },

    #[error("Unknown sound category: {category}")]
    UnknownCategory { category: String },

    #[error("Invalid frequency band: {low_hz}-{high_hz} Hz")]
    InvalidBand { low_hz: f32, high_hz: f32 },

    #[error("Pipeline graph is not assembled")]
    NotAssembled,

    #[error("No room for another stage (capacity {capacity})")]
    StageLimit { capacity: usize },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            PipelineError::Assembly(AssemblyError::ResourceExhausted { .. }) => {
                "ASSEMBLY_RESOURCE_EXHAUSTED"
            }
            PipelineError::Assembly(AssemblyError::UnsupportedCapability { .. }) => {
                "ASSEMBLY_UNSUPPORTED"
            }
            PipelineError::UnknownPreset { .. } => "UNKNOWN_PRESET",
            PipelineError::UnknownCategory { .. } => "UNKNOWN_CATEGORY",
            PipelineError::InvalidBand { .. } => "INVALID_BAND",
            PipelineError::NotAssembled => "NOT_ASSEMBLED",
            PipelineError::StageLimit { .. } => "STAGE_LIMIT",
            PipelineError::InvalidConfig { .. } => "INVALID_CONFIG",
            PipelineError::Io(_) => "IO_ERROR",
            PipelineError::Wav(_) => "WAV_ERROR",
            PipelineError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the caller can reasonably retry
    ///
    /// Assembly failures are retryable with a new source; unknown presets
    /// and categories are programming errors.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::Assembly(_) | PipelineError::StageLimit { .. } | PipelineError::Io(_)
        )
    }
}
