//! Pipeline configuration
//!
//! Initial control values and the fixed EQ layout, loadable from JSON.
//! Missing fields fall back to defaults, so `{}` is a valid config.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::pipeline::preset::{Preset, MAX_LEVEL};

/// Corner frequencies and widths of the three fixed EQ bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqConfig {
    /// Low shelf corner (affects frequencies below)
    pub low_hz: f32,
    /// Peaking band center
    pub mid_hz: f32,
    pub mid_q: f32,
    /// High shelf corner (affects frequencies above)
    pub high_hz: f32,
    /// Shelf slope expressed as Q (1/sqrt(2) is a unit-slope shelf)
    pub shelf_q: f32,
}

impl Default for EqConfig {
    fn default() -> Self {
        Self {
            low_hz: 250.0,
            mid_hz: 1500.0,
            mid_q: 1.0,
            high_hz: 3500.0,
            shelf_q: std::f32::consts::FRAC_1_SQRT_2,
        }
    }
}

/// Top-level pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Preset applied when a source is assembled
    pub preset: String,
    /// Amplify-quiet level (0-10) seeded into the compressor at assembly
    pub amplify_quiet: u8,
    /// Output volume (0.0-1.0)
    pub volume: f32,
    /// Stage arena capacity, fixed stages included
    pub max_stages: usize,
    /// Analyzer window in frames
    pub analyzer_window: usize,
    pub eq: EqConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preset: "clarity".to_string(),
            amplify_quiet: 8,
            volume: 0.57,
            max_stages: 32,
            analyzer_window: 2048,
            eq: EqConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded pipeline config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        Preset::lookup(&self.preset)?;

        if self.amplify_quiet > MAX_LEVEL {
            return Err(invalid(format!(
                "amplify_quiet {} outside 0-{}",
                self.amplify_quiet, MAX_LEVEL
            )));
        }
        if !self.volume.is_finite() || !(0.0..=1.0).contains(&self.volume) {
            return Err(invalid(format!("volume {} outside 0.0-1.0", self.volume)));
        }
        if self.max_stages == 0 {
            return Err(invalid("max_stages must be at least 1".to_string()));
        }
        if self.analyzer_window == 0 {
            return Err(invalid("analyzer_window must be at least 1".to_string()));
        }

        let eq = &self.eq;
        let frequencies = [eq.low_hz, eq.mid_hz, eq.high_hz];
        if frequencies.iter().any(|f| !f.is_finite() || *f <= 0.0) {
            return Err(invalid("EQ frequencies must be positive".to_string()));
        }
        if !(eq.low_hz < eq.mid_hz && eq.mid_hz < eq.high_hz) {
            return Err(invalid("EQ bands must be ordered low < mid < high".to_string()));
        }
        if [eq.mid_q, eq.shelf_q].iter().any(|q| !q.is_finite() || *q <= 0.0) {
            return Err(invalid("EQ Q values must be positive".to_string()));
        }

        Ok(())
    }
}

fn invalid(reason: String) -> PipelineError {
    PipelineError::InvalidConfig { reason }
}
