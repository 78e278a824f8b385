//! Pipeline controller
//!
//! The public facade. It owns the graph, the notch registry and the render
//! publisher, tracks per-source assembly state, and turns discrete control
//! events into stage writes and topology changes. Every operation is
//! synchronous: it returns with the pipeline either fully updated, untouched
//! (no-op) or reporting an error, never half-applied.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::dsp::{DynamicsSettings, StageId, StageKind, StageSnapshot};
use crate::engine::{AudioBuffer, MAX_CHANNELS};
use crate::error::{AssemblyError, PipelineError, Result};

use super::category::{FrequencyBand, SoundCategory};
use super::graph::{AssemblySeed, FixedStages, PipelineGraph};
use super::notch::NotchRegistry;
use super::preset::{amplify_quiet_settings, Preset, MAX_LEVEL};
use super::render::{render_channel, BlockProcessor, ChainPublisher, RenderChain};

pub const MIN_SAMPLE_RATE: u32 = 8_000;
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Identity of one loaded audio source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(Uuid);

impl SourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A decodable audio source handed over by the loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHandle {
    pub id: SourceId,
    pub name: String,
    pub sample_rate: u32,
    pub channels: usize,
}

impl SourceHandle {
    pub fn new(name: impl Into<String>, sample_rate: u32, channels: usize) -> Self {
        Self {
            id: SourceId::new(),
            name: name.into(),
            sample_rate,
            channels,
        }
    }

    /// Describe an already decoded buffer
    pub fn for_buffer(name: impl Into<String>, buffer: &AudioBuffer) -> Self {
        Self::new(name, buffer.sample_rate(), buffer.num_channels())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssemblyState {
    #[default]
    Unassembled,
    Assembling,
    Assembled,
}

impl fmt::Display for AssemblyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblyState::Unassembled => write!(f, "Unassembled"),
            AssemblyState::Assembling => write!(f, "Assembling"),
            AssemblyState::Assembled => write!(f, "Assembled"),
        }
    }
}

/// Serializable view of the whole pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSnapshot {
    pub state: AssemblyState,
    pub source: Option<SourceHandle>,
    pub preset: String,
    pub amplify_quiet: u8,
    pub volume: f32,
    /// Stages in signal order
    pub stages: Vec<StageSnapshot>,
    pub suppressed: Vec<String>,
}

#[derive(Debug)]
pub struct PipelineController {
    config: PipelineConfig,
    graph: PipelineGraph,
    notches: NotchRegistry,
    publisher: ChainPublisher,
    state: AssemblyState,
    source: Option<SourceHandle>,
    active_preset: &'static Preset,
    amplify_quiet: u8,
    volume: f32,
    detected: Vec<SoundCategory>,
}

impl PipelineController {
    /// Create a controller and the block processor it feeds
    ///
    /// The processor belongs on the audio thread; it outputs silence until a
    /// source is assembled.
    pub fn new(config: PipelineConfig) -> Result<(Self, BlockProcessor)> {
        config.validate()?;
        let active_preset = Preset::lookup(&config.preset)?;
        let (publisher, processor) = render_channel();

        let controller = Self {
            graph: PipelineGraph::new(config.max_stages),
            notches: NotchRegistry::new(),
            publisher,
            state: AssemblyState::Unassembled,
            source: None,
            active_preset,
            amplify_quiet: config.amplify_quiet,
            volume: config.volume,
            detected: Vec::new(),
            config,
        };
        Ok((controller, processor))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Build the fixed stages for `source`
    ///
    /// A no-op when already assembled for the same source. A different
    /// source replaces the current one. On failure the pipeline is left
    /// unassembled with nothing connected.
    pub fn assemble(&mut self, source: &SourceHandle) -> Result<()> {
        if self.is_assembled_for(source) {
            tracing::debug!(source = %source.id, "already assembled, skipping");
            return Ok(());
        }
        if self.state == AssemblyState::Assembled {
            self.release_source();
        }

        self.state = AssemblyState::Assembling;
        match self.build_fixed(source) {
            Ok(fixed) => {
                self.source = Some(source.clone());
                self.state = AssemblyState::Assembled;
                self.republish();
                tracing::info!(
                    source = %source.id,
                    name = %source.name,
                    sample_rate = source.sample_rate,
                    channels = source.channels,
                    preset = self.active_preset.id,
                    sink = %fixed.sink,
                    "pipeline assembled"
                );
                Ok(())
            }
            Err(err) => {
                self.graph.teardown();
                self.notches.clear();
                self.state = AssemblyState::Unassembled;
                tracing::warn!(source = %source.id, error = %err, "assembly failed");
                Err(err.into())
            }
        }
    }

    fn build_fixed(&mut self, source: &SourceHandle) -> std::result::Result<FixedStages, AssemblyError> {
        self.check_capabilities(source)?;

        // Amplify-quiet seeds the compressor, then the preset overwrites it
        let seed = AssemblySeed {
            compressor: amplify_quiet_settings(self.amplify_quiet),
            volume: self.volume,
        };
        let fixed = self.graph.assemble(&self.config.eq, &seed)?;
        self.write_preset(&fixed, self.active_preset);
        Ok(fixed)
    }

    fn check_capabilities(&self, source: &SourceHandle) -> std::result::Result<(), AssemblyError> {
        if source.channels == 0 || source.channels > MAX_CHANNELS {
            return Err(AssemblyError::UnsupportedCapability {
                capability: "channels".to_string(),
                detail: format!("{} channels (supported: 1-{})", source.channels, MAX_CHANNELS),
            });
        }
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&source.sample_rate) {
            return Err(AssemblyError::UnsupportedCapability {
                capability: "sample_rate".to_string(),
                detail: format!(
                    "{} Hz (supported: {}-{} Hz)",
                    source.sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
                ),
            });
        }
        let nyquist = source.sample_rate as f32 / 2.0;
        if self.config.eq.high_hz >= nyquist {
            return Err(AssemblyError::UnsupportedCapability {
                capability: "eq_high".to_string(),
                detail: format!(
                    "high shelf at {} Hz is above Nyquist ({} Hz)",
                    self.config.eq.high_hz, nyquist
                ),
            });
        }
        Ok(())
    }

    /// Drop the current source, its stages and its detections
    pub fn release_source(&mut self) {
        let released = self.graph.teardown();
        self.notches.clear();
        self.detected.clear();
        self.publisher.publish(None);
        if let Some(source) = self.source.take() {
            tracing::info!(source = %source.id, stages = released, "source released");
        }
        self.state = AssemblyState::Unassembled;
    }

    /// Release the current source and assemble `source` in its place
    pub fn replace_source(&mut self, source: &SourceHandle) -> Result<()> {
        self.release_source();
        self.assemble(source)
    }

    /// Make `preset_id` active and write its values to the live stages
    ///
    /// Unknown ids are rejected. Before assembly the id is only recorded;
    /// assembly applies it.
    pub fn apply_preset(&mut self, preset_id: &str) -> Result<()> {
        let preset = Preset::lookup(preset_id)?;
        self.active_preset = preset;

        match self.graph.fixed().copied() {
            Some(fixed) => {
                self.write_preset(&fixed, preset);
                tracing::info!(preset = preset.id, "preset applied");
            }
            None => tracing::debug!(preset = preset.id, "preset recorded, pipeline not assembled"),
        }
        Ok(())
    }

    fn write_preset(&self, fixed: &FixedStages, preset: &Preset) {
        let gains = [
            (fixed.eq_low, preset.eq_low_gain_db),
            (fixed.eq_mid, preset.eq_mid_gain_db),
            (fixed.eq_high, preset.eq_high_gain_db),
        ];
        for (id, gain_db) in gains {
            if let Some(stage) = self.graph.stage(id) {
                stage.set_gain_db(gain_db);
            }
        }
        if let Some(stage) = self.graph.stage(fixed.compressor) {
            stage.set_dynamics(preset.compression());
        }
    }

    /// Drive the compressor from the amplify-quiet scale (0-10)
    ///
    /// Overwrites whatever the last preset wrote to the compressor.
    pub fn set_amplify_quiet(&mut self, level: u8) {
        if level > MAX_LEVEL {
            tracing::warn!(level, max = MAX_LEVEL, "amplify-quiet level clamped");
        }
        self.amplify_quiet = level.min(MAX_LEVEL);

        if let Some(stage) = self.compressor_id().and_then(|id| self.graph.stage(id)) {
            stage.set_dynamics(amplify_quiet_settings(self.amplify_quiet));
            tracing::debug!(level = self.amplify_quiet, "amplify-quiet applied");
        }
    }

    /// Set the sink gain (0.0-1.0); touches no other stage
    pub fn set_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            tracing::warn!(volume = %volume, "non-finite volume ignored");
            return;
        }
        let clamped = volume.clamp(0.0, 1.0);
        if clamped != volume {
            tracing::warn!(volume, clamped, "volume clamped");
        }
        self.volume = clamped;

        if let Some(stage) = self.graph.fixed().and_then(|f| self.graph.stage(f.sink)) {
            stage.set_level(clamped);
        }
    }

    /// Splice a notch for `category` targeting `band`
    ///
    /// Idempotent. A silent no-op while unassembled.
    pub fn suppress_category(&mut self, category: &str, band: FrequencyBand) -> Result<()> {
        if !self.graph.is_assembled() {
            tracing::debug!(category, "suppress ignored, pipeline not assembled");
            return Ok(());
        }
        if self.notches.is_suppressed(category) {
            return Ok(());
        }
        self.notches.suppress(&mut self.graph, category, band)?;
        self.republish();
        Ok(())
    }

    /// Remove the notch for `category`, if any
    pub fn restore_category(&mut self, category: &str) {
        if self.notches.restore(&mut self.graph, category) {
            self.republish();
        }
    }

    /// Flip suppression of a detected category; returns the new state
    pub fn toggle_category(&mut self, category: &str) -> Result<bool> {
        let band = self
            .detected
            .iter()
            .find(|c| c.id == category)
            .map(|c| c.band)
            .ok_or_else(|| PipelineError::UnknownCategory {
                category: category.to_string(),
            })?;

        if self.notches.is_suppressed(category) {
            self.restore_category(category);
        } else {
            self.suppress_category(category, band)?;
        }
        Ok(self.notches.is_suppressed(category))
    }

    /// Replace the list of categories detected in the current source
    pub fn set_detected(&mut self, categories: Vec<SoundCategory>) {
        tracing::debug!(count = categories.len(), "detections updated");
        self.detected = categories;
    }

    pub fn detected(&self) -> &[SoundCategory] {
        &self.detected
    }

    pub fn is_suppressed(&self, category: &str) -> bool {
        self.notches.is_suppressed(category)
    }

    pub fn suppressed(&self) -> Vec<String> {
        self.notches.suppressed()
    }

    pub fn assembly_state(&self) -> AssemblyState {
        self.state
    }

    pub fn source(&self) -> Option<&SourceHandle> {
        self.source.as_ref()
    }

    pub fn active_preset(&self) -> &'static Preset {
        self.active_preset
    }

    pub fn amplify_quiet(&self) -> u8 {
        self.amplify_quiet
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Live (low, mid, high) EQ gains in dB
    pub fn eq_gains(&self) -> Option<(f32, f32, f32)> {
        let fixed = self.graph.fixed()?;
        let gain = |id: StageId| self.graph.stage(id).map(|s| s.params().filter().gain_db);
        Some((gain(fixed.eq_low)?, gain(fixed.eq_mid)?, gain(fixed.eq_high)?))
    }

    /// Live compressor parameters
    pub fn compressor_settings(&self) -> Option<DynamicsSettings> {
        let id = self.compressor_id()?;
        self.graph.stage(id).map(|s| s.params().dynamics())
    }

    /// Live sink gain
    pub fn sink_level(&self) -> Option<f32> {
        let fixed = self.graph.fixed()?;
        self.graph.stage(fixed.sink).map(|s| s.params().level())
    }

    /// Snapshots of the spliced notch stages, in signal order
    pub fn notch_stages(&self) -> Vec<StageSnapshot> {
        self.graph
            .ids_of_kind(StageKind::Notch)
            .into_iter()
            .filter_map(|id| self.graph.stage(id).map(|s| s.snapshot()))
            .collect()
    }

    /// Latest analyzer readings as (peak dBFS, RMS dBFS)
    pub fn levels(&self) -> Option<(f32, f32)> {
        let fixed = self.graph.fixed()?;
        self.graph.stage(fixed.analyzer).map(|s| s.params().meter())
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            state: self.state,
            source: self.source.clone(),
            preset: self.active_preset.id.to_string(),
            amplify_quiet: self.amplify_quiet,
            volume: self.volume,
            stages: self
                .graph
                .path()
                .into_iter()
                .filter_map(|id| self.graph.stage(id).map(|s| s.snapshot()))
                .collect(),
            suppressed: self.notches.suppressed(),
        }
    }

    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    /// Render chains withdrawn before the processor observed them
    pub fn superseded_chains(&self) -> u64 {
        self.publisher.superseded()
    }

    /// Free chains the processor has retired
    pub fn collect_retired(&mut self) -> usize {
        self.publisher.collect_retired()
    }

    fn is_assembled_for(&self, source: &SourceHandle) -> bool {
        self.state == AssemblyState::Assembled
            && self.source.as_ref().map(|s| s.id) == Some(source.id)
    }

    fn compressor_id(&self) -> Option<StageId> {
        self.graph.fixed().map(|f| f.compressor)
    }

    fn republish(&mut self) {
        let Some(source) = self.source.as_ref() else {
            return;
        };
        let chain = RenderChain::build(
            &self.graph,
            source.sample_rate,
            source.channels,
            self.config.analyzer_window,
        );
        self.publisher.publish(Some(chain));
    }
}
