//! Pipeline stages
//!
//! A [`Stage`] is the control-side handle to one node of the signal graph.
//! Parameter setters write through to the shared [`StageParams`] block, so a
//! retune takes effect on the next rendered block without rebuilding the node.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::params::{clamp_param, DynamicsSettings, FilterSettings, StageParams};

/// Stable identity of a stage within one graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StageId(pub u64);

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage-{}", self.0)
    }
}

/// Transform performed by a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Entry point for the decoded source
    PassthroughSource,
    /// Level metering, audio passes unchanged
    Analyzer,
    DynamicsCompressor,
    LowShelfEq,
    PeakingEq,
    HighShelfEq,
    /// Narrow band-reject filter for a suppressed sound category
    Notch,
    /// Output boundary, applies the volume
    Sink,
}

impl StageKind {
    /// Whether the kind is parameterised by [`FilterSettings`]
    pub fn is_filter(&self) -> bool {
        matches!(
            self,
            StageKind::LowShelfEq | StageKind::PeakingEq | StageKind::HighShelfEq | StageKind::Notch
        )
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::PassthroughSource => "source",
            StageKind::Analyzer => "analyzer",
            StageKind::DynamicsCompressor => "compressor",
            StageKind::LowShelfEq => "low-shelf",
            StageKind::PeakingEq => "peaking",
            StageKind::HighShelfEq => "high-shelf",
            StageKind::Notch => "notch",
            StageKind::Sink => "sink",
        };
        f.write_str(name)
    }
}

/// One node of the signal graph
#[derive(Debug)]
pub struct Stage {
    id: StageId,
    kind: StageKind,
    label: String,
    params: Arc<StageParams>,
}

impl Stage {
    /// Create a filter stage (EQ or notch)
    pub fn filter(id: StageId, kind: StageKind, label: impl Into<String>, settings: FilterSettings) -> Self {
        debug_assert!(kind.is_filter());
        let settings = settings.clamped(&FilterSettings::new(1000.0, 0.0, 1.0));
        Self::with_params(
            id,
            kind,
            label,
            StageParams::new(settings, DynamicsSettings::default(), 1.0),
        )
    }

    /// Create the dynamics compressor stage
    pub fn compressor(id: StageId, label: impl Into<String>, settings: DynamicsSettings) -> Self {
        let settings = settings.clamped(&DynamicsSettings::default());
        Self::with_params(
            id,
            StageKind::DynamicsCompressor,
            label,
            StageParams::new(FilterSettings::new(1000.0, 0.0, 1.0), settings, 1.0),
        )
    }

    /// Create a stage with no tunable parameters other than level
    pub fn plain(id: StageId, kind: StageKind, label: impl Into<String>, level: f32) -> Self {
        Self::with_params(
            id,
            kind,
            label,
            StageParams::new(
                FilterSettings::new(1000.0, 0.0, 1.0),
                DynamicsSettings::default(),
                level.clamp(0.0, 1.0),
            ),
        )
    }

    fn with_params(id: StageId, kind: StageKind, label: impl Into<String>, params: StageParams) -> Self {
        Self {
            id,
            kind,
            label: label.into(),
            params: Arc::new(params),
        }
    }

    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Shared parameter block, cloned into render chains
    pub fn params(&self) -> &Arc<StageParams> {
        &self.params
    }

    /// Overwrite filter settings in place
    ///
    /// Out-of-domain values are clamped. Ignored for non-filter stages.
    pub fn set_filter(&self, settings: FilterSettings) {
        if !self.kind.is_filter() {
            tracing::warn!(stage = %self.id, kind = %self.kind, "filter settings ignored");
            return;
        }
        let clamped = settings.clamped(&self.params.filter());
        tracing::debug!(stage = %self.id, label = %self.label, ?clamped, "filter updated");
        self.params.store_filter(clamped);
    }

    /// Overwrite only the gain of a filter stage
    pub fn set_gain_db(&self, gain_db: f32) {
        let current = self.params.filter();
        self.set_filter(FilterSettings { gain_db, ..current });
    }

    /// Overwrite dynamics settings in place. Ignored for non-compressor stages.
    pub fn set_dynamics(&self, settings: DynamicsSettings) {
        if self.kind != StageKind::DynamicsCompressor {
            tracing::warn!(stage = %self.id, kind = %self.kind, "dynamics settings ignored");
            return;
        }
        let clamped = settings.clamped(&self.params.dynamics());
        tracing::debug!(stage = %self.id, ?clamped, "dynamics updated");
        self.params.store_dynamics(clamped);
    }

    /// Overwrite the linear output level (0.0 to 1.0). Only meaningful for the sink.
    pub fn set_level(&self, level: f32) {
        let clamped = clamp_param("level", level, self.params.level(), 0.0, 1.0);
        self.params.store_level(clamped);
    }

    /// Point-in-time view of the stage's kind-relevant parameters
    pub fn snapshot(&self) -> StageSnapshot {
        StageSnapshot {
            id: self.id,
            kind: self.kind,
            label: self.label.clone(),
            filter: self.kind.is_filter().then(|| self.params.filter()),
            dynamics: (self.kind == StageKind::DynamicsCompressor).then(|| self.params.dynamics()),
            level: (self.kind == StageKind::Sink).then(|| self.params.level()),
        }
    }
}

/// Serializable copy of a stage's observable state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSnapshot {
    pub id: StageId,
    pub kind: StageKind,
    pub label: String,
    pub filter: Option<FilterSettings>,
    pub dynamics: Option<DynamicsSettings>,
    pub level: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_gain_keeps_frequency_and_q() {
        let stage = Stage::filter(
            StageId(1),
            StageKind::PeakingEq,
            "eq_mid",
            FilterSettings::new(1500.0, 0.0, 1.0),
        );
        stage.set_gain_db(3.0);
        let filter = stage.snapshot().filter.unwrap();
        assert_eq!(filter, FilterSettings::new(1500.0, 3.0, 1.0));
    }

    #[test]
    fn test_kind_mismatch_is_ignored() {
        let stage = Stage::plain(StageId(2), StageKind::Sink, "sink", 0.57);
        let before = stage.params().version();
        stage.set_dynamics(DynamicsSettings::default());
        stage.set_filter(FilterSettings::new(100.0, 1.0, 1.0));
        assert_eq!(stage.params().version(), before);
        assert!(stage.snapshot().dynamics.is_none());
    }

    #[test]
    fn test_level_clamped() {
        let stage = Stage::plain(StageId(3), StageKind::Sink, "sink", 0.5);
        stage.set_level(1.7);
        assert_eq!(stage.snapshot().level, Some(1.0));
        stage.set_level(-0.2);
        assert_eq!(stage.snapshot().level, Some(0.0));
    }

    #[test]
    fn test_snapshot_exposes_kind_relevant_fields() {
        let comp = Stage::compressor(StageId(4), "compressor", DynamicsSettings::default());
        let snap = comp.snapshot();
        assert!(snap.filter.is_none());
        assert_eq!(snap.dynamics, Some(DynamicsSettings::default()));
        assert_eq!(StageId(4).to_string(), "stage-4");
    }
}
