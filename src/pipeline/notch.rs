//! Notch registry
//!
//! Maps a sound category to the notch stage currently suppressing it. The
//! registry never touches edges itself; it goes through the graph's splice
//! operations so the single-path invariant holds after every call.

use std::collections::BTreeMap;

use crate::dsp::{FilterSettings, StageId, StageKind};
use crate::error::Result;

use super::category::FrequencyBand;
use super::graph::PipelineGraph;

#[derive(Debug, Default)]
pub struct NotchRegistry {
    active: BTreeMap<String, StageId>,
}

impl NotchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splice a notch for `category` unless one is already active
    ///
    /// Returns the id of the active notch, new or existing.
    pub fn suppress(
        &mut self,
        graph: &mut PipelineGraph,
        category: &str,
        band: FrequencyBand,
    ) -> Result<StageId> {
        if let Some(&id) = self.active.get(category) {
            tracing::debug!(category, stage = %id, "category already suppressed");
            return Ok(id);
        }

        let settings = FilterSettings::new(band.center_hz(), 0.0, band.q());
        let id = graph.splice_before_sink(StageKind::Notch, format!("notch:{}", category), settings)?;
        self.active.insert(category.to_string(), id);
        tracing::debug!(category, %band, stage = %id, "category suppressed");
        Ok(id)
    }

    /// Unsplice the notch for `category`; returns whether one was removed
    pub fn restore(&mut self, graph: &mut PipelineGraph, category: &str) -> bool {
        let Some(id) = self.active.remove(category) else {
            return false;
        };
        let removed = graph.unsplice(id).is_some();
        tracing::debug!(category, stage = %id, removed, "category restored");
        removed
    }

    pub fn is_suppressed(&self, category: &str) -> bool {
        self.active.contains_key(category)
    }

    pub fn stage_for(&self, category: &str) -> Option<StageId> {
        self.active.get(category).copied()
    }

    /// Suppressed category ids in sorted order
    pub fn suppressed(&self) -> Vec<String> {
        self.active.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Forget every entry without touching the graph (used on teardown)
    pub fn clear(&mut self) {
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EqConfig;
    use crate::dsp::DynamicsSettings;
    use crate::pipeline::graph::AssemblySeed;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    fn graph() -> PipelineGraph {
        let mut graph = PipelineGraph::new(32);
        let seed = AssemblySeed {
            compressor: DynamicsSettings::default(),
            volume: 1.0,
        };
        graph.assemble(&EqConfig::default(), &seed).unwrap();
        graph
    }

    fn dog_bark() -> FrequencyBand {
        FrequencyBand::new(400.0, 1200.0).unwrap()
    }

    #[test]
    fn test_suppress_is_idempotent() {
        let mut graph = graph();
        let mut notches = NotchRegistry::new();

        let first = notches.suppress(&mut graph, "dog_bark", dog_bark()).unwrap();
        let second = notches.suppress(&mut graph, "dog_bark", dog_bark()).unwrap();
        assert_eq!(first, second);
        assert_eq!(graph.ids_of_kind(StageKind::Notch), vec![first]);

        let filter = graph.stage(first).unwrap().snapshot().filter.unwrap();
        assert_relative_eq!(filter.frequency_hz, 692.82, epsilon = 1e-2);
        assert_relative_eq!(filter.q, 0.866, epsilon = 1e-3);
    }

    #[test]
    fn test_restore_unsuppressed_is_noop() {
        let mut graph = graph();
        let mut notches = NotchRegistry::new();
        let before = graph.path();
        assert!(!notches.restore(&mut graph, "tv_noise"));
        assert_eq!(graph.path(), before);
    }

    #[test]
    fn test_spliced_set_matches_registry() {
        let mut graph = graph();
        let mut notches = NotchRegistry::new();
        for (id, low, high) in [("fan_noise", 50.0, 300.0), ("traffic", 80.0, 1000.0), ("toilet", 300.0, 900.0)] {
            notches
                .suppress(&mut graph, id, FrequencyBand::new(low, high).unwrap())
                .unwrap();
        }
        notches.restore(&mut graph, "traffic");

        assert_eq!(notches.suppressed(), vec!["fan_noise".to_string(), "toilet".to_string()]);
        let mut spliced = graph.ids_of_kind(StageKind::Notch);
        spliced.sort();
        let mut registered: Vec<StageId> = notches
            .suppressed()
            .iter()
            .filter_map(|c| notches.stage_for(c))
            .collect();
        registered.sort();
        assert_eq!(spliced, registered);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_suppress_before_assembly_fails_cleanly() {
        let mut graph = PipelineGraph::new(32);
        let mut notches = NotchRegistry::new();
        assert!(notches.suppress(&mut graph, "dog_bark", dog_bark()).is_err());
        assert!(notches.is_empty());
    }
}
