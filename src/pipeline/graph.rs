//! Pipeline graph
//!
//! An arena of stages plus an ordered edge list. The assembled graph is a
//! single path:
//!
//! ```text
//! source -> analyzer -> compressor -> eq_low -> eq_mid -> eq_high -> [notch]* -> sink
//! ```
//!
//! Edges are only ever rewritten by [`PipelineGraph::splice_before_sink`] and
//! [`PipelineGraph::unsplice`], each of which replaces one edge with two (or
//! two with one) so there is never a dangling edge or a fork.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::EqConfig;
use crate::dsp::{DynamicsSettings, FilterSettings, Stage, StageId, StageKind};
use crate::error::{AssemblyError, PipelineError, Result};

/// Number of stages in an assembled graph without notches
pub const FIXED_STAGE_COUNT: usize = 7;

/// Directed connection between two stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: StageId,
    pub to: StageId,
}

/// Ids of the stages created at assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FixedStages {
    pub source: StageId,
    pub analyzer: StageId,
    pub compressor: StageId,
    pub eq_low: StageId,
    pub eq_mid: StageId,
    pub eq_high: StageId,
    pub sink: StageId,
}

impl FixedStages {
    /// Fixed stages in signal order
    pub fn in_order(&self) -> [StageId; FIXED_STAGE_COUNT] {
        [
            self.source,
            self.analyzer,
            self.compressor,
            self.eq_low,
            self.eq_mid,
            self.eq_high,
            self.sink,
        ]
    }
}

/// Initial parameter values for the fixed stages
#[derive(Debug, Clone, Copy)]
pub struct AssemblySeed {
    pub compressor: DynamicsSettings,
    pub volume: f32,
}

#[derive(Debug)]
pub struct PipelineGraph {
    stages: BTreeMap<StageId, Stage>,
    edges: Vec<Edge>,
    fixed: Option<FixedStages>,
    next_id: u64,
    capacity: usize,
}

impl PipelineGraph {
    pub fn new(capacity: usize) -> Self {
        Self {
            stages: BTreeMap::new(),
            edges: Vec::new(),
            fixed: None,
            next_id: 1,
            capacity,
        }
    }

    pub fn is_assembled(&self) -> bool {
        self.fixed.is_some()
    }

    pub fn fixed(&self) -> Option<&FixedStages> {
        self.fixed.as_ref()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Create and connect the fixed stages
    ///
    /// All stages are built before anything is committed, so a failure
    /// leaves the graph empty. Calling this on an assembled graph returns
    /// the existing stages unchanged.
    pub fn assemble(
        &mut self,
        eq: &EqConfig,
        seed: &AssemblySeed,
    ) -> std::result::Result<FixedStages, AssemblyError> {
        if let Some(fixed) = self.fixed {
            return Ok(fixed);
        }

        if self.capacity < FIXED_STAGE_COUNT {
            return Err(AssemblyError::ResourceExhausted {
                requested: FIXED_STAGE_COUNT,
                capacity: self.capacity,
            });
        }

        let mut next = self.next_id;
        let mut id = || {
            let allocated = StageId(next);
            next += 1;
            allocated
        };

        let built = [
            Stage::plain(id(), StageKind::PassthroughSource, "source", 1.0),
            Stage::plain(id(), StageKind::Analyzer, "analyzer", 1.0),
            Stage::compressor(id(), "compressor", seed.compressor),
            Stage::filter(
                id(),
                StageKind::LowShelfEq,
                "eq_low",
                FilterSettings::new(eq.low_hz, 0.0, eq.shelf_q),
            ),
            Stage::filter(
                id(),
                StageKind::PeakingEq,
                "eq_mid",
                FilterSettings::new(eq.mid_hz, 0.0, eq.mid_q),
            ),
            Stage::filter(
                id(),
                StageKind::HighShelfEq,
                "eq_high",
                FilterSettings::new(eq.high_hz, 0.0, eq.shelf_q),
            ),
            Stage::plain(id(), StageKind::Sink, "sink", seed.volume),
        ];
        self.next_id = next;

        let ids: Vec<StageId> = built.iter().map(Stage::id).collect();
        let fixed = FixedStages {
            source: ids[0],
            analyzer: ids[1],
            compressor: ids[2],
            eq_low: ids[3],
            eq_mid: ids[4],
            eq_high: ids[5],
            sink: ids[6],
        };

        for stage in built {
            self.stages.insert(stage.id(), stage);
        }
        self.edges = ids
            .windows(2)
            .map(|pair| Edge {
                from: pair[0],
                to: pair[1],
            })
            .collect();
        self.fixed = Some(fixed);

        tracing::debug!(stages = self.stages.len(), "fixed stages connected");
        Ok(fixed)
    }

    /// Drop every stage and edge, returning how many stages were released
    pub fn teardown(&mut self) -> usize {
        let released = self.stages.len();
        self.stages.clear();
        self.edges.clear();
        self.fixed = None;
        released
    }

    /// Insert a new filter stage on the edge that feeds the sink
    pub fn splice_before_sink(
        &mut self,
        kind: StageKind,
        label: impl Into<String>,
        settings: FilterSettings,
    ) -> Result<StageId> {
        let fixed = self.fixed.ok_or(PipelineError::NotAssembled)?;
        if self.stages.len() >= self.capacity {
            return Err(PipelineError::StageLimit {
                capacity: self.capacity,
            });
        }

        let index = self
            .edges
            .iter()
            .position(|e| e.to == fixed.sink)
            .ok_or(PipelineError::NotAssembled)?;

        let id = StageId(self.next_id);
        self.next_id += 1;
        let stage = Stage::filter(id, kind, label, settings);

        let upstream = self.edges[index].from;
        self.edges[index] = Edge {
            from: upstream,
            to: id,
        };
        self.edges.insert(
            index + 1,
            Edge {
                from: id,
                to: fixed.sink,
            },
        );
        self.stages.insert(id, stage);

        tracing::debug!(stage = %id, after = %upstream, "stage spliced before sink");
        Ok(id)
    }

    /// Remove a spliced stage, reconnecting its neighbours
    ///
    /// Fixed stages cannot be removed; `None` is returned for them and for
    /// unknown ids.
    pub fn unsplice(&mut self, id: StageId) -> Option<Stage> {
        let fixed = self.fixed?;
        if fixed.in_order().contains(&id) {
            tracing::warn!(stage = %id, "refusing to unsplice a fixed stage");
            return None;
        }

        let incoming = self.edges.iter().position(|e| e.to == id)?;
        let outgoing = self.edges.iter().position(|e| e.from == id)?;
        let upstream = self.edges[incoming].from;
        let downstream = self.edges[outgoing].to;

        self.edges[incoming] = Edge {
            from: upstream,
            to: downstream,
        };
        self.edges.remove(outgoing);

        tracing::debug!(stage = %id, "stage unspliced");
        self.stages.remove(&id)
    }

    pub fn stage(&self, id: StageId) -> Option<&Stage> {
        self.stages.get(&id)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Stages in signal order, walking edges from the source
    pub fn path(&self) -> Vec<StageId> {
        let Some(fixed) = self.fixed else {
            return Vec::new();
        };

        let mut path = Vec::with_capacity(self.stages.len());
        let mut current = fixed.source;
        path.push(current);
        while let Some(edge) = self.edges.iter().find(|e| e.from == current) {
            current = edge.to;
            path.push(current);
            if path.len() > self.stages.len() {
                // Cycle; validate() reports it
                break;
            }
        }
        path
    }

    /// Ids of stages of `kind`, in signal order
    pub fn ids_of_kind(&self, kind: StageKind) -> Vec<StageId> {
        self.path()
            .into_iter()
            .filter(|id| self.stages.get(id).map(Stage::kind) == Some(kind))
            .collect()
    }

    /// Check the single-path invariants
    ///
    /// Returns a description of the first violation found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let Some(fixed) = self.fixed else {
            return if self.stages.is_empty() && self.edges.is_empty() {
                Ok(())
            } else {
                Err("unassembled graph still holds stages".to_string())
            };
        };

        for edge in &self.edges {
            if !self.stages.contains_key(&edge.from) || !self.stages.contains_key(&edge.to) {
                return Err(format!("dangling edge {} -> {}", edge.from, edge.to));
            }
        }
        for id in self.stages.keys() {
            let outgoing = self.edges.iter().filter(|e| e.from == *id).count();
            let incoming = self.edges.iter().filter(|e| e.to == *id).count();
            let expected_out = usize::from(*id != fixed.sink);
            let expected_in = usize::from(*id != fixed.source);
            if outgoing != expected_out || incoming != expected_in {
                return Err(format!("{} has {} in / {} out edges", id, incoming, outgoing));
            }
        }

        let path = self.path();
        if path.len() != self.stages.len() || path.last() != Some(&fixed.sink) {
            return Err("path from source does not cover every stage".to_string());
        }
        if path[..FIXED_STAGE_COUNT - 1] != fixed.in_order()[..FIXED_STAGE_COUNT - 1] {
            return Err("fixed stages out of order".to_string());
        }
        let tail = &path[FIXED_STAGE_COUNT - 1..path.len() - 1];
        if tail
            .iter()
            .any(|id| self.stages.get(id).map(Stage::kind) != Some(StageKind::Notch))
        {
            return Err("non-notch stage between eq_high and sink".to_string());
        }

        Ok(())
    }
}
