//! Real-time render path
//!
//! The control side turns the graph into an immutable [`RenderChain`] and
//! publishes it over a bounded channel. The [`BlockProcessor`] picks the
//! latest chain up between blocks, carries kernel state across by stage id,
//! and sends the old chain back so it is freed off the audio thread.
//!
//! Once a chain is installed, [`BlockProcessor::process`] takes no locks and
//! does not allocate. Parameter retunes arrive through the shared
//! [`StageParams`] blocks and are picked up via their version counters.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};

use crate::dsp::{StageId, StageKernel, StageParams};
use crate::engine::AudioBuffer;

use super::graph::PipelineGraph;

/// Retired chains waiting to be dropped by the control thread
const RETIRED_CAPACITY: usize = 4;

/// One stage as seen by the render side
#[derive(Debug)]
pub struct RenderNode {
    id: StageId,
    params: Arc<StageParams>,
    seen_version: u32,
    kernel: StageKernel,
}

impl RenderNode {
    fn process(&mut self, buffer: &mut AudioBuffer, sample_rate: u32) {
        let version = self.params.version();
        if version != self.seen_version {
            self.kernel.refresh(&self.params, sample_rate);
            self.seen_version = version;
        }
        self.kernel.process(buffer, &self.params);
    }
}

/// Immutable topology snapshot, pre-allocated on the control thread
#[derive(Debug)]
pub struct RenderChain {
    nodes: Vec<RenderNode>,
    sample_rate: u32,
}

impl RenderChain {
    /// Build kernels for every stage on the graph's path, in order
    pub fn build(
        graph: &PipelineGraph,
        sample_rate: u32,
        num_channels: usize,
        meter_window: usize,
    ) -> Self {
        let nodes = graph
            .path()
            .into_iter()
            .filter_map(|id| graph.stage(id))
            .map(|stage| {
                let params = Arc::clone(stage.params());
                // Read the version first: a write racing the build is then
                // seen as newer and refreshed on the first block.
                let seen_version = params.version();
                let kernel =
                    StageKernel::build(stage.kind(), &params, sample_rate, num_channels, meter_window);
                RenderNode {
                    id: stage.id(),
                    params,
                    seen_version,
                    kernel,
                }
            })
            .collect();

        Self { nodes, sample_rate }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn stage_ids(&self) -> Vec<StageId> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    /// Carry kernel state over from stages that survive the swap
    fn adopt(&mut self, previous: &RenderChain) {
        for node in &mut self.nodes {
            if let Some(old) = previous.nodes.iter().find(|o| o.id == node.id) {
                node.kernel.adopt(&old.kernel);
            }
        }
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        let sample_rate = self.sample_rate;
        for node in &mut self.nodes {
            node.process(buffer, sample_rate);
        }
    }
}

/// Create the connected publisher/processor pair
pub fn render_channel() -> (ChainPublisher, BlockProcessor) {
    let (chain_tx, chain_rx) = bounded::<Option<RenderChain>>(1);
    let (retired_tx, retired_rx) = bounded::<RenderChain>(RETIRED_CAPACITY);

    let publisher = ChainPublisher {
        tx: chain_tx,
        pending: chain_rx.clone(),
        retired: retired_rx,
        published: 0,
        superseded: 0,
    };
    let processor = BlockProcessor {
        chain: None,
        incoming: chain_rx,
        retired: retired_tx,
    };
    (publisher, processor)
}

/// Control-side end of the render channel
#[derive(Debug)]
pub struct ChainPublisher {
    tx: Sender<Option<RenderChain>>,
    /// Clone of the processor's receiver, used to reclaim unobserved chains
    pending: Receiver<Option<RenderChain>>,
    retired: Receiver<RenderChain>,
    published: u64,
    superseded: u64,
}

impl ChainPublisher {
    /// Hand a new topology to the processor; `None` detaches it (silence)
    ///
    /// A previously published chain the processor has not picked up yet is
    /// withdrawn first, so it never becomes audible.
    pub fn publish(&mut self, chain: Option<RenderChain>) {
        self.collect_retired();

        if let Ok(stale) = self.pending.try_recv() {
            self.superseded += 1;
            tracing::warn!(
                stages = stale.as_ref().map_or(0, RenderChain::len),
                "unobserved render chain superseded"
            );
        }

        let stages = chain.as_ref().map_or(0, RenderChain::len);
        match self.tx.try_send(chain) {
            Ok(()) => {
                self.published += 1;
                tracing::debug!(stages, "render chain published");
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(stages, "render slot occupied, chain dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!(stages, "block processor gone, chain dropped");
            }
        }
    }

    /// Drop chains the processor has finished with; returns how many
    pub fn collect_retired(&mut self) -> usize {
        self.retired.try_iter().count()
    }

    /// Whether a published chain is still waiting for the processor
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    /// Chains withdrawn before the processor observed them
    pub fn superseded(&self) -> u64 {
        self.superseded
    }
}

/// Real-time end of the render channel
#[derive(Debug)]
pub struct BlockProcessor {
    chain: Option<RenderChain>,
    incoming: Receiver<Option<RenderChain>>,
    retired: Sender<RenderChain>,
}

impl BlockProcessor {
    /// Process one block in place
    ///
    /// Topology changes take effect only here, between blocks. Without an
    /// installed chain the block is silenced.
    pub fn process(&mut self, buffer: &mut AudioBuffer) {
        self.swap_if_published();

        match self.chain.as_mut() {
            Some(chain) => chain.process(buffer),
            None => buffer.silence(),
        }
    }

    /// Offline helper: run a whole buffer through in `block_size` chunks
    pub fn process_whole(&mut self, buffer: &mut AudioBuffer, block_size: usize) {
        let block_size = block_size.max(1);
        let num_channels = buffer.num_channels();
        let total = buffer.num_samples();
        let mut block = AudioBuffer::new(num_channels, block_size, buffer.sample_rate());

        let mut start = 0;
        while start < total {
            let len = block_size.min(total - start);
            if len != block.num_samples() {
                block = AudioBuffer::new(num_channels, len, buffer.sample_rate());
            }
            for ch in 0..num_channels {
                block
                    .channel_mut(ch)
                    .copy_from_slice(&buffer.channel(ch)[start..start + len]);
            }
            self.process(&mut block);
            for ch in 0..num_channels {
                buffer.channel_mut(ch)[start..start + len].copy_from_slice(block.channel(ch));
            }
            start += len;
        }
    }

    /// Whether a chain is installed
    pub fn is_live(&self) -> bool {
        self.chain.is_some()
    }

    /// Ids of the installed chain's stages, in processing order
    pub fn stage_ids(&self) -> Vec<StageId> {
        self.chain.as_ref().map(RenderChain::stage_ids).unwrap_or_default()
    }

    fn swap_if_published(&mut self) {
        let next = match self.incoming.try_recv() {
            Ok(next) => next,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return,
        };

        let previous = match next {
            Some(mut chain) => {
                if let Some(old) = self.chain.as_ref() {
                    chain.adopt(old);
                }
                self.chain.replace(chain)
            }
            None => self.chain.take(),
        };

        if let Some(old) = previous {
            // A full return channel means the control side stopped collecting;
            // the chain is then dropped here.
            let _ = self.retired.try_send(old);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EqConfig;
    use crate::dsp::{DynamicsSettings, FilterSettings, StageKind};
    use crate::engine::generate_test_tone;
    use crate::pipeline::graph::AssemblySeed;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    fn graph(volume: f32) -> PipelineGraph {
        let mut graph = PipelineGraph::new(32);
        let seed = AssemblySeed {
            compressor: DynamicsSettings {
                ratio: 1.0,
                ..DynamicsSettings::default()
            },
            volume,
        };
        graph.assemble(&EqConfig::default(), &seed).unwrap();
        graph
    }

    #[test]
    fn test_no_chain_outputs_silence() {
        let (_publisher, mut processor) = render_channel();
        let mut buffer = generate_test_tone(440.0, 0.01, 48000, 2);
        processor.process(&mut buffer);
        assert!(buffer.channel(0).iter().all(|s| *s == 0.0));
        assert!(!processor.is_live());
    }

    #[test]
    fn test_published_chain_is_installed_at_block_boundary() {
        let graph = graph(0.5);
        let (mut publisher, mut processor) = render_channel();
        publisher.publish(Some(RenderChain::build(&graph, 48000, 1, 256)));
        assert!(publisher.has_pending());

        let mut buffer = AudioBuffer::new(1, 128, 48000);
        buffer.channel_mut(0).fill(0.1);
        processor.process(&mut buffer);

        assert!(!publisher.has_pending());
        assert_eq!(processor.stage_ids(), graph.path());
        assert_relative_eq!(buffer.channel(0)[127], 0.05, epsilon = 1e-4);
    }

    #[test]
    fn test_unobserved_chain_is_superseded() {
        let mut graph = graph(1.0);
        let (mut publisher, mut processor) = render_channel();
        publisher.publish(Some(RenderChain::build(&graph, 48000, 1, 256)));

        let notch = graph
            .splice_before_sink(StageKind::Notch, "notch", FilterSettings::new(692.8, 0.0, 0.866))
            .unwrap();
        publisher.publish(Some(RenderChain::build(&graph, 48000, 1, 256)));
        graph.unsplice(notch);
        publisher.publish(Some(RenderChain::build(&graph, 48000, 1, 256)));

        assert_eq!(publisher.superseded(), 2);
        let mut buffer = AudioBuffer::new(1, 64, 48000);
        processor.process(&mut buffer);
        assert_eq!(processor.stage_ids(), graph.path());
    }

    #[test]
    fn test_retired_chain_returns_to_control_side() {
        let graph = graph(1.0);
        let (mut publisher, mut processor) = render_channel();
        let mut buffer = AudioBuffer::new(1, 64, 48000);

        publisher.publish(Some(RenderChain::build(&graph, 48000, 1, 256)));
        processor.process(&mut buffer);
        publisher.publish(None);
        processor.process(&mut buffer);

        assert!(!processor.is_live());
        assert_eq!(publisher.collect_retired(), 1);
    }

    #[test]
    fn test_parameter_write_applies_without_republish() {
        let graph = graph(1.0);
        let sink = graph.fixed().unwrap().sink;
        let (mut publisher, mut processor) = render_channel();
        publisher.publish(Some(RenderChain::build(&graph, 48000, 1, 256)));

        let mut buffer = AudioBuffer::new(1, 64, 48000);
        buffer.channel_mut(0).fill(0.01);
        processor.process(&mut buffer);

        graph.stage(sink).unwrap().set_level(0.25);
        buffer.channel_mut(0).fill(0.01);
        processor.process(&mut buffer);
        assert_relative_eq!(buffer.channel(0)[63], 0.0025, epsilon = 1e-5);
        assert_eq!(publisher.published(), 1);
    }

    #[test]
    fn test_process_whole_handles_partial_tail() {
        let graph = graph(0.5);
        let (mut publisher, mut processor) = render_channel();
        publisher.publish(Some(RenderChain::build(&graph, 48000, 1, 256)));

        let mut buffer = AudioBuffer::new(1, 1000, 48000);
        buffer.channel_mut(0).fill(0.001);
        processor.process_whole(&mut buffer, 256);
        assert_relative_eq!(buffer.channel(0)[999], 0.0005, epsilon = 1e-5);
        assert!(buffer.is_finite());
    }
}
