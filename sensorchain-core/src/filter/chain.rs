//! Filter chain container and dispatch
//!
//! The chain owns its stages in order; "next" is simply the following slot.
//! Each slot carries a [`StageId`] allocated when the stage is added, which is
//! the identity timers are keyed by.

use alloc::boxed::Box;
use heapless::Vec;

use crate::{
    constants::MAX_CHAIN_STAGES,
    errors::{FilterError, FilterResult},
    scheduler::{StageId, TimerKey},
};

use super::{Filter, FilterContext, TimerDispatch};

struct Node {
    id: StageId,
    filter: Box<dyn Filter>,
}

/// Ordered, bounded list of filter stages
pub struct FilterChain {
    nodes: Vec<Node, MAX_CHAIN_STAGES>,
}

impl FilterChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Start building a chain
    pub fn builder() -> ChainBuilder {
        ChainBuilder::new()
    }

    /// Append a stage
    pub fn add<F: Filter + 'static>(&mut self, filter: F) -> FilterResult<()> {
        self.add_boxed(Box::new(filter))
    }

    /// Append an already boxed stage
    pub fn add_boxed(&mut self, filter: Box<dyn Filter>) -> FilterResult<()> {
        let node = Node { id: StageId::next(), filter };
        self.nodes
            .push(node)
            .map_err(|_| FilterError::ChainFull { capacity: MAX_CHAIN_STAGES })
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the chain has no stages
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove every stage, cancelling their pending timers
    pub fn clear(&mut self, ctx: &mut FilterContext<'_>) {
        self.cancel_timers(ctx);
        self.nodes.clear();
    }

    /// Cancel the pending timers of every stage, nested ones included
    pub fn cancel_timers(&self, ctx: &mut FilterContext<'_>) {
        for node in &self.nodes {
            ctx.timers_mut().cancel_stage(node.id);
            node.filter.cancel_timers(ctx);
        }
    }

    /// Stage names in chain order
    pub fn stage_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.nodes.iter().map(|node| node.filter.name())
    }

    /// Bind every stage to the chain (idempotent)
    pub fn initialize(&mut self, ctx: &mut FilterContext<'_>) {
        for node in self.nodes.iter_mut() {
            ctx.enter(node.id);
            node.filter.initialize(ctx);
        }
    }

    /// Run a value through the whole chain
    ///
    /// Returns what leaves the last stage, if anything.
    pub fn input(&mut self, value: f32, ctx: &mut FilterContext<'_>) -> Option<f32> {
        self.run_from(0, value, ctx)
    }

    /// Deliver a fired timer to the stage that armed it
    ///
    /// Searches nested sub-chains too. The stage's output continues through
    /// the stages after it.
    pub fn fire(&mut self, key: &TimerKey, ctx: &mut FilterContext<'_>) -> TimerDispatch {
        for index in 0..self.nodes.len() {
            let node = &mut self.nodes[index];
            ctx.enter(node.id);
            let output = if node.id == key.stage {
                log_trace!("{}::on_timer({})", node.filter.name(), key.name);
                node.filter.on_timer(key.name, ctx)
            } else {
                match node.filter.route_timer(key, ctx) {
                    TimerDispatch::Handled(output) => output,
                    TimerDispatch::Unknown => continue,
                }
            };

            let result = output.and_then(|value| self.run_from(index + 1, value, ctx));
            return TimerDispatch::Handled(result);
        }
        TimerDispatch::Unknown
    }

    fn run_from(&mut self, start: usize, value: f32, ctx: &mut FilterContext<'_>) -> Option<f32> {
        let mut current = value;
        for node in self.nodes.iter_mut().skip(start) {
            ctx.enter(node.id);
            log_trace!("{}::input({})", node.filter.name(), current);
            current = node.filter.new_value(current, ctx)?;
        }
        Some(current)
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder collecting stages in order
///
/// The first overflow is kept and reported by [`ChainBuilder::build`].
pub struct ChainBuilder {
    chain: FilterChain,
    error: Option<FilterError>,
}

impl ChainBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self { chain: FilterChain::new(), error: None }
    }

    /// Append a stage
    pub fn add_stage<F: Filter + 'static>(self, filter: F) -> Self {
        self.add_boxed(Box::new(filter))
    }

    /// Append an already boxed stage
    pub fn add_boxed(mut self, filter: Box<dyn Filter>) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.chain.add_boxed(filter) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Finish the chain
    pub fn build(self) -> FilterResult<FilterChain> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.chain),
        }
    }
}

impl Default for ChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}
