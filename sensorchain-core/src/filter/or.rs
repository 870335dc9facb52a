//! First-result-wins combinator
//!
//! ```text
//!            ┌─ [Delta 1.0] ──────┐
//! value ─→ Or┤                    ├─→ first result of the round
//!            └─ [Heartbeat 60s] ──┘
//! ```
//!
//! Every input is fed to all branches in order. The first branch that
//! produces a value decides the stage's output for that round; later results
//! in the same round are dropped. A round lasts until the next input, so a
//! branch timer firing in between only gets through if no branch has emitted
//! since that input.

use heapless::Vec;

use crate::{
    constants::MAX_OR_BRANCHES,
    errors::{FilterError, FilterResult},
    scheduler::TimerKey,
};

use super::{Filter, FilterChain, FilterContext, TimerDispatch};

/// Run several sub-chains in parallel and forward the first result
pub struct OrFilter {
    branches: Vec<FilterChain, MAX_OR_BRANCHES>,
    has_value: bool,
}

impl OrFilter {
    /// Create an or stage without branches
    pub fn new() -> Self {
        Self { branches: Vec::new(), has_value: false }
    }

    /// Append a branch
    pub fn add_branch(&mut self, branch: FilterChain) -> FilterResult<()> {
        self.branches.push(branch).map_err(|_| FilterError::TooMany {
            what: "or branches",
            limit: MAX_OR_BRANCHES,
        })
    }

    /// Append a single-stage branch
    pub fn add<F: Filter + 'static>(&mut self, filter: F) -> FilterResult<()> {
        let mut branch = FilterChain::new();
        branch.add(filter)?;
        self.add_branch(branch)
    }

    /// Builder-style [`OrFilter::add`]
    ///
    /// Panics past `MAX_OR_BRANCHES` branches.
    pub fn with<F: Filter + 'static>(mut self, filter: F) -> Self {
        if let Err(e) = self.add(filter) {
            panic!("{}", e);
        }
        self
    }

    /// Number of branches
    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    fn fan_in(&mut self, output: Option<f32>) -> Option<f32> {
        if self.has_value {
            return None;
        }
        self.has_value = output.is_some();
        output
    }
}

impl Default for OrFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for OrFilter {
    fn new_value(&mut self, value: f32, ctx: &mut FilterContext<'_>) -> Option<f32> {
        let stage = ctx.stage();
        self.has_value = false;

        let mut output = None;
        for branch in self.branches.iter_mut() {
            let result = branch.input(value, ctx);
            if output.is_none() {
                output = result;
            }
        }
        ctx.enter(stage);

        self.fan_in(output)
    }

    fn initialize(&mut self, ctx: &mut FilterContext<'_>) {
        let stage = ctx.stage();
        for branch in self.branches.iter_mut() {
            branch.initialize(ctx);
        }
        ctx.enter(stage);
    }

    fn route_timer(&mut self, key: &TimerKey, ctx: &mut FilterContext<'_>) -> TimerDispatch {
        let stage = ctx.stage();
        for index in 0..self.branches.len() {
            if let TimerDispatch::Handled(output) = self.branches[index].fire(key, ctx) {
                ctx.enter(stage);
                return TimerDispatch::Handled(self.fan_in(output));
            }
        }
        ctx.enter(stage);
        TimerDispatch::Unknown
    }

    fn cancel_timers(&self, ctx: &mut FilterContext<'_>) {
        for branch in self.branches.iter() {
            branch.cancel_timers(ctx);
        }
    }

    fn name(&self) -> &'static str {
        "OrFilter"
    }
}
