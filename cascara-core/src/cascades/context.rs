// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The memoized optimization unit: the best plan for a group under a set of required
//! physical properties, plus the priced candidates competing for it.

use std::sync::Arc;
use std::sync::OnceLock;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::memo::{ExprId, GroupId};
use super::scheduler::Job;
use crate::cost::{Cost, Statistics};
use crate::nodes::{ArcPredNode, NodeType};
use crate::physical_property::{PhysicalProperty, RequiredPlanProperties};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(pub usize);

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// Optimization progress of a context. Transitions are monotonic and move forward exactly
/// one step at a time: Unoptimized -> Optimizing -> Optimized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CtxState {
    Unoptimized,
    Optimizing,
    Optimized,
}

/// Scheduler-facing state of a context. The state flag, the parked continuations, and the
/// count of in-flight candidate jobs live under one lock so that a subscriber can read the
/// state and park atomically against the finalizer.
pub(crate) struct CtxSync<T: NodeType> {
    pub(crate) state: CtxState,
    pub(crate) waiters: Vec<Job<T>>,
    pub(crate) pending: usize,
}

/// How a [`CostContext`] produces its plan fragment.
pub enum CostSource<T: NodeType> {
    /// A physical expression of the group, with the contexts its children were optimized
    /// under.
    Expr {
        expr_id: ExprId,
        children: Vec<Arc<OptimizationContext<T>>>,
    },
    /// A chain of enforcer operators stacked on top of the group's winner under weaker
    /// requirements. Outermost enforcer last.
    Enforcer {
        chain: Vec<(T, Vec<ArcPredNode<T>>)>,
        child: Arc<OptimizationContext<T>>,
    },
    /// The requirement was absorbed into a search goal on a child group (e.g. a logical
    /// sort turning into a sort requirement), so the winner is the child's winner.
    Propagate { child: Arc<OptimizationContext<T>> },
}

/// A priced instantiation of one way to satisfy an optimization context. Many cost
/// contexts may be considered per [`OptimizationContext`]; the cheapest one wins.
pub struct CostContext<T: NodeType> {
    pub source: CostSource<T>,
    pub total_cost: Cost,
    pub operation_cost: Cost,
    pub total_weighted_cost: f64,
    pub operation_weighted_cost: f64,
    pub statistics: Arc<Statistics>,
    pub derived_physical_properties: Arc<[Box<dyn PhysicalProperty>]>,
}

/// The unit of memoized search: the best physical plan for a group under a set of required
/// physical properties within one search stage.
///
/// Identity is defined by (group, stage, required properties); the memo collapses
/// structurally equal requests onto one context, so its winner is computed once. The
/// required-property hash is precomputed because the property vector is type-erased and
/// hashed through the builder set.
pub struct OptimizationContext<T: NodeType> {
    id: ContextId,
    group: GroupId,
    stage: usize,
    required: RequiredPlanProperties,
    required_hash: u64,
    pub(crate) sync: Mutex<CtxSync<T>>,
    winner: Mutex<Option<Arc<CostContext<T>>>>,
    /// Set when a group merge discovers an equal context in the surviving group. New
    /// lookups follow the redirect; jobs already driving this context run it to
    /// completion independently.
    redirect: OnceLock<Arc<OptimizationContext<T>>>,
}

impl<T: NodeType> OptimizationContext<T> {
    pub(crate) fn new(
        id: ContextId,
        group: GroupId,
        stage: usize,
        required: RequiredPlanProperties,
        required_hash: u64,
    ) -> Self {
        Self {
            id,
            group,
            stage,
            required,
            required_hash,
            sync: Mutex::new(CtxSync {
                state: CtxState::Unoptimized,
                waiters: Vec::new(),
                pending: 0,
            }),
            winner: Mutex::new(None),
            redirect: OnceLock::new(),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn stage(&self) -> usize {
        self.stage
    }

    pub fn required(&self) -> &RequiredPlanProperties {
        &self.required
    }

    pub fn required_hash(&self) -> u64 {
        self.required_hash
    }

    /// Follow merge redirects to the surviving context.
    pub fn canonical(self: &Arc<Self>) -> Arc<Self> {
        let mut current = self.clone();
        while let Some(next) = current.redirect.get() {
            current = next.clone();
        }
        current
    }

    pub(crate) fn set_redirect(&self, to: Arc<OptimizationContext<T>>) {
        // A context is redirected at most once; merges only ever move it into the
        // surviving group.
        let _ = self.redirect.set(to);
    }

    pub fn state(&self) -> CtxState {
        self.sync.lock().state
    }

    pub fn winner(&self) -> Option<Arc<CostContext<T>>> {
        self.winner.lock().clone()
    }

    /// Record a candidate; it becomes the winner only if strictly cheaper than the current
    /// one. Returns whether the winner changed.
    pub fn consider(&self, candidate: Arc<CostContext<T>>) -> bool {
        let mut winner = self.winner.lock();
        let replace = match winner.as_ref() {
            None => true,
            Some(current) => candidate.total_weighted_cost < current.total_weighted_cost,
        };
        if replace {
            trace!(
                event = "update_winner",
                context_id = %self.id,
                group_id = %self.group,
                total_weighted_cost = candidate.total_weighted_cost,
            );
            *winner = Some(candidate);
        }
        replace
    }

    /// The current upper bound for pruning: the winner's weighted cost, if any.
    pub fn winner_weighted_cost(&self) -> Option<f64> {
        self.winner.lock().as_ref().map(|w| w.total_weighted_cost)
    }

    pub(crate) fn begin_optimizing(&self, sync: &mut CtxSync<T>) {
        debug_assert_eq!(sync.state, CtxState::Unoptimized);
        trace!(event = "context_state", context_id = %self.id, group_id = %self.group, state = "optimizing");
        sync.state = CtxState::Optimizing;
    }

    /// Finalize the context and hand back the parked continuations; the caller re-enqueues
    /// them after releasing the lock.
    pub(crate) fn finish_optimizing(&self, sync: &mut CtxSync<T>) -> Vec<Job<T>> {
        debug_assert_eq!(sync.state, CtxState::Optimizing);
        trace!(event = "context_state", context_id = %self.id, group_id = %self.group, state = "optimized");
        sync.state = CtxState::Optimized;
        std::mem::take(&mut sync.waiters)
    }
}

impl<T: NodeType> std::fmt::Debug for OptimizationContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizationContext")
            .field("id", &self.id)
            .field("group", &self.group)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}
