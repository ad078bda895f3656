// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The concurrent search scheduler: a work queue of restartable jobs driving one search
//! stage to quiescence.
//!
//! Jobs never block on each other. A job that needs a result another job is still
//! producing parks a clone of itself on the producer's waiter list (under the same lock
//! that guards the producer's done flag) and returns; the finalizer re-enqueues parked
//! jobs when the result is ready. Every job is written to be re-runnable from the top:
//! work it already did is absorbed by the memo table and the fired-rule set, so a re-run
//! only performs what is still missing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use itertools::Itertools;
use parking_lot::{Condvar, Mutex};
use tracing::{trace, warn};

use super::binding::BindingIter;
use super::context::{CostContext, CostSource, CtxState, OptimizationContext};
use super::memo::{ExprId, Group, GroupId, Memo};
use crate::cost::{CostModel, RelNodeContext};
use crate::nodes::NodeType;
use crate::physical_property::RequiredPlanProperties;
use crate::rules::Rule;

/// A restartable unit of search work.
///
/// `ExploreGroup` and `ImplementGroup` are only ever enqueued by the helper that also
/// claims the group's in-progress flag, so the job owning the flag is exactly the job on
/// the queue; a clone parked and re-enqueued keeps that ownership.
pub(crate) enum Job<T: NodeType> {
    /// Saturate a group under the stage's transformation rules.
    ExploreGroup { group: GroupId },
    /// Fire the stage's implementation rules over a group's logical expressions.
    ImplementGroup { group: GroupId },
    /// Find the best plan for a context: explore and implement the group, then fan out
    /// one candidate job per viable expression.
    OptimizeContext { context: Arc<OptimizationContext<T>> },
    /// Cost one physical expression against a context, recursing into child contexts.
    OptimizeExpr {
        context: Arc<OptimizationContext<T>>,
        expr_id: ExprId,
    },
    /// Price satisfying the context by enforcing on top of the group's unconstrained
    /// winner.
    EnforcerProbe { context: Arc<OptimizationContext<T>> },
    /// Price absorbing the requirement into a logical single-child expression (e.g. a
    /// logical sort absorbing a sort requirement) as a search goal on its child.
    PropagateProbe {
        context: Arc<OptimizationContext<T>>,
        expr_id: ExprId,
    },
}

impl<T: NodeType> Clone for Job<T> {
    fn clone(&self) -> Self {
        match self {
            Self::ExploreGroup { group } => Self::ExploreGroup { group: *group },
            Self::ImplementGroup { group } => Self::ImplementGroup { group: *group },
            Self::OptimizeContext { context } => Self::OptimizeContext {
                context: context.clone(),
            },
            Self::OptimizeExpr { context, expr_id } => Self::OptimizeExpr {
                context: context.clone(),
                expr_id: *expr_id,
            },
            Self::EnforcerProbe { context } => Self::EnforcerProbe {
                context: context.clone(),
            },
            Self::PropagateProbe { context, expr_id } => Self::PropagateProbe {
                context: context.clone(),
                expr_id: *expr_id,
            },
        }
    }
}

impl<T: NodeType> std::fmt::Display for Job<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExploreGroup { group } => write!(f, "explore_group({})", group),
            Self::ImplementGroup { group } => write!(f, "implement_group({})", group),
            Self::OptimizeContext { context } => write!(f, "optimize_context({})", context.id()),
            Self::OptimizeExpr { context, expr_id } => {
                write!(f, "optimize_expr({}, {})", context.id(), expr_id)
            }
            Self::EnforcerProbe { context } => write!(f, "enforcer_probe({})", context.id()),
            Self::PropagateProbe { context, expr_id } => {
                write!(f, "propagate_probe({}, {})", context.id(), expr_id)
            }
        }
    }
}

enum Message<T: NodeType> {
    Job(Job<T>),
    Shutdown,
}

/// Whether a job ran to completion or parked itself on a waiter list. Parked jobs keep
/// their slot in the outstanding count; their re-enqueue does not take a new one.
enum Outcome {
    Done,
    Parked,
}

/// Drives one search stage over the shared memo table with a fixed set of rules.
pub(crate) struct Scheduler<T: NodeType> {
    memo: Arc<Memo<T>>,
    cost_model: Arc<dyn CostModel<T>>,
    rules: Arc<[Arc<dyn Rule<T>>]>,
    stage_index: usize,
    allow_enforcers: bool,
    disable_pruning: bool,
    partial_explore_budget: Option<usize>,
    panic_on_budget: bool,
    budget_warned: AtomicBool,
    budget_reached: AtomicBool,
    /// (expression, rule index) pairs already fired; survives group merges because
    /// expression ids are never reused.
    fired: Mutex<HashSet<(ExprId, usize)>>,
    tx: Sender<Message<T>>,
    rx: Receiver<Message<T>>,
    outstanding: AtomicUsize,
    idle_lock: Mutex<()>,
    idle_cvar: Condvar,
    cancel: Arc<AtomicBool>,
}

impl<T: NodeType> Scheduler<T> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        memo: Arc<Memo<T>>,
        cost_model: Arc<dyn CostModel<T>>,
        rules: Arc<[Arc<dyn Rule<T>>]>,
        stage_index: usize,
        allow_enforcers: bool,
        disable_pruning: bool,
        partial_explore_budget: Option<usize>,
        panic_on_budget: bool,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            memo,
            cost_model,
            rules,
            stage_index,
            allow_enforcers,
            disable_pruning,
            partial_explore_budget,
            panic_on_budget,
            budget_warned: AtomicBool::new(false),
            budget_reached: AtomicBool::new(false),
            fired: Mutex::new(HashSet::new()),
            tx,
            rx,
            outstanding: AtomicUsize::new(0),
            idle_lock: Mutex::new(()),
            idle_cvar: Condvar::new(),
            cancel,
        }
    }

    pub(crate) fn seed(&self, job: Job<T>) {
        self.enqueue_new(job);
    }

    pub(crate) fn budget_was_reached(&self) -> bool {
        self.budget_reached.load(Ordering::Acquire)
    }

    /// Run worker threads until the queue quiesces (no job outstanding, parked jobs
    /// included), then shut the workers down.
    pub(crate) fn run(&self, workers: usize) {
        let workers = workers.max(1);
        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| self.worker_loop());
            }
            self.wait_quiescent();
            for _ in 0..workers {
                // Send can only fail if all workers are gone, in which case shutdown
                // already happened.
                let _ = self.tx.send(Message::Shutdown);
            }
        });
    }

    fn worker_loop(&self) {
        while let Ok(message) = self.rx.recv() {
            let job = match message {
                Message::Shutdown => break,
                Message::Job(job) => job,
            };
            if self.cancel.load(Ordering::Acquire) {
                self.job_done();
                continue;
            }
            trace!(event = "job_begin", job = %job);
            let outcome = self.run_job(job);
            if matches!(outcome, Outcome::Done) {
                self.job_done();
            }
        }
    }

    fn run_job(&self, job: Job<T>) -> Outcome {
        match job {
            Job::ExploreGroup { group } => self.run_explore_group(group),
            Job::ImplementGroup { group } => self.run_implement_group(group),
            Job::OptimizeContext { context } => self.run_optimize_context(context),
            Job::OptimizeExpr { context, expr_id } => self.run_optimize_expr(context, expr_id),
            Job::EnforcerProbe { context } => self.run_enforcer_probe(context),
            Job::PropagateProbe { context, expr_id } => {
                self.run_propagate_probe(context, expr_id)
            }
        }
    }

    /// Enqueue a job that does not exist yet anywhere, taking a slot in the outstanding
    /// count.
    fn enqueue_new(&self, job: Job<T>) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        // The receiver lives as long as `self`, so the channel cannot be disconnected.
        self.tx
            .send(Message::Job(job))
            .unwrap_or_else(|_| unreachable!("scheduler channel disconnected"));
    }

    /// Re-enqueue a parked job. It still holds its original outstanding slot.
    fn requeue(&self, job: Job<T>) {
        self.tx
            .send(Message::Job(job))
            .unwrap_or_else(|_| unreachable!("scheduler channel disconnected"));
    }

    fn requeue_all(&self, jobs: Vec<Job<T>>) {
        for job in jobs {
            self.requeue(job);
        }
    }

    fn job_done(&self) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.idle_lock.lock();
            self.idle_cvar.notify_all();
        }
    }

    fn wait_quiescent(&self) {
        let mut guard = self.idle_lock.lock();
        while self.outstanding.load(Ordering::Acquire) != 0 {
            self.idle_cvar
                .wait_for(&mut guard, Duration::from_millis(50));
        }
    }

    /// Whether the partial-exploration budget is exhausted. Logged once per stage; groups
    /// in flight still finalize so parked jobs are not stranded.
    fn budget_exhausted(&self) -> bool {
        let Some(budget) = self.partial_explore_budget else {
            return false;
        };
        let space = self.memo.estimated_plan_space();
        if space <= budget {
            return false;
        }
        if self.panic_on_budget {
            panic!("plan space size budget exceeded: {} > {}", space, budget);
        }
        if !self.budget_warned.swap(true, Ordering::AcqRel) {
            warn!(
                event = "budget_exhausted",
                plan_space = space,
                budget = budget,
                "plan space size budget exceeded, winners may be suboptimal",
            );
        }
        self.budget_reached.store(true, Ordering::Release);
        true
    }

    // --- gates -----------------------------------------------------------------------

    /// If the group is explored, returns true. Otherwise parks `waiter` and, when no job
    /// holds the exploration claim yet, takes it and enqueues the explorer.
    fn gate_explored(&self, group: &Group<T>, group_id: GroupId, waiter: Job<T>) -> bool {
        let claim = {
            let mut search = group.search.lock();
            if search.explored {
                return true;
            }
            search.explore_waiters.push(waiter);
            if search.exploring {
                false
            } else {
                search.exploring = true;
                true
            }
        };
        if claim {
            self.enqueue_new(Job::ExploreGroup { group: group_id });
        }
        false
    }

    /// Like [`Self::gate_explored`] for the implement flag.
    fn gate_implemented(&self, group: &Group<T>, group_id: GroupId, waiter: Job<T>) -> bool {
        let claim = {
            let mut search = group.search.lock();
            if search.implemented {
                return true;
            }
            search.implement_waiters.push(waiter);
            if search.implementing {
                false
            } else {
                search.implementing = true;
                true
            }
        };
        if claim {
            self.enqueue_new(Job::ImplementGroup { group: group_id });
        }
        false
    }

    /// Exploration-ordering gate used by an explorer on the child groups of its
    /// expressions. Differs from [`Self::gate_explored`] in two cycle-breaking cases: a
    /// child that resolves to the exploring group itself is skipped, and a CTE producer
    /// group that is currently being explored counts as ready (the binding snapshot sees
    /// its current contents; the re-entrant producer is part of the plan space by
    /// construction).
    fn gate_child_explored(&self, own_group: GroupId, child: GroupId, waiter: &Job<T>) -> bool {
        let (child_id, child_group) = self.memo.get_group_reduced(child);
        if child_id == own_group {
            return true;
        }
        let claim = {
            let mut search = child_group.search.lock();
            if search.explored {
                return true;
            }
            if search.exploring && child_group.is_cte_producer() {
                return true;
            }
            search.explore_waiters.push(waiter.clone());
            if search.exploring {
                false
            } else {
                search.exploring = true;
                true
            }
        };
        if claim {
            self.enqueue_new(Job::ExploreGroup { group: child_id });
        }
        false
    }

    /// If the child context is optimized, returns true. Otherwise parks `waiter` on it.
    /// The context's own job was enqueued by whoever created the context.
    fn gate_context_optimized(&self, child: &OptimizationContext<T>, waiter: &Job<T>) -> bool {
        let mut sync = child.sync.lock();
        if sync.state == CtxState::Optimized {
            return true;
        }
        sync.waiters.push(waiter.clone());
        false
    }

    /// Create or fetch the child context; the creator enqueues its optimization job.
    fn child_context(
        &self,
        group_id: GroupId,
        required: RequiredPlanProperties,
    ) -> Arc<OptimizationContext<T>> {
        let (ctx, created) = self
            .memo
            .create_or_get_context(group_id, required, self.stage_index);
        if created {
            self.enqueue_new(Job::OptimizeContext {
                context: ctx.clone(),
            });
        }
        ctx
    }

    // --- explore / implement ----------------------------------------------------------

    fn try_claim_rule(&self, expr_id: ExprId, rule_idx: usize) -> bool {
        self.fired.lock().insert((expr_id, rule_idx))
    }

    /// Bind the rule's pattern against the expression and add every alternative the rule
    /// produces to the group. Returns whether anything new entered the memo.
    fn fire_rule(&self, rule: &dyn Rule<T>, expr_id: ExprId, group_id: GroupId) -> bool {
        let mut new_exprs = 0usize;
        let mut bindings = 0usize;
        for binding in BindingIter::new(&self.memo, rule.matcher(), expr_id) {
            bindings += 1;
            for alternative in rule.apply(binding.picks, binding.predicates) {
                if self.memo.add_expr_to_group(alternative, group_id).is_some() {
                    new_exprs += 1;
                }
            }
        }
        trace!(
            event = "rule_fired",
            rule = rule.name(),
            expr_id = %expr_id,
            group_id = %group_id,
            bindings = bindings,
            new_exprs = new_exprs,
        );
        new_exprs > 0
    }

    /// Explore a group to saturation under the stage's transformation rules. Runs a
    /// fixpoint over the (growing) expression list; rules already fired on an expression
    /// are skipped via the fired set, so a restart after parking resumes where it left
    /// off.
    fn run_explore_group(&self, group: GroupId) -> Outcome {
        let group_id = self.memo.reduce_group(group);
        let waiter = Job::ExploreGroup { group: group_id };
        loop {
            let mut progress = false;
            let exprs = self.memo.all_exprs_in_group(group_id);
            for expr_id in exprs {
                let expr = self.memo.get_expr(expr_id);
                if !expr.is_logical() {
                    continue;
                }
                let node = expr.node();
                for child in &node.children {
                    if !self.gate_child_explored(group_id, *child, &waiter) {
                        return Outcome::Parked;
                    }
                }
                for (rule_idx, rule) in self.rules.iter().enumerate() {
                    if rule.is_impl_rule() {
                        continue;
                    }
                    if self.cancel.load(Ordering::Acquire) || self.budget_exhausted() {
                        return self.finalize_explore(group_id);
                    }
                    if !self.try_claim_rule(expr_id, rule_idx) {
                        continue;
                    }
                    if self.fire_rule(rule.as_ref(), expr_id, group_id) {
                        progress = true;
                    }
                }
            }
            if !progress {
                break;
            }
        }
        self.finalize_explore(group_id)
    }

    /// Mark the group explored and release everything parked on it. The group is
    /// re-resolved first: a merge may have moved the waiters to a surviving group.
    fn finalize_explore(&self, group_id: GroupId) -> Outcome {
        let (final_id, final_group) = self.memo.get_group_reduced(group_id);
        let waiters = {
            let mut search = final_group.search.lock();
            search.exploring = false;
            search.explored = true;
            std::mem::take(&mut search.explore_waiters)
        };
        trace!(event = "group_explored", group_id = %final_id, released = waiters.len());
        self.requeue_all(waiters);
        Outcome::Done
    }

    /// Fire the stage's implementation rules over a group's logical expressions. Requires
    /// the group to be explored first so the logical plan space is complete; a single pass
    /// suffices because implementation rules produce physical expressions, which no rule
    /// matches on.
    fn run_implement_group(&self, group: GroupId) -> Outcome {
        let (group_id, group_arc) = self.memo.get_group_reduced(group);
        let waiter = Job::ImplementGroup { group: group_id };
        if !self.gate_explored(&group_arc, group_id, waiter) {
            return Outcome::Parked;
        }
        let exprs = self.memo.all_exprs_in_group(group_id);
        'outer: for expr_id in exprs {
            let expr = self.memo.get_expr(expr_id);
            if !expr.is_logical() {
                continue;
            }
            for (rule_idx, rule) in self.rules.iter().enumerate() {
                if !rule.is_impl_rule() {
                    continue;
                }
                if self.cancel.load(Ordering::Acquire) || self.budget_exhausted() {
                    break 'outer;
                }
                if !self.try_claim_rule(expr_id, rule_idx) {
                    continue;
                }
                self.fire_rule(rule.as_ref(), expr_id, group_id);
            }
        }
        let (final_id, final_group) = self.memo.get_group_reduced(group_id);
        let waiters = {
            let mut search = final_group.search.lock();
            search.implementing = false;
            search.implemented = true;
            std::mem::take(&mut search.implement_waiters)
        };
        trace!(event = "group_implemented", group_id = %final_id, released = waiters.len());
        self.requeue_all(waiters);
        Outcome::Done
    }

    // --- context optimization ---------------------------------------------------------

    /// Drive a context: once its group is explored and implemented, fan out one costing
    /// job per viable expression (plus the enforcer probe), each of which reports back
    /// through [`Self::complete_candidate`]. The last report finalizes the context.
    fn run_optimize_context(&self, context: Arc<OptimizationContext<T>>) -> Outcome {
        {
            let mut sync = context.sync.lock();
            match sync.state {
                CtxState::Optimized => return Outcome::Done,
                // A restart after parking; the state was already claimed.
                CtxState::Optimizing => {}
                CtxState::Unoptimized => context.begin_optimizing(&mut sync),
            }
        }
        let waiter = Job::OptimizeContext {
            context: context.clone(),
        };
        let (group_id, group_arc) = self.memo.get_group_reduced(context.group());
        if !self.gate_explored(&group_arc, group_id, waiter.clone()) {
            return Outcome::Parked;
        }
        if !self.gate_implemented(&group_arc, group_id, waiter) {
            return Outcome::Parked;
        }

        let mut jobs = Vec::new();
        for expr_id in self.memo.all_exprs_in_group(group_id) {
            let expr = self.memo.get_expr(expr_id);
            if expr.is_logical() {
                let node = expr.node();
                if node.children.len() == 1
                    && self
                        .memo
                        .physical_property_builders()
                        .search_goal_many(node.typ.clone(), &node.predicates, context.required())
                        .is_some()
                {
                    jobs.push(Job::PropagateProbe {
                        context: context.clone(),
                        expr_id,
                    });
                }
            } else {
                jobs.push(Job::OptimizeExpr {
                    context: context.clone(),
                    expr_id,
                });
            }
        }
        let builders = self.memo.physical_property_builders();
        if self.allow_enforcers && !builders.is_default_many(context.required()) {
            jobs.push(Job::EnforcerProbe {
                context: context.clone(),
            });
        }

        if jobs.is_empty() {
            // Nothing can satisfy this context; finalize with no winner.
            let waiters = {
                let mut sync = context.sync.lock();
                context.finish_optimizing(&mut sync)
            };
            trace!(event = "context_impossible", context_id = %context.id(), group_id = %group_id);
            self.requeue_all(waiters);
            return Outcome::Done;
        }
        {
            let mut sync = context.sync.lock();
            sync.pending = jobs.len();
        }
        trace!(event = "context_fanout", context_id = %context.id(), group_id = %group_id, candidates = jobs.len());
        for job in jobs {
            self.enqueue_new(job);
        }
        Outcome::Done
    }

    /// One candidate job finished (with or without producing a candidate). The last one
    /// finalizes the context and wakes its subscribers.
    fn complete_candidate(&self, context: &Arc<OptimizationContext<T>>) {
        let waiters = {
            let mut sync = context.sync.lock();
            debug_assert!(sync.pending > 0);
            sync.pending -= 1;
            if sync.pending > 0 {
                return;
            }
            context.finish_optimizing(&mut sync)
        };
        self.requeue_all(waiters);
    }

    /// Cost one physical expression under a context: recurse into child contexts with the
    /// passed-through requirements, combine the children's winners with the operation
    /// cost, and submit the result as a candidate.
    fn run_optimize_expr(
        &self,
        context: Arc<OptimizationContext<T>>,
        expr_id: ExprId,
    ) -> Outcome {
        let node = self.memo.get_expr_memoed(expr_id);
        let builders = self.memo.physical_property_builders();
        if !builders.compatible_many(node.typ.clone(), &node.predicates, context.required()) {
            trace!(event = "expr_incompatible", context_id = %context.id(), expr_id = %expr_id);
            self.complete_candidate(&context);
            return Outcome::Done;
        }

        let children_required = builders.passthrough_many(
            node.typ.clone(),
            &node.predicates,
            context.required(),
            node.children.len(),
        );
        let child_contexts = node
            .children
            .iter()
            .zip(children_required)
            .map(|(child, required)| self.child_context(*child, required.into()))
            .collect_vec();

        let waiter = Job::OptimizeExpr {
            context: context.clone(),
            expr_id,
        };
        for child_ctx in &child_contexts {
            if !self.gate_context_optimized(child_ctx, &waiter) {
                return Outcome::Parked;
            }
        }

        let mut child_winners = Vec::with_capacity(child_contexts.len());
        for child_ctx in &child_contexts {
            match child_ctx.winner() {
                Some(winner) => child_winners.push(winner),
                None => {
                    // A child subgoal is impossible; this expression cannot satisfy the
                    // context.
                    trace!(event = "child_impossible", context_id = %context.id(), expr_id = %expr_id);
                    self.complete_candidate(&context);
                    return Outcome::Done;
                }
            }
        }

        let rel_context = RelNodeContext {
            group_id: self.memo.reduce_group(context.group()),
            expr_id,
            children_group_ids: node.children.clone(),
        };
        let children_stats = child_winners
            .iter()
            .map(|winner| winner.statistics.clone())
            .collect_vec();
        let children_stats_ref = children_stats
            .iter()
            .map(|stat| Some(stat.as_ref()))
            .collect_vec();
        let operation_cost = self.cost_model.compute_operation_cost(
            &node.typ,
            &node.predicates,
            &children_stats_ref,
            rel_context.clone(),
        );
        let children_cost = child_winners
            .iter()
            .map(|winner| &winner.total_cost)
            .collect_vec();
        let total_cost = self.cost_model.sum(&operation_cost, &children_cost);
        let total_weighted_cost = self.cost_model.weighted_cost(&total_cost);
        let operation_weighted_cost = self.cost_model.weighted_cost(&operation_cost);

        if !self.disable_pruning {
            if let Some(upper_bound) = context.winner_weighted_cost() {
                if total_weighted_cost >= upper_bound {
                    trace!(
                        event = "expr_pruned",
                        context_id = %context.id(),
                        expr_id = %expr_id,
                        total_weighted_cost = total_weighted_cost,
                        upper_bound = upper_bound,
                    );
                    self.complete_candidate(&context);
                    return Outcome::Done;
                }
            }
        }

        let statistics = Arc::new(self.cost_model.derive_statistics(
            &node.typ,
            &node.predicates,
            &children_stats,
            rel_context,
        ));
        let children_props = child_winners
            .iter()
            .map(|winner| &winner.derived_physical_properties)
            .collect_vec();
        let derived: RequiredPlanProperties = builders
            .derive_many(
                node.typ.clone(),
                &node.predicates,
                &children_props,
                node.children.len(),
            )
            .into();
        let at_most_one_row = self.memo.group_at_most_one_row(context.group());
        if !builders.satisfies_many_relaxed(&derived, context.required(), at_most_one_row) {
            trace!(event = "expr_unsatisfied", context_id = %context.id(), expr_id = %expr_id);
            self.complete_candidate(&context);
            return Outcome::Done;
        }

        context.consider(Arc::new(CostContext {
            source: CostSource::Expr {
                expr_id,
                children: child_contexts,
            },
            total_cost,
            operation_cost,
            total_weighted_cost,
            operation_weighted_cost,
            statistics,
            derived_physical_properties: derived,
        }));
        self.complete_candidate(&context);
        Outcome::Done
    }

    /// Price satisfying the context by stacking enforcers on the group's winner under the
    /// unconstrained requirement. Only spawned when the context's requirement is not
    /// itself the unconstrained one, so the child context is always distinct.
    fn run_enforcer_probe(&self, context: Arc<OptimizationContext<T>>) -> Outcome {
        let builders = self.memo.physical_property_builders();
        let child_ctx = self.child_context(context.group(), builders.default_many().into());
        let waiter = Job::EnforcerProbe {
            context: context.clone(),
        };
        if !self.gate_context_optimized(&child_ctx, &waiter) {
            return Outcome::Parked;
        }
        let Some(winner) = child_ctx.winner() else {
            self.complete_candidate(&context);
            return Outcome::Done;
        };

        let (chain, new_props) = builders
            .enforce_unsatisfied(&winner.derived_physical_properties, context.required());
        if chain.is_empty() {
            // The unconstrained winner already satisfies the requirement; it reaches
            // this context through its own costing path.
            self.complete_candidate(&context);
            return Outcome::Done;
        }

        let group_id = self.memo.reduce_group(context.group());
        // Enforcers have no expression of their own; attribute their cost to the group's
        // representative expression.
        let rep_expr = self
            .memo
            .all_exprs_in_group(group_id)
            .first()
            .copied()
            .unwrap_or_else(|| unreachable!("group has no expressions"));
        let mut total_cost = winner.total_cost.clone();
        let mut operation_cost = self.cost_model.zero();
        for (typ, predicates) in &chain {
            let enforcer_cost = self.cost_model.compute_operation_cost(
                typ,
                predicates,
                &[Some(winner.statistics.as_ref())],
                RelNodeContext {
                    group_id,
                    expr_id: rep_expr,
                    children_group_ids: vec![group_id],
                },
            );
            self.cost_model.accumulate(&mut total_cost, &enforcer_cost);
            self.cost_model
                .accumulate(&mut operation_cost, &enforcer_cost);
        }
        let total_weighted_cost = self.cost_model.weighted_cost(&total_cost);
        let operation_weighted_cost = self.cost_model.weighted_cost(&operation_cost);

        context.consider(Arc::new(CostContext {
            source: CostSource::Enforcer {
                chain,
                child: child_ctx,
            },
            total_cost,
            operation_cost,
            total_weighted_cost,
            operation_weighted_cost,
            // Enforcers reorder or redistribute rows; cardinality is unchanged.
            statistics: winner.statistics.clone(),
            derived_physical_properties: new_props.into(),
        }));
        self.complete_candidate(&context);
        Outcome::Done
    }

    /// Price absorbing the requirement into a logical single-child expression: optimize
    /// the child under the absorbed goal and adopt its winner unchanged.
    fn run_propagate_probe(
        &self,
        context: Arc<OptimizationContext<T>>,
        expr_id: ExprId,
    ) -> Outcome {
        let node = self.memo.get_expr_memoed(expr_id);
        let builders = self.memo.physical_property_builders();
        let Some(goal) =
            builders.search_goal_many(node.typ.clone(), &node.predicates, context.required())
        else {
            // The expression was rewritten by a merge since the probe was spawned.
            self.complete_candidate(&context);
            return Outcome::Done;
        };
        let child_ctx = self.child_context(node.children[0], goal.into());
        let waiter = Job::PropagateProbe {
            context: context.clone(),
            expr_id,
        };
        if !self.gate_context_optimized(&child_ctx, &waiter) {
            return Outcome::Parked;
        }
        let Some(winner) = child_ctx.winner() else {
            self.complete_candidate(&context);
            return Outcome::Done;
        };

        context.consider(Arc::new(CostContext {
            source: CostSource::Propagate {
                child: child_ctx,
            },
            total_cost: winner.total_cost.clone(),
            operation_cost: self.cost_model.zero(),
            total_weighted_cost: winner.total_weighted_cost,
            operation_weighted_cost: 0.0,
            statistics: winner.statistics.clone(),
            derived_physical_properties: winner.derived_physical_properties.clone(),
        }));
        self.complete_candidate(&context);
        Outcome::Done
    }
}
