// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The memo table: a deduplicating DAG of groups (equivalence classes) and group
//! expressions (operator alternatives whose children are group references).
//!
//! The memo is shared by all worker threads. The group/expression topology (id maps,
//! dedup index, merge forwarding) lives under one `RwLock`; everything attached to a
//! single group or expression (expression list, search flags, optimization contexts,
//! derived-property slots) has its own entry-level lock so that independent subgoals do
//! not contend. Lock order is always topology first, entry lock second; entry locks are
//! leaves and no memo method is called while one is held.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::Hasher;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use itertools::Itertools;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::context::{ContextId, OptimizationContext};
use super::scheduler::Job;
use crate::logical_property::{LogicalProperty, LogicalPropertyBuilderAny};
use crate::nodes::{ArcPlanNode, NodeType, PlanNodeOrGroup};
use crate::physical_property::{PhysicalPropertyBuilders, RequiredPlanProperties};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprId(pub usize);

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "!{}", self.0)
    }
}

impl std::fmt::Display for ExprId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type ArcMemoNode<T> = Arc<MemoNode<T>>;

/// The plan-node representation inside the memo table: children are group references.
/// Equivalent to MExpr in Columbia/Cascades.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemoNode<T: NodeType> {
    pub typ: T,
    pub children: Vec<GroupId>,
    pub predicates: Vec<crate::nodes::ArcPredNode<T>>,
}

impl<T: NodeType> std::fmt::Display for MemoNode<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}", self.typ)?;
        for child in &self.children {
            write!(f, " {}", child)?;
        }
        for pred in &self.predicates {
            write!(f, " {}", pred)?;
        }
        write!(f, ")")
    }
}

/// Per-expression derived (logical) property cache. Each slot fills lazily and exactly
/// once; `complete` is set only by a full derive pass, after which the expression can be
/// detached from its memo provenance without losing information.
pub struct DerivedProperties {
    slots: Box<[OnceLock<Arc<dyn LogicalProperty>>]>,
    complete: AtomicBool,
}

impl DerivedProperties {
    fn new(num_slots: usize) -> Self {
        let mut slots = Vec::with_capacity(num_slots);
        slots.resize_with(num_slots, OnceLock::new);
        Self {
            slots: slots.into_boxed_slice(),
            complete: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    fn mark_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }

    pub(crate) fn slot(
        &self,
        idx: usize,
        init: impl FnOnce() -> Arc<dyn LogicalProperty>,
    ) -> Arc<dyn LogicalProperty> {
        self.slots[idx].get_or_init(init).clone()
    }

    /// The already-derived value of a slot, if any.
    pub fn get(&self, idx: usize) -> Option<Arc<dyn LogicalProperty>> {
        self.slots[idx].get().cloned()
    }
}

/// One operator alternative inside a group. The node is behind a lock because group
/// merges rewrite child references in place; the owning-group back-link is updated the
/// same way.
pub struct GroupExpr<T: NodeType> {
    id: ExprId,
    group: AtomicUsize,
    node: RwLock<ArcMemoNode<T>>,
    derived: DerivedProperties,
}

impl<T: NodeType> GroupExpr<T> {
    fn new(id: ExprId, group: GroupId, node: ArcMemoNode<T>, num_logical_props: usize) -> Self {
        Self {
            id,
            group: AtomicUsize::new(group.0),
            node: RwLock::new(node),
            derived: DerivedProperties::new(num_logical_props),
        }
    }

    pub fn id(&self) -> ExprId {
        self.id
    }

    pub fn group_id(&self) -> GroupId {
        GroupId(self.group.load(Ordering::Acquire))
    }

    fn set_group(&self, group: GroupId) {
        self.group.store(group.0, Ordering::Release);
    }

    pub fn node(&self) -> ArcMemoNode<T> {
        self.node.read().clone()
    }

    fn set_node(&self, node: ArcMemoNode<T>) {
        *self.node.write() = node;
    }

    pub fn derived(&self) -> &DerivedProperties {
        &self.derived
    }

    pub fn is_logical(&self) -> bool {
        self.node.read().typ.is_logical()
    }
}

/// Search progress of a group. The flags and the parked continuations live under one
/// lock so a subscriber can check the flag and park atomically against the finalizer.
pub(crate) struct GroupSearchState<T: NodeType> {
    pub(crate) explored: bool,
    pub(crate) exploring: bool,
    pub(crate) implemented: bool,
    pub(crate) implementing: bool,
    pub(crate) explore_waiters: Vec<Job<T>>,
    pub(crate) implement_waiters: Vec<Job<T>>,
}

impl<T: NodeType> GroupSearchState<T> {
    fn new() -> Self {
        Self {
            explored: false,
            exploring: false,
            implemented: false,
            implementing: false,
            explore_waiters: Vec::new(),
            implement_waiters: Vec::new(),
        }
    }
}

/// An equivalence class of group expressions producing the same logical result.
pub struct Group<T: NodeType> {
    id: GroupId,
    pub(crate) exprs: Mutex<HashSet<ExprId>>,
    pub(crate) search: Mutex<GroupSearchState<T>>,
    pub(crate) contexts: Mutex<Vec<Arc<OptimizationContext<T>>>>,
    /// Representative derived properties, computed from one member expression on demand.
    logical_props: OnceLock<Arc<[Arc<dyn LogicalProperty>]>>,
    cte_producer: AtomicBool,
}

impl<T: NodeType> Group<T> {
    fn new(id: GroupId) -> Self {
        Self {
            id,
            exprs: Mutex::new(HashSet::new()),
            search: Mutex::new(GroupSearchState::new()),
            contexts: Mutex::new(Vec::new()),
            logical_props: OnceLock::new(),
            cte_producer: AtomicBool::new(false),
        }
    }

    /// The id the group was created with. After a merge the group may be reachable under
    /// other ids; [`Memo::reduce_group`] gives the canonical one.
    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn is_cte_producer(&self) -> bool {
        self.cte_producer.load(Ordering::Acquire)
    }

    fn mark_cte_producer(&self) {
        self.cte_producer.store(true, Ordering::Release);
    }
}

struct MemoState<T: NodeType> {
    // Source of truth.
    groups: HashMap<GroupId, Arc<Group<T>>>,
    expr_id_to_expr: HashMap<ExprId, Arc<GroupExpr<T>>>,

    // Indexes.
    expr_node_to_expr_id: HashMap<MemoNode<T>, ExprId>,
    expr_id_to_group_id: HashMap<ExprId, GroupId>,

    // We update all group IDs in the memo table upon group merging, but in-flight jobs
    // may still hold the old ids. These mappings redirect them to the merged entities.
    merged_group_mapping: HashMap<GroupId, GroupId>,
    dup_expr_mapping: HashMap<ExprId, ExprId>,
}

/// The shared memo table. All mutating entry points take `&self`; the topology lock and
/// the per-entry locks provide the synchronization.
pub struct Memo<T: NodeType> {
    state: RwLock<MemoState<T>>,
    /// Group, expression and context ids share one counter to make traces easier to
    /// follow.
    counter: AtomicUsize,
    logical_property_builders: Arc<[Box<dyn LogicalPropertyBuilderAny<T>>]>,
    physical_property_builders: PhysicalPropertyBuilders<T>,
}

impl<T: NodeType> Memo<T> {
    pub fn new(
        logical_property_builders: Arc<[Box<dyn LogicalPropertyBuilderAny<T>>]>,
        physical_property_builders: PhysicalPropertyBuilders<T>,
    ) -> Self {
        Self {
            state: RwLock::new(MemoState {
                groups: HashMap::new(),
                expr_id_to_expr: HashMap::new(),
                expr_node_to_expr_id: HashMap::new(),
                expr_id_to_group_id: HashMap::new(),
                merged_group_mapping: HashMap::new(),
                dup_expr_mapping: HashMap::new(),
            }),
            counter: AtomicUsize::new(0),
            logical_property_builders,
            physical_property_builders,
        }
    }

    pub fn logical_property_builders(&self) -> &Arc<[Box<dyn LogicalPropertyBuilderAny<T>>]> {
        &self.logical_property_builders
    }

    pub fn physical_property_builders(&self) -> &PhysicalPropertyBuilders<T> {
        &self.physical_property_builders
    }

    fn next_group_id(&self) -> GroupId {
        GroupId(self.counter.fetch_add(1, Ordering::Relaxed))
    }

    fn next_expr_id(&self) -> ExprId {
        ExprId(self.counter.fetch_add(1, Ordering::Relaxed))
    }

    fn next_context_id(&self) -> ContextId {
        ContextId(self.counter.fetch_add(1, Ordering::Relaxed))
    }

    fn reduce(state: &MemoState<T>, group_id: GroupId) -> GroupId {
        state.merged_group_mapping[&group_id]
    }

    fn chase_dup(state: &MemoState<T>, mut expr_id: ExprId) -> ExprId {
        while let Some(new_expr_id) = state.dup_expr_mapping.get(&expr_id) {
            expr_id = *new_expr_id;
        }
        expr_id
    }

    /// Add an expression to the memo table. If the expression already exists, the
    /// existing group and expression ids are returned unchanged.
    pub fn add_new_expr(&self, rel_node: ArcPlanNode<T>) -> (GroupId, ExprId) {
        let mut state = self.state.write();
        let (group_id, expr_id) = self.add_new_group_expr_inner(&mut state, rel_node, None);
        self.verify_integrity(&state);
        (group_id, expr_id)
    }

    /// Add an expression to an existing group. If the expression is a group reference,
    /// the two groups are merged and no expression id is returned.
    pub fn add_expr_to_group(
        &self,
        rel_node: PlanNodeOrGroup<T>,
        group_id: GroupId,
    ) -> Option<ExprId> {
        let mut state = self.state.write();
        match rel_node {
            PlanNodeOrGroup::Group(input_group) => {
                let input_group = Self::reduce(&state, input_group);
                let group_id = Self::reduce(&state, group_id);
                self.merge_group_inner(&mut state, group_id, input_group);
                self.verify_integrity(&state);
                None
            }
            PlanNodeOrGroup::PlanNode(rel_node) => {
                let reduced_group_id = Self::reduce(&state, group_id);
                let (returned_group_id, expr_id) =
                    self.add_new_group_expr_inner(&mut state, rel_node, Some(reduced_group_id));
                assert_eq!(returned_group_id, reduced_group_id);
                self.verify_integrity(&state);
                Some(expr_id)
            }
        }
    }

    /// The canonical id of a possibly-merged group.
    pub fn reduce_group(&self, group_id: GroupId) -> GroupId {
        Self::reduce(&self.state.read(), group_id)
    }

    /// Resolve an expression id through the duplicate mapping left behind by merges.
    pub fn resolve_expr_id(&self, expr_id: ExprId) -> ExprId {
        Self::chase_dup(&self.state.read(), expr_id)
    }

    /// The group an expression currently belongs to.
    pub fn get_group_id(&self, expr_id: ExprId) -> GroupId {
        let state = self.state.read();
        let expr_id = Self::chase_dup(&state, expr_id);
        *state
            .expr_id_to_group_id
            .get(&expr_id)
            .expect("expr not found in group mapping")
    }

    pub fn get_expr(&self, expr_id: ExprId) -> Arc<GroupExpr<T>> {
        let state = self.state.read();
        let expr_id = Self::chase_dup(&state, expr_id);
        state
            .expr_id_to_expr
            .get(&expr_id)
            .expect("expr not found in expr mapping")
            .clone()
    }

    pub fn get_expr_memoed(&self, expr_id: ExprId) -> ArcMemoNode<T> {
        self.get_expr(expr_id).node()
    }

    pub fn get_group(&self, group_id: GroupId) -> Arc<Group<T>> {
        self.get_group_reduced(group_id).1
    }

    pub(crate) fn get_group_reduced(&self, group_id: GroupId) -> (GroupId, Arc<Group<T>>) {
        let state = self.state.read();
        let group_id = Self::reduce(&state, group_id);
        let group = state
            .groups
            .get(&group_id)
            .expect("group not found")
            .clone();
        (group_id, group)
    }

    pub fn get_all_group_ids(&self) -> Vec<GroupId> {
        let state = self.state.read();
        let mut ids = state.groups.keys().copied().collect_vec();
        ids.sort();
        ids
    }

    /// All expressions of a group, sorted so that scans process expressions in a stable
    /// order across platforms and runs.
    pub fn all_exprs_in_group(&self, group_id: GroupId) -> Vec<ExprId> {
        let group = self.get_group(group_id);
        let mut exprs = group.exprs.lock().iter().copied().collect_vec();
        exprs.sort();
        exprs
    }

    /// Estimated plan space, used by the partial-exploration budget. Returns the number
    /// of expressions in the memo table.
    pub fn estimated_plan_space(&self) -> usize {
        self.state.read().expr_id_to_expr.len()
    }

    pub fn mark_cte_producer(&self, group_id: GroupId) {
        self.get_group(group_id).mark_cte_producer();
    }

    /// The representative derived logical properties of a group, computed on first use
    /// from the smallest member expression.
    pub fn group_logical_properties(&self, group_id: GroupId) -> Arc<[Arc<dyn LogicalProperty>]> {
        let group = self.get_group(group_id);
        group
            .logical_props
            .get_or_init(|| {
                let expr_id = group
                    .exprs
                    .lock()
                    .iter()
                    .copied()
                    .min()
                    .expect("group has no expressions");
                let expr = self.get_expr(expr_id);
                self.derive_all_properties(&expr);
                (0..self.logical_property_builders.len())
                    .map(|idx| expr.derived().get(idx).expect("full derive pass missed a slot"))
                    .collect()
            })
            .clone()
    }

    /// Derive (or fetch) one logical property slot of an expression.
    pub fn derive_property(&self, expr: &GroupExpr<T>, idx: usize) -> Arc<dyn LogicalProperty> {
        expr.derived().slot(idx, || {
            let node = expr.node();
            let children_props = node
                .children
                .iter()
                .map(|child| self.group_logical_properties(*child))
                .collect_vec();
            let children = children_props
                .iter()
                .map(|props| props[idx].as_ref())
                .collect_vec();
            let builder = &self.logical_property_builders[idx];
            Arc::from(builder.derive_any(node.typ.clone(), &node.predicates, &children))
        })
    }

    /// Run a full derive pass over an expression and set its completion flag. A second
    /// call returns without invoking any derivation logic.
    pub fn derive_all_properties(&self, expr: &GroupExpr<T>) {
        if expr.derived().is_complete() {
            return;
        }
        for idx in 0..self.logical_property_builders.len() {
            self.derive_property(expr, idx);
        }
        expr.derived().mark_complete();
    }

    /// Whether any logical property builder proves the group produces at most one row.
    pub fn group_at_most_one_row(&self, group_id: GroupId) -> bool {
        let props = self.group_logical_properties(group_id);
        self.logical_property_builders
            .iter()
            .zip(props.iter())
            .any(|(builder, prop)| builder.at_most_one_row_any(prop.as_ref()) == Some(true))
    }

    /// Create or fetch the optimization context of a group for a required property set
    /// within a stage. Field-wise-equal requirement vectors collapse onto one context.
    /// Returns whether the context was newly created (the creator schedules its job).
    pub fn create_or_get_context(
        &self,
        group_id: GroupId,
        required: RequiredPlanProperties,
        stage: usize,
    ) -> (Arc<OptimizationContext<T>>, bool) {
        assert_eq!(required.len(), self.physical_property_builders.len());
        let mut hasher = DefaultHasher::new();
        self.physical_property_builders.hash_any(&required, &mut hasher);
        let required_hash = hasher.finish();

        // Hold the topology read lock so context creation cannot interleave with a group
        // merge moving the context table.
        let state = self.state.read();
        let group_id = Self::reduce(&state, group_id);
        let group = state.groups.get(&group_id).expect("group not found").clone();
        let mut contexts = group.contexts.lock();
        if let Some(existing) = contexts.iter().find(|ctx| {
            ctx.stage() == stage
                && ctx.required_hash() == required_hash
                && self.physical_property_builders.exactly_eq(ctx.required(), &required)
        }) {
            return (existing.clone(), false);
        }
        let ctx = Arc::new(OptimizationContext::new(
            self.next_context_id(),
            group_id,
            stage,
            required,
            required_hash,
        ));
        trace!(event = "create_context", context_id = %ctx.id(), group_id = %group_id, stage = stage);
        contexts.push(ctx.clone());
        (ctx, true)
    }

    /// All contexts of a group (for dumps and tests).
    pub fn contexts_of(&self, group_id: GroupId) -> Vec<Arc<OptimizationContext<T>>> {
        self.get_group(group_id).contexts.lock().clone()
    }

    fn add_new_group_expr_inner(
        &self,
        state: &mut MemoState<T>,
        rel_node: ArcPlanNode<T>,
        add_to_group_id: Option<GroupId>,
    ) -> (GroupId, ExprId) {
        let children_group_ids = rel_node
            .children
            .iter()
            .map(|child| match child {
                PlanNodeOrGroup::Group(group) => Self::reduce(state, *group),
                PlanNodeOrGroup::PlanNode(child) => {
                    let (group, _) = self.add_new_group_expr_inner(state, child.clone(), None);
                    Self::reduce(state, group)
                }
            })
            .collect::<Vec<_>>();
        let memo_node = MemoNode {
            typ: rel_node.typ.clone(),
            children: children_group_ids,
            predicates: rel_node.predicates.clone(),
        };
        if let Some(&expr_id) = state.expr_node_to_expr_id.get(&memo_node) {
            let group_id = state.expr_id_to_group_id[&expr_id];
            if let Some(add_to_group_id) = add_to_group_id {
                let add_to_group_id = Self::reduce(state, add_to_group_id);
                self.merge_group_inner(state, add_to_group_id, group_id);
                return (add_to_group_id, expr_id);
            }
            return (group_id, expr_id);
        }
        let expr_id = self.next_expr_id();
        let group_id = if let Some(group_id) = add_to_group_id {
            group_id
        } else {
            self.next_group_id()
        };
        let expr = Arc::new(GroupExpr::new(
            expr_id,
            group_id,
            Arc::new(memo_node.clone()),
            self.logical_property_builders.len(),
        ));
        state.expr_id_to_expr.insert(expr_id, expr);
        state.expr_id_to_group_id.insert(expr_id, group_id);
        state.expr_node_to_expr_id.insert(memo_node.clone(), expr_id);
        self.append_expr_to_group(state, expr_id, group_id, &memo_node);
        (group_id, expr_id)
    }

    fn append_expr_to_group(
        &self,
        state: &mut MemoState<T>,
        expr_id: ExprId,
        group_id: GroupId,
        memo_node: &MemoNode<T>,
    ) {
        trace!(event = "add_expr_to_group", group_id = %group_id, expr_id = %expr_id, memo_node = %memo_node);
        if let Some(group) = state.groups.get(&group_id) {
            group.exprs.lock().insert(expr_id);
            return;
        }
        let group = Arc::new(Group::new(group_id));
        group.exprs.lock().insert(expr_id);
        state.groups.insert(group_id, group);
        state.merged_group_mapping.insert(group_id, group_id);
    }

    fn merge_group_inner(&self, state: &mut MemoState<T>, merge_into: GroupId, merge_from: GroupId) {
        if merge_into == merge_from {
            return;
        }
        trace!(event = "merge_group", merge_into = %merge_into, merge_from = %merge_from);
        let group_from = state
            .groups
            .remove(&merge_from)
            .expect("merge source group not found");
        let group_into = state
            .groups
            .get(&merge_into)
            .expect("merge target group not found")
            .clone();

        // Move the expressions over and fix the back-links.
        let mut moved = {
            let mut from_exprs = group_from.exprs.lock();
            std::mem::take(&mut *from_exprs).into_iter().collect_vec()
        };
        moved.sort();
        {
            let mut into_exprs = group_into.exprs.lock();
            for expr_id in moved {
                state.expr_id_to_group_id.insert(expr_id, merge_into);
                state.expr_id_to_expr[&expr_id].set_group(merge_into);
                into_exprs.insert(expr_id);
            }
        }

        // The surviving group is only explored/implemented if both sides were; clearing
        // the flags makes a later search pass pick up the newly merged-in expressions.
        // Rules already fired on them are deduplicated by the caller's bookkeeping.
        // Waiters parked on the merged-away group move over; the in-flight claimant that
        // would have drained them re-resolves to the surviving group at finalization.
        {
            let mut from_search = group_from.search.lock();
            let mut into_search = group_into.search.lock();
            into_search.explored &= from_search.explored;
            into_search.implemented &= from_search.implemented;
            let explore_waiters = std::mem::take(&mut from_search.explore_waiters);
            into_search.explore_waiters.extend(explore_waiters);
            let implement_waiters = std::mem::take(&mut from_search.implement_waiters);
            into_search.implement_waiters.extend(implement_waiters);
        }
        if group_from.is_cte_producer() {
            group_into.mark_cte_producer();
        }

        // Union the context tables. A context equal to one the surviving group already
        // has is redirected; jobs still driving it run it to completion on their own.
        {
            let from_contexts = {
                let mut contexts = group_from.contexts.lock();
                std::mem::take(&mut *contexts)
            };
            let mut into_contexts = group_into.contexts.lock();
            for ctx in from_contexts {
                let existing = into_contexts.iter().find(|c| {
                    c.stage() == ctx.stage()
                        && c.required_hash() == ctx.required_hash()
                        && self.physical_property_builders.exactly_eq(c.required(), ctx.required())
                });
                match existing {
                    Some(canonical) => ctx.set_redirect(canonical.clone()),
                    None => into_contexts.push(ctx),
                }
            }
        }

        state.merged_group_mapping.insert(merge_from, merge_into);
        // Keep every mapping value canonical -- could be optimized with union find.
        for (_, mapped_to) in state.merged_group_mapping.iter_mut() {
            if *mapped_to == merge_from {
                *mapped_to = merge_into;
            }
        }

        // Rewrite referrers of the merged-away group. A rewrite that makes an expression
        // structurally identical to another one merges their groups too.
        let mut pending_recursive_merge = Vec::new();
        let group_ids = state.groups.keys().copied().collect_vec();
        for group_id in group_ids {
            let group = state.groups[&group_id].clone();
            let mut exprs_snapshot = group.exprs.lock().iter().copied().collect_vec();
            exprs_snapshot.sort();
            let mut new_expr_list = HashSet::new();
            for expr_id in exprs_snapshot {
                let expr = state.expr_id_to_expr[&expr_id].clone();
                let node = expr.node();
                if node.children.contains(&merge_from) {
                    let old_node = (*node).clone();
                    let mut new_node = (*node).clone();
                    new_node.children.iter_mut().for_each(|child| {
                        if *child == merge_from {
                            *child = merge_into;
                        }
                    });
                    state.expr_node_to_expr_id.remove(&old_node);
                    if let Some(&dup_expr) = state.expr_node_to_expr_id.get(&new_node) {
                        // The rewritten expression already exists elsewhere; drop this
                        // one and remember the redirect for in-flight holders.
                        let dup_group_id = state.expr_id_to_group_id[&dup_expr];
                        if dup_group_id != group_id {
                            pending_recursive_merge.push((dup_group_id, group_id));
                        }
                        state.expr_id_to_expr.remove(&expr_id);
                        state.expr_id_to_group_id.remove(&expr_id);
                        state.dup_expr_mapping.insert(expr_id, dup_expr);
                        // Kept temporarily so the group stays non-empty; the recursive
                        // merge unions the lists.
                        new_expr_list.insert(dup_expr);
                    } else {
                        expr.set_node(Arc::new(new_node.clone()));
                        state.expr_node_to_expr_id.insert(new_node, expr_id);
                        new_expr_list.insert(expr_id);
                    }
                } else {
                    new_expr_list.insert(expr_id);
                }
            }
            assert!(!new_expr_list.is_empty());
            *group.exprs.lock() = new_expr_list;
        }
        for (merge_from, merge_into) in pending_recursive_merge {
            // Each earlier merge may have invalidated these ids.
            let merge_from = Self::reduce(state, merge_from);
            let merge_into = Self::reduce(state, merge_into);
            self.merge_group_inner(state, merge_into, merge_from);
        }
    }

    fn verify_integrity(&self, state: &MemoState<T>) {
        if cfg!(debug_assertions) {
            let num_of_exprs = state.expr_id_to_expr.len();
            assert_eq!(num_of_exprs, state.expr_node_to_expr_id.len());
            assert_eq!(num_of_exprs, state.expr_id_to_group_id.len());

            let mut valid_groups = HashSet::new();
            for to in state.merged_group_mapping.values() {
                assert_eq!(state.merged_group_mapping[to], *to);
                valid_groups.insert(*to);
            }
            assert_eq!(valid_groups.len(), state.groups.len());

            for (id, expr) in state.expr_id_to_expr.iter() {
                let node = expr.node();
                assert_eq!(state.expr_node_to_expr_id[&node], *id);
                assert_eq!(expr.group_id(), state.expr_id_to_group_id[id]);
                for child in &node.children {
                    assert!(
                        valid_groups.contains(child),
                        "invalid group used in expression {}, where {} does not exist any more",
                        node,
                        child
                    );
                }
            }

            let mut cnt = 0;
            for (group_id, group) in &state.groups {
                assert!(valid_groups.contains(group_id));
                let exprs = group.exprs.lock();
                cnt += exprs.len();
                assert!(!exprs.is_empty());
                for expr in exprs.iter() {
                    assert_eq!(state.expr_id_to_group_id[expr], *group_id);
                }
            }
            assert_eq!(cnt, num_of_exprs);
        }
    }

    /// This is inefficient and should be only used for debugging purposes.
    #[cfg(test)]
    pub(crate) fn get_expr_info(&self, rel_node: ArcPlanNode<T>) -> (GroupId, ExprId) {
        let children_group_ids = rel_node
            .children
            .iter()
            .map(|child| match child {
                PlanNodeOrGroup::Group(group) => *group,
                PlanNodeOrGroup::PlanNode(child) => self.get_expr_info(child.clone()).0,
            })
            .collect::<Vec<_>>();
        let memo_node = MemoNode {
            typ: rel_node.typ.clone(),
            children: children_group_ids,
            predicates: rel_node.predicates.clone(),
        };
        let state = self.state.read();
        let Some(&expr_id) = state.expr_node_to_expr_id.get(&memo_node) else {
            unreachable!("not found {}", memo_node)
        };
        let group_id = state.expr_id_to_group_id[&expr_id];
        (group_id, expr_id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::nodes::Value;
    use crate::tests::common::{
        expr, join, list, project, scan, MemoTestRelTyp, TestPropertyBuilder,
    };

    fn empty_memo() -> Memo<MemoTestRelTyp> {
        Memo::new(Arc::new([]), PhysicalPropertyBuilders::new_empty_for_test())
    }

    #[test]
    fn insert_idempotent() {
        let memo = empty_memo();
        let node = join(scan("t1"), scan("t2"), expr(Value::Bool(true)));
        let (group_1, expr_1) = memo.add_new_expr(node.clone());
        let space = memo.estimated_plan_space();
        let (group_2, expr_2) = memo.add_new_expr(node);
        assert_eq!(group_1, group_2);
        assert_eq!(expr_1, expr_2);
        assert_eq!(space, memo.estimated_plan_space());
    }

    #[test]
    fn group_merge_1() {
        let memo = empty_memo();
        let (group_id, _) = memo.add_new_expr(join(scan("t1"), scan("t2"), expr(Value::Bool(true))));
        memo.add_expr_to_group(
            join(scan("t2"), scan("t1"), expr(Value::Bool(true))).into(),
            group_id,
        );
        assert_eq!(memo.all_exprs_in_group(group_id).len(), 2);
    }

    #[test]
    fn group_merge_2() {
        let memo = empty_memo();
        let (group_id_1, _) = memo.add_new_expr(project(
            join(scan("t1"), scan("t2"), expr(Value::Bool(true))),
            list(vec![expr(Value::Int64(1))]),
        ));
        let (group_id_2, _) = memo.add_new_expr(project(
            join(scan("t1"), scan("t2"), expr(Value::Bool(true))),
            list(vec![expr(Value::Int64(1))]),
        ));
        assert_eq!(group_id_1, group_id_2);
    }

    #[test]
    fn group_merge_3() {
        let memo = empty_memo();
        let expr1 = project(scan("t1"), list(vec![expr(Value::Int64(1))]));
        let expr2 = project(scan("t1-alias"), list(vec![expr(Value::Int64(1))]));
        memo.add_new_expr(expr1.clone());
        memo.add_new_expr(expr2.clone());
        // merging two child groups causes the parents to merge
        let (group_id_expr, _) = memo.get_expr_info(scan("t1"));
        memo.add_expr_to_group(scan("t1-alias").into(), group_id_expr);
        let (group_1, _) = memo.get_expr_info(expr1);
        let (group_2, _) = memo.get_expr_info(expr2);
        assert_eq!(memo.reduce_group(group_1), memo.reduce_group(group_2));
    }

    #[test]
    fn group_merge_4() {
        let memo = empty_memo();
        let expr1 = project(
            project(scan("t1"), list(vec![expr(Value::Int64(1))])),
            list(vec![expr(Value::Int64(2))]),
        );
        let expr2 = project(
            project(scan("t1-alias"), list(vec![expr(Value::Int64(1))])),
            list(vec![expr(Value::Int64(2))]),
        );
        memo.add_new_expr(expr1.clone());
        memo.add_new_expr(expr2.clone());
        // merging two leaf groups causes two levels of parents to merge
        let (group_id_expr, _) = memo.get_expr_info(scan("t1"));
        memo.add_expr_to_group(scan("t1-alias").into(), group_id_expr);
        let (group_1, _) = memo.get_expr_info(expr1);
        let (group_2, _) = memo.get_expr_info(expr2);
        assert_eq!(memo.reduce_group(group_1), memo.reduce_group(group_2));
    }

    #[test]
    fn stale_expr_id_resolves_after_merge() {
        let memo = empty_memo();
        let expr1 = project(scan("t1"), list(vec![expr(Value::Int64(1))]));
        let expr2 = project(scan("t1-alias"), list(vec![expr(Value::Int64(1))]));
        let (_, expr_id_1) = memo.add_new_expr(expr1);
        let (_, expr_id_2) = memo.add_new_expr(expr2);
        let (scan_group, _) = memo.get_expr_info(scan("t1"));
        memo.add_expr_to_group(scan("t1-alias").into(), scan_group);
        // both old ids still resolve, to the same surviving expression
        let node_1 = memo.get_expr_memoed(expr_id_1);
        let node_2 = memo.get_expr_memoed(expr_id_2);
        assert_eq!(node_1, node_2);
        assert_eq!(memo.get_group_id(expr_id_1), memo.get_group_id(expr_id_2));
    }

    #[test]
    fn derive_logical_property() {
        let memo = Memo::new(
            Arc::new([Box::new(TestPropertyBuilder)]),
            PhysicalPropertyBuilders::new_empty_for_test(),
        );
        let (group_id, expr_id) = memo.add_new_expr(join(
            scan("t1"),
            scan("t2"),
            expr(Value::Bool(true)),
        ));
        let props = memo.group_logical_properties(group_id);
        assert_eq!(props.len(), 1);
        assert_eq!(format!("{}", props[0]), r#"["scan_col", "scan_col"]"#);

        // a full derive pass sets the completion flag; re-deriving returns the cached Arc
        let group_expr = memo.get_expr(expr_id);
        assert!(group_expr.derived().is_complete());
        let before = memo.derive_property(&group_expr, 0);
        let after = memo.derive_property(&group_expr, 0);
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn context_identity_and_collapse() {
        let memo = empty_memo();
        let (group_id, _) = memo.add_new_expr(scan("t1"));
        let required: RequiredPlanProperties = Vec::new().into();
        let (ctx_1, created_1) = memo.create_or_get_context(group_id, required.clone(), 0);
        let (ctx_2, created_2) = memo.create_or_get_context(group_id, required, 0);
        assert!(created_1);
        assert!(!created_2);
        assert_eq!(ctx_1.id(), ctx_2.id());
        assert!(Arc::ptr_eq(&ctx_1, &ctx_2));
    }
}
