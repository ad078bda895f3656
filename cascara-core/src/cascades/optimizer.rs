// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use itertools::Itertools;
use thiserror::Error;
use tracing::trace;

use super::context::{ContextId, CostSource, CtxState, OptimizationContext};
use super::memo::Memo;
use super::scheduler::{Job, Scheduler};
use crate::cost::CostModel;
use crate::logical_property::{LogicalPropertyBuilder, LogicalPropertyBuilderAny};
use crate::nodes::{
    ArcPlanNode, NodeType, PlanNode, PlanNodeMeta, PlanNodeMetaMap, PlanNodeOrGroup,
};
use crate::optimizer::Optimizer;
use crate::physical_property::{
    PhysicalProperty, PhysicalPropertyBuilderAny, PhysicalPropertyBuilders,
    RequiredPlanProperties,
};
use crate::rules::Rule;

/// One pass of the search with its own rule set and enforcement policy. All stages share
/// the memo table; the final stage must carry implementation rules so a physical winner
/// can exist.
pub struct SearchStage<T: NodeType> {
    pub name: &'static str,
    pub rules: Arc<[Arc<dyn Rule<T>>]>,
    pub allow_enforcers: bool,
}

impl<T: NodeType> SearchStage<T> {
    pub fn new(name: &'static str, rules: Vec<Arc<dyn Rule<T>>>, allow_enforcers: bool) -> Self {
        Self {
            name,
            rules: rules.into(),
            allow_enforcers,
        }
    }
}

#[derive(Clone, Debug)]
pub struct OptimizerProperties {
    /// Number of worker threads per stage.
    pub workers: usize,
    /// Stop applying rules once the memo table holds more than this many expressions.
    pub partial_explore_budget: Option<usize>,
    pub panic_on_budget: bool,
    /// Disable cost-upper-bound pruning during optimization.
    pub disable_pruning: bool,
}

impl Default for OptimizerProperties {
    fn default() -> Self {
        Self {
            workers: 1,
            partial_explore_budget: None,
            panic_on_budget: false,
            disable_pruning: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum OptimizerError {
    /// The root context finished optimization with no winner.
    #[error("no physical plan satisfies the required properties")]
    NoPlanFound,
    /// The cancellation token was set while the search was running.
    #[error("optimization canceled")]
    Canceled,
    /// The exploration budget cut the search short before any winner was found.
    #[error("plan space budget exhausted before a plan was found")]
    BudgetExhausted,
}

/// The cascades optimizer: drives one or more [`SearchStage`]s over a shared [`Memo`]
/// with a pool of worker threads, then rehydrates the winning plan.
pub struct CascadesOptimizer<T: NodeType> {
    memo: Arc<Memo<T>>,
    cost: Arc<dyn CostModel<T>>,
    stages: Vec<SearchStage<T>>,
    pub prop: OptimizerProperties,
    cancel: Arc<AtomicBool>,
}

impl<T: NodeType> CascadesOptimizer<T> {
    pub fn new(
        stages: Vec<SearchStage<T>>,
        cost: Box<dyn CostModel<T>>,
        logical_property_builders: Arc<[Box<dyn LogicalPropertyBuilderAny<T>>]>,
        physical_property_builders: Arc<[Box<dyn PhysicalPropertyBuilderAny<T>>]>,
    ) -> Self {
        Self::new_with_options(
            stages,
            cost,
            logical_property_builders,
            physical_property_builders,
            Default::default(),
        )
    }

    pub fn new_with_options(
        stages: Vec<SearchStage<T>>,
        cost: Box<dyn CostModel<T>>,
        logical_property_builders: Arc<[Box<dyn LogicalPropertyBuilderAny<T>>]>,
        physical_property_builders: Arc<[Box<dyn PhysicalPropertyBuilderAny<T>>]>,
        prop: OptimizerProperties,
    ) -> Self {
        assert!(!stages.is_empty(), "at least one search stage is required");
        let memo = Arc::new(Memo::new(
            logical_property_builders,
            PhysicalPropertyBuilders(physical_property_builders),
        ));
        Self {
            memo,
            cost: cost.into(),
            stages,
            prop,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn memo(&self) -> &Arc<Memo<T>> {
        &self.memo
    }

    pub fn cost(&self) -> Arc<dyn CostModel<T>> {
        self.cost.clone()
    }

    /// The shared cancellation token. Setting it makes in-flight workers drain their
    /// queues without doing further work and the driver return
    /// [`OptimizerError::Canceled`].
    pub fn cancellation_token(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn disable_pruning(&mut self, enabled: bool) {
        self.prop.disable_pruning = enabled;
    }

    pub fn panic_on_explore_limit(&mut self, enabled: bool) {
        self.prop.panic_on_budget = enabled;
    }

    /// Optimize `root_rel` under an explicit requirement vector, optionally collecting
    /// per-node winner metadata for explain output.
    pub fn optimize_with_meta(
        &self,
        root_rel: ArcPlanNode<T>,
        required_props: &[&dyn PhysicalProperty],
        meta: &mut Option<PlanNodeMetaMap>,
    ) -> Result<ArcPlanNode<T>, OptimizerError> {
        let required: RequiredPlanProperties =
            required_props.iter().map(|x| x.to_boxed()).collect_vec().into();
        self.optimize_inner(root_rel, required, meta)
    }

    fn optimize_inner(
        &self,
        root_rel: ArcPlanNode<T>,
        required: RequiredPlanProperties,
        meta: &mut Option<PlanNodeMetaMap>,
    ) -> Result<ArcPlanNode<T>, OptimizerError> {
        let (group_id, _) = self.memo.add_new_expr(root_rel);
        let mut budget_reached = false;
        let mut root_context = None;
        for (stage_index, stage) in self.stages.iter().enumerate() {
            if stage_index > 0 {
                // Search flags are not stage-keyed; contexts (and their winners) are.
                self.reset_search_flags();
            }
            let scheduler = Scheduler::new(
                self.memo.clone(),
                self.cost.clone(),
                stage.rules.clone(),
                stage_index,
                stage.allow_enforcers,
                self.prop.disable_pruning,
                self.prop.partial_explore_budget,
                self.prop.panic_on_budget,
                self.cancel.clone(),
            );
            let (context, created) =
                self.memo
                    .create_or_get_context(group_id, required.clone(), stage_index);
            trace!(
                event = "stage_begin",
                stage = stage.name,
                root_group_id = %group_id,
                root_context_id = %context.id(),
            );
            if created {
                scheduler.seed(Job::OptimizeContext {
                    context: context.clone(),
                });
            }
            scheduler.run(self.prop.workers);
            budget_reached |= scheduler.budget_was_reached();
            trace!(
                event = "stage_end",
                stage = stage.name,
                plan_space = self.memo.estimated_plan_space(),
            );
            if self.cancel.load(Ordering::Acquire) {
                return Err(OptimizerError::Canceled);
            }
            root_context = Some(context);
        }
        let root_context = root_context
            .unwrap_or_else(|| unreachable!("stages are non-empty"))
            .canonical();
        if root_context.winner().is_none() {
            if budget_reached {
                return Err(OptimizerError::BudgetExhausted);
            }
            return Err(OptimizerError::NoPlanFound);
        }
        let mut on_path = HashSet::new();
        Ok(self.rehydrate(&root_context, meta, &mut on_path))
    }

    /// Clear every group's explored/implemented flags so the next stage's rules apply to
    /// the full memo again. Only called between stages, at quiescence, when no waiter can
    /// be parked anywhere.
    fn reset_search_flags(&self) {
        for group_id in self.memo.get_all_group_ids() {
            let group = self.memo.get_group(group_id);
            let mut search = group.search.lock();
            debug_assert!(search.explore_waiters.is_empty());
            debug_assert!(search.implement_waiters.is_empty());
            search.explored = false;
            search.exploring = false;
            search.implemented = false;
            search.implementing = false;
        }
    }

    /// Materialize the winning plan of a context by walking its winner's cost-context
    /// tree. `on_path` holds the contexts of the current path; revisiting one would mean
    /// the winner tree has a cycle, which the search never produces.
    fn rehydrate(
        &self,
        context: &Arc<OptimizationContext<T>>,
        meta: &mut Option<PlanNodeMetaMap>,
        on_path: &mut HashSet<ContextId>,
    ) -> ArcPlanNode<T> {
        let context = context.canonical();
        assert!(
            on_path.insert(context.id()),
            "cycle through context {} in the winning plan",
            context.id()
        );
        let winner = context
            .winner()
            .expect("winning plan references a context without a winner");
        let plan = match &winner.source {
            CostSource::Expr { expr_id, children } => {
                let node = self.memo.get_expr_memoed(*expr_id);
                let children = children
                    .iter()
                    .map(|child| {
                        PlanNodeOrGroup::PlanNode(self.rehydrate(child, meta, on_path))
                    })
                    .collect();
                let plan = Arc::new(PlanNode {
                    typ: node.typ.clone(),
                    children,
                    predicates: node.predicates.clone(),
                });
                self.annotate(&plan, &context, meta);
                plan
            }
            CostSource::Enforcer { chain, child } => {
                let mut plan = self.rehydrate(child, meta, on_path);
                for (typ, predicates) in chain {
                    plan = Arc::new(PlanNode {
                        typ: typ.clone(),
                        children: vec![PlanNodeOrGroup::PlanNode(plan)],
                        predicates: predicates.clone(),
                    });
                    self.annotate(&plan, &context, meta);
                }
                plan
            }
            CostSource::Propagate { child } => self.rehydrate(child, meta, on_path),
        };
        on_path.remove(&context.id());
        plan
    }

    fn annotate(
        &self,
        plan: &ArcPlanNode<T>,
        context: &Arc<OptimizationContext<T>>,
        meta: &mut Option<PlanNodeMetaMap>,
    ) {
        let Some(meta) = meta else {
            return;
        };
        let winner = context
            .winner()
            .expect("annotated context must have a winner");
        meta.insert(
            Arc::as_ptr(plan) as usize,
            PlanNodeMeta::new(
                self.memo.reduce_group(context.group()),
                context.id(),
                winner.total_weighted_cost,
                winner.total_cost.clone(),
                winner.statistics.clone(),
                self.cost.explain_cost(&winner.total_cost),
                self.cost.explain_statistics(&winner.statistics),
                winner.derived_physical_properties.clone(),
            ),
        );
    }

    /// Render the memo state: every group with its logical properties, expressions, and
    /// contexts with their winners.
    pub fn dump(&self, mut buf: impl std::fmt::Write) -> std::fmt::Result {
        for group_id in self.memo.get_all_group_ids() {
            writeln!(buf, "group_id={}", group_id)?;
            let props = self.memo.group_logical_properties(group_id);
            for (idx, builder) in self.memo.logical_property_builders().iter().enumerate() {
                writeln!(buf, "  {}={}", builder.property_name(), props[idx])?;
            }
            for expr_id in self.memo.all_exprs_in_group(group_id) {
                writeln!(
                    buf,
                    "  expr_id={} | {}",
                    expr_id,
                    self.memo.get_expr_memoed(expr_id)
                )?;
            }
            for context in self.memo.contexts_of(group_id) {
                let winner_str = match context.winner() {
                    None if context.state() == CtxState::Optimized => {
                        "winner=<impossible>".to_string()
                    }
                    None => "winner=<unknown>".to_string(),
                    Some(winner) => {
                        let source = match &winner.source {
                            CostSource::Expr { expr_id, .. } => {
                                format!("{} | {}", expr_id, self.memo.get_expr_memoed(*expr_id))
                            }
                            CostSource::Enforcer { chain, child } => format!(
                                "enforcer[{}] over {}",
                                chain.iter().map(|(typ, _)| typ.to_string()).join(","),
                                child.id()
                            ),
                            CostSource::Propagate { child } => {
                                format!("propagate {}", child.id())
                            }
                        };
                        format!(
                            "winner={} weighted_cost={}\n    cost={}\n    stat={}",
                            source,
                            winner.total_weighted_cost,
                            self.cost.explain_cost(&winner.total_cost),
                            self.cost.explain_statistics(&winner.statistics),
                        )
                    }
                };
                write!(buf, "  context_id={} stage={}", context.id(), context.stage())?;
                for (idx, builder) in self
                    .memo
                    .physical_property_builders()
                    .0
                    .iter()
                    .enumerate()
                {
                    write!(
                        buf,
                        " {}={}",
                        builder.property_name(),
                        context.required()[idx]
                    )?;
                }
                writeln!(buf, " {}", winner_str)?;
            }
        }
        Ok(())
    }

    fn resolve_group_id(&self, root_rel: PlanNodeOrGroup<T>) -> super::memo::GroupId {
        match root_rel {
            PlanNodeOrGroup::Group(group_id) => self.memo.reduce_group(group_id),
            PlanNodeOrGroup::PlanNode(node) => self.memo.add_new_expr(node).0,
        }
    }
}

impl<T: NodeType> Optimizer<T> for CascadesOptimizer<T> {
    fn optimize(&mut self, root_rel: ArcPlanNode<T>) -> Result<ArcPlanNode<T>> {
        let phys_props = self.memo.physical_property_builders().default_many();
        let phys_props_ref = phys_props.iter().map(|x| x.as_ref()).collect_vec();
        self.optimize_with_required_props(root_rel, &phys_props_ref)
    }

    fn optimize_with_required_props(
        &mut self,
        root_rel: ArcPlanNode<T>,
        required_props: &[&dyn PhysicalProperty],
    ) -> Result<ArcPlanNode<T>> {
        Ok(self.optimize_with_meta(root_rel, required_props, &mut None)?)
    }

    fn get_logical_property<P: LogicalPropertyBuilder<T>>(
        &self,
        root_rel: PlanNodeOrGroup<T>,
        idx: usize,
    ) -> P::Prop {
        let group_id = self.resolve_group_id(root_rel);
        self.memo.group_logical_properties(group_id)[idx]
            .as_any()
            .downcast_ref::<P::Prop>()
            .unwrap()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;
    use crate::nodes::Value;
    use crate::tests::common::{
        agg, column_ref, expr, join, list, physical_nested_loop_join, physical_scan,
        physical_sort, physical_streaming_agg, scan, sort, CardPropertyBuilder, JoinCommuteRule,
        MemoTestRelTyp, PhysicalAggRule, PhysicalJoinRule, PhysicalScanRule, SortProp,
        SortPropertyBuilder, TestCostModel, TestPropertyBuilder,
    };

    fn optimizer_with_workers(
        stages: Vec<SearchStage<MemoTestRelTyp>>,
        workers: usize,
    ) -> CascadesOptimizer<MemoTestRelTyp> {
        CascadesOptimizer::new_with_options(
            stages,
            Box::new(TestCostModel),
            Arc::new([Box::new(TestPropertyBuilder), Box::new(CardPropertyBuilder)]),
            Arc::new([Box::new(SortPropertyBuilder)]),
            OptimizerProperties {
                workers,
                ..Default::default()
            },
        )
    }

    fn optimizer(stages: Vec<SearchStage<MemoTestRelTyp>>) -> CascadesOptimizer<MemoTestRelTyp> {
        optimizer_with_workers(stages, 1)
    }

    fn implementation_stage() -> SearchStage<MemoTestRelTyp> {
        SearchStage::new(
            "implement",
            vec![Arc::new(PhysicalScanRule::new()), Arc::new(PhysicalJoinRule::new())],
            true,
        )
    }

    #[test]
    fn implements_inserted_plan() {
        let mut optimizer = optimizer(vec![implementation_stage()]);
        let cond = expr(Value::Int64(1));
        let plan = optimizer
            .optimize(join(scan("t1"), scan("t2"), cond.clone()))
            .unwrap();
        assert_eq!(
            plan,
            physical_nested_loop_join(physical_scan("t1"), physical_scan("t2"), cond)
        );
    }

    #[test]
    fn commuted_join_wins_when_cheaper() {
        let stage = SearchStage::new(
            "implement",
            vec![
                Arc::new(JoinCommuteRule::new()),
                Arc::new(PhysicalScanRule::new()),
                Arc::new(PhysicalJoinRule::new()),
            ],
            true,
        );
        let optimizer = optimizer(vec![stage]);
        let cond = expr(Value::Int64(1));
        let mut meta = Some(HashMap::new());
        let no_order = SortProp(vec![]);
        let plan = optimizer
            .optimize_with_meta(
                join(scan("t1"), scan("t2"), cond.clone()),
                &[&no_order],
                &mut meta,
            )
            .unwrap();
        // Driving the loop with the 100-row table beats driving it with the 1000-row one.
        assert_eq!(
            plan,
            physical_nested_loop_join(physical_scan("t2"), physical_scan("t1"), cond)
        );
        let meta = meta.unwrap();
        let root_meta = &meta[&(Arc::as_ptr(&plan) as usize)];
        assert_eq!(root_meta.weighted_cost, 3100.0);

        let mut buf = String::new();
        optimizer.dump(&mut buf).unwrap();
        assert!(buf.contains("winner="));
    }

    #[test]
    fn multi_worker_run_finds_the_same_winner() {
        let make_stage = || {
            SearchStage::new(
                "implement",
                vec![
                    Arc::new(JoinCommuteRule::new()) as Arc<dyn Rule<MemoTestRelTyp>>,
                    Arc::new(PhysicalScanRule::new()),
                    Arc::new(PhysicalJoinRule::new()),
                ],
                true,
            )
        };
        let cond = expr(Value::Int64(1));
        let root = join(
            scan("t1"),
            join(scan("t2"), scan("small"), cond.clone()),
            cond.clone(),
        );
        let mut serial = optimizer(vec![make_stage()]);
        let expected = serial.optimize(root.clone()).unwrap();
        let mut concurrent = optimizer_with_workers(vec![make_stage()], 4);
        let plan = concurrent.optimize(root).unwrap();
        assert_eq!(plan, expected);
    }

    #[test]
    fn singleton_aggregate_satisfies_sort_requirement() {
        let stage = SearchStage::new(
            "implement",
            vec![
                Arc::new(PhysicalScanRule::new()) as Arc<dyn Rule<MemoTestRelTyp>>,
                Arc::new(PhysicalAggRule::new()),
            ],
            true,
        );
        let optimizer = optimizer(vec![stage]);
        let required = SortProp(vec!["x".to_string()]);
        let plan = optimizer
            .optimize_with_meta(agg(scan("t1"), list(vec![])), &[&required], &mut None)
            .unwrap();
        // A one-row output is sorted on anything; no enforcer on top.
        assert_eq!(plan, physical_streaming_agg(physical_scan("t1"), list(vec![])));
    }

    #[test]
    fn sort_requirement_absorbed_into_logical_sort() {
        let stage = SearchStage::new(
            "implement",
            vec![Arc::new(PhysicalScanRule::new()) as Arc<dyn Rule<MemoTestRelTyp>>],
            true,
        );
        let mut optimizer = optimizer(vec![stage]);
        let plan = optimizer
            .optimize(sort(scan("t1"), list(vec![column_ref("a")])))
            .unwrap();
        assert_eq!(
            plan,
            physical_sort(physical_scan("t1"), list(vec![column_ref("a")]))
        );
    }

    #[test]
    fn surfaces_no_plan_and_cancellation() {
        let no_order = SortProp(vec![]);
        let opt1 = optimizer(vec![SearchStage::new("implement", vec![], true)]);
        let result = opt1.optimize_with_meta(scan("t1"), &[&no_order], &mut None);
        assert!(matches!(result, Err(OptimizerError::NoPlanFound)));

        let stage = SearchStage::new(
            "implement",
            vec![Arc::new(PhysicalScanRule::new()) as Arc<dyn Rule<MemoTestRelTyp>>],
            true,
        );
        let opt2 = optimizer(vec![stage]);
        opt2.cancellation_token().store(true, Ordering::Release);
        let result = opt2.optimize_with_meta(scan("t1"), &[&no_order], &mut None);
        assert!(matches!(result, Err(OptimizerError::Canceled)));
    }

    #[test]
    fn later_stage_reuses_the_memo() {
        let rewrite = SearchStage::new(
            "rewrite",
            vec![Arc::new(JoinCommuteRule::new()) as Arc<dyn Rule<MemoTestRelTyp>>],
            false,
        );
        let mut optimizer = optimizer(vec![rewrite, implementation_stage()]);
        let cond = expr(Value::Int64(1));
        let plan = optimizer
            .optimize(join(scan("t1"), scan("t2"), cond.clone()))
            .unwrap();
        assert_eq!(
            plan,
            physical_nested_loop_join(physical_scan("t2"), physical_scan("t1"), cond)
        );
    }

    #[test]
    fn random_trees_find_the_same_winner_with_any_worker_count() {
        use rand::rngs::StdRng;
        use rand::seq::SliceRandom;
        use rand::{Rng, SeedableRng};

        let _ = tracing_subscriber::fmt::try_init();
        let make_stage = || {
            SearchStage::new(
                "implement",
                vec![
                    Arc::new(JoinCommuteRule::new()) as Arc<dyn Rule<MemoTestRelTyp>>,
                    Arc::new(PhysicalScanRule::new()),
                    Arc::new(PhysicalJoinRule::new()),
                ],
                true,
            )
        };
        for seed in 0..8 {
            let mut rng = StdRng::seed_from_u64(seed);
            // Three distinct table sizes keep every commute decision strict, so the
            // winner is unique and worker scheduling cannot change it.
            let mut tables = ["t1", "t2", "small"];
            tables.shuffle(&mut rng);
            let cond = expr(Value::Int64(rng.gen_range(0..100)));
            let root = if rng.gen_bool(0.5) {
                join(
                    join(scan(tables[0]), scan(tables[1]), cond.clone()),
                    scan(tables[2]),
                    cond,
                )
            } else {
                join(
                    scan(tables[0]),
                    join(scan(tables[1]), scan(tables[2]), cond.clone()),
                    cond,
                )
            };
            let mut serial = optimizer(vec![make_stage()]);
            let expected = serial.optimize(root.clone()).unwrap();
            for workers in [2, 4] {
                let mut concurrent = optimizer_with_workers(vec![make_stage()], workers);
                let plan = concurrent.optimize(root.clone()).unwrap();
                assert_eq!(plan, expected, "seed {} workers {}", seed, workers);
            }
        }
    }

    #[test]
    fn budget_exhaustion_is_reported() {
        let stage = SearchStage::new(
            "implement",
            vec![Arc::new(PhysicalScanRule::new()) as Arc<dyn Rule<MemoTestRelTyp>>],
            true,
        );
        let optimizer = CascadesOptimizer::new_with_options(
            vec![stage],
            Box::new(TestCostModel),
            Arc::new([Box::new(TestPropertyBuilder), Box::new(CardPropertyBuilder)]),
            Arc::new([Box::new(SortPropertyBuilder)]),
            OptimizerProperties {
                partial_explore_budget: Some(0),
                ..Default::default()
            },
        );
        let result = optimizer.optimize_with_meta(scan("t1"), &[&SortProp(vec![])], &mut None);
        assert!(matches!(result, Err(OptimizerError::BudgetExhausted)));
    }
}
