// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;

use crate::{
    cascades::GroupId,
    cost::{Cost, CostModel, RelNodeContext, Statistics},
    logical_property::{LogicalProperty, LogicalPropertyBuilder},
    nodes::{ArcPlanNode, ArcPredNode, NodeType, PlanNode, PlanNodeOrGroup, PredNode, Value},
    physical_property::{PhysicalProperty, PhysicalPropertyBuilder},
    rules::{Rule, RuleMatcher},
};

#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum MemoTestRelTyp {
    Join,
    Project,
    Scan,
    Sort,
    Filter,
    Agg,
    CteProducer,
    CteScan,
    PhysicalNestedLoopJoin,
    PhysicalProject,
    PhysicalFilter,
    PhysicalScan,
    PhysicalSort,
    PhysicalPartition,
    PhysicalStreamingAgg,
    PhysicalHashAgg,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum MemoTestPredTyp {
    List,
    Expr,
    TableName,
    ColumnRef,
}

impl std::fmt::Display for MemoTestRelTyp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::fmt::Display for MemoTestPredTyp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl NodeType for MemoTestRelTyp {
    type PredType = MemoTestPredTyp;

    fn is_logical(&self) -> bool {
        matches!(
            self,
            Self::Project
                | Self::Scan
                | Self::Join
                | Self::Sort
                | Self::Filter
                | Self::Agg
                | Self::CteProducer
                | Self::CteScan
        )
    }
}

pub(crate) fn join(
    left: impl Into<PlanNodeOrGroup<MemoTestRelTyp>>,
    right: impl Into<PlanNodeOrGroup<MemoTestRelTyp>>,
    cond: ArcPredNode<MemoTestRelTyp>,
) -> ArcPlanNode<MemoTestRelTyp> {
    Arc::new(PlanNode {
        typ: MemoTestRelTyp::Join,
        children: vec![left.into(), right.into()],
        predicates: vec![cond],
    })
}

#[allow(dead_code)]
pub(crate) fn agg(
    input: impl Into<PlanNodeOrGroup<MemoTestRelTyp>>,
    group_bys: ArcPredNode<MemoTestRelTyp>,
) -> ArcPlanNode<MemoTestRelTyp> {
    Arc::new(PlanNode {
        typ: MemoTestRelTyp::Agg,
        children: vec![input.into()],
        predicates: vec![group_bys],
    })
}

#[allow(dead_code)]
pub(crate) fn sort(
    input: impl Into<PlanNodeOrGroup<MemoTestRelTyp>>,
    sort_expr: ArcPredNode<MemoTestRelTyp>,
) -> ArcPlanNode<MemoTestRelTyp> {
    Arc::new(PlanNode {
        typ: MemoTestRelTyp::Sort,
        children: vec![input.into()],
        predicates: vec![sort_expr],
    })
}

#[allow(dead_code)]
pub(crate) fn filter(
    input: impl Into<PlanNodeOrGroup<MemoTestRelTyp>>,
    cond: ArcPredNode<MemoTestRelTyp>,
) -> ArcPlanNode<MemoTestRelTyp> {
    Arc::new(PlanNode {
        typ: MemoTestRelTyp::Filter,
        children: vec![input.into()],
        predicates: vec![cond],
    })
}

pub(crate) fn scan(table: &str) -> ArcPlanNode<MemoTestRelTyp> {
    Arc::new(PlanNode {
        typ: MemoTestRelTyp::Scan,
        children: vec![],
        predicates: vec![table_name(table)],
    })
}

pub(crate) fn table_name(table: &str) -> ArcPredNode<MemoTestRelTyp> {
    Arc::new(PredNode {
        typ: MemoTestPredTyp::TableName,
        children: vec![],
        data: Some(Value::String(table.to_string().into())),
    })
}

pub(crate) fn project(
    input: impl Into<PlanNodeOrGroup<MemoTestRelTyp>>,
    expr_list: ArcPredNode<MemoTestRelTyp>,
) -> ArcPlanNode<MemoTestRelTyp> {
    Arc::new(PlanNode {
        typ: MemoTestRelTyp::Project,
        children: vec![input.into()],
        predicates: vec![expr_list],
    })
}

#[allow(dead_code)]
pub(crate) fn cte_producer(
    definition: impl Into<PlanNodeOrGroup<MemoTestRelTyp>>,
    consumer: impl Into<PlanNodeOrGroup<MemoTestRelTyp>>,
) -> ArcPlanNode<MemoTestRelTyp> {
    Arc::new(PlanNode {
        typ: MemoTestRelTyp::CteProducer,
        children: vec![definition.into(), consumer.into()],
        predicates: vec![],
    })
}

#[allow(dead_code)]
pub(crate) fn cte_scan(name: &str) -> ArcPlanNode<MemoTestRelTyp> {
    Arc::new(PlanNode {
        typ: MemoTestRelTyp::CteScan,
        children: vec![],
        predicates: vec![table_name(name)],
    })
}

pub(crate) fn physical_nested_loop_join(
    left: impl Into<PlanNodeOrGroup<MemoTestRelTyp>>,
    right: impl Into<PlanNodeOrGroup<MemoTestRelTyp>>,
    cond: ArcPredNode<MemoTestRelTyp>,
) -> ArcPlanNode<MemoTestRelTyp> {
    Arc::new(PlanNode {
        typ: MemoTestRelTyp::PhysicalNestedLoopJoin,
        children: vec![left.into(), right.into()],
        predicates: vec![cond],
    })
}

#[allow(dead_code)]
pub(crate) fn physical_project(
    input: impl Into<PlanNodeOrGroup<MemoTestRelTyp>>,
    expr_list: ArcPredNode<MemoTestRelTyp>,
) -> ArcPlanNode<MemoTestRelTyp> {
    Arc::new(PlanNode {
        typ: MemoTestRelTyp::PhysicalProject,
        children: vec![input.into()],
        predicates: vec![expr_list],
    })
}

#[allow(dead_code)]
pub(crate) fn physical_filter(
    input: impl Into<PlanNodeOrGroup<MemoTestRelTyp>>,
    cond: ArcPredNode<MemoTestRelTyp>,
) -> ArcPlanNode<MemoTestRelTyp> {
    Arc::new(PlanNode {
        typ: MemoTestRelTyp::PhysicalFilter,
        children: vec![input.into()],
        predicates: vec![cond],
    })
}

pub(crate) fn physical_scan(table: &str) -> ArcPlanNode<MemoTestRelTyp> {
    Arc::new(PlanNode {
        typ: MemoTestRelTyp::PhysicalScan,
        children: vec![],
        predicates: vec![table_name(table)],
    })
}

#[allow(dead_code)]
pub(crate) fn physical_sort(
    input: impl Into<PlanNodeOrGroup<MemoTestRelTyp>>,
    sort_expr: ArcPredNode<MemoTestRelTyp>,
) -> ArcPlanNode<MemoTestRelTyp> {
    Arc::new(PlanNode {
        typ: MemoTestRelTyp::PhysicalSort,
        children: vec![input.into()],
        predicates: vec![sort_expr],
    })
}

#[allow(dead_code)]
pub(crate) fn physical_streaming_agg(
    input: impl Into<PlanNodeOrGroup<MemoTestRelTyp>>,
    group_bys: ArcPredNode<MemoTestRelTyp>,
) -> ArcPlanNode<MemoTestRelTyp> {
    Arc::new(PlanNode {
        typ: MemoTestRelTyp::PhysicalStreamingAgg,
        children: vec![input.into()],
        predicates: vec![group_bys],
    })
}

#[allow(dead_code)]
pub(crate) fn physical_hash_agg(
    input: impl Into<PlanNodeOrGroup<MemoTestRelTyp>>,
    group_bys: ArcPredNode<MemoTestRelTyp>,
) -> ArcPlanNode<MemoTestRelTyp> {
    Arc::new(PlanNode {
        typ: MemoTestRelTyp::PhysicalHashAgg,
        children: vec![input.into()],
        predicates: vec![group_bys],
    })
}

pub(crate) fn list(items: Vec<ArcPredNode<MemoTestRelTyp>>) -> ArcPredNode<MemoTestRelTyp> {
    Arc::new(PredNode {
        typ: MemoTestPredTyp::List,
        children: items,
        data: None,
    })
}

pub(crate) fn expr(data: Value) -> ArcPredNode<MemoTestRelTyp> {
    Arc::new(PredNode {
        typ: MemoTestPredTyp::Expr,
        children: vec![],
        data: Some(data),
    })
}

pub(crate) fn column_ref(col: &str) -> ArcPredNode<MemoTestRelTyp> {
    Arc::new(PredNode {
        typ: MemoTestPredTyp::ColumnRef,
        children: vec![],
        data: Some(Value::String(col.to_string().into())),
    })
}

#[allow(dead_code)]
pub(crate) fn group(group_id: GroupId) -> PlanNodeOrGroup<MemoTestRelTyp> {
    PlanNodeOrGroup::Group(group_id)
}

pub struct TestPropertyBuilder;

#[derive(Clone, Debug)]
pub struct TestProp(pub Vec<String>);

impl std::fmt::Display for TestProp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
impl LogicalProperty for TestProp {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
impl LogicalPropertyBuilder<MemoTestRelTyp> for TestPropertyBuilder {
    type Prop = TestProp;
    fn derive(
        &self,
        typ: MemoTestRelTyp,
        pred: &[ArcPredNode<MemoTestRelTyp>],
        children: &[&Self::Prop],
    ) -> Self::Prop {
        match typ {
            MemoTestRelTyp::Join => {
                let mut a = children[0].0.clone();
                let b = children[1].0.clone();
                a.extend(b);
                TestProp(a)
            }
            MemoTestRelTyp::Project => {
                let preds = &pred[0].children;
                TestProp(
                    preds
                        .iter()
                        .map(|x| x.data.as_ref().unwrap().as_i64().to_string())
                        .collect(),
                )
            }
            MemoTestRelTyp::Scan => TestProp(vec!["scan_col".to_string()]),
            MemoTestRelTyp::Filter | MemoTestRelTyp::Sort | MemoTestRelTyp::Agg => {
                children[0].clone()
            }
            _ => unreachable!("tests don't use other logical plan nodes"),
        }
    }
    fn property_name(&self) -> &'static str {
        "test"
    }
}

/// Tracks whether a (sub)plan provably produces at most one row. An aggregation with no
/// group-by keys is the canonical single-row producer.
pub struct CardPropertyBuilder;

#[derive(Clone, Debug)]
pub struct CardProp(pub bool);

impl std::fmt::Display for CardProp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 {
            write!(f, "<=1row")
        } else {
            write!(f, "any")
        }
    }
}
impl LogicalProperty for CardProp {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
impl LogicalPropertyBuilder<MemoTestRelTyp> for CardPropertyBuilder {
    type Prop = CardProp;
    fn derive(
        &self,
        typ: MemoTestRelTyp,
        pred: &[ArcPredNode<MemoTestRelTyp>],
        children: &[&Self::Prop],
    ) -> Self::Prop {
        match typ {
            MemoTestRelTyp::Agg => CardProp(pred[0].children.is_empty()),
            MemoTestRelTyp::Project
            | MemoTestRelTyp::Filter
            | MemoTestRelTyp::Sort => CardProp(children[0].0),
            _ => CardProp(false),
        }
    }
    fn at_most_one_row(&self, prop: &Self::Prop) -> Option<bool> {
        Some(prop.0)
    }
    fn property_name(&self) -> &'static str {
        "card"
    }
}

pub struct SortPropertyBuilder;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SortProp(pub Vec<String>);

impl std::fmt::Display for SortProp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
impl PhysicalProperty for SortProp {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn to_boxed(&self) -> Box<dyn PhysicalProperty> {
        Box::new(self.clone())
    }
}

impl PhysicalPropertyBuilder<MemoTestRelTyp> for SortPropertyBuilder {
    type Prop = SortProp;

    fn derive(
        &self,
        typ: MemoTestRelTyp,
        predicates: &[ArcPredNode<MemoTestRelTyp>],
        children: &[impl Borrow<Self::Prop>],
    ) -> Self::Prop {
        match typ {
            // the node doesn't have any sort properties
            MemoTestRelTyp::PhysicalHashAgg => SortProp(vec![]),
            MemoTestRelTyp::PhysicalScan => SortProp(vec![]),
            // passthrough child sort properties
            MemoTestRelTyp::PhysicalPartition => children[0].borrow().clone(),
            MemoTestRelTyp::PhysicalNestedLoopJoin => children[0].borrow().clone(),
            MemoTestRelTyp::PhysicalProject => children[0].borrow().clone(),
            MemoTestRelTyp::PhysicalFilter => children[0].borrow().clone(),
            MemoTestRelTyp::PhysicalStreamingAgg => children[0].borrow().clone(),
            // the sort node isn't assumed stable, so the derived sort property is simply
            // the predicates
            MemoTestRelTyp::PhysicalSort => {
                let columns = predicates[0]
                    .children
                    .iter()
                    .map(|x| {
                        assert_eq!(x.typ, MemoTestPredTyp::ColumnRef);
                        x.unwrap_data().as_str().to_string()
                    })
                    .collect_vec();
                SortProp(columns)
            }
            _ => panic!("unsupported type"),
        }
    }

    fn passthrough(
        &self,
        typ: MemoTestRelTyp,
        predicates: &[ArcPredNode<MemoTestRelTyp>],
        required: &Self::Prop,
    ) -> Vec<Self::Prop> {
        match typ {
            // cannot passthrough
            MemoTestRelTyp::PhysicalHashAgg => vec![SortProp(vec![])],
            MemoTestRelTyp::PhysicalScan => vec![],
            MemoTestRelTyp::PhysicalSort => vec![SortProp(vec![])],
            // passthrough the required property to the left / only child
            MemoTestRelTyp::PhysicalPartition => vec![required.clone()],
            MemoTestRelTyp::PhysicalNestedLoopJoin => vec![required.clone(), SortProp(vec![])],
            MemoTestRelTyp::PhysicalProject => vec![required.clone()],
            MemoTestRelTyp::PhysicalFilter => vec![required.clone()],
            // do not passthrough, just require the sort property
            MemoTestRelTyp::PhysicalStreamingAgg => {
                let columns = predicates[0]
                    .children
                    .iter()
                    .map(|x| {
                        assert_eq!(x.typ, MemoTestPredTyp::ColumnRef);
                        x.unwrap_data().as_str().to_string()
                    })
                    .collect_vec();
                vec![SortProp(columns)]
            }
            _ => panic!("unsupported type"),
        }
    }

    fn satisfies(&self, prop: &SortProp, required: &SortProp) -> bool {
        // required should be a prefix of the current property
        for i in 0..required.0.len() {
            if i >= prop.0.len() || prop.0[i] != required.0[i] {
                return false;
            }
        }
        true
    }

    fn default(&self) -> Self::Prop {
        SortProp(vec![])
    }

    fn enforce(&self, prop: &Self::Prop) -> (MemoTestRelTyp, Vec<ArcPredNode<MemoTestRelTyp>>) {
        let mut predicates = Vec::new();
        for column in &prop.0 {
            predicates.push(column_ref(column));
        }
        (MemoTestRelTyp::PhysicalSort, vec![list(predicates)])
    }

    fn search_goal(
        &self,
        typ: MemoTestRelTyp,
        predicates: &[ArcPredNode<MemoTestRelTyp>],
        required_property: &Self::Prop,
    ) -> Option<Self::Prop> {
        // a logical sort absorbs any sort requirement into a stronger requirement on its
        // child group
        if typ != MemoTestRelTyp::Sort {
            return None;
        }
        let columns = predicates[0]
            .children
            .iter()
            .map(|x| {
                assert_eq!(x.typ, MemoTestPredTyp::ColumnRef);
                x.unwrap_data().as_str().to_string()
            })
            .collect_vec();
        let goal = SortProp(columns);
        if self.satisfies(&goal, required_property) {
            Some(goal)
        } else {
            None
        }
    }

    fn satisfied_by_singleton(&self) -> bool {
        true
    }

    fn property_name(&self) -> &'static str {
        "sort"
    }
}

/// A row-count cost model over a fixed toy catalog. The statistics payload is the
/// estimated row count as `f64`.
pub(crate) struct TestCostModel;

fn table_row_count(table: &str) -> f64 {
    match table {
        "t1" => 1000.0,
        "t2" => 100.0,
        "small" => 10.0,
        _ => 1000.0,
    }
}

fn stat_rows(stat: &Statistics) -> f64 {
    *stat
        .0
        .downcast_ref::<f64>()
        .expect("test statistics carry a row count")
}

fn pred_table_name(pred: &ArcPredNode<MemoTestRelTyp>) -> String {
    assert_eq!(pred.typ, MemoTestPredTyp::TableName);
    pred.unwrap_data().as_str().to_string()
}

impl CostModel<MemoTestRelTyp> for TestCostModel {
    fn compute_operation_cost(
        &self,
        node: &MemoTestRelTyp,
        predicates: &[ArcPredNode<MemoTestRelTyp>],
        children_stats: &[Option<&Statistics>],
        _context: RelNodeContext,
    ) -> Cost {
        let rows = |idx: usize| {
            children_stats[idx]
                .map(stat_rows)
                .expect("test costing always has children statistics")
        };
        let compute = match node {
            MemoTestRelTyp::PhysicalScan => table_row_count(&pred_table_name(&predicates[0])),
            // the left side drives the loop, so putting the smaller input there wins
            MemoTestRelTyp::PhysicalNestedLoopJoin => 10.0 * rows(0) + rows(1),
            MemoTestRelTyp::PhysicalProject | MemoTestRelTyp::PhysicalFilter => rows(0),
            MemoTestRelTyp::PhysicalSort => rows(0) * rows(0).log2().max(1.0),
            MemoTestRelTyp::PhysicalStreamingAgg => rows(0),
            MemoTestRelTyp::PhysicalHashAgg => 2.0 * rows(0),
            MemoTestRelTyp::PhysicalPartition => rows(0),
            _ => unreachable!("costing a logical node"),
        };
        Cost(vec![compute])
    }

    fn derive_statistics(
        &self,
        node: &MemoTestRelTyp,
        predicates: &[ArcPredNode<MemoTestRelTyp>],
        children_stats: &[Arc<Statistics>],
        _context: RelNodeContext,
    ) -> Statistics {
        let rows = |idx: usize| stat_rows(&children_stats[idx]);
        let out = match node {
            MemoTestRelTyp::PhysicalScan => table_row_count(&pred_table_name(&predicates[0])),
            MemoTestRelTyp::PhysicalNestedLoopJoin => rows(0) * rows(1) * 0.1,
            MemoTestRelTyp::PhysicalFilter => rows(0) * 0.5,
            MemoTestRelTyp::PhysicalProject
            | MemoTestRelTyp::PhysicalSort
            | MemoTestRelTyp::PhysicalPartition => rows(0),
            MemoTestRelTyp::PhysicalStreamingAgg | MemoTestRelTyp::PhysicalHashAgg => {
                if predicates[0].children.is_empty() {
                    1.0
                } else {
                    rows(0) * 0.1
                }
            }
            _ => unreachable!("deriving statistics for a logical node"),
        };
        Statistics(Box::new(out))
    }

    fn explain_cost(&self, cost: &Cost) -> String {
        format!("{{compute={}}}", cost.0[0])
    }

    fn explain_statistics(&self, stat: &Statistics) -> String {
        format!("{{rows={}}}", stat_rows(stat))
    }

    fn accumulate(&self, total_cost: &mut Cost, cost: &Cost) {
        for (total, c) in total_cost.0.iter_mut().zip(cost.0.iter()) {
            *total += c;
        }
    }

    fn zero(&self) -> Cost {
        Cost(vec![0.0])
    }

    fn weighted_cost(&self, cost: &Cost) -> f64 {
        cost.0[0]
    }
}

pub(crate) struct JoinCommuteRule {
    matcher: RuleMatcher<MemoTestRelTyp>,
}

impl JoinCommuteRule {
    pub fn new() -> Self {
        Self {
            matcher: RuleMatcher::MatchNode {
                typ: MemoTestRelTyp::Join,
                children: vec![
                    RuleMatcher::PickOne { pick_to: 0 },
                    RuleMatcher::PickOne { pick_to: 1 },
                ],
            },
        }
    }
}

impl Rule<MemoTestRelTyp> for JoinCommuteRule {
    fn matcher(&self) -> &RuleMatcher<MemoTestRelTyp> {
        &self.matcher
    }

    fn apply(
        &self,
        mut picks: HashMap<usize, PlanNodeOrGroup<MemoTestRelTyp>>,
        predicates: Vec<ArcPredNode<MemoTestRelTyp>>,
    ) -> Vec<PlanNodeOrGroup<MemoTestRelTyp>> {
        let left = picks.remove(&0).unwrap();
        let right = picks.remove(&1).unwrap();
        vec![join(right, left, predicates[0].clone()).into()]
    }

    fn name(&self) -> &'static str {
        "join_commute"
    }
}

pub(crate) struct PhysicalScanRule {
    matcher: RuleMatcher<MemoTestRelTyp>,
}

impl PhysicalScanRule {
    pub fn new() -> Self {
        Self {
            matcher: RuleMatcher::MatchNode {
                typ: MemoTestRelTyp::Scan,
                children: vec![],
            },
        }
    }
}

impl Rule<MemoTestRelTyp> for PhysicalScanRule {
    fn matcher(&self) -> &RuleMatcher<MemoTestRelTyp> {
        &self.matcher
    }

    fn apply(
        &self,
        _picks: HashMap<usize, PlanNodeOrGroup<MemoTestRelTyp>>,
        predicates: Vec<ArcPredNode<MemoTestRelTyp>>,
    ) -> Vec<PlanNodeOrGroup<MemoTestRelTyp>> {
        vec![Arc::new(PlanNode {
            typ: MemoTestRelTyp::PhysicalScan,
            children: vec![],
            predicates: vec![predicates[0].clone()],
        })
        .into()]
    }

    fn name(&self) -> &'static str {
        "physical_scan"
    }

    fn is_impl_rule(&self) -> bool {
        true
    }
}

pub(crate) struct PhysicalJoinRule {
    matcher: RuleMatcher<MemoTestRelTyp>,
}

impl PhysicalJoinRule {
    pub fn new() -> Self {
        Self {
            matcher: RuleMatcher::MatchNode {
                typ: MemoTestRelTyp::Join,
                children: vec![
                    RuleMatcher::PickOne { pick_to: 0 },
                    RuleMatcher::PickOne { pick_to: 1 },
                ],
            },
        }
    }
}

impl Rule<MemoTestRelTyp> for PhysicalJoinRule {
    fn matcher(&self) -> &RuleMatcher<MemoTestRelTyp> {
        &self.matcher
    }

    fn apply(
        &self,
        mut picks: HashMap<usize, PlanNodeOrGroup<MemoTestRelTyp>>,
        predicates: Vec<ArcPredNode<MemoTestRelTyp>>,
    ) -> Vec<PlanNodeOrGroup<MemoTestRelTyp>> {
        let left = picks.remove(&0).unwrap();
        let right = picks.remove(&1).unwrap();
        vec![physical_nested_loop_join(left, right, predicates[0].clone()).into()]
    }

    fn name(&self) -> &'static str {
        "physical_join"
    }

    fn is_impl_rule(&self) -> bool {
        true
    }
}

/// Produces both aggregation strategies so the search has an actual choice to cost.
pub(crate) struct PhysicalAggRule {
    matcher: RuleMatcher<MemoTestRelTyp>,
}

impl PhysicalAggRule {
    pub fn new() -> Self {
        Self {
            matcher: RuleMatcher::MatchNode {
                typ: MemoTestRelTyp::Agg,
                children: vec![RuleMatcher::PickOne { pick_to: 0 }],
            },
        }
    }
}

impl Rule<MemoTestRelTyp> for PhysicalAggRule {
    fn matcher(&self) -> &RuleMatcher<MemoTestRelTyp> {
        &self.matcher
    }

    fn apply(
        &self,
        mut picks: HashMap<usize, PlanNodeOrGroup<MemoTestRelTyp>>,
        predicates: Vec<ArcPredNode<MemoTestRelTyp>>,
    ) -> Vec<PlanNodeOrGroup<MemoTestRelTyp>> {
        let input = picks.remove(&0).unwrap();
        vec![
            physical_streaming_agg(input.clone(), predicates[0].clone()).into(),
            physical_hash_agg(input, predicates[0].clone()).into(),
        ]
    }

    fn name(&self) -> &'static str {
        "physical_agg"
    }

    fn is_impl_rule(&self) -> bool {
        true
    }
}
