// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Filter placement rules. These run in the first search stage, where exploration keeps
//! firing them until no new expression appears, so each rule must never increase the
//! number of filter nodes above an operator or exploration would not terminate.

use std::collections::HashMap;

use cascara_core::nodes::{PlanNodeOrGroup, Value};
use cascara_core::rules::{Rule, RuleMatcher};

use super::macros::define_rule;
use crate::plan_nodes::{
    ArcRelPredNode, ColumnRefPred, ConstantPred, JoinType, ListPred, LogOpPred, LogOpType,
    LogicalFilter, LogicalJoin, LogicalProjection, LogicalSort, RelNodeType, RelReprPlanNode,
    RelReprPredNode,
};

fn is_true(pred: &ArcRelPredNode) -> bool {
    ConstantPred::from_pred_node(pred.clone())
        .map(|c| matches!(c.value(), Value::Bool(true)))
        .unwrap_or(false)
}

/// Conjoins two conditions, dropping literal `true`s and flattening nested ANDs.
fn and_merge(first: ArcRelPredNode, second: ArcRelPredNode) -> ArcRelPredNode {
    let mut conds: Vec<ArcRelPredNode> = [first, second]
        .into_iter()
        .filter(|cond| !is_true(cond))
        .collect();
    match conds.len() {
        0 => ConstantPred::bool(true).into_pred_node(),
        1 => conds.remove(0),
        _ => LogOpPred::new_flattened_nested_logical(LogOpType::And, ListPred::new(conds))
            .into_pred_node(),
    }
}

// Filter(Filter(c)) -> Filter(c) with the conditions conjoined.
define_rule!(FilterMergeRule, apply_filter_merge, (Filter, (Filter, 0)));

fn apply_filter_merge(
    picks: HashMap<usize, PlanNodeOrGroup<RelNodeType>>,
    predicates: Vec<ArcRelPredNode>,
) -> Vec<PlanNodeOrGroup<RelNodeType>> {
    let outer_cond = predicates[0].clone();
    let inner_cond = predicates[1].clone();
    let node = LogicalFilter::new_unchecked(picks[&0].clone(), and_merge(outer_cond, inner_cond));
    vec![node.into_plan_node().into()]
}

// Filter(Join(a, b)) -> Join(a, b) with the filter folded into the join condition.
define_rule!(
    FilterInnerJoinMergeRule,
    apply_filter_inner_join_merge,
    (Filter, (Join(JoinType::Inner), 0, 1))
);

fn apply_filter_inner_join_merge(
    picks: HashMap<usize, PlanNodeOrGroup<RelNodeType>>,
    predicates: Vec<ArcRelPredNode>,
) -> Vec<PlanNodeOrGroup<RelNodeType>> {
    let filter_cond = predicates[0].clone();
    let join_cond = predicates[1].clone();
    let node = LogicalJoin::new_unchecked(
        picks[&0].clone(),
        picks[&1].clone(),
        and_merge(join_cond, filter_cond),
        JoinType::Inner,
    );
    vec![node.into_plan_node().into()]
}

// Filter(Sort(c)) -> Sort(Filter(c)). The filter keeps the row order it sees.
define_rule!(
    FilterSortTransposeRule,
    apply_filter_sort_transpose,
    (Filter, (Sort, 0))
);

fn apply_filter_sort_transpose(
    picks: HashMap<usize, PlanNodeOrGroup<RelNodeType>>,
    predicates: Vec<ArcRelPredNode>,
) -> Vec<PlanNodeOrGroup<RelNodeType>> {
    let filter_cond = predicates[0].clone();
    let sort_exprs = ListPred::from_pred_node(predicates[1].clone()).unwrap();
    let filter = LogicalFilter::new_unchecked(picks[&0].clone(), filter_cond);
    let node = LogicalSort::new(filter.into_plan_node(), sort_exprs);
    vec![node.into_plan_node().into()]
}

// Filter(Projection(c)) -> Projection(Filter(c)), only when the projection is a pure
// column selection. A computed output column has no id below the projection, so the
// condition cannot be moved past one.
define_rule!(
    FilterProjectTransposeRule,
    apply_filter_project_transpose,
    (Filter, (Projection, 0))
);

fn apply_filter_project_transpose(
    picks: HashMap<usize, PlanNodeOrGroup<RelNodeType>>,
    predicates: Vec<ArcRelPredNode>,
) -> Vec<PlanNodeOrGroup<RelNodeType>> {
    let filter_cond = predicates[0].clone();
    let exprs = ListPred::from_pred_node(predicates[1].clone()).unwrap();
    let all_column_refs = exprs
        .to_vec()
        .into_iter()
        .all(|expr| ColumnRefPred::from_pred_node(expr).is_some());
    if !all_column_refs {
        return vec![];
    }
    let filter = LogicalFilter::new_unchecked(picks[&0].clone(), filter_cond);
    let node = LogicalProjection::new(filter.into_plan_node(), exprs);
    vec![node.into_plan_node().into()]
}
