// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::HashMap;

use cascara_core::nodes::PlanNodeOrGroup;
use cascara_core::rules::{Rule, RuleMatcher};

use super::macros::define_impl_rule;
use crate::plan_nodes::{
    ArcRelPredNode, ColumnRefPred, ListPred, PhysicalStreamAgg, RelNodeType, RelReprPlanNode,
    RelReprPredNode,
};

// Agg -> StreamAgg. Requires the child to be sorted on the group columns; the sort
// property builder passes that requirement down during costing.
define_impl_rule!(StreamAggRule, apply_stream_agg, (Agg, 0));

fn apply_stream_agg(
    picks: HashMap<usize, PlanNodeOrGroup<RelNodeType>>,
    predicates: Vec<ArcRelPredNode>,
) -> Vec<PlanNodeOrGroup<RelNodeType>> {
    let exprs = ListPred::from_pred_node(predicates[0].clone()).unwrap();
    let groups = ListPred::from_pred_node(predicates[1].clone()).unwrap();
    // A group-by expression without a column id cannot be turned into a sort requirement.
    let all_column_refs = groups
        .to_vec()
        .into_iter()
        .all(|expr| ColumnRefPred::from_pred_node(expr).is_some());
    if !all_column_refs {
        return vec![];
    }
    let node = PhysicalStreamAgg::new_unchecked(picks[&0].clone(), exprs, groups);
    vec![node.into_plan_node().into()]
}
