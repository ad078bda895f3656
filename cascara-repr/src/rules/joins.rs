// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::HashMap;

use cascara_core::nodes::PlanNodeOrGroup;
use cascara_core::rules::{Rule, RuleMatcher};

use super::macros::{define_impl_rule, define_rule};
use crate::plan_nodes::{
    ArcRelPredNode, BinOpPred, BinOpType, ColumnRefPred, ConstantPred, JoinType, ListPred,
    LogOpPred, LogOpType, LogicalJoin, PhysicalHashJoin, PhysicalSortMergeJoin, RelNodeType,
    RelReprPlanNode, RelReprPredNode,
};

// A join B -> B join A
define_rule!(
    JoinCommuteRule,
    apply_join_commute,
    (Join(JoinType::Inner), 0, 1)
);

fn apply_join_commute(
    picks: HashMap<usize, PlanNodeOrGroup<RelNodeType>>,
    predicates: Vec<ArcRelPredNode>,
) -> Vec<PlanNodeOrGroup<RelNodeType>> {
    let left = picks[&0].clone();
    let right = picks[&1].clone();
    // Column ids are stable across the whole plan, so neither the condition nor the
    // output columns need rewriting when the inputs swap.
    let node = LogicalJoin::new_unchecked(right, left, predicates[0].clone(), JoinType::Inner);
    vec![node.into_plan_node().into()]
}

// (A join B) join C -> A join (B join C)
define_rule!(
    JoinAssocRule,
    apply_join_assoc,
    (Join(JoinType::Inner), (Join(JoinType::Inner), 0, 1), 2)
);

fn apply_join_assoc(
    picks: HashMap<usize, PlanNodeOrGroup<RelNodeType>>,
    predicates: Vec<ArcRelPredNode>,
) -> Vec<PlanNodeOrGroup<RelNodeType>> {
    let a = picks[&0].clone();
    let b = picks[&1].clone();
    let c = picks[&2].clone();
    let outer_cond = predicates[0].clone();
    let inner_cond = predicates[1].clone();
    // Both conditions are hoisted to the new top join and the inner join becomes a cross
    // join. Stable column ids keep every reference valid at the top; the filter and join
    // condition pushdown rules sink the conjuncts back down where they apply.
    let merged = LogOpPred::new_flattened_nested_logical(
        LogOpType::And,
        ListPred::new(vec![inner_cond, outer_cond]),
    );
    let inner = LogicalJoin::new_unchecked(
        b,
        c,
        ConstantPred::bool(true).into_pred_node(),
        JoinType::Inner,
    );
    let node = LogicalJoin::new_unchecked(
        a,
        inner.into_plan_node(),
        merged.into_pred_node(),
        JoinType::Inner,
    );
    vec![node.into_plan_node().into()]
}

/// Splits a join condition into hashable key pairs. Accepts a single equality between two
/// column references or a conjunction where every conjunct is such an equality; anything
/// else yields `None`.
fn equi_keys(cond: &ArcRelPredNode) -> Option<Vec<ArcRelPredNode>> {
    fn is_column_eq(pred: &ArcRelPredNode) -> bool {
        let Some(bin_op) = BinOpPred::from_pred_node(pred.clone()) else {
            return false;
        };
        bin_op.op_type() == BinOpType::Eq
            && ColumnRefPred::from_pred_node(bin_op.left_child()).is_some()
            && ColumnRefPred::from_pred_node(bin_op.right_child()).is_some()
    }
    if is_column_eq(cond) {
        return Some(vec![cond.clone()]);
    }
    if let Some(log_op) = LogOpPred::from_pred_node(cond.clone()) {
        if log_op.op_type() == LogOpType::And {
            let children = log_op.children();
            if !children.is_empty() && children.iter().all(is_column_eq) {
                return Some(children);
            }
        }
    }
    None
}

define_impl_rule!(
    HashJoinRule,
    apply_hash_join,
    (Join(JoinType::Inner), 0, 1)
);

fn apply_hash_join(
    picks: HashMap<usize, PlanNodeOrGroup<RelNodeType>>,
    predicates: Vec<ArcRelPredNode>,
) -> Vec<PlanNodeOrGroup<RelNodeType>> {
    let Some(keys) = equi_keys(&predicates[0]) else {
        return vec![];
    };
    let node = PhysicalHashJoin::new_unchecked(
        picks[&0].clone(),
        picks[&1].clone(),
        ListPred::new(keys),
        JoinType::Inner,
    );
    vec![node.into_plan_node().into()]
}

define_impl_rule!(
    SortMergeJoinRule,
    apply_sort_merge_join,
    (Join(JoinType::Inner), 0, 1)
);

fn apply_sort_merge_join(
    picks: HashMap<usize, PlanNodeOrGroup<RelNodeType>>,
    predicates: Vec<ArcRelPredNode>,
) -> Vec<PlanNodeOrGroup<RelNodeType>> {
    let Some(keys) = equi_keys(&predicates[0]) else {
        return vec![];
    };
    let node = PhysicalSortMergeJoin::new_unchecked(
        picks[&0].clone(),
        picks[&1].clone(),
        ListPred::new(keys),
        JoinType::Inner,
    );
    vec![node.into_plan_node().into()]
}
