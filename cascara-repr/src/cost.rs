// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! A textbook cost model over row counts, with a compute and an I/O component.

use std::collections::HashMap;
use std::sync::Arc;

use cascara_core::cost::{Cost, CostModel, RelNodeContext, Statistics};
use cascara_core::nodes::Value;

use crate::plan_nodes::{ArcRelPredNode, ConstantPred, ListPred, RelNodeType, RelReprPredNode};

/// Row count estimate carried as the statistics payload of every group.
pub struct RowCount(pub f64);

/// Assumed row count for tables the model has no statistics for.
pub const DEFAULT_TABLE_ROWS: u64 = 1000;

const DEFAULT_FILTER_SELECTIVITY: f64 = 0.2;
const DEFAULT_JOIN_SELECTIVITY: f64 = 0.01;
const DEFAULT_AGG_GROUP_FRACTION: f64 = 0.1;

const COMPUTE_COST: usize = 0;
const IO_COST: usize = 1;

pub struct BaseCostModel {
    table_rows: HashMap<String, u64>,
}

impl BaseCostModel {
    pub fn new(table_rows: HashMap<String, u64>) -> Self {
        Self { table_rows }
    }

    fn scan_rows(&self, predicates: &[ArcRelPredNode]) -> f64 {
        let table = ConstantPred::from_pred_node(predicates[0].clone())
            .unwrap()
            .value()
            .as_str();
        self.table_rows
            .get(table.as_ref())
            .copied()
            .unwrap_or(DEFAULT_TABLE_ROWS) as f64
    }
}

fn cost(compute: f64, io: f64) -> Cost {
    Cost(vec![compute, io])
}

fn row_cnt(stats: Option<&Statistics>) -> f64 {
    stats
        .and_then(|stats| stats.0.downcast_ref::<RowCount>())
        .map(|rows| rows.0)
        .unwrap_or(1.0)
}

fn sort_cost(rows: f64) -> f64 {
    rows * rows.max(2.0).log2()
}

fn is_const_true(pred: &ArcRelPredNode) -> bool {
    ConstantPred::from_pred_node(pred.clone())
        .map(|c| matches!(c.value(), Value::Bool(true)))
        .unwrap_or(false)
}

impl CostModel<RelNodeType> for BaseCostModel {
    fn compute_operation_cost(
        &self,
        node: &RelNodeType,
        predicates: &[ArcRelPredNode],
        children_stats: &[Option<&Statistics>],
        _context: RelNodeContext,
    ) -> Cost {
        match node {
            RelNodeType::PhysicalScan => {
                let rows = self.scan_rows(predicates);
                cost(0.0, rows)
            }
            RelNodeType::PhysicalFilter | RelNodeType::PhysicalProjection => {
                cost(row_cnt(children_stats[0]), 0.0)
            }
            RelNodeType::PhysicalNestedLoopJoin(_) => {
                let left = row_cnt(children_stats[0]);
                let right = row_cnt(children_stats[1]);
                cost(left * right + left, 0.0)
            }
            RelNodeType::PhysicalHashJoin(_) => {
                // Build on the left input, probe with the right.
                let left = row_cnt(children_stats[0]);
                let right = row_cnt(children_stats[1]);
                cost(left + 2.0 * right, 0.0)
            }
            RelNodeType::PhysicalSortMergeJoin(_) => {
                let left = row_cnt(children_stats[0]);
                let right = row_cnt(children_stats[1]);
                cost(sort_cost(left) + sort_cost(right), 0.0)
            }
            RelNodeType::PhysicalSort => cost(sort_cost(row_cnt(children_stats[0])), 0.0),
            RelNodeType::PhysicalHashAgg => cost(2.0 * row_cnt(children_stats[0]), 0.0),
            RelNodeType::PhysicalStreamAgg => cost(row_cnt(children_stats[0]), 0.0),
            RelNodeType::PhysicalLimit => {
                let fetch = ConstantPred::from_pred_node(predicates[1].clone())
                    .unwrap()
                    .value()
                    .as_u64() as f64;
                cost(row_cnt(children_stats[0]).min(fetch), 0.0)
            }
            RelNodeType::PhysicalSpool => {
                let rows = row_cnt(children_stats[0]);
                cost(rows, rows)
            }
            x => unreachable!("cannot compute cost for {}", x),
        }
    }

    fn derive_statistics(
        &self,
        node: &RelNodeType,
        predicates: &[ArcRelPredNode],
        children_stats: &[Arc<Statistics>],
        _context: RelNodeContext,
    ) -> Statistics {
        let rows = |idx: usize| row_cnt(Some(&children_stats[idx]));
        let out = match node {
            RelNodeType::PhysicalScan => self.scan_rows(predicates),
            RelNodeType::PhysicalFilter => rows(0) * DEFAULT_FILTER_SELECTIVITY,
            RelNodeType::PhysicalProjection | RelNodeType::PhysicalSort => rows(0),
            RelNodeType::PhysicalNestedLoopJoin(_) => {
                if is_const_true(&predicates[0]) {
                    rows(0) * rows(1)
                } else {
                    rows(0) * rows(1) * DEFAULT_JOIN_SELECTIVITY
                }
            }
            RelNodeType::PhysicalHashJoin(_) | RelNodeType::PhysicalSortMergeJoin(_) => {
                rows(0) * rows(1) * DEFAULT_JOIN_SELECTIVITY
            }
            RelNodeType::PhysicalHashAgg | RelNodeType::PhysicalStreamAgg => {
                let groups = ListPred::from_pred_node(predicates[1].clone()).unwrap();
                if groups.is_empty() {
                    1.0
                } else {
                    (rows(0) * DEFAULT_AGG_GROUP_FRACTION).max(1.0)
                }
            }
            RelNodeType::PhysicalLimit => {
                let fetch = ConstantPred::from_pred_node(predicates[1].clone())
                    .unwrap()
                    .value()
                    .as_u64() as f64;
                rows(0).min(fetch)
            }
            RelNodeType::PhysicalSpool => rows(0),
            x => unreachable!("cannot derive statistics for {}", x),
        };
        Statistics(Box::new(RowCount(out)))
    }

    fn explain_cost(&self, cost: &Cost) -> String {
        format!(
            "{{compute={},io={}}}",
            cost.0[COMPUTE_COST], cost.0[IO_COST]
        )
    }

    fn explain_statistics(&self, stats: &Statistics) -> String {
        format!("{{row_cnt={}}}", row_cnt(Some(stats)))
    }

    fn accumulate(&self, total_cost: &mut Cost, cost: &Cost) {
        total_cost.0[COMPUTE_COST] += cost.0[COMPUTE_COST];
        total_cost.0[IO_COST] += cost.0[IO_COST];
    }

    fn zero(&self) -> Cost {
        cost(0.0, 0.0)
    }

    fn weighted_cost(&self, cost: &Cost) -> f64 {
        cost.0[COMPUTE_COST] + cost.0[IO_COST]
    }
}

#[cfg(test)]
mod tests {
    use cascara_core::cascades::{ExprId, GroupId};

    use super::*;

    fn context() -> RelNodeContext {
        RelNodeContext {
            group_id: GroupId(0),
            expr_id: ExprId(0),
            children_group_ids: vec![],
        }
    }

    fn stats(rows: f64) -> Arc<Statistics> {
        Arc::new(Statistics(Box::new(RowCount(rows))))
    }

    #[test]
    fn scan_uses_table_rows() {
        let model = BaseCostModel::new(HashMap::from([("emp".to_string(), 500)]));
        let preds = vec![ConstantPred::string("emp").into_pred_node()];
        let derived = model.derive_statistics(&RelNodeType::PhysicalScan, &preds, &[], context());
        assert_eq!(row_cnt(Some(&derived)), 500.0);
        let preds = vec![ConstantPred::string("unknown").into_pred_node()];
        let derived = model.derive_statistics(&RelNodeType::PhysicalScan, &preds, &[], context());
        assert_eq!(row_cnt(Some(&derived)), DEFAULT_TABLE_ROWS as f64);
    }

    #[test]
    fn hash_join_beats_nested_loop_on_large_inputs() {
        let model = BaseCostModel::new(HashMap::new());
        let left = stats(1000.0);
        let right = stats(10.0);
        let children: Vec<Option<&Statistics>> =
            vec![Some(left.as_ref()), Some(right.as_ref())];
        let preds = vec![ConstantPred::bool(true).into_pred_node()];
        let nlj = model.compute_operation_cost(
            &RelNodeType::PhysicalNestedLoopJoin(crate::plan_nodes::JoinType::Inner),
            &preds,
            &children,
            context(),
        );
        let hash = model.compute_operation_cost(
            &RelNodeType::PhysicalHashJoin(crate::plan_nodes::JoinType::Inner),
            &preds,
            &children,
            context(),
        );
        assert!(model.weighted_cost(&hash) < model.weighted_cost(&nlj));
    }

    #[test]
    fn accumulate_is_componentwise() {
        let model = BaseCostModel::new(HashMap::new());
        let mut total = model.zero();
        model.accumulate(&mut total, &cost(1.0, 2.0));
        model.accumulate(&mut total, &cost(3.0, 4.0));
        assert_eq!(total, cost(4.0, 6.0));
        assert_eq!(model.weighted_cost(&total), 10.0);
    }
}
