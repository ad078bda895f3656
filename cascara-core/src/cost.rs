// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::sync::Arc;

use crate::cascades::{ExprId, GroupId};
use crate::nodes::{ArcPredNode, NodeType};

/// The statistics of a group, as defined by the cost model. The search core treats it as an
/// opaque payload and only threads it from children winners to the parent cost computation.
pub struct Statistics(pub Box<dyn std::any::Any + Send + Sync>);

/// The cost of an operation or a subplan. The components are cost-model-defined (e.g.,
/// compute and I/O); the search core only ever orders plans by [`CostModel::weighted_cost`].
#[derive(Default, Clone, Debug, PartialOrd, PartialEq)]
pub struct Cost(pub Vec<f64>);

/// Provenance of the expression being costed.
#[derive(Debug, Clone)]
pub struct RelNodeContext {
    pub group_id: GroupId,
    pub expr_id: ExprId,
    pub children_group_ids: Vec<GroupId>,
}

pub trait CostModel<T: NodeType>: 'static + Send + Sync {
    /// Compute the cost of a single operation.
    fn compute_operation_cost(
        &self,
        node: &T,
        predicates: &[ArcPredNode<T>],
        children_stats: &[Option<&Statistics>],
        context: RelNodeContext,
    ) -> Cost;

    /// Derive the statistics of a single operation from its children's statistics.
    fn derive_statistics(
        &self,
        node: &T,
        predicates: &[ArcPredNode<T>],
        children_stats: &[Arc<Statistics>],
        context: RelNodeContext,
    ) -> Statistics;

    fn explain_cost(&self, cost: &Cost) -> String;

    fn explain_statistics(&self, cost: &Statistics) -> String;

    fn accumulate(&self, total_cost: &mut Cost, cost: &Cost);

    fn sum(&self, operation_cost: &Cost, inputs_cost: &[&Cost]) -> Cost {
        let mut total_cost = operation_cost.clone();
        for input in inputs_cost {
            self.accumulate(&mut total_cost, input);
        }
        total_cost
    }

    /// The zero cost, the identity of [`CostModel::accumulate`].
    fn zero(&self) -> Cost;

    /// The weighted cost used to order plans during the search.
    fn weighted_cost(&self, cost: &Cost) -> f64;
}
