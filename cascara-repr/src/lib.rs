// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! A relational plan representation for the cascara search core: plan nodes and
//! predicates, property builders, rewrite and implementation rules, and a row-count cost
//! model, wired together into a ready-to-use optimizer.

#![allow(clippy::new_without_default)]

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use cascara_core::cascades::{
    CascadesOptimizer, OptimizerError, OptimizerProperties, SearchStage,
};
use cascara_core::logical_property::{LogicalPropertyBuilder, LogicalPropertyBuilderAny};
pub use cascara_core::nodes::Value;
use cascara_core::nodes::{PlanNodeMetaMap, PlanNodeOrGroup};
use cascara_core::optimizer::Optimizer;
use cascara_core::physical_property::{PhysicalProperty, PhysicalPropertyBuilderAny};
use cascara_core::rules::Rule;
use cost::BaseCostModel;
use plan_nodes::{ArcRelPlanNode, RelNodeType};
use properties::{
    CardinalityPropertyBuilder, Catalog, ColumnRegistry, DistributionPropertyBuilder,
    SchemaPropertyBuilder, SortPropertyBuilder,
};

pub mod cost;
mod explain;
pub mod plan_nodes;
pub mod properties;
pub mod rules;

#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

pub struct RelOptimizer {
    optimizer: CascadesOptimizer<RelNodeType>,
}

impl RelOptimizer {
    /// Rules of the first search stage: pure rewrites that place filters where later
    /// implementation rules can use them.
    pub fn default_rewrite_rules() -> Vec<Arc<dyn Rule<RelNodeType>>> {
        vec![
            Arc::new(rules::FilterMergeRule::new()),
            Arc::new(rules::FilterInnerJoinMergeRule::new()),
            Arc::new(rules::FilterSortTransposeRule::new()),
            Arc::new(rules::FilterProjectTransposeRule::new()),
        ]
    }

    /// Rules of the cost-based stage: join reordering plus every implementation rule.
    pub fn default_optimize_rules() -> Vec<Arc<dyn Rule<RelNodeType>>> {
        let mut rules = rules::PhysicalConversionRule::all_conversions();
        rules.push(Arc::new(rules::JoinCommuteRule::new()));
        rules.push(Arc::new(rules::JoinAssocRule::new()));
        rules.push(Arc::new(rules::HashJoinRule::new()));
        rules.push(Arc::new(rules::SortMergeJoinRule::new()));
        rules.push(Arc::new(rules::StreamAggRule::new()));
        rules
    }

    pub fn new_physical(
        catalog: Arc<dyn Catalog>,
        registry: Arc<ColumnRegistry>,
        table_rows: HashMap<String, u64>,
    ) -> Self {
        Self::new_physical_with_options(catalog, registry, table_rows, Default::default())
    }

    pub fn new_physical_with_options(
        catalog: Arc<dyn Catalog>,
        registry: Arc<ColumnRegistry>,
        table_rows: HashMap<String, u64>,
        prop: OptimizerProperties,
    ) -> Self {
        let stages = vec![
            SearchStage::new("rewrite", Self::default_rewrite_rules(), false),
            SearchStage::new("optimize", Self::default_optimize_rules(), true),
        ];
        let logical_property_builders: Arc<[Box<dyn LogicalPropertyBuilderAny<RelNodeType>>]> =
            Arc::new([
                Box::new(SchemaPropertyBuilder::new(catalog, registry)),
                Box::new(CardinalityPropertyBuilder::new()),
            ]);
        // Slot order is sort, then distribution. Required property vectors passed to
        // optimize_with_required_props must use the same order.
        let physical_property_builders: Arc<[Box<dyn PhysicalPropertyBuilderAny<RelNodeType>>]> =
            Arc::new([
                Box::new(SortPropertyBuilder::new()),
                Box::new(DistributionPropertyBuilder::new()),
            ]);
        Self {
            optimizer: CascadesOptimizer::new_with_options(
                stages,
                Box::new(BaseCostModel::new(table_rows)),
                logical_property_builders,
                physical_property_builders,
                prop,
            ),
        }
    }

    pub fn cascades_optimizer(&self) -> &CascadesOptimizer<RelNodeType> {
        &self.optimizer
    }

    pub fn optimize_with_meta(
        &self,
        root_rel: ArcRelPlanNode,
        required_props: &[&dyn PhysicalProperty],
        meta: &mut Option<PlanNodeMetaMap>,
    ) -> Result<ArcRelPlanNode, OptimizerError> {
        self.optimizer
            .optimize_with_meta(root_rel, required_props, meta)
    }

    pub fn dump(&self, buf: impl std::fmt::Write) -> std::fmt::Result {
        self.optimizer.dump(buf)
    }
}

impl Optimizer<RelNodeType> for RelOptimizer {
    fn optimize(&mut self, root_rel: ArcRelPlanNode) -> Result<ArcRelPlanNode> {
        self.optimizer.optimize(root_rel)
    }

    fn optimize_with_required_props(
        &mut self,
        root_rel: ArcRelPlanNode,
        required_props: &[&dyn PhysicalProperty],
    ) -> Result<ArcRelPlanNode> {
        self.optimizer
            .optimize_with_required_props(root_rel, required_props)
    }

    fn get_logical_property<P: LogicalPropertyBuilder<RelNodeType>>(
        &self,
        root_rel: PlanNodeOrGroup<RelNodeType>,
        idx: usize,
    ) -> P::Prop {
        self.optimizer.get_logical_property::<P>(root_rel, idx)
    }
}
