// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Typed interface of plan nodes.

mod macros;

pub mod agg;
pub mod cte;
pub mod filter;
pub mod join;
pub mod limit;
pub mod predicates;
pub mod projection;
pub mod scan;
pub mod sort;

use std::fmt::Debug;

pub use agg::{LogicalAgg, PhysicalHashAgg, PhysicalStreamAgg};
use cascara_core::nodes::{
    ArcPlanNode, ArcPredNode, NodeType, PlanNode, PlanNodeMetaMap, PlanNodeOrGroup, PredNode,
};
pub use cte::{LogicalCteProducer, LogicalCteScan, PhysicalSpool};
pub use filter::{LogicalFilter, PhysicalFilter};
pub use join::{
    JoinType, LogicalJoin, PhysicalHashJoin, PhysicalNestedLoopJoin, PhysicalSortMergeJoin,
};
pub use limit::{LogicalLimit, PhysicalLimit};
pub use predicates::{
    BinOpPred, BinOpType, ColumnRefPred, ConstantPred, ConstantType, ListPred, LogOpPred,
    LogOpType, SortOrderPred, SortOrderType,
};
use pretty_xmlish::{Pretty, PrettyConfig};
pub use projection::{LogicalProjection, PhysicalProjection};
pub use scan::{LogicalScan, PhysicalScan};
pub use sort::{LogicalSort, PhysicalSort};

/// Relational nodes of the representation. Logical variants describe what to compute,
/// physical variants describe how.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RelNodeType {
    // Logical plan nodes
    Scan,
    Filter,
    Projection,
    Join(JoinType),
    Agg,
    Sort,
    Limit,
    CteProducer,
    CteScan,
    // Physical plan nodes
    PhysicalScan,
    PhysicalFilter,
    PhysicalProjection,
    PhysicalNestedLoopJoin(JoinType),
    PhysicalHashJoin(JoinType),
    PhysicalSortMergeJoin(JoinType),
    PhysicalHashAgg,
    PhysicalStreamAgg,
    PhysicalSort,
    PhysicalLimit,
    PhysicalSpool,
}

impl std::fmt::Display for RelNodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl NodeType for RelNodeType {
    type PredType = RelPredType;

    fn is_logical(&self) -> bool {
        matches!(
            self,
            Self::Scan
                | Self::Filter
                | Self::Projection
                | Self::Join(_)
                | Self::Agg
                | Self::Sort
                | Self::Limit
                | Self::CteProducer
                | Self::CteScan
        )
    }
}

/// Typed predicate (expression) nodes hanging off plan nodes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RelPredType {
    ColumnRef,
    Constant(ConstantType),
    List,
    SortOrder(SortOrderType),
    BinOp(BinOpType),
    LogOp(LogOpType),
}

impl std::fmt::Display for RelPredType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub type RelPlanNode = PlanNode<RelNodeType>;
pub type ArcRelPlanNode = ArcPlanNode<RelNodeType>;
pub type RelPlanNodeOrGroup = PlanNodeOrGroup<RelNodeType>;
pub type RelPredNode = PredNode<RelNodeType>;
pub type ArcRelPredNode = ArcPredNode<RelNodeType>;

/// Typed wrapper around a relational plan node.
pub trait RelReprPlanNode: 'static + Clone {
    fn into_plan_node(self) -> ArcRelPlanNode;

    fn from_plan_node(plan_node: ArcRelPlanNode) -> Option<Self>
    where
        Self: Sized;

    fn explain(&self, meta_map: Option<&PlanNodeMetaMap>) -> Pretty<'static>;
}

/// Typed wrapper around a predicate node.
pub trait RelReprPredNode: 'static + Clone {
    fn into_pred_node(self) -> ArcRelPredNode;

    fn from_pred_node(pred_node: ArcRelPredNode) -> Option<Self>
    where
        Self: Sized;

    fn explain(&self, meta_map: Option<&PlanNodeMetaMap>) -> Pretty<'static>;
}

impl RelReprPlanNode for ArcRelPlanNode {
    fn into_plan_node(self) -> ArcRelPlanNode {
        self
    }

    fn from_plan_node(plan_node: ArcRelPlanNode) -> Option<Self> {
        Some(plan_node)
    }

    fn explain(&self, meta_map: Option<&PlanNodeMetaMap>) -> Pretty<'static> {
        match self.typ {
            RelNodeType::Scan => LogicalScan::from_plan_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelNodeType::Filter => LogicalFilter::from_plan_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelNodeType::Projection => LogicalProjection::from_plan_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelNodeType::Join(_) => LogicalJoin::from_plan_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelNodeType::Agg => LogicalAgg::from_plan_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelNodeType::Sort => LogicalSort::from_plan_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelNodeType::Limit => LogicalLimit::from_plan_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelNodeType::CteProducer => LogicalCteProducer::from_plan_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelNodeType::CteScan => LogicalCteScan::from_plan_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelNodeType::PhysicalScan => PhysicalScan::from_plan_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelNodeType::PhysicalFilter => PhysicalFilter::from_plan_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelNodeType::PhysicalProjection => PhysicalProjection::from_plan_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelNodeType::PhysicalNestedLoopJoin(_) => {
                PhysicalNestedLoopJoin::from_plan_node(self.clone())
                    .unwrap()
                    .explain(meta_map)
            }
            RelNodeType::PhysicalHashJoin(_) => PhysicalHashJoin::from_plan_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelNodeType::PhysicalSortMergeJoin(_) => {
                PhysicalSortMergeJoin::from_plan_node(self.clone())
                    .unwrap()
                    .explain(meta_map)
            }
            RelNodeType::PhysicalHashAgg => PhysicalHashAgg::from_plan_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelNodeType::PhysicalStreamAgg => PhysicalStreamAgg::from_plan_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelNodeType::PhysicalSort => PhysicalSort::from_plan_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelNodeType::PhysicalLimit => PhysicalLimit::from_plan_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelNodeType::PhysicalSpool => PhysicalSpool::from_plan_node(self.clone())
                .unwrap()
                .explain(meta_map),
        }
    }
}

impl RelReprPredNode for ArcRelPredNode {
    fn into_pred_node(self) -> ArcRelPredNode {
        self
    }

    fn from_pred_node(pred_node: ArcRelPredNode) -> Option<Self> {
        Some(pred_node)
    }

    fn explain(&self, meta_map: Option<&PlanNodeMetaMap>) -> Pretty<'static> {
        match self.typ {
            RelPredType::ColumnRef => ColumnRefPred::from_pred_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelPredType::Constant(_) => ConstantPred::from_pred_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelPredType::List => ListPred::from_pred_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelPredType::SortOrder(_) => SortOrderPred::from_pred_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelPredType::BinOp(_) => BinOpPred::from_pred_node(self.clone())
                .unwrap()
                .explain(meta_map),
            RelPredType::LogOp(_) => LogOpPred::from_pred_node(self.clone())
                .unwrap()
                .explain(meta_map),
        }
    }
}

/// Renders an explained plan into the textual form shown to users.
pub fn explain_to_string(pretty: &Pretty<'_>) -> String {
    let mut config = PrettyConfig {
        need_boundaries: false,
        reduced_spaces: false,
        width: 300,
        ..Default::default()
    };
    let mut out = String::new();
    config.unicode(&mut out, pretty);
    out
}
