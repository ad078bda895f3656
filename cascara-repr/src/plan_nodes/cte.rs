// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use super::macros::define_plan_node;
use super::predicates::ConstantPred;
use super::{ArcRelPlanNode, RelNodeType, RelPlanNode, RelReprPlanNode};

/// Materialization point of a common table expression. The child is the defining plan.
#[derive(Clone, Debug)]
pub struct LogicalCteProducer(pub ArcRelPlanNode);

define_plan_node!(
    LogicalCteProducer : RelPlanNode,
    CteProducer, [
        { 0, child: ArcRelPlanNode }
    ], [
        { 0, name: ConstantPred }
    ]
);

/// Reader of a common table expression. The child points at the producer so that all
/// readers of the same name share one memo group for the defining plan.
#[derive(Clone, Debug)]
pub struct LogicalCteScan(pub ArcRelPlanNode);

define_plan_node!(
    LogicalCteScan : RelPlanNode,
    CteScan, [
        { 0, child: ArcRelPlanNode }
    ], [
        { 0, name: ConstantPred }
    ]
);

/// Buffers its input once and replays it for every consumer.
#[derive(Clone, Debug)]
pub struct PhysicalSpool(pub ArcRelPlanNode);

define_plan_node!(
    PhysicalSpool : RelPlanNode,
    PhysicalSpool, [
        { 0, child: ArcRelPlanNode }
    ], [
        { 0, name: ConstantPred }
    ]
);
