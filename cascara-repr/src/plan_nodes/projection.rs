// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use super::macros::define_plan_node;
use super::predicates::ListPred;
use super::{ArcRelPlanNode, RelNodeType, RelPlanNode, RelReprPlanNode};

#[derive(Clone, Debug)]
pub struct LogicalProjection(pub ArcRelPlanNode);

define_plan_node!(
    LogicalProjection : RelPlanNode,
    Projection, [
        { 0, child: ArcRelPlanNode }
    ], [
        { 0, exprs: ListPred }
    ]
);

#[derive(Clone, Debug)]
pub struct PhysicalProjection(pub ArcRelPlanNode);

define_plan_node!(
    PhysicalProjection : RelPlanNode,
    PhysicalProjection, [
        { 0, child: ArcRelPlanNode }
    ], [
        { 0, exprs: ListPred }
    ]
);
