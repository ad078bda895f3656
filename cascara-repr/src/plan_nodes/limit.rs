// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use super::macros::define_plan_node;
use super::predicates::ConstantPred;
use super::{ArcRelPlanNode, RelNodeType, RelPlanNode, RelReprPlanNode};

#[derive(Clone, Debug)]
pub struct LogicalLimit(pub ArcRelPlanNode);

define_plan_node!(
    LogicalLimit : RelPlanNode,
    Limit, [
        { 0, child: ArcRelPlanNode }
    ], [
        { 0, skip: ConstantPred },
        { 1, fetch: ConstantPred }
    ]
);

#[derive(Clone, Debug)]
pub struct PhysicalLimit(pub ArcRelPlanNode);

define_plan_node!(
    PhysicalLimit : RelPlanNode,
    PhysicalLimit, [
        { 0, child: ArcRelPlanNode }
    ], [
        { 0, skip: ConstantPred },
        { 1, fetch: ConstantPred }
    ]
);
