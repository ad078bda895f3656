// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use super::macros::define_plan_node;
use super::predicates::ListPred;
use super::{ArcRelPlanNode, RelNodeType, RelPlanNode, RelReprPlanNode};

#[derive(Clone, Debug)]
pub struct LogicalAgg(pub ArcRelPlanNode);

define_plan_node!(
    LogicalAgg : RelPlanNode,
    Agg, [
        { 0, child: ArcRelPlanNode }
    ], [
        { 0, exprs: ListPred },
        { 1, groups: ListPred }
    ]
);

#[derive(Clone, Debug)]
pub struct PhysicalHashAgg(pub ArcRelPlanNode);

define_plan_node!(
    PhysicalHashAgg : RelPlanNode,
    PhysicalHashAgg, [
        { 0, child: ArcRelPlanNode }
    ], [
        { 0, exprs: ListPred },
        { 1, groups: ListPred }
    ]
);

/// Aggregation over an input already sorted on the group columns.
#[derive(Clone, Debug)]
pub struct PhysicalStreamAgg(pub ArcRelPlanNode);

define_plan_node!(
    PhysicalStreamAgg : RelPlanNode,
    PhysicalStreamAgg, [
        { 0, child: ArcRelPlanNode }
    ], [
        { 0, exprs: ListPred },
        { 1, groups: ListPred }
    ]
);
