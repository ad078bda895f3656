// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use super::macros::define_plan_node;
use super::predicates::ListPred;
use super::{ArcRelPlanNode, RelNodeType, RelPlanNode, RelReprPlanNode};

#[derive(Clone, Debug)]
pub struct LogicalSort(pub ArcRelPlanNode);

// `exprs` is a list of SortOrderPred.
define_plan_node!(
    LogicalSort : RelPlanNode,
    Sort, [
        { 0, child: ArcRelPlanNode }
    ], [
        { 0, exprs: ListPred }
    ]
);

#[derive(Clone, Debug)]
pub struct PhysicalSort(pub ArcRelPlanNode);

define_plan_node!(
    PhysicalSort : RelPlanNode,
    PhysicalSort, [
        { 0, child: ArcRelPlanNode }
    ], [
        { 0, exprs: ListPred }
    ]
);
