// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use super::macros::define_plan_node;
use super::predicates::ConstantPred;
use super::{ArcRelPlanNode, RelNodeType, RelPlanNode, RelReprPlanNode};

#[derive(Clone, Debug)]
pub struct LogicalScan(pub ArcRelPlanNode);

define_plan_node!(
    LogicalScan : RelPlanNode,
    Scan, [], [
        { 0, table: ConstantPred }
    ]
);

impl LogicalScan {
    pub fn table_name(&self) -> std::sync::Arc<str> {
        self.table().value().as_str()
    }
}

#[derive(Clone, Debug)]
pub struct PhysicalScan(pub ArcRelPlanNode);

define_plan_node!(
    PhysicalScan : RelPlanNode,
    PhysicalScan, [], [
        { 0, table: ConstantPred }
    ]
);

impl PhysicalScan {
    pub fn table_name(&self) -> std::sync::Arc<str> {
        self.table().value().as_str()
    }
}
