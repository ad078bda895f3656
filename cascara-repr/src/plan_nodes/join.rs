// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use core::fmt;
use std::fmt::Display;

use super::macros::define_plan_node;
use super::predicates::ListPred;
use super::{ArcRelPlanNode, ArcRelPredNode, RelNodeType, RelPlanNode, RelReprPlanNode};

#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum JoinType {
    Inner = 1,
    FullOuter,
    LeftOuter,
    RightOuter,
    Cross,
    LeftSemi,
    RightSemi,
    LeftAnti,
    RightAnti,
}

impl Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Debug)]
pub struct LogicalJoin(pub ArcRelPlanNode);

define_plan_node!(
    LogicalJoin : RelPlanNode,
    Join, [
        { 0, left: ArcRelPlanNode },
        { 1, right: ArcRelPlanNode }
    ], [
        { 0, cond: ArcRelPredNode }
    ], { join_type: JoinType }
);

#[derive(Clone, Debug)]
pub struct PhysicalNestedLoopJoin(pub ArcRelPlanNode);

define_plan_node!(
    PhysicalNestedLoopJoin : RelPlanNode,
    PhysicalNestedLoopJoin, [
        { 0, left: ArcRelPlanNode },
        { 1, right: ArcRelPlanNode }
    ], [
        { 0, cond: ArcRelPredNode }
    ], { join_type: JoinType }
);

/// Equality join keyed by `keys`, a list of `BinOp(Eq, column, column)` predicates.
/// Which side each column comes from is resolved by column identity at execution time.
#[derive(Clone, Debug)]
pub struct PhysicalHashJoin(pub ArcRelPlanNode);

define_plan_node!(
    PhysicalHashJoin : RelPlanNode,
    PhysicalHashJoin, [
        { 0, left: ArcRelPlanNode },
        { 1, right: ArcRelPlanNode }
    ], [
        { 0, keys: ListPred }
    ], { join_type: JoinType }
);

/// Equality join that sorts both inputs on the key columns before merging.
#[derive(Clone, Debug)]
pub struct PhysicalSortMergeJoin(pub ArcRelPlanNode);

define_plan_node!(
    PhysicalSortMergeJoin : RelPlanNode,
    PhysicalSortMergeJoin, [
        { 0, left: ArcRelPlanNode },
        { 1, right: ArcRelPlanNode }
    ], [
        { 0, keys: ListPred }
    ], { join_type: JoinType }
);
