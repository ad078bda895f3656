// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Transformation and implementation rules of the representation.

mod agg;
mod filter_pushdown;
mod joins;
pub(crate) mod macros;
mod physical;

pub use agg::StreamAggRule;
pub use filter_pushdown::{
    FilterInnerJoinMergeRule, FilterMergeRule, FilterProjectTransposeRule, FilterSortTransposeRule,
};
pub use joins::{HashJoinRule, JoinAssocRule, JoinCommuteRule, SortMergeJoinRule};
pub use physical::PhysicalConversionRule;
