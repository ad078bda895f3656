// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

mod ir;

use std::collections::HashMap;

use crate::nodes::{ArcPredNode, NodeType, PlanNodeOrGroup};

pub use ir::RuleMatcher;

/// A transformation or implementation rule.
///
/// Rules are pure: they see only the trees bound by their matcher and produce new trees.
/// They never touch the memo table, so a rule body cannot observe in-flight group merges
/// or other concurrent mutations.
pub trait Rule<T: NodeType>: 'static + Send + Sync {
    fn matcher(&self) -> &RuleMatcher<T>;

    /// Fire the rule on one binding produced by the matcher.
    ///
    /// `picks` maps each `pick_to` slot in the matcher to the subtree (or group reference)
    /// captured there. `predicates` carries the predicate children of every structural node
    /// the matcher descended through, flattened in preorder.
    fn apply(
        &self,
        picks: HashMap<usize, PlanNodeOrGroup<T>>,
        predicates: Vec<ArcPredNode<T>>,
    ) -> Vec<PlanNodeOrGroup<T>>;

    fn name(&self) -> &'static str;

    /// Implementation rules produce physical nodes and only fire during the implement phase.
    fn is_impl_rule(&self) -> bool {
        false
    }
}
