// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::nodes::NodeType;

/// A pattern over plan trees. The binding iterator walks the memo with this pattern and
/// yields one binding per distinct way the pattern matches.
pub enum RuleMatcher<T: NodeType> {
    /// Match a node of exactly type `typ`, then match `children` positionally.
    MatchNode { typ: T, children: Vec<Self> },
    /// Like [`Self::MatchNode`], but additionally capture the matched node itself into slot
    /// `pick_to`. The captured tree has unmatched children rendered as group references.
    MatchAndPickNode {
        typ: T,
        children: Vec<Self>,
        pick_to: usize,
    },
    /// Match on the enum variant only, ignoring any data carried inside the variant.
    /// Useful when a node type such as `Join(JoinType)` should match for every `JoinType`.
    MatchDiscriminant {
        typ_discriminant: std::mem::Discriminant<T>,
        children: Vec<Self>,
    },
    /// Like [`Self::MatchDiscriminant`], but additionally capture the matched node into slot
    /// `pick_to`, so the rule can recover the data carried inside the variant.
    MatchAndPickDiscriminant {
        typ_discriminant: std::mem::Discriminant<T>,
        children: Vec<Self>,
        pick_to: usize,
    },
    /// Match any single child and capture it into slot `pick_to`.
    PickOne { pick_to: usize },
    /// Match the remaining children (zero or more) and capture them starting at slot
    /// `pick_to`. Must be the last child of its parent matcher.
    PickMany { pick_to: usize },
    /// Match any single child without capturing it.
    IgnoreOne,
    /// Match the remaining children (zero or more) without capturing them. Must be the
    /// last child of its parent matcher.
    IgnoreMany,
}
