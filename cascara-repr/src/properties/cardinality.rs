// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use cascara_core::logical_property::{LogicalProperty, LogicalPropertyBuilder};
use serde::{Deserialize, Serialize};

use crate::plan_nodes::{
    ArcRelPredNode, ConstantPred, ListPred, RelNodeType, RelReprPredNode,
};

/// An upper bound on the number of rows a group can produce. `AtMost(1)` groups relax
/// order-like requirement checks during the search.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    AtMost(u64),
    Unbounded,
}

impl Cardinality {
    fn product(self, other: Self) -> Self {
        match (self, other) {
            (Self::AtMost(a), Self::AtMost(b)) => Self::AtMost(a.saturating_mul(b)),
            _ => Self::Unbounded,
        }
    }

    fn add(self, other: Self) -> Self {
        match (self, other) {
            (Self::AtMost(a), Self::AtMost(b)) => Self::AtMost(a.saturating_add(b)),
            _ => Self::Unbounded,
        }
    }

    fn min_with(self, bound: u64) -> Self {
        match self {
            Self::AtMost(a) => Self::AtMost(a.min(bound)),
            Self::Unbounded => Self::AtMost(bound),
        }
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AtMost(bound) => write!(f, "<={}", bound),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

impl LogicalProperty for Cardinality {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub struct CardinalityPropertyBuilder;

impl CardinalityPropertyBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CardinalityPropertyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicalPropertyBuilder<RelNodeType> for CardinalityPropertyBuilder {
    type Prop = Cardinality;

    fn derive(
        &self,
        typ: RelNodeType,
        predicates: &[ArcRelPredNode],
        children: &[&Self::Prop],
    ) -> Self::Prop {
        match typ {
            RelNodeType::Scan => Cardinality::Unbounded,
            RelNodeType::Filter
            | RelNodeType::Projection
            | RelNodeType::Sort
            | RelNodeType::CteProducer
            | RelNodeType::CteScan => *children[0],
            RelNodeType::Join(join_type) => {
                use crate::plan_nodes::JoinType::*;
                let left = *children[0];
                let right = *children[1];
                match join_type {
                    Inner | Cross => left.product(right),
                    // Each unmatched row also surfaces once.
                    LeftOuter => left.product(right).add(left),
                    RightOuter => left.product(right).add(right),
                    FullOuter => left.product(right).add(left).add(right),
                    LeftSemi | LeftAnti => left,
                    RightSemi | RightAnti => right,
                }
            }
            RelNodeType::Agg => {
                let groups = ListPred::from_pred_node(predicates[1].clone()).unwrap();
                if groups.is_empty() {
                    Cardinality::AtMost(1)
                } else {
                    *children[0]
                }
            }
            RelNodeType::Limit => {
                let fetch = ConstantPred::from_pred_node(predicates[1].clone())
                    .unwrap()
                    .value()
                    .as_u64();
                children[0].min_with(fetch)
            }
            x => unimplemented!("cannot derive cardinality property for {}", x),
        }
    }

    fn at_most_one_row(&self, prop: &Self::Prop) -> Option<bool> {
        match prop {
            Cardinality::AtMost(bound) => Some(*bound <= 1),
            Cardinality::Unbounded => Some(false),
        }
    }

    fn property_name(&self) -> &'static str {
        "cardinality"
    }
}
