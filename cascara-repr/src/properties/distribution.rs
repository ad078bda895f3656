// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::borrow::Borrow;

use cascara_core::nodes::NodeType;
use cascara_core::physical_property::{PhysicalProperty, PhysicalPropertyBuilder};
use serde::{Deserialize, Serialize};

use crate::plan_nodes::{ArcRelPredNode, RelNodeType};

/// How rows are spread across execution units. Every operator in this representation runs
/// on a single unit, so `Single` is the only derivable variant; `Hashed` and `Broadcast`
/// exist as requirement vocabulary for embedders that layer exchange operators on top.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistributionProp {
    /// Any distribution.
    Any,
    /// All rows on one execution unit.
    Single,
    /// Sharded by the given key columns.
    Hashed(Vec<usize>),
    /// Every execution unit holds a full copy.
    Broadcast,
}

impl std::fmt::Display for DistributionProp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl PhysicalProperty for DistributionProp {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn to_boxed(&self) -> Box<dyn PhysicalProperty> {
        Box::new(self.clone())
    }
}

pub struct DistributionPropertyBuilder;

impl DistributionPropertyBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DistributionPropertyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicalPropertyBuilder<RelNodeType> for DistributionPropertyBuilder {
    type Prop = DistributionProp;

    fn derive(
        &self,
        typ: RelNodeType,
        _predicates: &[ArcRelPredNode],
        children: &[impl Borrow<Self::Prop>],
    ) -> Self::Prop {
        match typ {
            RelNodeType::PhysicalScan => DistributionProp::Single,
            RelNodeType::PhysicalNestedLoopJoin(_)
            | RelNodeType::PhysicalHashJoin(_)
            | RelNodeType::PhysicalSortMergeJoin(_) => DistributionProp::Single,
            _ if typ.is_logical() => unreachable!("logical node should not be called"),
            _ if children.len() == 1 => children[0].borrow().clone(),
            other => unimplemented!("derive distribution prop for {}", other),
        }
    }

    fn passthrough(
        &self,
        typ: RelNodeType,
        _predicates: &[ArcRelPredNode],
        required: &Self::Prop,
    ) -> Vec<Self::Prop> {
        match typ {
            RelNodeType::PhysicalNestedLoopJoin(_)
            | RelNodeType::PhysicalHashJoin(_)
            | RelNodeType::PhysicalSortMergeJoin(_) => {
                vec![DistributionProp::Single, DistributionProp::Single]
            }
            RelNodeType::PhysicalHashAgg
            | RelNodeType::PhysicalStreamAgg
            | RelNodeType::PhysicalSort
            | RelNodeType::PhysicalLimit => vec![DistributionProp::Single],
            RelNodeType::PhysicalFilter | RelNodeType::PhysicalSpool => vec![required.clone()],
            RelNodeType::PhysicalProjection => match required {
                // The projection may drop key columns, so a keyed requirement cannot be
                // forwarded as-is.
                DistributionProp::Hashed(_) | DistributionProp::Broadcast => {
                    vec![DistributionProp::Any]
                }
                x => vec![x.clone()],
            },
            RelNodeType::PhysicalScan => vec![],
            _ if typ.is_logical() => unreachable!("logical node should not be called"),
            other => unimplemented!("passthrough distribution prop for {}", other),
        }
    }

    fn satisfies(&self, prop: &DistributionProp, required: &DistributionProp) -> bool {
        match (prop, required) {
            (_, DistributionProp::Any) => true,
            (DistributionProp::Single, DistributionProp::Single) => true,
            (DistributionProp::Hashed(x), DistributionProp::Hashed(y)) => x == y,
            (DistributionProp::Broadcast, DistributionProp::Broadcast) => true,
            _ => false,
        }
    }

    fn default(&self) -> Self::Prop {
        DistributionProp::Any
    }

    fn enforce(&self, prop: &Self::Prop) -> (RelNodeType, Vec<ArcRelPredNode>) {
        // No exchange operator exists in this representation; keyed and broadcast
        // requirements can only be satisfied structurally, never enforced.
        unimplemented!("enforce distribution {}", prop)
    }

    fn property_name(&self) -> &'static str {
        "distribution"
    }
}
