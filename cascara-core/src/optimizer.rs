// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use anyhow::Result;

use crate::logical_property::LogicalPropertyBuilder;
use crate::nodes::{ArcPlanNode, NodeType, PlanNodeOrGroup};
use crate::physical_property::PhysicalProperty;

/// The optimizer interface seen by embedders. The search core provides the cascades
/// implementation; callers that only need plan inspection can stay generic over this trait.
pub trait Optimizer<T: NodeType> {
    /// Optimize the plan with the default required physical properties.
    fn optimize(&mut self, root_rel: ArcPlanNode<T>) -> Result<ArcPlanNode<T>>;

    /// Optimize the plan so that the returned physical plan satisfies `required_props`
    /// at the root.
    fn optimize_with_required_props(
        &mut self,
        root_rel: ArcPlanNode<T>,
        required_props: &[&dyn PhysicalProperty],
    ) -> Result<ArcPlanNode<T>>;

    /// Read the `idx`-th derived logical property of the root group of `root_rel`.
    fn get_logical_property<P: LogicalPropertyBuilder<T>>(
        &self,
        root_rel: PlanNodeOrGroup<T>,
        idx: usize,
    ) -> P::Prop;
}
