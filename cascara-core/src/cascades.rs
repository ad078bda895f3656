// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The core cascades optimizer implementation.

mod binding;
mod context;
mod memo;
mod optimizer;
mod scheduler;
mod transformation;

pub use binding::{Binding, BindingIter};
pub use context::{ContextId, CostContext, CostSource, CtxState, OptimizationContext};
pub use memo::{ArcMemoNode, DerivedProperties, ExprId, Group, GroupExpr, GroupId, Memo, MemoNode};
pub use optimizer::{CascadesOptimizer, OptimizerError, OptimizerProperties, SearchStage};
pub use transformation::TransformationResult;
