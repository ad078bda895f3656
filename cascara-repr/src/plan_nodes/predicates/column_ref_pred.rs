// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use cascara_core::nodes::{PlanNodeMetaMap, Value};
use pretty_xmlish::Pretty;

use crate::plan_nodes::{ArcRelPredNode, RelPredNode, RelPredType, RelReprPredNode};

/// Reference to a column by its session-stable column id. Ids are minted by the
/// column registry, so the same column keeps the same id no matter where the
/// reference sits in the plan.
#[derive(Clone, Debug)]
pub struct ColumnRefPred(pub ArcRelPredNode);

impl ColumnRefPred {
    pub fn new(column: usize) -> ColumnRefPred {
        ColumnRefPred(
            RelPredNode {
                typ: RelPredType::ColumnRef,
                children: vec![],
                data: Some(Value::UInt64(column as u64)),
            }
            .into(),
        )
    }

    /// Gets the column id.
    pub fn column(&self) -> usize {
        self.0.unwrap_data().as_u64() as usize
    }
}

impl RelReprPredNode for ColumnRefPred {
    fn into_pred_node(self) -> ArcRelPredNode {
        self.0
    }

    fn from_pred_node(pred_node: ArcRelPredNode) -> Option<Self> {
        if pred_node.typ != RelPredType::ColumnRef {
            return None;
        }
        Some(Self(pred_node))
    }

    fn explain(&self, _meta_map: Option<&PlanNodeMetaMap>) -> Pretty<'static> {
        Pretty::display(&format!("#{}", self.column()))
    }
}
