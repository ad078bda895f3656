// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::fmt::Display;

use cascara_core::nodes::PlanNodeMetaMap;
use pretty_xmlish::Pretty;
use serde::{Deserialize, Serialize};

use crate::plan_nodes::{ArcRelPredNode, RelPredNode, RelPredType, RelReprPredNode};

#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum SortOrderType {
    Asc,
    Desc,
}

impl Display for SortOrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Debug)]
pub struct SortOrderPred(pub ArcRelPredNode);

impl SortOrderPred {
    pub fn new(order: SortOrderType, child: ArcRelPredNode) -> Self {
        SortOrderPred(
            RelPredNode {
                typ: RelPredType::SortOrder(order),
                children: vec![child],
                data: None,
            }
            .into(),
        )
    }

    pub fn child(&self) -> ArcRelPredNode {
        self.0.child(0)
    }

    pub fn order(&self) -> SortOrderType {
        if let RelPredType::SortOrder(order) = self.0.typ {
            order
        } else {
            panic!("not a sort order")
        }
    }
}

impl RelReprPredNode for SortOrderPred {
    fn into_pred_node(self) -> ArcRelPredNode {
        self.0
    }

    fn from_pred_node(pred_node: ArcRelPredNode) -> Option<Self> {
        if let RelPredType::SortOrder(_) = pred_node.typ {
            Some(Self(pred_node))
        } else {
            None
        }
    }

    fn explain(&self, meta_map: Option<&PlanNodeMetaMap>) -> Pretty<'static> {
        Pretty::simple_record(
            "SortOrder",
            vec![("order", self.order().to_string().into())],
            vec![self.child().explain(meta_map)],
        )
    }
}
