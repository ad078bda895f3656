// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::fmt::Display;

use cascara_core::nodes::PlanNodeMetaMap;
use pretty_xmlish::Pretty;

use crate::plan_nodes::{ArcRelPredNode, RelPredNode, RelPredType, RelReprPredNode};

#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum BinOpType {
    // numerical
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // comparison
    Eq,
    Neq,
    Gt,
    Lt,
    Geq,
    Leq,
}

impl Display for BinOpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl BinOpType {
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Neq | Self::Gt | Self::Lt | Self::Geq | Self::Leq
        )
    }
}

#[derive(Clone, Debug)]
pub struct BinOpPred(pub ArcRelPredNode);

impl BinOpPred {
    pub fn new(left: ArcRelPredNode, right: ArcRelPredNode, op_type: BinOpType) -> Self {
        BinOpPred(
            RelPredNode {
                typ: RelPredType::BinOp(op_type),
                children: vec![left, right],
                data: None,
            }
            .into(),
        )
    }

    pub fn left_child(&self) -> ArcRelPredNode {
        self.0.child(0)
    }

    pub fn right_child(&self) -> ArcRelPredNode {
        self.0.child(1)
    }

    pub fn op_type(&self) -> BinOpType {
        if let RelPredType::BinOp(op_type) = self.0.typ {
            op_type
        } else {
            panic!("not a bin op")
        }
    }
}

impl RelReprPredNode for BinOpPred {
    fn into_pred_node(self) -> ArcRelPredNode {
        self.0
    }

    fn from_pred_node(pred_node: ArcRelPredNode) -> Option<Self> {
        if let RelPredType::BinOp(_) = pred_node.typ {
            Some(Self(pred_node))
        } else {
            None
        }
    }

    fn explain(&self, meta_map: Option<&PlanNodeMetaMap>) -> Pretty<'static> {
        Pretty::simple_record(
            self.op_type().to_string(),
            vec![],
            vec![
                self.left_child().explain(meta_map),
                self.right_child().explain(meta_map),
            ],
        )
    }
}
