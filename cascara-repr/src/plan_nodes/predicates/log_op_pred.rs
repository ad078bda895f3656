// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::fmt::Display;

use cascara_core::nodes::PlanNodeMetaMap;
use pretty_xmlish::Pretty;

use crate::plan_nodes::{
    ArcRelPredNode, ListPred, RelPredNode, RelPredType, RelReprPredNode,
};

#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum LogOpType {
    And,
    Or,
}

impl Display for LogOpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Debug)]
pub struct LogOpPred(pub ArcRelPredNode);

impl LogOpPred {
    pub fn new(op_type: LogOpType, preds: Vec<ArcRelPredNode>) -> Self {
        LogOpPred(
            RelPredNode {
                typ: RelPredType::LogOp(op_type),
                children: preds,
                data: None,
            }
            .into(),
        )
    }

    /// Flattens one level of nesting, e.g. `(a AND (b AND c))` becomes `(a AND b AND c)`.
    /// Assumes the children in `preds` are themselves already flattened, so this is only
    /// usable when building predicates bottom up.
    pub fn new_flattened_nested_logical(op_type: LogOpType, preds: ListPred) -> Self {
        let mut flattened = Vec::new();
        for child in preds.to_vec() {
            if let RelPredType::LogOp(child_op) = child.typ {
                if child_op == op_type {
                    let child_log_op = LogOpPred::from_pred_node(child).unwrap();
                    flattened.extend(child_log_op.children());
                    continue;
                }
            }
            flattened.push(child);
        }
        LogOpPred::new(op_type, flattened)
    }

    pub fn children(&self) -> Vec<ArcRelPredNode> {
        self.0.children.clone()
    }

    pub fn child(&self, idx: usize) -> ArcRelPredNode {
        self.0.child(idx)
    }

    pub fn op_type(&self) -> LogOpType {
        if let RelPredType::LogOp(op_type) = self.0.typ {
            op_type
        } else {
            panic!("not a log op")
        }
    }
}

impl RelReprPredNode for LogOpPred {
    fn into_pred_node(self) -> ArcRelPredNode {
        self.0
    }

    fn from_pred_node(pred_node: ArcRelPredNode) -> Option<Self> {
        if let RelPredType::LogOp(_) = pred_node.typ {
            Some(Self(pred_node))
        } else {
            None
        }
    }

    fn explain(&self, meta_map: Option<&PlanNodeMetaMap>) -> Pretty<'static> {
        Pretty::simple_record(
            self.op_type().to_string(),
            vec![],
            self.children()
                .iter()
                .map(|x| x.explain(meta_map))
                .collect(),
        )
    }
}
