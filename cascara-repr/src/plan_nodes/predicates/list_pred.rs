// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use cascara_core::nodes::PlanNodeMetaMap;
use pretty_xmlish::Pretty;

use crate::plan_nodes::{ArcRelPredNode, RelPredNode, RelPredType, RelReprPredNode};

#[derive(Clone, Debug)]
pub struct ListPred(pub ArcRelPredNode);

impl ListPred {
    pub fn new(preds: Vec<ArcRelPredNode>) -> Self {
        ListPred(
            RelPredNode {
                typ: RelPredType::List,
                children: preds,
                data: None,
            }
            .into(),
        )
    }

    pub fn empty_list() -> Self {
        Self::new(vec![])
    }

    /// Gets number of predicates in the list.
    pub fn len(&self) -> usize {
        self.0.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.children.is_empty()
    }

    /// Gets the predicate at the given index.
    pub fn child(&self, idx: usize) -> ArcRelPredNode {
        self.0.child(idx)
    }

    pub fn to_vec(&self) -> Vec<ArcRelPredNode> {
        self.0.children.clone()
    }
}

impl RelReprPredNode for ListPred {
    fn into_pred_node(self) -> ArcRelPredNode {
        self.0
    }

    fn from_pred_node(pred_node: ArcRelPredNode) -> Option<Self> {
        if pred_node.typ != RelPredType::List {
            return None;
        }
        Some(Self(pred_node))
    }

    fn explain(&self, meta_map: Option<&PlanNodeMetaMap>) -> Pretty<'static> {
        Pretty::Array(
            self.to_vec()
                .iter()
                .map(|x| x.explain(meta_map))
                .collect::<Vec<_>>(),
        )
    }
}
