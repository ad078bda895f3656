// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::borrow::Borrow;

use cascara_core::nodes::NodeType;
use cascara_core::physical_property::{PhysicalProperty, PhysicalPropertyBuilder};
use serde::{Deserialize, Serialize};

use crate::plan_nodes::{
    ArcRelPredNode, ColumnRefPred, ListPred, RelNodeType, RelReprPredNode, SortOrderPred,
    SortOrderType,
};

pub struct SortPropertyBuilder;

impl SortPropertyBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SortPropertyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum SortPropType {
    /// Only used as a required property; Asc/Desc both satisfy it.
    AnySorted,
    Asc,
    Desc,
}

/// Sort keys as `(direction, column id)` pairs, outermost key first. The empty vector
/// means no particular order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortProp(pub Vec<(SortPropType, usize)>);

impl std::fmt::Display for SortProp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<any>");
        }
        write!(f, "[")?;
        for (idx, (order, col)) in self.0.iter().enumerate() {
            if idx != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}#{}", order, col)?;
        }
        write!(f, "]")
    }
}

impl PhysicalProperty for SortProp {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn to_boxed(&self) -> Box<dyn PhysicalProperty> {
        Box::new(self.clone())
    }
}

impl SortProp {
    pub fn any_order() -> Self {
        SortProp(vec![])
    }

    /// `required` must be a prefix of `prop`, with compatible directions columnwise.
    pub fn satisfies(prop: &SortProp, required: &SortProp) -> bool {
        for i in 0..required.0.len() {
            if i >= prop.0.len() {
                return false;
            }
            if prop.0[i].1 != required.0[i].1 {
                return false;
            }
            match (prop.0[i].0, required.0[i].0) {
                (SortPropType::AnySorted, SortPropType::AnySorted)
                | (SortPropType::Asc, SortPropType::Asc)
                | (SortPropType::Desc, SortPropType::Desc)
                | (SortPropType::Asc, SortPropType::AnySorted)
                | (SortPropType::Desc, SortPropType::AnySorted) => {}
                (SortPropType::Asc, SortPropType::Desc)
                | (SortPropType::Desc, SortPropType::Asc)
                | (SortPropType::AnySorted, SortPropType::Asc)
                | (SortPropType::AnySorted, SortPropType::Desc) => return false,
            }
        }
        true
    }

    fn from_sort_order_predicates(preds: ListPred) -> Option<Self> {
        let mut columns = Vec::new();
        for pred in preds.to_vec() {
            let order = SortOrderPred::from_pred_node(pred).unwrap();
            // Sorting by a computed expression produces no usable order property.
            let col_ref = ColumnRefPred::from_pred_node(order.child())?;
            let order = match order.order() {
                SortOrderType::Asc => SortPropType::Asc,
                SortOrderType::Desc => SortPropType::Desc,
            };
            columns.push((order, col_ref.column()));
        }
        Some(SortProp(columns))
    }

    /// Order requirement over a list of group-by columns: take directions from `required`
    /// while its prefix lines up with the columns, then fall back to `AnySorted`.
    fn from_list_predicates(preds: ListPred, required: &SortProp) -> Option<Self> {
        let mut columns = Vec::new();
        let mut take_from_required = true;
        for (idx, pred) in preds.to_vec().into_iter().enumerate() {
            let col_ref = ColumnRefPred::from_pred_node(pred)?;
            if idx >= required.0.len() {
                take_from_required = false;
            }
            if take_from_required && col_ref.column() != required.0[idx].1 {
                take_from_required = false;
            }
            let order_req = if take_from_required {
                required.0[idx].0
            } else {
                SortPropType::AnySorted
            };
            columns.push((order_req, col_ref.column()));
        }
        Some(SortProp(columns))
    }
}

impl PhysicalPropertyBuilder<RelNodeType> for SortPropertyBuilder {
    type Prop = SortProp;

    fn derive(
        &self,
        typ: RelNodeType,
        predicates: &[ArcRelPredNode],
        children: &[impl Borrow<Self::Prop>],
    ) -> Self::Prop {
        match typ {
            RelNodeType::PhysicalSort => {
                match SortProp::from_sort_order_predicates(
                    ListPred::from_pred_node(predicates[0].clone()).unwrap(),
                ) {
                    Some(prop) => prop,
                    None => SortProp::any_order(),
                }
            }
            RelNodeType::PhysicalStreamAgg => {
                // The child was required sorted on the group-by columns, and column ids
                // survive the aggregation, so that prefix carries over. A singleton child
                // may have satisfied the requirement with no order at all.
                let group_by_len = predicates[1].children.len();
                let child_sorts = &children[0].borrow().0;
                let prefix = group_by_len.min(child_sorts.len());
                SortProp(child_sorts[..prefix].to_vec())
            }
            RelNodeType::PhysicalFilter | RelNodeType::PhysicalLimit | RelNodeType::PhysicalSpool => {
                children[0].borrow().clone()
            }
            _ if typ.is_logical() => unreachable!("logical node should not be called"),
            _ => SortProp::any_order(),
        }
    }

    fn passthrough(
        &self,
        typ: RelNodeType,
        predicates: &[ArcRelPredNode],
        required: &Self::Prop,
    ) -> Vec<Self::Prop> {
        match typ {
            RelNodeType::PhysicalFilter
            | RelNodeType::PhysicalLimit
            | RelNodeType::PhysicalSpool => vec![required.clone()],
            RelNodeType::PhysicalHashAgg | RelNodeType::PhysicalProjection => {
                vec![SortProp::any_order()]
            }
            RelNodeType::PhysicalHashJoin(_)
            | RelNodeType::PhysicalNestedLoopJoin(_)
            | RelNodeType::PhysicalSortMergeJoin(_) => {
                vec![SortProp::any_order(), SortProp::any_order()]
            }
            RelNodeType::PhysicalScan => vec![],
            RelNodeType::PhysicalSort => {
                let this_prop = SortProp::from_sort_order_predicates(
                    ListPred::from_pred_node(predicates[0].clone()).unwrap(),
                );
                match this_prop {
                    Some(this_prop) if self.satisfies(required, &this_prop) => {
                        vec![this_prop]
                    }
                    _ => vec![SortProp::any_order()],
                }
            }
            RelNodeType::PhysicalStreamAgg => {
                let group_by = SortProp::from_list_predicates(
                    ListPred::from_pred_node(predicates[1].clone()).unwrap(),
                    required,
                )
                .unwrap();
                vec![group_by]
            }
            _ if typ.is_logical() => unreachable!("logical node should not be called"),
            node => unimplemented!("passthrough for {:?}", node),
        }
    }

    fn satisfies(&self, prop: &SortProp, required: &SortProp) -> bool {
        SortProp::satisfies(prop, required)
    }

    fn default(&self) -> Self::Prop {
        SortProp::any_order()
    }

    fn search_goal(
        &self,
        typ: RelNodeType,
        predicates: &[ArcRelPredNode],
        required: &Self::Prop,
    ) -> Option<Self::Prop> {
        match typ {
            RelNodeType::Sort => {
                let prop = SortProp::from_sort_order_predicates(
                    ListPred::from_pred_node(predicates[0].clone()).unwrap(),
                );
                match prop {
                    Some(prop) if SortProp::satisfies(&prop, required) => Some(prop),
                    Some(prop) if SortProp::satisfies(required, &prop) => Some(required.clone()),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn enforce(&self, prop: &Self::Prop) -> (RelNodeType, Vec<ArcRelPredNode>) {
        let mut predicates = Vec::new();
        for (order, col) in &prop.0 {
            let order = match order {
                SortPropType::Asc => SortOrderType::Asc,
                SortPropType::Desc => SortOrderType::Desc,
                SortPropType::AnySorted => SortOrderType::Asc,
            };
            predicates.push(
                SortOrderPred::new(order, ColumnRefPred::new(*col).into_pred_node())
                    .into_pred_node(),
            );
        }
        (
            RelNodeType::PhysicalSort,
            vec![ListPred::new(predicates).into_pred_node()],
        )
    }

    fn satisfied_by_singleton(&self) -> bool {
        // A single row is trivially in every order.
        true
    }

    fn property_name(&self) -> &'static str {
        "sort"
    }
}
