// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::any::Any;
use std::fmt::{Debug, Display};

use crate::nodes::{ArcPredNode, NodeType};

/// A type-erased logical (derived) property, so heterogeneous properties can be stored
/// side by side in the memo table.
pub trait LogicalProperty: 'static + Any + Send + Sync + Debug + Display {
    fn as_any(&self) -> &dyn Any;
}

/// A wrapper around [`LogicalPropertyBuilder`] erasing the concrete property type.
pub trait LogicalPropertyBuilderAny<T: NodeType>: 'static + Send + Sync {
    fn derive_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        children: &[&dyn LogicalProperty],
    ) -> Box<dyn LogicalProperty>;

    fn at_most_one_row_any(&self, prop: &dyn LogicalProperty) -> Option<bool>;

    fn property_name(&self) -> &'static str;
}

pub trait LogicalPropertyBuilder<T: NodeType>: 'static + Send + Sync + Sized {
    type Prop: LogicalProperty + Sized + Clone;

    /// Derive the output logical property based on the input logical properties and the current
    /// plan node information.
    fn derive(&self, typ: T, predicates: &[ArcPredNode<T>], children: &[&Self::Prop])
        -> Self::Prop;

    /// Whether the derived property proves the output has at most one row. Builders that do not
    /// track cardinality return `None`; a `Some(true)` answer relaxes order-like requirement
    /// checks on the group.
    fn at_most_one_row(&self, prop: &Self::Prop) -> Option<bool> {
        let _ = prop;
        None
    }

    fn property_name(&self) -> &'static str;
}

impl<T: NodeType, P: LogicalPropertyBuilder<T>> LogicalPropertyBuilderAny<T> for P {
    fn derive_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        children: &[&dyn LogicalProperty],
    ) -> Box<dyn LogicalProperty> {
        let children: Vec<&P::Prop> = children
            .iter()
            .map(|child| {
                child
                    .as_any()
                    .downcast_ref::<P::Prop>()
                    .expect("Failed to downcast child")
            })
            .collect();
        Box::new(self.derive(typ, predicates, &children))
    }

    fn at_most_one_row_any(&self, prop: &dyn LogicalProperty) -> Option<bool> {
        let prop = prop
            .as_any()
            .downcast_ref::<P::Prop>()
            .expect("Failed to downcast property");
        self.at_most_one_row(prop)
    }

    fn property_name(&self) -> &'static str {
        LogicalPropertyBuilder::property_name(self)
    }
}
