// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::any::Any;
use std::borrow::Borrow;
use std::fmt::{Debug, Display};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use itertools::Itertools;

use crate::nodes::{ArcPredNode, NodeType};

/// A type-erased physical property, so that properties of different builders can be stored
/// side by side in the memo table and in optimization goals.
pub trait PhysicalProperty: 'static + Any + Send + Sync + Debug + Display {
    fn as_any(&self) -> &dyn Any;
    fn to_boxed(&self) -> Box<dyn PhysicalProperty>;
}

/// A wrapper around [`PhysicalPropertyBuilder`] erasing the concrete property type.
pub trait PhysicalPropertyBuilderAny<T: NodeType>: 'static + Send + Sync {
    fn derive_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        children: &[&dyn PhysicalProperty],
    ) -> Box<dyn PhysicalProperty>;

    fn passthrough_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required_property: &dyn PhysicalProperty,
    ) -> Vec<Box<dyn PhysicalProperty>>;

    fn can_passthrough_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required_property: &dyn PhysicalProperty,
    ) -> bool;

    fn compatible_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required_property: &dyn PhysicalProperty,
    ) -> bool;

    fn satisfies_any(&self, prop: &dyn PhysicalProperty, required: &dyn PhysicalProperty) -> bool;

    fn enforce_any(&self, prop: &dyn PhysicalProperty) -> (T, Vec<ArcPredNode<T>>);

    fn search_goal_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required_property: &dyn PhysicalProperty,
    ) -> Option<Box<dyn PhysicalProperty>>;

    fn default_any(&self) -> Box<dyn PhysicalProperty>;

    fn satisfied_by_singleton(&self) -> bool;

    fn property_name(&self) -> &'static str;

    fn exactly_eq_any(&self, a: &dyn PhysicalProperty, b: &dyn PhysicalProperty) -> bool;

    fn hash_to_u64(&self, prop: &dyn PhysicalProperty) -> u64;
}

/// The trait for building physical properties for a plan node.
pub trait PhysicalPropertyBuilder<T: NodeType>: 'static + Send + Sync + Sized {
    type Prop: PhysicalProperty + Clone + Sized + PartialEq + Eq + Hash;

    /// Derive the output physical property based on the input physical properties and the current
    /// plan node information.
    fn derive(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        children: &[impl Borrow<Self::Prop>],
    ) -> Self::Prop;

    /// Passthrough the `required` property to the children if possible. Returns the required
    /// property for each child. If nothing can be passed through, simply return the default
    /// property for each child.
    fn passthrough(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required: &Self::Prop,
    ) -> Vec<Self::Prop>;

    /// Check if the required property can always be passed through to the children. This is done
    /// by checking `satisfies(derive(passthrough(required)), required)`. The implementor can
    /// override this function to provide a more efficient implementation. If the plan node always
    /// satisfies a property (i.e., sort always satisfies the sort property), this function should
    /// also return true.
    fn can_passthrough(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required: &Self::Prop,
    ) -> bool {
        let inputs = self.passthrough(typ.clone(), predicates, required);
        let derived = self.derive(typ, predicates, &inputs);
        self.satisfies(&derived, required)
    }

    /// A cheap pre-costing approximation of whether the plan node could ever produce something
    /// satisfying `required`, used to prune obviously-incompatible candidates before child
    /// optimization and costing. Must never return `false` for a candidate that would satisfy the
    /// requirement; returning `true` for one that would not merely wastes work.
    fn compatible(&self, typ: T, predicates: &[ArcPredNode<T>], required: &Self::Prop) -> bool {
        self.can_passthrough(typ, predicates, required)
    }

    /// Check if the derived physical property satisfies the required output physical property.
    fn satisfies(&self, prop: &Self::Prop, required: &Self::Prop) -> bool;

    /// Enforce the required output physical property by wrapping the input with a new plan node.
    fn enforce(&self, prop: &Self::Prop) -> (T, Vec<ArcPredNode<T>>);

    /// Convert a node back to a search goal.
    ///
    /// For example, sort <child> <orders> can be converted to a goal of requiring <orders> over
    /// the child group.
    fn search_goal(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required_property: &Self::Prop,
    ) -> Option<Self::Prop> {
        let _ = typ;
        let _ = predicates;
        let _ = required_property;
        None
    }

    /// Represents no requirement on a property.
    fn default(&self) -> Self::Prop;

    /// Whether any requirement of this property is vacuously satisfied by an input with at most
    /// one row. Order-like properties return true (a single row has no order); distribution-like
    /// properties must keep returning false.
    fn satisfied_by_singleton(&self) -> bool {
        false
    }

    fn property_name(&self) -> &'static str;

    fn exactly_eq(&self, a: &Self::Prop, b: &Self::Prop) -> bool {
        a == b
    }
}

impl<T: NodeType, P: PhysicalPropertyBuilder<T>> PhysicalPropertyBuilderAny<T> for P {
    fn derive_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        children: &[&dyn PhysicalProperty],
    ) -> Box<dyn PhysicalProperty> {
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

    fn passthrough_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required: &dyn PhysicalProperty,
    ) -> Vec<Box<dyn PhysicalProperty>> {
        let required = required
            .as_any()
            .downcast_ref::<P::Prop>()
            .expect("Failed to downcast required property");
        self.passthrough(typ, predicates, required)
            .into_iter()
            .map(|prop| Box::new(prop) as Box<dyn PhysicalProperty>)
            .collect()
    }

    fn can_passthrough_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required_property: &dyn PhysicalProperty,
    ) -> bool {
        let required = required_property
            .as_any()
            .downcast_ref::<P::Prop>()
            .expect("Failed to downcast required property");
        self.can_passthrough(typ, predicates, required)
    }

    fn compatible_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required_property: &dyn PhysicalProperty,
    ) -> bool {
        let required = required_property
            .as_any()
            .downcast_ref::<P::Prop>()
            .expect("Failed to downcast required property");
        self.compatible(typ, predicates, required)
    }

    fn satisfies_any(&self, prop: &dyn PhysicalProperty, required: &dyn PhysicalProperty) -> bool {
        let prop = prop
            .as_any()
            .downcast_ref::<P::Prop>()
            .expect("Failed to downcast property");
        let required = required
            .as_any()
            .downcast_ref::<P::Prop>()
            .expect("Failed to downcast required property");
        self.satisfies(prop, required)
    }

    fn enforce_any(&self, prop: &dyn PhysicalProperty) -> (T, Vec<ArcPredNode<T>>) {
        let prop = prop
            .as_any()
            .downcast_ref::<P::Prop>()
            .expect("Failed to downcast property");
        self.enforce(prop)
    }

    fn search_goal_any(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required_property: &dyn PhysicalProperty,
    ) -> Option<Box<dyn PhysicalProperty>> {
        let required_property = required_property
            .as_any()
            .downcast_ref::<P::Prop>()
            .expect("Failed to downcast required property");
        self.search_goal(typ, predicates, required_property)
            .map(|prop| Box::new(prop) as Box<dyn PhysicalProperty>)
    }

    fn default_any(&self) -> Box<dyn PhysicalProperty> {
        Box::new(PhysicalPropertyBuilder::default(self))
    }

    fn satisfied_by_singleton(&self) -> bool {
        PhysicalPropertyBuilder::satisfied_by_singleton(self)
    }

    fn exactly_eq_any(&self, a: &dyn PhysicalProperty, b: &dyn PhysicalProperty) -> bool {
        let a = a
            .as_any()
            .downcast_ref::<P::Prop>()
            .expect("Failed to downcast property a");
        let b = b
            .as_any()
            .downcast_ref::<P::Prop>()
            .expect("Failed to downcast property b");
        self.exactly_eq(a, b)
    }

    fn property_name(&self) -> &'static str {
        PhysicalPropertyBuilder::property_name(self)
    }

    fn hash_to_u64(&self, prop: &dyn PhysicalProperty) -> u64 {
        let prop = prop
            .as_any()
            .downcast_ref::<P::Prop>()
            .expect("Failed to downcast property");
        let mut hasher = DefaultHasher::new();
        prop.hash(&mut hasher);
        hasher.finish()
    }
}

/// Represents a set of physical properties for a specific plan node, one slot per registered
/// builder, always in builder order.
pub type PhysicalPropertySet = Vec<Box<dyn PhysicalProperty>>;

/// The set of required physical properties an optimization goal is keyed by.
pub type RequiredPlanProperties = Arc<[Box<dyn PhysicalProperty>]>;

#[derive(Clone)]
pub struct PhysicalPropertyBuilders<T: NodeType>(pub Arc<[Box<dyn PhysicalPropertyBuilderAny<T>>]>);

impl<T: NodeType> PhysicalPropertyBuilders<T> {
    pub fn new_empty_for_test() -> Self {
        PhysicalPropertyBuilders(Arc::new([]))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Takes children_len x props_len (input properties for each child) and returns props_len
    /// derived properties.
    pub fn derive_many<X, Y, Z>(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        children: Z,
        children_len: usize,
    ) -> PhysicalPropertySet
    where
        X: Borrow<dyn PhysicalProperty>,
        Y: AsRef<[X]>,
        Z: AsRef<[Y]>,
    {
        let children = children.as_ref();
        assert_eq!(children.len(), children_len);
        if let Some(first) = children.first() {
            assert_eq!(first.as_ref().len(), self.0.len())
        }
        let mut derived_prop = Vec::with_capacity(self.0.len());
        for i in 0..self.0.len() {
            let builder = &self.0[i];
            let children = children
                .iter()
                .map(|child| child.as_ref()[i].borrow())
                .collect_vec();
            let prop = builder.derive_any(typ.clone(), predicates, &children);
            derived_prop.push(prop);
        }
        derived_prop
    }

    /// Returns children_len x props_len (required properties for each child).
    pub fn passthrough_many<X, Y>(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required: Y,
        children_len: usize,
    ) -> Vec<PhysicalPropertySet>
    where
        X: Borrow<dyn PhysicalProperty>,
        Y: AsRef<[X]>,
    {
        let required = required.as_ref();
        assert_eq!(self.0.len(), required.len());
        let mut required_prop = Vec::with_capacity(children_len);
        required_prop.resize_with(children_len, Vec::new);
        #[allow(clippy::needless_range_loop)]
        for i in 0..self.0.len() {
            let builder = &self.0[i];
            let required_1 = builder.passthrough_any(typ.clone(), predicates, required[i].borrow());
            assert_eq!(
                required_1.len(),
                children_len,
                "required properties length mismatch: passthrough {} != children_num {} for property {} and plan node typ {}",
                required_1.len(),
                children_len,
                builder.property_name(),
                typ
            );
            for (child_idx, child_prop) in required_1.into_iter().enumerate() {
                required_prop[child_idx].push(child_prop);
            }
        }
        required_prop
    }

    pub fn can_passthrough_any_many<X, Y>(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required: Y,
    ) -> bool
    where
        X: Borrow<dyn PhysicalProperty>,
        Y: AsRef<[X]>,
    {
        let required = required.as_ref();
        assert_eq!(self.0.len(), required.len());
        required
            .iter()
            .zip(self.0.iter())
            .all(|(req, builder)| builder.can_passthrough_any(typ.clone(), predicates, req.borrow()))
    }

    /// The cheap pre-costing compatibility check across all builders.
    pub fn compatible_many<X, Y>(&self, typ: T, predicates: &[ArcPredNode<T>], required: Y) -> bool
    where
        X: Borrow<dyn PhysicalProperty>,
        Y: AsRef<[X]>,
    {
        let required = required.as_ref();
        assert_eq!(self.0.len(), required.len());
        required
            .iter()
            .zip(self.0.iter())
            .all(|(req, builder)| builder.compatible_any(typ.clone(), predicates, req.borrow()))
    }

    pub fn default_many(&self) -> PhysicalPropertySet {
        self.0.iter().map(|builder| builder.default_any()).collect()
    }

    /// Whether the required property set places no constraint at all, i.e. every slot is the
    /// builder default.
    pub fn is_default_many<X, Y>(&self, required: Y) -> bool
    where
        X: Borrow<dyn PhysicalProperty>,
        Y: AsRef<[X]>,
    {
        let required = required.as_ref();
        assert_eq!(required.len(), self.0.len());
        required
            .iter()
            .zip(self.0.iter())
            .all(|(req, builder)| builder.exactly_eq_any(req.borrow(), builder.default_any().as_ref()))
    }

    pub fn satisfies_many<X1, Y1, X2, Y2>(&self, prop: Y1, required: Y2) -> bool
    where
        X1: Borrow<dyn PhysicalProperty>,
        Y1: AsRef<[X1]>,
        X2: Borrow<dyn PhysicalProperty>,
        Y2: AsRef<[X2]>,
    {
        self.satisfies_many_relaxed(prop, required, false)
    }

    /// Field-by-field satisfaction check. When `at_most_one_row` is true, builders whose
    /// requirements are vacuous on a single row (order-like builders) are skipped, so a
    /// singleton input satisfies any order requirement without carrying order metadata.
    pub fn satisfies_many_relaxed<X1, Y1, X2, Y2>(
        &self,
        prop: Y1,
        required: Y2,
        at_most_one_row: bool,
    ) -> bool
    where
        X1: Borrow<dyn PhysicalProperty>,
        Y1: AsRef<[X1]>,
        X2: Borrow<dyn PhysicalProperty>,
        Y2: AsRef<[X2]>,
    {
        let required = required.as_ref();
        let prop = prop.as_ref();
        assert_eq!(required.len(), self.0.len());
        assert_eq!(prop.len(), self.0.len());
        for i in 0..self.0.len() {
            let builder = &self.0[i];
            if at_most_one_row && builder.satisfied_by_singleton() {
                continue;
            }
            if !builder.satisfies_any(prop[i].borrow(), required[i].borrow()) {
                return false;
            }
        }
        true
    }

    /// Convert a plan node into a search goal over its single child, if every builder can either
    /// absorb its requirement slot into the node (e.g. a logical sort absorbing a sort
    /// requirement) or the slot is unconstrained.
    pub fn search_goal_many<X, Y>(
        &self,
        typ: T,
        predicates: &[ArcPredNode<T>],
        required: Y,
    ) -> Option<PhysicalPropertySet>
    where
        X: Borrow<dyn PhysicalProperty>,
        Y: AsRef<[X]>,
    {
        let required = required.as_ref();
        assert_eq!(required.len(), self.0.len());
        let mut goal = Vec::with_capacity(self.0.len());
        let mut absorbed = false;
        for i in 0..self.0.len() {
            let builder = &self.0[i];
            if let Some(prop) = builder.search_goal_any(typ.clone(), predicates, required[i].borrow())
            {
                absorbed = true;
                goal.push(prop);
            } else if builder.exactly_eq_any(required[i].borrow(), builder.default_any().as_ref()) {
                goal.push(builder.default_any());
            } else {
                return None;
            }
        }
        absorbed.then_some(goal)
    }

    /// Compute the enforcer chain turning `input_props` into something satisfying
    /// `required_props`: one enforcer node per unsatisfied builder, in builder order, plus the
    /// property set of the enforced result.
    pub fn enforce_unsatisfied<X1, Y1, X2, Y2>(
        &self,
        input_props: Y1,
        required_props: Y2,
    ) -> (Vec<(T, Vec<ArcPredNode<T>>)>, PhysicalPropertySet)
    where
        X1: Borrow<dyn PhysicalProperty>,
        Y1: AsRef<[X1]>,
        X2: Borrow<dyn PhysicalProperty>,
        Y2: AsRef<[X2]>,
    {
        let input_props = input_props.as_ref();
        let required_props = required_props.as_ref();
        assert_eq!(self.0.len(), input_props.len());
        assert_eq!(self.0.len(), required_props.len());
        let mut chain = Vec::new();
        let mut new_props = input_props
            .iter()
            .map(|x| x.borrow().to_boxed())
            .collect_vec();
        for i in 0..self.0.len() {
            let builder = &self.0[i];
            let input_prop = input_props[i].borrow();
            let required_prop = required_props[i].borrow();
            if !builder.satisfies_any(input_prop, required_prop) {
                chain.push(builder.enforce_any(required_prop));
                // TODO: enforcing one property may invalidate an already-satisfied one; derive
                // through the chain once an enforcer can do that (order matters for gather+sort).
                new_props[i] = required_prop.to_boxed();
            }
        }
        (chain, new_props)
    }

    pub fn exactly_eq<X1, Y1, X2, Y2>(&self, a: Y1, b: Y2) -> bool
    where
        X1: Borrow<dyn PhysicalProperty>,
        Y1: AsRef<[X1]>,
        X2: Borrow<dyn PhysicalProperty>,
        Y2: AsRef<[X2]>,
    {
        let a = a.as_ref();
        let b = b.as_ref();
        assert_eq!(a.len(), self.0.len());
        assert_eq!(b.len(), self.0.len());
        for i in 0..self.0.len() {
            let builder = &self.0[i];
            if !builder.exactly_eq_any(a[i].borrow(), b[i].borrow()) {
                return false;
            }
        }
        true
    }

    pub fn hash_any<X: Borrow<dyn PhysicalProperty>, H: std::hash::Hasher>(
        &self,
        props: &[X],
        state: &mut H,
    ) {
        for (i, prop) in props.iter().enumerate() {
            let builder = &self.0[i];
            let prop = prop.borrow();
            state.write_u64(builder.hash_to_u64(prop));
        }
    }
}
