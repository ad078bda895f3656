// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

macro_rules! define_matcher {
    ( ( $typ:expr $(, $children:tt )* ) ) => {
        RuleMatcher::MatchNode {
            typ: $typ,
            children: vec![
                $( crate::rules::macros::define_matcher!($children) ),*
            ],
        }
    };
    ( $pick_one:tt ) => {
        RuleMatcher::PickOne {
            pick_to: $pick_one,
        }
    };
}

macro_rules! define_rule_inner {
    ($rule_type:expr, $name:ident, $apply:ident, $($matcher:tt)+) => {
        pub struct $name {
            matcher: RuleMatcher<RelNodeType>,
        }

        impl $name {
            pub fn new() -> Self {
                #[allow(unused_imports)]
                use RelNodeType::*;
                let matcher = crate::rules::macros::define_matcher!($($matcher)+);
                Self { matcher }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Rule<RelNodeType> for $name {
            fn matcher(&self) -> &RuleMatcher<RelNodeType> {
                &self.matcher
            }

            fn apply(
                &self,
                picks: std::collections::HashMap<
                    usize,
                    cascara_core::nodes::PlanNodeOrGroup<RelNodeType>,
                >,
                predicates: Vec<cascara_core::nodes::ArcPredNode<RelNodeType>>,
            ) -> Vec<cascara_core::nodes::PlanNodeOrGroup<RelNodeType>> {
                $apply(picks, predicates)
            }

            camelpaste::paste! {
                fn name(&self) -> &'static str {
                    stringify!([< $name:snake >])
                }
            }

            fn is_impl_rule(&self) -> bool {
                $rule_type
            }
        }
    };
}

macro_rules! define_rule {
    ($name:ident, $apply:ident, $($matcher:tt)+) => {
        crate::rules::macros::define_rule_inner! { false, $name, $apply, $($matcher)+ }
    };
}

macro_rules! define_impl_rule {
    ($name:ident, $apply:ident, $($matcher:tt)+) => {
        crate::rules::macros::define_rule_inner! { true, $name, $apply, $($matcher)+ }
    };
}

pub(crate) use define_impl_rule;
pub(crate) use define_matcher;
pub(crate) use define_rule;
pub(crate) use define_rule_inner;
