// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

macro_rules! define_plan_node {
    (
        $struct_name:ident : $meta_typ:tt,
        $variant:ident,
        [ $({ $child_id:literal, $child_name:ident : $child_meta_typ:ty }),* ] ,
        [ $({ $attr_id:literal, $attr_name:ident : $attr_meta_typ:ty }),* ]
        $(, { $inner_name:ident : $inner_typ:ty })?
    ) => {
        impl RelReprPlanNode for $struct_name {
            fn into_plan_node(self) -> ArcRelPlanNode {
                self.0
            }

            fn from_plan_node(plan_node: ArcRelPlanNode) -> Option<Self> {
                #[allow(unused_variables)]
                if let RelNodeType :: $variant $( ($inner_name) )? = plan_node.typ {
                    Some(Self(plan_node))
                } else {
                    None
                }
            }

            fn explain(&self, meta_map: Option<&cascara_core::nodes::PlanNodeMetaMap>) -> pretty_xmlish::Pretty<'static> {
                use crate::explain::{Insertable, MetaExt};
                use crate::plan_nodes::RelReprPredNode;

                let mut fields = vec![
                    $( (stringify!($inner_name), self.$inner_name().to_string().into() ) , )?
                    $( (stringify!($attr_name), self.$attr_name().explain(meta_map) ) ),*
                ];
                if let Some(meta_map) = meta_map {
                    fields = fields.with_meta(self.0.get_meta(meta_map));
                };

                pretty_xmlish::Pretty::simple_record(
                    stringify!($struct_name),
                    fields,
                    vec![
                        $( self.$child_name().unwrap_plan_node().explain(meta_map) ),*
                    ],
                )
            }
        }

        impl $struct_name {
            pub fn new(
                $($child_name : $child_meta_typ,)*
                $($attr_name : $attr_meta_typ),*
                $(, $inner_name : $inner_typ)?
            ) -> $struct_name {
                use crate::plan_nodes::RelReprPredNode;
                #[allow(unused_mut, unused)]
                $struct_name(
                    RelPlanNode {
                        typ: RelNodeType::$variant $( ($inner_name) )?,
                        children: vec![
                            $($child_name.into(),)*
                        ],
                        predicates: vec![
                            $($attr_name.into_pred_node(),)*
                        ],
                    }
                    .into(),
                )
            }

            pub fn new_unchecked(
                $($child_name : impl Into<cascara_core::nodes::PlanNodeOrGroup<RelNodeType>>,)*
                $($attr_name : $attr_meta_typ),*
                $(, $inner_name : $inner_typ)?
            ) -> $struct_name {
                use crate::plan_nodes::RelReprPredNode;
                #[allow(unused_mut, unused)]
                $struct_name(
                    RelPlanNode {
                        typ: RelNodeType::$variant $( ($inner_name) )?,
                        children: vec![
                            $($child_name.into(),)*
                        ],
                        predicates: vec![
                            $($attr_name.into_pred_node()),*
                        ],
                    }
                    .into(),
                )
            }

            $(
                pub fn $child_name(&self) -> cascara_core::nodes::PlanNodeOrGroup<RelNodeType> {
                    self.0.child($child_id)
                }
            )*


            $(
                pub fn $attr_name(&self) -> $attr_meta_typ {
                    use crate::plan_nodes::RelReprPredNode;
                    <$attr_meta_typ>::from_pred_node(self.0.predicate($attr_id)).unwrap()
                }
            )*

            $(
                pub fn $inner_name(&self) -> JoinType {
                    if let RelNodeType :: $variant ($inner_name) = self.0 .typ {
                        return $inner_name;
                    } else {
                        unreachable!();
                    }
                }
            )?
        }
    };
}

pub(crate) use define_plan_node;
