// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::HashMap;
use std::sync::Arc;

use cascara_core::nodes::{ArcPredNode, PlanNode, PlanNodeOrGroup};
use cascara_core::rules::{Rule, RuleMatcher};

use crate::plan_nodes::{JoinType, RelNodeType};

/// Converts a logical operator into its direct physical counterpart, keeping children and
/// predicates as they are.
pub struct PhysicalConversionRule {
    matcher: RuleMatcher<RelNodeType>,
}

impl PhysicalConversionRule {
    pub fn new(logical_typ: RelNodeType) -> Self {
        Self {
            matcher: RuleMatcher::MatchAndPickDiscriminant {
                typ_discriminant: std::mem::discriminant(&logical_typ),
                children: vec![RuleMatcher::IgnoreMany],
                pick_to: 0,
            },
        }
    }
}

impl PhysicalConversionRule {
    pub fn all_conversions() -> Vec<Arc<dyn Rule<RelNodeType>>> {
        // Define conversions below, and add them to this list!
        // Note that we're using discriminant matching, so only one value of each variant
        // is sufficient to match all values of a variant.
        let rules: Vec<Arc<dyn Rule<RelNodeType>>> = vec![
            Arc::new(PhysicalConversionRule::new(RelNodeType::Scan)),
            Arc::new(PhysicalConversionRule::new(RelNodeType::Projection)),
            Arc::new(PhysicalConversionRule::new(RelNodeType::Join(
                JoinType::Inner,
            ))),
            Arc::new(PhysicalConversionRule::new(RelNodeType::Filter)),
            Arc::new(PhysicalConversionRule::new(RelNodeType::Sort)),
            Arc::new(PhysicalConversionRule::new(RelNodeType::Agg)),
            Arc::new(PhysicalConversionRule::new(RelNodeType::Limit)),
            Arc::new(PhysicalConversionRule::new(RelNodeType::CteProducer)),
            Arc::new(PhysicalConversionRule::new(RelNodeType::CteScan)),
        ];

        rules
    }
}

impl Rule<RelNodeType> for PhysicalConversionRule {
    fn matcher(&self) -> &RuleMatcher<RelNodeType> {
        &self.matcher
    }

    fn apply(
        &self,
        picks: HashMap<usize, PlanNodeOrGroup<RelNodeType>>,
        _predicates: Vec<ArcPredNode<RelNodeType>>,
    ) -> Vec<PlanNodeOrGroup<RelNodeType>> {
        let PlanNode {
            typ,
            children,
            predicates,
        } = Arc::unwrap_or_clone(picks[&0].unwrap_plan_node());

        match typ {
            RelNodeType::Join(x) => {
                let node = PlanNode {
                    typ: RelNodeType::PhysicalNestedLoopJoin(x),
                    children,
                    predicates,
                };
                vec![node.into()]
            }
            RelNodeType::Scan => {
                let node = PlanNode {
                    typ: RelNodeType::PhysicalScan,
                    children,
                    predicates,
                };
                vec![node.into()]
            }
            RelNodeType::Filter => {
                let node = PlanNode {
                    typ: RelNodeType::PhysicalFilter,
                    children,
                    predicates,
                };
                vec![node.into()]
            }
            RelNodeType::Projection => {
                let node = PlanNode {
                    typ: RelNodeType::PhysicalProjection,
                    children,
                    predicates,
                };
                vec![node.into()]
            }
            RelNodeType::Sort => {
                let node = PlanNode {
                    typ: RelNodeType::PhysicalSort,
                    children,
                    predicates,
                };
                vec![node.into()]
            }
            RelNodeType::Agg => {
                let node = PlanNode {
                    typ: RelNodeType::PhysicalHashAgg,
                    children,
                    predicates,
                };
                vec![node.into()]
            }
            RelNodeType::Limit => {
                let node = PlanNode {
                    typ: RelNodeType::PhysicalLimit,
                    children,
                    predicates,
                };
                vec![node.into()]
            }
            // A spool both materializes a producer and replays it for a reader, so both
            // sides of a CTE lower to the same operator.
            RelNodeType::CteProducer | RelNodeType::CteScan => {
                let node = PlanNode {
                    typ: RelNodeType::PhysicalSpool,
                    children,
                    predicates,
                };
                vec![node.into()]
            }
            _ => vec![],
        }
    }

    fn is_impl_rule(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "physical_conversion"
    }
}
