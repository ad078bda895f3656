// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Lazy enumeration of the ways a rule pattern matches the memo table.

use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;

use super::memo::{ArcMemoNode, ExprId, GroupId, Memo};
use crate::nodes::{ArcPlanNode, ArcPredNode, NodeType, PlanNode, PlanNodeOrGroup};
use crate::rules::RuleMatcher;

/// One way a rule pattern matches the memo, in the shape [`crate::rules::Rule::apply`]
/// consumes: captured subtrees / group references by pick slot, plus the predicates of
/// every structural node the pattern descended through, flattened in preorder.
pub struct Binding<T: NodeType> {
    pub picks: HashMap<usize, PlanNodeOrGroup<T>>,
    pub predicates: Vec<ArcPredNode<T>>,
}

/// The resolved state of one matcher child within a bound expression. Pick and ignore
/// leaves resolve to group references immediately; only structural sub-patterns carry a
/// cursor of their own.
enum ChildState<'a, T: NodeType> {
    Picked {
        slot: usize,
        group: GroupId,
    },
    /// A variable-arity tail, expanded to the candidate's actual arity with consecutive
    /// slots starting at `start_slot`.
    PickedMany {
        start_slot: usize,
        groups: Vec<GroupId>,
    },
    Ignored {
        group: GroupId,
    },
    IgnoredMany {
        groups: Vec<GroupId>,
    },
    Sub(GroupCursor<'a, T>),
}

/// A structural matcher bound to one concrete memo expression, holding one resolved state
/// per matcher child.
struct ExprCursor<'a, T: NodeType> {
    matcher: &'a RuleMatcher<T>,
    node: ArcMemoNode<T>,
    children: Vec<ChildState<'a, T>>,
}

/// A structural matcher positioned within a group: a snapshot of the group's expressions
/// and a cursor over the ones the matcher accepts.
struct GroupCursor<'a, T: NodeType> {
    matcher: &'a RuleMatcher<T>,
    candidates: Vec<ArcMemoNode<T>>,
    idx: usize,
    current: Option<Box<ExprCursor<'a, T>>>,
}

impl<'a, T: NodeType> ExprCursor<'a, T> {
    fn new(memo: &Memo<T>, matcher: &'a RuleMatcher<T>, node: ArcMemoNode<T>) -> Option<Self> {
        let children_matchers = match matcher {
            RuleMatcher::MatchNode { typ, children }
            | RuleMatcher::MatchAndPickNode { typ, children, .. } => {
                if &node.typ != typ {
                    return None;
                }
                children
            }
            RuleMatcher::MatchDiscriminant {
                typ_discriminant,
                children,
            }
            | RuleMatcher::MatchAndPickDiscriminant {
                typ_discriminant,
                children,
                ..
            } => {
                if &std::mem::discriminant(&node.typ) != typ_discriminant {
                    return None;
                }
                children
            }
            _ => panic!("the binding cursor only descends through structural matchers"),
        };
        let variadic_tail = matches!(
            children_matchers.last(),
            Some(RuleMatcher::PickMany { .. } | RuleMatcher::IgnoreMany)
        );
        if variadic_tail {
            if node.children.len() + 1 < children_matchers.len() {
                return None;
            }
        } else if node.children.len() != children_matchers.len() {
            return None;
        }
        let mut children = Vec::with_capacity(children_matchers.len());
        for (idx, child_matcher) in children_matchers.iter().enumerate() {
            let state = match child_matcher {
                RuleMatcher::PickOne { pick_to } => ChildState::Picked {
                    slot: *pick_to,
                    group: node.children[idx],
                },
                RuleMatcher::IgnoreOne => ChildState::Ignored {
                    group: node.children[idx],
                },
                RuleMatcher::PickMany { pick_to } => {
                    assert_eq!(idx + 1, children_matchers.len(), "mismatched matcher");
                    ChildState::PickedMany {
                        start_slot: *pick_to,
                        groups: node.children[idx..].to_vec(),
                    }
                }
                RuleMatcher::IgnoreMany => {
                    assert_eq!(idx + 1, children_matchers.len(), "mismatched matcher");
                    ChildState::IgnoredMany {
                        groups: node.children[idx..].to_vec(),
                    }
                }
                sub => ChildState::Sub(GroupCursor::new(memo, sub, node.children[idx])?),
            };
            children.push(state);
        }
        Some(Self {
            matcher,
            node,
            children,
        })
    }

    /// Advance to the next combination of sub-pattern bindings, rightmost cursor first.
    fn advance(&mut self, memo: &Memo<T>) -> bool {
        for i in (0..self.children.len()).rev() {
            if let ChildState::Sub(cursor) = &mut self.children[i] {
                if cursor.advance(memo) {
                    for child in &mut self.children[i + 1..] {
                        if let ChildState::Sub(cursor) = child {
                            if !cursor.rewind(memo) {
                                return false;
                            }
                        }
                    }
                    return true;
                }
            }
        }
        false
    }

    fn collect(
        &self,
        picks: &mut HashMap<usize, PlanNodeOrGroup<T>>,
        predicates: &mut Vec<ArcPredNode<T>>,
    ) {
        if let RuleMatcher::MatchAndPickNode { pick_to, .. }
        | RuleMatcher::MatchAndPickDiscriminant { pick_to, .. } = self.matcher
        {
            picks.insert(*pick_to, PlanNodeOrGroup::PlanNode(self.materialize()));
        }
        predicates.extend(self.node.predicates.iter().cloned());
        for child in &self.children {
            match child {
                ChildState::Picked { slot, group } => {
                    picks.insert(*slot, PlanNodeOrGroup::Group(*group));
                }
                ChildState::PickedMany { start_slot, groups } => {
                    for (i, group) in groups.iter().enumerate() {
                        picks.insert(start_slot + i, PlanNodeOrGroup::Group(*group));
                    }
                }
                ChildState::Ignored { .. } | ChildState::IgnoredMany { .. } => {}
                ChildState::Sub(cursor) => {
                    if let Some(current) = &cursor.current {
                        current.collect(picks, predicates);
                    }
                }
            }
        }
    }

    /// Rebuild the bound expression as a concrete tree. Children outside the pattern stay
    /// group references; bound sub-patterns are materialized recursively.
    fn materialize(&self) -> ArcPlanNode<T> {
        let mut children = Vec::with_capacity(self.node.children.len());
        for child in &self.children {
            match child {
                ChildState::Picked { group, .. } | ChildState::Ignored { group } => {
                    children.push(PlanNodeOrGroup::Group(*group));
                }
                ChildState::PickedMany { groups, .. } | ChildState::IgnoredMany { groups } => {
                    children.extend(groups.iter().map(|group| PlanNodeOrGroup::Group(*group)));
                }
                ChildState::Sub(cursor) => {
                    if let Some(current) = &cursor.current {
                        children.push(PlanNodeOrGroup::PlanNode(current.materialize()));
                    }
                }
            }
        }
        Arc::new(PlanNode {
            typ: self.node.typ.clone(),
            children,
            predicates: self.node.predicates.clone(),
        })
    }
}

impl<'a, T: NodeType> GroupCursor<'a, T> {
    fn new(memo: &Memo<T>, matcher: &'a RuleMatcher<T>, group_id: GroupId) -> Option<Self> {
        let candidates = memo
            .all_exprs_in_group(group_id)
            .into_iter()
            .map(|expr_id| memo.get_expr_memoed(expr_id))
            .collect_vec();
        let mut cursor = Self {
            matcher,
            candidates,
            idx: 0,
            current: None,
        };
        cursor.seek(memo).then_some(cursor)
    }

    /// Position on the first accepting candidate at or after `idx`.
    fn seek(&mut self, memo: &Memo<T>) -> bool {
        while self.idx < self.candidates.len() {
            if let Some(expr) = ExprCursor::new(memo, self.matcher, self.candidates[self.idx].clone())
            {
                self.current = Some(Box::new(expr));
                return true;
            }
            self.idx += 1;
        }
        self.current = None;
        false
    }

    fn advance(&mut self, memo: &Memo<T>) -> bool {
        if let Some(current) = &mut self.current {
            if current.advance(memo) {
                return true;
            }
        }
        self.idx += 1;
        self.seek(memo)
    }

    fn rewind(&mut self, memo: &Memo<T>) -> bool {
        self.idx = 0;
        self.seek(memo)
    }
}

/// Lazily enumerates every way `matcher` binds against the expression `expr_id`, one
/// binding per `next()` call. The full combinatorial set is never materialized; each
/// pattern level keeps a cursor over its group's candidate expressions and advancing
/// ripples from the innermost cursor outward.
///
/// Group contents are snapshotted per cursor on creation, so an iterator observes a
/// consistent set of alternatives even while other workers keep inserting expressions.
pub struct BindingIter<'a, T: NodeType> {
    memo: &'a Memo<T>,
    root: Option<ExprCursor<'a, T>>,
    started: bool,
}

impl<'a, T: NodeType> BindingIter<'a, T> {
    /// Bind `matcher` against the expression `expr_id`. The matcher root must be a
    /// structural match; only sub-patterns iterate over whole groups.
    pub fn new(memo: &'a Memo<T>, matcher: &'a RuleMatcher<T>, expr_id: ExprId) -> Self {
        let node = memo.get_expr_memoed(expr_id);
        let root = ExprCursor::new(memo, matcher, node);
        Self {
            memo,
            root,
            started: false,
        }
    }
}

impl<T: NodeType> Iterator for BindingIter<'_, T> {
    type Item = Binding<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.started {
            let advanced = match self.root.as_mut() {
                Some(root) => root.advance(self.memo),
                None => false,
            };
            if !advanced {
                self.root = None;
                return None;
            }
        }
        self.started = true;
        let root = self.root.as_ref()?;
        let mut picks = HashMap::new();
        let mut predicates = Vec::new();
        root.collect(&mut picks, &mut predicates);
        Some(Binding { picks, predicates })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascades::memo::Memo;
    use crate::nodes::Value;
    use crate::physical_property::PhysicalPropertyBuilders;
    use crate::tests::common::{expr, join, scan, MemoTestRelTyp};

    fn empty_memo() -> Memo<MemoTestRelTyp> {
        Memo::new(Arc::new([]), PhysicalPropertyBuilders::new_empty_for_test())
    }

    fn scan_matcher() -> RuleMatcher<MemoTestRelTyp> {
        RuleMatcher::MatchNode {
            typ: MemoTestRelTyp::Scan,
            children: vec![],
        }
    }

    fn binding_table_names(binding: &Binding<MemoTestRelTyp>) -> Vec<String> {
        binding
            .predicates
            .iter()
            .filter_map(|pred| pred.data.as_ref())
            .filter_map(|data| match data {
                Value::String(s) => Some(s.to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn one_binding_per_alternative() {
        let memo = empty_memo();
        let (_, expr_id) = memo.add_new_expr(join(scan("t1"), scan("t2"), expr(Value::Bool(true))));
        let (scan_group, _) = memo.get_expr_info(scan("t1"));
        memo.add_expr_to_group(scan("t1b").into(), scan_group);

        let matcher = RuleMatcher::MatchNode {
            typ: MemoTestRelTyp::Join,
            children: vec![scan_matcher(), RuleMatcher::PickOne { pick_to: 0 }],
        };
        let bindings: Vec<_> = BindingIter::new(&memo, &matcher, expr_id).collect();
        assert_eq!(bindings.len(), 2);
        let (right_group, _) = memo.get_expr_info(scan("t2"));
        for binding in &bindings {
            assert_eq!(binding.picks[&0].unwrap_group(), right_group);
        }
        assert_eq!(binding_table_names(&bindings[0]), vec!["t1"]);
        assert_eq!(binding_table_names(&bindings[1]), vec!["t1b"]);
    }

    #[test]
    fn cursors_advance_rightmost_first() {
        let memo = empty_memo();
        let (_, expr_id) = memo.add_new_expr(join(scan("t1"), scan("t2"), expr(Value::Bool(true))));
        let (left_group, _) = memo.get_expr_info(scan("t1"));
        let (right_group, _) = memo.get_expr_info(scan("t2"));
        memo.add_expr_to_group(scan("t1b").into(), left_group);
        memo.add_expr_to_group(scan("t2b").into(), right_group);

        let matcher = RuleMatcher::MatchNode {
            typ: MemoTestRelTyp::Join,
            children: vec![scan_matcher(), scan_matcher()],
        };
        let names: Vec<_> = BindingIter::new(&memo, &matcher, expr_id)
            .map(|binding| binding_table_names(&binding))
            .collect();
        assert_eq!(
            names,
            vec![
                vec!["t1".to_string(), "t2".to_string()],
                vec!["t1".to_string(), "t2b".to_string()],
                vec!["t1b".to_string(), "t2".to_string()],
                vec!["t1b".to_string(), "t2b".to_string()],
            ]
        );
    }

    #[test]
    fn match_and_pick_captures_node() {
        let memo = empty_memo();
        let (_, expr_id) = memo.add_new_expr(join(scan("t1"), scan("t2"), expr(Value::Bool(true))));
        let matcher = RuleMatcher::MatchAndPickNode {
            typ: MemoTestRelTyp::Join,
            children: vec![RuleMatcher::IgnoreOne, RuleMatcher::IgnoreOne],
            pick_to: 0,
        };
        let bindings: Vec<_> = BindingIter::new(&memo, &matcher, expr_id).collect();
        assert_eq!(bindings.len(), 1);
        let captured = bindings[0].picks[&0].unwrap_plan_node();
        assert_eq!(captured.typ, MemoTestRelTyp::Join);
        assert_eq!(captured.children.len(), 2);
        assert!(!captured.child(0).is_materialized());
        assert_eq!(captured.predicates[0], expr(Value::Bool(true)));
    }

    #[test]
    fn variadic_tail_expands_to_actual_arity() {
        let memo = empty_memo();
        let (_, expr_id) = memo.add_new_expr(join(scan("t1"), scan("t2"), expr(Value::Bool(true))));
        let matcher = RuleMatcher::MatchNode {
            typ: MemoTestRelTyp::Join,
            children: vec![RuleMatcher::PickMany { pick_to: 0 }],
        };
        let bindings: Vec<_> = BindingIter::new(&memo, &matcher, expr_id).collect();
        assert_eq!(bindings.len(), 1);
        let (left_group, _) = memo.get_expr_info(scan("t1"));
        let (right_group, _) = memo.get_expr_info(scan("t2"));
        assert_eq!(bindings[0].picks[&0].unwrap_group(), left_group);
        assert_eq!(bindings[0].picks[&1].unwrap_group(), right_group);
    }

    #[test]
    fn no_binding_when_typ_differs() {
        let memo = empty_memo();
        let (_, expr_id) = memo.add_new_expr(scan("t1"));
        let matcher = RuleMatcher::MatchNode {
            typ: MemoTestRelTyp::Filter,
            children: vec![RuleMatcher::IgnoreOne],
        };
        assert_eq!(BindingIter::new(&memo, &matcher, expr_id).count(), 0);
    }
}
