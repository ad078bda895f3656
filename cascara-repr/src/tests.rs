// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! End-to-end optimization tests over the two-table test catalog.

use cascara_core::optimizer::Optimizer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::plan_nodes::{
    explain_to_string, ArcRelPlanNode, ArcRelPredNode, BinOpPred, BinOpType, ColumnRefPred,
    ConstantPred, JoinType, ListPred, LogicalAgg, LogicalCteProducer, LogicalCteScan,
    LogicalFilter, LogicalJoin, LogicalScan, LogicalSort, PhysicalSort, RelNodeType,
    RelReprPlanNode, RelReprPredNode, SortOrderPred, SortOrderType,
};
use crate::properties::{
    Cardinality, CardinalityPropertyBuilder, Catalog, DistributionProp, SchemaPropertyBuilder,
    SortProp, SortPropType,
};
use crate::testing::{new_test_optimizer, TestCatalog};

fn scan(table: &str) -> ArcRelPlanNode {
    LogicalScan::new(ConstantPred::string(table)).into_plan_node()
}

fn col(id: usize) -> ArcRelPredNode {
    ColumnRefPred::new(id).into_pred_node()
}

fn eq_cols(a: usize, b: usize) -> ArcRelPredNode {
    BinOpPred::new(col(a), col(b), BinOpType::Eq).into_pred_node()
}

fn emp_dept_join(catalog: &TestCatalog) -> ArcRelPlanNode {
    let emp = catalog.get("emp");
    let dept = catalog.get("dept");
    LogicalJoin::new(
        scan("emp"),
        scan("dept"),
        eq_cols(emp.fields[2].id, dept.fields[0].id),
        JoinType::Inner,
    )
    .into_plan_node()
}

#[test]
fn picks_hash_join_for_equi_join() {
    let (mut optimizer, catalog) = new_test_optimizer(2);
    let plan = optimizer.optimize(emp_dept_join(&catalog)).unwrap();
    let explained = explain_to_string(&plan.explain(None));
    assert!(explained.contains("PhysicalHashJoin"), "{}", explained);
}

#[test]
fn pushes_filter_below_sort() {
    let (mut optimizer, catalog) = new_test_optimizer(1);
    let emp = catalog.get("emp");
    let sorted = LogicalSort::new(
        scan("emp"),
        ListPred::new(vec![
            SortOrderPred::new(SortOrderType::Asc, col(emp.fields[0].id)).into_pred_node(),
        ]),
    );
    let filtered = LogicalFilter::new(
        sorted.into_plan_node(),
        BinOpPred::new(
            col(emp.fields[2].id),
            ConstantPred::int32(1).into_pred_node(),
            BinOpType::Eq,
        )
        .into_pred_node(),
    );
    let plan = optimizer.optimize(filtered.into_plan_node()).unwrap();
    let explained = explain_to_string(&plan.explain(None));
    let sort_at = explained.find("PhysicalSort").unwrap();
    let filter_at = explained.find("PhysicalFilter").unwrap();
    assert!(sort_at < filter_at, "{}", explained);
}

#[test]
fn enforces_root_sort_requirement() {
    let (mut optimizer, catalog) = new_test_optimizer(1);
    let emp = catalog.get("emp");
    let required_sort = SortProp(vec![(SortPropType::Asc, emp.fields[0].id)]);
    let plan = optimizer
        .optimize_with_required_props(scan("emp"), &[&required_sort, &DistributionProp::Any])
        .unwrap();
    let sort = PhysicalSort::from_plan_node(plan).expect("sort enforcer at the root");
    assert_eq!(
        sort.child().unwrap_plan_node().typ,
        RelNodeType::PhysicalScan
    );
}

#[test]
fn singleton_agg_needs_no_sort() {
    let (mut optimizer, catalog) = new_test_optimizer(1);
    let emp = catalog.get("emp");
    let agg = LogicalAgg::new(
        scan("emp"),
        ListPred::new(vec![col(emp.fields[0].id)]),
        ListPred::empty_list(),
    );
    let required_sort = SortProp(vec![(SortPropType::Asc, emp.fields[0].id)]);
    let plan = optimizer
        .optimize_with_required_props(
            agg.into_plan_node(),
            &[&required_sort, &DistributionProp::Any],
        )
        .unwrap();
    // One output row is in every order already, so no sort is planned anywhere, and the
    // cheaper streaming aggregate wins over the hash aggregate.
    assert_eq!(plan.typ, RelNodeType::PhysicalStreamAgg);
    let explained = explain_to_string(&plan.explain(None));
    assert!(!explained.contains("PhysicalSort"), "{}", explained);
}

#[test]
fn derives_schema_and_cardinality_of_a_join() {
    let (optimizer, catalog) = new_test_optimizer(1);
    let emp = catalog.get("emp");
    let dept = catalog.get("dept");
    let plan = emp_dept_join(&catalog);
    let schema = optimizer.get_logical_property::<SchemaPropertyBuilder>(plan.clone().into(), 0);
    let expected: Vec<usize> = emp
        .fields
        .iter()
        .chain(dept.fields.iter())
        .map(|field| field.id)
        .collect();
    assert_eq!(
        schema.fields.iter().map(|field| field.id).collect::<Vec<_>>(),
        expected
    );
    let card = optimizer.get_logical_property::<CardinalityPropertyBuilder>(plan.into(), 1);
    assert_eq!(card, Cardinality::Unbounded);

    let agg = LogicalAgg::new(
        scan("emp"),
        ListPred::new(vec![col(emp.fields[0].id)]),
        ListPred::empty_list(),
    );
    let card = optimizer
        .get_logical_property::<CardinalityPropertyBuilder>(agg.into_plan_node().into(), 1);
    assert_eq!(card, Cardinality::AtMost(1));
}

#[test]
fn lowers_cte_reader_to_spool() {
    let (mut optimizer, _catalog) = new_test_optimizer(1);
    let producer = LogicalCteProducer::new(scan("emp"), ConstantPred::string("recent_emps"));
    let reader = LogicalCteScan::new(
        producer.into_plan_node(),
        ConstantPred::string("recent_emps"),
    );
    let plan = optimizer.optimize(reader.into_plan_node()).unwrap();
    let explained = explain_to_string(&plan.explain(None));
    assert!(explained.contains("PhysicalSpool"), "{}", explained);
}

fn optimize_random_plan(seed: u64, workers: usize) -> String {
    let (mut optimizer, catalog) = new_test_optimizer(workers);
    let mut rng = StdRng::seed_from_u64(seed);
    let emp = catalog.get("emp");
    let mut plan = emp_dept_join(&catalog);
    if rng.gen_bool(0.5) {
        plan = LogicalFilter::new(
            plan,
            BinOpPred::new(
                col(emp.fields[0].id),
                ConstantPred::int64(rng.gen_range(0..1000)).into_pred_node(),
                BinOpType::Gt,
            )
            .into_pred_node(),
        )
        .into_plan_node();
    }
    if rng.gen_bool(0.5) {
        let order = if rng.gen_bool(0.5) {
            SortOrderType::Asc
        } else {
            SortOrderType::Desc
        };
        let key = emp.fields[rng.gen_range(0..emp.fields.len())].id;
        plan = LogicalSort::new(
            plan,
            ListPred::new(vec![SortOrderPred::new(order, col(key)).into_pred_node()]),
        )
        .into_plan_node();
    }
    let optimized = optimizer.optimize(plan).unwrap();
    explain_to_string(&optimized.explain(None))
}

#[test]
fn worker_count_does_not_change_the_winner() {
    for seed in 0..4 {
        let single = optimize_random_plan(seed, 1);
        let multi = optimize_random_plan(seed, 4);
        assert_eq!(single, multi, "seed {}", seed);
    }
}
