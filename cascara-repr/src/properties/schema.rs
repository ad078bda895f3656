// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::HashMap;
use std::sync::Arc;

use cascara_core::logical_property::{LogicalProperty, LogicalPropertyBuilder};
use itertools::Itertools;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::DEFAULT_NAME;
use crate::plan_nodes::{
    ArcRelPredNode, ColumnRefPred, ConstantPred, ConstantType, ListPred, RelNodeType,
    RelReprPredNode,
};

/// Mints session-stable column ids. A column keeps the same id for the whole session, so
/// column references stay valid no matter where the optimizer moves them in the plan.
#[derive(Default)]
pub struct ColumnRegistry {
    state: Mutex<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    next: usize,
    tables: HashMap<String, Vec<usize>>,
}

impl ColumnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids for the `width` columns of `table`, in declaration order. Minted on first
    /// request and stable afterwards.
    pub fn columns(&self, table: &str, width: usize) -> Vec<usize> {
        let mut state = self.state.lock();
        if let Some(ids) = state.tables.get(table) {
            assert_eq!(ids.len(), width, "width of table {} changed", table);
            return ids.clone();
        }
        let start = state.next;
        state.next += width;
        let ids = (start..start + width).collect_vec();
        state.tables.insert(table.to_string(), ids.clone());
        trace!(table, ?ids, "minted column ids");
        ids
    }

    /// Mints a fresh id not backed by any table column, e.g. for an aggregate output.
    pub fn mint(&self) -> usize {
        let mut state = self.state.lock();
        let id = state.next;
        state.next += 1;
        id
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: usize,
    pub name: String,
    pub typ: ConstantType,
    pub nullable: bool,
}

impl Field {
    /// Generate a field that is only a place holder for a computed column.
    fn placeholder(id: usize) -> Self {
        Self {
            id,
            name: DEFAULT_NAME.to_string(),
            typ: ConstantType::Binary,
            nullable: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn field_by_id(&self, id: usize) -> Option<&Field> {
        self.fields.iter().find(|field| field.id == id)
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (idx, field) in self.fields.iter().enumerate() {
            if idx != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}#{}", field.name, field.typ, field.id)?;
        }
        write!(f, "]")
    }
}

impl LogicalProperty for Schema {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub trait Catalog: Send + Sync + 'static {
    fn get(&self, name: &str) -> Schema;
}

pub struct SchemaPropertyBuilder {
    catalog: Arc<dyn Catalog>,
    registry: Arc<ColumnRegistry>,
}

impl SchemaPropertyBuilder {
    pub fn new(catalog: Arc<dyn Catalog>, registry: Arc<ColumnRegistry>) -> Self {
        Self { catalog, registry }
    }

    /// The output field of one projection or group-by expression. Column references
    /// resolve against the input by id; anything computed gets a placeholder field with a
    /// freshly minted id.
    fn output_field(&self, child: &Schema, expr: ArcRelPredNode) -> Field {
        if let Some(col_ref) = ColumnRefPred::from_pred_node(expr) {
            let id = col_ref.column();
            child
                .field_by_id(id)
                .cloned()
                .unwrap_or_else(|| Field::placeholder(id))
        } else {
            Field::placeholder(self.registry.mint())
        }
    }
}

impl LogicalPropertyBuilder<RelNodeType> for SchemaPropertyBuilder {
    type Prop = Schema;

    fn derive(
        &self,
        typ: RelNodeType,
        predicates: &[ArcRelPredNode],
        children: &[&Self::Prop],
    ) -> Self::Prop {
        match typ {
            RelNodeType::Scan => {
                let table_name = ConstantPred::from_pred_node(predicates[0].clone())
                    .unwrap()
                    .value()
                    .as_str();
                self.catalog.get(&table_name)
            }
            RelNodeType::Projection => {
                let exprs = ListPred::from_pred_node(predicates[0].clone()).unwrap();
                let fields = exprs
                    .to_vec()
                    .into_iter()
                    .map(|expr| self.output_field(children[0], expr))
                    .collect();
                Schema::new(fields)
            }
            RelNodeType::Agg => {
                let aggs = ListPred::from_pred_node(predicates[0].clone()).unwrap();
                let groups = ListPred::from_pred_node(predicates[1].clone()).unwrap();
                let mut fields: Vec<Field> = groups
                    .to_vec()
                    .into_iter()
                    .map(|expr| self.output_field(children[0], expr))
                    .collect();
                // Aggregate outputs are new columns scoped to this group; the memo derives
                // each group's properties once, so their ids are stable.
                fields.extend((0..aggs.len()).map(|_| Field::placeholder(self.registry.mint())));
                Schema::new(fields)
            }
            RelNodeType::Filter
            | RelNodeType::Sort
            | RelNodeType::Limit
            | RelNodeType::CteProducer
            | RelNodeType::CteScan => children[0].clone(),
            RelNodeType::Join(join_type) => {
                use crate::plan_nodes::JoinType::*;
                match join_type {
                    Inner | LeftOuter | RightOuter | FullOuter | Cross => {
                        let mut schema = children[0].clone();
                        let schema2 = children[1].clone();
                        schema.fields.extend(schema2.fields);
                        schema
                    }
                    LeftSemi | LeftAnti => children[0].clone(),
                    RightSemi | RightAnti => children[1].clone(),
                }
            }
            x => unimplemented!("cannot derive schema property for {}", x),
        }
    }

    fn property_name(&self) -> &'static str {
        "schema"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrent_requests_mint_each_table_once() {
        let registry = Arc::new(ColumnRegistry::new());
        let minted: Vec<Vec<usize>> = crossbeam::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let registry = registry.clone();
                    s.spawn(move |_| {
                        let table = if i % 2 == 0 { "emp" } else { "dept" };
                        registry.columns(table, 3)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
        .unwrap();
        let emp = registry.columns("emp", 3);
        let dept = registry.columns("dept", 3);
        assert_ne!(emp, dept);
        for (i, ids) in minted.iter().enumerate() {
            let expected = if i % 2 == 0 { &emp } else { &dept };
            assert_eq!(ids, expected);
        }
        // Fresh mints never collide with table columns.
        let fresh = registry.mint();
        assert!(!emp.contains(&fresh));
        assert!(!dept.contains(&fresh));
    }

    #[test]
    fn join_schema_concatenates_inputs() {
        let registry = Arc::new(ColumnRegistry::new());
        let left = Schema::new(
            registry
                .columns("l", 2)
                .into_iter()
                .map(Field::placeholder)
                .collect(),
        );
        let right = Schema::new(
            registry
                .columns("r", 1)
                .into_iter()
                .map(Field::placeholder)
                .collect(),
        );
        struct NoCatalog;
        impl Catalog for NoCatalog {
            fn get(&self, name: &str) -> Schema {
                panic!("unexpected catalog lookup: {}", name)
            }
        }
        let builder = SchemaPropertyBuilder::new(Arc::new(NoCatalog), registry);
        let joined = builder.derive(
            RelNodeType::Join(crate::plan_nodes::JoinType::Inner),
            &[ConstantPred::bool(true).into_pred_node()],
            &[&left, &right],
        );
        assert_eq!(joined.len(), 3);
        assert_eq!(
            joined.fields.iter().map(|f| f.id).collect_vec(),
            vec![0, 1, 2]
        );
    }
}
