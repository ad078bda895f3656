// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::collections::HashMap;
use std::sync::Arc;

use crate::plan_nodes::ConstantType;
use crate::properties::{Catalog, ColumnRegistry, Field, Schema};

pub struct TestCatalog {
    registry: Arc<ColumnRegistry>,
}

impl TestCatalog {
    pub fn new(registry: Arc<ColumnRegistry>) -> Self {
        Self { registry }
    }

    pub fn row_counts() -> HashMap<String, u64> {
        HashMap::from([("emp".to_string(), 1000), ("dept".to_string(), 10)])
    }
}

impl Catalog for TestCatalog {
    fn get(&self, name: &str) -> Schema {
        let fields: Vec<(&str, ConstantType)> = match name {
            "emp" => vec![
                ("id", ConstantType::Int32),
                ("name", ConstantType::Utf8String),
                ("dept_id", ConstantType::Int32),
            ],
            "dept" => vec![
                ("id", ConstantType::Int32),
                ("name", ConstantType::Utf8String),
            ],
            _ => panic!("unknown table: {}", name),
        };
        let ids = self.registry.columns(name, fields.len());
        Schema::new(
            ids.into_iter()
                .zip(fields)
                .map(|(id, (name, typ))| Field {
                    id,
                    name: name.to_string(),
                    typ,
                    nullable: false,
                })
                .collect(),
        )
    }
}
