// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Shared fixtures for the unit tests: a two-table catalog and a preloaded optimizer.

mod test_catalog;

use std::sync::Arc;

use cascara_core::cascades::OptimizerProperties;
pub(crate) use test_catalog::TestCatalog;

use crate::properties::ColumnRegistry;
use crate::RelOptimizer;

pub(crate) fn new_test_optimizer(workers: usize) -> (RelOptimizer, Arc<TestCatalog>) {
    let registry = Arc::new(ColumnRegistry::new());
    let catalog = Arc::new(TestCatalog::new(registry.clone()));
    let optimizer = RelOptimizer::new_physical_with_options(
        catalog.clone(),
        registry,
        TestCatalog::row_counts(),
        OptimizerProperties {
            workers,
            ..Default::default()
        },
    );
    (optimizer, catalog)
}
