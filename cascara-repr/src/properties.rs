// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Logical and physical property builders of the representation.

mod cardinality;
mod distribution;
mod schema;
mod sort;

pub use cardinality::{Cardinality, CardinalityPropertyBuilder};
pub use distribution::{DistributionProp, DistributionPropertyBuilder};
pub use schema::{Catalog, ColumnRegistry, Field, Schema, SchemaPropertyBuilder};
pub use sort::{SortProp, SortPropType, SortPropertyBuilder};

/// Name given to fields whose name is not tracked, e.g. computed columns.
pub const DEFAULT_NAME: &str = "unnamed";
