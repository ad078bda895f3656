// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::sync::Arc;

use cascara_core::nodes::{PlanNodeMeta, PlanNodeMetaMap};
use pretty_xmlish::Pretty;

use crate::plan_nodes::ArcRelPlanNode;

pub trait Insertable<'a> {
    fn with_meta(self, meta: &PlanNodeMeta) -> Self;
}

impl<'a> Insertable<'a> for Vec<(&'a str, Pretty<'a>)> {
    fn with_meta(mut self, meta: &PlanNodeMeta) -> Self {
        self.push(("cost", Pretty::display(&meta.cost_display)));
        self.push(("stat", Pretty::display(&meta.stat_display)));
        self
    }
}

pub trait MetaExt {
    fn get_meta<'a>(&self, meta_map: &'a PlanNodeMetaMap) -> &'a PlanNodeMeta;
}

impl MetaExt for ArcRelPlanNode {
    /// The meta map is keyed by node address, so this only works on the exact plan tree
    /// returned by the optimizer.
    fn get_meta<'a>(&self, meta_map: &'a PlanNodeMetaMap) -> &'a PlanNodeMeta {
        meta_map
            .get(&(Arc::as_ptr(self) as usize))
            .expect("plan node not in meta map")
    }
}
