// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

mod bin_op_pred;
mod column_ref_pred;
mod constant_pred;
mod list_pred;
mod log_op_pred;
mod sort_order_pred;

pub use bin_op_pred::{BinOpPred, BinOpType};
pub use column_ref_pred::ColumnRefPred;
pub use constant_pred::{ConstantPred, ConstantType};
pub use list_pred::ListPred;
pub use log_op_pred::{LogOpPred, LogOpType};
pub use sort_order_pred::{SortOrderPred, SortOrderType};
