// Copyright (c) 2023-2024 CMU Database Group
//
// Use of this source code is governed by an MIT-style license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::fmt::Display;
use std::sync::Arc;

use anyhow::Result;
use cascara_core::nodes::{PlanNodeMetaMap, SerializableOrderedF64, Value};
use chrono::{NaiveDate, NaiveDateTime};
use ordered_float::OrderedFloat;
use pretty_xmlish::Pretty;
use serde::{Deserialize, Serialize};

use crate::plan_nodes::{ArcRelPredNode, RelPredNode, RelPredType, RelReprPredNode};

#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum ConstantType {
    Bool,
    Utf8String,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float64,
    Date,
    Binary,
}

impl Display for ConstantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl ConstantType {
    pub fn get_data_type_from_value(value: &Value) -> Self {
        match value {
            Value::Bool(_) => ConstantType::Bool,
            Value::String(_) => ConstantType::Utf8String,
            Value::UInt8(_) => ConstantType::UInt8,
            Value::UInt16(_) => ConstantType::UInt16,
            Value::UInt32(_) => ConstantType::UInt32,
            Value::UInt64(_) => ConstantType::UInt64,
            Value::Int8(_) => ConstantType::Int8,
            Value::Int16(_) => ConstantType::Int16,
            Value::Int32(_) => ConstantType::Int32,
            Value::Int64(_) => ConstantType::Int64,
            Value::Float(_) => ConstantType::Float64,
            Value::Date32(_) => ConstantType::Date,
            Value::Serialized(_) => ConstantType::Binary,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConstantPred(pub ArcRelPredNode);

impl ConstantPred {
    pub fn new(value: Value) -> Self {
        let typ = ConstantType::get_data_type_from_value(&value);
        Self::new_with_type(value, typ)
    }

    pub fn new_with_type(value: Value, typ: ConstantType) -> Self {
        ConstantPred(
            RelPredNode {
                typ: RelPredType::Constant(typ),
                children: vec![],
                data: Some(value),
            }
            .into(),
        )
    }

    pub fn bool(value: bool) -> Self {
        Self::new_with_type(Value::Bool(value), ConstantType::Bool)
    }

    pub fn string(value: impl AsRef<str>) -> Self {
        Self::new_with_type(
            Value::String(value.as_ref().into()),
            ConstantType::Utf8String,
        )
    }

    pub fn uint8(value: u8) -> Self {
        Self::new_with_type(Value::UInt8(value), ConstantType::UInt8)
    }

    pub fn uint16(value: u16) -> Self {
        Self::new_with_type(Value::UInt16(value), ConstantType::UInt16)
    }

    pub fn uint32(value: u32) -> Self {
        Self::new_with_type(Value::UInt32(value), ConstantType::UInt32)
    }

    pub fn uint64(value: u64) -> Self {
        Self::new_with_type(Value::UInt64(value), ConstantType::UInt64)
    }

    pub fn int8(value: i8) -> Self {
        Self::new_with_type(Value::Int8(value), ConstantType::Int8)
    }

    pub fn int16(value: i16) -> Self {
        Self::new_with_type(Value::Int16(value), ConstantType::Int16)
    }

    pub fn int32(value: i32) -> Self {
        Self::new_with_type(Value::Int32(value), ConstantType::Int32)
    }

    pub fn int64(value: i64) -> Self {
        Self::new_with_type(Value::Int64(value), ConstantType::Int64)
    }

    pub fn float64(value: f64) -> Self {
        Self::new_with_type(
            Value::Float(SerializableOrderedF64(OrderedFloat(value))),
            ConstantType::Float64,
        )
    }

    /// Days since the Unix epoch.
    pub fn date(value: i32) -> Self {
        Self::new_with_type(Value::Date32(value), ConstantType::Date)
    }

    /// Parses a `YYYY-MM-DD` date literal.
    pub fn date_iso(value: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")?;
        let days = (date - NaiveDateTime::UNIX_EPOCH.date()).num_days();
        Ok(Self::date(days as i32))
    }

    pub fn serialized(value: Arc<[u8]>) -> Self {
        Self::new_with_type(Value::Serialized(value), ConstantType::Binary)
    }

    /// Gets the constant value.
    pub fn value(&self) -> Value {
        self.0.unwrap_data()
    }

    pub fn constant_type(&self) -> ConstantType {
        if let RelPredType::Constant(typ) = self.0.typ {
            typ
        } else {
            panic!("not a constant")
        }
    }
}

impl RelReprPredNode for ConstantPred {
    fn into_pred_node(self) -> ArcRelPredNode {
        self.0
    }

    fn from_pred_node(pred_node: ArcRelPredNode) -> Option<Self> {
        if let RelPredType::Constant(_) = pred_node.typ {
            Some(Self(pred_node))
        } else {
            None
        }
    }

    fn explain(&self, _meta_map: Option<&PlanNodeMetaMap>) -> Pretty<'static> {
        Pretty::display(&self.value())
    }
}
