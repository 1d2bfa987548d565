//! The meta-types gob uses to describe compound types on the wire.
//!
//! A definition segment carries a [`WireType`] encoded as an ordinary struct
//! value of the built-in `WireType` type, so these convert to and from
//! [`Value`] and go through the same struct codec as user data.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::types::{self, TypeId};
use crate::{Error, Result, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommonType {
    pub name: String,
    pub id: TypeId,
}

impl CommonType {
    pub fn new(name: impl Into<String>, id: TypeId) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapType {
    pub common: CommonType,
    pub key: TypeId,
    pub elem: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructType {
    pub common: CommonType,
    pub fields: Vec<FieldType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldType {
    pub name: String,
    pub id: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SliceType {
    pub common: CommonType,
    pub elem: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayType {
    pub common: CommonType,
    pub elem: TypeId,
    pub len: i64,
}

/// Exactly one of the compound type descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireType {
    Array(ArrayType),
    Slice(SliceType),
    Struct(StructType),
    Map(MapType),
}

impl WireType {
    pub fn common(&self) -> &CommonType {
        match self {
            WireType::Array(t) => &t.common,
            WireType::Slice(t) => &t.common,
            WireType::Struct(t) => &t.common,
            WireType::Map(t) => &t.common,
        }
    }

    /// Ids of the types this one is built from, in field order.
    pub fn dependencies(&self) -> Vec<TypeId> {
        match self {
            WireType::Array(t) => vec![t.elem],
            WireType::Slice(t) => vec![t.elem],
            WireType::Struct(t) => t.fields.iter().map(|f| f.id).collect(),
            WireType::Map(t) => vec![t.key, t.elem],
        }
    }

    /// Same shape, ignoring the name and id in the common part.
    pub fn same_shape(&self, other: &WireType) -> bool {
        match (self, other) {
            (WireType::Array(a), WireType::Array(b)) => a.elem == b.elem && a.len == b.len,
            (WireType::Slice(a), WireType::Slice(b)) => a.elem == b.elem,
            (WireType::Map(a), WireType::Map(b)) => a.key == b.key && a.elem == b.elem,
            (WireType::Struct(a), WireType::Struct(b)) => a.fields == b.fields,
            _ => false,
        }
    }

    /// Renders this description as a value of the built-in `WireType` type.
    pub fn to_value(&self) -> Value {
        let (field, inner) = match self {
            WireType::Array(t) => (
                "ArrayT",
                Value::new_struct(
                    types::ARRAY_TYPE,
                    [
                        ("CommonType", common_value(&t.common)),
                        ("Elem", Value::Int(t.elem)),
                        ("Len", Value::Int(t.len)),
                    ],
                ),
            ),
            WireType::Slice(t) => (
                "SliceT",
                Value::new_struct(
                    types::SLICE_TYPE,
                    [("CommonType", common_value(&t.common)), ("Elem", Value::Int(t.elem))],
                ),
            ),
            WireType::Struct(t) => {
                let fields = t
                    .fields
                    .iter()
                    .map(|f| {
                        Value::new_struct(
                            types::FIELD_TYPE,
                            [("Name", Value::from(f.name.as_str())), ("Id", Value::Int(f.id))],
                        )
                    })
                    .collect();
                (
                    "StructT",
                    Value::new_struct(
                        types::STRUCT_TYPE,
                        [
                            ("CommonType", common_value(&t.common)),
                            ("Field", Value::Array(types::FIELD_TYPE_SLICE, fields)),
                        ],
                    ),
                )
            }
            WireType::Map(t) => (
                "MapT",
                Value::new_struct(
                    types::MAP_TYPE,
                    [
                        ("CommonType", common_value(&t.common)),
                        ("Key", Value::Int(t.key)),
                        ("Elem", Value::Int(t.elem)),
                    ],
                ),
            ),
        };
        Value::new_struct(types::WIRE_TYPE, [(field, inner)])
    }
}

fn common_value(common: &CommonType) -> Value {
    Value::new_struct(
        types::COMMON_TYPE,
        [("Name", Value::from(common.name.as_str())), ("Id", Value::Int(common.id))],
    )
}

fn struct_fields(value: &Value, expected: TypeId) -> Result<&BTreeMap<String, Value>> {
    match value {
        Value::Struct(id, fields) if *id == expected => Ok(fields),
        _ => Err(Error::malformed(format!(
            "expected struct of type {}, got {:?}",
            expected, value
        ))),
    }
}

// Decoded structs carry every field, but tolerate absent ones as zero.
fn int_field(fields: &BTreeMap<String, Value>, name: &str) -> Result<i64> {
    match fields.get(name) {
        None => Ok(0),
        Some(v) => v
            .as_int()
            .ok_or_else(|| Error::malformed(format!("field {} is not an int", name))),
    }
}

fn string_field(fields: &BTreeMap<String, Value>, name: &str) -> Result<String> {
    match fields.get(name) {
        None => Ok(String::new()),
        Some(v) => v
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::malformed(format!("field {} is not a string", name))),
    }
}

fn common_field(fields: &BTreeMap<String, Value>) -> Result<CommonType> {
    match fields.get("CommonType") {
        None => Ok(CommonType::new("", 0)),
        Some(v) => {
            let common = struct_fields(v, types::COMMON_TYPE)?;
            Ok(CommonType {
                name: string_field(common, "Name")?,
                id: int_field(common, "Id")?,
            })
        }
    }
}

impl TryFrom<&Value> for WireType {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self> {
        let wire = struct_fields(value, types::WIRE_TYPE)?;
        let mut present = wire.iter().filter(|(_, v)| !v.is_zero());
        let (name, inner) = match (present.next(), present.next()) {
            (Some(only), None) => only,
            (None, _) => return Err(Error::malformed("empty wire type")),
            (Some(_), Some(_)) => return Err(Error::malformed("wire type with more than one variant")),
        };

        match name.as_str() {
            "ArrayT" => {
                let t = struct_fields(inner, types::ARRAY_TYPE)?;
                let len = int_field(t, "Len")?;
                if len < 0 {
                    return Err(Error::malformed(format!("negative array length {}", len)));
                }
                Ok(WireType::Array(ArrayType {
                    common: common_field(t)?,
                    elem: int_field(t, "Elem")?,
                    len,
                }))
            }
            "SliceT" => {
                let t = struct_fields(inner, types::SLICE_TYPE)?;
                Ok(WireType::Slice(SliceType {
                    common: common_field(t)?,
                    elem: int_field(t, "Elem")?,
                }))
            }
            "StructT" => {
                let t = struct_fields(inner, types::STRUCT_TYPE)?;
                let fields = match t.get("Field") {
                    None => Vec::new(),
                    Some(v) => v
                        .as_slice()
                        .ok_or_else(|| Error::malformed("struct field list is not a slice"))?
                        .iter()
                        .map(|f| -> Result<FieldType> {
                            let f = struct_fields(f, types::FIELD_TYPE)?;
                            Ok(FieldType {
                                name: string_field(f, "Name")?,
                                id: int_field(f, "Id")?,
                            })
                        })
                        .collect::<Result<Vec<_>>>()?,
                };
                Ok(WireType::Struct(StructType {
                    common: common_field(t)?,
                    fields,
                }))
            }
            "MapT" => {
                let t = struct_fields(inner, types::MAP_TYPE)?;
                Ok(WireType::Map(MapType {
                    common: common_field(t)?,
                    key: int_field(t, "Key")?,
                    elem: int_field(t, "Elem")?,
                }))
            }
            other => Err(Error::malformed(format!("unknown wire type variant {}", other))),
        }
    }
}
