use std::fmt;
use serde::{Deserialize, Serialize};
use crate::object::WireType;

/// Identifies a type on the wire. Negative ids in a segment header announce
/// a definition of the type with the absolute id.
pub type TypeId = i64;

/*
bool        1
int         2
uint        3
float       4
[]byte      5
string      6
complex     7
interface   8
// gap for reserved ids.
WireType    16
ArrayType   17
CommonType  18
SliceType   19
StructType  20
FieldType   21
// 22 is slice of fieldType.
MapType     23
*/
pub const BOOL: TypeId = 1;
pub const INT: TypeId = 2;
pub const UINT: TypeId = 3;
pub const FLOAT: TypeId = 4;
pub const BYTE_SLICE: TypeId = 5;
pub const STRING: TypeId = 6;
pub const COMPLEX: TypeId = 7;
pub const INTERFACE: TypeId = 8;

pub const WIRE_TYPE: TypeId = 16;
pub const ARRAY_TYPE: TypeId = 17;
pub const COMMON_TYPE: TypeId = 18;
pub const SLICE_TYPE: TypeId = 19;
pub const STRUCT_TYPE: TypeId = 20;
pub const FIELD_TYPE: TypeId = 21;
pub const FIELD_TYPE_SLICE: TypeId = 22;
pub const MAP_TYPE: TypeId = 23;

/// Highest id reserved for built-in and meta types.
pub const LAST_BUILTIN: TypeId = MAP_TYPE;

/// First id handed out to types defined during a session.
pub const FIRST_USER_ID: TypeId = 65;

pub fn is_builtin(id: TypeId) -> bool {
    (1..=LAST_BUILTIN).contains(&id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    Bool,
    Int,
    Uint,
    Float,
    ByteSlice,
    String,
    Complex,
    Interface,
    Array,
    Slice,
    Struct,
    Map,
}

/// In-memory descriptor of a wire type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Bool,
    Int,
    Uint,
    Float, // float64
    Bytes,
    String,
    Complex, // complex128
    Interface,
    Compound(WireType),
}

impl Type {
    pub fn kind(&self) -> Kind {
        match self {
            Type::Bool => Kind::Bool,
            Type::Int => Kind::Int,
            Type::Uint => Kind::Uint,
            Type::Float => Kind::Float,
            Type::Bytes => Kind::ByteSlice,
            Type::String => Kind::String,
            Type::Complex => Kind::Complex,
            Type::Interface => Kind::Interface,
            Type::Compound(WireType::Array(_)) => Kind::Array,
            Type::Compound(WireType::Slice(_)) => Kind::Slice,
            Type::Compound(WireType::Struct(_)) => Kind::Struct,
            Type::Compound(WireType::Map(_)) => Kind::Map,
        }
    }

    /// Name carried on the wire for this type.
    pub fn name(&self) -> &str {
        match self {
            Type::Bool => "bool",
            Type::Int => "int",
            Type::Uint => "uint",
            Type::Float => "float",
            Type::Bytes => "bytes",
            Type::String => "string",
            Type::Complex => "complex",
            Type::Interface => "interface",
            Type::Compound(wire) => &wire.common().name,
        }
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Type::Compound(WireType::Struct(_)))
    }

    pub fn as_wire(&self) -> Option<&WireType> {
        match self {
            Type::Compound(wire) => Some(wire),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}
