use std::collections::BTreeMap;
use std::cmp::Ordering;
use serde::{Serialize, Deserialize};
use crate::types::{self, TypeId};
use crate::Error;

/// A decoded (or to-be-encoded) gob value.
///
/// Compound values carry the id of the type that describes them; the
/// descriptor itself lives in the session's registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    #[serde(with = "serde_bytes")]
    Bytes(Vec<u8>),
    String(String),
    Complex(f64, f64),
    /// Array or slice, depending on the referenced type.
    Array(TypeId, Vec<Value>),
    Map(TypeId, BTreeMap<Value, Value>),
    /// Field name to value. Absent fields are zero, so `{B: 5}` and
    /// `{A: 0, B: 5}` compare equal.
    Struct(TypeId, BTreeMap<String, Value>),
}

impl Value {
    /// Builds a struct value of type `id` from `(name, value)` pairs.
    pub fn new_struct<K, I>(id: TypeId, fields: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Struct(id, fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// The id of the type this value is framed with.
    pub fn type_id(&self) -> TypeId {
        match self {
            Value::Bool(_) => types::BOOL,
            Value::Int(_) => types::INT,
            Value::Uint(_) => types::UINT,
            Value::Float(_) => types::FLOAT,
            Value::Bytes(_) => types::BYTE_SLICE,
            Value::String(_) => types::STRING,
            Value::Complex(..) => types::COMPLEX,
            Value::Array(id, _) | Value::Map(id, _) | Value::Struct(id, _) => *id,
        }
    }

    /// Whether this is the zero value of its type.
    ///
    /// Without the registry an array can't be told apart from a slice, so
    /// only empty ones count as zero here.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Bool(b) => !*b,
            Value::Int(i) => *i == 0,
            Value::Uint(u) => *u == 0,
            Value::Float(f) => *f == 0.0,
            Value::Bytes(b) => b.is_empty(),
            Value::String(s) => s.is_empty(),
            Value::Complex(re, im) => *re == 0.0 && *im == 0.0,
            Value::Array(_, items) => items.is_empty(),
            Value::Map(_, m) => m.is_empty(),
            Value::Struct(_, fields) => fields.values().all(Value::is_zero),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(_, fields) => fields.get(name),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::Array(_, items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::Uint(u)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl TryFrom<Value> for String {
    type Error = Error;
    fn try_from(v: Value) -> std::result::Result<Self, Self::Error> {
        match v {
            Value::String(s) => Ok(s),
            _ => Err(Error::unsupported(format!("expected string, got {:?}", v))),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = Error;
    fn try_from(v: Value) -> std::result::Result<Self, Self::Error> {
        match v {
            Value::Int(i) => Ok(i),
            _ => Err(Error::unsupported(format!("expected int, got {:?}", v))),
        }
    }
}

impl TryFrom<Value> for u64 {
    type Error = Error;
    fn try_from(v: Value) -> std::result::Result<Self, Self::Error> {
        match v {
            Value::Uint(u) => Ok(u),
            _ => Err(Error::unsupported(format!("expected uint, got {:?}", v))),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = Error;
    fn try_from(v: Value) -> std::result::Result<Self, Self::Error> {
        match v {
            Value::Float(f) => Ok(f),
            _ => Err(Error::unsupported(format!("expected float, got {:?}", v))),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = Error;
    fn try_from(v: Value) -> std::result::Result<Self, Self::Error> {
        match v {
            Value::Bool(b) => Ok(b),
            _ => Err(Error::unsupported(format!("expected bool, got {:?}", v))),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        // Total order so values can key a BTreeMap: variant first, then
        // content. Floats compare by bit pattern.
        use Value::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Bool(_), _) => Ordering::Less,
            (_, Bool(_)) => Ordering::Greater,

            (Int(a), Int(b)) => a.cmp(b),
            (Int(_), _) => Ordering::Less,
            (_, Int(_)) => Ordering::Greater,

            (Uint(a), Uint(b)) => a.cmp(b),
            (Uint(_), _) => Ordering::Less,
            (_, Uint(_)) => Ordering::Greater,

            (Float(a), Float(b)) => a.to_bits().cmp(&b.to_bits()),
            (Float(_), _) => Ordering::Less,
            (_, Float(_)) => Ordering::Greater,

            (Bytes(a), Bytes(b)) => a.cmp(b),
            (Bytes(_), _) => Ordering::Less,
            (_, Bytes(_)) => Ordering::Greater,

            (String(a), String(b)) => a.cmp(b),
            (String(_), _) => Ordering::Less,
            (_, String(_)) => Ordering::Greater,

            (Complex(r1, i1), Complex(r2, i2)) => (r1.to_bits(), i1.to_bits()).cmp(&(r2.to_bits(), i2.to_bits())),
            (Complex(..), _) => Ordering::Less,
            (_, Complex(..)) => Ordering::Greater,

            (Array(t1, a), Array(t2, b)) => t1.cmp(t2).then_with(|| a.cmp(b)),
            (Array(..), _) => Ordering::Less,
            (_, Array(..)) => Ordering::Greater,

            (Map(t1, a), Map(t2, b)) => t1.cmp(t2).then_with(|| a.cmp(b)),
            (Map(..), _) => Ordering::Less,
            (_, Map(..)) => Ordering::Greater,

            (Struct(t1, f1), Struct(t2, f2)) => {
                t1.cmp(t2).then_with(|| non_zero_fields(f1).cmp(non_zero_fields(f2)))
            }
        }
    }
}

// Zero fields are the same as absent ones.
fn non_zero_fields(fields: &BTreeMap<String, Value>) -> impl Iterator<Item = (&String, &Value)> {
    fields.iter().filter(|(_, v)| !v.is_zero())
}
