use std::collections::{BTreeMap, HashMap};
use lazy_static::lazy_static;
use crate::object::{ArrayType, CommonType, FieldType, SliceType, StructType, WireType};
use crate::types::{self, Type, TypeId};
use crate::{Error, Result, Value};

/// Type and value nesting beyond this depth is rejected.
pub const MAX_NESTING: usize = 512;

/// Longest fixed-size array a definition may declare.
pub const MAX_ARRAY_LEN: i64 = 1 << 24;

/// Values a single segment may create by filling in absent fields.
pub const DEFAULT_MAX_ZERO_FILL: u64 = 1 << 24;

fn meta_struct(id: TypeId, name: &str, fields: &[(&str, TypeId)]) -> Type {
    Type::Compound(WireType::Struct(StructType {
        common: CommonType::new(name, id),
        fields: fields
            .iter()
            .map(|(name, id)| FieldType { name: name.to_string(), id: *id })
            .collect(),
    }))
}

lazy_static! {
    /// Types every session knows before the first segment.
    static ref BUILTINS: HashMap<TypeId, Type> = {
        let mut m = HashMap::new();
        m.insert(types::BOOL, Type::Bool);
        m.insert(types::INT, Type::Int);
        m.insert(types::UINT, Type::Uint);
        m.insert(types::FLOAT, Type::Float);
        m.insert(types::BYTE_SLICE, Type::Bytes);
        m.insert(types::STRING, Type::String);
        m.insert(types::COMPLEX, Type::Complex);
        m.insert(types::INTERFACE, Type::Interface);

        m.insert(types::COMMON_TYPE, meta_struct(types::COMMON_TYPE, "CommonType", &[
            ("Name", types::STRING),
            ("Id", types::INT),
        ]));
        m.insert(types::FIELD_TYPE, meta_struct(types::FIELD_TYPE, "FieldType", &[
            ("Name", types::STRING),
            ("Id", types::INT),
        ]));
        m.insert(types::FIELD_TYPE_SLICE, Type::Compound(WireType::Slice(SliceType {
            common: CommonType::new("[]FieldType", types::FIELD_TYPE_SLICE),
            elem: types::FIELD_TYPE,
        })));
        m.insert(types::ARRAY_TYPE, meta_struct(types::ARRAY_TYPE, "ArrayType", &[
            ("CommonType", types::COMMON_TYPE),
            ("Elem", types::INT),
            ("Len", types::INT),
        ]));
        m.insert(types::SLICE_TYPE, meta_struct(types::SLICE_TYPE, "SliceType", &[
            ("CommonType", types::COMMON_TYPE),
            ("Elem", types::INT),
        ]));
        m.insert(types::STRUCT_TYPE, meta_struct(types::STRUCT_TYPE, "StructType", &[
            ("CommonType", types::COMMON_TYPE),
            ("Field", types::FIELD_TYPE_SLICE),
        ]));
        m.insert(types::MAP_TYPE, meta_struct(types::MAP_TYPE, "MapType", &[
            ("CommonType", types::COMMON_TYPE),
            ("Key", types::INT),
            ("Elem", types::INT),
        ]));
        m.insert(types::WIRE_TYPE, meta_struct(types::WIRE_TYPE, "WireType", &[
            ("ArrayT", types::ARRAY_TYPE),
            ("SliceT", types::SLICE_TYPE),
            ("StructT", types::STRUCT_TYPE),
            ("MapT", types::MAP_TYPE),
        ]));
        m
    };
}

/// Maps type ids to descriptors for one encode or decode session.
///
/// Starts from the built-in table and only ever grows.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<TypeId, Type>,
    next_id: TypeId,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            types: BUILTINS.clone(),
            next_id: types::FIRST_USER_ID,
        }
    }

    pub fn get(&self, id: TypeId) -> Option<&Type> {
        self.types.get(&id)
    }

    /// Like [`get`](Self::get), failing with [`Error::UnknownType`].
    pub fn lookup(&self, id: TypeId) -> Result<&Type> {
        self.types.get(&id).ok_or(Error::UnknownType(id))
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.types.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Session-defined types, ordered by id.
    pub fn user_types(&self) -> BTreeMap<TypeId, &WireType> {
        self.types
            .iter()
            .filter(|(id, _)| !types::is_builtin(**id))
            .filter_map(|(id, t)| t.as_wire().map(|w| (*id, w)))
            .collect()
    }

    /// Records a definition received under `id`.
    ///
    /// Built-in ids can't be redefined. Repeating an identical definition is
    /// a no-op; a different shape under a known id is rejected.
    pub fn register(&mut self, id: TypeId, wire: WireType) -> Result<()> {
        if id <= 0 || types::is_builtin(id) {
            return Err(Error::malformed(format!("cannot define reserved type id {}", id)));
        }
        if let WireType::Array(t) = &wire {
            if t.len > MAX_ARRAY_LEN {
                return Err(Error::malformed(format!("array length {} too large", t.len)));
            }
        }
        if let Some(existing) = self.types.get(&id) {
            return match existing.as_wire() {
                Some(known) if known.same_shape(&wire) => Ok(()),
                _ => Err(Error::malformed(format!("conflicting definition for type id {}", id))),
            };
        }
        let next = id
            .checked_add(1)
            .ok_or_else(|| Error::malformed(format!("type id {} out of range", id)))?;
        self.types.insert(id, Type::Compound(wire));
        if id >= self.next_id {
            self.next_id = next;
        }
        Ok(())
    }

    /// Assigns the next free id to a new compound type built by `build`.
    pub fn allocate<F: FnOnce(TypeId) -> WireType>(&mut self, build: F) -> TypeId {
        let id = self.next_id;
        self.next_id += 1;
        self.types.insert(id, Type::Compound(build(id)));
        id
    }

    /// Finds a session type with the same shape as `wire`.
    pub fn find_shape(&self, wire: &WireType) -> Option<TypeId> {
        self.user_types()
            .into_iter()
            .find(|(_, known)| known.same_shape(wire))
            .map(|(id, _)| id)
    }

    pub fn name_of(&self, id: TypeId) -> Result<String> {
        Ok(self.lookup(id)?.name().to_string())
    }

    /// The zero value of type `id`, used for struct fields absent on the wire.
    ///
    /// Structs come back with no fields, which reads as all of them zero.
    /// Arrays are filled element by element.
    pub fn zero_value(&self, id: TypeId) -> Result<Value> {
        let mut budget = DEFAULT_MAX_ZERO_FILL;
        self.zero_value_within(id, &mut budget)
    }

    /// Like [`zero_value`](Self::zero_value), charging every value created
    /// against `budget` and failing once it runs out.
    pub fn zero_value_within(&self, id: TypeId, budget: &mut u64) -> Result<Value> {
        self.zero_value_at(id, 0, budget)
    }

    fn zero_value_at(&self, id: TypeId, depth: usize, budget: &mut u64) -> Result<Value> {
        if depth > MAX_NESTING {
            return Err(Error::malformed(format!("type {} nests too deeply", id)));
        }
        charge(budget, 1)?;
        let value = match self.lookup(id)? {
            Type::Bool => Value::Bool(false),
            Type::Int => Value::Int(0),
            Type::Uint => Value::Uint(0),
            Type::Float => Value::Float(0.0),
            Type::Bytes => Value::Bytes(Vec::new()),
            Type::String => Value::String(String::new()),
            Type::Complex => Value::Complex(0.0, 0.0),
            Type::Interface => {
                return Err(Error::unsupported("interface values have no zero value"));
            }
            Type::Compound(WireType::Array(ArrayType { elem, len, .. })) => {
                if *len == 0 {
                    return Ok(Value::Array(id, Vec::new()));
                }
                let before = *budget;
                let zero = self.zero_value_at(*elem, depth + 1, budget)?;
                let each = before - *budget;
                let rest = each.checked_mul(*len as u64 - 1).unwrap_or(u64::MAX);
                charge(budget, rest)?;
                Value::Array(id, vec![zero; *len as usize])
            }
            Type::Compound(WireType::Slice(_)) => Value::Array(id, Vec::new()),
            Type::Compound(WireType::Map(_)) => Value::Map(id, BTreeMap::new()),
            Type::Compound(WireType::Struct(_)) => Value::Struct(id, BTreeMap::new()),
        };
        Ok(value)
    }
}

fn charge(budget: &mut u64, n: u64) -> Result<()> {
    *budget = budget
        .checked_sub(n)
        .ok_or_else(|| Error::malformed("zero-filled fields exceed the size limit"))?;
    Ok(())
}
