use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use crate::encode::Encoder;
use crate::object::{ArrayType, CommonType, FieldType, MapType, SliceType, StructType, WireType};
use crate::registry::{TypeRegistry, MAX_ARRAY_LEN, MAX_NESTING};
use crate::types::{self, Type, TypeId};
use crate::{Error, Result, Value};

/// Encoding side of a gob stream.
///
/// Compound types are defined on the writer first; the first value of each
/// such type is preceded by its definition segment, later values are not.
#[derive(Debug, Clone, Default)]
pub struct GobWriter {
    registry: TypeRegistry,
    dumped_types: HashSet<TypeId>,
}

impl GobWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Whether the definition of `id` has already gone out on this stream.
    pub fn is_sent(&self, id: TypeId) -> bool {
        self.dumped_types.contains(&id)
    }

    /// Forgets which definitions were sent, as for a new connection.
    /// Defined types stay registered.
    pub fn reset(&mut self) {
        self.dumped_types.clear();
    }

    /// Defines a struct type. Field order is the wire order.
    pub fn define_struct(&mut self, name: &str, fields: &[(&str, TypeId)]) -> Result<TypeId> {
        if name.is_empty() {
            return Err(Error::unsupported("struct types need a name"));
        }
        let mut seen = HashSet::new();
        for (field, id) in fields {
            if field.is_empty() || !seen.insert(*field) {
                return Err(Error::unsupported(format!(
                    "struct {} has an empty or duplicate field name {:?}",
                    name, field
                )));
            }
            self.registry.lookup(*id)?;
        }

        let fields = fields
            .iter()
            .map(|(name, id)| FieldType { name: name.to_string(), id: *id })
            .collect();
        Ok(self.registry.allocate(|id| {
            WireType::Struct(StructType {
                common: CommonType::new(name, id),
                fields,
            })
        }))
    }

    pub fn define_slice(&mut self, elem: TypeId) -> Result<TypeId> {
        let name = format!("[]{}", self.registry.name_of(elem)?);
        Ok(self.define_unnamed(name, |common| WireType::Slice(SliceType { common, elem })))
    }

    pub fn define_array(&mut self, elem: TypeId, len: usize) -> Result<TypeId> {
        let len = i64::try_from(len)
            .ok()
            .filter(|len| *len <= MAX_ARRAY_LEN)
            .ok_or_else(|| Error::unsupported(format!("array length {} too large", len)))?;
        let name = format!("[{}]{}", len, self.registry.name_of(elem)?);
        Ok(self.define_unnamed(name, |common| WireType::Array(ArrayType { common, elem, len })))
    }

    pub fn define_map(&mut self, key: TypeId, elem: TypeId) -> Result<TypeId> {
        let name = format!(
            "map[{}]{}",
            self.registry.name_of(key)?,
            self.registry.name_of(elem)?
        );
        Ok(self.define_unnamed(name, |common| WireType::Map(MapType { common, key, elem })))
    }

    // Unnamed types are identified by shape.
    fn define_unnamed<F: Fn(CommonType) -> WireType>(&mut self, name: String, build: F) -> TypeId {
        let probe = build(CommonType::new(name.as_str(), 0));
        if let Some(id) = self.registry.find_shape(&probe) {
            return id;
        }
        self.registry.allocate(|id| build(CommonType::new(name, id)))
    }

    /// Encodes `value` as one value segment, preceded by definition segments
    /// for any compound types the peer hasn't seen yet.
    pub fn encode(&mut self, value: &Value) -> Result<Vec<u8>> {
        let id = value.type_id();
        if !self.registry.contains(id) {
            return Err(Error::unsupported(format!("no type descriptor for id {}", id)));
        }

        // Validate the value before marking any definition as sent.
        let body = self.segment(id, id, value)?;

        let mut out = Vec::new();
        let mut newly_sent = Vec::new();
        if let Err(err) = self.send_type(id, &mut out, &mut newly_sent) {
            for id in newly_sent {
                self.dumped_types.remove(&id);
            }
            return Err(err);
        }
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Encodes several values back to back on this stream.
    pub fn encode_all<'a, I: IntoIterator<Item = &'a Value>>(&mut self, values: I) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for value in values {
            out.extend(self.encode(value)?);
        }
        Ok(out)
    }

    fn send_type(&mut self, id: TypeId, out: &mut Vec<u8>, newly_sent: &mut Vec<TypeId>) -> Result<()> {
        if types::is_builtin(id) || self.dumped_types.contains(&id) {
            return Ok(());
        }
        let wire = self
            .registry
            .lookup(id)?
            .as_wire()
            .cloned()
            .ok_or_else(|| Error::unsupported(format!("type {} has no wire definition", id)))?;

        // Marked first so self-referential types terminate.
        self.dumped_types.insert(id);
        newly_sent.push(id);
        for dep in wire.dependencies() {
            self.send_type(dep, out, newly_sent)?;
        }

        log::debug!("sending definition of type {} ({})", id, wire.common().name);
        out.extend(self.segment(-id, types::WIRE_TYPE, &wire.to_value())?);
        Ok(())
    }

    /// One length-prefixed segment: header id, singleton delta for
    /// non-struct types, then the value of type `id`.
    fn segment(&self, header: TypeId, id: TypeId, value: &Value) -> Result<Vec<u8>> {
        let mut body = Encoder::new(Vec::new());
        body.write_int(header)?;
        if !self.registry.lookup(id)?.is_struct() {
            body.write_uint(0)?;
        }
        encode_value(&self.registry, &mut body, id, value, 0)?;
        let body = body.into_inner();

        log::trace!("segment: type {} with {} byte body", header, body.len());
        let mut seg = Encoder::new(Vec::with_capacity(body.len() + 9));
        seg.write_uint(body.len() as u64)?;
        seg.write_all(&body)?;
        Ok(seg.into_inner())
    }
}

/// Encodes the payload of `value` as type `id`. Struct payloads use field
/// deltas and skip zero fields; arrays, slices and maps are a count followed
/// by their elements.
pub(crate) fn encode_value<W: Write>(
    registry: &TypeRegistry,
    enc: &mut Encoder<W>,
    id: TypeId,
    value: &Value,
    depth: usize,
) -> Result<()> {
    if depth > MAX_NESTING {
        return Err(Error::unsupported("value nests too deeply"));
    }
    let ty = registry.lookup(id)?;
    match (ty, value) {
        (Type::Bool, Value::Bool(b)) => enc.write_bool(*b),
        (Type::Int, Value::Int(i)) => enc.write_int(*i),
        (Type::Uint, Value::Uint(u)) => enc.write_uint(*u),
        (Type::Float, Value::Float(f)) => enc.write_float(*f),
        (Type::Bytes, Value::Bytes(b)) => enc.write_bytes(b),
        (Type::String, Value::String(s)) => enc.write_string(s),
        (Type::Complex, Value::Complex(re, im)) => enc.write_complex(*re, *im),
        (Type::Interface, _) => Err(Error::unsupported("interface values cannot be encoded")),
        (Type::Compound(WireType::Array(t)), Value::Array(vid, items)) if *vid == id => {
            if items.len() as i64 != t.len {
                return Err(Error::unsupported(format!(
                    "array of type {} holds {} elements, not {}",
                    t.common.name,
                    items.len(),
                    t.len
                )));
            }
            encode_items(registry, enc, t.elem, items, depth)
        }
        (Type::Compound(WireType::Slice(t)), Value::Array(vid, items)) if *vid == id => {
            encode_items(registry, enc, t.elem, items, depth)
        }
        (Type::Compound(WireType::Map(t)), Value::Map(vid, entries)) if *vid == id => {
            enc.write_uint(entries.len() as u64)?;
            for (k, v) in entries {
                encode_value(registry, enc, t.key, k, depth + 1)?;
                encode_value(registry, enc, t.elem, v, depth + 1)?;
            }
            Ok(())
        }
        (Type::Compound(WireType::Struct(t)), Value::Struct(vid, fields)) if *vid == id => {
            encode_struct(registry, enc, t, fields, depth)
        }
        _ => Err(Error::unsupported(format!(
            "{:?} does not match type {} ({})",
            value,
            id,
            ty.name()
        ))),
    }
}

fn encode_items<W: Write>(
    registry: &TypeRegistry,
    enc: &mut Encoder<W>,
    elem: TypeId,
    items: &[Value],
    depth: usize,
) -> Result<()> {
    enc.write_uint(items.len() as u64)?;
    for item in items {
        encode_value(registry, enc, elem, item, depth + 1)?;
    }
    Ok(())
}

fn encode_struct<W: Write>(
    registry: &TypeRegistry,
    enc: &mut Encoder<W>,
    t: &StructType,
    fields: &BTreeMap<String, Value>,
    depth: usize,
) -> Result<()> {
    if let Some(unknown) = fields.keys().find(|k| !t.fields.iter().any(|f| &f.name == *k)) {
        return Err(Error::unsupported(format!(
            "struct {} has no field {}",
            t.common.name, unknown
        )));
    }

    let mut last_field_num = 0;
    for (index, field) in t.fields.iter().enumerate() {
        let Some(value) = fields.get(&field.name) else {
            continue;
        };
        if is_zero_as(registry, field.id, value, depth + 1) {
            continue;
        }
        let field_num = index as u64 + 1;
        enc.write_uint(field_num - last_field_num)?;
        last_field_num = field_num;
        encode_value(registry, enc, field.id, value, depth + 1)?;
    }

    // End of struct marked by delta 0
    enc.write_uint(0)
}

/// Whether `value` is the zero of type `id`. Slices and maps are zero only
/// when empty; arrays and structs when every member is zero.
fn is_zero_as(registry: &TypeRegistry, id: TypeId, value: &Value, depth: usize) -> bool {
    if depth > MAX_NESTING {
        return false;
    }
    match (registry.get(id), value) {
        (Some(Type::Compound(WireType::Array(t))), Value::Array(_, items)) => {
            items.iter().all(|item| is_zero_as(registry, t.elem, item, depth + 1))
        }
        (Some(Type::Compound(WireType::Struct(t))), Value::Struct(_, fields)) => {
            fields.iter().all(|(name, v)| match t.fields.iter().find(|f| &f.name == name) {
                Some(f) => is_zero_as(registry, f.id, v, depth + 1),
                None => false,
            })
        }
        _ => value.is_zero(),
    }
}
