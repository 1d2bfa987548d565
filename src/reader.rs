use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::iter::FusedIterator;
use crate::config::ReaderConfig;
use crate::decode::Decoder;
use crate::object::{StructType, WireType};
use crate::registry::{TypeRegistry, MAX_NESTING};
use crate::types::{self, Type, TypeId};
use crate::{Error, Result, Value};

/// Decoding side of a gob stream.
///
/// Definition segments are registered as they arrive and are never
/// returned; each call hands back the next value.
#[derive(Debug, Clone, Default)]
pub struct GobReader {
    registry: TypeRegistry,
    config: ReaderConfig,
}

impl GobReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ReaderConfig) -> Self {
        Self {
            registry: TypeRegistry::new(),
            config,
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Decodes exactly one value; anything after it is [`Error::TrailingData`].
    pub fn decode(&mut self, buf: &[u8]) -> Result<Value> {
        let (value, rest) = self.decode_partial(buf)?;
        if !rest.is_empty() {
            return Err(Error::TrailingData(rest.len()));
        }
        Ok(value)
    }

    /// Decodes the next value and returns it with the unread remainder.
    pub fn decode_partial<'a>(&mut self, buf: &'a [u8]) -> Result<(Value, &'a [u8])> {
        if buf.is_empty() {
            return Err(Error::malformed("no segment in buffer"));
        }
        let mut rest = buf;
        loop {
            if rest.is_empty() {
                // Only definitions, no value to go with them.
                return Err(Error::TrailingData(buf.len()));
            }
            let (segment, tail) = self.read_segment(rest)?;
            rest = tail;
            if let Some(value) = self.load_segment(segment)? {
                return Ok((value, rest));
            }
        }
    }

    /// Lazily decodes values until `buf` is exhausted. The iterator stops
    /// after the first error.
    pub fn decode_all<'r, 'a>(&'r mut self, buf: &'a [u8]) -> DecodeAll<'r, 'a> {
        DecodeAll {
            reader: self,
            rest: buf,
            failed: false,
        }
    }

    fn read_segment<'a>(&self, buf: &'a [u8]) -> Result<(&'a [u8], &'a [u8])> {
        let mut dec = Decoder::new(Cursor::new(buf));
        let len = dec.read_uint()?;
        if len > self.config.max_segment_len as u64 {
            return Err(Error::malformed(format!(
                "segment of {} bytes exceeds limit of {}",
                len, self.config.max_segment_len
            )));
        }
        let len = len as usize;
        if len > dec.remaining() {
            return Err(Error::malformed(format!(
                "segment declares {} bytes, only {} remain",
                len,
                dec.remaining()
            )));
        }
        let start = dec.position();
        Ok((&buf[start..start + len], &buf[start + len..]))
    }

    /// Registers a definition (returning `None`) or decodes a value.
    fn load_segment(&mut self, segment: &[u8]) -> Result<Option<Value>> {
        let mut dec = Decoder::new(Cursor::new(segment));
        let id = dec.read_int()?;
        log::trace!("segment: type {} with {} byte body", id, segment.len());

        if id < 0 {
            let mut fill = self.config.max_zero_fill;
            let value = decode_value(&self.registry, &mut dec, types::WIRE_TYPE, 0, &mut fill)?;
            expect_consumed(&dec)?;
            let wire = WireType::try_from(&value)?;
            let id = id
                .checked_neg()
                .ok_or_else(|| Error::malformed(format!("invalid type id {}", id)))?;
            if wire.common().id != id {
                log::warn!(
                    "definition of type {} carries id {} in its common type",
                    id,
                    wire.common().id
                );
            }
            log::debug!("registered type {} ({})", id, wire.common().name);
            self.registry.register(id, wire)?;
            return Ok(None);
        }
        if id == 0 {
            return Err(Error::malformed("segment with type id 0"));
        }

        // Top-level non-struct values are sent as field 0 of an implicit
        // struct: one zero delta precedes them.
        if !self.registry.lookup(id)?.is_struct() {
            let delta = dec.read_uint()?;
            if delta != 0 {
                return Err(Error::malformed(format!("illegal delta {} for singleton", delta)));
            }
        }
        let mut fill = self.config.max_zero_fill;
        let value = decode_value(&self.registry, &mut dec, id, 0, &mut fill)?;
        expect_consumed(&dec)?;
        Ok(Some(value))
    }
}

fn expect_consumed(dec: &Decoder<Cursor<&[u8]>>) -> Result<()> {
    match dec.remaining() {
        0 => Ok(()),
        n => Err(Error::malformed(format!("{} trailing bytes in segment", n))),
    }
}

/// Iterator returned by [`GobReader::decode_all`].
pub struct DecodeAll<'r, 'a> {
    reader: &'r mut GobReader,
    rest: &'a [u8],
    failed: bool,
}

impl<'r, 'a> DecodeAll<'r, 'a> {
    /// Bytes not consumed yet.
    pub fn remaining(&self) -> &'a [u8] {
        self.rest
    }
}

impl Iterator for DecodeAll<'_, '_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.rest.is_empty() {
            return None;
        }
        match self.reader.decode_partial(self.rest) {
            Ok((value, rest)) => {
                self.rest = rest;
                Some(Ok(value))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for DecodeAll<'_, '_> {}

/// Decodes a payload of type `id`, mirroring `writer::encode_value`.
/// Absent struct fields are filled in at the expense of `fill`.
pub(crate) fn decode_value<R: Read>(
    registry: &TypeRegistry,
    dec: &mut Decoder<R>,
    id: TypeId,
    depth: usize,
    fill: &mut u64,
) -> Result<Value> {
    if depth > MAX_NESTING {
        return Err(Error::malformed("value nests too deeply"));
    }
    let value = match registry.lookup(id)? {
        Type::Bool => Value::Bool(dec.read_bool()?),
        Type::Int => Value::Int(dec.read_int()?),
        Type::Uint => Value::Uint(dec.read_uint()?),
        Type::Float => Value::Float(dec.read_float()?),
        Type::Bytes => Value::Bytes(dec.read_bytes()?),
        Type::String => Value::String(dec.read_string()?),
        Type::Complex => {
            let (re, im) = dec.read_complex()?;
            Value::Complex(re, im)
        }
        Type::Interface => {
            return Err(Error::unsupported("interface values cannot be decoded"));
        }
        Type::Compound(WireType::Array(t)) => {
            let count = dec.read_uint()?;
            if count != t.len as u64 {
                return Err(Error::malformed(format!(
                    "array of type {} has {} elements, expected {}",
                    t.common.name, count, t.len
                )));
            }
            Value::Array(id, decode_items(registry, dec, t.elem, count, depth, fill)?)
        }
        Type::Compound(WireType::Slice(t)) => {
            let count = dec.read_uint()?;
            Value::Array(id, decode_items(registry, dec, t.elem, count, depth, fill)?)
        }
        Type::Compound(WireType::Map(t)) => {
            let count = dec.read_uint()?;
            let mut entries = BTreeMap::new();
            for _ in 0..count {
                let key = decode_value(registry, dec, t.key, depth + 1, fill)?;
                let elem = decode_value(registry, dec, t.elem, depth + 1, fill)?;
                entries.insert(key, elem);
            }
            Value::Map(id, entries)
        }
        Type::Compound(WireType::Struct(t)) => {
            Value::Struct(id, decode_struct(registry, dec, t, depth, fill)?)
        }
    };
    Ok(value)
}

fn decode_items<R: Read>(
    registry: &TypeRegistry,
    dec: &mut Decoder<R>,
    elem: TypeId,
    count: u64,
    depth: usize,
    fill: &mut u64,
) -> Result<Vec<Value>> {
    // Every element takes at least one byte, so a bogus count runs out of
    // input instead of memory.
    let mut items = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        items.push(decode_value(registry, dec, elem, depth + 1, fill)?);
    }
    Ok(items)
}

fn decode_struct<R: Read>(
    registry: &TypeRegistry,
    dec: &mut Decoder<R>,
    t: &StructType,
    depth: usize,
    fill: &mut u64,
) -> Result<BTreeMap<String, Value>> {
    let mut fields = BTreeMap::new();
    let mut field_num = 0u64;
    loop {
        let delta = dec.read_uint()?;
        if delta == 0 {
            break;
        }
        field_num = match field_num.checked_add(delta) {
            Some(n) if n <= t.fields.len() as u64 => n,
            _ => {
                return Err(Error::malformed(format!(
                    "field delta {} past the {} fields of struct {}",
                    delta,
                    t.fields.len(),
                    t.common.name
                )));
            }
        };
        let field = &t.fields[field_num as usize - 1];
        let value = decode_value(registry, dec, field.id, depth + 1, fill)?;
        fields.insert(field.name.clone(), value);
    }

    for field in &t.fields {
        if fields.contains_key(&field.name) || matches!(registry.lookup(field.id)?, Type::Interface) {
            continue;
        }
        fields.insert(field.name.clone(), registry.zero_value_within(field.id, fill)?);
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::Encoder;
    use crate::object::{ArrayType, CommonType, FieldType, SliceType};
    use crate::writer::encode_value;

    fn segment(registry: &TypeRegistry, header: TypeId, id: TypeId, value: &Value) -> Vec<u8> {
        let mut body = Encoder::new(Vec::new());
        body.write_int(header).unwrap();
        if !registry.lookup(id).unwrap().is_struct() {
            body.write_uint(0).unwrap();
        }
        encode_value(registry, &mut body, id, value, 0).unwrap();
        let body = body.into_inner();
        let mut seg = Encoder::new(Vec::new());
        seg.write_uint(body.len() as u64).unwrap();
        seg.write_all(&body).unwrap();
        seg.into_inner()
    }

    const POINT_STREAM: &[u8] = &[
        0x1f, 0xff, 0x81, 0x03, 0x01, 0x01, 0x05, b'P', b'o', b'i', b'n', b't', 0x01, 0xff, 0x82,
        0x00, 0x01, 0x02, 0x01, 0x01, b'X', 0x01, 0x04, 0x00, 0x01, 0x01, b'Y', 0x01, 0x04, 0x00,
        0x00, 0x00, // definition
        0x07, 0xff, 0x82, 0x01, 0x2c, 0x01, 0x42, 0x00, // value
    ];

    fn expect_malformed(result: Result<Value>) {
        match result {
            Err(Error::MalformedInput(_)) => {}
            other => panic!("expected malformed input, got {:?}", other),
        }
    }

    #[test]
    fn decodes_reference_point() {
        let mut reader = GobReader::new();
        let value = reader.decode(POINT_STREAM).unwrap();
        assert_eq!(
            value,
            Value::new_struct(65, [("X", Value::Int(22)), ("Y", Value::Int(33))])
        );
        assert_eq!(reader.registry().name_of(65).unwrap(), "Point");
    }

    #[test]
    fn absent_fields_decode_as_zero() {
        let mut reader = GobReader::new();
        reader.decode_partial(POINT_STREAM).unwrap();
        // Only Y is present.
        let value = reader.decode(&[0x05, 0xff, 0x82, 0x02, 0x0a, 0x00]).unwrap();
        assert_eq!(value, Value::new_struct(65, [("X", Value::Int(0)), ("Y", Value::Int(5))]));
    }

    #[test]
    fn decodes_singletons() {
        let mut reader = GobReader::new();
        assert_eq!(reader.decode(&[0x03, 0x06, 0x00, 0x07]).unwrap(), Value::Uint(7));
        assert_eq!(reader.decode(&[0x03, 0x04, 0x00, 0x01]).unwrap(), Value::Int(-1));
        assert_eq!(reader.decode(&[0x03, 0x02, 0x00, 0x01]).unwrap(), Value::Bool(true));
        assert_eq!(reader.decode(&[0x05, 0x08, 0x00, 0xfe, 0x31, 0x40]).unwrap(), Value::Float(17.0));
    }

    #[test]
    fn unknown_type() {
        let mut reader = GobReader::new();
        let err = reader.decode(&[0x05, 0xff, 0x82, 0x01, 0x02, 0x00]).unwrap_err();
        assert!(matches!(err, Error::UnknownType(65)), "{:?}", err);
    }

    #[test]
    fn singleton_delta_must_be_zero() {
        expect_malformed(GobReader::new().decode(&[0x03, 0x06, 0x01, 0x07]));
    }

    #[test]
    fn segment_length_is_authoritative() {
        // One byte too many inside the segment.
        expect_malformed(GobReader::new().decode(&[0x04, 0x06, 0x00, 0x07, 0x07]));
        // Declared length runs past the buffer.
        expect_malformed(GobReader::new().decode(&[0x05, 0x06, 0x00, 0x07]));
        // Payload needs more bytes than the segment has.
        expect_malformed(GobReader::new().decode(&[0x03, 0x06, 0x00, 0xfe, 0x01, 0x00]));
    }

    #[test]
    fn field_index_past_struct() {
        let mut reader = GobReader::new();
        reader.decode_partial(POINT_STREAM).unwrap();
        expect_malformed(reader.decode(&[0x05, 0xff, 0x82, 0x03, 0x02, 0x00]));
    }

    #[test]
    fn type_id_zero() {
        expect_malformed(GobReader::new().decode(&[0x02, 0x00, 0x00]));
    }

    #[test]
    fn empty_and_trailing_buffers() {
        let mut reader = GobReader::new();
        expect_malformed(reader.decode(&[]));

        let err = reader.decode(&[0x03, 0x06, 0x00, 0x07, 0x03]).unwrap_err();
        assert!(matches!(err, Error::TrailingData(1)), "{:?}", err);

        // A definition with no value after it.
        let mut reader = GobReader::new();
        let err = reader.decode(&POINT_STREAM[..32]).unwrap_err();
        assert!(matches!(err, Error::TrailingData(32)), "{:?}", err);
    }

    #[test]
    fn decode_all_reads_every_value() {
        let mut stream = POINT_STREAM.to_vec();
        stream.extend_from_slice(&[0x03, 0x06, 0x00, 0x07]);
        stream.extend_from_slice(&[0x05, 0xff, 0x82, 0x01, 0x02, 0x00]);

        let mut reader = GobReader::new();
        let values = reader.decode_all(&stream).collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[1], Value::Uint(7));
        assert_eq!(values[2].field("X"), Some(&Value::Int(1)));
    }

    #[test]
    fn decode_all_stops_after_error() {
        let stream = [0x03, 0x06, 0x00, 0x07, 0x03, 0x06, 0x01];
        let mut reader = GobReader::new();
        let mut iter = reader.decode_all(&stream);
        assert_eq!(iter.next().unwrap().unwrap(), Value::Uint(7));
        assert!(matches!(iter.next(), Some(Err(Error::MalformedInput(_)))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn segment_limit() {
        let config = ReaderConfig::default().with_max_segment_len(2);
        let mut reader = GobReader::with_config(config);
        expect_malformed(reader.decode(&[0x03, 0x06, 0x00, 0x07]));
    }

    #[test]
    fn interface_values_are_rejected() {
        let err = GobReader::new().decode(&[0x03, 0x10, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedValue(_)), "{:?}", err);
    }

    #[test]
    fn self_referential_definitions() {
        // type Node struct { Name string; Kids []Node }, sent outer type first.
        let node = WireType::Struct(StructType {
            common: CommonType::new("Node", 65),
            fields: vec![
                FieldType { name: "Name".into(), id: types::STRING },
                FieldType { name: "Kids".into(), id: 66 },
            ],
        });
        let kids = WireType::Slice(SliceType { common: CommonType::new("[]Node", 66), elem: 65 });

        let mut registry = TypeRegistry::new();
        registry.register(65, node.clone()).unwrap();
        registry.register(66, kids.clone()).unwrap();

        let leaf = Value::new_struct(65, [("Name", Value::from("b")), ("Kids", Value::Array(66, vec![]))]);
        let root = Value::new_struct(65, [("Name", Value::from("a")), ("Kids", Value::Array(66, vec![leaf]))]);

        let mut stream = segment(&registry, -65, types::WIRE_TYPE, &node.to_value());
        stream.extend(segment(&registry, -66, types::WIRE_TYPE, &kids.to_value()));
        stream.extend(segment(&registry, 65, 65, &root));

        assert_eq!(GobReader::new().decode(&stream).unwrap(), root);
    }

    #[test]
    fn directly_self_referential_struct() {
        // type Node struct { V int; Next *Node }
        let node = WireType::Struct(StructType {
            common: CommonType::new("Node", 65),
            fields: vec![
                FieldType { name: "V".into(), id: types::INT },
                FieldType { name: "Next".into(), id: 65 },
            ],
        });
        let mut registry = TypeRegistry::new();
        registry.register(65, node.clone()).unwrap();

        let mut stream = segment(&registry, -65, types::WIRE_TYPE, &node.to_value());
        stream.extend_from_slice(&[0x05, 0xff, 0x82, 0x01, 0x02, 0x00]);
        let mut reader = GobReader::new();
        // Next left out: filled with an empty Node.
        let value = reader.decode(&stream).unwrap();
        assert_eq!(value.field("Next"), Some(&Value::Struct(65, BTreeMap::new())));
        assert_eq!(value, Value::new_struct(65, [("V", Value::Int(1))]));

        let chain = Value::new_struct(65, [
            ("V", Value::Int(1)),
            ("Next", Value::new_struct(65, [("V", Value::Int(2))])),
        ]);
        assert_eq!(reader.decode(&segment(&registry, 65, 65, &chain)).unwrap(), chain);
    }

    #[test]
    fn zero_fill_is_limited_per_segment() {
        let array = |id: TypeId, elem: TypeId| WireType::Array(ArrayType {
            common: CommonType::new("[64]x", id),
            elem,
            len: 64,
        });
        let wires = [
            (65, array(65, types::INT)),
            (66, array(66, 65)),
            (67, WireType::Struct(StructType {
                common: CommonType::new("S", 67),
                fields: vec![FieldType { name: "A".into(), id: 66 }],
            })),
            (68, WireType::Slice(SliceType { common: CommonType::new("[]S", 68), elem: 67 })),
        ];
        let mut registry = TypeRegistry::new();
        let mut defs = Vec::new();
        for (id, wire) in &wires {
            registry.register(*id, wire.clone()).unwrap();
            defs.extend(segment(&registry, -id, types::WIRE_TYPE, &wire.to_value()));
        }
        let empties = |n| Value::Array(68, vec![Value::Struct(67, BTreeMap::new()); n]);

        // Each absent A costs 1 + 64 * 65 values.
        let config = ReaderConfig::default().with_max_zero_fill(10_000);
        let mut reader = GobReader::with_config(config);
        let mut stream = defs.clone();
        stream.extend(segment(&registry, 68, 68, &empties(2)));
        let value = reader.decode(&stream).unwrap();
        let items = value.as_slice().unwrap();
        assert_eq!(items[1].field("A").and_then(Value::as_slice).map(|a| a.len()), Some(64));

        expect_malformed(reader.decode(&segment(&registry, 68, 68, &empties(3))));
        // The limit applies to each segment on its own.
        reader.decode(&segment(&registry, 68, 68, &empties(2))).unwrap();
    }

    #[test]
    fn builtin_ids_cannot_be_redefined() {
        // Definition segment for -6 (string) reusing the Point body.
        let mut stream = POINT_STREAM[..32].to_vec();
        stream[1] = 0x0b;
        stream.remove(2);
        stream[0] = 0x1e;
        expect_malformed(GobReader::new().decode(&stream));
    }
}
