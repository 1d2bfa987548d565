//! Encoder and decoder for the gob wire format.
//!
//! A stream is a sequence of length-prefixed segments. Each segment carries
//! either a value (positive type id) or the definition of a compound type
//! (negative type id) that later values refer to.
//!
//! ```
//! use gobwire::{types, GobReader, GobWriter, Value};
//!
//! let mut writer = GobWriter::new();
//! let point = writer.define_struct("Point", &[("X", types::INT), ("Y", types::INT)])?;
//! let bytes = writer.encode(&Value::new_struct(point, [("X", Value::Int(22)), ("Y", Value::Int(33))]))?;
//!
//! let value = GobReader::new().decode(&bytes)?;
//! assert_eq!(value.field("Y"), Some(&Value::Int(33)));
//! # Ok::<(), gobwire::Error>(())
//! ```

mod config;
mod decode;
mod encode;
mod error;
mod reader;
mod registry;
mod value;
mod writer;

pub mod object;
pub mod types;

pub use config::ReaderConfig;
pub use decode::Decoder;
pub use encode::Encoder;
pub use error::{Error, Result};
pub use reader::{DecodeAll, GobReader};
pub use registry::TypeRegistry;
pub use types::{Kind, Type, TypeId};
pub use value::Value;
pub use writer::GobWriter;

/// Decodes a single value from a fresh stream.
pub fn decode(buf: &[u8]) -> Result<Value> {
    GobReader::new().decode(buf)
}

/// Decodes every value in a fresh stream.
pub fn decode_all(buf: &[u8]) -> Result<Vec<Value>> {
    GobReader::new().decode_all(buf).collect()
}
