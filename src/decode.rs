use std::io::{Cursor, Read};
use byteorder::{BigEndian, ReadBytesExt};
use crate::{Error, Result};

/// Low-level reader for gob's scalar encodings.
///
/// Running out of input surfaces as [`Error::MalformedInput`].
pub struct Decoder<R: Read> {
    reader: R,
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.reader.read_u8()?)
    }

    #[inline]
    pub fn read_uint(&mut self) -> Result<u64> {
        let u7_or_len = self.read_u8()?;
        if u7_or_len < 128 {
            return Ok(u7_or_len as u64);
        }
        // 256 - b
        let len = (!u7_or_len as usize) + 1;
        if len > 8 {
            return Err(Error::malformed(format!(
                "unsigned integer of {} bytes exceeds 64 bits",
                len
            )));
        }
        Ok(self.reader.read_uint::<BigEndian>(len)?)
    }

    #[inline]
    pub fn read_int(&mut self) -> Result<i64> {
        let bits = self.read_uint()?;
        let sint = (bits >> 1) as i64;
        if bits & 1 == 0 {
            Ok(sint)
        } else {
            Ok(!sint)
        }
    }

    #[inline]
    pub fn read_float(&mut self) -> Result<f64> {
        let bits = self.read_uint()?;
        Ok(f64::from_bits(bits.swap_bytes()))
    }

    #[inline]
    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_uint()? {
            0 => Ok(false),
            1 => Ok(true),
            n => Err(Error::malformed(format!("invalid boolean {}", n))),
        }
    }

    /// Reads a length-prefixed byte string.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_uint()?;
        let mut buf = Vec::new();
        (&mut self.reader).take(len).read_to_end(&mut buf)?;
        if (buf.len() as u64) != len {
            return Err(Error::malformed(format!(
                "byte string of {} bytes truncated to {}",
                len,
                buf.len()
            )));
        }
        Ok(buf)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|e| Error::malformed(format!("invalid utf-8 string: {}", e)))
    }

    /// Reads a complex number, real part first.
    pub fn read_complex(&mut self) -> Result<(f64, f64)> {
        let re = self.read_float()?;
        let im = self.read_float()?;
        Ok((re, im))
    }
}

impl<T: AsRef<[u8]>> Decoder<Cursor<T>> {
    /// Bytes not yet consumed from the underlying buffer.
    pub fn remaining(&self) -> usize {
        let buf = self.reader.get_ref().as_ref();
        buf.len().saturating_sub(self.reader.position() as usize)
    }

    pub fn position(&self) -> usize {
        self.reader.position() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder(bytes: &[u8]) -> Decoder<Cursor<&[u8]>> {
        Decoder::new(Cursor::new(bytes))
    }

    #[test]
    fn test_uint_decoding() {
        assert_eq!(decoder(&[0x07]).read_uint().unwrap(), 7);
        assert_eq!(decoder(&[0xff, 0x80]).read_uint().unwrap(), 128);
        assert_eq!(decoder(&[0xfe, 0x01, 0x00]).read_uint().unwrap(), 256);
    }

    #[test]
    fn test_truncated_uint() {
        let err = decoder(&[0xfe, 0x01]).read_uint().unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)), "{:?}", err);

        let err = decoder(&[]).read_uint().unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)), "{:?}", err);
    }

    #[test]
    fn test_oversized_uint() {
        // Nine bytes of payload cannot fit a u64.
        let mut bytes = vec![0xf7];
        bytes.extend_from_slice(&[1; 9]);
        let err = decoder(&bytes).read_uint().unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)), "{:?}", err);
    }

    #[test]
    fn test_bool_decoding() {
        assert!(!decoder(&[0]).read_bool().unwrap());
        assert!(decoder(&[1]).read_bool().unwrap());
        assert!(matches!(decoder(&[2]).read_bool(), Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_bytes_decoding() {
        let mut dec = decoder(&[0x03, b'a', b'b', b'c', 0x09]);
        assert_eq!(dec.read_bytes().unwrap(), b"abc".to_vec());
        assert_eq!(dec.remaining(), 1);
        assert_eq!(dec.position(), 4);

        let err = decoder(&[0x05, b'a', b'b']).read_bytes().unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)), "{:?}", err);
    }

    #[test]
    fn test_invalid_utf8() {
        let err = decoder(&[0x02, 0xc3, 0x28]).read_string().unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)), "{:?}", err);
    }
}
