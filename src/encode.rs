use std::io::Write;
use byteorder::{BigEndian, WriteBytesExt};
use crate::Result;

/// Low-level writer for gob's scalar encodings.
pub struct Encoder<W: Write> {
    writer: W,
}

impl<W: Write> Encoder<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.writer.write_all(buf)?;
        Ok(())
    }

    /// Writes a single byte.
    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.writer.write_u8(v)?;
        Ok(())
    }

    /// Writes an unsigned integer using gob's variable-length encoding.
    /// Tiny values (< 128) are written as a single byte.
    /// Larger values are written as a byte count (negated) followed by the
    /// minimal big-endian representation.
    pub fn write_uint(&mut self, v: u64) -> Result<()> {
        if v < 128 {
            return self.write_u8(v as u8);
        }

        let n = 8 - (v.leading_zeros() / 8) as usize;
        // 256 - n
        self.write_u8(!(n as u8 - 1))?;
        self.writer.write_uint::<BigEndian>(v, n)?;
        Ok(())
    }

    /// Writes a signed integer.
    /// The value is shifted left one bit; negative values are complemented,
    /// so the low bit carries the sign.
    pub fn write_int(&mut self, v: i64) -> Result<()> {
        let u = if v < 0 {
            ((!v as u64) << 1) | 1
        } else {
            (v as u64) << 1
        };
        self.write_uint(u)
    }

    /// Writes a floating point number.
    /// The IEEE bits are byte-reversed so that common values with short
    /// mantissas end up with small magnitudes.
    pub fn write_float(&mut self, v: f64) -> Result<()> {
        self.write_uint(v.to_bits().swap_bytes())
    }

    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_uint(v as u64)
    }

    /// Writes a byte slice as its length followed by the raw bytes.
    pub fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.write_uint(v.len() as u64)?;
        self.writer.write_all(v)?;
        Ok(())
    }

    pub fn write_string(&mut self, v: &str) -> Result<()> {
        self.write_bytes(v.as_bytes())
    }

    /// Writes a complex number as two floats, real part first.
    pub fn write_complex(&mut self, re: f64, im: f64) -> Result<()> {
        self.write_float(re)?;
        self.write_float(im)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Decoder;
    use std::io::Cursor;

    fn encoded<F: FnOnce(&mut Encoder<&mut Vec<u8>>) -> Result<()>>(f: F) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut enc = Encoder::new(&mut buf);
        f(&mut enc).unwrap();
        buf
    }

    #[test]
    fn test_uint_encoding() {
        let tests = vec![
            (0, vec![0]),
            (127, vec![127]),
            (128, vec![0xff, 0x80]),
            (256, vec![0xfe, 0x01, 0x00]),
            (0x1234_5678, vec![0xfc, 0x12, 0x34, 0x56, 0x78]),
            (u64::MAX, vec![0xf8, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]),
        ];

        for (val, expected) in tests {
            let buf = encoded(|enc| enc.write_uint(val));
            assert_eq!(buf, expected, "Failed encoding {}", val);

            let mut dec = Decoder::new(Cursor::new(buf));
            let decoded = dec.read_uint().unwrap();
            assert_eq!(decoded, val, "Failed decoding {}", val);
        }
    }

    #[test]
    fn test_int_encoding() {
        let tests = vec![
            (0, vec![0x00]),
            (1, vec![0x02]),
            (-1, vec![0x01]),
            (-2, vec![0x03]),
            (64, vec![0xff, 0x80]),
            (-129, vec![0xfe, 0x01, 0x01]),
        ];

        for (val, expected) in tests {
            let buf = encoded(|enc| enc.write_int(val));
            assert_eq!(buf, expected, "Failed encoding {}", val);
        }

        for val in [-1000, -128, -1, 0, 1, 128, 1000, i64::MIN, i64::MAX] {
            let buf = encoded(|enc| enc.write_int(val));
            let mut dec = Decoder::new(Cursor::new(buf));
            assert_eq!(dec.read_int().unwrap(), val, "Failed decoding {}", val);
        }
    }

    #[test]
    fn test_float_encoding() {
        // 17.0 is 0x4031000000000000; reversed it needs only two bytes.
        let buf = encoded(|enc| enc.write_float(17.0));
        assert_eq!(buf, vec![0xfe, 0x31, 0x40]);

        assert_eq!(encoded(|enc| enc.write_float(0.0)), vec![0x00]);
    }

    #[test]
    fn test_bool_encoding() {
        assert_eq!(encoded(|enc| enc.write_bool(false)), vec![0]);
        assert_eq!(encoded(|enc| enc.write_bool(true)), vec![1]);
    }

    #[test]
    fn test_string_encoding() {
        let val = "Hello World";
        let buf = encoded(|enc| enc.write_string(val));
        assert_eq!(buf[0], 11);
        assert_eq!(&buf[1..], val.as_bytes());

        let mut dec = Decoder::new(Cursor::new(buf));
        let decoded = dec.read_string().unwrap();
        assert_eq!(decoded, val);
    }

    #[test]
    fn test_complex_encoding() {
        let buf = encoded(|enc| enc.write_complex(17.0, 0.0));
        assert_eq!(buf, vec![0xfe, 0x31, 0x40, 0x00]);

        let mut dec = Decoder::new(Cursor::new(buf));
        assert_eq!(dec.read_complex().unwrap(), (17.0, 0.0));
    }
}
