//! Bounds-checked wire cursors
//!
//! Cells are serialized into caller-provided fixed-capacity buffers, so
//! every write checks remaining capacity and every read checks remaining
//! input. Neither cursor ever touches bytes outside the supplied slice.

use crate::error::{HsError, Result};

/// Write cursor over a caller-supplied buffer
pub(crate) struct WireWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WireWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far.
    pub fn written(&self) -> usize {
        self.pos
    }

    fn check_capacity(&self, needed: usize) -> Result<()> {
        if self.pos + needed > self.buf.len() {
            return Err(HsError::BufferTooSmall {
                needed: self.pos + needed,
                capacity: self.buf.len(),
            });
        }
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.check_capacity(1)?;
        self.buf[self.pos] = value;
        self.pos += 1;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_capacity(bytes.len())?;
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }
}

/// Read cursor over a received buffer
pub(crate) struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    fn check_remaining(&self, needed: usize) -> Result<()> {
        if self.pos + needed > self.buf.len() {
            return Err(HsError::Truncated {
                needed,
                remaining: self.buf.len() - self.pos,
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.check_remaining(1)?;
        let value = self.buf[self.pos];
        self.pos += 1;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.check_remaining(len)?;
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_capacity_check() {
        let mut buf = [0u8; 4];
        let mut writer = WireWriter::new(&mut buf);

        writer.write_u16(0x0102).unwrap();
        writer.write_u8(3).unwrap();
        assert_eq!(writer.written(), 3);

        // One byte left; a two-byte write must fail without partial output
        assert!(matches!(
            writer.write_u16(0xffff),
            Err(HsError::BufferTooSmall { .. })
        ));
        writer.write_u8(4).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn test_reader_truncation() {
        let buf = [0xde, 0xad];
        let mut reader = WireReader::new(&buf);

        assert_eq!(reader.read_u8().unwrap(), 0xde);
        assert!(matches!(
            reader.read_u16(),
            Err(HsError::Truncated { .. })
        ));
        // Failed read consumed nothing
        assert_eq!(reader.read_u8().unwrap(), 0xad);
    }

    #[test]
    fn test_reader_empty_input() {
        let mut reader = WireReader::new(&[]);
        assert!(reader.read_u8().is_err());
        assert!(reader.read_bytes(1).is_err());
        assert_eq!(reader.consumed(), 0);
    }
}
