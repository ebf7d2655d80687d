use byteorder::{ByteOrder, LittleEndian};
use nalgebra_glm::{vec3, Vec3};

use crate::error::{Error, Result};

/// A forward-only little-endian cursor over a byte slice. Every read is bounds checked and fails
/// with `CorruptData` instead of running past the end.
///
/// Offsets in errors are reported relative to `base`, so a cursor over a chunk payload can report
/// positions in file coordinates.
#[derive(Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
    base: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_base(data, 0)
    }

    pub fn with_base(data: &'a [u8], base: usize) -> Self {
        Self {
            data,
            position: 0,
            base,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Fails unless `count` records of `record_size` bytes remain. Call before trusting a count
    /// read from the data to size an allocation.
    pub fn ensure_records(&self, count: usize, record_size: usize, what: &str) -> Result<()> {
        match count.checked_mul(record_size) {
            Some(needed) if needed <= self.remaining() => Ok(()),
            _ => Err(Error::corrupt(
                self.base + self.position,
                format!(
                    "{} {} of {} bytes each overrun the {} remaining bytes",
                    count,
                    what,
                    record_size,
                    self.remaining(),
                ),
            )),
        }
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Error::corrupt(
                self.base + self.position,
                format!(
                    "needed {} bytes, {} available",
                    len,
                    self.remaining()
                ),
            ));
        }
        let bytes = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.bytes(len).map(|_| ())
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0; N];
        array.copy_from_slice(self.bytes(N)?);
        Ok(array)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.bytes(2)?))
    }

    pub fn i16(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.bytes(2)?))
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.bytes(4)?))
    }

    pub fn i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.bytes(4)?))
    }

    pub fn f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.bytes(4)?))
    }

    pub fn vec3(&mut self) -> Result<Vec3> {
        let x = self.f32()?;
        let y = self.f32()?;
        let z = self.f32()?;
        Ok(vec3(x, y, z))
    }

    /// Reads a fixed-width name field, dropping NUL padding.
    pub fn name<const N: usize>(&mut self) -> Result<String> {
        let raw = self.bytes(N)?;
        Ok(String::from_utf8_lossy(raw).replace('\0', ""))
    }
}
