use crate::error::{FormatError, FormatResult};

/// Bounds-checked little-endian cursor over an immutable buffer.
///
/// A failed read never moves the cursor.
#[derive(Clone, Debug)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteCursor { data, pos: 0 }
    }

    /// The whole underlying buffer, independent of the current position.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn seek(&mut self, offset: usize) -> FormatResult<()> {
        if offset > self.data.len() {
            return Err(FormatError::InvalidOffset {
                offset,
                len: self.data.len(),
            });
        }
        self.pos = offset;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> FormatResult<()> {
        let target = self.pos.checked_add(count).ok_or(FormatError::Truncated {
            offset: self.pos,
            needed: count,
        })?;
        if target > self.data.len() {
            return Err(FormatError::Truncated {
                offset: self.pos,
                needed: count,
            });
        }
        self.pos = target;
        Ok(())
    }

    /// A cursor over the same buffer that ends at `end`, positioned where this one is.
    ///
    /// Reads through it past `end` fail with `Truncated` even if the parent buffer
    /// continues, which keeps a chunk's fields inside its declared size.
    pub fn bounded(&self, end: usize) -> FormatResult<ByteCursor<'a>> {
        if end > self.data.len() || end < self.pos {
            return Err(FormatError::InvalidOffset {
                offset: end,
                len: self.data.len(),
            });
        }
        Ok(ByteCursor {
            data: &self.data[..end],
            pos: self.pos,
        })
    }

    pub fn read_bytes(&mut self, count: usize) -> FormatResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(count)
            .filter(|end| *end <= self.data.len())
            .ok_or(FormatError::Truncated {
                offset: self.pos,
                needed: count,
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> FormatResult<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> FormatResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> FormatResult<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> FormatResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> FormatResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Read a u16 at an absolute offset without moving the cursor.
    pub fn peek_u16_at(&self, offset: usize) -> FormatResult<u16> {
        let mut probe = self.clone();
        probe.seek(offset)?;
        probe.read_u16()
    }

    pub fn peek_u32_at(&self, offset: usize) -> FormatResult<u32> {
        let mut probe = self.clone();
        probe.seek(offset)?;
        probe.read_u32()
    }
}
