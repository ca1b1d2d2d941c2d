use super::byte_reader::{latin1, ByteReader};
use crate::error::Result;

/// Decodes the data sub-block grammar: a run of `(length, data[length])`
/// chunks closed by a zero length byte.
///
/// Consumers that stop early must call [`SubBlockReader::drain`] so the
/// underlying cursor lands on the next top-level block.
#[derive(Debug)]
pub struct SubBlockReader<'r, 'a> {
    inner: &'r mut ByteReader<'a>,
    remaining: u8,
    eof: bool,
}

impl<'r, 'a> SubBlockReader<'r, 'a> {
    pub fn new(inner: &'r mut ByteReader<'a>) -> Self {
        Self {
            inner,
            remaining: 0,
            eof: false,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Next data byte, or `None` once the terminator has been read.
    pub fn next_byte(&mut self) -> Result<Option<u8>> {
        if self.eof {
            return Ok(None);
        }

        if self.remaining == 0 {
            self.remaining = self.inner.read_u8()?;
            if self.remaining == 0 {
                self.eof = true;
                return Ok(None);
            }
        }

        self.remaining -= 1;
        self.inner.read_u8().map(Some)
    }

    /// Rest of the current sub-block, or the whole next one when positioned on
    /// a boundary. `None` once the terminator has been read.
    pub fn next_sub_block(&mut self) -> Result<Option<&'a [u8]>> {
        if self.eof {
            return Ok(None);
        }

        if self.remaining == 0 {
            self.remaining = self.inner.read_u8()?;
            if self.remaining == 0 {
                self.eof = true;
                return Ok(None);
            }
        }

        let data = self.inner.read_bytes(self.remaining.into())?;
        self.remaining = 0;
        Ok(Some(data))
    }

    /// Skips everything up to and including the terminator. Returns the
    /// number of data bytes skipped.
    pub fn drain(&mut self) -> Result<usize> {
        let mut skipped = 0;
        while let Some(block) = self.next_sub_block()? {
            skipped += block.len();
        }
        Ok(skipped)
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut result = Vec::new();
        while let Some(block) = self.next_sub_block()? {
            result.extend_from_slice(block);
        }
        Ok(result)
    }

    /// Collects the payload as text, one character per byte.
    pub fn to_latin1_string(&mut self) -> Result<String> {
        Ok(latin1(&self.to_bytes()?))
    }

    /// Raw mode: length bytes are kept as part of the payload. Only the final
    /// zero terminator is dropped.
    pub fn to_raw_bytes(&mut self) -> Result<Vec<u8>> {
        let mut result = Vec::new();

        // finish a partially consumed sub-block first, its length byte is gone already
        if self.remaining != 0 && !self.eof {
            result.extend_from_slice(self.inner.read_bytes(self.remaining.into())?);
            self.remaining = 0;
        }

        while !self.eof {
            let length = self.inner.read_u8()?;
            if length == 0 {
                self.eof = true;
                break;
            }
            result.push(length);
            result.extend_from_slice(self.inner.read_bytes(length.into())?);
        }

        Ok(result)
    }
}
