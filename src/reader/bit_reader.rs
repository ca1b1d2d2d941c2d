use super::sub_block_reader::SubBlockReader;
use crate::error::Result;

/// Pulls variable width codes out of a sub-block stream, LSB first.
pub struct BitReader<'s, 'r, 'a> {
    inner: &'s mut SubBlockReader<'r, 'a>,
    // bits not handed out yet, oldest in the lowest position
    buf: u32,
    bits: u32,
    bytes_read: usize,
}

impl<'s, 'r, 'a> BitReader<'s, 'r, 'a> {
    pub fn new(inner: &'s mut SubBlockReader<'r, 'a>) -> Self {
        Self {
            inner,
            buf: 0,
            bits: 0,
            bytes_read: 0,
        }
    }

    /// Next `count` bits (at most 16), or `None` when the stream ends first.
    pub fn next(&mut self, count: u32) -> Result<Option<u16>> {
        debug_assert!(count <= 16);

        while self.bits < count {
            match self.inner.next_byte()? {
                Some(byte) => {
                    self.buf |= u32::from(byte) << self.bits;
                    self.bits += 8;
                    self.bytes_read += 1;
                }
                None => return Ok(None),
            }
        }

        let value = self.buf & ((1 << count) - 1);
        self.buf >>= count;
        self.bits -= count;
        Ok(Some(value as u16))
    }

    /// Bytes pulled from the sub-blocks so far.
    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }
}

#[cfg(test)]
mod tests {
    use super::BitReader;
    use crate::reader::{ByteReader, SubBlockReader};

    #[test]
    fn it_works() {
        let buffer = &[
            7,
            0b10000100,
            0b10001111,
            0b10101001,
            0b11001011,
            0b11101101,
            0b00001111,
            0b10100011,
            0,
        ];
        let mut bytes = ByteReader::new(buffer);
        let mut sub_blocks = SubBlockReader::new(&mut bytes);
        let mut reader = BitReader::new(&mut sub_blocks);

        assert_eq!(reader.next(3).unwrap(), Some(0b00000100));
        assert_eq!(reader.next(3).unwrap(), Some(0b00000000));
        assert_eq!(reader.next(3).unwrap(), Some(0b00000110));
        assert_eq!(reader.next(3).unwrap(), Some(0b00000111));
        assert_eq!(reader.next(3).unwrap(), Some(0b00000000));
        assert_eq!(reader.next(3).unwrap(), Some(0b00000011));
        assert_eq!(reader.next(3).unwrap(), Some(0b00000010));
        assert_eq!(reader.next(3).unwrap(), Some(0b00000101));
        assert_eq!(reader.bytes_read(), 3);
    }

    #[test]
    fn codes_span_sub_block_boundaries() {
        // 0x0abc split over two sub-blocks, then too few bits for a second code
        let buffer = &[1, 0xbc, 1, 0x0a, 0];
        let mut bytes = ByteReader::new(buffer);
        let mut sub_blocks = SubBlockReader::new(&mut bytes);
        let mut reader = BitReader::new(&mut sub_blocks);

        assert_eq!(reader.next(12).unwrap(), Some(0x0abc));
        assert_eq!(reader.next(12).unwrap(), None);
        assert!(sub_blocks.is_eof());
    }
}
