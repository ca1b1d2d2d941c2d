use log::trace;

use crate::error::{Error, Result};
use crate::reader::{BitReader, SubBlockReader};

const MAX_CODES: usize = 4096;
const MAX_CODE_SIZE: u32 = 12;

// one dictionary slot: the code of everything but the last byte, and that last byte
#[derive(Debug, Clone, Copy, Default)]
struct Entry {
    prefix: u16,
    suffix: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzwOutcome {
    /// Pixels produced by the code stream, including any that did not fit the
    /// destination.
    pub decoded: usize,
    /// Compressed bytes pulled from the sub-blocks.
    pub compressed: usize,
    pub end_of_information: bool,
    /// Code that stopped decoding because it could not be resolved.
    pub invalid_code: Option<u16>,
}

/// GIF flavoured LZW decompressor with a fixed 4096 entry dictionary.
///
/// The table survives between calls so one decoder can serve every image of
/// a file without reallocating.
pub struct LzwDecoder {
    table: Box<[Entry]>,
    // suffixes of the run being resolved, last byte first
    scratch: Vec<u8>,
}

impl Default for LzwDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LzwDecoder {
    pub fn new() -> Self {
        Self {
            table: vec![Entry::default(); MAX_CODES].into_boxed_slice(),
            scratch: Vec::with_capacity(MAX_CODES),
        }
    }

    /// Decodes the code stream in `source` into `output`.
    ///
    /// A stream that is too short or too long for `output` is not an error,
    /// the caller compares [`LzwOutcome::decoded`] with the expected length.
    /// The remaining sub-blocks are always drained.
    pub fn decode(
        &mut self,
        minimum_code_size: u8,
        source: &mut SubBlockReader<'_, '_>,
        output: &mut [u8],
    ) -> Result<LzwOutcome> {
        if !(2..=8).contains(&minimum_code_size) {
            return Err(Error::InvalidCodeSize(minimum_code_size));
        }

        let clear_code: u16 = 1 << minimum_code_size;
        let end_of_information_code = clear_code + 1;
        let first_free_code = clear_code + 2;

        let mut code_size = u32::from(minimum_code_size) + 1;
        let mut code_mask: u16 = (1 << code_size) - 1;
        let mut next_code = first_free_code;
        let mut previous_code: Option<u16> = None;

        let mut written = 0;
        let mut end_of_information = false;
        let mut invalid_code = None;

        let mut reader = BitReader::new(source);

        while let Some(code) = reader.next(code_size)? {
            if code == clear_code {
                trace!("clear code after {written} pixel(s)");
                next_code = first_free_code;
                code_size = u32::from(minimum_code_size) + 1;
                code_mask = (1 << code_size) - 1;
                previous_code = None;
                continue;
            }

            if code == end_of_information_code {
                end_of_information = true;
                break;
            }

            // a code one past the table is {CODE-1} followed by its own first byte,
            // anything further out cannot be resolved
            let chase_code = match previous_code {
                _ if code < next_code => code,
                Some(previous_code) if code == next_code => previous_code,
                _ => {
                    invalid_code = Some(code);
                    break;
                }
            };

            self.scratch.clear();
            let mut chase = chase_code;
            while chase > clear_code {
                let entry = self.table[usize::from(chase)];
                self.scratch.push(entry.suffix);
                chase = entry.prefix;
            }
            let first = chase as u8;

            emit(output, &mut written, first);
            for &byte in self.scratch.iter().rev() {
                emit(output, &mut written, byte);
            }
            if chase_code != code {
                emit(output, &mut written, first);
            }

            if let Some(previous_code) = previous_code {
                if usize::from(next_code) < MAX_CODES {
                    self.table[usize::from(next_code)] = Entry {
                        prefix: previous_code,
                        suffix: first,
                    };
                    next_code += 1;

                    if next_code > code_mask && code_size < MAX_CODE_SIZE {
                        code_size += 1;
                        code_mask = code_mask << 1 | 1;
                    }
                }
            }

            previous_code = Some(code);
        }

        let compressed = reader.bytes_read();
        source.drain()?;

        Ok(LzwOutcome {
            decoded: written,
            compressed,
            end_of_information,
            invalid_code,
        })
    }
}

fn emit(output: &mut [u8], written: &mut usize, byte: u8) {
    if let Some(slot) = output.get_mut(*written) {
        *slot = byte;
    }
    *written += 1;
}
