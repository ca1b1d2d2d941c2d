//! Byte level builders for hand-assembled GIF streams used across the unit tests.

use std::collections::HashMap;

use crate::parser::{interlaced_row_order, Rgb};

pub const GRAYS: [Rgb; 256] = grays();

const fn grays() -> [Rgb; 256] {
    let mut table = [[0; 3]; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = [i as u8; 3];
        i += 1;
    }
    table
}

struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    bits: u32,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            out: Vec::new(),
            acc: 0,
            bits: 0,
        }
    }

    fn write(&mut self, code: u16, size: u32) {
        self.acc |= u32::from(code) << self.bits;
        self.bits += size;
        while self.bits >= 8 {
            self.out.push(self.acc as u8);
            self.acc >>= 8;
            self.bits -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.bits > 0 {
            self.out.push(self.acc as u8);
        }
        self.out
    }
}

/// Plain GIF LZW encoder. Returns the packed code stream without sub-block framing.
pub fn lzw_encode(minimum_code_size: u8, pixels: &[u8]) -> Vec<u8> {
    let clear_code: u16 = 1 << minimum_code_size;
    let end_of_information_code = clear_code + 1;
    let first_free_code = clear_code + 2;
    let initial_size = u32::from(minimum_code_size) + 1;

    let mut writer = BitWriter::new();
    let mut dictionary: HashMap<(u16, u8), u16> = HashMap::new();
    let mut next_code = first_free_code;
    let mut size = initial_size;

    writer.write(clear_code, size);

    let Some((&first, rest)) = pixels.split_first() else {
        writer.write(end_of_information_code, size);
        return writer.finish();
    };

    let mut prefix = u16::from(first);
    for &pixel in rest {
        if let Some(&code) = dictionary.get(&(prefix, pixel)) {
            prefix = code;
            continue;
        }

        writer.write(prefix, size);
        dictionary.insert((prefix, pixel), next_code);
        next_code += 1;
        if next_code > (1 << size) && size < 12 {
            size += 1;
        }
        if next_code == 4096 {
            writer.write(clear_code, size);
            dictionary.clear();
            next_code = first_free_code;
            size = initial_size;
        }

        prefix = u16::from(pixel);
    }

    writer.write(prefix, size);
    // the decoder adds its entry for the last code before reading the next one
    if next_code >= (1 << size) && size < 12 {
        size += 1;
    }
    writer.write(end_of_information_code, size);

    writer.finish()
}

/// Frames `data` as data sub-blocks and appends the terminator.
pub fn sub_blocks(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 255 + 2);
    for chunk in data.chunks(255) {
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
    out.push(0);
    out
}

/// Reorders top-to-bottom rows into interlace pass order.
pub fn interlace(pixels: &[u8], width: usize) -> Vec<u8> {
    if width == 0 {
        return pixels.to_vec();
    }

    let height = pixels.len() / width;
    interlaced_row_order(height)
        .flat_map(|row| pixels[row * width..(row + 1) * width].iter().copied())
        .collect()
}

/// The 257 byte magic trailer closing an XMP packet.
pub fn xmp_trailer() -> Vec<u8> {
    let mut trailer = vec![0x01];
    trailer.extend((0..=0xffu8).rev());
    trailer
}

fn table_size_bits(table: &[Rgb]) -> u8 {
    assert!(table.len().is_power_of_two() && (2..=256).contains(&table.len()));
    (table.len().trailing_zeros() - 1) as u8
}

fn push_table(out: &mut Vec<u8>, table: &[Rgb]) {
    for rgb in table {
        out.extend_from_slice(rgb);
    }
}

pub struct GifBuilder {
    data: Vec<u8>,
    global_table_len: Option<usize>,
}

impl GifBuilder {
    pub fn new(version: &str, width: u16, height: u16, global_color_table: Option<&[Rgb]>) -> Self {
        let mut data = Vec::new();
        data.extend_from_slice(b"GIF");
        data.extend_from_slice(version.as_bytes());
        data.extend_from_slice(&width.to_le_bytes());
        data.extend_from_slice(&height.to_le_bytes());

        let packed = match global_color_table {
            Some(table) => 0b1000_0000 | 0b0111_0000 | table_size_bits(table),
            None => 0b0111_0000,
        };
        data.extend_from_slice(&[packed, 0, 0]);

        if let Some(table) = global_color_table {
            push_table(&mut data, table);
        }

        Self {
            data,
            global_table_len: global_color_table.map(<[Rgb]>::len),
        }
    }

    pub fn background_index(mut self, index: u8) -> Self {
        self.data[11] = index;
        self
    }

    pub fn graphic_control(mut self, disposal: u8, user_input: bool, transparent: Option<u8>, delay: u16) -> Self {
        let packed = (disposal & 0b111) << 2 | u8::from(user_input) << 1 | u8::from(transparent.is_some());
        self.data.extend_from_slice(&[0x21, 0xf9, 4, packed]);
        self.data.extend_from_slice(&delay.to_le_bytes());
        self.data.extend_from_slice(&[transparent.unwrap_or(0), 0]);
        self
    }

    pub fn comment(mut self, text: &[u8]) -> Self {
        self.data.extend_from_slice(&[0x21, 0xfe]);
        self.data.extend_from_slice(&sub_blocks(text));
        self
    }

    pub fn application(mut self, identifier: &[u8], authentication_code: &[u8], blocks: &[&[u8]]) -> Self {
        self.data.extend_from_slice(&[0x21, 0xff, 11]);
        self.data.extend_from_slice(identifier);
        self.data.extend_from_slice(authentication_code);
        for block in blocks {
            self.data.push(block.len() as u8);
            self.data.extend_from_slice(block);
        }
        self.data.push(0);
        self
    }

    pub fn netscape_loop(self, count: u16) -> Self {
        let [low, high] = count.to_le_bytes();
        self.application(b"NETSCAPE", b"2.0", &[&[1, low, high]])
    }

    /// `pixels` are given top-to-bottom and reordered when `interlaced` is set.
    #[allow(clippy::too_many_arguments)]
    pub fn image(
        mut self,
        left: u16,
        top: u16,
        width: u16,
        height: u16,
        local_color_table: Option<&[Rgb]>,
        interlaced: bool,
        pixels: &[u8],
    ) -> Self {
        self.data.push(0x2c);
        for value in [left, top, width, height] {
            self.data.extend_from_slice(&value.to_le_bytes());
        }

        let mut packed = 0;
        if let Some(table) = local_color_table {
            packed |= 0b1000_0000 | table_size_bits(table);
        }
        if interlaced {
            packed |= 0b0100_0000;
        }
        self.data.push(packed);

        if let Some(table) = local_color_table {
            push_table(&mut self.data, table);
        }

        let table_len = local_color_table
            .map(<[Rgb]>::len)
            .or(self.global_table_len)
            .unwrap_or(4);
        let minimum_code_size = (table_len.trailing_zeros() as u8).max(2);
        self.data.push(minimum_code_size);

        let pixels = if interlaced {
            interlace(pixels, width.into())
        } else {
            pixels.to_vec()
        };
        self.data.extend_from_slice(&sub_blocks(&lzw_encode(minimum_code_size, &pixels)));
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn plain_text(
        mut self,
        left: u16,
        top: u16,
        width: u16,
        height: u16,
        cell_width: u8,
        cell_height: u8,
        foreground: u8,
        background: u8,
        text: &[u8],
    ) -> Self {
        self.data.extend_from_slice(&[0x21, 0x01, 12]);
        for value in [left, top, width, height] {
            self.data.extend_from_slice(&value.to_le_bytes());
        }
        self.data.extend_from_slice(&[cell_width, cell_height, foreground, background]);
        self.data.extend_from_slice(&sub_blocks(text));
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn trailer(mut self) -> Vec<u8> {
        self.data.push(0x3b);
        self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
