use super::DisposalMethod;
use crate::error::{Error, Result};
use crate::reader::ByteReader;

pub type Rgb = [u8; 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V87a,
    V89a,
}

impl TryFrom<&str> for Version {
    type Error = Error;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value {
            "87a" => Ok(Version::V87a),
            "89a" => Ok(Version::V89a),
            version => Err(Error::UnsupportedVersion(version.into())),
        }
    }
}

/// Palette of RGB triples. Always holds a power of two entries, 2 to 256.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    colors: Vec<Rgb>,
    sorted: bool,
}

impl ColorTable {
    /// Entry count encoded by the 3-bit size field of a packed byte.
    pub fn entries_for(size_bits: u8) -> usize {
        1 << ((size_bits & 0b111) + 1)
    }

    pub(crate) fn read(reader: &mut ByteReader<'_>, size_bits: u8, sorted: bool) -> Result<Self> {
        let bytes = reader.read_bytes(3 * Self::entries_for(size_bits))?;
        let colors = bytes
            .chunks_exact(3)
            .map(|rgb| [rgb[0], rgb[1], rgb[2]])
            .collect();

        Ok(Self { colors, sorted })
    }

    pub fn get(&self, index: u8) -> Option<Rgb> {
        self.colors.get(usize::from(index)).copied()
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalScreenDescriptor {
    pub screen_width: u16,
    pub screen_height: u16,
    pub global_color_table_flag: bool,
    pub color_resolution: u8,
    pub sort_flag: bool,
    pub global_color_table_size: u8,
    pub background_color_index: u8,
    pub pixel_aspect_ratio: u8,
}

impl LogicalScreenDescriptor {
    /// Width over height of a pixel, `None` when the file leaves it unspecified.
    pub fn aspect_ratio(&self) -> Option<f32> {
        match self.pixel_aspect_ratio {
            0 => None,
            value => Some((f32::from(value) + 15.0) / 64.0),
        }
    }

    /// Bits per primary color of the source image.
    pub fn color_depth(&self) -> u8 {
        self.color_resolution + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GifHeader {
    pub version: Version,
    pub logical_screen_descriptor: LogicalScreenDescriptor,
    pub global_color_table: Option<ColorTable>,
}

impl GifHeader {
    pub fn width(&self) -> u16 {
        self.logical_screen_descriptor.screen_width
    }

    pub fn height(&self) -> u16 {
        self.logical_screen_descriptor.screen_height
    }

    pub fn background_color(&self) -> Option<Rgb> {
        self.global_color_table
            .as_ref()?
            .get(self.logical_screen_descriptor.background_color_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicControlExtension {
    pub disposal_method: DisposalMethod,
    pub user_input_flag: bool,
    pub transparent_color_flag: bool,

    /// Centiseconds.
    pub delay_time: u16,
    pub transparent_color_index: u8,
}

impl GraphicControlExtension {
    pub fn transparent_index(&self) -> Option<u8> {
        self.transparent_color_flag
            .then_some(self.transparent_color_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableBasedImage {
    // includes image descriptor inline
    pub left_position: u16,
    pub top_position: u16,

    pub width: u16,
    pub height: u16,

    pub interlace_flag: bool,
    pub sort_flag: bool,
    pub local_color_table: Option<ColorTable>,

    pub lzw_minimum_code_size: u8,
    /// Compressed bytes consumed by the image data.
    pub lzw_size: usize,

    /// Released once the frame has been composited.
    pub image_indexes: Option<Box<[u8]>>,
    pub pixel_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainTextExtension {
    pub left_position: u16,
    pub top_position: u16,

    pub width: u16,
    pub height: u16,

    pub cell_width: u8,
    pub cell_height: u8,

    pub foreground_color_index: u8,
    pub background_color_index: u8,

    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCount {
    Infinite,
    Number(u16),
}

impl From<u16> for LoopCount {
    fn from(value: u16) -> Self {
        match value {
            0 => LoopCount::Infinite,
            number => LoopCount::Number(number),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationData {
    /// NETSCAPE sub-block 1.
    LoopCount(u16),
    /// NETSCAPE sub-block 2.
    BufferSize(u32),
    Xmp(String),
    Opaque(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationExtension {
    pub identifier: String,
    pub authentication_code: String,
    pub data: ApplicationData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialPurposeExtension {
    Application(ApplicationExtension),
    Comment(String),
    Unknown { label: u8, data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderBlock {
    Image(TableBasedImage),
    PlainText(PlainTextExtension),
}

/// A graphic rendering block paired with the control extension preceding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicBlock {
    pub extension: Option<GraphicControlExtension>,
    pub render_block: RenderBlock,
}

/// One parse step's worth of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Header(GifHeader),
    GraphicControl(GraphicControlExtension),
    SpecialPurpose(SpecialPurposeExtension),
    Graphic(GraphicBlock),
    Trailer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_table_length_is_power_of_two() {
        for size_bits in 0..=7u8 {
            let entries = ColorTable::entries_for(size_bits);
            let bytes = vec![0x10; 3 * entries];
            let mut reader = ByteReader::new(&bytes);

            let table = ColorTable::read(&mut reader, size_bits, false).unwrap();
            assert_eq!(table.len(), 1 << (size_bits + 1));
            assert_eq!(reader.remaining(), 0);
        }
    }

    #[test]
    fn color_table_lookup() {
        let bytes = [1, 2, 3, 4, 5, 6];
        let table = ColorTable::read(&mut ByteReader::new(&bytes), 0, true).unwrap();

        assert_eq!(table.get(1), Some([4, 5, 6]));
        assert_eq!(table.get(2), None);
        assert!(table.is_sorted());
    }

    #[test]
    fn aspect_ratio_formula() {
        let mut descriptor = LogicalScreenDescriptor {
            screen_width: 1,
            screen_height: 1,
            global_color_table_flag: false,
            color_resolution: 7,
            sort_flag: false,
            global_color_table_size: 0,
            background_color_index: 0,
            pixel_aspect_ratio: 0,
        };
        assert_eq!(descriptor.aspect_ratio(), None);
        assert_eq!(descriptor.color_depth(), 8);

        descriptor.pixel_aspect_ratio = 49;
        assert_eq!(descriptor.aspect_ratio(), Some(1.0));
    }

    #[test]
    fn loop_count_zero_is_infinite() {
        assert_eq!(LoopCount::from(0), LoopCount::Infinite);
        assert_eq!(LoopCount::from(3), LoopCount::Number(3));
    }
}
