use super::block::*;
use super::interlace::deinterlace;
use super::lzw::LzwDecoder;
use super::DisposalMethod;

use crate::error::{Anomaly, Error, Result};
use crate::reader::{ByteReader, SubBlockReader};

use log::{debug, warn};

const EXTENSION_INTRODUCER: u8 = 0x21;
const IMAGE_DESCRIPTOR_LABEL: u8 = 0x2c;
const TRAILER_LABEL: u8 = 0x3b;

// Extension labels
const APPLICATION_EXTENSION: u8 = 0xff;
const COMMENT_EXTENSION: u8 = 0xfe;
const GRAPHIC_CONTROL_EXTENSION: u8 = 0xf9;
const PLAIN_TEXT_EXTENSION: u8 = 0x01;

// Fixed block sizes
const APPLICATION_BLOCK_SIZE: u8 = 11;
const GRAPHIC_CONTROL_BLOCK_SIZE: u8 = 4;
const PLAIN_TEXT_BLOCK_SIZE: u8 = 12;

const NETSCAPE_IDENTIFIER: &str = "NETSCAPE";
const NETSCAPE_LOOP_SUB_BLOCK: u8 = 1;
const NETSCAPE_BUFFER_SUB_BLOCK: u8 = 2;

const XMP_IDENTIFIER: &str = "XMP Data";
const XMP_AUTHENTICATION_CODE: &str = "XMP";
// 0x01, 0xff, 0xfe, ..., 0x01, 0x00
const XMP_TRAILER_LENGTH: usize = 257;

#[derive(Debug)]
enum ExtensionType {
    Application,
    Comment,
    GraphicControl,
    PlainText,
    Unknown(u8),
}

impl From<u8> for ExtensionType {
    fn from(value: u8) -> Self {
        use ExtensionType::*;

        match value {
            APPLICATION_EXTENSION => Application,
            COMMENT_EXTENSION => Comment,
            GRAPHIC_CONTROL_EXTENSION => GraphicControl,
            PLAIN_TEXT_EXTENSION => PlainText,
            label => Unknown(label),
        }
    }
}

// The pending graphic control extension travels with the state until a
// graphic rendering block picks it up.
#[derive(Debug)]
enum ParserState {
    ProcessMagic,
    ProcessLogicalScreenDescriptor(Version),
    ProcessGlobalColorTable(Version, LogicalScreenDescriptor),
    ProcessTrailer,

    DetermineNextBlock(Option<GraphicControlExtension>),
    ProcessExtension(u8, Option<GraphicControlExtension>),
    ProcessImageDescriptor(Option<GraphicControlExtension>),
    ProcessLocalColorTable(PendingImage),
    ProcessImageData(PendingImage),

    Done,
}

#[derive(Debug)]
struct PendingImage {
    extension: Option<GraphicControlExtension>,
    image: TableBasedImage,
    local_color_table_size: Option<u8>,
}

/// Block level GIF parser over a fully buffered input.
///
/// Each call to [`Decoder::next_block`] runs the state machine until it
/// produces a [`Block`]; after the trailer it returns `None`. The type also
/// iterates as `Result<Block>`, stopping after the first error.
#[derive(Debug)]
pub struct Decoder<'a> {
    reader: ByteReader<'a>,
    state: ParserState,
    lzw: LzwDecoderHandle,
    graphic_blocks: usize,
    anomalies: Vec<Anomaly>,
}

// LzwDecoder holds a 4k table, keep Decoder's Debug output readable
struct LzwDecoderHandle(LzwDecoder);

impl std::fmt::Debug for LzwDecoderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LzwDecoder")
    }
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            reader: ByteReader::new(buf),
            state: ParserState::ProcessMagic,
            lzw: LzwDecoderHandle(LzwDecoder::new()),
            graphic_blocks: 0,
            anomalies: Vec::new(),
        }
    }

    pub fn next_block(&mut self) -> Result<Option<Block>> {
        loop {
            let state = std::mem::replace(&mut self.state, ParserState::Done);
            if let ParserState::Done = state {
                return Ok(None);
            }

            debug!("begin parsing state {:?}", StateName(&state));
            let (next_state, block) = self.process_next_state(state)?;
            self.state = next_state;

            if block.is_some() {
                return Ok(block);
            }
        }
    }

    /// Anomalies recorded so far.
    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    pub fn take_anomalies(&mut self) -> Vec<Anomaly> {
        std::mem::take(&mut self.anomalies)
    }

    /// Bytes consumed from the input so far.
    pub fn position(&self) -> usize {
        self.reader.position()
    }

    fn process_next_state(&mut self, next_state: ParserState) -> Result<(ParserState, Option<Block>)> {
        use ParserState::*;

        match next_state {
            ProcessMagic => {
                let signature = self.reader.read_str(3)?;
                if signature != "GIF" {
                    return Err(Error::InvalidSignature);
                }
                debug!("processed signature, got GIF");

                let version = Version::try_from(self.reader.read_str(3)?.as_str())?;
                debug!("processed version, got {:?}", version);

                Ok((ProcessLogicalScreenDescriptor(version), None))
            }
            ProcessLogicalScreenDescriptor(version) => {
                let screen_width = self.reader.read_u16()?;
                let screen_height = self.reader.read_u16()?;

                let packed_fields = self.reader.read_u8()?;

                // packed field start
                let global_color_table_flag = packed_fields & 0b10000000 != 0;
                let color_resolution = (packed_fields >> 4) & 0b00000111;
                let sort_flag = packed_fields & 0b00001000 != 0;
                let global_color_table_size = packed_fields & 0b00000111;
                // packed field end

                let background_color_index = self.reader.read_u8()?;
                let pixel_aspect_ratio = self.reader.read_u8()?;

                let logical_screen_descriptor = LogicalScreenDescriptor {
                    screen_width,
                    screen_height,
                    global_color_table_flag,
                    color_resolution,
                    sort_flag,
                    global_color_table_size,
                    background_color_index,
                    pixel_aspect_ratio,
                };

                debug!("processed logical screen descriptor, got: {:#?}", logical_screen_descriptor);

                if global_color_table_flag {
                    Ok((ProcessGlobalColorTable(version, logical_screen_descriptor), None))
                } else {
                    let header = GifHeader {
                        version,
                        logical_screen_descriptor,
                        global_color_table: None,
                    };
                    Ok((DetermineNextBlock(None), Some(Block::Header(header))))
                }
            }
            ProcessGlobalColorTable(version, logical_screen_descriptor) => {
                let global_color_table = ColorTable::read(
                    &mut self.reader,
                    logical_screen_descriptor.global_color_table_size,
                    logical_screen_descriptor.sort_flag,
                )?;
                debug!("processed global color table, got {} colors", global_color_table.len());

                let header = GifHeader {
                    version,
                    logical_screen_descriptor,
                    global_color_table: Some(global_color_table),
                };
                Ok((DetermineNextBlock(None), Some(Block::Header(header))))
            }
            ProcessTrailer => Ok((Done, Some(Block::Trailer))),
            DetermineNextBlock(graphic_control_extension) => {
                let introducer_or_label = self.reader.read_u8()?;

                match introducer_or_label {
                    // extension introducer means that a label follows determining what exact type
                    // of extension it is.
                    EXTENSION_INTRODUCER => {
                        let label = self.reader.read_u8()?;
                        Ok((ProcessExtension(label, graphic_control_extension), None))
                    }
                    IMAGE_DESCRIPTOR_LABEL => Ok((ProcessImageDescriptor(graphic_control_extension), None)),
                    TRAILER_LABEL => Ok((ProcessTrailer, None)),
                    label => Err(Error::UnexpectedLabel(label)),
                }
            }
            ProcessExtension(label, graphic_control_extension) => {
                self.process_extension(ExtensionType::from(label), graphic_control_extension)
            }
            ProcessImageDescriptor(graphic_control_extension) => {
                let left_position = self.reader.read_u16()?;
                let top_position = self.reader.read_u16()?;

                let width = self.reader.read_u16()?;
                let height = self.reader.read_u16()?;

                let packed_fields = self.reader.read_u8()?;

                let local_color_table_flag = packed_fields & 0b10000000 != 0;
                let interlace_flag = packed_fields & 0b01000000 != 0;
                let sort_flag = packed_fields & 0b00100000 != 0;
                let local_color_table_size = local_color_table_flag.then_some(packed_fields & 0b00000111);

                let pending = PendingImage {
                    extension: graphic_control_extension,
                    image: TableBasedImage {
                        left_position,
                        top_position,
                        width,
                        height,
                        interlace_flag,
                        sort_flag,
                        local_color_table: None,
                        lzw_minimum_code_size: 0,
                        lzw_size: 0,
                        image_indexes: None,
                        pixel_count: usize::from(width) * usize::from(height),
                    },
                    local_color_table_size,
                };

                if local_color_table_flag {
                    Ok((ProcessLocalColorTable(pending), None))
                } else {
                    Ok((ProcessImageData(pending), None))
                }
            }
            ProcessLocalColorTable(mut pending) => {
                if let Some(size) = pending.local_color_table_size {
                    pending.image.local_color_table =
                        Some(ColorTable::read(&mut self.reader, size, pending.image.sort_flag)?);
                }

                Ok((ProcessImageData(pending), None))
            }
            ProcessImageData(pending) => {
                let PendingImage { extension, mut image, .. } = pending;

                image.lzw_minimum_code_size = self.reader.read_u8()?;

                let mut indexes = vec![0; image.pixel_count];
                let outcome = self.lzw.0.decode(
                    image.lzw_minimum_code_size,
                    &mut SubBlockReader::new(&mut self.reader),
                    &mut indexes,
                )?;
                image.lzw_size = outcome.compressed;

                let frame = self.graphic_blocks;
                if let Some(code) = outcome.invalid_code {
                    self.record(Anomaly::InvalidLzwCode { frame, code });
                }
                if outcome.decoded != indexes.len() {
                    self.record(Anomaly::LzwLengthMismatch {
                        frame,
                        expected: indexes.len(),
                        actual: outcome.decoded,
                    });
                }

                if image.interlace_flag {
                    indexes = deinterlace(&indexes, image.width.into());
                }
                image.image_indexes = Some(indexes.into_boxed_slice());

                debug!(
                    "processed image {}x{} at {},{}, {} compressed bytes",
                    image.width, image.height, image.left_position, image.top_position, image.lzw_size
                );

                Ok((DetermineNextBlock(None), Some(self.graphic_block(extension, RenderBlock::Image(image)))))
            }
            Done => Ok((Done, None)),
        }
    }

    fn process_extension(
        &mut self,
        label: ExtensionType,
        pending: Option<GraphicControlExtension>,
    ) -> Result<(ParserState, Option<Block>)> {
        use ExtensionType::*;

        debug!("processing extension type: {:?}", label);
        match label {
            Application => {
                let application = self.process_application_extension()?;
                debug!("processed application block, got: {:?}", application.identifier);
                Ok((
                    ParserState::DetermineNextBlock(pending),
                    Some(Block::SpecialPurpose(SpecialPurposeExtension::Application(application))),
                ))
            }
            Comment => {
                // sequence of data sub-blocks
                let comment = SubBlockReader::new(&mut self.reader).to_latin1_string()?;
                let comment = comment.replace("\r\n", "\n").replace('\r', "\n");
                debug!("processed comment block, got: {}", comment);
                Ok((
                    ParserState::DetermineNextBlock(pending),
                    Some(Block::SpecialPurpose(SpecialPurposeExtension::Comment(comment))),
                ))
            }
            GraphicControl => {
                self.expect_block_size("graphic control extension", GRAPHIC_CONTROL_BLOCK_SIZE)?;

                let packed_fields = self.reader.read_u8()?;
                // packed fields definition
                // XXXYYYZW
                // XXX = reserved, not needed
                // YYY = disposal method, indicates what to do with graphic after displaying
                // Z = user input flag
                // W = transparent color flag

                let disposal_method = DisposalMethod::from_u8((packed_fields >> 2) & 0b00000111)
                    .unwrap_or_default();
                let user_input_flag = packed_fields & 0b00000010 != 0;
                let transparent_color_flag = packed_fields & 0b00000001 != 0;

                let delay_time = self.reader.read_u16()?;
                let transparent_color_index = self.reader.read_u8()?;

                // normally just the block terminator
                SubBlockReader::new(&mut self.reader).drain()?;

                let graphic_control_extension = GraphicControlExtension {
                    disposal_method,
                    user_input_flag,
                    transparent_color_flag,

                    delay_time,
                    transparent_color_index,
                };

                debug!("processed GraphicControlExtension: {:#?}", graphic_control_extension);

                if pending.is_some() {
                    debug!("graphic control extension replaces one that was never used");
                }

                Ok((
                    ParserState::DetermineNextBlock(Some(graphic_control_extension)),
                    Some(Block::GraphicControl(graphic_control_extension)),
                ))
            }
            PlainText => {
                self.expect_block_size("plain text extension", PLAIN_TEXT_BLOCK_SIZE)?;

                let left_position = self.reader.read_u16()?;
                let top_position = self.reader.read_u16()?;
                let width = self.reader.read_u16()?;
                let height = self.reader.read_u16()?;
                let cell_width = self.reader.read_u8()?;
                let cell_height = self.reader.read_u8()?;
                let foreground_color_index = self.reader.read_u8()?;
                let background_color_index = self.reader.read_u8()?;
                let text = SubBlockReader::new(&mut self.reader).to_latin1_string()?;

                let plain_text = PlainTextExtension {
                    left_position,
                    top_position,
                    width,
                    height,
                    cell_width,
                    cell_height,
                    foreground_color_index,
                    background_color_index,
                    text,
                };

                debug!("processed plain text extension, got: {:#?}", plain_text);

                Ok((
                    ParserState::DetermineNextBlock(None),
                    Some(self.graphic_block(pending, RenderBlock::PlainText(plain_text))),
                ))
            }
            Unknown(label) => {
                let data = SubBlockReader::new(&mut self.reader).to_bytes()?;
                debug!("processed unknown extension 0x{:02x}, {} bytes", label, data.len());
                Ok((
                    ParserState::DetermineNextBlock(pending),
                    Some(Block::SpecialPurpose(SpecialPurposeExtension::Unknown { label, data })),
                ))
            }
        }
    }

    fn process_application_extension(&mut self) -> Result<ApplicationExtension> {
        self.expect_block_size("application extension", APPLICATION_BLOCK_SIZE)?;

        let identifier = self.reader.read_str(8)?;
        let authentication_code = self.reader.read_str(3)?;

        let data = if identifier == NETSCAPE_IDENTIFIER {
            self.process_netscape_data(&identifier)?
        } else if identifier == XMP_IDENTIFIER && authentication_code == XMP_AUTHENTICATION_CODE {
            self.process_xmp_data()?
        } else {
            ApplicationData::Opaque(SubBlockReader::new(&mut self.reader).to_bytes()?)
        };

        Ok(ApplicationExtension {
            identifier,
            authentication_code,
            data,
        })
    }

    fn process_netscape_data(&mut self, identifier: &str) -> Result<ApplicationData> {
        let mut sub_blocks = SubBlockReader::new(&mut self.reader);
        let first = sub_blocks.next_sub_block()?;
        let trailing = sub_blocks.drain()?;

        let data = match first {
            Some([NETSCAPE_LOOP_SUB_BLOCK, low, high]) => {
                ApplicationData::LoopCount(u16::from_le_bytes([*low, *high]))
            }
            Some([NETSCAPE_BUFFER_SUB_BLOCK, a, b, c, d]) => {
                ApplicationData::BufferSize(u32::from_le_bytes([*a, *b, *c, *d]))
            }
            Some(other) => {
                self.record(Anomaly::UnexpectedApplicationSubBlock {
                    identifier: identifier.into(),
                    length: other.len(),
                });
                ApplicationData::Opaque(other.to_vec())
            }
            None => ApplicationData::Opaque(Vec::new()),
        };

        if trailing > 0 {
            self.record(Anomaly::UnexpectedApplicationSubBlock {
                identifier: identifier.into(),
                length: trailing,
            });
        }

        Ok(data)
    }

    fn process_xmp_data(&mut self) -> Result<ApplicationData> {
        let mut data = SubBlockReader::new(&mut self.reader).to_raw_bytes()?;

        if has_xmp_trailer(&data) {
            data.truncate(data.len() - XMP_TRAILER_LENGTH);
        } else {
            self.record(Anomaly::MalformedXmpTrailer { length: data.len() });
        }

        Ok(ApplicationData::Xmp(String::from_utf8_lossy(&data).into_owned()))
    }

    fn expect_block_size(&mut self, block: &'static str, expected: u8) -> Result<()> {
        let actual = self.reader.read_u8()?;
        if actual != expected {
            return Err(Error::UnexpectedBlockSize { block, expected, actual });
        }
        Ok(())
    }

    fn graphic_block(&mut self, extension: Option<GraphicControlExtension>, render_block: RenderBlock) -> Block {
        self.graphic_blocks += 1;
        Block::Graphic(GraphicBlock {
            extension,
            render_block,
        })
    }

    fn record(&mut self, anomaly: Anomaly) {
        warn!("{}", anomaly);
        self.anomalies.push(anomaly);
    }
}

impl<'a> Iterator for Decoder<'a> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_block() {
            Ok(block) => block.map(Ok),
            Err(err) => {
                self.state = ParserState::Done;
                Some(Err(err))
            }
        }
    }
}

fn has_xmp_trailer(data: &[u8]) -> bool {
    if data.len() < XMP_TRAILER_LENGTH {
        return false;
    }

    let trailer = &data[data.len() - XMP_TRAILER_LENGTH..];
    trailer[0] == 0x01
        && trailer[1..]
            .iter()
            .zip((0..=0xffu8).rev())
            .all(|(&actual, expected)| actual == expected)
}

// state payloads can hold whole color tables, only log the variant
struct StateName<'s>(&'s ParserState);

impl std::fmt::Debug for StateName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ParserState::*;

        let name = match self.0 {
            ProcessMagic => "ProcessMagic",
            ProcessLogicalScreenDescriptor(_) => "ProcessLogicalScreenDescriptor",
            ProcessGlobalColorTable(..) => "ProcessGlobalColorTable",
            ProcessTrailer => "ProcessTrailer",
            DetermineNextBlock(_) => "DetermineNextBlock",
            ProcessExtension(..) => "ProcessExtension",
            ProcessImageDescriptor(_) => "ProcessImageDescriptor",
            ProcessLocalColorTable(_) => "ProcessLocalColorTable",
            ProcessImageData(_) => "ProcessImageData",
            Done => "Done",
        };
        f.write_str(name)
    }
}
