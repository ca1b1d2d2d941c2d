mod block;
mod decoder;
mod interlace;
mod lzw;

pub use block::{
    ApplicationData, ApplicationExtension, Block, ColorTable, GifHeader, GraphicBlock,
    GraphicControlExtension, LogicalScreenDescriptor, LoopCount, PlainTextExtension, RenderBlock,
    Rgb, SpecialPurposeExtension, TableBasedImage, Version,
};
pub use decoder::Decoder;
pub use interlace::{deinterlace, interlaced_row_order};
pub use lzw::{LzwDecoder, LzwOutcome};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisposalMethod {
    #[default]
    Unspecified = 0,
    DoNotDispose = 1,
    RestoreToBackgroundColor = 2,
    RestoreToPrevious = 3,
}

impl DisposalMethod {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DisposalMethod::Unspecified),
            1 => Some(DisposalMethod::DoNotDispose),
            2 => Some(DisposalMethod::RestoreToBackgroundColor),
            3 => Some(DisposalMethod::RestoreToPrevious),
            _ => None,
        }
    }
}
