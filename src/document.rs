use std::time::Duration;

use log::debug;

use crate::compositor::{composite_image, composite_plain_text, Canvas, GlyphRasterizer, Rect, Surface};
use crate::error::{Anomaly, Error, Result};
use crate::parser::{
    ApplicationData, Block, Decoder, DisposalMethod, GifHeader, GraphicBlock, GraphicControlExtension,
    LoopCount, RenderBlock, SpecialPurposeExtension, Version,
};

/// Converts a GIF delay in hundredths of a second.
pub fn centiseconds(value: u16) -> Duration {
    Duration::from_millis(u64::from(value) * 10)
}

/// Replacement for zero frame delays, in centiseconds.
///
/// Files that are GIF89a or declare a loop extension get `looping_default`,
/// older files get `legacy_default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPolicy {
    pub looping_default: u16,
    pub legacy_default: u16,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            looping_default: 10,
            legacy_default: 20,
        }
    }
}

impl DelayPolicy {
    pub fn zero_delay_for(&self, document: &GifDocument) -> u16 {
        if document.header.version == Version::V89a || document.loop_count.is_some() {
            self.looping_default
        } else {
            self.legacy_default
        }
    }

    pub fn resolve(&self, delay: u16, document: &GifDocument) -> u16 {
        match delay {
            0 => self.zero_delay_for(document),
            delay => delay,
        }
    }
}

/// One graphic rendering block of a document together with its lazily
/// composited pixels.
#[derive(Debug, Clone)]
pub struct Frame {
    index: usize,
    graphic: GraphicBlock,
    surface: Option<Surface>,
    // what the frame covered before it was drawn, kept for RestoreToPrevious
    snapshot: Option<Surface>,
}

impl Frame {
    fn new(index: usize, graphic: GraphicBlock) -> Self {
        Self {
            index,
            graphic,
            surface: None,
            snapshot: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn extension(&self) -> Option<&GraphicControlExtension> {
        self.graphic.extension.as_ref()
    }

    pub fn render_block(&self) -> &RenderBlock {
        &self.graphic.render_block
    }

    pub fn left(&self) -> u16 {
        match &self.graphic.render_block {
            RenderBlock::Image(image) => image.left_position,
            RenderBlock::PlainText(text) => text.left_position,
        }
    }

    pub fn top(&self) -> u16 {
        match &self.graphic.render_block {
            RenderBlock::Image(image) => image.top_position,
            RenderBlock::PlainText(text) => text.top_position,
        }
    }

    pub fn width(&self) -> u16 {
        match &self.graphic.render_block {
            RenderBlock::Image(image) => image.width,
            RenderBlock::PlainText(text) => text.width,
        }
    }

    pub fn height(&self) -> u16 {
        match &self.graphic.render_block {
            RenderBlock::Image(image) => image.height,
            RenderBlock::PlainText(text) => text.height,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(
            self.left().into(),
            self.top().into(),
            self.width().into(),
            self.height().into(),
        )
    }

    /// Raw delay in centiseconds, 0 without a graphic control extension.
    pub fn delay_time(&self) -> u16 {
        self.extension().map_or(0, |extension| extension.delay_time)
    }

    pub fn user_input(&self) -> bool {
        self.extension().is_some_and(|extension| extension.user_input_flag)
    }

    pub fn disposal(&self) -> DisposalMethod {
        self.extension()
            .map_or(DisposalMethod::Unspecified, |extension| extension.disposal_method)
    }

    pub fn transparent_index(&self) -> Option<u8> {
        self.extension().and_then(GraphicControlExtension::transparent_index)
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    pub fn is_composited(&self) -> bool {
        self.surface.is_some()
    }

    /// Composites the frame on first use. Image frames drop their index
    /// buffer afterwards.
    pub fn composite(&mut self, header: &GifHeader, glyphs: &mut dyn GlyphRasterizer) -> Result<&Surface> {
        let surface = match self.surface.take() {
            Some(surface) => surface,
            None => self.render(header, glyphs)?,
        };
        Ok(&*self.surface.insert(surface))
    }

    fn render(&mut self, header: &GifHeader, glyphs: &mut dyn GlyphRasterizer) -> Result<Surface> {
        let frame = self.index;
        let transparent = self.transparent_index();
        let mut surface = Surface::new(self.width().into(), self.height().into());

        match &mut self.graphic.render_block {
            RenderBlock::Image(image) => {
                let table = image
                    .local_color_table
                    .as_ref()
                    .or(header.global_color_table.as_ref())
                    .ok_or(Error::MissingColorTable { frame })?;

                composite_image(image, table, transparent, &mut surface);
                image.image_indexes = None;
            }
            RenderBlock::PlainText(text) => {
                let table = header
                    .global_color_table
                    .as_ref()
                    .ok_or(Error::MissingColorTable { frame })?;

                composite_plain_text(text, table, transparent, glyphs, &mut surface);
            }
        }

        debug!("composited frame {}, {}x{}", frame, surface.width(), surface.height());
        Ok(surface)
    }

    /// Draws the frame onto `canvas`, first saving the covered area when the
    /// frame is to be restored to previous.
    pub fn blit<C: Canvas + ?Sized>(
        &mut self,
        canvas: &mut C,
        header: &GifHeader,
        glyphs: &mut dyn GlyphRasterizer,
    ) -> Result<()> {
        let rect = self.rect();
        if self.disposal() == DisposalMethod::RestoreToPrevious {
            self.snapshot = Some(canvas.snapshot(rect));
        }

        let surface = self.composite(header, glyphs)?;
        canvas.draw_surface(surface, rect.x, rect.y);
        Ok(())
    }

    /// Applies the frame's disposal method to `canvas`.
    pub fn repair<C: Canvas + ?Sized>(&self, canvas: &mut C) {
        match self.disposal() {
            DisposalMethod::RestoreToBackgroundColor => canvas.clear_rect(self.rect()),
            DisposalMethod::RestoreToPrevious => {
                if let Some(snapshot) = &self.snapshot {
                    canvas.restore(snapshot, usize::from(self.left()), usize::from(self.top()));
                }
            }
            DisposalMethod::Unspecified | DisposalMethod::DoNotDispose => {}
        }
    }
}

/// A fully decoded GIF file.
#[derive(Debug, Clone)]
pub struct GifDocument {
    pub header: GifHeader,
    pub frames: Vec<Frame>,
    /// `None` when the file declares no loop extension.
    pub loop_count: Option<LoopCount>,
    pub comments: Vec<String>,
    pub xmp: Option<String>,
    /// Comments, application and unknown extensions in file order.
    pub special_purpose_extensions: Vec<SpecialPurposeExtension>,
    pub byte_length: usize,
    pub anomalies: Vec<Anomaly>,
}

impl GifDocument {
    pub fn width(&self) -> u16 {
        self.header.width()
    }

    pub fn height(&self) -> u16 {
        self.header.height()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// Total play time of one pass with zero delays replaced through `policy`.
    pub fn duration(&self, policy: &DelayPolicy) -> Duration {
        self.frames
            .iter()
            .map(|frame| centiseconds(policy.resolve(frame.delay_time(), self)))
            .sum()
    }
}

/// Decodes a complete GIF file.
///
/// Structural errors and frames without a usable color table abort decoding.
/// Recoverable problems end up in [`GifDocument::anomalies`].
pub fn decode(buf: &[u8]) -> Result<GifDocument> {
    let mut decoder = Decoder::new(buf);

    let header = match decoder.next_block()? {
        Some(Block::Header(header)) => header,
        _ => return Err(Error::InvalidSignature),
    };

    let mut frames = Vec::new();
    let mut loop_count = None;
    let mut comments = Vec::new();
    let mut xmp = None;
    let mut special_purpose_extensions = Vec::new();

    while let Some(block) = decoder.next_block()? {
        match block {
            Block::Graphic(graphic) => {
                let frame = frames.len();
                let has_table = match &graphic.render_block {
                    RenderBlock::Image(image) => {
                        image.local_color_table.is_some() || header.global_color_table.is_some()
                    }
                    RenderBlock::PlainText(_) => header.global_color_table.is_some(),
                };
                if !has_table {
                    return Err(Error::MissingColorTable { frame });
                }

                frames.push(Frame::new(frame, graphic));
            }
            Block::SpecialPurpose(extension) => {
                match &extension {
                    SpecialPurposeExtension::Comment(text) => comments.push(text.clone()),
                    SpecialPurposeExtension::Application(application) => match &application.data {
                        ApplicationData::LoopCount(count) => loop_count = Some(LoopCount::from(*count)),
                        ApplicationData::Xmp(text) => xmp = Some(text.clone()),
                        ApplicationData::BufferSize(_) | ApplicationData::Opaque(_) => {}
                    },
                    SpecialPurposeExtension::Unknown { .. } => {}
                }
                special_purpose_extensions.push(extension);
            }
            // control extensions arrive attached to their graphic block
            Block::GraphicControl(_) | Block::Header(_) => {}
            Block::Trailer => break,
        }
    }

    let document = GifDocument {
        header,
        frames,
        loop_count,
        comments,
        xmp,
        special_purpose_extensions,
        byte_length: decoder.position(),
        anomalies: decoder.take_anomalies(),
    };

    debug!(
        "decoded {}x{} document with {} frame(s), {} anomalies",
        document.width(),
        document.height(),
        document.frame_count(),
        document.anomalies.len()
    );

    Ok(document)
}
