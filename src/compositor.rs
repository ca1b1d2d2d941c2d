//! Turns decoded frames into RGBA pixels and describes the drawing
//! primitives a host canvas has to provide.

use crate::parser::{ColorTable, PlainTextExtension, Rgb, TableBasedImage};

const OPAQUE: u8 = 0xff;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    /// Part of `self` that lies within a `width` x `height` area anchored at the origin.
    pub fn clip(&self, width: usize, height: usize) -> Rect {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Rect {
            x,
            y,
            width: self.x.saturating_add(self.width).min(width) - x,
            height: self.y.saturating_add(self.height).min(height) - y,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Owned RGBA buffer, 8 bits per channel, rows top to bottom.
#[derive(Clone, PartialEq, Eq)]
pub struct Surface {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Surface {
    /// Fully transparent surface.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 4],
        }
    }

    pub fn filled(width: usize, height: usize, rgba: [u8; 4]) -> Self {
        let mut surface = Self::new(width, height);
        surface.fill(rgba);
        surface
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = (y * self.width + x) * 4;
        Some([self.data[at], self.data[at + 1], self.data[at + 2], self.data[at + 3]])
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, rgba: [u8; 4]) {
        if x < self.width && y < self.height {
            let at = (y * self.width + x) * 4;
            self.data[at..at + 4].copy_from_slice(&rgba);
        }
    }

    pub fn fill(&mut self, rgba: [u8; 4]) {
        for pixel in self.data.chunks_exact_mut(4) {
            pixel.copy_from_slice(&rgba);
        }
    }

    fn row_mut(&mut self, y: usize, x: usize, width: usize) -> &mut [u8] {
        let start = (y * self.width + x) * 4;
        &mut self.data[start..start + width * 4]
    }

    fn row(&self, y: usize, x: usize, width: usize) -> &[u8] {
        let start = (y * self.width + x) * 4;
        &self.data[start..start + width * 4]
    }
}

/// Drawing primitives the player renders through. Every operation clips to
/// the canvas bounds.
pub trait Canvas {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Resizes the canvas, discarding its content.
    fn resize(&mut self, width: usize, height: usize);

    /// Draws `surface` with its top left corner at `(x, y)`. Pixels with zero
    /// alpha leave the canvas untouched, all others replace it.
    fn draw_surface(&mut self, surface: &Surface, x: usize, y: usize);

    /// Resets `rect` to transparent black.
    fn clear_rect(&mut self, rect: Rect);

    fn fill_rect(&mut self, rect: Rect, color: Rgb);

    /// Copies `rect` out of the canvas.
    fn snapshot(&self, rect: Rect) -> Surface;

    /// Writes a snapshot back verbatim, alpha included.
    fn restore(&mut self, snapshot: &Surface, x: usize, y: usize);
}

impl Canvas for Surface {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn resize(&mut self, width: usize, height: usize) {
        *self = Surface::new(width, height);
    }

    fn draw_surface(&mut self, surface: &Surface, x: usize, y: usize) {
        let area = Rect::new(x, y, surface.width, surface.height).clip(self.width, self.height);

        for row in 0..area.height {
            let source = surface.row(row, 0, area.width);
            let target = self.row_mut(area.y + row, area.x, area.width);

            for (to, from) in target.chunks_exact_mut(4).zip(source.chunks_exact(4)) {
                if from[3] != 0 {
                    to.copy_from_slice(from);
                }
            }
        }
    }

    fn clear_rect(&mut self, rect: Rect) {
        let area = rect.clip(self.width, self.height);
        for row in area.y..area.y + area.height {
            self.row_mut(row, area.x, area.width).fill(0);
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgb) {
        let area = rect.clip(self.width, self.height);
        let rgba = [color[0], color[1], color[2], OPAQUE];
        for row in area.y..area.y + area.height {
            for pixel in self.row_mut(row, area.x, area.width).chunks_exact_mut(4) {
                pixel.copy_from_slice(&rgba);
            }
        }
    }

    fn snapshot(&self, rect: Rect) -> Surface {
        let area = rect.clip(self.width, self.height);
        let mut snapshot = Surface::new(area.width, area.height);
        for row in 0..area.height {
            snapshot
                .row_mut(row, 0, area.width)
                .copy_from_slice(self.row(area.y + row, area.x, area.width));
        }
        snapshot
    }

    fn restore(&mut self, snapshot: &Surface, x: usize, y: usize) {
        let area = Rect::new(x, y, snapshot.width, snapshot.height).clip(self.width, self.height);
        for row in 0..area.height {
            self.row_mut(area.y + row, area.x, area.width)
                .copy_from_slice(snapshot.row(row, 0, area.width));
        }
    }
}

/// Resolves the pixel indexes of `image` through `table` into `surface`.
///
/// The surface is expected to be frame sized. Transparent indexes and indexes
/// past the end of the table are skipped, so whatever the surface held there
/// stays. Everything else is written fully opaque.
pub fn composite_image(
    image: &TableBasedImage,
    table: &ColorTable,
    transparent: Option<u8>,
    surface: &mut Surface,
) {
    let Some(indexes) = image.image_indexes.as_deref() else {
        return;
    };

    for (pixel, &index) in surface.data.chunks_exact_mut(4).zip(indexes) {
        if Some(index) == transparent {
            continue;
        }
        if let Some([r, g, b]) = table.get(index) {
            pixel.copy_from_slice(&[r, g, b, OPAQUE]);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphPlacement {
    pub ch: char,
    /// Offset of the character cell inside the text frame.
    pub x: usize,
    pub y: usize,
}

/// Draws single characters of a plain text extension. Font selection is left
/// to the implementation.
pub trait GlyphRasterizer {
    fn draw_glyph(&mut self, surface: &mut Surface, glyph: &GlyphPlacement, cell: (usize, usize), color: Rgb);
}

/// Rasterizer that draws nothing; text frames only show their background.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGlyphs;

impl GlyphRasterizer for NoGlyphs {
    fn draw_glyph(&mut self, _: &mut Surface, _: &GlyphPlacement, _: (usize, usize), _: Rgb) {}
}

/// Draws every visible character as a filled box inset by one pixel.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockGlyphs;

impl GlyphRasterizer for BlockGlyphs {
    fn draw_glyph(&mut self, surface: &mut Surface, glyph: &GlyphPlacement, cell: (usize, usize), color: Rgb) {
        if glyph.ch == ' ' {
            return;
        }

        let (width, height) = cell;
        let rect = Rect::new(
            glyph.x + 1,
            glyph.y + 1,
            width.saturating_sub(2),
            height.saturating_sub(2),
        );
        surface.fill_rect(rect, color);
    }
}

/// Lays out `text` on the character grid of the extension.
///
/// The grid is rounded down to whole cells. Characters outside 0x20..=0x7f
/// become spaces, running past the last column wraps to the next row and
/// layout ends once the next row falls outside the grid.
pub fn layout_text(text: &PlainTextExtension) -> Vec<GlyphPlacement> {
    let cell_width = usize::from(text.cell_width);
    let cell_height = usize::from(text.cell_height);
    if cell_width == 0 || cell_height == 0 {
        return Vec::new();
    }

    let left_max = usize::from(text.width) / cell_width * cell_width;
    let top_max = usize::from(text.height) / cell_height * cell_height;
    if left_max == 0 || top_max == 0 {
        return Vec::new();
    }

    let mut placements = Vec::new();
    let (mut x, mut y) = (0, 0);

    for ch in text.text.chars() {
        let ch = if (' '..='\u{7f}').contains(&ch) { ch } else { ' ' };
        placements.push(GlyphPlacement { ch, x, y });

        x += cell_width;
        if x >= left_max {
            x = 0;
            y += cell_height;
            if y >= top_max {
                break;
            }
        }
    }

    placements
}

/// Renders a plain text extension into a frame sized `surface` using the
/// global color table.
pub fn composite_plain_text(
    text: &PlainTextExtension,
    table: &ColorTable,
    transparent: Option<u8>,
    glyphs: &mut dyn GlyphRasterizer,
    surface: &mut Surface,
) {
    if Some(text.background_color_index) != transparent {
        if let Some(background) = table.get(text.background_color_index) {
            let bounds = surface.bounds();
            surface.fill_rect(bounds, background);
        }
    }

    if Some(text.foreground_color_index) == transparent {
        return;
    }
    let Some(foreground) = table.get(text.foreground_color_index) else {
        return;
    };

    let cell = (usize::from(text.cell_width), usize::from(text.cell_height));
    for placement in layout_text(text) {
        glyphs.draw_glyph(surface, &placement, cell, foreground);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ByteReader;

    const SENTINEL: [u8; 4] = [1, 2, 3, 4];

    fn table(colors: &[Rgb]) -> ColorTable {
        let bytes: Vec<u8> = colors.iter().flatten().copied().collect();
        let size_bits = (colors.len().trailing_zeros() - 1) as u8;
        ColorTable::read(&mut ByteReader::new(&bytes), size_bits, false).unwrap()
    }

    fn image(width: u16, height: u16, indexes: &[u8]) -> TableBasedImage {
        TableBasedImage {
            left_position: 0,
            top_position: 0,
            width,
            height,
            interlace_flag: false,
            sort_flag: false,
            local_color_table: None,
            lzw_minimum_code_size: 2,
            lzw_size: 0,
            image_indexes: Some(indexes.into()),
            pixel_count: indexes.len(),
        }
    }

    fn text(width: u16, height: u16, cell: (u8, u8), text: &str) -> PlainTextExtension {
        PlainTextExtension {
            left_position: 0,
            top_position: 0,
            width,
            height,
            cell_width: cell.0,
            cell_height: cell.1,
            foreground_color_index: 1,
            background_color_index: 0,
            text: text.into(),
        }
    }

    #[derive(Default)]
    struct RecordingGlyphs(Vec<(GlyphPlacement, Rgb)>);

    impl GlyphRasterizer for RecordingGlyphs {
        fn draw_glyph(&mut self, _: &mut Surface, glyph: &GlyphPlacement, _: (usize, usize), color: Rgb) {
            self.0.push((*glyph, color));
        }
    }

    #[test]
    fn transparent_pixels_keep_what_was_there() {
        let palette = table(&[[10, 10, 10], [200, 0, 0], [0, 200, 0], [0, 0, 200]]);
        let mut surface = Surface::filled(2, 2, SENTINEL);

        composite_image(&image(2, 2, &[0, 1, 2, 3]), &palette, Some(2), &mut surface);

        assert_eq!(surface.pixel(0, 0), Some([10, 10, 10, 0xff]));
        assert_eq!(surface.pixel(1, 0), Some([200, 0, 0, 0xff]));
        assert_eq!(surface.pixel(0, 1), Some(SENTINEL));
        assert_eq!(surface.pixel(1, 1), Some([0, 0, 200, 0xff]));
    }

    #[test]
    fn indexes_past_the_table_are_skipped() {
        let palette = table(&[[9, 9, 9], [8, 8, 8]]);
        let mut surface = Surface::filled(2, 1, SENTINEL);

        composite_image(&image(2, 1, &[1, 7]), &palette, None, &mut surface);

        assert_eq!(surface.pixel(0, 0), Some([8, 8, 8, 0xff]));
        assert_eq!(surface.pixel(1, 0), Some(SENTINEL));
    }

    #[test]
    fn draw_surface_skips_transparent_source_pixels() {
        let mut canvas = Surface::filled(3, 3, SENTINEL);
        let mut sprite = Surface::new(2, 2);
        sprite.set_pixel(0, 0, [5, 5, 5, 0xff]);
        sprite.set_pixel(1, 1, [6, 6, 6, 0xff]);

        canvas.draw_surface(&sprite, 2, 2);

        assert_eq!(canvas.pixel(2, 2), Some([5, 5, 5, 0xff]));
        assert_eq!(canvas.pixel(1, 1), Some(SENTINEL));

        canvas.draw_surface(&sprite, 0, 0);
        assert_eq!(canvas.pixel(0, 0), Some([5, 5, 5, 0xff]));
        assert_eq!(canvas.pixel(1, 0), Some(SENTINEL));
        assert_eq!(canvas.pixel(1, 1), Some([6, 6, 6, 0xff]));
    }

    #[test]
    fn snapshot_and_restore_round_trip_a_region() {
        let mut canvas = Surface::filled(4, 4, SENTINEL);
        canvas.fill_rect(Rect::new(1, 1, 2, 2), [7, 7, 7]);
        let before = canvas.clone();

        let snapshot = canvas.snapshot(Rect::new(1, 1, 5, 2));
        assert_eq!((snapshot.width(), snapshot.height()), (3, 2));

        canvas.clear_rect(Rect::new(0, 0, 4, 4));
        canvas.fill_rect(Rect::new(2, 2, 9, 9), [1, 1, 1]);
        canvas.restore(&snapshot, 1, 1);

        for y in 1..3 {
            for x in 1..4 {
                assert_eq!(canvas.pixel(x, y), before.pixel(x, y));
            }
        }
        assert_eq!(canvas.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(3, 3), Some([1, 1, 1, 0xff]));
    }

    #[test]
    fn rect_clipping() {
        assert_eq!(Rect::new(3, 3, 4, 4).clip(5, 5), Rect::new(3, 3, 2, 2));
        assert!(Rect::new(9, 0, 4, 4).clip(5, 5).is_empty());
        assert_eq!(Rect::new(0, 0, 2, 2).clip(5, 5), Rect::new(0, 0, 2, 2));
    }

    #[test]
    fn layout_wraps_and_substitutes() {
        let placements = layout_text(&text(10, 12, (4, 6), "ab\u{1}de"));

        let chars: Vec<char> = placements.iter().map(|p| p.ch).collect();
        let origins: Vec<(usize, usize)> = placements.iter().map(|p| (p.x, p.y)).collect();

        // two columns of 4 fit in 10 pixels, two rows of 6 in 12
        assert_eq!(chars, vec!['a', 'b', ' ', 'd']);
        assert_eq!(origins, vec![(0, 0), (4, 0), (0, 6), (4, 6)]);
    }

    #[test]
    fn layout_of_degenerate_grids_is_empty() {
        assert!(layout_text(&text(10, 10, (0, 4), "abc")).is_empty());
        assert!(layout_text(&text(10, 10, (4, 0), "abc")).is_empty());
        assert!(layout_text(&text(3, 10, (4, 4), "abc")).is_empty());
        assert!(layout_text(&text(10, 3, (4, 4), "abc")).is_empty());
    }

    #[test]
    fn plain_text_fills_background_and_draws_glyphs() {
        let palette = table(&[[0, 0, 90], [250, 250, 250]]);
        let mut surface = Surface::new(8, 4);
        let mut glyphs = RecordingGlyphs::default();

        composite_plain_text(&text(8, 4, (4, 4), "ok"), &palette, None, &mut glyphs, &mut surface);

        assert_eq!(surface.pixel(7, 3), Some([0, 0, 90, 0xff]));
        assert_eq!(glyphs.0.len(), 2);
        assert_eq!(glyphs.0[1], (GlyphPlacement { ch: 'k', x: 4, y: 0 }, [250, 250, 250]));
    }

    #[test]
    fn plain_text_honours_transparent_colors() {
        let palette = table(&[[0, 0, 90], [250, 250, 250]]);

        let mut surface = Surface::new(8, 4);
        let mut glyphs = RecordingGlyphs::default();
        composite_plain_text(&text(8, 4, (4, 4), "ok"), &palette, Some(0), &mut glyphs, &mut surface);
        assert_eq!(surface.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(glyphs.0.len(), 2);

        let mut surface = Surface::new(8, 4);
        let mut glyphs = RecordingGlyphs::default();
        composite_plain_text(&text(8, 4, (4, 4), "ok"), &palette, Some(1), &mut glyphs, &mut surface);
        assert_eq!(surface.pixel(0, 0), Some([0, 0, 90, 0xff]));
        assert!(glyphs.0.is_empty());
    }

    #[test]
    fn block_glyphs_fill_inset_cells() {
        let mut surface = Surface::new(8, 4);
        BlockGlyphs.draw_glyph(&mut surface, &GlyphPlacement { ch: 'x', x: 4, y: 0 }, (4, 4), [3, 3, 3]);
        BlockGlyphs.draw_glyph(&mut surface, &GlyphPlacement { ch: ' ', x: 0, y: 0 }, (4, 4), [3, 3, 3]);

        assert_eq!(surface.pixel(5, 1), Some([3, 3, 3, 0xff]));
        assert_eq!(surface.pixel(4, 0), Some([0, 0, 0, 0]));
        assert_eq!(surface.pixel(1, 1), Some([0, 0, 0, 0]));
    }
}
