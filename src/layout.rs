//! Cursor-driven layout over a [`Canvas`].
//!
//! All coordinates are measured from the top-left corner of the page. The
//! cursor moves down as content is placed; whenever the next piece would
//! cross the bottom margin a new page is started and the running
//! header/footer hooks fire.

use std::sync::Arc;

use crate::canvas::{Canvas, Document};
use crate::font::FontRegistry;
use crate::images::DecodedImage;
use crate::metrics::{FontSpec, measure_text_width, wrap_lines, wrapped_line_count};
use crate::running::RunningDecorations;
use crate::types::{Color, Margins, Pt, Rect, Size};

const CELL_PADDING_MM: f32 = 1.0;
const LINE_WIDTH_MM: f32 = 0.2;
// Bezier control distance for a quarter circle.
const KAPPA: f32 = 0.552_284_8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageCursor {
    pub x: Pt,
    pub y: Pt,
    pub page_number: u32,
    pub margins: Margins,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellStyle {
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
    pub radius: Pt,
}

impl CellStyle {
    pub const PLAIN: CellStyle = CellStyle {
        fill: None,
        stroke: None,
        radius: Pt::ZERO,
    };

    pub fn bordered(stroke: Color) -> Self {
        Self {
            stroke: Some(stroke),
            ..Self::PLAIN
        }
    }

    pub fn filled(fill: Color) -> Self {
        Self {
            fill: Some(fill),
            ..Self::PLAIN
        }
    }

    pub fn with_stroke(mut self, stroke: Color) -> Self {
        self.stroke = Some(stroke);
        self
    }

    pub fn rounded(mut self, radius: Pt) -> Self {
        self.radius = radius;
        self
    }
}

/// Top edge of a single text line vertically centred in a cell.
pub fn text_top(cell_y: Pt, cell_height: Pt, font_size: Pt) -> Pt {
    cell_y + cell_height / 2 - font_size.mul_ratio(7, 10)
}

pub struct LayoutContext {
    canvas: Canvas,
    cursor: PageCursor,
    running: RunningDecorations,
    font: FontSpec,
    text_color: Color,
    line_width: Pt,
    cell_padding: Pt,
}

impl LayoutContext {
    /// The footer reserve is folded into the bottom margin once, before the
    /// first page exists.
    pub fn new(page_size: Size, margins: Margins, running: RunningDecorations) -> Self {
        Self::with_fonts(page_size, margins, running, Arc::new(FontRegistry::base14()))
    }

    pub fn with_fonts(
        page_size: Size,
        margins: Margins,
        running: RunningDecorations,
        fonts: Arc<FontRegistry>,
    ) -> Self {
        let mut margins = margins;
        margins.bottom += running.footer_reserve(page_size);
        Self {
            canvas: Canvas::with_fonts(page_size, fonts),
            cursor: PageCursor {
                x: margins.left,
                y: margins.top,
                page_number: 0,
                margins,
            },
            running,
            font: FontSpec::regular(10.0),
            text_color: Color::BLACK,
            line_width: Pt::from_mm(LINE_WIDTH_MM),
            cell_padding: Pt::from_mm(CELL_PADDING_MM),
        }
    }

    pub fn page_size(&self) -> Size {
        self.canvas.page_size()
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    pub fn margins(&self) -> Margins {
        self.cursor.margins
    }

    pub fn page_number(&self) -> u32 {
        self.cursor.page_number
    }

    pub fn cell_padding(&self) -> Pt {
        self.cell_padding
    }

    pub fn usable_width(&self) -> Pt {
        let m = self.cursor.margins;
        self.page_size().width - m.left - m.right
    }

    pub fn usable_height(&self) -> Pt {
        let m = self.cursor.margins;
        self.page_size().height - m.top - m.bottom
    }

    /// Lowest y that content may reach on the current page.
    pub fn content_bottom(&self) -> Pt {
        self.page_size().height - self.cursor.margins.bottom
    }

    pub fn right_edge(&self) -> Pt {
        self.page_size().width - self.cursor.margins.right
    }

    pub fn add_page(&mut self) {
        if self.cursor.page_number > 0 {
            self.finish_page();
        }
        self.cursor.page_number += 1;
        if let Some(top) = self
            .running
            .render_header(&mut self.canvas, self.cursor.page_number)
        {
            self.cursor.margins.top = top;
        }
        self.cursor.x = self.cursor.margins.left;
        self.cursor.y = self.cursor.margins.top;
        tracing::debug!(page = self.cursor.page_number, "started page");
    }

    fn finish_page(&mut self) {
        self.running
            .render_footer(&mut self.canvas, self.cursor.page_number);
        self.canvas.show_page();
    }

    pub fn finish(mut self) -> Document {
        if self.cursor.page_number == 0 {
            self.add_page();
        }
        self.finish_page();
        self.canvas.finish()
    }

    pub fn font(&self) -> FontSpec {
        self.font
    }

    pub fn set_font(&mut self, font: FontSpec) {
        self.font = font;
    }

    pub fn fonts(&self) -> &FontRegistry {
        self.canvas.fonts()
    }

    /// The current font as `text` will actually be drawn: switched to the
    /// embedded face when the text needs one.
    pub fn text_font(&self, text: &str) -> FontSpec {
        self.canvas.fonts().resolve(self.font, text)
    }

    pub fn set_text_color(&mut self, color: Color) {
        self.text_color = color;
    }

    pub fn x(&self) -> Pt {
        self.cursor.x
    }

    pub fn y(&self) -> Pt {
        self.cursor.y
    }

    pub fn set_xy(&mut self, x: Pt, y: Pt) {
        self.cursor.x = x;
        self.cursor.y = y;
    }

    /// Move to `y` and return x to the left margin.
    pub fn set_y(&mut self, y: Pt) {
        self.cursor.x = self.cursor.margins.left;
        self.cursor.y = y;
    }

    pub fn ln(&mut self, height: Pt) {
        self.cursor.x = self.cursor.margins.left;
        self.cursor.y += height;
    }

    fn at_page_top(&self) -> bool {
        self.cursor.y <= self.cursor.margins.top
    }

    /// Start a new page if `height` does not fit above the bottom margin.
    /// A fresh page is never broken again, so oversized content overflows
    /// instead of looping. Returns whether a page was started.
    pub fn ensure_space(&mut self, height: Pt) -> bool {
        if self.cursor.page_number == 0 {
            self.add_page();
            return true;
        }
        if self.cursor.y + height > self.content_bottom() && !self.at_page_top() {
            tracing::debug!(
                page = self.cursor.page_number,
                needed = height.to_f32(),
                "page break"
            );
            self.add_page();
            return true;
        }
        false
    }

    /// Number of lines `text` wraps to inside a cell of `width` in the
    /// current font. Does not move the cursor.
    pub fn measure_wrapped_line_count(&self, text: &str, width: Pt) -> usize {
        let font = self.text_font(text);
        wrapped_line_count(self.fonts(), font, text, width - self.cell_padding * 2)
    }

    /// One line of text from the cursor to the right margin, then move to
    /// the next line.
    pub fn text_line(&mut self, text: &str, height: Pt, align: Align) {
        self.ensure_space(height);
        let width = self.right_edge() - self.cursor.x;
        let font = self.text_font(text);
        let rect = Rect {
            x: self.cursor.x,
            y: self.cursor.y,
            width,
            height,
        };
        self.draw_text(rect, font, text, align);
        self.ln(height);
    }

    /// Wrapped paragraph from the cursor to the right margin. Each line is
    /// checked against the bottom margin so long text continues on the
    /// following pages.
    pub fn wrapped_text_block(&mut self, text: &str, line_height: Pt, align: Align) {
        let width = self.right_edge() - self.cursor.x;
        let font = self.text_font(text);
        let lines = wrap_lines(self.fonts(), font, text, width - self.cell_padding * 2);
        for line in &lines {
            self.ensure_space(line_height);
            let rect = Rect {
                x: self.cursor.x,
                y: self.cursor.y,
                width,
                height: line_height,
            };
            self.draw_text(rect, font, line, align);
            self.cursor.y += line_height;
        }
        self.cursor.x = self.cursor.margins.left;
    }

    /// Rectangle with optional fill/border and a single line of text. The
    /// cursor does not move.
    pub fn boxed_cell(&mut self, rect: Rect, style: CellStyle, text: &str, align: Align) {
        if style.fill.is_some() || style.stroke.is_some() {
            if let Some(fill) = style.fill {
                self.canvas.set_fill_color(fill);
            }
            if let Some(stroke) = style.stroke {
                self.canvas.set_stroke_color(stroke);
                self.canvas.set_line_width(self.line_width);
            }
            self.rect_path(rect, style.radius);
            match (style.fill, style.stroke) {
                (Some(_), Some(_)) => self.canvas.fill_stroke(),
                (Some(_), None) => self.canvas.fill(),
                _ => self.canvas.stroke(),
            }
        }
        let font = self.text_font(text);
        self.draw_text(rect, font, text, align);
    }

    /// Wrapped text inside a fixed cell, one line every `line_height`.
    /// Never breaks the page.
    pub fn wrapped_cell_text(&mut self, rect: Rect, text: &str, line_height: Pt) {
        let font = self.text_font(text);
        let lines = wrap_lines(self.fonts(), font, text, rect.width - self.cell_padding * 2);
        let mut y = rect.y;
        for line in &lines {
            let line_rect = Rect {
                y,
                height: line_height,
                ..rect
            };
            self.draw_text(line_rect, font, line, Align::Left);
            y += line_height;
        }
    }

    /// Horizontal rule at the cursor's y.
    pub fn hline(&mut self, x1: Pt, x2: Pt, color: Color) {
        let y = self.cursor.y;
        self.canvas.set_stroke_color(color);
        self.canvas.set_line_width(self.line_width);
        self.canvas.move_to(x1, y);
        self.canvas.line_to(x2, y);
        self.canvas.stroke();
    }

    /// Place an image. Zero-sized placements are skipped.
    pub fn image(&mut self, image: &DecodedImage, x: Pt, y: Pt, width: Pt, height: Pt) {
        if width <= Pt::ZERO || height <= Pt::ZERO {
            tracing::debug!(resource = image.resource_id(), "skipping zero-sized image");
            return;
        }
        self.canvas.draw_image(x, y, width, height, image);
    }

    fn draw_text(&mut self, rect: Rect, font: FontSpec, text: &str, align: Align) {
        if text.is_empty() {
            return;
        }
        let text_width = measure_text_width(self.fonts(), font, text);
        let text_x = match align {
            Align::Left => rect.x + self.cell_padding,
            Align::Center => rect.x + (rect.width - text_width) / 2,
            Align::Right => rect.x + rect.width - self.cell_padding - text_width,
        };
        self.canvas.set_font(font.face);
        self.canvas.set_font_size(font.size);
        self.canvas.set_fill_color(self.text_color);
        self.canvas
            .draw_string(text_x, text_top(rect.y, rect.height, font.size), text);
    }

    fn rect_path(&mut self, rect: Rect, radius: Pt) {
        let (x, y, w, h) = (rect.x, rect.y, rect.width, rect.height);
        let r = radius.min(w / 2).min(h / 2).max(Pt::ZERO);
        if r == Pt::ZERO {
            self.canvas.move_to(x, y);
            self.canvas.line_to(x + w, y);
            self.canvas.line_to(x + w, y + h);
            self.canvas.line_to(x, y + h);
            self.canvas.close_path();
            return;
        }
        let k = r * KAPPA;
        self.canvas.move_to(x + r, y);
        self.canvas.line_to(x + w - r, y);
        self.canvas
            .curve_to(x + w - r + k, y, x + w, y + r - k, x + w, y + r);
        self.canvas.line_to(x + w, y + h - r);
        self.canvas
            .curve_to(x + w, y + h - r + k, x + w - r + k, y + h, x + w - r, y + h);
        self.canvas.line_to(x + r, y + h);
        self.canvas
            .curve_to(x + r - k, y + h, x, y + h - r + k, x, y + h - r);
        self.canvas.line_to(x, y + r);
        self.canvas.curve_to(x, y + r - k, x + r - k, y, x + r, y);
        self.canvas.close_path();
    }
}
