use std::sync::Arc;

use crate::canvas::Canvas;
use crate::images::DecodedImage;
use crate::metrics::{FontSpec, measure_text_width};
use crate::types::{Color, Pt, Size};

const PAGE_LABEL_FONT_SIZE: f32 = 9.0;
const PAGE_LABEL_OFFSET_MM: f32 = 10.0;
const PAGE_LABEL_HEIGHT_MM: f32 = 5.0;

/// Branding drawn on every page after the cover. Both images span the full
/// page width and keep their aspect ratio.
#[derive(Debug, Clone, Default)]
pub struct RunningDecorations {
    header: Option<DecodedImage>,
    footer: Option<DecodedImage>,
    page_label: String,
    header_gutter: Pt,
    footer_gutter: Pt,
}

impl RunningDecorations {
    pub fn new(
        header: Option<DecodedImage>,
        footer: Option<DecodedImage>,
        page_label: impl Into<String>,
        header_gutter: Pt,
        footer_gutter: Pt,
    ) -> Self {
        Self {
            header,
            footer,
            page_label: page_label.into(),
            header_gutter,
            footer_gutter,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn has_header(&self) -> bool {
        self.header.is_some()
    }

    pub fn has_footer(&self) -> bool {
        self.footer.is_some()
    }

    /// Extra bottom margin needed so flowing content stays clear of the
    /// footer image. Zero without a footer.
    pub fn footer_reserve(&self, page_size: Size) -> Pt {
        match &self.footer {
            Some(footer) => full_width_height(footer, page_size) + self.footer_gutter,
            None => Pt::ZERO,
        }
    }

    /// Draw the header image at the top edge. Returns the top margin the
    /// page content must start below, or `None` when nothing was drawn.
    pub fn render_header(&self, canvas: &mut Canvas, page_number: u32) -> Option<Pt> {
        if page_number <= 1 {
            return None;
        }
        let header = self.header.as_ref()?;
        let page_size = canvas.page_size();
        let height = full_width_height(header, page_size);
        canvas.draw_image(Pt::ZERO, Pt::ZERO, page_size.width, height, header);
        Some(height + self.header_gutter)
    }

    /// Draw the footer image against the bottom edge with the page number
    /// label above it.
    pub fn render_footer(&self, canvas: &mut Canvas, page_number: u32) {
        if page_number <= 1 {
            return;
        }
        let Some(footer) = self.footer.as_ref() else {
            return;
        };
        let page_size = canvas.page_size();
        let height = full_width_height(footer, page_size);
        canvas.draw_image(
            Pt::ZERO,
            page_size.height - height,
            page_size.width,
            height,
            footer,
        );

        let label = format!("{} {}", self.page_label, page_number);
        let fonts = Arc::clone(canvas.fonts());
        let font = fonts.resolve(FontSpec::regular(PAGE_LABEL_FONT_SIZE), &label);
        let width = measure_text_width(&fonts, font, &label);
        let cell_top = page_size.height - Pt::from_mm(PAGE_LABEL_OFFSET_MM);
        let cell_height = Pt::from_mm(PAGE_LABEL_HEIGHT_MM);
        canvas.set_font(font.face);
        canvas.set_font_size(font.size);
        canvas.set_fill_color(Color::BLACK);
        canvas.draw_string(
            (page_size.width - width) / 2,
            crate::layout::text_top(cell_top, cell_height, font.size),
            label,
        );
    }
}

fn full_width_height(image: &DecodedImage, page_size: Size) -> Pt {
    Pt::from_f32(image.scaled_height(page_size.width.to_f32()))
}
