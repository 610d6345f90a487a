use crate::layout::{Align, CellStyle, LayoutContext};
use crate::locale::Localizer;
use crate::metrics::FontSpec;
use crate::model::ActionItem;
use crate::types::{Color, Pt, Rect};

/// Action, owner, priority, due, status.
pub const ACTION_COLUMN_RATIOS: [f32; 5] = [0.40, 0.18, 0.12, 0.15, 0.15];

const HEADER_HEIGHT_MM: f32 = 8.0;
const LINE_HEIGHT_MM: f32 = 6.0;
const FONT_SIZE: f32 = 10.0;
const EMPTY_LINE_HEIGHT_MM: f32 = 7.0;

/// A bordered table whose columns are fractions of the usable width. Rows
/// grow to fit their tallest cell; the header is repeated on every page the
/// table reaches.
pub struct Table {
    headers: Vec<String>,
    ratios: Vec<f32>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, ratios: &[f32]) -> Self {
        Self {
            headers,
            ratios: ratios.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_widths(&self, usable: Pt) -> Vec<Pt> {
        self.ratios.iter().map(|ratio| usable * *ratio).collect()
    }

    fn row_height(&self, ctx: &LayoutContext, row: &[String], widths: &[Pt]) -> Pt {
        let lines = row
            .iter()
            .zip(widths)
            .map(|(text, width)| ctx.measure_wrapped_line_count(text, *width))
            .max()
            .unwrap_or(1)
            .max(1);
        Pt::from_mm(LINE_HEIGHT_MM) * lines as i32
    }

    pub fn render(&self, ctx: &mut LayoutContext) {
        let widths = self.column_widths(ctx.usable_width());
        let header_height = Pt::from_mm(HEADER_HEIGHT_MM);

        ctx.set_font(FontSpec::regular(FONT_SIZE));
        let first_row = self
            .rows
            .first()
            .map(|row| self.row_height(ctx, row, &widths))
            .unwrap_or(Pt::ZERO);
        ctx.ensure_space(header_height + first_row);
        self.render_header(ctx, &widths);

        for row in &self.rows {
            ctx.set_font(FontSpec::regular(FONT_SIZE));
            let height = self.row_height(ctx, row, &widths);
            if ctx.ensure_space(height) {
                self.render_header(ctx, &widths);
                ctx.set_font(FontSpec::regular(FONT_SIZE));
            }
            let y = ctx.y();
            let mut x = ctx.margins().left;
            for (text, width) in row.iter().zip(&widths) {
                let rect = Rect {
                    x,
                    y,
                    width: *width,
                    height,
                };
                ctx.boxed_cell(rect, CellStyle::bordered(Color::BLACK), "", Align::Left);
                ctx.wrapped_cell_text(rect, text, Pt::from_mm(LINE_HEIGHT_MM));
                x += *width;
            }
            ctx.ln(height);
        }
    }

    fn render_header(&self, ctx: &mut LayoutContext, widths: &[Pt]) {
        let height = Pt::from_mm(HEADER_HEIGHT_MM);
        ctx.set_font(FontSpec::bold(FONT_SIZE));
        ctx.set_text_color(Color::BLACK);
        let y = ctx.y();
        let mut x = ctx.margins().left;
        for (label, width) in self.headers.iter().zip(widths) {
            let rect = Rect {
                x,
                y,
                width: *width,
                height,
            };
            ctx.boxed_cell(rect, CellStyle::bordered(Color::BLACK), label, Align::Center);
            x += *width;
        }
        ctx.ln(height);
    }
}

/// Corrective actions as a five-column table, or a single localized line
/// when there are none.
pub fn render_actions_table(ctx: &mut LayoutContext, loc: &Localizer<'_>, actions: &[ActionItem]) {
    if actions.is_empty() {
        ctx.set_font(FontSpec::regular(FONT_SIZE));
        ctx.set_text_color(Color::BLACK);
        ctx.wrapped_text_block(
            &loc.t("No actions recorded."),
            Pt::from_mm(EMPTY_LINE_HEIGHT_MM),
            Align::Left,
        );
        return;
    }
    let headers = ["Action", "Owner", "Priority", "Due", "Status"]
        .iter()
        .map(|key| loc.t(key))
        .collect();
    let mut table = Table::new(headers, &ACTION_COLUMN_RATIOS);
    for action in actions {
        table.push_row(vec![
            action.action.clone(),
            action.owner.clone(),
            action.priority.clone(),
            loc.date(&action.due),
            action.status.clone(),
        ]);
    }
    table.render(ctx);
}
