//! Lays a [`ReportRecord`] out as pages.
//!
//! Sections always appear in the same order: cover, overview, details,
//! timeline, corrective actions, lessons learned, appendix. Optional
//! sections with no content are skipped entirely, leaving no gap.

use rayon::prelude::*;
use std::sync::Arc;

use crate::canvas::Document;
use crate::config::{ActionsLayout, RenderConfig};
use crate::font::FontRegistry;
use crate::images::{DecodedImage, decode_all, decode_data_url};
use crate::layout::{Align, CellStyle, LayoutContext};
use crate::locale::{LanguageTable, Localizer};
use crate::metrics::FontSpec;
use crate::model::{ActionItem, ReportRecord, TimelineEntry};
use crate::running::RunningDecorations;
use crate::table::render_actions_table;
use crate::types::{Color, Margins, Pt, Rect, Size};

const LABEL_FILL: Color = Color {
    r: 0.0,
    g: 75.0 / 255.0,
    b: 141.0 / 255.0,
};
const ACCENT: Color = Color {
    r: 0.0,
    g: 71.0 / 255.0,
    b: 133.0 / 255.0,
};

const BOILERPLATE: &str = "This report documents the incident occurrence, impact, response, and continuous improvement actions.";

fn mm(value: f32) -> Pt {
    Pt::from_mm(value)
}

#[derive(Debug, Clone)]
pub struct ComposeOptions {
    pub page_size: Size,
    pub margins: Margins,
    pub header_gutter: Pt,
    pub footer_gutter: Pt,
    pub actions_layout: ActionsLayout,
    pub default_language: String,
    pub fonts: Arc<FontRegistry>,
}

impl ComposeOptions {
    /// Layout settings from `config`. Fonts start as base-14 only; the
    /// renderer builder installs the configured registry.
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            page_size: config.page_size.size(),
            margins: config.margins.to_margins(),
            header_gutter: mm(config.header_gutter_mm),
            footer_gutter: mm(config.footer_gutter_mm),
            actions_layout: config.actions_layout,
            default_language: config.default_language.clone(),
            fonts: Arc::new(FontRegistry::base14()),
        }
    }
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

struct PreparedImages {
    logo: Option<DecodedImage>,
    header: Option<DecodedImage>,
    footer: Option<DecodedImage>,
    timeline: Vec<Vec<DecodedImage>>,
}

fn prepare_images(record: &ReportRecord) -> PreparedImages {
    let branding = &record.branding;
    let ((logo, header), (footer, timeline)) = rayon::join(
        || {
            rayon::join(
                || decode_data_url(&branding.logo),
                || decode_data_url(&branding.header),
            )
        },
        || {
            rayon::join(
                || decode_data_url(&branding.footer),
                || {
                    record
                        .timeline
                        .par_iter()
                        .map(|entry| decode_all(&entry.images))
                        .collect::<Vec<_>>()
                },
            )
        },
    );
    PreparedImages {
        logo,
        header,
        footer,
        timeline,
    }
}

/// Language a record renders in: its own code, or the configured default.
pub fn report_language<'a>(record: &'a ReportRecord, options: &'a ComposeOptions) -> &'a str {
    let lang = record.lang.trim();
    if lang.is_empty() {
        options.default_language.as_str()
    } else {
        lang
    }
}

pub fn compose(record: &ReportRecord, table: &dyn LanguageTable, options: &ComposeOptions) -> Document {
    let lang = report_language(record, options);
    let loc = Localizer::new(table, lang);
    let images = prepare_images(record);
    let duration = record.computed_duration();

    let running = RunningDecorations::new(
        images.header.clone(),
        images.footer.clone(),
        loc.t("Page"),
        options.header_gutter,
        options.footer_gutter,
    );
    let mut ctx = LayoutContext::with_fonts(
        options.page_size,
        options.margins,
        running,
        Arc::clone(&options.fonts),
    );

    cover_page(&mut ctx, &loc, record, images.logo.as_ref());
    overview_page(&mut ctx, &loc, record, &duration);
    details_page(&mut ctx, &loc, record);
    if !record.timeline.is_empty() {
        timeline_section(&mut ctx, &loc, &record.timeline, &images.timeline);
    }
    if !record.actions.is_empty() {
        actions_section(&mut ctx, &loc, &record.actions, options.actions_layout);
    }
    if !record.lessons.is_empty() {
        lessons_section(&mut ctx, &loc, record);
    }
    if !record.references.trim().is_empty() {
        appendix_section(&mut ctx, &loc, record);
    }

    let document = ctx.finish();
    tracing::debug!(
        pages = document.pages.len(),
        images = document.images.len(),
        lang,
        "composed report"
    );
    document
}

fn heading(ctx: &mut LayoutContext, text: &str, size: f32, height: Pt, align: Align) {
    ctx.set_font(FontSpec::bold(size));
    ctx.set_text_color(Color::BLACK);
    ctx.text_line(text, height, align);
}

/// Heading that moves to the next page together with the first `next` of
/// content below it.
fn section_heading(ctx: &mut LayoutContext, text: &str, size: f32, height: Pt, align: Align, next: Pt) {
    ctx.ensure_space(height + next);
    heading(ctx, text, size, height, align);
}

fn body(ctx: &mut LayoutContext, text: &str, line_height: Pt) {
    ctx.set_font(FontSpec::regular(10.0));
    ctx.set_text_color(Color::BLACK);
    ctx.wrapped_text_block(text, line_height, Align::Left);
}

/// Bold heading followed by a wrapped paragraph. An empty heading renders
/// the paragraph alone.
fn add_section(ctx: &mut LayoutContext, title: &str, content: &str) {
    if !title.is_empty() {
        section_heading(ctx, title, 14.0, mm(10.0), Align::Left, mm(7.0));
    }
    body(ctx, content, mm(7.0));
    ctx.ln(mm(10.0));
}

fn divider(ctx: &mut LayoutContext, color: Color, inset: Pt) {
    let left = ctx.margins().left + inset;
    let right = ctx.right_edge() - inset;
    ctx.hline(left, right, color);
}

fn cover_page(ctx: &mut LayoutContext, loc: &Localizer<'_>, record: &ReportRecord, logo: Option<&DecodedImage>) {
    ctx.add_page();
    let page = ctx.page_size();
    let mut text_top = ctx.y() + mm(80.0);

    if let Some(logo) = logo {
        let width = page.width * 0.35;
        let height = Pt::from_f32(logo.scaled_height(width.to_f32()));
        let x = (page.width - width) / 2;
        let y = page.height * 0.25;
        ctx.image(logo, x, y, width, height);
        text_top = text_top.max(y + height + mm(10.0));
    }
    ctx.set_y(text_top);

    ctx.set_font(FontSpec::bold(20.0));
    ctx.set_text_color(Color::BLACK);
    ctx.wrapped_text_block(&record.title, mm(10.0), Align::Center);
    ctx.ln(mm(10.0));

    ctx.set_font(FontSpec::regular(10.0));
    let lines = [
        format!("{} - {}", loc.t("Post-Incident Report"), loc.date(&record.date)),
        format!("{}: {}", loc.t("Severity"), loc.severity(&record.severity)),
        format!("{}: {}", loc.t("Creator"), record.creator),
    ];
    for line in &lines {
        ctx.wrapped_text_block(line, mm(8.0), Align::Center);
    }
}

fn overview_page(ctx: &mut LayoutContext, loc: &Localizer<'_>, record: &ReportRecord, duration: &str) {
    ctx.add_page();
    heading(ctx, &loc.t("Incident Overview"), 18.0, mm(12.0), Align::Center);
    ctx.ln(mm(10.0));

    let row_height = mm(9.0);
    let gap = mm(10.0);
    let column_width = (ctx.usable_width() - gap) / 2;
    let left = ctx.margins().left;
    let top = ctx.y();

    let first = [
        (loc.t("Date (start)"), loc.date(&record.date)),
        (loc.t("Severity"), loc.severity(&record.severity)),
        (loc.t("Duration"), duration.to_string()),
    ];
    let second = [
        (loc.t("Start"), record.start_time.clone()),
        (loc.t("End"), record.end_time.clone()),
    ];
    for (column, rows) in [(left, &first[..]), (left + column_width + gap, &second[..])] {
        let mut y = top;
        for (label, value) in rows {
            grid_row(ctx, column, y, column_width, row_height, label, value);
            y += row_height;
        }
    }

    ctx.set_y(top + row_height * 3 + mm(10.0));
    body(ctx, &format!("{} {}", loc.t("Owners:"), record.owners), mm(6.0));
    ctx.ln(mm(10.0));
    divider(ctx, Color::gray8(160), Pt::ZERO);
    ctx.ln(mm(8.0));

    if !record.summary.trim().is_empty() {
        add_section(ctx, &loc.t("Executive Summary"), &record.summary);
    }
    if !record.impact.trim().is_empty() {
        add_section(ctx, &loc.t("Customer Impact"), &record.impact);
    }

    divider(ctx, Color::gray8(160), Pt::ZERO);
    ctx.ln(mm(8.0));
    add_section(ctx, "", &loc.t(BOILERPLATE));
}

fn grid_row(ctx: &mut LayoutContext, x: Pt, y: Pt, width: Pt, height: Pt, label: &str, value: &str) {
    let label_width = mm(45.0);
    let inset = mm(2.0);
    let label_rect = Rect {
        x,
        y,
        width: label_width,
        height,
    };
    let value_rect = Rect {
        x: x + label_width,
        y,
        width: width - label_width,
        height,
    };
    let border = Color::gray8(180);

    ctx.boxed_cell(label_rect, CellStyle::filled(LABEL_FILL).with_stroke(border), "", Align::Left);
    ctx.set_font(FontSpec::bold(10.0));
    ctx.set_text_color(Color::WHITE);
    ctx.boxed_cell(inset_rect(label_rect, inset), CellStyle::PLAIN, label, Align::Left);

    ctx.boxed_cell(value_rect, CellStyle::bordered(border), "", Align::Left);
    ctx.set_font(FontSpec::regular(10.0));
    ctx.set_text_color(Color::BLACK);
    ctx.boxed_cell(inset_rect(value_rect, inset), CellStyle::PLAIN, value, Align::Left);
}

fn inset_rect(rect: Rect, inset: Pt) -> Rect {
    Rect {
        x: rect.x + inset,
        y: rect.y,
        width: rect.width - inset * 2,
        height: rect.height,
    }
}

fn details_page(ctx: &mut LayoutContext, loc: &Localizer<'_>, record: &ReportRecord) {
    ctx.add_page();
    ctx.set_font(FontSpec::bold(22.0));
    ctx.set_text_color(Color::BLACK);
    ctx.wrapped_text_block(&record.title, mm(10.0), Align::Center);
    ctx.ln(mm(15.0));

    section_heading(ctx, &loc.t("Incident Details"), 14.0, mm(10.0), Align::Left, mm(7.0));
    body(ctx, &format!("{} {}", loc.t("Owners:"), record.owners), mm(7.0));
    body(ctx, &format!("{} {}", loc.t("Affected Systems:"), record.affected), mm(7.0));
    ctx.ln(mm(10.0));

    section_heading(ctx, &loc.t("Technical Problems"), 14.0, mm(10.0), Align::Left, mm(7.0));
    body(ctx, &record.root_cause, mm(7.0));
    ctx.ln(mm(10.0));

    let optional = [
        ("Root Cause", &record.root_cause),
        ("Detection", &record.detection),
        ("Incident Response", &record.response),
        ("Communications", &record.comm),
    ];
    for (key, content) in optional {
        if !content.trim().is_empty() {
            add_section(ctx, &loc.t(key), content);
        }
    }
}

fn timeline_section(
    ctx: &mut LayoutContext,
    loc: &Localizer<'_>,
    entries: &[TimelineEntry],
    images: &[Vec<DecodedImage>],
) {
    // Entry header line plus the first notes line.
    let entry_start = mm(6.0) * 2;
    section_heading(ctx, &loc.t("Timeline"), 14.0, mm(10.0), Align::Center, mm(4.0) + entry_start);
    ctx.ln(mm(4.0));

    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            ctx.ensure_space(mm(4.0) + entry_start);
            divider(ctx, Color::gray8(200), mm(5.0));
            ctx.ln(mm(4.0));
        }

        ctx.set_font(FontSpec::bold(11.0));
        ctx.set_text_color(ACCENT);
        ctx.text_line(
            &format!("{}  |  {} {}", entry.time, loc.t("Actor:"), entry.actor),
            mm(6.0),
            Align::Left,
        );
        body(ctx, &format!("{} {}", loc.t("Notes:"), entry.notes), mm(6.0));
        ctx.ln(mm(3.0));

        for image in images.get(i).map(Vec::as_slice).unwrap_or_default() {
            timeline_image(ctx, image);
        }
    }
    ctx.ln(mm(8.0));
}

fn timeline_image(ctx: &mut LayoutContext, image: &DecodedImage) {
    let mut width = ctx.usable_width();
    let mut height = Pt::from_f32(image.scaled_height(width.to_f32()));
    let max_height = ctx.usable_height();
    if height > max_height {
        height = max_height;
        width = Pt::from_f32(height.to_f32() * image.width_px as f32 / image.height_px as f32);
    }
    ctx.ensure_space(height);
    let (x, y) = (ctx.margins().left, ctx.y());
    ctx.image(image, x, y, width, height);
    ctx.ln(height + mm(5.0));
}

fn actions_section(ctx: &mut LayoutContext, loc: &Localizer<'_>, actions: &[ActionItem], layout: ActionsLayout) {
    // A table header row and one line of the first row, or the first list line.
    let first = match layout {
        ActionsLayout::Table => mm(8.0) + mm(6.0),
        ActionsLayout::List => mm(6.0),
    };
    section_heading(
        ctx,
        &loc.t("Corrective & Preventive Actions (CAPA)"),
        14.0,
        mm(10.0),
        Align::Center,
        mm(5.0) + first,
    );
    ctx.ln(mm(5.0));

    match layout {
        ActionsLayout::Table => render_actions_table(ctx, loc, actions),
        ActionsLayout::List => {
            for (i, action) in actions.iter().enumerate() {
                ctx.set_font(FontSpec::bold(11.0));
                ctx.set_text_color(ACCENT);
                ctx.wrapped_text_block(
                    &format!("{} {}: {}", loc.t("Action"), i + 1, action.action),
                    mm(6.0),
                    Align::Left,
                );

                ctx.set_font(FontSpec::regular(10.0));
                ctx.set_text_color(Color::BLACK);
                let meta = [
                    format!("{}: {}", loc.t("Status"), action.status),
                    format!("{}: {}", loc.t("Owner"), action.owner),
                    format!("{}: {}", loc.t("Due Date"), loc.date(&action.due)),
                ];
                for line in &meta {
                    ctx.text_line(line, mm(6.0), Align::Left);
                }
                ctx.ln(mm(3.0));
                divider(ctx, Color::gray8(200), mm(5.0));
                ctx.ln(mm(5.0));
            }
        }
    }
    ctx.ln(mm(5.0));
}

fn lessons_section(ctx: &mut LayoutContext, loc: &Localizer<'_>, record: &ReportRecord) {
    section_heading(
        ctx,
        &loc.t("Lessons Learned"),
        14.0,
        mm(10.0),
        Align::Center,
        mm(10.0) + mm(7.0) * 2,
    );
    ctx.ln(mm(10.0));

    let parts = [
        ("What went well:", &record.lessons.good, mm(5.0)),
        ("What to improve:", &record.lessons.improve, mm(10.0)),
    ];
    for (key, content, after) in parts {
        if content.trim().is_empty() {
            continue;
        }
        section_heading(ctx, &loc.t(key), 12.0, mm(7.0), Align::Left, mm(7.0));
        body(ctx, content, mm(7.0));
        ctx.ln(after);
    }
}

fn appendix_section(ctx: &mut LayoutContext, loc: &Localizer<'_>, record: &ReportRecord) {
    section_heading(
        ctx,
        &loc.t("Appendix"),
        14.0,
        mm(10.0),
        Align::Center,
        mm(5.0) + mm(10.0) + mm(7.0),
    );
    ctx.ln(mm(5.0));
    add_section(ctx, &loc.t("References & Links"), &record.references);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Command, Page};
    use crate::images::tests::{data_url, encode, png_data_url};
    use crate::locale::{Catalog, Localizer};
    use crate::metrics::FontFace;
    use crate::model::LessonsLearned;

    fn sample_record() -> ReportRecord {
        ReportRecord {
            title: "Checkout outage".to_string(),
            date: "2024-05-01".to_string(),
            severity: "sev-1".to_string(),
            owners: "SRE".to_string(),
            creator: "Dana".to_string(),
            affected: "payments-api".to_string(),
            summary: "Checkout failed for 90 minutes.".to_string(),
            root_cause: "Expired certificate.".to_string(),
            start_time: "14:00".to_string(),
            end_time: "15:30".to_string(),
            ..ReportRecord::default()
        }
    }

    fn render(record: &ReportRecord) -> Document {
        compose(record, &Catalog::builtin(), &ComposeOptions::default())
    }

    fn page_with(doc: &Document, needle: &str) -> Option<usize> {
        doc.pages.iter().position(|page| page.contains_text(needle))
    }

    fn text_y(page: &Page, needle: &str) -> Option<Pt> {
        page.commands.iter().find_map(|cmd| match cmd {
            Command::DrawString { y, text, .. } if text.contains(needle) => Some(*y),
            _ => None,
        })
    }

    fn image_heights(doc: &Document) -> Vec<Pt> {
        doc.pages
            .iter()
            .flat_map(|page| page.commands.iter())
            .filter_map(|cmd| match cmd {
                Command::DrawImage { height, .. } => Some(*height),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn cover_overview_and_details_come_first() {
        let doc = render(&sample_record());
        assert_eq!(doc.pages.len(), 3);
        assert!(doc.pages[0].contains_text("Checkout outage"));
        assert!(doc.pages[0].contains_text("Post-Incident Report - 2024-05-01"));
        assert!(doc.pages[0].contains_text("Severity: SEV-1 (Critical)"));
        assert!(doc.pages[0].contains_text("Creator: Dana"));
        assert_eq!(page_with(&doc, "Incident Overview"), Some(1));
        assert!(doc.pages[1].contains_text("1h 30m"));
        assert!(doc.pages[1].contains_text("Executive Summary"));
        assert_eq!(page_with(&doc, "Incident Details"), Some(2));
        assert!(doc.pages[2].contains_text("Affected Systems: payments-api"));
    }

    #[test]
    fn portuguese_labels_and_dates() {
        let mut record = sample_record();
        record.lang = "pt".to_string();
        let doc = render(&record);
        assert!(doc.pages[0].contains_text("Relatório Pós-Incidente - 01/05/2024"));
        assert!(doc.pages[0].contains_text("SEV-1 (Crítico)"));
        assert!(doc.pages[1].contains_text("Visão Geral do Incidente"));
    }

    #[test]
    fn empty_optional_sections_are_omitted() {
        let mut record = sample_record();
        record.summary.clear();
        let doc = render(&record);
        for absent in [
            "Executive Summary",
            "Customer Impact",
            "Detection",
            "Timeline",
            "Corrective & Preventive Actions (CAPA)",
            "Lessons Learned",
            "Appendix",
        ] {
            assert_eq!(page_with(&doc, absent), None, "{absent}");
        }
        assert!(page_with(&doc, BOILERPLATE).is_some());
    }

    #[test]
    fn lessons_subsections_are_independent() {
        let mut record = sample_record();
        record.lessons = LessonsLearned {
            good: String::new(),
            improve: "Alert on certificate expiry.".to_string(),
        };
        let doc = render(&record);
        assert!(page_with(&doc, "Lessons Learned").is_some());
        assert!(page_with(&doc, "What to improve:").is_some());
        assert_eq!(page_with(&doc, "What went well:"), None);
    }

    #[test]
    fn undecodable_images_leave_no_gap() {
        let entry = |images: Vec<String>| TimelineEntry {
            time: "14:05".to_string(),
            actor: "oncall".to_string(),
            notes: "paged".to_string(),
            images,
            ..TimelineEntry::default()
        };
        let mut without = sample_record();
        without.timeline = vec![entry(vec![]), entry(vec![])];
        let mut with_bad = sample_record();
        let webp = data_url("image/webp", &encode(4, 4, image::ImageFormat::Png));
        with_bad.timeline = vec![entry(vec![webp, String::new()]), entry(vec![])];

        let a = render(&without);
        let b = render(&with_bad);
        assert_eq!(a.pages, b.pages);
        assert!(b.images.is_empty());
        let page = page_with(&a, "Timeline").unwrap();
        assert!(a.pages[page].contains_text("14:05  |  Actor: oncall"));
        assert!(a.pages[page].contains_text("Notes: paged"));
    }

    #[test]
    fn timeline_images_fill_usable_width_and_fit_the_page() {
        let mut record = sample_record();
        record.timeline = vec![TimelineEntry {
            time: "14:10".to_string(),
            images: vec![png_data_url(200, 100), png_data_url(10, 1000)],
            ..TimelineEntry::default()
        }];
        let doc = render(&record);
        let options = ComposeOptions::default();
        let usable_width = options.page_size.width - options.margins.left - options.margins.right;
        let usable_height = options.page_size.height - options.margins.top - options.margins.bottom;

        let heights = image_heights(&doc);
        assert_eq!(heights.len(), 2);
        assert!((heights[0].to_f32() - usable_width.to_f32() / 2.0).abs() < 0.01);
        assert!(heights[1] <= usable_height);
        assert_eq!(doc.images.len(), 2);
    }

    #[test]
    fn actions_list_and_table_layouts() {
        let mut record = sample_record();
        record.actions = vec![ActionItem {
            action: "Automate renewal".to_string(),
            owner: "SRE".to_string(),
            priority: "P1".to_string(),
            due: "2024-06-01".to_string(),
            status: "Open".to_string(),
        }];
        let list = render(&record);
        assert!(page_with(&list, "Action 1: Automate renewal").is_some());
        assert!(page_with(&list, "Due Date: 2024-06-01").is_some());
        assert_eq!(page_with(&list, "Priority"), None);

        let options = ComposeOptions {
            actions_layout: ActionsLayout::Table,
            ..ComposeOptions::default()
        };
        let table = compose(&record, &Catalog::builtin(), &options);
        assert!(page_with(&table, "Priority").is_some());
        assert!(page_with(&table, "Automate renewal").is_some());
    }

    #[test]
    fn running_decorations_skip_the_cover() {
        let mut record = sample_record();
        record.branding.header = png_data_url(100, 10);
        record.branding.footer = png_data_url(100, 5);
        let doc = render(&record);
        assert!(!doc.pages[0].contains_text("Page 1"));
        assert!(!doc.pages[0]
            .commands
            .iter()
            .any(|cmd| matches!(cmd, Command::DrawImage { .. })));
        assert!(doc.pages[1].contains_text("Page 2"));
        assert!(doc.pages[2].contains_text("Page 3"));
        let heading_y = text_y(&doc.pages[1], "Incident Overview").unwrap();
        let header_bottom = Pt::from_f32(Size::a4().width.to_f32() / 10.0);
        assert!(heading_y > header_bottom);
    }

    #[test]
    fn tall_logo_pushes_cover_text_down() {
        let mut record = sample_record();
        let plain = render(&record);
        record.branding.logo = png_data_url(100, 200);
        let branded = render(&record);
        let before = text_y(&plain.pages[0], "Checkout outage").unwrap();
        let after = text_y(&branded.pages[0], "Checkout outage").unwrap();
        assert!(after > before);
    }

    #[test]
    fn appendix_renders_references() {
        let mut record = sample_record();
        record.references = "https://status.example.com/incidents/42".to_string();
        let doc = render(&record);
        let page = page_with(&doc, "Appendix").unwrap();
        assert!(doc.pages[page].contains_text("References & Links"));
        assert!(doc.pages[page].contains_text("https://status.example.com/incidents/42"));
    }

    #[test]
    fn missing_language_uses_default() {
        let record = sample_record();
        let options = ComposeOptions {
            default_language: "pt".to_string(),
            ..ComposeOptions::default()
        };
        let doc = compose(&record, &Catalog::builtin(), &options);
        assert!(doc.pages[1].contains_text("Visão Geral do Incidente"));
    }

    fn near_bottom(space: Pt) -> LayoutContext {
        let options = ComposeOptions::default();
        let mut ctx = LayoutContext::new(options.page_size, options.margins, RunningDecorations::default());
        ctx.add_page();
        let y = ctx.content_bottom() - space;
        ctx.set_y(y);
        ctx
    }

    #[test]
    fn heading_moves_with_its_first_line() {
        let mut ctx = near_bottom(mm(12.0));
        section_heading(&mut ctx, "Detection", 14.0, mm(10.0), Align::Left, mm(7.0));
        body(&mut ctx, "Alert fired late.", mm(7.0));
        let doc = ctx.finish();

        assert_eq!(doc.pages.len(), 2);
        assert!(!doc.pages[0].contains_text("Detection"));
        assert!(doc.pages[1].contains_text("Detection"));
        assert!(doc.pages[1].contains_text("Alert fired late."));
    }

    #[test]
    fn timeline_divider_stays_with_the_next_entry() {
        let catalog = Catalog::builtin();
        let loc = Localizer::new(&catalog, "en");
        let entry = |actor: &str| TimelineEntry {
            time: "14:05".to_string(),
            actor: actor.to_string(),
            notes: "paged".to_string(),
            ..TimelineEntry::default()
        };
        // Room for the heading and the first entry, plus a little more.
        let mut ctx = near_bottom(mm(10.0 + 4.0 + 15.0 + 8.0));
        timeline_section(&mut ctx, &loc, &[entry("first"), entry("second")], &[]);
        let doc = ctx.finish();

        let draws_line = |page: &Page| page.commands.iter().any(|cmd| matches!(cmd, Command::LineTo { .. }));
        assert_eq!(doc.pages.len(), 2);
        assert!(doc.pages[0].contains_text("Actor: first"));
        assert!(!draws_line(&doc.pages[0]));
        assert!(doc.pages[1].contains_text("Actor: second"));
        assert!(draws_line(&doc.pages[1]));
    }

    #[test]
    fn cyrillic_report_uses_embedded_fonts() {
        let mut record = sample_record();
        record.title = "Сбой базы данных".to_string();
        record.owners = "Команда SRE".to_string();
        let options = ComposeOptions {
            fonts: Arc::new(FontRegistry::bundled().unwrap()),
            ..ComposeOptions::default()
        };
        let doc = compose(&record, &Catalog::builtin(), &options);

        assert!(doc.pages[0].contains_text("Сбой базы данных"));
        assert!(doc.pages[0]
            .commands
            .iter()
            .any(|cmd| matches!(cmd, Command::SetFont(FontFace::EmbeddedBold))));
        assert!(doc.pages[1].contains_text("Команда SRE"));
        assert!(doc.pages[1]
            .commands
            .iter()
            .any(|cmd| matches!(cmd, Command::SetFont(FontFace::EmbeddedRegular))));
        // Latin-only text stays on the standard faces.
        assert!(doc.pages[1]
            .commands
            .iter()
            .any(|cmd| matches!(cmd, Command::SetFont(FontFace::Bold))));
    }
}
