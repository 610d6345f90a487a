mod canvas;
mod compose;
mod config;
mod error;
mod font;
mod images;
mod inspect;
mod layout;
mod locale;
mod logging;
mod metrics;
mod model;
mod output;
mod pdf;
mod running;
mod table;
mod types;

pub use canvas::{Canvas, Command, Document, Page};
pub use compose::{ComposeOptions, compose};
pub use config::{ActionsLayout, FontConfig, MarginsMm, PageSize, RenderConfig};
pub use error::ReportError;
pub use font::{EmbeddedFont, FontRegistry};
pub use images::{DecodedImage, ImageFormat, decode_all, decode_data_url, parse_data_url};
pub use inspect::{InspectError, PdfSummary, inspect_pdf_bytes, inspect_pdf_path, require_readable};
pub use layout::{Align, CellStyle, LayoutContext, PageCursor};
pub use locale::{
    Catalog, DEFAULT_LANGUAGE, LanguagePack, LanguageTable, Localizer, format_date,
    format_severity, resolve,
};
pub use logging::init_logging;
pub use metrics::{FontFace, FontSpec, measure_text_width, wrap_lines, wrapped_line_count};
pub use model::{
    ActionItem, BrandingSet, LessonsLearned, ReportRecord, TimelineEntry, compute_duration,
};
pub use output::{DEFAULT_FILE_STEM, RenderedReport, output_file_name, sanitize_file_stem};
pub use pdf::document_to_pdf;
pub use running::RunningDecorations;
pub use table::{ACTION_COLUMN_RATIOS, Table, render_actions_table};
pub use types::{Color, Margins, Pt, Rect, Size};

use std::sync::Arc;

/// Renders postmortem records to PDF. Holds only immutable state, so one
/// renderer can serve many threads.
#[derive(Clone)]
pub struct ReportRenderer {
    config: RenderConfig,
    options: ComposeOptions,
    labels: Arc<dyn LanguageTable>,
}

pub struct ReportRendererBuilder {
    config: RenderConfig,
    labels: Option<Arc<dyn LanguageTable>>,
    fonts: Option<Arc<FontRegistry>>,
}

impl ReportRenderer {
    pub fn builder() -> ReportRendererBuilder {
        ReportRendererBuilder::new()
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn labels(&self) -> &dyn LanguageTable {
        self.labels.as_ref()
    }

    /// Lay the record out without serializing it.
    pub fn compose(&self, record: &ReportRecord) -> Document {
        compose(record, self.labels.as_ref(), &self.options)
    }

    pub fn render(&self, record: &ReportRecord) -> Result<RenderedReport, ReportError> {
        let document = self.compose(record);
        let title = record.title.trim();
        let bytes = document_to_pdf(&document, Some(title))?;
        let report = RenderedReport {
            file_name: output_file_name(title, &self.config.fallback_file_stem),
            bytes,
            page_count: document.pages.len(),
        };
        tracing::info!(
            file = %report.file_name,
            pages = report.page_count,
            bytes = report.bytes.len(),
            "rendered report"
        );
        Ok(report)
    }

    /// Parse a JSON payload and render it. A malformed payload is rejected
    /// before anything is laid out.
    pub fn render_json(&self, json: &str) -> Result<RenderedReport, ReportError> {
        let record = ReportRecord::from_json(json)?;
        self.render(&record)
    }
}

impl Default for ReportRendererBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportRendererBuilder {
    pub fn new() -> Self {
        Self {
            config: RenderConfig::default(),
            labels: None,
            fonts: None,
        }
    }

    pub fn config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn actions_layout(mut self, layout: ActionsLayout) -> Self {
        self.config.actions_layout = layout;
        self
    }

    pub fn default_language(mut self, lang: impl Into<String>) -> Self {
        self.config.default_language = lang.into();
        self
    }

    /// Label source. Defaults to the built-in English/Portuguese catalog.
    pub fn labels(mut self, labels: Arc<dyn LanguageTable>) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Fonts for text outside WinAnsi. Defaults to what the config's
    /// `[fonts]` section names.
    pub fn fonts(mut self, fonts: Arc<FontRegistry>) -> Self {
        self.fonts = Some(fonts);
        self
    }

    pub fn build(self) -> Result<ReportRenderer, ReportError> {
        self.config.validate()?;
        let labels = self
            .labels
            .unwrap_or_else(|| Arc::new(Catalog::builtin()) as Arc<dyn LanguageTable>);
        let fonts = match self.fonts {
            Some(fonts) => fonts,
            None => Arc::new(FontRegistry::from_config(&self.config.fonts)?),
        };
        let options = ComposeOptions {
            fonts,
            ..ComposeOptions::from_config(&self.config)
        };
        Ok(ReportRenderer {
            options,
            config: self.config,
            labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> ReportRenderer {
        ReportRenderer::builder().build().unwrap()
    }

    fn record() -> ReportRecord {
        ReportRecord {
            title: "Q3/Report #2".to_string(),
            date: "2024-09-14".to_string(),
            severity: "SEV-1".to_string(),
            creator: "Ops".to_string(),
            summary: "Login failures for all tenants.".to_string(),
            start_time: "14:00".to_string(),
            end_time: "15:30".to_string(),
            timeline: vec![TimelineEntry {
                time: "14:02".to_string(),
                actor: "pager".to_string(),
                notes: "Alert fired".to_string(),
                ..TimelineEntry::default()
            }],
            ..ReportRecord::default()
        }
    }

    fn long_actions(n: usize) -> Vec<ActionItem> {
        (0..n)
            .map(|i| ActionItem {
                action: format!("Task {i}: {}", "review the failover runbook and rehearse it ".repeat(2)),
                owner: "Identity".to_string(),
                priority: "P2".to_string(),
                due: "2024-10-01".to_string(),
                status: "Open".to_string(),
            })
            .collect()
    }

    #[test]
    fn renderer_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ReportRenderer>();
    }

    #[test]
    fn render_produces_named_pdf_with_matching_page_count() {
        let report = renderer().render(&record()).unwrap();
        assert_eq!(report.file_name, "Q3_Report__2.pdf");
        let summary = inspect_pdf_bytes(&report.bytes).unwrap();
        assert_eq!(summary.page_count, report.page_count);
        assert_eq!(summary.title.as_deref(), Some("Q3/Report #2"));
    }

    #[test]
    fn rendering_is_idempotent() {
        let renderer = renderer();
        let mut record = record();
        record.branding.header = images::tests::png_data_url(50, 5);
        record.timeline[0].images = vec![images::tests::png_data_url(30, 20)];
        let first = renderer.render(&record).unwrap();
        let second = renderer.render(&record).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn severity_labels_follow_language() {
        let renderer = renderer();
        let mut record = record();
        let en = renderer.compose(&record);
        assert!(en.pages[0].contains_text("SEV-1 (Critical)"));
        record.lang = "pt".to_string();
        let pt = renderer.compose(&record);
        assert!(pt.pages[0].contains_text("SEV-1 (Crítico)"));
        assert!(pt.pages[0].contains_text("14/09/2024"));
    }

    #[test]
    fn overview_shows_computed_duration() {
        let doc = renderer().compose(&record());
        assert!(doc.pages[1].contains_text("1h 30m"));
    }

    #[test]
    fn long_action_table_spans_two_pages_with_header_redrawn() {
        let renderer = ReportRenderer::builder()
            .actions_layout(ActionsLayout::Table)
            .build()
            .unwrap();
        let mut record = record();
        record.actions = long_actions(25);
        let doc = renderer.compose(&record);

        let table_pages: Vec<&Page> = doc
            .pages
            .iter()
            .filter(|page| page.texts().any(|text| text.starts_with("Task ")))
            .collect();
        assert!(table_pages.len() >= 2);
        for page in &table_pages {
            assert_eq!(page.texts().filter(|text| *text == "Priority").count(), 1);
        }
        let rows: usize = table_pages
            .iter()
            .map(|page| page.texts().filter(|text| text.starts_with("Task ")).count())
            .sum();
        assert_eq!(rows, 25);

        let report = renderer.render(&record).unwrap();
        let summary = inspect_pdf_bytes(&report.bytes).unwrap();
        assert_eq!(summary.page_count, doc.pages.len());
    }

    #[test]
    fn invalid_json_is_a_client_error() {
        let err = renderer().render_json("{not json").unwrap_err();
        assert!(err.is_client_error());
        let ok = renderer().render_json(r#"{"title": ""}"#).unwrap();
        assert_eq!(ok.file_name, "incident-report.pdf");
    }

    #[test]
    fn custom_labels_are_used() {
        let mut catalog = Catalog::builtin();
        catalog.merge(
            Catalog::from_json(r#"{"de": {"labels": {"Incident Overview": "Vorfallübersicht"}}}"#)
                .unwrap(),
        );
        let renderer = ReportRenderer::builder()
            .labels(Arc::new(catalog))
            .default_language("de")
            .build()
            .unwrap();
        let doc = renderer.compose(&record());
        assert!(doc.pages[1].contains_text("Vorfallübersicht"));
        // Untranslated keys fall back to the key text.
        assert!(doc.pages[1].contains_text("Executive Summary"));
    }

    #[test]
    fn cyrillic_report_renders_without_replacement() {
        let catalog = Catalog::from_json(
            r#"{"ru": {"labels": {"Incident Overview": "Обзор инцидента", "Timeline": "Хронология"}}}"#,
        )
        .unwrap();
        let renderer = ReportRenderer::builder()
            .labels(Arc::new(catalog))
            .default_language("ru")
            .build()
            .unwrap();
        let mut record = record();
        record.title = "Сбой базы".to_string();
        let report = renderer.render(&record).unwrap();

        let pdf = lopdf::Document::load_mem(&report.bytes).unwrap();
        for page_id in pdf.get_pages().values() {
            let content = pdf.get_page_content(*page_id).unwrap();
            assert!(!content.contains(&b'?'));
        }
        let summary = inspect_pdf_bytes(&report.bytes).unwrap();
        assert_eq!(summary.title.as_deref(), Some("Сбой базы"));
        assert_eq!(report.file_name, "_________.pdf");
    }

    #[test]
    fn base14_only_fonts_degrade_to_question_marks() {
        let mut config = RenderConfig::default();
        config.fonts.bundled = false;
        let renderer = ReportRenderer::builder().config(config).build().unwrap();
        let mut record = record();
        record.title = "Сбой".to_string();
        let report = renderer.render(&record).unwrap();
        let pdf = lopdf::Document::load_mem(&report.bytes).unwrap();
        let cover = *pdf.get_pages().get(&1).unwrap();
        let content = String::from_utf8_lossy(&pdf.get_page_content(cover).unwrap()).into_owned();
        assert!(content.contains("(????) Tj"));
    }

    #[test]
    fn missing_font_file_fails_the_build() {
        let mut config = RenderConfig::default();
        config.fonts.regular = Some("/nonexistent/font.ttf".into());
        assert!(matches!(
            ReportRenderer::builder().config(config).build(),
            Err(ReportError::InvalidFont(_))
        ));
    }

    #[test]
    fn invalid_config_is_rejected_at_build() {
        let mut config = RenderConfig::default();
        config.margins.left = 500.0;
        assert!(matches!(
            ReportRenderer::builder().config(config).build(),
            Err(ReportError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn renders_concurrently() {
        let renderer = renderer();
        let expected = renderer.render(&record()).unwrap();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| renderer.render(&record()).unwrap()))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }
}
