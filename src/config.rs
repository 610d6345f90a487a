use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ReportError;
use crate::locale::DEFAULT_LANGUAGE;
use crate::types::{Margins, Size};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    #[default]
    A4,
    Letter,
}

impl PageSize {
    pub fn size(&self) -> Size {
        match self {
            PageSize::A4 => Size::a4(),
            PageSize::Letter => Size::letter(),
        }
    }
}

/// How corrective actions are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionsLayout {
    #[default]
    List,
    Table,
}

/// Page margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginsMm {
    #[serde(default = "default_margin_top")]
    pub top: f32,
    #[serde(default = "default_margin_side")]
    pub right: f32,
    #[serde(default = "default_margin_side")]
    pub bottom: f32,
    #[serde(default = "default_margin_side")]
    pub left: f32,
}

impl Default for MarginsMm {
    fn default() -> Self {
        Self {
            top: default_margin_top(),
            right: default_margin_side(),
            bottom: default_margin_side(),
            left: default_margin_side(),
        }
    }
}

impl MarginsMm {
    pub fn to_margins(&self) -> Margins {
        Margins::from_mm(self.top, self.right, self.bottom, self.left)
    }
}

/// TrueType fonts for text outside WinAnsi. Explicit paths replace the
/// bundled DejaVu Sans of the same weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontConfig {
    #[serde(default)]
    pub regular: Option<PathBuf>,

    #[serde(default)]
    pub bold: Option<PathBuf>,

    /// Fall back to the bundled DejaVu Sans faces
    #[serde(default = "default_bundled_fonts")]
    pub bundled: bool,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            regular: None,
            bold: None,
            bundled: default_bundled_fonts(),
        }
    }
}

fn default_bundled_fonts() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub page_size: PageSize,

    #[serde(default)]
    pub margins: MarginsMm,

    /// Space between the running header image and page content, in mm
    #[serde(default = "default_header_gutter")]
    pub header_gutter_mm: f32,

    /// Space between page content and the running footer image, in mm
    #[serde(default = "default_footer_gutter")]
    pub footer_gutter_mm: f32,

    /// File stem used when the report has no title
    #[serde(default = "default_fallback_stem")]
    pub fallback_file_stem: String,

    #[serde(default)]
    pub actions_layout: ActionsLayout,

    /// Language used when a report does not name one
    #[serde(default = "default_language")]
    pub default_language: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub fonts: FontConfig,
}

fn default_margin_top() -> f32 {
    30.0
}

fn default_margin_side() -> f32 {
    15.0
}

fn default_header_gutter() -> f32 {
    10.0
}

fn default_footer_gutter() -> f32 {
    5.0
}

fn default_fallback_stem() -> String {
    "incident-report".to_string()
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::default(),
            margins: MarginsMm::default(),
            header_gutter_mm: default_header_gutter(),
            footer_gutter_mm: default_footer_gutter(),
            fallback_file_stem: default_fallback_stem(),
            actions_layout: ActionsLayout::default(),
            default_language: default_language(),
            log_level: default_log_level(),
            fonts: FontConfig::default(),
        }
    }
}

impl RenderConfig {
    pub fn from_toml(content: &str) -> Result<Self, ReportError> {
        let config: RenderConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ReportError::InvalidConfiguration(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        let m = &self.margins;
        let all = [m.top, m.right, m.bottom, m.left, self.header_gutter_mm, self.footer_gutter_mm];
        if all.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ReportError::InvalidConfiguration(
                "margins and gutters must be finite and non-negative".to_string(),
            ));
        }
        let size = self.page_size.size();
        if m.left + m.right >= size.width.to_mm() || m.top + m.bottom >= size.height.to_mm() {
            return Err(ReportError::InvalidConfiguration(
                "margins leave no usable page area".to_string(),
            ));
        }
        if self.fallback_file_stem.trim().is_empty() {
            return Err(ReportError::InvalidConfiguration(
                "fallback_file_stem must not be empty".to_string(),
            ));
        }
        if self.default_language.trim().is_empty() {
            return Err(ReportError::InvalidConfiguration(
                "default_language must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_report_layout() {
        let config = RenderConfig::default();
        assert_eq!(config.page_size, PageSize::A4);
        assert_eq!(config.margins, MarginsMm { top: 30.0, right: 15.0, bottom: 15.0, left: 15.0 });
        assert_eq!(config.header_gutter_mm, 10.0);
        assert_eq!(config.footer_gutter_mm, 5.0);
        assert_eq!(config.fallback_file_stem, "incident-report");
        assert_eq!(config.actions_layout, ActionsLayout::List);
        assert_eq!(config.default_language, "en");
        assert!(config.fonts.bundled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(RenderConfig::from_toml("").unwrap(), RenderConfig::default());
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let config = RenderConfig::from_toml(
            r#"
            page_size = "letter"
            actions_layout = "table"
            default_language = "pt"

            [margins]
            top = 20.0
            "#,
        )
        .unwrap();
        assert_eq!(config.page_size, PageSize::Letter);
        assert_eq!(config.actions_layout, ActionsLayout::Table);
        assert_eq!(config.default_language, "pt");
        assert_eq!(config.margins.top, 20.0);
        assert_eq!(config.margins.left, 15.0);
    }

    #[test]
    fn font_section_sets_paths() {
        let config = RenderConfig::from_toml(
            r#"
            [fonts]
            regular = "/opt/fonts/NotoSans-Regular.ttf"
            bundled = false
            "#,
        )
        .unwrap();
        assert_eq!(
            config.fonts.regular.as_deref(),
            Some(Path::new("/opt/fonts/NotoSans-Regular.ttf"))
        );
        assert_eq!(config.fonts.bold, None);
        assert!(!config.fonts.bundled);
    }

    #[test]
    fn rejects_unusable_margins() {
        let err = RenderConfig::from_toml("[margins]\nleft = 150.0\nright = 100.0\n").unwrap_err();
        assert!(matches!(err, ReportError::InvalidConfiguration(_)));
        let err = RenderConfig::from_toml("header_gutter_mm = -1.0").unwrap_err();
        assert!(matches!(err, ReportError::InvalidConfiguration(_)));
    }

    #[test]
    fn rejects_unknown_enum_values() {
        let err = RenderConfig::from_toml("actions_layout = \"grid\"").unwrap_err();
        assert!(!err.is_client_error());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "fallback_file_stem = \"postmortem\"").unwrap();
        let config = RenderConfig::load(file.path()).unwrap();
        assert_eq!(config.fallback_file_stem, "postmortem");
        assert!(RenderConfig::load("/nonexistent/config.toml").is_err());
    }
}
