//! TrueType fonts embedded for text the base-14 Helvetica cannot encode.
//!
//! Latin text keeps using the unembedded base-14 faces. A string with any
//! character outside WinAnsi is drawn with an embedded font instead, written
//! as a Type0/Identity-H font so every glyph in the face is reachable.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::config::FontConfig;
use crate::error::ReportError;
use crate::metrics::{FontFace, FontSpec, base14_advance};

static BUNDLED_REGULAR: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");
static BUNDLED_BOLD: &[u8] = include_bytes!("../assets/fonts/DejaVuSans-Bold.ttf");

/// A parsed TrueType font with its cmap and advances resolved up front.
/// Advances are in 1/1000 em like the base-14 tables.
pub struct EmbeddedFont {
    name: String,
    data: Vec<u8>,
    glyph_ids: HashMap<char, u16>,
    advances: Vec<u16>,
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) missing_width: u16,
    pub(crate) is_fixed_pitch: bool,
}

impl fmt::Debug for EmbeddedFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedFont")
            .field("name", &self.name)
            .field("bytes", &self.data.len())
            .field("glyphs", &self.glyph_ids.len())
            .finish()
    }
}

impl EmbeddedFont {
    pub fn from_bytes(data: Vec<u8>, source: &str) -> Result<Self, ReportError> {
        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|err| ReportError::InvalidFont(format!("{source}: {err}")))?;
        if face.tables().cff.is_some() {
            return Err(ReportError::InvalidFont(format!(
                "{source}: CFF outlines are not supported, use a TrueType font"
            )));
        }

        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;

        let mut glyph_ids = HashMap::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|codepoint| {
                    let Some(ch) = char::from_u32(codepoint) else {
                        return;
                    };
                    if let Some(gid) = subtable.glyph_index(codepoint) {
                        glyph_ids.entry(ch).or_insert(gid.0);
                    }
                });
            }
        }
        if glyph_ids.is_empty() {
            return Err(ReportError::InvalidFont(format!(
                "{source}: font has no unicode cmap"
            )));
        }

        let advances: Vec<u16> = (0..face.number_of_glyphs())
            .map(|gid| {
                let advance = face
                    .glyph_hor_advance(ttf_parser::GlyphId(gid))
                    .unwrap_or(0);
                let scaled = (advance as f32 * scale).round() as i32;
                scaled.clamp(0, u16::MAX as i32) as u16
            })
            .collect();

        let ascent = scale_i16(face.ascender(), scale);
        let bbox = face.global_bounding_box();
        let name = postscript_name(&face).unwrap_or_else(|| {
            Path::new(source)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("EmbeddedFont")
                .to_string()
        });
        let missing_width = glyph_ids
            .get(&' ')
            .and_then(|gid| advances.get(*gid as usize))
            .copied()
            .unwrap_or(500);

        Ok(Self {
            name: sanitize_font_name(&name),
            glyph_ids,
            advances,
            ascent,
            descent: scale_i16(face.descender(), scale),
            cap_height: face
                .capital_height()
                .map(|value| scale_i16(value, scale))
                .unwrap_or(ascent),
            italic_angle: face
                .italic_angle()
                .map(|value| value.round() as i16)
                .unwrap_or(0),
            bbox: (
                scale_i16(bbox.x_min, scale),
                scale_i16(bbox.y_min, scale),
                scale_i16(bbox.x_max, scale),
                scale_i16(bbox.y_max, scale),
            ),
            missing_width,
            is_fixed_pitch: face.is_monospaced(),
            data,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|err| {
            ReportError::InvalidFont(format!("failed to read '{}': {}", path.display(), err))
        })?;
        Self::from_bytes(data, &path.display().to_string())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn glyph_id(&self, ch: char) -> Option<u16> {
        let ch = if ch == '\t' { ' ' } else { ch };
        self.glyph_ids.get(&ch).copied()
    }

    pub fn covers(&self, text: &str) -> bool {
        text.chars()
            .filter(|ch| !ch.is_control())
            .all(|ch| self.glyph_id(ch).is_some())
    }

    pub fn glyph_advance(&self, gid: u16) -> u16 {
        self.advances
            .get(gid as usize)
            .copied()
            .unwrap_or(self.missing_width)
    }

    pub fn advance(&self, ch: char) -> u16 {
        match self.glyph_id(ch) {
            Some(gid) => self.glyph_advance(gid),
            None => self.missing_width,
        }
    }
}

/// The fonts a document may draw with: the two base-14 faces, always, plus
/// optional embedded regular and bold fonts for non-WinAnsi text.
#[derive(Clone, Default)]
pub struct FontRegistry {
    regular: Option<Arc<EmbeddedFont>>,
    bold: Option<Arc<EmbeddedFont>>,
}

impl fmt::Debug for FontRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontRegistry")
            .field("regular", &self.regular.as_ref().map(|font| font.name()))
            .field("bold", &self.bold.as_ref().map(|font| font.name()))
            .finish()
    }
}

impl FontRegistry {
    /// Base-14 faces only. Text outside WinAnsi degrades to `?`.
    pub fn base14() -> Self {
        Self::default()
    }

    /// DejaVu Sans and DejaVu Sans Bold, shipped with the crate. Parsed once
    /// per process.
    pub fn bundled() -> Result<Self, ReportError> {
        static BUNDLED: OnceLock<Option<FontRegistry>> = OnceLock::new();
        BUNDLED
            .get_or_init(|| {
                let loaded = EmbeddedFont::from_bytes(BUNDLED_REGULAR.to_vec(), "DejaVuSans.ttf")
                    .and_then(|regular| {
                        let bold =
                            EmbeddedFont::from_bytes(BUNDLED_BOLD.to_vec(), "DejaVuSans-Bold.ttf")?;
                        Ok(FontRegistry::base14().with_regular(regular).with_bold(bold))
                    });
                match loaded {
                    Ok(registry) => Some(registry),
                    Err(err) => {
                        tracing::warn!(error = %err, "bundled fonts unreadable");
                        None
                    }
                }
            })
            .clone()
            .ok_or_else(|| ReportError::InvalidFont("bundled fonts unreadable".to_string()))
    }

    pub fn from_config(config: &FontConfig) -> Result<Self, ReportError> {
        let mut registry = if config.bundled {
            Self::bundled()?
        } else {
            Self::base14()
        };
        if let Some(path) = &config.regular {
            registry = registry.with_regular(EmbeddedFont::load(path)?);
        }
        if let Some(path) = &config.bold {
            registry = registry.with_bold(EmbeddedFont::load(path)?);
        }
        tracing::debug!(fonts = ?registry, "font registry ready");
        Ok(registry)
    }

    pub fn with_regular(mut self, font: EmbeddedFont) -> Self {
        self.regular = Some(Arc::new(font));
        self
    }

    pub fn with_bold(mut self, font: EmbeddedFont) -> Self {
        self.bold = Some(Arc::new(font));
        self
    }

    pub fn has_embedded(&self) -> bool {
        self.regular.is_some() || self.bold.is_some()
    }

    /// The embedded font behind an embedded face. A missing weight falls
    /// back to the other one; base-14 faces have none.
    pub fn embedded(&self, face: FontFace) -> Option<&EmbeddedFont> {
        let font = match face {
            FontFace::EmbeddedRegular => self.regular.as_ref().or(self.bold.as_ref()),
            FontFace::EmbeddedBold => self.bold.as_ref().or(self.regular.as_ref()),
            FontFace::Regular | FontFace::Bold => None,
        };
        font.map(Arc::as_ref)
    }

    /// Pick the face `text` is drawn with: base-14 when WinAnsi can encode
    /// every character, otherwise the embedded face of the same weight when
    /// one is registered.
    pub fn resolve(&self, font: FontSpec, text: &str) -> FontSpec {
        let base = FontSpec {
            face: font.face.base14(),
            size: font.size,
        };
        if text.chars().all(|ch| winansi_code(ch).is_some()) {
            return base;
        }
        let embedded = font.face.embedded();
        if self.embedded(embedded).is_some() {
            FontSpec {
                face: embedded,
                size: font.size,
            }
        } else {
            base
        }
    }

    /// Advance of `ch` in 1/1000 em.
    pub fn advance(&self, face: FontFace, ch: char) -> u16 {
        match self.embedded(face) {
            Some(font) => font.advance(ch),
            None => base14_advance(face.base14(), ch),
        }
    }
}

/// WinAnsiEncoding byte for `ch`, if it has one.
pub(crate) fn winansi_code(ch: char) -> Option<u8> {
    let byte = match ch {
        '\t' => b' ',
        '\u{0000}'..='\u{007F}' => ch as u8,
        '\u{00A0}'..='\u{00FF}' => ch as u8,
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

fn postscript_name(face: &ttf_parser::Face<'_>) -> Option<String> {
    use ttf_parser::name::name_id;

    let mut full = None;
    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        match entry.name_id {
            name_id::POST_SCRIPT_NAME => return Some(name),
            name_id::FULL_NAME if full.is_none() => full = Some(name),
            _ => {}
        }
    }
    full
}

fn sanitize_font_name(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else if ch == ' ' {
            out.push('-');
        }
    }
    if out.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        out
    }
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Pt;

    #[test]
    fn bundled_fonts_cover_cyrillic_and_greek() {
        let fonts = FontRegistry::bundled().unwrap();
        let regular = fonts.embedded(FontFace::EmbeddedRegular).unwrap();
        assert_eq!(regular.name(), "DejaVuSans");
        assert!(regular.covers("Сбой базы данных"));
        assert!(regular.covers("Διακοπή"));
        assert_eq!(fonts.embedded(FontFace::EmbeddedBold).unwrap().name(), "DejaVuSans-Bold");
        assert!(regular.advance('Ж') > 0);
        assert_eq!(regular.advance('\t'), regular.advance(' '));
    }

    #[test]
    fn resolve_keeps_latin_on_base14() {
        let fonts = FontRegistry::bundled().unwrap();
        let latin = fonts.resolve(FontSpec::bold(10.0), "Relatório – “ok”");
        assert_eq!(latin.face, FontFace::Bold);
        let cyrillic = fonts.resolve(FontSpec::bold(10.0), "Отчёт");
        assert_eq!(cyrillic.face, FontFace::EmbeddedBold);
        assert_eq!(cyrillic.size, Pt::from_f32(10.0));
        let regular = fonts.resolve(FontSpec::regular(9.0), "Страница 2");
        assert_eq!(regular.face, FontFace::EmbeddedRegular);
    }

    #[test]
    fn base14_registry_never_switches_faces() {
        let fonts = FontRegistry::base14();
        assert!(!fonts.has_embedded());
        assert_eq!(fonts.resolve(FontSpec::regular(10.0), "Отчёт").face, FontFace::Regular);
        assert_eq!(
            fonts.advance(FontFace::EmbeddedRegular, 'A'),
            fonts.advance(FontFace::Regular, 'A')
        );
    }

    #[test]
    fn missing_weight_falls_back_to_the_other() {
        let regular = EmbeddedFont::from_bytes(BUNDLED_REGULAR.to_vec(), "DejaVuSans.ttf").unwrap();
        let fonts = FontRegistry::base14().with_regular(regular);
        assert_eq!(fonts.embedded(FontFace::EmbeddedBold).unwrap().name(), "DejaVuSans");
        assert!(fonts.embedded(FontFace::Bold).is_none());
    }

    #[test]
    fn rejects_non_font_data() {
        let err = EmbeddedFont::from_bytes(b"not a font".to_vec(), "broken.ttf").unwrap_err();
        assert!(matches!(err, ReportError::InvalidFont(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn configured_font_paths_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.ttf");
        std::fs::write(&path, BUNDLED_BOLD).unwrap();
        let config = FontConfig {
            regular: Some(path.clone()),
            bold: None,
            bundled: false,
        };
        let fonts = FontRegistry::from_config(&config).unwrap();
        assert_eq!(fonts.embedded(FontFace::EmbeddedRegular).unwrap().name(), "DejaVuSans-Bold");

        let missing = FontConfig {
            regular: Some(dir.path().join("missing.ttf")),
            ..config
        };
        assert!(matches!(
            FontRegistry::from_config(&missing),
            Err(ReportError::InvalidFont(_))
        ));
    }

    #[test]
    fn winansi_codes() {
        assert_eq!(winansi_code('A'), Some(b'A'));
        assert_eq!(winansi_code('ç'), Some(0xE7));
        assert_eq!(winansi_code('€'), Some(0x80));
        assert_eq!(winansi_code('Ж'), None);
    }
}
