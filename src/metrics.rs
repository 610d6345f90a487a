use crate::font::FontRegistry;
use crate::types::Pt;

/// Faces the report draws with. `Regular` and `Bold` are the PDF base-14
/// Helvetica faces, measured with the standard AFM widths. The embedded
/// faces stand for the registry's TrueType fonts of the same weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontFace {
    Regular,
    Bold,
    EmbeddedRegular,
    EmbeddedBold,
}

impl FontFace {
    pub fn is_embedded(&self) -> bool {
        matches!(self, FontFace::EmbeddedRegular | FontFace::EmbeddedBold)
    }

    /// The base-14 face of the same weight.
    pub fn base14(&self) -> FontFace {
        match self {
            FontFace::Regular | FontFace::EmbeddedRegular => FontFace::Regular,
            FontFace::Bold | FontFace::EmbeddedBold => FontFace::Bold,
        }
    }

    pub fn embedded(&self) -> FontFace {
        match self {
            FontFace::Regular | FontFace::EmbeddedRegular => FontFace::EmbeddedRegular,
            FontFace::Bold | FontFace::EmbeddedBold => FontFace::EmbeddedBold,
        }
    }

    pub fn base_font(&self) -> &'static str {
        match self.base14() {
            FontFace::Bold => "Helvetica-Bold",
            _ => "Helvetica",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSpec {
    pub face: FontFace,
    pub size: Pt,
}

impl FontSpec {
    pub fn regular(size: f32) -> Self {
        Self {
            face: FontFace::Regular,
            size: Pt::from_f32(size),
        }
    }

    pub fn bold(size: f32) -> Self {
        Self {
            face: FontFace::Bold,
            size: Pt::from_f32(size),
        }
    }
}

const FIRST_CHAR: u32 = 32;
const MISSING_WIDTH: u16 = 556;

// Advance widths (1/1000 em) for U+0020..=U+007E.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722, 722, 667,
    611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667,
    667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500,
    222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, 975, 722, 722, 722, 722, 667,
    611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667,
    667, 611, 333, 278, 333, 584, 556, 333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556,
    278, 889, 611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

pub(crate) fn base14_advance(face: FontFace, ch: char) -> u16 {
    let table = match face.base14() {
        FontFace::Bold => &HELVETICA_BOLD_WIDTHS,
        _ => &HELVETICA_WIDTHS,
    };
    let ch = fold_to_ascii(ch);
    let code = ch as u32;
    if (FIRST_CHAR..FIRST_CHAR + table.len() as u32).contains(&code) {
        return table[(code - FIRST_CHAR) as usize];
    }
    match ch {
        '\u{2014}' | '\u{2030}' => 1000,
        '\u{2013}' | '\u{20AC}' => 556,
        '\u{2022}' => 350,
        '\u{2026}' => 1000,
        '\u{2018}' | '\u{2019}' => 222,
        '\u{201C}' | '\u{201D}' => 333,
        '\u{00A0}' => 278,
        _ => MISSING_WIDTH,
    }
}

// Accented Latin-1 letters share the advance of their base letter in the
// Helvetica AFMs closely enough for line breaking.
fn fold_to_ascii(ch: char) -> char {
    match ch {
        'À'..='Å' => 'A',
        'Ç' => 'C',
        'È'..='Ë' => 'E',
        'Ì'..='Ï' => 'I',
        'Ñ' => 'N',
        'Ò'..='Ö' | 'Ø' => 'O',
        'Ù'..='Ü' => 'U',
        'Ý' => 'Y',
        'à'..='å' => 'a',
        'ç' => 'c',
        'è'..='ë' => 'e',
        'ì'..='ï' => 'i',
        'ñ' => 'n',
        'ò'..='ö' | 'ø' => 'o',
        'ù'..='ü' => 'u',
        'ý' | 'ÿ' => 'y',
        '\t' => ' ',
        _ => ch,
    }
}

pub fn measure_text_width(fonts: &FontRegistry, font: FontSpec, text: &str) -> Pt {
    let units: i32 = text.chars().map(|ch| fonts.advance(font.face, ch) as i32).sum();
    if units <= 0 {
        return Pt::ZERO;
    }
    font.size.mul_ratio(units, 1000)
}

/// Greedy word wrap at `max_width`, breaking at single spaces so runs of
/// spaces and indentation survive. Explicit newlines always break; spaces
/// at a wrap point are dropped; words wider than a whole line are split by
/// character. Always returns at least one (possibly empty) line.
pub fn wrap_lines(fonts: &FontRegistry, font: FontSpec, text: &str, max_width: Pt) -> Vec<String> {
    let max_width = max_width.max(Pt::from_f32(1.0));
    let space_width = measure_text_width(fonts, font, " ");
    let mut lines = Vec::new();

    for segment in text.split('\n') {
        let segment = segment.trim_end_matches('\r');
        if segment.trim().is_empty() {
            lines.push(String::new());
            continue;
        }
        let mut current = String::new();
        let mut current_width = Pt::ZERO;
        let mut started = false;
        let mut after_wrap = false;
        for word in segment.split(' ') {
            if after_wrap && word.is_empty() {
                continue;
            }
            after_wrap = false;
            let word_width = measure_text_width(fonts, font, word);
            if started {
                let next_width = current_width + space_width + word_width;
                if next_width <= max_width {
                    current.push(' ');
                    current.push_str(word);
                    current_width = next_width;
                    continue;
                }
                lines.push(std::mem::take(&mut current));
                current_width = Pt::ZERO;
                started = false;
                if word.is_empty() {
                    after_wrap = true;
                    continue;
                }
            }
            started = true;
            if word_width > max_width {
                let mut pieces = split_long_word(fonts, font, word, max_width);
                // The tail keeps accepting words on the same line.
                if let Some(last) = pieces.pop() {
                    current_width = measure_text_width(fonts, font, &last);
                    current = last;
                }
                lines.extend(pieces);
            } else {
                current.push_str(word);
                current_width = word_width;
            }
        }
        if started {
            lines.push(current);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn split_long_word(fonts: &FontRegistry, font: FontSpec, word: &str, max_width: Pt) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_width = Pt::ZERO;
    for ch in word.chars() {
        let w = font.size.mul_ratio(fonts.advance(font.face, ch) as i32, 1000);
        if !current.is_empty() && current_width + w > max_width {
            pieces.push(std::mem::take(&mut current));
            current_width = Pt::ZERO;
        }
        current.push(ch);
        current_width += w;
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Number of lines `text` occupies at `max_width`. Pure: used to size table
/// rows before anything is drawn.
pub fn wrapped_line_count(fonts: &FontRegistry, font: FontSpec, text: &str, max_width: Pt) -> usize {
    wrap_lines(fonts, font, text, max_width).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fonts() -> FontRegistry {
        FontRegistry::base14()
    }

    #[test]
    fn measures_with_afm_widths() {
        let font = FontSpec::regular(10.0);
        // "Hi" = 722 + 222 units.
        assert_eq!(measure_text_width(&fonts(), font, "Hi").to_milli_i64(), 9440);
        let bold = FontSpec::bold(10.0);
        assert_eq!(measure_text_width(&fonts(), bold, "Hi").to_milli_i64(), 10000);
        assert_eq!(measure_text_width(&fonts(), font, ""), Pt::ZERO);
    }

    #[test]
    fn accented_letters_measure_like_their_base() {
        let font = FontSpec::regular(12.0);
        assert_eq!(
            measure_text_width(&fonts(), font, "Ação"),
            measure_text_width(&fonts(), font, "Acao")
        );
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let font = FontSpec::regular(10.0);
        let width = measure_text_width(&fonts(), font, "alpha beta");
        let lines = wrap_lines(&fonts(), font, "alpha beta beta alpha", width);
        assert_eq!(lines, vec!["alpha beta", "beta alpha"]);
    }

    #[test]
    fn newlines_and_blank_lines_are_kept() {
        let font = FontSpec::regular(10.0);
        let lines = wrap_lines(&fonts(), font, "one\n\ntwo", Pt::from_f32(500.0));
        assert_eq!(lines, vec!["one", "", "two"]);
        assert_eq!(wrap_lines(&fonts(), font, "", Pt::from_f32(500.0)), vec![""]);
    }

    #[test]
    fn long_words_split_by_character() {
        let font = FontSpec::regular(10.0);
        let max = measure_text_width(&fonts(), font, "0000");
        let lines = wrap_lines(&fonts(), font, "0123456789 a", max);
        assert_eq!(lines, vec!["0123", "4567", "89 a"]);
        for line in &lines {
            assert!(measure_text_width(&fonts(), font, line) <= max);
        }
    }

    #[test]
    fn line_count_matches_wrap() {
        let font = FontSpec::regular(10.0);
        let text = "word ".repeat(200);
        let width = Pt::from_mm(60.0);
        assert_eq!(
            wrapped_line_count(&fonts(), font, &text, width),
            wrap_lines(&fonts(), font, &text, width).len()
        );
        assert!(wrapped_line_count(&fonts(), font, &text, width) > 5);
        assert_eq!(wrapped_line_count(&fonts(), font, "", width), 1);
    }

    #[test]
    fn runs_of_spaces_and_indentation_survive() {
        let font = FontSpec::regular(10.0);
        let text = "$ kubectl get pods\n    web-1   Running\n\tdb-0    CrashLoop";
        let lines = wrap_lines(&fonts(), font, text, Pt::from_f32(500.0));
        assert_eq!(
            lines,
            vec!["$ kubectl get pods", "    web-1   Running", "\tdb-0    CrashLoop"]
        );
    }

    #[test]
    fn spaces_at_a_wrap_point_are_dropped() {
        let font = FontSpec::regular(10.0);
        let width = measure_text_width(&fonts(), font, "alpha");
        let lines = wrap_lines(&fonts(), font, "alpha    beta", width);
        assert_eq!(lines, vec!["alpha", "beta"]);
    }

    #[test]
    fn embedded_faces_measure_through_the_font() {
        let fonts = FontRegistry::bundled().unwrap();
        let latin = FontSpec::regular(10.0);
        let embedded = FontSpec {
            face: FontFace::EmbeddedRegular,
            ..latin
        };
        let width = measure_text_width(&fonts, embedded, "Сбой");
        assert!(width > Pt::ZERO);
        assert_ne!(
            measure_text_width(&fonts, embedded, "Hi"),
            measure_text_width(&fonts, latin, "Hi")
        );
        let lines = wrap_lines(&fonts, embedded, "Сбой базы данных", width);
        assert_eq!(lines[0], "Сбой");
    }
}
