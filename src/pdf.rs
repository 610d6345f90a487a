//! Serializes a laid-out [`Document`] into PDF 1.4 bytes.
//!
//! Output is deterministic: object order follows page order and the sorted
//! image registry, and the info dictionary carries no timestamps.
//!
//! Base-14 text is written as WinAnsi literal strings. Text drawn with an
//! embedded face is written as two-byte glyph ids through a Type0 font with
//! Identity-H encoding and a ToUnicode map, so it stays extractable.

use fixed::types::I32F32;
use image::GenericImageView;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

use crate::canvas::{Command, Document, Page};
use crate::error::ReportError;
use crate::font::{EmbeddedFont, FontRegistry, winansi_code};
use crate::images::{DecodedImage, ImageFormat};
use crate::metrics::FontFace;
use crate::types::{Color, Pt};

const PDF_HEADER: &[u8] = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n";
const PRODUCER: &str = "postmortem-pdf";

const CATALOG_ID: usize = 1;
const PAGES_ID: usize = 2;
const INFO_ID: usize = 3;
const FIRST_FONT_ID: usize = 4;
const FONTS: [FontFace; 2] = [FontFace::Regular, FontFace::Bold];
const EMBEDDED_FONTS: [FontFace; 2] = [FontFace::EmbeddedRegular, FontFace::EmbeddedBold];

fn font_resource(face: FontFace) -> &'static str {
    match face {
        FontFace::Regular => "F1",
        FontFace::Bold => "F2",
        FontFace::EmbeddedRegular => "F3",
        FontFace::EmbeddedBold => "F4",
    }
}

/// Glyph ids drawn per embedded face, with the character each one stands for.
type GlyphUsage = BTreeMap<FontFace, BTreeMap<u16, char>>;

/// Font and size in effect while walking a page, following q/Q nesting the
/// way the canvas does.
struct TextState {
    font: FontFace,
    size: Pt,
    stack: Vec<(FontFace, Pt)>,
}

impl TextState {
    fn new() -> Self {
        Self {
            font: FontFace::Regular,
            size: Pt::from_f32(12.0),
            stack: Vec::new(),
        }
    }

    fn apply(&mut self, cmd: &Command) {
        match cmd {
            Command::SaveState => self.stack.push((self.font, self.size)),
            Command::RestoreState => {
                if let Some((font, size)) = self.stack.pop() {
                    self.font = font;
                    self.size = size;
                }
            }
            Command::SetFont(face) => self.font = *face,
            Command::SetFontSize(size) => self.size = *size,
            _ => {}
        }
    }

    /// The embedded font for the current face, or `None` when text goes out
    /// as base-14. An embedded face with no registered font degrades to the
    /// base-14 face of the same weight.
    fn embedded<'a>(&self, fonts: &'a FontRegistry) -> Option<&'a EmbeddedFont> {
        if self.font.is_embedded() {
            fonts.embedded(self.font)
        } else {
            None
        }
    }

    fn resource(&self, fonts: &FontRegistry) -> &'static str {
        match self.embedded(fonts) {
            Some(_) => font_resource(self.font),
            None => font_resource(self.font.base14()),
        }
    }
}

struct ImageData {
    width: u32,
    height: u32,
    color_space: &'static str,
    filter: &'static str,
    data: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

struct ImageResource {
    name: String,
    object_id: usize,
}

pub fn document_to_pdf(document: &Document, title: Option<&str>) -> Result<Vec<u8>, ReportError> {
    let mut out = Vec::new();
    write_document(document, title, &mut out)
        .map_err(|err| ReportError::Serialize(err.to_string()))?;
    Ok(out)
}

fn write_document<W: Write>(document: &Document, title: Option<&str>, writer: &mut W) -> io::Result<()> {
    // Decode every registered image up front; failures drop the image.
    let registered: Vec<(&String, &DecodedImage)> = document.images.iter().collect();
    let decoded: Vec<(&String, Option<ImageData>)> = registered
        .par_iter()
        .map(|(id, image)| (*id, decode_image(image)))
        .collect();

    let mut objects: Vec<String> = vec![String::new(); FIRST_FONT_ID - 1];
    objects[INFO_ID - 1] = info_object(title);
    let mut font_entries = Vec::new();
    for face in FONTS {
        objects.push(font_object(face.base_font()));
        font_entries.push(format!("/{} {} 0 R", font_resource(face), objects.len()));
    }

    let fonts = document.fonts.as_ref();
    let usage = glyph_usage(document);
    for face in EMBEDDED_FONTS {
        let (Some(glyphs), Some(font)) = (usage.get(&face), fonts.embedded(face)) else {
            continue;
        };
        let type0_id = push_cidfont_objects(&mut objects, font, glyphs);
        font_entries.push(format!("/{} {} 0 R", font_resource(face), type0_id));
        tracing::debug!(font = font.name(), glyphs = glyphs.len(), "embedded font");
    }
    let font_resources = format!("<< {} >>", font_entries.join(" "));

    let mut image_map: BTreeMap<String, ImageResource> = BTreeMap::new();
    for (index, (id, data)) in decoded.into_iter().enumerate() {
        let Some(data) = data else {
            tracing::warn!(resource = %id, "dropping image that failed to decode");
            continue;
        };
        let smask_id = data.alpha.as_ref().map(|alpha| {
            objects.push(image_smask_object(data.width, data.height, alpha));
            objects.len()
        });
        objects.push(image_object(&data, smask_id));
        image_map.insert(
            id.clone(),
            ImageResource {
                name: format!("Im{}", index + 1),
                object_id: objects.len(),
            },
        );
    }

    let width = document.page_size.width;
    let height = document.page_size.height;
    let mut page_ids = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let content = render_page(page, height, fonts, &image_map);
        objects.push(stream_object(&content));
        let content_id = objects.len();
        let xobjects = xobject_resources(page, &image_map);
        objects.push(format!(
            "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] /Resources << /Font {}{} >> /Contents {} 0 R >>",
            PAGES_ID,
            fmt_pt(width),
            fmt_pt(height),
            font_resources,
            xobjects,
            content_id
        ));
        page_ids.push(objects.len());
    }

    objects[CATALOG_ID - 1] = format!("<< /Type /Catalog /Pages {} 0 R >>", PAGES_ID);
    let kids = page_ids
        .iter()
        .map(|id| format!("{} 0 R", id))
        .collect::<Vec<_>>()
        .join(" ");
    objects[PAGES_ID - 1] = format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids,
        page_ids.len()
    );

    write_objects(writer, &objects)
}

fn write_objects<W: Write>(writer: &mut W, objects: &[String]) -> io::Result<()> {
    let mut offset = 0usize;
    let mut offsets = vec![0usize; objects.len() + 1];
    write_bytes(writer, PDF_HEADER, &mut offset)?;
    for (index, body) in objects.iter().enumerate() {
        write_pdf_object(writer, &mut offset, &mut offsets, index + 1, body)?;
    }

    let xref_start = offset;
    write_str(writer, &format!("xref\n0 {}\n", objects.len() + 1), &mut offset)?;
    write_str(writer, "0000000000 65535 f \n", &mut offset)?;
    for entry in offsets.iter().skip(1) {
        write_str(writer, &format!("{:010} 00000 n \n", entry), &mut offset)?;
    }
    write_str(
        writer,
        &format!(
            "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF",
            objects.len() + 1,
            CATALOG_ID,
            INFO_ID,
            xref_start
        ),
        &mut offset,
    )?;
    writer.flush()
}

fn write_pdf_object<W: Write>(
    writer: &mut W,
    offset: &mut usize,
    offsets: &mut [usize],
    obj_id: usize,
    body: &str,
) -> io::Result<()> {
    if let Some(slot) = offsets.get_mut(obj_id) {
        *slot = *offset;
    }
    write_str(writer, &format!("{} 0 obj\n", obj_id), offset)?;
    write_bytes(writer, body.as_bytes(), offset)?;
    write_bytes(writer, b"\nendobj\n", offset)?;
    Ok(())
}

fn write_bytes<W: Write>(writer: &mut W, data: &[u8], offset: &mut usize) -> io::Result<()> {
    writer.write_all(data)?;
    *offset += data.len();
    Ok(())
}

fn write_str<W: Write>(writer: &mut W, data: &str, offset: &mut usize) -> io::Result<()> {
    write_bytes(writer, data.as_bytes(), offset)
}

fn render_page(
    page: &Page,
    page_height: Pt,
    fonts: &FontRegistry,
    image_map: &BTreeMap<String, ImageResource>,
) -> String {
    let mut out = String::new();
    let mut state = TextState::new();

    for cmd in &page.commands {
        state.apply(cmd);
        match cmd {
            Command::SaveState => out.push_str("q\n"),
            Command::RestoreState => out.push_str("Q\n"),
            Command::SetFillColor(color) => out.push_str(&color_to_pdf_fill(*color)),
            Command::SetStrokeColor(color) => out.push_str(&color_to_pdf_stroke(*color)),
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetFont(_) | Command::SetFontSize(_) => {}
            Command::MoveTo { x, y } => {
                out.push_str(&format!("{} {} m\n", fmt_pt(*x), fmt_pt(page_height - *y)));
            }
            Command::LineTo { x, y } => {
                out.push_str(&format!("{} {} l\n", fmt_pt(*x), fmt_pt(page_height - *y)));
            }
            Command::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} {} {} c\n",
                    fmt_pt(*x1),
                    fmt_pt(page_height - *y1),
                    fmt_pt(*x2),
                    fmt_pt(page_height - *y2),
                    fmt_pt(*x),
                    fmt_pt(page_height - *y),
                ));
            }
            Command::ClosePath => out.push_str("h\n"),
            Command::Fill => out.push_str("f\n"),
            Command::Stroke => out.push_str("S\n"),
            Command::FillStroke => out.push_str("B\n"),
            Command::DrawString { x, y, text } => {
                let shown = match state.embedded(fonts) {
                    Some(font) => encode_glyph_hex(font, text),
                    None => {
                        let encoded = encode_winansi_pdf_string(text);
                        if encoded.replaced > 0 {
                            tracing::debug!(
                                replaced = encoded.replaced,
                                "characters outside WinAnsi replaced with '?'"
                            );
                        }
                        format!("({})", encoded.text)
                    }
                };
                out.push_str("BT\n");
                out.push_str(&format!(
                    "/{} {} Tf\n",
                    state.resource(fonts),
                    fmt_pt(state.size)
                ));
                out.push_str(&format!(
                    "{} {} Td\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - state.size)
                ));
                out.push_str(&format!("{} Tj\n", shown));
                out.push_str("ET\n");
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                if let Some(resource) = image_map.get(resource_id) {
                    let draw_y = page_height - *y - *height;
                    out.push_str("q\n");
                    out.push_str(&format!(
                        "{} 0 0 {} {} {} cm\n",
                        fmt_pt(*width),
                        fmt_pt(*height),
                        fmt_pt(*x),
                        fmt_pt(draw_y)
                    ));
                    out.push_str(&format!("/{} Do\n", resource.name));
                    out.push_str("Q\n");
                }
            }
        }
    }

    out
}

fn decode_image(image: &DecodedImage) -> Option<ImageData> {
    let data = image.bytes();
    let decoded = match image::load_from_memory(data) {
        Ok(decoded) => decoded,
        Err(err) => {
            tracing::debug!(error = %err, resource = image.resource_id(), "image pixels unreadable");
            return None;
        }
    };
    let (width, height) = decoded.dimensions();

    if image.format == ImageFormat::Jpeg {
        let color_space = match decoded.color() {
            image::ColorType::L8 | image::ColorType::La8 => "/DeviceGray",
            _ => "/DeviceRGB",
        };
        return Some(ImageData {
            width,
            height,
            color_space,
            filter: "/DCTDecode",
            data: data.to_vec(),
            alpha: None,
        });
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    let mut has_alpha = false;
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        if a != 255 {
            has_alpha = true;
        }
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    Some(ImageData {
        width,
        height,
        color_space: "/DeviceRGB",
        filter: "/FlateDecode",
        data: flate_compress(&rgb),
        alpha: has_alpha.then(|| flate_compress(&alpha)),
    })
}

fn flate_compress(data: &[u8]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}

fn image_object(image: &ImageData, smask_id: Option<usize>) -> String {
    let stream_data = encode_stream_data(&image.data);
    let smask = smask_id
        .map(|id| format!(" /SMask {} 0 R", id))
        .unwrap_or_default();
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} /BitsPerComponent 8 /Length {} /Filter [/ASCIIHexDecode {}]{} >>\nstream\n{}\nendstream",
        image.width,
        image.height,
        image.color_space,
        stream_data.len(),
        image.filter,
        smask,
        stream_data
    )
}

fn image_smask_object(width: u32, height: u32, alpha: &[u8]) -> String {
    let stream_data = encode_stream_data(alpha);
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceGray /BitsPerComponent 8 /Length {} /Filter [/ASCIIHexDecode /FlateDecode] >>\nstream\n{}\nendstream",
        width,
        height,
        stream_data.len(),
        stream_data
    )
}

fn encode_stream_data(data: &[u8]) -> String {
    let mut hex = ascii_hex_encode(data);
    hex.push('>');
    hex
}

fn ascii_hex_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2 + data.len() / 32);
    for (index, byte) in data.iter().enumerate() {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02X}", byte);
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out
}

fn font_object(base_font: &str) -> String {
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        base_font
    )
}

fn glyph_usage(document: &Document) -> GlyphUsage {
    let fonts = document.fonts.as_ref();
    let mut usage = GlyphUsage::new();
    if !fonts.has_embedded() {
        return usage;
    }
    for page in &document.pages {
        let mut state = TextState::new();
        for cmd in &page.commands {
            state.apply(cmd);
            let Command::DrawString { text, .. } = cmd else {
                continue;
            };
            let Some(font) = state.embedded(fonts) else {
                continue;
            };
            let glyphs = usage.entry(state.font).or_default();
            for ch in text.chars() {
                if let Some(gid) = font.glyph_id(ch) {
                    glyphs.entry(gid).or_insert(if ch == '\t' { ' ' } else { ch });
                }
            }
        }
    }
    usage
}

/// Pushes font file, descriptor, CIDFont, ToUnicode and Type0 objects and
/// returns the Type0 object id.
fn push_cidfont_objects(objects: &mut Vec<String>, font: &EmbeddedFont, glyphs: &BTreeMap<u16, char>) -> usize {
    objects.push(font_file_object(font.data()));
    let font_file_id = objects.len();
    objects.push(font_descriptor_object(font, font_file_id));
    let descriptor_id = objects.len();

    let widths = glyphs
        .keys()
        .map(|gid| format!("{} [{}]", gid, font.glyph_advance(*gid)))
        .collect::<Vec<_>>();
    objects.push(format!(
        "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /{} /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> /FontDescriptor {} 0 R /DW {} /W [{}] /CIDToGIDMap /Identity >>",
        font.name(),
        descriptor_id,
        font.missing_width,
        widths.join(" ")
    ));
    let cid_font_id = objects.len();

    objects.push(stream_object(&to_unicode_cmap(glyphs)));
    let to_unicode_id = objects.len();

    objects.push(format!(
        "<< /Type /Font /Subtype /Type0 /BaseFont /{} /Encoding /Identity-H /DescendantFonts [{} 0 R] /ToUnicode {} 0 R >>",
        font.name(),
        cid_font_id,
        to_unicode_id
    ));
    objects.len()
}

fn font_descriptor_object(font: &EmbeddedFont, font_file_id: usize) -> String {
    // Nonsymbolic, plus FixedPitch when monospaced.
    let mut flags = 32;
    if font.is_fixed_pitch {
        flags |= 1;
    }
    let (x_min, y_min, x_max, y_max) = font.bbox;
    format!(
        "<< /Type /FontDescriptor /FontName /{} /Flags {} /FontBBox [{} {} {} {}] /ItalicAngle {} /Ascent {} /Descent {} /CapHeight {} /StemV 80 /MissingWidth {} /FontFile2 {} 0 R >>",
        font.name(),
        flags,
        x_min,
        y_min,
        x_max,
        y_max,
        font.italic_angle,
        font.ascent,
        font.descent,
        font.cap_height,
        font.missing_width,
        font_file_id
    )
}

fn font_file_object(data: &[u8]) -> String {
    let stream_data = encode_stream_data(&flate_compress(data));
    format!(
        "<< /Length {} /Length1 {} /Filter [/ASCIIHexDecode /FlateDecode] >>\nstream\n{}\nendstream",
        stream_data.len(),
        data.len(),
        stream_data
    )
}

fn to_unicode_cmap(glyphs: &BTreeMap<u16, char>) -> String {
    let entries: Vec<(&u16, &char)> = glyphs.iter().collect();

    let mut out = String::new();
    out.push_str("/CIDInit /ProcSet findresource begin\n");
    out.push_str("12 dict begin\n");
    out.push_str("begincmap\n");
    out.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    out.push_str("/CMapName /Adobe-Identity-UCS def\n");
    out.push_str("/CMapType 2 def\n");
    out.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    // At most 100 entries per bfchar block.
    for chunk in entries.chunks(100) {
        out.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (gid, ch) in chunk {
            let mut units = [0u16; 2];
            let utf16 = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|unit| format!("{:04X}", unit))
                .collect::<String>();
            out.push_str(&format!("<{:04X}> <{}>\n", gid, utf16));
        }
        out.push_str("endbfchar\n");
    }

    out.push_str("endcmap\n");
    out.push_str("CMapName currentdict /CMap defineresource pop\n");
    out.push_str("end\nend\n");
    out
}

/// Two-byte glyph ids as a hex string. Characters the font lacks show its
/// .notdef glyph.
fn encode_glyph_hex(font: &EmbeddedFont, text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 4 + 2);
    out.push('<');
    let mut missing = 0usize;
    for ch in text.chars() {
        let gid = font.glyph_id(ch).unwrap_or_else(|| {
            missing += 1;
            0
        });
        out.push_str(&format!("{:04X}", gid));
    }
    out.push('>');
    if missing > 0 {
        tracing::debug!(font = font.name(), missing, "characters missing from embedded font");
    }
    out
}

fn xobject_resources(page: &Page, image_map: &BTreeMap<String, ImageResource>) -> String {
    let used: BTreeSet<&str> = page
        .commands
        .iter()
        .filter_map(|cmd| match cmd {
            Command::DrawImage { resource_id, .. } => Some(resource_id.as_str()),
            _ => None,
        })
        .collect();
    let entries = used
        .into_iter()
        .filter_map(|id| image_map.get(id))
        .map(|resource| format!("/{} {} 0 R", resource.name, resource.object_id))
        .collect::<Vec<_>>();
    if entries.is_empty() {
        return String::new();
    }
    format!(" /XObject << {} >>", entries.join(" "))
}

fn stream_object(content: &str) -> String {
    let length = content.len();
    format!("<< /Length {} >>\nstream\n{}\nendstream", length, content)
}

fn info_object(title: Option<&str>) -> String {
    let mut entries: Vec<String> = Vec::new();
    if let Some(title) = title.filter(|title| !title.is_empty()) {
        entries.push(format!("/Title {}", encode_text_string(title)));
    }
    entries.push(format!("/Producer ({})", PRODUCER));
    format!("<< {} >>", entries.join(" "))
}

/// Text string for the info dictionary: a literal when ASCII, otherwise
/// UTF-16BE with a byte order mark.
fn encode_text_string(text: &str) -> String {
    if text.is_ascii() {
        return format!("({})", encode_winansi_pdf_string(text).text);
    }
    let mut out = String::from("<FEFF");
    for unit in text.encode_utf16() {
        out.push_str(&format!("{:04X}", unit));
    }
    out.push('>');
    out
}

struct WinAnsiEncoded {
    text: String,
    replaced: usize,
}

fn encode_winansi_pdf_string(input: &str) -> WinAnsiEncoded {
    let mut out = String::new();
    let mut replaced = 0usize;
    for ch in input.chars() {
        let byte = winansi_code(ch).unwrap_or_else(|| {
            replaced += 1;
            b'?'
        });

        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b if !(0x20..0x7f).contains(&b) => out.push_str(&format!("\\{:03o}", b)),
            b => out.push(b as char),
        }
    }

    WinAnsiEncoded {
        text: out,
        replaced,
    }
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value);
    let scaled = (fixed * I32F32::from_num(1000)).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{}{}", sign, int_part)
    } else {
        let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
        while s.ends_with('0') {
            s.pop();
        }
        s
    }
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

fn color_to_pdf_fill(color: Color) -> String {
    format!(
        "{} {} {} rg\n",
        fmt(clamp_unit(color.r)),
        fmt(clamp_unit(color.g)),
        fmt(clamp_unit(color.b))
    )
}

fn color_to_pdf_stroke(color: Color) -> String {
    format!(
        "{} {} {} RG\n",
        fmt(clamp_unit(color.r)),
        fmt(clamp_unit(color.g)),
        fmt(clamp_unit(color.b))
    )
}
