use lopdf::{Document as LoDocument, Object};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("pdf parse failed: {0}")]
    Parse(String),

    #[error("pdf is encrypted")]
    Encrypted,

    #[error("pdf has no pages")]
    NoPages,

    #[error("pdf io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfSummary {
    pub pdf_version: String,
    pub page_count: usize,
    pub encrypted: bool,
    pub file_size_bytes: usize,
    pub title: Option<String>,
    pub image_count: usize,
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<PdfSummary, InspectError> {
    let pdf = LoDocument::load_mem(bytes).map_err(|err| InspectError::Parse(err.to_string()))?;

    Ok(PdfSummary {
        pdf_version: pdf.version.clone(),
        page_count: pdf.get_pages().len(),
        encrypted: pdf.is_encrypted(),
        file_size_bytes: bytes.len(),
        title: info_title(&pdf),
        image_count: count_images(&pdf),
    })
}

pub fn inspect_pdf_path(path: &Path) -> Result<PdfSummary, InspectError> {
    let data = std::fs::read(path)?;
    inspect_pdf_bytes(&data)
}

/// A written report must be a readable, unencrypted PDF with pages.
pub fn require_readable(summary: &PdfSummary) -> Result<(), InspectError> {
    if summary.encrypted {
        return Err(InspectError::Encrypted);
    }
    if summary.page_count == 0 {
        return Err(InspectError::NoPages);
    }
    Ok(())
}

fn info_title(pdf: &LoDocument) -> Option<String> {
    let info_id = pdf.trailer.get(b"Info").ok()?.as_reference().ok()?;
    let info = pdf.get_dictionary(info_id).ok()?;
    let title = info.get(b"Title").ok()?.as_str().ok()?;
    Some(decode_text_string(title))
}

/// UTF-16BE when it starts with a byte order mark, otherwise one byte per
/// character.
fn decode_text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => bytes.iter().map(|byte| char::from(*byte)).collect(),
    }
}

// Soft masks are images too but not placements; they are excluded.
fn count_images(pdf: &LoDocument) -> usize {
    let masks: Vec<_> = pdf
        .objects
        .values()
        .filter_map(|object| match object {
            Object::Stream(stream) => stream.dict.get(b"SMask").ok()?.as_reference().ok(),
            _ => None,
        })
        .collect();
    pdf.objects
        .iter()
        .filter(|(id, object)| {
            let Object::Stream(stream) = object else {
                return false;
            };
            let is_image = stream
                .dict
                .get(b"Subtype")
                .and_then(Object::as_name)
                .map(|name| name == b"Image")
                .unwrap_or(false);
            is_image && !masks.contains(*id)
        })
        .count()
}
