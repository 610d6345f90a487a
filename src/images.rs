use base64::Engine;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::sync::Arc;

/// Raster formats accepted in data URLs. Anything else resolves to
/// `Unsupported` and is dropped before layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Unsupported,
}

impl ImageFormat {
    pub fn from_mime(mime: &str) -> Self {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => ImageFormat::Png,
            "image/jpeg" | "image/jpg" => ImageFormat::Jpeg,
            "image/gif" => ImageFormat::Gif,
            _ => ImageFormat::Unsupported,
        }
    }

    pub fn extension(&self) -> Option<&'static str> {
        match self {
            ImageFormat::Png => Some("png"),
            ImageFormat::Jpeg => Some("jpg"),
            ImageFormat::Gif => Some("gif"),
            ImageFormat::Unsupported => None,
        }
    }

    fn codec(&self) -> Option<image::ImageFormat> {
        match self {
            ImageFormat::Png => Some(image::ImageFormat::Png),
            ImageFormat::Jpeg => Some(image::ImageFormat::Jpeg),
            ImageFormat::Gif => Some(image::ImageFormat::Gif),
            ImageFormat::Unsupported => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub format: ImageFormat,
    pub width_px: u32,
    pub height_px: u32,
    bytes: Arc<[u8]>,
    resource_id: String,
}

impl DecodedImage {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn extension(&self) -> &'static str {
        self.format.extension().unwrap_or("bin")
    }

    /// Content-derived identifier; identical payloads share one PDF XObject.
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Height in the same unit as `width` that keeps the native aspect ratio.
    pub fn scaled_height(&self, width: f32) -> f32 {
        width * self.height_px as f32 / self.width_px as f32
    }
}

/// Split `data:<mime>;base64,<payload>` into its MIME type and payload.
/// Only base64 payloads are accepted.
pub fn parse_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.trim().strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mut params = header.split(';');
    let mime = params.next().unwrap_or_default();
    if !params.any(|param| param.trim().eq_ignore_ascii_case("base64")) {
        return None;
    }
    Some((mime, payload))
}

/// Decode a data URL into an image whose dimensions are known.
///
/// Every failure (empty string, unsupported MIME type, bad base64, unreadable
/// header, zero-sized image) yields `None`; callers skip the image.
pub fn decode_data_url(url: &str) -> Option<DecodedImage> {
    if url.trim().is_empty() {
        return None;
    }
    let Some((mime, payload)) = parse_data_url(url) else {
        tracing::debug!("skipping image: malformed data url");
        return None;
    };
    let format = ImageFormat::from_mime(mime);
    let Some(codec) = format.codec() else {
        tracing::debug!(mime, "skipping image: unsupported mime type");
        return None;
    };
    let payload: String = payload.chars().filter(|ch| !ch.is_whitespace()).collect();
    let bytes = match base64::engine::general_purpose::STANDARD.decode(payload.as_bytes()) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(error = %err, "skipping image: invalid base64 payload");
            return None;
        }
    };
    decode_bytes(bytes, format, codec)
}

fn decode_bytes(bytes: Vec<u8>, format: ImageFormat, codec: image::ImageFormat) -> Option<DecodedImage> {
    let reader = image::ImageReader::with_format(Cursor::new(bytes.as_slice()), codec);
    let (width_px, height_px) = match reader.into_dimensions() {
        Ok(dims) => dims,
        Err(err) => {
            tracing::debug!(error = %err, ?format, "skipping image: unreadable header");
            return None;
        }
    };
    if width_px == 0 || height_px == 0 {
        return None;
    }
    let digest = Sha256::digest(&bytes);
    let resource_id = digest
        .iter()
        .take(8)
        .map(|byte| format!("{:02x}", byte))
        .collect::<String>();
    Some(DecodedImage {
        format,
        width_px,
        height_px,
        bytes: Arc::from(bytes),
        resource_id: format!("img-{resource_id}"),
    })
}

/// Decode a list of data URLs in parallel, keeping input order and dropping
/// the ones that fail.
pub fn decode_all(urls: &[String]) -> Vec<DecodedImage> {
    urls.par_iter()
        .map(|url| decode_data_url(url))
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage, RgbaImage};

    pub(crate) fn encode(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
        let img = if format == image::ImageFormat::Png {
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                width,
                height,
                image::Rgba([10, 20, 30, 128]),
            ))
        } else {
            DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40])))
        };
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).expect("encode test image");
        buf.into_inner()
    }

    pub(crate) fn data_url(mime: &str, bytes: &[u8]) -> String {
        format!(
            "data:{mime};base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    pub(crate) fn png_data_url(width: u32, height: u32) -> String {
        data_url("image/png", &encode(width, height, image::ImageFormat::Png))
    }

    #[test]
    fn decodes_png_dimensions_from_header() {
        let decoded = decode_data_url(&png_data_url(40, 10)).expect("png decodes");
        assert_eq!(decoded.format, ImageFormat::Png);
        assert_eq!((decoded.width_px, decoded.height_px), (40, 10));
        assert_eq!(decoded.extension(), "png");
        assert!(decoded.resource_id().starts_with("img-"));
    }

    #[test]
    fn decodes_jpeg_and_gif() {
        let jpeg = data_url("image/jpeg", &encode(8, 6, image::ImageFormat::Jpeg));
        let gif = data_url("image/gif", &encode(3, 5, image::ImageFormat::Gif));

        let jpeg = decode_data_url(&jpeg).expect("jpeg decodes");
        assert_eq!(jpeg.extension(), "jpg");
        assert_eq!((jpeg.width_px, jpeg.height_px), (8, 6));

        let gif = decode_data_url(&gif).expect("gif decodes");
        assert_eq!(gif.extension(), "gif");
        assert_eq!((gif.width_px, gif.height_px), (3, 5));
    }

    #[test]
    fn unsupported_mime_types_are_absent() {
        let png = encode(4, 4, image::ImageFormat::Png);
        for mime in ["image/webp", "image/svg+xml", "application/pdf", "text/plain", ""] {
            assert!(decode_data_url(&data_url(mime, &png)).is_none(), "{mime}");
        }
    }

    #[test]
    fn malformed_inputs_are_absent() {
        assert!(decode_data_url("").is_none());
        assert!(decode_data_url("   ").is_none());
        assert!(decode_data_url("data:image/png;base64").is_none());
        assert!(decode_data_url("data:image/png,abcd").is_none());
        assert!(decode_data_url("data:image/png;base64,!!!not-base64!!!").is_none());
        // Valid base64, but not a PNG.
        assert!(decode_data_url("data:image/png;base64,aGVsbG8gd29ybGQ=").is_none());
        assert!(decode_data_url("https://example.com/logo.png").is_none());
    }

    #[test]
    fn identical_payloads_share_resource_ids() {
        let url = png_data_url(6, 6);
        let a = decode_data_url(&url).unwrap();
        let b = decode_data_url(&url).unwrap();
        let c = decode_data_url(&png_data_url(7, 6)).unwrap();
        assert_eq!(a.resource_id(), b.resource_id());
        assert_ne!(a.resource_id(), c.resource_id());
    }

    #[test]
    fn decode_all_keeps_order_and_drops_failures() {
        let urls = vec![
            png_data_url(10, 1),
            "data:image/bmp;base64,AAAA".to_string(),
            png_data_url(20, 2),
        ];
        let decoded = decode_all(&urls);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].width_px, 10);
        assert_eq!(decoded[1].width_px, 20);
    }

    #[test]
    fn scaled_height_preserves_aspect_ratio() {
        let decoded = decode_data_url(&png_data_url(200, 50)).unwrap();
        assert!((decoded.scaled_height(100.0) - 25.0).abs() < f32::EPSILON);
    }
}
