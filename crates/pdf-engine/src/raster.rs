//! Inline signature images
//!
//! Only `data:` URIs carrying base64 PNG or JPEG bytes are drawn. Anything
//! else is reported so the renderer can fall back to a placeholder.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use image::ImageFormat;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_SIGNATURE: &[u8] = b"\xff\xd8\xff";

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("image source is not an inline base64 data URI")]
    NotInline,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is neither PNG nor JPEG")]
    UnknownFormat,
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has zero size")]
    Empty,
}

/// Decoded pixels split into the colour and alpha planes a page image needs
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    /// `None` when every pixel is opaque
    pub alpha: Option<Vec<u8>>,
}

pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(PNG_SIGNATURE) {
        Some(ImageFormat::Png)
    } else if bytes.starts_with(JPEG_SIGNATURE) {
        Some(ImageFormat::Jpeg)
    } else {
        None
    }
}

pub fn decode_data_uri(source: &str) -> Result<RasterImage, RasterError> {
    let source = source.trim();
    let Some(rest) = source.strip_prefix("data:") else {
        return Err(RasterError::NotInline);
    };
    let (header, payload) = rest.split_once(',').ok_or(RasterError::NotInline)?;
    if !header.split(';').any(|part| part.eq_ignore_ascii_case("base64")) {
        return Err(RasterError::NotInline);
    }

    let compact: String = payload.chars().filter(|ch| !ch.is_ascii_whitespace()).collect();
    let bytes = B64.decode(compact.as_bytes())?;
    decode_bytes(&bytes)
}

pub fn decode_bytes(bytes: &[u8]) -> Result<RasterImage, RasterError> {
    let format = sniff_format(bytes).ok_or(RasterError::UnknownFormat)?;
    let decoded = image::load_from_memory_with_format(bytes, format)?.to_rgba8();
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(RasterError::Empty);
    }

    let pixel_count = (width as usize) * (height as usize);
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);
    for pixel in decoded.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }
    let alpha = alpha.iter().any(|value| *value != u8::MAX).then_some(alpha);

    Ok(RasterImage { width, height, rgb, alpha })
}
