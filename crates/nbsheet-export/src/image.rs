//! Embedded `image/png` outputs.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use serde_json::Value;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Error decoding an embedded image.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// The payload is not valid base64.
    #[error("invalid base64 image data")]
    Base64(#[from] base64::DecodeError),

    /// The decoded bytes are not a PNG image.
    #[error("image data is not a PNG file")]
    NotPng,
}

/// A decoded PNG with its pixel size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PngImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PngImage {
    /// Decode a base64 payload. Whitespace in the payload is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError`] if the payload is not base64-encoded PNG data.
    pub fn from_base64(payload: &str) -> Result<Self, ImageError> {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = BASE64_STANDARD.decode(compact)?;
        let (width, height) = png_size(&bytes).ok_or(ImageError::NotPng)?;
        Ok(Self {
            bytes,
            width,
            height,
        })
    }

    /// Scale factors that fit the image to a requested size.
    ///
    /// `metadata` is the output's `image/png` metadata entry. An axis keeps a
    /// factor of 1.0 unless both the requested and the pixel size are positive.
    #[must_use]
    pub fn scale(&self, metadata: Option<&Value>) -> (f64, f64) {
        let requested = |key: &str| {
            metadata
                .and_then(|m| m.get(key))
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
        };
        let factor = |want: f64, have: u32| {
            if want > 0.0 && have > 0 {
                want / f64::from(have)
            } else {
                1.0
            }
        };
        (
            factor(requested("width"), self.width),
            factor(requested("height"), self.height),
        )
    }
}

/// Width and height from the IHDR chunk.
fn png_size(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.len() < 24 || !bytes.starts_with(PNG_SIGNATURE) || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let read = |at: usize| {
        let raw: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
        Some(u32::from_be_bytes(raw))
    };
    Some((read(16)?, read(20)?))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A valid 1x1 transparent PNG.
    pub(crate) const PIXEL_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn test_decode_pixel() {
        let image = PngImage::from_base64(PIXEL_PNG).unwrap();
        assert_eq!((image.width, image.height), (1, 1));
        assert!(image.bytes.starts_with(PNG_SIGNATURE));
    }

    #[test]
    fn test_decode_tolerates_line_breaks() {
        let (head, tail) = PIXEL_PNG.split_at(20);
        let wrapped = format!("{head}\n  {tail}\n");
        assert!(PngImage::from_base64(&wrapped).is_ok());
    }

    #[test]
    fn test_decode_rejects_non_png() {
        let payload = BASE64_STANDARD.encode(b"GIF89a not a png at all, but long enough");
        assert!(matches!(
            PngImage::from_base64(&payload),
            Err(ImageError::NotPng)
        ));
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        assert!(matches!(
            PngImage::from_base64("@@@"),
            Err(ImageError::Base64(_))
        ));
    }

    #[test]
    fn test_scale_from_metadata() {
        let image = PngImage {
            bytes: Vec::new(),
            width: 200,
            height: 100,
        };
        let metadata: Value = serde_json::json!({"width": 100, "height": 50});
        assert_eq!(image.scale(Some(&metadata)), (0.5, 0.5));
        assert_eq!(image.scale(None), (1.0, 1.0));

        let only_width: Value = serde_json::json!({"width": 400});
        assert_eq!(image.scale(Some(&only_width)), (2.0, 1.0));
    }
}
