use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::VisionError;

/// Still-image container recognised from its magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    WebP,
}

impl ImageFormat {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if bytes.starts_with(b"BM") {
            Some(ImageFormat::Bmp)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageFormat::WebP)
        } else {
            None
        }
    }
}

/// One encoded camera frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl Frame {
    /// Decode the `image` field of a predict request. Accepts bare base64 or
    /// a data URL (`data:image/jpeg;base64,...`); everything up to the first
    /// comma is dropped.
    pub fn from_base64(payload: &str) -> Result<Self, VisionError> {
        let encoded = match payload.split_once(',') {
            Some((_, rest)) => rest,
            None => payload,
        };
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(VisionError::Decode("empty image payload".into()));
        }

        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| VisionError::Decode(format!("invalid base64: {}", e)))?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, VisionError> {
        let format = ImageFormat::sniff(&bytes)
            .ok_or_else(|| VisionError::Decode("unrecognised image format".into()))?;
        Ok(Self { bytes, format })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    #[test]
    fn test_bare_base64_png() {
        let png = b"\x89PNG\r\n\x1a\nIHDR";
        let frame = Frame::from_base64(&encode(png)).unwrap();
        assert_eq!(frame.format(), ImageFormat::Png);
        assert_eq!(frame.bytes(), png);
    }

    #[test]
    fn test_data_url_prefix_is_stripped() {
        let jpeg = [0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10];
        let payload = format!("data:image/jpeg;base64,{}", encode(&jpeg));
        let frame = Frame::from_base64(&payload).unwrap();
        assert_eq!(frame.format(), ImageFormat::Jpeg);
        assert_eq!(frame.len(), jpeg.len());
    }

    #[test]
    fn test_webp_sniff() {
        let webp = b"RIFF\x10\x00\x00\x00WEBPVP8 ";
        assert_eq!(ImageFormat::sniff(webp), Some(ImageFormat::WebP));
        assert_eq!(ImageFormat::sniff(b"RIFF\x10\x00\x00\x00WAVE"), None);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            Frame::from_base64(""),
            Err(VisionError::Decode(_))
        ));
        assert!(matches!(
            Frame::from_base64("data:image/png;base64,"),
            Err(VisionError::Decode(_))
        ));
        assert!(matches!(
            Frame::from_base64("not base64 at all!!"),
            Err(VisionError::Decode(_))
        ));
        assert!(matches!(
            Frame::from_base64(&encode(b"plain text, not an image")),
            Err(VisionError::Decode(_))
        ));
    }
}
