use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use image::ImageFormat;
use thiserror::Error;

// Upload boundary: what the picker and the drop target accept.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("could not read image data: {0}")]
    Unreadable(#[from] image::ImageError),
    #[error("unsupported image format: {0}")]
    Unsupported(String),
}

/// A transfer-ready image: base64 payload plus its media type.
pub struct EncodedImage {
    pub data: String,
    pub media_type: &'static str,
}

/// Sniffs the media type from the blob's magic bytes. Only the three
/// formats the edit service accepts are recognized.
pub fn sniff_media_type(bytes: &[u8]) -> Result<&'static str, CodecError> {
    match image::guess_format(bytes)? {
        ImageFormat::Png => Ok("image/png"),
        ImageFormat::Jpeg => Ok("image/jpeg"),
        ImageFormat::WebP => Ok("image/webp"),
        other => Err(CodecError::Unsupported(format!("{other:?}"))),
    }
}

/// Encodes a raw image blob for transfer. Fails if the blob is not a
/// recognizable image.
pub fn encode_image(bytes: &[u8]) -> Result<EncodedImage, CodecError> {
    let media_type = sniff_media_type(bytes)?;
    Ok(EncodedImage {
        data: BASE64_STANDARD.encode(bytes),
        media_type,
    })
}

/// File extension for a media type, used to name downloaded results.
pub fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_fixture() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([120, 40, 200, 255]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn sniffs_png() {
        assert_eq!(sniff_media_type(&png_fixture()).unwrap(), "image/png");
    }

    #[test]
    fn rejects_garbage() {
        let err = sniff_media_type(b"definitely not an image").unwrap_err();
        assert!(matches!(err, CodecError::Unreadable(_)));
    }

    #[test]
    fn encodes_with_media_type() {
        let bytes = png_fixture();
        let encoded = encode_image(&bytes).unwrap();
        assert_eq!(encoded.media_type, "image/png");
        assert_eq!(BASE64_STANDARD.decode(encoded.data).unwrap(), bytes);
    }

    #[test]
    fn extension_mapping() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/webp"), "webp");
        // Anything odd falls back to png rather than producing a bare name.
        assert_eq!(extension_for("image/whatever"), "png");
    }
}
