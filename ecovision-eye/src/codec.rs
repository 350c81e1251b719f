//! Base64 and image encoding helpers

use crate::error::VisionError;
use crate::types::Mask;
use base64::{engine::general_purpose, Engine as _};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbImage};
use std::io::Cursor;

/// Largest image accepted for decoding, in pixels.
pub const MAX_IMAGE_PIXELS: u64 = 100_000_000;

/// Decode a base64 image payload, tolerating a `data:` URL prefix and
/// embedded whitespace.
pub fn decode_base64_image(payload: &str) -> Result<Vec<u8>, VisionError> {
    let body = match payload.split_once(',') {
        Some((_, rest)) => rest,
        None => payload,
    };

    let cleaned: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| VisionError::InvalidInput(format!("Failed to decode base64 image: {}", e)))
}

pub fn encode_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// `data:image/<format>;base64,<payload>`, format lowercased.
pub fn encode_data_url(bytes: &[u8], format: &str) -> String {
    format!(
        "data:image/{};base64,{}",
        format.to_lowercase(),
        encode_base64(bytes)
    )
}

/// Decode any format the `image` crate understands into 8-bit RGB.
///
/// Dimensions are read from the header first; images above
/// [`MAX_IMAGE_PIXELS`] are rejected before any pixel buffer is allocated.
pub fn decode_pixels(bytes: &[u8]) -> Result<RgbImage, VisionError> {
    if bytes.is_empty() {
        return Err(VisionError::InvalidInput("Empty image data".to_string()));
    }

    let (width, height) = image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| VisionError::InvalidInput(format!("Failed to read image: {}", e)))?
        .into_dimensions()
        .map_err(|e| VisionError::InvalidInput(format!("Failed to decode image: {}", e)))?;
    check_pixel_count(width, height)?;

    let img = image::load_from_memory(bytes)
        .map_err(|e| VisionError::InvalidInput(format!("Failed to decode image: {}", e)))?;

    Ok(img.to_rgb8())
}

fn check_pixel_count(width: u32, height: u32) -> Result<(), VisionError> {
    if width == 0 || height == 0 {
        return Err(VisionError::InvalidInput("Image has zero dimensions".to_string()));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_IMAGE_PIXELS {
        return Err(VisionError::InvalidInput(format!(
            "Image too large: {}x{} ({} pixels, max {})",
            width, height, pixels, MAX_IMAGE_PIXELS
        )));
    }
    Ok(())
}

/// Encode a mask as a grayscale PNG data URL.
pub fn encode_mask_png(mask: &Mask) -> Result<String, VisionError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(mask.data(), mask.width(), mask.height(), ColorType::L8)?;
    Ok(encode_data_url(&buf, "png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_and_data_url() {
        let plain = encode_base64(b"hello");
        assert_eq!(decode_base64_image(&plain).unwrap(), b"hello");

        let url = encode_data_url(b"hello", "JPEG");
        assert!(url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(decode_base64_image(&url).unwrap(), b"hello");
    }

    #[test]
    fn test_decode_strips_whitespace() {
        let encoded = encode_base64(b"some image bytes");
        let (a, b) = encoded.split_at(6);
        let spaced = format!("  {}\n{}\r\n ", a, b);
        assert_eq!(decode_base64_image(&spaced).unwrap(), b"some image bytes");
    }

    #[test]
    fn test_decode_invalid_base64() {
        let err = decode_base64_image("!!!not base64!!!").unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_decode_pixels_rejects_garbage() {
        assert!(decode_pixels(&[]).unwrap_err().is_input_error());
        assert!(decode_pixels(b"not an image").unwrap_err().is_input_error());
    }

    #[test]
    fn test_decode_pixels_png() {
        let img = RgbImage::from_pixel(8, 4, image::Rgb([10, 20, 30]));
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(img.as_raw(), 8, 4, ColorType::Rgb8)
            .unwrap();

        let decoded = decode_pixels(&buf).unwrap();
        assert_eq!(decoded.dimensions(), (8, 4));
        assert_eq!(decoded.get_pixel(3, 2).0, [10, 20, 30]);
    }

    #[test]
    fn test_decode_pixels_rejects_oversized_header() {
        // PPM header only: 10001x10000 declared, no pixel data follows.
        let header = b"P6\n10001 10000\n255\n";
        let err = decode_pixels(header).unwrap_err();
        assert!(err.is_input_error());
        assert!(err.to_string().contains("Image too large"));
    }

    #[test]
    fn test_pixel_count_limit() {
        assert!(check_pixel_count(10_000, 10_000).is_ok());
        assert!(check_pixel_count(10_001, 10_000).unwrap_err().is_input_error());
        assert!(check_pixel_count(u32::MAX, u32::MAX).unwrap_err().is_input_error());
        assert!(check_pixel_count(0, 5).unwrap_err().is_input_error());
    }

    #[test]
    fn test_mask_png_round_trip() {
        let mask = Mask::from_raw(3, 2, vec![0, 255, 0, 255, 255, 0]).unwrap();
        let url = encode_mask_png(&mask).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));

        let png = decode_base64_image(&url).unwrap();
        let gray = image::load_from_memory(&png).unwrap().to_luma8();
        assert_eq!(gray.dimensions(), (3, 2));
        assert_eq!(gray.as_raw(), mask.data());
    }
}
