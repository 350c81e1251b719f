//! Utility functions for vision processing

use crate::error::VisionError;
use crate::types::BoundingBox;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// ImageNet channel statistics on the `[0, 1]` scale.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Geometry of a letterbox transform, used to map boxes back to the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    pub fn to_source(&self, bbox: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            (bbox.x1 - self.pad_x) / self.scale,
            (bbox.y1 - self.pad_y) / self.scale,
            (bbox.x2 - self.pad_x) / self.scale,
            (bbox.y2 - self.pad_y) / self.scale,
        )
    }

    pub fn to_target(&self, bbox: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            bbox.x1 * self.scale + self.pad_x,
            bbox.y1 * self.scale + self.pad_y,
            bbox.x2 * self.scale + self.pad_x,
            bbox.y2 * self.scale + self.pad_y,
        )
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<(), VisionError> {
    if width == 0 || height == 0 {
        return Err(VisionError::Processing("Image dimensions cannot be zero".to_string()));
    }

    let total_pixels = width
        .checked_mul(height)
        .ok_or_else(|| VisionError::Processing("Image dimensions would overflow".to_string()))?;

    if total_pixels > 100_000_000 {
        return Err(VisionError::Processing("Image too large (max 100M pixels)".to_string()));
    }

    Ok(())
}

/// Resize preserving aspect ratio and pad to a centered `size x size` square.
pub fn letterbox(img: &RgbImage, size: u32, pad_value: u8) -> Result<(RgbImage, Letterbox), VisionError> {
    let (width, height) = img.dimensions();
    check_dimensions(width, height)?;
    check_dimensions(size, size)?;

    let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
    let new_w = ((width as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, size);

    let resized = imageops::resize(img, new_w, new_h, FilterType::Triangle);

    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([pad_value; 3]));
    imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    Ok((
        canvas,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    ))
}

/// Resize so the longest side equals `target`; returns the image and scale.
pub fn resize_longest_side(img: &RgbImage, target: u32) -> Result<(RgbImage, f32), VisionError> {
    let (width, height) = img.dimensions();
    check_dimensions(width, height)?;

    let scale = target as f32 / width.max(height) as f32;
    let new_w = ((width as f32 * scale).round() as u32).clamp(1, target);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, target);

    Ok((imageops::resize(img, new_w, new_h, FilterType::Triangle), scale))
}

/// Planar `[3, H, W]` tensor scaled to `[0, 1]`.
pub fn rgb_to_chw(img: &RgbImage) -> Vec<f32> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let plane = w * h;
    let mut data = vec![0.0f32; plane * 3];

    for (x, y, pixel) in img.enumerate_pixels() {
        let idx = y as usize * w + x as usize;
        for c in 0..3 {
            data[c * plane + idx] = pixel[c] as f32 / 255.0;
        }
    }

    data
}

/// Copy a `[3, h, w]` tensor into the top-left of a zeroed `[3, size, size]` one.
pub fn pad_chw(data: &[f32], width: usize, height: usize, size: usize) -> Result<Vec<f32>, VisionError> {
    if width > size || height > size || data.len() != 3 * width * height {
        return Err(VisionError::Processing(format!(
            "Cannot pad {}x{} tensor of {} values to {}x{}",
            width,
            height,
            data.len(),
            size,
            size
        )));
    }

    let mut out = vec![0.0f32; 3 * size * size];
    for c in 0..3 {
        for y in 0..height {
            let src = c * width * height + y * width;
            let dst = c * size * size + y * size;
            out[dst..dst + width].copy_from_slice(&data[src..src + width]);
        }
    }
    Ok(out)
}

/// Apply ImageNet normalization in place to a CHW tensor.
pub fn apply_imagenet_normalization(data: &mut [f32]) {
    const CHANNELS: usize = 3;

    if data.len() < CHANNELS {
        return;
    }

    let hw = data.len() / CHANNELS;
    for c in 0..CHANNELS {
        for val in &mut data[c * hw..(c + 1) * hw] {
            *val = if val.is_finite() {
                (*val - IMAGENET_MEAN[c]) / IMAGENET_STD[c]
            } else {
                0.0
            };
        }
    }
}
