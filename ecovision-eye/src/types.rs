//! Core value types shared by the detector, mapper and pipeline

use serde::{Serialize, Serializer};

/// Axis-aligned box in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from center/size form (YOLO anchor outputs).
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    /// Finite coordinates with strictly positive extent.
    pub fn is_valid(&self) -> bool {
        self.as_array().iter().all(|v| v.is_finite()) && self.x1 < self.x2 && self.y1 < self.y2
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        if self.is_valid() {
            self.width() * self.height()
        } else {
            0.0
        }
    }

    /// Clamp into `[0, width] x [0, height]`.
    pub fn clip(&self, width: f32, height: f32) -> Self {
        Self {
            x1: self.x1.clamp(0.0, width),
            y1: self.y1.clamp(0.0, height),
            x2: self.x2.clamp(0.0, width),
            y2: self.y2.clamp(0.0, height),
        }
    }

    /// Intersection over union; 0.0 for invalid or disjoint boxes.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        if !self.is_valid() || !other.is_valid() {
            return 0.0;
        }

        let inter_x1 = self.x1.max(other.x1);
        let inter_y1 = self.y1.max(other.y1);
        let inter_x2 = self.x2.min(other.x2);
        let inter_y2 = self.y2.min(other.y2);

        if inter_x2 <= inter_x1 || inter_y2 <= inter_y1 {
            return 0.0;
        }

        let inter_area = (inter_x2 - inter_x1) * (inter_y2 - inter_y1);
        let union_area = self.area() + other.area() - inter_area;
        if union_area <= 0.0 || !union_area.is_finite() {
            return 0.0;
        }

        (inter_area / union_area).clamp(0.0, 1.0)
    }

    pub fn as_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

impl Serialize for BoundingBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_array().serialize(serializer)
    }
}

/// One located, classified object produced by a detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_id: u32,
    pub class_name: String,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f32, class_id: u32, class_name: impl Into<String>) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
            class_name: class_name.into(),
        }
    }
}

/// Binary single-channel mask, row-major, values 0 or 255.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Mask {
    pub const ON: u8 = 255;
    pub const OFF: u8 = 0;

    /// All-zero mask of the given size.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![Self::OFF; width as usize * height as usize],
        }
    }

    /// Wrap raw pixels; any non-zero value is normalized to 255.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize {
            return None;
        }
        let data = data
            .into_iter()
            .map(|v| if v > 0 { Self::ON } else { Self::OFF })
            .collect();
        Some(Self { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Number of foreground pixels.
    pub fn area(&self) -> usize {
        self.data.iter().filter(|&&v| v == Self::ON).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_validity() {
        assert!(BoundingBox::new(0.0, 0.0, 10.0, 10.0).is_valid());
        assert!(!BoundingBox::new(10.0, 0.0, 10.0, 10.0).is_valid());
        assert!(!BoundingBox::new(0.0, 5.0, 10.0, 1.0).is_valid());
        assert!(!BoundingBox::new(f32::NAN, 0.0, 10.0, 10.0).is_valid());
        assert!(!BoundingBox::new(0.0, 0.0, f32::INFINITY, 10.0).is_valid());
    }

    #[test]
    fn test_bbox_from_center() {
        let b = BoundingBox::from_center(50.0, 40.0, 20.0, 10.0);
        assert_eq!(b.as_array(), [40.0, 35.0, 60.0, 45.0]);
    }

    #[test]
    fn test_bbox_iou() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 15.0, 10.0);
        let iou = a.iou(&b);
        assert!((iou - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&BoundingBox::new(20.0, 20.0, 30.0, 30.0)), 0.0);
        assert_eq!(a.iou(&BoundingBox::new(f32::NAN, 0.0, 1.0, 1.0)), 0.0);
    }

    #[test]
    fn test_bbox_clip() {
        let b = BoundingBox::new(-5.0, -1.0, 120.0, 50.0).clip(100.0, 80.0);
        assert_eq!(b.as_array(), [0.0, 0.0, 100.0, 50.0]);
    }

    #[test]
    fn test_bbox_serializes_as_array() {
        let json = serde_json::to_string(&BoundingBox::new(1.0, 2.5, 3.0, 4.0)).unwrap();
        assert_eq!(json, "[1.0,2.5,3.0,4.0]");
    }

    #[test]
    fn test_mask_from_raw_normalizes() {
        let mask = Mask::from_raw(2, 2, vec![0, 1, 200, 255]).unwrap();
        assert_eq!(mask.data(), &[0, 255, 255, 255]);
        assert_eq!(mask.area(), 3);
        assert!(Mask::from_raw(2, 2, vec![0; 3]).is_none());
    }

    #[test]
    fn test_empty_mask() {
        let mask = Mask::empty(4, 3);
        assert_eq!(mask.data().len(), 12);
        assert_eq!(mask.area(), 0);
    }
}
