use anyhow::Result;
use image::GrayImage;

use crate::detect::backend::TagDetector;
use crate::detect::result::TagDetection;

/// Pixels at or below this luma count as marker.
const DARK_THRESHOLD: u8 = 100;
/// Fewer dark pixels than this is treated as noise.
const MIN_MARKER_PIXELS: usize = 16;

/// Stub backend for testing. Reports the bounding box of dark pixels as tag 0.
///
/// Pairs with the synthetic source, which renders a single dark square.
pub struct StubBackend {
    tag_id: u32,
}

impl StubBackend {
    pub fn new() -> Self {
        Self { tag_id: 0 }
    }

    pub fn with_tag_id(mut self, tag_id: u32) -> Self {
        self.tag_id = tag_id;
        self
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TagDetector for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<TagDetection>> {
        let mut count = 0usize;
        let (mut x0, mut y0) = (u32::MAX, u32::MAX);
        let (mut x1, mut y1) = (0u32, 0u32);
        for (x, y, p) in gray.enumerate_pixels() {
            if p.0[0] <= DARK_THRESHOLD {
                count += 1;
                x0 = x0.min(x);
                y0 = y0.min(y);
                x1 = x1.max(x);
                y1 = y1.max(y);
            }
        }
        if count < MIN_MARKER_PIXELS {
            return Ok(vec![]);
        }

        let (left, top) = (x0 as f64, y0 as f64);
        let (right, bottom) = ((x1 + 1) as f64, (y1 + 1) as f64);
        Ok(vec![TagDetection {
            id: self.tag_id,
            hamming: 0,
            decision_margin: 0.0,
            center: [(left + right) / 2.0, (top + bottom) / 2.0],
            // Same winding as the AprilTag library: bottom-left, bottom-right,
            // top-right, top-left.
            corners: [
                [left, bottom],
                [right, bottom],
                [right, top],
                [left, top],
            ],
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn finds_dark_square() -> Result<()> {
        let mut gray = GrayImage::from_pixel(40, 30, Luma([220]));
        for y in 10..20 {
            for x in 5..15 {
                gray.put_pixel(x, y, Luma([10]));
            }
        }
        let detections = StubBackend::new().with_tag_id(7).detect(&gray)?;
        assert_eq!(detections.len(), 1);
        let tag = &detections[0];
        assert_eq!(tag.id, 7);
        assert_eq!(tag.center, [10.0, 15.0]);
        assert_eq!(tag.corners[0], [5.0, 20.0]);
        assert_eq!(tag.corners[2], [15.0, 10.0]);
        Ok(())
    }

    #[test]
    fn ignores_blank_and_speckled_frames() -> Result<()> {
        let mut gray = GrayImage::from_pixel(40, 30, Luma([220]));
        assert!(StubBackend::new().detect(&gray)?.is_empty());
        gray.put_pixel(3, 3, Luma([0]));
        gray.put_pixel(30, 20, Luma([0]));
        assert!(StubBackend::new().detect(&gray)?.is_empty());
        Ok(())
    }
}
