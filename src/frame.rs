//! Captured frames.
//!
//! Frames carry tightly packed BGR8 pixels, the channel order the CSI pipeline
//! delivers. They stay BGR through annotation and display; `image::Rgb<u8>` is
//! used only as a three-channel container, so its "red" slot holds blue.

use anyhow::{anyhow, Result};
use image::{GrayImage, ImageBuffer, Luma, Rgb};
use std::time::Instant;

/// Three-channel image in BGR order.
pub type BgrImage = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// A BGR color triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bgr(pub [u8; 3]);

impl Bgr {
    pub const fn new(b: u8, g: u8, r: u8) -> Self {
        Self([b, g, r])
    }

    pub fn pixel(self) -> Rgb<u8> {
        Rgb(self.0)
    }
}

/// One captured frame.
pub struct Frame {
    image: BgrImage,
    /// Position of this frame in the capture stream, starting at 1.
    pub index: u64,
    pub captured_at: Instant,
}

impl Frame {
    pub fn from_bgr(pixels: Vec<u8>, width: u32, height: u32, index: u64) -> Result<Self> {
        let expected = (width as usize) * (height as usize) * 3;
        if pixels.len() != expected {
            return Err(anyhow!(
                "BGR buffer has {} bytes, expected {} for {}x{}",
                pixels.len(),
                expected,
                width,
                height
            ));
        }
        let image = ImageBuffer::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("failed to wrap BGR buffer as image"))?;
        Ok(Self {
            image,
            index,
            captured_at: Instant::now(),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &BgrImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut BgrImage {
        &mut self.image
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn to_gray(&self) -> GrayImage {
        gray_from_bgr(&self.image)
    }
}

/// BT.601 luma, the same weights OpenCV uses for BGR2GRAY.
pub fn gray_from_bgr(image: &BgrImage) -> GrayImage {
    let mut gray = GrayImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(gray.pixels_mut()) {
        let [b, g, r] = src.0;
        let luma = 0.114 * b as f32 + 0.587 * g as f32 + 0.299 * r as f32;
        *dst = Luma([luma.round().clamp(0.0, 255.0) as u8]);
    }
    gray
}
