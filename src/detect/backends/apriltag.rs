use anyhow::{anyhow, Result};
use ::apriltag::{Detector, DetectorBuilder, Family, Image};
use image::GrayImage;

use crate::detect::backend::{DetectorSettings, TagDetector};
use crate::detect::result::TagDetection;

/// Maximum bit errors the decoder corrects per tag.
const BITS_CORRECTED: usize = 2;

/// AprilTag backend wrapping the reference C detector.
pub struct AprilTagBackend {
    detector: Detector,
    /// Reused between frames of the same size.
    image: Option<(Image, usize, usize)>,
}

impl AprilTagBackend {
    pub fn new(settings: &DetectorSettings) -> Result<Self> {
        settings.validate()?;

        let mut builder = DetectorBuilder::new();
        for name in &settings.families {
            builder = builder.add_family_bits(family_by_name(name)?, BITS_CORRECTED);
        }
        let mut detector = builder
            .build()
            .map_err(|e| anyhow!("build apriltag detector: {:?}", e))?;

        detector.set_thread_number(settings.threads);
        detector.set_decimation(settings.quad_decimate);
        detector.set_sigma(settings.quad_sigma);
        detector.set_refine_edges(settings.refine_edges);
        detector.set_shapening(settings.decode_sharpening);
        detector.set_debug(settings.debug);

        log::info!(
            "apriltag detector ready: families={} threads={} decimate={}",
            settings.families.join(","),
            settings.threads,
            settings.quad_decimate
        );

        Ok(Self {
            detector,
            image: None,
        })
    }

    /// Copy `gray` into the detector's image, reusing the allocation when the
    /// frame size is unchanged.
    fn load_image(&mut self, gray: &GrayImage) -> Result<()> {
        let width = gray.width() as usize;
        let height = gray.height() as usize;
        let reuse = self
            .image
            .as_ref()
            .is_some_and(|(_, w, h)| *w == width && *h == height);
        if !reuse {
            let image = Image::zeros_with_stride(width, height, width)
                .map_err(|e| anyhow!("allocate {}x{} apriltag image: {:?}", width, height, e))?;
            self.image = Some((image, width, height));
        }
        let (image, _, _) = self
            .image
            .as_mut()
            .ok_or_else(|| anyhow!("apriltag image missing"))?;
        for (x, y, p) in gray.enumerate_pixels() {
            image[(x as usize, y as usize)] = p.0[0];
        }
        Ok(())
    }
}

impl TagDetector for AprilTagBackend {
    fn name(&self) -> &'static str {
        "apriltag"
    }

    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<TagDetection>> {
        self.load_image(gray)?;
        let (image, _, _) = self
            .image
            .as_ref()
            .ok_or_else(|| anyhow!("apriltag image missing"))?;
        let detections = self
            .detector
            .detect(image)
            .into_iter()
            .map(|det| TagDetection {
                id: det.id() as u32,
                hamming: det.hamming() as u32,
                decision_margin: det.decision_margin(),
                center: det.center(),
                corners: det.corners(),
            })
            .collect();
        Ok(detections)
    }
}

fn family_by_name(name: &str) -> Result<Family> {
    Ok(match name {
        "tag16h5" => Family::tag_16h5(),
        "tag25h9" => Family::tag_25h9(),
        "tag36h11" => Family::tag_36h11(),
        "tagCircle21h7" => Family::tag_circle_21h7(),
        "tagCircle49h12" => Family::tag_circle_49h12(),
        "tagCustom48h12" => Family::tag_custom_48h12(),
        "tagStandard41h12" => Family::tag_standard_41h12(),
        "tagStandard52h13" => Family::tag_standard_52h13(),
        other => return Err(anyhow!("unknown tag family '{}'", other)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn blank_frame_has_no_tags() -> Result<()> {
        let mut backend = AprilTagBackend::new(&DetectorSettings::default())?;
        let gray = GrayImage::from_pixel(64, 48, Luma([128]));
        assert!(backend.detect(&gray)?.is_empty());
        Ok(())
    }

    /// tag36h11 `id` from the reference generator, each cell `scale` pixels,
    /// placed `margin` pixels into a white frame.
    fn render_tag36h11(id: i32, scale: u32, margin: u32) -> GrayImage {
        use ::apriltag::families::ApriltagFamily;

        let family = Family::tag_36h11().into_raw();
        let tag = unsafe {
            let raw = apriltag_sys::apriltag_to_image(family, id);
            apriltag_sys::tag36h11_destroy(family);
            Image::from_raw(raw)
        };
        let cells = tag.width() as u32;
        let side = cells * scale + 2 * margin;
        GrayImage::from_fn(side, side, |x, y| {
            if x < margin || y < margin || x >= side - margin || y >= side - margin {
                return Luma([255]);
            }
            let cx = ((x - margin) / scale) as usize;
            let cy = ((y - margin) / scale) as usize;
            Luma([tag[(cx, cy)]])
        })
    }

    #[test]
    fn detects_rendered_tag36h11() -> Result<()> {
        let mut backend = AprilTagBackend::new(&DetectorSettings {
            quad_decimate: 1.0,
            ..DetectorSettings::default()
        })?;
        // 10x10 cells with a white outer ring; the black border spans 50..130.
        let gray = render_tag36h11(3, 10, 40);

        let tags = backend.detect(&gray)?;
        assert_eq!(tags.len(), 1);
        let tag = &tags[0];
        assert_eq!(tag.id, 3);
        assert_eq!(tag.hamming, 0);
        assert!((tag.center[0] - 90.0).abs() < 1.5, "{:?}", tag.center);
        assert!((tag.center[1] - 90.0).abs() < 1.5, "{:?}", tag.center);

        // A-B-C-D: bottom-left, bottom-right, top-right, top-left.
        let expected = [[50.0, 130.0], [130.0, 130.0], [130.0, 50.0], [50.0, 50.0]];
        for (corner, want) in tag.corners.iter().zip(expected) {
            assert!(
                (corner[0] - want[0]).abs() < 1.5 && (corner[1] - want[1]).abs() < 1.5,
                "corners {:?}",
                tag.corners
            );
        }

        // Same-size frames reuse the buffer and still decode.
        assert_eq!(backend.detect(&gray)?.len(), 1);
        Ok(())
    }

    #[test]
    fn every_supported_family_resolves() {
        for name in crate::detect::SUPPORTED_FAMILIES {
            assert!(family_by_name(name).is_ok(), "{name}");
        }
        assert!(family_by_name("tag36h10").is_err());
    }
}
