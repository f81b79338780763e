use anyhow::{anyhow, Result};
use image::GrayImage;

use crate::detect::result::TagDetection;

/// Tag families understood by the AprilTag backend.
pub const SUPPORTED_FAMILIES: &[&str] = &[
    "tag16h5",
    "tag25h9",
    "tag36h11",
    "tagCircle21h7",
    "tagCircle49h12",
    "tagCustom48h12",
    "tagStandard41h12",
    "tagStandard52h13",
];

/// Detector tuning.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorSettings {
    pub families: Vec<String>,
    pub threads: u8,
    /// Input is decimated by this factor before quad detection.
    pub quad_decimate: f32,
    /// Gaussian blur sigma applied before quad detection; 0 disables it.
    pub quad_sigma: f32,
    pub refine_edges: bool,
    pub decode_sharpening: f64,
    pub debug: bool,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            families: vec!["tag36h11".to_string()],
            threads: 3,
            quad_decimate: 4.0,
            quad_sigma: 0.0,
            refine_edges: true,
            decode_sharpening: 0.25,
            debug: false,
        }
    }
}

impl DetectorSettings {
    pub fn validate(&self) -> Result<()> {
        if self.families.is_empty() {
            return Err(anyhow!("at least one tag family is required"));
        }
        for family in &self.families {
            if !SUPPORTED_FAMILIES.contains(&family.as_str()) {
                return Err(anyhow!(
                    "unknown tag family '{}' (supported: {})",
                    family,
                    SUPPORTED_FAMILIES.join(", ")
                ));
            }
        }
        if self.threads == 0 {
            return Err(anyhow!("detector threads must be at least 1"));
        }
        if !(self.quad_decimate > 0.0) {
            return Err(anyhow!("quad_decimate must be greater than zero"));
        }
        if self.quad_sigma < 0.0 {
            return Err(anyhow!("quad_sigma must not be negative"));
        }
        Ok(())
    }
}

/// Tag detector backend.
///
/// Backends receive a grayscale copy of each frame and return tags in the
/// frame's pixel coordinates.
pub trait TagDetector {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Detect tags in a grayscale frame.
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<TagDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(DetectorSettings::default().validate().is_ok());
    }

    #[test]
    fn rejects_unknown_family_and_bad_tuning() {
        let mut settings = DetectorSettings {
            families: vec!["tag99h1".to_string()],
            ..DetectorSettings::default()
        };
        assert!(settings.validate().is_err());

        settings.families = vec![];
        assert!(settings.validate().is_err());

        settings = DetectorSettings::default();
        settings.threads = 0;
        assert!(settings.validate().is_err());

        settings = DetectorSettings::default();
        settings.quad_decimate = 0.0;
        assert!(settings.validate().is_err());
    }
}
