mod backend;
mod backends;
mod registry;
mod result;

pub use backend::{DetectorSettings, TagDetector, SUPPORTED_FAMILIES};
#[cfg(feature = "detector-apriltag")]
pub use backends::AprilTagBackend;
pub use backends::StubBackend;
pub use registry::BackendRegistry;
pub use result::TagDetection;

/// Registry holding every backend compiled into this build.
///
/// The AprilTag backend, when compiled in, is registered first and becomes the
/// default.
pub fn default_registry(settings: &DetectorSettings) -> anyhow::Result<BackendRegistry> {
    settings.validate()?;
    let mut registry = BackendRegistry::new();
    #[cfg(feature = "detector-apriltag")]
    registry.register(AprilTagBackend::new(settings)?);
    registry.register(StubBackend::new());
    Ok(registry)
}
