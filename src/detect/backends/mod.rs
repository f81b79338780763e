#[cfg(feature = "detector-apriltag")]
pub mod apriltag;
pub mod stub;

#[cfg(feature = "detector-apriltag")]
pub use self::apriltag::AprilTagBackend;
pub use stub::StubBackend;
