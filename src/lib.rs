//! tagfinder
//!
//! Finds AprilTags in a live CSI camera feed and shows them annotated in a
//! window.
//!
//! # Pipeline
//!
//! 1. `pipeline`: build the `nvarguscamerasrc` GStreamer description.
//! 2. `ingest`: pull BGR frames from the camera (or a synthetic scene).
//! 3. `detect`: grayscale frames go to a tag detector backend.
//! 4. `overlay`: draw outlines, centers, ids and the motion trail.
//! 5. `display`: show the frame, read ESC / `q`.
//!
//! `app::run` drives the loop; `config` loads settings from file and
//! environment.

pub mod app;
pub mod config;
pub mod detect;
pub mod display;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod pipeline;

pub use app::{run, RunOptions, RunStats, StopReason};
pub use config::TagfinderConfig;
pub use detect::{BackendRegistry, DetectorSettings, StubBackend, TagDetection, TagDetector};
pub use display::{DisplayKind, FrameSink, HeadlessConfig, HeadlessSink, KeyCommand};
pub use frame::{Bgr, BgrImage, Frame};
pub use ingest::{CsiConfig, CsiSource, SourceKind};
pub use overlay::{annotate, TrailSegment, TrailTracker};
pub use pipeline::{pipeline_string, CsiPipelineConfig, FlipMethod};
