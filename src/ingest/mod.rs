//! Frame ingestion.
//!
//! Sources produce BGR `Frame`s for the capture loop:
//! - CSI camera via GStreamer (feature: csi-gstreamer)
//! - Synthetic moving marker (always available)

pub mod csi;

pub use csi::{CsiConfig, CsiSource, CsiStats, SourceKind};
