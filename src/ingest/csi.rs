//! CSI camera frame source.
//!
//! `CsiSource` captures BGR frames from a Jetson CSI camera through the
//! `nvarguscamerasrc` pipeline built in [`crate::pipeline`].
//!
//! Two backends exist:
//! - GStreamer (feature `csi-gstreamer`): the real camera.
//! - Synthetic: an in-process scene with one moving dark marker, for tests
//!   and for running the loop on machines without a camera.
//!
//! Dropping a source stops its pipeline.

#[cfg(feature = "csi-gstreamer")]
use anyhow::Context;
use anyhow::{anyhow, Result};
use std::str::FromStr;
#[cfg(feature = "csi-gstreamer")]
use std::time::{Duration, Instant};

use crate::frame::Frame;
use crate::pipeline::CsiPipelineConfig;

/// Where frames come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceKind {
    /// CSI camera through GStreamer.
    #[default]
    Csi,
    /// Synthetic moving marker.
    Stub,
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csi" => Ok(SourceKind::Csi),
            "stub" => Ok(SourceKind::Stub),
            other => Err(anyhow!("unknown source '{}' (expected csi or stub)", other)),
        }
    }
}

/// Configuration for a CSI source.
#[derive(Clone, Debug, Default)]
pub struct CsiConfig {
    pub source: SourceKind,
    pub pipeline: CsiPipelineConfig,
}

/// CSI frame source.
pub struct CsiSource {
    backend: CsiBackend,
}

enum CsiBackend {
    Synthetic(SyntheticCsiSource),
    #[cfg(feature = "csi-gstreamer")]
    Gstreamer(GstreamerCsiSource),
}

impl CsiSource {
    pub fn new(config: CsiConfig) -> Result<Self> {
        config.pipeline.validate()?;
        match config.source {
            SourceKind::Stub => Ok(Self {
                backend: CsiBackend::Synthetic(SyntheticCsiSource::new(config)),
            }),
            SourceKind::Csi => {
                #[cfg(feature = "csi-gstreamer")]
                {
                    Ok(Self {
                        backend: CsiBackend::Gstreamer(GstreamerCsiSource::new(config)?),
                    })
                }
                #[cfg(not(feature = "csi-gstreamer"))]
                {
                    anyhow::bail!("CSI capture requires the csi-gstreamer feature")
                }
            }
        }
    }

    /// Start the stream. Fails with "unable to open camera" when the camera
    /// does not come up.
    pub fn open(&mut self) -> Result<()> {
        match &mut self.backend {
            CsiBackend::Synthetic(source) => source.open(),
            #[cfg(feature = "csi-gstreamer")]
            CsiBackend::Gstreamer(source) => source.open(),
        }
    }

    /// Block until the next frame is available.
    pub fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CsiBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "csi-gstreamer")]
            CsiBackend::Gstreamer(source) => source.next_frame(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CsiBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "csi-gstreamer")]
            CsiBackend::Gstreamer(source) => source.is_healthy(),
        }
    }

    pub fn stats(&self) -> CsiStats {
        match &self.backend {
            CsiBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "csi-gstreamer")]
            CsiBackend::Gstreamer(source) => source.stats(),
        }
    }

    /// Release the camera. Safe to call more than once.
    pub fn close(&mut self) {
        match &mut self.backend {
            CsiBackend::Synthetic(source) => source.close(),
            #[cfg(feature = "csi-gstreamer")]
            CsiBackend::Gstreamer(source) => source.close(),
        }
    }
}

impl Drop for CsiSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Statistics for a CSI source.
#[derive(Clone, Debug)]
pub struct CsiStats {
    pub frames_captured: u64,
    pub sensor_id: u32,
}

// ----------------------------------------------------------------------------
// Synthetic source
// ----------------------------------------------------------------------------

const SYNTHETIC_BACKGROUND: u8 = 200;
const SYNTHETIC_MARKER: u8 = 20;
/// Frames for the marker to complete one orbit.
const SYNTHETIC_ORBIT_FRAMES: u64 = 120;

struct SyntheticCsiSource {
    config: CsiConfig,
    frame_count: u64,
    open: bool,
}

impl SyntheticCsiSource {
    fn new(config: CsiConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            open: false,
        }
    }

    fn open(&mut self) -> Result<()> {
        self.open = true;
        log::info!(
            "CsiSource: opened synthetic sensor {} ({}x{})",
            self.config.pipeline.sensor_id,
            self.config.pipeline.display_width,
            self.config.pipeline.display_height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.open {
            return Err(anyhow!("synthetic source is not open"));
        }
        self.frame_count += 1;
        let width = self.config.pipeline.display_width;
        let height = self.config.pipeline.display_height;
        let pixels = self.render(width, height);
        Frame::from_bgr(pixels, width, height, self.frame_count)
    }

    /// Light noisy background with a dark square orbiting the image center.
    fn render(&self, width: u32, height: u32) -> Vec<u8> {
        let (x0, y0, side) = synthetic_marker_rect(width, height, self.frame_count);
        let mut pixels = Vec::with_capacity((width as usize) * (height as usize) * 3);
        for y in 0..height {
            for x in 0..width {
                let inside = x >= x0 && x < x0 + side && y >= y0 && y < y0 + side;
                let value = if inside {
                    SYNTHETIC_MARKER
                } else {
                    SYNTHETIC_BACKGROUND.saturating_add(rand::random::<u8>() % 16)
                };
                pixels.extend_from_slice(&[value, value, value]);
            }
        }
        pixels
    }

    fn is_healthy(&self) -> bool {
        self.open
    }

    fn stats(&self) -> CsiStats {
        CsiStats {
            frames_captured: self.frame_count,
            sensor_id: self.config.pipeline.sensor_id,
        }
    }

    fn close(&mut self) {
        if self.open {
            log::info!("CsiSource: closed synthetic sensor");
        }
        self.open = false;
    }
}

/// Top-left corner and side length of the synthetic marker at `frame`.
pub(crate) fn synthetic_marker_rect(width: u32, height: u32, frame: u64) -> (u32, u32, u32) {
    let side = (width.min(height) / 5).max(1);
    let cx = width as f64 / 2.0;
    let cy = height as f64 / 2.0;
    let radius = (width.min(height) as f64 / 2.0 - side as f64).max(0.0);
    let angle =
        (frame % SYNTHETIC_ORBIT_FRAMES) as f64 / SYNTHETIC_ORBIT_FRAMES as f64 * std::f64::consts::TAU;
    let mx = cx + radius * angle.cos() - side as f64 / 2.0;
    let my = cy + radius * angle.sin() - side as f64 / 2.0;
    let x0 = (mx.max(0.0) as u32).min(width.saturating_sub(side));
    let y0 = (my.max(0.0) as u32).min(height.saturating_sub(side));
    (x0, y0, side)
}

// ----------------------------------------------------------------------------
// GStreamer source
// ----------------------------------------------------------------------------

#[cfg(feature = "csi-gstreamer")]
struct GstreamerCsiSource {
    config: CsiConfig,
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    opened_at: Option<Instant>,
    /// Set once `Playing` has been requested; `close` returns the pipeline to
    /// `Null` whenever this is set, including after a failed open.
    started: bool,
    last_error: Option<String>,
}

#[cfg(feature = "csi-gstreamer")]
impl GstreamerCsiSource {
    fn new(config: CsiConfig) -> Result<Self> {
        let description = config.pipeline.launch_description();
        Self::with_description(config, &description)
    }

    fn with_description(config: CsiConfig, description: &str) -> Result<Self> {
        use gstreamer::prelude::*;

        gstreamer::init().context("initialize gstreamer")?;

        let pipeline = gstreamer::parse::launch(description)
            .context("build CSI pipeline")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow!("CSI pipeline is not a Pipeline"))?;

        let appsink = pipeline
            .by_name(crate::pipeline::APPSINK_NAME)
            .context("appsink element missing from pipeline")?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| anyhow!("appsink element has unexpected type"))?;

        Ok(Self {
            config,
            pipeline,
            appsink,
            frame_count: 0,
            last_frame_at: None,
            opened_at: None,
            started: false,
            last_error: None,
        })
    }

    fn open(&mut self) -> Result<()> {
        use gstreamer::prelude::*;

        self.started = true;
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .context("unable to open camera")?;
        let (result, _, _) = self
            .pipeline
            .state(gstreamer::ClockTime::from_seconds(5));
        result.context("unable to open camera")?;
        self.poll_bus();
        if let Some(err) = &self.last_error {
            return Err(anyhow!("unable to open camera: {}", err));
        }
        self.opened_at = Some(Instant::now());
        log::info!(
            "CsiSource: opened sensor {}",
            self.config.pipeline.sensor_id
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.poll_bus();
        if let Some(err) = &self.last_error {
            return Err(anyhow!("CSI stream failed: {}", err));
        }

        let timeout = gstreamer::ClockTime::from_mseconds(self.frame_timeout().as_millis() as u64);
        let sample = match self.appsink.try_pull_sample(timeout) {
            Some(sample) => sample,
            None if self.appsink.is_eos() => return Err(anyhow!("CSI stream reached EOS")),
            None => return Err(anyhow!("CSI stream stalled")),
        };

        let (pixels, width, height) = sample_to_bgr(&sample)?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());

        Frame::from_bgr(pixels, width, height, self.frame_count)
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(opened_at) = self.opened_at else {
            return false;
        };
        let Some(last_frame_at) = self.last_frame_at else {
            return opened_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> CsiStats {
        CsiStats {
            frames_captured: self.frame_count,
            sensor_id: self.config.pipeline.sensor_id,
        }
    }

    fn close(&mut self) {
        use gstreamer::prelude::*;

        self.opened_at = None;
        if std::mem::take(&mut self.started) {
            if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
                log::warn!("CsiSource: failed to stop pipeline: {}", e);
            } else {
                log::info!("CsiSource: released sensor {}", self.config.pipeline.sensor_id);
            }
        }
    }

    fn frame_timeout(&self) -> Duration {
        let fps = self.config.pipeline.framerate.max(1);
        let base_ms = (1000 / fps).saturating_mul(4);
        Duration::from_millis(base_ms.max(500) as u64)
    }

    fn health_grace(&self) -> Duration {
        let fps = self.config.pipeline.framerate.max(1);
        let base_ms = (1000 / fps).saturating_mul(6);
        Duration::from_millis(base_ms.max(2_000) as u64)
    }

    fn poll_bus(&mut self) {
        use gstreamer::prelude::*;

        let Some(bus) = self.pipeline.bus() else {
            return;
        };
        while let Some(message) = bus.timed_pop(gstreamer::ClockTime::ZERO) {
            use gstreamer::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    self.last_error = Some(format!(
                        "gstreamer error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    ));
                }
                MessageView::Eos(..) => {
                    self.last_error = Some("gstreamer reached EOS".to_string());
                }
                _ => {}
            }
        }
    }
}

/// Copy a BGR sample into a tightly packed buffer.
#[cfg(feature = "csi-gstreamer")]
fn sample_to_bgr(sample: &gstreamer::Sample) -> Result<(Vec<u8>, u32, u32)> {
    let buffer = sample.buffer().context("CSI sample missing buffer")?;
    let caps = sample.caps().context("CSI sample missing caps")?;
    let info =
        gstreamer_video::VideoInfo::from_caps(caps).context("parse CSI caps as video info")?;

    let width = info.width();
    let height = info.height();
    let row_bytes = (width as usize) * 3;
    let stride = info.stride()[0] as usize;

    let map = buffer.map_readable().context("map CSI buffer")?;
    let data = map.as_slice();

    repack_rows(data, row_bytes, stride, height as usize).map(|pixels| (pixels, width, height))
}

/// Strip per-row padding from a strided buffer.
#[cfg_attr(not(feature = "csi-gstreamer"), allow(dead_code))]
fn repack_rows(data: &[u8], row_bytes: usize, stride: usize, rows: usize) -> Result<Vec<u8>> {
    if stride == row_bytes {
        return data
            .get(..row_bytes * rows)
            .map(|s| s.to_vec())
            .ok_or_else(|| anyhow!("CSI buffer is shorter than its caps"));
    }

    let mut pixels = Vec::with_capacity(row_bytes * rows);
    for row in 0..rows {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .ok_or_else(|| anyhow!("CSI buffer row is out of bounds"))?,
        );
    }
    Ok(pixels)
}
