//! The capture loop: read, detect, annotate, display, check keys.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::{DisplaySettings, TagfinderConfig};
use crate::detect::{default_registry, TagDetector};
use crate::display::{DisplayKind, FrameSink, HeadlessConfig, HeadlessSink, KeyCommand};
use crate::ingest::{CsiConfig, CsiSource};
use crate::overlay::{annotate, TrailTracker};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct RunOptions {
    pub key_wait: Duration,
    pub trail_interval: u32,
    /// Stop after this many frames. None runs until quit.
    pub max_frames: Option<u64>,
}

/// Why the loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    QuitKey,
    WindowClosed,
    Interrupted,
    FrameLimit,
}

#[derive(Clone, Debug)]
pub struct RunStats {
    pub frames: u64,
    pub detections: u64,
    pub elapsed: Duration,
    pub stop_reason: StopReason,
}

impl RunStats {
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

/// Build the configured source without starting it. Logs the pipeline
/// string first.
pub fn create_source(config: &TagfinderConfig) -> Result<CsiSource> {
    log::info!("pipeline: {}", config.pipeline.pipeline_string());
    CsiSource::new(CsiConfig {
        source: config.source,
        pipeline: config.pipeline.clone(),
    })
}

/// Build and open the configured camera.
pub fn open_source(config: &TagfinderConfig) -> Result<CsiSource> {
    let mut source = create_source(config)?;
    source.open()?;
    Ok(source)
}

/// Build the configured detector backend.
pub fn select_detector(config: &TagfinderConfig) -> Result<Box<dyn TagDetector>> {
    let mut registry = default_registry(&config.detector)?;
    if let Some(name) = &config.detector_backend {
        registry.set_default(name)?;
    }
    let detector = registry.take_default()?;
    log::info!("detector backend: {}", detector.name());
    Ok(detector)
}

/// Build the configured display sink.
pub fn open_display(settings: &DisplaySettings, framerate: u32) -> Result<Box<dyn FrameSink>> {
    match settings.kind {
        DisplayKind::Headless => Ok(Box::new(HeadlessSink::new(HeadlessConfig {
            snapshot_dir: settings.snapshot_dir.clone(),
            snapshot_every: settings.snapshot_every,
        })?)),
        DisplayKind::Window => {
            #[cfg(feature = "csi-gstreamer")]
            {
                Ok(Box::new(crate::display::WindowSink::new(
                    crate::display::WindowConfig {
                        title: settings.window_title.clone(),
                        framerate,
                    },
                )?))
            }
            #[cfg(not(feature = "csi-gstreamer"))]
            {
                let _ = framerate;
                anyhow::bail!("window display requires the csi-gstreamer feature")
            }
        }
    }
}

/// Run until the user quits, the window closes, `stop` is set, or the frame
/// limit is reached.
///
/// The source must already be open. Capture or detection errors end the loop
/// with an error; the caller's drop guards release the camera and window.
pub fn run(
    source: &mut CsiSource,
    detector: &mut dyn TagDetector,
    sink: &mut dyn FrameSink,
    options: &RunOptions,
    stop: &AtomicBool,
) -> Result<RunStats> {
    let mut trail = TrailTracker::new(options.trail_interval);
    let started = Instant::now();
    let mut last_health_log = Instant::now();
    let mut frames = 0u64;
    let mut detections = 0u64;

    detector.warm_up().context("warm up detector")?;

    let stop_reason = loop {
        if stop.load(Ordering::SeqCst) {
            break StopReason::Interrupted;
        }

        trail.tick();
        let mut frame = source.next_frame().context("read frame")?;
        let gray = frame.to_gray();
        let tags = detector.detect(&gray).context("detect tags")?;
        detections += tags.len() as u64;
        for tag in &tags {
            log::debug!(
                "frame {} tag {} center=({:.1}, {:.1}) margin={:.1}",
                frame.index,
                tag.id,
                tag.center[0],
                tag.center[1],
                tag.decision_margin
            );
        }
        annotate(&mut frame, &tags, &mut trail);
        frames += 1;

        if !sink.is_open() {
            break StopReason::WindowClosed;
        }
        sink.show(&frame).context("display frame")?;

        if let Some(KeyCommand::Quit) = sink.poll_key(options.key_wait)? {
            break StopReason::QuitKey;
        }
        if !sink.is_open() {
            break StopReason::WindowClosed;
        }

        if options.max_frames.is_some_and(|max| frames >= max) {
            break StopReason::FrameLimit;
        }

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);
            log::info!(
                "camera health={} frames={} detections={} fps={:.1}",
                source.is_healthy(),
                source.stats().frames_captured,
                detections,
                frames as f64 / elapsed
            );
            last_health_log = Instant::now();
        }
    };

    Ok(RunStats {
        frames,
        detections,
        elapsed: started.elapsed(),
        stop_reason,
    })
}
