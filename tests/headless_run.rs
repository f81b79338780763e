//! End-to-end run over the synthetic camera with the headless display.

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use tagfinder::app::{open_display, open_source, select_detector};
use tagfinder::{run, DisplayKind, RunOptions, SourceKind, StopReason, TagfinderConfig};

fn stub_config(snapshot_dir: Option<std::path::PathBuf>) -> TagfinderConfig {
    let mut cfg = TagfinderConfig::default();
    cfg.source = SourceKind::Stub;
    cfg.pipeline.display_width = 160;
    cfg.pipeline.display_height = 120;
    cfg.detector_backend = Some("stub".to_string());
    cfg.display.kind = DisplayKind::Headless;
    cfg.display.snapshot_dir = snapshot_dir;
    cfg.display.snapshot_every = 10;
    cfg
}

#[test]
fn synthetic_run_detects_marker_every_frame() -> anyhow::Result<()> {
    let cfg = stub_config(None);
    cfg.validate()?;

    let mut source = open_source(&cfg)?;
    let mut detector = select_detector(&cfg)?;
    let mut sink = open_display(&cfg.display, cfg.pipeline.framerate)?;

    let stats = run(
        &mut source,
        detector.as_mut(),
        sink.as_mut(),
        &RunOptions {
            key_wait: Duration::ZERO,
            trail_interval: cfg.trail_interval,
            max_frames: Some(40),
        },
        &AtomicBool::new(false),
    )?;

    assert_eq!(stats.stop_reason, StopReason::FrameLimit);
    assert_eq!(stats.frames, 40);
    assert_eq!(stats.detections, 40);
    assert_eq!(source.stats().frames_captured, 40);
    Ok(())
}

#[test]
fn synthetic_run_writes_snapshots() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = stub_config(Some(dir.path().to_path_buf()));

    let mut source = open_source(&cfg)?;
    let mut detector = select_detector(&cfg)?;
    let mut sink = open_display(&cfg.display, cfg.pipeline.framerate)?;

    run(
        &mut source,
        detector.as_mut(),
        sink.as_mut(),
        &RunOptions {
            key_wait: Duration::ZERO,
            trail_interval: cfg.trail_interval,
            max_frames: Some(20),
        },
        &AtomicBool::new(false),
    )?;
    sink.close();

    let snapshots: Vec<_> = std::fs::read_dir(dir.path())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(snapshots.len(), 2);
    assert!(snapshots.contains(&"frame_000010.jpg".to_string()));
    assert!(snapshots.contains(&"frame_000020.jpg".to_string()));
    Ok(())
}
