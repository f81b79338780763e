//! tagfinder - live AprilTag overlay for a Jetson CSI camera
//!
//! Opens the camera, detects tags in every frame, draws outlines, centers,
//! ids and a motion trail, and shows the result until ESC or `q`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tagfinder::app::{create_source, open_display, select_detector};
use tagfinder::{run, DisplayKind, FlipMethod, RunOptions, SourceKind, TagfinderConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "TAGFINDER_CONFIG")]
    config: Option<PathBuf>,
    /// Frame source.
    #[arg(long, value_enum)]
    source: Option<SourceKind>,
    /// CSI sensor id.
    #[arg(long)]
    sensor_id: Option<u32>,
    /// nvvidconv flip method (0..=7; 0 and 2 are the common ones).
    #[arg(long)]
    flip_method: Option<u8>,
    /// Detector backend (apriltag or stub).
    #[arg(long)]
    detector: Option<String>,
    /// Where frames are shown.
    #[arg(long, value_enum)]
    display: Option<DisplayKind>,
    /// Write annotated JPEG snapshots here (headless display only).
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Print the GStreamer pipeline and exit.
    #[arg(long)]
    print_pipeline: bool,
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = TagfinderConfig::load_from(args.config.as_deref())?;
    apply_args(&mut cfg, &args)?;
    cfg.validate()?;

    if args.print_pipeline {
        println!("{}", cfg.pipeline.pipeline_string());
        return Ok(ExitCode::SUCCESS);
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("install Ctrl-C handler")?;
    }

    let mut detector = select_detector(&cfg)?;
    let mut source = create_source(&cfg)?;
    if let Err(e) = source.open() {
        log::error!("Error: Unable to open camera: {:#}", e);
        source.close();
        return Ok(ExitCode::FAILURE);
    }
    let mut sink = open_display(&cfg.display, cfg.pipeline.framerate)?;

    let options = RunOptions {
        key_wait: cfg.display.key_wait,
        trail_interval: cfg.trail_interval,
        max_frames: args.max_frames,
    };
    let result = run(&mut source, detector.as_mut(), sink.as_mut(), &options, &stop);

    sink.close();
    source.close();

    let stats = result?;
    log::info!(
        "stopped ({:?}): {} frames, {} detections, {:.1} fps",
        stats.stop_reason,
        stats.frames,
        stats.detections,
        stats.fps()
    );
    Ok(ExitCode::SUCCESS)
}

fn apply_args(cfg: &mut TagfinderConfig, args: &Args) -> Result<()> {
    if let Some(source) = args.source {
        cfg.source = source;
    }
    if let Some(sensor_id) = args.sensor_id {
        cfg.pipeline.sensor_id = sensor_id;
    }
    if let Some(flip) = args.flip_method {
        cfg.pipeline.flip_method = FlipMethod::try_from(flip)?;
    }
    if let Some(detector) = &args.detector {
        cfg.detector_backend = Some(detector.clone());
    }
    if let Some(display) = args.display {
        cfg.display.kind = display;
    }
    if let Some(dir) = &args.snapshot_dir {
        cfg.display.snapshot_dir = Some(dir.clone());
    }
    Ok(())
}
