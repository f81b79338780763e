use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

use super::{FrameSink, KeyCommand};
use crate::frame::Frame;

const SNAPSHOT_QUALITY: u8 = 90;

#[derive(Clone, Debug)]
pub struct HeadlessConfig {
    /// Directory for JPEG snapshots. None disables them.
    pub snapshot_dir: Option<PathBuf>,
    /// Write every Nth frame.
    pub snapshot_every: u64,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: None,
            snapshot_every: 30,
        }
    }
}

/// Sink without a window. Never reports key presses.
pub struct HeadlessSink {
    config: HeadlessConfig,
    frames_shown: u64,
    snapshots_written: u64,
    open: bool,
}

impl HeadlessSink {
    pub fn new(config: HeadlessConfig) -> Result<Self> {
        if let Some(dir) = &config.snapshot_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create snapshot dir {}", dir.display()))?;
        }
        Ok(Self {
            config,
            frames_shown: 0,
            snapshots_written: 0,
            open: true,
        })
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }

    pub fn snapshots_written(&self) -> u64 {
        self.snapshots_written
    }

    fn write_snapshot(&mut self, frame: &Frame) -> Result<()> {
        let Some(dir) = &self.config.snapshot_dir else {
            return Ok(());
        };
        let path = dir.join(format!("frame_{:06}.jpg", frame.index));
        let file = File::create(&path)
            .with_context(|| format!("create snapshot {}", path.display()))?;
        let rgb = bgr_to_rgb(frame);
        JpegEncoder::new_with_quality(BufWriter::new(file), SNAPSHOT_QUALITY)
            .encode_image(&rgb)
            .with_context(|| format!("encode snapshot {}", path.display()))?;
        self.snapshots_written += 1;
        log::debug!("snapshot written to {}", path.display());
        Ok(())
    }
}

impl FrameSink for HeadlessSink {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn show(&mut self, frame: &Frame) -> Result<()> {
        self.frames_shown += 1;
        let every = self.config.snapshot_every.max(1);
        if self.frames_shown % every == 0 {
            self.write_snapshot(frame)?;
        }
        Ok(())
    }

    fn poll_key(&mut self, _wait: Duration) -> Result<Option<KeyCommand>> {
        Ok(None)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        if self.open {
            log::info!(
                "headless display closed after {} frames ({} snapshots)",
                self.frames_shown,
                self.snapshots_written
            );
        }
        self.open = false;
    }
}

impl Drop for HeadlessSink {
    fn drop(&mut self) {
        self.close();
    }
}

fn bgr_to_rgb(frame: &Frame) -> RgbImage {
    let mut rgb = RgbImage::new(frame.width(), frame.height());
    for (src, dst) in frame.image().pixels().zip(rgb.pixels_mut()) {
        let [b, g, r] = src.0;
        dst.0 = [r, g, b];
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: u64) -> Frame {
        Frame::from_bgr(vec![128; 16 * 8 * 3], 16, 8, index).unwrap()
    }

    #[test]
    fn writes_every_nth_frame() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut sink = HeadlessSink::new(HeadlessConfig {
            snapshot_dir: Some(dir.path().join("snaps")),
            snapshot_every: 2,
        })?;
        for i in 1..=5 {
            sink.show(&frame(i))?;
        }
        assert_eq!(sink.frames_shown(), 5);
        assert_eq!(sink.snapshots_written(), 2);
        assert!(dir.path().join("snaps/frame_000002.jpg").exists());
        assert!(dir.path().join("snaps/frame_000004.jpg").exists());
        Ok(())
    }

    #[test]
    fn never_quits_and_closes_once() -> Result<()> {
        let mut sink = HeadlessSink::new(HeadlessConfig::default())?;
        assert_eq!(sink.poll_key(Duration::from_millis(1))?, None);
        assert!(sink.is_open());
        sink.close();
        sink.close();
        assert!(!sink.is_open());
        Ok(())
    }

    #[test]
    fn converts_channel_order() -> Result<()> {
        let frame = Frame::from_bgr(vec![1, 2, 3], 1, 1, 1)?;
        assert_eq!(bgr_to_rgb(&frame).get_pixel(0, 0).0, [3, 2, 1]);
        Ok(())
    }
}
