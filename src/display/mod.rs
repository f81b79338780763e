//! Display sinks and keyboard handling.
//!
//! - Window (feature: csi-gstreamer): `appsrc ! videoconvert ! autovideosink`,
//!   keys arrive as GStreamer navigation messages.
//! - Headless: no window; optional JPEG snapshots.

mod headless;
#[cfg(feature = "csi-gstreamer")]
mod window;

pub use headless::{HeadlessConfig, HeadlessSink};
#[cfg(feature = "csi-gstreamer")]
pub use window::{WindowConfig, WindowSink};

use anyhow::{anyhow, Result};
use std::str::FromStr;
use std::time::Duration;

use crate::frame::Frame;

pub const DEFAULT_WINDOW_TITLE: &str = "CSI Camera";
pub const DEFAULT_KEY_WAIT: Duration = Duration::from_millis(10);

/// Commands the user can issue from the keyboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyCommand {
    Quit,
}

/// Map a key name to a command. ESC and `q` quit; everything else is ignored.
pub fn key_command(key: &str) -> Option<KeyCommand> {
    match key {
        "Escape" | "q" => Some(KeyCommand::Quit),
        _ => None,
    }
}

/// Where annotated frames go.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum DisplayKind {
    #[default]
    Window,
    Headless,
}

impl FromStr for DisplayKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "window" => Ok(DisplayKind::Window),
            "headless" => Ok(DisplayKind::Headless),
            other => Err(anyhow!(
                "unknown display '{}' (expected window or headless)",
                other
            )),
        }
    }
}

/// A destination for annotated frames.
pub trait FrameSink {
    fn name(&self) -> &'static str;

    fn show(&mut self, frame: &Frame) -> Result<()>;

    /// Wait up to `wait` for a key press.
    fn poll_key(&mut self, wait: Duration) -> Result<Option<KeyCommand>>;

    /// False once the user has closed the window.
    fn is_open(&self) -> bool;

    /// Tear the display down. Safe to call more than once.
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_and_q_quit() {
        assert_eq!(key_command("Escape"), Some(KeyCommand::Quit));
        assert_eq!(key_command("q"), Some(KeyCommand::Quit));
        assert_eq!(key_command("Q"), None);
        assert_eq!(key_command("space"), None);
    }

    #[test]
    fn display_kind_parses() {
        assert_eq!("Headless".parse::<DisplayKind>().unwrap(), DisplayKind::Headless);
        assert_eq!("window".parse::<DisplayKind>().unwrap(), DisplayKind::Window);
        assert!("x11".parse::<DisplayKind>().is_err());
    }
}
