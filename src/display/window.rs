use anyhow::{anyhow, Context, Result};
use gstreamer::prelude::*;
use std::time::{Duration, Instant};

use super::{key_command, FrameSink, KeyCommand};
use crate::frame::Frame;

const APPSRC_NAME: &str = "tagfinder_display";

#[derive(Clone, Debug)]
pub struct WindowConfig {
    pub title: String,
    /// Framerate advertised in the display caps.
    pub framerate: u32,
}

/// On-screen window fed through an appsrc.
pub struct WindowSink {
    config: WindowConfig,
    pipeline: gstreamer::Pipeline,
    appsrc: gstreamer_app::AppSrc,
    /// Frame size the current caps were negotiated for.
    caps_size: Option<(u32, u32)>,
    playing: bool,
    closed: bool,
}

impl WindowSink {
    pub fn new(config: WindowConfig) -> Result<Self> {
        gstreamer::init().context("initialize gstreamer")?;

        let description = format!(
            "appsrc name={} is-live=true format=time do-timestamp=true ! \
             videoconvert ! autovideosink sync=false",
            APPSRC_NAME
        );
        let pipeline = gstreamer::parse::launch(&description)
            .context("build display pipeline")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow!("display pipeline is not a Pipeline"))?;

        let appsrc = pipeline
            .by_name(APPSRC_NAME)
            .context("appsrc element missing from display pipeline")?
            .downcast::<gstreamer_app::AppSrc>()
            .map_err(|_| anyhow!("appsrc element has unexpected type"))?;

        Ok(Self {
            config,
            pipeline,
            appsrc,
            caps_size: None,
            playing: false,
            closed: false,
        })
    }

    fn ensure_caps(&mut self, width: u32, height: u32) -> Result<()> {
        if self.caps_size == Some((width, height)) {
            return Ok(());
        }
        let info = gstreamer_video::VideoInfo::builder(
            gstreamer_video::VideoFormat::Bgr,
            width,
            height,
        )
        .fps(gstreamer::Fraction::new(self.config.framerate.max(1) as i32, 1))
        .build()
        .context("build display video info")?;
        let caps = info.to_caps().context("build display caps")?;
        self.appsrc.set_caps(Some(&caps));
        self.caps_size = Some((width, height));
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if self.playing {
            return Ok(());
        }
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .context("start display pipeline")?;
        self.playing = true;

        let mut tags = gstreamer::TagList::new();
        if let Some(tags) = tags.get_mut() {
            tags.add::<gstreamer::tags::Title>(
                &self.config.title.as_str(),
                gstreamer::TagMergeMode::Replace,
            );
        }
        if !self.appsrc.send_event(gstreamer::event::Tag::new(tags)) {
            log::debug!("display sink ignored window title");
        }
        log::info!("display window '{}' opened", self.config.title);
        Ok(())
    }

    /// Interpret one bus message. Returns a command when a quit key arrived.
    fn handle_message(&mut self, message: &gstreamer::Message) -> Option<KeyCommand> {
        use gstreamer::MessageView;
        match message.view() {
            MessageView::Error(err) => {
                // The video sink reports a closed window as an error.
                log::info!(
                    "display closed ({:?}: {})",
                    err.src().map(|s| s.path_string()),
                    err.error()
                );
                self.closed = true;
                None
            }
            MessageView::Eos(..) => {
                self.closed = true;
                None
            }
            MessageView::Element(element) => {
                let structure = element.structure()?;
                if !structure.has_name("GstNavigationMessage") {
                    return None;
                }
                let event = structure.get::<gstreamer::Event>("event").ok()?;
                let key = navigation_key_press(&event)?;
                key_command(&key)
            }
            _ => None,
        }
    }
}

/// Key name of a navigation `key-press` event.
fn navigation_key_press(event: &gstreamer::Event) -> Option<String> {
    let structure = event.structure()?;
    if structure.get::<&str>("event").ok()? != "key-press" {
        return None;
    }
    structure.get::<String>("key").ok()
}

impl FrameSink for WindowSink {
    fn name(&self) -> &'static str {
        "window"
    }

    fn show(&mut self, frame: &Frame) -> Result<()> {
        if self.closed {
            return Err(anyhow!("display window is closed"));
        }
        self.ensure_caps(frame.width(), frame.height())?;
        self.start()?;
        let buffer = gstreamer::Buffer::from_slice(frame.as_bytes().to_vec());
        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| anyhow!("push frame to display: {:?}", e))?;
        Ok(())
    }

    fn poll_key(&mut self, wait: Duration) -> Result<Option<KeyCommand>> {
        let Some(bus) = self.pipeline.bus() else {
            return Ok(None);
        };
        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let timeout = gstreamer::ClockTime::from_nseconds(remaining.as_nanos() as u64);
            let Some(message) = bus.timed_pop(timeout) else {
                return Ok(None);
            };
            if let Some(command) = self.handle_message(&message) {
                return Ok(Some(command));
            }
            if self.closed {
                return Ok(None);
            }
        }
    }

    fn is_open(&self) -> bool {
        !self.closed
    }

    fn close(&mut self) {
        if self.playing {
            if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
                log::warn!("failed to stop display pipeline: {}", e);
            }
            self.playing = false;
        }
        self.closed = true;
    }
}

impl Drop for WindowSink {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_event(kind: &str, key: &str) -> gstreamer::Event {
        let structure = gstreamer::Structure::builder("application/x-gst-navigation")
            .field("event", kind)
            .field("key", key)
            .build();
        gstreamer::event::Navigation::new(structure)
    }

    #[test]
    fn reads_key_press_events() {
        gstreamer::init().unwrap();
        assert_eq!(
            navigation_key_press(&key_event("key-press", "q")).as_deref(),
            Some("q")
        );
        assert_eq!(navigation_key_press(&key_event("key-release", "q")), None);
    }
}
