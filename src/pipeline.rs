//! GStreamer pipeline description for the Jetson CSI camera.
//!
//! The capture chain is fixed:
//! `nvarguscamerasrc -> NVMM caps -> nvvidconv (flip/scale) -> BGRx -> videoconvert -> BGR -> appsink`.
//! Only the numeric parameters are substituted.

use anyhow::{anyhow, Result};
use std::fmt;

/// Name given to the appsink element when the capture backend launches the pipeline.
pub const APPSINK_NAME: &str = "tagfinder_sink";

/// `nvvidconv` flip-method values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlipMethod {
    #[default]
    None,
    CounterClockwise90,
    Rotate180,
    Clockwise90,
    HorizontalFlip,
    UpperRightDiagonal,
    VerticalFlip,
    UpperLeftDiagonal,
}

impl FlipMethod {
    pub fn as_u8(self) -> u8 {
        match self {
            FlipMethod::None => 0,
            FlipMethod::CounterClockwise90 => 1,
            FlipMethod::Rotate180 => 2,
            FlipMethod::Clockwise90 => 3,
            FlipMethod::HorizontalFlip => 4,
            FlipMethod::UpperRightDiagonal => 5,
            FlipMethod::VerticalFlip => 6,
            FlipMethod::UpperLeftDiagonal => 7,
        }
    }
}

impl TryFrom<u8> for FlipMethod {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => FlipMethod::None,
            1 => FlipMethod::CounterClockwise90,
            2 => FlipMethod::Rotate180,
            3 => FlipMethod::Clockwise90,
            4 => FlipMethod::HorizontalFlip,
            5 => FlipMethod::UpperRightDiagonal,
            6 => FlipMethod::VerticalFlip,
            7 => FlipMethod::UpperLeftDiagonal,
            other => return Err(anyhow!("flip method must be in 0..=7, got {}", other)),
        })
    }
}

impl From<FlipMethod> for u8 {
    fn from(value: FlipMethod) -> Self {
        value.as_u8()
    }
}

impl fmt::Display for FlipMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Parameters substituted into the CSI capture pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsiPipelineConfig {
    pub sensor_id: u32,
    pub capture_width: u32,
    pub capture_height: u32,
    /// Size of the frames delivered to the appsink (and shown in the window).
    pub display_width: u32,
    pub display_height: u32,
    pub framerate: u32,
    pub flip_method: FlipMethod,
}

impl Default for CsiPipelineConfig {
    fn default() -> Self {
        Self {
            sensor_id: 0,
            capture_width: 1920,
            capture_height: 1080,
            display_width: 960,
            display_height: 540,
            framerate: 30,
            flip_method: FlipMethod::None,
        }
    }
}

impl CsiPipelineConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("capture_width", self.capture_width),
            ("capture_height", self.capture_height),
            ("display_width", self.display_width),
            ("display_height", self.display_height),
            ("framerate", self.framerate),
        ] {
            if value == 0 {
                return Err(anyhow!("{} must be greater than zero", name));
            }
        }
        Ok(())
    }

    /// The pipeline template with this configuration substituted in.
    pub fn pipeline_string(&self) -> String {
        pipeline_string(self)
    }

    /// Pipeline description handed to `gst::parse::launch`.
    ///
    /// Extends the template's trailing `appsink` with a name and
    /// latest-frame-wins buffering.
    pub fn launch_description(&self) -> String {
        format!(
            "{} name={} sync=false max-buffers=1 drop=true",
            self.pipeline_string(),
            APPSINK_NAME
        )
    }
}

/// Build the CSI capture pipeline string.
pub fn pipeline_string(config: &CsiPipelineConfig) -> String {
    format!(
        "nvarguscamerasrc sensor-id={} !\
         video/x-raw(memory:NVMM), width=(int){}, height=(int){}, framerate=(fraction){}/1 ! \
         nvvidconv flip-method={} ! \
         video/x-raw, width=(int){}, height=(int){}, format=(string)BGRx ! \
         videoconvert ! \
         video/x-raw, format=(string)BGR ! appsink",
        config.sensor_id,
        config.capture_width,
        config.capture_height,
        config.framerate,
        config.flip_method,
        config.display_width,
        config.display_height,
    )
}
