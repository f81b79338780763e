use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::DetectorSettings;
use crate::display::{DisplayKind, DEFAULT_KEY_WAIT, DEFAULT_WINDOW_TITLE};
use crate::ingest::SourceKind;
use crate::overlay::DEFAULT_TRAIL_INTERVAL;
use crate::pipeline::{CsiPipelineConfig, FlipMethod};

const DEFAULT_SNAPSHOT_EVERY: u64 = 30;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TagfinderConfigFile {
    source: Option<String>,
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    display: Option<DisplayConfigFile>,
    trail: Option<TrailConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile {
    sensor_id: Option<u32>,
    capture_width: Option<u32>,
    capture_height: Option<u32>,
    display_width: Option<u32>,
    display_height: Option<u32>,
    framerate: Option<u32>,
    flip_method: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    backend: Option<String>,
    families: Option<Vec<String>>,
    threads: Option<u8>,
    quad_decimate: Option<f32>,
    quad_sigma: Option<f32>,
    refine_edges: Option<bool>,
    decode_sharpening: Option<f64>,
    debug: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DisplayConfigFile {
    kind: Option<String>,
    window_title: Option<String>,
    key_wait_ms: Option<u64>,
    snapshot_dir: Option<PathBuf>,
    snapshot_every: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TrailConfigFile {
    interval_frames: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct TagfinderConfig {
    pub source: SourceKind,
    pub pipeline: CsiPipelineConfig,
    /// Detector backend name. None picks the best one compiled in.
    pub detector_backend: Option<String>,
    pub detector: DetectorSettings,
    pub display: DisplaySettings,
    pub trail_interval: u32,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub kind: DisplayKind,
    pub window_title: String,
    pub key_wait: Duration,
    pub snapshot_dir: Option<PathBuf>,
    pub snapshot_every: u64,
}

impl Default for TagfinderConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            pipeline: CsiPipelineConfig::default(),
            detector_backend: None,
            detector: DetectorSettings::default(),
            display: DisplaySettings {
                kind: DisplayKind::default(),
                window_title: DEFAULT_WINDOW_TITLE.to_string(),
                key_wait: DEFAULT_KEY_WAIT,
                snapshot_dir: None,
                snapshot_every: DEFAULT_SNAPSHOT_EVERY,
            },
            trail_interval: DEFAULT_TRAIL_INTERVAL,
        }
    }
}

impl TagfinderConfig {
    /// Load from `TAGFINDER_CONFIG` (if set), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TAGFINDER_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load from an explicit file (or defaults), then apply environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TagfinderConfigFile) -> Result<Self> {
        let defaults = Self::default();

        let source = match file.source.as_deref() {
            Some(source) => source.parse()?,
            None => defaults.source,
        };

        let camera = file.camera.unwrap_or_default();
        let base = defaults.pipeline;
        let pipeline = CsiPipelineConfig {
            sensor_id: camera.sensor_id.unwrap_or(base.sensor_id),
            capture_width: camera.capture_width.unwrap_or(base.capture_width),
            capture_height: camera.capture_height.unwrap_or(base.capture_height),
            display_width: camera.display_width.unwrap_or(base.display_width),
            display_height: camera.display_height.unwrap_or(base.display_height),
            framerate: camera.framerate.unwrap_or(base.framerate),
            flip_method: match camera.flip_method {
                Some(value) => FlipMethod::try_from(value)?,
                None => base.flip_method,
            },
        };

        let detector_file = file.detector.unwrap_or_default();
        let base = defaults.detector;
        let detector = DetectorSettings {
            families: detector_file.families.unwrap_or(base.families),
            threads: detector_file.threads.unwrap_or(base.threads),
            quad_decimate: detector_file.quad_decimate.unwrap_or(base.quad_decimate),
            quad_sigma: detector_file.quad_sigma.unwrap_or(base.quad_sigma),
            refine_edges: detector_file.refine_edges.unwrap_or(base.refine_edges),
            decode_sharpening: detector_file
                .decode_sharpening
                .unwrap_or(base.decode_sharpening),
            debug: detector_file.debug.unwrap_or(base.debug),
        };

        let display_file = file.display.unwrap_or_default();
        let base = defaults.display;
        let display = DisplaySettings {
            kind: match display_file.kind.as_deref() {
                Some(kind) => kind.parse()?,
                None => base.kind,
            },
            window_title: display_file.window_title.unwrap_or(base.window_title),
            key_wait: display_file
                .key_wait_ms
                .map(Duration::from_millis)
                .unwrap_or(base.key_wait),
            snapshot_dir: display_file.snapshot_dir,
            snapshot_every: display_file.snapshot_every.unwrap_or(base.snapshot_every),
        };

        let trail_interval = file
            .trail
            .and_then(|trail| trail.interval_frames)
            .unwrap_or(defaults.trail_interval);

        Ok(Self {
            source,
            pipeline,
            detector_backend: detector_file.backend,
            detector,
            display,
            trail_interval,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("TAGFINDER_SOURCE") {
            if !source.trim().is_empty() {
                self.source = source.parse()?;
            }
        }
        if let Ok(sensor_id) = std::env::var("TAGFINDER_SENSOR_ID") {
            self.pipeline.sensor_id = sensor_id
                .trim()
                .parse()
                .map_err(|_| anyhow!("TAGFINDER_SENSOR_ID must be a non-negative integer"))?;
        }
        if let Ok(flip) = std::env::var("TAGFINDER_FLIP_METHOD") {
            let value: u8 = flip
                .trim()
                .parse()
                .map_err(|_| anyhow!("TAGFINDER_FLIP_METHOD must be an integer in 0..=7"))?;
            self.pipeline.flip_method = FlipMethod::try_from(value)?;
        }
        if let Ok(families) = std::env::var("TAGFINDER_FAMILIES") {
            let parsed = split_csv(&families);
            if !parsed.is_empty() {
                self.detector.families = parsed;
            }
        }
        if let Ok(display) = std::env::var("TAGFINDER_DISPLAY") {
            if !display.trim().is_empty() {
                self.display.kind = display.parse()?;
            }
        }
        if let Ok(dir) = std::env::var("TAGFINDER_SNAPSHOT_DIR") {
            if !dir.trim().is_empty() {
                self.display.snapshot_dir = Some(PathBuf::from(dir));
            }
        }
        Ok(())
    }

    /// Check cross-field constraints. Called by `load`; call again after
    /// applying command-line overrides.
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.detector.validate()?;
        if self.trail_interval == 0 {
            return Err(anyhow!("trail interval must be at least one frame"));
        }
        if self.display.snapshot_every == 0 {
            return Err(anyhow!("snapshot_every must be at least 1"));
        }
        if let Some(backend) = &self.detector_backend {
            if backend.trim().is_empty() {
                return Err(anyhow!("detector backend name must not be empty"));
            }
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<TagfinderConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
