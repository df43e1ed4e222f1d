use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::device::CameraPosition;

const DEFAULT_DEBOUNCE_MS: u64 = 500;
const DEFAULT_DETECTOR: &str = "cpu";
const DEFAULT_MIN_CONFIDENCE: f32 = 0.8;
const DEFAULT_SOURCE: &str = "stub";
const DEFAULT_POSITION: CameraPosition = CameraPosition::Back;
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FPS: u32 = 10;
const DEFAULT_BACK_DEVICE: &str = "/dev/video0";
const DEFAULT_FRONT_DEVICE: &str = "/dev/video1";

#[derive(Debug, Deserialize, Default)]
struct MaskwatchConfigFile {
    debounce_ms: Option<u64>,
    detector: Option<DetectorConfigFile>,
    camera: Option<CameraConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    min_confidence: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    source: Option<String>,
    initial_position: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    back_device: Option<String>,
    front_device: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MaskwatchConfig {
    /// Minimum interval between two status emissions.
    pub debounce: Duration,
    pub detector: DetectorSettings,
    pub camera: CameraSettings,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub min_confidence: f32,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// "stub" or "v4l2".
    pub source: String,
    pub initial_position: CameraPosition,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    pub back_device: String,
    pub front_device: String,
}

impl MaskwatchConfig {
    /// Load configuration from the optional file named by `MASKWATCH_CONFIG`,
    /// apply `MASKWATCH_*` environment overrides, and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("MASKWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MaskwatchConfigFile) -> Result<Self> {
        let debounce = Duration::from_millis(file.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS));
        let detector = DetectorSettings {
            backend: file
                .detector
                .as_ref()
                .and_then(|detector| detector.backend.clone())
                .unwrap_or_else(|| DEFAULT_DETECTOR.to_string()),
            min_confidence: file
                .detector
                .as_ref()
                .and_then(|detector| detector.min_confidence)
                .unwrap_or(DEFAULT_MIN_CONFIDENCE),
        };
        let initial_position = match file
            .camera
            .as_ref()
            .and_then(|camera| camera.initial_position.as_deref())
        {
            Some(value) => CameraPosition::parse(value)?,
            None => DEFAULT_POSITION,
        };
        let camera = CameraSettings {
            source: file
                .camera
                .as_ref()
                .and_then(|camera| camera.source.clone())
                .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            initial_position,
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_HEIGHT),
            target_fps: file
                .camera
                .as_ref()
                .and_then(|camera| camera.target_fps)
                .unwrap_or(DEFAULT_FPS),
            back_device: file
                .camera
                .as_ref()
                .and_then(|camera| camera.back_device.clone())
                .unwrap_or_else(|| DEFAULT_BACK_DEVICE.to_string()),
            front_device: file
                .camera
                .and_then(|camera| camera.front_device)
                .unwrap_or_else(|| DEFAULT_FRONT_DEVICE.to_string()),
        };
        Ok(Self {
            debounce,
            detector,
            camera,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(debounce) = std::env::var("MASKWATCH_DEBOUNCE_MS") {
            let millis: u64 = debounce.parse().map_err(|_| {
                anyhow!("MASKWATCH_DEBOUNCE_MS must be an integer number of milliseconds")
            })?;
            self.debounce = Duration::from_millis(millis);
        }
        if let Ok(backend) = std::env::var("MASKWATCH_DETECTOR") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend;
            }
        }
        if let Ok(source) = std::env::var("MASKWATCH_CAMERA_SOURCE") {
            if !source.trim().is_empty() {
                self.camera.source = source;
            }
        }
        if let Ok(position) = std::env::var("MASKWATCH_CAMERA_POSITION") {
            if !position.trim().is_empty() {
                self.camera.initial_position = CameraPosition::parse(&position)?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.debounce.is_zero() {
            return Err(anyhow!("debounce must be greater than zero"));
        }
        if !(self.detector.min_confidence > 0.0 && self.detector.min_confidence <= 1.0) {
            return Err(anyhow!("min_confidence must be within (0, 1]"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera dimensions must be greater than zero"));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<MaskwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_is_valid() {
        let cfg = MaskwatchConfig::from_file(MaskwatchConfigFile::default()).unwrap();

        assert_eq!(cfg.debounce, Duration::from_millis(500));
        assert_eq!(cfg.detector.backend, "cpu");
        assert_eq!(cfg.detector.min_confidence, 0.8);
        assert_eq!(cfg.camera.source, "stub");
        assert_eq!(cfg.camera.initial_position, CameraPosition::Back);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_zero_debounce() {
        let mut cfg = MaskwatchConfig::from_file(MaskwatchConfigFile::default()).unwrap();
        cfg.debounce = Duration::ZERO;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let mut cfg = MaskwatchConfig::from_file(MaskwatchConfigFile::default()).unwrap();
        cfg.detector.min_confidence = 1.5;
        assert!(cfg.validate().is_err());
    }
}
