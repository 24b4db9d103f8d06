// src/config.rs
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::controls::{ControlLayout, DEFAULT_CONTROLLER_BASE};
use crate::error::{HandiError, Result};

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandiConfig {
    /// First controller of the right hand; the left hand follows 20 later.
    pub controller_base: u8,
    pub midi_channel: u8,
    /// Substring of the MIDI output name; the first port when unset.
    pub midi_port: Option<String>,
    pub camera_index: u32,
    /// Frames are resized to this height before detection.
    pub frame_height: u32,
    pub detector_program: String,
    pub detector_args: Vec<String>,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
    /// Write emitted changes as CSV under this directory.
    pub record_dir: Option<PathBuf>,
}

impl Default for HandiConfig {
    fn default() -> Self {
        Self {
            controller_base: DEFAULT_CONTROLLER_BASE,
            midi_channel: 0,
            midi_port: None,
            camera_index: 0,
            frame_height: 600,
            detector_program: "python3".to_string(),
            detector_args: vec!["hand_detect.py".to_string()],
            max_frames: None,
            record_dir: None,
        }
    }
}

impl HandiConfig {
    /// Platform config file, e.g. `~/.config/handi/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "handi")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Loads `path` if given, else the platform file if it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        ControlLayout::new(self.controller_base)?;
        if self.midi_channel > 15 {
            return Err(HandiError::InvalidChannel(self.midi_channel));
        }
        if self.frame_height == 0 {
            return Err(HandiError::InvalidFrameHeight);
        }
        Ok(())
    }

    pub fn layout(&self) -> Result<ControlLayout> {
        ControlLayout::new(self.controller_base)
    }
}
