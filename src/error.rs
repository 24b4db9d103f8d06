// src/error.rs
use thiserror::Error;

use crate::controls::MAX_CONTROLLER_BASE;
use crate::tracking::LANDMARK_COUNT;

#[derive(Debug, Error)]
pub enum HandiError {
    #[error(
        "invalid landmark set: expected {expected} landmarks, got {len}",
        expected = LANDMARK_COUNT
    )]
    InvalidLandmarkSet { len: usize },

    #[error("detected hand has no handedness classification")]
    MissingHandedness,

    #[error("unrecognised handedness label {0:?}")]
    UnknownHandedness(String),

    #[error(
        "controller base {0} does not fit two hands below 128 (max {max})",
        max = MAX_CONTROLLER_BASE
    )]
    InvalidControllerBase(u8),

    #[error("MIDI channel {0} out of range 0-15")]
    InvalidChannel(u8),

    #[error("frame height must be positive")]
    InvalidFrameHeight,

    #[error("MIDI error: {0}")]
    Midi(String),

    #[error("no MIDI output ports available")]
    NoMidiPorts,

    #[error("camera error: {0}")]
    Camera(String),

    #[error("detector error: {0}")]
    Detector(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, HandiError>;
