//! Hand tracking to MIDI control changes.
//!
//! Camera frames go to an out-of-process hand landmarker; per-finger geometry
//! is mapped onto a fixed block of controllers per hand and only values that
//! changed since the last frame are sent.

pub mod app;
pub mod changes;
pub mod config;
pub mod controls;
pub mod data;
pub mod error;
pub mod mediapipe_bridge;
pub mod midi;
pub mod session;
pub mod tracking;
pub mod video;
pub mod worker;

pub use changes::ControlChange;
pub use config::HandiConfig;
pub use controls::{ControlLayout, ControlValueTable};
pub use error::{HandiError, Result};
pub use session::{LatestHands, Session};
