// src/mediapipe_bridge.rs - MediaPipe hand landmarker via a helper subprocess
//!
//! The helper is any program that speaks this protocol on its stdio:
//!
//! * prints `READY` on its first stdout line once the model is loaded,
//! * then, per frame, reads a 12-byte header (width, height, channels as
//!   little-endian `u32`) followed by `width * height * channels` RGB bytes,
//! * and answers with one JSON line:
//!   `{"hands": [{"handedness": [{"category_name": "Left", "score": 0.97}],
//!   "landmarks": [{"x": .., "y": .., "z": ..}, ...]}], "error": null}`.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, info, warn};

use crate::error::{HandiError, Result};
use crate::tracking::LandmarkPoint;

/// One handedness classification as reported by the landmarker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub category_name: String,
    #[serde(default)]
    pub score: f32,
}

impl Category {
    pub fn new(category_name: impl Into<String>, score: f32) -> Self {
        Self {
            category_name: category_name.into(),
            score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectedHand {
    #[serde(default)]
    pub handedness: Vec<Category>,
    pub landmarks: Vec<LandmarkPoint>,
}

/// Result of one detection: zero, one or two hands.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Detection {
    #[serde(default)]
    pub hands: Vec<DetectedHand>,
}

/// Anything that can find hands in a frame.
pub trait HandDetector: Send + 'static {
    fn detect(&mut self, frame: &DynamicImage) -> Result<Detection>;
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    hands: Vec<DetectedHand>,
    #[serde(default)]
    error: Option<String>,
}

/// Parses one response line from the helper.
pub fn parse_response(line: &str) -> Result<Detection> {
    let response: Response = serde_json::from_str(line.trim())?;
    if let Some(error) = response.error {
        return Err(HandiError::Detector(error));
    }
    Ok(Detection {
        hands: response.hands,
    })
}

/// Header sent ahead of each frame's pixel data.
pub fn frame_header(width: u32, height: u32, channels: u32) -> [u8; 12] {
    let mut header = [0u8; 12];
    header[0..4].copy_from_slice(&width.to_le_bytes());
    header[4..8].copy_from_slice(&height.to_le_bytes());
    header[8..12].copy_from_slice(&channels.to_le_bytes());
    header
}

pub struct MediaPipeWrapper {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl MediaPipeWrapper {
    /// Starts the helper and waits for its `READY` line.
    pub fn spawn(program: &str, args: &[String]) -> Result<Self> {
        info!(program, ?args, "starting hand landmarker helper");

        let mut process = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| HandiError::Detector(format!("failed to start {program}: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| HandiError::Detector("helper stdin unavailable".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| HandiError::Detector("helper stdout unavailable".into()))?;
        let mut stdout = BufReader::new(stdout);

        let mut ready = String::new();
        if let Err(e) = stdout.read_line(&mut ready) {
            shutdown(&mut process);
            return Err(e.into());
        }
        if ready.trim() != "READY" {
            shutdown(&mut process);
            return Err(HandiError::Detector(format!(
                "helper did not signal ready, got {:?}",
                ready.trim()
            )));
        }

        info!("hand landmarker ready");
        Ok(Self {
            process,
            stdin,
            stdout,
        })
    }
}

impl HandDetector for MediaPipeWrapper {
    fn detect(&mut self, frame: &DynamicImage) -> Result<Detection> {
        let rgb = frame.to_rgb8();
        let (width, height) = rgb.dimensions();

        self.stdin.write_all(&frame_header(width, height, 3))?;
        self.stdin.write_all(rgb.as_raw())?;
        self.stdin.flush()?;

        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(HandiError::Detector("helper closed its output".into()));
        }

        let detection = parse_response(&line)?;
        debug!(hands = detection.hands.len(), "detection complete");
        Ok(detection)
    }
}

/// Kills the helper and reaps it.
fn shutdown(process: &mut Child) {
    if let Err(e) = process.kill() {
        warn!("failed to stop hand landmarker helper: {}", e);
    }
    let _ = process.wait();
}

impl Drop for MediaPipeWrapper {
    fn drop(&mut self) {
        shutdown(&mut self.process);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_little_endian() {
        let header = frame_header(640, 480, 3);
        assert_eq!(&header[0..4], &[0x80, 0x02, 0, 0]);
        assert_eq!(&header[4..8], &[0xE0, 0x01, 0, 0]);
        assert_eq!(&header[8..12], &[3, 0, 0, 0]);
    }

    #[test]
    fn parses_hands_and_classifications() {
        let landmarks: Vec<serde_json::Value> = (0..21)
            .map(|i| serde_json::json!({"x": i as f64 / 20.0, "y": 0.5, "z": -0.01}))
            .collect();
        let line = serde_json::json!({
            "hands": [{
                "handedness": [{"category_name": "Left", "score": 0.97}],
                "landmarks": landmarks,
            }],
            "error": null,
        })
        .to_string();

        let detection = parse_response(&line).unwrap();
        assert_eq!(detection.hands.len(), 1);
        let hand = &detection.hands[0];
        assert_eq!(hand.handedness.len(), 1);
        assert_eq!(hand.handedness[0].category_name, "Left");
        assert!((hand.handedness[0].score - 0.97).abs() < 1e-6);
        assert_eq!(hand.landmarks.len(), 21);
        assert_eq!(hand.landmarks[20].x, 1.0);
    }

    #[test]
    fn empty_result_has_no_hands() {
        let detection = parse_response("{\"hands\": []}\n").unwrap();
        assert!(detection.hands.is_empty());
    }

    #[test]
    fn helper_error_is_surfaced() {
        let err = parse_response(r#"{"hands": [], "error": "model not loaded"}"#).unwrap_err();
        assert!(matches!(err, HandiError::Detector(msg) if msg == "model not loaded"));
    }

    #[test]
    fn garbage_is_a_json_error() {
        assert!(matches!(parse_response("READY"), Err(HandiError::Json(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn helper_without_ready_line_is_reaped() {
        let args = vec!["-c".to_string(), "echo $$; exec sleep 30".to_string()];
        let err = match MediaPipeWrapper::spawn("sh", &args) {
            Err(HandiError::Detector(msg)) => msg,
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("helper without READY was accepted"),
        };
        let pid: String = err.chars().filter(|c| c.is_ascii_digit()).collect();
        assert!(!pid.is_empty(), "no pid in {err:?}");
        assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
    }
}
