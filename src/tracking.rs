// src/tracking.rs - Per-finger geometry from MediaPipe hand landmarks
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{HandiError, Result};
use crate::mediapipe_bridge::{Category, Detection};

/// Landmarks per hand in the MediaPipe hand model.
pub const LANDMARK_COUNT: usize = 21;

// MediaPipe hand landmark indices
pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_TIP: usize = 20;

/// A normalized landmark. `z` is carried through from the detector but never used.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl LandmarkPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn xy(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// Parses a detector category label ("Left", "right", ...).
    pub fn from_label(label: &str) -> Result<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Handedness::Left),
            "right" => Ok(Handedness::Right),
            _ => Err(HandiError::UnknownHandedness(label.to_string())),
        }
    }

    /// Takes the best (first) classification of a hand.
    pub fn from_categories(categories: &[Category]) -> Result<Self> {
        let best = categories.first().ok_or(HandiError::MissingHandedness)?;
        Self::from_label(&best.category_name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Handedness::Left => "left",
            Handedness::Right => "right",
        }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    /// Landmark indices of this finger's connection chain, base to tip.
    ///
    /// The first segment of each chain is left out of the finger size.
    pub fn chain(self) -> [usize; 4] {
        let base = match self {
            Finger::Thumb => THUMB_CMC,
            Finger::Index => INDEX_MCP,
            Finger::Middle => MIDDLE_MCP,
            Finger::Ring => RING_MCP,
            Finger::Pinky => PINKY_MCP,
        };
        [base, base + 1, base + 2, base + 3]
    }

    pub fn name(self) -> &'static str {
        match self {
            Finger::Thumb => "thumb",
            Finger::Index => "index",
            Finger::Middle => "middle",
            Finger::Ring => "ring",
            Finger::Pinky => "pinky",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FingerGeometry {
    pub finger: Finger,
    /// Chain length excluding the first segment, x1000, one decimal.
    pub size: f64,
    /// Degrees, -180..180, from the second chain joint to the tip.
    pub angle: f64,
    pub center: Point2<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point2<f64>,
    pub max: Point2<f64>,
}

impl BoundingBox {
    fn around(points: &[Point2<f64>]) -> Self {
        let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Self { min, max }
    }

    pub fn size_sq(&self) -> f64 {
        nalgebra::distance_squared(&self.min, &self.max)
    }

    pub fn center(&self) -> Point2<f64> {
        nalgebra::center(&self.min, &self.max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandGeometry {
    pub handedness: Handedness,
    pub fingers: [FingerGeometry; 5],
    pub bbox: BoundingBox,
    pub size_sq: f64,
    pub center: Point2<f64>,
}

/// Builds the geometric summary of one detected hand.
pub fn extract_hand(landmarks: &[LandmarkPoint], handedness: &[Category]) -> Result<HandGeometry> {
    if landmarks.len() != LANDMARK_COUNT {
        return Err(HandiError::InvalidLandmarkSet { len: landmarks.len() });
    }
    let handedness = Handedness::from_categories(handedness)?;

    let points: Vec<Point2<f64>> = landmarks.iter().map(LandmarkPoint::xy).collect();
    let bbox = BoundingBox::around(&points);
    let fingers = Finger::ALL.map(|finger| finger_geometry(&points, finger));

    Ok(HandGeometry {
        handedness,
        fingers,
        bbox,
        size_sq: bbox.size_sq(),
        center: bbox.center(),
    })
}

/// Extracts every hand of a detection; the first faulty hand fails the whole batch.
pub fn extract_hands(detection: &Detection) -> Result<Vec<HandGeometry>> {
    detection
        .hands
        .iter()
        .map(|hand| extract_hand(&hand.landmarks, &hand.handedness))
        .collect()
}

fn finger_geometry(points: &[Point2<f64>], finger: Finger) -> FingerGeometry {
    let chain = finger.chain();

    let length_sq: f64 = chain[1..]
        .windows(2)
        .map(|pair| nalgebra::distance_squared(&points[pair[0]], &points[pair[1]]))
        .sum();

    let base = points[chain[1]];
    let tip = points[chain[chain.len() - 1]];
    let direction = tip - base;

    FingerGeometry {
        finger,
        size: round_to_tenth(length_sq.sqrt() * 1000.0),
        angle: direction.y.atan2(direction.x).to_degrees(),
        center: nalgebra::center(&base, &tip),
    }
}

/// Rounds to one decimal, half to even on the exact binary value.
fn round_to_tenth(value: f64) -> f64 {
    let scaled = value * 10.0;
    if (scaled - scaled.trunc()).abs() == 0.5 {
        // The product may have been rounded onto the tie; the fused residual
        // says which side the exact product lies on.
        let residual = value.mul_add(10.0, -scaled);
        if residual > 0.0 {
            return scaled.ceil() / 10.0;
        }
        if residual < 0.0 {
            return scaled.floor() / 10.0;
        }
    }
    scaled.round_ties_even() / 10.0
}
