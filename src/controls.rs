// src/controls.rs - Hand geometry to MIDI controller values
use std::collections::BTreeMap;

use crate::error::{HandiError, Result};
use crate::tracking::{Finger, HandGeometry, Handedness};

pub const DEFAULT_CONTROLLER_BASE: u8 = 18;

/// Controller slots occupied by one hand.
pub const SLOTS_PER_HAND: u8 = 20;

/// Highest base that still fits both hands below controller 128.
pub const MAX_CONTROLLER_BASE: u8 = 127 - (2 * SLOTS_PER_HAND - 1);

pub const MAX_CONTROL_VALUE: u8 = 127;

const POSITION_SLOT: u8 = 0;
const ANGLE_SLOT: u8 = 10;
const SIZE_SLOT: u8 = 15;

/// Finger angles observed in practice run roughly from -90 to +30 degrees.
const ANGLE_FLOOR: f64 = -90.0;
const ANGLE_SPAN: f64 = 120.0;

/// Finger size mapped to full scale.
const SIZE_FULL_SCALE: f64 = 100.0;

/// Controller index -> value, ordered by index.
pub type ControlValueTable = BTreeMap<u8, u8>;

/// What a controller slot within a hand's range encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSlot {
    X(Finger),
    Y(Finger),
    Angle(Finger),
    Size(Finger),
}

impl ControlSlot {
    pub fn kind(&self) -> &'static str {
        match self {
            ControlSlot::X(_) => "x",
            ControlSlot::Y(_) => "y",
            ControlSlot::Angle(_) => "angle",
            ControlSlot::Size(_) => "size",
        }
    }

    pub fn finger(&self) -> Finger {
        match *self {
            ControlSlot::X(f)
            | ControlSlot::Y(f)
            | ControlSlot::Angle(f)
            | ControlSlot::Size(f) => f,
        }
    }
}

/// Placement of both hands' controller ranges.
///
/// Right hand: `base..base+19`, left hand: `base+20..base+39`. Within a
/// hand, slots 0-9 hold x/y per finger, 10-14 angles and 15-19 sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlLayout {
    base: u8,
}

impl Default for ControlLayout {
    fn default() -> Self {
        Self {
            base: DEFAULT_CONTROLLER_BASE,
        }
    }
}

impl ControlLayout {
    pub fn new(base: u8) -> Result<Self> {
        if base > MAX_CONTROLLER_BASE {
            return Err(HandiError::InvalidControllerBase(base));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> u8 {
        self.base
    }

    /// First controller of the given hand's range.
    pub fn offset(&self, handedness: Handedness) -> u8 {
        match handedness {
            Handedness::Right => self.base,
            Handedness::Left => self.base + SLOTS_PER_HAND,
        }
    }

    /// Reverse lookup of a controller index, for logging and export.
    pub fn describe(&self, controller: u8) -> Option<(Handedness, ControlSlot)> {
        let relative = controller.checked_sub(self.base)?;
        let (handedness, slot) = match relative {
            r if r < SLOTS_PER_HAND => (Handedness::Right, r),
            r if r < 2 * SLOTS_PER_HAND => (Handedness::Left, r - SLOTS_PER_HAND),
            _ => return None,
        };
        let slot = match slot {
            s if s < ANGLE_SLOT => {
                let finger = Finger::ALL[usize::from(s / 2)];
                if s % 2 == 0 {
                    ControlSlot::X(finger)
                } else {
                    ControlSlot::Y(finger)
                }
            }
            s if s < SIZE_SLOT => ControlSlot::Angle(Finger::ALL[usize::from(s - ANGLE_SLOT)]),
            s => ControlSlot::Size(Finger::ALL[usize::from(s - SIZE_SLOT)]),
        };
        Some((handedness, slot))
    }
}

/// Rounds half to even and clamps into the controller value range.
pub fn quantize(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value
        .round_ties_even()
        .clamp(0.0, f64::from(MAX_CONTROL_VALUE)) as u8
}

pub fn position_value(coordinate: f64) -> u8 {
    quantize(coordinate * f64::from(MAX_CONTROL_VALUE))
}

pub fn angle_value(degrees: f64) -> u8 {
    quantize((degrees - ANGLE_FLOOR) / ANGLE_SPAN * f64::from(MAX_CONTROL_VALUE))
}

pub fn size_value(size: f64) -> u8 {
    quantize(size / SIZE_FULL_SCALE * f64::from(MAX_CONTROL_VALUE))
}

/// Maps one hand onto its 20 controllers.
pub fn map_hand(hand: &HandGeometry, layout: &ControlLayout) -> ControlValueTable {
    let base = layout.offset(hand.handedness);
    let mut values = ControlValueTable::new();

    for (i, finger) in (0u8..).zip(hand.fingers.iter()) {
        values.insert(base + POSITION_SLOT + 2 * i, position_value(finger.center.x));
        values.insert(base + POSITION_SLOT + 2 * i + 1, position_value(finger.center.y));
        values.insert(base + ANGLE_SLOT + i, angle_value(finger.angle));
        values.insert(base + SIZE_SLOT + i, size_value(finger.size));
    }

    values
}

/// Maps hands in order into one table; a later hand overwrites an earlier
/// one with the same handedness.
pub fn merge_hands(hands: &[HandGeometry], layout: &ControlLayout) -> ControlValueTable {
    let mut merged = ControlValueTable::new();
    for hand in hands {
        merged.extend(map_hand(hand, layout));
    }
    merged
}
