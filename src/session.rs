// src/session.rs - Detection results and emitted values shared across the frame loop
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::changes::{self, ControlChange};
use crate::controls::{self, ControlLayout, ControlValueTable};
use crate::error::Result;
use crate::mediapipe_bridge::Detection;
use crate::midi::ControlSink;
use crate::tracking::{self, HandGeometry};

/// Hands from one completed detection.
#[derive(Debug, Clone, Default)]
pub struct HandsSnapshot {
    pub hands: Vec<HandGeometry>,
    /// `None` until the first detection completes.
    pub timestamp_ms: Option<u64>,
}

/// Most recent completed detection, replaced wholesale on every publish.
///
/// Readers get either the previous or the new snapshot, never a mix.
#[derive(Debug, Clone, Default)]
pub struct LatestHands {
    inner: Arc<Mutex<Arc<HandsSnapshot>>>,
}

impl LatestHands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: HandsSnapshot) {
        let snapshot = Arc::new(snapshot);
        *self.lock() = snapshot;
    }

    pub fn snapshot(&self) -> Arc<HandsSnapshot> {
        Arc::clone(&self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Arc<HandsSnapshot>> {
        // Only whole snapshots are ever stored, so a poisoned value is still complete.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Detection completion handler.
///
/// All hands are extracted before anything is published; on error the
/// previous snapshot stays in place.
pub fn on_detection(
    latest: &LatestHands,
    detection: &Detection,
    timestamp_ms: u64,
) -> Result<usize> {
    let hands = tracking::extract_hands(detection)?;
    let count = hands.len();
    latest.publish(HandsSnapshot {
        hands,
        timestamp_ms: Some(timestamp_ms),
    });
    Ok(count)
}

/// State owned by the render/emit cycle.
pub struct Session {
    layout: ControlLayout,
    latest: LatestHands,
    last_values: ControlValueTable,
}

impl Session {
    pub fn new(layout: ControlLayout, latest: LatestHands) -> Self {
        Self {
            layout,
            latest,
            last_values: ControlValueTable::new(),
        }
    }

    /// Handle for the detection side.
    pub fn latest_hands(&self) -> LatestHands {
        self.latest.clone()
    }

    pub fn last_values(&self) -> &ControlValueTable {
        &self.last_values
    }

    /// Maps the latest hands, emits what changed and remembers the new table.
    ///
    /// With no hands nothing is sent and the last table is kept, so the
    /// receiver holds its previous values.
    pub fn render_cycle<S>(&mut self, sink: &mut S) -> Result<Vec<ControlChange>>
    where
        S: ControlSink + ?Sized,
    {
        let snapshot = self.latest.snapshot();
        if snapshot.hands.is_empty() {
            return Ok(Vec::new());
        }

        let values = controls::merge_hands(&snapshot.hands, &self.layout);
        let changes = changes::emit(sink, &self.last_values, &values)?;
        if !changes.is_empty() {
            debug!(
                changed = changes.len(),
                detected_at = ?snapshot.timestamp_ms,
                "emitted control changes"
            );
        }
        self.last_values = values;
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandiError;
    use crate::mediapipe_bridge::{Category, DetectedHand};
    use crate::tracking::tests::hand_with;
    use crate::tracking::LandmarkPoint;

    fn detected(label: &str, rest: (f64, f64)) -> DetectedHand {
        DetectedHand {
            handedness: vec![Category::new(label, 0.9)],
            landmarks: hand_with(rest, &[(8, (rest.0 + 0.1, rest.1 - 0.2))]),
        }
    }

    fn detection(hands: Vec<DetectedHand>) -> Detection {
        Detection { hands }
    }

    #[test]
    fn no_detection_yet_emits_nothing() {
        let mut session = Session::new(ControlLayout::default(), LatestHands::new());
        let mut sink: Vec<ControlChange> = Vec::new();
        assert!(session.render_cycle(&mut sink).unwrap().is_empty());
        assert!(sink.is_empty());
        assert!(session.last_values().is_empty());
        assert_eq!(session.latest_hands().snapshot().timestamp_ms, None);
    }

    #[test]
    fn first_cycle_sends_every_value_then_only_changes() {
        let latest = LatestHands::new();
        let mut session = Session::new(ControlLayout::default(), latest.clone());
        let mut sink: Vec<ControlChange> = Vec::new();

        on_detection(&latest, &detection(vec![detected("Right", (0.5, 0.5))]), 10).unwrap();
        let first = session.render_cycle(&mut sink).unwrap();
        assert_eq!(first.len(), 20);

        // Same detection still current: nothing to send.
        assert!(session.render_cycle(&mut sink).unwrap().is_empty());

        on_detection(&latest, &detection(vec![detected("Right", (0.6, 0.5))]), 20).unwrap();
        let moved = session.render_cycle(&mut sink).unwrap();
        assert!(!moved.is_empty());
        assert!(moved.len() < 20);
        assert_eq!(sink.len(), first.len() + moved.len());
        assert_eq!(latest.snapshot().timestamp_ms, Some(20));
    }

    #[test]
    fn hands_leaving_keep_last_values() {
        let latest = LatestHands::new();
        let mut session = Session::new(ControlLayout::default(), latest.clone());
        let mut sink: Vec<ControlChange> = Vec::new();

        on_detection(&latest, &detection(vec![detected("Left", (0.3, 0.3))]), 1).unwrap();
        session.render_cycle(&mut sink).unwrap();
        let before = session.last_values().clone();

        on_detection(&latest, &Detection::default(), 2).unwrap();
        assert!(session.render_cycle(&mut sink).unwrap().is_empty());
        assert_eq!(session.last_values(), &before);
        assert_eq!(sink.len(), 20);
    }

    #[test]
    fn switching_hands_does_not_clear_old_range() {
        let latest = LatestHands::new();
        let mut session = Session::new(ControlLayout::default(), latest.clone());
        let mut sink: Vec<ControlChange> = Vec::new();

        on_detection(&latest, &detection(vec![detected("Right", (0.5, 0.5))]), 1).unwrap();
        session.render_cycle(&mut sink).unwrap();

        on_detection(&latest, &detection(vec![detected("Left", (0.5, 0.5))]), 2).unwrap();
        let changes = session.render_cycle(&mut sink).unwrap();
        assert_eq!(changes.len(), 20);
        assert!(changes.iter().all(|c| (38..58).contains(&c.controller)));
        assert!(session.last_values().keys().all(|&c| c >= 38));
    }

    #[test]
    fn faulty_detection_leaves_state_untouched() {
        let latest = LatestHands::new();
        on_detection(&latest, &detection(vec![detected("Right", (0.5, 0.5))]), 5).unwrap();

        let broken = DetectedHand {
            handedness: vec![Category::new("Left", 0.9)],
            landmarks: vec![LandmarkPoint::default(); 20],
        };
        let mixed = detection(vec![detected("Right", (0.2, 0.2)), broken]);
        let result = on_detection(&latest, &mixed, 6);
        assert!(matches!(result, Err(HandiError::InvalidLandmarkSet { len: 20 })));

        let unlabeled = DetectedHand {
            handedness: Vec::new(),
            landmarks: hand_with((0.5, 0.5), &[]),
        };
        let result = on_detection(&latest, &detection(vec![unlabeled]), 7);
        assert!(matches!(result, Err(HandiError::MissingHandedness)));

        let snapshot = latest.snapshot();
        assert_eq!(snapshot.timestamp_ms, Some(5));
        assert_eq!(snapshot.hands.len(), 1);
    }

    #[test]
    fn snapshot_taken_before_publish_is_unchanged() {
        let latest = LatestHands::new();
        on_detection(&latest, &detection(vec![detected("Right", (0.5, 0.5))]), 1).unwrap();
        let held = latest.snapshot();

        on_detection(&latest, &Detection::default(), 2).unwrap();
        assert_eq!(held.hands.len(), 1);
        assert!(latest.snapshot().hands.is_empty());
    }
}
