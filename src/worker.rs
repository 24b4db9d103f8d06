// src/worker.rs - Runs hand detection off the frame loop
use image::DynamicImage;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread;
use tracing::{debug, info, trace, warn};

use crate::error::Result;
use crate::mediapipe_bridge::HandDetector;
use crate::session::{self, LatestHands};

struct FrameJob {
    frame: DynamicImage,
    timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submitted {
    Queued,
    /// The worker still had a frame waiting; this one was dropped.
    Busy,
    /// The worker thread is gone.
    Stopped,
}

/// Handle to the detection thread.
///
/// Dropping it closes the queue; the thread finishes any in-flight frame and
/// exits on its own.
pub struct DetectionWorker {
    jobs: SyncSender<FrameJob>,
}

impl DetectionWorker {
    pub fn spawn<D: HandDetector>(detector: D, latest: LatestHands) -> Result<Self> {
        let (jobs, rx) = mpsc::sync_channel(1);
        thread::Builder::new()
            .name("hand-detector".into())
            .spawn(move || detection_thread(detector, rx, latest))?;
        Ok(Self { jobs })
    }

    /// Hands a frame to the detector without waiting.
    pub fn submit(&self, frame: DynamicImage, timestamp_ms: u64) -> Submitted {
        match self.jobs.try_send(FrameJob { frame, timestamp_ms }) {
            Ok(()) => Submitted::Queued,
            Err(TrySendError::Full(_)) => {
                trace!(timestamp_ms, "detector busy, frame dropped");
                Submitted::Busy
            }
            Err(TrySendError::Disconnected(_)) => Submitted::Stopped,
        }
    }
}

fn detection_thread<D: HandDetector>(
    mut detector: D,
    jobs: Receiver<FrameJob>,
    latest: LatestHands,
) {
    info!("detection worker started");
    for job in jobs {
        let detection = match detector.detect(&job.frame) {
            Ok(d) => d,
            Err(e) => {
                warn!("detection failed for frame at {} ms: {}", job.timestamp_ms, e);
                continue;
            }
        };
        match session::on_detection(&latest, &detection, job.timestamp_ms) {
            Ok(hands) => debug!(hands, timestamp_ms = job.timestamp_ms, "hands updated"),
            Err(e) => warn!("discarding detection at {} ms: {}", job.timestamp_ms, e),
        }
    }
    info!("detection worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandiError;
    use crate::mediapipe_bridge::{Category, DetectedHand, Detection};
    use crate::tracking::tests::hand_with;
    use crate::tracking::LandmarkPoint;
    use std::sync::mpsc::Sender;
    use std::time::{Duration, Instant};

    struct Scripted {
        results: Vec<Result<Detection>>,
    }

    impl HandDetector for Scripted {
        fn detect(&mut self, _frame: &DynamicImage) -> Result<Detection> {
            if self.results.is_empty() {
                return Ok(Detection::default());
            }
            self.results.remove(0)
        }
    }

    /// Reports each call, then waits for permission to finish.
    struct Gated {
        started: Sender<()>,
        release: Receiver<()>,
    }

    impl HandDetector for Gated {
        fn detect(&mut self, _frame: &DynamicImage) -> Result<Detection> {
            let _ = self.started.send(());
            let _ = self.release.recv();
            Ok(Detection::default())
        }
    }

    fn frame() -> DynamicImage {
        DynamicImage::new_rgb8(4, 4)
    }

    fn one_hand() -> Detection {
        Detection {
            hands: vec![DetectedHand {
                handedness: vec![Category::new("Right", 0.9)],
                landmarks: hand_with((0.5, 0.5), &[]),
            }],
        }
    }

    fn wait_for_timestamp(latest: &LatestHands, ts: u64) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if latest.snapshot().timestamp_ms == Some(ts) {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn completed_detection_is_published() {
        let latest = LatestHands::new();
        let detector = Scripted {
            results: vec![Ok(one_hand())],
        };
        let worker = DetectionWorker::spawn(detector, latest.clone()).unwrap();

        assert_eq!(worker.submit(frame(), 42), Submitted::Queued);
        assert!(wait_for_timestamp(&latest, 42));
        assert_eq!(latest.snapshot().hands.len(), 1);
    }

    /// Plays back results in order, announcing each call; once the script
    /// runs out it blocks until released.
    struct Sequence {
        results: Vec<Result<Detection>>,
        calls: usize,
        entered: Sender<usize>,
        release: Receiver<()>,
    }

    impl HandDetector for Sequence {
        fn detect(&mut self, _frame: &DynamicImage) -> Result<Detection> {
            let _ = self.entered.send(self.calls);
            self.calls += 1;
            if self.results.is_empty() {
                let _ = self.release.recv();
                return Ok(Detection::default());
            }
            self.results.remove(0)
        }
    }

    fn submit_until_queued(worker: &DetectionWorker, ts: u64) {
        while worker.submit(frame(), ts) == Submitted::Busy {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn failures_keep_previous_hands() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let latest = LatestHands::new();
        let bad_hand = Detection {
            hands: vec![DetectedHand {
                handedness: vec![Category::new("Left", 0.9)],
                landmarks: vec![LandmarkPoint::default(); 3],
            }],
        };
        let worker = DetectionWorker::spawn(
            Sequence {
                results: vec![
                    Ok(one_hand()),
                    Err(HandiError::Detector("camera glitch".into())),
                    Ok(bad_hand),
                ],
                calls: 0,
                entered: entered_tx,
                release: release_rx,
            },
            latest.clone(),
        )
        .unwrap();

        for ts in 1..=4 {
            submit_until_queued(&worker, ts);
        }

        // The fourth call starts only after the first three were handled.
        let deadline = Duration::from_secs(5);
        while entered_rx.recv_timeout(deadline).unwrap() < 3 {}

        let snapshot = latest.snapshot();
        assert_eq!(snapshot.timestamp_ms, Some(1));
        assert_eq!(snapshot.hands.len(), 1);

        release_tx.send(()).unwrap();
        assert!(wait_for_timestamp(&latest, 4));
        assert!(latest.snapshot().hands.is_empty());
    }

    #[test]
    fn busy_worker_drops_frames_without_blocking() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let latest = LatestHands::new();
        let worker = DetectionWorker::spawn(
            Gated {
                started: started_tx,
                release: release_rx,
            },
            latest.clone(),
        )
        .unwrap();

        assert_eq!(worker.submit(frame(), 1), Submitted::Queued);
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // One frame may wait while the first is in flight; the next is dropped.
        assert_eq!(worker.submit(frame(), 2), Submitted::Queued);
        assert_eq!(worker.submit(frame(), 3), Submitted::Busy);

        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();
        assert!(wait_for_timestamp(&latest, 2));
    }
}
