// src/app.rs - Frame loop tying camera, detector, session and sink together
use anyhow::{Context, Result};
use image::DynamicImage;
use std::fs::File;
use std::time::Instant;
use tracing::{debug, info};

use crate::changes::ControlChange;
use crate::config::HandiConfig;
use crate::data::ChangeLog;
use crate::mediapipe_bridge::{HandDetector, MediaPipeWrapper};
use crate::midi::ControlSink;
use crate::session::{LatestHands, Session};
use crate::video::CameraSource;
use crate::worker::{DetectionWorker, Submitted};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames: u64,
    pub submitted: u64,
    pub dropped: u64,
    pub changes: u64,
}

pub struct HandiApp<S: ControlSink> {
    worker: DetectionWorker,
    session: Session,
    sink: S,
    change_log: Option<ChangeLog<File>>,
    started: Instant,
    stats: FrameStats,
}

impl<S: ControlSink> HandiApp<S> {
    /// Starts the detection worker for `detector` and wires it to a new session.
    pub fn new<D: HandDetector>(config: &HandiConfig, detector: D, sink: S) -> Result<Self> {
        let layout = config.layout().context("invalid controller layout")?;
        let latest = LatestHands::new();
        let worker = DetectionWorker::spawn(detector, latest.clone())
            .context("failed to start detection worker")?;

        let change_log = match &config.record_dir {
            Some(dir) => {
                let (log, _path) = ChangeLog::create(dir, layout).with_context(|| {
                    format!("failed to create change log under {}", dir.display())
                })?;
                Some(log)
            }
            None => None,
        };

        Ok(Self {
            worker,
            session: Session::new(layout, latest),
            sink,
            change_log,
            started: Instant::now(),
            stats: FrameStats::default(),
        })
    }

    /// Runs one iteration: queue the frame for detection, then emit whatever
    /// changed since the last cycle.
    pub fn process_frame(&mut self, frame: DynamicImage) -> Result<Vec<ControlChange>> {
        let timestamp_ms = self.started.elapsed().as_millis() as u64;
        self.stats.frames += 1;

        match self.worker.submit(frame, timestamp_ms) {
            Submitted::Queued => self.stats.submitted += 1,
            Submitted::Busy => self.stats.dropped += 1,
            Submitted::Stopped => anyhow::bail!("detection worker stopped"),
        }

        let changes = self
            .session
            .render_cycle(&mut self.sink)
            .context("failed to send control changes")?;
        self.stats.changes += changes.len() as u64;

        if let Some(log) = self.change_log.as_mut() {
            log.record(self.stats.frames, timestamp_ms, &changes)
                .context("failed to write change log")?;
        }
        Ok(changes)
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Flushes the change log and returns the sink.
    pub fn finish(mut self) -> Result<(S, FrameStats)> {
        if let Some(log) = self.change_log.as_mut() {
            log.flush().context("failed to flush change log")?;
            info!("Wrote {} change rows", log.rows());
        }
        Ok((self.sink, self.stats))
    }
}

/// Opens the camera and detector from `config` and drives frames into `sink`
/// until the frame limit is reached or the camera fails.
pub fn run<S: ControlSink>(config: &HandiConfig, sink: S) -> Result<FrameStats> {
    let mut camera = CameraSource::open(config.camera_index, config.frame_height)
        .with_context(|| format!("failed to open camera {}", config.camera_index))?;
    let detector = MediaPipeWrapper::spawn(&config.detector_program, &config.detector_args)
        .with_context(|| format!("failed to start hand detector `{}`", config.detector_program))?;
    let mut app = HandiApp::new(config, detector, sink)?;

    info!(
        base = config.controller_base,
        channel = config.midi_channel,
        "Tracking hands; right hand on {}..={}",
        config.controller_base,
        config.controller_base + 19
    );

    loop {
        if let Some(limit) = config.max_frames {
            if app.stats().frames >= limit {
                break;
            }
        }
        let frame = camera.read_frame().context("camera stopped delivering frames")?;
        let changes = app.process_frame(frame)?;
        if !changes.is_empty() {
            debug!(frame = app.stats().frames, changes = changes.len(), "frame emitted");
        }
    }

    let (_sink, stats) = app.finish()?;
    info!(
        "Processed {} frames: {} detected, {} dropped, {} control changes",
        stats.frames, stats.submitted, stats.dropped, stats.changes
    );
    Ok(stats)
}
