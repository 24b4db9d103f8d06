// src/data.rs
use chrono::Local;
use csv::Writer;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::changes::ControlChange;
use crate::controls::ControlLayout;
use crate::error::Result;

#[derive(Debug, Serialize)]
struct ChangeRecord {
    frame: u64,
    timestamp_ms: u64,
    controller: u8,
    value: u8,
    // Empty when the controller lies outside the layout
    hand: &'static str,
    slot: &'static str,
    finger: &'static str,
}

/// `session_YYYYmmdd_HHMMSS` under `root`, named after the current local time.
pub fn session_dir(root: impl AsRef<Path>) -> PathBuf {
    root.as_ref()
        .join(format!("session_{}", Local::now().format("%Y%m%d_%H%M%S")))
}

/// CSV log of emitted control changes, one row per change.
pub struct ChangeLog<W: Write> {
    writer: Writer<W>,
    layout: ControlLayout,
    rows: u64,
}

impl ChangeLog<File> {
    /// Creates `changes.csv` in a fresh session directory under `root`.
    pub fn create(root: impl AsRef<Path>, layout: ControlLayout) -> Result<(Self, PathBuf)> {
        let dir = session_dir(root);
        fs::create_dir_all(&dir)?;
        let path = dir.join("changes.csv");
        let file = File::create(&path)?;
        info!("Recording control changes to {}", path.display());
        Ok((Self::new(file, layout), path))
    }
}

impl<W: Write> ChangeLog<W> {
    pub fn new(writer: W, layout: ControlLayout) -> Self {
        Self {
            writer: Writer::from_writer(writer),
            layout,
            rows: 0,
        }
    }

    pub fn record(
        &mut self,
        frame: u64,
        timestamp_ms: u64,
        changes: &[ControlChange],
    ) -> Result<()> {
        for change in changes {
            let (hand, slot, finger) = match self.layout.describe(change.controller) {
                Some((hand, slot)) => (hand.as_str(), slot.kind(), slot.finger().name()),
                None => ("", "", ""),
            };
            self.writer.serialize(ChangeRecord {
                frame,
                timestamp_ms,
                controller: change.controller,
                value: change.value,
                hand,
                slot,
                finger,
            })?;
            self.rows += 1;
        }
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes and hands back the underlying writer.
    pub fn finish(self) -> Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error().into())
    }
}
