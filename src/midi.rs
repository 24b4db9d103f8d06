// src/midi.rs - Control-change output over midir
use midir::{MidiOutput, MidiOutputConnection};
use tracing::info;

use crate::changes::ControlChange;
use crate::error::{HandiError, Result};

const CLIENT_NAME: &str = "handi";
const CONTROL_CHANGE: u8 = 0xB0;

/// Destination for control changes.
pub trait ControlSink {
    fn send(&mut self, change: ControlChange) -> Result<()>;
}

/// Collects changes in memory.
impl ControlSink for Vec<ControlChange> {
    fn send(&mut self, change: ControlChange) -> Result<()> {
        self.push(change);
        Ok(())
    }
}

impl<S: ControlSink + ?Sized> ControlSink for Box<S> {
    fn send(&mut self, change: ControlChange) -> Result<()> {
        (**self).send(change)
    }
}

/// Raw bytes of a control-change message on `channel`.
pub fn control_change_bytes(channel: u8, change: ControlChange) -> [u8; 3] {
    [
        CONTROL_CHANGE | (channel & 0x0F),
        change.controller & 0x7F,
        change.value & 0x7F,
    ]
}

/// Names of the available MIDI output ports.
pub fn list_ports() -> Result<Vec<String>> {
    let output = MidiOutput::new(CLIENT_NAME).map_err(|e| HandiError::Midi(e.to_string()))?;
    Ok(output
        .ports()
        .iter()
        .map(|port| output.port_name(port).unwrap_or_else(|_| "Unknown".to_string()))
        .collect())
}

/// Sends control changes to a MIDI output port.
pub struct MidiSink {
    conn: MidiOutputConnection,
    channel: u8,
    port_name: String,
}

impl MidiSink {
    /// Connects to the first port whose name contains `port_filter`
    /// (case-insensitive), or to the first port when no filter is given.
    pub fn open(port_filter: Option<&str>, channel: u8) -> Result<Self> {
        if channel > 0x0F {
            return Err(HandiError::InvalidChannel(channel));
        }

        let output = MidiOutput::new(CLIENT_NAME).map_err(|e| HandiError::Midi(e.to_string()))?;
        let ports = output.ports();
        if ports.is_empty() {
            return Err(HandiError::NoMidiPorts);
        }

        let names: Vec<String> = ports
            .iter()
            .map(|p| output.port_name(p).unwrap_or_else(|_| "Unknown".to_string()))
            .collect();

        let index = match port_filter {
            Some(filter) => {
                let filter = filter.to_lowercase();
                names
                    .iter()
                    .position(|name| name.to_lowercase().contains(&filter))
                    .ok_or_else(|| HandiError::Midi(format!("no MIDI output matching {filter:?}")))?
            }
            None => 0,
        };

        let port_name = names[index].clone();
        info!("Using MIDI output {}", port_name);

        let conn = output
            .connect(&ports[index], "handi-out")
            .map_err(|e| HandiError::Midi(format!("failed to connect to {port_name}: {e}")))?;

        Ok(Self {
            conn,
            channel,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl ControlSink for MidiSink {
    fn send(&mut self, change: ControlChange) -> Result<()> {
        self.conn
            .send(&control_change_bytes(self.channel, change))
            .map_err(|e| HandiError::Midi(e.to_string()))
    }
}

/// Dry-run sink: logs changes instead of sending them.
#[derive(Debug, Default)]
pub struct LogSink {
    sent: usize,
}

impl LogSink {
    pub fn sent(&self) -> usize {
        self.sent
    }
}

impl ControlSink for LogSink {
    fn send(&mut self, change: ControlChange) -> Result<()> {
        self.sent += 1;
        info!(controller = change.controller, value = change.value, "control change");
        Ok(())
    }
}
