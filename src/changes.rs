// src/changes.rs - Change sets between successive controller tables
use serde::Serialize;

use crate::controls::ControlValueTable;
use crate::error::Result;
use crate::midi::ControlSink;

/// One outgoing control-change: controller index and value, both 0-127.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ControlChange {
    pub controller: u8,
    pub value: u8,
}

impl ControlChange {
    pub fn new(controller: u8, value: u8) -> Self {
        Self { controller, value }
    }
}

/// Entries of `new` that are missing from or differ in `previous`, ascending by controller.
///
/// Controllers present only in `previous` produce nothing: the receiver keeps
/// their last value.
pub fn diff(previous: &ControlValueTable, new: &ControlValueTable) -> Vec<ControlChange> {
    new.iter()
        .filter(|&(controller, value)| previous.get(controller) != Some(value))
        .map(|(&controller, &value)| ControlChange::new(controller, value))
        .collect()
}

/// Sends the change set between two tables, in order, and returns what was sent.
pub fn emit<S>(
    sink: &mut S,
    previous: &ControlValueTable,
    new: &ControlValueTable,
) -> Result<Vec<ControlChange>>
where
    S: ControlSink + ?Sized,
{
    let changes = diff(previous, new);
    for change in &changes {
        sink.send(*change)?;
    }
    Ok(changes)
}
