//! One-shot transfer of the container record through the control FIFO.
//!
//! Opening a FIFO blocks until the other end is opened too, which is the
//! only rendezvous between master and init: [`send`] cannot complete before
//! a reader has arrived, and [`receive`] does not return before the writer
//! has closed. Each call carries exactly one message and closes its end on
//! every exit path. Neither side has a timeout.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tinybox_common::error::{Direction, Result, TinyboxError};
use tinybox_common::types::ContainerRecord;

fn handoff_error(direction: Direction, pipe: &Path, detail: impl std::fmt::Display) -> TinyboxError {
    TinyboxError::Handoff {
        direction,
        message: format!("{}: {detail}", pipe.display()),
    }
}

/// Writes `record` into the FIFO at `pipe`, blocking until a reader opens it.
///
/// # Errors
///
/// Returns [`TinyboxError::Handoff`] with [`Direction::Write`] if the pipe
/// cannot be opened or the record cannot be written.
pub fn send(pipe: &Path, record: &ContainerRecord) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .open(pipe)
        .map_err(|e| handoff_error(Direction::Write, pipe, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, record)
        .map_err(|e| handoff_error(Direction::Write, pipe, e))?;
    writer
        .write_all(b"\n")
        .and_then(|()| writer.flush())
        .map_err(|e| handoff_error(Direction::Write, pipe, e))?;
    tracing::debug!(pipe = %pipe.display(), name = %record.name, "container record sent");
    Ok(())
}

/// Reads one record from the FIFO at `pipe`, blocking until a writer opens it.
///
/// # Errors
///
/// Returns [`TinyboxError::Handoff`] with [`Direction::Read`] if the pipe
/// cannot be opened or the message does not decode.
pub fn receive(pipe: &Path) -> Result<ContainerRecord> {
    let file = File::open(pipe).map_err(|e| handoff_error(Direction::Read, pipe, e))?;
    let record: ContainerRecord = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| handoff_error(Direction::Read, pipe, format!("decode: {e}")))?;
    tracing::debug!(pipe = %pipe.display(), name = %record.name, "container record received");
    Ok(record)
}
