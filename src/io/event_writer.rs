//! Chunked CSV event log writer (spec.md §6 "Event log (persisted form)"),
//! grounded on `fredshone/mobslim`'s `CSVChunkWriter` (buffer-then-flush by
//! chunk size) and the teacher's own use of the `csv` crate in
//! `src/bin/act_starts.rs`.

use std::path::Path;

use crate::error::ConfigResult;
use crate::plan::{Asset, Instruction, InstructionKind};
use crate::sim::events::Event;

const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Buffers `(time, agent, kind, aux, asset, min_duration)` rows and
/// flushes them to a CSV file in append-mode chunks, matching
/// `CSVChunkWriter`'s `add`/`write` split.
pub struct EventCsvWriter {
    writer: csv::Writer<std::fs::File>,
    chunk: Vec<Event>,
    chunk_size: usize,
}

impl EventCsvWriter {
    pub fn create(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::with_chunk_size(path, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(path: impl AsRef<Path>, chunk_size: usize) -> ConfigResult<Self> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["time", "agent", "kind", "aux", "asset", "min_duration"])?;
        Ok(EventCsvWriter { writer, chunk: Vec::with_capacity(chunk_size), chunk_size })
    }

    pub fn add(&mut self, event: Event) -> ConfigResult<()> {
        self.chunk.push(event);
        if self.chunk.len() >= self.chunk_size {
            self.flush_chunk()?;
        }
        Ok(())
    }

    pub fn add_all(&mut self, events: impl IntoIterator<Item = Event>) -> ConfigResult<()> {
        for event in events {
            self.add(event)?;
        }
        Ok(())
    }

    /// Writes any buffered rows and flushes the underlying file, matching
    /// `CSVChunkWriter::finish`.
    pub fn finish(mut self) -> ConfigResult<()> {
        self.flush_chunk()?;
        self.writer.flush()?;
        Ok(())
    }

    fn flush_chunk(&mut self) -> ConfigResult<()> {
        for event in self.chunk.drain(..) {
            let (kind, aux, asset) = encode_instruction(&event.instruction);
            self.writer.write_record([
                event.time.to_string(),
                event.agent.to_string(),
                kind.to_string(),
                aux,
                asset,
                event.instruction.min_duration.to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

fn encode_instruction(instruction: &Instruction) -> (&'static str, String, String) {
    let kind = match instruction.kind {
        InstructionKind::Sos => "sos",
        InstructionKind::EnterActivity => "enter_activity",
        InstructionKind::ExitActivity => "exit_activity",
        InstructionKind::EnterLink => "enter_link",
        InstructionKind::ExitLink => "exit_link",
        InstructionKind::Eos => "eos",
    };
    let aux = instruction.aux.as_ref().map(|a| a.as_str().to_string()).unwrap_or_default();
    let asset = match instruction.asset {
        Asset::Node(n) => n.0.to_string(),
        Asset::Edge(e) => e.0.to_string(),
        Asset::None => String::new(),
    };
    (kind, aux, asset)
}
