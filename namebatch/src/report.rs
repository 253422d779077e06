//! Progress events and the sinks that consume them.
//!
//! The pipeline never talks to a UI. It pushes typed `ProgressEvent`s into a
//! `ReportSink`; a CLI progress bar, a GUI or a test collects them on the other side.
//! Workers report from several threads at once, so events for one phase can arrive
//! out of order. `ProgressTally` folds them commutatively.
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

use crate::results::BatchSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Search,
    Process,
    Delete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Search => "search",
            Phase::Process => "process",
            Phase::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Starting {
        queries: usize,
    },
    Progress {
        phase: Phase,
        /// Completion count at the time this item finished
        completed: usize,
        total: usize,
        /// The query text or file path that just finished
        item: String,
        failed: bool,
    },
    /// Matches survived filtering, the action phase (if any) starts next
    Found {
        total_found: usize,
    },
    Finished {
        summary: BatchSummary,
    },
}

/// Receives progress events from pipeline workers.
///
/// Implementations are called from worker threads and must return quickly.
pub trait ReportSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn report(&self, _event: ProgressEvent) {}
}

/// Forwards events over an unbounded channel, so a slow consumer never stalls a worker
#[derive(Debug)]
pub struct ChannelSink {
    sender: Mutex<Sender<ProgressEvent>>,
}

impl ChannelSink {
    pub fn new(sender: Sender<ProgressEvent>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }
}

impl ReportSink for ChannelSink {
    fn report(&self, event: ProgressEvent) {
        // A dropped receiver means nobody is listening any more
        if let Ok(sender) = self.sender.lock() {
            let _ = sender.send(event);
        }
    }
}

/// Creates a connected sink/receiver pair
pub fn channel() -> (ChannelSink, Receiver<ProgressEvent>) {
    let (tx, rx) = mpsc::channel();
    (ChannelSink::new(tx), rx)
}

/// Collects events in memory, mostly useful in tests
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ReportSink for CollectingSink {
    fn report(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Per-phase counters as seen by a consumer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTally {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

/// Order-independent accumulation of progress events
#[derive(Debug, Clone, Default)]
pub struct ProgressTally {
    phases: HashMap<Phase, PhaseTally>,
    pub queries: usize,
    pub total_found: Option<usize>,
    pub summary: Option<BatchSummary>,
}

impl ProgressTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Starting { queries } => self.queries = *queries,
            ProgressEvent::Progress {
                phase,
                total,
                failed,
                ..
            } => {
                let tally = self.phases.entry(*phase).or_default();
                tally.completed += 1;
                tally.total = tally.total.max(*total);
                if *failed {
                    tally.failed += 1;
                }
            }
            ProgressEvent::Found { total_found } => self.total_found = Some(*total_found),
            ProgressEvent::Finished { summary } => self.summary = Some(summary.clone()),
        }
    }

    pub fn phase(&self, phase: Phase) -> PhaseTally {
        self.phases.get(&phase).copied().unwrap_or_default()
    }
}
