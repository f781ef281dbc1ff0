//! Producer and consumer loops.
//!
//! A worker runs until it observes shutdown, either as a `Closed` outcome from
//! the buffer or as an interrupted pause. Blocking inside the buffer is the
//! only form of retry. When a `Worker` is dropped, normally or while
//! unwinding, it sends a `WorkerReport` so the coordinator can account for it.

use crossbeam::channel::Sender;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::buffer::{BoundedBuffer, Insert, Remove};
use crate::observer::{Event, Observer};

pub type Item = u32;

/// Producers draw items from `0..ITEM_RANGE`.
pub const ITEM_RANGE: Item = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Producer,
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Producer => write!(f, "Producer"),
            Role::Consumer => write!(f, "Consumer"),
        }
    }
}

/// 1-based worker identity, e.g. `Producer 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId {
    pub role: Role,
    pub index: usize,
}

impl WorkerId {
    pub fn new(role: Role, index: usize) -> Self {
        Self { role, index }
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.role, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub id: WorkerId,
    /// Successful inserts for a producer, removes for a consumer.
    pub operations: u64,
    pub panicked: bool,
}

pub struct Worker {
    id: WorkerId,
    buffer: Arc<BoundedBuffer<Item>>,
    observer: Arc<dyn Observer>,
    max_sleep: Duration,
    rng: StdRng,
    operations: u64,
    reports: Option<Sender<WorkerReport>>,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        buffer: Arc<BoundedBuffer<Item>>,
        observer: Arc<dyn Observer>,
        max_sleep: Duration,
    ) -> Self {
        Self {
            id,
            buffer,
            observer,
            max_sleep,
            rng: StdRng::from_entropy(),
            operations: 0,
            reports: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_reports(mut self, reports: Sender<WorkerReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Runs the loop for this worker's role and returns the number of
    /// successful operations.
    pub fn run(mut self) -> u64 {
        match self.id.role {
            Role::Producer => self.produce(),
            Role::Consumer => self.consume(),
        }
        self.operations
    }

    fn produce(&mut self) {
        while self.buffer.is_running() {
            let item = self.rng.gen_range(0..ITEM_RANGE);
            if self.buffer.available_empty() == 0 {
                self.observer.on_event(&Event::BufferFull { worker: self.id });
            }
            match self.buffer.insert(item) {
                Insert::Stored { filled } => {
                    self.operations += 1;
                    self.observer.on_event(&Event::Produced {
                        worker: self.id,
                        item,
                        filled,
                    });
                }
                Insert::Closed(_) => break,
            }
            if !self.pause() {
                break;
            }
        }
    }

    fn consume(&mut self) {
        while self.buffer.is_running() {
            if self.buffer.available_filled() == 0 {
                self.observer.on_event(&Event::BufferEmpty { worker: self.id });
            }
            match self.buffer.remove() {
                Remove::Item { item, filled } => {
                    self.operations += 1;
                    self.observer.on_event(&Event::Consumed {
                        worker: self.id,
                        item,
                        filled,
                    });
                }
                Remove::Closed => break,
            }
            if !self.pause() {
                break;
            }
        }
    }

    fn pause(&mut self) -> bool {
        let max_ms = u64::try_from(self.max_sleep.as_millis()).unwrap_or(u64::MAX);
        let sleep = Duration::from_millis(self.rng.gen_range(0..=max_ms));
        self.buffer.pause(sleep)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let panicked = thread::panicking();
        if !panicked {
            self.observer.on_event(&Event::WorkerExited {
                worker: self.id,
                operations: self.operations,
            });
        }
        if let Some(reports) = self.reports.take() {
            // The coordinator may have given up on us already.
            let _ = reports.send(WorkerReport {
                id: self.id,
                operations: self.operations,
                panicked,
            });
        }
    }
}
