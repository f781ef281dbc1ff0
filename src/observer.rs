use colored::Colorize;
use std::sync::{Mutex, PoisonError};

use crate::worker::{Item, WorkerId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Produced {
        worker: WorkerId,
        item: Item,
        filled: usize,
    },
    Consumed {
        worker: WorkerId,
        item: Item,
        filled: usize,
    },
    /// The producer found no free slot and is about to wait.
    BufferFull { worker: WorkerId },
    /// The consumer found no filled slot and is about to wait.
    BufferEmpty { worker: WorkerId },
    WorkerExited { worker: WorkerId, operations: u64 },
    ShutdownStarted,
    AllExited,
}

pub trait Observer: Send + Sync {
    fn on_event(&self, event: &Event);
}

/// Prints every event to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleObserver;

impl Observer for ConsoleObserver {
    fn on_event(&self, event: &Event) {
        match event {
            Event::Produced { worker, item, filled } => {
                println!(
                    "{} produced: {} {}",
                    worker,
                    item.to_string().green(),
                    format!("[{filled} filled]").dimmed()
                );
            }
            Event::Consumed { worker, item, filled } => {
                println!(
                    "{} consumed: {} {}",
                    worker,
                    item.to_string().cyan(),
                    format!("[{filled} filled]").dimmed()
                );
            }
            Event::BufferFull { worker } => {
                println!("{}", format!("Buffer full. {worker} waiting...").yellow());
            }
            Event::BufferEmpty { worker } => {
                println!("{}", format!("Buffer empty. {worker} waiting...").yellow());
            }
            Event::WorkerExited { worker, operations } => {
                println!("{}", format!("{worker} exited after {operations} operations.").dimmed());
            }
            Event::ShutdownStarted => println!("{}", "Main thread stopping threads...".bold()),
            Event::AllExited => println!("{}", "All threads exited cleanly.".green().bold()),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn on_event(&self, _event: &Event) {}
}

/// Keeps every event in arrival order.
#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|&event| predicate(event))
            .count()
    }

    pub fn produced(&self) -> usize {
        self.count(|event| matches!(event, Event::Produced { .. }))
    }

    pub fn consumed(&self) -> usize {
        self.count(|event| matches!(event, Event::Consumed { .. }))
    }
}

impl Observer for Recorder {
    fn on_event(&self, event: &Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
