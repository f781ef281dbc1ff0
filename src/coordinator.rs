//! Owns one run: starts the workers, lets them run for the configured time,
//! shuts the buffer down and waits for every worker with a bounded deadline.

use crossbeam::channel::{unbounded, Receiver};
use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::buffer::{BoundedBuffer, ShutdownStrategy};
use crate::config::{RunConfig, StrategyKind};
use crate::error::{ConfigError, RunError};
use crate::observer::{ConsoleObserver, Event, Observer};
use crate::worker::{Item, Role, Worker, WorkerId, WorkerReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub produced: u64,
    pub consumed: u64,
    /// Items still in the buffer at shutdown; never handed to a consumer.
    pub leftover: Vec<Item>,
    pub workers: Vec<WorkerReport>,
}

impl RunReport {
    /// No item lost or duplicated: every insert is either removed or left over.
    pub fn is_conserved(&self) -> bool {
        self.produced == self.consumed + self.leftover.len() as u64
    }
}

pub struct Coordinator {
    config: RunConfig,
    observer: Arc<dyn Observer>,
}

impl Coordinator {
    pub fn new(config: RunConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            observer: Arc::new(ConsoleObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    fn strategy(&self) -> ShutdownStrategy {
        match self.config.strategy {
            StrategyKind::Close => ShutdownStrategy::Close,
            StrategyKind::ReleasePermits => ShutdownStrategy::ReleasePermits {
                producers: self.config.producers,
                consumers: self.config.consumers,
            },
        }
    }

    pub fn run(&self) -> Result<RunReport, RunError> {
        let buffer = Arc::new(BoundedBuffer::new(self.config.capacity, self.strategy())?);
        let (tx, rx) = unbounded();

        let ids = (1..=self.config.producers)
            .map(|i| WorkerId::new(Role::Producer, i))
            .chain((1..=self.config.consumers).map(|i| WorkerId::new(Role::Consumer, i)));

        let mut handles = Vec::with_capacity(self.config.producers + self.config.consumers);
        for id in ids {
            let worker = Worker::new(
                id,
                Arc::clone(&buffer),
                Arc::clone(&self.observer),
                self.config.max_sleep(),
            )
            .with_reports(tx.clone());

            let spawned = thread::Builder::new()
                .name(id.to_string())
                .spawn(move || {
                    worker.run();
                });
            match spawned {
                Ok(handle) => handles.push((id, handle)),
                Err(err) => {
                    // Already-started workers see the shutdown and exit on their own.
                    buffer.shutdown();
                    return Err(RunError::Spawn(err));
                }
            }
        }
        drop(tx);

        thread::sleep(self.config.run_duration());

        self.observer.on_event(&Event::ShutdownStarted);
        buffer.shutdown();

        let reports = self.collect_reports(&rx, handles.len());
        let reported: HashSet<WorkerId> = reports.iter().map(|r| r.id).collect();
        let stuck: Vec<WorkerId> = handles
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| !reported.contains(id))
            .collect();
        if !stuck.is_empty() {
            // Unreported handles are dropped, which detaches those threads.
            return Err(RunError::JoinTimeout { stuck });
        }

        join_all(handles)?;

        let leftover = buffer.drain();
        let produced = sum_operations(&reports, Role::Producer);
        let consumed = sum_operations(&reports, Role::Consumer);
        self.observer.on_event(&Event::AllExited);

        Ok(RunReport {
            produced,
            consumed,
            leftover,
            workers: reports,
        })
    }

    fn collect_reports(&self, rx: &Receiver<WorkerReport>, expected: usize) -> Vec<WorkerReport> {
        let deadline = Instant::now() + self.config.join_timeout();
        let mut reports = Vec::with_capacity(expected);
        while reports.len() < expected {
            match rx.recv_deadline(deadline) {
                Ok(report) => reports.push(report),
                Err(_) => break,
            }
        }
        reports.sort_by_key(|r| r.id);
        reports
    }
}

fn join_all(handles: Vec<(WorkerId, JoinHandle<()>)>) -> Result<(), RunError> {
    let mut first_panic = None;
    for (id, handle) in handles {
        if let Err(payload) = handle.join() {
            first_panic.get_or_insert(RunError::WorkerPanicked {
                worker: id,
                message: panic_message(payload.as_ref()),
            });
        }
    }
    first_panic.map_or(Ok(()), Err)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn sum_operations(reports: &[WorkerReport], role: Role) -> u64 {
    reports
        .iter()
        .filter(|r| r.id.role == role)
        .map(|r| r.operations)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{NullObserver, Recorder};
    use crossbeam::channel::Sender;

    /// Parks a producer inside `on_event` for good once it has stored an item.
    struct StallOnProduced {
        gate: Receiver<()>,
        _never_sent: Sender<()>,
    }

    impl StallOnProduced {
        fn new() -> Self {
            let (tx, rx) = unbounded();
            Self {
                gate: rx,
                _never_sent: tx,
            }
        }
    }

    impl Observer for StallOnProduced {
        fn on_event(&self, event: &Event) {
            if matches!(event, Event::Produced { .. }) {
                let _ = self.gate.recv();
            }
        }
    }

    struct PanicOnProduced;

    impl Observer for PanicOnProduced {
        fn on_event(&self, event: &Event) {
            if matches!(event, Event::Produced { .. }) {
                panic!("observer rejected item");
            }
        }
    }

    fn quick_config(capacity: usize, producers: usize, consumers: usize) -> RunConfig {
        RunConfig {
            capacity,
            producers,
            consumers,
            run_duration_ms: 100,
            max_sleep_ms: 5,
            join_timeout_ms: 5_000,
            strategy: StrategyKind::Close,
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RunConfig {
            capacity: 0,
            ..RunConfig::default()
        };
        assert!(matches!(
            Coordinator::new(config),
            Err(ConfigError::ZeroCapacity)
        ));
    }

    #[test]
    fn test_no_workers_is_a_clean_run() {
        let report = Coordinator::new(quick_config(3, 0, 0))
            .unwrap()
            .with_observer(Arc::new(NullObserver))
            .run()
            .unwrap();
        assert_eq!(report.produced, 0);
        assert_eq!(report.consumed, 0);
        assert!(report.workers.is_empty());
        assert!(report.is_conserved());
    }

    #[test]
    fn test_run_reports_every_worker_and_conserves_items() {
        let recorder = Arc::new(Recorder::new());
        let report = Coordinator::new(quick_config(2, 3, 2))
            .unwrap()
            .with_observer(recorder.clone())
            .run()
            .unwrap();

        assert_eq!(report.workers.len(), 5);
        assert!(report.workers.iter().all(|w| !w.panicked));
        assert!(report.is_conserved());
        assert_eq!(report.produced as usize, recorder.produced());
        assert_eq!(report.consumed as usize, recorder.consumed());

        let events = recorder.events();
        assert_eq!(events.last(), Some(&Event::AllExited));
        assert!(events.contains(&Event::ShutdownStarted));
    }

    #[test]
    fn test_release_permits_strategy_also_terminates() {
        let config = RunConfig {
            strategy: StrategyKind::ReleasePermits,
            ..quick_config(1, 4, 4)
        };
        let report = Coordinator::new(config)
            .unwrap()
            .with_observer(Arc::new(NullObserver))
            .run()
            .unwrap();
        assert_eq!(report.workers.len(), 8);
        assert!(report.is_conserved());
    }

    #[test]
    fn test_stuck_worker_surfaces_as_join_timeout() {
        let config = RunConfig {
            run_duration_ms: 50,
            max_sleep_ms: 0,
            join_timeout_ms: 200,
            ..quick_config(2, 1, 0)
        };
        let started = Instant::now();
        let result = Coordinator::new(config)
            .unwrap()
            .with_observer(Arc::new(StallOnProduced::new()))
            .run();

        match result {
            Err(RunError::JoinTimeout { stuck }) => {
                assert_eq!(stuck, vec![WorkerId::new(Role::Producer, 1)]);
            }
            other => panic!("expected a join timeout, got {other:?}"),
        }
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_worker_panic_fails_the_run() {
        let config = RunConfig {
            max_sleep_ms: 0,
            ..quick_config(2, 1, 0)
        };
        let result = Coordinator::new(config)
            .unwrap()
            .with_observer(Arc::new(PanicOnProduced))
            .run();

        match result {
            Err(RunError::WorkerPanicked { worker, message }) => {
                assert_eq!(worker, WorkerId::new(Role::Producer, 1));
                assert_eq!(message, "observer rejected item");
            }
            other => panic!("expected a worker panic, got {other:?}"),
        }
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("slot 3 is empty");
        assert_eq!(panic_message(payload.as_ref()), "slot 3 is empty");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_sum_operations_by_role() {
        let reports = vec![
            WorkerReport {
                id: WorkerId::new(Role::Producer, 1),
                operations: 4,
                panicked: false,
            },
            WorkerReport {
                id: WorkerId::new(Role::Producer, 2),
                operations: 3,
                panicked: false,
            },
            WorkerReport {
                id: WorkerId::new(Role::Consumer, 1),
                operations: 5,
                panicked: false,
            },
        ];
        assert_eq!(sum_operations(&reports, Role::Producer), 7);
        assert_eq!(sum_operations(&reports, Role::Consumer), 5);
    }
}
