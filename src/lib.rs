//! Bounded-buffer producer/consumer engine.
//!
//! A fixed-capacity circular buffer is shared by producer and consumer
//! threads. Counting waits provide backpressure, a mutex guards the slots,
//! and a cooperative shutdown frees every blocked worker without losing or
//! corrupting buffered items.

pub mod buffer;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod observer;
pub mod semaphore;
pub mod signal;
pub mod worker;

pub use buffer::{BoundedBuffer, BufferState, Insert, Remove, ShutdownStrategy};
pub use config::{RunConfig, StrategyKind};
pub use coordinator::{Coordinator, RunReport};
pub use error::{ConfigError, RunError};
pub use observer::{ConsoleObserver, Event, NullObserver, Observer, Recorder};
pub use worker::{Item, Role, Worker, WorkerId, WorkerReport};
