//! Fixed-capacity circular buffer shared by producers and consumers.
//!
//! Two counting waits track the free and filled slots; a mutex guards only the
//! slot array and its indices. Lock order is always: permit, then slot mutex,
//! release slot mutex, then release the counterpart permit. Nothing blocks
//! while the slot mutex is held.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::ConfigError;
use crate::semaphore::Semaphore;
use crate::signal::ShutdownSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownStrategy {
    /// Close both counting waits. Every blocked call returns `Closed`.
    Close,
    /// Release `producers` free-slot permits and `consumers` filled-slot
    /// permits. Each woken worker sees `running == false` and gives up.
    ReleasePermits { producers: usize, consumers: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Running,
    ShuttingDown,
    Stopped,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Insert<T> {
    /// Stored; `filled` is the occupied slot count right after the write.
    Stored { filled: usize },
    /// Shutdown observed; the item is handed back unwritten.
    Closed(T),
}

#[derive(Debug, PartialEq, Eq)]
pub enum Remove<T> {
    Item { item: T, filled: usize },
    Closed,
}

impl<T> Remove<T> {
    pub fn into_item(self) -> Option<T> {
        match self {
            Remove::Item { item, .. } => Some(item),
            Remove::Closed => None,
        }
    }
}

#[derive(Debug)]
struct Ring<T> {
    storage: Vec<Option<T>>,
    head: usize,
    tail: usize,
    len: usize,
}

impl<T> Ring<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: std::iter::repeat_with(|| None).take(capacity).collect(),
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    fn push(&mut self, item: T) -> usize {
        let capacity = self.storage.len();
        assert!(self.len < capacity, "filled count would exceed capacity {capacity}");
        let slot = &mut self.storage[self.tail];
        assert!(slot.is_none(), "slot {} still holds an unread item", self.tail);
        *slot = Some(item);
        self.tail = (self.tail + 1) % capacity;
        self.len += 1;
        self.len
    }

    fn pop(&mut self) -> (T, usize) {
        let head = self.head;
        let item = self.storage[head]
            .take()
            .unwrap_or_else(|| panic!("slot {head} is empty, filled count would go negative"));
        self.head = (head + 1) % self.storage.len();
        self.len -= 1;
        (item, self.len)
    }
}

#[derive(Debug)]
pub struct BoundedBuffer<T> {
    capacity: usize,
    slots: Mutex<Ring<T>>,
    empty: Semaphore,
    filled: Semaphore,
    running: AtomicBool,
    stopped: AtomicBool,
    strategy: ShutdownStrategy,
    signal: ShutdownSignal,
}

impl<T> BoundedBuffer<T> {
    pub fn new(capacity: usize, strategy: ShutdownStrategy) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            slots: Mutex::new(Ring::with_capacity(capacity)),
            empty: Semaphore::new(capacity),
            filled: Semaphore::new(0),
            running: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
            strategy,
            signal: ShutdownSignal::new(),
        })
    }

    // A poisoned slot lock means a worker died mid-write: the ring can no
    // longer be trusted, so every other worker goes down with it.
    fn lock(&self) -> MutexGuard<'_, Ring<T>> {
        self.slots
            .lock()
            .unwrap_or_else(|_| panic!("bounded buffer corrupted by a panicking worker"))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn state(&self) -> BufferState {
        if self.is_running() {
            BufferState::Running
        } else if self.stopped.load(Ordering::Acquire) {
            BufferState::Stopped
        } else {
            BufferState::ShuttingDown
        }
    }

    /// Free-slot permits right now. Advisory only: a zero means the next
    /// `insert` is likely to wait.
    pub fn available_empty(&self) -> usize {
        self.empty.available_permits()
    }

    pub fn available_filled(&self) -> usize {
        self.filled.available_permits()
    }

    /// Writes `item` at the tail, waiting for a free slot if the buffer is full.
    pub fn insert(&self, item: T) -> Insert<T> {
        if !self.is_running() {
            return Insert::Closed(item);
        }
        if self.empty.acquire().is_err() {
            return Insert::Closed(item);
        }

        let filled = {
            let mut ring = self.lock();
            // running only flips under this lock, so nothing is written after it does
            if !self.is_running() {
                return Insert::Closed(item);
            }
            ring.push(item)
        };

        self.filled.release();
        Insert::Stored { filled }
    }

    /// Reads the item at the head, waiting for one if the buffer is empty.
    pub fn remove(&self) -> Remove<T> {
        if !self.is_running() {
            return Remove::Closed;
        }
        if self.filled.acquire().is_err() {
            return Remove::Closed;
        }

        let (item, filled) = {
            let mut ring = self.lock();
            if !self.is_running() {
                return Remove::Closed;
            }
            ring.pop()
        };

        self.empty.release();
        Remove::Item { item, filled }
    }

    /// Stops the buffer and frees every blocked worker. Returns `false` if the
    /// buffer was already shut down.
    pub fn shutdown(&self) -> bool {
        let was_running = {
            let _ring = self.lock();
            self.running.swap(false, Ordering::AcqRel)
        };
        if !was_running {
            return false;
        }

        match self.strategy {
            ShutdownStrategy::Close => {
                self.empty.close();
                self.filled.close();
            }
            ShutdownStrategy::ReleasePermits {
                producers,
                consumers,
            } => {
                self.empty.release_n(producers);
                self.filled.release_n(consumers);
            }
        }
        self.signal.trigger();
        true
    }

    /// Pauses the calling worker. Returns `false` if shutdown began meanwhile.
    pub fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return self.is_running();
        }
        !self.signal.wait_timeout(duration) && self.is_running()
    }

    /// Takes whatever is left and moves the buffer to `Stopped`. Only the
    /// coordinator calls this, after every worker has been joined. Does
    /// nothing while the buffer is still running.
    pub(crate) fn drain(&self) -> Vec<T> {
        if self.is_running() {
            return Vec::new();
        }
        let mut ring = self.lock();
        let mut leftover = Vec::with_capacity(ring.len);
        while ring.len > 0 {
            leftover.push(ring.pop().0);
        }
        self.stopped.store(true, Ordering::Release);
        leftover
    }
}
