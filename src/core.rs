//! Core server functionality
//!
//! This module provides:
//! - Tick constants and conversions
//! - Shutdown state shared by the console and the tick loop
//! - The tick scheduler that runs delayed tasks on a single logical worker

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Default scheduler rate in ticks per second
pub const DEFAULT_TICK_RATE: u32 = 20;

/// Convert a ticks-per-second rate to the duration of one tick.
///
/// A rate of zero is treated as one tick per second.
pub fn tick_period(tick_rate: u32) -> Duration {
    Duration::from_secs(1) / tick_rate.max(1)
}

/// Process lifecycle state
pub struct ServerState {
    /// Flag indicating if shutdown has been requested
    pub shutdown_requested: bool,
}

impl ServerState {
    pub fn new() -> Self {
        ServerState {
            shutdown_requested: false,
        }
    }

    pub fn request_shutdown(&mut self) {
        self.shutdown_requested = true;
    }

    pub fn should_shutdown(&self) -> bool {
        self.shutdown_requested
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe server state shared by the console and the tick loop
pub type SharedServerState = Arc<Mutex<ServerState>>;

pub fn create_server_state() -> SharedServerState {
    Arc::new(Mutex::new(ServerState::new()))
}

/// Lock a std mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A task queued against the scheduler.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

struct Timer {
    due: u64,
    seq: u64,
    task: Task,
}

// BinaryHeap is a max-heap; order so the earliest (due, seq) pops first.
impl Ord for Timer {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (other.due, other.seq).cmp(&(self.due, self.seq))
    }
}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Timer {}

struct TimerHeap {
    now: u64,
    next_seq: u64,
    heap: BinaryHeap<Timer>,
}

/// Heap-based tick scheduler.
///
/// Tasks are queued with a delay in ticks and run by whoever drives `tick()`,
/// normally [`run`]. There is no cancellation: once queued, a task fires.
pub struct Scheduler {
    inner: Mutex<TimerHeap>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TimerHeap {
                now: 0,
                next_seq: 0,
                heap: BinaryHeap::new(),
            }),
        }
    }

    /// Queue `task` to run `ticks` ticks from now (at least one).
    pub fn run_delayed<F>(&self, ticks: u64, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut inner = lock(&self.inner);
        let due = inner.now + ticks.max(1);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(Timer {
            due,
            seq,
            task: Box::new(task),
        });
    }

    /// Advance one tick and run every task that has come due.
    ///
    /// Returns the number of tasks run. Tasks run with the queue unlocked so
    /// they may schedule follow-up work.
    pub fn tick(&self) -> usize {
        let due = {
            let mut inner = lock(&self.inner);
            inner.now += 1;
            let now = inner.now;
            let mut due = Vec::new();
            while inner.heap.peek().is_some_and(|t| t.due <= now) {
                if let Some(timer) = inner.heap.pop() {
                    due.push(timer.task);
                }
            }
            due
        };
        let n = due.len();
        for task in due {
            task();
        }
        n
    }

    /// Ticks elapsed since the scheduler was created.
    pub fn current_tick(&self) -> u64 {
        lock(&self.inner).now
    }

    /// Number of tasks still waiting.
    pub fn pending(&self) -> usize {
        lock(&self.inner).heap.len()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive `scheduler` at a fixed period until shutdown is requested.
pub async fn run(scheduler: Arc<Scheduler>, state: SharedServerState, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if lock(&state).should_shutdown() {
            break;
        }
        let ran = scheduler.tick();
        if ran > 0 {
            tracing::trace!("[core] [tick] tick={} ran={}", scheduler.current_tick(), ran);
        }
    }
    tracing::info!("[core] [stopped] scheduler stopped at tick={}", scheduler.current_tick());
}
