//! Periodic worker that runs a poll callback on a dedicated thread.

use crate::{Error, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Default polling interval (200 ms).
pub const DEFAULT_DELAY_NS: i64 = 200_000_000;

/// Callback invoked once per tick.
pub type PollFn = Box<dyn FnMut() + Send + 'static>;

/// Runs a callback at a configurable interval.
///
/// `suspend` and `resume` are barriers: once `suspend` returns, no callback
/// is running and none will start until the next `resume`.
pub trait PeriodicWorker: Send {
    /// Installs the callback. The worker starts suspended.
    fn init(&mut self, callback: PollFn) -> Result<()>;

    /// Starts invoking the callback.
    fn resume(&self);

    /// Stops invoking the callback, waiting for an in-flight call to finish.
    fn suspend(&self);

    /// Sets the interval between callbacks in nanoseconds.
    fn set_delay(&self, ns: i64);

    /// Stops the worker and releases its resources.
    fn destroy(&mut self);
}

#[derive(Debug)]
struct WorkerState {
    running: bool,
    in_flight: bool,
    exit: bool,
    delay: Duration,
}

struct Shared {
    state: Mutex<WorkerState>,
    changed: Condvar,
}

/// Thread-backed periodic worker.
pub struct ThreadWorker {
    name: String,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

fn panic_message(payload: &Box<dyn Any + Send>) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn delay_from_ns(ns: i64) -> Duration {
    Duration::from_nanos(ns.max(0) as u64)
}

impl ThreadWorker {
    /// Creates a suspended worker whose thread will be named `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            shared: Arc::new(Shared {
                state: Mutex::new(WorkerState {
                    running: false,
                    in_flight: false,
                    exit: false,
                    delay: delay_from_ns(DEFAULT_DELAY_NS),
                }),
                changed: Condvar::new(),
            }),
            thread: None,
        }
    }

    /// Returns the current interval.
    pub fn delay(&self) -> Duration {
        self.shared.state.lock().unwrap().delay
    }

    /// Returns true while the worker is resumed.
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().unwrap().running
    }

    fn run(name: String, shared: Arc<Shared>, mut callback: PollFn) {
        let mut state = shared.state.lock().unwrap();
        loop {
            if state.exit {
                break;
            }
            if !state.running {
                state = shared.changed.wait(state).unwrap();
                continue;
            }

            state.in_flight = true;
            drop(state);
            // A panicking callback must still clear in_flight or suspend never returns
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback())) {
                error!("Worker {} callback panicked: {}", name, panic_message(&payload));
            }
            state = shared.state.lock().unwrap();
            state.in_flight = false;
            shared.changed.notify_all();

            // Sleep until the next tick, picking up delay changes as they arrive
            let last_tick = Instant::now();
            loop {
                if state.exit || !state.running {
                    break;
                }
                let deadline = last_tick + state.delay;
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                state = shared.changed.wait_timeout(state, deadline - now).unwrap().0;
            }
        }
    }
}

impl PeriodicWorker for ThreadWorker {
    fn init(&mut self, callback: PollFn) -> Result<()> {
        if self.thread.is_some() {
            self.destroy();
        }

        {
            let mut state = self.shared.state.lock().unwrap();
            state.exit = false;
            state.running = false;
        }

        let shared = self.shared.clone();
        let name = self.name.clone();
        let thread = std::thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || Self::run(name, shared, callback))
            .map_err(|e| Error::Worker(format!("failed to spawn {}: {}", self.name, e)))?;

        self.thread = Some(thread);
        debug!("Worker {} started", self.name);
        Ok(())
    }

    fn resume(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.running = true;
        self.shared.changed.notify_all();
        debug!("Worker {} resumed", self.name);
    }

    fn suspend(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.running = false;
        self.shared.changed.notify_all();
        let _state = self
            .shared
            .changed
            .wait_while(state, |s| s.in_flight)
            .unwrap();
        debug!("Worker {} suspended", self.name);
    }

    fn set_delay(&self, ns: i64) {
        let mut state = self.shared.state.lock().unwrap();
        state.delay = delay_from_ns(ns);
        self.shared.changed.notify_all();
        debug!("Worker {} delay set to {:?}", self.name, state.delay);
    }

    fn destroy(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.exit = true;
            state.running = false;
            self.shared.changed.notify_all();
        }

        if let Some(thread) = self.thread.take() {
            match thread.join() {
                Ok(()) => info!("Worker {} destroyed", self.name),
                Err(payload) => error!(
                    "Worker {} thread panicked: {}",
                    self.name,
                    panic_message(&payload)
                ),
            }
        }
    }
}

impl Drop for ThreadWorker {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn counting_worker(delay_ms: i64) -> (ThreadWorker, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let ticks = count.clone();
        let mut worker = ThreadWorker::new("test-worker");
        worker.set_delay(delay_ms * 1_000_000);
        worker
            .init(Box::new(move || {
                ticks.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        (worker, count)
    }

    fn wait_for(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn test_starts_suspended() {
        let (mut worker, count) = counting_worker(1);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!worker.is_running());
        worker.destroy();
    }

    #[test]
    fn test_resume_ticks_and_suspend_stops() {
        let (mut worker, count) = counting_worker(1);
        worker.resume();
        assert!(wait_for(|| count.load(Ordering::SeqCst) >= 3));

        worker.suspend();
        let after_suspend = count.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), after_suspend);
        worker.destroy();
    }

    #[test]
    fn test_suspend_waits_for_in_flight_callback() {
        let entered = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let (e, f) = (entered.clone(), finished.clone());

        let mut worker = ThreadWorker::new("slow-worker");
        worker
            .init(Box::new(move || {
                e.store(true, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(50));
                f.store(true, Ordering::SeqCst);
            }))
            .unwrap();
        worker.resume();
        assert!(wait_for(|| entered.load(Ordering::SeqCst)));

        worker.suspend();
        assert!(finished.load(Ordering::SeqCst));
        worker.destroy();
    }

    #[test]
    fn test_suspend_returns_after_panicking_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();

        let mut worker = ThreadWorker::new("panic-worker");
        worker.set_delay(1_000_000);
        worker
            .init(Box::new(move || {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("sensor read exploded");
                }
            }))
            .unwrap();
        worker.resume();

        // The worker keeps ticking after the panic
        assert!(wait_for(|| calls.load(Ordering::SeqCst) >= 2));

        let (tx, rx) = std::sync::mpsc::channel();
        let suspender = std::thread::spawn(move || {
            worker.suspend();
            tx.send(()).unwrap();
            worker
        });
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());

        let mut worker = suspender.join().unwrap();
        assert!(!worker.is_running());
        worker.destroy();
    }

    #[test]
    fn test_set_delay() {
        let mut worker = ThreadWorker::new("delay-worker");
        worker.set_delay(5_000_000);
        assert_eq!(worker.delay(), Duration::from_millis(5));
        worker.set_delay(-1);
        assert_eq!(worker.delay(), Duration::ZERO);
        worker.destroy();
    }

    #[test]
    fn test_long_delay_waits_for_next_tick() {
        let (mut worker, count) = counting_worker(10_000);
        worker.resume();
        assert!(wait_for(|| count.load(Ordering::SeqCst) == 1));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        worker.destroy();
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let (mut worker, _count) = counting_worker(1);
        worker.resume();
        worker.destroy();
        worker.destroy();
        assert!(!worker.is_running());
    }
}
