//! Cancellable deferred work.
//!
//! A [`DeferredWork`] is a deadline plus a running flag. A runner task waits
//! for the deadline, claims the work with [`DeferredWork::begin`], runs the
//! job and calls [`DeferredWork::finish`]. [`DeferredWork::cancel_sync`]
//! clears the deadline and waits for an in-flight job to finish.

use core::cell::Cell;

use embassy_futures::select::{select, Either};
use embassy_sync::{
    blocking_mutex::{raw::CriticalSectionRawMutex, Mutex as BlockingMutex},
    signal::Signal,
};
use embassy_time::{Instant, Timer};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct WorkState {
    due_ms: Option<u64>,
    running: bool,
    cancelling: bool,
}

pub struct DeferredWork {
    name: &'static str,
    state: BlockingMutex<CriticalSectionRawMutex, Cell<WorkState>>,
    wake: Signal<CriticalSectionRawMutex, ()>,
    done: Signal<CriticalSectionRawMutex, ()>,
}

impl DeferredWork {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            state: BlockingMutex::new(Cell::new(WorkState {
                due_ms: None,
                running: false,
                cancelling: false,
            })),
            wake: Signal::new(),
            done: Signal::new(),
        }
    }

    /// Queues the work unless it is already pending. Returns whether it was queued.
    pub fn schedule(&self, now_ms: u64, delay_ms: u32) -> bool {
        let queued = self.update(|state| {
            if state.cancelling || state.due_ms.is_some() {
                return false;
            }
            state.due_ms = Some(now_ms.saturating_add(delay_ms as u64));
            true
        });
        if queued {
            self.wake.signal(());
        }
        queued
    }

    /// Moves the deadline, queueing the work if it was idle.
    pub fn rearm(&self, now_ms: u64, delay_ms: u32) -> bool {
        let armed = self.update(|state| {
            if state.cancelling {
                return false;
            }
            state.due_ms = Some(now_ms.saturating_add(delay_ms as u64));
            true
        });
        if armed {
            self.wake.signal(());
        }
        armed
    }

    pub fn disarm(&self) {
        self.update(|state| state.due_ms = None);
        self.wake.signal(());
    }

    pub fn is_pending(&self) -> bool {
        self.state().due_ms.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.state().running
    }

    pub fn due_ms(&self) -> Option<u64> {
        self.state().due_ms
    }

    /// Claims the work if its deadline has passed.
    pub fn begin(&self, now_ms: u64) -> bool {
        self.update(|state| match state.due_ms {
            Some(due) if due <= now_ms && !state.cancelling => {
                state.due_ms = None;
                state.running = true;
                true
            }
            _ => false,
        })
    }

    pub fn finish(&self) {
        self.update(|state| state.running = false);
        self.done.signal(());
    }

    /// Drops any pending deadline and waits until an in-flight run has finished.
    pub async fn cancel_sync(&self) {
        self.update(|state| {
            state.cancelling = true;
            state.due_ms = None;
        });
        self.wake.signal(());

        loop {
            self.done.reset();
            if !self.state().running {
                break;
            }
            self.done.wait().await;
        }

        self.update(|state| state.cancelling = false);
        log::debug!("touch: work_cancelled name={}", self.name);
    }

    /// Resolves once the deadline has been reached.
    pub async fn wait_due(&self) {
        loop {
            match self.due_ms() {
                None => self.wake.wait().await,
                Some(due) => {
                    if Instant::now().as_millis() >= due {
                        return;
                    }
                    match select(Timer::at(Instant::from_millis(due)), self.wake.wait()).await {
                        Either::First(()) => return,
                        Either::Second(()) => {}
                    }
                }
            }
        }
    }

    fn state(&self) -> WorkState {
        self.state.lock(Cell::get)
    }

    fn update<R>(&self, f: impl FnOnce(&mut WorkState) -> R) -> R {
        self.state.lock(|cell| {
            let mut state = cell.get();
            let result = f(&mut state);
            cell.set(state);
            result
        })
    }
}
