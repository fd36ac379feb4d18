// Copyright 2026 The Kestrel Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shared throttling state and the types the controllers decide with.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Default moving-average window, in samples.
pub const DEFAULT_WINDOW_SIZE: usize = 3;

/// Default periodic driver interval, in microseconds.
pub const DEFAULT_PERIOD_MICROS: u64 = 1_000_000;

/// What a throughput controller optimizes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationCriteria {
    /// Maximize completed calls per window.
    MaximizeThroughput,
    /// Maximize accumulated time per window (useful work).
    MaximizeAccumulated,
    /// Minimize accumulated time per window (overhead).
    MinimizeAccumulated,
}

/// The most recent decision a throughput controller committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LastAction {
    /// No decision taken yet.
    Initial,
    /// The baseline measurement was just captured.
    Baseline,
    /// The cap was raised.
    Increase,
    /// The cap was lowered.
    Decrease,
    /// Reserved: the decision logic never stores this variant; when neither
    /// hysteresis branch fires the previous action stands.
    NoChange,
}

/// An error from the throttling control API.
#[derive(Debug, Clone)]
pub enum ThrottleError {
    /// The configuration is unusable (bad bounds, missing target identity).
    Configuration(String),
    /// An I/O failure while opening or writing the coordinator log.
    Io(String),
}

impl Display for ThrottleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThrottleError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            ThrottleError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for ThrottleError {}

/// A specialized `Result` type for throttling control operations.
pub type ThrottleResult<T> = Result<T, ThrottleError>;

/// Sink for per-round hill-climbing records.
///
/// Implemented by the telemetry layer; only the coordinating process gets a
/// sink wired in. Appends must never block the periodic path beyond a
/// buffered write.
pub trait CapLogSink: Send + Sync {
    /// Opens the sink. Idempotent.
    fn open(&self) -> ThrottleResult<()>;

    /// Appends one `index \t best_evaluation \t best_cap` record.
    fn append(&self, index: u64, best_evaluation: f64, best_cap: usize);

    /// Flushes and closes the sink. Idempotent; appends afterwards are
    /// dropped.
    fn close(&self);
}

/// Process-wide throttling state shared between the controllers and the
/// scheduling path.
///
/// Exactly one controller stream writes the cap; the scheduling path reads
/// it concurrently with no further synchronization. All accesses are relaxed
/// atomics: a reader may observe a value up to one periodic tick stale,
/// which the scheduler tolerates by design.
#[derive(Debug)]
pub struct ThrottleState {
    cap: AtomicUsize,
    min_threads: usize,
    max_threads: usize,
    throttling_active: AtomicBool,
    finalized: AtomicBool,
}

impl ThrottleState {
    /// Creates the shared state with the cap at `max_threads`.
    ///
    /// Bounds are fixed for the lifetime of the state; callers validate them
    /// (`1 ≤ min_threads ≤ max_threads`) before construction.
    pub fn new(min_threads: usize, max_threads: usize) -> Self {
        Self {
            cap: AtomicUsize::new(max_threads),
            min_threads,
            max_threads,
            throttling_active: AtomicBool::new(false),
            finalized: AtomicBool::new(false),
        }
    }

    /// Current thread cap.
    pub fn cap(&self) -> usize {
        self.cap.load(Ordering::Relaxed)
    }

    /// Lower bound on the cap.
    pub fn min_threads(&self) -> usize {
        self.min_threads
    }

    /// Upper bound on the cap.
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Sets the cap to `value`, clamped to the configured bounds.
    pub fn set_cap(&self, value: usize) {
        let clamped = value.clamp(self.min_threads, self.max_threads);
        self.cap.store(clamped, Ordering::Relaxed);
    }

    /// Halves the distance to `min_threads` (at least one thread).
    pub fn decrease_cap(&self) {
        let cap = self.cap();
        let step = ((cap - self.min_threads) / 2).max(1);
        self.set_cap(cap.saturating_sub(step));
        self.throttling_active.store(true, Ordering::Relaxed);
        log::trace!("more throttling, new cap: {}", self.cap());
    }

    /// Lowers the cap by two threads.
    pub fn decrease_cap_gradual(&self) {
        self.set_cap(self.cap().saturating_sub(2));
        self.throttling_active.store(true, Ordering::Relaxed);
    }

    /// Halves the distance to `max_threads` (at least one thread).
    pub fn increase_cap(&self) {
        let cap = self.cap();
        let step = ((self.max_threads - cap) / 2).max(1);
        self.set_cap(cap + step);
        self.throttling_active.store(false, Ordering::Relaxed);
        log::trace!("less throttling, new cap: {}", self.cap());
    }

    /// Raises the cap by two threads.
    pub fn increase_cap_gradual(&self) {
        self.set_cap(self.cap() + 2);
        self.throttling_active.store(false, Ordering::Relaxed);
    }

    /// Whether the last cap movement was a decrease. Scheduler hint only.
    pub fn throttling_active(&self) -> bool {
        self.throttling_active.load(Ordering::Relaxed)
    }

    /// Marks the state final: every controller becomes a permanent no-op.
    pub fn finalize(&self) {
        self.finalized.store(true, Ordering::Relaxed);
    }

    /// Whether teardown has run.
    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Relaxed)
    }
}

/// Cheap, clonable read handle onto the thread cap for the scheduling path.
#[derive(Debug, Clone)]
pub struct CapHandle(std::sync::Arc<ThrottleState>);

impl CapHandle {
    /// Creates a handle sharing `state`.
    pub fn new(state: std::sync::Arc<ThrottleState>) -> Self {
        Self(state)
    }

    /// Current thread cap (relaxed read; may be one tick stale).
    pub fn current(&self) -> usize {
        self.0.cap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_starts_at_max() {
        let state = ThrottleState::new(1, 16);
        assert_eq!(state.cap(), 16);
        assert!(!state.throttling_active());
    }

    #[test]
    fn decrease_halves_distance_to_min() {
        let state = ThrottleState::new(1, 16);
        state.decrease_cap();
        // 16 - (16 - 1) / 2 = 16 - 7 = 9
        assert_eq!(state.cap(), 9);
        assert!(state.throttling_active());
    }

    #[test]
    fn decrease_at_min_stays_at_min() {
        let state = ThrottleState::new(4, 16);
        state.set_cap(4);
        state.decrease_cap();
        assert_eq!(state.cap(), 4);
    }

    #[test]
    fn increase_halves_distance_to_max() {
        let state = ThrottleState::new(1, 16);
        state.set_cap(8);
        state.increase_cap();
        // 8 + (16 - 8) / 2 = 12
        assert_eq!(state.cap(), 12);
        assert!(!state.throttling_active());
    }

    #[test]
    fn gradual_steps_clamp_to_bounds() {
        let state = ThrottleState::new(2, 6);
        state.set_cap(3);
        state.decrease_cap_gradual();
        assert_eq!(state.cap(), 2);
        state.set_cap(5);
        state.increase_cap_gradual();
        assert_eq!(state.cap(), 6);
    }

    #[test]
    fn set_cap_clamps() {
        let state = ThrottleState::new(2, 8);
        state.set_cap(100);
        assert_eq!(state.cap(), 8);
        state.set_cap(0);
        assert_eq!(state.cap(), 2);
    }

    #[test]
    fn finalize_is_sticky() {
        let state = ThrottleState::new(1, 4);
        assert!(!state.is_finalized());
        state.finalize();
        state.finalize();
        assert!(state.is_finalized());
    }

    #[test]
    fn cap_handle_tracks_writes() {
        let state = std::sync::Arc::new(ThrottleState::new(1, 8));
        let handle = CapHandle::new(state.clone());
        assert_eq!(handle.current(), 8);
        state.set_cap(5);
        assert_eq!(handle.current(), 5);
    }
}
