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

//! Dedicated-thread periodic event source.

use crate::dispatcher::PolicyDispatcher;
use crossbeam_channel::{bounded, Sender};
use kestrel_core::policy::{EventType, PolicyContext};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Fires [`EventType::Periodic`] at a fixed wall-clock interval.
///
/// The driver runs on its own OS thread, independent of application threads,
/// and never waits on application state: between ticks it blocks only on its
/// private shutdown channel. Each fire dispatches to every registered
/// periodic policy through the shared [`PolicyDispatcher`].
pub struct PeriodicDriver {
    dispatcher: Arc<PolicyDispatcher>,
    period: Duration,
    running: Arc<AtomicBool>,
    shutdown: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PeriodicDriver {
    /// Creates a stopped driver firing every `period`.
    pub fn new(dispatcher: Arc<PolicyDispatcher>, period: Duration) -> Self {
        Self {
            dispatcher,
            period,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: None,
            handle: None,
        }
    }

    /// Starts the timer thread. Idempotent.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let (tx, rx) = bounded::<()>(1);
        self.shutdown = Some(tx);
        let dispatcher = Arc::clone(&self.dispatcher);
        let running = Arc::clone(&self.running);
        let period = self.period;

        let handle = thread::spawn(move || {
            log::info!("periodic driver started (period {period:?})");
            let mut tick: u64 = 0;
            // recv_timeout doubles as the tick wait and the prompt shutdown
            // path.
            while let Err(crossbeam_channel::RecvTimeoutError::Timeout) = rx.recv_timeout(period)
            {
                tick += 1;
                let ctx = PolicyContext {
                    event: EventType::Periodic,
                    tick,
                };
                dispatcher.dispatch(&ctx);
            }
            running.store(false, Ordering::SeqCst);
            log::info!("periodic driver stopped after {tick} ticks");
        });
        self.handle = Some(handle);
    }

    /// Stops the timer thread and joins it. Safe to call repeatedly, with or
    /// without a prior `start`.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            // A full buffer means a stop signal is already pending.
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Whether the timer thread is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Configured firing interval.
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for PeriodicDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
