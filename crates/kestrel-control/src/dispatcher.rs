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

//! Per-event-type policy registries and dispatch.

use kestrel_core::policy::{EventType, Policy, PolicyContext, PolicyControl, PolicyError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// One registered policy. Entries are never removed; a stopped or panicked
/// policy is deactivated in place.
struct PolicyInstance {
    id: usize,
    policy: Arc<Mutex<dyn Policy>>,
    active: AtomicBool,
}

/// Thread-safe registry of policies, one ordered list per event type.
///
/// Registration takes the write lock of the target event type only, so
/// installing a startup policy never contends with periodic dispatch.
/// Dispatch takes the matching read lock and invokes the callbacks in
/// registration order; each callback runs inside its own containment
/// boundary so one broken policy cannot stop the rest.
pub struct PolicyDispatcher {
    registries: [RwLock<Vec<PolicyInstance>>; EventType::COUNT],
    next_id: AtomicUsize,
}

impl PolicyDispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self {
            registries: std::array::from_fn(|_| RwLock::new(Vec::new())),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Registers `policy` for `event` and returns its id.
    ///
    /// Ids are strictly increasing across all event types and are never
    /// reused. For a given event type, callbacks fire in registration order
    /// on every dispatch.
    pub fn register(&self, event: EventType, policy: Arc<Mutex<dyn Policy>>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = policy
            .lock()
            .map(|p| p.name().to_string())
            .unwrap_or_else(|_| "<poisoned>".to_string());
        log::info!("PolicyDispatcher: registered '{name}' (id={id}) for {event}");

        let mut registry = match self.registries[event.index()].write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        registry.push(PolicyInstance {
            id,
            policy,
            active: AtomicBool::new(true),
        });
        id
    }

    /// Invokes every active policy registered for `ctx.event`, in
    /// registration order.
    ///
    /// A callback that panics is logged and deactivated; a callback that
    /// returns [`PolicyControl::Stop`] is deactivated; an
    /// [`PolicyError::NotReady`] is benign and retried on the next dispatch.
    /// No failure propagates to the caller.
    pub fn dispatch(&self, ctx: &PolicyContext) {
        let registry = match self.registries[ctx.event.index()].read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        for entry in registry.iter() {
            if !entry.active.load(Ordering::Relaxed) {
                continue;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| match entry.policy.lock() {
                Ok(mut policy) => Some(policy.evaluate(ctx)),
                // Poisoned by an earlier panic inside this policy; leave it
                // deactivated rather than resurrect half-updated state.
                Err(_) => None,
            }));

            match outcome {
                Ok(Some(Ok(PolicyControl::Continue))) => {}
                Ok(Some(Ok(PolicyControl::Stop))) => {
                    log::debug!("policy id={} requested stop on {}", entry.id, ctx.event);
                    entry.active.store(false, Ordering::Relaxed);
                }
                Ok(Some(Err(PolicyError::NotReady))) => {
                    log::trace!("policy id={} not ready on {}", entry.id, ctx.event);
                }
                Ok(Some(Err(PolicyError::Failed(msg)))) => {
                    log::warn!("policy id={} failed on {}: {msg}", entry.id, ctx.event);
                }
                Ok(None) | Err(_) => {
                    log::error!(
                        "policy id={} panicked on {}; deactivating it",
                        entry.id,
                        ctx.event
                    );
                    entry.active.store(false, Ordering::Relaxed);
                }
            }
        }
    }

    /// Number of policies registered for `event`, active or not.
    pub fn count(&self, event: EventType) -> usize {
        self.registries[event.index()]
            .read()
            .map(|r| r.len())
            .unwrap_or(0)
    }
}

impl Default for PolicyDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
