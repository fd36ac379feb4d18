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

//! Registry for optional tracing backends.

use kestrel_core::plugin::TracingBackend;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Collects the tracing backends available in this process and resolves the
/// set exactly once at engine startup.
///
/// Backends register during early initialization; the engine then calls
/// [`resolve`](Self::resolve) and holds the returned list for its lifetime.
/// An empty registry is the normal no-backends state, never an error, and
/// later registrations are ignored rather than re-resolved on every call.
#[derive(Default)]
pub struct BackendRegistry {
    backends: Mutex<Vec<Arc<dyn TracingBackend>>>,
    resolved: AtomicBool,
}

impl BackendRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a backend. Ignored with a warning once the set has been
    /// resolved.
    pub fn register(&self, backend: Arc<dyn TracingBackend>) {
        if self.resolved.load(Ordering::SeqCst) {
            log::warn!(
                "backend '{}' registered after resolution, ignoring",
                backend.name()
            );
            return;
        }
        let mut backends = match self.backends.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        log::info!("tracing backend '{}' available", backend.name());
        backends.push(backend);
    }

    /// Freezes the set and returns it, in registration order. Subsequent
    /// calls return the same set.
    pub fn resolve(&self) -> Vec<Arc<dyn TracingBackend>> {
        self.resolved.store(true, Ordering::SeqCst);
        match self.backends.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Whether the set has been frozen.
    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::SeqCst)
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.backends.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// Whether no backend is available.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
