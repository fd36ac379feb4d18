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

//! Policy events and the policy capability trait.
//!
//! A policy is a single-method capability object fired by the event
//! dispatcher. Policies are installed once (registration is growth-only) and
//! invoked in registration order for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The kinds of events a policy can be registered against.
///
/// Each variant maps to its own registry and lock in the dispatcher, so
/// registration against one event type never contends with dispatch of
/// another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// The measurement library finished initializing.
    Startup,
    /// The measurement library is shutting down.
    Shutdown,
    /// A new node joined the distributed execution.
    NewNode,
    /// A new worker thread was created.
    NewThread,
    /// A timer started.
    Start,
    /// A timer stopped.
    Stop,
    /// A timer resumed after a yield.
    Resume,
    /// A sampled counter produced a value.
    SampleValue,
    /// The periodic driver fired.
    Periodic,
}

impl EventType {
    /// Number of event types; registries are sized to this.
    pub const COUNT: usize = 9;

    /// All event types, in registry order.
    pub const ALL: [EventType; Self::COUNT] = [
        EventType::Startup,
        EventType::Shutdown,
        EventType::NewNode,
        EventType::NewThread,
        EventType::Start,
        EventType::Stop,
        EventType::Resume,
        EventType::SampleValue,
        EventType::Periodic,
    ];

    /// Stable index of this event type into per-type registry storage.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Execution context handed to every policy callback.
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext {
    /// The event that triggered this dispatch.
    pub event: EventType,
    /// Monotonic tick counter of the periodic driver; 0 for non-periodic
    /// events.
    pub tick: u64,
}

impl PolicyContext {
    /// Creates a context for a non-periodic event.
    pub fn new(event: EventType) -> Self {
        Self { event, tick: 0 }
    }
}

/// What a policy asks the dispatcher to do with it after a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyControl {
    /// Keep dispatching this policy on future events.
    Continue,
    /// Skip this policy on future dispatches. The registry entry is kept
    /// (registration is growth-only) but never invoked again.
    Stop,
}

/// A failure reported by a policy callback.
#[derive(Debug, Clone)]
pub enum PolicyError {
    /// The policy had no data to act on yet. Benign; the dispatcher retries
    /// on the next event.
    NotReady,
    /// The policy failed. Contained by the dispatcher; it never propagates
    /// past the dispatch boundary.
    Failed(String),
}

impl Display for PolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyError::NotReady => write!(f, "policy has no data yet"),
            PolicyError::Failed(msg) => write!(f, "policy failed: {msg}"),
        }
    }
}

impl std::error::Error for PolicyError {}

/// A specialized `Result` type for policy callbacks.
pub type PolicyResult = Result<PolicyControl, PolicyError>;

/// The policy capability interface.
///
/// Implementations are stored as `Arc<Mutex<dyn Policy>>` in the dispatcher
/// registries; `evaluate` therefore runs under the instance's own lock and
/// may mutate internal state freely. Callbacks execute on the dispatching
/// thread (the periodic driver for [`EventType::Periodic`]) and must never
/// block or wait on application progress.
pub trait Policy: Send {
    /// Human-readable policy name, used in dispatch diagnostics.
    fn name(&self) -> &str;

    /// Evaluates the policy against the given context.
    fn evaluate(&mut self, ctx: &PolicyContext) -> PolicyResult;
}
