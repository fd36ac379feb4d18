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

//! Optional tracing-backend plugin contract.
//!
//! GPU and runtime tracing backends (device monitors, OpenMP tools hooks,
//! and the like) are optional capabilities resolved exactly once at engine
//! startup. Absence of a backend is a normal state, not an error: an engine
//! with no backends resolved simply has nothing to init, query, flush, or
//! stop.

use std::borrow::Cow;

/// The fixed lifecycle contract of an optional tracing backend.
///
/// `init` is invoked once at setup, `query` on each periodic tick, and
/// `flush` followed by `stop` at teardown. Implementations must tolerate
/// being stopped without having been queried and must make every call after
/// `stop` a no-op.
pub trait TracingBackend: Send + Sync {
    /// Unique, human-readable identifier for this backend.
    fn name(&self) -> Cow<'static, str>;

    /// One-time activation at engine startup.
    fn init(&self);

    /// Periodic poll of the backend's counters.
    fn query(&self);

    /// Flushes any buffered trace data.
    fn flush(&self);

    /// Final shutdown; the backend is not used again afterwards.
    fn stop(&self);
}
