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

//! # Kestrel Core
//!
//! Foundational crate containing traits, core types, and interface contracts
//! for the adaptive throttling engine.

#![warn(missing_docs)]

pub mod plugin;
pub mod policy;
pub mod power;
pub mod profile;
pub mod throttle;

pub use policy::{EventType, Policy, PolicyContext, PolicyControl, PolicyError, PolicyResult};
pub use profile::{Profile, ProfileSource, TimerId};
pub use throttle::{CapHandle, ThrottleError, ThrottleResult, ThrottleState};
