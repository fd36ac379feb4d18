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

//! # Kestrel Control
//!
//! The control plane of the throttling engine: the event dispatcher, the
//! periodic driver, the three autonomic controllers, and the setup/teardown
//! facade.

#![warn(missing_docs)]

pub mod config;
pub mod controllers;
pub mod dispatcher;
pub mod driver;
pub mod session;

pub use config::{ThrottleConfig, ThroughputStrategy};
pub use dispatcher::PolicyDispatcher;
pub use driver::PeriodicDriver;
pub use session::ThrottleEngine;
