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

//! The autonomic throttling controllers.
//!
//! Each controller is a [`kestrel_core::policy::Policy`] registered against
//! the periodic event, constructed once per process with its dependencies
//! injected. Every controller checks the shared finalized flag first and is
//! a permanent no-op after teardown.

pub mod hill_climb;
pub mod power_cap;
pub mod threshold;

pub use hill_climb::HillClimbController;
pub use power_cap::PowerCapController;
pub use threshold::ThresholdController;
