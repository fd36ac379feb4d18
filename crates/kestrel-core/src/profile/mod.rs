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

//! Timer profiles and the profile store contract.
//!
//! The profile store itself lives outside this crate (the measurement side
//! owns it); controllers only see it through [`ProfileSource`].

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identity of an instrumented routine: its entry address or its registered
/// timer name, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerId {
    /// Function entry address.
    Address(usize),
    /// Registered timer name.
    Name(String),
}

impl Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerId::Address(addr) => write!(f, "{addr:#x}"),
            TimerId::Name(name) => write!(f, "{name}"),
        }
    }
}

/// Accumulated measurement data for one timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Number of completed calls.
    pub calls: f64,
    /// Total inclusive time across all calls, in seconds.
    pub accumulated: f64,
}

impl Profile {
    /// Mean inclusive time per call, or `None` when no calls have completed.
    pub fn mean(&self) -> Option<f64> {
        if self.calls > 0.0 {
            Some(self.accumulated / self.calls)
        } else {
            None
        }
    }
}

/// Read/reset access to the profile store.
///
/// `get_profile` returns a snapshot copy; `reset` zeroes the counters in
/// place so the next window measures from a clean slate. Both must be cheap
/// and non-blocking — they are called from the periodic control path.
pub trait ProfileSource: Send + Sync {
    /// Snapshot of the profile for `id`, or `None` if the timer has never
    /// fired.
    fn get_profile(&self, id: &TimerId) -> Option<Profile>;

    /// Zeroes the counters for `id`. A no-op for unknown timers.
    fn reset(&self, id: &TimerId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_profile_is_none() {
        assert_eq!(Profile::default().mean(), None);
    }

    #[test]
    fn mean_is_accumulated_over_calls() {
        let profile = Profile {
            calls: 4.0,
            accumulated: 2.0,
        };
        assert_eq!(profile.mean(), Some(0.5));
    }

    #[test]
    fn timer_id_display() {
        assert_eq!(TimerId::Address(0xdead).to_string(), "0xdead");
        assert_eq!(TimerId::Name("solve".to_string()).to_string(), "solve");
    }

    #[test]
    fn timer_ids_hash_by_identity_kind() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(TimerId::Address(1));
        set.insert(TimerId::Name("1".to_string()));
        assert_eq!(set.len(), 2);
    }
}
