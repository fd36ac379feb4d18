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

//! In-memory timer profile registry.

use kestrel_core::profile::{Profile, ProfileSource, TimerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// One timer's entry in an exported snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    /// The timer's identity.
    pub id: TimerId,
    /// Its counters at snapshot time.
    pub profile: Profile,
}

/// Thread-safe store of per-timer profiles.
///
/// The measurement side calls [`record`](Self::record) as timers complete;
/// the controllers read snapshots and reset windows through the
/// [`ProfileSource`] seam.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: Mutex<HashMap<TimerId, Profile>>,
}

impl ProfileRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed call of `id` lasting `elapsed_seconds`.
    pub fn record(&self, id: &TimerId, elapsed_seconds: f64) {
        let mut profiles = match self.profiles.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let profile = profiles.entry(id.clone()).or_default();
        profile.calls += 1.0;
        profile.accumulated += elapsed_seconds;
    }

    /// Number of distinct timers seen.
    pub fn len(&self) -> usize {
        self.profiles.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Whether no timer has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all profiles, for export.
    pub fn snapshot(&self) -> Vec<ProfileEntry> {
        self.profiles
            .lock()
            .map(|p| {
                p.iter()
                    .map(|(id, profile)| ProfileEntry {
                        id: id.clone(),
                        profile: *profile,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl ProfileSource for ProfileRegistry {
    fn get_profile(&self, id: &TimerId) -> Option<Profile> {
        self.profiles.lock().ok()?.get(id).copied()
    }

    fn reset(&self, id: &TimerId) {
        if let Ok(mut profiles) = self.profiles.lock() {
            if let Some(profile) = profiles.get_mut(id) {
                *profile = Profile::default();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> TimerId {
        TimerId::Name("integrate".to_string())
    }

    #[test]
    fn unknown_timer_has_no_profile() {
        let registry = ProfileRegistry::new();
        assert_eq!(registry.get_profile(&id()), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn record_accumulates_calls_and_time() {
        let registry = ProfileRegistry::new();
        registry.record(&id(), 0.25);
        registry.record(&id(), 0.75);

        let profile = registry.get_profile(&id()).unwrap();
        assert_eq!(profile.calls, 2.0);
        assert_eq!(profile.accumulated, 1.0);
        assert_eq!(profile.mean(), Some(0.5));
    }

    #[test]
    fn reset_zeroes_in_place_and_keeps_the_entry() {
        let registry = ProfileRegistry::new();
        registry.record(&id(), 0.5);
        registry.reset(&id());

        assert_eq!(registry.get_profile(&id()), Some(Profile::default()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reset_of_unknown_timer_is_a_no_op() {
        let registry = ProfileRegistry::new();
        registry.reset(&id());
        assert!(registry.is_empty());
    }

    #[test]
    fn address_and_name_identities_are_distinct() {
        let registry = ProfileRegistry::new();
        registry.record(&TimerId::Address(0x1000), 0.1);
        registry.record(&TimerId::Name("0x1000".to_string()), 0.2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let registry = ProfileRegistry::new();
        registry.record(&id(), 0.5);

        let snapshot = registry.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("integrate"));

        let parsed: Vec<ProfileEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }
}
