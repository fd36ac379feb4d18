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

//! Instantaneous power measurement contract.

/// A source of instantaneous package power readings.
///
/// Implementations live in `kestrel-infra`. A reading of exactly `0.0` means
/// the sensor is unavailable (no hardware, no second sample yet); the power
/// controller skips such ticks without touching its state.
pub trait PowerSensor: Send + Sync {
    /// Current power draw in watts, or `0.0` when unavailable.
    fn current_power_high(&self) -> f64;

    /// Starts the sensor's measurement daemon, if it has one.
    /// Called once during setup; the default is a no-op.
    fn start(&self) {}

    /// Stops the sensor's measurement daemon, if it has one.
    /// Called once during teardown; the default is a no-op.
    fn stop(&self) {}
}
