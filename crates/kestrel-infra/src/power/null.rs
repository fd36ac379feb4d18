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

//! Sensor stand-in for hosts without power measurement.

use kestrel_core::power::PowerSensor;

/// Always reports `0.0` (sensor unavailable), making the power controller
/// skip every tick. Useful on hosts without a powercap hierarchy and in
/// throughput-only sessions.
#[derive(Debug, Default)]
pub struct NullPowerSensor;

impl PowerSensor for NullPowerSensor {
    fn current_power_high(&self) -> f64 {
        0.0
    }
}
