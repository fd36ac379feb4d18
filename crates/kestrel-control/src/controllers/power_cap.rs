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

//! Power-driven thread cap controller.

use crate::config::ThrottleConfig;
use kestrel_core::policy::{Policy, PolicyContext, PolicyControl, PolicyResult};
use kestrel_core::power::PowerSensor;
use kestrel_core::throttle::ThrottleState;
use std::sync::Arc;

/// Keeps package power inside `[min_watts, max_watts]` by moving the thread
/// cap.
///
/// Each tick reads the sensor and folds the sample into a windowed moving
/// average. Exceeding the ceiling (instantaneously or on average) halves the
/// cap's distance to the lower bound; sitting below the floor (both
/// instantaneously and on average) halves the distance to the upper bound.
/// Both rules share one decay counter: it counts down only while the
/// triggering condition holds, so a burst shorter than the window never
/// moves the cap.
pub struct PowerCapController {
    state: Arc<ThrottleState>,
    sensor: Arc<dyn PowerSensor>,
    max_watts: f64,
    min_watts: f64,
    window_size: usize,
    moving_average: f64,
    delay: i64,
}

impl PowerCapController {
    /// Creates the controller. The decay counter starts at a full window, so
    /// a sustained excursion first adjusts the cap on the
    /// `window_size`-th tick.
    pub fn new(
        state: Arc<ThrottleState>,
        sensor: Arc<dyn PowerSensor>,
        config: &ThrottleConfig,
    ) -> Self {
        Self {
            state,
            sensor,
            max_watts: config.max_watts,
            min_watts: config.min_watts,
            window_size: config.window_size,
            moving_average: 0.0,
            delay: config.window_size as i64,
        }
    }

    /// Current windowed moving average of the power samples, in watts.
    pub fn moving_average(&self) -> f64 {
        self.moving_average
    }

    /// Remaining decay ticks before the active rule may fire.
    pub fn delay(&self) -> i64 {
        self.delay
    }
}

impl Policy for PowerCapController {
    fn name(&self) -> &str {
        "power-cap"
    }

    fn evaluate(&mut self, _ctx: &PolicyContext) -> PolicyResult {
        if self.state.is_finalized() {
            return Ok(PolicyControl::Continue);
        }

        let power = self.sensor.current_power_high();
        // 0.0 means the sensor is unavailable: skip the tick entirely, the
        // average must not decay toward zero on sensor dropouts.
        if power == 0.0 {
            log::trace!("power sensor unavailable, skipping tick");
            return Ok(PolicyControl::Continue);
        }

        let window = self.window_size as f64;
        self.moving_average = (self.moving_average * (window - 1.0) + power) / window;

        if power > self.max_watts || self.moving_average > self.max_watts {
            // Hard ceiling: one excursion of either the sample or the
            // average counts.
            self.delay -= 1;
            if self.delay <= 0 {
                self.state.decrease_cap();
                self.delay = self.window_size as i64;
                log::debug!(
                    "power {power:.1} W over ceiling {:.1} W, cap now {}",
                    self.max_watts,
                    self.state.cap()
                );
            }
        } else if power < self.min_watts && self.moving_average < self.min_watts {
            // Soft floor: the sample and the average must both dip under.
            self.delay -= 1;
            if self.delay <= 0 {
                self.state.increase_cap();
                self.delay = self.window_size as i64;
                log::debug!(
                    "power {power:.1} W under floor {:.1} W, cap now {}",
                    self.min_watts,
                    self.state.cap()
                );
            }
        }
        // In-bounds ticks leave the decay counter alone.

        Ok(PolicyControl::Continue)
    }
}
