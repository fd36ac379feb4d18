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

//! Baseline/history hysteresis throughput controller.

use kestrel_core::policy::{Policy, PolicyContext, PolicyControl, PolicyResult};
use kestrel_core::profile::{Profile, ProfileSource, TimerId};
use kestrel_core::throttle::{LastAction, OptimizationCriteria, ThrottleState};
use std::sync::Arc;

/// Relative change that must be exceeded before a decision is acted on.
const HYSTERESIS_BAND: f64 = 0.05;

/// Adjusts the thread cap by comparing fresh measurements of one function of
/// interest against its recorded history.
///
/// Measurement windows are staggered: the warm-up counter defers decisions
/// for a full window, resets the target's profile when it reaches zero (so
/// the next read covers exactly one clean window), and decides on the tick
/// after that. Decisions continue in the current direction while the
/// measured change exceeds the hysteresis band in its favor, and reverse
/// when it degrades past the band.
pub struct ThresholdController {
    state: Arc<ThrottleState>,
    profiles: Arc<dyn ProfileSource>,
    target: Option<TimerId>,
    criterion: OptimizationCriteria,
    window_size: usize,
    throughput_delay: i64,
    baseline: Profile,
    history: Profile,
    last_action: LastAction,
}

impl ThresholdController {
    /// Creates the controller. With `target == None` every tick is a no-op.
    pub fn new(
        state: Arc<ThrottleState>,
        profiles: Arc<dyn ProfileSource>,
        target: Option<TimerId>,
        criterion: OptimizationCriteria,
        window_size: usize,
    ) -> Self {
        Self {
            state,
            profiles,
            target,
            criterion,
            window_size,
            throughput_delay: window_size as i64,
            baseline: Profile::default(),
            history: Profile::default(),
            last_action: LastAction::Initial,
        }
    }

    /// The most recent committed action.
    pub fn last_action(&self) -> LastAction {
        self.last_action
    }

    /// The baseline snapshot taken on the first decision tick.
    pub fn baseline(&self) -> Profile {
        self.baseline
    }

    /// The history the next decision will compare against.
    pub fn history(&self) -> Profile {
        self.history
    }

    /// Keep moving the way the last step moved. The baseline step was a
    /// forced decrease, so `Baseline` counts as decrease-like.
    fn continue_direction(&self) -> (bool, bool) {
        match self.last_action {
            LastAction::Increase => (true, false),
            LastAction::Decrease | LastAction::Baseline => (false, true),
            _ => (false, false),
        }
    }

    /// Reverse the direction of the last step.
    fn reverse_direction(&self) -> (bool, bool) {
        match self.last_action {
            LastAction::Decrease | LastAction::Baseline => (true, false),
            LastAction::Increase => (false, true),
            _ => (false, false),
        }
    }

    /// Direction choice for the mean-per-call comparison: a higher previous
    /// mean than the band allows counts as improvement (continue), a lower
    /// one as regression (reverse). `MinimizeAccumulated` inverts the table.
    fn decide_on_means(&self, history_mean: f64, current_mean: f64) -> (bool, bool) {
        let improved = history_mean > (1.0 + HYSTERESIS_BAND) * current_mean;
        let degraded = history_mean < (1.0 - HYSTERESIS_BAND) * current_mean;
        match self.criterion {
            OptimizationCriteria::MinimizeAccumulated => {
                if improved {
                    self.reverse_direction()
                } else if degraded {
                    self.continue_direction()
                } else {
                    (false, false)
                }
            }
            _ => {
                if improved {
                    self.continue_direction()
                } else if degraded {
                    self.reverse_direction()
                } else {
                    (false, false)
                }
            }
        }
    }
}

impl Policy for ThresholdController {
    fn name(&self) -> &str {
        "threshold-throughput"
    }

    fn evaluate(&mut self, _ctx: &PolicyContext) -> PolicyResult {
        if self.state.is_finalized() {
            return Ok(PolicyControl::Continue);
        }
        let Some(target) = self.target.clone() else {
            return Ok(PolicyControl::Continue);
        };

        self.throughput_delay -= 1;
        if self.throughput_delay > 0 {
            return Ok(PolicyControl::Continue);
        }
        if self.throughput_delay == 0 {
            // End of the warm-up window: clear the counters so the next
            // tick reads exactly one window of fresh data.
            self.profiles.reset(&target);
            return Ok(PolicyControl::Continue);
        }

        let Some(profile) = self.profiles.get_profile(&target) else {
            log::trace!("no profile for {target} yet, deferring decision");
            return Ok(PolicyControl::Continue);
        };
        if profile.calls == 0.0 {
            log::trace!("profile for {target} has no calls yet, deferring decision");
            return Ok(PolicyControl::Continue);
        }

        if self.last_action == LastAction::Initial {
            // First decision: record the baseline and probe downwards.
            self.baseline = profile;
            self.history = profile;
            self.state.decrease_cap_gradual();
            self.last_action = LastAction::Baseline;
            self.throughput_delay = self.window_size as i64;
            log::debug!(
                "baseline for {target}: calls {:.0}, accumulated {:.6}s, cap now {}",
                profile.calls,
                profile.accumulated,
                self.state.cap()
            );
            return Ok(PolicyControl::Continue);
        }

        let current_mean = profile.accumulated / profile.calls;
        let (do_increase, do_decrease) = match self.criterion {
            OptimizationCriteria::MaximizeThroughput => {
                if profile.calls > (1.0 + HYSTERESIS_BAND) * self.history.calls {
                    self.continue_direction()
                } else if profile.calls < (1.0 - HYSTERESIS_BAND) * self.history.calls {
                    self.reverse_direction()
                } else {
                    // Call counts are inconclusive, fall back to per-call
                    // efficiency.
                    let history_mean = self.history.accumulated / self.history.calls;
                    self.decide_on_means(history_mean, current_mean)
                }
            }
            _ => {
                let history_mean = self.history.accumulated / self.history.calls;
                self.decide_on_means(history_mean, current_mean)
            }
        };

        if do_decrease {
            self.history = profile;
            self.state.decrease_cap_gradual();
            self.last_action = LastAction::Decrease;
            log::debug!("throughput decision: decrease, cap now {}", self.state.cap());
        } else if do_increase {
            self.history = profile;
            self.state.increase_cap_gradual();
            self.last_action = LastAction::Increase;
            log::debug!("throughput decision: increase, cap now {}", self.state.cap());
        }
        self.throughput_delay = self.window_size as i64;

        Ok(PolicyControl::Continue)
    }
}
