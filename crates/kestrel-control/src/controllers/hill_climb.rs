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

//! Discrete hill-climbing throughput controller.

use kestrel_core::policy::{Policy, PolicyContext, PolicyControl, PolicyError, PolicyResult};
use kestrel_core::profile::{ProfileSource, TimerId};
use kestrel_core::throttle::{CapLogSink, OptimizationCriteria, ThrottleState};
use std::sync::Arc;

/// Local search over the cap range with a 3-point stencil.
///
/// Every round probes the current center and its two neighbors, one tick
/// each, scoring each cap with a windowed moving average of the per-tick
/// metric delta. Once all three stencil points carry a score, the best one
/// becomes the new center and the next round starts there. Per-cap scores
/// persist across rounds, so revisiting a cap refines its average instead of
/// starting over.
pub struct HillClimbController {
    state: Arc<ThrottleState>,
    profiles: Arc<dyn ProfileSource>,
    target: TimerId,
    criterion: OptimizationCriteria,
    window_size: usize,
    cap_log: Option<Arc<dyn CapLogSink>>,
    /// Per-cap moving averages, indexed by `cap - 1` so the inclusive range
    /// `[min_threads, max_threads]` fits exactly `max_threads` slots.
    evaluations: Vec<f64>,
    observations: Vec<usize>,
    center: usize,
    got_center: bool,
    got_low: bool,
    got_high: bool,
    previous_value: Option<f64>,
    round: u64,
}

impl HillClimbController {
    /// Creates the controller with the stencil centered one below
    /// `max_threads`. `cap_log` is `Some` only on the coordinating process.
    pub fn new(
        state: Arc<ThrottleState>,
        profiles: Arc<dyn ProfileSource>,
        target: TimerId,
        criterion: OptimizationCriteria,
        window_size: usize,
        cap_log: Option<Arc<dyn CapLogSink>>,
    ) -> Self {
        let max_threads = state.max_threads();
        let center = (max_threads.saturating_sub(1)).max(state.min_threads());
        Self {
            evaluations: vec![0.0; max_threads],
            observations: vec![0; max_threads],
            state,
            profiles,
            target,
            criterion,
            window_size,
            cap_log,
            center,
            got_center: false,
            got_low: false,
            got_high: false,
            previous_value: None,
            round: 0,
        }
    }

    /// Current stencil center.
    pub fn center(&self) -> usize {
        self.center
    }

    /// Completed search rounds.
    pub fn rounds(&self) -> u64 {
        self.round
    }

    /// Moving-average score for `cap`, for inspection.
    pub fn evaluation(&self, cap: usize) -> f64 {
        self.evaluations[cap - 1]
    }

    fn low_neighbor(&self) -> usize {
        self.center.saturating_sub(1).max(self.state.min_threads())
    }

    fn high_neighbor(&self) -> usize {
        (self.center + 1).min(self.state.max_threads())
    }

    fn better(&self, candidate: f64, incumbent: f64) -> bool {
        match self.criterion {
            OptimizationCriteria::MinimizeAccumulated => candidate < incumbent,
            _ => candidate > incumbent,
        }
    }
}

impl Policy for HillClimbController {
    fn name(&self) -> &str {
        "hill-climb-throughput"
    }

    fn evaluate(&mut self, _ctx: &PolicyContext) -> PolicyResult {
        if self.state.is_finalized() {
            return Ok(PolicyControl::Continue);
        }

        let profile = self
            .profiles
            .get_profile(&self.target)
            .ok_or(PolicyError::NotReady)?;

        let metric = match self.criterion {
            OptimizationCriteria::MaximizeThroughput => profile.calls,
            _ => profile.accumulated,
        };

        // The first sample carries the lifetime total, not a per-tick delta;
        // use it only to seed the delta and direct the search to the center.
        let Some(previous) = self.previous_value.replace(metric) else {
            self.state.set_cap(self.center);
            log::trace!("hill climb seeded, probing center {}", self.center);
            return Ok(PolicyControl::Continue);
        };
        let new_value = metric - previous;

        let cap = self.state.cap();
        let index = cap - 1;
        let count = (self.observations[index] + 1).min(self.window_size);
        self.observations[index] = count;
        let weight = count as f64;
        self.evaluations[index] =
            (self.evaluations[index] * (weight - 1.0) + new_value) / weight;

        let low = self.low_neighbor();
        let high = self.high_neighbor();
        if cap == self.center {
            self.got_center = true;
        }
        if cap == low {
            self.got_low = true;
        }
        if cap == high {
            self.got_high = true;
        }

        if !self.got_center {
            self.state.set_cap(self.center);
            return Ok(PolicyControl::Continue);
        }
        if !self.got_low {
            self.state.set_cap(low);
            return Ok(PolicyControl::Continue);
        }
        if !self.got_high {
            self.state.set_cap(high);
            return Ok(PolicyControl::Continue);
        }

        // All three stencil points scored: move the center to the best one.
        // Ties keep the incumbent, favoring center over low over high.
        let mut best = self.center;
        if self.better(self.evaluations[low - 1], self.evaluations[self.center - 1]) {
            best = low;
        }
        if self.better(self.evaluations[high - 1], self.evaluations[best - 1]) {
            best = high;
        }

        if let Some(sink) = &self.cap_log {
            sink.append(self.round, self.evaluations[best - 1], best);
        }
        self.round += 1;

        log::debug!(
            "hill climb round {} committed cap {best} (score {:.3})",
            self.round,
            self.evaluations[best - 1]
        );
        self.state.set_cap(best);
        self.center = best;
        self.got_center = false;
        self.got_low = false;
        self.got_high = false;

        Ok(PolicyControl::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::policy::EventType;
    use kestrel_core::profile::Profile;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeProfiles {
        inner: Mutex<HashMap<TimerId, Profile>>,
    }

    impl FakeProfiles {
        fn bump(&self, id: &TimerId, calls: f64, accumulated: f64) {
            let mut inner = self.inner.lock().unwrap();
            let profile = inner.entry(id.clone()).or_default();
            profile.calls += calls;
            profile.accumulated += accumulated;
        }
    }

    impl ProfileSource for FakeProfiles {
        fn get_profile(&self, id: &TimerId) -> Option<Profile> {
            self.inner.lock().unwrap().get(id).copied()
        }

        fn reset(&self, id: &TimerId) {
            if let Some(profile) = self.inner.lock().unwrap().get_mut(id) {
                *profile = Profile::default();
            }
        }
    }

    /// Cap log capturing appended records.
    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<(u64, f64, usize)>>,
    }

    impl CapLogSink for RecordingSink {
        fn open(&self) -> kestrel_core::throttle::ThrottleResult<()> {
            Ok(())
        }

        fn append(&self, index: u64, best_evaluation: f64, best_cap: usize) {
            self.records
                .lock()
                .unwrap()
                .push((index, best_evaluation, best_cap));
        }

        fn close(&self) {}
    }

    fn target() -> TimerId {
        TimerId::Address(0x4000)
    }

    /// Calls-per-tick as a function of the cap: peaks at 14 threads.
    fn throughput_at(cap: usize) -> f64 {
        match cap {
            14 => 30.0,
            15 => 20.0,
            16 => 10.0,
            _ => 5.0,
        }
    }

    fn tick(controller: &mut HillClimbController, profiles: &FakeProfiles) -> PolicyResult {
        // The workload advances at a rate set by the current cap, then the
        // controller samples it.
        profiles.bump(&target(), throughput_at(controller.state.cap()), 0.01);
        let ctx = PolicyContext {
            event: EventType::Periodic,
            tick: 0,
        };
        controller.evaluate(&ctx)
    }

    fn controller_with(
        state: &Arc<ThrottleState>,
        profiles: &Arc<FakeProfiles>,
        criterion: OptimizationCriteria,
        sink: Option<Arc<dyn CapLogSink>>,
    ) -> HillClimbController {
        HillClimbController::new(
            state.clone(),
            profiles.clone() as Arc<dyn ProfileSource>,
            target(),
            criterion,
            3,
            sink,
        )
    }

    #[test]
    fn missing_profile_is_not_ready() {
        let state = Arc::new(ThrottleState::new(1, 16));
        let profiles = Arc::new(FakeProfiles::default());
        let mut controller = controller_with(
            &state,
            &profiles,
            OptimizationCriteria::MaximizeThroughput,
            None,
        );

        let ctx = PolicyContext {
            event: EventType::Periodic,
            tick: 1,
        };
        assert!(matches!(
            controller.evaluate(&ctx),
            Err(PolicyError::NotReady)
        ));
        // Benign: the cap is untouched and a later tick with data works.
        assert_eq!(state.cap(), 16);
        profiles.bump(&target(), 10.0, 0.01);
        assert!(controller.evaluate(&ctx).is_ok());
    }

    #[test]
    fn probes_center_low_high_then_commits_best() {
        let state = Arc::new(ThrottleState::new(1, 16));
        let profiles = Arc::new(FakeProfiles::default());
        let mut controller = controller_with(
            &state,
            &profiles,
            OptimizationCriteria::MaximizeThroughput,
            None,
        );

        tick(&mut controller, &profiles).unwrap();
        assert_eq!(state.cap(), 15, "first tick probes the center");
        assert_eq!(controller.rounds(), 0);

        tick(&mut controller, &profiles).unwrap();
        assert_eq!(state.cap(), 14, "second tick probes the low neighbor");
        assert_eq!(controller.rounds(), 0);

        tick(&mut controller, &profiles).unwrap();
        assert_eq!(state.cap(), 16, "third tick probes the high neighbor");
        assert_eq!(controller.rounds(), 0, "no commit before all probes");

        tick(&mut controller, &profiles).unwrap();
        assert_eq!(controller.rounds(), 1);
        // 14 threads yielded 30 calls/tick, the best of {14, 15, 16}.
        assert_eq!(state.cap(), 14);
        assert_eq!(controller.center(), 14);
    }

    #[test]
    fn scores_are_per_cap_deltas() {
        let state = Arc::new(ThrottleState::new(1, 16));
        let profiles = Arc::new(FakeProfiles::default());
        let mut controller = controller_with(
            &state,
            &profiles,
            OptimizationCriteria::MaximizeThroughput,
            None,
        );

        for _ in 0..4 {
            tick(&mut controller, &profiles).unwrap();
        }
        assert_eq!(controller.evaluation(15), 20.0);
        assert_eq!(controller.evaluation(14), 30.0);
        assert_eq!(controller.evaluation(16), 10.0);
    }

    #[test]
    fn coordinator_sink_gets_one_record_per_round() {
        let state = Arc::new(ThrottleState::new(1, 16));
        let profiles = Arc::new(FakeProfiles::default());
        let sink = Arc::new(RecordingSink::default());
        let mut controller = controller_with(
            &state,
            &profiles,
            OptimizationCriteria::MaximizeThroughput,
            Some(sink.clone() as Arc<dyn CapLogSink>),
        );

        // Round one: seed + three probes.
        for _ in 0..4 {
            tick(&mut controller, &profiles).unwrap();
        }
        // Round two: center 14, stencil {13, 14, 15}, all three re-probed.
        for _ in 0..3 {
            tick(&mut controller, &profiles).unwrap();
        }

        let records = sink.records.lock().unwrap().clone();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], (0, 30.0, 14));
        assert_eq!(records[1].0, 1);
        assert_eq!(records[1].2, 14, "14 stays the best-scoring cap");
    }

    #[test]
    fn minimize_criterion_picks_the_smallest_score() {
        let state = Arc::new(ThrottleState::new(1, 16));
        let profiles = Arc::new(FakeProfiles::default());
        let mut controller = controller_with(
            &state,
            &profiles,
            OptimizationCriteria::MinimizeAccumulated,
            None,
        );

        // Every tick accumulates the same 0.01s regardless of cap, so all
        // stencil scores tie and the strict comparison keeps the center.
        for _ in 0..4 {
            tick(&mut controller, &profiles).unwrap();
        }
        assert_eq!(state.cap(), 15, "ties keep the center");
        assert_eq!(controller.center(), 15);
    }

    #[test]
    fn stencil_clamps_at_the_bounds() {
        let state = Arc::new(ThrottleState::new(1, 2));
        let profiles = Arc::new(FakeProfiles::default());
        let mut controller = controller_with(
            &state,
            &profiles,
            OptimizationCriteria::MaximizeThroughput,
            None,
        );

        // center = max(2 - 1, 1) = 1; low clamps to 1, high to 2.
        for _ in 0..8 {
            tick(&mut controller, &profiles).unwrap();
            let cap = state.cap();
            assert!((1..=2).contains(&cap), "cap {cap} escaped bounds");
        }
    }

    #[test]
    fn finalized_state_freezes_the_search() {
        let state = Arc::new(ThrottleState::new(1, 16));
        let profiles = Arc::new(FakeProfiles::default());
        let mut controller = controller_with(
            &state,
            &profiles,
            OptimizationCriteria::MaximizeThroughput,
            None,
        );

        tick(&mut controller, &profiles).unwrap();
        state.finalize();
        for _ in 0..5 {
            tick(&mut controller, &profiles).unwrap();
        }
        assert_eq!(state.cap(), 15, "cap frozen at the last probe");
        assert_eq!(controller.rounds(), 0);
    }
}
