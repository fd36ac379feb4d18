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

//! End-to-end scenarios driving the engine through the real periodic driver.

use kestrel_control::config::ThrottleConfig;
use kestrel_control::ThrottleEngine;
use kestrel_core::power::PowerSensor;
use kestrel_core::profile::TimerId;
use kestrel_core::throttle::{CapLogSink, OptimizationCriteria};
use kestrel_telemetry::caplog::CapDataLog;
use kestrel_telemetry::profiles::ProfileRegistry;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

struct ConstantSensor(f64);

impl PowerSensor for ConstantSensor {
    fn current_power_high(&self) -> f64 {
        self.0
    }
}

fn fast_config() -> ThrottleConfig {
    ThrottleConfig {
        min_threads: 1,
        max_threads: 16,
        max_watts: 100.0,
        min_watts: 50.0,
        window_size: 3,
        period: Duration::from_millis(5),
        ..Default::default()
    }
}

fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("kestrel-{}-{name}", std::process::id()))
}

#[test]
fn sustained_overdraw_lowers_the_cap_within_bounds() {
    let profiles = Arc::new(ProfileRegistry::new());
    let mut engine = ThrottleEngine::new(
        fast_config(),
        Arc::new(ConstantSensor(150.0)),
        profiles,
    )
    .unwrap();

    engine.setup_power_cap_throttling().unwrap();
    thread::sleep(Duration::from_millis(120));
    engine.shutdown_throttling().unwrap();

    let cap = engine.get_thread_cap();
    assert!(cap < 16, "sustained 150 W should have lowered the cap");
    assert!(cap >= 1, "cap must never undershoot min_threads");
}

#[test]
fn scheduler_reader_observes_cap_updates_without_synchronization() {
    let profiles = Arc::new(ProfileRegistry::new());
    let mut engine = ThrottleEngine::new(
        fast_config(),
        Arc::new(ConstantSensor(150.0)),
        profiles,
    )
    .unwrap();

    // The scheduling path sizes worker pools off this handle with plain
    // relaxed loads; a value up to one tick stale is acceptable, so the
    // reader only checks bounds and eventual movement.
    let handle = engine.cap_handle();
    let stop = Arc::new(AtomicBool::new(false));
    let reader_stop = stop.clone();
    let reader = thread::spawn(move || {
        let mut lowest = usize::MAX;
        while !reader_stop.load(Ordering::Relaxed) {
            let cap = handle.current();
            assert!((1..=16).contains(&cap), "reader saw out-of-bounds cap {cap}");
            lowest = lowest.min(cap);
            thread::yield_now();
        }
        lowest
    });

    engine.setup_power_cap_throttling().unwrap();
    thread::sleep(Duration::from_millis(120));
    engine.shutdown_throttling().unwrap();
    stop.store(true, Ordering::Relaxed);

    let lowest = reader.join().unwrap();
    assert!(lowest < 16, "reader never observed a lowered cap");
}

#[test]
fn hill_climb_session_writes_coordinator_records() {
    let profiles = Arc::new(ProfileRegistry::new());
    let target = TimerId::Name("solver_step".to_string());
    let log_path = scratch_path("cap_data.dat");
    let cap_log = Arc::new(CapDataLog::new(&log_path));

    let mut engine = ThrottleEngine::new(
        fast_config(),
        Arc::new(ConstantSensor(0.0)),
        profiles.clone(),
    )
    .unwrap()
    .with_cap_log(cap_log.clone() as Arc<dyn CapLogSink>)
    .with_node_id(0);

    // Simulated workload: keeps completing calls of the target timer while
    // the controller probes cap values.
    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = stop.clone();
    let worker_profiles = profiles.clone();
    let worker_target = target.clone();
    let worker = thread::spawn(move || {
        while !worker_stop.load(Ordering::Relaxed) {
            worker_profiles.record(&worker_target, 0.0001);
            thread::sleep(Duration::from_millis(1));
        }
    });

    engine
        .setup_timer_throttling(target, OptimizationCriteria::MaximizeThroughput)
        .unwrap();
    thread::sleep(Duration::from_millis(250));
    engine.shutdown_throttling().unwrap();
    stop.store(true, Ordering::Relaxed);
    worker.join().unwrap();

    let cap = engine.get_thread_cap();
    assert!((1..=16).contains(&cap));

    // ~50 ticks at 5 ms with a 3-tick stencil: several committed rounds,
    // each one line in the coordinator log.
    let contents = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert!(!lines.is_empty(), "coordinator log should have records");
    for (expected_index, line) in lines.iter().enumerate() {
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 3, "malformed record: {line:?}");
        assert_eq!(fields[0].parse::<usize>().unwrap(), expected_index);
        fields[1].parse::<f64>().expect("best evaluation field");
        let best_cap = fields[2].parse::<usize>().unwrap();
        assert!((1..=16).contains(&best_cap));
    }

    std::fs::remove_file(&log_path).ok();
}

#[test]
fn non_coordinator_never_writes_the_log() {
    let profiles = Arc::new(ProfileRegistry::new());
    let target = TimerId::Name("solver_step".to_string());
    let log_path = scratch_path("rank1-cap_data.dat");
    let cap_log = Arc::new(CapDataLog::new(&log_path));

    let mut engine = ThrottleEngine::new(
        fast_config(),
        Arc::new(ConstantSensor(0.0)),
        profiles.clone(),
    )
    .unwrap()
    .with_cap_log(cap_log as Arc<dyn CapLogSink>)
    .with_node_id(1);

    profiles.record(&target, 0.0001);
    engine
        .setup_timer_throttling(target, OptimizationCriteria::MaximizeThroughput)
        .unwrap();
    thread::sleep(Duration::from_millis(60));
    engine.shutdown_throttling().unwrap();

    assert!(
        !log_path.exists(),
        "rank 1 must not open the coordinator log"
    );
}

#[test]
fn shutdown_twice_with_a_real_log_is_safe() {
    let profiles = Arc::new(ProfileRegistry::new());
    let log_path = scratch_path("double-close-cap_data.dat");
    let cap_log = Arc::new(CapDataLog::new(&log_path));

    let mut engine = ThrottleEngine::new(
        fast_config(),
        Arc::new(ConstantSensor(0.0)),
        profiles.clone(),
    )
    .unwrap()
    .with_cap_log(cap_log as Arc<dyn CapLogSink>);

    profiles.record(&TimerId::Name("solver_step".to_string()), 0.0001);
    engine
        .setup_timer_throttling(
            TimerId::Name("solver_step".to_string()),
            OptimizationCriteria::MaximizeThroughput,
        )
        .unwrap();

    engine.shutdown_throttling().unwrap();
    engine.shutdown_throttling().unwrap();

    // Controllers are permanent no-ops afterwards: the cap cannot move.
    let cap = engine.get_thread_cap();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(engine.get_thread_cap(), cap);

    std::fs::remove_file(&log_path).ok();
}
