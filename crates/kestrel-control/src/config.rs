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

//! Throttling configuration, read once at setup.

use kestrel_core::throttle::{
    ThrottleError, ThrottleResult, DEFAULT_PERIOD_MICROS, DEFAULT_WINDOW_SIZE,
};
use std::time::Duration;

/// Which controller `setup_timer_throttling` registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThroughputStrategy {
    /// Discrete 3-point hill climbing over the cap range.
    #[default]
    HillClimbing,
    /// Baseline/history hysteresis comparison.
    Threshold,
}

/// Configuration for the throttling engine.
///
/// Read exactly once at setup; the engine never re-reads the environment.
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Master enable. When false, every setup call is a successful no-op.
    pub enabled: bool,
    /// Lower bound on the thread cap.
    pub min_threads: usize,
    /// Upper bound on the thread cap; the cap starts here.
    pub max_threads: usize,
    /// Hard power ceiling in watts.
    pub max_watts: f64,
    /// Soft power floor in watts.
    pub min_watts: f64,
    /// Whether to prefer saving power while throttling.
    pub energy_throttling: bool,
    /// Moving-average window, in samples.
    pub window_size: usize,
    /// Periodic driver interval.
    pub period: Duration,
    /// Which throughput controller to register.
    pub strategy: ThroughputStrategy,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_threads: 1,
            max_threads: 8,
            max_watts: 100.0,
            min_watts: 50.0,
            energy_throttling: false,
            window_size: DEFAULT_WINDOW_SIZE,
            period: Duration::from_micros(DEFAULT_PERIOD_MICROS),
            strategy: ThroughputStrategy::default(),
        }
    }
}

impl ThrottleConfig {
    /// Builds a configuration from the process environment.
    ///
    /// Recognized variables: `KESTREL_THROTTLING` (any value > 0 enables),
    /// `KESTREL_THROTTLING_MIN_THREADS`, `KESTREL_THROTTLING_MAX_THREADS`,
    /// `KESTREL_THROTTLING_MIN_WATTS`, `KESTREL_THROTTLING_MAX_WATTS`,
    /// `KESTREL_ENERGY_THROTTLING` (presence enables),
    /// `KESTREL_THROTTLING_STRATEGY` (`hillclimb` | `threshold`).
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self {
            enabled: env_flag("KESTREL_THROTTLING"),
            ..Self::default()
        };

        if let Some(max) = env_parse::<usize>("KESTREL_THROTTLING_MAX_THREADS") {
            config.max_threads = max;
        }
        if let Some(min) = env_parse::<usize>("KESTREL_THROTTLING_MIN_THREADS") {
            config.min_threads = min;
        }
        if let Some(watts) = env_parse::<f64>("KESTREL_THROTTLING_MAX_WATTS") {
            config.max_watts = watts;
        }
        if let Some(watts) = env_parse::<f64>("KESTREL_THROTTLING_MIN_WATTS") {
            config.min_watts = watts;
        }
        config.energy_throttling = std::env::var_os("KESTREL_ENERGY_THROTTLING").is_some();
        if let Ok(strategy) = std::env::var("KESTREL_THROTTLING_STRATEGY") {
            match strategy.to_ascii_lowercase().as_str() {
                "threshold" => config.strategy = ThroughputStrategy::Threshold,
                "hillclimb" | "hillclimbing" => {
                    config.strategy = ThroughputStrategy::HillClimbing
                }
                other => log::warn!("unknown throttling strategy '{other}', keeping default"),
            }
        }
        config
    }

    /// Checks the configuration for internal consistency.
    pub fn validate(&self) -> ThrottleResult<()> {
        if self.min_threads == 0 {
            return Err(ThrottleError::Configuration(
                "min_threads must be at least 1".to_string(),
            ));
        }
        if self.min_threads > self.max_threads {
            return Err(ThrottleError::Configuration(format!(
                "min_threads ({}) exceeds max_threads ({})",
                self.min_threads, self.max_threads
            )));
        }
        if self.window_size == 0 {
            return Err(ThrottleError::Configuration(
                "window_size must be at least 1".to_string(),
            ));
        }
        if !(self.min_watts < self.max_watts) {
            return Err(ThrottleError::Configuration(format!(
                "min_watts ({}) must be below max_watts ({})",
                self.min_watts, self.max_watts
            )));
        }
        Ok(())
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .map(|v| v > 0)
        .unwrap_or(false)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
