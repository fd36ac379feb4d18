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

//! RAPL powercap sysfs power sensor.

use anyhow::{bail, Context};
use kestrel_core::power::PowerSensor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

const POWERCAP_ROOT: &str = "/sys/class/powercap";
const PACKAGE_PREFIX: &str = "intel-rapl:";

/// One top-level RAPL package domain.
#[derive(Debug)]
struct RaplPackage {
    energy_path: PathBuf,
    /// Wraparound point of the energy counter, in microjoules.
    max_energy_uj: u64,
}

/// Previous counter readings, one per package, plus when they were taken.
#[derive(Debug)]
struct EnergySample {
    counters_uj: Vec<u64>,
    taken_at: Instant,
}

/// Package power from the Linux powercap (RAPL) sysfs hierarchy.
///
/// Each reading samples every package's cumulative `energy_uj` counter and
/// derives watts from the energy delta over the elapsed wall time, summed
/// across packages. The first call after construction only seeds the
/// counters and reports `0.0` (unavailable), as does any call where a
/// counter cannot be read.
#[derive(Debug)]
pub struct RaplPowerSensor {
    packages: Vec<RaplPackage>,
    last: Mutex<Option<EnergySample>>,
}

impl RaplPowerSensor {
    /// Opens the system powercap hierarchy.
    pub fn new() -> anyhow::Result<Self> {
        Self::with_root(Path::new(POWERCAP_ROOT))
    }

    /// Opens a powercap hierarchy rooted at `root`.
    pub fn with_root(root: &Path) -> anyhow::Result<Self> {
        let packages = discover_packages(root)
            .with_context(|| format!("scanning powercap root {}", root.display()))?;
        if packages.is_empty() {
            bail!("no RAPL package domains under {}", root.display());
        }
        log::info!(
            "RAPL sensor using {} package domain(s) under {}",
            packages.len(),
            root.display()
        );
        Ok(Self {
            packages,
            last: Mutex::new(None),
        })
    }

    /// Number of package domains being sampled.
    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    fn read_counters(&self) -> Option<Vec<u64>> {
        self.packages
            .iter()
            .map(|p| read_u64(&p.energy_path))
            .collect()
    }
}

impl PowerSensor for RaplPowerSensor {
    fn current_power_high(&self) -> f64 {
        let Some(counters) = self.read_counters() else {
            log::trace!("RAPL counter read failed");
            return 0.0;
        };
        let now = Instant::now();

        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let sample = EnergySample {
            counters_uj: counters.clone(),
            taken_at: now,
        };
        let Some(previous) = last.replace(sample) else {
            return 0.0;
        };

        let elapsed_us = now.duration_since(previous.taken_at).as_micros();
        if elapsed_us == 0 {
            return 0.0;
        }

        let mut delta_uj: u64 = 0;
        for (package, (cur, prev)) in self
            .packages
            .iter()
            .zip(counters.iter().zip(previous.counters_uj.iter()))
        {
            delta_uj += if cur >= prev {
                cur - prev
            } else {
                // Counter wrapped.
                package.max_energy_uj - prev + cur
            };
        }

        // µJ over µs is watts.
        delta_uj as f64 / elapsed_us as f64
    }

    fn start(&self) {
        log::debug!("RAPL sensor active");
    }

    fn stop(&self) {
        log::debug!("RAPL sensor stopped");
    }
}

/// Finds the top-level package domains (`intel-rapl:N`), skipping subzones
/// (`intel-rapl:N:M`).
fn discover_packages(root: &Path) -> anyhow::Result<Vec<RaplPackage>> {
    let mut packages = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(PACKAGE_PREFIX) || name.matches(':').count() != 1 {
            continue;
        }
        let dir = entry.path();
        let energy_path = dir.join("energy_uj");
        if read_u64(&energy_path).is_none() {
            log::warn!("skipping unreadable RAPL domain {}", dir.display());
            continue;
        }
        let max_energy_uj = read_u64(&dir.join("max_energy_range_uj")).unwrap_or(u64::MAX);
        packages.push(RaplPackage {
            energy_path,
            max_energy_uj,
        });
    }
    packages.sort_by(|a, b| a.energy_path.cmp(&b.energy_path));
    Ok(packages)
}

fn read_u64(path: &Path) -> Option<u64> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}
