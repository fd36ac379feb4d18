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

//! Host hardware discovery for configuring thread bounds.

use sysinfo::System;

/// Number of logical CPUs, the natural `max_threads` for a throttling
/// configuration on this host.
pub fn logical_cores() -> usize {
    let system = System::new_all();
    let cores = system.cpus().len();
    if cores > 0 {
        log::debug!("detected {cores} logical cores");
        cores
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}
