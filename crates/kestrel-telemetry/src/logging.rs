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

//! Logging setup for binaries and tests.

use anyhow::Context;

/// Initializes `env_logger` from `RUST_LOG`, with microsecond timestamps
/// (control decisions are sub-second events).
///
/// Fails if a global logger is already installed.
pub fn try_init() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .format_timestamp_micros()
        .try_init()
        .context("global logger already installed")
}

/// Like [`try_init`], but tolerates an already-installed logger. Safe to
/// call from every test.
pub fn init() {
    let _ = try_init();
}
