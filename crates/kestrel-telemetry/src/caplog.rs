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

//! Coordinator cap-search log.

use kestrel_core::throttle::{CapLogSink, ThrottleError, ThrottleResult};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Tab-separated, append-only record of hill-climbing rounds.
///
/// One line per committed round: `index \t best_evaluation \t best_cap`.
/// The engine opens this only on the coordinating process; `open` and
/// `close` are both idempotent and appends outside an open window are
/// dropped with a trace message.
#[derive(Debug)]
pub struct CapDataLog {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl CapDataLog {
    /// Creates a closed log targeting `path`. Nothing touches the
    /// filesystem until [`open`](CapLogSink::open).
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer: Mutex::new(None),
        }
    }

    /// The file this log writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CapLogSink for CapDataLog {
    fn open(&self) -> ThrottleResult<()> {
        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if writer.is_some() {
            return Ok(());
        }
        let file = File::create(&self.path)
            .map_err(|e| ThrottleError::Io(format!("open {}: {e}", self.path.display())))?;
        *writer = Some(BufWriter::new(file));
        log::info!("cap log opened at {}", self.path.display());
        Ok(())
    }

    fn append(&self, index: u64, best_evaluation: f64, best_cap: usize) {
        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(out) = writer.as_mut() else {
            log::trace!("cap log closed, dropping record {index}");
            return;
        };
        // Flush per record so the artifact survives an aborted run.
        if writeln!(out, "{index}\t{best_evaluation}\t{best_cap}")
            .and_then(|()| out.flush())
            .is_err()
        {
            log::warn!("failed to append cap record {index}");
        }
    }

    fn close(&self) {
        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(mut out) = writer.take() {
            let _ = out.flush();
            log::info!("cap log closed at {}", self.path.display());
        }
    }
}

impl Drop for CapDataLog {
    fn drop(&mut self) {
        self.close();
    }
}
