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

//! Setup and teardown facade for the throttling engine.

use crate::config::{ThrottleConfig, ThroughputStrategy};
use crate::controllers::{HillClimbController, PowerCapController, ThresholdController};
use crate::dispatcher::PolicyDispatcher;
use crate::driver::PeriodicDriver;
use kestrel_core::plugin::TracingBackend;
use kestrel_core::policy::{EventType, Policy, PolicyContext, PolicyControl, PolicyResult};
use kestrel_core::power::PowerSensor;
use kestrel_core::profile::{ProfileSource, TimerId};
use kestrel_core::throttle::{
    CapHandle, CapLogSink, OptimizationCriteria, ThrottleError, ThrottleResult, ThrottleState,
};
use std::sync::{Arc, Mutex};

/// The throttling engine: owns the dispatcher, the periodic driver, the
/// shared state, and the external collaborators, and exposes the public
/// control API.
///
/// Constructed once per process with its dependencies injected. All control
/// methods return a status; none of them panics, and every call after
/// [`shutdown_throttling`](Self::shutdown_throttling) is a no-op success.
pub struct ThrottleEngine {
    config: ThrottleConfig,
    dispatcher: Arc<PolicyDispatcher>,
    driver: Option<PeriodicDriver>,
    state: Arc<ThrottleState>,
    sensor: Arc<dyn PowerSensor>,
    profiles: Arc<dyn ProfileSource>,
    cap_log: Option<Arc<dyn CapLogSink>>,
    backends: Vec<Arc<dyn TracingBackend>>,
    node_id: u32,
    started: bool,
}

impl ThrottleEngine {
    /// Creates the engine. Fails if the configuration is inconsistent.
    pub fn new(
        config: ThrottleConfig,
        sensor: Arc<dyn PowerSensor>,
        profiles: Arc<dyn ProfileSource>,
    ) -> ThrottleResult<Self> {
        config.validate()?;
        let state = Arc::new(ThrottleState::new(config.min_threads, config.max_threads));
        Ok(Self {
            dispatcher: Arc::new(PolicyDispatcher::new()),
            driver: None,
            state,
            sensor,
            profiles,
            cap_log: None,
            backends: Vec::new(),
            node_id: 0,
            started: false,
            config,
        })
    }

    /// Wires the coordinator's cap log sink.
    pub fn with_cap_log(mut self, cap_log: Arc<dyn CapLogSink>) -> Self {
        self.cap_log = Some(cap_log);
        self
    }

    /// Wires the tracing backends resolved at startup. Resolution happens
    /// exactly once; an empty list is the normal no-backends state.
    pub fn with_backends(mut self, backends: Vec<Arc<dyn TracingBackend>>) -> Self {
        self.backends = backends;
        self
    }

    /// Sets this process's rank; rank 0 is the coordinator that writes the
    /// cap log.
    pub fn with_node_id(mut self, node_id: u32) -> Self {
        self.node_id = node_id;
        self
    }

    /// Whether this process writes coordinator artifacts.
    pub fn is_coordinator(&self) -> bool {
        self.node_id == 0
    }

    /// The shared policy dispatcher, for installing measurement-side
    /// policies and dispatching non-periodic events.
    pub fn dispatcher(&self) -> &Arc<PolicyDispatcher> {
        &self.dispatcher
    }

    /// Registers `policy` for `event`; see [`PolicyDispatcher::register`].
    pub fn register_policy(&self, event: EventType, policy: Arc<Mutex<dyn Policy>>) -> usize {
        self.dispatcher.register(event, policy)
    }

    /// Current thread cap.
    pub fn get_thread_cap(&self) -> usize {
        self.state.cap()
    }

    /// Read handle for the scheduling hot path; a relaxed load, safe to call
    /// from any thread with no further synchronization.
    pub fn cap_handle(&self) -> CapHandle {
        CapHandle::new(self.state.clone())
    }

    /// The shared throttle state.
    pub fn state(&self) -> &Arc<ThrottleState> {
        &self.state
    }

    /// Installs the power cap controller and starts the periodic driver.
    pub fn setup_power_cap_throttling(&mut self) -> ThrottleResult<()> {
        if !self.config.enabled || self.state.is_finalized() {
            return Ok(());
        }

        let controller =
            PowerCapController::new(self.state.clone(), self.sensor.clone(), &self.config);
        self.dispatcher
            .register(EventType::Periodic, Arc::new(Mutex::new(controller)));

        self.sensor.start();
        // Prime the sensor so the first periodic tick sees a real delta.
        let _ = self.sensor.current_power_high();

        self.ensure_started();
        Ok(())
    }

    /// Installs one throughput controller for `target` and starts the
    /// periodic driver.
    ///
    /// An empty timer name is a fatal configuration error: the process
    /// aborts with a diagnostic rather than silently measuring nothing.
    pub fn setup_timer_throttling(
        &mut self,
        target: TimerId,
        criterion: OptimizationCriteria,
    ) -> ThrottleResult<()> {
        if !self.config.enabled || self.state.is_finalized() {
            return Ok(());
        }
        if let Err(err) = validate_target(&target) {
            log::error!("timer name for throttling is undefined, cannot continue: {err}");
            std::process::abort();
        }

        match self.config.strategy {
            ThroughputStrategy::HillClimbing => {
                let cap_log = if self.is_coordinator() {
                    if let Some(sink) = &self.cap_log {
                        sink.open()?;
                    }
                    self.cap_log.clone()
                } else {
                    None
                };
                let controller = HillClimbController::new(
                    self.state.clone(),
                    self.profiles.clone(),
                    target,
                    criterion,
                    self.config.window_size,
                    cap_log,
                );
                self.dispatcher
                    .register(EventType::Periodic, Arc::new(Mutex::new(controller)));
            }
            ThroughputStrategy::Threshold => {
                let controller = ThresholdController::new(
                    self.state.clone(),
                    self.profiles.clone(),
                    Some(target),
                    criterion,
                    self.config.window_size,
                );
                self.dispatcher
                    .register(EventType::Periodic, Arc::new(Mutex::new(controller)));
            }
        }

        self.ensure_started();
        Ok(())
    }

    /// Tears the engine down: every controller becomes a permanent no-op,
    /// the driver stops, backends flush and stop, and the coordinator's cap
    /// log closes. Idempotent, and safe even if no setup call ever ran.
    pub fn shutdown_throttling(&mut self) -> ThrottleResult<()> {
        if self.state.is_finalized() {
            return Ok(());
        }

        self.dispatcher
            .dispatch(&PolicyContext::new(EventType::Shutdown));
        self.state.finalize();

        if let Some(mut driver) = self.driver.take() {
            driver.stop();
        }
        for backend in &self.backends {
            backend.flush();
            backend.stop();
        }
        self.sensor.stop();
        if self.is_coordinator() {
            if let Some(sink) = &self.cap_log {
                sink.close();
            }
        }
        log::info!("throttling engine shut down, final cap {}", self.state.cap());
        Ok(())
    }

    /// One-time startup work shared by the setup paths: backend resolution,
    /// the startup event, and the periodic driver.
    fn ensure_started(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        for backend in &self.backends {
            log::info!("initializing tracing backend '{}'", backend.name());
            backend.init();
        }
        if !self.backends.is_empty() {
            let query = BackendQueryPolicy {
                state: self.state.clone(),
                backends: self.backends.clone(),
            };
            self.dispatcher
                .register(EventType::Periodic, Arc::new(Mutex::new(query)));
        }

        self.dispatcher
            .dispatch(&PolicyContext::new(EventType::Startup));

        let mut driver = PeriodicDriver::new(self.dispatcher.clone(), self.config.period);
        driver.start();
        self.driver = Some(driver);
    }
}

impl Drop for ThrottleEngine {
    fn drop(&mut self) {
        let _ = self.shutdown_throttling();
    }
}

/// Exactly one target identity must be configured, and a name must not be
/// empty.
fn validate_target(target: &TimerId) -> ThrottleResult<()> {
    match target {
        TimerId::Name(name) if name.is_empty() => Err(ThrottleError::Configuration(
            "timer name for throttling must not be empty".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Internal periodic policy polling the resolved tracing backends.
struct BackendQueryPolicy {
    state: Arc<ThrottleState>,
    backends: Vec<Arc<dyn TracingBackend>>,
}

impl Policy for BackendQueryPolicy {
    fn name(&self) -> &str {
        "backend-query"
    }

    fn evaluate(&mut self, _ctx: &PolicyContext) -> PolicyResult {
        if self.state.is_finalized() {
            return Ok(PolicyControl::Continue);
        }
        for backend in &self.backends {
            backend.query();
        }
        Ok(PolicyControl::Continue)
    }
}
