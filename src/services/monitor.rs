//! Connectivity monitor — background health polling.
//!
//! DESIGN
//! ======
//! `start` probes once immediately, then ticks at the configured interval.
//! A tick only probes while the service is disconnected and no probe is
//! outstanding; missed ticks are skipped rather than queued, so a slow
//! probe never causes a burst of catch-up requests.
//!
//! `stop` aborts the polling task and abandons any outstanding probe, so a
//! response that lands after stopping cannot change visible state.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::inference::types::InferenceService;
use crate::state::connectivity::{ConnectivityState, ProbeResult};
use crate::store::WorkflowStore;

#[cfg(test)]
#[path = "monitor_test.rs"]
mod tests;

pub struct ConnectivityMonitor {
    store: Arc<WorkflowStore>,
    service: Arc<dyn InferenceService>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityMonitor {
    #[must_use]
    pub fn new(store: Arc<WorkflowStore>, service: Arc<dyn InferenceService>, interval: Duration) -> Self {
        Self { store, service, interval, task: Mutex::new(None) }
    }

    /// Start polling. No-op if already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let store = Arc::clone(&self.store);
        let service = Arc::clone(&self.service);
        let interval = self.interval;
        info!(poll = ?interval, "connectivity monitor started");

        *task = Some(tokio::spawn(async move {
            probe_once(&store, service.as_ref()).await;

            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if store.read(|state| state.connectivity.should_poll()) {
                    probe_once(&store, service.as_ref()).await;
                }
            }
        }));
    }

    /// Stop polling and abandon any outstanding probe. Idempotent.
    pub fn stop(&self) {
        let handle = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.abort();
            self.store.update(|state| state.connectivity.abandon_probe());
            info!("connectivity monitor stopped");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Probe right now, regardless of the polling schedule.
    ///
    /// Returns the resulting state, or `None` if another probe was already
    /// outstanding or this one was abandoned before it completed.
    pub async fn check_now(&self) -> Option<ConnectivityState> {
        probe_once(&self.store, self.service.as_ref()).await
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        let handle = self.task.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

async fn probe_once(store: &WorkflowStore, service: &dyn InferenceService) -> Option<ConnectivityState> {
    let ticket = store.update_if(|state| {
        let ticket = state.connectivity.begin_probe();
        (ticket, false)
    })?;

    let result = service.health().await;
    match &result {
        Ok(report) => debug!(status = %report.status, model_loaded = report.model_loaded, "health probe answered"),
        Err(e) => debug!(error = %e, "health probe failed"),
    }
    let probe = ProbeResult::from(&result);

    let (applied, changed, state) = store.update_if(|state| {
        let applied = state.connectivity.is_current(ticket);
        let changed = state.connectivity.complete_probe(ticket, probe);
        ((applied, changed, state.connectivity.state()), changed)
    });

    if changed {
        info!(state = ?state, "connectivity changed");
    }
    applied.then_some(state)
}
