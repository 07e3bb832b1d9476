//! Connectivity state — the tri-state signal driven by health probes.
//!
//! DESIGN
//! ======
//! Only probe completions change the visible state; starting a probe just
//! records it as outstanding. At most one probe is outstanding at a time,
//! and a completion carrying an abandoned ticket is ignored.
//!
//! Repeating the same failure does not rewrite the error text, and
//! `complete_probe` reports whether anything visible changed so callers
//! can skip redundant notifications.

use crate::inference::types::{HealthReport, InferenceError};

pub const NOT_READY_MESSAGE: &str = "Backend API is not ready. Please start the backend server.";
pub const UNREACHABLE_MESSAGE: &str = "Cannot connect to backend API. Retrying...";

#[cfg(test)]
#[path = "connectivity_test.rs"]
mod tests;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectivityState {
    /// No probe has completed yet.
    #[default]
    Checking,
    Connected,
    Disconnected,
}

/// Classified result of one health probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeResult {
    Ready,
    NotReady,
    Unreachable,
}

impl From<&Result<HealthReport, InferenceError>> for ProbeResult {
    fn from(result: &Result<HealthReport, InferenceError>) -> Self {
        match result {
            Ok(report) if report.is_ready() => Self::Ready,
            Ok(_) => Self::NotReady,
            Err(_) => Self::Unreachable,
        }
    }
}

/// Handle for one outstanding probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeTicket(u64);

#[derive(Clone, Debug, Default)]
pub struct ConnectivityStatus {
    state: ConnectivityState,
    error: Option<String>,
    probe_seq: u64,
    in_flight: Option<u64>,
}

impl ConnectivityStatus {
    #[must_use]
    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// User-visible connectivity error, cleared once the service is ready.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectivityState::Connected
    }

    #[must_use]
    pub fn probe_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Scheduled polling runs only while disconnected and idle.
    #[must_use]
    pub fn should_poll(&self) -> bool {
        self.state == ConnectivityState::Disconnected && self.in_flight.is_none()
    }

    /// Register a new probe, or `None` if one is already outstanding.
    pub fn begin_probe(&mut self) -> Option<ProbeTicket> {
        if self.in_flight.is_some() {
            return None;
        }
        self.probe_seq += 1;
        self.in_flight = Some(self.probe_seq);
        Some(ProbeTicket(self.probe_seq))
    }

    /// Whether `ticket` is the probe currently outstanding.
    #[must_use]
    pub fn is_current(&self, ticket: ProbeTicket) -> bool {
        self.in_flight == Some(ticket.0)
    }

    /// Forget the outstanding probe so its completion is ignored.
    pub fn abandon_probe(&mut self) {
        self.in_flight = None;
    }

    /// Apply a probe result. Returns `true` if state or error text changed.
    pub fn complete_probe(&mut self, ticket: ProbeTicket, result: ProbeResult) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.in_flight = None;

        let (state, error) = match result {
            ProbeResult::Ready => (ConnectivityState::Connected, None),
            ProbeResult::NotReady => (ConnectivityState::Disconnected, Some(NOT_READY_MESSAGE)),
            ProbeResult::Unreachable => (ConnectivityState::Disconnected, Some(UNREACHABLE_MESSAGE)),
        };

        let mut changed = false;
        if self.state != state {
            self.state = state;
            changed = true;
        }
        if self.error.as_deref() != error {
            self.error = error.map(str::to_owned);
            changed = true;
        }
        changed
    }
}
