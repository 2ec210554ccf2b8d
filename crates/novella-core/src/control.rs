//! Stop requests and run budgets.
//!
//! [`RunControl`] is shared between the simulation loop and whoever may
//! want to stop it (the runner's Ctrl-C handler, tests). The stop flag is
//! atomic so the loop can poll it between stages, and a [`Notify`] wakes
//! any in-flight generation that is racing against [`RunControl::stopped`].

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::config::SimulationSection;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The ending judgment reported the narrative complete.
    NarrativeComplete,
    /// A stop was requested.
    Stopped,
    /// The configured iteration budget was used up.
    IterationLimit,
    /// The configured wall-clock budget was used up.
    TimeLimit,
}

impl core::fmt::Display for EndReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            Self::NarrativeComplete => "narrative complete",
            Self::Stopped => "stopped",
            Self::IterationLimit => "iteration limit",
            Self::TimeLimit => "time limit",
        };
        f.write_str(label)
    }
}

/// Shared stop flag and budgets for one run.
#[derive(Debug)]
pub struct RunControl {
    /// Whether a stop has been requested.
    stop_requested: AtomicBool,

    /// Wakes tasks waiting in [`RunControl::stopped`].
    stop_notify: Notify,

    /// Wall-clock time when the run started.
    started_at: DateTime<Utc>,

    /// Maximum number of outer iterations (0 = unlimited).
    max_iterations: u64,

    /// Maximum wall-clock seconds (0 = unlimited).
    max_real_time_seconds: u64,
}

impl RunControl {
    /// Control state with explicit budgets; 0 means unlimited.
    pub fn new(max_iterations: u64, max_real_time_seconds: u64) -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            stop_notify: Notify::new(),
            started_at: Utc::now(),
            max_iterations,
            max_real_time_seconds,
        }
    }

    /// Control state with the budgets from the simulation section.
    pub fn from_config(simulation: &SimulationSection) -> Self {
        Self::new(simulation.max_iterations, simulation.max_real_time_seconds)
    }

    /// Control state without budgets.
    pub fn unlimited() -> Self {
        Self::new(0, 0)
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Request a clean stop and wake any waiter.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.stop_notify.notify_waiters();
    }

    /// Check whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Resolve once a stop has been requested.
    ///
    /// Returns immediately if one already has.
    pub async fn stopped(&self) {
        loop {
            // Register before checking the flag so a concurrent request
            // cannot slip between the check and the wait.
            let notified = self.stop_notify.notified();
            if self.is_stop_requested() {
                return;
            }
            notified.await;
        }
    }

    // -----------------------------------------------------------------------
    // Budgets
    // -----------------------------------------------------------------------

    /// When the run started.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whether `completed` iterations use up the iteration budget.
    pub const fn iteration_limit_reached(&self, completed: u64) -> bool {
        self.max_iterations > 0 && completed >= self.max_iterations
    }

    /// Whether the wall-clock budget has been used up.
    pub fn time_limit_reached(&self) -> bool {
        if self.max_real_time_seconds == 0 {
            return false;
        }
        let elapsed = Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds();
        // `num_seconds` can be negative if clocks are weird; treat as 0.
        let elapsed_u64 = u64::try_from(elapsed.max(0)).unwrap_or(u64::MAX);
        elapsed_u64 >= self.max_real_time_seconds
    }

    /// The reason the loop must end before starting iteration `completed`,
    /// if any.
    pub fn end_reason_before(&self, completed: u64) -> Option<EndReason> {
        if self.is_stop_requested() {
            Some(EndReason::Stopped)
        } else if self.iteration_limit_reached(completed) {
            Some(EndReason::IterationLimit)
        } else if self.time_limit_reached() {
            Some(EndReason::TimeLimit)
        } else {
            None
        }
    }
}
