use serde::Serialize;
use tokio::sync::mpsc;
use utoipa::ToSchema;

use crate::commands::SchedulerCommand;

/// One point on the daily lighting curve. Produced by the state table and
/// never mutated downstream; the scheduler only compares and consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct CircadianState {
    pub name: String,
    /// Degrees, 0..360.
    pub hue: f64,
    /// Normalized, 0..1.
    pub saturation: f64,
    /// Normalized, 0..1.
    pub brightness: f64,
    /// White point in kelvin.
    pub kelvin: u16,
}

/// Snapshot of the curve at one instant: where we are, where we go next,
/// and how long until the boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub current: CircadianState,
    pub next: CircadianState,
    pub secs_to_next: f64,
}

/// Logical power state of the whole fixture set. All fixtures are driven in
/// lockstep, so a single value covers the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn is_on(self) -> bool {
        matches!(self, PowerState::On)
    }

    pub fn from_on(on: bool) -> Self {
        if on { PowerState::On } else { PowerState::Off }
    }
}

/// The one message type pushed to switch clients, on connect and on every
/// power change.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PowerUpdate {
    pub power_on: bool,
}

/// Shared handler state: everything flows to the scheduler task through its
/// command channel.
#[derive(Debug)]
pub struct AppState {
    pub requests: mpsc::Sender<SchedulerCommand>,
}
