// scheduler/mod.rs
//! The transition scheduler: walks the fixture set along the daily curve
//! and layers manual power overrides on top of it without losing the
//! schedule.
//!
//! The scheduler task owns all mutable state. Power changes AND observer
//! membership arrive on the same command channel, so a registration
//! snapshot is read on the same task that writes the power state and can
//! never tear against a concurrent change.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::commands::{Origin, PowerRequest, SchedulerCommand};
use crate::config::FadeDurations;
use crate::driver::{ALL_FIXTURES, FixtureDriver};
use crate::error::AppError;
use crate::lut::StateTable;
use crate::models::{CircadianState, PowerState, PowerUpdate};
use crate::registry::ObserverRegistry;

/// Extra wait past the reported boundary, so the table has rolled over to
/// the new state before the next lookup.
const BOUNDARY_SLACK: Duration = Duration::from_secs(1);

/// Manual-override fades, resolved from configuration at startup.
#[derive(Debug, Clone, Copy)]
pub struct FadeSettings {
    pub fade_in: Duration,
    pub fade_out: Duration,
}

impl From<&FadeDurations> for FadeSettings {
    fn from(raw: &FadeDurations) -> Self {
        Self {
            fade_in: Duration::from_secs_f64(raw.in_secs),
            fade_out: Duration::from_secs_f64(raw.out_secs),
        }
    }
}

pub struct Scheduler {
    driver: Arc<dyn FixtureDriver>,
    table: Arc<dyn StateTable>,
    registry: Arc<ObserverRegistry>,
    fades: FadeSettings,
    power: watch::Sender<PowerState>,
    commands: mpsc::Receiver<SchedulerCommand>,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        driver: Arc<dyn FixtureDriver>,
        table: Arc<dyn StateTable>,
        registry: Arc<ObserverRegistry>,
        fades: FadeSettings,
        power: watch::Sender<PowerState>,
        commands: mpsc::Receiver<SchedulerCommand>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            driver,
            table,
            registry,
            fades,
            power,
            commands,
            shutdown,
        }
    }

    /// Runs until shutdown. Settles the fixtures on the current curve state,
    /// then loops: command the next state over the boundary delta, sleep to
    /// the boundary (plus slack), repeat. Power overrides arriving during
    /// the sleep are handled inline and the loop re-queries immediately
    /// afterwards, so an override never desynchronizes the schedule.
    /// Membership commands are serviced without disturbing the armed timer.
    pub async fn run(mut self) {
        let startup = self.table.current_state(Local::now());
        info!(state = %startup.name, "settling on current curve state");
        if let Err(e) = self.apply(&startup, self.fades.fade_in.as_secs_f64()).await {
            warn!(error = %e, "startup application failed, continuing with the schedule");
        }

        loop {
            if *self.shutdown.borrow() {
                info!("scheduler stopped");
                return;
            }
            let plan = self.table.plan(Local::now());
            // a boundary that already slipped past transitions immediately
            let fade = plan.secs_to_next.max(0.0);
            info!(state = %plan.next.name, secs = fade, "transitioning");
            match self.apply(&plan.next, fade).await {
                Ok(()) => {
                    metrics::counter!("circadiand_curve_transitions_total").increment(1);
                }
                Err(e) => {
                    metrics::counter!("circadiand_driver_failures_total").increment(1);
                    warn!(error = %e, "scheduled transition failed, retrying next cycle");
                }
            }

            let boundary = tokio::time::sleep(Duration::from_secs_f64(fade) + BOUNDARY_SLACK);
            tokio::pin!(boundary);
            loop {
                tokio::select! {
                    _ = self.shutdown.changed() => {
                        info!("scheduler stopped");
                        return;
                    }
                    _ = &mut boundary => break,
                    Some(cmd) = self.commands.recv() => match cmd {
                        SchedulerCommand::SetPower(req) => {
                            self.handle_request(req).await;
                            break;
                        }
                        SchedulerCommand::Register { id, sender } => {
                            self.registry.register(id, sender, *self.power.borrow());
                        }
                        SchedulerCommand::Deregister { id } => self.registry.deregister(id),
                    },
                }
            }
        }
    }

    /// The manual-override path. Fades to the requested power using the
    /// color of the *current* curve state, tells every other observer, then
    /// waits out the fade before the caller resumes the schedule. A newer
    /// power request arriving mid-fade supersedes this one: the driver
    /// honors the latest command it was given.
    async fn handle_request(&mut self, mut req: PowerRequest) {
        'apply: loop {
            let current = self.table.current_state(Local::now());
            let fade = match req.power {
                PowerState::On => self.fades.fade_in,
                PowerState::Off => self.fades.fade_out,
            };
            info!(power = ?req.power, origin = ?req.origin, "power override");

            let brightness = if req.power.is_on() { current.brightness } else { 0.0 };
            let applied = self
                .driver
                .apply_state(
                    ALL_FIXTURES,
                    current.hue,
                    current.saturation,
                    brightness,
                    current.kelvin,
                    fade.as_secs_f64(),
                )
                .await;

            match applied {
                Ok(()) => {
                    self.power.send_replace(req.power);
                    metrics::counter!("circadiand_power_switches_total").increment(1);
                    let update = PowerUpdate {
                        power_on: req.power.is_on(),
                    };
                    let skip = match req.origin {
                        Origin::Observer(id) => Some(id),
                        Origin::Internal => None,
                    };
                    self.registry.broadcast_except(&update, skip);
                }
                Err(e) => {
                    metrics::counter!("circadiand_driver_failures_total").increment(1);
                    warn!(error = %e, "power override failed, keeping last known state");
                }
            }

            let fade_done = tokio::time::sleep(fade);
            tokio::pin!(fade_done);
            loop {
                tokio::select! {
                    _ = self.shutdown.changed() => return,
                    _ = &mut fade_done => return,
                    Some(cmd) = self.commands.recv() => match cmd {
                        SchedulerCommand::SetPower(next) => {
                            req = next;
                            continue 'apply;
                        }
                        SchedulerCommand::Register { id, sender } => {
                            self.registry.register(id, sender, *self.power.borrow());
                        }
                        SchedulerCommand::Deregister { id } => self.registry.deregister(id),
                    },
                }
            }
        }
    }

    /// Commands every fixture toward `state`, clamping brightness to zero
    /// while the logical power is off. Color fields are sent unchanged.
    async fn apply(&self, state: &CircadianState, fade_secs: f64) -> Result<(), AppError> {
        let brightness = if self.power.borrow().is_on() {
            state.brightness
        } else {
            0.0
        };
        self.driver
            .apply_state(
                ALL_FIXTURES,
                state.hue,
                state.saturation,
                brightness,
                state.kelvin,
                fade_secs,
            )
            .await
            .map_err(AppError::DriverCommandFailed)
    }
}

/// Recomputes the table's solar anchors once per day, independently of the
/// transition loop's own timer.
pub async fn run_daily_refresh(table: Arc<dyn StateTable>, mut shutdown: watch::Receiver<bool>) {
    let mut every = tokio::time::interval(Duration::from_secs(60 * 60 * 24));
    every.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = every.tick() => {
                info!("refreshing solar anchors");
                table.refresh_solar_anchors();
            }
        }
    }
}
