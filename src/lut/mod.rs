// lut/mod.rs
//! Daily lighting curve lookup.
//!
//! The table maps a wall-clock instant to the curve state active at that
//! moment and the next boundary ahead of it. The built-in [`Lut`] works off
//! fixed local times from the configuration; a solar-backed table can slot
//! in behind the same [`StateTable`] trait.

use std::sync::RwLock;

use chrono::{DateTime, Local, NaiveTime};
use tracing::debug;

use crate::config::CurvePoint;
use crate::error::AppError;
use crate::models::{CircadianState, TransitionPlan};

const SECS_PER_DAY: f64 = 86_400.0;

pub trait StateTable: Send + Sync {
    fn current_state(&self, now: DateTime<Local>) -> CircadianState;
    fn next_state(&self, now: DateTime<Local>) -> CircadianState;
    fn secs_to_next(&self, now: DateTime<Local>) -> f64;

    /// Recomputes day-dependent anchors. Invoked once per day; must not
    /// disturb lookups happening in between.
    fn refresh_solar_anchors(&self);

    /// One consistent snapshot for the scheduler.
    fn plan(&self, now: DateTime<Local>) -> TransitionPlan {
        TransitionPlan {
            current: self.current_state(now),
            next: self.next_state(now),
            secs_to_next: self.secs_to_next(now),
        }
    }
}

#[derive(Debug, Clone)]
struct Anchor {
    at: NaiveTime,
    state: CircadianState,
}

/// Curve table over fixed local times, wrapping at midnight.
#[derive(Debug)]
pub struct Lut {
    anchors: RwLock<Vec<Anchor>>,
}

impl Lut {
    pub fn from_curve(curve: &[CurvePoint]) -> Result<Self, AppError> {
        if curve.is_empty() {
            return Err(AppError::InvalidCurve("curve is empty".into()));
        }
        let mut anchors = Vec::with_capacity(curve.len());
        for point in curve {
            let at = NaiveTime::parse_from_str(&point.at, "%H:%M").map_err(|e| {
                AppError::InvalidCurve(format!("bad time {:?} for {}: {e}", point.at, point.name))
            })?;
            anchors.push(Anchor {
                at,
                state: CircadianState {
                    name: point.name.clone(),
                    hue: point.hue,
                    saturation: point.saturation,
                    brightness: point.brightness,
                    kelvin: point.kelvin,
                },
            });
        }
        anchors.sort_by_key(|a| a.at);
        Ok(Self {
            anchors: RwLock::new(anchors),
        })
    }

    /// Index of the anchor active at `t`: the last one at or before it,
    /// wrapping to yesterday's final anchor before the first boundary.
    fn current_index(anchors: &[Anchor], t: NaiveTime) -> usize {
        anchors
            .iter()
            .rposition(|a| a.at <= t)
            .unwrap_or(anchors.len() - 1)
    }
}

impl StateTable for Lut {
    fn current_state(&self, now: DateTime<Local>) -> CircadianState {
        let anchors = self.anchors.read().unwrap_or_else(|e| e.into_inner());
        anchors[Self::current_index(&anchors, now.time())].state.clone()
    }

    fn next_state(&self, now: DateTime<Local>) -> CircadianState {
        let anchors = self.anchors.read().unwrap_or_else(|e| e.into_inner());
        let next = (Self::current_index(&anchors, now.time()) + 1) % anchors.len();
        anchors[next].state.clone()
    }

    fn secs_to_next(&self, now: DateTime<Local>) -> f64 {
        let anchors = self.anchors.read().unwrap_or_else(|e| e.into_inner());
        let next = (Self::current_index(&anchors, now.time()) + 1) % anchors.len();
        let mut secs = (anchors[next].at - now.time()).num_milliseconds() as f64 / 1000.0;
        if secs <= 0.0 {
            // next boundary is tomorrow
            secs += SECS_PER_DAY;
        }
        secs
    }

    fn refresh_solar_anchors(&self) {
        // Fixed-time anchors only need a re-sort; a solar table would
        // recompute sunrise/sunset instants for the new day here.
        let mut anchors = self.anchors.write().unwrap_or_else(|e| e.into_inner());
        anchors.sort_by_key(|a| a.at);
        debug!(anchors = anchors.len(), "solar anchors refreshed");
    }

    /// All three fields under one read lock, so a concurrent anchor refresh
    /// cannot tear the snapshot.
    fn plan(&self, now: DateTime<Local>) -> TransitionPlan {
        let anchors = self.anchors.read().unwrap_or_else(|e| e.into_inner());
        let current = Self::current_index(&anchors, now.time());
        let next = (current + 1) % anchors.len();
        let mut secs = (anchors[next].at - now.time()).num_milliseconds() as f64 / 1000.0;
        if secs <= 0.0 {
            secs += SECS_PER_DAY;
        }
        TransitionPlan {
            current: anchors[current].state.clone(),
            next: anchors[next].state.clone(),
            secs_to_next: secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn point(name: &str, at: &str, brightness: f64, kelvin: u16) -> CurvePoint {
        CurvePoint {
            name: name.into(),
            at: at.into(),
            hue: 0.0,
            saturation: 0.0,
            brightness,
            kelvin,
        }
    }

    fn table() -> Lut {
        Lut::from_curve(&[
            point("dawn", "06:00", 0.2, 3000),
            point("midday", "12:00", 1.0, 5000),
            point("sunset", "19:30", 0.5, 3200),
            point("night", "22:30", 0.0, 2700),
        ])
        .unwrap()
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 1, h, m, s).unwrap()
    }

    #[test]
    fn mid_afternoon_sits_between_midday_and_sunset() {
        let lut = table();
        assert_eq!(lut.current_state(at(15, 0, 0)).name, "midday");
        assert_eq!(lut.next_state(at(15, 0, 0)).name, "sunset");
        assert_eq!(lut.secs_to_next(at(15, 0, 0)), 4.5 * 3600.0);
    }

    #[test]
    fn exact_boundary_belongs_to_the_new_state() {
        let lut = table();
        assert_eq!(lut.current_state(at(12, 0, 0)).name, "midday");
        assert_eq!(lut.next_state(at(12, 0, 0)).name, "sunset");
    }

    #[test]
    fn early_morning_wraps_to_last_night_anchor() {
        let lut = table();
        assert_eq!(lut.current_state(at(3, 0, 0)).name, "night");
        assert_eq!(lut.next_state(at(3, 0, 0)).name, "dawn");
        assert_eq!(lut.secs_to_next(at(3, 0, 0)), 3.0 * 3600.0);
    }

    #[test]
    fn after_last_anchor_next_is_tomorrows_first() {
        let lut = table();
        assert_eq!(lut.current_state(at(23, 0, 0)).name, "night");
        assert_eq!(lut.next_state(at(23, 0, 0)).name, "dawn");
        // 1h to midnight + 6h to dawn
        assert_eq!(lut.secs_to_next(at(23, 0, 0)), 7.0 * 3600.0);
    }

    #[test]
    fn single_point_curve_cycles_to_itself() {
        let lut = Lut::from_curve(&[point("always", "08:00", 0.7, 4000)]).unwrap();
        assert_eq!(lut.current_state(at(10, 0, 0)).name, "always");
        assert_eq!(lut.next_state(at(10, 0, 0)).name, "always");
        assert_eq!(lut.secs_to_next(at(10, 0, 0)), 22.0 * 3600.0);
    }

    #[test]
    fn plan_matches_the_individual_lookups() {
        let lut = table();
        let now = at(15, 0, 0);
        let plan = lut.plan(now);
        assert_eq!(plan.current, lut.current_state(now));
        assert_eq!(plan.next, lut.next_state(now));
        assert_eq!(plan.secs_to_next, lut.secs_to_next(now));
    }

    #[test]
    fn refresh_does_not_change_lookups() {
        let lut = table();
        let before = lut.plan(at(15, 0, 0));
        lut.refresh_solar_anchors();
        assert_eq!(lut.plan(at(15, 0, 0)), before);
    }

    #[test]
    fn rejects_bad_times_and_empty_curves() {
        assert!(Lut::from_curve(&[]).is_err());
        assert!(Lut::from_curve(&[point("x", "25:99", 0.0, 2700)]).is_err());
    }
}
