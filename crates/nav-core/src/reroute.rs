//! Obstacle -> reroute protocol.
//!
//! `on_obstacles` runs synchronously: the scheduler is paused before the
//! route store is touched, and no poll can start in between because the
//! caller holds the only handle to the scheduler for the whole call.

use std::time::Instant;

use crate::classifier::top_obstacle;
use crate::detection::DetectionMachine;
use crate::models::{Alert, AlertKind, AlertSeverity, Prediction, Route, TravelMode};
use crate::route_store::RouteStore;

/// The scheduler operations the coordinator is allowed to issue.
pub trait DetectionControl {
    /// Enter cooldown. Returns false if the scheduler was not polling.
    fn pause(&mut self, now: Instant) -> bool;
    fn resume(&mut self) -> bool;
}

impl DetectionControl for DetectionMachine {
    fn pause(&mut self, now: Instant) -> bool {
        DetectionMachine::pause(self, now)
    }

    fn resume(&mut self) -> bool {
        DetectionMachine::resume(self)
    }
}

/// Result of a handled detection.
#[derive(Debug, Clone, PartialEq)]
pub struct RerouteOutcome {
    pub alert: Alert,
    /// The promoted route, or `None` when the queue was exhausted.
    pub route: Option<Route>,
}

#[derive(Debug, Default)]
pub struct RerouteCoordinator {
    mode: TravelMode,
    obstacle_detected: bool,
    reroutes: u64,
}

impl RerouteCoordinator {
    pub fn new(mode: TravelMode) -> Self {
        Self {
            mode,
            obstacle_detected: false,
            reroutes: 0,
        }
    }

    pub fn mode(&self) -> TravelMode {
        self.mode
    }

    /// Switch mode for a new source/destination pair. Clears the obstacle flag.
    pub fn set_mode(&mut self, mode: TravelMode) {
        self.mode = mode;
        self.obstacle_detected = false;
    }

    pub fn obstacle_detected(&self) -> bool {
        self.obstacle_detected
    }

    pub fn reroutes(&self) -> u64 {
        self.reroutes
    }

    /// Handle a non-empty obstacle list from the scheduler.
    ///
    /// Returns `None` when the detection is ignored: empty list, an obstacle
    /// already being handled, or a scheduler that is not actively polling.
    pub fn on_obstacles<C: DetectionControl>(
        &mut self,
        obstacles: &[Prediction],
        scheduler: &mut C,
        routes: &mut RouteStore,
        now: Instant,
    ) -> Option<RerouteOutcome> {
        let label = top_obstacle(obstacles)?.label.clone();
        if self.obstacle_detected {
            return None;
        }
        if !scheduler.pause(now) {
            return None;
        }
        self.obstacle_detected = true;

        let outcome = match routes.promote_next() {
            Ok(route) => {
                self.reroutes += 1;
                RerouteOutcome {
                    alert: obstacle_alert(self.mode, &label, true),
                    route: Some(route.clone()),
                }
            }
            Err(_) => RerouteOutcome {
                alert: obstacle_alert(self.mode, &label, false),
                route: None,
            },
        };
        Some(outcome)
    }

    /// The user dismissed the alert: resume polling and clear the flag.
    ///
    /// Returns whether an obstacle was outstanding.
    pub fn acknowledge<C: DetectionControl>(&mut self, scheduler: &mut C) -> bool {
        let outstanding = self.obstacle_detected;
        self.obstacle_detected = false;
        scheduler.resume();
        outstanding
    }

    /// The scheduler left cooldown on its own; accept new detections.
    pub fn cooldown_elapsed(&mut self) {
        self.obstacle_detected = false;
    }

    /// Detection was torn down; forget any outstanding obstacle.
    pub fn reset(&mut self) {
        self.obstacle_detected = false;
    }
}

/// Alert text differs between ground and flight mode.
pub fn obstacle_alert(mode: TravelMode, label: &str, rerouted: bool) -> Alert {
    let headline = match mode {
        TravelMode::Ground => format!("Obstacle detected: {}.", label),
        TravelMode::Flight => format!("Flight path obstruction detected: {}.", label),
    };

    let alert = if rerouted {
        let action = match mode {
            TravelMode::Ground => "Rerouting to avoid obstacle.",
            TravelMode::Flight => "Adjusting flight path.",
        };
        Alert::transient(
            AlertKind::Obstacle,
            AlertSeverity::Warning,
            format!("{} {}", headline, action),
        )
    } else {
        let noun = mode.route_noun();
        Alert::transient(
            AlertKind::NoAlternative,
            AlertSeverity::Info,
            format!(
                "{} No alternative {} available; keeping the current {}.",
                headline, noun, noun
            ),
        )
    };

    alert.with_mode(mode).with_label(label)
}
