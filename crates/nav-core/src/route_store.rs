//! Current route plus the queue of fallback routes for one source/destination pair.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Route;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    #[error("no route found between these locations")]
    NoRouteFound,
    #[error("no alternative route available")]
    NoAlternativeAvailable,
    #[error("invalid route: {0}")]
    InvalidRoute(String),
}

/// How the next alternative is chosen on a reroute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionPolicy {
    /// Pop the head of the queue (provider order).
    #[default]
    InOrder,
    /// Take the shortest remaining alternative by distance.
    Shortest,
}

impl std::str::FromStr for PromotionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in_order" | "fifo" => Ok(PromotionPolicy::InOrder),
            "shortest" => Ok(PromotionPolicy::Shortest),
            other => Err(format!("unknown promotion policy '{}'", other)),
        }
    }
}

#[derive(Debug, Default)]
pub struct RouteStore {
    current: Option<Route>,
    alternatives: VecDeque<Route>,
    policy: PromotionPolicy,
}

impl RouteStore {
    pub fn new(policy: PromotionPolicy) -> Self {
        Self {
            current: None,
            alternatives: VecDeque::new(),
            policy,
        }
    }

    /// Replace the route set: first route becomes current, the rest queue up.
    ///
    /// Nothing is changed on error.
    pub fn load(&mut self, routes: Vec<Route>) -> Result<&Route, RouteError> {
        if routes.is_empty() {
            return Err(RouteError::NoRouteFound);
        }
        for (i, route) in routes.iter().enumerate() {
            validate_route(route).map_err(|reason| {
                RouteError::InvalidRoute(format!("route {}: {}", i, reason))
            })?;
        }

        let mut queue: VecDeque<Route> = routes.into();
        let current = queue.pop_front().ok_or(RouteError::NoRouteFound)?;
        self.alternatives = queue;
        let current = self.current.insert(current);
        Ok(&*current)
    }

    /// Make the next alternative current and return it.
    ///
    /// With an empty queue this fails and the current route is untouched.
    pub fn promote_next(&mut self) -> Result<&Route, RouteError> {
        let index = match self.policy {
            PromotionPolicy::InOrder => 0,
            PromotionPolicy::Shortest => self
                .alternatives
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.distance_m.total_cmp(&b.distance_m))
                .map(|(i, _)| i)
                .unwrap_or(0),
        };

        let next = self
            .alternatives
            .remove(index)
            .ok_or(RouteError::NoAlternativeAvailable)?;
        let current = self.current.insert(next);
        Ok(&*current)
    }

    /// Drop both the current route and the queue.
    pub fn reset(&mut self) {
        self.current = None;
        self.alternatives.clear();
    }

    pub fn current(&self) -> Option<&Route> {
        self.current.as_ref()
    }

    pub fn alternatives(&self) -> impl Iterator<Item = &Route> {
        self.alternatives.iter()
    }

    pub fn alternatives_remaining(&self) -> usize {
        self.alternatives.len()
    }

    pub fn policy(&self) -> PromotionPolicy {
        self.policy
    }
}

fn validate_route(route: &Route) -> Result<(), String> {
    if route.geometry.len() < 2 {
        return Err(format!("geometry has {} point(s), need at least 2", route.geometry.len()));
    }
    if !route.distance_m.is_finite() || route.distance_m < 0.0 {
        return Err(format!("distance {} is not a non-negative number", route.distance_m));
    }
    if !route.duration_s.is_finite() || route.duration_s < 0.0 {
        return Err(format!("duration {} is not a non-negative number", route.duration_s));
    }
    for point in &route.geometry {
        point.validate().map_err(|e| e.to_string())?;
    }
    Ok(())
}
