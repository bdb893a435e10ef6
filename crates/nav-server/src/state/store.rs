//! In-memory navigation state shared by the API and the detection loop.

use std::sync::{Arc, Mutex};

use nav_core::{Location, PromotionPolicy, RerouteCoordinator, Route, RouteError, RouteStore, TravelMode};

use crate::alerts::AlertHub;
use crate::config::Config;
use crate::loops::detection_loop::SchedulerHandle;
use crate::providers::RoutingProvider;

/// The selected endpoints and their route set.
#[derive(Debug)]
pub struct Navigation {
    pub source: Option<Location>,
    pub destination: Option<Location>,
    pub mode: TravelMode,
    pub routes: RouteStore,
    pub coordinator: RerouteCoordinator,
}

impl Navigation {
    pub fn new(policy: PromotionPolicy) -> Self {
        Self {
            source: None,
            destination: None,
            mode: TravelMode::Ground,
            routes: RouteStore::new(policy),
            coordinator: RerouteCoordinator::new(TravelMode::Ground),
        }
    }

    /// Install a fresh route set for a new source/destination pair.
    ///
    /// The previous session is kept untouched if `routes` is rejected.
    pub fn plan(
        &mut self,
        source: Location,
        destination: Location,
        mode: TravelMode,
        routes: Vec<Route>,
    ) -> Result<&Route, RouteError> {
        let mut store = RouteStore::new(self.routes.policy());
        store.load(routes)?;

        self.routes = store;
        self.coordinator.set_mode(mode);
        self.mode = mode;
        self.source = Some(source);
        self.destination = Some(destination);
        self.routes.current().ok_or(RouteError::NoRouteFound)
    }

    pub fn clear(&mut self) {
        self.routes.reset();
        self.coordinator.reset();
        self.source = None;
        self.destination = None;
    }
}

/// Application state: one navigation session plus its collaborators.
pub struct AppState {
    navigation: Mutex<Navigation>,
    alerts: AlertHub,
    routing: Arc<dyn RoutingProvider>,
    scheduler: SchedulerHandle,
}

impl AppState {
    pub fn new(config: &Config, routing: Arc<dyn RoutingProvider>, scheduler: SchedulerHandle) -> Self {
        let navigation = Navigation::new(config.promotion_policy);
        Self {
            navigation: Mutex::new(navigation),
            alerts: AlertHub::new(),
            routing,
            scheduler,
        }
    }

    pub fn alerts(&self) -> &AlertHub {
        &self.alerts
    }

    pub fn routing(&self) -> Arc<dyn RoutingProvider> {
        self.routing.clone()
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    /// Run `f` with exclusive access to the navigation session.
    ///
    /// `f` must not await; the detection loop relies on this to make a
    /// reroute atomic with respect to the next poll.
    pub fn with_navigation<R>(&self, f: impl FnOnce(&mut Navigation) -> R) -> R {
        let mut guard = match self.navigation.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}
