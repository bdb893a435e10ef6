//! Detection scheduler loop.
//!
//! Owns the camera stream, the classifier and the [`DetectionMachine`].
//! Initialization and each classification run in their own task so the
//! loop stays responsive to commands; at most one of each is in flight.
//! Poll results are applied to the navigation session without awaiting,
//! so a reroute pauses the scheduler before any further poll can start.

use std::future::pending;
use std::sync::Arc;

use nav_core::{
    Alert, AlertKind, AlertSeverity, DetectionError, DetectionMachine, DetectionSnapshot,
    DetectionTiming, InitFailure, InitFailureReason, InitStage, ObstacleFilter, Prediction,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

use crate::alerts::AlertSink;
use crate::providers::{CameraGuard, CameraProvider, Classifier, ClassifierLoader};
use crate::state::AppState;

const COMMAND_QUEUE_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    Start,
    Stop,
    Retry,
    /// The user dismissed the obstacle alert.
    Acknowledge,
}

/// Sending side kept in [`AppState`].
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<SchedulerCommand>,
    snapshot: watch::Receiver<DetectionSnapshot>,
}

impl SchedulerHandle {
    /// Returns false if the loop has exited.
    pub async fn send(&self, command: SchedulerCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    pub fn snapshot(&self) -> DetectionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<DetectionSnapshot> {
        self.snapshot.clone()
    }
}

/// Receiving side, consumed by [`run_detection_loop`].
pub struct SchedulerInbox {
    commands: mpsc::Receiver<SchedulerCommand>,
    snapshot: watch::Sender<DetectionSnapshot>,
}

pub fn scheduler_channel() -> (SchedulerHandle, SchedulerInbox) {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let (snapshot_tx, snapshot_rx) = watch::channel(DetectionSnapshot::default());
    (
        SchedulerHandle {
            commands: command_tx,
            snapshot: snapshot_rx,
        },
        SchedulerInbox {
            commands: command_rx,
            snapshot: snapshot_tx,
        },
    )
}

/// Collaborators and parameters for the loop.
#[derive(Clone)]
pub struct DetectionDeps {
    pub camera: Arc<dyn CameraProvider>,
    pub loader: Arc<dyn ClassifierLoader>,
    pub filter: ObstacleFilter,
    pub timing: DetectionTiming,
}

/// A ready camera plus classifier.
struct Session {
    camera: CameraGuard,
    classifier: Arc<dyn Classifier>,
}

type InitTask = JoinHandle<Result<Session, DetectionError>>;
type PollTask = JoinHandle<Result<Vec<Prediction>, DetectionError>>;

struct Scheduler {
    deps: DetectionDeps,
    machine: DetectionMachine,
    session: Option<Session>,
    init_task: Option<InitTask>,
    poll_task: Option<PollTask>,
}

/// Start the detection scheduler loop.
pub async fn run_detection_loop(
    state: Arc<AppState>,
    deps: DetectionDeps,
    inbox: SchedulerInbox,
    mut shutdown: broadcast::Receiver<()>,
) {
    let SchedulerInbox {
        mut commands,
        snapshot,
    } = inbox;

    let mut ticker = interval(deps.timing.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut scheduler = Scheduler {
        machine: DetectionMachine::new(deps.timing),
        deps,
        session: None,
        init_task: None,
        poll_task: None,
    };

    loop {
        let cooldown = scheduler.machine.cooldown_deadline().map(Instant::from_std);

        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Detection loop shutting down");
                scheduler.stop(&state);
                break;
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    scheduler.stop(&state);
                    break;
                };
                scheduler.handle_command(&state, command);
            }
            result = join_slot(&mut scheduler.init_task) => {
                scheduler.init_task = None;
                scheduler.on_init(&state, result);
            }
            result = join_slot(&mut scheduler.poll_task) => {
                scheduler.poll_task = None;
                scheduler.on_poll(&state, result);
            }
            _ = sleep_until_opt(cooldown) => {
                if scheduler.machine.expire_cooldown(now()) {
                    state.with_navigation(|nav| nav.coordinator.cooldown_elapsed());
                    tracing::info!("Detection cooldown elapsed, resuming polls");
                }
            }
            _ = ticker.tick() => {
                scheduler.poll();
            }
        }

        let next = scheduler.machine.snapshot(now());
        snapshot.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

impl Scheduler {
    fn handle_command(&mut self, state: &AppState, command: SchedulerCommand) {
        match command {
            SchedulerCommand::Start => {
                if self.machine.start() {
                    tracing::info!("Detection initializing");
                    self.spawn_init();
                } else {
                    tracing::debug!("Start ignored in phase {:?}", self.machine.phase());
                }
            }
            SchedulerCommand::Retry => {
                if self.machine.retry() {
                    state.alerts().dismiss_kind(AlertKind::DetectionFailed);
                    tracing::info!("Detection retrying initialization");
                    self.spawn_init();
                } else {
                    tracing::debug!("Retry ignored in phase {:?}", self.machine.phase());
                }
            }
            SchedulerCommand::Stop => self.stop(state),
            SchedulerCommand::Acknowledge => {
                let machine = &mut self.machine;
                let outstanding = state.with_navigation(|nav| nav.coordinator.acknowledge(machine));
                if outstanding {
                    tracing::info!("Obstacle alert acknowledged, resuming polls");
                }
            }
        }
    }

    fn spawn_init(&mut self) {
        let camera = self.deps.camera.clone();
        let loader = self.deps.loader.clone();
        self.init_task = Some(tokio::spawn(async move {
            // Guard the stream as soon as it exists so an abort releases it.
            let (camera, classifier) = tokio::join!(
                async { camera.open().await.map(CameraGuard::new) },
                loader.load(),
            );
            Ok::<_, DetectionError>(Session {
                camera: camera?,
                classifier: classifier?,
            })
        }));
    }

    fn on_init(&mut self, state: &AppState, result: Result<Result<Session, DetectionError>, JoinError>) {
        match result {
            Ok(Ok(session)) => {
                if self.machine.ready(now()) {
                    tracing::info!(
                        "Detection active, first poll after {:?}",
                        self.deps.timing.grace_period
                    );
                    self.session = Some(session);
                    state.alerts().raise(Alert::transient(
                        AlertKind::DetectionReady,
                        AlertSeverity::Info,
                        "Obstacle detection active.",
                    ));
                }
            }
            Ok(Err(err)) => {
                tracing::error!("Detection initialization failed: {}", err);
                let failure = err.init_failure().unwrap_or_else(|| InitFailure {
                    stage: InitStage::Classifier,
                    reason: InitFailureReason::Unknown,
                    message: err.to_string(),
                });
                self.machine.fail(failure);
                state
                    .alerts()
                    .raise(Alert::persistent(AlertKind::DetectionFailed, err.user_message()));
            }
            Err(err) if err.is_cancelled() => {}
            Err(err) => {
                tracing::error!("Detection initialization task failed: {}", err);
                self.machine.fail(InitFailure {
                    stage: InitStage::Classifier,
                    reason: InitFailureReason::Unknown,
                    message: err.to_string(),
                });
                state.alerts().raise(Alert::persistent(
                    AlertKind::DetectionFailed,
                    "Obstacle detection could not start.",
                ));
            }
        }
    }

    fn poll(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let Some(stream) = session.camera.stream() else {
            return;
        };
        if !self.machine.begin_poll(now()) {
            return;
        }

        let classifier = session.classifier.clone();
        let filter = self.deps.filter.clone();
        self.poll_task = Some(tokio::spawn(async move {
            let frame = stream.capture().await?;
            let predictions = classifier.classify(&frame).await?;
            Ok::<_, DetectionError>(filter.filter(&predictions))
        }));
    }

    fn on_poll(
        &mut self,
        state: &AppState,
        result: Result<Result<Vec<Prediction>, DetectionError>, JoinError>,
    ) {
        self.machine.finish_poll();

        let obstacles = match result {
            Ok(Ok(obstacles)) => obstacles,
            Ok(Err(err)) => {
                tracing::warn!("Classification failed, retrying next tick: {}", err);
                return;
            }
            Err(err) if err.is_cancelled() => return,
            Err(err) => {
                tracing::warn!("Classification task failed: {}", err);
                return;
            }
        };
        if obstacles.is_empty() {
            return;
        }

        let machine = &mut self.machine;
        let at = now();
        let outcome = state.with_navigation(|nav| {
            nav.coordinator
                .on_obstacles(&obstacles, machine, &mut nav.routes, at)
        });

        match outcome {
            Some(outcome) => {
                match outcome.route.as_ref() {
                    Some(route) => tracing::warn!(
                        "Obstacle detected, rerouted to alternative ({:.1} km)",
                        route.summary().distance_km
                    ),
                    None => tracing::warn!("Obstacle detected, no alternative route left"),
                }
                state.alerts().raise(outcome.alert);
            }
            None => tracing::debug!("Obstacle ignored, already handling one"),
        }
    }

    /// Teardown on every exit path: abort tasks, release the camera, go idle.
    fn stop(&mut self, state: &AppState) {
        if let Some(task) = self.init_task.take() {
            task.abort();
        }
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
        if let Some(mut session) = self.session.take() {
            session.camera.release();
        }
        state.with_navigation(|nav| nav.coordinator.reset());
        if self.machine.stop() {
            tracing::info!("Detection stopped");
        }
    }
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

async fn join_slot<T>(slot: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match slot.as_mut() {
        Some(handle) => handle.await,
        None => pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}
