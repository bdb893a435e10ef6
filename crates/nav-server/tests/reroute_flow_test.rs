//! Detection -> reroute -> alert -> resume flow with fake collaborators.
//!
//! Runs on tokio's paused clock, so cooldowns and poll intervals elapse
//! instantly and deterministically.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::json;
use tokio::sync::broadcast;
use tower::ServiceExt;

use nav_core::{
    generate_flight_routes, Alert, AlertKind, AlertSeverity, Coordinates, DetectionError,
    DetectionPhase, DetectionSnapshot, Frame, InitFailureReason, InitStage, Prediction, Route,
    TravelMode,
};
use nav_server::config::Config;
use nav_server::providers::{
    CameraProvider, Classifier, ClassifierLoader, RoutingError, RoutingProvider, VideoStream,
};
use nav_server::state::AppState;
use nav_server::{api, spawn_runtime, Collaborators};

fn ground_route(distance_m: f64) -> Route {
    let geometry = vec![
        Coordinates::new(40.7128, -74.006).unwrap(),
        Coordinates::new(41.0, -73.5).unwrap(),
        Coordinates::new(42.3601, -71.0589).unwrap(),
    ];
    Route::new(geometry, distance_m, distance_m / 20.0)
}

struct FakeRouting;

impl RoutingProvider for FakeRouting {
    fn fetch_routes<'a>(
        &'a self,
        source: &'a Coordinates,
        destination: &'a Coordinates,
        mode: TravelMode,
    ) -> BoxFuture<'a, Result<Vec<Route>, RoutingError>> {
        Box::pin(async move {
            match mode {
                TravelMode::Ground => Ok(vec![
                    ground_route(300_000.0),
                    ground_route(310_000.0),
                    ground_route(325_000.0),
                ]),
                TravelMode::Flight => Ok(generate_flight_routes(source, destination)),
            }
        })
    }
}

#[derive(Default)]
struct CameraCounters {
    opened: AtomicUsize,
    stopped: AtomicUsize,
}

/// How the fake camera answers `open`.
#[derive(Default)]
struct CameraScript {
    /// Leading opens that fail with a permission denial.
    denials: usize,
    /// Time a successful open takes.
    open_delay: Duration,
}

struct FakeCamera {
    counters: Arc<CameraCounters>,
    denials_left: AtomicUsize,
    open_delay: Duration,
}

struct FakeStream {
    counters: Arc<CameraCounters>,
}

impl CameraProvider for FakeCamera {
    fn open(&self) -> BoxFuture<'_, Result<Arc<dyn VideoStream>, DetectionError>> {
        Box::pin(async move {
            let denied = self
                .denials_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if denied {
                return Err(DetectionError::CameraPermissionDenied);
            }
            if !self.open_delay.is_zero() {
                tokio::time::sleep(self.open_delay).await;
            }
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeStream {
                counters: self.counters.clone(),
            }) as Arc<dyn VideoStream>)
        })
    }
}

impl VideoStream for FakeStream {
    fn capture(&self) -> BoxFuture<'_, Result<Frame, DetectionError>> {
        Box::pin(async {
            Ok(Frame {
                id: 0,
                captured_at: Utc::now(),
                width: 640,
                height: 480,
                data: Vec::new(),
            })
        })
    }

    fn stop(&self) {
        self.counters.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

enum Step {
    Detect(Vec<Prediction>),
    Fail,
    Hang,
}

/// Plays back scripted steps; an empty script detects nothing.
struct ScriptedClassifier {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
}

impl Classifier for ScriptedClassifier {
    fn classify<'a>(
        &'a self,
        _frame: &'a Frame,
    ) -> BoxFuture<'a, Result<Vec<Prediction>, DetectionError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Detect(predictions)) => Ok(predictions),
                Some(Step::Fail) => Err(DetectionError::ClassificationFailed("model hiccup".into())),
                Some(Step::Hang) => futures::future::pending().await,
                None => Ok(Vec::new()),
            }
        })
    }
}

struct ScriptedLoader {
    classifier: Option<Arc<ScriptedClassifier>>,
}

impl ClassifierLoader for ScriptedLoader {
    fn load(&self) -> BoxFuture<'_, Result<Arc<dyn Classifier>, DetectionError>> {
        Box::pin(async move {
            match self.classifier.clone() {
                Some(classifier) => Ok(classifier as Arc<dyn Classifier>),
                None => Err(DetectionError::ClassifierInitFailed {
                    reason: InitFailureReason::BackendUnavailable,
                    message: "no accelerator".into(),
                }),
            }
        })
    }
}

struct Harness {
    app: axum::Router,
    state: Arc<AppState>,
    camera: Arc<CameraCounters>,
    classifier: Option<Arc<ScriptedClassifier>>,
    alerts: broadcast::Receiver<Alert>,
    _shutdown: broadcast::Sender<()>,
}

fn person(confidence: f32) -> Prediction {
    Prediction::new("person", confidence)
}

fn harness(steps: Option<Vec<Step>>) -> Harness {
    harness_with(steps, CameraScript::default())
}

fn harness_with(steps: Option<Vec<Step>>, script: CameraScript) -> Harness {
    let camera = Arc::new(CameraCounters::default());
    let classifier = steps.map(|steps| {
        Arc::new(ScriptedClassifier {
            steps: Mutex::new(steps.into()),
            calls: AtomicUsize::new(0),
        })
    });
    let collaborators = Collaborators {
        camera: Arc::new(FakeCamera {
            counters: camera.clone(),
            denials_left: AtomicUsize::new(script.denials),
            open_delay: script.open_delay,
        }),
        loader: Arc::new(ScriptedLoader {
            classifier: classifier.clone(),
        }),
        routing: Arc::new(FakeRouting),
    };

    let (shutdown, _) = broadcast::channel(1);
    let (state, _task) = spawn_runtime(Config::default(), collaborators, shutdown.subscribe());
    let alerts = state.alerts().subscribe();
    Harness {
        app: api::routes().with_state(state.clone()),
        state,
        camera,
        classifier,
        alerts,
        _shutdown: shutdown,
    }
}

impl Harness {
    async fn navigate(&self, mode: &str, from: &str, to: &str) {
        self.navigate_with(json!({
            "source": {"preset": from},
            "destination": {"preset": to},
            "mode": mode
        }))
        .await;
    }

    async fn navigate_with(&self, body: serde_json::Value) -> serde_json::Value {
        let req = Request::builder()
            .method("POST")
            .uri("/v1/navigation")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let res = self.app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn post(&self, uri: &str) -> StatusCode {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.app.clone().oneshot(req).await.unwrap().status()
    }

    async fn wait_until(&self, check: impl FnMut(&DetectionSnapshot) -> bool) -> DetectionSnapshot {
        let mut rx = self.state.scheduler().watch();
        let snapshot = tokio::time::timeout(Duration::from_secs(600), rx.wait_for(check))
            .await
            .expect("scheduler reached expected state")
            .expect("detection loop alive")
            .clone();
        snapshot
    }

    async fn next_alert(&mut self, kind: AlertKind) -> Alert {
        loop {
            let alert = self.alerts.recv().await.expect("alert stream open");
            if alert.kind == kind {
                return alert;
            }
        }
    }

    fn classify_calls(&self) -> usize {
        self.classifier
            .as_ref()
            .map_or(0, |c| c.calls.load(Ordering::SeqCst))
    }

    fn current_distance(&self) -> Option<f64> {
        self.state
            .with_navigation(|nav| nav.routes.current().map(|r| r.distance_m))
    }
}

#[tokio::test(start_paused = true)]
async fn ground_trip_reroutes_once_and_resumes_after_cooldown() {
    let mut h = harness(Some(vec![Step::Detect(vec![Prediction::new("bicycle", 0.8)])]));
    let planned = h
        .navigate_with(json!({
            "source": {"lat": 40.0, "lng": -74.0},
            "destination": {"lat": 34.0, "lng": -118.0},
            "mode": "ground"
        }))
        .await;
    assert_eq!(planned["alternatives_remaining"], 2);
    assert_eq!(planned["current_route"]["distance_m"], 300_000.0);

    let alert = h.next_alert(AlertKind::Obstacle).await;
    assert_eq!(alert.mode, TravelMode::Ground);
    assert_eq!(alert.label.as_deref(), Some("bicycle"));
    assert_eq!(h.current_distance(), Some(310_000.0));
    assert_eq!(
        h.state.with_navigation(|nav| nav.routes.alternatives_remaining()),
        1
    );

    h.wait_until(|s| s.phase == DetectionPhase::Paused).await;
    let resumed = h.wait_until(|s| s.phase == DetectionPhase::Active).await;
    assert!(resumed.cooldown_remaining_ms.is_none());
    assert!(!h.state.with_navigation(|nav| nav.coordinator.obstacle_detected()));
}

#[tokio::test(start_paused = true)]
async fn obstacles_promote_alternatives_until_exhausted() {
    let mut h = harness(Some(vec![
        Step::Detect(vec![]),
        Step::Detect(vec![Prediction::new("car", 0.9), Prediction::new("kite", 0.99)]),
        Step::Detect(vec![Prediction::new("truck", 0.8)]),
        Step::Detect(vec![person(0.7)]),
    ]));
    h.navigate("ground", "New York", "Boston").await;
    assert_eq!(h.current_distance(), Some(300_000.0));

    let alert = h.next_alert(AlertKind::Obstacle).await;
    assert_eq!(alert.message, "Obstacle detected: car. Rerouting to avoid obstacle.");
    assert_eq!(alert.severity, AlertSeverity::Warning);
    assert_eq!(alert.mode, TravelMode::Ground);
    assert_eq!(h.current_distance(), Some(310_000.0));

    let paused = h.wait_until(|s| s.phase == DetectionPhase::Paused).await;
    assert!(paused.cooldown_remaining_ms.is_some());
    let calls_at_pause = h.classify_calls();
    tokio::time::sleep(Duration::from_millis(4000)).await;
    assert_eq!(h.classify_calls(), calls_at_pause, "no polls during cooldown");

    h.wait_until(|s| s.phase == DetectionPhase::Active).await;
    let alert = h.next_alert(AlertKind::Obstacle).await;
    assert_eq!(alert.label.as_deref(), Some("truck"));
    assert_eq!(h.current_distance(), Some(325_000.0));

    let alert = h.next_alert(AlertKind::NoAlternative).await;
    assert_eq!(alert.severity, AlertSeverity::Info);
    assert!(alert.message.contains("No alternative route available"));
    assert_eq!(h.current_distance(), Some(325_000.0));

    let nav = h.state.with_navigation(|nav| nav.coordinator.reroutes());
    assert_eq!(nav, 2);
}

#[tokio::test(start_paused = true)]
async fn flight_mode_alerts_use_flight_wording() {
    let mut h = harness(Some(vec![Step::Detect(vec![person(0.95)])]));
    h.navigate("flight", "ORD Airport", "DEN Airport").await;

    let alert = h.next_alert(AlertKind::Obstacle).await;
    assert_eq!(
        alert.message,
        "Flight path obstruction detected: person. Adjusting flight path."
    );
    assert_eq!(alert.mode, TravelMode::Flight);
    let remaining = h.state.with_navigation(|nav| nav.routes.alternatives_remaining());
    assert_eq!(remaining, 1);
}

#[tokio::test(start_paused = true)]
async fn acknowledgment_resumes_before_cooldown() {
    let mut h = harness(Some(vec![Step::Detect(vec![person(0.9)])]));
    h.navigate("ground", "Chicago", "Denver").await;
    h.next_alert(AlertKind::Obstacle).await;
    h.wait_until(|s| s.phase == DetectionPhase::Paused).await;

    assert_eq!(h.post("/v1/alerts/ack").await, StatusCode::ACCEPTED);
    let resumed = h.wait_until(|s| s.phase == DetectionPhase::Active).await;
    assert!(resumed.cooldown_remaining_ms.is_none());
    assert!(!h.state.with_navigation(|nav| nav.coordinator.obstacle_detected()));
}

#[tokio::test(start_paused = true)]
async fn low_confidence_and_unlisted_labels_do_not_reroute() {
    let mut h = harness(Some(vec![
        Step::Detect(vec![person(0.59), Prediction::new("dog", 0.99)]),
        Step::Fail,
        Step::Detect(vec![person(0.6)]),
    ]));
    h.navigate("ground", "Austin", "Seattle").await;

    let alert = h.next_alert(AlertKind::Obstacle).await;
    assert_eq!(alert.label.as_deref(), Some("person"));
    assert_eq!(h.classify_calls(), 3, "failed poll was swallowed and retried");
    assert_eq!(h.current_distance(), Some(310_000.0));
}

#[tokio::test(start_paused = true)]
async fn teardown_during_classification_releases_camera_once() {
    let h = harness(Some(vec![Step::Hang]));
    h.navigate("ground", "New York", "Boston").await;

    h.wait_until(|s| s.busy).await;
    assert_eq!(h.camera.opened.load(Ordering::SeqCst), 1);
    assert_eq!(h.camera.stopped.load(Ordering::SeqCst), 0);

    assert_eq!(h.post("/v1/detection/stop").await, StatusCode::ACCEPTED);
    let idle = h.wait_until(|s| s.phase == DetectionPhase::Idle).await;
    assert!(!idle.busy);
    assert_eq!(h.camera.stopped.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.camera.stopped.load(Ordering::SeqCst), 1);
    assert_eq!(h.classify_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn classifier_failure_releases_opened_camera() {
    let mut h = harness(None);
    assert_eq!(h.post("/v1/detection/start").await, StatusCode::ACCEPTED);

    let snapshot = h.wait_until(|s| s.phase == DetectionPhase::Error).await;
    let error = snapshot.error.expect("init failure");
    assert_eq!(error.stage, InitStage::Classifier);
    assert_eq!(error.reason, InitFailureReason::BackendUnavailable);

    let alert = h.next_alert(AlertKind::DetectionFailed).await;
    assert!(alert.persistent && alert.retryable);
    assert_eq!(h.camera.opened.load(Ordering::SeqCst), 1);
    assert_eq!(h.camera.stopped.load(Ordering::SeqCst), 1);

    // Error is terminal: start is ignored until retry.
    assert_eq!(h.post("/v1/detection/start").await, StatusCode::ACCEPTED);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.camera.opened.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_after_permission_denial_reaches_active() {
    let mut h = harness_with(
        Some(vec![Step::Detect(vec![person(0.9)])]),
        CameraScript {
            denials: 1,
            open_delay: Duration::from_millis(500),
        },
    );
    assert_eq!(h.post("/v1/detection/start").await, StatusCode::ACCEPTED);

    let failed = h.wait_until(|s| s.phase == DetectionPhase::Error).await;
    let error = failed.error.expect("init failure");
    assert_eq!(error.stage, InitStage::Camera);
    assert_eq!(error.reason, InitFailureReason::PermissionDenied);
    h.next_alert(AlertKind::DetectionFailed).await;
    assert!(h.state.alerts().outstanding().is_some());
    assert_eq!(h.camera.opened.load(Ordering::SeqCst), 0);

    assert_eq!(h.post("/v1/detection/retry").await, StatusCode::ACCEPTED);
    let initializing = h.wait_until(|s| s.phase == DetectionPhase::Initializing).await;
    assert!(initializing.error.is_none());
    assert!(h.state.alerts().outstanding().is_none(), "retry dismisses the failure notice");

    h.wait_until(|s| s.phase == DetectionPhase::Active).await;
    h.next_alert(AlertKind::DetectionReady).await;
    assert_eq!(h.camera.opened.load(Ordering::SeqCst), 1);

    // Routes are planned after recovery; the scripted detection then reroutes.
    h.navigate("ground", "New York", "Boston").await;
    let alert = h.next_alert(AlertKind::Obstacle).await;
    assert_eq!(alert.label.as_deref(), Some("person"));
    assert_eq!(h.current_distance(), Some(310_000.0));
}
