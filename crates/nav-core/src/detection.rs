//! Detection scheduling state machine.
//!
//! Pure state: the caller supplies the clock. The async runtime that owns
//! the camera, the classifier and the poll timer drives this machine and is
//! the only writer of its state.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitFailureReason {
    PermissionDenied,
    BackendUnavailable,
    Unknown,
}

impl fmt::Display for InitFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InitFailureReason::PermissionDenied => "permission denied",
            InitFailureReason::BackendUnavailable => "backend unavailable",
            InitFailureReason::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitStage {
    Camera,
    Classifier,
}

/// Why initialization stopped in the error state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitFailure {
    pub stage: InitStage,
    pub reason: InitFailureReason,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectionError {
    #[error("camera permission denied")]
    CameraPermissionDenied,
    #[error("camera backend unavailable: {0}")]
    CameraUnavailable(String),
    #[error("camera failed: {0}")]
    CameraFailed(String),
    #[error("classifier initialization failed ({reason}): {message}")]
    ClassifierInitFailed {
        reason: InitFailureReason,
        message: String,
    },
    /// A single poll failed; the next tick tries again.
    #[error("classification failed: {0}")]
    ClassificationFailed(String),
}

impl DetectionError {
    /// Initialization failures carry a stage and reason; per-poll ones do not.
    pub fn init_failure(&self) -> Option<InitFailure> {
        let (stage, reason) = match self {
            DetectionError::CameraPermissionDenied => {
                (InitStage::Camera, InitFailureReason::PermissionDenied)
            }
            DetectionError::CameraUnavailable(_) => {
                (InitStage::Camera, InitFailureReason::BackendUnavailable)
            }
            DetectionError::CameraFailed(_) => (InitStage::Camera, InitFailureReason::Unknown),
            DetectionError::ClassifierInitFailed { reason, .. } => (InitStage::Classifier, *reason),
            DetectionError::ClassificationFailed(_) => return None,
        };
        Some(InitFailure {
            stage,
            reason,
            message: self.to_string(),
        })
    }

    /// User-facing text for the persistent error notice.
    pub fn user_message(&self) -> String {
        match self {
            DetectionError::CameraPermissionDenied => {
                "Could not access camera. Please check permissions.".to_string()
            }
            DetectionError::CameraUnavailable(_) => {
                "No camera is available on this device.".to_string()
            }
            DetectionError::ClassifierInitFailed { .. } => {
                "Object detection model failed to load.".to_string()
            }
            other => format!("Obstacle detection could not start: {}", other),
        }
    }
}

/// When a paused scheduler goes back to polling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumePolicy {
    /// After the cooldown elapses, or earlier on acknowledgment.
    #[default]
    Cooldown,
    /// Only when the alert is acknowledged.
    Acknowledge,
}

impl std::str::FromStr for ResumePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cooldown" => Ok(ResumePolicy::Cooldown),
            "acknowledge" | "ack" => Ok(ResumePolicy::Acknowledge),
            other => Err(format!("unknown resume policy '{}'", other)),
        }
    }
}

/// Timing parameters for the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionTiming {
    pub poll_interval: Duration,
    /// Delay between becoming active and the first poll
    pub grace_period: Duration,
    pub cooldown: Duration,
    pub resume_policy: ResumePolicy,
}

impl Default for DetectionTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            grace_period: Duration::from_millis(3000),
            cooldown: Duration::from_millis(5000),
            resume_policy: ResumePolicy::Cooldown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionState {
    Idle,
    Initializing,
    Active,
    /// `until` is `None` when only an acknowledgment resumes polling.
    Paused { until: Option<Instant> },
    Error(InitFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionPhase {
    Idle,
    Initializing,
    Active,
    Paused,
    Error,
}

/// Serializable view of the scheduler for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSnapshot {
    pub phase: DetectionPhase,
    /// A classification is in flight
    pub busy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<InitFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_remaining_ms: Option<u64>,
    pub polls_completed: u64,
}

impl Default for DetectionSnapshot {
    fn default() -> Self {
        Self {
            phase: DetectionPhase::Idle,
            busy: false,
            error: None,
            cooldown_remaining_ms: None,
            polls_completed: 0,
        }
    }
}

#[derive(Debug)]
pub struct DetectionMachine {
    state: DetectionState,
    timing: DetectionTiming,
    polls_allowed_at: Option<Instant>,
    in_flight: bool,
    polls_completed: u64,
}

impl DetectionMachine {
    pub fn new(timing: DetectionTiming) -> Self {
        Self {
            state: DetectionState::Idle,
            timing,
            polls_allowed_at: None,
            in_flight: false,
            polls_completed: 0,
        }
    }

    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    pub fn phase(&self) -> DetectionPhase {
        match self.state {
            DetectionState::Idle => DetectionPhase::Idle,
            DetectionState::Initializing => DetectionPhase::Initializing,
            DetectionState::Active => DetectionPhase::Active,
            DetectionState::Paused { .. } => DetectionPhase::Paused,
            DetectionState::Error(_) => DetectionPhase::Error,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, DetectionState::Active)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Idle -> Initializing.
    pub fn start(&mut self) -> bool {
        if !matches!(self.state, DetectionState::Idle) {
            return false;
        }
        self.state = DetectionState::Initializing;
        true
    }

    /// Error -> Initializing. The only way out of the error state.
    pub fn retry(&mut self) -> bool {
        if !matches!(self.state, DetectionState::Error(_)) {
            return false;
        }
        self.state = DetectionState::Initializing;
        true
    }

    /// Initializing -> Active once both camera and classifier are ready.
    pub fn ready(&mut self, now: Instant) -> bool {
        if !matches!(self.state, DetectionState::Initializing) {
            return false;
        }
        self.state = DetectionState::Active;
        self.polls_allowed_at = Some(now + self.timing.grace_period);
        true
    }

    /// Any -> Error.
    pub fn fail(&mut self, failure: InitFailure) {
        self.state = DetectionState::Error(failure);
        self.polls_allowed_at = None;
        self.in_flight = false;
    }

    pub fn can_poll(&self, now: Instant) -> bool {
        self.is_active()
            && !self.in_flight
            && self.polls_allowed_at.map_or(false, |at| now >= at)
    }

    /// Claim the in-flight slot. Returns false if a poll may not start now.
    pub fn begin_poll(&mut self, now: Instant) -> bool {
        if !self.can_poll(now) {
            return false;
        }
        self.in_flight = true;
        true
    }

    /// Release the in-flight slot, whatever the poll's outcome.
    pub fn finish_poll(&mut self) {
        if self.in_flight {
            self.in_flight = false;
            self.polls_completed += 1;
        }
    }

    /// Active -> Paused. Ignored in any other state.
    pub fn pause(&mut self, now: Instant) -> bool {
        if !self.is_active() {
            return false;
        }
        let until = match self.timing.resume_policy {
            ResumePolicy::Cooldown => Some(now + self.timing.cooldown),
            ResumePolicy::Acknowledge => None,
        };
        self.state = DetectionState::Paused { until };
        true
    }

    /// Paused -> Active on an explicit resume signal.
    pub fn resume(&mut self) -> bool {
        if !matches!(self.state, DetectionState::Paused { .. }) {
            return false;
        }
        self.state = DetectionState::Active;
        true
    }

    /// Paused -> Active when the cooldown deadline has passed.
    pub fn expire_cooldown(&mut self, now: Instant) -> bool {
        match self.state {
            DetectionState::Paused { until: Some(until) } if now >= until => {
                self.state = DetectionState::Active;
                true
            }
            _ => false,
        }
    }

    pub fn cooldown_deadline(&self) -> Option<Instant> {
        match self.state {
            DetectionState::Paused { until } => until,
            _ => None,
        }
    }

    /// Any -> Idle (teardown).
    pub fn stop(&mut self) -> bool {
        self.in_flight = false;
        self.polls_allowed_at = None;
        if matches!(self.state, DetectionState::Idle) {
            return false;
        }
        self.state = DetectionState::Idle;
        true
    }

    pub fn snapshot(&self, now: Instant) -> DetectionSnapshot {
        let error = match &self.state {
            DetectionState::Error(failure) => Some(failure.clone()),
            _ => None,
        };
        DetectionSnapshot {
            phase: self.phase(),
            busy: self.in_flight,
            error,
            cooldown_remaining_ms: self
                .cooldown_deadline()
                .map(|until| until.saturating_duration_since(now).as_millis() as u64),
            polls_completed: self.polls_completed,
        }
    }
}
