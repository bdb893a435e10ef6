//! Server configuration from environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use nav_core::{DetectionTiming, ObstacleFilter, PromotionPolicy, ResumePolicy};

/// Which simulated camera backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMode {
    Simulated,
    /// Acquisition always fails with a permission error.
    Denied,
    /// Acquisition always fails with a missing backend.
    Unavailable,
}

impl FromStr for CameraMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulated" => Ok(CameraMode::Simulated),
            "denied" => Ok(CameraMode::Denied),
            "unavailable" | "none" => Ok(CameraMode::Unavailable),
            other => Err(format!("unknown camera mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub osrm_url: String,
    pub routing_timeout_secs: u64,
    pub detection_interval_ms: u64,
    pub detection_grace_ms: u64,
    pub reroute_cooldown_ms: u64,
    pub resume_policy: ResumePolicy,
    pub obstacle_confidence: f32,
    pub obstacle_labels: Vec<String>,
    pub promotion_policy: PromotionPolicy,
    pub camera_mode: CameraMode,
    pub replay_path: Option<PathBuf>,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        let filter = ObstacleFilter::default();
        Self {
            server_port: 3000,
            osrm_url: "https://router.project-osrm.org".to_string(),
            routing_timeout_secs: 10,
            detection_interval_ms: 1000,
            detection_grace_ms: 3000,
            reroute_cooldown_ms: 5000,
            resume_policy: ResumePolicy::Cooldown,
            obstacle_confidence: filter.confidence_threshold,
            obstacle_labels: filter.labels,
            promotion_policy: PromotionPolicy::InOrder,
            camera_mode: CameraMode::Simulated,
            replay_path: None,
            log_json: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_env("NAV_PORT").unwrap_or(defaults.server_port),
            osrm_url: env::var("NAV_OSRM_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.osrm_url),
            routing_timeout_secs: parse_env("NAV_ROUTING_TIMEOUT_SECS")
                .unwrap_or(defaults.routing_timeout_secs),
            detection_interval_ms: parse_env("NAV_DETECTION_INTERVAL_MS")
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.detection_interval_ms),
            detection_grace_ms: parse_env("NAV_DETECTION_GRACE_MS")
                .unwrap_or(defaults.detection_grace_ms),
            reroute_cooldown_ms: parse_env("NAV_REROUTE_COOLDOWN_MS")
                .unwrap_or(defaults.reroute_cooldown_ms),
            resume_policy: parse_env("NAV_RESUME_POLICY").unwrap_or(defaults.resume_policy),
            obstacle_confidence: parse_env::<f32>("NAV_OBSTACLE_CONFIDENCE")
                .filter(|c| (0.0..=1.0).contains(c))
                .unwrap_or(defaults.obstacle_confidence),
            obstacle_labels: env::var("NAV_OBSTACLE_LABELS")
                .ok()
                .map(|raw| parse_labels(&raw))
                .filter(|labels| !labels.is_empty())
                .unwrap_or(defaults.obstacle_labels),
            promotion_policy: parse_env("NAV_PROMOTION_POLICY")
                .unwrap_or(defaults.promotion_policy),
            camera_mode: parse_env("NAV_CAMERA").unwrap_or(defaults.camera_mode),
            replay_path: env::var("NAV_REPLAY_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            log_json: env::var("NAV_LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }

    pub fn detection_timing(&self) -> DetectionTiming {
        DetectionTiming {
            poll_interval: Duration::from_millis(self.detection_interval_ms),
            grace_period: Duration::from_millis(self.detection_grace_ms),
            cooldown: Duration::from_millis(self.reroute_cooldown_ms),
            resume_policy: self.resume_policy,
        }
    }

    pub fn obstacle_filter(&self) -> ObstacleFilter {
        ObstacleFilter {
            labels: self.obstacle_labels.clone(),
            confidence_threshold: self.obstacle_confidence,
        }
    }

    pub fn routing_timeout(&self) -> Duration {
        Duration::from_secs(self.routing_timeout_secs.max(1))
    }
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn parse_labels(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|label| label.trim().to_ascii_lowercase())
        .filter(|label| !label.is_empty())
        .collect()
}
