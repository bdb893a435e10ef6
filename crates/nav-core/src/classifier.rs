//! Obstacle filtering over raw classifier predictions.

use crate::models::Prediction;
use serde::{Deserialize, Serialize};

/// Labels treated as obstacles by default (COCO class names).
pub const DEFAULT_OBSTACLE_LABELS: [&str; 8] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "bus",
    "truck",
    "traffic light",
    "stop sign",
];

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;

/// Label whitelist plus confidence threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleFilter {
    pub labels: Vec<String>,
    /// Minimum confidence, inclusive
    pub confidence_threshold: f32,
}

impl Default for ObstacleFilter {
    fn default() -> Self {
        Self {
            labels: DEFAULT_OBSTACLE_LABELS.iter().map(|s| s.to_string()).collect(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl ObstacleFilter {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn is_obstacle(&self, prediction: &Prediction) -> bool {
        prediction.confidence >= self.confidence_threshold
            && self.labels.iter().any(|label| label == &prediction.label)
    }

    /// Keep obstacle predictions, preserving input order.
    pub fn filter(&self, predictions: &[Prediction]) -> Vec<Prediction> {
        predictions
            .iter()
            .filter(|p| self.is_obstacle(p))
            .cloned()
            .collect()
    }
}

/// The highest-confidence obstacle; the earliest one wins ties.
pub fn top_obstacle(obstacles: &[Prediction]) -> Option<&Prediction> {
    obstacles.iter().reduce(|best, candidate| {
        if candidate.confidence > best.confidence {
            candidate
        } else {
            best
        }
    })
}
