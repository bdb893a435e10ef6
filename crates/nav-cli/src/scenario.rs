//! Scripted inputs for the demo scenario.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use futures::future::BoxFuture;
use nav_core::{presets, DetectionError, Location, Prediction, TravelMode};
use nav_server::providers::{Classifier, ClassifierLoader, ReplayClassifier};

/// Classifier loader over prediction batches held in memory.
pub struct InlineLoader {
    batches: Vec<Vec<Prediction>>,
}

impl InlineLoader {
    pub fn new(batches: Vec<Vec<Prediction>>) -> Self {
        Self { batches }
    }

    /// Read batches from a JSON file: an array of arrays of predictions.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading replay file {}", path.display()))?;
        let batches = serde_json::from_str(&raw)
            .with_context(|| format!("parsing replay file {}", path.display()))?;
        Ok(Self::new(batches))
    }

    pub fn batches(&self) -> &[Vec<Prediction>] {
        &self.batches
    }
}

impl ClassifierLoader for InlineLoader {
    fn load(&self) -> BoxFuture<'_, Result<Arc<dyn Classifier>, DetectionError>> {
        Box::pin(async move {
            Ok(Arc::new(ReplayClassifier::new(self.batches.clone())) as Arc<dyn Classifier>)
        })
    }
}

/// A clear road, a car, more clear road, then a pedestrian.
pub fn default_script() -> Vec<Vec<Prediction>> {
    vec![
        vec![],
        vec![Prediction::new("traffic light", 0.41)],
        vec![Prediction::new("car", 0.87), Prediction::new("person", 0.32)],
        vec![],
        vec![],
        vec![],
        vec![],
        vec![Prediction::new("person", 0.74)],
        vec![],
    ]
}

/// Look a preset up by name for the given mode.
pub fn resolve_location(mode: TravelMode, name: &str) -> Result<Location> {
    presets::find(mode, name).ok_or_else(|| {
        let known: Vec<String> = presets::locations(mode).into_iter().map(|l| l.name).collect();
        anyhow!("unknown location '{}' (known: {})", name, known.join(", "))
    })
}
