//! Simulated camera and replayed classifier for running without hardware.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use nav_core::{DetectionError, Frame, InitFailureReason, Prediction};

use super::{CameraProvider, Classifier, ClassifierLoader, VideoStream};
use crate::config::CameraMode;

const FRAME_WIDTH: u32 = 640;
const FRAME_HEIGHT: u32 = 480;

pub struct SimulatedCamera {
    mode: CameraMode,
}

impl SimulatedCamera {
    pub fn new(mode: CameraMode) -> Self {
        Self { mode }
    }
}

impl CameraProvider for SimulatedCamera {
    fn open(&self) -> BoxFuture<'_, Result<Arc<dyn VideoStream>, DetectionError>> {
        Box::pin(async move {
            match self.mode {
                CameraMode::Denied => Err(DetectionError::CameraPermissionDenied),
                CameraMode::Unavailable => Err(DetectionError::CameraUnavailable(
                    "no video input device".to_string(),
                )),
                CameraMode::Simulated => {
                    tracing::debug!("Opened simulated camera {}x{}", FRAME_WIDTH, FRAME_HEIGHT);
                    Ok(Arc::new(SimulatedStream::default()) as Arc<dyn VideoStream>)
                }
            }
        })
    }
}

/// Blank frames with increasing ids.
#[derive(Default)]
pub struct SimulatedStream {
    next_id: AtomicU64,
    stopped: AtomicBool,
}

impl VideoStream for SimulatedStream {
    fn capture(&self) -> BoxFuture<'_, Result<Frame, DetectionError>> {
        Box::pin(async move {
            if self.stopped.load(Ordering::SeqCst) {
                return Err(DetectionError::CameraFailed("stream stopped".to_string()));
            }
            Ok(Frame {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                captured_at: Utc::now(),
                width: FRAME_WIDTH,
                height: FRAME_HEIGHT,
                data: Vec::new(),
            })
        })
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Loads a [`ReplayClassifier`] from a JSON file of prediction batches.
///
/// Without a file the classifier never reports anything.
pub struct ReplayLoader {
    path: Option<PathBuf>,
}

impl ReplayLoader {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl ClassifierLoader for ReplayLoader {
    fn load(&self) -> BoxFuture<'_, Result<Arc<dyn Classifier>, DetectionError>> {
        Box::pin(async move {
            let Some(path) = self.path.as_ref() else {
                return Ok(Arc::new(ReplayClassifier::new(Vec::new())) as Arc<dyn Classifier>);
            };

            let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                let reason = if e.kind() == std::io::ErrorKind::NotFound {
                    InitFailureReason::BackendUnavailable
                } else {
                    InitFailureReason::Unknown
                };
                DetectionError::ClassifierInitFailed {
                    reason,
                    message: format!("{}: {}", path.display(), e),
                }
            })?;
            let batches: Vec<Vec<Prediction>> =
                serde_json::from_str(&raw).map_err(|e| DetectionError::ClassifierInitFailed {
                    reason: InitFailureReason::Unknown,
                    message: format!("{}: {}", path.display(), e),
                })?;

            tracing::info!("Loaded {} replay batch(es) from {}", batches.len(), path.display());
            Ok(Arc::new(ReplayClassifier::new(batches)) as Arc<dyn Classifier>)
        })
    }
}

/// Returns recorded prediction batches in order, cycling.
pub struct ReplayClassifier {
    batches: Vec<Vec<Prediction>>,
    cursor: AtomicUsize,
}

impl ReplayClassifier {
    pub fn new(batches: Vec<Vec<Prediction>>) -> Self {
        Self {
            batches,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Classifier for ReplayClassifier {
    fn classify<'a>(
        &'a self,
        _frame: &'a Frame,
    ) -> BoxFuture<'a, Result<Vec<Prediction>, DetectionError>> {
        Box::pin(async move {
            if self.batches.is_empty() {
                return Ok(Vec::new());
            }
            let index = self.cursor.fetch_add(1, Ordering::SeqCst) % self.batches.len();
            Ok(self.batches[index].clone())
        })
    }
}
