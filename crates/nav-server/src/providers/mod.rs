//! External collaborators: camera, classifier and routing provider.
//!
//! Each one is an object-safe trait so the scheduler and the API only hold
//! `Arc<dyn ...>` handles and tests can inject fakes.

pub mod routing;
pub mod simulated;

use std::sync::Arc;

use futures::future::BoxFuture;
use nav_core::{Coordinates, DetectionError, Frame, Prediction, Route, TravelMode};

pub use routing::{RoutingClient, RoutingError};
pub use simulated::{ReplayClassifier, ReplayLoader, SimulatedCamera};

/// An open camera stream.
pub trait VideoStream: Send + Sync {
    fn capture(&self) -> BoxFuture<'_, Result<Frame, DetectionError>>;
    /// Release the underlying device. Called once per stream by [`CameraGuard`].
    fn stop(&self);
}

pub trait CameraProvider: Send + Sync {
    fn open(&self) -> BoxFuture<'_, Result<Arc<dyn VideoStream>, DetectionError>>;
}

pub trait Classifier: Send + Sync {
    fn classify<'a>(&'a self, frame: &'a Frame)
        -> BoxFuture<'a, Result<Vec<Prediction>, DetectionError>>;
}

pub trait ClassifierLoader: Send + Sync {
    fn load(&self) -> BoxFuture<'_, Result<Arc<dyn Classifier>, DetectionError>>;
}

pub trait RoutingProvider: Send + Sync {
    fn fetch_routes<'a>(
        &'a self,
        source: &'a Coordinates,
        destination: &'a Coordinates,
        mode: TravelMode,
    ) -> BoxFuture<'a, Result<Vec<Route>, RoutingError>>;
}

/// Owns an opened stream and stops it exactly once.
///
/// Release happens on [`CameraGuard::release`] or on drop, whichever comes
/// first, so an aborted initialization task still frees the device.
pub struct CameraGuard {
    stream: Option<Arc<dyn VideoStream>>,
}

impl CameraGuard {
    pub fn new(stream: Arc<dyn VideoStream>) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    /// The live stream, or `None` once released.
    pub fn stream(&self) -> Option<Arc<dyn VideoStream>> {
        self.stream.clone()
    }

    pub fn is_released(&self) -> bool {
        self.stream.is_none()
    }

    pub fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop();
            tracing::info!("Camera stream released");
        }
    }
}

impl Drop for CameraGuard {
    fn drop(&mut self) {
        self.release();
    }
}
