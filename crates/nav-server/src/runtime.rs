//! Wiring: collaborators, shared state and the background loop.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::loops::{run_detection_loop, scheduler_channel, DetectionDeps};
use crate::providers::{
    CameraProvider, ClassifierLoader, ReplayLoader, RoutingClient, RoutingProvider, SimulatedCamera,
};
use crate::state::AppState;

/// External collaborators injected into the server.
#[derive(Clone)]
pub struct Collaborators {
    pub camera: Arc<dyn CameraProvider>,
    pub loader: Arc<dyn ClassifierLoader>,
    pub routing: Arc<dyn RoutingProvider>,
}

impl Collaborators {
    /// Simulated camera, replay classifier and the configured OSRM endpoint.
    pub fn from_config(config: &Config) -> Self {
        Self {
            camera: Arc::new(SimulatedCamera::new(config.camera_mode)),
            loader: Arc::new(ReplayLoader::new(config.replay_path.clone())),
            routing: Arc::new(RoutingClient::new(
                config.osrm_url.clone(),
                config.routing_timeout(),
            )),
        }
    }
}

/// Build the shared state and spawn the detection loop.
pub fn spawn_runtime(
    config: Config,
    collaborators: Collaborators,
    shutdown: broadcast::Receiver<()>,
) -> (Arc<AppState>, JoinHandle<()>) {
    let (handle, inbox) = scheduler_channel();
    let deps = DetectionDeps {
        camera: collaborators.camera,
        loader: collaborators.loader,
        filter: config.obstacle_filter(),
        timing: config.detection_timing(),
    };
    let state = Arc::new(AppState::new(&config, collaborators.routing, handle));
    let task = tokio::spawn(run_detection_loop(state.clone(), deps, inbox, shutdown));
    (state, task)
}

/// Install the global subscriber: `RUST_LOG` plus `directive`, text or JSON.
pub fn init_tracing(directive: &str, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);
    let (text_layer, json_layer) = if json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .try_init()?;
    Ok(())
}
