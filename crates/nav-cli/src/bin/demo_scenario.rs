//! Demo Scenario - obstacle-triggered rerouting, end to end, in one process.
//!
//! 1. PLAN: fetch routes between two preset locations
//! 2. DETECT: run the detection loop against a scripted classifier
//! 3. REROUTE: each obstacle promotes the next alternative route
//! 4. TEARDOWN: stop detection and release the camera
//!
//! Usage:
//!   cargo run -p nav-cli --bin demo_scenario -- --mode flight --from "JFK Airport" --to "LAX Airport"

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast;
use tokio::time;

use nav_cli::{default_script, resolve_location, InlineLoader};
use nav_core::{AlertKind, TravelMode};
use nav_server::config::{CameraMode, Config};
use nav_server::loops::SchedulerCommand;
use nav_server::providers::{RoutingClient, SimulatedCamera};
use nav_server::{init_tracing, spawn_runtime, Collaborators};

#[derive(Parser, Debug)]
#[command(author, version, about = "Demo: obstacle detection driving route changes")]
struct Args {
    /// Travel mode: ground or flight
    #[arg(long, default_value = "ground")]
    mode: TravelMode,

    /// Source preset name
    #[arg(long, default_value = "New York")]
    from: String,

    /// Destination preset name
    #[arg(long, default_value = "Boston")]
    to: String,

    /// JSON file of prediction batches; a built-in script is used otherwise
    #[arg(long)]
    replay: Option<PathBuf>,

    /// How long to run detection, in seconds
    #[arg(long, default_value_t = 20)]
    duration: u64,

    /// Acknowledge obstacle alerts instead of waiting out the cooldown
    #[arg(long, default_value_t = false)]
    auto_ack: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_env();
    init_tracing("nav_server=info", config.log_json)?;

    let source = resolve_location(args.mode, &args.from)?;
    let destination = resolve_location(args.mode, &args.to)?;

    let loader = match args.replay.as_deref() {
        Some(path) => InlineLoader::from_file(path)?,
        None => InlineLoader::new(default_script()),
    };
    println!("Replaying {} prediction batch(es)", loader.batches().len());

    let collaborators = Collaborators {
        camera: Arc::new(SimulatedCamera::new(CameraMode::Simulated)),
        loader: Arc::new(loader),
        routing: Arc::new(RoutingClient::new(
            config.osrm_url.clone(),
            config.routing_timeout(),
        )),
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let (state, detection) = spawn_runtime(config, collaborators, shutdown_tx.subscribe());
    let mut alerts = state.alerts().subscribe();

    // === PLAN ===
    println!(
        "Planning {} {} -> {}",
        args.mode.route_noun(),
        source.name,
        destination.name
    );
    let routes = state
        .routing()
        .fetch_routes(&source.coordinates, &destination.coordinates, args.mode)
        .await
        .context("fetching routes")?;
    let summary = state
        .with_navigation(|nav| nav.plan(source, destination, args.mode, routes).map(|r| r.summary()))
        .context("loading routes")?;
    println!(
        "Best {}: {} km, {} min",
        args.mode.route_noun(),
        summary.distance_km,
        summary.duration_min
    );

    // === DETECT ===
    state.scheduler().send(SchedulerCommand::Start).await;
    let deadline = time::sleep(Duration::from_secs(args.duration));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            alert = alerts.recv() => {
                let Ok(alert) = alert else { continue };
                println!("[{:?}] {}", alert.severity, alert.message);

                // === REROUTE ===
                if alert.kind == AlertKind::Obstacle {
                    if let Some(route) = state.with_navigation(|nav| nav.routes.current().map(|r| r.summary())) {
                        println!("  now on: {} km, {} min", route.distance_km, route.duration_min);
                    }
                }
                if matches!(alert.kind, AlertKind::Obstacle | AlertKind::NoAlternative) && args.auto_ack {
                    state.scheduler().send(SchedulerCommand::Acknowledge).await;
                }
                if alert.kind == AlertKind::DetectionFailed {
                    break;
                }
            }
        }
    }

    // === TEARDOWN ===
    let (reroutes, remaining) = state.with_navigation(|nav| {
        (nav.coordinator.reroutes(), nav.routes.alternatives_remaining())
    });
    let snapshot = state.scheduler().snapshot();
    let _ = shutdown_tx.send(());
    detection.await?;

    println!(
        "Done: {} poll(s), {} reroute(s), {} alternative(s) left",
        snapshot.polls_completed, reroutes, remaining
    );
    Ok(())
}
