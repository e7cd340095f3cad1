// Framework bootstrap for the arena server runtime.

use crate::domain::tuning::FieldTuning;
use crate::frameworks::config;
use crate::interface_adapters::net::{dispatch_serializer, ws_handler};
use crate::interface_adapters::state::{AppState, Outbound};
use crate::use_cases::{Dispatch, GameEvent, WorldSettings, world_task};

use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};
use tokio::sync::{broadcast, mpsc};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Serves the arena on an already bound listener with settings from the environment.
pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    run_with_settings(
        listener,
        WorldSettings {
            spawn_broadcast_grace: config::spawn_broadcast_grace(),
            join_timeout: config::JOIN_TIMEOUT,
            field: FieldTuning::default(),
        },
    )
    .await
}

pub async fn run_with_settings(
    listener: tokio::net::TcpListener,
    settings: WorldSettings,
) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state(settings);

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state);

    tracing::info!(
        %address,
        grace_ms = settings.spawn_broadcast_grace.as_millis() as u64,
        "listening"
    );

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::new(config::bind_addr(), config::http_port());

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state(settings: WorldSettings) -> Arc<AppState> {
    // input_tx/rx: every client event goes to the single world task.
    let (input_tx, input_rx) = mpsc::channel::<GameEvent>(config::INPUT_CHANNEL_CAPACITY);

    // dispatch_tx/rx: addressed world events, still as domain values.
    let (dispatch_tx, dispatch_rx) =
        broadcast::channel::<Dispatch>(config::DISPATCH_BROADCAST_CAPACITY);

    // outbound_tx/rx: serialized frames shared across all connections.
    let (outbound_tx, _outbound_rx) =
        broadcast::channel::<Outbound>(config::OUTBOUND_BROADCAST_CAPACITY);

    // The serializer subscribed above, before the world can emit anything.
    tokio::spawn(dispatch_serializer(dispatch_rx, outbound_tx.clone()));
    tokio::spawn(world_task(input_rx, dispatch_tx, settings));

    Arc::new(AppState {
        input_tx,
        outbound_tx,
        join_timeout: settings.join_timeout,
    })
}
