use chrono::Local;
use power_monitor_ws::{
    api::create_router,
    config::Config,
    controller::{monitor::INVALID_DEVICE_ALERT, Controller, GraphHandler, MonitorPage, Page},
    error::AppError,
    mqtt::{self, Backoff},
    session::{run_clock, PageHandle, Session},
    view::ViewUpdate,
    ws::AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Housekeeping interval for both controllers (DST check, pending toggle expiry)
const TICK_INTERVAL: Duration = Duration::from_secs(1);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "power_monitor_ws=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting power-monitor-ws service");

    // Load configuration
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/config.yaml".to_string());

    let config = Config::load(&config_path)?;
    info!("Configuration loaded from: {}", config_path);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let qos = mqtt::qos(config.mqtt.qos);
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    // Graph page: one session over every configured device
    let graph = GraphHandler::new(&config.graph.devices, qos, Local::now().fixed_offset())?;
    let (graph_handle, graph_channels) = PageHandle::channel(Page::Graph, graph.snapshot());
    let graph_session = Session::new(
        graph,
        mqtt::build_options(&config.mqtt, "graph")?,
        Backoff::from_config(&config.mqtt.reconnect),
        TICK_INTERVAL,
        graph_channels,
    );
    info!(
        devices = config.graph.devices.len(),
        "graph session created: broker={}:{}", config.mqtt.host, config.mqtt.port
    );
    let rx = shutdown_rx.clone();
    tasks.push(tokio::spawn(async move {
        if let Err(e) = graph_session.run(rx).await {
            error!("Graph session error: {}", e);
        }
    }));

    // Monitor page: only started for a usable device id
    let monitor_handle = match MonitorPage::new(
        &config.monitor.device_id,
        qos,
        Duration::from_secs(config.monitor.pending_timeout_secs),
    ) {
        Ok(monitor) => {
            info!(device_id = %monitor.device_id(), "monitor session created");
            let (handle, channels) = PageHandle::channel(Page::Monitor, monitor.snapshot());
            let session = Session::new(
                monitor,
                mqtt::build_options(&config.mqtt, "monitor")?,
                Backoff::from_config(&config.mqtt.reconnect),
                TICK_INTERVAL,
                channels,
            );

            let rx = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = session.run(rx).await {
                    error!("Monitor session error: {}", e);
                }
            }));
            tasks.push(tokio::spawn(run_clock(
                handle.clone(),
                Duration::from_millis(config.monitor.clock_interval_ms),
                shutdown_rx.clone(),
            )));
            handle
        }
        Err(AppError::InvalidDeviceId(id)) => {
            warn!(device_id = %id, "invalid monitor device id, monitor page will not connect");
            PageHandle::detached(
                Page::Monitor,
                vec![ViewUpdate::Alert {
                    message: INVALID_DEVICE_ALERT.to_string(),
                }],
            )
        }
        Err(e) => return Err(e.into()),
    };

    // Create application state
    let state = Arc::new(AppState::new(
        graph_handle,
        monitor_handle,
        config.auth.secret().map(String::from),
        config.server.max_connections,
    ));
    if state.jwt_secret.is_none() {
        warn!("No JWT secret configured, dashboard is open to anyone who can reach it");
    }

    let app = create_router(state);

    // Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    for task in tasks {
        if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
            warn!("Background task did not stop within {:?}", SHUTDOWN_GRACE);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler; tells the MQTT sessions to disconnect too
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }

    let _ = shutdown_tx.send(true);
}
