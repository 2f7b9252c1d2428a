use std::sync::Arc;

use dotenvy::dotenv;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fieldgate_mqtt::{CertificateBundle, MqttConfig, Publisher, Subscriber};

mod config;
mod error;
mod models;
mod routes;
mod status;

use config::ServerConfig;
use routes::{router, AppState};
use status::{StatusCommandHandler, StatusStore};

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_tracing();

    let server_cfg = ServerConfig::from_env();
    let mqtt_cfg = MqttConfig::from_env();
    info!(endpoint = %mqtt_cfg.endpoint, port = mqtt_cfg.port, "configuring broker client");

    // Certificates are a startup requirement; refuse to run without them.
    let certs = CertificateBundle::load(&mqtt_cfg).expect("failed to load TLS certificates");

    let status = StatusStore::new();
    let publisher = Publisher::new(mqtt_cfg.clone(), certs.clone());
    let handler = Arc::new(StatusCommandHandler::new(status.clone()));
    let subscriber = Subscriber::start(mqtt_cfg, certs, handler);

    let state = AppState {
        status,
        sink: Arc::new(publisher),
        timezone_offset_hours: server_cfg.timezone_offset_hours,
    };
    let app = router(state);

    info!(addr = %server_cfg.http_addr, "starting HTTP server");
    let listener = tokio::net::TcpListener::bind(server_cfg.http_addr)
        .await
        .expect("failed to bind HTTP address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("HTTP server error");

    if let Err(e) = subscriber.stop().await {
        tracing::warn!(error = %e, "subscriber did not shut down cleanly");
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,axum=info,hyper=info,rumqttc=warn"))
        .unwrap();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install signal handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
