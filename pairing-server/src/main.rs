mod lobby;
mod message_relay;
mod notify;
mod registry;
mod session;

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::routing::get;
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::lobby::AppState;

#[tokio::main]
/// Activates error tracing, spawns a watch dog task to eliminate eventual dead
/// connections, then sets up the routing system to serve the web socket, the
/// room listing and the bundled frontend. The listen address and the allowed
/// browser origin come from the environment.
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=trace", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true) // Module path (e.g. pairing_server::lobby)
                .with_thread_ids(true) // Thread-ID (helpful for Tokio)
                .with_thread_names(true), // Thread-Name
        )
        .init();

    let listen_addr =
        std::env::var("PAIRING_LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".into());
    let allowed_origin = std::env::var("PAIRING_ALLOWED_ORIGIN").ok();
    if let Some(origin) = &allowed_origin {
        tracing::info!(origin, "Restricting socket upgrades to one origin.");
    }

    let app_state = Arc::new(AppState {
        allowed_origin,
        ..AppState::default()
    });
    let watchdog_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300)); // 5 Min
        loop {
            interval.tick().await;
            watchdog_state.core.lock().await.reap_dead();
        }
    });

    let app = Router::new()
        .route("/rooms", get(rooms_handler))
        .route("/ws", get(session::websocket_handler))
        .with_state(app_state)
        .fallback_service(
            ServeDir::new("public").not_found_service(ServeFile::new("public/index.html")),
        );

    tracing::info!(listen_addr, "Starting the pairing server.");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await.unwrap();

    axum::serve(listener, app).await.unwrap();
}

/// Generates a list with the current rooms and the amount of members, plus the
/// overall amount of live connections.
async fn rooms_handler(State(state): State<Arc<AppState>>) -> String {
    let core = state.core.lock().await;
    let mut lines: Vec<String> = core
        .rooms
        .table()
        .iter()
        .map(|(room_id, members)| format!("Room: {:<30} Members: {:03}", room_id, members.len()))
        .collect();
    lines.sort();
    lines.push(format!("Connections: {:03}", core.registry.len()));
    lines.join("\n")
}
