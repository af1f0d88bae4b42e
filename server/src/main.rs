mod config;
mod error;
mod fetch;
mod policy;
mod relay;
mod routes;
mod socket;
mod state;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::RelayConfig::from_env().expect("invalid relay config");
    let state = state::AppState::from_config(&config).expect("relay init failed");

    tracing::info!(
        blocked_hosts = config.blocked_hosts.len(),
        max_redirects = config.fetch.max_redirects,
        close_sockets_on_disconnect = config.relay.close_sockets_on_disconnect,
        "relay configured"
    );

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.bind_addr, config.port))
        .await
        .expect("failed to bind");

    tracing::info!(bind = %config.bind_addr, port = config.port, "relay listening");
    axum::serve(listener, app).await.expect("server failed");
}
