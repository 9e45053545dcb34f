use jobportal_backend::{
    config::{get_config, init_config},
    routes::{self, RouterOptions},
    AppState,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_config()?;
    let config = get_config();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let app_state = AppState::from_config(config).await?;
    info!(
        local_kinds = ?config.local_only_kinds,
        retention_days = config.retention_days,
        "listing collections ready"
    );

    let app = routes::app(
        app_state,
        RouterOptions {
            public_rps: config.public_rps,
            admin_rps: config.admin_rps,
            jwt_secret: config.jwt_secret.clone(),
        },
    );

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
