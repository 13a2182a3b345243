//! Pharmacist bot server entrypoint (port 8002 by default)

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pharmacy_shift_backend::{create_app, AppState, BotRole, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pharmacist_bot=debug,pharmacy_shift_backend=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::load(BotRole::Pharmacist)?;

    tracing::info!("Starting Pharmacy Shift Pharmacist Bot");
    tracing::info!("Environment: {}", config.environment);

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::initialize(BotRole::Pharmacist, config).await?;
    let app = create_app(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
