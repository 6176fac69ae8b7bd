use bg_removal_api::{http, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bg_removal_api=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .compact(),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(?config, "configuration resolved");

    let listen = config.bind_addr.clone();
    let state = http::AppState::new(config)?;
    let router = http::router(state);

    http::serve(router, &listen).await
}
