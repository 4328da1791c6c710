use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mock_payment_gateway::adapters::{sqlite, Stores};
use mock_payment_gateway::cli::{self, Cli, Commands, DbCommands};
use mock_payment_gateway::config::Config;
use mock_payment_gateway::startup::Engine;
use mock_payment_gateway::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Sign {
            order_id,
            status_code,
            amount,
        } => cli::handle_sign(&config, &order_id, status_code, amount),
        Commands::Config => cli::handle_config_validate(&config),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    if config.server_key.is_empty() {
        tracing::warn!("SERVER_KEY is empty, every authenticated request will be rejected");
    }

    let pool = sqlite::connect(&config.database_url).await?;
    sqlite::migrate(&pool).await?;
    tracing::info!("Database migrations completed");

    let engine = Engine::from_config(&config, Stores::sqlite(pool))?;
    let app = create_app(AppState::new(engine.service.clone()));

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped, draining background tasks");
    engine.shutdown(config.shutdown_grace).await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
