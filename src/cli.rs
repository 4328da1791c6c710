use clap::{Parser, Subcommand};

use crate::adapters::sqlite;
use crate::config::Config;
use crate::services::sign;

#[derive(Parser)]
#[command(name = "mock-payment-gateway")]
#[command(about = "Mock Payment Gateway - simulated charge, expiry and webhook flows", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Compute the signature key a notification for this order would carry
    Sign {
        #[arg(value_name = "ORDER_ID")]
        order_id: String,

        #[arg(value_name = "STATUS_CODE")]
        status_code: u16,

        #[arg(value_name = "AMOUNT")]
        amount: i64,
    },

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Create the schema if it does not exist
    Migrate,
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = sqlite::connect(&config.database_url).await?;

    tracing::info!("Running database migrations...");
    sqlite::migrate(&pool).await?;

    tracing::info!("Database migrations completed");
    println!("✓ Database migrations completed");

    Ok(())
}

pub fn handle_sign(config: &Config, order_id: &str, status_code: u16, amount: i64) -> anyhow::Result<()> {
    if config.server_key.is_empty() {
        anyhow::bail!("SERVER_KEY is not set");
    }
    println!("{}", sign(order_id, status_code, amount, &config.server_key));
    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Bind Address: {}", config.bind_address());
    println!("  Database URL: {}", config.database_url);
    println!("  Server Key: {}", mask_secret(&config.server_key));
    println!(
        "  Webhook Target: {}",
        config.webhook_target_url.as_deref().unwrap_or("(disabled)")
    );
    println!("  Webhook Timeout: {}s", config.webhook_timeout.as_secs());

    if config.server_key.is_empty() {
        anyhow::bail!("SERVER_KEY is not set");
    }

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}
