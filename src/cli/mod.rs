use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::app::{app, AppSettings, AppState};
use crate::auth::{generate_jwt, AuthGate, Claims, JwtClaimResolver, Role};
use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::progress::{CatalogStore, MemoryStore, PgCatalogStore, PgProgressStore, ProgressStore};

const DEVELOPMENT_SECRET: &str = "learnhub-development-secret";

#[derive(Parser)]
#[command(name = "learnhub-api")]
#[command(about = "LearnHub API - role-gated learner progress service")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP API server (default)")]
    Serve {
        #[arg(long, default_value = "0.0.0.0", help = "Address to bind")]
        host: String,
        #[arg(long, help = "Port to bind; falls back to LEARNHUB_API_PORT, PORT, then 3000")]
        port: Option<u16>,
        #[arg(long, help = "Keep progress and catalog in memory instead of Postgres")]
        memory: bool,
    },

    #[command(about = "Mint a signed session token for a subject and role")]
    Token {
        #[arg(long, help = "Subject id; a random UUID when omitted")]
        subject: Option<String>,
        #[arg(long, default_value = "learner", help = "learner, instructor or admin")]
        role: Role,
        #[arg(long, help = "Lifetime in hours; defaults to the configured session expiry")]
        hours: Option<u64>,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = crate::config::config();
    tracing::info!("Starting LearnHub API in {:?} mode", config.environment);

    let command = cli.command.unwrap_or(Commands::Serve {
        host: "0.0.0.0".to_string(),
        port: None,
        memory: false,
    });

    match command {
        Commands::Serve { host, port, memory } => serve(config, &host, port, memory).await,
        Commands::Token { subject, role, hours } => {
            let secret = jwt_secret(config)?;
            let subject = subject.unwrap_or_else(|| Uuid::new_v4().to_string());
            let claims = Claims::new(subject, role, hours.unwrap_or(config.security.jwt_expiry_hours));
            println!("{}", generate_jwt(&claims, &secret)?);
            Ok(())
        }
    }
}

fn jwt_secret(config: &AppConfig) -> anyhow::Result<String> {
    if !config.security.jwt_secret.is_empty() {
        return Ok(config.security.jwt_secret.clone());
    }
    if crate::is_development!() {
        tracing::warn!("JWT_SECRET not set; using the development secret");
        return Ok(DEVELOPMENT_SECRET.to_string());
    }
    anyhow::bail!("JWT_SECRET must be set outside development")
}

async fn serve(config: &AppConfig, host: &str, port: Option<u16>, memory: bool) -> anyhow::Result<()> {
    let secret = jwt_secret(config)?;
    let resolver = JwtClaimResolver::new(&secret, config.security.session_cookie.clone());

    let (progress, catalog): (Arc<dyn ProgressStore>, Arc<dyn CatalogStore>) = if memory {
        tracing::warn!("Using in-memory stores; progress is lost on restart");
        let store = Arc::new(MemoryStore::new());
        let progress: Arc<dyn ProgressStore> = store.clone();
        let catalog: Arc<dyn CatalogStore> = store;
        (progress, catalog)
    } else {
        let pool = DatabaseManager::connect_from_env(&config.database)
            .await
            .context("failed to connect to database")?;
        DatabaseManager::ensure_schema(&pool).await?;
        let progress: Arc<dyn ProgressStore> = Arc::new(PgProgressStore::new(pool.clone()));
        let catalog: Arc<dyn CatalogStore> = Arc::new(PgCatalogStore::new(pool));
        (progress, catalog)
    };

    let state = AppState {
        gate: AuthGate::new(Arc::new(resolver)),
        progress,
        catalog,
        settings: AppSettings::from_config(config),
    };

    // Allow tests or deployments to override port via env
    let port = port
        .or_else(|| std::env::var("LEARNHUB_API_PORT").ok().and_then(|s| s.parse().ok()))
        .or_else(|| std::env::var("PORT").ok().and_then(|s| s.parse().ok()))
        .unwrap_or(3000);

    let bind_addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("LearnHub API listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}
