use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};

use storefront_api as api;

#[derive(Debug, Parser)]
#[command(name = "storefront-api", version, about = "Storefront catalog API server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Create an admin account
    CreateAdmin(CreateAdminArgs),
}

#[derive(Debug, Args)]
struct CreateAdminArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    password: String,
    #[arg(long, default_value = "")]
    first_name: String,
    #[arg(long, default_value = "")]
    last_name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let db_pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Migrate => {
            api::db::run_migrations(&db_pool).await?;
            Ok(())
        }
        Commands::CreateAdmin(args) => create_admin(cfg, db_pool, args).await,
        Commands::Serve => serve(cfg, db_pool).await,
    }
}

async fn serve(cfg: api::config::AppConfig, db_pool: api::db::DbPool) -> Result<()> {
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await?;
    }

    let storage = Arc::new(api::media::LocalImageStorage::new(&cfg.media_root));
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;

    let state = api::AppState::new(Arc::new(db_pool), cfg, storage);
    let app = api::build_router(state);

    info!("storefront-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn create_admin(
    cfg: api::config::AppConfig,
    db_pool: api::db::DbPool,
    args: CreateAdminArgs,
) -> Result<()> {
    let storage = Arc::new(api::media::LocalImageStorage::new(&cfg.media_root));
    let state = api::AppState::new(Arc::new(db_pool), cfg, storage);

    let admin = state
        .account_service()
        .create_admin(api::services::accounts::NewAccount {
            email: args.email,
            phone: args.phone,
            first_name: args.first_name,
            last_name: args.last_name,
            password: args.password,
            role: api::entities::user::Role::Admin,
        })
        .await
        .context("failed to create admin")?;

    println!("{}", serde_json::to_string_pretty(&admin)?);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
