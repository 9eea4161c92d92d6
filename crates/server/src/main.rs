use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod conversations;
mod db;
mod error;
mod lifecycle;
mod mailer;
mod otp;
mod realtime;
mod routes;
mod state;

#[cfg(test)]
mod test;

use state::AppState;

#[derive(Parser)]
#[command(name = "errandbuddy-server")]
#[command(about = "ErrandBuddy backend: tasks, chat, rides and study sessions over HTTP")]
#[command(version)]
struct Cli {
    /// Database path (overrides config)
    #[arg(long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Delete a user and every row that references them
    DeleteUser {
        /// Email address of the account
        email: String,
    },
    /// Drop and recreate all tables
    ResetDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "errandbuddy_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = config::Config::load()?;
    if let Some(path) = cli.database {
        config.database.path = path;
    }

    // Initialize database
    let db = db::Database::new(&config.database.path).await?;
    db.run_migrations().await?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(db, config).await,
        Commands::DeleteUser { email } => {
            let deleted = db.delete_user_cascade(email.trim()).await?;
            println!("{}", if deleted { "user-deleted" } else { "user-not-found" });
            Ok(())
        }
        Commands::ResetDb => {
            db.reset().await?;
            println!("Database reset: dropped and recreated all tables.");
            Ok(())
        }
    }
}

async fn serve(db: db::Database, config: config::Config) -> Result<()> {
    tracing::info!(
        "Starting ErrandBuddy server on {}:{}",
        config.server.host,
        config.server.port
    );

    // Create app state
    let state = AppState::new(db, config.clone());

    // Build router
    let app = routes::create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
