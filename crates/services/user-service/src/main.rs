//! User Service - operations CLI for the user/role/permission store.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use user_service_lib::config::UserServiceConfig;
use user_service_lib::MigrateAction;

#[derive(Parser)]
#[command(name = "user-service")]
#[command(about = "User, role and permission management")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true, env = "VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database migration commands
    Migrate {
        #[command(subcommand)]
        action: MigrateCommands,
    },
    /// Seed default roles, permissions and the admin account
    Seed,
    /// Check backend and cache connectivity
    Check,
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Run pending migrations
    Up,
    /// Rollback last migration
    Down,
    /// Show migration status
    Status,
    /// Reset database and run all migrations
    Fresh,
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command).await {
        tracing::error!(code = e.code(), "Command failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> common::AppResult<()> {
    let config = UserServiceConfig::from_env()?;
    tracing::debug!(backend = ?config.backend, "Configuration loaded");

    match command {
        Commands::Migrate { action } => {
            let migrate_action = match action {
                MigrateCommands::Up => MigrateAction::Up,
                MigrateCommands::Down => MigrateAction::Down,
                MigrateCommands::Status => MigrateAction::Status,
                MigrateCommands::Fresh => MigrateAction::Fresh,
            };
            user_service_lib::run_migrations(&config, migrate_action).await?;
        }
        Commands::Seed => {
            let report = user_service_lib::seed(&config).await?;
            if report.is_empty() {
                println!("Nothing to seed, defaults already present");
            } else {
                println!(
                    "Seeded {} roles, {} permissions{}",
                    report.roles_created,
                    report.permissions_created,
                    if report.admin_created { ", admin account" } else { "" }
                );
            }
        }
        Commands::Check => {
            let health = user_service_lib::check(&config).await?;
            println!("backend: {} ok", health.backend);
            println!(
                "cache: {}",
                if health.cache_enabled { "enabled" } else { "disabled" }
            );
        }
    }

    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}
