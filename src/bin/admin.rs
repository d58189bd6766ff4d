//! Operator tooling: schema migrations, orphan sweeps and token issuance.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use std::{sync::Arc, time::Duration};
use tracing::info;

use printshop_crm::{
    auth::{AuthConfig, AuthService},
    config::{self, AppConfig},
    db,
    migrator::Migrator,
    services::pedidos::PedidoService,
};

#[derive(Parser)]
#[command(
    name = "printshop-admin",
    about = "Administrative tasks for the printshop CRM backend",
    version
)]
struct Cli {
    /// Overrides the configured database URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(subcommand)]
    Migrate(MigrateCommands),
    /// Deletes pedidos that never received their items
    SweepOrphans(SweepArgs),
    /// Prints a bearer token for an active user profile
    IssueToken(IssueTokenArgs),
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Applies all pending migrations
    Up,
    /// Rolls back the last applied migration
    Down,
    /// Lists applied and pending migrations
    Status,
}

#[derive(Args)]
struct SweepArgs {
    /// Minimum age in seconds; defaults to the configured grace period
    #[arg(long)]
    grace_secs: Option<u64>,
}

#[derive(Args)]
struct IssueTokenArgs {
    /// User profile id (token subject)
    profile_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = config::load_config().context("failed to load configuration")?;
    if let Some(url) = cli.database_url {
        cfg.database_url = url;
    }
    config::init_tracing(&cfg.log_level, cfg.log_json);

    let pool = db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to database")?;

    match cli.command {
        Commands::Migrate(command) => migrate(&pool, command).await?,
        Commands::SweepOrphans(args) => sweep_orphans(pool, &cfg, args).await?,
        Commands::IssueToken(args) => issue_token(pool, &cfg, args).await?,
    }

    Ok(())
}

async fn migrate(pool: &db::DbPool, command: MigrateCommands) -> Result<()> {
    match command {
        MigrateCommands::Up => {
            info!("Applying pending migrations");
            Migrator::up(pool, None).await?;
            info!("Migration completed successfully");
        }
        MigrateCommands::Down => {
            info!("Rolling back last migration");
            Migrator::down(pool, Some(1)).await?;
        }
        MigrateCommands::Status => Migrator::status(pool).await?,
    }
    Ok(())
}

async fn sweep_orphans(pool: db::DbPool, cfg: &AppConfig, args: SweepArgs) -> Result<()> {
    let grace = args
        .grace_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| cfg.orphan_grace());

    let service = PedidoService::new(Arc::new(pool));
    let removed = service.reconcile_orphans(grace).await?;
    println!("Removed {} orphaned pedido(s)", removed);
    Ok(())
}

async fn issue_token(pool: db::DbPool, cfg: &AppConfig, args: IssueTokenArgs) -> Result<()> {
    let auth = AuthService::new(AuthConfig::from(cfg), Arc::new(pool));

    let Some(profile) = auth.gate().current_user(&args.profile_id).await? else {
        bail!("profile {} is unknown or inactive", args.profile_id);
    };

    let token = auth.issue_token(&profile)?;
    info!(user_id = %profile.id, role = %profile.role, "issued token");
    println!("{}", token.access_token);
    Ok(())
}
