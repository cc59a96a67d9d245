use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use pnfetcher::ArangoClient;
use staloader::{DuplicateCheck, EntityId, StaClient, StaService};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod pipeline;

use pipeline::MigrationSettings;

/// Runs the command line interface of the migration tool.
pub async fn run_cli() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Migrate(args) => run_migrate(args).await,
        Command::Inspect(args) => run_inspect(args).await,
    }
}

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Migrates source observations into the entity-graph service
    Migrate(MigrateArgs),
    /// Reads migrated data back from the service for inspection
    Inspect(InspectArgs),
}

#[derive(Args)]
struct TargetArgs {
    /// Root URL of the entity-graph service
    #[arg(long, env = "FROST_ROOT_URL")]
    frost_url: String,
    #[arg(long, env = "FROST_USERNAME")]
    frost_username: String,
    #[arg(long, env = "FROST_PASSWORD")]
    frost_password: String,
}

#[derive(Args)]
struct MigrateArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Base URL of the source document store
    #[arg(long, env = "ARANGO_URL")]
    arango_url: String,
    #[arg(long, env = "ARANGO_DATABASE")]
    arango_database: String,
    #[arg(long, env = "ARANGO_USERNAME")]
    arango_username: String,
    #[arg(long, env = "ARANGO_PASSWORD")]
    arango_password: String,
    /// Public mirror serving the observation images
    #[arg(long, env = "MEDIA_ROOT_URL")]
    media_url: String,
    /// Source key the first page starts after (exclusive)
    #[arg(long, default_value = "1000000000")]
    start_key: String,
    #[arg(long, default_value_t = 1000)]
    page_size: usize,
    /// Stop once this many records have been written
    #[arg(long, default_value_t = 15_000_000)]
    limit: u64,
    /// Duplicate checking: 'always' or 'after-first-miss'
    #[arg(long, default_value = "after-first-miss")]
    duplicate_check: DuplicateCheck,
    /// Checkpoint file; written after each page, read back on restart
    #[arg(long)]
    state_file: Option<PathBuf>,
}

#[derive(Args)]
struct InspectArgs {
    #[command(flatten)]
    target: TargetArgs,
    #[command(subcommand)]
    what: InspectCommand,
}

#[derive(Subcommand)]
enum InspectCommand {
    /// One migrated group by its service id
    Group { id: String },
    /// All groups produced by one source author id
    Author { id: String },
}

fn init_tracing() {
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

async fn run_migrate(args: MigrateArgs) -> anyhow::Result<()> {
    let source = ArangoClient::new(
        &args.arango_url,
        &args.arango_database,
        &args.arango_username,
        &args.arango_password,
    )?;
    let service = StaClient::new(
        &args.target.frost_url,
        &args.target.frost_username,
        &args.target.frost_password,
    )?;

    let settings = MigrationSettings {
        start_key: args.start_key,
        page_size: args.page_size,
        limit: args.limit,
        media_root: args.media_url,
        duplicate_check: args.duplicate_check,
        state_file: args.state_file,
    };

    let report =
        pipeline::run_migration(Arc::new(source), Arc::new(service), &settings).await?;
    info!(
        "migration finished: {} written, {} skipped, {} failed, watermark {}",
        report.written, report.skipped, report.failed, report.watermark
    );
    Ok(())
}

/// Groups are addressed by integer or UUID depending on server config; take
/// whichever shape the operator typed.
fn parse_entity_id(raw: &str) -> EntityId {
    raw.parse::<i64>()
        .map(EntityId::Long)
        .unwrap_or_else(|_| EntityId::Text(raw.to_string()))
}

async fn run_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let service = StaClient::new(
        &args.target.frost_url,
        &args.target.frost_username,
        &args.target.frost_password,
    )?;
    let details = match args.what {
        InspectCommand::Group { id } => service.group_details(&parse_entity_id(&id)).await?,
        InspectCommand::Author { id } => service.author_groups(&id).await?,
    };
    println!("{}", serde_json::to_string_pretty(&details)?);
    Ok(())
}
