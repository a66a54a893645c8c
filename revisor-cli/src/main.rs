use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use revisor_server::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use revisor_server::{
    build_monitor, init_tracing, platform_client, ConfigStore, PollingScheduler,
    RevisionPipeline, RevisionRequest, SessionRefresher,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Revisor: turns project comments into new revisions
#[derive(Parser, Debug)]
#[command(name = "revisor")]
#[command(about = "Turns project comments into new revisions", long_about = None)]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, global = true, env = CONFIG_PATH_ENV, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll the project until interrupted
    Monitor(MonitorArgs),
    /// Run a single monitor cycle and print how it ended
    Check,
    /// Create a revision from a prompt directly, skipping the comment guards
    CreateRevision(CreateRevisionArgs),
    /// Fetch fresh session cookies and save them to the config file
    RefreshCookies,
}

#[derive(Parser, Debug)]
struct MonitorArgs {
    /// Seconds between cycles (defaults to the config's interval)
    #[arg(long)]
    interval: Option<u64>,
}

#[derive(Parser, Debug)]
struct CreateRevisionArgs {
    /// Project to create the revision for
    project_id: String,

    /// Prompt for the generated site
    prompt: String,

    /// Generation model (defaults to the config's model_id)
    #[arg(long)]
    model: Option<String>,
}

async fn run_monitor(store: ConfigStore, args: MonitorArgs) -> Result<()> {
    let config = store.load()?;
    let interval = match args.interval {
        Some(0) => bail!("--interval must be at least one second"),
        Some(seconds) => Duration::from_secs(seconds),
        None => config.interval(),
    };

    let session = config.session();
    let client = platform_client(&config);
    let scheduler = PollingScheduler::new(build_monitor(&config, client, store), interval);
    scheduler.run(session).await;

    Ok(())
}

async fn run_check(store: ConfigStore) -> Result<()> {
    let config = store.load()?;
    let mut session = config.session();
    let client = platform_client(&config);
    let monitor = build_monitor(&config, client, store);

    let outcome = monitor
        .run_cycle(&mut session)
        .await
        .context("Monitor cycle failed")?;
    println!("{}", outcome);

    Ok(())
}

async fn run_create_revision(store: ConfigStore, args: CreateRevisionArgs) -> Result<()> {
    if args.project_id.trim().is_empty() {
        bail!("Project id must not be empty");
    }
    if args.prompt.trim().is_empty() {
        bail!("Prompt must not be empty");
    }

    let config = store.load()?;
    let model_id = args.model.unwrap_or_else(|| config.model_id.clone());
    let client = platform_client(&config);

    let result = RevisionPipeline::new(&client)
        .create_revision(
            &config.session(),
            &RevisionRequest {
                project_id: &args.project_id,
                prompt: &args.prompt,
                model_id: &model_id,
            },
        )
        .await
        .context("Failed to create revision")?;

    let output = serde_json::to_string_pretty(&result).context("Failed to format result")?;
    println!("{}", output);

    Ok(())
}

async fn run_refresh_cookies(store: ConfigStore) -> Result<()> {
    let config = store.load()?;
    let client = platform_client(&config);
    let refresher = SessionRefresher::new(client, Some(store));

    let Some(cookies) = refresher.refresh(&config.session()).await else {
        bail!("Cookie refresh failed, see the log for details");
    };

    for name in cookies.keys() {
        println!("{}", name);
    }
    info!("Refreshed {} cookies", cookies.len());

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let store = ConfigStore::new(cli.config);

    match cli.command {
        Commands::Monitor(args) => run_monitor(store, args).await,
        Commands::Check => run_check(store).await,
        Commands::CreateRevision(args) => run_create_revision(store, args).await,
        Commands::RefreshCookies => run_refresh_cookies(store).await,
    }
}
