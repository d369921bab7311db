use anyhow::Result;
use clap::{Parser, Subcommand};
use runtime::{AppConfig, CliArgs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use swagin::App;
use swagin_demo::settings::{demo_from, swagger_from};
use swagin_demo::store::UserStore;

/// swagin demo - a users API with generated OpenAPI docs
#[derive(Parser)]
#[command(name = "swagin-demo")]
#[command(about = "swagin demo - a users API with generated OpenAPI docs")]
#[command(version)]
struct Cli {
    /// YAML configuration file; built-in defaults when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listen on this port instead of `server.port`
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the merged configuration as YAML and exit
    #[arg(long)]
    print_config: bool,

    /// Raise console verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the users API (the default)
    Run,
    /// Check configuration and the generated document
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.display().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.clone().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, Path::new(&config.server.home_dir));
    tracing::info!("swagin demo starting");

    if args.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(config),
    }
}

fn build(config: &AppConfig) -> Result<App> {
    let swagger = swagger_from(config)?;
    let settings = demo_from(config)?;
    let mut app = swagin_demo::build_app(swagger, &settings, Arc::new(UserStore::new()));

    if let Some(limit) = config.server.body_limit_bytes {
        app.body_limit(limit);
    }
    if config.server.timeout_sec > 0 {
        app.request_timeout(Duration::from_secs(config.server.timeout_sec));
    }
    Ok(app)
}

async fn run_server(config: AppConfig) -> Result<()> {
    let app = build(&config)?;
    let addr = config.server.bind_addr();
    app.serve_until(Some(&addr), swagin::cancel_on_signal()).await
}

fn check_config(config: AppConfig) -> Result<()> {
    tracing::info!("checking configuration");

    let app = build(&config)?;
    let paths = app.openapi()?.map_or(0, |doc| doc.paths.len());
    app.into_router()?;

    println!("Configuration check passed");
    println!("Documented paths: {paths}");
    println!("{}", config.to_yaml()?);
    Ok(())
}
