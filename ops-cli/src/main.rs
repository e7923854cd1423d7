use anyhow::{Context, Result};
use auth_acl::{AclClient, AclConfig};
use clap::Parser;
use ops_cli::{run, Cli};
use std::env;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let config = AclConfig::load(Some(&cli.config))
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    debug!(
        "Engine at {}:{}, replica configured: {}",
        config.openfga.host,
        config.openfga.port,
        config.openfga.replica.is_configured()
    );

    let acl = AclClient::from_config(&config)
        .await
        .context("Failed to connect to the authorization engine")?;

    run(&acl, &cli.identity, cli.command).await
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };

    // Human-readable logs in development, JSON everywhere else
    let is_development =
        env::var("ACL_ENV").unwrap_or_else(|_| "development".to_string()) == "development";

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            format!("aclctl={level},ops_cli={level},auth_acl={level},reqwest=warn").into()
        });

    if is_development {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(std::io::stderr)
                    .json(),
            )
            .init();
    }
}
