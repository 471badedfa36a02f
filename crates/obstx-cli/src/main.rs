//! 🚀 obstx-cli, the front door, the bouncer, the maitre d' of obstx.
//!
//! 🎬 *[narrator voice]* "It all started with a bucket nobody had counted in years..."
//! 📦 This binary is the thin wrapper that parses flags, sets up logging, loads config
//! and credentials, and then lets the library do the heavy lifting. Like a manager. 🦆

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use crate::args::{BucketArgs, Cli, Command};
use obstx::app_config::{AppConfig, load_config};
use obstx::commands::{self, ListFormat};
use obstx::progress::summary_table;

/// 🚀 main(), where it all begins.
///
/// 🔧 Steps:
/// 1. Parse args (clap does the yelling for us)
/// 2. Init tracing to stderr, so stdout is only ever command output
/// 3. Run the subcommand
/// 4. Handle errors (cry, then exit 1)
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 📡 --debug wins over RUST_LOG; otherwise RUST_LOG, otherwise info
    let filter = if cli.debug {
        EnvFilter::new("obstx=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = run(cli).await;

    if let Err(err) = result {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one layer at a time
        let mut the_vibes_are_giving_connection_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            let cause_str = cause.to_string();
            if cause_str.contains("error sending request")
                || cause_str.contains("connection refused")
                || cause_str.contains("Connection refused")
                || cause_str.contains("tcp connect error")
                || cause_str.contains("dns error")
                || cause_str.contains("operation timed out")
            {
                the_vibes_are_giving_connection_issues = true;
            }
        }

        if the_vibes_are_giving_connection_issues {
            error!(
                "🔧 hint: the object storage endpoint isn't reachable. \
                Double-check --endpoint (or base_url in the config), your DNS, \
                and any proxy between you and the bucket. ☕"
            );
        }

        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Summary(bucket_args) => {
            let (config, credentials) = prepare(cli.config.as_deref(), &bucket_args)?;
            let report = commands::summary(
                &config,
                credentials,
                &bucket_args.bucket,
                cancel_on_ctrl_c(),
                true,
            )
            .await?;
            println!(
                "{}",
                summary_table(&report.bucket, report.pages, report.totals, report.elapsed)
            );
            Ok(())
        }
        Command::List {
            bucket,
            limit,
            json,
        } => {
            let (config, credentials) = prepare(cli.config.as_deref(), &bucket)?;
            let mut stdout = std::io::BufWriter::new(std::io::stdout());
            let format = if json {
                ListFormat::JsonLines
            } else {
                ListFormat::Tsv
            };
            commands::list(
                &config,
                credentials,
                &bucket.bucket,
                limit,
                format,
                &mut stdout,
                cancel_on_ctrl_c(),
            )
            .await?;
            Ok(())
        }
    }
}

/// 🔧 Config layers + CLI overrides, then credentials for the requested profile.
fn prepare(
    config_file: Option<&std::path::Path>,
    bucket_args: &BucketArgs,
) -> Result<(AppConfig, obstx::client::Credentials)> {
    let config = load_config(config_file)
        .context("💀 Couldn't load the config. Check the TOML file and any OBSTX_* variables.")?
        .with_overrides(bucket_args.endpoint.clone(), bucket_args.region.clone());
    let credentials = commands::load_credentials(&config, &bucket_args.profile)?;
    Ok((config, credentials))
}

/// 🛑 Ctrl-C cancels whatever request is in flight; the run then fails with `Cancelled`.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 interrupted, cancelling the in-flight request");
            trigger.cancel();
        }
    });
    cancel
}
