//! 🎛️ CLI arguments. Flags, subcommands, and --help text that writes itself.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// 🪣 Count and list objects in S3-compatible buckets (Sakura Cloud object storage by default).
#[derive(Parser, Debug)]
#[command(name = "obstx")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging (progress every N pages, request URLs)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Optional TOML config file, layered under OBSTX_* env vars
    #[arg(long, global = true, env = "OBSTX_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show total object size and count
    Summary(BucketArgs),
    /// Print last_modified, size and key for each object, tab separated
    List {
        #[command(flatten)]
        bucket: BucketArgs,

        /// Stop after printing this many objects
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        limit: Option<u64>,

        /// Print one JSON object per line instead of tab separated columns
        #[arg(long)]
        json: bool,
    },
    /// Show version and exit
    Version,
}

#[derive(Args, Debug)]
pub struct BucketArgs {
    /// Sakura Cloud profile name (empty string means the current profile)
    #[arg(long)]
    pub profile: String,

    /// Bucket to look at
    pub bucket: String,

    /// Object storage endpoint domain [default: s3.isk01.sakurastorage.jp]
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Object storage region [default: jp-north-1]
    #[arg(long)]
    pub region: Option<String>,
}
