//! 🔧 App Configuration: where the endpoint, the region, and the timeouts come from.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." (every developer at 3am) 🦆
//!
//! 🏗️ Powered by Figment. Layers, lowest to highest:
//!   1. serde defaults (the Sakura Cloud Ishikari endpoint, `jp-north-1`, 100 pages per progress line)
//!   2. an optional TOML file
//!   3. `OBSTX_*` environment variables
//!   4. explicit CLI flags, via [`AppConfig::with_overrides`]

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::client::BucketTarget;
use crate::errors::ListingError;

pub const ENV_PREFIX: &str = "OBSTX_";

/// 📦 Everything a listing run needs to know that isn't a bucket name or a secret.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// 🌐 Object storage endpoint domain. The bucket name gets prepended as a subdomain.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// 🌏 Signing region.
    #[serde(default = "default_region")]
    pub region: String,
    /// 🔧 Full base URL override. When set, `endpoint` is ignored and no subdomain is added.
    #[serde(default)]
    pub base_url: Option<String>,
    /// 📊 Log a debug progress line every this many pages.
    #[serde(default = "default_progress_every_pages")]
    pub progress_every_pages: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// ⏱️ Whole-request timeout, body included. A page of 1000 keys should never need this long.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 📁 Where `.usacloud/` lives. Unset means "ask the environment, then $HOME".
    #[serde(default)]
    pub profile_dir: Option<PathBuf>,
}

fn default_endpoint() -> String {
    // -- 🗾 Ishikari, Hokkaido. cold outside, warm racks inside.
    "s3.isk01.sakurastorage.jp".to_string()
}

fn default_region() -> String {
    "jp-north-1".to_string()
}

fn default_progress_every_pages() -> u64 {
    crate::client::paginator::DEFAULT_PROGRESS_EVERY_PAGES
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            region: default_region(),
            base_url: None,
            progress_every_pages: default_progress_every_pages(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            profile_dir: None,
        }
    }
}

impl AppConfig {
    /// 🎛️ CLI flags win. `None` means the flag wasn't given, so the layered value stays.
    pub fn with_overrides(mut self, endpoint: Option<String>, region: Option<String>) -> Self {
        if let Some(endpoint) = endpoint {
            self.endpoint = endpoint;
        }
        if let Some(region) = region {
            self.region = region;
        }
        self
    }

    /// 🪣 Virtual-hosted `https://{bucket}.{endpoint}/`, unless `base_url` says otherwise.
    pub fn bucket_target(&self, bucket: &str) -> Result<BucketTarget, ListingError> {
        match &self.base_url {
            Some(base_url) => BucketTarget::with_base_url(bucket, base_url),
            None => BucketTarget::virtual_hosted(bucket, &self.endpoint),
        }
    }

    /// 📡 One HTTP client per run, with the configured timeouts baked in.
    pub fn http_client(&self) -> anyhow::Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(concat!("obstx/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .build()
            .context("💀 Failed to build the HTTP client. TLS backend having a moment?")
    }
}

/// 🚀 Load the config: defaults, then the TOML file if given, then `OBSTX_*` env vars.
///
/// A `config_file_name` that doesn't exist is an error. Figment would happily pretend
/// it was empty, and then you'd spend an hour wondering why your region is ignored.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    load_config_with_env_prefix(config_file_name, ENV_PREFIX)
}

fn load_config_with_env_prefix(
    config_file_name: Option<&Path>,
    env_prefix: &str,
) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = match config_file_name {
        Some(file_name) => {
            if !file_name.is_file() {
                bail!(
                    "💀 Config file '{}' does not exist. It exists in our hearts, but not on disk.",
                    file_name.display()
                );
            }
            Figment::new().merge(Toml::file(file_name))
        }
        None => Figment::new(),
    };
    let config = config.merge(Env::prefixed(env_prefix));

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables ({env_prefix}*).",
            path.display()
        ),
        None => format!(
            "💀 Failed to parse configuration from environment variables ({env_prefix}*). \
             No file was provided, so this one's all on the environment."
        ),
    };

    config.extract().context(context_msg)
}
