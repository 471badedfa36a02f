//! 🔑 Credential profiles, usacloud style.
//!
//! ```text
//! {base}/.usacloud/current               <- name of the profile to use when none is given
//! {base}/.usacloud/{profile}/config.json <- { "AccessToken": "...", "AccessTokenSecret": "..." }
//! ```
//!
//! `{base}` is the configured `profile_dir`, else `SAKURACLOUD_PROFILE_DIR`, else
//! `USACLOUD_PROFILE_DIR`, else `$HOME`. `SAKURACLOUD_ACCESS_TOKEN` and
//! `SAKURACLOUD_ACCESS_TOKEN_SECRET` beat whatever the file says.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use figment::{
    Figment,
    providers::{Format, Json},
};
use serde::Deserialize;
use tracing::debug;

use crate::client::Credentials;

pub const DEFAULT_PROFILE: &str = "default";

const PROFILE_DIR_ENV: [&str; 2] = ["SAKURACLOUD_PROFILE_DIR", "USACLOUD_PROFILE_DIR"];
const ACCESS_TOKEN_ENV: &str = "SAKURACLOUD_ACCESS_TOKEN";
const ACCESS_TOKEN_SECRET_ENV: &str = "SAKURACLOUD_ACCESS_TOKEN_SECRET";

/// 📄 The two keys we care about in a usacloud `config.json`. Everything else in there is ignored.
#[derive(Debug, Default, Deserialize)]
struct ProfileFile {
    #[serde(rename = "AccessToken", default)]
    access_token: String,
    #[serde(rename = "AccessTokenSecret", default)]
    access_token_secret: String,
}

/// 🗂️ Resolves a profile name into credentials.
#[derive(Clone)]
pub struct ProfileLoader {
    base_dir: PathBuf,
    env_access_token: Option<String>,
    env_access_token_secret: Option<String>,
}

impl std::fmt::Debug for ProfileLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileLoader")
            .field("base_dir", &self.base_dir)
            .field("env_access_token", &self.env_access_token.is_some())
            .field("env_access_token_secret", &self.env_access_token_secret.is_some())
            .finish()
    }
}

impl ProfileLoader {
    /// 🧪 A loader that only looks at files under `base_dir`. No environment involved.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            env_access_token: None,
            env_access_token_secret: None,
        }
    }

    /// 🌍 The real thing: base directory and token overrides from the environment.
    pub fn from_env(profile_dir: Option<&Path>) -> anyhow::Result<Self> {
        let base_dir = match profile_dir {
            Some(dir) => dir.to_path_buf(),
            None => PROFILE_DIR_ENV
                .iter()
                .find_map(|name| non_empty_env(name).map(PathBuf::from))
                .or_else(home_dir)
                .context("💀 No profile directory: set profile_dir, SAKURACLOUD_PROFILE_DIR, or HOME")?,
        };
        Ok(Self {
            base_dir,
            env_access_token: non_empty_env(ACCESS_TOKEN_ENV),
            env_access_token_secret: non_empty_env(ACCESS_TOKEN_SECRET_ENV),
        })
    }

    pub fn with_token_overrides(
        mut self,
        access_token: Option<String>,
        access_token_secret: Option<String>,
    ) -> Self {
        self.env_access_token = access_token;
        self.env_access_token_secret = access_token_secret;
        self
    }

    fn usacloud_dir(&self) -> PathBuf {
        self.base_dir.join(".usacloud")
    }

    pub fn profile_path(&self, profile: &str) -> PathBuf {
        self.usacloud_dir().join(profile).join("config.json")
    }

    /// 🎯 Empty name means "whatever `current` says", and if there's no `current`, `default`.
    pub fn resolve_name(&self, profile: &str) -> anyhow::Result<String> {
        if !profile.is_empty() {
            return Ok(profile.to_string());
        }
        let current_path = self.usacloud_dir().join("current");
        match std::fs::read_to_string(&current_path) {
            Ok(contents) if !contents.trim().is_empty() => Ok(contents.trim().to_string()),
            Ok(_) => Ok(DEFAULT_PROFILE.to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DEFAULT_PROFILE.to_string()),
            Err(e) => Err(e).with_context(|| {
                format!("💀 Failed to read current profile from '{}'", current_path.display())
            }),
        }
    }

    /// 🔑 Load credentials for `profile`. Env overrides apply on top of the file.
    pub fn load(&self, profile: &str) -> anyhow::Result<Credentials> {
        let name = self.resolve_name(profile)?;
        let path = self.profile_path(&name);

        let from_file = if path.is_file() {
            Figment::from(Json::file(&path))
                .extract::<ProfileFile>()
                .with_context(|| format!("💀 Failed to parse profile '{name}' at '{}'", path.display()))?
        } else {
            ProfileFile::default()
        };

        let access_token = self
            .env_access_token
            .clone()
            .unwrap_or(from_file.access_token);
        let access_token_secret = self
            .env_access_token_secret
            .clone()
            .unwrap_or(from_file.access_token_secret);

        if access_token.is_empty() || access_token_secret.is_empty() {
            bail!(
                "💀 Profile '{name}' has no usable credentials: expected AccessToken and AccessTokenSecret in '{}' \
                 (or {ACCESS_TOKEN_ENV} / {ACCESS_TOKEN_SECRET_ENV})",
                path.display()
            );
        }

        debug!(profile = %name, path = %path.display(), "🔑 credentials loaded");
        Ok(Credentials::new(access_token, access_token_secret))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn home_dir() -> Option<PathBuf> {
    non_empty_env("HOME")
        .or_else(|| non_empty_env("USERPROFILE"))
        .map(PathBuf::from)
}
