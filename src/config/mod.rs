// ABOUTME: Startup configuration for the bridge.
// ABOUTME: Merges sshbridge.yml with CLI/env overrides and resolves it into session credentials.

mod env_value;
mod init;

pub use env_value::EnvValue;
pub use init::init_config;

use crate::error::{Error, Result};
use crate::ssh::{Auth, KeyMaterial, SessionConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "sshbridge.yml";
pub const CONFIG_FILENAME_ALT: &str = "sshbridge.yaml";

pub const DEFAULT_PORT: u16 = 22;

/// Settings as read from the config file. Every field may also come from
/// the command line or environment, so nothing is required at parse time.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<EnvValue>,

    #[serde(default)]
    pub key_file: Option<PathBuf>,

    #[serde(default = "default_trust_on_first_use")]
    pub trust_on_first_use: bool,

    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,

    #[serde(default, with = "humantime_serde")]
    pub command_timeout: Option<Duration>,
}

fn default_trust_on_first_use() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            user: None,
            password: None,
            key_file: None,
            trust_on_first_use: default_trust_on_first_use(),
            known_hosts_path: None,
            command_timeout: None,
        }
    }
}

/// Values supplied on the command line or through the environment.
/// They take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub key_file: Option<PathBuf>,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Load the config file from `dir` if one exists, else start empty.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [dir.join(CONFIG_FILENAME), dir.join(CONFIG_FILENAME_ALT)];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config file");
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Apply command-line and environment values on top of this config.
    pub fn with_overrides(mut self, overrides: Overrides) -> Result<Self> {
        if let Some(host) = overrides.host {
            self.host = Some(host);
        }
        if let Some(port) = overrides.port {
            self.port = Some(parse_port(&port)?);
        }
        if let Some(user) = overrides.user {
            self.user = Some(user);
        }
        if let Some(password) = overrides.password {
            self.password = Some(EnvValue::Literal(password));
        }
        if let Some(key_file) = overrides.key_file {
            self.key_file = Some(key_file);
        }
        Ok(self)
    }

    /// Validate and resolve into the credentials used for every session.
    ///
    /// Reads the key file, so an unreadable key fails here rather than on
    /// the first call.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let host = required(&self.host, "host")?;
        let user = required(&self.user, "user")?;
        let port = match self.port {
            Some(0) => return Err(Error::InvalidPort("0".to_string())),
            Some(port) => port,
            None => DEFAULT_PORT,
        };

        let password = self.password.as_ref().map(EnvValue::resolve).transpose()?;
        let key = self
            .key_file
            .as_ref()
            .map(|path| {
                let path = expand_home(path);
                std::fs::read_to_string(&path)
                    .map(KeyMaterial::new)
                    .map_err(|source| Error::KeyFile { path, source })
            })
            .transpose()?;

        let mut config = SessionConfig::new(host, user)
            .port(port)
            .trust_on_first_use(self.trust_on_first_use);
        config.auth = Auth::select(password, key);
        if let Some(path) = &self.known_hosts_path {
            config = config.known_hosts_path(expand_home(path));
        }
        if let Some(timeout) = self.command_timeout {
            config = config.command_timeout(timeout);
        }
        Ok(config)
    }
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::MissingSetting(field)),
    }
}

/// Expand a leading `~/` to $HOME. Paths are returned unchanged when HOME
/// is not set.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

/// Parse a TCP port in 1..=65535.
pub fn parse_port(value: &str) -> Result<u16> {
    match value.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(Error::InvalidPort(value.to_string())),
        Ok(port) => Ok(port),
    }
}
