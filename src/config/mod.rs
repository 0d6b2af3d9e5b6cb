use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Default HTTP port when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 8080;

/// Default time zone for new events and "today"/"this week" windows.
pub const DEFAULT_TIME_ZONE: &str = "Asia/Jerusalem";

/// Secret Manager secret holding the OAuth client JSON.
pub const DEFAULT_CLIENT_SECRET_NAME: &str = "gmail-client-secret";

/// Secret Manager secret holding the OAuth token JSON.
pub const DEFAULT_TOKEN_SECRET_NAME: &str = "gmail-oauth-token";

/// Where OAuth credentials and tokens are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialMode {
    /// `client_secret_*.json` and `token.json` inside `dir`.
    Local { dir: PathBuf },
    /// Google Secret Manager under `project_id`.
    Cloud {
        project_id: String,
        client_secret_name: String,
        token_secret_name: String,
    },
}

/// Which transport the `serve` command binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Http,
}

/// Optional on-disk overrides, loaded from YAML.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub port: Option<u16>,
    /// Bind address for the HTTP transport (default `0.0.0.0`).
    #[serde(default)]
    pub host: Option<IpAddr>,
    #[serde(default)]
    pub time_zone: Option<String>,
    /// Directory searched for the credential and token files in local mode.
    #[serde(default)]
    pub credentials_dir: Option<PathBuf>,
    /// GCP project; presence selects cloud mode just like `GCP_PROJECT_ID`.
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub secrets: Option<SecretNames>,
    #[serde(default)]
    pub transport: Option<TransportKind>,
}

/// Names of the two Secret Manager secrets used in cloud mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SecretNames {
    #[serde(default = "default_client_secret_name")]
    pub client_secret: String,
    #[serde(default = "default_token_secret_name")]
    pub oauth_token: String,
}

fn default_client_secret_name() -> String {
    DEFAULT_CLIENT_SECRET_NAME.to_string()
}

fn default_token_secret_name() -> String {
    DEFAULT_TOKEN_SECRET_NAME.to_string()
}

impl Default for SecretNames {
    fn default() -> Self {
        Self {
            client_secret: default_client_secret_name(),
            oauth_token: default_token_secret_name(),
        }
    }
}

/// Process-wide configuration, resolved once at startup and passed to
/// every constructor that needs it.
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: CredentialMode,
    pub transport: TransportKind,
    pub host: IpAddr,
    pub port: u16,
    pub time_zone: chrono_tz::Tz,
}

/// Snapshot of the environment variables the gateway reads.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    pub port: Option<String>,
    pub project_id: Option<String>,
    pub time_zone: Option<String>,
}

impl EnvOverrides {
    pub fn from_process() -> Self {
        Self {
            port: std::env::var("PORT").ok(),
            project_id: std::env::var("GCP_PROJECT_ID").ok(),
            time_zone: std::env::var("MAILCAL_TIME_ZONE").ok(),
        }
    }
}

impl Config {
    /// Resolve configuration from the process environment and an optional
    /// YAML file.
    pub async fn load(path: Option<&Path>) -> anyhow::Result<Config> {
        let file = match path {
            Some(p) => ConfigFile::read(p).await?,
            None => ConfigFile::default(),
        };
        Config::resolve(file, EnvOverrides::from_process())
    }

    /// Merge file values with environment overrides; the environment wins.
    pub fn resolve(file: ConfigFile, env: EnvOverrides) -> anyhow::Result<Config> {
        let port = match env.port.as_deref() {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("invalid PORT value: {raw:?}"))?,
            None => file.port.unwrap_or(DEFAULT_PORT),
        };

        let tz_name = env
            .time_zone
            .or(file.time_zone)
            .unwrap_or_else(|| DEFAULT_TIME_ZONE.to_string());
        let time_zone: chrono_tz::Tz = tz_name
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid time zone {tz_name:?}: {e}"))?;

        // Mere presence of the variable selects cloud mode, even when empty.
        let project_id = env.project_id.or(file.project_id);
        let mode = match project_id {
            Some(project_id) => {
                let names = file.secrets.unwrap_or_default();
                CredentialMode::Cloud {
                    project_id,
                    client_secret_name: names.client_secret,
                    token_secret_name: names.oauth_token,
                }
            }
            None => CredentialMode::Local {
                dir: match file.credentials_dir {
                    Some(dir) => dir,
                    None => std::env::current_dir().context("cannot determine working directory")?,
                },
            },
        };

        let transport = file.transport.unwrap_or(match mode {
            CredentialMode::Cloud { .. } => TransportKind::Http,
            CredentialMode::Local { .. } => TransportKind::Stdio,
        });

        let config = Config {
            mode,
            transport,
            host: file.host.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            port,
            time_zone,
        };
        tracing::debug!(?config, "configuration resolved");
        Ok(config)
    }

    pub fn is_cloud(&self) -> bool {
        matches!(self.mode, CredentialMode::Cloud { .. })
    }

    /// Socket address for the HTTP transport.
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl ConfigFile {
    /// Read and parse a YAML configuration file.
    pub async fn read(path: &Path) -> anyhow::Result<ConfigFile> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let file: ConfigFile =
            serde_yaml_ng::from_str(&contents).context("failed to parse config YAML")?;
        Ok(file)
    }
}
