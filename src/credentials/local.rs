//! File-backed credential store used when no GCP project is configured.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{CredentialBundle, CredentialError, CredentialStore, TokenBundle};

/// Client-secret files are discovered by this prefix ...
pub const CLIENT_SECRET_PREFIX: &str = "client_secret_";
/// ... and this suffix.
pub const CLIENT_SECRET_SUFFIX: &str = ".json";
/// Token file name inside the credentials directory.
pub const TOKEN_FILE: &str = "token.json";

/// Reads `client_secret_*.json` and `token.json` from a directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> CredentialError + '_ {
        move |source| CredentialError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Locate the client-secret file.  When several match, the first one in
    /// directory order wins.
    async fn find_client_secret(&self) -> Result<PathBuf, CredentialError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CredentialError::CredentialNotFound {
                    dir: self.dir.clone(),
                })
            }
            Err(e) => return Err(Self::io_err(&self.dir)(e)),
        };

        let mut matches = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(Self::io_err(&self.dir))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(CLIENT_SECRET_PREFIX) && name.ends_with(CLIENT_SECRET_SUFFIX) {
                matches.push(entry.path());
            }
        }

        let mut matches = matches.into_iter();
        let first = matches.next().ok_or_else(|| CredentialError::CredentialNotFound {
            dir: self.dir.clone(),
        })?;
        let ignored: Vec<String> = matches.map(|p| p.display().to_string()).collect();
        if !ignored.is_empty() {
            warn!(
                using = %first.display(),
                ignored = ?ignored,
                "multiple client secret files found"
            );
        }
        Ok(first)
    }
}

#[async_trait]
impl CredentialStore for LocalStore {
    async fn resolve_credentials(&self) -> Result<CredentialBundle, CredentialError> {
        let path = self.find_client_secret().await?;
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(Self::io_err(&path))?;
        debug!(path = %path.display(), "client secret loaded");
        CredentialBundle::from_client_secret_json(&raw)
    }

    async fn resolve_token(&self) -> Result<TokenBundle, CredentialError> {
        let path = self.token_path();
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CredentialError::TokenNotFound {
                    location: path.display().to_string(),
                })
            }
            Err(e) => return Err(Self::io_err(&path)(e)),
        };
        TokenBundle::from_json(&raw)
    }

    async fn persist_token(&self, token: &TokenBundle) -> Result<(), CredentialError> {
        let path = self.token_path();
        let json = serde_json::to_string_pretty(token).map_err(|e| CredentialError::Malformed {
            what: "token".into(),
            reason: e.to_string(),
        })?;
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&path).await.map_err(Self::io_err(&path))?;

        // `mode` only applies on creation; tighten an existing file before writing.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(Self::io_err(&path))?;
        }

        file.write_all(json.as_bytes())
            .await
            .map_err(Self::io_err(&path))?;
        file.flush().await.map_err(Self::io_err(&path))?;

        debug!(path = %path.display(), "token saved");
        Ok(())
    }

    fn describe(&self) -> String {
        self.token_path().display().to_string()
    }
}
