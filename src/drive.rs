//! Google Drive (v3) search and streamed download.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::auth::OAuthSession;
use crate::google::{path_segment, GoogleApi};

pub const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
    /// Byte size; Drive reports it as a decimal string.
    #[serde(default)]
    pub size: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileList {
    files: Vec<DriveFile>,
}

/// Quote a value for a Drive `q` expression.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

#[derive(Debug, Clone)]
pub struct DriveClient {
    api: GoogleApi,
}

impl DriveClient {
    pub fn new(session: Arc<OAuthSession>) -> Self {
        Self::with_base_url(session, DRIVE_API)
    }

    pub fn with_base_url(session: Arc<OAuthSession>, base_url: impl Into<String>) -> Self {
        Self {
            api: GoogleApi::new(session, base_url),
        }
    }

    /// Non-trashed files with exactly this name, most recently modified first.
    pub async fn search_files_by_name(&self, name: &str) -> anyhow::Result<Vec<DriveFile>> {
        let list: FileList = self
            .api
            .get_json(
                "/files",
                &[
                    ("q", format!("name={} and trashed=false", quote(name))),
                    ("fields", "files(id, name, mimeType, modifiedTime, size)".to_string()),
                    ("orderBy", "modifiedTime desc".to_string()),
                    ("pageSize", "10".to_string()),
                ],
            )
            .await
            .context("failed to search files")?;
        Ok(list.files)
    }

    /// Stream the file's content into `dest`, returning the bytes written.
    ///
    /// Bytes land in a `.part` file beside `dest`, which is renamed over
    /// `dest` only once the transfer completes. On failure only the `.part`
    /// file is removed and an existing `dest` is left untouched.
    pub async fn download_file(&self, file_id: &str, dest: &Path) -> anyhow::Result<u64> {
        let resp = self
            .api
            .get_raw(
                &format!("/files/{}", path_segment(file_id)?),
                &[("alt", "media".to_string())],
            )
            .await
            .context("failed to download file")?;

        let partial = partial_path(dest);
        let written = match stream_to(resp, &partial, dest).await {
            Ok(written) => written,
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&partial).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %partial.display(), "failed to remove partial download: {rm}");
                    }
                }
                return Err(e.context("failed to download file"));
            }
        };

        debug!(file_id, bytes = written, path = %dest.display(), "download complete");
        Ok(written)
    }

    /// Download the first match for `name`.
    pub async fn download_by_name(&self, name: &str, dest: &Path) -> anyhow::Result<(DriveFile, u64)> {
        let file = self
            .search_files_by_name(name)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("File not found: {name}"))?;
        let bytes = self.download_file(&file.id, dest).await?;
        Ok((file, bytes))
    }
}

/// `<dest>.part` in the same directory, so the final rename stays on one
/// filesystem.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "download".into());
    name.push(".part");
    dest.with_file_name(name)
}

/// Write the body to `partial`, then rename it over `dest`.
async fn stream_to(resp: reqwest::Response, partial: &Path, dest: &Path) -> anyhow::Result<u64> {
    use tokio_stream::StreamExt as _;

    let mut file = tokio::fs::File::create(partial)
        .await
        .with_context(|| format!("cannot create {}", partial.display()))?;
    let mut stream = resp.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(partial, dest)
        .await
        .with_context(|| format!("cannot move download into {}", dest.display()))?;
    Ok(written)
}
