//! AllDebrid (v4 API) adapter.
//!
//! Every endpoint answers `{"status": "success", "data": ...}` or
//! `{"status": "error", "error": {"code", "message"}}`. Each endpoint gets
//! its own small response struct and is converted into the normalized
//! [`RemoteTransfer`] / [`RemoteFile`] values at the edge.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::RemoteCacheConfig;

use super::{RemoteCache, RemoteCacheError, RemoteFile, RemoteTransfer, SubmitRequest, TransferStatus};

/// `statusCode` meaning "fully cached and ready".
pub const READY_STATUS_CODE: i64 = 4;

const AUTH_ERROR_CODES: &[&str] = &[
    "AUTH_MISSING_APIKEY",
    "AUTH_BAD_APIKEY",
    "AUTH_BLOCKED",
    "AUTH_USER_BANNED",
];

pub struct AllDebridClient {
    client: Client,
    config: RemoteCacheConfig,
}

impl AllDebridClient {
    pub fn new(config: RemoteCacheConfig) -> Result<Self, RemoteCacheError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| RemoteCacheError::ConnectionFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Endpoint URL with agent and API key attached.
    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/v4/{}?agent={}&apikey={}",
            self.config.url.trim_end_matches('/'),
            path,
            urlencoding::encode(&self.config.agent),
            urlencoding::encode(&self.config.api_key)
        )
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, RemoteCacheError> {
        let response = self.client.get(url).send().await?;
        decode(response.status(), &response.text().await?)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<T, RemoteCacheError> {
        let response = self.client.post(url).form(form).send().await?;
        decode(response.status(), &response.text().await?)
    }
}

#[async_trait]
impl RemoteCache for AllDebridClient {
    fn name(&self) -> &str {
        "alldebrid"
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<RemoteTransfer, RemoteCacheError> {
        let data: UploadData = match request {
            SubmitRequest::Hash(hash) => {
                self.post(&self.endpoint("magnet/upload"), &[("magnets[]", hash.as_str())])
                    .await?
            }
            SubmitRequest::NzbLink(link) => {
                self.post(&self.endpoint("usenet/upload"), &[("links[]", link.as_str())])
                    .await?
            }
        };

        let entry = data
            .magnets
            .or(data.nzbs)
            .and_then(|entries| entries.into_iter().next())
            .ok_or_else(|| RemoteCacheError::Malformed("upload returned no entries".to_string()))?;

        if let Some(error) = entry.error {
            return Err(error.into());
        }
        let id = entry
            .id
            .ok_or_else(|| RemoteCacheError::Malformed("upload entry without id".to_string()))?;

        debug!(transfer_id = id, ready = entry.ready, "Submitted to AllDebrid");

        let (status, status_code) = if entry.ready {
            (TransferStatus::Ready, READY_STATUS_CODE)
        } else {
            (TransferStatus::Queued, 0)
        };
        Ok(RemoteTransfer {
            id: id.to_string(),
            name: entry.name.unwrap_or_default(),
            status,
            status_code,
            size_bytes: entry.size.unwrap_or(0),
        })
    }

    async fn status(&self, transfer_id: &str) -> Result<RemoteTransfer, RemoteCacheError> {
        let url = format!(
            "{}&id={}",
            self.endpoint("magnet/status"),
            urlencoding::encode(transfer_id)
        );
        let data: StatusData = self.get(&url).await?;
        let magnet = match data.magnets {
            StatusMagnets::One(m) => m,
            StatusMagnets::Many(list) => list
                .into_iter()
                .next()
                .ok_or_else(|| RemoteCacheError::Malformed("status returned no magnets".to_string()))?,
        };

        Ok(RemoteTransfer {
            id: magnet.id.to_string(),
            name: magnet.filename,
            status: status_from_code(magnet.status_code),
            status_code: magnet.status_code,
            size_bytes: magnet.size.unwrap_or(0),
        })
    }

    async fn files(&self, transfer_id: &str) -> Result<Vec<RemoteFile>, RemoteCacheError> {
        let url = format!(
            "{}&id[]={}",
            self.endpoint("magnet/files"),
            urlencoding::encode(transfer_id)
        );
        let data: FilesData = self.get(&url).await?;
        let magnet = data
            .magnets
            .into_iter()
            .next()
            .ok_or_else(|| RemoteCacheError::Malformed("files returned no magnets".to_string()))?;

        if let Some(error) = magnet.error {
            return Err(error.into());
        }

        let mut files = Vec::new();
        flatten_entries(magnet.files.unwrap_or_default(), "", &mut files);
        Ok(files)
    }

    async fn unlock(&self, link: &str) -> Result<String, RemoteCacheError> {
        let url = format!("{}&link={}", self.endpoint("link/unlock"), urlencoding::encode(link));
        let data: UnlockData = self.get(&url).await?;
        if data.link.is_empty() {
            return Err(RemoteCacheError::Malformed("unlock returned an empty link".to_string()));
        }
        Ok(data.link)
    }

    async fn delete(&self, transfer_id: &str) -> Result<(), RemoteCacheError> {
        let _: serde_json::Value = self
            .post(&self.endpoint("magnet/delete"), &[("id", transfer_id)])
            .await?;
        debug!(transfer_id, "Deleted AllDebrid transfer");
        Ok(())
    }
}

/// Map AllDebrid's numeric status onto the normalized lifecycle.
///
/// 0 queued, 1 downloading, 2-3 compressing/uploading, 4 ready, 5+ errors.
pub fn status_from_code(code: i64) -> TransferStatus {
    match code {
        0 => TransferStatus::Queued,
        1 => TransferStatus::Downloading,
        2 | 3 => TransferStatus::Processing,
        READY_STATUS_CODE => TransferStatus::Ready,
        _ => TransferStatus::Error,
    }
}

/// Decode an AllDebrid envelope.
fn decode<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, RemoteCacheError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RemoteCacheError::Unauthorized);
    }

    let envelope: Envelope<T> = serde_json::from_str(body).map_err(|e| {
        if status.is_success() {
            RemoteCacheError::Malformed(e.to_string())
        } else {
            RemoteCacheError::ApiError {
                code: status.as_u16().to_string(),
                message: body.chars().take(200).collect(),
            }
        }
    })?;

    if envelope.status == "success" {
        return envelope
            .data
            .ok_or_else(|| RemoteCacheError::Malformed("success without data".to_string()));
    }

    Err(envelope
        .error
        .map(RemoteCacheError::from)
        .unwrap_or_else(|| RemoteCacheError::Malformed(format!("status {}", envelope.status))))
}

/// Flatten the nested `{n, s, l}` / `{n, e: [...]}` file tree.
fn flatten_entries(entries: Vec<FileEntry>, prefix: &str, out: &mut Vec<RemoteFile>) {
    for entry in entries {
        let path = if prefix.is_empty() {
            entry.n
        } else {
            format!("{}/{}", prefix, entry.n)
        };
        match (entry.e, entry.l) {
            (Some(children), _) => flatten_entries(children, &path, out),
            (None, Some(link)) => out.push(RemoteFile {
                path,
                size_bytes: entry.s.unwrap_or(0),
                link,
            }),
            (None, None) => {}
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    data: Option<T>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

impl From<ErrorBody> for RemoteCacheError {
    fn from(e: ErrorBody) -> Self {
        if AUTH_ERROR_CODES.contains(&e.code.as_str()) {
            RemoteCacheError::Unauthorized
        } else {
            RemoteCacheError::ApiError {
                code: e.code,
                message: e.message,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadData {
    magnets: Option<Vec<UploadEntry>>,
    nzbs: Option<Vec<UploadEntry>>,
}

#[derive(Debug, Deserialize)]
struct UploadEntry {
    id: Option<u64>,
    name: Option<String>,
    size: Option<u64>,
    #[serde(default)]
    ready: bool,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StatusData {
    magnets: StatusMagnets,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StatusMagnets {
    Many(Vec<StatusMagnet>),
    One(StatusMagnet),
}

#[derive(Debug, Deserialize)]
struct StatusMagnet {
    id: u64,
    #[serde(default)]
    filename: String,
    size: Option<u64>,
    #[serde(rename = "statusCode")]
    status_code: i64,
}

#[derive(Debug, Deserialize)]
struct FilesData {
    magnets: Vec<FilesMagnet>,
}

#[derive(Debug, Deserialize)]
struct FilesMagnet {
    files: Option<Vec<FileEntry>>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    n: String,
    s: Option<u64>,
    l: Option<String>,
    e: Option<Vec<FileEntry>>,
}

#[derive(Debug, Deserialize)]
struct UnlockData {
    link: String,
}
