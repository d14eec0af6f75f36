//! HTTP client for the LMS content-export API.

use super::models::{ContentExport, CreateExportRequest, ExportProgress};
use super::{ByteStream, ExportApi};
use crate::config::{CanvasConfig, ExportConfig};
use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bearer-authenticated client for one LMS tenant.
#[derive(Clone)]
pub struct CanvasClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    request_timeout: Duration,
    export_request: CreateExportRequest,
}

impl CanvasClient {
    pub fn new(canvas: &CanvasConfig, export: &ExportConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("course-backup/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: canvas.base_url(),
            token: canvas.token.clone(),
            request_timeout: Duration::from_secs(canvas.request_timeout_secs),
            export_request: CreateExportRequest {
                export_type: export.export_type.clone(),
                skip_notifications: export.skip_notifications,
            },
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URLs pass through; paths are joined onto the base URL.
    fn url(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            path_or_url.to_string()
        } else if path_or_url.starts_with('/') {
            format!("{}{}", self.base_url, path_or_url)
        } else {
            format!("{}/{}", self.base_url, path_or_url)
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(BackupError::status(what, resp.status()));
        }

        let body = resp.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| BackupError::RemoteRequest(format!("{}: malformed response: {}", what, e)))
    }
}

#[async_trait]
impl ExportApi for CanvasClient {
    async fn create_export(&self, course_id: &str) -> Result<ContentExport> {
        let url = self.url(&format!("/api/v1/courses/{}/content_exports", course_id));
        debug!(course_id, "Requesting content export");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .timeout(self.request_timeout)
            .json(&self.export_request)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(BackupError::status("create export", resp.status()));
        }

        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| {
            BackupError::RemoteRequest(format!("create export: malformed response: {}", e))
        })
    }

    async fn get_progress(&self, progress_url: &str) -> Result<ExportProgress> {
        self.get_json(&self.url(progress_url), "export progress").await
    }

    async fn get_export_result(&self, course_id: &str, export_id: u64) -> Result<String> {
        let url = self.url(&format!(
            "/api/v1/courses/{}/content_exports/{}",
            course_id, export_id
        ));
        let export: ContentExport = self.get_json(&url, "export result").await?;

        export.attachment.map(|a| a.url).ok_or_else(|| {
            BackupError::RemoteRequest(format!("export {} has no attachment", export_id))
        })
    }

    async fn stream_download(&self, url: &str) -> Result<ByteStream> {
        // Attachment URLs are pre-signed; no bearer token is sent.
        let resp = self.http.get(url).send().await?;

        if !resp.status().is_success() {
            return Err(BackupError::status("archive download", resp.status()));
        }

        let stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        Ok(Box::pin(stream))
    }
}
