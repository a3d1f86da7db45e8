//! Client for the companion upload server.

use serde::Deserialize;
use site_types::{AssetCategory, UploadError};

/// File-storage server that can hold images outside the browser store.
#[async_trait::async_trait]
pub trait UploadClient: Send + Sync {
    /// Store `bytes` under `folder`; returns the server path of the stored file.
    async fn upload(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        original_name: &str,
        folder: AssetCategory,
    ) -> Result<String, UploadError>;

    async fn delete(&self, file_path: &str) -> Result<(), UploadError>;

    async fn health(&self) -> Result<(), UploadError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    success: bool,
    file_path: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    success: bool,
}

/// Talks to an upload server over HTTP (`POST /api/upload`, `POST /api/delete`, `GET /api/health`).
pub struct HttpUploadClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUploadClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn network(e: reqwest::Error) -> UploadError {
    UploadError::Network(e.to_string())
}

#[async_trait::async_trait]
impl UploadClient for HttpUploadClient {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        original_name: &str,
        folder: AssetCategory,
    ) -> Result<String, UploadError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(original_name.to_string())
            .mime_str(mime_type)
            .map_err(network)?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("folder", folder.as_str());
        let res = self
            .client
            .post(self.url("/api/upload"))
            .multipart(form)
            .send()
            .await
            .map_err(network)?;
        let status = res.status();
        let body = res.text().await.map_err(network)?;
        if !status.is_success() {
            return Err(UploadError::Rejected(format!(
                "upload server error {}: {}",
                status, body
            )));
        }
        let parsed: UploadResponse =
            serde_json::from_str(&body).map_err(|e| UploadError::Rejected(e.to_string()))?;
        match (parsed.success, parsed.file_path) {
            (true, Some(path)) => Ok(path),
            _ => Err(UploadError::Rejected(
                parsed
                    .error
                    .unwrap_or_else(|| "upload server returned no file path".to_string()),
            )),
        }
    }

    async fn delete(&self, file_path: &str) -> Result<(), UploadError> {
        let res = self
            .client
            .post(self.url("/api/delete"))
            .json(&serde_json::json!({ "filePath": file_path }))
            .send()
            .await
            .map_err(network)?;
        let status = res.status();
        if !status.is_success() {
            return Err(UploadError::Rejected(format!("delete failed: {}", status)));
        }
        let parsed: DeleteResponse = res.json().await.map_err(network)?;
        if parsed.success {
            Ok(())
        } else {
            Err(UploadError::Rejected(format!("server refused to delete {}", file_path)))
        }
    }

    async fn health(&self) -> Result<(), UploadError> {
        let res = self
            .client
            .get(self.url("/api/health"))
            .send()
            .await
            .map_err(network)?;
        if res.status().is_success() {
            Ok(())
        } else {
            Err(UploadError::Rejected(format!("health check returned {}", res.status())))
        }
    }
}
