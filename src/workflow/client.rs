//! HTTP side of the recording workflow: upload and submission traits, their
//! reqwest implementations, and rejection classification.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::error;

use crate::api::attendance::{CreateAttendance, DUPLICATE_CODE};

const DUPLICATE_PHRASES: &[&str] = &["already marked", "already exists", "duplicate"];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("photo upload failed: {0}")]
    Failed(String),
}

/// Outcome of one submission attempt. `Duplicate` carries the backend
/// message verbatim so the caller can surface it with elevated prominence.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Submitted,
    Duplicate(String),
    Failed(String),
}

#[async_trait]
pub trait PhotoUploader: Send + Sync {
    /// Uploads one stamped photo, returning its file-reference id.
    async fn upload(
        &self,
        photo: Vec<u8>,
        filename: &str,
        project_id: Option<u64>,
    ) -> Result<String, UploadError>;
}

#[async_trait]
pub trait AttendanceApi: Send + Sync {
    async fn create(&self, record: &CreateAttendance) -> SubmitOutcome;
}

/// Classify a backend rejection. The storage layer signals the uniqueness
/// violation with [`DUPLICATE_CODE`] (HTTP 409); the phrase scan keeps the
/// distinct treatment working against backends that only send text.
pub fn classify_rejection(status: u16, code: Option<&str>, message: &str) -> SubmitOutcome {
    if code == Some(DUPLICATE_CODE) || status == 409 {
        return SubmitOutcome::Duplicate(message.to_string());
    }
    let lower = message.to_lowercase();
    if DUPLICATE_PHRASES.iter().any(|p| lower.contains(p)) {
        return SubmitOutcome::Duplicate(message.to_string());
    }
    SubmitOutcome::Failed(message.to_string())
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct UploadBody {
    id: String,
}

/// Talks to the sitetrack backend (or any compatible deployment).
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    // reqwest percent-encodes the pairs, so arbitrary filenames survive
    fn upload_request(&self, filename: &str, project_id: Option<u64>) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(format!("{}/uploads", self.base_url))
            .query(&[("filename", filename)]);
        if let Some(pid) = project_id {
            req = req.query(&[("project_id", pid.to_string())]);
        }
        req
    }
}

#[async_trait]
impl PhotoUploader for ApiClient {
    async fn upload(
        &self,
        photo: Vec<u8>,
        filename: &str,
        project_id: Option<u64>,
    ) -> Result<String, UploadError> {
        let resp = self
            .upload_request(filename, project_id)
            .header("content-type", "application/octet-stream")
            .body(photo)
            .send()
            .await
            .map_err(|e| UploadError::Failed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(%status, "photo upload rejected");
            return Err(UploadError::Failed(format!("{status}: {text}")));
        }
        let body: UploadBody = resp
            .json()
            .await
            .map_err(|e| UploadError::Failed(e.to_string()))?;
        Ok(body.id)
    }
}

#[async_trait]
impl AttendanceApi for ApiClient {
    async fn create(&self, record: &CreateAttendance) -> SubmitOutcome {
        let url = format!("{}/attendance", self.base_url);
        let resp = match self.client.post(&url).json(record).send().await {
            Ok(r) => r,
            Err(e) => return SubmitOutcome::Failed(e.to_string()),
        };

        let status = resp.status().as_u16();
        if (200..300).contains(&status) {
            return SubmitOutcome::Submitted;
        }
        let body: ErrorBody = resp.json().await.unwrap_or(ErrorBody {
            code: None,
            message: None,
        });
        let message = body.message.unwrap_or_else(|| "submission failed".into());
        classify_rejection(status, body.code.as_deref(), &message)
    }
}
