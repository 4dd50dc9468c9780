//! HTTP implementation of the analysis service API.

use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;

use super::{
    AnalysisService, ServiceError, StatusReport,
    wire::{self, UploadResponse},
};
use crate::{config::ServiceCfg, jobs::SelectedFile};

/// Talks to `{base}/upload` and `{base}/status/{job_id}`.
#[derive(Clone, Debug)]
pub struct HttpAnalysisService {
    http: Client,
    base_url: String,
}

impl HttpAnalysisService {
    /// Build a client with the configured base URL and request timeout.
    pub fn new(cfg: &ServiceCfg) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn upload_url(&self) -> String {
        format!("{}/upload", self.base_url)
    }

    fn status_url(&self, job_id: &str) -> String {
        format!("{}/status/{}", self.base_url, urlencoding::encode(job_id))
    }
}

/// Map a non-success response into `Rejected`, keeping the service's reason.
async fn reject_unless_success(resp: Response) -> Result<Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.bytes().await.unwrap_or_default();
    let detail = wire::error_detail(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    });
    Err(ServiceError::Rejected {
        status: status.as_u16(),
        detail,
    })
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn submit(&self, file: &SelectedFile) -> Result<String, ServiceError> {
        let bytes = tokio::fs::read(&file.path).await?;
        tracing::info!(
            "uploading {} ({} bytes, {})",
            file.name,
            bytes.len(),
            file.content_type
        );

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(&file.content_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .http
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;
        let body = reject_unless_success(resp).await?.bytes().await?;
        let upload: UploadResponse =
            serde_json::from_slice(&body).map_err(|e| ServiceError::Malformed(e.to_string()))?;
        if upload.job_id.is_empty() {
            return Err(ServiceError::Malformed("empty job_id".into()));
        }
        Ok(upload.job_id)
    }

    async fn poll_status(&self, job_id: &str) -> Result<StatusReport, ServiceError> {
        let resp = self.http.get(self.status_url(job_id)).send().await?;
        let body = reject_unless_success(resp).await?.bytes().await?;
        wire::parse_status(&body)
    }
}
