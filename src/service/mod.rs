//! Client side of the remote forensic analysis service.

use async_trait::async_trait;
use thiserror::Error;

use crate::jobs::SelectedFile;

/// reqwest-backed implementation.
pub mod http;
/// Status payload schema and normalisation.
pub mod wire;

#[cfg(test)]
pub mod fake;

pub use http::HttpAnalysisService;
pub use wire::{JobStatus, ReportedResult, StatusReport};

/// Failures talking to the analysis service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Connection, timeout or body read failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The service answered with a non-success status.
    #[error("service rejected request ({status}): {detail}")]
    Rejected { status: u16, detail: String },
    /// The response did not match the expected schema.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// Reading the local file failed.
    #[error("cannot read upload: {0}")]
    Io(#[from] std::io::Error),
}

/// The two calls the client makes against the service.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Upload a file and return the job id assigned by the service.
    async fn submit(&self, file: &SelectedFile) -> Result<String, ServiceError>;

    /// Fetch the current status of a job.
    async fn poll_status(&self, job_id: &str) -> Result<StatusReport, ServiceError>;
}
