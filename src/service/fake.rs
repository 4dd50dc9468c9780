//! Scripted in-memory service used by the tests.

use async_trait::async_trait;
use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use super::{AnalysisService, JobStatus, ReportedResult, ServiceError, StatusReport};
use crate::jobs::SelectedFile;

/// Replays queued responses; an exhausted poll script keeps answering `processing`.
#[derive(Default)]
pub struct ScriptedService {
    uploads: Mutex<VecDeque<Result<String, ServiceError>>>,
    polls: Mutex<VecDeque<Result<StatusReport, ServiceError>>>,
    pub submit_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload(self, r: Result<String, ServiceError>) -> Self {
        self.uploads.lock().unwrap().push_back(r);
        self
    }

    pub fn poll(self, r: Result<StatusReport, ServiceError>) -> Self {
        self.polls.lock().unwrap().push_back(r);
        self
    }

    pub fn submits(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisService for ScriptedService {
    async fn submit(&self, _file: &SelectedFile) -> Result<String, ServiceError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.uploads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("job-default".into()))
    }

    async fn poll_status(&self, _job_id: &str) -> Result<StatusReport, ServiceError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(report(JobStatus::Processing)))
    }
}

/// A report with the given status and no result fields.
pub fn report(status: JobStatus) -> StatusReport {
    StatusReport {
        status,
        message: None,
        result: ReportedResult::default(),
    }
}

/// A completed report with score and classification.
pub fn completed(score: f64, classification: &str) -> StatusReport {
    StatusReport {
        status: JobStatus::Completed,
        message: Some("Analysis complete.".into()),
        result: ReportedResult {
            authenticity_score: Some(score),
            classification: Some(classification.into()),
            ..ReportedResult::default()
        },
    }
}

/// A failed report with a message.
pub fn failed(message: &str) -> StatusReport {
    StatusReport {
        status: JobStatus::Failed,
        message: Some(message.into()),
        result: ReportedResult::default(),
    }
}

/// A 2 MB JPEG selection that is never read from disk.
pub fn sample_jpeg() -> SelectedFile {
    SelectedFile {
        path: "/tmp/portrait.jpg".into(),
        name: "portrait.jpg".into(),
        size_bytes: 2 * 1024 * 1024,
        content_type: "image/jpeg".into(),
    }
}
