//! Scan state machine: `Idle -> Uploading -> Analyzing -> Complete`, with
//! failures falling back to `Idle`.
//!
//! The controller never performs I/O. It decides what should happen and the
//! app forwards the resulting requests to the worker; worker events come back
//! through the `upload_*`, `apply_status` and `poll_aborted` methods. Events
//! tagged with a scan id other than the active one are dropped.

use anyhow::{Result, anyhow};
use uuid::Uuid;

use crate::{
    jobs::{AnalysisJob, AnalysisResult, Phase, SelectedFile},
    service::{JobStatus, StatusReport},
};

/// Blocking notice shown to the user until dismissed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

impl Notice {
    fn new(title: &str, message: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            message: message.into(),
        }
    }
}

/// What the worker must be asked to do after `start_analysis`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartRequest {
    pub scan_id: Uuid,
    pub file: SelectedFile,
}

/// Whether the polling loop should keep going after a report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollDirective {
    Continue,
    Stop,
}

#[derive(Debug)]
pub struct ScanController {
    phase: Phase,
    file: Option<SelectedFile>,
    /// Scan whose events are currently accepted.
    scan_id: Option<Uuid>,
    job: Option<AnalysisJob>,
    result: Option<AnalysisResult>,
    notice: Option<Notice>,
    authentic_threshold: f64,
    /// Threshold captured when the running scan started.
    scan_threshold: f64,
}

impl ScanController {
    pub fn new(authentic_threshold: f64) -> Self {
        Self {
            phase: Phase::Idle,
            file: None,
            scan_id: None,
            job: None,
            result: None,
            notice: None,
            authentic_threshold,
            scan_threshold: authentic_threshold,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    pub fn job(&self) -> Option<&AnalysisJob> {
        self.job.as_ref()
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Applies to scans started after this call.
    pub fn set_authentic_threshold(&mut self, threshold: f64) {
        self.authentic_threshold = threshold;
    }

    /// Replace the selected file. Only allowed while idle.
    pub fn select_file(&mut self, file: SelectedFile) -> Result<()> {
        if self.phase != Phase::Idle {
            return Err(anyhow!(
                "cannot change the file while {}",
                self.phase.label().to_lowercase()
            ));
        }
        tracing::info!("file selected: {} ({})", file.name, file.content_type);
        self.file = Some(file);
        Ok(())
    }

    /// Begin a scan of the selected file.
    ///
    /// Returns `None` (and changes nothing) when no file is selected or a scan
    /// is already under way.
    pub fn start_analysis(&mut self) -> Option<StartRequest> {
        if self.phase != Phase::Idle {
            tracing::warn!("start ignored in phase {:?}", self.phase);
            return None;
        }
        let file = self.file.clone()?;
        let scan_id = Uuid::new_v4();
        self.scan_id = Some(scan_id);
        self.job = None;
        self.result = None;
        self.notice = None;
        self.scan_threshold = self.authentic_threshold;
        self.transition(Phase::Uploading);
        Some(StartRequest { scan_id, file })
    }

    /// The service accepted the upload. Returns false for stale events.
    pub fn upload_succeeded(&mut self, scan_id: Uuid, job_id: String) -> bool {
        if !self.accepts(scan_id, Phase::Uploading) {
            return false;
        }
        tracing::info!("job accepted: {job_id}");
        self.job = Some(AnalysisJob { scan_id, job_id });
        self.transition(Phase::Analyzing);
        true
    }

    /// Transport failure or non-success response on upload.
    pub fn upload_failed(&mut self, scan_id: Uuid, reason: &str) {
        if !self.accepts(scan_id, Phase::Uploading) {
            return;
        }
        tracing::error!("upload failed: {reason}");
        self.end_scan();
        self.notice = Some(Notice::new(
            "Upload failed",
            format!("Failed to start analysis. Is the backend running?\n\n{reason}"),
        ));
    }

    /// Apply one status report from the polling loop.
    pub fn apply_status(&mut self, scan_id: Uuid, report: StatusReport) -> PollDirective {
        if !self.accepts(scan_id, Phase::Analyzing) {
            return PollDirective::Stop;
        }
        match report.status {
            JobStatus::Completed => {
                match report.to_result(self.scan_threshold) {
                    Ok(result) => {
                        tracing::info!(
                            "analysis complete: score={} classification={}",
                            result.authenticity_score,
                            result.classification
                        );
                        self.result = Some(result);
                        self.scan_id = None;
                        self.transition(Phase::Complete);
                    }
                    Err(reason) => {
                        tracing::error!("unusable completion: {reason}");
                        self.end_scan();
                        self.notice = Some(Notice::new(
                            "Analysis failed",
                            format!("Analysis failed: {reason}"),
                        ));
                    }
                }
                PollDirective::Stop
            }
            JobStatus::Failed => {
                let message = report
                    .message
                    .unwrap_or_else(|| "no reason given".to_string());
                tracing::warn!("analysis failed: {message}");
                self.end_scan();
                self.notice = Some(Notice::new(
                    "Analysis failed",
                    format!("Analysis failed: {message}"),
                ));
                PollDirective::Stop
            }
            JobStatus::Queued | JobStatus::Processing | JobStatus::Other(_) => {
                PollDirective::Continue
            }
        }
    }

    /// A single poll hit a transport error and the loop ended.
    ///
    /// Logged only; the phase stays `Analyzing` until the user resets.
    pub fn poll_aborted(&mut self, scan_id: Uuid, reason: &str) {
        if self.accepts(scan_id, Phase::Analyzing) {
            tracing::error!("polling error: {reason}");
        }
    }

    /// Clear file, job, result and notice and go back to `Idle`.
    ///
    /// Returns the scan whose loop is still running, if any, so the caller can
    /// cancel it.
    pub fn reset_analysis(&mut self) -> Option<Uuid> {
        let running = match self.phase {
            Phase::Uploading | Phase::Analyzing => self.scan_id,
            Phase::Idle | Phase::Complete => None,
        };
        self.scan_id = None;
        self.file = None;
        self.job = None;
        self.result = None;
        self.notice = None;
        self.transition(Phase::Idle);
        running
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    fn accepts(&self, scan_id: Uuid, phase: Phase) -> bool {
        let ok = self.scan_id == Some(scan_id) && self.phase == phase;
        if !ok {
            tracing::debug!("dropping event for scan {scan_id} in phase {:?}", self.phase);
        }
        ok
    }

    /// Failure path: back to idle, file kept for a retry.
    fn end_scan(&mut self) {
        self.scan_id = None;
        self.job = None;
        self.transition(Phase::Idle);
    }

    fn transition(&mut self, next: Phase) {
        if self.phase != next {
            tracing::info!("phase {:?} -> {:?}", self.phase, next);
        }
        self.phase = next;
    }
}
