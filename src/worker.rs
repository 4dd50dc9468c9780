//! Background worker that owns the single active scan (upload, then polling).

use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    config::Config,
    jobs::SelectedFile,
    poller::{self, PollExit},
    service::{AnalysisService, HttpAnalysisService, StatusReport},
};

/// Commands sent from the UI to the worker.
#[derive(Debug)]
pub enum WorkerCmd {
    /// Upload the file and poll the resulting job. Cancels any active scan.
    StartAnalysis { scan_id: Uuid, file: SelectedFile },
    /// Stop the active scan, wherever it is.
    CancelAnalysis,
    /// Apply updated settings to subsequent scans.
    SaveSettings(Config),
}

/// Events emitted by the worker for UI updates.
#[derive(Clone, Debug)]
pub enum WorkerEvent {
    /// The service accepted the upload.
    Submitted { scan_id: Uuid, job_id: String },
    /// Upload failed (transport error or non-success response).
    SubmitFailed { scan_id: Uuid, error: String },
    /// One status report from the polling loop.
    Status { scan_id: Uuid, report: StatusReport },
    /// A poll request failed and the loop stopped.
    PollAborted { scan_id: Uuid, error: String },
    /// Informational log message.
    Log(String),
    /// User-visible error message.
    Error(String),
}

/// Handle to the running scan task.
struct ActiveScan {
    scan_id: Uuid,
    cancel: CancellationToken,
}

impl ActiveScan {
    fn cancel(self) {
        tracing::info!("cancelling scan {}", self.scan_id);
        self.cancel.cancel();
    }
}

/// Main worker loop: build the HTTP client, then handle commands.
pub async fn run(rx: mpsc::Receiver<WorkerCmd>, tx: mpsc::Sender<WorkerEvent>, cfg: Config) {
    let service: Arc<dyn AnalysisService> = match HttpAnalysisService::new(&cfg.service) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("HTTP client init failed: {e}");
            let _ = tx
                .send(WorkerEvent::Error(format!("HTTP client init failed: {e}")))
                .await;
            return;
        }
    };
    run_with(rx, tx, service, cfg).await;
}

/// Command loop over an arbitrary service implementation.
pub async fn run_with(
    mut rx: mpsc::Receiver<WorkerCmd>,
    tx: mpsc::Sender<WorkerEvent>,
    mut service: Arc<dyn AnalysisService>,
    mut cfg: Config,
) {
    tracing::info!("worker started (service {})", cfg.service.base_url);
    let mut active: Option<ActiveScan> = None;

    while let Some(cmd) = rx.recv().await {
        match cmd {
            WorkerCmd::StartAnalysis { scan_id, file } => {
                // At most one scan at a time.
                if let Some(prev) = active.take() {
                    prev.cancel();
                }
                tracing::info!("scan {scan_id} start: {}", file.name);
                let cancel = CancellationToken::new();
                tokio::spawn(run_scan(
                    service.clone(),
                    scan_id,
                    file,
                    cfg.poll_interval(),
                    cancel.clone(),
                    tx.clone(),
                ));
                active = Some(ActiveScan { scan_id, cancel });
            }

            WorkerCmd::CancelAnalysis => match active.take() {
                Some(prev) => {
                    let _ = tx
                        .send(WorkerEvent::Log(format!("scan {} cancelled", prev.scan_id)))
                        .await;
                    prev.cancel();
                }
                None => tracing::debug!("cancel requested with no active scan"),
            },

            WorkerCmd::SaveSettings(new_cfg) => {
                match HttpAnalysisService::new(&new_cfg.service) {
                    Ok(s) => {
                        service = Arc::new(s);
                        tracing::info!("settings updated: {}", new_cfg.service.base_url);
                        cfg = new_cfg;
                        let _ = tx.send(WorkerEvent::Log("settings updated".into())).await;
                    }
                    Err(e) => {
                        tracing::error!("settings rejected: {e}");
                        let _ = tx
                            .send(WorkerEvent::Error(format!("settings rejected: {e}")))
                            .await;
                    }
                }
            }
        }
    }

    // The UI is gone; nothing may keep polling behind it.
    if let Some(prev) = active.take() {
        prev.cancel();
    }
    tracing::info!("worker stopped");
}

/// Upload once, then poll the job until a terminal status, an error or cancel.
async fn run_scan(
    service: Arc<dyn AnalysisService>,
    scan_id: Uuid,
    file: SelectedFile,
    period: Duration,
    cancel: CancellationToken,
    tx: mpsc::Sender<WorkerEvent>,
) {
    let submitted = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::info!("scan {scan_id} cancelled during upload");
            return;
        }
        r = service.submit(&file) => r,
    };

    let job_id = match submitted {
        Ok(id) => id,
        Err(e) => {
            tracing::error!("scan {scan_id} upload failed: {e}");
            let _ = tx
                .send(WorkerEvent::SubmitFailed {
                    scan_id,
                    error: e.to_string(),
                })
                .await;
            return;
        }
    };

    tracing::info!("scan {scan_id} submitted as job {job_id}");
    if tx
        .send(WorkerEvent::Submitted {
            scan_id,
            job_id: job_id.clone(),
        })
        .await
        .is_err()
    {
        return;
    }

    match poller::poll_job(service.as_ref(), scan_id, &job_id, period, &cancel, &tx).await {
        PollExit::Terminal(status) => {
            tracing::info!("job {job_id} finished: {status:?}");
        }
        PollExit::Cancelled => {
            tracing::info!("job {job_id} polling cancelled");
        }
        PollExit::TransportFailed(e) => {
            tracing::error!("job {job_id} polling error: {e}");
            let _ = tx
                .send(WorkerEvent::PollAborted {
                    scan_id,
                    error: e.to_string(),
                })
                .await;
        }
    }
}
