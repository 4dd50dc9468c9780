//! Fixed-period status polling for one job.

use std::time::Duration;
use tokio::{
    sync::mpsc,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    service::{AnalysisService, JobStatus, ServiceError},
    worker::WorkerEvent,
};

/// Why the polling loop stopped.
#[derive(Debug)]
pub enum PollExit {
    /// A completed or failed report was forwarded.
    Terminal(JobStatus),
    /// The token fired or the event receiver went away.
    Cancelled,
    /// A single request failed; the loop ends without a terminal report.
    TransportFailed(ServiceError),
}

/// Poll `job_id` every `period` and forward each report as `WorkerEvent::Status`.
///
/// The first request goes out one full period after the call, like a re-armed
/// interval timer. Requests never overlap: the next tick is only awaited once
/// the previous response has been handled.
pub async fn poll_job(
    service: &dyn AnalysisService,
    scan_id: Uuid,
    job_id: &str,
    period: Duration,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<WorkerEvent>,
) -> PollExit {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollExit::Cancelled,
            _ = ticker.tick() => {}
        }
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollExit::Cancelled,
            r = service.poll_status(job_id) => r,
        };

        match outcome {
            Ok(report) => {
                let status = report.status.clone();
                tracing::debug!("poll #{attempt} for job {job_id}: {status:?}");
                if tx
                    .send(WorkerEvent::Status { scan_id, report })
                    .await
                    .is_err()
                {
                    return PollExit::Cancelled;
                }
                if status.is_terminal() {
                    return PollExit::Terminal(status);
                }
            }
            Err(e) => return PollExit::TransportFailed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::fake::{ScriptedService, completed, failed, report};
    use std::sync::Arc;

    const PERIOD: Duration = Duration::from_millis(2000);

    fn drain(rx: &mut mpsc::Receiver<WorkerEvent>) -> Vec<JobStatus> {
        let mut seen = vec![];
        while let Ok(ev) = rx.try_recv() {
            if let WorkerEvent::Status { report, .. } = ev {
                seen.push(report.status);
            }
        }
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_completed_at_fixed_period() {
        let svc = ScriptedService::new()
            .poll(Ok(report(JobStatus::Processing)))
            .poll(Ok(completed(42.0, "Deepfake")));
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let start = Instant::now();
        let exit = poll_job(&svc, Uuid::new_v4(), "abc123", PERIOD, &cancel, &tx).await;

        assert!(matches!(exit, PollExit::Terminal(JobStatus::Completed)));
        assert_eq!(svc.polls(), 2);
        assert_eq!(start.elapsed(), PERIOD * 2);
        assert_eq!(
            drain(&mut rx),
            vec![JobStatus::Processing, JobStatus::Completed]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_status_stops_polling() {
        let svc = ScriptedService::new()
            .poll(Ok(report(JobStatus::Queued)))
            .poll(Ok(failed("decoder crashed")))
            .poll(Ok(report(JobStatus::Processing)));
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let exit = poll_job(&svc, Uuid::new_v4(), "job", PERIOD, &cancel, &tx).await;

        assert!(matches!(exit, PollExit::Terminal(JobStatus::Failed)));
        assert_eq!(svc.polls(), 2);
        assert_eq!(drain(&mut rx), vec![JobStatus::Queued, JobStatus::Failed]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_ends_loop_without_report() {
        let svc = ScriptedService::new()
            .poll(Ok(report(JobStatus::Processing)))
            .poll(Err(ServiceError::Rejected {
                status: 404,
                detail: "Job not found".into(),
            }));
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let exit = poll_job(&svc, Uuid::new_v4(), "job", PERIOD, &cancel, &tx).await;

        assert!(matches!(exit, PollExit::TransportFailed(_)));
        assert_eq!(drain(&mut rx), vec![JobStatus::Processing]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_before_next_request() {
        let svc = Arc::new(ScriptedService::new());
        let (tx, _rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();

        let task = {
            let svc = svc.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                poll_job(svc.as_ref(), Uuid::new_v4(), "job", PERIOD, &cancel, &tx).await
            })
        };

        // Cancel just after the third poll.
        tokio::time::sleep(PERIOD * 3 + Duration::from_millis(500)).await;
        cancel.cancel();
        let exit = task.await.unwrap();

        assert!(matches!(exit, PollExit::Cancelled));
        assert_eq!(svc.polls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_receiver_counts_as_cancel() {
        let svc = ScriptedService::new();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let cancel = CancellationToken::new();

        let exit = poll_job(&svc, Uuid::new_v4(), "job", PERIOD, &cancel, &tx).await;
        assert!(matches!(exit, PollExit::Cancelled));
        assert_eq!(svc.polls(), 1);
    }
}
