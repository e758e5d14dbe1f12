// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded job runner.
//
// Runs one blocking driver call on its own worker thread and races it against
// a wall-clock deadline. Whichever finishes first decides the `JobResult`; the
// loser is discarded. The caller's task never blocks on the driver.
//
// Cancellation on timeout is advisory: the job's `CancellationToken` is
// cancelled and the worker is detached, but the runner does not wait for the
// worker to notice. The cleanup hook typically closes the device channel while
// the worker may still be inside the driver call. That race is accepted; a
// driver-level abort would be needed to remove it.

use std::any::Any;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use etikett_core::types::{JobId, JobResult, OutcomeCode};

/// Run `op` on a dedicated worker with a hard `deadline`.
///
/// `cancel` is cancelled if the deadline elapses; operations that captured a
/// clone of it may use it to stop early. `cleanup` is called exactly once,
/// after the result is decided and before this function returns, whichever
/// path produced the result. If the returned future is dropped before it
/// completes, the job is abandoned: `cancel` is cancelled and `cleanup` runs
/// with an `UnexpectedFailure` from the drop.
pub async fn run_bounded<C, F, H>(
    job_id: JobId,
    op: F,
    deadline: Duration,
    cancel: CancellationToken,
    cleanup: H,
) -> JobResult<C>
where
    C: OutcomeCode + Send + 'static,
    F: FnOnce() -> C + Send + 'static,
    H: FnOnce(&JobResult<C>),
{
    let guard = CleanupGuard::new(job_id, cancel, cleanup);
    let result = race(job_id, op, deadline, &guard.cancel).await;
    match &result {
        JobResult::Success => info!(job_id = %job_id, "job completed"),
        JobResult::VendorError(code) => warn!(job_id = %job_id, code = %code, "job reported error"),
        JobResult::Timeout => error!(
            job_id = %job_id,
            deadline_ms = deadline.as_millis() as u64,
            "job timed out"
        ),
        JobResult::UnexpectedFailure(msg) => error!(job_id = %job_id, error = %msg, "job failed"),
    }
    guard.finish(&result);
    result
}

/// Message handed to the cleanup hook when the caller drops a running job.
pub const ABANDONED: &str = "job abandoned before it finished";

/// Owns the cleanup hook until the job resolves.
struct CleanupGuard<C, H>
where
    H: FnOnce(&JobResult<C>),
{
    job_id: JobId,
    cancel: CancellationToken,
    cleanup: Option<H>,
    _outcome: PhantomData<fn(&C)>,
}

impl<C, H> CleanupGuard<C, H>
where
    H: FnOnce(&JobResult<C>),
{
    fn new(job_id: JobId, cancel: CancellationToken, cleanup: H) -> Self {
        Self {
            job_id,
            cancel,
            cleanup: Some(cleanup),
            _outcome: PhantomData,
        }
    }

    fn finish(mut self, result: &JobResult<C>) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup(result);
        }
    }
}

impl<C, H> Drop for CleanupGuard<C, H>
where
    H: FnOnce(&JobResult<C>),
{
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            warn!(job_id = %self.job_id, "job abandoned by caller");
            self.cancel.cancel();
            cleanup(&JobResult::UnexpectedFailure(ABANDONED.into()));
        }
    }
}

async fn race<C, F>(
    job_id: JobId,
    op: F,
    deadline: Duration,
    cancel: &CancellationToken,
) -> JobResult<C>
where
    C: OutcomeCode + Send + 'static,
    F: FnOnce() -> C + Send + 'static,
{
    if deadline.is_zero() {
        return JobResult::UnexpectedFailure("deadline must be greater than zero".into());
    }

    let (tx, rx) = oneshot::channel();
    let spawned = thread::Builder::new()
        .name(worker_name(job_id))
        .spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(op));
            // The receiver is gone if the deadline already fired.
            let _ = tx.send(outcome);
        });

    // Dropping the handle detaches the worker; it is never joined.
    let _worker = match spawned {
        Ok(handle) => handle,
        Err(e) => return JobResult::UnexpectedFailure(format!("failed to spawn worker: {e}")),
    };
    debug!(job_id = %job_id, "worker started");

    match tokio::time::timeout(deadline, rx).await {
        Ok(Ok(Ok(code))) if code.is_success() => JobResult::Success,
        Ok(Ok(Ok(code))) => JobResult::VendorError(code),
        Ok(Ok(Err(payload))) => JobResult::UnexpectedFailure(panic_message(payload.as_ref())),
        Ok(Err(_)) => JobResult::UnexpectedFailure("worker exited without a result".into()),
        Err(_) => {
            cancel.cancel();
            JobResult::Timeout
        }
    }
}

fn worker_name(job_id: JobId) -> String {
    let id = job_id.to_string();
    format!("etikett-job-{}", &id[..8])
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "operation panicked".into()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;

    use etikett_core::types::PrintOutcome;

    use super::*;

    fn counting_cleanup(counter: &Arc<AtomicUsize>) -> impl FnOnce(&JobResult<PrintOutcome>) {
        let counter = Arc::clone(counter);
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn no_error_before_deadline_is_success() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let result = run_bounded(
            JobId::new(),
            || {
                thread::sleep(Duration::from_millis(50));
                PrintOutcome::NoError
            },
            Duration::from_millis(300),
            CancellationToken::new(),
            counting_cleanup(&cleanups),
        )
        .await;

        assert_eq!(result, JobResult::Success);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn other_code_is_vendor_error() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let result = run_bounded(
            JobId::new(),
            || PrintOutcome::PaperEmpty,
            Duration::from_secs(5),
            CancellationToken::new(),
            counting_cleanup(&cleanups),
        )
        .await;

        assert_eq!(result, JobResult::VendorError(PrintOutcome::PaperEmpty));
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blocked_operation_times_out_once() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let finished_late = Arc::new(AtomicBool::new(false));
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let cancel = CancellationToken::new();

        let flag = Arc::clone(&finished_late);
        let result = run_bounded(
            JobId::new(),
            move || {
                let _ = release_rx.recv();
                flag.store(true, Ordering::SeqCst);
                PrintOutcome::NoError
            },
            Duration::from_millis(100),
            cancel.clone(),
            counting_cleanup(&cleanups),
        )
        .await;

        assert_eq!(result, JobResult::Timeout);
        assert!(cancel.is_cancelled());
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);

        // Let the abandoned worker finish; its result must go nowhere.
        release_tx.send(()).unwrap();
        for _ in 0..50 {
            if finished_late.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(finished_late.load(Ordering::SeqCst));
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cooperative_operation_sees_cancellation() {
        let cancel = CancellationToken::new();
        let observed = Arc::new(AtomicBool::new(false));

        let token = cancel.clone();
        let flag = Arc::clone(&observed);
        let result = run_bounded(
            JobId::new(),
            move || {
                while !token.is_cancelled() {
                    thread::sleep(Duration::from_millis(5));
                }
                flag.store(true, Ordering::SeqCst);
                PrintOutcome::Canceled
            },
            Duration::from_millis(50),
            cancel,
            |_| {},
        )
        .await;

        assert_eq!(result, JobResult::Timeout);
        for _ in 0..50 {
            if observed.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(observed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn panic_is_unexpected_failure_with_cleanup() {
        let cleanups = Arc::new(AtomicUsize::new(0));
        let result = run_bounded(
            JobId::new(),
            || -> PrintOutcome { panic!("driver exploded") },
            Duration::from_secs(5),
            CancellationToken::new(),
            counting_cleanup(&cleanups),
        )
        .await;

        assert_eq!(
            result,
            JobResult::UnexpectedFailure("driver exploded".into())
        );
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_deadline_is_rejected_without_running() {
        let ran = Arc::new(AtomicBool::new(false));
        let cleanups = Arc::new(AtomicUsize::new(0));

        let flag = Arc::clone(&ran);
        let result = run_bounded(
            JobId::new(),
            move || {
                flag.store(true, Ordering::SeqCst);
                PrintOutcome::NoError
            },
            Duration::ZERO,
            CancellationToken::new(),
            counting_cleanup(&cleanups),
        )
        .await;

        assert!(matches!(result, JobResult::UnexpectedFailure(_)));
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn caller_task_keeps_running_while_worker_blocks() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        let result = run_bounded(
            JobId::new(),
            || {
                thread::sleep(Duration::from_millis(150));
                PrintOutcome::NoError
            },
            Duration::from_secs(5),
            CancellationToken::new(),
            |_| {},
        )
        .await;
        ticker.abort();

        assert!(result.is_success());
        assert!(ticks.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn dropped_job_still_cancels_and_cleans_up_once() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();

        let record = Arc::clone(&seen);
        let job = run_bounded(
            JobId::new(),
            || {
                thread::sleep(Duration::from_millis(400));
                PrintOutcome::NoError
            },
            Duration::from_millis(300),
            cancel.clone(),
            move |result: &JobResult<PrintOutcome>| record.lock().unwrap().push(result.clone()),
        );
        let outer = tokio::time::timeout(Duration::from_millis(50), job).await;
        assert!(outer.is_err());

        assert!(cancel.is_cancelled());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![JobResult::UnexpectedFailure(ABANDONED.into())]
        );

        // Neither the runner's deadline nor the late worker may add another.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn worker_names_are_short() {
        assert!(worker_name(JobId::new()).len() <= "etikett-job-".len() + 8);
    }
}
