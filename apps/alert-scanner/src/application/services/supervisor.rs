//! Supervision of the scan task.
//!
//! The binary waits on the shutdown signal and the scan task together. A
//! scan task that ends on its own is a crash: the status goes to
//! [`ScanPhase::Failed`], a crash notice is sent, and the process exits
//! non-zero.

use std::future::Future;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::status::{ScanPhase, ScanStatus};
use crate::application::ports::{AlertDispatchPort, DispatchError};

/// Crash notice prefix.
pub const CRASH_NOTICE: &str = "💥 Alert scanner crashed";

/// Characters of crash detail carried in the notice.
const CRASH_DETAIL_CHARS: usize = 100;

/// How the scan task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanExit {
    /// Stopped after a shutdown request.
    Shutdown,
    /// Ended without being asked to, or panicked.
    Crashed(String),
}

/// Wait for `shutdown` or for the scan task to end by itself.
///
/// Either way `cancel` fires. After a shutdown request the task gets `grace`
/// to send its shutdown notice; running past that is logged and treated as
/// a clean stop.
pub async fn supervise<F>(
    mut scan: JoinHandle<()>,
    shutdown: F,
    cancel: &CancellationToken,
    grace: Duration,
) -> ScanExit
where
    F: Future<Output = ()>,
{
    tokio::select! {
        () = shutdown => {}
        joined = &mut scan => {
            cancel.cancel();
            return ScanExit::Crashed(describe_exit(joined));
        }
    }

    cancel.cancel();
    match timeout(grace, scan).await {
        Ok(Ok(())) => ScanExit::Shutdown,
        Ok(Err(e)) => ScanExit::Crashed(describe_exit(Err(e))),
        Err(_) => {
            tracing::warn!(grace_secs = grace.as_secs(), "Scan loop did not stop in time");
            ScanExit::Shutdown
        }
    }
}

/// Mark the scanner failed and send the crash notice.
pub async fn report_crash(
    dispatcher: &dyn AlertDispatchPort,
    status: &ScanStatus,
    detail: &str,
    dispatch_timeout: Duration,
) {
    tracing::error!(detail, "Scan loop crashed");
    status.record_crash(detail.to_string());

    let text = crash_notice(detail);
    let sent = timeout(dispatch_timeout, dispatcher.dispatch(&text))
        .await
        .unwrap_or(Err(DispatchError::Timeout));
    if let Err(e) = sent {
        tracing::warn!(error = %e, "Crash notice not delivered");
    }
}

/// Crash notice text, detail cut to a fixed number of characters.
#[must_use]
pub fn crash_notice(detail: &str) -> String {
    let detail: String = detail.chars().take(CRASH_DETAIL_CHARS).collect();
    format!("{CRASH_NOTICE}: {detail}")
}

fn describe_exit(joined: Result<(), JoinError>) -> String {
    match joined {
        Ok(()) => "scan loop exited unexpectedly".to_string(),
        Err(e) if e.is_panic() => {
            let payload = e.into_panic();
            payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "scan loop panicked".to_string())
        }
        Err(e) => e.to_string(),
    }
}
