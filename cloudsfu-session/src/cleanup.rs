//! Session teardown
//!
//! Releases everything a session owns in dependency order: producers,
//! consumers, send transport, recv transport, router. Every step is
//! isolated; a failed step is logged and recorded, and the next one runs.
//! Deleting the router cascades on the SFU, so the earlier steps only make
//! teardown prompt.

use std::fmt;
use std::sync::atomic::Ordering;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{CleanupStepFailed, SessionError};
use crate::session::{MediaSession, SessionEvent, SessionInner};
use crate::types::TransportDirection;

/// One step of a cleanup run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupStep {
    CloseProducer { producer_id: String },
    CloseConsumer { consumer_id: String },
    DeleteTransport {
        direction: TransportDirection,
        transport_id: String,
    },
    DeleteRouter { router_id: String },
}

impl fmt::Display for CleanupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CloseProducer { producer_id } => write!(f, "close producer {producer_id}"),
            Self::CloseConsumer { consumer_id } => write!(f, "close consumer {consumer_id}"),
            Self::DeleteTransport {
                direction,
                transport_id,
            } => write!(f, "delete {direction} transport {transport_id}"),
            Self::DeleteRouter { router_id } => write!(f, "delete router {router_id}"),
        }
    }
}

/// Outcome of [`MediaSession::cleanup`]
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    /// Steps that failed, in execution order.
    pub failures: Vec<CleanupStepFailed>,
    /// Another cleanup was already running; nothing was done.
    pub skipped: bool,
}

impl CleanupReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, step: CleanupStep, err: &SessionError) {
        warn!(step = %step, error = %err, "Cleanup step failed");
        self.failures.push(CleanupStepFailed {
            step,
            message: err.to_string(),
        });
    }
}

/// Resets the session even if the cleanup future is dropped half way.
struct CleanupGuard<'a> {
    inner: &'a SessionInner,
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        self.inner.finish_cleanup();
        self.inner.cleanup_running.store(false, Ordering::Release);
        self.inner.emit(SessionEvent::Closed);
    }
}

impl MediaSession {
    /// Release every local and remote resource of the session.
    ///
    /// Never fails and is safe to repeat: a second call finds nothing left
    /// to release and issues no remote calls. A call made while another
    /// cleanup runs returns a skipped report. Afterwards the session is
    /// `Empty` with a fresh device and can bind a new router.
    pub async fn cleanup(&self) -> CleanupReport {
        if self.inner.cleanup_running.swap(true, Ordering::AcqRel) {
            debug!("Cleanup already running");
            return CleanupReport {
                skipped: true,
                ..CleanupReport::default()
            };
        }
        let _guard = CleanupGuard { inner: &self.inner };
        let targets = self.inner.begin_cleanup();
        let mut report = CleanupReport::default();

        for producer in self.inner.producers.snapshot() {
            if let Err(e) = producer.close_and_report().await {
                report.record(
                    CleanupStep::CloseProducer {
                        producer_id: producer.id().to_string(),
                    },
                    &e,
                );
            }
        }

        for consumer in self.inner.consumers.snapshot() {
            if let Err(e) = consumer.close_and_report().await {
                report.record(
                    CleanupStep::CloseConsumer {
                        consumer_id: consumer.id().to_string(),
                    },
                    &e,
                );
            }
        }

        for pending in [targets.send, targets.recv].into_iter().flatten() {
            // A transport whose creation failed has nothing to release
            let Ok(transport) = pending.await else {
                continue;
            };
            if let Err(e) = transport.close_and_report().await {
                report.record(
                    CleanupStep::DeleteTransport {
                        direction: transport.direction(),
                        transport_id: transport.id().to_string(),
                    },
                    &e,
                );
            }
        }

        if let Some(router) = targets.router {
            if let Err(e) = self.inner.controller.delete_router(&router.id).await {
                report.record(
                    CleanupStep::DeleteRouter {
                        router_id: router.id.clone(),
                    },
                    &SessionError::from(e),
                );
            }
            info!(
                router_id = %router.id,
                failed_steps = report.failures.len(),
                "Session cleaned up"
            );
        }

        report
    }

    /// Run [`cleanup`](Self::cleanup) in the background, for teardown paths
    /// that cannot await. `None` outside a tokio runtime.
    pub fn spawn_cleanup(&self) -> Option<JoinHandle<CleanupReport>> {
        let session = self.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => Some(handle.spawn(async move { session.cleanup().await })),
            Err(_) => {
                warn!("No tokio runtime, session cleanup not scheduled");
                None
            }
        }
    }
}
