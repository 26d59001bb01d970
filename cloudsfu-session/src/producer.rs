//! Outbound media producer handle

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use cloudsfu_controller::{ControllerApi, MediaKind, MediaProducerSnapshot};
use tracing::{debug, warn};

use crate::engine::LocalProducer;
use crate::error::SessionError;
use crate::registry::{spawn_detached, Registry};

/// Track published on the send transport
///
/// Closing closes the local producer, deletes the remote one and removes
/// the handle from its session, exactly once. The same routine runs when
/// the engine closes the producer on its own (e.g. its transport closed).
#[derive(Clone)]
pub struct MediaProducer {
    inner: Arc<ProducerInner>,
}

struct ProducerInner {
    id: String,
    local: Arc<dyn LocalProducer>,
    router_id: String,
    transport_id: String,
    snapshot: OnceLock<MediaProducerSnapshot>,
    controller: Arc<dyn ControllerApi>,
    registry: Weak<Registry<MediaProducer>>,
    closed: AtomicBool,
}

impl MediaProducer {
    pub(crate) fn new(
        local: Arc<dyn LocalProducer>,
        router_id: String,
        transport_id: String,
        controller: Arc<dyn ControllerApi>,
        registry: Weak<Registry<MediaProducer>>,
    ) -> Self {
        Self {
            inner: Arc::new(ProducerInner {
                id: local.id().to_string(),
                local,
                router_id,
                transport_id,
                snapshot: OnceLock::new(),
                controller,
                registry,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Run the close routine when the engine closes the producer.
    pub(crate) fn watch(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.local.on_close(Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.closed.load(Ordering::Acquire) {
                return;
            }
            let producer = Self { inner };
            spawn_detached("producer close", async move { producer.close().await });
        }));
    }

    pub(crate) fn attach_snapshot(&self, snapshot: MediaProducerSnapshot) {
        let _ = self.inner.snapshot.set(snapshot);
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.inner.local.kind()
    }

    #[must_use]
    pub fn router_id(&self) -> &str {
        &self.inner.router_id
    }

    #[must_use]
    pub fn transport_id(&self) -> &str {
        &self.inner.transport_id
    }

    /// Controller view of the producer, when it could be fetched.
    #[must_use]
    pub fn snapshot(&self) -> Option<&MediaProducerSnapshot> {
        self.inner.snapshot.get()
    }

    #[must_use]
    pub fn local(&self) -> &Arc<dyn LocalProducer> {
        &self.inner.local
    }

    #[must_use]
    pub fn paused(&self) -> bool {
        self.inner.local.paused()
    }

    #[must_use]
    pub fn closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Pause locally, then on the SFU.
    pub async fn pause(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.inner.local.pause();
        self.inner
            .controller
            .pause_media_producer(&self.inner.router_id, &self.inner.id)
            .await?;
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.inner.local.resume();
        self.inner
            .controller
            .resume_media_producer(&self.inner.router_id, &self.inner.id)
            .await?;
        Ok(())
    }

    /// Close the producer. A failed remote delete is logged, never raised.
    pub async fn close(&self) {
        if let Err(e) = self.close_and_report().await {
            warn!(
                router_id = %self.inner.router_id,
                producer_id = %self.inner.id,
                error = %e,
                "Failed to delete media producer"
            );
        }
    }

    pub(crate) async fn close_and_report(&self) -> Result<(), SessionError> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.inner.local.close();
        let result = self
            .inner
            .controller
            .delete_media_producer(&self.inner.router_id, &self.inner.id)
            .await;
        if let Some(registry) = self.inner.registry.upgrade() {
            registry.remove(&self.inner.id);
        }
        debug!(producer_id = %self.inner.id, "Media producer closed");
        result.map_err(SessionError::from)
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed() {
            return Err(SessionError::precondition(format!(
                "media producer {} is closed",
                self.inner.id
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MediaProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaProducer")
            .field("id", &self.inner.id)
            .field("router_id", &self.inner.router_id)
            .field("transport_id", &self.inner.transport_id)
            .field("closed", &self.closed())
            .finish()
    }
}
