//! Inbound media consumer handle

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use cloudsfu_controller::{
    ControllerApi, MediaConsumerSnapshot, MediaKind, SetMediaConsumerPreferredLayersParams,
    SetMediaConsumerPriorityParams,
};
use tracing::{debug, warn};

use crate::engine::LocalConsumer;
use crate::error::SessionError;
use crate::registry::{spawn_detached, Registry};

/// Remote producer received on the recv transport
#[derive(Clone)]
pub struct MediaConsumer {
    inner: Arc<ConsumerInner>,
}

struct ConsumerInner {
    local: Arc<dyn LocalConsumer>,
    router_id: String,
    snapshot: MediaConsumerSnapshot,
    controller: Arc<dyn ControllerApi>,
    registry: Weak<Registry<MediaConsumer>>,
    closed: AtomicBool,
}

impl MediaConsumer {
    pub(crate) fn new(
        local: Arc<dyn LocalConsumer>,
        router_id: String,
        snapshot: MediaConsumerSnapshot,
        controller: Arc<dyn ControllerApi>,
        registry: Weak<Registry<MediaConsumer>>,
    ) -> Self {
        Self {
            inner: Arc::new(ConsumerInner {
                local,
                router_id,
                snapshot,
                controller,
                registry,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn watch(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.local.on_close(Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.closed.load(Ordering::Acquire) {
                return;
            }
            let consumer = Self { inner };
            spawn_detached("consumer close", async move { consumer.close().await });
        }));
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.snapshot.id
    }

    /// Identifier of the remote producer this consumer receives.
    #[must_use]
    pub fn producer_id(&self) -> &str {
        &self.inner.snapshot.media_producer_id
    }

    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.inner.snapshot.kind
    }

    #[must_use]
    pub fn router_id(&self) -> &str {
        &self.inner.router_id
    }

    #[must_use]
    pub fn transport_id(&self) -> &str {
        &self.inner.snapshot.transport_id
    }

    #[must_use]
    pub fn snapshot(&self) -> &MediaConsumerSnapshot {
        &self.inner.snapshot
    }

    #[must_use]
    pub fn local(&self) -> &Arc<dyn LocalConsumer> {
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

    pub async fn pause(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.inner.local.pause();
        self.inner
            .controller
            .pause_media_consumer(&self.inner.router_id, self.id())
            .await?;
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.inner.local.resume();
        self.inner
            .controller
            .resume_media_consumer(&self.inner.router_id, self.id())
            .await?;
        Ok(())
    }

    pub async fn set_preferred_layers(
        &self,
        spatial_layer: u8,
        temporal_layer: u8,
    ) -> Result<(), SessionError> {
        self.ensure_open()?;
        let params = SetMediaConsumerPreferredLayersParams {
            spatial_layer,
            temporal_layer,
        };
        self.inner
            .controller
            .set_media_consumer_preferred_layers(&self.inner.router_id, self.id(), &params)
            .await?;
        Ok(())
    }

    pub async fn set_priority(&self, priority: u8) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.inner
            .controller
            .set_media_consumer_priority(
                &self.inner.router_id,
                self.id(),
                &SetMediaConsumerPriorityParams { priority },
            )
            .await?;
        Ok(())
    }

    pub async fn unset_priority(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.inner
            .controller
            .unset_media_consumer_priority(&self.inner.router_id, self.id())
            .await?;
        Ok(())
    }

    pub async fn request_key_frame(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.inner
            .controller
            .request_media_consumer_key_frame(&self.inner.router_id, self.id())
            .await?;
        Ok(())
    }

    /// Close the consumer. A failed remote delete is logged, never raised.
    pub async fn close(&self) {
        if let Err(e) = self.close_and_report().await {
            warn!(
                router_id = %self.inner.router_id,
                consumer_id = %self.id(),
                error = %e,
                "Failed to delete media consumer"
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
            .delete_media_consumer(&self.inner.router_id, self.id())
            .await;
        if let Some(registry) = self.inner.registry.upgrade() {
            registry.remove(self.id());
        }
        debug!(consumer_id = %self.id(), "Media consumer closed");
        result.map_err(SessionError::from)
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed() {
            return Err(SessionError::precondition(format!(
                "media consumer {} is closed",
                self.id()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MediaConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaConsumer")
            .field("id", &self.id())
            .field("producer_id", &self.producer_id())
            .field("router_id", &self.inner.router_id)
            .field("closed", &self.closed())
            .finish()
    }
}
