//! Local transport handle mirroring a remote WebRTC transport

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use cloudsfu_controller::{ControllerApi, WebRtcTransportSnapshot};
use tracing::warn;

use crate::engine::LocalTransport;
use crate::error::SessionError;
use crate::types::{ConnectionState, TransportDirection};

/// Send or receive transport owned by a session
///
/// Cheap to clone. Closing deletes the remote transport and then closes the
/// local one, exactly once across all clones.
#[derive(Clone)]
pub struct TransportHandle {
    inner: Arc<TransportInner>,
}

struct TransportInner {
    local: Arc<dyn LocalTransport>,
    snapshot: WebRtcTransportSnapshot,
    router_id: String,
    direction: TransportDirection,
    controller: Arc<dyn ControllerApi>,
    closed: AtomicBool,
}

pub(crate) struct WeakTransportHandle(Weak<TransportInner>);

impl WeakTransportHandle {
    pub(crate) fn upgrade(&self) -> Option<TransportHandle> {
        self.0.upgrade().map(|inner| TransportHandle { inner })
    }
}

impl TransportHandle {
    pub(crate) fn new(
        local: Arc<dyn LocalTransport>,
        snapshot: WebRtcTransportSnapshot,
        router_id: String,
        direction: TransportDirection,
        controller: Arc<dyn ControllerApi>,
    ) -> Self {
        Self {
            inner: Arc::new(TransportInner {
                local,
                snapshot,
                router_id,
                direction,
                controller,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakTransportHandle {
        WeakTransportHandle(Arc::downgrade(&self.inner))
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.snapshot.id
    }

    #[must_use]
    pub fn router_id(&self) -> &str {
        &self.inner.router_id
    }

    #[must_use]
    pub fn direction(&self) -> TransportDirection {
        self.inner.direction
    }

    /// Controller snapshot the local transport was built from.
    #[must_use]
    pub fn snapshot(&self) -> &WebRtcTransportSnapshot {
        &self.inner.snapshot
    }

    #[must_use]
    pub fn local(&self) -> &Arc<dyn LocalTransport> {
        &self.inner.local
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.local.connection_state()
    }

    /// True once a close has started, whoever started it.
    #[must_use]
    pub fn closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Delete the remote transport, then close the local one. Remote
    /// failures are logged; the local side is closed regardless.
    pub async fn close(&self) {
        if let Err(e) = self.close_and_report().await {
            warn!(
                router_id = %self.inner.router_id,
                transport_id = %self.id(),
                error = %e,
                "Failed to delete transport"
            );
        }
    }

    pub(crate) async fn close_and_report(&self) -> Result<(), SessionError> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let result = self
            .inner
            .controller
            .delete_webrtc_transport(&self.inner.router_id, self.id())
            .await;
        self.inner.local.close();
        result.map_err(SessionError::from)
    }
}

impl std::fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle")
            .field("id", &self.id())
            .field("router_id", &self.inner.router_id)
            .field("direction", &self.inner.direction)
            .field("closed", &self.closed())
            .finish()
    }
}
