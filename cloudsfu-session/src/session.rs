//! Media session - router, transports, producers and consumers of one
//! local participant
//!
//! This module provides:
//! - Router creation / connection with compare-and-set reservation
//! - Idempotent send and recv transport creation
//! - Producer and consumer creation with close-triggers-remote-delete
//! - Lifecycle events over a broadcast channel

use std::fmt;
use std::mem;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use cloudsfu_controller::{ControllerApi, MediaConsumerConfig, RouterConfig, RouterSnapshot, WebRtcTransportConfig};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::binding::{bind_transport, ControllerBinding};
use crate::config::SessionOptions;
use crate::consumer::MediaConsumer;
use crate::engine::{ConsumeOptions, Device, DeviceFactory, ProduceOptions, TransportOptions};
use crate::error::SessionError;
use crate::producer::MediaProducer;
use crate::registry::{spawn_detached, Registry};
use crate::transport::TransportHandle;
use crate::types::{SessionState, TransportDirection};

/// Lifecycle notifications of a [`MediaSession`]
#[derive(Clone)]
pub enum SessionEvent {
    /// A router was bound and the device loaded with its capabilities.
    Connected {
        router: RouterSnapshot,
        device: Arc<dyn Device>,
    },
    TransportClosed {
        direction: TransportDirection,
        transport_id: String,
    },
    /// Cleanup finished; the session is empty and reusable.
    Closed,
}

impl fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected { router, .. } => f
                .debug_struct("Connected")
                .field("router_id", &router.id)
                .finish_non_exhaustive(),
            Self::TransportClosed {
                direction,
                transport_id,
            } => f
                .debug_struct("TransportClosed")
                .field("direction", direction)
                .field("transport_id", transport_id)
                .finish(),
            Self::Closed => f.write_str("Closed"),
        }
    }
}

type TransportFuture = BoxFuture<'static, Result<TransportHandle, SessionError>>;

pub(crate) enum TransportSlot {
    Idle,
    /// Creation in flight; every caller awaits the same future.
    Creating {
        token: u64,
        future: Shared<TransportFuture>,
    },
    Ready(TransportHandle),
    /// Session is closing; creation refused until cleanup finishes.
    Closed,
}

impl TransportSlot {
    /// The transport this slot holds or is creating, as a future.
    fn existing(&self) -> Option<TransportFuture> {
        match self {
            Self::Ready(handle) if !handle.closed() => {
                let handle = handle.clone();
                Some(async move { Ok(handle) }.boxed())
            }
            Self::Creating { future, .. } => Some(future.clone().boxed()),
            _ => None,
        }
    }
}

enum Phase {
    Empty,
    RouterPending,
    RouterReady(RouterSnapshot),
    Closing,
}

struct SessionCore {
    phase: Phase,
    device: Arc<dyn Device>,
    /// Bumped by every cleanup; suspended operations compare it before
    /// committing their result.
    epoch: u64,
    next_token: u64,
    send: TransportSlot,
    recv: TransportSlot,
}

impl SessionCore {
    fn slot_mut(&mut self, direction: TransportDirection) -> &mut TransportSlot {
        match direction {
            TransportDirection::Send => &mut self.send,
            TransportDirection::Recv => &mut self.recv,
        }
    }

    fn ready_router(&self) -> Result<&RouterSnapshot, SessionError> {
        match &self.phase {
            Phase::RouterReady(router) => Ok(router),
            _ => Err(SessionError::precondition(
                "router not connected or device not loaded",
            )),
        }
    }
}

enum Reservation {
    Bound(RouterSnapshot),
    Reserved { device: Arc<dyn Device>, epoch: u64 },
}

/// What a cleanup run has to release, taken from the session in one step.
pub(crate) struct CleanupTargets {
    pub(crate) router: Option<RouterSnapshot>,
    pub(crate) send: Option<TransportFuture>,
    pub(crate) recv: Option<TransportFuture>,
}

pub(crate) struct SessionInner {
    pub(crate) controller: Arc<dyn ControllerApi>,
    device_factory: Arc<dyn DeviceFactory>,
    pub(crate) options: SessionOptions,
    core: Mutex<SessionCore>,
    pub(crate) producers: Arc<Registry<MediaProducer>>,
    pub(crate) consumers: Arc<Registry<MediaConsumer>>,
    events: broadcast::Sender<SessionEvent>,
    pub(crate) cleanup_running: AtomicBool,
}

/// Client-side session over one remote router
///
/// Cheap to clone; clones share the same state. The session lock is never
/// held across an `.await` or while the media engine runs a close.
#[derive(Clone)]
pub struct MediaSession {
    pub(crate) inner: Arc<SessionInner>,
}

impl MediaSession {
    pub fn new(
        controller: Arc<dyn ControllerApi>,
        device_factory: Arc<dyn DeviceFactory>,
        options: SessionOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(options.event_capacity.max(1));
        let device = device_factory.create();
        Self {
            inner: Arc::new(SessionInner {
                controller,
                device_factory,
                options,
                core: Mutex::new(SessionCore {
                    phase: Phase::Empty,
                    device,
                    epoch: 0,
                    next_token: 0,
                    send: TransportSlot::Idle,
                    recv: TransportSlot::Idle,
                }),
                producers: Arc::new(Registry::new()),
                consumers: Arc::new(Registry::new()),
                events,
                cleanup_running: AtomicBool::new(false),
            }),
        }
    }

    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        match self.inner.core.lock().phase {
            Phase::Empty => SessionState::Empty,
            Phase::RouterPending => SessionState::RouterPending,
            Phase::RouterReady(_) => SessionState::RouterReady,
            Phase::Closing => SessionState::Closing,
        }
    }

    /// The bound router, once ready.
    #[must_use]
    pub fn router(&self) -> Option<RouterSnapshot> {
        self.inner.core.lock().ready_router().ok().cloned()
    }

    /// Current device. Replaced by a fresh, unloaded one on cleanup.
    #[must_use]
    pub fn device(&self) -> Arc<dyn Device> {
        Arc::clone(&self.inner.core.lock().device)
    }

    #[must_use]
    pub fn send_transport(&self) -> Option<TransportHandle> {
        self.ready_transport(TransportDirection::Send)
    }

    #[must_use]
    pub fn recv_transport(&self) -> Option<TransportHandle> {
        self.ready_transport(TransportDirection::Recv)
    }

    fn ready_transport(&self, direction: TransportDirection) -> Option<TransportHandle> {
        match self.inner.core.lock().slot_mut(direction) {
            TransportSlot::Ready(handle) if !handle.closed() => Some(handle.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn producer(&self, producer_id: &str) -> Option<MediaProducer> {
        self.inner.producers.get(producer_id)
    }

    #[must_use]
    pub fn producers(&self) -> Vec<MediaProducer> {
        self.inner.producers.snapshot()
    }

    #[must_use]
    pub fn consumer(&self, consumer_id: &str) -> Option<MediaConsumer> {
        self.inner.consumers.get(consumer_id)
    }

    /// Consumer receiving the given remote producer, if any.
    #[must_use]
    pub fn consumer_for_producer(&self, media_producer_id: &str) -> Option<MediaConsumer> {
        self.inner
            .consumers
            .find(|consumer| consumer.producer_id() == media_producer_id)
    }

    #[must_use]
    pub fn consumers(&self) -> Vec<MediaConsumer> {
        self.inner.consumers.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Create a remote router and load the device with its capabilities.
    ///
    /// Only valid on an empty session: fails with `AlreadyConnected` when a
    /// router is bound or being bound, and with `DeviceAlreadyLoaded` when
    /// the device was loaded outside the session. If loading fails the
    /// remote router is deleted again.
    pub async fn create_router(
        &self,
        config: Option<RouterConfig>,
    ) -> Result<RouterSnapshot, SessionError> {
        let (device, epoch) = match self.inner.reserve_router(None)? {
            Reservation::Reserved { device, epoch } => (device, epoch),
            Reservation::Bound(_) => return Err(SessionError::AlreadyConnected),
        };

        let config = config.unwrap_or_else(|| self.inner.options.router_config.clone());
        let router = match self.inner.controller.create_router(&config).await {
            Ok(router) => router,
            Err(e) => {
                self.inner.release_router(epoch);
                return Err(e.into());
            }
        };

        self.load_router(router, device, epoch, true).await
    }

    /// Bind an existing remote router by id.
    ///
    /// Returns the bound router when it already has this id; fails with
    /// `AlreadyConnected` when a different one is bound.
    pub async fn connect_to_router(&self, router_id: &str) -> Result<RouterSnapshot, SessionError> {
        let (device, epoch) = match self.inner.reserve_router(Some(router_id))? {
            Reservation::Reserved { device, epoch } => (device, epoch),
            Reservation::Bound(router) => return Ok(router),
        };

        let router = match self.inner.controller.get_router(router_id).await {
            Ok(router) => router,
            Err(e) => {
                self.inner.release_router(epoch);
                return Err(e.into());
            }
        };

        self.load_router(router, device, epoch, false).await
    }

    async fn load_router(
        &self,
        router: RouterSnapshot,
        device: Arc<dyn Device>,
        epoch: u64,
        owned: bool,
    ) -> Result<RouterSnapshot, SessionError> {
        let loaded = if device.loaded() {
            Err(SessionError::Inconsistent(format!(
                "device got loaded while router {} was being fetched",
                router.id
            )))
        } else {
            device
                .load(router.rtp_capabilities.clone())
                .await
                .map_err(SessionError::from)
        };

        if let Err(e) = loaded {
            self.inner.release_router(epoch);
            if owned {
                self.inner.delete_orphan_router(&router.id).await;
            }
            return Err(e);
        }

        if !self.inner.commit_router(epoch, &router) {
            if owned {
                self.inner.delete_orphan_router(&router.id).await;
            }
            return Err(SessionError::Inconsistent(format!(
                "session was cleaned up while router {} was loading",
                router.id
            )));
        }

        info!(
            router_id = %router.id,
            region = %router.region,
            created = owned,
            "Router connected"
        );
        self.inner.emit(SessionEvent::Connected {
            router: router.clone(),
            device,
        });
        Ok(router)
    }

    /// Create the send transport, or return the one that exists or is
    /// being created. Only one remote transport is ever requested per slot.
    pub async fn create_send_transport(
        &self,
        config: Option<WebRtcTransportConfig>,
    ) -> Result<TransportHandle, SessionError> {
        self.transport(TransportDirection::Send, config).await
    }

    pub async fn create_recv_transport(
        &self,
        config: Option<WebRtcTransportConfig>,
    ) -> Result<TransportHandle, SessionError> {
        self.transport(TransportDirection::Recv, config).await
    }

    async fn transport(
        &self,
        direction: TransportDirection,
        config: Option<WebRtcTransportConfig>,
    ) -> Result<TransportHandle, SessionError> {
        let future = {
            let mut core = self.inner.core.lock();
            let router_id = core.ready_router()?.id.clone();
            let device = Arc::clone(&core.device);
            let epoch = core.epoch;
            core.next_token += 1;
            let token = core.next_token;

            match core.slot_mut(direction) {
                TransportSlot::Ready(handle) if !handle.closed() => return Ok(handle.clone()),
                TransportSlot::Creating { future, .. } => future.clone(),
                TransportSlot::Closed => {
                    return Err(SessionError::precondition("session is closing"));
                }
                slot => {
                    let inner = Arc::clone(&self.inner);
                    let future = async move {
                        let result = inner
                            .build_transport(direction, &router_id, device, config)
                            .await;
                        inner.settle_transport(direction, epoch, token, result).await
                    }
                    .boxed()
                    .shared();
                    *slot = TransportSlot::Creating {
                        token,
                        future: future.clone(),
                    };
                    future
                }
            }
        };
        future.await
    }

    /// Publish a track on the send transport.
    ///
    /// Requires a ready router and a send transport (an in-flight one is
    /// awaited). The produce negotiation creates the remote producer; the
    /// handle is registered and closes remotely when closed.
    pub async fn create_media_producer(
        &self,
        options: ProduceOptions,
    ) -> Result<MediaProducer, SessionError> {
        let (router_id, pending, device, epoch) = {
            let core = self.inner.core.lock();
            let router_id = core.ready_router()?.id.clone();
            let pending = core.send.existing().ok_or_else(|| {
                SessionError::precondition(
                    "send transport not created, call create_send_transport first",
                )
            })?;
            (router_id, pending, Arc::clone(&core.device), core.epoch)
        };

        let kind = options.track.kind();
        if !device.can_produce(kind) {
            return Err(SessionError::precondition(format!("device cannot produce {kind}")));
        }

        let transport = pending.await?;
        let local = transport.local().produce(options).await?;
        let producer = MediaProducer::new(
            local,
            router_id.clone(),
            transport.id().to_string(),
            Arc::clone(&self.inner.controller),
            Arc::downgrade(&self.inner.producers),
        );
        producer.watch();

        if !self.inner.register_if_current(epoch, || {
            self.inner.producers.insert(producer.id(), producer.clone());
        }) {
            producer.close().await;
            return Err(SessionError::Inconsistent(format!(
                "session was cleaned up while producer {} was being created",
                producer.id()
            )));
        }

        match self
            .inner
            .controller
            .get_media_producer(&router_id, producer.id())
            .await
        {
            Ok(snapshot) => producer.attach_snapshot(snapshot),
            Err(e) => warn!(
                router_id = %router_id,
                producer_id = %producer.id(),
                error = %e,
                "Failed to fetch media producer snapshot"
            ),
        }

        if self.inner.options.debug_logs {
            debug!(
                router_id = %router_id,
                producer_id = %producer.id(),
                %kind,
                "Media producer created"
            );
        }
        Ok(producer)
    }

    /// Receive a remote producer on the recv transport.
    ///
    /// Requires a ready router and a recv transport. If the local engine
    /// refuses the consumer, the remote one is deleted again.
    pub async fn create_media_consumer(
        &self,
        media_producer_id: &str,
    ) -> Result<MediaConsumer, SessionError> {
        let (router_id, pending, epoch) = {
            let core = self.inner.core.lock();
            let router_id = core.ready_router()?.id.clone();
            let pending = core.recv.existing().ok_or_else(|| {
                SessionError::precondition(
                    "receive transport not created, call create_recv_transport first",
                )
            })?;
            (router_id, pending, core.epoch)
        };

        let transport = pending.await?;
        let config = MediaConsumerConfig::new(media_producer_id, transport.id());
        let snapshot = self
            .inner
            .controller
            .create_media_consumer(&router_id, &config)
            .await?;

        let options = ConsumeOptions {
            id: snapshot.id.clone(),
            producer_id: snapshot.media_producer_id.clone(),
            kind: snapshot.kind,
            rtp_parameters: snapshot.rtp_parameters.clone(),
            app_data: serde_json::to_value(&snapshot).ok(),
        };
        let local = match transport.local().consume(options).await {
            Ok(local) => local,
            Err(e) => {
                if let Err(delete_err) = self
                    .inner
                    .controller
                    .delete_media_consumer(&router_id, &snapshot.id)
                    .await
                {
                    warn!(
                        router_id = %router_id,
                        consumer_id = %snapshot.id,
                        error = %delete_err,
                        "Failed to delete orphaned media consumer"
                    );
                }
                return Err(e.into());
            }
        };

        let consumer = MediaConsumer::new(
            local,
            router_id.clone(),
            snapshot,
            Arc::clone(&self.inner.controller),
            Arc::downgrade(&self.inner.consumers),
        );
        consumer.watch();

        if !self.inner.register_if_current(epoch, || {
            self.inner.consumers.insert(consumer.id(), consumer.clone());
        }) {
            consumer.close().await;
            return Err(SessionError::Inconsistent(format!(
                "session was cleaned up while consumer {} was being created",
                consumer.id()
            )));
        }

        if self.inner.options.debug_logs {
            debug!(
                router_id = %router_id,
                consumer_id = %consumer.id(),
                media_producer_id,
                "Media consumer created"
            );
        }
        Ok(consumer)
    }
}

impl SessionInner {
    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Move `Empty` to `RouterPending` atomically, or report why not.
    fn reserve_router(&self, router_id: Option<&str>) -> Result<Reservation, SessionError> {
        let mut core = self.core.lock();
        match (&core.phase, router_id) {
            (Phase::RouterReady(router), Some(id)) if router.id == id => {
                return Ok(Reservation::Bound(router.clone()));
            }
            (Phase::RouterReady(_) | Phase::RouterPending, _) => {
                return Err(SessionError::AlreadyConnected);
            }
            (Phase::Closing, _) => return Err(SessionError::precondition("session is closing")),
            (Phase::Empty, _) => {}
        }
        if core.device.loaded() {
            return Err(SessionError::DeviceAlreadyLoaded);
        }
        core.phase = Phase::RouterPending;
        Ok(Reservation::Reserved {
            device: Arc::clone(&core.device),
            epoch: core.epoch,
        })
    }

    fn release_router(&self, epoch: u64) {
        let mut core = self.core.lock();
        if core.epoch == epoch && matches!(core.phase, Phase::RouterPending) {
            core.phase = Phase::Empty;
        }
    }

    fn commit_router(&self, epoch: u64, router: &RouterSnapshot) -> bool {
        let mut core = self.core.lock();
        if core.epoch != epoch || !matches!(core.phase, Phase::RouterPending) {
            return false;
        }
        core.phase = Phase::RouterReady(router.clone());
        true
    }

    async fn delete_orphan_router(&self, router_id: &str) {
        if let Err(e) = self.controller.delete_router(router_id).await {
            warn!(router_id = %router_id, error = %e, "Failed to delete orphaned router");
        }
    }

    fn register_if_current(&self, epoch: u64, register: impl FnOnce()) -> bool {
        let core = self.core.lock();
        if core.epoch != epoch || !matches!(core.phase, Phase::RouterReady(_)) {
            return false;
        }
        register();
        true
    }

    async fn build_transport(
        self: &Arc<Self>,
        direction: TransportDirection,
        router_id: &str,
        device: Arc<dyn Device>,
        config: Option<WebRtcTransportConfig>,
    ) -> Result<TransportHandle, SessionError> {
        let config = config.unwrap_or_else(|| {
            WebRtcTransportConfig::with_protocols(self.options.allowed_protocols.clone())
        });
        let snapshot = self
            .controller
            .create_webrtc_transport(router_id, &config)
            .await?;

        let options = TransportOptions::from_snapshot(&snapshot, self.options.ice_transport_policy);
        let local = match direction {
            TransportDirection::Send => device.create_send_transport(options),
            TransportDirection::Recv => device.create_recv_transport(options),
        };
        let local = match local {
            Ok(local) => local,
            Err(e) => {
                if let Err(delete_err) = self
                    .controller
                    .delete_webrtc_transport(router_id, &snapshot.id)
                    .await
                {
                    warn!(
                        router_id = %router_id,
                        transport_id = %snapshot.id,
                        error = %delete_err,
                        "Failed to delete orphaned transport"
                    );
                }
                return Err(e.into());
            }
        };

        let transport_id = snapshot.id.clone();
        let handle = TransportHandle::new(
            local,
            snapshot,
            router_id.to_string(),
            direction,
            Arc::clone(&self.controller),
        );
        bind_transport(
            handle.local().as_ref(),
            Arc::new(
                ControllerBinding::new(
                    Arc::clone(&self.controller),
                    router_id,
                    transport_id.clone(),
                    direction,
                )
                .with_debug_logs(self.options.debug_logs),
            ),
        );
        self.watch_transport(&handle);

        if self.options.debug_logs {
            debug!(
                router_id = %router_id,
                transport_id = %transport_id,
                %direction,
                "Transport created"
            );
        }
        Ok(handle)
    }

    /// Clear the slot and release the remote transport when the engine
    /// closes the local one.
    fn watch_transport(self: &Arc<Self>, handle: &TransportHandle) {
        let session = Arc::downgrade(self);
        let weak = handle.downgrade();
        let direction = handle.direction();
        let transport_id = handle.id().to_string();
        handle.local().on_close(Box::new(move || {
            // Upgrade before the slot lets go of its strong reference.
            let held = weak.upgrade();
            let released = session
                .upgrade()
                .and_then(|session| session.transport_closed(direction, &transport_id));
            if let Some(handle) = held.or(released) {
                if !handle.closed() {
                    spawn_detached("transport close", async move { handle.close().await });
                }
            }
        }));
    }

    /// Free the slot if it still holds `transport_id`, returning the removed handle.
    fn transport_closed(
        &self,
        direction: TransportDirection,
        transport_id: &str,
    ) -> Option<TransportHandle> {
        let released = {
            let mut core = self.core.lock();
            let slot = core.slot_mut(direction);
            if matches!(slot, TransportSlot::Ready(handle) if handle.id() == transport_id) {
                match std::mem::replace(slot, TransportSlot::Idle) {
                    TransportSlot::Ready(handle) => Some(handle),
                    _ => None,
                }
            } else {
                None
            }
        };
        if self.options.debug_logs {
            debug!(transport_id = %transport_id, %direction, "Transport closed");
        }
        self.emit(SessionEvent::TransportClosed {
            direction,
            transport_id: transport_id.to_string(),
        });
        released
    }

    /// Publish the creation result into the slot, unless a cleanup replaced
    /// the slot meanwhile; then the new transport is released again.
    async fn settle_transport(
        &self,
        direction: TransportDirection,
        epoch: u64,
        token: u64,
        result: Result<TransportHandle, SessionError>,
    ) -> Result<TransportHandle, SessionError> {
        let orphan = {
            let mut core = self.core.lock();
            let current = core.epoch == epoch;
            let slot = core.slot_mut(direction);
            let owns_slot =
                matches!(slot, TransportSlot::Creating { token: t, .. } if *t == token);
            match &result {
                Ok(handle) if current && owns_slot => {
                    *slot = TransportSlot::Ready(handle.clone());
                    None
                }
                Ok(handle) => Some(handle.clone()),
                Err(_) => {
                    if owns_slot {
                        *slot = TransportSlot::Idle;
                    }
                    None
                }
            }
        };

        match orphan {
            Some(handle) => {
                handle.close().await;
                Err(SessionError::Inconsistent(format!(
                    "session was cleaned up while {direction} transport {} was being created",
                    handle.id()
                )))
            }
            None => result,
        }
    }

    /// Enter `Closing` and take everything cleanup must release.
    pub(crate) fn begin_cleanup(&self) -> CleanupTargets {
        let mut core = self.core.lock();
        core.epoch += 1;
        let router = match mem::replace(&mut core.phase, Phase::Closing) {
            Phase::RouterReady(router) => Some(router),
            _ => None,
        };
        let send = mem::replace(&mut core.send, TransportSlot::Closed).existing();
        let recv = mem::replace(&mut core.recv, TransportSlot::Closed).existing();
        CleanupTargets { router, send, recv }
    }

    /// Return to `Empty` with a fresh device.
    pub(crate) fn finish_cleanup(&self) {
        let device = self.device_factory.create();
        let mut core = self.core.lock();
        core.phase = Phase::Empty;
        core.send = TransportSlot::Idle;
        core.recv = TransportSlot::Idle;
        core.device = device;
    }
}
