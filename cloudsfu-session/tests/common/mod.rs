//! Test doubles shared by the session integration tests
//!
//! - `FakeController`: in-memory `ControllerApi` that records every call and
//!   can be told to fail specific operations
//! - `FakeEngine`: media engine whose transports drive the connect/produce
//!   negotiations through the installed event handler

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cloudsfu_controller::{
    ConnectWebRtcTransportParams, ControllerApi, ControllerError, DtlsFingerprint, DtlsParameters,
    DtlsRole, DtlsState, FingerprintAlgorithm, IceParameters, IceRole, IceState, MediaConsumerConfig,
    MediaConsumerSnapshot, MediaKind, MediaProducerConfig, MediaProducerSnapshot,
    RouterConfig, RouterSnapshot, RtpCapabilities, RtpCodecCapability, RtpCodecParameters,
    RtpParameters, SetMediaConsumerPreferredLayersParams, SetMediaConsumerPriorityParams,
    SnapshotMetaData, WebRtcTransportConfig, WebRtcTransportSnapshot,
};
use cloudsfu_session::{
    Callback, CloseCallback, ConnectRequest, ConnectionState, ConsumeOptions, Device,
    DeviceFactory, EngineError, LocalConsumer, LocalProducer, LocalTrack, LocalTransport,
    MediaSession, ProduceOptions, ProduceRequest, SessionOptions, TransportDirection,
    TransportEventHandler, TransportOptions,
};
use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// One controller call, with the identifiers that matter to the tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListRouters,
    CreateRouter,
    GetRouter(String),
    DeleteRouter(String),
    ListTransports,
    CreateTransport,
    GetTransport(String),
    DeleteTransport(String),
    ConnectTransport(String),
    ListProducers,
    CreateProducer { transport_id: String, kind: MediaKind },
    GetProducer(String),
    DeleteProducer(String),
    PauseProducer(String),
    ResumeProducer(String),
    ListConsumers,
    CreateConsumer { producer_id: String, transport_id: String },
    GetConsumer(String),
    DeleteConsumer(String),
    PauseConsumer(String),
    ResumeConsumer(String),
    SetConsumerLayers(String, u8, u8),
    SetConsumerPriority(String, u8),
    UnsetConsumerPriority(String),
    RequestKeyFrame(String),
}

impl Call {
    pub fn is_delete(&self) -> bool {
        matches!(
            self,
            Self::DeleteRouter(_)
                | Self::DeleteTransport(_)
                | Self::DeleteProducer(_)
                | Self::DeleteConsumer(_)
        )
    }
}

#[derive(Default)]
pub struct FakeController {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<&'static str>>,
    last_transport_config: Mutex<Option<WebRtcTransportConfig>>,
}

fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", nanoid::nanoid!(10))
}

fn meta() -> SnapshotMetaData {
    SnapshotMetaData {
        created_at: 1_700_000_000_000,
        sfu_id: Some("sfu-test".to_string()),
        router_id: None,
        transport_id: None,
        worker_pid: None,
        version: 1,
    }
}

pub fn opus_codec() -> RtpCodecParameters {
    RtpCodecParameters {
        mime_type: "audio/opus".to_string(),
        payload_type: 100,
        clock_rate: 48_000,
        channels: Some(2),
        parameters: None,
        rtcp_feedback: None,
    }
}

pub fn router_snapshot(id: &str) -> RouterSnapshot {
    RouterSnapshot {
        meta: meta(),
        id: id.to_string(),
        connections: Vec::new(),
        rtp_capabilities: RtpCapabilities {
            codecs: Some(vec![RtpCodecCapability {
                kind: MediaKind::Audio,
                mime_type: "audio/opus".to_string(),
                preferred_payload_type: Some(100),
                clock_rate: 48_000,
                channels: Some(2),
                parameters: None,
                rtcp_feedback: None,
            }]),
            header_extensions: None,
        },
        region: "eu-west".to_string(),
        closed: false,
    }
}

pub fn transport_snapshot(id: &str) -> WebRtcTransportSnapshot {
    WebRtcTransportSnapshot {
        meta: meta(),
        id: id.to_string(),
        ice_servers: Vec::new(),
        rtp_capabilities: RtpCapabilities::default(),
        dtls_parameters: DtlsParameters {
            role: Some(DtlsRole::Auto),
            fingerprints: vec![DtlsFingerprint {
                algorithm: FingerprintAlgorithm::Sha256,
                value: "AB:CD".to_string(),
            }],
        },
        ice_parameters: IceParameters {
            username_fragment: "frag".to_string(),
            password: "pwd".to_string(),
            ice_lite: Some(true),
        },
        ice_candidates: Vec::new(),
        dtls_remote_cert: None,
        ice_state: IceState::New,
        ice_selected_tuple: None,
        dtls_state: DtlsState::New,
        closed: false,
        ice_role: IceRole::Controlled,
        sctp_parameters: None,
        sctp_state: None,
    }
}

impl FakeController {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every later call of `operation` (trait method name) fail.
    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.failing.lock().remove(operation);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn deletes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_delete).collect()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn last_transport_config(&self) -> Option<WebRtcTransportConfig> {
        self.last_transport_config.lock().clone()
    }

    fn record(&self, operation: &'static str, call: Call) -> Result<(), ControllerError> {
        self.calls.lock().push(call);
        if self.failing.lock().contains(operation) {
            return Err(ControllerError::Network(format!("{operation}: connection reset")));
        }
        Ok(())
    }
}

#[async_trait]
impl ControllerApi for FakeController {
    async fn list_router_ids(&self) -> Result<Vec<String>, ControllerError> {
        self.record("list_router_ids", Call::ListRouters)?;
        Ok(Vec::new())
    }

    async fn create_router(&self, _config: &RouterConfig) -> Result<RouterSnapshot, ControllerError> {
        self.record("create_router", Call::CreateRouter)?;
        tokio::task::yield_now().await;
        Ok(router_snapshot(&new_id("router")))
    }

    async fn get_router(&self, router_id: &str) -> Result<RouterSnapshot, ControllerError> {
        self.record("get_router", Call::GetRouter(router_id.to_string()))?;
        Ok(router_snapshot(router_id))
    }

    async fn delete_router(&self, router_id: &str) -> Result<(), ControllerError> {
        self.record("delete_router", Call::DeleteRouter(router_id.to_string()))?;
        // Keeps a running cleanup observable by a concurrent caller
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn list_webrtc_transport_ids(&self, _router_id: &str) -> Result<Vec<String>, ControllerError> {
        self.record("list_webrtc_transport_ids", Call::ListTransports)?;
        Ok(Vec::new())
    }

    async fn create_webrtc_transport(
        &self,
        _router_id: &str,
        config: &WebRtcTransportConfig,
    ) -> Result<WebRtcTransportSnapshot, ControllerError> {
        self.record("create_webrtc_transport", Call::CreateTransport)?;
        *self.last_transport_config.lock() = Some(config.clone());
        // Suspend so concurrent callers observe the creation in flight
        tokio::task::yield_now().await;
        Ok(transport_snapshot(&new_id("transport")))
    }

    async fn get_webrtc_transport(
        &self,
        _router_id: &str,
        transport_id: &str,
    ) -> Result<WebRtcTransportSnapshot, ControllerError> {
        self.record("get_webrtc_transport", Call::GetTransport(transport_id.to_string()))?;
        Ok(transport_snapshot(transport_id))
    }

    async fn delete_webrtc_transport(
        &self,
        _router_id: &str,
        transport_id: &str,
    ) -> Result<(), ControllerError> {
        self.record(
            "delete_webrtc_transport",
            Call::DeleteTransport(transport_id.to_string()),
        )
    }

    async fn connect_webrtc_transport(
        &self,
        _router_id: &str,
        transport_id: &str,
        _params: &ConnectWebRtcTransportParams,
    ) -> Result<(), ControllerError> {
        self.record(
            "connect_webrtc_transport",
            Call::ConnectTransport(transport_id.to_string()),
        )
    }

    async fn list_media_producer_ids(&self, _router_id: &str) -> Result<Vec<String>, ControllerError> {
        self.record("list_media_producer_ids", Call::ListProducers)?;
        Ok(Vec::new())
    }

    async fn create_media_producer(
        &self,
        _router_id: &str,
        config: &MediaProducerConfig,
    ) -> Result<MediaProducerSnapshot, ControllerError> {
        self.record(
            "create_media_producer",
            Call::CreateProducer {
                transport_id: config.transport_id.clone(),
                kind: config.kind,
            },
        )?;
        Ok(MediaProducerSnapshot {
            meta: meta(),
            id: new_id("producer"),
            transport_id: config.transport_id.clone(),
            kind: config.kind,
            rtp_parameters: config.rtp_parameters.clone(),
            paused: config.paused.unwrap_or(false),
            closed: false,
        })
    }

    async fn get_media_producer(
        &self,
        _router_id: &str,
        producer_id: &str,
    ) -> Result<MediaProducerSnapshot, ControllerError> {
        self.record("get_media_producer", Call::GetProducer(producer_id.to_string()))?;
        Ok(MediaProducerSnapshot {
            meta: meta(),
            id: producer_id.to_string(),
            transport_id: "unknown".to_string(),
            kind: MediaKind::Audio,
            rtp_parameters: RtpParameters::default(),
            paused: false,
            closed: false,
        })
    }

    async fn delete_media_producer(&self, _router_id: &str, producer_id: &str) -> Result<(), ControllerError> {
        self.record(
            "delete_media_producer",
            Call::DeleteProducer(producer_id.to_string()),
        )
    }

    async fn pause_media_producer(&self, _router_id: &str, producer_id: &str) -> Result<(), ControllerError> {
        self.record("pause_media_producer", Call::PauseProducer(producer_id.to_string()))
    }

    async fn resume_media_producer(&self, _router_id: &str, producer_id: &str) -> Result<(), ControllerError> {
        self.record("resume_media_producer", Call::ResumeProducer(producer_id.to_string()))
    }

    async fn list_media_consumer_ids(&self, _router_id: &str) -> Result<Vec<String>, ControllerError> {
        self.record("list_media_consumer_ids", Call::ListConsumers)?;
        Ok(Vec::new())
    }

    async fn create_media_consumer(
        &self,
        _router_id: &str,
        config: &MediaConsumerConfig,
    ) -> Result<MediaConsumerSnapshot, ControllerError> {
        self.record(
            "create_media_consumer",
            Call::CreateConsumer {
                producer_id: config.media_producer_id.clone(),
                transport_id: config.transport_id.clone(),
            },
        )?;
        Ok(MediaConsumerSnapshot {
            meta: meta(),
            id: new_id("consumer"),
            media_producer_id: config.media_producer_id.clone(),
            transport_id: config.transport_id.clone(),
            kind: MediaKind::Audio,
            rtp_parameters: RtpParameters {
                codecs: vec![opus_codec()],
                ..RtpParameters::default()
            },
            paused: false,
            closed: false,
            producer_paused: false,
        })
    }

    async fn get_media_consumer(
        &self,
        _router_id: &str,
        consumer_id: &str,
    ) -> Result<MediaConsumerSnapshot, ControllerError> {
        self.record("get_media_consumer", Call::GetConsumer(consumer_id.to_string()))?;
        Err(ControllerError::RemoteRequestFailed {
            status: 404,
            status_text: "Not Found".to_string(),
            body: String::new(),
        })
    }

    async fn delete_media_consumer(&self, _router_id: &str, consumer_id: &str) -> Result<(), ControllerError> {
        self.record(
            "delete_media_consumer",
            Call::DeleteConsumer(consumer_id.to_string()),
        )
    }

    async fn pause_media_consumer(&self, _router_id: &str, consumer_id: &str) -> Result<(), ControllerError> {
        self.record("pause_media_consumer", Call::PauseConsumer(consumer_id.to_string()))
    }

    async fn resume_media_consumer(&self, _router_id: &str, consumer_id: &str) -> Result<(), ControllerError> {
        self.record("resume_media_consumer", Call::ResumeConsumer(consumer_id.to_string()))
    }

    async fn set_media_consumer_preferred_layers(
        &self,
        _router_id: &str,
        consumer_id: &str,
        params: &SetMediaConsumerPreferredLayersParams,
    ) -> Result<(), ControllerError> {
        self.record(
            "set_media_consumer_preferred_layers",
            Call::SetConsumerLayers(
                consumer_id.to_string(),
                params.spatial_layer,
                params.temporal_layer,
            ),
        )
    }

    async fn set_media_consumer_priority(
        &self,
        _router_id: &str,
        consumer_id: &str,
        params: &SetMediaConsumerPriorityParams,
    ) -> Result<(), ControllerError> {
        self.record(
            "set_media_consumer_priority",
            Call::SetConsumerPriority(consumer_id.to_string(), params.priority),
        )
    }

    async fn unset_media_consumer_priority(
        &self,
        _router_id: &str,
        consumer_id: &str,
    ) -> Result<(), ControllerError> {
        self.record(
            "unset_media_consumer_priority",
            Call::UnsetConsumerPriority(consumer_id.to_string()),
        )
    }

    async fn request_media_consumer_key_frame(
        &self,
        _router_id: &str,
        consumer_id: &str,
    ) -> Result<(), ControllerError> {
        self.record(
            "request_media_consumer_key_frame",
            Call::RequestKeyFrame(consumer_id.to_string()),
        )
    }
}

// ---------------------------------------------------------------------------
// Media engine
// ---------------------------------------------------------------------------

/// Knobs shared by every device a `FakeEngine` creates.
#[derive(Default)]
pub struct EngineFlags {
    pub fail_consume: AtomicBool,
    pub fail_load: AtomicBool,
    pub devices_created: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct FakeEngine {
    pub flags: Arc<EngineFlags>,
}

impl FakeEngine {
    pub fn factory(&self) -> Arc<dyn DeviceFactory> {
        let flags = Arc::clone(&self.flags);
        Arc::new(move || -> Arc<dyn Device> {
            flags.devices_created.fetch_add(1, Ordering::SeqCst);
            Arc::new(FakeDevice::new(Arc::clone(&flags)))
        })
    }
}

pub struct FakeDevice {
    flags: Arc<EngineFlags>,
    capabilities: Mutex<Option<RtpCapabilities>>,
}

impl FakeDevice {
    pub fn new(flags: Arc<EngineFlags>) -> Self {
        Self {
            flags,
            capabilities: Mutex::new(None),
        }
    }

    fn transport(
        &self,
        options: TransportOptions,
        direction: TransportDirection,
    ) -> Result<Arc<dyn LocalTransport>, EngineError> {
        if !self.loaded() {
            return Err(EngineError::NotLoaded);
        }
        Ok(Arc::new(FakeTransport::new(
            options.id,
            direction,
            Arc::clone(&self.flags),
        )))
    }
}

#[async_trait]
impl Device for FakeDevice {
    fn loaded(&self) -> bool {
        self.capabilities.lock().is_some()
    }

    async fn load(&self, router_rtp_capabilities: RtpCapabilities) -> Result<(), EngineError> {
        if self.flags.fail_load.load(Ordering::SeqCst) {
            return Err(EngineError::Other("unsupported browser".to_string()));
        }
        let mut capabilities = self.capabilities.lock();
        if capabilities.is_some() {
            return Err(EngineError::AlreadyLoaded);
        }
        *capabilities = Some(router_rtp_capabilities);
        Ok(())
    }

    fn rtp_capabilities(&self) -> Option<RtpCapabilities> {
        self.capabilities.lock().clone()
    }

    fn can_produce(&self, kind: MediaKind) -> bool {
        self.capabilities.lock().as_ref().is_some_and(|caps| {
            caps.codecs
                .as_ref()
                .is_some_and(|codecs| codecs.iter().any(|codec| codec.kind == kind))
        })
    }

    fn create_send_transport(
        &self,
        options: TransportOptions,
    ) -> Result<Arc<dyn LocalTransport>, EngineError> {
        self.transport(options, TransportDirection::Send)
    }

    fn create_recv_transport(
        &self,
        options: TransportOptions,
    ) -> Result<Arc<dyn LocalTransport>, EngineError> {
        self.transport(options, TransportDirection::Recv)
    }
}

/// Close observers of one engine object.
#[derive(Default)]
struct Observers {
    closed: AtomicBool,
    callbacks: Mutex<Vec<CloseCallback>>,
}

impl Observers {
    fn add(&self, callback: CloseCallback) {
        if self.closed.load(Ordering::SeqCst) {
            callback();
            return;
        }
        self.callbacks.lock().push(callback);
    }

    /// Mark closed and fire observers once. Returns false if already closed.
    fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let callbacks = std::mem::take(&mut *self.callbacks.lock());
        for callback in callbacks {
            callback();
        }
        true
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct FakeTransport {
    id: String,
    direction: TransportDirection,
    flags: Arc<EngineFlags>,
    observers: Observers,
    connected: AtomicBool,
    state: Mutex<ConnectionState>,
    handler: Mutex<Option<Arc<dyn TransportEventHandler>>>,
    producers: Mutex<Vec<Arc<FakeProducer>>>,
    consumers: Mutex<Vec<Arc<FakeConsumer>>>,
}

impl FakeTransport {
    pub fn new(id: String, direction: TransportDirection, flags: Arc<EngineFlags>) -> Self {
        Self {
            id,
            direction,
            flags,
            observers: Observers::default(),
            connected: AtomicBool::new(false),
            state: Mutex::new(ConnectionState::New),
            handler: Mutex::new(None),
            producers: Mutex::new(Vec::new()),
            consumers: Mutex::new(Vec::new()),
        }
    }

    fn handler(&self) -> Result<Arc<dyn TransportEventHandler>, EngineError> {
        self.handler
            .lock()
            .clone()
            .ok_or_else(|| EngineError::Other("no event handler bound".to_string()))
    }

    fn set_state(&self, handler: &Arc<dyn TransportEventHandler>, state: ConnectionState) {
        *self.state.lock() = state;
        handler.on_state_change(state);
    }

    async fn ensure_connected(&self, handler: &Arc<dyn TransportEventHandler>) -> Result<(), EngineError> {
        if self.connected.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.set_state(handler, ConnectionState::Connecting);
        let (callback, pending) = Callback::channel();
        let request = ConnectRequest {
            dtls_parameters: DtlsParameters {
                role: Some(DtlsRole::Client),
                fingerprints: vec![DtlsFingerprint {
                    algorithm: FingerprintAlgorithm::Sha256,
                    value: "11:22".to_string(),
                }],
            },
        };
        handler.on_connect(request, callback).await;
        if let Err(e) = pending.outcome().await {
            self.connected.store(false, Ordering::SeqCst);
            self.set_state(handler, ConnectionState::Failed);
            return Err(e);
        }
        self.set_state(handler, ConnectionState::Connected);
        Ok(())
    }
}

#[async_trait]
impl LocalTransport for FakeTransport {
    fn id(&self) -> &str {
        &self.id
    }

    fn direction(&self) -> TransportDirection {
        self.direction
    }

    fn closed(&self) -> bool {
        self.observers.is_closed()
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn set_event_handler(&self, handler: Arc<dyn TransportEventHandler>) {
        *self.handler.lock() = Some(handler);
    }

    fn on_close(&self, callback: CloseCallback) {
        self.observers.add(callback);
    }

    async fn produce(&self, options: ProduceOptions) -> Result<Arc<dyn LocalProducer>, EngineError> {
        if self.closed() {
            return Err(EngineError::TransportClosed);
        }
        let handler = self.handler()?;
        self.ensure_connected(&handler).await?;

        let kind = options.track.kind();
        let (callback, pending) = Callback::channel();
        let request = ProduceRequest {
            kind,
            rtp_parameters: RtpParameters {
                mid: Some("0".to_string()),
                codecs: vec![opus_codec()],
                ..RtpParameters::default()
            },
            app_data: options.app_data,
        };
        handler.on_produce(request, callback).await;
        let id = pending.outcome().await?;

        let producer = Arc::new(FakeProducer::new(id, kind));
        self.producers.lock().push(Arc::clone(&producer));
        Ok(producer)
    }

    async fn consume(&self, options: ConsumeOptions) -> Result<Arc<dyn LocalConsumer>, EngineError> {
        if self.closed() {
            return Err(EngineError::TransportClosed);
        }
        if self.flags.fail_consume.load(Ordering::SeqCst) {
            return Err(EngineError::Other("unsupported codec".to_string()));
        }
        let handler = self.handler()?;
        self.ensure_connected(&handler).await?;

        let consumer = Arc::new(FakeConsumer::new(
            options.id,
            options.producer_id,
            options.kind,
        ));
        self.consumers.lock().push(Arc::clone(&consumer));
        Ok(consumer)
    }

    fn close(&self) {
        if !self.observers.close() {
            return;
        }
        *self.state.lock() = ConnectionState::Closed;
        let producers = std::mem::take(&mut *self.producers.lock());
        for producer in producers {
            producer.close();
        }
        let consumers = std::mem::take(&mut *self.consumers.lock());
        for consumer in consumers {
            consumer.close();
        }
    }
}

pub struct FakeProducer {
    id: String,
    kind: MediaKind,
    paused: AtomicBool,
    observers: Observers,
}

impl FakeProducer {
    pub fn new(id: String, kind: MediaKind) -> Self {
        Self {
            id,
            kind,
            paused: AtomicBool::new(false),
            observers: Observers::default(),
        }
    }
}

impl LocalProducer for FakeProducer {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn closed(&self) -> bool {
        self.observers.is_closed()
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn close(&self) {
        self.observers.close();
    }

    fn on_close(&self, callback: CloseCallback) {
        self.observers.add(callback);
    }
}

pub struct FakeConsumer {
    id: String,
    producer_id: String,
    kind: MediaKind,
    paused: AtomicBool,
    observers: Observers,
}

impl FakeConsumer {
    pub fn new(id: String, producer_id: String, kind: MediaKind) -> Self {
        Self {
            id,
            producer_id,
            kind,
            paused: AtomicBool::new(false),
            observers: Observers::default(),
        }
    }
}

impl LocalConsumer for FakeConsumer {
    fn id(&self) -> &str {
        &self.id
    }

    fn producer_id(&self) -> &str {
        &self.producer_id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn closed(&self) -> bool {
        self.observers.is_closed()
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn close(&self) {
        self.observers.close();
    }

    fn on_close(&self, callback: CloseCallback) {
        self.observers.add(callback);
    }
}

pub struct FakeTrack {
    id: String,
    kind: MediaKind,
}

impl FakeTrack {
    pub fn audio() -> Arc<dyn LocalTrack> {
        Arc::new(Self {
            id: new_id("track"),
            kind: MediaKind::Audio,
        })
    }

    pub fn video() -> Arc<dyn LocalTrack> {
        Arc::new(Self {
            id: new_id("track"),
            kind: MediaKind::Video,
        })
    }
}

impl LocalTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub controller: Arc<FakeController>,
    pub engine: FakeEngine,
    pub session: MediaSession,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(SessionOptions::default().with_debug_logs(true))
    }

    pub fn with_options(options: SessionOptions) -> Self {
        let controller = FakeController::new();
        let engine = FakeEngine::default();
        let session = MediaSession::new(
            Arc::clone(&controller) as Arc<dyn ControllerApi>,
            engine.factory(),
            options,
        );
        Self {
            controller,
            engine,
            session,
        }
    }

    /// Session with a ready router; the call log starts empty.
    pub async fn with_router() -> Self {
        let harness = Self::new();
        harness.session.create_router(None).await.unwrap();
        harness.controller.clear();
        harness
    }

    /// Session with a router and both transports; the call log starts empty.
    pub async fn with_transports() -> Self {
        let harness = Self::with_router().await;
        harness.session.create_send_transport(None).await.unwrap();
        harness.session.create_recv_transport(None).await.unwrap();
        harness.controller.clear();
        harness
    }
}

/// Let tasks spawned by engine close observers run to completion.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
