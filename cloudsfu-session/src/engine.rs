//! Local media engine abstraction
//!
//! The WebRTC stack that actually moves media (ICE, DTLS, SRTP) lives outside
//! this crate. A session only needs the small surface below: a `Device` that
//! loads router capabilities and creates transports, and transports that
//! produce and consume tracks while asking a [`TransportEventHandler`] to
//! confirm each negotiation with the controller.

use std::sync::Arc;

use async_trait::async_trait;
use cloudsfu_controller::{
    DtlsParameters, IceCandidate, IceParameters, IceServerConfig, MediaKind, RtpCapabilities,
    RtpEncodingParameters, RtpParameters, SctpParameters, WebRtcTransportSnapshot,
};
use serde_json::Value;

use crate::binding::TransportEventHandler;
use crate::error::EngineError;
use crate::types::{ConnectionState, IceTransportPolicy, TransportDirection};

/// Observer invoked once when an engine object closes, whatever closed it.
pub type CloseCallback = Box<dyn FnOnce() + Send + 'static>;

/// Parameters for creating a local transport from a remote snapshot
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub id: String,
    pub ice_parameters: IceParameters,
    pub ice_candidates: Vec<IceCandidate>,
    pub dtls_parameters: DtlsParameters,
    pub sctp_parameters: Option<SctpParameters>,
    pub ice_servers: Vec<IceServerConfig>,
    pub ice_transport_policy: IceTransportPolicy,
}

impl TransportOptions {
    #[must_use]
    pub fn from_snapshot(snapshot: &WebRtcTransportSnapshot, policy: IceTransportPolicy) -> Self {
        Self {
            id: snapshot.id.clone(),
            ice_parameters: snapshot.ice_parameters.clone(),
            ice_candidates: snapshot.ice_candidates.clone(),
            dtls_parameters: snapshot.dtls_parameters.clone(),
            sctp_parameters: snapshot.sctp_parameters,
            ice_servers: snapshot.ice_servers.clone(),
            ice_transport_policy: policy,
        }
    }
}

/// A media source that can be published
pub trait LocalTrack: Send + Sync {
    fn id(&self) -> &str;
    fn kind(&self) -> MediaKind;
}

/// Track publication request
#[derive(Clone)]
pub struct ProduceOptions {
    pub track: Arc<dyn LocalTrack>,
    pub encodings: Option<Vec<RtpEncodingParameters>>,
    pub codec_options: Option<Value>,
    pub app_data: Option<Value>,
}

impl ProduceOptions {
    pub fn new(track: Arc<dyn LocalTrack>) -> Self {
        Self {
            track,
            encodings: None,
            codec_options: None,
            app_data: None,
        }
    }
}

/// Parameters for receiving a remote producer on a recv transport
#[derive(Debug, Clone)]
pub struct ConsumeOptions {
    pub id: String,
    pub producer_id: String,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    pub app_data: Option<Value>,
}

#[async_trait]
pub trait Device: Send + Sync {
    fn loaded(&self) -> bool;

    /// Load the router's RTP capabilities. Fails if already loaded.
    async fn load(&self, router_rtp_capabilities: RtpCapabilities) -> Result<(), EngineError>;

    /// Capabilities of the loaded device, `None` before `load`.
    fn rtp_capabilities(&self) -> Option<RtpCapabilities>;

    fn can_produce(&self, kind: MediaKind) -> bool;

    fn create_send_transport(
        &self,
        options: TransportOptions,
    ) -> Result<Arc<dyn LocalTransport>, EngineError>;

    fn create_recv_transport(
        &self,
        options: TransportOptions,
    ) -> Result<Arc<dyn LocalTransport>, EngineError>;
}

/// Source of fresh, unloaded devices. A session replaces its device with a
/// new one on every cleanup.
pub trait DeviceFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Device>;
}

impl<F> DeviceFactory for F
where
    F: Fn() -> Arc<dyn Device> + Send + Sync,
{
    fn create(&self) -> Arc<dyn Device> {
        self()
    }
}

#[async_trait]
pub trait LocalTransport: Send + Sync {
    fn id(&self) -> &str;
    fn direction(&self) -> TransportDirection;
    fn closed(&self) -> bool;
    fn connection_state(&self) -> ConnectionState;

    /// Install the handler that answers connect and produce negotiations.
    fn set_event_handler(&self, handler: Arc<dyn TransportEventHandler>);

    fn on_close(&self, callback: CloseCallback);

    /// Publish a track. Drives `on_connect` (first use) and `on_produce`.
    async fn produce(&self, options: ProduceOptions) -> Result<Arc<dyn LocalProducer>, EngineError>;

    /// Receive a remote producer. Drives `on_connect` on first use.
    async fn consume(&self, options: ConsumeOptions) -> Result<Arc<dyn LocalConsumer>, EngineError>;

    /// Close the transport and every producer/consumer on it. Idempotent.
    fn close(&self);
}

pub trait LocalProducer: Send + Sync {
    fn id(&self) -> &str;
    fn kind(&self) -> MediaKind;
    fn paused(&self) -> bool;
    fn closed(&self) -> bool;
    fn pause(&self);
    fn resume(&self);
    fn close(&self);
    fn on_close(&self, callback: CloseCallback);
}

pub trait LocalConsumer: Send + Sync {
    fn id(&self) -> &str;
    fn producer_id(&self) -> &str;
    fn kind(&self) -> MediaKind;
    fn paused(&self) -> bool;
    fn closed(&self) -> bool;
    fn pause(&self);
    fn resume(&self);
    fn close(&self);
    fn on_close(&self, callback: CloseCallback);
}
