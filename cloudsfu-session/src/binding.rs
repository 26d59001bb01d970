//! Transport binding
//!
//! Wires a local transport's negotiation events to the controller. The
//! local engine raises `connect` once DTLS parameters are ready and
//! `produce` for every track publication; the handler answers each through a
//! single-use [`Callback`], so exactly one outcome reaches the engine.

use std::sync::Arc;

use async_trait::async_trait;
use cloudsfu_controller::{
    ConnectWebRtcTransportParams, ControllerApi, DtlsParameters, MediaKind, MediaProducerConfig,
    RtpParameters,
};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::engine::LocalTransport;
use crate::error::{EngineError, SessionError};
use crate::types::{ConnectionState, TransportDirection};

/// DTLS parameters generated locally that the SFU must confirm.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub dtls_parameters: DtlsParameters,
}

/// Negotiated publication the SFU must accept.
#[derive(Debug, Clone)]
pub struct ProduceRequest {
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    pub app_data: Option<Value>,
}

/// Single-use responder for an engine negotiation
///
/// `resolve` and `reject` consume the callback. Dropping it unanswered is
/// seen by the engine as [`EngineError::CallbackDropped`].
#[derive(Debug)]
pub struct Callback<T> {
    tx: oneshot::Sender<Result<T, SessionError>>,
}

/// Engine side of a [`Callback`].
#[derive(Debug)]
pub struct PendingCallback<T> {
    rx: oneshot::Receiver<Result<T, SessionError>>,
}

impl<T> Callback<T> {
    #[must_use]
    pub fn channel() -> (Self, PendingCallback<T>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, PendingCallback { rx })
    }

    pub fn resolve(self, value: T) {
        // The engine may have given up on the negotiation already
        let _ = self.tx.send(Ok(value));
    }

    pub fn reject(self, err: SessionError) {
        let _ = self.tx.send(Err(err));
    }
}

impl<T> PendingCallback<T> {
    /// Wait for the handler's answer.
    pub async fn outcome(self) -> Result<T, EngineError> {
        match self.rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(EngineError::Rejected(Box::new(err))),
            Err(_) => Err(EngineError::CallbackDropped),
        }
    }
}

/// Handlers for the events a local transport raises
#[async_trait]
pub trait TransportEventHandler: Send + Sync {
    async fn on_connect(&self, request: ConnectRequest, callback: Callback<()>);

    /// Answer with the remote producer id. Only raised on send transports.
    async fn on_produce(&self, request: ProduceRequest, callback: Callback<String>);

    /// Observability only.
    fn on_state_change(&self, state: ConnectionState);
}

/// Register `handler` for every negotiation event of `transport`.
pub fn bind_transport(transport: &dyn LocalTransport, handler: Arc<dyn TransportEventHandler>) {
    transport.set_event_handler(handler);
}

/// Production handler: forwards negotiations to the controller
pub struct ControllerBinding {
    controller: Arc<dyn ControllerApi>,
    router_id: String,
    transport_id: String,
    direction: TransportDirection,
    debug_logs: bool,
}

impl ControllerBinding {
    pub fn new(
        controller: Arc<dyn ControllerApi>,
        router_id: impl Into<String>,
        transport_id: impl Into<String>,
        direction: TransportDirection,
    ) -> Self {
        Self {
            controller,
            router_id: router_id.into(),
            transport_id: transport_id.into(),
            direction,
            debug_logs: false,
        }
    }

    #[must_use]
    pub fn with_debug_logs(mut self, enabled: bool) -> Self {
        self.debug_logs = enabled;
        self
    }
}

#[async_trait]
impl TransportEventHandler for ControllerBinding {
    async fn on_connect(&self, request: ConnectRequest, callback: Callback<()>) {
        let params = ConnectWebRtcTransportParams {
            dtls_parameters: request.dtls_parameters,
        };
        match self
            .controller
            .connect_webrtc_transport(&self.router_id, &self.transport_id, &params)
            .await
        {
            Ok(()) => {
                if self.debug_logs {
                    debug!(
                        router_id = %self.router_id,
                        transport_id = %self.transport_id,
                        "Transport connected"
                    );
                }
                callback.resolve(());
            }
            Err(e) => {
                warn!(
                    router_id = %self.router_id,
                    transport_id = %self.transport_id,
                    error = %e,
                    "Transport connect failed"
                );
                callback.reject(e.into());
            }
        }
    }

    async fn on_produce(&self, request: ProduceRequest, callback: Callback<String>) {
        if self.direction != TransportDirection::Send {
            callback.reject(SessionError::precondition(format!(
                "produce requested on {} transport {}",
                self.direction, self.transport_id
            )));
            return;
        }

        let config = MediaProducerConfig {
            id: None,
            transport_id: self.transport_id.clone(),
            kind: request.kind,
            rtp_parameters: request.rtp_parameters,
            paused: Some(false),
            key_frame_request_delay_in_ms: None,
        };
        match self
            .controller
            .create_media_producer(&self.router_id, &config)
            .await
        {
            Ok(snapshot) => callback.resolve(snapshot.id),
            Err(e) => {
                warn!(
                    router_id = %self.router_id,
                    transport_id = %self.transport_id,
                    kind = %config.kind,
                    error = %e,
                    "Producer creation failed"
                );
                callback.reject(e.into());
            }
        }
    }

    fn on_state_change(&self, state: ConnectionState) {
        if self.debug_logs {
            debug!(
                transport_id = %self.transport_id,
                direction = %self.direction,
                %state,
                "Transport state changed"
            );
        }
    }
}
