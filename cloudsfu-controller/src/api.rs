//! Controller API seam
//!
//! `ControllerApi` is the set of controller operations a client session
//! needs. [`crate::ControllerClient`] implements it over HTTP; tests and
//! alternative transports can supply their own implementation.

use async_trait::async_trait;

use crate::error::ControllerError;
use crate::types::{
    ConnectWebRtcTransportParams, MediaConsumerConfig, MediaConsumerSnapshot, MediaProducerConfig,
    MediaProducerSnapshot, RouterConfig, RouterSnapshot, SetMediaConsumerPreferredLayersParams,
    SetMediaConsumerPriorityParams, WebRtcTransportConfig, WebRtcTransportSnapshot,
};

/// One method per remote resource verb. Every call is a single round trip:
/// no retries, no caching.
#[async_trait]
pub trait ControllerApi: Send + Sync {
    // Routers
    async fn list_router_ids(&self) -> Result<Vec<String>, ControllerError>;
    async fn create_router(&self, config: &RouterConfig) -> Result<RouterSnapshot, ControllerError>;
    async fn get_router(&self, router_id: &str) -> Result<RouterSnapshot, ControllerError>;
    async fn delete_router(&self, router_id: &str) -> Result<(), ControllerError>;

    // WebRTC transports
    async fn list_webrtc_transport_ids(&self, router_id: &str) -> Result<Vec<String>, ControllerError>;
    async fn create_webrtc_transport(
        &self,
        router_id: &str,
        config: &WebRtcTransportConfig,
    ) -> Result<WebRtcTransportSnapshot, ControllerError>;
    async fn get_webrtc_transport(
        &self,
        router_id: &str,
        transport_id: &str,
    ) -> Result<WebRtcTransportSnapshot, ControllerError>;
    async fn delete_webrtc_transport(
        &self,
        router_id: &str,
        transport_id: &str,
    ) -> Result<(), ControllerError>;
    async fn connect_webrtc_transport(
        &self,
        router_id: &str,
        transport_id: &str,
        params: &ConnectWebRtcTransportParams,
    ) -> Result<(), ControllerError>;

    // Media producers
    async fn list_media_producer_ids(&self, router_id: &str) -> Result<Vec<String>, ControllerError>;
    async fn create_media_producer(
        &self,
        router_id: &str,
        config: &MediaProducerConfig,
    ) -> Result<MediaProducerSnapshot, ControllerError>;
    async fn get_media_producer(
        &self,
        router_id: &str,
        producer_id: &str,
    ) -> Result<MediaProducerSnapshot, ControllerError>;
    async fn delete_media_producer(&self, router_id: &str, producer_id: &str) -> Result<(), ControllerError>;
    async fn pause_media_producer(&self, router_id: &str, producer_id: &str) -> Result<(), ControllerError>;
    async fn resume_media_producer(&self, router_id: &str, producer_id: &str) -> Result<(), ControllerError>;

    // Media consumers
    async fn list_media_consumer_ids(&self, router_id: &str) -> Result<Vec<String>, ControllerError>;
    async fn create_media_consumer(
        &self,
        router_id: &str,
        config: &MediaConsumerConfig,
    ) -> Result<MediaConsumerSnapshot, ControllerError>;
    async fn get_media_consumer(
        &self,
        router_id: &str,
        consumer_id: &str,
    ) -> Result<MediaConsumerSnapshot, ControllerError>;
    async fn delete_media_consumer(&self, router_id: &str, consumer_id: &str) -> Result<(), ControllerError>;
    async fn pause_media_consumer(&self, router_id: &str, consumer_id: &str) -> Result<(), ControllerError>;
    async fn resume_media_consumer(&self, router_id: &str, consumer_id: &str) -> Result<(), ControllerError>;
    async fn set_media_consumer_preferred_layers(
        &self,
        router_id: &str,
        consumer_id: &str,
        params: &SetMediaConsumerPreferredLayersParams,
    ) -> Result<(), ControllerError>;
    async fn set_media_consumer_priority(
        &self,
        router_id: &str,
        consumer_id: &str,
        params: &SetMediaConsumerPriorityParams,
    ) -> Result<(), ControllerError>;
    async fn unset_media_consumer_priority(
        &self,
        router_id: &str,
        consumer_id: &str,
    ) -> Result<(), ControllerError>;
    async fn request_media_consumer_key_frame(
        &self,
        router_id: &str,
        consumer_id: &str,
    ) -> Result<(), ControllerError>;
}
