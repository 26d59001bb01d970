//! CloudSFU controller HTTP client
//!
//! Thin typed wrapper over the controller's REST surface. Each method is
//! one request; non-2xx answers become [`ControllerError::RemoteRequestFailed`]
//! and a 204 is a successful empty result.

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header::CONTENT_TYPE, Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::api::ControllerApi;
use crate::config::ControllerConfig;
use crate::error::{bytes_with_limit, check_response, ControllerError};
use crate::types::{
    ConnectRouterParams, ConnectWebRtcTransportParams, DataConsumerConfig, DataConsumerIds,
    DataConsumerSnapshot, DataProducerConfig, DataProducerIds, DataProducerSnapshot,
    MediaConsumerConfig, MediaConsumerIds, MediaConsumerSnapshot, MediaProducerConfig,
    MediaProducerIds, MediaProducerSnapshot, RouterConfig, RouterIds, RouterSnapshot,
    SetMediaConsumerPreferredLayersParams, SetMediaConsumerPriorityParams, SfuHeartbeat, SfuList,
    WebRtcTransportConfig, WebRtcTransportIds, WebRtcTransportSnapshot,
};

/// Percent-encode `id` as a single path segment.
///
/// Empty, `.` and `..` identifiers have no segment form and are rejected.
fn segment(id: &str) -> Result<String, ControllerError> {
    let invalid = || ControllerError::InvalidUrl(format!("invalid resource identifier: {id:?}"));
    if matches!(id, "" | "." | "..") {
        return Err(invalid());
    }
    let mut scratch = Url::parse("http://segment.invalid/")?;
    scratch
        .path_segments_mut()
        .map_err(|()| invalid())?
        .pop_if_empty()
        .push(id);
    Ok(scratch.path().trim_start_matches('/').to_string())
}

/// Controller REST client
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ControllerClient {
    base_url: String,
    debug_logs: bool,
    client: Client,
}

impl ControllerClient {
    /// Build a client with its own connection pool from configuration.
    pub fn new(config: &ControllerConfig) -> Result<Self, ControllerError> {
        config.validate()?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self::with_client(config, client))
    }

    /// Build a client around an existing `reqwest::Client`.
    pub fn with_client(config: &ControllerConfig, client: Client) -> Self {
        Self {
            base_url: config.normalized_base_url().to_string(),
            debug_logs: config.enable_debug_logs,
            client,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub const fn debug_logs(&self) -> bool {
        self.debug_logs
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Perform one round trip. `Ok(None)` means the server answered 204.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Option<Bytes>, ControllerError> {
        if self.debug_logs {
            let body_text: Cow<'_, str> = body
                .as_deref()
                .map(String::from_utf8_lossy)
                .unwrap_or_default();
            debug!(%method, url, body = %body_text, "Controller request");
        }

        let mut request = self
            .client
            .request(method.clone(), url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            request = request.body(body);
        }

        let result = Self::round_trip(request).await;

        if self.debug_logs {
            match &result {
                Ok(Some(bytes)) => debug!(
                    %method,
                    url,
                    response = %String::from_utf8_lossy(bytes),
                    "Controller response"
                ),
                Ok(None) => debug!(%method, url, "Controller response: no content"),
                Err(e) => debug!(%method, url, error = %e, "Controller request failed"),
            }
        }

        result
    }

    async fn round_trip(request: RequestBuilder) -> Result<Option<Bytes>, ControllerError> {
        let response = check_response(request.send().await?).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        bytes_with_limit(response).await.map(Some)
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<T, ControllerError> {
        match self.send(method, url, body).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(ControllerError::EmptyResponse {
                url: url.to_string(),
            }),
        }
    }

    async fn request_void(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<(), ControllerError> {
        self.send(method, url, body).await.map(|_| ())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ControllerError> {
        self.request_json(Method::GET, &self.url(path), None).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ControllerError> {
        let body = serde_json::to_vec(body)?;
        self.request_json(Method::POST, &self.url(path), Some(body)).await
    }

    async fn post_void<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), ControllerError> {
        let body = body.map(serde_json::to_vec).transpose()?;
        self.request_void(Method::POST, &self.url(path), body).await
    }

    async fn delete_void(&self, path: &str) -> Result<(), ControllerError> {
        self.request_void(Method::DELETE, &self.url(path), None).await
    }

    // ------------------------------------------------------------------
    // SFU fleet (SFU-direct calls bypass the controller base URL)
    // ------------------------------------------------------------------

    pub async fn list_sfus(&self) -> Result<Vec<SfuHeartbeat>, ControllerError> {
        let list: SfuList = self.get_json("/sfus").await?;
        Ok(list.sfus)
    }

    pub async fn get_sfu(&self, sfu_id: &str) -> Result<Option<SfuHeartbeat>, ControllerError> {
        let sfus = self.list_sfus().await?;
        Ok(sfus.into_iter().find(|sfu| sfu.sfu_id == sfu_id))
    }

    /// Ask an SFU to stop accepting new routers.
    pub async fn drain_sfu(&self, sfu_endpoint: &str) -> Result<(), ControllerError> {
        let url = format!("http://{sfu_endpoint}/state/drain");
        self.request_void(Method::POST, &url, None).await
    }

    pub async fn undrain_sfu(&self, sfu_endpoint: &str) -> Result<(), ControllerError> {
        let url = format!("http://{sfu_endpoint}/state/undrain");
        self.request_void(Method::POST, &url, None).await
    }

    pub async fn get_sfu_config(&self, sfu_endpoint: &str) -> Result<Value, ControllerError> {
        let url = format!("http://{sfu_endpoint}/config");
        self.request_json(Method::GET, &url, None).await
    }

    /// Prometheus text exposition of an SFU.
    pub async fn get_sfu_metrics(&self, sfu_endpoint: &str) -> Result<String, ControllerError> {
        let url = format!("http://{sfu_endpoint}/metrics");
        let bytes = self.send(Method::GET, &url, None).await?.unwrap_or_default();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    // ------------------------------------------------------------------
    // Router links and stats
    // ------------------------------------------------------------------

    pub async fn connect_routers(
        &self,
        router_id: &str,
        remote_router_id: &str,
    ) -> Result<(), ControllerError> {
        let params = ConnectRouterParams {
            remote_router_id: remote_router_id.to_string(),
        };
        self.post_void(&format!("/routers/{}/connections", segment(router_id)?), Some(&params))
            .await
    }

    pub async fn disconnect_routers(
        &self,
        router_id: &str,
        remote_router_id: &str,
    ) -> Result<(), ControllerError> {
        let params = ConnectRouterParams {
            remote_router_id: remote_router_id.to_string(),
        };
        let url = self.url(&format!("/routers/{}/connections", segment(router_id)?));
        self.request_void(Method::DELETE, &url, Some(serde_json::to_vec(&params)?))
            .await
    }

    pub async fn get_router_stats(&self, router_id: &str) -> Result<Value, ControllerError> {
        self.get_json(&format!("/routers/{}/stats", segment(router_id)?)).await
    }

    // ------------------------------------------------------------------
    // Data producers / consumers
    // ------------------------------------------------------------------

    pub async fn list_data_producer_ids(&self, router_id: &str) -> Result<Vec<String>, ControllerError> {
        let ids: DataProducerIds = self
            .get_json(&format!("/routers/{}/data-producers", segment(router_id)?))
            .await?;
        Ok(ids.data_producer_ids)
    }

    pub async fn create_data_producer(
        &self,
        router_id: &str,
        config: &DataProducerConfig,
    ) -> Result<DataProducerSnapshot, ControllerError> {
        self.post_json(&format!("/routers/{}/data-producers", segment(router_id)?), config)
            .await
    }

    pub async fn get_data_producer(
        &self,
        router_id: &str,
        producer_id: &str,
    ) -> Result<DataProducerSnapshot, ControllerError> {
        self.get_json(&format!(
            "/routers/{}/data-producers/{}",
            segment(router_id)?,
            segment(producer_id)?
        ))
        .await
    }

    pub async fn delete_data_producer(&self, router_id: &str, producer_id: &str) -> Result<(), ControllerError> {
        self.delete_void(&format!(
            "/routers/{}/data-producers/{}",
            segment(router_id)?,
            segment(producer_id)?
        ))
        .await
    }

    pub async fn list_data_consumer_ids(&self, router_id: &str) -> Result<Vec<String>, ControllerError> {
        let ids: DataConsumerIds = self
            .get_json(&format!("/routers/{}/data-consumers", segment(router_id)?))
            .await?;
        Ok(ids.data_consumer_ids)
    }

    pub async fn create_data_consumer(
        &self,
        router_id: &str,
        config: &DataConsumerConfig,
    ) -> Result<DataConsumerSnapshot, ControllerError> {
        self.post_json(&format!("/routers/{}/data-consumers", segment(router_id)?), config)
            .await
    }

    pub async fn get_data_consumer(
        &self,
        router_id: &str,
        consumer_id: &str,
    ) -> Result<DataConsumerSnapshot, ControllerError> {
        self.get_json(&format!(
            "/routers/{}/data-consumers/{}",
            segment(router_id)?,
            segment(consumer_id)?
        ))
        .await
    }

    pub async fn delete_data_consumer(&self, router_id: &str, consumer_id: &str) -> Result<(), ControllerError> {
        self.delete_void(&format!(
            "/routers/{}/data-consumers/{}",
            segment(router_id)?,
            segment(consumer_id)?
        ))
        .await
    }
}

#[async_trait]
impl ControllerApi for ControllerClient {
    async fn list_router_ids(&self) -> Result<Vec<String>, ControllerError> {
        let ids: RouterIds = self.get_json("/routers").await?;
        Ok(ids.router_ids)
    }

    async fn create_router(&self, config: &RouterConfig) -> Result<RouterSnapshot, ControllerError> {
        let router: RouterSnapshot = self.post_json("/routers", config).await?;
        if self.debug_logs {
            debug!(router_id = %router.id, region = %router.region, "Router created");
        }
        Ok(router)
    }

    async fn get_router(&self, router_id: &str) -> Result<RouterSnapshot, ControllerError> {
        self.get_json(&format!("/routers/{}", segment(router_id)?)).await
    }

    async fn delete_router(&self, router_id: &str) -> Result<(), ControllerError> {
        self.delete_void(&format!("/routers/{}", segment(router_id)?)).await
    }

    async fn list_webrtc_transport_ids(&self, router_id: &str) -> Result<Vec<String>, ControllerError> {
        let ids: WebRtcTransportIds = self
            .get_json(&format!("/routers/{}/webrtc-transports", segment(router_id)?))
            .await?;
        Ok(ids.webrtc_transport_ids)
    }

    async fn create_webrtc_transport(
        &self,
        router_id: &str,
        config: &WebRtcTransportConfig,
    ) -> Result<WebRtcTransportSnapshot, ControllerError> {
        self.post_json(&format!("/routers/{}/webrtc-transports", segment(router_id)?), config)
            .await
    }

    async fn get_webrtc_transport(
        &self,
        router_id: &str,
        transport_id: &str,
    ) -> Result<WebRtcTransportSnapshot, ControllerError> {
        self.get_json(&format!(
            "/routers/{}/webrtc-transports/{}",
            segment(router_id)?,
            segment(transport_id)?
        ))
        .await
    }

    async fn delete_webrtc_transport(
        &self,
        router_id: &str,
        transport_id: &str,
    ) -> Result<(), ControllerError> {
        self.delete_void(&format!(
            "/routers/{}/webrtc-transports/{}",
            segment(router_id)?,
            segment(transport_id)?
        ))
        .await
    }

    async fn connect_webrtc_transport(
        &self,
        router_id: &str,
        transport_id: &str,
        params: &ConnectWebRtcTransportParams,
    ) -> Result<(), ControllerError> {
        self.post_void(
            &format!(
                "/routers/{}/webrtc-transports/{}/connect",
                segment(router_id)?,
                segment(transport_id)?
            ),
            Some(params),
        )
        .await
    }

    async fn list_media_producer_ids(&self, router_id: &str) -> Result<Vec<String>, ControllerError> {
        let ids: MediaProducerIds = self
            .get_json(&format!("/routers/{}/media-producers", segment(router_id)?))
            .await?;
        Ok(ids.media_producer_ids)
    }

    async fn create_media_producer(
        &self,
        router_id: &str,
        config: &MediaProducerConfig,
    ) -> Result<MediaProducerSnapshot, ControllerError> {
        self.post_json(&format!("/routers/{}/media-producers", segment(router_id)?), config)
            .await
    }

    async fn get_media_producer(
        &self,
        router_id: &str,
        producer_id: &str,
    ) -> Result<MediaProducerSnapshot, ControllerError> {
        self.get_json(&format!(
            "/routers/{}/media-producers/{}",
            segment(router_id)?,
            segment(producer_id)?
        ))
        .await
    }

    async fn delete_media_producer(&self, router_id: &str, producer_id: &str) -> Result<(), ControllerError> {
        self.delete_void(&format!(
            "/routers/{}/media-producers/{}",
            segment(router_id)?,
            segment(producer_id)?
        ))
        .await
    }

    async fn pause_media_producer(&self, router_id: &str, producer_id: &str) -> Result<(), ControllerError> {
        self.post_void::<()>(
            &format!(
                "/routers/{}/media-producers/{}/pause",
                segment(router_id)?,
                segment(producer_id)?
            ),
            None,
        )
        .await
    }

    async fn resume_media_producer(&self, router_id: &str, producer_id: &str) -> Result<(), ControllerError> {
        self.post_void::<()>(
            &format!(
                "/routers/{}/media-producers/{}/resume",
                segment(router_id)?,
                segment(producer_id)?
            ),
            None,
        )
        .await
    }

    async fn list_media_consumer_ids(&self, router_id: &str) -> Result<Vec<String>, ControllerError> {
        let ids: MediaConsumerIds = self
            .get_json(&format!("/routers/{}/media-consumers", segment(router_id)?))
            .await?;
        Ok(ids.media_consumer_ids)
    }

    async fn create_media_consumer(
        &self,
        router_id: &str,
        config: &MediaConsumerConfig,
    ) -> Result<MediaConsumerSnapshot, ControllerError> {
        self.post_json(&format!("/routers/{}/media-consumers", segment(router_id)?), config)
            .await
    }

    async fn get_media_consumer(
        &self,
        router_id: &str,
        consumer_id: &str,
    ) -> Result<MediaConsumerSnapshot, ControllerError> {
        self.get_json(&format!(
            "/routers/{}/media-consumers/{}",
            segment(router_id)?,
            segment(consumer_id)?
        ))
        .await
    }

    async fn delete_media_consumer(&self, router_id: &str, consumer_id: &str) -> Result<(), ControllerError> {
        self.delete_void(&format!(
            "/routers/{}/media-consumers/{}",
            segment(router_id)?,
            segment(consumer_id)?
        ))
        .await
    }

    async fn pause_media_consumer(&self, router_id: &str, consumer_id: &str) -> Result<(), ControllerError> {
        self.post_void::<()>(
            &format!(
                "/routers/{}/media-consumers/{}/pause",
                segment(router_id)?,
                segment(consumer_id)?
            ),
            None,
        )
        .await
    }

    async fn resume_media_consumer(&self, router_id: &str, consumer_id: &str) -> Result<(), ControllerError> {
        self.post_void::<()>(
            &format!(
                "/routers/{}/media-consumers/{}/resume",
                segment(router_id)?,
                segment(consumer_id)?
            ),
            None,
        )
        .await
    }

    async fn set_media_consumer_preferred_layers(
        &self,
        router_id: &str,
        consumer_id: &str,
        params: &SetMediaConsumerPreferredLayersParams,
    ) -> Result<(), ControllerError> {
        self.post_void(
            &format!(
                "/routers/{}/media-consumers/{}/set-preferred-layers",
                segment(router_id)?,
                segment(consumer_id)?
            ),
            Some(params),
        )
        .await
    }

    async fn set_media_consumer_priority(
        &self,
        router_id: &str,
        consumer_id: &str,
        params: &SetMediaConsumerPriorityParams,
    ) -> Result<(), ControllerError> {
        self.post_void(
            &format!(
                "/routers/{}/media-consumers/{}/set-priority",
                segment(router_id)?,
                segment(consumer_id)?
            ),
            Some(params),
        )
        .await
    }

    async fn unset_media_consumer_priority(
        &self,
        router_id: &str,
        consumer_id: &str,
    ) -> Result<(), ControllerError> {
        self.post_void::<()>(
            &format!(
                "/routers/{}/media-consumers/{}/unset-priority",
                segment(router_id)?,
                segment(consumer_id)?
            ),
            None,
        )
        .await
    }

    async fn request_media_consumer_key_frame(
        &self,
        router_id: &str,
        consumer_id: &str,
    ) -> Result<(), ControllerError> {
        self.post_void::<()>(
            &format!(
                "/routers/{}/media-consumers/{}/request-key-frame",
                segment(router_id)?,
                segment(consumer_id)?
            ),
            None,
        )
        .await
    }
}
