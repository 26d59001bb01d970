//! CloudSFU controller client
//!
//! Typed REST client for the remote SFU controller. Routers, WebRTC
//! transports, media producers and consumers are remote resources addressed
//! by identifier; this crate turns each resource verb into one HTTP round
//! trip and each payload into a serde type.
//!
//! ## Layout
//!
//! - **`types`**: wire contracts (configs, snapshots, RTP/ICE/DTLS values)
//! - **`ControllerApi`**: the operations a client session depends on
//! - **`ControllerClient`**: reqwest implementation, plus SFU fleet and
//!   data-channel endpoints
//! - **`ControllerConfig`**: base URL, debug logging flag, timeouts
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cloudsfu_controller::{ControllerApi, ControllerClient, ControllerConfig, RouterConfig};
//!
//! let client = ControllerClient::new(&ControllerConfig::new("http://controller:8080"))?;
//! let router = client.create_router(&RouterConfig::default()).await?;
//! client.delete_router(&router.id).await?;
//! ```

mod api;
mod client;
mod config;
pub mod error;
pub mod types;

pub use api::ControllerApi;
pub use client::ControllerClient;
pub use config::ControllerConfig;
pub use error::ControllerError;
pub use types::*;
