//! CloudSFU client session
//!
//! Orchestrates the remote resources one participant uses on a CloudSFU
//! controller: a router, a send and a recv WebRTC transport, and the media
//! producers and consumers on them. Local media-engine handles are kept
//! consistent with their remote counterparts, and teardown releases both
//! sides in dependency order.
//!
//! ## Architecture
//!
//! - **`MediaSession`**: state machine over one router and its transports
//! - **`TransportHandle`**, **`MediaProducer`**, **`MediaConsumer`**: local
//!   handles whose close deletes the remote resource exactly once
//! - **`TransportEventHandler`** / **`ControllerBinding`**: answers the
//!   engine's connect and produce negotiations through the controller
//! - **`Device`** and friends: the external media engine, as traits
//! - **`CleanupReport`**: outcome of the best-effort teardown
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cloudsfu_session::{MediaSession, ProduceOptions, SessionOptions};
//!
//! let session = MediaSession::new(controller, device_factory, SessionOptions::default());
//! session.create_router(None).await?;
//! session.create_send_transport(None).await?;
//! let producer = session.create_media_producer(ProduceOptions::new(track)).await?;
//!
//! // On teardown
//! let report = session.cleanup().await;
//! ```

mod binding;
mod cleanup;
mod config;
mod consumer;
mod engine;
mod error;
mod producer;
mod registry;
mod session;
mod transport;
mod types;

pub use binding::{
    bind_transport, Callback, ConnectRequest, ControllerBinding, PendingCallback, ProduceRequest,
    TransportEventHandler,
};
pub use cleanup::{CleanupReport, CleanupStep};
pub use config::SessionOptions;
pub use consumer::MediaConsumer;
pub use engine::{
    CloseCallback, ConsumeOptions, Device, DeviceFactory, LocalConsumer, LocalProducer,
    LocalTrack, LocalTransport, ProduceOptions, TransportOptions,
};
pub use error::{CleanupStepFailed, EngineError, SessionError};
pub use producer::MediaProducer;
pub use registry::Registry;
pub use session::{MediaSession, SessionEvent};
pub use transport::TransportHandle;
pub use types::{ConnectionState, IceTransportPolicy, SessionState, TransportDirection};
