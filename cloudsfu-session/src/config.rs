//! Session configuration

use cloudsfu_controller::{RouterConfig, TransportProtocol};
use serde::{Deserialize, Serialize};

use crate::types::IceTransportPolicy;

/// Session options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Router configuration used when `create_router` is called without one
    pub router_config: RouterConfig,
    /// Transport protocols requested when a transport is created without a config
    pub allowed_protocols: Vec<TransportProtocol>,
    /// ICE policy passed to the local engine for every transport
    pub ice_transport_policy: IceTransportPolicy,
    /// Log lifecycle details (transport state changes, creations) at debug level
    pub debug_logs: bool,
    /// Capacity of the session event channel
    pub event_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            router_config: RouterConfig::default(),
            allowed_protocols: vec![TransportProtocol::Udp, TransportProtocol::Tcp],
            ice_transport_policy: IceTransportPolicy::Relay,
            debug_logs: false,
            event_capacity: 64,
        }
    }
}

impl SessionOptions {
    #[must_use]
    pub fn with_debug_logs(mut self, enabled: bool) -> Self {
        self.debug_logs = enabled;
        self
    }
}
