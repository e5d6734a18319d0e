//! Signaling relay configuration (client and server side).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// WebSocket URL clients connect to.
    pub url: String,
    /// Port the relay server listens on.
    pub port: u32,
    pub connect_timeout_secs: u32,
    pub reconnect_delay_secs: u32,
    pub max_reconnect_delay_secs: u32,
    /// How long the server waits for a client's join hello.
    pub hello_timeout_secs: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080".into(),
            port: 8080,
            connect_timeout_secs: 15,
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
            hello_timeout_secs: 10,
        }
    }
}
