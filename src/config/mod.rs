//! Server configuration, read from flags with environment fallbacks.

use clap::Parser;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "fiesta-box", version, about = "Websocket room server for party games")]
pub struct ServerConfig {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Seconds between server pings on each connection
    #[arg(long, env = "PING_INTERVAL_SECS", default_value_t = 30)]
    pub ping_interval_secs: u64,

    /// How long an empty room is kept before it is reaped. 0 keeps empty rooms forever.
    #[arg(long, env = "EMPTY_ROOM_GRACE_SECS", default_value_t = 300)]
    pub empty_room_grace_secs: u64,

    /// Seconds between reaper sweeps
    #[arg(long, env = "REAP_INTERVAL_SECS", default_value_t = 60)]
    pub reap_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            ping_interval_secs: 30,
            empty_room_grace_secs: 300,
            reap_interval_secs: 60,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    /// `None` when reaping is disabled.
    pub fn empty_room_grace(&self) -> Option<Duration> {
        match self.empty_room_grace_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs.max(1))
    }
}
