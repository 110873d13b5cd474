//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};

/// Default bind address.
pub const DEFAULT_BIND_ADDRESS: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
    8090,
);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Shared secret for the admin routes. `None` leaves them unmounted.
    pub admin_token: Option<String>,

    /// Enable per-request logging.
    pub request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS,
            admin_token: None,
            request_logging: true,
        }
    }
}

impl ServerConfig {
    /// Create a new server config with an optional admin token.
    pub fn new(admin_token: Option<String>) -> Self {
        Self {
            admin_token,
            ..Default::default()
        }
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Enable or disable request logging.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }
}
