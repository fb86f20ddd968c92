/// Guardia - A storage-quota-aware TCP proxy for the MongoDB wire protocol
///
/// Guardia sits between a MongoDB client and a MongoDB server, forwarding
/// wire protocol traffic byte-for-byte while enforcing storage quota
/// admission control: once the backing database crosses a configured
/// data-size or on-disk file-count limit, mutating operations (inserts,
/// updates) are blocked while queries and replies continue to flow.
pub mod config;
pub mod error;
pub mod filter;
pub mod net;
pub mod protocol;
pub mod server;
pub mod session;

use crate::config::Config;
use crate::error::GuardiaResult;
use crate::server::ProxyServer;

/// Top-level handle for running the proxy, analogous to the teacher's
/// `Puerta` struct: owns the validated configuration and hands off to the
/// proxy server for the actual accept loop.
pub struct Guardia {
    config: Config,
}

impl Guardia {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the proxy until a shutdown signal is received.
    pub async fn run(self) -> GuardiaResult<()> {
        let server = ProxyServer::new(self.config);
        server.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guardia_wraps_default_config() {
        let config = Config::default();
        let guardia = Guardia::new(config.clone());
        assert_eq!(guardia.config().server.listen_addr, config.server.listen_addr);
    }
}
