/// Proxy server: accept loop, backend dial, shutdown orchestration.
///
/// Mirrors the lifecycle of the original implementation's `main` loop
/// (`asyncAcceptTCP` wrapped accept, fixed dial timeout, SIGTERM-driven
/// drain) built on top of the session/filter machinery.
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::timeout;

use crate::config::Config;
use crate::error::{GuardiaError, GuardiaResult};
use crate::filter::Filter;
use crate::session::SessionManager;

/// How long `accept()` is allowed to block before the loop re-checks the
/// shutdown signal.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// How long dialing the backend is allowed to take.
const BACKEND_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ProxyServer {
    config: Config,
    filter: Filter,
    sessions: SessionManager,
}

impl ProxyServer {
    pub fn new(config: Config) -> Self {
        let filter = Filter::new(config.filter.clone(), config.mongodb.clone());
        Self {
            config,
            filter,
            sessions: SessionManager::new(),
        }
    }

    /// Bind, accept connections until a shutdown signal arrives, then drain
    /// idle sessions and stop the quota monitors.
    pub async fn run(&self) -> GuardiaResult<()> {
        let listener = TcpListener::bind(&self.config.server.listen_addr)
            .await
            .map_err(GuardiaError::Network)?;
        log::info!("listening on {}", self.config.server.listen_addr);

        self.filter.start_storage_monitor().await;

        let mut sigterm = signal(SignalKind::terminate()).map_err(GuardiaError::Network)?;
        let mut sigint = signal(SignalKind::interrupt()).map_err(GuardiaError::Network)?;

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    log::info!("received SIGTERM, shutting down");
                    break;
                }
                _ = sigint.recv() => {
                    log::info!("received SIGINT, shutting down");
                    break;
                }
                accept_result = timeout(ACCEPT_POLL_INTERVAL, listener.accept()) => {
                    match accept_result {
                        Ok(Ok((client_stream, peer_addr))) => {
                            log::debug!("accepted connection from {}", peer_addr);
                            self.handle_accept(client_stream).await;
                        }
                        Ok(Err(e)) => {
                            log::warn!("accept failed: {}", e);
                        }
                        Err(_elapsed) => {
                            // No connection within the poll interval; loop
                            // around to re-check the shutdown signals.
                        }
                    }
                }
            }
        }

        log::info!("waiting for idle sessions to finish");
        self.sessions.wait_all_finish().await;
        self.filter.wait_for_finish().await;
        log::info!("shutdown complete");

        Ok(())
    }

    async fn handle_accept(&self, client_stream: TcpStream) {
        let backend_addr = self.config.mongodb.backend_addr();

        let server_stream = match timeout(BACKEND_DIAL_TIMEOUT, TcpStream::connect(&backend_addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                log::warn!("failed to dial backend {}: {}", backend_addr, e);
                return;
            }
            Err(_elapsed) => {
                log::warn!("timed out dialing backend {}", backend_addr);
                return;
            }
        };

        let _ = client_stream.set_nodelay(true);
        let _ = server_stream.set_nodelay(true);

        let sid = self
            .sessions
            .new_session(client_stream, server_stream, self.filter.clone())
            .await;
        log::debug!("session {} handed off", sid);
    }
}
