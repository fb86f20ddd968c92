/// Session lifecycle: a session pairs a client socket with a backend
/// socket and owns the two forwarding flows between them.
mod forward;
pub mod manager;

use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::filter::Filter;
use forward::FlowGuard;

pub use manager::SessionManager;

/// A client↔backend connection pair plus its two forwarding flows.
///
/// Mirrors `ProxySessionImpl` from the original implementation: `sid` is
/// stable across recycling, `running`/completion bookkeeping lives in
/// [`forward::FlowGuard`], and `process` spawns the two flows fresh each
/// time a session (new or recycled) starts serving a connection.
pub struct Session {
    sid: i64,
    client_shutdown_tx: Option<oneshot::Sender<()>>,
    server_shutdown_tx: Option<oneshot::Sender<()>>,
    guard: Option<Arc<FlowGuard>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    fn new(sid: i64) -> Self {
        Self {
            sid,
            client_shutdown_tx: None,
            server_shutdown_tx: None,
            guard: None,
            tasks: Vec::new(),
        }
    }

    pub fn sid(&self) -> i64 {
        self.sid
    }

    /// Spawn the two forwarding flows for a (possibly recycled) session,
    /// plus a reaper that reports the session idle to `manager` once both
    /// flows have exited.
    pub fn process(
        &mut self,
        client: TcpStream,
        server: TcpStream,
        filter: Filter,
        manager: SessionManager,
    ) {
        let client = Arc::new(client);
        let server = Arc::new(server);
        let guard = Arc::new(FlowGuard::new(Arc::clone(&client), Arc::clone(&server)));

        let (client_tx, client_rx) = oneshot::channel();
        let (server_tx, server_rx) = oneshot::channel();
        self.client_shutdown_tx = Some(client_tx);
        self.server_shutdown_tx = Some(server_tx);
        self.guard = Some(Arc::clone(&guard));

        let client_task = tokio::spawn(forward::run_client_to_server(
            self.sid,
            Arc::clone(&client),
            Arc::clone(&server),
            filter,
            client_rx,
            Arc::clone(&guard),
        ));
        let server_task = tokio::spawn(forward::run_server_to_client(
            self.sid,
            client,
            server,
            server_rx,
            Arc::clone(&guard),
        ));

        let sid = self.sid;
        let reaper = tokio::spawn(async move {
            guard.wait().await;
            manager.mark_idle(sid).await;
        });

        self.tasks = vec![client_task, server_task, reaper];
    }

    /// Reset to a pristine state so the session can be reused for a new
    /// connection pair. Any still-running flows from a previous use are
    /// expected to have already finished (the manager only recycles idle
    /// sessions).
    fn reset(&mut self) {
        self.client_shutdown_tx = None;
        self.server_shutdown_tx = None;
        self.guard = None;
        self.tasks.clear();
    }

    /// Ask both flows to stop, then wait for them to actually finish.
    pub async fn wait_for_finish(&mut self) {
        if let Some(tx) = self.client_shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(tx) = self.server_shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(guard) = &self.guard {
            guard.wait().await;
        }

        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}
