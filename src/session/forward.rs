/// Per-session bidirectional forwarding flows.
///
/// Mirrors `ForwardClientMsg`/`ForwardServerMsg` from the original
/// implementation: the client→server flow runs a three-state
/// START/HEADER/BODY machine so it can make a filtering decision per wire
/// protocol packet, while the server→client flow is a plain byte pump.
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use socket2::SockRef;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Notify};

use crate::filter::Filter;
use crate::protocol::{MessageHeader, OpCode, RingBuffer, STANDARD_HEADER_SIZE};

const SCRATCH_BUFFER_SIZE: usize = 64 * 1024;

enum ClientState {
    Start,
    Header,
    Body { op: OpCode, remain: i64 },
}

/// Shared per-session teardown bookkeeping. Both flows decrement `running`
/// on exit and fully close both sockets, so whichever flow notices a
/// problem first (EOF, filter block, shutdown request) wakes the other.
pub(super) struct FlowGuard {
    running: AtomicU8,
    completed: Notify,
    client: Arc<TcpStream>,
    server: Arc<TcpStream>,
}

impl FlowGuard {
    pub(super) fn new(client: Arc<TcpStream>, server: Arc<TcpStream>) -> Self {
        Self {
            running: AtomicU8::new(2),
            completed: Notify::new(),
            client,
            server,
        }
    }

    /// Close both sockets fully (not just shutdown-write), so the sibling
    /// flow's blocked read fails and it exits too. Double close is fine.
    fn close_both(&self) {
        let _ = SockRef::from(&*self.client).shutdown(std::net::Shutdown::Both);
        let _ = SockRef::from(&*self.server).shutdown(std::net::Shutdown::Both);
    }

    fn flow_done(&self) {
        self.close_both();
        if self.running.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.completed.notify_waiters();
        }
    }

    pub(super) async fn wait(&self) {
        while self.running.load(Ordering::SeqCst) > 0 {
            self.completed.notified().await;
        }
    }
}

pub(super) async fn run_client_to_server(
    sid: i64,
    client: Arc<TcpStream>,
    server: Arc<TcpStream>,
    filter: Filter,
    mut shutdown_rx: oneshot::Receiver<()>,
    guard: Arc<FlowGuard>,
) {
    let mut buffer = RingBuffer::default();
    let mut state = ClientState::Start;

    loop {
        let want = match &state {
            ClientState::Start => {
                buffer.reset_cursor();
                buffer.remain_space()
            }
            ClientState::Header => buffer.remain_space(),
            ClientState::Body { remain, .. } => {
                buffer.reset_cursor();
                (*remain as usize).min(buffer.remain_space())
            }
        };

        if want == 0 {
            // remain == 0: packet fully forwarded, start the next one.
            state = ClientState::Start;
            continue;
        }

        let read_result = tokio::select! {
            _ = &mut shutdown_rx => {
                log::debug!("session {} client flow received shutdown signal", sid);
                break;
            }
            result = (&*client).read(buffer.limited_cursor(want)) => result,
        };

        let n = match read_result {
            Ok(0) => {
                log::debug!("session {} client connection closed", sid);
                break;
            }
            Ok(n) => n,
            Err(e) => {
                log::debug!("session {} client read failed: {}", sid, e);
                break;
            }
        };

        buffer.forward_cursor(n);

        state = match state {
            ClientState::Start | ClientState::Header => {
                if buffer.data().len() < STANDARD_HEADER_SIZE {
                    ClientState::Header
                } else {
                    let header = MessageHeader::parse(buffer.data());
                    ClientState::Body {
                        op: header.op_code,
                        // The full claimed message length, header included:
                        // the header bytes (and any body bytes that arrived
                        // in the same read) still need forwarding below.
                        remain: header.message_length as i64,
                    }
                }
            }
            // Already in BODY; the length accounting happens uniformly
            // below, after the filter check and the write.
            other @ ClientState::Body { .. } => other,
        };

        let current_op = match &state {
            ClientState::Body { op, .. } => *op,
            _ => continue, // still accumulating the header
        };

        if filter.filter_enabled() && filter.is_dirty_event(current_op) {
            filter.enqueue_dirty_event();
        }

        if filter.filter_enabled() && !filter.pass_filter(current_op) {
            log::warn!(
                "session {} blocked a {:?} packet, closing session",
                sid,
                current_op
            );
            break;
        }

        if let Err(e) = (&*server).write_all(buffer.data()).await {
            log::debug!("session {} write to backend failed: {}", sid, e);
            break;
        }

        if let ClientState::Body { remain, .. } = &mut state {
            *remain -= buffer.data().len() as i64;
            if *remain < 0 {
                // Peer claimed a larger message_length than it actually sent.
                *remain = 0;
            }
        }
    }

    guard.flow_done();
}

pub(super) async fn run_server_to_client(
    sid: i64,
    client: Arc<TcpStream>,
    server: Arc<TcpStream>,
    mut shutdown_rx: oneshot::Receiver<()>,
    guard: Arc<FlowGuard>,
) {
    let mut scratch = vec![0u8; SCRATCH_BUFFER_SIZE];

    loop {
        let read_result = tokio::select! {
            _ = &mut shutdown_rx => {
                log::debug!("session {} server flow received shutdown signal", sid);
                break;
            }
            result = (&*server).read(&mut scratch) => result,
        };

        let n = match read_result {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                log::debug!("session {} backend read failed: {}", sid, e);
                break;
            }
        };

        if let Err(e) = (&*client).write_all(&scratch[..n]).await {
            log::debug!("session {} write to client failed: {}", sid, e);
            break;
        }
    }

    guard.flow_done();
}
