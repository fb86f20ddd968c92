/// Allocates, recycles, and tracks proxy sessions.
///
/// Mirrors `ProxySessionManagerImpl` from the original implementation,
/// including a faithfully-preserved quirk: [`SessionManager::wait_all_finish`]
/// only waits on sessions that are idle *at the moment it is called*, not
/// sessions still actively forwarding traffic. See `DESIGN.md` for why this
/// is kept as-is rather than "fixed".
use std::sync::Arc;

use fnv::FnvHashMap;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use super::Session;
use crate::filter::Filter;

struct Inner {
    active: FnvHashMap<i64, Session>,
    idle: FnvHashMap<i64, Session>,
    next_sid: i64,
}

/// Cheap to clone: every session holds one, to report itself idle when its
/// flows finish.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Mutex<Inner>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                active: FnvHashMap::default(),
                idle: FnvHashMap::default(),
                next_sid: 1,
            })),
        }
    }

    /// Take a session from the idle pool and reset it, or allocate a fresh
    /// one. Spawns its forwarding flows and registers it as active.
    pub async fn new_session(&self, client: TcpStream, server: TcpStream, filter: Filter) -> i64 {
        let mut inner = self.inner.lock().await;

        let mut session = if let Some(sid) = inner.idle.keys().next().copied() {
            let mut session = inner.idle.remove(&sid).expect("sid present");
            session.reset();
            session
        } else {
            let sid = inner.next_sid;
            inner.next_sid += 1;
            Session::new(sid)
        };

        let sid = session.sid();
        session.process(client, server, filter, self.clone());
        inner.active.insert(sid, session);
        sid
    }

    /// Move a session from active to idle. Called by a session's own reaper
    /// task once both of its forwarding flows have exited.
    pub async fn mark_idle(&self, sid: i64) {
        let mut inner = self.inner.lock().await;
        if let Some(session) = inner.active.remove(&sid) {
            inner.idle.insert(sid, session);
        }
    }

    /// Wait for every session that is idle *right now* to finish. Sessions
    /// that are still active are neither signaled nor waited on here.
    pub async fn wait_all_finish(&self) {
        let snapshot: Vec<Session> = {
            let mut inner = self.inner.lock().await;
            inner.idle.drain().map(|(_, session)| session).collect()
        };

        for mut session in snapshot {
            session.wait_for_finish().await;
        }
    }

    pub async fn active_count(&self) -> usize {
        self.inner.lock().await.active.len()
    }

    pub async fn idle_count(&self) -> usize {
        self.inner.lock().await.idle.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FilterConfig, MongoDBConfig};
    use tokio::net::TcpListener;

    fn disabled_filter() -> Filter {
        Filter::new(
            FilterConfig {
                enabled: false,
                base_dir: String::new(),
                quota_files: 0,
                quota_data_size_mb: 0,
            },
            MongoDBConfig {
                host: "127.0.0.1".to_string(),
                port: 27017,
                dbname: "test".to_string(),
                user: String::new(),
                pass: String::new(),
            },
        )
    }

    async fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = TcpStream::connect(addr);
        let (accept_result, connect_result) = tokio::join!(listener.accept(), connect);
        (connect_result.unwrap(), accept_result.unwrap().0)
    }

    #[tokio::test]
    async fn test_session_recycling_keeps_single_session() {
        let manager = SessionManager::new();

        for _ in 0..3 {
            let (client, server) = connected_pair().await;
            let sid = manager.new_session(client, server, disabled_filter()).await;
            manager.mark_idle(sid).await;
        }

        assert_eq!(manager.active_count().await, 0);
        assert_eq!(manager.idle_count().await, 1);
    }

    #[tokio::test]
    async fn test_wait_all_finish_only_touches_idle_sessions() {
        let manager = SessionManager::new();

        let (client, server) = connected_pair().await;
        let active_sid = manager.new_session(client, server, disabled_filter()).await;

        let (client2, server2) = connected_pair().await;
        let idle_sid = manager.new_session(client2, server2, disabled_filter()).await;
        manager.mark_idle(idle_sid).await;

        manager.wait_all_finish().await;

        assert_eq!(manager.idle_count().await, 0);
        assert_eq!(manager.active_count().await, 1);
        manager.mark_idle(active_sid).await;
    }
}
