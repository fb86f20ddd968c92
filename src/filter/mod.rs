/// Storage quota filter: soft, lock-free admission control for mutating
/// MongoDB wire protocol operations, backed by two background monitors.
pub mod data_size;
pub mod file_count;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{FilterConfig as FilterSettings, MongoDBConfig};
use crate::protocol::OpCode;

/// An event pushed onto the data-size monitor's dirty-event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyEvent {
    Dirty,
    Stop,
}

/// Capacity of the dirty-event channel: bursts of mutations coalesce into a
/// single `dbStats` query rather than one query per write.
const DIRTY_EVENT_CHANNEL_CAPACITY: usize = 100;

/// Shared quota-admission state, consulted by every session's forwarder.
struct FilterState {
    data_size_blocked: AtomicBool,
    file_count_blocked: AtomicBool,
}

/// Storage quota filter.
///
/// Cloning a `Filter` is cheap and shares the same underlying state; every
/// session holds a clone so `PassFilter` can be checked per-packet without
/// a lock.
#[derive(Clone)]
pub struct Filter {
    state: Arc<FilterState>,
    settings: FilterSettings,
    mongodb: MongoDBConfig,
    dirty_tx: mpsc::Sender<DirtyEvent>,
    dirty_rx: Arc<tokio::sync::Mutex<Option<mpsc::Receiver<DirtyEvent>>>>,
    file_count_tx: Arc<tokio::sync::Mutex<Option<mpsc::Sender<DirtyEvent>>>>,
    monitors: Arc<tokio::sync::Mutex<Vec<JoinHandle<()>>>>,
}

impl Filter {
    pub fn new(settings: FilterSettings, mongodb: MongoDBConfig) -> Self {
        let (dirty_tx, dirty_rx) = mpsc::channel(DIRTY_EVENT_CHANNEL_CAPACITY);

        Self {
            state: Arc::new(FilterState {
                data_size_blocked: AtomicBool::new(false),
                file_count_blocked: AtomicBool::new(false),
            }),
            settings,
            mongodb,
            dirty_tx,
            dirty_rx: Arc::new(tokio::sync::Mutex::new(Some(dirty_rx))),
            file_count_tx: Arc::new(tokio::sync::Mutex::new(None)),
            monitors: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn filter_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// When we read the state of `file_count_blocked`, `data_size_blocked`
    /// may flip from unblocked to blocked concurrently — this implements a
    /// soft limit, not a hard one, which is acceptable given the quotas
    /// configured here already carry headroom.
    pub fn pass_filter(&self, op_code: OpCode) -> bool {
        !op_code.is_mutation()
            || (!self.state.data_size_blocked.load(Ordering::Relaxed)
                && !self.state.file_count_blocked.load(Ordering::Relaxed))
    }

    pub fn is_dirty_event(&self, op_code: OpCode) -> bool {
        op_code.is_dirty()
    }

    /// Non-blocking: the channel is sized generously and a full channel
    /// just means a dbStats query is already pending, so drop the event.
    pub fn enqueue_dirty_event(&self) {
        let _ = self.dirty_tx.try_send(DirtyEvent::Dirty);
    }

    /// Spawn the two background monitors. Must be called at most once per
    /// filter instance.
    pub async fn start_storage_monitor(&self) {
        if !self.filter_enabled() {
            return;
        }

        let mut dirty_rx_guard = self.dirty_rx.lock().await;
        let dirty_rx = dirty_rx_guard
            .take()
            .expect("start_storage_monitor called twice");
        drop(dirty_rx_guard);

        let (file_count_tx, file_count_rx) = mpsc::channel(1);
        *self.file_count_tx.lock().await = Some(file_count_tx);

        let data_size_handle = tokio::spawn(data_size::run(
            self.mongodb.clone(),
            self.settings.quota_data_size_mb,
            dirty_rx,
            Arc::clone(&self.state),
        ));

        let file_count_handle = tokio::spawn(file_count::run(
            self.settings.base_dir.clone(),
            self.mongodb.dbname.clone(),
            self.settings.quota_files,
            file_count_rx,
            Arc::clone(&self.state),
        ));

        let mut monitors = self.monitors.lock().await;
        monitors.push(data_size_handle);
        monitors.push(file_count_handle);
    }

    /// Send stop events to both monitors and wait for them to exit.
    pub async fn wait_for_finish(&self) {
        if !self.filter_enabled() {
            return;
        }

        let _ = self.dirty_tx.send(DirtyEvent::Stop).await;
        if let Some(tx) = self.file_count_tx.lock().await.as_ref() {
            let _ = tx.send(DirtyEvent::Stop).await;
        }

        let mut monitors = self.monitors.lock().await;
        for handle in monitors.drain(..) {
            let _ = handle.await;
        }
    }
}

impl FilterState {
    pub(crate) fn set_data_size_blocked(&self, blocked: bool) {
        self.data_size_blocked.store(blocked, Ordering::Relaxed);
    }

    pub(crate) fn set_file_count_blocked(&self, blocked: bool) {
        self.file_count_blocked.store(blocked, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(enabled: bool) -> FilterSettings {
        FilterSettings {
            enabled,
            base_dir: "/tmp".to_string(),
            quota_files: 10,
            quota_data_size_mb: 1024,
        }
    }

    fn mongodb() -> MongoDBConfig {
        MongoDBConfig {
            host: "127.0.0.1".to_string(),
            port: 27017,
            dbname: "test".to_string(),
            user: String::new(),
            pass: String::new(),
        }
    }

    #[test]
    fn test_non_mutation_always_passes() {
        let filter = Filter::new(settings(true), mongodb());
        filter.state.set_data_size_blocked(true);
        filter.state.set_file_count_blocked(true);
        assert!(filter.pass_filter(OpCode::Query));
        assert!(filter.pass_filter(OpCode::Delete));
        assert!(filter.pass_filter(OpCode::GetMore));
    }

    #[test]
    fn test_mutation_blocked_when_either_flag_set() {
        let filter = Filter::new(settings(true), mongodb());
        assert!(filter.pass_filter(OpCode::Insert));

        filter.state.set_data_size_blocked(true);
        assert!(!filter.pass_filter(OpCode::Insert));
        assert!(!filter.pass_filter(OpCode::Update));

        filter.state.set_data_size_blocked(false);
        assert!(filter.pass_filter(OpCode::Insert));

        filter.state.set_file_count_blocked(true);
        assert!(!filter.pass_filter(OpCode::Insert));
    }

    #[test]
    fn test_dirty_event_classification() {
        let filter = Filter::new(settings(true), mongodb());
        assert!(filter.is_dirty_event(OpCode::Insert));
        assert!(filter.is_dirty_event(OpCode::Update));
        assert!(filter.is_dirty_event(OpCode::Delete));
        assert!(!filter.is_dirty_event(OpCode::Query));
    }

    #[tokio::test]
    async fn test_disabled_filter_start_and_wait_are_noops() {
        let filter = Filter::new(settings(false), mongodb());
        filter.start_storage_monitor().await;
        filter.wait_for_finish().await;
    }
}
