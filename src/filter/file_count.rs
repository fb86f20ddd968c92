/// Datafile-count monitor.
///
/// MongoDB's pre-WiredTiger storage engine laid each database out as a set
/// of numbered datafiles (`<dbname>.0`, `<dbname>.1`, ...) in a single
/// directory. This mirrors `ProxyFilterImpl.MonitorQuotaFiles` /
/// `iterateDatafile` / `parseInotifyEvent` from the original Go
/// implementation: an initial directory scan seeds the known-file set and
/// count, then a directory watch keeps the count current as files are
/// created, renamed in, or removed. The 1-second poll timeout used while
/// waiting for the next watch event is a heartbeat, not a fault.
use std::collections::HashSet;
use std::path::Path;
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use regex::Regex;
use tokio::sync::mpsc;

use super::{DirtyEvent, FilterState};

pub async fn run(
    base_dir: String,
    dbname: String,
    quota_files: usize,
    mut stop_rx: mpsc::Receiver<DirtyEvent>,
    state: Arc<FilterState>,
) {
    let pattern = match Regex::new(&format!("^{}\\.[0-9]+", regex::escape(&dbname))) {
        Ok(re) => re,
        Err(e) => {
            log::error!("invalid datafile pattern for db '{}': {}", dbname, e);
            state.set_file_count_blocked(true);
            return;
        }
    };

    let mut known_files: HashSet<String> = HashSet::new();
    let mut file_count = match scan_initial(&base_dir, &pattern, &mut known_files) {
        Ok(n) => n,
        Err(e) => {
            log::error!("failed to scan datafile directory {}: {}", base_dir, e);
            state.set_file_count_blocked(true);
            return;
        }
    };
    log::info!(
        "at startup, {} contains {} datafiles for db '{}'",
        base_dir,
        file_count,
        dbname
    );
    state.set_file_count_blocked(file_count > quota_files);

    let (event_tx, event_rx) = std_mpsc::channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = match notify::recommended_watcher(move |res| {
        let _ = event_tx.send(res);
    }) {
        Ok(watcher) => watcher,
        Err(e) => {
            log::error!("failed to create directory watcher: {}", e);
            state.set_file_count_blocked(true);
            return;
        }
    };

    if let Err(e) = watcher.watch(Path::new(&base_dir), RecursiveMode::NonRecursive) {
        log::error!("failed to watch {}: {}", base_dir, e);
        state.set_file_count_blocked(true);
        return;
    }

    loop {
        match stop_rx.try_recv() {
            Ok(DirtyEvent::Stop) => break,
            Ok(DirtyEvent::Dirty) => continue,
            Err(mpsc::error::TryRecvError::Empty) => {}
            Err(mpsc::error::TryRecvError::Disconnected) => break,
        }

        let recv_result =
            tokio::task::block_in_place(|| event_rx.recv_timeout(Duration::from_secs(1)));

        match recv_result {
            Ok(Ok(event)) => {
                let delta = classify_event(&event, &pattern, &mut known_files);
                if delta != 0 {
                    file_count = (file_count as i64 + delta).max(0) as usize;
                    log::debug!("current datafile count: {}", file_count);
                    state.set_file_count_blocked(file_count > quota_files);
                }
            }
            Ok(Err(e)) => {
                log::warn!("directory watch error: {}", e);
                state.set_file_count_blocked(true);
            }
            Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn scan_initial(
    base_dir: &str,
    pattern: &Regex,
    known_files: &mut HashSet<String>,
) -> std::io::Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(base_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if pattern.is_match(name) {
                known_files.insert(name.to_string());
                count += 1;
            }
        }
    }
    Ok(count)
}

/// Returns the net change in datafile count caused by this event.
fn classify_event(event: &Event, pattern: &Regex, known_files: &mut HashSet<String>) -> i64 {
    let mut delta = 0i64;

    for path in &event.paths {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) if pattern.is_match(n) => n.to_string(),
            _ => continue,
        };

        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => {
                if known_files.insert(name) {
                    delta += 1;
                }
            }
            EventKind::Remove(_) => {
                if known_files.remove(&name) {
                    delta -= 1;
                }
            }
            _ => {}
        }
    }

    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_scan_initial_counts_matching_files_only() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("app.0"), b"").unwrap();
        std::fs::write(dir.path().join("app.1"), b"").unwrap();
        std::fs::write(dir.path().join("app.ns"), b"").unwrap();
        std::fs::write(dir.path().join("other.0"), b"").unwrap();

        let pattern = Regex::new(r"^app\.[0-9]+").unwrap();
        let mut known = HashSet::new();
        let count = scan_initial(dir.path().to_str().unwrap(), &pattern, &mut known).unwrap();

        assert_eq!(count, 2);
        assert!(known.contains("app.0"));
        assert!(known.contains("app.1"));
        assert!(!known.contains("app.ns"));
    }
}
