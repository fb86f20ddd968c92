/// Coalesced, dirty-event-driven `dbStats` polling.
///
/// Mirrors `ProxyFilterImpl.MonitorQuotaDataSize` in the original Go
/// implementation: block on the first dirty event, then drain whatever
/// else queued up non-blockingly so a burst of writes triggers exactly one
/// `dbStats` query instead of one per write.
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{DirtyEvent, FilterState};
use crate::config::MongoDBConfig;

use mongodb::bson::{doc, Bson};
use mongodb::Client;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

pub async fn run(
    mongodb_config: MongoDBConfig,
    quota_data_size_mb: u64,
    mut dirty_rx: mpsc::Receiver<DirtyEvent>,
    state: Arc<FilterState>,
) {
    let quota_bytes = quota_data_size_mb as f64 * BYTES_PER_MIB;
    let mut client: Option<Client> = None;

    loop {
        match dirty_rx.recv().await {
            None | Some(DirtyEvent::Stop) => break,
            Some(DirtyEvent::Dirty) => {}
        }

        // Drain any further events that piled up while we were idle; they
        // all collapse into the single dbStats query below.
        while let Ok(event) = dirty_rx.try_recv() {
            if matches!(event, DirtyEvent::Stop) {
                return;
            }
        }

        match query_data_size(&mut client, &mongodb_config).await {
            Ok(size) => {
                state.set_data_size_blocked(size >= quota_bytes);
            }
            Err(e) => {
                log::warn!("dbStats query failed, blocking mutations: {}", e);
                state.set_data_size_blocked(true);
            }
        }
    }
}

async fn connect(mongodb_config: &MongoDBConfig) -> mongodb::error::Result<Client> {
    let uri = if mongodb_config.user.is_empty() {
        format!("mongodb://{}:{}", mongodb_config.host, mongodb_config.port)
    } else {
        format!(
            "mongodb://{}:{}@{}:{}",
            mongodb_config.user, mongodb_config.pass, mongodb_config.host, mongodb_config.port
        )
    };
    Client::with_uri_str(&uri).await
}

/// Connects lazily and reconnects if the cached client's ping fails,
/// mirroring `startMongoSession`'s reuse-or-redial logic.
async fn ensure_connected(
    client: &mut Option<Client>,
    mongodb_config: &MongoDBConfig,
) -> mongodb::error::Result<Client> {
    if let Some(existing) = client {
        if existing
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .is_ok()
        {
            return Ok(existing.clone());
        }
    }

    let fresh = connect(mongodb_config).await?;
    *client = Some(fresh.clone());
    Ok(fresh)
}

async fn query_data_size(
    client: &mut Option<Client>,
    mongodb_config: &MongoDBConfig,
) -> Result<f64, crate::error::StorageError> {
    let connected = ensure_connected(client, mongodb_config)
        .await
        .map_err(|e| crate::error::StorageError::db_stats(e.to_string()))?;

    let stats = connected
        .database(&mongodb_config.dbname)
        .run_command(doc! { "dbStats": 1, "scale": 1 }, None)
        .await
        .map_err(|e| crate::error::StorageError::db_stats(e.to_string()))?;

    let data_size = parse_numeric(stats.get("dataSize"))
        .ok_or_else(|| crate::error::StorageError::parse("missing or unreadable dataSize"))?;
    let index_size = parse_numeric(stats.get("indexSize"))
        .ok_or_else(|| crate::error::StorageError::parse("missing or unreadable indexSize"))?;

    Ok(data_size + index_size)
}

/// `dbStats` can return size fields as a 32/64-bit integer, a double, or
/// (for very large databases) a value MongoDB renders in a way that only
/// round-trips cleanly through a float — accept whatever numeric
/// representation shows up rather than assuming a fixed BSON type.
fn parse_numeric(value: Option<&Bson>) -> Option<f64> {
    match value? {
        Bson::Double(d) => Some(*d),
        Bson::Int32(i) => Some(*i as f64),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Decimal128(d) => d.to_string().parse::<f64>().ok(),
        other => other.to_string().parse::<f64>().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_accepts_all_representations() {
        assert_eq!(parse_numeric(Some(&Bson::Double(42.5))), Some(42.5));
        assert_eq!(parse_numeric(Some(&Bson::Int32(7))), Some(7.0));
        assert_eq!(parse_numeric(Some(&Bson::Int64(9_000_000_000))), Some(9e9));
        assert_eq!(parse_numeric(None), None);
    }
}
