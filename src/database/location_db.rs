use std::future::Future;
use std::sync::Arc;

use sqlx::MySqlPool;
use tokio::sync::mpsc;

use crate::network::location::{LocationCallback, LocationTracker};
use crate::network::registry::ServerRegistry;

#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("location query failed: {0}")]
    Sql(#[from] sqlx::Error),
}

/// Player names are stored lowercase so lookups ignore case.
fn player_key(player: &str) -> String {
    player.to_ascii_lowercase()
}

/// Insert or refresh the player's row.
pub async fn upsert_location(pool: &MySqlPool, player: &str, server: &str) -> Result<(), LocationError> {
    sqlx::query(
        "INSERT INTO `PlayerLocation` (`PlyName`, `PlyServer`, `PlyUpdated`) VALUES (?, ?, ?)
         ON DUPLICATE KEY UPDATE `PlyServer` = VALUES(`PlyServer`), `PlyUpdated` = VALUES(`PlyUpdated`)"
    )
    .bind(player_key(player))
    .bind(server)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_location(pool: &MySqlPool, player: &str) -> Result<(), LocationError> {
    sqlx::query("DELETE FROM `PlayerLocation` WHERE `PlyName` = ?")
        .bind(player_key(player))
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn fetch_location(pool: &MySqlPool, player: &str) -> Result<Option<String>, LocationError> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT `PlyServer` FROM `PlayerLocation` WHERE `PlyName` = ?"
    )
    .bind(player_key(player))
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(s,)| s))
}

/// Queued writes waiting for the location writer.
pub const WRITE_QUEUE_CAPACITY: usize = 256;

/// One change to the `PlayerLocation` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationWrite {
    Upsert { player: String, server: String },
    Remove { player: String },
}

/// Where the location writer applies its writes.
pub trait LocationSink: Send + Sync + 'static {
    fn apply(&self, write: LocationWrite) -> impl Future<Output = Result<(), LocationError>> + Send;
}

impl LocationSink for MySqlPool {
    fn apply(&self, write: LocationWrite) -> impl Future<Output = Result<(), LocationError>> + Send {
        let pool = self.clone();
        async move {
            match write {
                LocationWrite::Upsert { player, server } => upsert_location(&pool, &player, &server).await,
                LocationWrite::Remove { player } => delete_location(&pool, &player).await,
            }
        }
    }
}

/// Apply queued writes one at a time, in the order they were sent.
///
/// A failed write is logged and skipped. Returns once every sender is gone.
pub async fn run_location_writer<S: LocationSink>(sink: S, mut rx: mpsc::Receiver<LocationWrite>) {
    while let Some(write) = rx.recv().await {
        if let Err(e) = sink.apply(write.clone()).await {
            tracing::warn!("[db] [location_write_failed] write={:?} err={}", write, e);
        }
    }
    tracing::debug!("[db] [location_writer_stopped]");
}

/// Start the writer task on the current runtime and hand back its queue.
pub fn spawn_location_writer<S: LocationSink>(sink: S, capacity: usize) -> mpsc::Sender<LocationWrite> {
    let (tx, rx) = mpsc::channel(capacity);
    tokio::spawn(run_location_writer(sink, rx));
    tx
}

/// [`LocationTracker`] backed by the `PlayerLocation` table.
///
/// Writes go through a single writer task so they reach the database in
/// call order; lookups spawn onto the current runtime and a failed lookup
/// answers `None`.
pub struct SqlLocationTracker {
    pool: MySqlPool,
    registry: Arc<ServerRegistry>,
    writes: mpsc::Sender<LocationWrite>,
}

impl SqlLocationTracker {
    /// Must be called from inside a tokio runtime.
    pub fn new(pool: MySqlPool, registry: Arc<ServerRegistry>) -> Self {
        let writes = spawn_location_writer(pool.clone(), WRITE_QUEUE_CAPACITY);
        Self::with_writer(pool, registry, writes)
    }

    fn with_writer(pool: MySqlPool, registry: Arc<ServerRegistry>, writes: mpsc::Sender<LocationWrite>) -> Self {
        Self { pool, registry, writes }
    }

    fn queue(&self, write: LocationWrite) {
        if let Err(e) = self.writes.try_send(write) {
            tracing::warn!("[db] [location_write_dropped] err={}", e);
        }
    }
}

impl LocationTracker for SqlLocationTracker {
    fn update_location(&self, player: &str) {
        let Some(server) = self.registry.self_name() else {
            tracing::warn!("[db] [location_skipped] player={} self name not set", player);
            return;
        };
        self.queue(LocationWrite::Upsert { player: player.to_string(), server });
    }

    fn remove_location(&self, player: &str) {
        self.queue(LocationWrite::Remove { player: player.to_string() });
    }

    fn get_location(&self, player: &str, callback: LocationCallback) {
        let pool = self.pool.clone();
        let player = player.to_string();
        tokio::spawn(async move {
            let found = match fetch_location(&pool, &player).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!("[db] [location_lookup_failed] player={} err={}", player, e);
                    None
                }
            };
            callback(found);
        });
    }
}
