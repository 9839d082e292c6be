use crate::memory::{InMemoryRepository, RecordMap};
use async_trait::async_trait;
use cloak_core::repository::Result;
use cloak_core::{ReadRepository, Repository, ShortCode, StorageError, UrlRecord};
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

enum SnapshotRequest {
    Save,
    Flush(oneshot::Sender<Result<()>>),
}

/// In-memory repository that persists a full JSON snapshot after every
/// mutation.
///
/// Snapshots are written by a single background task, so callers never wait
/// on the file system. The task drains requests in order and serializes the
/// map under the shared lock, so each file it writes reflects at least the
/// mutation that requested it and a stale view never overwrites a newer one.
///
/// A crash between a mutation and the next completed write loses that
/// mutation from disk.
#[derive(Debug)]
pub struct FileSnapshotRepository {
    records: Arc<InMemoryRepository>,
    requests: mpsc::UnboundedSender<SnapshotRequest>,
    path: PathBuf,
}

impl FileSnapshotRepository {
    /// Loads the snapshot at `path` and starts the background writer.
    ///
    /// A missing or unreadable-as-JSON file yields an empty store. Must be
    /// called from within a tokio runtime.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = Arc::new(InMemoryRepository::from_records(load(&path).await?));

        let (requests, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(Arc::clone(&records), path.clone(), receiver));

        Ok(Self {
            records,
            requests,
            path,
        })
    }

    /// The snapshot file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits until every snapshot requested so far has been written.
    pub async fn flush(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.requests
            .send(SnapshotRequest::Flush(ack))
            .map_err(|_| StorageError::Unavailable("snapshot writer stopped".to_string()))?;
        done.await
            .map_err(|_| StorageError::Unavailable("snapshot writer stopped".to_string()))?
    }

    fn schedule_save(&self) {
        if self.requests.send(SnapshotRequest::Save).is_err() {
            warn!(path = %self.path.display(), "snapshot writer stopped, change not persisted");
        }
    }
}

#[async_trait]
impl ReadRepository for FileSnapshotRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        self.records.get(code).await
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        self.records.exists(code).await
    }

    async fn count(&self) -> Result<u64> {
        self.records.count().await
    }
}

#[async_trait]
impl Repository for FileSnapshotRepository {
    async fn insert(&self, record: UrlRecord) -> Result<()> {
        self.records.insert(record).await?;
        self.schedule_save();
        Ok(())
    }

    async fn increment_access(&self, code: &ShortCode) -> Result<bool> {
        let found = self.records.increment_access(code).await?;
        if found {
            self.schedule_save();
        }
        Ok(found)
    }
}

async fn load(path: &Path) -> Result<RecordMap> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "no snapshot found, starting empty");
            return Ok(RecordMap::new());
        }
        Err(err) => return Err(StorageError::Io(format!("{}: {err}", path.display()))),
    };

    match serde_json::from_slice::<HashMap<String, UrlRecord>>(&bytes) {
        Ok(stored) => {
            let records: RecordMap = stored
                .into_values()
                .map(|record| (record.code.clone(), record))
                .collect();
            info!(path = %path.display(), records = records.len(), "loaded snapshot");
            Ok(records)
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "snapshot is corrupt, starting empty");
            Ok(RecordMap::new())
        }
    }
}

async fn run_writer(
    records: Arc<InMemoryRepository>,
    path: PathBuf,
    mut receiver: mpsc::UnboundedReceiver<SnapshotRequest>,
) {
    while let Some(first) = receiver.recv().await {
        let mut dirty = false;
        let mut acks = Vec::new();

        // Coalesce whatever queued up while the previous write ran.
        let mut next = Some(first);
        while let Some(request) = next {
            match request {
                SnapshotRequest::Save => dirty = true,
                SnapshotRequest::Flush(ack) => acks.push(ack),
            }
            next = receiver.try_recv().ok();
        }

        let result = if dirty {
            write_snapshot(&records, &path).await
        } else {
            Ok(())
        };
        if let Err(err) = &result {
            warn!(path = %path.display(), error = %err, "failed to write snapshot");
        }

        for ack in acks {
            let _ = ack.send(result.clone());
        }
    }
    debug!(path = %path.display(), "snapshot writer finished");
}

async fn write_snapshot(records: &InMemoryRepository, path: &Path) -> Result<()> {
    let bytes = records.with_records(|map| {
        let ordered: BTreeMap<&str, &UrlRecord> =
            map.iter().map(|(code, record)| (code.as_str(), record)).collect();
        serde_json::to_vec_pretty(&ordered)
    });
    let bytes = bytes.map_err(|e| StorageError::InvalidData(e.to_string()))?;

    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    tokio::fs::write(&staging, &bytes)
        .await
        .map_err(|e| StorageError::Io(format!("{}: {e}", staging.display())))?;
    tokio::fs::rename(&staging, path)
        .await
        .map_err(|e| StorageError::Io(format!("{}: {e}", path.display())))?;

    debug!(path = %path.display(), bytes = bytes.len(), "snapshot written");
    Ok(())
}
