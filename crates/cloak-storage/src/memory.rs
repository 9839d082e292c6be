use async_trait::async_trait;
use cloak_core::repository::Result;
use cloak_core::{ReadRepository, Repository, ShortCode, StorageError, UrlRecord};
use parking_lot::RwLock;
use std::collections::HashMap;

/// The map shared by the in-memory and file-snapshot repositories.
pub(crate) type RecordMap = HashMap<ShortCode, UrlRecord>;

/// In-memory implementation of the Repository trait.
///
/// All records sit behind a single reader/writer lock. Reads share the lock,
/// while inserts and counter increments take it exclusively, so every
/// mutation is linearized and check-then-insert cannot race.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    records: RwLock<RecordMap>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory repository with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_records(HashMap::with_capacity(capacity))
    }

    pub(crate) fn from_records(records: RecordMap) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Runs `f` against a consistent view of every record, holding the
    /// shared lock for the duration.
    pub(crate) fn with_records<T>(&self, f: impl FnOnce(&RecordMap) -> T) -> T {
        f(&self.records.read())
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        Ok(self.records.read().get(code).cloned())
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.records.read().contains_key(code))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.read().len() as u64)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn insert(&self, record: UrlRecord) -> Result<()> {
        let mut records = self.records.write();
        if records.contains_key(&record.code) {
            return Err(StorageError::Conflict(record.code.to_string()));
        }
        records.insert(record.code.clone(), record);
        Ok(())
    }

    async fn increment_access(&self, code: &ShortCode) -> Result<bool> {
        let mut records = self.records.write();
        match records.get_mut(code) {
            Some(record) => {
                record.access_count += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloak_core::creation_timestamp;
    use std::sync::Arc;

    fn code(s: &str) -> ShortCode {
        ShortCode::new_unchecked(s)
    }

    fn record(code_str: &str, payload: &str) -> UrlRecord {
        UrlRecord::new(code(code_str), payload.to_string(), creation_timestamp())
    }

    #[tokio::test]
    async fn save_and_get() {
        let repo = InMemoryRepository::new();
        let stored = record("abc123", "deadbeef");

        repo.insert(stored.clone()).await.unwrap();

        let result = repo.get(&code("abc123")).await.unwrap().unwrap();
        assert_eq!(result, stored);
    }

    #[tokio::test]
    async fn get_nonexistent() {
        let repo = InMemoryRepository::new();

        let result = repo.get(&code("nope00")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn insert_conflict_keeps_original() {
        let repo = InMemoryRepository::new();

        repo.insert(record("abc123", "first")).await.unwrap();

        let err = repo.insert(record("abc123", "second")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        let result = repo.get(&code("abc123")).await.unwrap().unwrap();
        assert_eq!(result.encrypted_url, "first");
    }

    #[tokio::test]
    async fn exists_checks() {
        let repo = InMemoryRepository::new();

        assert!(!repo.exists(&code("abc123")).await.unwrap());
        repo.insert(record("abc123", "ff")).await.unwrap();
        assert!(repo.exists(&code("abc123")).await.unwrap());
    }

    #[tokio::test]
    async fn increment_existing_and_missing() {
        let repo = InMemoryRepository::new();
        repo.insert(record("abc123", "ff")).await.unwrap();

        assert!(repo.increment_access(&code("abc123")).await.unwrap());
        assert!(repo.increment_access(&code("abc123")).await.unwrap());
        assert!(!repo.increment_access(&code("zzz999")).await.unwrap());

        let result = repo.get(&code("abc123")).await.unwrap().unwrap();
        assert_eq!(result.access_count, 2);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_increments_are_not_lost() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.insert(record("hot001", "ff")).await.unwrap();

        let handles: Vec<_> = (0..200)
            .map(|_| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move { repo.increment_access(&code("hot001")).await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().unwrap());
        }

        let result = repo.get(&code("hot001")).await.unwrap().unwrap();
        assert_eq!(result.access_count, 200);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_inserts_of_same_code_have_one_winner() {
        let repo = Arc::new(InMemoryRepository::new());

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move { repo.insert(record("same01", &format!("{i:02x}"))).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => winners += 1,
                Err(err) => assert!(matches!(err, StorageError::Conflict(_))),
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_access() {
        let repo = Arc::new(InMemoryRepository::with_capacity(16));
        let mut handles = vec![];

        for i in 0..10u64 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.insert(record(&format!("code{:02}", i), &format!("{:02x}", i)))
                    .await
                    .unwrap();
            }));
        }

        for i in 0..10u64 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                let _ = repo.get(&code(&format!("code{:02}", i))).await;
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        for i in 0..10u64 {
            let result = repo.get(&code(&format!("code{:02}", i))).await.unwrap().unwrap();
            assert_eq!(result.encrypted_url, format!("{:02x}", i));
        }
        assert_eq!(repo.count().await.unwrap(), 10);
    }
}
