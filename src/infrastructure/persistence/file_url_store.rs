//! In-memory store mirrored to an append-only JSON-lines journal.
//!
//! Every successful write appends one JSON object per affected record before
//! memory is updated, so a failed write leaves the in-memory state untouched.
//! Soft deletes append a tombstone: a copy of the record with
//! `is_deleted: true`. Replay upserts by `short_url`, so a tombstone marks the
//! earlier record deleted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OwnedMutexGuard, oneshot};
use tracing::{debug, info, warn};

use crate::domain::entities::{BatchItem, BatchResult, UrlRecord};
use crate::domain::repositories::UrlStore;
use crate::error::AppError;
use crate::utils::code_generator::{SHORT_CODE_LENGTH, generate_code};
use crate::utils::short_url::format_short_url;
use crate::utils::url_validator::ensure_valid_url;

/// Attempts at drawing a code no record uses yet.
const MAX_CODE_ATTEMPTS: usize = 10;

/// One journal line.
#[derive(Debug, Serialize, Deserialize)]
struct JournalEntry {
    #[serde(default, skip_serializing_if = "is_zero")]
    uuid: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    short_url: String,
    original_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    owner_id: String,
    #[serde(default)]
    is_deleted: bool,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

impl From<&UrlRecord> for JournalEntry {
    fn from(record: &UrlRecord) -> Self {
        Self {
            uuid: record.uuid,
            correlation_id: record.correlation_id.clone(),
            short_url: record.short_code.clone(),
            original_url: record.original_url.clone(),
            owner_id: record.owner_id.clone(),
            is_deleted: record.is_deleted,
        }
    }
}

/// Records in insertion order plus lookup indexes into them.
#[derive(Default)]
struct FileState {
    records: Vec<UrlRecord>,
    by_code: HashMap<String, usize>,
    by_owner_url: HashMap<(String, String), usize>,
    journal: Option<File>,
}

impl FileState {
    fn next_uuid(&self) -> i64 {
        self.records.len() as i64 + 1
    }

    fn find(&self, owner_id: &str, original_url: &str) -> Option<&UrlRecord> {
        self.by_owner_url
            .get(&(owner_id.to_string(), original_url.to_string()))
            .map(|&idx| &self.records[idx])
    }

    fn insert(&mut self, record: UrlRecord) {
        let idx = self.records.len();
        self.by_code.insert(record.short_code.clone(), idx);
        self.by_owner_url
            .insert((record.owner_id.clone(), record.original_url.clone()), idx);
        self.records.push(record);
    }

    /// Upserts a replayed entry by short code; the deleted flag is only ever set.
    fn apply(&mut self, entry: JournalEntry) {
        if let Some(&idx) = self.by_code.get(&entry.short_url) {
            if entry.is_deleted {
                self.records[idx].is_deleted = true;
            }
            return;
        }

        let uuid = if entry.uuid > 0 {
            entry.uuid
        } else {
            self.next_uuid()
        };
        let mut record = UrlRecord::new(
            uuid,
            entry.short_url,
            entry.original_url,
            entry.owner_id,
            entry.correlation_id,
        );
        record.is_deleted = entry.is_deleted;
        self.insert(record);
    }

    fn unused_code(&self, also_taken: impl Fn(&str) -> bool) -> Result<String, AppError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_code(SHORT_CODE_LENGTH);
            if !self.by_code.contains_key(&code) && !also_taken(&code) {
                return Ok(code);
            }
        }

        Err(AppError::storage(
            "Failed to generate unique code",
            json!({ "reason": "Too many collisions" }),
        ))
    }

    /// Appends `entries` as one write and returns the journal length before it,
    /// or `None` when there is no journal.
    ///
    /// A failed write is truncated away so the journal never ends mid-line.
    async fn append(
        &mut self,
        path: Option<&Path>,
        entries: &[JournalEntry],
    ) -> Result<Option<u64>, AppError> {
        let Some(path) = path else {
            return Ok(None);
        };
        let Some(journal) = self.journal.as_mut() else {
            return Err(AppError::storage(
                "Store is not initialized",
                json!({ "path": path.display().to_string() }),
            ));
        };

        let mut buf = Vec::new();
        for entry in entries {
            serde_json::to_writer(&mut buf, entry)?;
            buf.push(b'\n');
        }

        let committed_len = journal.metadata().await?.len();
        let written = match journal.write_all(&buf).await {
            Ok(()) => journal.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            warn!("Journal write to {} failed: {}", path.display(), e);
            truncate_journal(journal, committed_len).await;
            return Err(e.into());
        }

        Ok(Some(committed_len))
    }

    /// Cuts the journal back to `len` bytes.
    async fn rewind(&mut self, len: u64) {
        if let Some(journal) = self.journal.as_mut() {
            truncate_journal(journal, len).await;
        }
    }
}

async fn truncate_journal(journal: &mut File, len: u64) {
    if let Err(e) = journal.set_len(len).await {
        warn!("Failed to truncate journal to {} bytes: {}", len, e);
    }
}

/// Process-resident store with optional journal persistence.
///
/// Without a journal path the store is memory-only and needs no
/// [`UrlStore::initialize`] call. With one, `initialize` must run before
/// the first write.
///
/// Writes commit on a spawned task that holds the state lock, so a caller
/// dropped mid-write (a batch deadline, an aborted worker) never leaves half a
/// journal write behind: the task finishes the write, sees nobody is waiting
/// for the result, and truncates the journal back.
pub struct FileUrlStore {
    base_url: String,
    path: Option<PathBuf>,
    state: Arc<Mutex<FileState>>,
}

impl FileUrlStore {
    /// Creates a store journaling to `path`, or memory-only when `None`.
    pub fn new(base_url: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            path,
            state: Arc::new(Mutex::new(FileState::default())),
        }
    }

    pub fn in_memory(base_url: impl Into<String>) -> Self {
        Self::new(base_url, None)
    }

    /// Number of stored records, deleted ones included.
    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn short_url(&self, code: &str) -> String {
        format_short_url(&self.base_url, code)
    }

    async fn lock_for_write(&self) -> OwnedMutexGuard<FileState> {
        Arc::clone(&self.state).lock_owned().await
    }

    /// Journals `entries`, then runs `apply` on the in-memory state.
    ///
    /// `apply` only runs if the caller is still waiting once the journal write
    /// has landed; otherwise the write is truncated away.
    async fn commit<F>(
        &self,
        mut state: OwnedMutexGuard<FileState>,
        entries: Vec<JournalEntry>,
        apply: F,
    ) -> Result<(), AppError>
    where
        F: FnOnce(&mut FileState) + Send + 'static,
    {
        let path = self.path.clone();
        let (done_tx, done_rx) = oneshot::channel();

        tokio::spawn(async move {
            let rollback_len = match state.append(path.as_deref(), &entries).await {
                Ok(len) => len,
                Err(e) => {
                    let _ = done_tx.send(Err(e));
                    return;
                }
            };

            if done_tx.send(Ok(())).is_err() {
                debug!("Write of {} entries abandoned, rolling back", entries.len());
                if let Some(len) = rollback_len {
                    state.rewind(len).await;
                }
                return;
            }

            apply(&mut state);
        });

        done_rx.await.map_err(|_| {
            AppError::storage(
                "Journal write task failed",
                json!({ "reason": "task ended without a result" }),
            )
        })?
    }
}

#[async_trait]
impl UrlStore for FileUrlStore {
    async fn initialize(&self) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        *state = FileState::default();

        let Some(path) = &self.path else {
            info!("Memory-only store initialized");
            return Ok(());
        };

        let contents = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Journal {} does not exist yet", path.display());
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        // Only newline-terminated lines were written completely.
        let complete_len = contents
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);

        for (idx, line) in contents[..complete_len].split(|&b| b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let entry: JournalEntry = serde_json::from_slice(line).map_err(|e| {
                AppError::storage(
                    "Malformed journal entry",
                    json!({
                        "path": path.display().to_string(),
                        "line": idx + 1,
                        "reason": e.to_string(),
                    }),
                )
            })?;
            state.apply(entry);
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let journal = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        if complete_len < contents.len() {
            warn!(
                "Discarding {} bytes of unterminated journal tail in {}",
                contents.len() - complete_len,
                path.display()
            );
            journal.set_len(complete_len as u64).await?;
        }
        state.journal = Some(journal);

        info!(
            "Journal {} replayed, {} records loaded",
            path.display(),
            state.records.len()
        );
        Ok(())
    }

    async fn save(&self, owner_id: &str, original_url: &str) -> Result<String, AppError> {
        ensure_valid_url(original_url)?;

        let state = self.lock_for_write().await;

        if let Some(existing) = state.find(owner_id, original_url) {
            debug!("URL already shortened as {}", existing.short_code);
            return Err(AppError::conflict(self.short_url(&existing.short_code)));
        }

        let code = state.unused_code(|_| false)?;
        let record = UrlRecord::new(
            state.next_uuid(),
            code,
            original_url.to_string(),
            owner_id.to_string(),
            None,
        );
        let short_url = self.short_url(&record.short_code);
        let entries = vec![JournalEntry::from(&record)];

        self.commit(state, entries, move |state| state.insert(record))
            .await?;

        Ok(short_url)
    }

    async fn save_batch(
        &self,
        owner_id: &str,
        items: Vec<BatchItem>,
    ) -> Result<Vec<BatchResult>, AppError> {
        for item in &items {
            ensure_valid_url(&item.original_url)?;
        }

        let state = self.lock_for_write().await;

        let mut pending: Vec<UrlRecord> = Vec::new();
        let mut pending_by_url: HashMap<String, usize> = HashMap::new();
        let mut pending_codes: HashSet<String> = HashSet::new();
        let mut results = Vec::with_capacity(items.len());

        for item in items {
            let existing_code = state
                .find(owner_id, &item.original_url)
                .map(|r| r.short_code.clone())
                .or_else(|| {
                    pending_by_url
                        .get(&item.original_url)
                        .map(|&idx| pending[idx].short_code.clone())
                });

            if let Some(code) = existing_code {
                results.push(BatchResult {
                    correlation_id: item.correlation_id,
                    short_url: self.short_url(&code),
                    existing: true,
                });
                continue;
            }

            let code = state.unused_code(|c| pending_codes.contains(c))?;
            let correlation_id = (!item.correlation_id.is_empty()).then(|| item.correlation_id.clone());
            let record = UrlRecord::new(
                state.next_uuid() + pending.len() as i64,
                code.clone(),
                item.original_url.clone(),
                owner_id.to_string(),
                correlation_id,
            );

            results.push(BatchResult {
                correlation_id: item.correlation_id,
                short_url: self.short_url(&code),
                existing: false,
            });
            pending_by_url.insert(item.original_url, pending.len());
            pending_codes.insert(code);
            pending.push(record);
        }

        if pending.is_empty() {
            return Ok(results);
        }

        debug!(
            "Batch stores {} new records out of {}",
            pending.len(),
            results.len()
        );
        let entries: Vec<JournalEntry> = pending.iter().map(JournalEntry::from).collect();
        self.commit(state, entries, move |state| {
            for record in pending {
                state.insert(record);
            }
        })
        .await?;

        Ok(results)
    }

    async fn get(&self, short_code: &str) -> Result<UrlRecord, AppError> {
        let state = self.state.lock().await;

        state
            .by_code
            .get(short_code)
            .map(|&idx| state.records[idx].clone())
            .ok_or_else(|| {
                AppError::not_found(
                    format!("Short URL not found: {short_code}"),
                    json!({ "code": short_code }),
                )
            })
    }

    async fn index(&self, owner_id: &str) -> Result<Vec<UrlRecord>, AppError> {
        let state = self.state.lock().await;

        Ok(state
            .records
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .map(|r| UrlRecord {
                short_code: self.short_url(&r.short_code),
                ..r.clone()
            })
            .collect())
    }

    async fn batch_delete(
        &self,
        owner_id: &str,
        short_codes: Vec<String>,
    ) -> Result<(), AppError> {
        let state = self.lock_for_write().await;

        let mut targets: Vec<usize> = short_codes
            .iter()
            .filter_map(|code| state.by_code.get(code).copied())
            .filter(|&idx| {
                let record = &state.records[idx];
                record.owner_id == owner_id && !record.is_deleted
            })
            .collect();
        targets.sort_unstable();
        targets.dedup();

        if targets.is_empty() {
            return Ok(());
        }

        debug!("Soft-deleting {} records", targets.len());
        let tombstones: Vec<JournalEntry> = targets
            .iter()
            .map(|&idx| JournalEntry {
                is_deleted: true,
                ..JournalEntry::from(&state.records[idx])
            })
            .collect();

        self.commit(state, tombstones, move |state| {
            for idx in targets {
                state.records[idx].is_deleted = true;
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://localhost:8080";

    #[test]
    fn test_journal_entry_omits_empty_fields() {
        let entry = JournalEntry {
            uuid: 0,
            correlation_id: None,
            short_url: "abcdEFGH".to_string(),
            original_url: "https://example.com".to_string(),
            owner_id: String::new(),
            is_deleted: false,
        };

        let line = serde_json::to_string(&entry).unwrap();

        assert_eq!(
            line,
            r#"{"short_url":"abcdEFGH","original_url":"https://example.com","is_deleted":false}"#
        );
    }

    #[test]
    fn test_journal_entry_parses_minimal_line() {
        let entry: JournalEntry =
            serde_json::from_str(r#"{"short_url":"abc","original_url":"https://x.io"}"#).unwrap();

        assert_eq!(entry.uuid, 0);
        assert!(entry.owner_id.is_empty());
        assert!(!entry.is_deleted);
    }

    #[test]
    fn test_apply_tombstone_marks_existing_record() {
        let mut state = FileState::default();
        state.apply(JournalEntry {
            uuid: 1,
            correlation_id: None,
            short_url: "abc".to_string(),
            original_url: "https://x.io".to_string(),
            owner_id: "u".to_string(),
            is_deleted: false,
        });
        state.apply(JournalEntry {
            uuid: 1,
            correlation_id: None,
            short_url: "abc".to_string(),
            original_url: "https://x.io".to_string(),
            owner_id: "u".to_string(),
            is_deleted: true,
        });

        assert_eq!(state.records.len(), 1);
        assert!(state.records[0].is_deleted);
    }

    #[test]
    fn test_apply_never_undeletes() {
        let mut state = FileState::default();
        let entry = || JournalEntry {
            uuid: 0,
            correlation_id: None,
            short_url: "abc".to_string(),
            original_url: "https://x.io".to_string(),
            owner_id: "u".to_string(),
            is_deleted: false,
        };
        state.apply(JournalEntry {
            is_deleted: true,
            ..entry()
        });
        state.apply(entry());

        assert!(state.records[0].is_deleted);
        assert_eq!(state.records[0].uuid, 1);
    }

    #[tokio::test]
    async fn test_memory_store_works_without_initialize() {
        let store = FileUrlStore::in_memory(BASE);

        let short_url = store.save("user-1", "https://example.com/a").await.unwrap();

        assert!(short_url.starts_with("http://localhost:8080/"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_journaled_store_requires_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileUrlStore::new(BASE, Some(dir.path().join("db.json")));

        let err = store
            .save("user-1", "https://example.com/a")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Storage { .. }));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_url() {
        let store = FileUrlStore::in_memory(BASE);

        let err = store.save("user-1", "not-a-url").await.unwrap_err();

        assert!(matches!(err, AppError::Validation { .. }));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_batch_delete_ignores_foreign_and_unknown_codes() {
        let store = FileUrlStore::in_memory(BASE);
        let url = store.save("owner-a", "https://example.com/a").await.unwrap();
        let code = url.rsplit('/').next().unwrap().to_string();

        store
            .batch_delete("owner-b", vec![code.clone(), "missing1".to_string()])
            .await
            .unwrap();

        assert!(!store.get(&code).await.unwrap().is_deleted);
    }

    #[tokio::test]
    async fn test_initialize_discards_unterminated_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let complete = "{\"uuid\":1,\"short_url\":\"abcdEFGH\",\"original_url\":\"https://example.com/a\",\"owner_id\":\"user-1\",\"is_deleted\":false}\n";
        std::fs::write(&path, format!("{complete}{{\"uuid\":2,\"short_url\":\"ijk")).unwrap();

        let store = FileUrlStore::new(BASE, Some(path.clone()));
        store.initialize().await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), complete);

        store.save("user-1", "https://example.com/b").await.unwrap();
        let reopened = FileUrlStore::new(BASE, Some(path));
        reopened.initialize().await.unwrap();
        assert_eq!(reopened.len().await, 2);
    }

    #[tokio::test]
    async fn test_initialize_still_rejects_corrupt_complete_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, "{\"short_url\":\n").unwrap();

        let err = FileUrlStore::new(BASE, Some(path))
            .initialize()
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Malformed journal entry");
        assert_eq!(err.details()["line"], 1);
    }

    #[tokio::test]
    async fn test_abandoned_batch_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let store = FileUrlStore::new(BASE, Some(path.clone()));
        store.initialize().await.unwrap();
        store.save("user-1", "https://example.com/a").await.unwrap();
        let before = std::fs::read(&path).unwrap();

        let items: Vec<BatchItem> = (0..500)
            .map(|i| BatchItem::new(i.to_string(), format!("https://example.com/{i}")))
            .collect();

        // Poll the batch once, then drop it while its write is in flight.
        tokio::select! {
            biased;
            _ = store.save_batch("user-1", items) => panic!("batch finished without yielding"),
            _ = std::future::ready(()) => {}
        }

        // Waits for the write task to release the lock.
        assert_eq!(store.len().await, 1);
        assert_eq!(std::fs::read(&path).unwrap(), before);

        let reopened = FileUrlStore::new(BASE, Some(path));
        reopened.initialize().await.unwrap();
        assert_eq!(reopened.len().await, 1);
    }

    #[tokio::test]
    async fn test_abandoned_delete_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let store = FileUrlStore::new(BASE, Some(path.clone()));
        store.initialize().await.unwrap();
        let url = store.save("user-1", "https://example.com/a").await.unwrap();
        let code = url.rsplit('/').next().unwrap().to_string();
        let before = std::fs::read(&path).unwrap();

        tokio::select! {
            biased;
            _ = store.batch_delete("user-1", vec![code.clone()]) => panic!("delete finished without yielding"),
            _ = std::future::ready(()) => {}
        }

        assert!(!store.get(&code).await.unwrap().is_deleted);
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }
}
