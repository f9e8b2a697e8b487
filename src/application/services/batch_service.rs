//! Bulk creation and bulk soft-deletion.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::domain::entities::{BatchItem, BatchResult};
use crate::domain::repositories::UrlStore;
use crate::error::AppError;
use crate::utils::url_validator::ensure_valid_url;

/// Ids a delete worker buffers before flushing them to the store.
pub const BATCH_SIZE: usize = 100;

/// Concurrent delete workers per [`BatchService::batch_delete`] call.
pub const WORKER_COUNT: usize = 5;

/// Coordinates batch operations over a [`UrlStore`].
///
/// Deletes fan out over [`WORKER_COUNT`] tasks pulling from one bounded queue;
/// each worker owns its buffer. Creates are validated up front and handed to
/// [`UrlStore::save_batch`] in one call.
pub struct BatchService<S: UrlStore + ?Sized> {
    store: Arc<S>,
    timeout: Option<Duration>,
}

impl<S: UrlStore + ?Sized + 'static> BatchService<S> {
    /// Creates a batch service without a deadline.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    /// Bounds every batch call by `timeout`.
    ///
    /// On expiry the in-flight work is dropped: delete workers are aborted and
    /// an open create transaction rolls back.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Shortens every item for `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for the first invalid URL; nothing is written.
    /// Returns [`AppError::Storage`] if the store fails or the deadline passes.
    pub async fn batch_create(
        &self,
        owner_id: &str,
        items: Vec<BatchItem>,
    ) -> Result<Vec<BatchResult>, AppError> {
        for item in &items {
            ensure_valid_url(&item.original_url)?;
        }

        debug!("Creating batch of {} URLs", items.len());
        self.with_deadline(self.store.save_batch(owner_id, items))
            .await
    }

    /// Soft-deletes `short_codes` owned by `owner_id`.
    ///
    /// Codes go through one queue shared by [`WORKER_COUNT`] workers, so a slow
    /// or dead worker does not hold back the rest. Each worker flushes every
    /// [`BATCH_SIZE`] codes and once more for its remainder. A failed flush
    /// does not stop the other flushes; the call still fails.
    ///
    /// # Errors
    ///
    /// Returns the first flush error, or [`AppError::Storage`] if the deadline passes.
    pub async fn batch_delete(
        &self,
        owner_id: &str,
        short_codes: Vec<String>,
    ) -> Result<(), AppError> {
        if short_codes.is_empty() {
            return Ok(());
        }

        debug!("Deleting {} short codes", short_codes.len());
        self.with_deadline(self.fan_out_delete(owner_id, short_codes))
            .await
    }

    async fn fan_out_delete(&self, owner_id: &str, short_codes: Vec<String>) -> Result<(), AppError> {
        let (tx, rx) = mpsc::channel(BATCH_SIZE);
        let rx = Arc::new(Mutex::new(rx));
        let mut workers = JoinSet::new();

        for worker_id in 0..WORKER_COUNT {
            workers.spawn(run_delete_worker(
                worker_id,
                Arc::clone(&self.store),
                owner_id.to_string(),
                Arc::clone(&rx),
            ));
        }
        drop(rx);

        for code in short_codes {
            if tx.send(code).await.is_err() {
                // Every worker is gone; their errors surface on join.
                break;
            }
        }
        drop(tx);

        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            let outcome = joined.unwrap_or_else(|e| {
                Err(AppError::storage(
                    "Delete worker panicked",
                    json!({ "reason": e.to_string() }),
                ))
            });
            if let Err(e) = outcome {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn with_deadline<T>(
        &self,
        work: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        let Some(timeout) = self.timeout else {
            return work.await;
        };

        tokio::time::timeout(timeout, work).await.map_err(|_| {
            AppError::storage(
                "Batch operation timed out",
                json!({ "timeout_ms": timeout.as_millis() as u64 }),
            )
        })?
    }
}

/// Pulls from the shared queue, flushing every [`BATCH_SIZE`] codes and on close.
///
/// Keeps going after a failed flush and reports the first failure.
async fn run_delete_worker<S: UrlStore + ?Sized>(
    worker_id: usize,
    store: Arc<S>,
    owner_id: String,
    rx: Arc<Mutex<mpsc::Receiver<String>>>,
) -> Result<(), AppError> {
    let mut batch = Vec::with_capacity(BATCH_SIZE);
    let mut first_error = None;

    loop {
        // The lock is released before flushing so idle workers keep pulling.
        let next = rx.lock().await.recv().await;
        let Some(code) = next else {
            break;
        };
        batch.push(code);

        if batch.len() == BATCH_SIZE {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(BATCH_SIZE));
            if let Err(e) = store.batch_delete(&owner_id, full).await {
                warn!("Delete worker {} flush failed: {}", worker_id, e);
                first_error.get_or_insert(e);
            }
        }
    }

    if !batch.is_empty()
        && let Err(e) = store.batch_delete(&owner_id, batch).await
    {
        warn!("Delete worker {} final flush failed: {}", worker_id, e);
        first_error.get_or_insert(e);
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
