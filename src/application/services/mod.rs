//! Business logic services for the application layer.

pub mod batch_service;

pub use batch_service::{BATCH_SIZE, BatchService, WORKER_COUNT};
