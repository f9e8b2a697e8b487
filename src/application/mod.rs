//! Application layer services.
//!
//! Services consume the [`crate::domain::repositories::UrlStore`] trait and
//! add the orchestration that single store calls do not cover.
//!
//! # Available Services
//!
//! - [`services::batch_service::BatchService`] - Worker-pool bulk delete and validated bulk create

pub mod services;
