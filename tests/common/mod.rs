#![allow(dead_code)]

use sqlx::PgPool;
use std::path::Path;
use std::sync::Arc;
use url_store::domain::entities::BatchItem;
use url_store::domain::repositories::UrlStore;
use url_store::infrastructure::persistence::{FileUrlStore, PgUrlStore};

pub const BASE_URL: &str = "http://localhost:8080";

/// Last path segment of an issued short URL.
pub fn short_code(short_url: &str) -> String {
    short_url.rsplit('/').next().unwrap_or_default().to_string()
}

pub fn batch(urls: &[&str]) -> Vec<BatchItem> {
    urls.iter()
        .enumerate()
        .map(|(i, url)| BatchItem::new(format!("c{i}"), *url))
        .collect()
}

pub async fn create_file_store(path: &Path) -> FileUrlStore {
    let store = FileUrlStore::new(BASE_URL, Some(path.to_path_buf()));
    store.initialize().await.unwrap();
    store
}

pub async fn create_pg_store(pool: PgPool) -> PgUrlStore {
    let store = PgUrlStore::new(Arc::new(pool), BASE_URL);
    store.initialize().await.unwrap();
    store
}

pub async fn count_urls(pool: &PgPool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM urls")
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn insert_url(pool: &PgPool, code: &str, url: &str, owner_id: &str) {
    sqlx::query("INSERT INTO urls (short_url, original_url, owner_id) VALUES ($1, $2, $3)")
        .bind(code)
        .bind(url)
        .bind(owner_id)
        .execute(pool)
        .await
        .unwrap();
}
