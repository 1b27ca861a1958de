//! # Database Persistence Layer
//!
//! Optional PostgreSQL persistence via SQLx. When `DATABASE_URL` is set,
//! clients, submissions, accounts and associate tasks are written to
//! Postgres before the in-memory store, and loaded back at startup. When
//! absent, the service runs in memory only (development and tests).
//!
//! Sessions, OTP challenges and filing wizards are never persisted.
//!
//! Writer functions take any [`sqlx::PgExecutor`], so the repository can
//! run several of them inside one transaction.

pub mod accounts;
pub mod clients;
pub mod submissions;
pub mod tasks;

use std::future::Future;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Rows fetched per query when loading a table at startup.
pub const LOAD_PAGE_ROWS: i64 = 10_000;

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            tracing::warn!(
                "DATABASE_URL not set, running in-memory only mode. \
                 Records will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Fetch a whole table one page at a time. `fetch_page` receives the offset
/// of the first row it should return and must order rows deterministically.
/// Stops at the first short page.
pub async fn load_paged<R, F, Fut>(mut fetch_page: F) -> Result<Vec<R>, sqlx::Error>
where
    F: FnMut(i64) -> Fut,
    Fut: Future<Output = Result<Vec<R>, sqlx::Error>>,
{
    let mut rows = Vec::new();
    loop {
        let offset = i64::try_from(rows.len()).unwrap_or(i64::MAX);
        let page = fetch_page(offset).await?;
        let short = i64::try_from(page.len()).unwrap_or(i64::MAX) < LOAD_PAGE_ROWS;
        rows.extend(page);
        if short {
            return Ok(rows);
        }
        tracing::debug!(loaded = rows.len(), "loading next page");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_table(len: usize) -> Vec<usize> {
        (0..len).collect()
    }

    async fn page_of(table: &[usize], offset: i64) -> Result<Vec<usize>, sqlx::Error> {
        let start = (offset as usize).min(table.len());
        let end = (start + LOAD_PAGE_ROWS as usize).min(table.len());
        Ok(table[start..end].to_vec())
    }

    #[tokio::test]
    async fn load_paged_reads_past_one_page() {
        let table = fake_table(2 * LOAD_PAGE_ROWS as usize + 17);
        let mut calls = 0;
        let rows = load_paged(|offset| {
            calls += 1;
            page_of(&table, offset)
        })
        .await
        .unwrap();
        assert_eq!(rows, table);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn load_paged_exact_multiple_ends_on_empty_page() {
        let table = fake_table(LOAD_PAGE_ROWS as usize);
        let mut offsets = Vec::new();
        let rows = load_paged(|offset| {
            offsets.push(offset);
            page_of(&table, offset)
        })
        .await
        .unwrap();
        assert_eq!(rows.len(), table.len());
        assert_eq!(offsets, vec![0, LOAD_PAGE_ROWS]);
    }

    #[tokio::test]
    async fn load_paged_empty_table() {
        let rows = load_paged(|offset| page_of(&[], offset)).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn load_paged_propagates_errors() {
        let result: Result<Vec<usize>, _> =
            load_paged(|_| async { Err(sqlx::Error::RowNotFound) }).await;
        assert!(matches!(result, Err(sqlx::Error::RowNotFound)));
    }
}
