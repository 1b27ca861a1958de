//! Submission persistence operations on the `submissions` table.
//!
//! Status rules are enforced by `ce_state::Submission`, not in SQL. The
//! `status` column holds the display label so operators can filter on it
//! directly.

use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};

use ce_state::Submission;

use super::{load_paged, LOAD_PAGE_ROWS};

/// Insert a submission, or overwrite the stored one with the same id.
pub async fn upsert<'e>(
    executor: impl PgExecutor<'e>,
    submission: &Submission,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO submissions (id, client_id, profile_id, service, status, body,
         created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (id) DO UPDATE SET
             status = EXCLUDED.status,
             body = EXCLUDED.body,
             updated_at = EXCLUDED.updated_at",
    )
    .bind(*submission.id.as_uuid())
    .bind(*submission.client_id.as_uuid())
    .bind(*submission.profile_id.as_uuid())
    .bind(submission.service.as_str())
    .bind(submission.status.label())
    .bind(Json(submission))
    .bind(*submission.created_at.as_datetime())
    .bind(*submission.updated_at.as_datetime())
    .execute(executor)
    .await?;

    Ok(())
}

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    body: Json<Submission>,
}

/// Load every submission, oldest first.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Submission>, sqlx::Error> {
    let rows = load_paged(|offset| {
        sqlx::query_as::<_, SubmissionRow>(
            "SELECT body FROM submissions ORDER BY created_at ASC, id ASC LIMIT $1 OFFSET $2",
        )
        .bind(LOAD_PAGE_ROWS)
        .bind(offset)
        .fetch_all(pool)
    })
    .await?;

    Ok(rows.into_iter().map(|row| row.body.0).collect())
}
