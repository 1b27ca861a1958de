//! Associate task persistence operations on the `associate_tasks` table.

use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};

use ce_core::AssociateTask;

use super::{load_paged, LOAD_PAGE_ROWS};

/// Insert a task, or overwrite the stored one with the same id.
pub async fn upsert<'e>(
    executor: impl PgExecutor<'e>,
    task: &AssociateTask,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO associate_tasks (id, associate_pan, client_id, status, body,
         created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (id) DO UPDATE SET
             status = EXCLUDED.status,
             body = EXCLUDED.body,
             updated_at = EXCLUDED.updated_at",
    )
    .bind(*task.id.as_uuid())
    .bind(task.associate_pan.as_str())
    .bind(*task.client_id.as_uuid())
    .bind(task.status.as_str())
    .bind(Json(task))
    .bind(*task.created_at.as_datetime())
    .bind(*task.updated_at.as_datetime())
    .execute(executor)
    .await?;

    Ok(())
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    body: Json<AssociateTask>,
}

/// Load every task, oldest first.
pub async fn load_all(pool: &PgPool) -> Result<Vec<AssociateTask>, sqlx::Error> {
    let rows = load_paged(|offset| {
        sqlx::query_as::<_, TaskRow>(
            "SELECT body FROM associate_tasks ORDER BY created_at ASC, id ASC LIMIT $1 OFFSET $2",
        )
        .bind(LOAD_PAGE_ROWS)
        .bind(offset)
        .fetch_all(pool)
    })
    .await?;

    Ok(rows.into_iter().map(|row| row.body.0).collect())
}
