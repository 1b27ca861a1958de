//! Client persistence operations on the `clients` table.
//!
//! The whole [`Client`] (profiles and portal credentials included) is kept
//! in the JSONB `body`; the other columns are lookup keys.

use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use ce_core::Client;

use super::{load_paged, LOAD_PAGE_ROWS};

/// Insert a client, or overwrite the stored one with the same id.
pub async fn upsert<'e>(executor: impl PgExecutor<'e>, client: &Client) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO clients (id, mobile_number, assigned_agent, created_by_role,
         created_by_id, body, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (id) DO UPDATE SET
             mobile_number = EXCLUDED.mobile_number,
             assigned_agent = EXCLUDED.assigned_agent,
             body = EXCLUDED.body,
             updated_at = EXCLUDED.updated_at",
    )
    .bind(*client.id.as_uuid())
    .bind(client.mobile_number.as_str())
    .bind(client.assigned_agent.as_deref())
    .bind(client.created_by.role.as_str())
    .bind(&client.created_by.id)
    .bind(Json(client))
    .bind(*client.created_at.as_datetime())
    .bind(*client.updated_at.as_datetime())
    .execute(executor)
    .await?;

    Ok(())
}

#[derive(sqlx::FromRow)]
struct ClientRow {
    id: Uuid,
    body: Json<Client>,
}

impl ClientRow {
    fn into_record(self) -> Client {
        let client = self.body.0;
        if *client.id.as_uuid() != self.id {
            tracing::warn!(row_id = %self.id, body_id = %client.id, "client row id differs from body id");
        }
        client
    }
}

/// Load every client, oldest first.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Client>, sqlx::Error> {
    let rows = load_paged(|offset| {
        sqlx::query_as::<_, ClientRow>(
            "SELECT id, body FROM clients ORDER BY created_at ASC, id ASC LIMIT $1 OFFSET $2",
        )
        .bind(LOAD_PAGE_ROWS)
        .bind(offset)
        .fetch_all(pool)
    })
    .await?;

    Ok(rows.into_iter().map(ClientRow::into_record).collect())
}
