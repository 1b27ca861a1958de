//! Staff account persistence operations on the `accounts` table.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};

use ce_core::{Role, Timestamp};

use crate::accounts::Account;

use super::{load_paged, LOAD_PAGE_ROWS};

/// Insert a new account. Fails on a duplicate `(role, login)`.
pub async fn insert<'e>(executor: impl PgExecutor<'e>, account: &Account) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO accounts (role, login, display_name, password_hash, active, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(account.role.as_str())
    .bind(&account.login)
    .bind(&account.display_name)
    .bind(&account.password_hash)
    .bind(account.active)
    .bind(*account.created_at.as_datetime())
    .execute(executor)
    .await?;

    Ok(())
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    role: String,
    login: String,
    display_name: String,
    password_hash: String,
    active: bool,
    created_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_record(self) -> Option<Account> {
        let role = match self.role.parse::<Role>() {
            Ok(role) => role,
            Err(e) => {
                tracing::warn!(role = %self.role, login = %self.login, error = %e, "skipping account with unknown role");
                return None;
            }
        };
        Some(Account {
            role,
            login: self.login,
            display_name: self.display_name,
            password_hash: self.password_hash,
            active: self.active,
            created_at: Timestamp::from_utc(self.created_at),
        })
    }
}

/// Load every account. Rows with an unrecognized role are skipped.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Account>, sqlx::Error> {
    let rows = load_paged(|offset| {
        sqlx::query_as::<_, AccountRow>(
            "SELECT role, login, display_name, password_hash, active, created_at
             FROM accounts ORDER BY created_at ASC, role ASC, login ASC LIMIT $1 OFFSET $2",
        )
        .bind(LOAD_PAGE_ROWS)
        .bind(offset)
        .fetch_all(pool)
    })
    .await?;

    Ok(rows.into_iter().filter_map(AccountRow::into_record).collect())
}
