//! # Staff Account Directory
//!
//! Partner agents, corporates, admins and associates log in with a password.
//! Accounts are keyed by `(role, login)`: usernames for the first three
//! roles, the PAN for associates. Customers have no account; they log in by
//! OTP.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use ce_core::password::is_phc_hash;
use ce_core::{verify_password, Pan, Principal, Role, Timestamp, Username, ValidationError};

use crate::state::AppConfig;

/// Errors from account creation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("{role} account {login:?} already exists")]
    Duplicate { role: Role, login: String },

    #[error("customers log in by OTP and have no account")]
    CustomerAccount,

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// A staff login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Account {
    pub role: Role,
    /// Username, or PAN for associates. Normalized.
    pub login: String,
    pub display_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub active: bool,
    pub created_at: Timestamp,
}

impl Account {
    /// Build an active account, normalizing `login` for the role.
    pub fn new(
        role: Role,
        login: &str,
        display_name: &str,
        password_hash: String,
    ) -> Result<Self, AccountError> {
        let login = normalize_login(role, login)?;
        let display_name = match display_name.trim() {
            "" => login.clone(),
            name => name.to_string(),
        };
        Ok(Self {
            role,
            login,
            display_name,
            password_hash,
            active: true,
            created_at: Timestamp::now(),
        })
    }

    /// The principal a session for this account carries.
    pub fn principal(&self) -> Result<Principal, AccountError> {
        Ok(match self.role {
            Role::Customer => return Err(AccountError::CustomerAccount),
            Role::Agent => Principal::Agent {
                username: Username::new(&self.login)?,
            },
            Role::Corporate => Principal::Corporate {
                username: Username::new(&self.login)?,
            },
            Role::Admin => Principal::Admin {
                username: Username::new(&self.login)?,
            },
            Role::Associate => Principal::Associate {
                pan: Pan::new(&self.login)?,
            },
        })
    }
}

/// Validate and normalize a login for `role`.
pub fn normalize_login(role: Role, login: &str) -> Result<String, AccountError> {
    match role {
        Role::Customer => Err(AccountError::CustomerAccount),
        Role::Associate => Ok(Pan::new(login)?.as_str().to_string()),
        Role::Agent | Role::Corporate | Role::Admin => Ok(Username::new(login)?.as_str().to_string()),
    }
}

/// In-memory directory of staff accounts.
///
/// Lookups are linear scans; the directory holds at most a few hundred
/// staff logins.
#[derive(Debug, Clone, Default)]
pub struct AccountDirectory {
    accounts: Arc<RwLock<Vec<Account>>>,
}

impl AccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account, rejecting a second account with the same key.
    pub fn insert(&self, account: Account) -> Result<(), AccountError> {
        let mut guard = self.accounts.write();
        if guard
            .iter()
            .any(|a| a.role == account.role && a.login == account.login)
        {
            return Err(AccountError::Duplicate {
                role: account.role,
                login: account.login,
            });
        }
        guard.push(account);
        Ok(())
    }

    /// Add or replace an account.
    pub fn upsert(&self, account: Account) {
        let mut guard = self.accounts.write();
        match guard
            .iter_mut()
            .find(|a| a.role == account.role && a.login == account.login)
        {
            Some(existing) => *existing = account,
            None => guard.push(account),
        }
    }

    pub fn find(&self, role: Role, login: &str) -> Option<Account> {
        let login = normalize_login(role, login).ok()?;
        self.accounts
            .read()
            .iter()
            .find(|a| a.role == role && a.login == login)
            .cloned()
    }

    /// Look up `(role, login)` and check the password. Inactive accounts
    /// never authenticate.
    pub fn authenticate(&self, role: Role, login: &str, password: &str) -> Option<Account> {
        let account = self.find(role, login)?;
        if !account.active || !verify_password(password, &account.password_hash) {
            return None;
        }
        Some(account)
    }

    /// Accounts, optionally filtered by role, oldest first.
    pub fn list(&self, role: Option<Role>) -> Vec<Account> {
        self.accounts
            .read()
            .iter()
            .filter(|a| role.map_or(true, |r| a.role == r))
            .cloned()
            .collect()
    }

    pub fn is_active_agent(&self, username: &str) -> bool {
        self.find(Role::Agent, username).is_some_and(|a| a.active)
    }

    pub fn is_associate(&self, pan: &Pan) -> bool {
        self.find(Role::Associate, pan.as_str()).is_some()
    }

    pub fn count_by_role(&self) -> BTreeMap<Role, usize> {
        let mut counts = BTreeMap::new();
        for account in self.accounts.read().iter() {
            *counts.entry(account.role).or_insert(0) += 1;
        }
        counts
    }
}

/// The admin account configured through `CE_ADMIN_USERNAME` and
/// `CE_ADMIN_PASSWORD_HASH`, if both are set and well formed.
pub fn bootstrap_admin(config: &AppConfig) -> Option<Account> {
    let (username, hash) = match (&config.admin_username, &config.admin_password_hash) {
        (Some(u), Some(h)) => (u, h),
        (None, None) => return None,
        _ => {
            tracing::warn!("CE_ADMIN_USERNAME and CE_ADMIN_PASSWORD_HASH must be set together");
            return None;
        }
    };
    if !is_phc_hash(hash) {
        tracing::warn!("CE_ADMIN_PASSWORD_HASH is not an argon2 PHC string, bootstrap admin skipped");
        return None;
    }
    match Account::new(Role::Admin, username, "Administrator", hash.clone()) {
        Ok(account) => Some(account),
        Err(e) => {
            tracing::warn!(error = %e, "invalid CE_ADMIN_USERNAME, bootstrap admin skipped");
            None
        }
    }
}
