//! # Associate Tasks
//!
//! Field work (document pickup, verification visits) that an admin assigns
//! to an associate. Tasks move `open → in_progress → done`; only an admin
//! may reopen a finished task.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::error::{require_text, ValidationError};
use crate::identity::{ClientId, Pan, TaskId};
use crate::principal::Role;
use crate::service::ServiceKind;
use crate::temporal::Timestamp;

/// Lifecycle of an associate task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Done,
}

impl TaskStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }

    fn is_forward_step(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Open, Self::InProgress) | (Self::InProgress, Self::Done)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from task status changes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The requested status change is not allowed for this role.
    #[error("task cannot move from {from} to {to} as {role}")]
    InvalidTransition {
        from: TaskStatus,
        to: TaskStatus,
        role: Role,
    },
}

/// A unit of field work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AssociateTask {
    pub id: TaskId,
    /// PAN of the associate the task is assigned to.
    pub associate_pan: Pan,
    pub client_id: ClientId,
    pub service: ServiceKind,
    pub title: String,
    #[serde(default)]
    pub notes: String,
    pub status: TaskStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AssociateTask {
    /// Create an open task.
    pub fn new(
        associate_pan: Pan,
        client_id: ClientId,
        service: ServiceKind,
        title: &str,
        notes: &str,
    ) -> Result<Self, ValidationError> {
        require_text("title", title, 200)?;
        if notes.chars().count() > 2000 {
            return Err(ValidationError::TooLong {
                field: "notes",
                max: 2000,
            });
        }
        let now = Timestamp::now();
        Ok(Self {
            id: TaskId::new(),
            associate_pan,
            client_id,
            service,
            title: title.trim().to_string(),
            notes: notes.trim().to_string(),
            status: TaskStatus::Open,
            created_at: now,
            updated_at: now,
        })
    }

    /// Change status on behalf of `role`.
    ///
    /// Associates may only step forward. Admins may additionally move a
    /// task back to `open`. Setting the current status again is a no-op.
    pub fn set_status(&mut self, to: TaskStatus, role: Role) -> Result<(), TaskError> {
        if self.status == to {
            return Ok(());
        }
        let allowed = self.status.is_forward_step(to)
            || (role == Role::Admin && to == TaskStatus::Open);
        if !allowed {
            return Err(TaskError::InvalidTransition {
                from: self.status,
                to,
                role,
            });
        }
        self.status = to;
        self.updated_at = Timestamp::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> AssociateTask {
        AssociateTask::new(
            Pan::new("ABCDE1234F").unwrap(),
            ClientId::new(),
            ServiceKind::Accounting,
            "Collect bank statements",
            "",
        )
        .unwrap()
    }

    #[test]
    fn forward_path() {
        let mut t = task();
        t.set_status(TaskStatus::InProgress, Role::Associate).unwrap();
        t.set_status(TaskStatus::Done, Role::Associate).unwrap();
        assert_eq!(t.status, TaskStatus::Done);
    }

    #[test]
    fn associate_cannot_skip_or_reopen() {
        let mut t = task();
        assert!(t.set_status(TaskStatus::Done, Role::Associate).is_err());
        t.set_status(TaskStatus::InProgress, Role::Associate).unwrap();
        t.set_status(TaskStatus::Done, Role::Associate).unwrap();
        let err = t.set_status(TaskStatus::Open, Role::Associate).unwrap_err();
        assert!(matches!(err, TaskError::InvalidTransition { .. }));
    }

    #[test]
    fn admin_can_reopen() {
        let mut t = task();
        t.set_status(TaskStatus::InProgress, Role::Associate).unwrap();
        t.set_status(TaskStatus::Done, Role::Associate).unwrap();
        t.set_status(TaskStatus::Open, Role::Admin).unwrap();
        assert_eq!(t.status, TaskStatus::Open);
    }

    #[test]
    fn same_status_is_noop() {
        let mut t = task();
        assert!(t.set_status(TaskStatus::Open, Role::Associate).is_ok());
    }

    #[test]
    fn blank_title_rejected() {
        assert!(AssociateTask::new(
            Pan::new("ABCDE1234F").unwrap(),
            ClientId::new(),
            ServiceKind::Accounting,
            " ",
            "",
        )
        .is_err());
    }
}
