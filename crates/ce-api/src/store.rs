//! # In-Memory Record Store
//!
//! Storage traits for clients, submissions and associate tasks, and
//! [`MemoryStore`], which implements all three over one `parking_lot`
//! lock. Writes that touch several tables (a service application adds a
//! profile to a client and creates its submission) commit under a single
//! write guard, so readers never observe half of one.
//!
//! Records are kept in insertion order and looked up by linear scan.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use ce_core::{AssociateTask, Client, ClientId, MobileNumber, Pan, SubmissionId, TaskId};
use ce_state::{Submission, SubmissionStatus};

/// Missing-record errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("client {0} not found")]
    ClientNotFound(ClientId),
    #[error("submission {0} not found")]
    SubmissionNotFound(SubmissionId),
    #[error("task {0} not found")]
    TaskNotFound(TaskId),
}

pub trait ClientStore {
    /// Insert a client, or replace the one with the same id.
    fn put_client(&self, client: Client);
    fn get_client(&self, id: ClientId) -> Option<Client>;
    fn list_clients(&self) -> Vec<Client>;
    /// All and only the clients registered to `mobile`.
    fn find_clients_by_mobile(&self, mobile: &MobileNumber) -> Vec<Client>;
    fn clients_for_agent(&self, username: &str) -> Vec<Client>;
}

pub trait SubmissionStore {
    /// Insert or replace a submission. Its client must exist.
    fn put_submission(&self, submission: Submission) -> Result<(), StoreError>;
    fn get_submission(&self, id: SubmissionId) -> Option<Submission>;
    fn list_submissions(&self, status: Option<SubmissionStatus>) -> Vec<Submission>;
    fn submissions_for_client(&self, client_id: ClientId) -> Vec<Submission>;
    /// Replace `client` and insert `submission` in one step. The client
    /// must already exist and the submission must belong to it.
    fn commit_application(&self, client: Client, submission: Submission) -> Result<(), StoreError>;
}

pub trait TaskStore {
    /// Insert or replace a task. Its client must exist.
    fn put_task(&self, task: AssociateTask) -> Result<(), StoreError>;
    fn get_task(&self, id: TaskId) -> Option<AssociateTask>;
    fn list_tasks(&self) -> Vec<AssociateTask>;
    fn tasks_for_associate(&self, pan: &Pan) -> Vec<AssociateTask>;
}

#[derive(Debug, Default)]
struct Tables {
    clients: Vec<Client>,
    submissions: Vec<Submission>,
    tasks: Vec<AssociateTask>,
}

impl Tables {
    fn has_client(&self, id: ClientId) -> bool {
        self.clients.iter().any(|c| c.id == id)
    }

    fn upsert_client(&mut self, client: Client) {
        match self.clients.iter_mut().find(|c| c.id == client.id) {
            Some(slot) => *slot = client,
            None => self.clients.push(client),
        }
    }

    fn upsert_submission(&mut self, submission: Submission) {
        match self.submissions.iter_mut().find(|s| s.id == submission.id) {
            Some(slot) => *slot = submission,
            None => self.submissions.push(submission),
        }
    }
}

/// All records in memory, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record counts: (clients, submissions, tasks).
    pub fn counts(&self) -> (usize, usize, usize) {
        let t = self.tables.read();
        (t.clients.len(), t.submissions.len(), t.tasks.len())
    }
}

impl ClientStore for MemoryStore {
    fn put_client(&self, client: Client) {
        self.tables.write().upsert_client(client);
    }

    fn get_client(&self, id: ClientId) -> Option<Client> {
        self.tables.read().clients.iter().find(|c| c.id == id).cloned()
    }

    fn list_clients(&self) -> Vec<Client> {
        self.tables.read().clients.clone()
    }

    fn find_clients_by_mobile(&self, mobile: &MobileNumber) -> Vec<Client> {
        self.tables
            .read()
            .clients
            .iter()
            .filter(|c| c.is_owned_by(mobile))
            .cloned()
            .collect()
    }

    fn clients_for_agent(&self, username: &str) -> Vec<Client> {
        self.tables
            .read()
            .clients
            .iter()
            .filter(|c| c.is_assigned_to(username))
            .cloned()
            .collect()
    }
}

impl SubmissionStore for MemoryStore {
    fn put_submission(&self, submission: Submission) -> Result<(), StoreError> {
        let mut t = self.tables.write();
        if !t.has_client(submission.client_id) {
            return Err(StoreError::ClientNotFound(submission.client_id));
        }
        t.upsert_submission(submission);
        Ok(())
    }

    fn get_submission(&self, id: SubmissionId) -> Option<Submission> {
        self.tables
            .read()
            .submissions
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    fn list_submissions(&self, status: Option<SubmissionStatus>) -> Vec<Submission> {
        self.tables
            .read()
            .submissions
            .iter()
            .filter(|s| status.map_or(true, |st| s.status == st))
            .cloned()
            .collect()
    }

    fn submissions_for_client(&self, client_id: ClientId) -> Vec<Submission> {
        self.tables
            .read()
            .submissions
            .iter()
            .filter(|s| s.client_id == client_id)
            .cloned()
            .collect()
    }

    fn commit_application(&self, client: Client, submission: Submission) -> Result<(), StoreError> {
        let mut t = self.tables.write();
        if !t.has_client(client.id) || submission.client_id != client.id {
            return Err(StoreError::ClientNotFound(submission.client_id));
        }
        t.upsert_client(client);
        t.upsert_submission(submission);
        Ok(())
    }
}

impl TaskStore for MemoryStore {
    fn put_task(&self, task: AssociateTask) -> Result<(), StoreError> {
        let mut t = self.tables.write();
        if !t.has_client(task.client_id) {
            return Err(StoreError::ClientNotFound(task.client_id));
        }
        match t.tasks.iter_mut().find(|x| x.id == task.id) {
            Some(slot) => *slot = task,
            None => t.tasks.push(task),
        }
        Ok(())
    }

    fn get_task(&self, id: TaskId) -> Option<AssociateTask> {
        self.tables.read().tasks.iter().find(|t| t.id == id).cloned()
    }

    fn list_tasks(&self) -> Vec<AssociateTask> {
        self.tables.read().tasks.clone()
    }

    fn tasks_for_associate(&self, pan: &Pan) -> Vec<AssociateTask> {
        self.tables
            .read()
            .tasks
            .iter()
            .filter(|t| &t.associate_pan == pan)
            .cloned()
            .collect()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
