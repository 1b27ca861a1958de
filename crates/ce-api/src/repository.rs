//! # Repository
//!
//! The service's single write path for clients, submissions, associate
//! tasks and staff accounts.
//!
//! Reads come from the in-memory [`MemoryStore`]. Writes are applied to a
//! copy of the record, persisted to PostgreSQL when a pool is configured
//! (inside one transaction when several rows change), and only then
//! published to memory. A failed database write therefore leaves memory
//! untouched. Writers are serialized through an async gate so two
//! read-modify-write cycles on the same record cannot interleave across
//! the database `.await`.
//!
//! Referential rules enforced here:
//!
//! - a submission's or task's `client_id` names an existing client;
//! - `assigned_agent` names an existing active agent account;
//! - a task's `associate_pan` names an associate account.

use std::sync::Arc;

use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::Mutex;

use ce_core::{
    AssociateTask, Client, ClientId, CreatedBy, Document, GstCredentials, ItrCredentials,
    MobileNumber, NewClient, Pan, Profile, Role, ServiceKind, SubmissionId, TaskError, TaskId,
    TaskStatus, ValidationError,
};
use ce_state::{FilingOutcome, Submission, SubmissionError, SubmissionStatus};

use crate::accounts::{Account, AccountDirectory, AccountError};
use crate::db;
use crate::store::{ClientStore, MemoryStore, StoreError, SubmissionStore, TaskStore};

/// Errors from repository operations.
#[derive(Error, Debug)]
pub enum RepoError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("no active agent account {0:?}")]
    UnknownAgent(String),

    #[error("no associate account with PAN {0}")]
    UnknownAssociate(String),
}

/// Memory store plus optional PostgreSQL write-through.
#[derive(Clone)]
pub struct Repository {
    store: MemoryStore,
    accounts: AccountDirectory,
    pool: Option<PgPool>,
    write_gate: Arc<Mutex<()>>,
}

impl Repository {
    pub fn new(store: MemoryStore, accounts: AccountDirectory, pool: Option<PgPool>) -> Self {
        Self {
            store,
            accounts,
            pool,
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn accounts(&self) -> &AccountDirectory {
        &self.accounts
    }

    /// Load every persisted record into memory. No-op without a pool.
    pub async fn hydrate(&self) -> Result<(), sqlx::Error> {
        let Some(pool) = &self.pool else {
            return Ok(());
        };

        let accounts = db::accounts::load_all(pool).await?;
        let account_count = accounts.len();
        for account in accounts {
            self.accounts.upsert(account);
        }

        let clients = db::clients::load_all(pool).await?;
        let client_count = clients.len();
        for client in clients {
            self.store.put_client(client);
        }

        let submissions = db::submissions::load_all(pool).await?;
        let submission_count = submissions.len();
        for submission in submissions {
            if let Err(e) = self.store.put_submission(submission) {
                tracing::warn!(error = %e, "skipping persisted submission");
            }
        }

        let tasks = db::tasks::load_all(pool).await?;
        let task_count = tasks.len();
        for task in tasks {
            if let Err(e) = self.store.put_task(task) {
                tracing::warn!(error = %e, "skipping persisted task");
            }
        }

        tracing::info!(
            accounts = account_count,
            clients = client_count,
            submissions = submission_count,
            tasks = task_count,
            "Hydrated in-memory store from database"
        );
        Ok(())
    }

    // -- Clients --------------------------------------------------------------

    /// Register a client. No duplicate check on mobile and name: one
    /// person may file for several entities.
    pub async fn add_client(&self, new: NewClient, created_by: CreatedBy) -> Result<Client, RepoError> {
        let client = Client::create(new, created_by);
        let _gate = self.write_gate.lock().await;
        if let Some(pool) = &self.pool {
            db::clients::upsert(pool, &client).await?;
        }
        self.store.put_client(client.clone());
        tracing::info!(
            client_id = %client.id,
            created_by = client.created_by.role.as_str(),
            "client created"
        );
        Ok(client)
    }

    pub fn get_client(&self, id: ClientId) -> Option<Client> {
        self.store.get_client(id)
    }

    pub fn list_clients(&self) -> Vec<Client> {
        self.store.list_clients()
    }

    pub fn find_clients_by_mobile(&self, mobile: &MobileNumber) -> Vec<Client> {
        self.store.find_clients_by_mobile(mobile)
    }

    pub fn clients_for_agent(&self, username: &str) -> Vec<Client> {
        self.store.clients_for_agent(username)
    }

    pub fn clients_created_by(&self, role: Role, id: &str) -> Vec<Client> {
        self.store
            .list_clients()
            .into_iter()
            .filter(|c| c.was_created_by(role, id))
            .collect()
    }

    pub async fn update_gst_credentials(
        &self,
        id: ClientId,
        credentials: GstCredentials,
    ) -> Result<Client, RepoError> {
        self.update_client(id, |c| c.gst_credentials = Some(credentials))
            .await
    }

    pub async fn update_itr_credentials(
        &self,
        id: ClientId,
        credentials: ItrCredentials,
    ) -> Result<Client, RepoError> {
        self.update_client(id, |c| c.itr_credentials = Some(credentials))
            .await
    }

    /// Assign the client to an agent. The agent must have an active account.
    pub async fn assign_agent(&self, id: ClientId, username: &str) -> Result<Client, RepoError> {
        let account = self
            .accounts
            .find(Role::Agent, username)
            .filter(|a| a.active)
            .ok_or_else(|| RepoError::UnknownAgent(username.to_string()))?;
        let client = self
            .update_client(id, |c| c.assigned_agent = Some(account.login.clone()))
            .await?;
        tracing::info!(client_id = %id, agent = %account.login, "agent assigned");
        Ok(client)
    }

    async fn update_client(
        &self,
        id: ClientId,
        update: impl FnOnce(&mut Client),
    ) -> Result<Client, RepoError> {
        let _gate = self.write_gate.lock().await;
        let mut client = self
            .store
            .get_client(id)
            .ok_or(StoreError::ClientNotFound(id))?;
        update(&mut client);
        client.touch();
        if let Some(pool) = &self.pool {
            db::clients::upsert(pool, &client).await?;
        }
        self.store.put_client(client.clone());
        Ok(client)
    }

    // -- Service applications -------------------------------------------------

    /// Append a profile to the client and create its submission, both in
    /// one commit. The submission starts in the service's initial status.
    pub async fn process_service_application(
        &self,
        client_id: ClientId,
        service: ServiceKind,
        extracted_data: Value,
        documents: Vec<Document>,
    ) -> Result<(Client, Submission), RepoError> {
        let status = SubmissionStatus::initial_for(service);
        self.commit_application(client_id, service, extracted_data, documents, status, |_| {})
            .await
    }

    /// Record a finished filing wizard: its profile, its submission in the
    /// status the wizard chose, and any portal credentials it captured.
    pub async fn record_filing(&self, outcome: FilingOutcome) -> Result<(Client, Submission), RepoError> {
        let FilingOutcome {
            filing_id,
            client_id,
            service,
            status,
            extracted_data,
            documents,
            gst_credentials,
            itr_credentials,
        } = outcome;
        let result = self
            .commit_application(client_id, service, extracted_data, documents, status, |c| {
                if let Some(creds) = gst_credentials {
                    c.gst_credentials = Some(creds);
                }
                if let Some(creds) = itr_credentials {
                    c.itr_credentials = Some(creds);
                }
            })
            .await?;
        tracing::info!(%filing_id, submission_id = %result.1.id, "filing recorded");
        Ok(result)
    }

    async fn commit_application(
        &self,
        client_id: ClientId,
        service: ServiceKind,
        extracted_data: Value,
        documents: Vec<Document>,
        status: SubmissionStatus,
        update: impl FnOnce(&mut Client),
    ) -> Result<(Client, Submission), RepoError> {
        let _gate = self.write_gate.lock().await;
        let mut client = self
            .store
            .get_client(client_id)
            .ok_or(StoreError::ClientNotFound(client_id))?;

        let profile = Profile::new(service, extracted_data.clone());
        let submission = Submission::new(
            client_id,
            profile.id,
            service,
            extracted_data,
            documents,
            status,
        );
        update(&mut client);
        client.add_profile(profile);

        if let Some(pool) = &self.pool {
            let mut tx = pool.begin().await?;
            db::clients::upsert(&mut *tx, &client).await?;
            db::submissions::upsert(&mut *tx, &submission).await?;
            tx.commit().await?;
        }
        self.store
            .commit_application(client.clone(), submission.clone())?;

        metrics::counter!("ce_submissions_created_total", "service" => service.as_str())
            .increment(1);
        tracing::info!(
            %client_id,
            submission_id = %submission.id,
            service = service.as_str(),
            status = %submission.status,
            "service application recorded"
        );
        Ok((client, submission))
    }

    // -- Submissions ----------------------------------------------------------

    pub fn get_submission(&self, id: SubmissionId) -> Option<Submission> {
        self.store.get_submission(id)
    }

    pub fn list_submissions(&self, status: Option<SubmissionStatus>) -> Vec<Submission> {
        self.store.list_submissions(status)
    }

    pub fn submissions_for_client(&self, client_id: ClientId) -> Vec<Submission> {
        self.store.submissions_for_client(client_id)
    }

    /// Move a submission along its lifecycle, recording `actor` and `reason`.
    pub async fn transition_submission(
        &self,
        id: SubmissionId,
        to: SubmissionStatus,
        reason: &str,
        actor: &str,
    ) -> Result<Submission, RepoError> {
        let _gate = self.write_gate.lock().await;
        let mut submission = self
            .store
            .get_submission(id)
            .ok_or(StoreError::SubmissionNotFound(id))?;
        let from = submission.status;
        submission.transition(to, reason, actor)?;
        if let Some(pool) = &self.pool {
            db::submissions::upsert(pool, &submission).await?;
        }
        self.store.put_submission(submission.clone())?;
        tracing::info!(submission_id = %id, %from, %to, actor, "submission status changed");
        Ok(submission)
    }

    // -- Associate tasks ------------------------------------------------------

    /// Create an open task for an associate on an existing client.
    pub async fn create_task(
        &self,
        associate_pan: Pan,
        client_id: ClientId,
        service: ServiceKind,
        title: &str,
        notes: &str,
    ) -> Result<AssociateTask, RepoError> {
        if !self.accounts.is_associate(&associate_pan) {
            return Err(RepoError::UnknownAssociate(associate_pan.to_string()));
        }
        if self.store.get_client(client_id).is_none() {
            return Err(StoreError::ClientNotFound(client_id).into());
        }
        let task = AssociateTask::new(associate_pan, client_id, service, title, notes)?;
        let _gate = self.write_gate.lock().await;
        if let Some(pool) = &self.pool {
            db::tasks::upsert(pool, &task).await?;
        }
        self.store.put_task(task.clone())?;
        tracing::info!(task_id = %task.id, associate = %task.associate_pan, "task created");
        Ok(task)
    }

    pub fn get_task(&self, id: TaskId) -> Option<AssociateTask> {
        self.store.get_task(id)
    }

    pub fn list_tasks(&self) -> Vec<AssociateTask> {
        self.store.list_tasks()
    }

    pub fn tasks_for_associate(&self, pan: &Pan) -> Vec<AssociateTask> {
        self.store.tasks_for_associate(pan)
    }

    pub async fn set_task_status(
        &self,
        id: TaskId,
        to: TaskStatus,
        role: Role,
    ) -> Result<AssociateTask, RepoError> {
        let _gate = self.write_gate.lock().await;
        let mut task = self.store.get_task(id).ok_or(StoreError::TaskNotFound(id))?;
        task.set_status(to, role)?;
        if let Some(pool) = &self.pool {
            db::tasks::upsert(pool, &task).await?;
        }
        self.store.put_task(task.clone())?;
        tracing::info!(task_id = %id, status = %task.status, "task status changed");
        Ok(task)
    }

    // -- Accounts -------------------------------------------------------------

    /// Add a staff account. Duplicate `(role, login)` pairs are rejected.
    pub async fn create_account(&self, account: Account) -> Result<Account, RepoError> {
        let _gate = self.write_gate.lock().await;
        if self.accounts.find(account.role, &account.login).is_some() {
            return Err(AccountError::Duplicate {
                role: account.role,
                login: account.login,
            }
            .into());
        }
        if let Some(pool) = &self.pool {
            db::accounts::insert(pool, &account).await?;
        }
        self.accounts.insert(account.clone())?;
        tracing::info!(role = account.role.as_str(), login = %account.login, "account created");
        Ok(account)
    }

    // -- Bulk import ----------------------------------------------------------

    /// Store already-validated clients and submissions in one commit.
    /// Used by the legacy seed at startup.
    pub async fn import(&self, clients: Vec<Client>, submissions: Vec<Submission>) -> Result<(), RepoError> {
        let _gate = self.write_gate.lock().await;
        if let Some(pool) = &self.pool {
            let mut tx = pool.begin().await?;
            for client in &clients {
                db::clients::upsert(&mut *tx, client).await?;
            }
            for submission in &submissions {
                db::submissions::upsert(&mut *tx, submission).await?;
            }
            tx.commit().await?;
        }
        for client in clients {
            self.store.put_client(client);
        }
        for submission in submissions {
            self.store.put_submission(submission)?;
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ce_core::{hash_password, Gstin, Principal, Username};
    use serde_json::json;

    fn repo() -> Repository {
        Repository::new(MemoryStore::new(), AccountDirectory::new(), None)
    }

    fn by_customer(mobile: &str) -> CreatedBy {
        CreatedBy {
            role: Role::Customer,
            id: mobile.to_string(),
        }
    }

    async fn add(repo: &Repository, name: &str, mobile: &str) -> Client {
        let new = NewClient::parse(name, mobile, "owner@example.in", "individual", None).unwrap();
        repo.add_client(new, by_customer(mobile)).await.unwrap()
    }

    async fn add_account(repo: &Repository, role: Role, login: &str) -> Account {
        let account = Account::new(role, login, "", hash_password("password123").unwrap()).unwrap();
        repo.create_account(account).await.unwrap()
    }

    #[tokio::test]
    async fn test_process_service_application_commits_profile_and_submission() {
        let repo = repo();
        let client = add(&repo, "Asha Traders", "9999999999").await;
        let (updated, submission) = repo
            .process_service_application(
                client.id,
                ServiceKind::GstRegistration,
                json!({"business_name": "Asha Traders"}),
                vec![],
            )
            .await
            .unwrap();
        assert_eq!(updated.profiles.len(), 1);
        assert_eq!(submission.profile_id, updated.profiles[0].id);
        assert_eq!(submission.status, SubmissionStatus::Processing);
        assert_eq!(repo.submissions_for_client(client.id), vec![submission]);
    }

    #[tokio::test]
    async fn test_consultation_starts_scheduled() {
        let repo = repo();
        let client = add(&repo, "Asha Traders", "9999999999").await;
        let (_, submission) = repo
            .process_service_application(client.id, ServiceKind::Consultation, json!({}), vec![])
            .await
            .unwrap();
        assert_eq!(submission.status, SubmissionStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_application_for_unknown_client_fails() {
        let repo = repo();
        let err = repo
            .process_service_application(ClientId::new(), ServiceKind::GstReturn, json!({}), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Store(StoreError::ClientNotFound(_))));
        assert!(repo.list_submissions(None).is_empty());
    }

    #[tokio::test]
    async fn test_record_filing_stores_credentials() {
        let repo = repo();
        let client = add(&repo, "Asha Traders", "9999999999").await;
        let gstin = Gstin::new("27ABCDE1234F1Z5").unwrap();
        let outcome = FilingOutcome {
            filing_id: ce_core::FilingId::new(),
            client_id: client.id,
            service: ServiceKind::GstReturn,
            status: SubmissionStatus::NilReturnUnderProcessing,
            extracted_data: json!({"return_type": "nil"}),
            documents: vec![],
            gst_credentials: Some(GstCredentials {
                gstin: gstin.clone(),
                portal_username: "asha_gst".into(),
            }),
            itr_credentials: None,
        };
        let (client, submission) = repo.record_filing(outcome).await.unwrap();
        assert_eq!(submission.status, SubmissionStatus::NilReturnUnderProcessing);
        assert_eq!(client.gst_credentials.unwrap().gstin, gstin);
    }

    #[tokio::test]
    async fn test_assign_agent_requires_active_agent() {
        let repo = repo();
        let client = add(&repo, "Asha Traders", "9999999999").await;
        let err = repo.assign_agent(client.id, "partner1").await.unwrap_err();
        assert!(matches!(err, RepoError::UnknownAgent(_)));

        add_account(&repo, Role::Agent, "partner1").await;
        let client = repo.assign_agent(client.id, "Partner1").await.unwrap();
        assert_eq!(client.assigned_agent.as_deref(), Some("partner1"));
        assert_eq!(repo.clients_for_agent("partner1").len(), 1);
    }

    #[tokio::test]
    async fn test_transition_submission_logs_actor() {
        let repo = repo();
        let client = add(&repo, "Asha Traders", "9999999999").await;
        let (_, submission) = repo
            .process_service_application(client.id, ServiceKind::IncomeTaxReturn, json!({}), vec![])
            .await
            .unwrap();
        let updated = repo
            .transition_submission(submission.id, SubmissionStatus::Filed, "ack received", "root")
            .await
            .unwrap();
        assert_eq!(updated.status, SubmissionStatus::Filed);
        assert_eq!(updated.transitions[0].actor, "root");
        let err = repo
            .transition_submission(submission.id, SubmissionStatus::Processing, "again", "root")
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Submission(SubmissionError::Terminal { .. })));
        assert_eq!(
            repo.get_submission(submission.id).unwrap().status,
            SubmissionStatus::Filed
        );
    }

    #[tokio::test]
    async fn test_task_requires_associate_and_client() {
        let repo = repo();
        let client = add(&repo, "Asha Traders", "9999999999").await;
        let pan = Pan::new("ABCDE1234F").unwrap();
        let err = repo
            .create_task(pan.clone(), client.id, ServiceKind::Accounting, "Visit", "")
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::UnknownAssociate(_)));

        add_account(&repo, Role::Associate, "ABCDE1234F").await;
        let err = repo
            .create_task(pan.clone(), ClientId::new(), ServiceKind::Accounting, "Visit", "")
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Store(StoreError::ClientNotFound(_))));

        let task = repo
            .create_task(pan.clone(), client.id, ServiceKind::Accounting, "Visit", "")
            .await
            .unwrap();
        let task = repo
            .set_task_status(task.id, TaskStatus::InProgress, Role::Associate)
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(repo.tasks_for_associate(&pan).len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_account_rejected() {
        let repo = repo();
        add_account(&repo, Role::Admin, "root").await;
        let again = Account::new(Role::Admin, "ROOT", "", "x".into()).unwrap();
        let err = repo.create_account(again).await.unwrap_err();
        assert!(matches!(err, RepoError::Account(AccountError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn test_clients_created_by_corporate() {
        let repo = repo();
        let corp = Principal::Corporate {
            username: Username::new("acme").unwrap(),
        };
        let new = NewClient::parse("Acme Pvt", "7777777777", "ops@acme.in", "private limited", None)
            .unwrap();
        repo.add_client(new, CreatedBy::from_principal(&corp))
            .await
            .unwrap();
        add(&repo, "Other", "9999999999").await;
        assert_eq!(repo.clients_created_by(Role::Corporate, "acme").len(), 1);
    }
}
