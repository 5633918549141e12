//! Persistence layer for loan records
//!
//! Responsible for users, loan applications, and the append-only
//! conversation log. In-memory for development/tests; Postgres for
//! production (see `postgres`).

use crate::error::AgentError;
use crate::models::{ConversationLog, KycStatus, LoanApplication, User};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod postgres;
pub use postgres::PgLoanStore;

/// Trait for loan-record persistence
#[async_trait::async_trait]
pub trait LoanStore: Send + Sync {
    /// Insert a new user; a duplicate phone number is a uniqueness violation.
    async fn create_user(&self, user: User) -> Result<User>;

    /// Create-or-update a user's name and KYC status, keyed by phone number.
    async fn upsert_user_kyc(
        &self,
        phone_number: &str,
        name: &str,
        status: KycStatus,
    ) -> Result<User>;

    async fn find_user(&self, phone_number: &str) -> Result<Option<User>>;

    /// Persist one underwriting decision. Applications are write-once.
    async fn insert_application(&self, application: LoanApplication) -> Result<LoanApplication>;

    async fn applications_for_user(&self, user_id: &str) -> Result<Vec<LoanApplication>>;

    /// Append one transcript entry. Entries are never edited or deleted.
    async fn append_log(&self, log: ConversationLog) -> Result<()>;

    /// All entries for a user, ascending by timestamp.
    async fn logs_for_user(&self, user_id: &str) -> Result<Vec<ConversationLog>>;
}

/// In-memory store for development and tests
pub struct InMemoryLoanStore {
    users: Arc<RwLock<HashMap<String, User>>>,
    applications: Arc<RwLock<Vec<LoanApplication>>>,
    logs: Arc<RwLock<Vec<ConversationLog>>>,
}

impl InMemoryLoanStore {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            applications: Arc::new(RwLock::new(Vec::new())),
            logs: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryLoanStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LoanStore for InMemoryLoanStore {
    async fn create_user(&self, user: User) -> Result<User> {
        let mut users = self.users.write().await;

        if users.contains_key(&user.phone_number) {
            return Err(AgentError::UniquenessViolation(format!(
                "phone number already registered: {}",
                user.phone_number
            )));
        }

        users.insert(user.phone_number.clone(), user.clone());
        Ok(user)
    }

    async fn upsert_user_kyc(
        &self,
        phone_number: &str,
        name: &str,
        status: KycStatus,
    ) -> Result<User> {
        let mut users = self.users.write().await;

        let user = users
            .entry(phone_number.to_string())
            .or_insert_with(|| User::new(phone_number));

        user.name = Some(name.to_string());
        user.kyc_status = status;

        Ok(user.clone())
    }

    async fn find_user(&self, phone_number: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(phone_number).cloned())
    }

    async fn insert_application(&self, application: LoanApplication) -> Result<LoanApplication> {
        let mut applications = self.applications.write().await;
        applications.push(application.clone());
        Ok(application)
    }

    async fn applications_for_user(&self, user_id: &str) -> Result<Vec<LoanApplication>> {
        let applications = self.applications.read().await;
        Ok(applications
            .iter()
            .filter(|app| app.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn append_log(&self, log: ConversationLog) -> Result<()> {
        let mut logs = self.logs.write().await;
        logs.push(log);
        Ok(())
    }

    async fn logs_for_user(&self, user_id: &str) -> Result<Vec<ConversationLog>> {
        let logs = self.logs.read().await;

        let mut entries: Vec<ConversationLog> = logs
            .iter()
            .filter(|log| log.user_id == user_id)
            .cloned()
            .collect();

        entries.sort_by_key(|log| log.timestamp);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LoanStatus, Speaker};
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_duplicate_phone_number_rejected() {
        let store = InMemoryLoanStore::new();

        store.create_user(User::new("9876543210")).await.unwrap();
        let err = store.create_user(User::new("9876543210")).await.unwrap_err();

        assert!(matches!(err, AgentError::UniquenessViolation(_)));
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let store = InMemoryLoanStore::new();

        let created = store
            .upsert_user_kyc("9876543210", "Raju", KycStatus::Verified)
            .await
            .unwrap();
        assert_eq!(created.kyc_status, KycStatus::Verified);
        assert_eq!(created.name.as_deref(), Some("Raju"));

        let updated = store
            .upsert_user_kyc("9876543210", "Raju Kumar", KycStatus::Failed)
            .await
            .unwrap();
        assert_eq!(updated.kyc_status, KycStatus::Failed);
        assert_eq!(updated.name.as_deref(), Some("Raju Kumar"));

        let found = store.find_user("9876543210").await.unwrap().unwrap();
        assert_eq!(found.kyc_status, KycStatus::Failed);
    }

    #[tokio::test]
    async fn test_applications_scoped_by_user() {
        let store = InMemoryLoanStore::new();

        let application = LoanApplication {
            application_id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            status: LoanStatus::Approved,
            amount_requested: 50_000.0,
            risk_score: 95.0,
            interest_rate: Some(8.5),
            agri_stack_data: serde_json::json!({"acres": 2.5}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        store.insert_application(application).await.unwrap();

        assert_eq!(store.applications_for_user("user-1").await.unwrap().len(), 1);
        assert!(store.applications_for_user("user-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_logs_ordered_ascending() {
        let store = InMemoryLoanStore::new();

        store
            .append_log(ConversationLog::user("user-1", "first"))
            .await
            .unwrap();
        store
            .append_log(ConversationLog::bot("user-1", "second"))
            .await
            .unwrap();

        let logs = store.logs_for_user("user-1").await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].speaker, Speaker::User);
        assert_eq!(logs[1].speaker, Speaker::Bot);
        assert!(logs[0].timestamp <= logs[1].timestamp);
    }
}
