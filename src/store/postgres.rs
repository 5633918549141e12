//! Postgres-backed loan store
//!
//! Lazy pool, schema created on first use. Status enums travel as TEXT and
//! the land-record blob as serialized JSON, so no extra sqlx features are
//! required beyond the workspace set.

use crate::error::AgentError;
use crate::models::{ConversationLog, KycStatus, LoanApplication, LoanStatus, Speaker, User};
use crate::store::LoanStore;
use crate::Result;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;
use uuid::Uuid;

pub struct PgLoanStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PgLoanStore {
    /// Connect lazily; the first query opens the connection.
    pub fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .map_err(|e| AgentError::StateError(format!("Failed to configure pool: {}", e)))?;

        info!("Loan store backend: postgres");

        Ok(Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS users (
                      phone_number TEXT PRIMARY KEY,
                      name TEXT,
                      kyc_status TEXT NOT NULL DEFAULT 'PENDING',
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS loan_applications (
                      application_id UUID PRIMARY KEY,
                      user_id TEXT NOT NULL,
                      status TEXT NOT NULL,
                      amount_requested DOUBLE PRECISION NOT NULL,
                      risk_score DOUBLE PRECISION NOT NULL,
                      interest_rate DOUBLE PRECISION,
                      agri_stack_data TEXT NOT NULL DEFAULT '{}',
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS conversation_logs (
                      log_id UUID PRIMARY KEY,
                      user_id TEXT NOT NULL,
                      message_content TEXT NOT NULL,
                      speaker TEXT NOT NULL,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_conversation_logs_scope_time
                    ON conversation_logs (user_id, created_at);
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                AgentError::StateError(format!("Failed to initialize loan store schema: {}", e))
            })?;

        Ok(())
    }

    fn kyc_from_db(status: &str) -> KycStatus {
        match status {
            "VERIFIED" => KycStatus::Verified,
            "FAILED" => KycStatus::Failed,
            _ => KycStatus::Pending,
        }
    }

    fn loan_status_from_db(status: &str) -> LoanStatus {
        match status {
            "SUBMITTED" => LoanStatus::Submitted,
            "APPROVED" => LoanStatus::Approved,
            "REJECTED" => LoanStatus::Rejected,
            _ => LoanStatus::Draft,
        }
    }

    fn speaker_from_db(speaker: &str) -> Speaker {
        match speaker {
            "BOT" => Speaker::Bot,
            _ => Speaker::User,
        }
    }

    fn is_unique_violation(error: &sqlx::Error) -> bool {
        matches!(
            error,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
        )
    }

    fn user_from_row(row: &sqlx::postgres::PgRow) -> User {
        let status: String = row
            .try_get("kyc_status")
            .unwrap_or_else(|_| "PENDING".to_string());

        User {
            phone_number: row.try_get("phone_number").unwrap_or_default(),
            name: row.try_get("name").ok(),
            kyc_status: Self::kyc_from_db(&status),
            created_at: row
                .try_get("created_at")
                .unwrap_or_else(|_| chrono::Utc::now()),
        }
    }
}

#[async_trait::async_trait]
impl LoanStore for PgLoanStore {
    async fn create_user(&self, user: User) -> Result<User> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO users (phone_number, name, kyc_status, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&user.phone_number)
        .bind(&user.name)
        .bind(user.kyc_status.to_string())
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if Self::is_unique_violation(&e) {
                AgentError::UniquenessViolation(format!(
                    "phone number already registered: {}",
                    user.phone_number
                ))
            } else {
                AgentError::StateError(format!("Failed to insert user: {}", e))
            }
        })?;

        Ok(user)
    }

    async fn upsert_user_kyc(
        &self,
        phone_number: &str,
        name: &str,
        status: KycStatus,
    ) -> Result<User> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO users (phone_number, name, kyc_status)
            VALUES ($1, $2, $3)
            ON CONFLICT (phone_number)
            DO UPDATE SET name = EXCLUDED.name, kyc_status = EXCLUDED.kyc_status
            RETURNING phone_number, name, kyc_status, created_at
            "#,
        )
        .bind(phone_number)
        .bind(name)
        .bind(status.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AgentError::StateError(format!("Failed to upsert user: {}", e)))?;

        Ok(Self::user_from_row(&row))
    }

    async fn find_user(&self, phone_number: &str) -> Result<Option<User>> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            SELECT phone_number, name, kyc_status, created_at
            FROM users
            WHERE phone_number = $1
            "#,
        )
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AgentError::StateError(format!("Failed to load user: {}", e)))?;

        Ok(row.as_ref().map(Self::user_from_row))
    }

    async fn insert_application(&self, application: LoanApplication) -> Result<LoanApplication> {
        self.ensure_schema().await?;

        let agri_stack_data = serde_json::to_string(&application.agri_stack_data)?;

        sqlx::query(
            r#"
            INSERT INTO loan_applications
              (application_id, user_id, status, amount_requested, risk_score,
               interest_rate, agri_stack_data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(application.application_id)
        .bind(&application.user_id)
        .bind(application.status.to_string())
        .bind(application.amount_requested)
        .bind(application.risk_score)
        .bind(application.interest_rate)
        .bind(agri_stack_data)
        .bind(application.created_at)
        .bind(application.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AgentError::StateError(format!("Failed to insert application: {}", e)))?;

        Ok(application)
    }

    async fn applications_for_user(&self, user_id: &str) -> Result<Vec<LoanApplication>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT application_id, user_id, status, amount_requested, risk_score,
                   interest_rate, agri_stack_data, created_at, updated_at
            FROM loan_applications
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AgentError::StateError(format!("Failed to load applications: {}", e)))?;

        let mut applications = Vec::with_capacity(rows.len());

        for row in rows {
            let status: String = row.try_get("status").unwrap_or_else(|_| "DRAFT".to_string());
            let agri_raw: String = row.try_get("agri_stack_data").unwrap_or_else(|_| "{}".into());

            applications.push(LoanApplication {
                application_id: row.try_get("application_id").unwrap_or_else(|_| Uuid::new_v4()),
                user_id: row.try_get("user_id").unwrap_or_default(),
                status: Self::loan_status_from_db(&status),
                amount_requested: row.try_get("amount_requested").unwrap_or(0.0),
                risk_score: row.try_get("risk_score").unwrap_or(0.0),
                interest_rate: row.try_get("interest_rate").ok(),
                agri_stack_data: serde_json::from_str(&agri_raw)
                    .unwrap_or(serde_json::Value::Null),
                created_at: row
                    .try_get("created_at")
                    .unwrap_or_else(|_| chrono::Utc::now()),
                updated_at: row
                    .try_get("updated_at")
                    .unwrap_or_else(|_| chrono::Utc::now()),
            });
        }

        Ok(applications)
    }

    async fn append_log(&self, log: ConversationLog) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO conversation_logs (log_id, user_id, message_content, speaker, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(log.log_id)
        .bind(&log.user_id)
        .bind(&log.message_content)
        .bind(log.speaker.to_string())
        .bind(log.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| AgentError::StateError(format!("Failed to append log: {}", e)))?;

        Ok(())
    }

    async fn logs_for_user(&self, user_id: &str) -> Result<Vec<ConversationLog>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT log_id, user_id, message_content, speaker, created_at
            FROM conversation_logs
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AgentError::StateError(format!("Failed to load logs: {}", e)))?;

        let mut logs = Vec::with_capacity(rows.len());

        for row in rows {
            let speaker: String = row.try_get("speaker").unwrap_or_else(|_| "USER".to_string());

            logs.push(ConversationLog {
                log_id: row.try_get("log_id").unwrap_or_else(|_| Uuid::new_v4()),
                user_id: row.try_get("user_id").unwrap_or_default(),
                message_content: row.try_get("message_content").unwrap_or_default(),
                speaker: Self::speaker_from_db(&speaker),
                timestamp: row
                    .try_get("created_at")
                    .unwrap_or_else(|_| chrono::Utc::now()),
            });
        }

        Ok(logs)
    }
}
