//! Tool trait and registry
//!
//! The four deterministic loan-pipeline tools the reasoning loop can invoke.
//! Each tool deserializes its parameters into a typed struct; malformed input
//! is a recoverable `InvalidToolInput`, not a process-level failure.

use crate::error::AgentError;
use crate::models::{KycStatus, LandRecord, LoanApplication, LoanStatus, ToolInput, ToolOutput};
use crate::store::LoanStore;
use crate::Result;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Placeholder requested amount until the conversation collects a real one
const DEFAULT_AMOUNT_REQUESTED: f64 = 50_000.0;

/// Interest rate offered on approval
const APPROVED_INTEREST_RATE: f64 = 8.5;

/// Trait for a single tool (deterministic execution)
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput>;
}

/// Tool registry for looking up and executing tools.
/// Fixed at construction; read-only afterwards.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Render the catalog for the reasoning prompt, one tool per line.
    pub fn render_catalog(&self) -> String {
        let mut lines: Vec<String> = self
            .tools
            .values()
            .map(|tool| format!("{}: {}", tool.name(), tool.description()))
            .collect();
        lines.sort();
        lines.join("\n")
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_input<T: DeserializeOwned>(input: &ToolInput) -> Result<T> {
    serde_json::from_value(input.parameters.clone()).map_err(|e| {
        AgentError::InvalidToolInput(format!("{}: {}", input.tool_name, e))
    })
}

//
// ================= KYC Verification =================
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KycInput {
    phone_number: String,
    name: String,
    #[serde(alias = "aadhaar")]
    aadhaar_number: String,
}

pub struct KycVerificationTool {
    store: Arc<dyn LoanStore>,
}

impl KycVerificationTool {
    pub fn new(store: Arc<dyn LoanStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for KycVerificationTool {
    fn name(&self) -> &'static str {
        "kyc_verification"
    }

    fn description(&self) -> &'static str {
        "Verifies KYC details like Name and Aadhaar. Updates user status."
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let params: KycInput = parse_input(input)?;

        // Placeholder identity rule; the real check belongs to an external
        // identity service behind this boundary.
        let is_valid = params.aadhaar_number.chars().count() == 12;
        let status = if is_valid {
            KycStatus::Verified
        } else {
            KycStatus::Failed
        };

        let user = self
            .store
            .upsert_user_kyc(&params.phone_number, &params.name, status)
            .await?;

        info!(
            phone_number = %user.phone_number,
            status = %user.kyc_status,
            "KYC verification recorded"
        );

        Ok(ToolOutput {
            success: true,
            data: json!({
                "status": status.to_string(),
                "message": if is_valid { "KYC Verified" } else { "Invalid Aadhaar" },
            }),
            error: None,
        })
    }
}

//
// ================= AgriStack Lookup =================
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgriStackInput {
    plot_number: String,
    #[serde(default)]
    state: Option<String>,
}

/// Land-record lookup. Simulates the external AgriStack registry; plot "000"
/// is the reserved not-found sentinel.
pub struct AgriStackLookupTool;

#[async_trait::async_trait]
impl Tool for AgriStackLookupTool {
    fn name(&self) -> &'static str {
        "agri_stack_lookup"
    }

    fn description(&self) -> &'static str {
        "Fetches land records from AgriStack based on Plot Number."
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let params: AgriStackInput = parse_input(input)?;

        if params.plot_number == "000" {
            debug!(plot_number = %params.plot_number, "Plot not found");
            return Ok(ToolOutput {
                success: true,
                data: json!({ "error": "Plot not found" }),
                error: None,
            });
        }

        let record = LandRecord {
            acres: 2.5,
            yield_class: "high".to_string(),
            crop: "Wheat".to_string(),
            state: params.state.unwrap_or_else(|| "MH".to_string()),
            owner_validated: true,
        };

        Ok(ToolOutput {
            success: true,
            data: serde_json::to_value(record)?,
            error: None,
        })
    }
}

//
// ================= Credit Scoring =================
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreditScoringInput {
    acres: f64,
    yield_status: String,
    kyc_status: String,
}

/// Deterministic risk score in [0, 100]:
/// 50 for verified KYC + 10 per acre + 20 for high yield, capped at 100.
pub struct CreditScoringTool;

#[async_trait::async_trait]
impl Tool for CreditScoringTool {
    fn name(&self) -> &'static str {
        "credit_scoring"
    }

    fn description(&self) -> &'static str {
        "Calculates risk score based on land data and KYC."
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let params: CreditScoringInput = parse_input(input)?;

        let mut score = 0.0;

        if params.kyc_status == "VERIFIED" {
            score += 50.0;
        }
        score += params.acres * 10.0;
        if params.yield_status == "high" {
            score += 20.0;
        }

        let score = score.min(100.0);

        Ok(ToolOutput {
            success: true,
            data: json!({ "score": score }),
            error: None,
        })
    }
}

//
// ================= Underwriting Decision =================
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnderwritingInput {
    score: f64,
    user_id: String,
    #[serde(default, alias = "agriData")]
    land_data: serde_json::Value,
}

pub struct UnderwritingDecisionTool {
    store: Arc<dyn LoanStore>,
}

impl UnderwritingDecisionTool {
    pub fn new(store: Arc<dyn LoanStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for UnderwritingDecisionTool {
    fn name(&self) -> &'static str {
        "underwriting_decision"
    }

    fn description(&self) -> &'static str {
        "Makes final loan decision based on score."
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let params: UnderwritingInput = parse_input(input)?;

        // Approval boundary is strictly greater-than.
        let is_approved = params.score > 60.0;
        let status = if is_approved {
            LoanStatus::Approved
        } else {
            LoanStatus::Rejected
        };
        let interest_rate = if is_approved {
            Some(APPROVED_INTEREST_RATE)
        } else {
            None
        };

        let now = Utc::now();
        let application = LoanApplication {
            application_id: Uuid::new_v4(),
            user_id: params.user_id.clone(),
            status,
            amount_requested: DEFAULT_AMOUNT_REQUESTED,
            risk_score: params.score,
            interest_rate,
            agri_stack_data: params.land_data,
            created_at: now,
            updated_at: now,
        };

        let application = self.store.insert_application(application).await?;

        info!(
            application_id = %application.application_id,
            user_id = %application.user_id,
            status = %application.status,
            risk_score = application.risk_score,
            "Underwriting decision persisted"
        );

        let message = if is_approved {
            format!(
                "Loan Approved! Interest Rate: {}%. Funds will be disbursed shortly.",
                APPROVED_INTEREST_RATE
            )
        } else {
            "Loan Rejected. Sorry, your credit score or land holding is insufficient at this time."
                .to_string()
        };

        Ok(ToolOutput {
            success: true,
            data: json!({
                "status": status.to_string(),
                "message": message,
            }),
            error: None,
        })
    }
}

/// Create the default registry with the four loan-pipeline tools.
pub fn create_default_registry(store: Arc<dyn LoanStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(KycVerificationTool::new(store.clone())));
    registry.register(Arc::new(AgriStackLookupTool));
    registry.register(Arc::new(CreditScoringTool));
    registry.register(Arc::new(UnderwritingDecisionTool::new(store)));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryLoanStore;

    fn tool_input(tool_name: &str, parameters: serde_json::Value) -> ToolInput {
        ToolInput {
            tool_name: tool_name.to_string(),
            parameters,
        }
    }

    #[tokio::test]
    async fn test_kyc_valid_aadhaar_verifies_user() {
        let store = Arc::new(InMemoryLoanStore::new());
        let tool = KycVerificationTool::new(store.clone());

        let output = tool
            .execute(&tool_input(
                "kyc_verification",
                json!({
                    "phoneNumber": "9876543210",
                    "name": "Raju",
                    "aadhaarNumber": "123456789012",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(output.data["status"], "VERIFIED");

        let user = store.find_user("9876543210").await.unwrap().unwrap();
        assert_eq!(user.kyc_status, KycStatus::Verified);
    }

    #[tokio::test]
    async fn test_kyc_short_aadhaar_fails() {
        let store = Arc::new(InMemoryLoanStore::new());
        let tool = KycVerificationTool::new(store.clone());

        let output = tool
            .execute(&tool_input(
                "kyc_verification",
                json!({
                    "phoneNumber": "9876543210",
                    "name": "Raju",
                    "aadhaarNumber": "1234",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(output.data["status"], "FAILED");
        assert_eq!(output.data["message"], "Invalid Aadhaar");
    }

    #[tokio::test]
    async fn test_kyc_malformed_input_is_recoverable() {
        let store = Arc::new(InMemoryLoanStore::new());
        let tool = KycVerificationTool::new(store);

        let err = tool
            .execute(&tool_input("kyc_verification", json!("not an object")))
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::InvalidToolInput(_)));
    }

    #[tokio::test]
    async fn test_agri_stack_known_plot() {
        let tool = AgriStackLookupTool;

        let output = tool
            .execute(&tool_input(
                "agri_stack_lookup",
                json!({ "plotNumber": "MH-204", "state": "MH" }),
            ))
            .await
            .unwrap();

        assert_eq!(output.data["acres"], 2.5);
        assert_eq!(output.data["yieldClass"], "high");
        assert_eq!(output.data["ownerValidated"], true);
    }

    #[tokio::test]
    async fn test_agri_stack_not_found_sentinel() {
        let tool = AgriStackLookupTool;

        let output = tool
            .execute(&tool_input(
                "agri_stack_lookup",
                json!({ "plotNumber": "000" }),
            ))
            .await
            .unwrap();

        assert_eq!(output.data["error"], "Plot not found");
    }

    #[tokio::test]
    async fn test_credit_scoring_formula() {
        let tool = CreditScoringTool;

        let output = tool
            .execute(&tool_input(
                "credit_scoring",
                json!({ "acres": 2.5, "yieldStatus": "high", "kycStatus": "VERIFIED" }),
            ))
            .await
            .unwrap();

        // 50 + 25 + 20
        assert_eq!(output.data["score"], 95.0);
    }

    #[tokio::test]
    async fn test_credit_scoring_caps_at_100() {
        let tool = CreditScoringTool;

        let output = tool
            .execute(&tool_input(
                "credit_scoring",
                json!({ "acres": 10.0, "yieldStatus": "high", "kycStatus": "VERIFIED" }),
            ))
            .await
            .unwrap();

        assert_eq!(output.data["score"], 100.0);
    }

    #[tokio::test]
    async fn test_credit_scoring_unverified_kyc() {
        let tool = CreditScoringTool;

        let output = tool
            .execute(&tool_input(
                "credit_scoring",
                json!({ "acres": 2.5, "yieldStatus": "low", "kycStatus": "FAILED" }),
            ))
            .await
            .unwrap();

        assert_eq!(output.data["score"], 25.0);
    }

    #[tokio::test]
    async fn test_underwriting_approves_above_boundary() {
        let store = Arc::new(InMemoryLoanStore::new());
        let tool = UnderwritingDecisionTool::new(store.clone());

        let output = tool
            .execute(&tool_input(
                "underwriting_decision",
                json!({ "score": 61.0, "userId": "user-1", "landData": {"acres": 2.5} }),
            ))
            .await
            .unwrap();

        assert_eq!(output.data["status"], "APPROVED");
        assert!(output.data["message"]
            .as_str()
            .unwrap()
            .contains("Loan Approved"));

        let applications = store.applications_for_user("user-1").await.unwrap();
        assert_eq!(applications.len(), 1);
        assert_eq!(applications[0].status, LoanStatus::Approved);
        assert_eq!(applications[0].interest_rate, Some(8.5));
        assert_eq!(applications[0].risk_score, 61.0);
    }

    #[tokio::test]
    async fn test_underwriting_rejects_at_boundary() {
        let store = Arc::new(InMemoryLoanStore::new());
        let tool = UnderwritingDecisionTool::new(store.clone());

        let output = tool
            .execute(&tool_input(
                "underwriting_decision",
                json!({ "score": 60.0, "userId": "user-1", "landData": {} }),
            ))
            .await
            .unwrap();

        assert_eq!(output.data["status"], "REJECTED");

        let applications = store.applications_for_user("user-1").await.unwrap();
        assert_eq!(applications[0].status, LoanStatus::Rejected);
        assert_eq!(applications[0].interest_rate, None);
    }

    #[tokio::test]
    async fn test_registry_exact_name_dispatch() {
        let store: Arc<dyn LoanStore> = Arc::new(InMemoryLoanStore::new());
        let registry = create_default_registry(store);

        assert!(registry.get("kyc_verification").is_some());
        assert!(registry.get("agri_stack_lookup").is_some());
        assert!(registry.get("credit_scoring").is_some());
        assert!(registry.get("underwriting_decision").is_some());
        assert!(registry.get("KYC_VERIFICATION").is_none());
        assert!(registry.get("unknown").is_none());

        let catalog = registry.render_catalog();
        assert!(catalog.contains("kyc_verification:"));
        assert!(catalog.contains("underwriting_decision:"));
    }
}
