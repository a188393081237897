pub mod engine;
pub mod gate;
pub mod leads;
pub mod ledger;
pub mod policy;
pub mod reporting;

pub use crate::domain::model::{
    Limit, Period, Plan, Tool, UsageCheck, UsageCounter, UsageSummary, UserProfile,
};
pub use crate::domain::ports::{LeadStore, UsageStore};
pub use crate::utils::error::Result;
pub use engine::QuotaEngine;
pub use gate::{AdmissionGate, AdmissionRequest, Admission, AdmitTicket, Gated, LimitInfo, Work};
pub use leads::{LeadCapture, LeadOutcome, LeadTrigger};
pub use ledger::UsageLedger;
pub use policy::PlanPolicy;

use crate::utils::error::QuotaError;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_DEMO_USER_ID: &str = "demo-user-123";

/// The walkthrough account that is exempt from every quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoIdentity(String);

impl DemoIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self(user_id.into())
    }

    pub fn matches(&self, user_id: &str) -> bool {
        self.0 == user_id
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DemoIdentity {
    fn default() -> Self {
        Self::new(DEFAULT_DEMO_USER_ID)
    }
}

/// Runs one store round trip under a deadline. A timeout is reported as
/// `StorageUnavailable`, never as an empty or default answer. Stores must
/// tolerate the call future being dropped at the deadline; `JsonFileStore`
/// finishes an already started write under its file lock.
pub(crate) async fn guarded<T, F>(operation: &str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, timeout_ms = limit.as_millis() as u64, "Store call timed out");
            Err(QuotaError::storage(
                operation,
                format!("timed out after {} ms", limit.as_millis()),
            ))
        }
    }
}
