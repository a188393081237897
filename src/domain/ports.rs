use crate::domain::model::{
    CounterKey, LeadInsert, LeadRecord, LeadStatus, NewLead, Period, Tool, UsageCounter,
};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Persistence for monthly usage counters.
///
/// `increment` must be atomic per key: N concurrent calls starting from a
/// count of C leave the stored count at C + N.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// `None` when no counter row exists yet.
    async fn load(&self, key: &CounterKey) -> Result<Option<u64>>;

    /// Creates the counter at 1 or adds 1, returning the new count.
    async fn increment(&self, key: &CounterKey) -> Result<u64>;

    async fn counters(&self, period: &Period) -> Result<Vec<UsageCounter>>;

    async fn counters_for_user(&self, user_id: &str, period: &Period) -> Result<Vec<UsageCounter>>;
}

/// Persistence for sales leads.
#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn find_limit_lead(&self, user_id: &str, tool: Tool) -> Result<Option<LeadRecord>>;

    /// Inserts unless a lead for `(lead.user_id, lead.tool)` already exists.
    /// The check and the insert must be a single atomic step.
    async fn insert_limit_lead(&self, lead: NewLead) -> Result<LeadInsert>;

    async fn insert(&self, lead: NewLead) -> Result<LeadRecord>;

    /// Newest first.
    async fn list(&self, status: Option<LeadStatus>) -> Result<Vec<LeadRecord>>;

    async fn set_status(&self, id: u64, status: LeadStatus) -> Result<LeadRecord>;
}
