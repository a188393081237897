use crate::core::{guarded, DemoIdentity, PlanPolicy};
use crate::domain::model::{
    CounterKey, Period, Plan, Tool, ToolUsage, UsageCheck, UsageSummary,
};
use crate::domain::ports::UsageStore;
use crate::utils::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Monthly usage counters and limit checks.
///
/// The period is always supplied by the caller; the ledger never reads the
/// clock. The demo identity is answered without touching the store.
#[derive(Clone)]
pub struct UsageLedger {
    store: Arc<dyn UsageStore>,
    policy: Arc<PlanPolicy>,
    demo: DemoIdentity,
    timeout: Duration,
}

impl UsageLedger {
    pub fn new(
        store: Arc<dyn UsageStore>,
        policy: Arc<PlanPolicy>,
        demo: DemoIdentity,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            policy,
            demo,
            timeout,
        }
    }

    pub fn policy(&self) -> &PlanPolicy {
        &self.policy
    }

    pub fn demo_identity(&self) -> &DemoIdentity {
        &self.demo
    }

    pub async fn current_usage(&self, user_id: &str, tool: Tool, period: &Period) -> Result<u64> {
        if self.demo.matches(user_id) {
            return Ok(0);
        }

        let key = CounterKey::new(user_id, tool, *period);
        let count = guarded("load usage", self.timeout, self.store.load(&key)).await?;
        tracing::debug!(user_id, %tool, %period, count = count.unwrap_or(0), "Loaded usage counter");
        Ok(count.unwrap_or(0))
    }

    pub async fn check_limit(
        &self,
        user_id: &str,
        tool: Tool,
        plan: Plan,
        period: &Period,
    ) -> Result<UsageCheck> {
        let limit = self.policy.limit_for(plan, tool);
        if self.demo.matches(user_id) {
            return Ok(UsageCheck {
                count: 0,
                limit,
                exceeded: false,
            });
        }

        let count = self.current_usage(user_id, tool, period).await?;
        Ok(UsageCheck {
            count,
            limit,
            exceeded: limit.is_exceeded_by(count),
        })
    }

    /// Adds exactly one unit. Returns the new count, or `None` for the demo
    /// identity whose usage is never persisted.
    pub async fn increment(&self, user_id: &str, tool: Tool, period: &Period) -> Result<Option<u64>> {
        if self.demo.matches(user_id) {
            tracing::debug!(%tool, "Demo identity usage not recorded");
            return Ok(None);
        }

        let key = CounterKey::new(user_id, tool, *period);
        let count = guarded("increment usage", self.timeout, self.store.increment(&key)).await?;
        tracing::debug!(user_id, %tool, %period, count, "Recorded usage");
        Ok(Some(count))
    }

    /// Usage and limits of every tool for one user and period.
    pub async fn summary(&self, user_id: &str, plan: Plan, period: &Period) -> Result<UsageSummary> {
        let counts: HashMap<Tool, u64> = if self.demo.matches(user_id) {
            HashMap::new()
        } else {
            guarded(
                "list usage",
                self.timeout,
                self.store.counters_for_user(user_id, period),
            )
            .await?
            .into_iter()
            .map(|counter| (counter.tool, counter.count))
            .collect()
        };

        let tools = Tool::ALL
            .into_iter()
            .map(|tool| {
                let count = counts.get(&tool).copied().unwrap_or(0);
                let limit = self.policy.limit_for(plan, tool);
                ToolUsage {
                    tool,
                    count,
                    limit,
                    remaining: limit.remaining(count),
                }
            })
            .collect();

        Ok(UsageSummary {
            user_id: user_id.to_string(),
            plan,
            period: *period,
            tools,
        })
    }
}
