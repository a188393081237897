use crate::core::{LeadTrigger, UsageLedger};
use crate::domain::model::{Limit, Period, Plan, Tool, UserProfile};
use crate::utils::error::{QuotaError, Result};
use serde::Serialize;
use std::future::Future;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionRequest {
    pub user_id: String,
    pub tool: Tool,
    pub plan: Plan,
    pub period: Period,
    pub profile: UserProfile,
}

impl AdmissionRequest {
    pub fn new(user_id: impl Into<String>, tool: Tool, plan: Plan, period: Period) -> Self {
        Self {
            user_id: user_id.into(),
            tool,
            plan,
            period,
            profile: UserProfile::default(),
        }
    }

    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profile = profile;
        self
    }
}

/// What a denied caller shows the user next to the upsell prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimitInfo {
    pub limit: Limit,
    pub used: u64,
}

/// Proof of one admitted operation. Consumed by [`AdmissionGate::record`],
/// so usage can be recorded at most once per admission.
#[must_use = "an admitted operation must be recorded once it succeeds"]
#[derive(Debug, PartialEq, Eq)]
pub struct AdmitTicket {
    user_id: String,
    tool: Tool,
    period: Period,
}

impl AdmitTicket {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn period(&self) -> Period {
        self.period
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    Admit(AdmitTicket),
    Deny(LimitInfo),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admit(_))
    }
}

/// Result of a domain operation run behind the gate. Only `Created` counts
/// against the quota; updates that produce no new unit report `Unchanged`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Work<T> {
    Created(T),
    Unchanged(T),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gated<T> {
    Completed { value: T, usage: Option<u64> },
    Denied(LimitInfo),
}

/// Single entry point for "check the quota, maybe run, then count".
#[derive(Clone)]
pub struct AdmissionGate {
    ledger: UsageLedger,
    leads: LeadTrigger,
}

impl AdmissionGate {
    pub fn new(ledger: UsageLedger, leads: LeadTrigger) -> Self {
        Self { ledger, leads }
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    pub fn leads(&self) -> &LeadTrigger {
        &self.leads
    }

    pub async fn admit_operation(&self, request: &AdmissionRequest) -> Result<Admission> {
        let AdmissionRequest {
            user_id,
            tool,
            plan,
            period,
            profile,
        } = request;

        let limit = self.ledger.policy().limit_for(*plan, *tool);
        let usage = self.ledger.check_limit(user_id, *tool, *plan, period).await?;

        if !usage.exceeded {
            return Ok(Admission::Admit(AdmitTicket {
                user_id: user_id.clone(),
                tool: *tool,
                period: *period,
            }));
        }

        let denied = LimitInfo {
            limit,
            used: usage.count,
        };

        match plan {
            Plan::Free => {
                let outcome = self.leads.on_limit_exceeded(user_id, *tool, profile).await?;
                tracing::warn!(
                    user_id = user_id.as_str(),
                    %tool,
                    %limit,
                    used = usage.count,
                    lead_created = outcome.is_created(),
                    "Free plan limit reached"
                );
            }
            Plan::Premium => {
                tracing::warn!(
                    user_id = user_id.as_str(),
                    %tool,
                    %limit,
                    used = usage.count,
                    "Premium plan limit reached"
                );
            }
        }

        Ok(Admission::Deny(denied))
    }

    /// Counts the admitted operation. Returns `None` for the demo identity.
    pub async fn record(&self, ticket: AdmitTicket) -> Result<Option<u64>> {
        self.ledger
            .increment(&ticket.user_id, ticket.tool, &ticket.period)
            .await
    }

    /// Admits, runs `operation` only when admitted, and counts it when it
    /// created a new billable unit. If the usage cannot be recorded the call
    /// fails even though the operation itself succeeded.
    pub async fn execute<T, E, F, Fut>(
        &self,
        request: &AdmissionRequest,
        operation: F,
    ) -> std::result::Result<Gated<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Work<T>, E>>,
        E: From<QuotaError>,
    {
        let ticket = match self.admit_operation(request).await? {
            Admission::Admit(ticket) => ticket,
            Admission::Deny(info) => return Ok(Gated::Denied(info)),
        };

        match operation().await? {
            Work::Created(value) => {
                let usage = self.record(ticket).await?;
                Ok(Gated::Completed { value, usage })
            }
            Work::Unchanged(value) => Ok(Gated::Completed { value, usage: None }),
        }
    }
}
