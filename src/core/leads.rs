use crate::core::guarded;
use crate::domain::model::{
    LeadInsert, LeadRecord, LeadSource, LeadStatus, NewLead, Tool, UserProfile,
};
use crate::domain::ports::LeadStore;
use crate::utils::error::Result;
use crate::utils::validation::{validate_email, validate_non_empty_string, Validate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const CONTACT_FORM_INTEREST: &str = "Kontaktformular";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadOutcome {
    Created(LeadRecord),
    AlreadyExists(LeadRecord),
}

impl LeadOutcome {
    pub fn lead(&self) -> &LeadRecord {
        match self {
            LeadOutcome::Created(lead) | LeadOutcome::AlreadyExists(lead) => lead,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, LeadOutcome::Created(_))
    }
}

/// Contact or cross-sell form submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadCapture {
    pub name: String,
    pub email: String,
    pub company: String,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub user_id: Option<String>,
    pub source_tool: Option<Tool>,
    pub target_product: Option<String>,
    #[serde(default)]
    pub demo_request: bool,
}

impl Validate for LeadCapture {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("name", &self.name)?;
        validate_email("email", &self.email)?;
        validate_non_empty_string("company", &self.company)?;
        Ok(())
    }
}

impl LeadCapture {
    /// A target product makes it a cross-sell; a tool without one is the
    /// upgrade form shown at the quota wall.
    fn source(&self) -> LeadSource {
        match (&self.target_product, self.source_tool) {
            (Some(_), _) => LeadSource::CrossSellInterest,
            (None, Some(_)) => LeadSource::FreemiumLimitReached,
            (None, None) => LeadSource::ContactForm,
        }
    }

    fn interest(&self) -> String {
        match (&self.target_product, self.source_tool) {
            (Some(target), _) => target.clone(),
            (None, Some(tool)) => tool.interest_label().to_string(),
            (None, None) => CONTACT_FORM_INTEREST.to_string(),
        }
    }

    fn default_message(&self) -> Option<String> {
        let target = self.target_product.as_deref()?;
        if self.demo_request {
            return Some(format!("Demo-Anfrage für {}", target));
        }
        let from = self
            .source_tool
            .map(|tool| tool.interest_label())
            .unwrap_or(CONTACT_FORM_INTEREST);
        Some(format!("Interesse an {} von {}", target, from))
    }

    fn into_new_lead(self) -> NewLead {
        let source = self.source();
        let interest = self.interest();
        let message = self
            .message
            .clone()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| self.default_message());

        NewLead {
            user_id: self.user_id,
            tool: self.source_tool,
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            company: self.company.trim().to_string(),
            phone: self.phone.unwrap_or_default(),
            interest,
            message,
            source,
        }
    }
}

/// Creates sales leads: once per (user, tool) on a quota wall, and on demand
/// from the contact form.
#[derive(Clone)]
pub struct LeadTrigger {
    store: Arc<dyn LeadStore>,
    timeout: Duration,
}

impl LeadTrigger {
    pub fn new(store: Arc<dyn LeadStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn on_limit_exceeded(
        &self,
        user_id: &str,
        tool: Tool,
        profile: &UserProfile,
    ) -> Result<LeadOutcome> {
        let existing = guarded(
            "find lead",
            self.timeout,
            self.store.find_limit_lead(user_id, tool),
        )
        .await?;
        if let Some(lead) = existing {
            tracing::debug!(user_id, %tool, lead_id = lead.id, "Lead already recorded");
            return Ok(LeadOutcome::AlreadyExists(lead));
        }

        let lead = NewLead {
            user_id: Some(user_id.to_string()),
            tool: Some(tool),
            name: profile.name.clone().unwrap_or_default(),
            email: profile.email.clone().unwrap_or_default(),
            company: profile.company.clone().unwrap_or_default(),
            phone: String::new(),
            interest: tool.interest_label().to_string(),
            message: None,
            source: LeadSource::FreemiumLimitReached,
        };

        // The store resolves a concurrent insert for the same key.
        match guarded("create lead", self.timeout, self.store.insert_limit_lead(lead)).await? {
            LeadInsert::Inserted(lead) => {
                tracing::info!(user_id, %tool, lead_id = lead.id, "Created freemium limit lead");
                Ok(LeadOutcome::Created(lead))
            }
            LeadInsert::Existing(lead) => Ok(LeadOutcome::AlreadyExists(lead)),
        }
    }

    pub async fn capture(&self, request: LeadCapture) -> Result<LeadRecord> {
        request.validate()?;
        let lead = request.into_new_lead();
        let record = guarded("create lead", self.timeout, self.store.insert(lead)).await?;
        tracing::info!(
            lead_id = record.id,
            source = record.source.as_str(),
            interest = %record.interest,
            "Captured lead"
        );
        Ok(record)
    }

    pub async fn list(&self, status: Option<LeadStatus>) -> Result<Vec<LeadRecord>> {
        guarded("list leads", self.timeout, self.store.list(status)).await
    }

    pub async fn set_status(&self, id: u64, status: LeadStatus) -> Result<LeadRecord> {
        let lead = guarded("update lead", self.timeout, self.store.set_status(id, status)).await?;
        tracing::info!(lead_id = id, status = status.as_str(), "Updated lead status");
        Ok(lead)
    }
}
