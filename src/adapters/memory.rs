use crate::domain::model::{
    CounterKey, LeadInsert, LeadRecord, LeadStatus, NewLead, Period, Tool, UsageCounter,
};
use crate::domain::ports::{LeadStore, UsageStore};
use crate::utils::error::{QuotaError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryState {
    counters: HashMap<CounterKey, u64>,
    leads: Vec<LeadRecord>,
    limit_leads: HashMap<(String, Tool), u64>,
    next_lead_id: u64,
}

impl MemoryState {
    fn push_lead(&mut self, lead: NewLead) -> LeadRecord {
        self.next_lead_id += 1;
        let record = LeadRecord::from_new(self.next_lead_id, lead, Utc::now());
        self.leads.push(record.clone());
        record
    }
}

/// In-process store for both counters and leads. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn counter_rows(&self) -> usize {
        self.state.lock().await.counters.len()
    }

    pub async fn lead_count(&self) -> usize {
        self.state.lock().await.leads.len()
    }
}

pub(crate) fn limit_lead_key(lead: &NewLead) -> Result<(String, Tool)> {
    match (&lead.user_id, lead.tool) {
        (Some(user_id), Some(tool)) => Ok((user_id.clone(), tool)),
        (None, _) => Err(QuotaError::MissingField {
            field: "lead.user_id".to_string(),
        }),
        (_, None) => Err(QuotaError::MissingField {
            field: "lead.tool".to_string(),
        }),
    }
}

fn sorted_counters<'a>(rows: impl Iterator<Item = (&'a CounterKey, &'a u64)>) -> Vec<UsageCounter> {
    let mut counters: Vec<UsageCounter> = rows
        .map(|(key, count)| UsageCounter {
            user_id: key.user_id.clone(),
            tool: key.tool,
            period: key.period,
            count: *count,
        })
        .collect();
    counters.sort_by(|a, b| a.user_id.cmp(&b.user_id).then(a.tool.cmp(&b.tool)));
    counters
}

#[async_trait]
impl UsageStore for MemoryStore {
    async fn load(&self, key: &CounterKey) -> Result<Option<u64>> {
        Ok(self.state.lock().await.counters.get(key).copied())
    }

    async fn increment(&self, key: &CounterKey) -> Result<u64> {
        let mut state = self.state.lock().await;
        let count = state.counters.entry(key.clone()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn counters(&self, period: &Period) -> Result<Vec<UsageCounter>> {
        let state = self.state.lock().await;
        Ok(sorted_counters(
            state.counters.iter().filter(|(key, _)| key.period == *period),
        ))
    }

    async fn counters_for_user(&self, user_id: &str, period: &Period) -> Result<Vec<UsageCounter>> {
        let state = self.state.lock().await;
        Ok(sorted_counters(state.counters.iter().filter(|(key, _)| {
            key.period == *period && key.user_id == user_id
        })))
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn find_limit_lead(&self, user_id: &str, tool: Tool) -> Result<Option<LeadRecord>> {
        let state = self.state.lock().await;
        let id = state.limit_leads.get(&(user_id.to_string(), tool));
        Ok(id.and_then(|id| state.leads.iter().find(|lead| lead.id == *id).cloned()))
    }

    async fn insert_limit_lead(&self, lead: NewLead) -> Result<LeadInsert> {
        let key = limit_lead_key(&lead)?;
        let mut state = self.state.lock().await;

        if let Some(id) = state.limit_leads.get(&key).copied() {
            if let Some(existing) = state.leads.iter().find(|l| l.id == id) {
                return Ok(LeadInsert::Existing(existing.clone()));
            }
        }

        let record = state.push_lead(lead);
        state.limit_leads.insert(key, record.id);
        Ok(LeadInsert::Inserted(record))
    }

    async fn insert(&self, lead: NewLead) -> Result<LeadRecord> {
        Ok(self.state.lock().await.push_lead(lead))
    }

    async fn list(&self, status: Option<LeadStatus>) -> Result<Vec<LeadRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .leads
            .iter()
            .rev()
            .filter(|lead| status.map_or(true, |s| lead.status == s))
            .cloned()
            .collect())
    }

    async fn set_status(&self, id: u64, status: LeadStatus) -> Result<LeadRecord> {
        let mut state = self.state.lock().await;
        let lead = state
            .leads
            .iter_mut()
            .find(|lead| lead.id == id)
            .ok_or(QuotaError::LeadNotFound { id })?;
        lead.status = status;
        Ok(lead.clone())
    }
}
