use crate::domain::model::{LeadRecord, LeadStatus, Period, Tool};
use crate::domain::ports::{LeadStore, UsageStore};
use crate::utils::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadStats {
    pub total_leads: usize,
    pub new_leads: usize,
    pub contacted_leads: usize,
    pub converted_leads: usize,
}

impl LeadStats {
    pub fn from_leads(leads: &[LeadRecord]) -> Self {
        let count = |status: LeadStatus| leads.iter().filter(|l| l.status == status).count();
        Self {
            total_leads: leads.len(),
            new_leads: count(LeadStatus::New),
            contacted_leads: count(LeadStatus::Contacted),
            converted_leads: count(LeadStatus::Converted),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub period: Period,
    pub leads: LeadStats,
    /// Sum over all users, every tool listed.
    pub monthly_usage: BTreeMap<Tool, u64>,
    pub active_users: usize,
}

pub async fn admin_stats(
    usage: &dyn UsageStore,
    leads: &dyn LeadStore,
    period: &Period,
) -> Result<AdminStats> {
    let counters = usage.counters(period).await?;
    let all_leads = leads.list(None).await?;

    let mut monthly_usage: BTreeMap<Tool, u64> = Tool::ALL.into_iter().map(|t| (t, 0)).collect();
    let mut users = std::collections::BTreeSet::new();
    for counter in &counters {
        *monthly_usage.entry(counter.tool).or_insert(0) += counter.count;
        users.insert(counter.user_id.as_str());
    }

    Ok(AdminStats {
        period: *period,
        leads: LeadStats::from_leads(&all_leads),
        monthly_usage,
        active_users: users.len(),
    })
}

#[derive(Debug, Serialize)]
struct LeadRow<'a> {
    id: u64,
    created_at: String,
    status: &'static str,
    source: &'static str,
    interest: &'a str,
    name: &'a str,
    email: &'a str,
    company: &'a str,
    phone: &'a str,
    user_id: &'a str,
    tool: &'static str,
}

/// Writes one CSV row per lead with a header line. Returns the row count.
pub fn export_leads_csv<W: Write>(leads: &[LeadRecord], writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for lead in leads {
        csv_writer.serialize(LeadRow {
            id: lead.id,
            created_at: lead.created_at.to_rfc3339(),
            status: lead.status.as_str(),
            source: lead.source.as_str(),
            interest: &lead.interest,
            name: &lead.name,
            email: &lead.email,
            company: &lead.company,
            phone: &lead.phone,
            user_id: lead.user_id.as_deref().unwrap_or(""),
            tool: lead.tool.map(|t| t.as_str()).unwrap_or(""),
        })?;
    }
    csv_writer.flush()?;
    Ok(leads.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::domain::model::{CounterKey, LeadSource, NewLead};

    fn lead(user_id: &str, tool: Tool) -> NewLead {
        NewLead {
            user_id: Some(user_id.to_string()),
            tool: Some(tool),
            name: "Lena, Küche".to_string(),
            email: "lena@kantine.de".to_string(),
            company: "Kantine Nord".to_string(),
            phone: String::new(),
            interest: tool.interest_label().to_string(),
            message: None,
            source: LeadSource::FreemiumLimitReached,
        }
    }

    #[tokio::test]
    async fn test_admin_stats_aggregates_period() {
        let store = MemoryStore::new();
        let jan: Period = "2024-01".parse().unwrap();
        let feb: Period = "2024-02".parse().unwrap();

        store.increment(&CounterKey::new("u1", Tool::Menus, jan)).await.unwrap();
        store.increment(&CounterKey::new("u2", Tool::Menus, jan)).await.unwrap();
        store.increment(&CounterKey::new("u2", Tool::Exports, jan)).await.unwrap();
        store.increment(&CounterKey::new("u3", Tool::Menus, feb)).await.unwrap();

        let first = store.insert(lead("u1", Tool::Menus)).await.unwrap();
        store.insert(lead("u2", Tool::Menus)).await.unwrap();
        store.set_status(first.id, LeadStatus::Converted).await.unwrap();

        let stats = admin_stats(&store, &store, &jan).await.unwrap();
        assert_eq!(stats.monthly_usage[&Tool::Menus], 2);
        assert_eq!(stats.monthly_usage[&Tool::Exports], 1);
        assert_eq!(stats.monthly_usage[&Tool::Inventory], 0);
        assert_eq!(stats.active_users, 2);
        assert_eq!(
            stats.leads,
            LeadStats {
                total_leads: 2,
                new_leads: 1,
                contacted_leads: 0,
                converted_leads: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_export_leads_csv() {
        let store = MemoryStore::new();
        store.insert(lead("u1", Tool::Inventory)).await.unwrap();
        let leads = store.list(None).await.unwrap();

        let mut buffer = Vec::new();
        assert_eq!(export_leads_csv(&leads, &mut buffer).unwrap(), 1);

        let output = String::from_utf8(buffer).unwrap();
        let mut lines = output.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,created_at,status,source,interest,name,email,company,phone,user_id,tool"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("1,"));
        assert!(row.contains(",new,freemium_limit_reached,lagerverwaltung,\"Lena, Küche\","));
        assert!(row.ends_with(",u1,inventory"));
    }
}
