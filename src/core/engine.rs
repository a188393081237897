use crate::adapters::{JsonFileStore, MemoryStore};
use crate::config::{QuotaConfig, StoreBackend};
use crate::core::reporting::{self, AdminStats};
use crate::core::{guarded, AdmissionGate, DemoIdentity, LeadTrigger, PlanPolicy, UsageLedger};
use crate::domain::model::Period;
use crate::domain::ports::{LeadStore, UsageStore};
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use std::sync::Arc;
use std::time::Duration;

/// Wires policy, stores, ledger, lead trigger and gate together.
#[derive(Clone)]
pub struct QuotaEngine {
    gate: AdmissionGate,
    usage_store: Arc<dyn UsageStore>,
    lead_store: Arc<dyn LeadStore>,
    timeout: Duration,
}

impl QuotaEngine {
    pub fn from_config(config: &QuotaConfig) -> Result<Self> {
        config.validate()?;
        let policy = config.build_policy()?;
        let demo = DemoIdentity::new(config.quota.demo_user_id.clone());
        let timeout = config.storage_timeout();

        let engine = match config.store.backend()? {
            StoreBackend::Memory => Self::with_store(MemoryStore::new(), policy, demo, timeout),
            StoreBackend::Json(path) => {
                tracing::debug!("Using JSON file store at {}", path.display());
                Self::with_store(JsonFileStore::new(path), policy, demo, timeout)
            }
        };
        Ok(engine)
    }

    pub fn with_store<S>(store: S, policy: PlanPolicy, demo: DemoIdentity, timeout: Duration) -> Self
    where
        S: UsageStore + LeadStore + 'static,
    {
        let store = Arc::new(store);
        Self::with_stores(store.clone(), store, policy, demo, timeout)
    }

    pub fn with_stores(
        usage_store: Arc<dyn UsageStore>,
        lead_store: Arc<dyn LeadStore>,
        policy: PlanPolicy,
        demo: DemoIdentity,
        timeout: Duration,
    ) -> Self {
        let ledger = UsageLedger::new(usage_store.clone(), Arc::new(policy), demo, timeout);
        let leads = LeadTrigger::new(lead_store.clone(), timeout);
        Self {
            gate: AdmissionGate::new(ledger, leads),
            usage_store,
            lead_store,
            timeout,
        }
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    pub fn ledger(&self) -> &UsageLedger {
        self.gate.ledger()
    }

    pub fn leads(&self) -> &LeadTrigger {
        self.gate.leads()
    }

    pub fn policy(&self) -> &PlanPolicy {
        self.gate.ledger().policy()
    }

    pub async fn stats(&self, period: &Period) -> Result<AdminStats> {
        guarded(
            "load stats",
            self.timeout,
            reporting::admin_stats(self.usage_store.as_ref(), self.lead_store.as_ref(), period),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Limit, Plan, Tool};

    #[tokio::test]
    async fn test_engine_from_default_config() {
        let engine = QuotaEngine::from_config(&QuotaConfig::default()).unwrap();
        assert_eq!(engine.policy().limit_for(Plan::Free, Tool::Menus), Limit::Finite(3));
        assert!(engine.ledger().demo_identity().matches("demo-user-123"));

        let jan: Period = "2024-01".parse().unwrap();
        let stats = engine.stats(&jan).await.unwrap();
        assert_eq!(stats.leads.total_leads, 0);
    }

    #[test]
    fn test_engine_rejects_unknown_limit_names() {
        let config = QuotaConfig::from_toml_str(
            r#"
[limits.free]
pizza = 3
"#,
        )
        .unwrap();
        assert!(QuotaEngine::from_config(&config).is_err());
    }
}
