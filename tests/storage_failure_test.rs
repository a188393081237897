use async_trait::async_trait;
use gastro_quota::core::{LeadStore, UsageStore};
use gastro_quota::domain::model::{
    CounterKey, LeadInsert, LeadRecord, LeadStatus, NewLead, UsageCounter,
};
use gastro_quota::{
    Admission, AdmissionRequest, DemoIdentity, Gated, MemoryStore, Period, Plan, PlanPolicy,
    QuotaEngine, QuotaError, Result, Tool, UserProfile, Work,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Wraps a working store and breaks selected calls on demand.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_reads: Arc<AtomicBool>,
    fail_increments: Arc<AtomicBool>,
    fail_leads: Arc<AtomicBool>,
    stall: Arc<AtomicBool>,
}

impl FlakyStore {
    async fn gate(&self, flag: &AtomicBool, operation: &str) -> Result<()> {
        if self.stall.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
        if flag.load(Ordering::SeqCst) {
            return Err(QuotaError::storage(operation, "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl UsageStore for FlakyStore {
    async fn load(&self, key: &CounterKey) -> Result<Option<u64>> {
        self.gate(&self.fail_reads, "load usage").await?;
        self.inner.load(key).await
    }

    async fn increment(&self, key: &CounterKey) -> Result<u64> {
        self.gate(&self.fail_increments, "increment usage").await?;
        self.inner.increment(key).await
    }

    async fn counters(&self, period: &Period) -> Result<Vec<UsageCounter>> {
        self.gate(&self.fail_reads, "list usage").await?;
        self.inner.counters(period).await
    }

    async fn counters_for_user(&self, user_id: &str, period: &Period) -> Result<Vec<UsageCounter>> {
        self.gate(&self.fail_reads, "list usage").await?;
        self.inner.counters_for_user(user_id, period).await
    }
}

#[async_trait]
impl LeadStore for FlakyStore {
    async fn find_limit_lead(&self, user_id: &str, tool: Tool) -> Result<Option<LeadRecord>> {
        self.gate(&self.fail_leads, "find lead").await?;
        self.inner.find_limit_lead(user_id, tool).await
    }

    async fn insert_limit_lead(&self, lead: NewLead) -> Result<LeadInsert> {
        self.gate(&self.fail_leads, "create lead").await?;
        self.inner.insert_limit_lead(lead).await
    }

    async fn insert(&self, lead: NewLead) -> Result<LeadRecord> {
        self.gate(&self.fail_leads, "create lead").await?;
        self.inner.insert(lead).await
    }

    async fn list(&self, status: Option<LeadStatus>) -> Result<Vec<LeadRecord>> {
        self.gate(&self.fail_leads, "list leads").await?;
        self.inner.list(status).await
    }

    async fn set_status(&self, id: u64, status: LeadStatus) -> Result<LeadRecord> {
        self.gate(&self.fail_leads, "update lead").await?;
        self.inner.set_status(id, status).await
    }
}

fn engine(store: &FlakyStore, timeout: Duration) -> QuotaEngine {
    QuotaEngine::with_store(
        store.clone(),
        PlanPolicy::standard(),
        DemoIdentity::default(),
        timeout,
    )
}

fn period() -> Period {
    "2024-07".parse().unwrap()
}

#[tokio::test]
async fn test_read_failure_is_not_treated_as_zero_usage() {
    let store = FlakyStore::default();
    let engine = engine(&store, Duration::from_secs(5));
    store.fail_reads.store(true, Ordering::SeqCst);

    let request = AdmissionRequest::new("u1", Tool::Menus, Plan::Free, period());
    let result = engine.gate().admit_operation(&request).await;

    assert!(matches!(result, Err(QuotaError::StorageUnavailable { .. })));
}

#[tokio::test]
async fn test_unrecorded_usage_fails_the_operation() {
    let store = FlakyStore::default();
    let engine = engine(&store, Duration::from_secs(5));
    store.fail_increments.store(true, Ordering::SeqCst);

    let request = AdmissionRequest::new("u1", Tool::CostEntries, Plan::Free, period());
    let mut ran = false;
    let result: std::result::Result<Gated<()>, QuotaError> = engine
        .gate()
        .execute(&request, || {
            ran = true;
            async { Ok(Work::Created(())) }
        })
        .await;

    assert!(ran);
    assert!(matches!(result, Err(QuotaError::StorageUnavailable { .. })));
}

#[tokio::test]
async fn test_lead_failure_surfaces_instead_of_denying() {
    let store = FlakyStore::default();
    let engine = engine(&store, Duration::from_secs(5));
    for _ in 0..3 {
        engine.ledger().increment("u1", Tool::Menus, &period()).await.unwrap();
    }
    store.fail_leads.store(true, Ordering::SeqCst);

    let request = AdmissionRequest::new("u1", Tool::Menus, Plan::Free, period())
        .with_profile(UserProfile::default());
    let result = engine.gate().admit_operation(&request).await;
    assert!(matches!(result, Err(QuotaError::StorageUnavailable { .. })));

    store.fail_leads.store(false, Ordering::SeqCst);
    assert!(matches!(
        engine.gate().admit_operation(&request).await.unwrap(),
        Admission::Deny(_)
    ));
    assert_eq!(store.inner.lead_count().await, 1);
}

#[tokio::test]
async fn test_stalled_store_times_out() {
    let store = FlakyStore::default();
    let engine = engine(&store, Duration::from_millis(50));
    store.stall.store(true, Ordering::SeqCst);

    let err = engine
        .ledger()
        .increment("u1", Tool::Exports, &period())
        .await
        .unwrap_err();

    match err {
        QuotaError::StorageUnavailable { operation, message } => {
            assert_eq!(operation, "increment usage");
            assert!(message.contains("timed out"));
        }
        other => panic!("expected a storage error, got {:?}", other),
    }
    assert_eq!(store.inner.counter_rows().await, 0);
}

#[tokio::test]
async fn test_demo_identity_needs_no_store() {
    let store = FlakyStore::default();
    let engine = engine(&store, Duration::from_secs(5));
    store.fail_reads.store(true, Ordering::SeqCst);
    store.fail_increments.store(true, Ordering::SeqCst);

    let request = AdmissionRequest::new("demo-user-123", Tool::Menus, Plan::Free, period());
    let Admission::Admit(ticket) = engine.gate().admit_operation(&request).await.unwrap() else {
        panic!("demo identity is always admitted");
    };
    assert_eq!(engine.gate().record(ticket).await.unwrap(), None);
}
