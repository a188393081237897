use anyhow::Result;
use gastro_quota::{
    Admission, AdmissionRequest, DemoIdentity, Gated, LeadSource, LeadStatus, Limit, LimitInfo,
    MemoryStore, Period, Plan, PlanPolicy, QuotaEngine, QuotaError, Tool, UserProfile, Work,
};
use std::time::Duration;

fn engine(store: &MemoryStore) -> QuotaEngine {
    QuotaEngine::with_store(
        store.clone(),
        PlanPolicy::standard(),
        DemoIdentity::default(),
        Duration::from_secs(5),
    )
}

fn profile() -> UserProfile {
    UserProfile {
        name: Some("Sophie Keller".to_string()),
        email: Some("sophie@kellers-kueche.de".to_string()),
        company: None,
    }
}

#[tokio::test]
async fn test_free_user_at_recipe_limit_is_denied_once_with_one_lead() -> Result<()> {
    let store = MemoryStore::new();
    let engine = engine(&store);
    let period: Period = "2024-05".parse()?;

    for _ in 0..10 {
        engine.ledger().increment("u-42", Tool::Recipes, &period).await?;
    }

    let request = AdmissionRequest::new("u-42", Tool::Recipes, Plan::Free, period)
        .with_profile(profile());
    let expected = Admission::Deny(LimitInfo {
        limit: Limit::Finite(10),
        used: 10,
    });

    assert_eq!(engine.gate().admit_operation(&request).await?, expected);
    let leads = engine.leads().list(None).await?;
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].user_id.as_deref(), Some("u-42"));
    assert_eq!(leads[0].tool, Some(Tool::Recipes));
    assert_eq!(leads[0].company, "");
    assert_eq!(leads[0].source, LeadSource::FreemiumLimitReached);
    assert_eq!(leads[0].status, LeadStatus::New);

    assert_eq!(engine.gate().admit_operation(&request).await?, expected);
    assert_eq!(engine.leads().list(None).await?.len(), 1);

    // A denied check never moves the counter.
    assert_eq!(
        engine.ledger().current_usage("u-42", Tool::Recipes, &period).await?,
        10
    );
    Ok(())
}

#[tokio::test]
async fn test_lead_is_not_repeated_in_later_periods() -> Result<()> {
    let store = MemoryStore::new();
    let engine = engine(&store);
    let may: Period = "2024-05".parse()?;
    let june: Period = "2024-06".parse()?;

    for period in [may, june] {
        for _ in 0..3 {
            engine.ledger().increment("u-7", Tool::Menus, &period).await?;
        }
        let request = AdmissionRequest::new("u-7", Tool::Menus, Plan::Free, period);
        assert!(!engine.gate().admit_operation(&request).await?.is_admitted());
    }

    assert_eq!(store.lead_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_new_month_resets_quota() -> Result<()> {
    let store = MemoryStore::new();
    let engine = engine(&store);
    let may: Period = "2024-05".parse()?;
    let june: Period = "2024-06".parse()?;

    for _ in 0..5 {
        engine.ledger().increment("u-1", Tool::Exports, &may).await?;
    }

    let in_may = AdmissionRequest::new("u-1", Tool::Exports, Plan::Free, may);
    let in_june = AdmissionRequest::new("u-1", Tool::Exports, Plan::Free, june);
    assert!(!engine.gate().admit_operation(&in_may).await?.is_admitted());
    assert!(engine.gate().admit_operation(&in_june).await?.is_admitted());
    Ok(())
}

#[tokio::test]
async fn test_premium_user_is_never_denied() -> Result<()> {
    let store = MemoryStore::new();
    let engine = engine(&store);
    let period: Period = "2024-05".parse()?;

    let request = AdmissionRequest::new("chef", Tool::Inventory, Plan::Premium, period);
    for _ in 0..150 {
        let outcome: Gated<u32> = engine
            .gate()
            .execute(&request, || async { Ok::<_, QuotaError>(Work::Created(1)) })
            .await?;
        assert!(matches!(outcome, Gated::Completed { .. }));
    }

    assert_eq!(
        engine.ledger().current_usage("chef", Tool::Inventory, &period).await?,
        150
    );
    assert_eq!(store.lead_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_execute_stops_at_the_limit() -> Result<()> {
    let store = MemoryStore::new();
    let engine = engine(&store);
    let period: Period = "2024-05".parse()?;
    let request = AdmissionRequest::new("u-9", Tool::Menus, Plan::Free, period)
        .with_profile(profile());

    let mut created = Vec::new();
    for i in 0..5 {
        let outcome = engine
            .gate()
            .execute(&request, || async move {
                Ok::<_, QuotaError>(Work::Created(format!("menu-{}", i)))
            })
            .await?;
        if let Gated::Completed { value, .. } = outcome {
            created.push(value);
        }
    }

    assert_eq!(created, vec!["menu-0", "menu-1", "menu-2"]);
    assert_eq!(store.lead_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_usage_summary_and_stats() -> Result<()> {
    let store = MemoryStore::new();
    let engine = engine(&store);
    let period: Period = "2024-05".parse()?;

    engine.ledger().increment("a", Tool::Menus, &period).await?;
    engine.ledger().increment("a", Tool::CostEntries, &period).await?;
    engine.ledger().increment("b", Tool::Menus, &period).await?;

    let summary = engine.ledger().summary("a", Plan::Free, &period).await?;
    let menus = summary
        .tools
        .iter()
        .find(|t| t.tool == Tool::Menus)
        .expect("every tool is listed");
    assert_eq!(menus.count, 1);
    assert_eq!(menus.remaining, Some(2));

    let stats = engine.stats(&period).await?;
    assert_eq!(stats.monthly_usage[&Tool::Menus], 2);
    assert_eq!(stats.active_users, 2);
    Ok(())
}
