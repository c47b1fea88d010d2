use crate::sqlite::SqliteProfileStore;
use crate::{BeginOutcome, ProfileStore, StorageError};
use chrono::Duration;
use rise_common::types::{
    AnalysisStatus, InsightCategory, InsightDraft, InsightSeverity, InteractionKind,
    InterestLevel, NewInvestorProfile, NewStartupProfile,
};
use serde_json::json;
use tempfile::TempDir;

fn setup() -> (TempDir, SqliteProfileStore) {
    let dir = TempDir::new().unwrap();
    let store = SqliteProfileStore::open(dir.path()).unwrap();
    (dir, store)
}

fn startup(name: &str) -> NewStartupProfile {
    NewStartupProfile {
        user_id: Some("user-1".to_string()),
        name: name.to_string(),
        industry: Some("Fintech".to_string()),
        num_customers: Some(40),
        ..Default::default()
    }
}

fn investor(name: &str) -> NewInvestorProfile {
    NewInvestorProfile {
        full_name: name.to_string(),
        company_name: Some("Seed Partners".to_string()),
        job_title: Some("Partner".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn insert_and_get_startup() {
    let (_dir, store) = setup();

    let created = store.insert_startup(&startup("Acme")).await.unwrap();
    assert!(created.id > 0);
    assert_eq!(created.analysis_status, None);
    assert_eq!(created.ai_analysis, None);

    let fetched = store.get_startup(created.id).await.unwrap().unwrap();
    assert_eq!(fetched.details.name, "Acme");
    assert_eq!(fetched.details.num_customers, Some(40));
    assert_eq!(fetched.details.industry.as_deref(), Some("Fintech"));

    assert!(store.get_startup(created.id + 100).await.unwrap().is_none());
}

#[tokio::test]
async fn list_and_count_startups() {
    let (_dir, store) = setup();
    for name in ["A", "B", "C"] {
        store.insert_startup(&startup(name)).await.unwrap();
    }

    assert_eq!(store.count_startups().await.unwrap(), 3);
    let page = store.list_startups(2, 0).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].details.name, "C");
    let rest = store.list_startups(2, 2).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].details.name, "A");
}

#[tokio::test]
async fn begin_analysis_is_exclusive() {
    let (_dir, store) = setup();
    let id = store.insert_startup(&startup("Acme")).await.unwrap().id;

    let first = store.try_begin_analysis(id, Duration::minutes(10)).await.unwrap();
    assert_eq!(first, BeginOutcome::Started);

    let second = store.try_begin_analysis(id, Duration::minutes(10)).await.unwrap();
    assert!(matches!(second, BeginOutcome::AlreadyProcessing { since: Some(_) }));

    let row = store.get_startup(id).await.unwrap().unwrap();
    assert_eq!(row.analysis_status, Some(AnalysisStatus::Processing));
    assert!(row.analysis_timestamp.is_some());
}

#[tokio::test]
async fn begin_analysis_takes_over_stale_run() {
    let (_dir, store) = setup();
    let id = store.insert_startup(&startup("Acme")).await.unwrap().id;

    store.try_begin_analysis(id, Duration::minutes(10)).await.unwrap();
    // A negative window treats any in-flight run as abandoned.
    let outcome = store.try_begin_analysis(id, Duration::milliseconds(-1)).await.unwrap();
    assert_eq!(outcome, BeginOutcome::Started);
}

#[tokio::test]
async fn begin_analysis_unknown_startup() {
    let (_dir, store) = setup();
    let outcome = store.try_begin_analysis(999, Duration::minutes(10)).await.unwrap();
    assert_eq!(outcome, BeginOutcome::NotFound);
}

#[tokio::test]
async fn begin_analysis_restarts_terminal_states() {
    let (_dir, store) = setup();
    let id = store.insert_startup(&startup("Acme")).await.unwrap().id;

    store.try_begin_analysis(id, Duration::minutes(10)).await.unwrap();
    store.fail_analysis(id, "boom").await.unwrap();
    assert_eq!(
        store.try_begin_analysis(id, Duration::minutes(10)).await.unwrap(),
        BeginOutcome::Started
    );

    store.complete_analysis(id, &json!({})).await.unwrap();
    assert_eq!(
        store.try_begin_analysis(id, Duration::minutes(10)).await.unwrap(),
        BeginOutcome::Started
    );
}

#[tokio::test]
async fn complete_analysis_stores_document_and_score() {
    let (_dir, store) = setup();
    let id = store.insert_startup(&startup("Acme")).await.unwrap().id;
    store.try_begin_analysis(id, Duration::minutes(10)).await.unwrap();

    let doc = json!({"executive_summary": "Strong team.", "funding_readiness_score": 72});
    store.complete_analysis(id, &doc).await.unwrap();

    let row = store.get_startup(id).await.unwrap().unwrap();
    assert_eq!(row.analysis_status, Some(AnalysisStatus::Completed));
    assert_eq!(row.ai_analysis, Some(doc));
    assert_eq!(row.funding_readiness_score, Some(72));
}

#[tokio::test]
async fn complete_without_score_keeps_previous_score() {
    let (_dir, store) = setup();
    let id = store.insert_startup(&startup("Acme")).await.unwrap().id;
    store.set_readiness_score(id, Some(55)).await.unwrap();

    store.complete_analysis(id, &json!({"executive_summary": "x"})).await.unwrap();

    let row = store.get_startup(id).await.unwrap().unwrap();
    assert_eq!(row.funding_readiness_score, Some(55));
}

#[tokio::test]
async fn fail_analysis_stores_error_payload() {
    let (_dir, store) = setup();
    let id = store.insert_startup(&startup("Acme")).await.unwrap().id;
    store.try_begin_analysis(id, Duration::minutes(10)).await.unwrap();

    store.fail_analysis(id, "upstream timeout").await.unwrap();

    let row = store.get_startup(id).await.unwrap().unwrap();
    assert_eq!(row.analysis_status, Some(AnalysisStatus::Failed));
    assert_eq!(row.ai_analysis, Some(json!({"error": "upstream timeout"})));
}

#[tokio::test]
async fn legacy_error_status_reads_as_failed() {
    let (_dir, store) = setup();
    let id = store.insert_startup(&startup("Acme")).await.unwrap().id;
    store
        .conn()
        .execute(
            "UPDATE startups SET analysis_status = 'error' WHERE id = ?1",
            rusqlite::params![id],
        )
        .unwrap();

    let row = store.get_startup(id).await.unwrap().unwrap();
    assert_eq!(row.analysis_status, Some(AnalysisStatus::Failed));
}

#[tokio::test]
async fn updates_on_missing_startup_are_not_found() {
    let (_dir, store) = setup();
    let err = store.fail_analysis(42, "x").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { entity: "startup", .. }));
    let err = store.complete_analysis(42, &json!({})).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
    let err = store.set_readiness_score(42, Some(10)).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn readiness_score_can_be_cleared() {
    let (_dir, store) = setup();
    let id = store.insert_startup(&startup("Acme")).await.unwrap().id;
    store.set_readiness_score(id, Some(81)).await.unwrap();
    store.set_readiness_score(id, None).await.unwrap();
    let row = store.get_startup(id).await.unwrap().unwrap();
    assert_eq!(row.funding_readiness_score, None);
}

#[tokio::test]
async fn investors_crud() {
    let (_dir, store) = setup();
    let created = store.insert_investor(&investor("Jane Doe")).await.unwrap();
    let fetched = store.get_investor(created.id).await.unwrap().unwrap();
    assert_eq!(fetched.details.full_name, "Jane Doe");
    assert_eq!(store.list_investors(10, 0).await.unwrap().len(), 1);
    assert!(store.get_investor(created.id + 1).await.unwrap().is_none());
}

#[tokio::test]
async fn interest_summary_per_investor() {
    let (_dir, store) = setup();
    let startup_id = store.insert_startup(&startup("Acme")).await.unwrap().id;
    let casual = store.insert_investor(&investor("Casual")).await.unwrap().id;
    let keen = store.insert_investor(&investor("Keen")).await.unwrap().id;

    store
        .record_investor_interest(startup_id, casual, InteractionKind::ProfileView)
        .await
        .unwrap();
    for kind in [
        InteractionKind::ProfileView,
        InteractionKind::DeckView,
        InteractionKind::FinancialsView,
    ] {
        store
            .record_investor_interest(startup_id, keen, kind)
            .await
            .unwrap();
    }

    let interested = store.list_interested_investors(startup_id).await.unwrap();
    assert_eq!(interested.len(), 2);

    let keen_row = interested.iter().find(|i| i.id == keen).unwrap();
    assert_eq!(keen_row.view_count, 3);
    assert!(keen_row.has_viewed_deck);
    assert!(keen_row.has_viewed_financials);
    assert_eq!(keen_row.interest_level, InterestLevel::High);
    assert_eq!(keen_row.name.as_deref(), Some("Keen"));
    assert_eq!(keen_row.company.as_deref(), Some("Seed Partners"));

    let casual_row = interested.iter().find(|i| i.id == casual).unwrap();
    assert_eq!(casual_row.view_count, 1);
    assert_eq!(casual_row.interest_level, InterestLevel::Low);
    assert!(casual_row.last_activity_at.is_some());
}

#[tokio::test]
async fn interest_requires_both_profiles() {
    let (_dir, store) = setup();
    let startup_id = store.insert_startup(&startup("Acme")).await.unwrap().id;
    let err = store
        .record_investor_interest(startup_id, 77, InteractionKind::DeckView)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { entity: "investor", .. }));
    assert!(store
        .list_interested_investors(startup_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn replace_insights_overwrites_previous_set() {
    let (_dir, store) = setup();
    let id = store.insert_startup(&startup("Acme")).await.unwrap().id;

    let first = vec![InsightDraft {
        title: "Old".to_string(),
        summary: "Stale".to_string(),
        category: InsightCategory::Threat,
        severity: None,
    }];
    store.replace_insights(id, &first).await.unwrap();

    let second = vec![
        InsightDraft {
            title: "Traction".to_string(),
            summary: "40 customers".to_string(),
            category: InsightCategory::Strength,
            severity: Some(InsightSeverity::Low),
        },
        InsightDraft {
            title: "Burn".to_string(),
            summary: "High burn".to_string(),
            category: InsightCategory::Weakness,
            severity: Some(InsightSeverity::High),
        },
    ];
    let stored = store.replace_insights(id, &second).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].title, "Traction");
    assert_eq!(stored[1].severity, Some(InsightSeverity::High));

    let listed = store.list_insights(id).await.unwrap();
    assert_eq!(listed, stored);
}

#[tokio::test]
async fn replace_insights_unknown_startup() {
    let (_dir, store) = setup();
    let err = store.replace_insights(5, &[]).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let id = {
        let store = SqliteProfileStore::open(dir.path()).unwrap();
        store.insert_startup(&startup("Acme")).await.unwrap().id
    };
    let store = SqliteProfileStore::open(dir.path()).unwrap();
    assert!(store.get_startup(id).await.unwrap().is_some());
}

#[tokio::test]
async fn in_memory_store_works() {
    let store = SqliteProfileStore::open_in_memory().unwrap();
    let created = store.insert_startup(&startup("Acme")).await.unwrap();
    assert_eq!(store.count_startups().await.unwrap(), 1);
    assert!(store.get_startup(created.id).await.unwrap().is_some());
}
