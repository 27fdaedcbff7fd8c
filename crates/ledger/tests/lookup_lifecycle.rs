//! Priced lookups end to end: charge, provider call, terminal state, refund.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{backdate_request, balance_of, checks_of, memory_db, settings, user_with};
use database::{request, transaction, RequestStatus, Tokens, TransactionKind, TransactionStatus};
use ledger::{LedgerError, LookupFailure, LookupResult, RequestLifecycle, HISTORY_LIMIT};
use lookup_providers::mock::{
    DelayedProvider, EmptyProvider, FailingProvider, PartialProvider, ScriptedProvider,
    StaticProvider,
};
use lookup_providers::LookupError;
use serde_json::json;

const USER: &str = "7012345678";

async fn lifecycle_with(
    provider: Arc<dyn lookup_providers::LookupProvider>,
) -> (database::Database, RequestLifecycle) {
    let db = memory_db().await;
    user_with(&db, USER, 10).await;
    let settings = settings(&db);
    settings.set_feature_cost("nama", Tokens::whole(3)).await.unwrap();
    let lifecycle = RequestLifecycle::new(db.clone(), settings).with_provider("nama", provider);
    (db, lifecycle)
}

#[tokio::test]
async fn successful_lookup_charges_once() {
    let provider = Arc::new(StaticProvider::new("nama-api", json!([{"nama": "BUDI SANTOSO"}])));
    let (db, lifecycle) = lifecycle_with(provider).await;

    let outcome = lifecycle.lookup(USER, "nama", "BUDI SANTOSO").await.unwrap();

    assert!(matches!(outcome.result, LookupResult::Found { .. }));
    assert_eq!(outcome.charged(), Tokens::whole(3));
    assert_eq!(outcome.balance, Tokens::whole(7));
    assert_eq!(balance_of(&db, USER).await, Tokens::whole(7));
    assert_eq!(checks_of(&db, USER).await, 1);

    let saved = request::get_request(db.pool(), &outcome.request_id).await.unwrap();
    assert_eq!(saved.status, RequestStatus::Success);
    assert_eq!(saved.api_type, "nama-api");
    assert!(saved.response_data.is_some());

    let entries = transaction::list_by_reference(db.pool(), &outcome.request_id)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, TransactionKind::Check);
    assert_eq!(entries[0].amount, Tokens::whole(3));
}

#[tokio::test]
async fn failed_lookup_refunds_in_full() {
    let (db, lifecycle) = lifecycle_with(Arc::new(FailingProvider::down("nama-api"))).await;

    let outcome = lifecycle.lookup(USER, "nama", "BUDI SANTOSO").await.unwrap();

    match &outcome.result {
        LookupResult::Failed { reason, refunded } => {
            assert!(matches!(reason, LookupFailure::ProviderFailure(_)));
            assert_eq!(*refunded, Tokens::whole(3));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(outcome.charged(), Tokens::ZERO);
    assert_eq!(balance_of(&db, USER).await, Tokens::whole(10));
    assert_eq!(checks_of(&db, USER).await, 0);

    let saved = request::get_request(db.pool(), &outcome.request_id).await.unwrap();
    assert_eq!(saved.status, RequestStatus::Failed);
    assert_eq!(saved.error_message.as_deref(), Some("provider down"));

    let entries = transaction::list_by_reference(db.pool(), &outcome.request_id)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, TransactionStatus::Failed);
}

#[tokio::test]
async fn empty_result_refunds() {
    let (db, lifecycle) = lifecycle_with(Arc::new(EmptyProvider::new("nama-api"))).await;

    let outcome = lifecycle.lookup(USER, "nama", "NOBODY").await.unwrap();
    assert!(matches!(
        outcome.result,
        LookupResult::Failed {
            reason: LookupFailure::EmptyResult(_),
            ..
        }
    ));
    assert_eq!(balance_of(&db, USER).await, Tokens::whole(10));
}

#[tokio::test]
async fn slow_provider_times_out_and_refunds() {
    let slow = DelayedProvider::with_millis(StaticProvider::new("nama-api", json!([1])), 500);
    let (db, lifecycle) = lifecycle_with(Arc::new(slow)).await;
    let lifecycle = lifecycle.with_provider_timeout(Duration::from_millis(50));

    let outcome = lifecycle.lookup(USER, "nama", "BUDI").await.unwrap();
    assert!(matches!(
        outcome.result,
        LookupResult::Failed {
            reason: LookupFailure::ProviderTimeout,
            ..
        }
    ));
    assert_eq!(balance_of(&db, USER).await, Tokens::whole(10));
}

#[tokio::test]
async fn partial_result_refunds_half() {
    let provider = PartialProvider::new("nama-api", json!({"nama": "BUDI"}), "photo unavailable");
    let (db, lifecycle) = lifecycle_with(Arc::new(provider)).await;

    let outcome = lifecycle.lookup(USER, "nama", "3171").await.unwrap();
    match &outcome.result {
        LookupResult::Partial { refunded, reason, .. } => {
            assert_eq!(*refunded, Tokens::whole(1));
            assert_eq!(reason, "photo unavailable");
        }
        other => panic!("expected partial, got {:?}", other),
    }
    assert_eq!(outcome.charged(), Tokens::whole(2));
    assert_eq!(balance_of(&db, USER).await, Tokens::whole(8));
    // The check still counts
    assert_eq!(checks_of(&db, USER).await, 1);

    let saved = request::get_request(db.pool(), &outcome.request_id).await.unwrap();
    assert_eq!(saved.status, RequestStatus::Partial);
}

#[tokio::test]
async fn failure_falls_back_to_fresh_cache() {
    let provider = Arc::new(
        ScriptedProvider::new("nama-api")
            .then_ok(json!([{"nama": "BUDI SANTOSO"}]))
            .then_err(LookupError::transient("connection reset")),
    );
    let (db, lifecycle) = lifecycle_with(provider.clone()).await;

    let first = lifecycle.lookup(USER, "nama", "BUDI SANTOSO").await.unwrap();
    backdate_request(&db, &first.request_id, 29).await;

    let second = lifecycle.lookup(USER, "nama", "BUDI SANTOSO").await.unwrap();
    match &second.result {
        LookupResult::Cached {
            payload,
            source_request_id,
            ..
        } => {
            assert_eq!(payload[0]["nama"], "BUDI SANTOSO");
            assert_eq!(source_request_id, &first.request_id);
        }
        other => panic!("expected cached result, got {:?}", other),
    }
    assert_eq!(provider.calls(), 2);
    assert_eq!(balance_of(&db, USER).await, Tokens::whole(4));

    let saved = request::get_request(db.pool(), &second.request_id).await.unwrap();
    assert_eq!(saved.status, RequestStatus::Success);
    assert!(saved.from_cache);
    assert_eq!(saved.source_request_id.as_deref(), Some(first.request_id.as_str()));
    assert!(saved.response_data.is_none());
}

#[tokio::test]
async fn stale_cache_is_ignored() {
    let provider = Arc::new(
        ScriptedProvider::new("nama-api")
            .then_ok(json!([{"nama": "BUDI SANTOSO"}]))
            .then_err(LookupError::transient("connection reset")),
    );
    let (db, lifecycle) = lifecycle_with(provider).await;

    let first = lifecycle.lookup(USER, "nama", "BUDI SANTOSO").await.unwrap();
    backdate_request(&db, &first.request_id, 31).await;

    let second = lifecycle.lookup(USER, "nama", "BUDI SANTOSO").await.unwrap();
    assert!(matches!(second.result, LookupResult::Failed { .. }));
    assert_eq!(balance_of(&db, USER).await, Tokens::whole(7));
}

#[tokio::test]
async fn cache_is_keyed_by_feature_and_query() {
    let provider = Arc::new(
        ScriptedProvider::new("nama-api")
            .then_ok(json!([{"nama": "BUDI SANTOSO"}]))
            .then_err(LookupError::Timeout),
    );
    let (_db, lifecycle) = lifecycle_with(provider).await;

    lifecycle.lookup(USER, "nama", "BUDI SANTOSO").await.unwrap();
    let other = lifecycle.lookup(USER, "nama", "SITI").await.unwrap();
    assert!(matches!(other.result, LookupResult::Failed { .. }));
}

#[tokio::test]
async fn rejected_lookups_charge_nothing() {
    let provider = Arc::new(StaticProvider::new("nama-api", json!([1])));
    let (db, lifecycle) = lifecycle_with(provider).await;
    let settings = common::settings(&db);

    assert!(matches!(
        lifecycle.lookup(USER, "kk", "1").await,
        Err(LedgerError::UnknownFeature(_))
    ));

    settings.set_feature_maintenance("nama", true).await.unwrap();
    assert!(matches!(
        lifecycle.lookup(USER, "nama", "1").await,
        Err(LedgerError::MaintenanceActive(_))
    ));
    settings.set_feature_maintenance("nama", false).await.unwrap();

    settings.set_global_maintenance(true).await.unwrap();
    assert!(matches!(
        lifecycle.lookup(USER, "nama", "1").await,
        Err(LedgerError::MaintenanceActive(_))
    ));
    settings.set_global_maintenance(false).await.unwrap();

    settings.set_feature_cost("nama", Tokens::whole(11)).await.unwrap();
    assert!(matches!(
        lifecycle.lookup(USER, "nama", "1").await,
        Err(LedgerError::InsufficientBalance { .. })
    ));

    assert_eq!(balance_of(&db, USER).await, Tokens::whole(10));
    assert!(lifecycle.history(USER).await.unwrap().is_empty());
}

#[tokio::test]
async fn fetch_saved_charges_retrieval_fee() {
    let provider = Arc::new(
        ScriptedProvider::new("nama-api")
            .then_ok(json!([{"nama": "BUDI SANTOSO"}]))
            .then_err(LookupError::Timeout),
    );
    let (db, lifecycle) = lifecycle_with(provider).await;
    user_with(&db, "other", 10).await;

    let live = lifecycle.lookup(USER, "nama", "BUDI SANTOSO").await.unwrap();
    let cached = lifecycle.lookup(USER, "nama", "BUDI SANTOSO").await.unwrap();
    assert_eq!(balance_of(&db, USER).await, Tokens::whole(4));

    let saved = lifecycle.fetch_saved(USER, &live.request_id).await.unwrap();
    assert_eq!(saved.payload[0]["nama"], "BUDI SANTOSO");
    assert_eq!(saved.charged, Tokens::from_units(50));
    assert_eq!(saved.balance, "3.5".parse::<Tokens>().unwrap());

    // A cache-served request reads through to its source
    let via_cache = lifecycle.fetch_saved(USER, &cached.request_id).await.unwrap();
    assert_eq!(via_cache.payload, saved.payload);
    assert_eq!(balance_of(&db, USER).await, Tokens::whole(3));

    assert!(matches!(
        lifecycle.fetch_saved("other", &live.request_id).await,
        Err(LedgerError::NotFound { .. })
    ));

    backdate_request(&db, &live.request_id, 11).await;
    assert!(matches!(
        lifecycle.fetch_saved(USER, &live.request_id).await,
        Err(LedgerError::NotFound { .. })
    ));
    assert_eq!(balance_of(&db, USER).await, Tokens::whole(3));
}

#[tokio::test]
async fn fetch_saved_refuses_failed_requests() {
    let (db, lifecycle) = lifecycle_with(Arc::new(FailingProvider::down("nama-api"))).await;

    let failed = lifecycle.lookup(USER, "nama", "BUDI").await.unwrap();
    assert!(matches!(
        lifecycle.fetch_saved(USER, &failed.request_id).await,
        Err(LedgerError::NotFound { .. })
    ));
    assert_eq!(balance_of(&db, USER).await, Tokens::whole(10));
}

#[tokio::test]
async fn history_is_newest_first_and_capped() {
    let provider = Arc::new(StaticProvider::new("nama-api", json!([1])));
    let (db, lifecycle) = lifecycle_with(provider).await;
    user_with(&db, USER, 100).await;

    let mut last = String::new();
    for i in 0..(HISTORY_LIMIT + 2) {
        last = lifecycle
            .lookup(USER, "nama", &format!("Q{}", i))
            .await
            .unwrap()
            .request_id;
    }

    let history = lifecycle.history(USER).await.unwrap();
    assert_eq!(history.len() as i64, HISTORY_LIMIT);
    assert_eq!(history[0].request_id, last);
}
