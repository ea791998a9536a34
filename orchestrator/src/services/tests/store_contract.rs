//! Behaviour every `JobStore` implementation must share
//!
//! Each check takes a fresh store so the memory and SQLite test files can
//! run the same assertions against their own implementation.

use chrono::Utc;
use shared::{BattleFilter, BattleStatus};

use super::common::{backend, battle_with_queries, result_for};
use crate::core::BattleTransition;
use crate::error::OrchestratorError;
use crate::traits::JobStore;

pub async fn backends_round_trip<S: JobStore>(store: &S) {
    let record = backend("algolia", Some(r#"{"version":1}"#));

    store.insert_backend(record.clone()).await.unwrap();

    assert_eq!(store.get_backend(record.id).await.unwrap(), Some(record.clone()));
    assert_eq!(store.list_backends().await.unwrap().len(), 1);
    assert!(store.delete_backend(record.id).await.unwrap());
    assert!(!store.delete_backend(record.id).await.unwrap());
    assert!(store.get_backend(record.id).await.unwrap().is_none());
}

pub async fn battles_keep_query_order<S: JobStore>(store: &S) {
    let (battle, queries) = battle_with_queries("ordering", 0);

    store.create_battle(battle.clone(), queries.clone()).await.unwrap();

    let stored = store.get_battle(battle.id).await.unwrap().unwrap();
    assert_eq!(stored.label, "ordering");
    assert_eq!(stored.config2, battle.config2);
    let texts: Vec<_> = store
        .list_queries(battle.id)
        .await
        .unwrap()
        .into_iter()
        .map(|q| q.query_text)
        .collect();
    assert_eq!(texts, vec!["red shoes", "blue hat"]);
}

pub async fn listing_is_newest_first_and_filtered<S: JobStore>(store: &S) {
    let (mut old, old_queries) = battle_with_queries("old", 120);
    old.owner = Some("alice".to_string());
    let (mut new, new_queries) = battle_with_queries("new", 0);
    new.owner = Some("bob".to_string());
    store.create_battle(old.clone(), old_queries).await.unwrap();
    store.create_battle(new.clone(), new_queries).await.unwrap();
    store.set_demo(old.id, true).await.unwrap();

    let all = store.list_battles(BattleFilter::default()).await.unwrap();
    let bob = store.list_battles(BattleFilter::for_owner("bob")).await.unwrap();
    let demos = store.list_battles(BattleFilter::demos()).await.unwrap();

    assert_eq!(all.iter().map(|b| b.id).collect::<Vec<_>>(), vec![new.id, old.id]);
    assert_eq!(bob.iter().map(|b| b.id).collect::<Vec<_>>(), vec![new.id]);
    assert_eq!(demos.iter().map(|b| b.id).collect::<Vec<_>>(), vec![old.id]);
    assert!(demos[0].is_demo);
}

pub async fn transitions_follow_state_machine<S: JobStore>(store: &S) {
    let (battle, queries) = battle_with_queries("lifecycle", 0);
    let query_id = queries[0].id;
    store.create_battle(battle.clone(), queries).await.unwrap();

    let running = store.apply_transition(battle.id, BattleTransition::Start).await.unwrap();
    assert_eq!(running.status, BattleStatus::InProgress);

    let again = store.apply_transition(battle.id, BattleTransition::Start).await;
    assert!(matches!(again, Err(OrchestratorError::AlreadyInProgress { .. })));

    store.set_query_error(query_id, Some("boom".to_string())).await.unwrap();
    let failed = store
        .apply_transition(battle.id, BattleTransition::Fail { error: "boom".to_string() })
        .await
        .unwrap();
    assert_eq!(failed.status, BattleStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("boom"));
    assert!(failed.completed_at.is_some());

    let completing = store
        .apply_transition(
            battle.id,
            BattleTransition::Complete {
                mean_score1: 5.0,
                mean_score2: 0.0,
                metadata: Default::default(),
            },
        )
        .await;
    assert!(matches!(completing, Err(OrchestratorError::InvalidTransition { .. })));

    let reset = store.apply_transition(battle.id, BattleTransition::Reset).await.unwrap();
    assert_eq!(reset.status, BattleStatus::Pending);
    assert!(reset.error.is_none());
    assert!(reset.completed_at.is_none());
    assert!(reset.queued_at >= failed.queued_at);
    let cleared = store.list_queries(battle.id).await.unwrap();
    assert!(cleared.iter().all(|q| q.error.is_none()));

    let missing = store
        .apply_transition(uuid::Uuid::new_v4(), BattleTransition::Start)
        .await;
    assert!(matches!(missing, Err(OrchestratorError::BattleNotFound { .. })));
}

pub async fn timeout_applies_to_unfinished_only<S: JobStore>(store: &S) {
    let (pending, pending_queries) = battle_with_queries("pending", 0);
    let (done, done_queries) = battle_with_queries("done", 0);
    store.create_battle(pending.clone(), pending_queries).await.unwrap();
    store.create_battle(done.clone(), done_queries).await.unwrap();
    store.apply_transition(done.id, BattleTransition::Start).await.unwrap();
    store
        .apply_transition(
            done.id,
            BattleTransition::Complete {
                mean_score1: 6.0,
                mean_score2: 4.0,
                metadata: Default::default(),
            },
        )
        .await
        .unwrap();

    let unfinished = store.list_unfinished_battles().await.unwrap();
    assert_eq!(unfinished.iter().map(|b| b.id).collect::<Vec<_>>(), vec![pending.id]);

    let timed_out = store.apply_transition(pending.id, BattleTransition::TimeOut).await.unwrap();
    assert_eq!(timed_out.status, BattleStatus::Failed);
    assert_eq!(timed_out.error.as_deref(), Some("Battle timed out"));

    let late = store.apply_transition(done.id, BattleTransition::TimeOut).await;
    assert!(matches!(late, Err(OrchestratorError::InvalidTransition { .. })));
}

pub async fn results_are_unique_and_ordered<S: JobStore>(store: &S) {
    let (battle, queries) = battle_with_queries("results", 0);
    store.create_battle(battle.clone(), queries.clone()).await.unwrap();

    // Inserted out of order on purpose
    store.insert_result(result_for(&queries[1], 1, 1, 6.0)).await.unwrap();
    store.insert_result(result_for(&queries[0], 2, 1, 4.0)).await.unwrap();
    store.insert_result(result_for(&queries[0], 1, 2, -1.0)).await.unwrap();
    store.insert_result(result_for(&queries[0], 1, 1, 8.0)).await.unwrap();

    let duplicate = store.insert_result(result_for(&queries[0], 1, 1, 9.0)).await;
    assert!(matches!(
        duplicate,
        Err(OrchestratorError::DuplicateResult { config_index: 1, rating_index: 1, .. })
    ));

    let results = store.list_results(battle.id).await.unwrap();
    let keys: Vec<_> = results
        .iter()
        .map(|r| (r.query_id == queries[0].id, r.config_index, r.rating_index))
        .collect();
    assert_eq!(keys, vec![(true, 1, 1), (true, 1, 2), (true, 2, 1), (false, 1, 1)]);
    assert_eq!(results[0].hits[0].title, "Red Shoe");
    assert_eq!(results[0].metadata["totalResults"], 1);

    assert_eq!(store.delete_results_for_battle(battle.id).await.unwrap(), 4);
    assert!(store.list_results(battle.id).await.unwrap().is_empty());
}

pub async fn delete_cascades<S: JobStore>(store: &S) {
    let (battle, queries) = battle_with_queries("cascade", 0);
    let (other, other_queries) = battle_with_queries("survivor", 0);
    store.create_battle(battle.clone(), queries.clone()).await.unwrap();
    store.create_battle(other.clone(), other_queries.clone()).await.unwrap();
    store.insert_result(result_for(&queries[0], 1, 1, 7.0)).await.unwrap();
    store.insert_result(result_for(&other_queries[0], 1, 1, 7.0)).await.unwrap();

    assert!(store.delete_battle(battle.id).await.unwrap());
    assert!(!store.delete_battle(battle.id).await.unwrap());

    assert!(store.get_battle(battle.id).await.unwrap().is_none());
    assert!(store.list_queries(battle.id).await.unwrap().is_empty());
    assert!(store.list_results(battle.id).await.unwrap().is_empty());
    assert_eq!(store.list_results(other.id).await.unwrap().len(), 1);
    assert!(store.get_battle(other.id).await.unwrap().unwrap().created_at <= Utc::now());
}
