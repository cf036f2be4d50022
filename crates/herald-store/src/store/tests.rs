use super::Store;
use crate::usage::{UsageEntry, UsageLogger};
use herald_core::message::Role;
use herald_core::user::Tier;

/// Create an in-memory store for testing.
async fn test_store() -> Store {
    Store::open_in_memory().await.unwrap()
}

#[tokio::test]
async fn test_find_missing_user() {
    let store = test_store().await;
    assert!(store
        .find_user_by_external_id("nobody")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_create_and_find_round_trip() {
    let store = test_store().await;
    let created = store
        .create_user("123", Some("Alice"), Tier::Free)
        .await
        .unwrap();

    let found = store
        .find_user_by_external_id("123")
        .await
        .unwrap()
        .expect("user should exist after create");

    assert_eq!(found.id, created.id);
    assert_eq!(found.tier, Tier::Free);
    assert_eq!(found.message_count, 0);
    assert_eq!(found.message_quota, 100);
    assert_eq!(found.is_active, Some(true));
    assert_eq!(found.display_name.as_deref(), Some("Alice"));
    assert!(found.completion_credential.is_none());
    assert!(found.execution_credential.is_none());
    assert!(found.quota_reset_date > found.created_at);
}

#[tokio::test]
async fn test_increment_message_count() {
    let store = test_store().await;
    let user = store.create_user("123", None, Tier::Free).await.unwrap();

    for _ in 0..3 {
        store.increment_message_count(&user.id).await.unwrap();
    }

    let found = store.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(found.message_count, 3);
}

#[tokio::test]
async fn test_concurrent_increments_lose_no_updates() {
    let store = test_store().await;
    let user = store.create_user("123", None, Tier::Free).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let store = store.clone();
        let id = user.id.clone();
        handles.push(tokio::spawn(async move {
            store.increment_message_count(&id).await.unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let found = store.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(found.message_count, 10);
}

#[tokio::test]
async fn test_touch_activity_refreshes_display_name() {
    let store = test_store().await;
    let user = store
        .create_user("123", Some("Old Name"), Tier::Free)
        .await
        .unwrap();

    // None leaves the existing name in place.
    store.touch_activity(&user.id, None).await.unwrap();
    let found = store.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(found.display_name.as_deref(), Some("Old Name"));

    store
        .touch_activity(&user.id, Some("New Name"))
        .await
        .unwrap();
    let found = store.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(found.display_name.as_deref(), Some("New Name"));
}

#[tokio::test]
async fn test_set_tier_updates_quota() {
    let store = test_store().await;
    let user = store.create_user("123", None, Tier::Free).await.unwrap();

    store.set_tier(&user.id, Tier::Basic).await.unwrap();

    let found = store.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(found.tier, Tier::Basic);
    assert_eq!(found.message_quota, 500);
}

#[tokio::test]
async fn test_set_active() {
    let store = test_store().await;
    let user = store.create_user("123", None, Tier::Free).await.unwrap();

    store.set_active(&user.id, false).await.unwrap();
    let found = store.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(found.is_active, Some(false));

    store.set_active(&user.id, true).await.unwrap();
    let found = store.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(found.is_active, Some(true));
}

#[tokio::test]
async fn test_credentials_set_and_clear() {
    let store = test_store().await;
    let user = store.create_user("123", None, Tier::Free).await.unwrap();

    store
        .set_completion_credential(&user.id, "enc:v1:abc")
        .await
        .unwrap();
    store
        .set_execution_credential(&user.id, "enc:v1:def")
        .await
        .unwrap();

    let found = store.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(found.completion_credential.as_deref(), Some("enc:v1:abc"));
    assert_eq!(found.execution_credential.as_deref(), Some("enc:v1:def"));

    store.clear_credentials(&user.id).await.unwrap();
    let found = store.get_user(&user.id).await.unwrap().unwrap();
    assert!(found.completion_credential.is_none());
    assert!(found.execution_credential.is_none());
}

#[tokio::test]
async fn test_reset_quota_window() {
    let store = test_store().await;
    let user = store.create_user("123", None, Tier::Free).await.unwrap();
    for _ in 0..5 {
        store.increment_message_count(&user.id).await.unwrap();
    }

    let next_reset = store.reset_quota_window(&user.id).await.unwrap();

    let found = store.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(found.message_count, 0);
    assert_eq!(found.quota_reset_date, next_reset);
    assert!(found.quota_reset_date > user.quota_reset_date);
}

#[tokio::test]
async fn test_conversation_idempotent_per_thread() {
    let store = test_store().await;
    let user = store.create_user("123", None, Tier::Free).await.unwrap();

    let a = store
        .find_or_create_conversation(&user.id, "telegram:42")
        .await
        .unwrap();
    let b = store
        .find_or_create_conversation(&user.id, "telegram:42")
        .await
        .unwrap();
    assert_eq!(a, b);

    let c = store
        .find_or_create_conversation(&user.id, "telegram:43")
        .await
        .unwrap();
    assert_ne!(a, c);
}

#[tokio::test]
async fn test_messages_ordered_and_limited() {
    let store = test_store().await;
    let user = store.create_user("123", None, Tier::Free).await.unwrap();
    let conv = store
        .find_or_create_conversation(&user.id, "telegram:42")
        .await
        .unwrap();

    store
        .append_message(&conv, Role::User, "first", None)
        .await
        .unwrap();
    store
        .append_message(&conv, Role::Assistant, "second", Some(12))
        .await
        .unwrap();
    store
        .append_message(&conv, Role::User, "third", None)
        .await
        .unwrap();

    let all = store.recent_messages(&conv, 10).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0], (Role::User, "first".to_string()));
    assert_eq!(all[1], (Role::Assistant, "second".to_string()));
    assert_eq!(all[2], (Role::User, "third".to_string()));

    // Limit keeps the most recent messages, still oldest first.
    let last_two = store.recent_messages(&conv, 2).await.unwrap();
    assert_eq!(last_two.len(), 2);
    assert_eq!(last_two[0].1, "second");
    assert_eq!(last_two[1].1, "third");
}

#[tokio::test]
async fn test_soft_deleted_messages_excluded() {
    let store = test_store().await;
    let user = store.create_user("123", None, Tier::Free).await.unwrap();
    let conv = store
        .find_or_create_conversation(&user.id, "telegram:42")
        .await
        .unwrap();

    store
        .append_message(&conv, Role::User, "keep", None)
        .await
        .unwrap();
    let deleted = store
        .append_message(&conv, Role::Assistant, "drop", None)
        .await
        .unwrap();

    // Simulate an external retention job.
    sqlx::query("UPDATE messages SET deleted_at = datetime('now') WHERE id = ?")
        .bind(&deleted)
        .execute(store.pool())
        .await
        .unwrap();

    let messages = store.recent_messages(&conv, 10).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].1, "keep");
}

#[tokio::test]
async fn test_usage_log_writes() {
    let store = test_store().await;
    let usage = UsageLogger::new(store.pool().clone());

    usage
        .log(&UsageEntry {
            user_id: None,
            operation_type: "auth".into(),
            tokens_used: None,
            success: false,
            error_message: Some("store unavailable".into()),
        })
        .await
        .unwrap();

    usage
        .log(&UsageEntry {
            user_id: Some("u1".into()),
            operation_type: "completion".into(),
            tokens_used: Some(120),
            success: true,
            error_message: None,
        })
        .await
        .unwrap();

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM usage_log")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 2);

    let (null_user,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM usage_log WHERE user_id IS NULL")
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(null_user, 1);
}
