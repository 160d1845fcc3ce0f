//! Recipient store and import tests.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use outreach::{
    import_recipients, Category, MemoryRecipientStore, NewRecipient, Recipient, RecipientError,
    RecipientStore, RecipientUpdate, Status, StoreError,
};

fn rows(json: serde_json::Value) -> Vec<NewRecipient> {
    serde_json::from_value(json).unwrap()
}

#[tokio::test]
async fn import_skips_bad_rows_and_keeps_going() {
    let store = MemoryRecipientStore::new();
    let report = import_recipients(
        &store,
        rows(serde_json::json!([
            {"email": "ada@example.org", "name": "Ada", "category": "donor",
             "metadata": {"company": "Analytical Engines", "totalGiven": 250.0}},
            {"email": "not-an-email", "name": "Broken", "category": "subscriber"},
            {"email": "bob@example.org", "category": "volunteer", "tags": ["saturday"]},
            {"email": "ada@example.org", "name": "Ada again", "category": "donor"}
        ])),
    )
    .await;

    assert_eq!(report.created.len(), 2);
    assert_eq!(report.rejected.len(), 2);
    assert_eq!(report.rejected[0].0, 1);
    assert!(matches!(report.rejected[0].1, RecipientError::InvalidEmail(_)));
    assert_eq!(report.rejected[1].0, 3);
    assert!(matches!(
        report.rejected[1].1,
        RecipientError::Store(StoreError::Conflict(_))
    ));

    let listed = store.list().await.unwrap();
    let emails: Vec<_> = listed.iter().map(|r| r.email.as_str()).collect();
    assert_eq!(emails, vec!["ada@example.org", "bob@example.org"]);
    assert_eq!(listed[0].metadata.total_given, Some(250.0));
    assert!(listed[1].tags.contains("saturday"));
}

#[tokio::test]
async fn find_by_email_is_exact() {
    let store = MemoryRecipientStore::new();
    store
        .insert(Recipient::new("ada@example.org", "Ada", Category::Donor).unwrap())
        .await
        .unwrap();

    assert!(store.find_by_email("ada@example.org").await.unwrap().is_some());
    assert!(store.find_by_email("ADA@example.org").await.unwrap().is_none());
    assert!(store.find_by_email("ada@example").await.unwrap().is_none());
}

#[tokio::test]
async fn soft_delete_keeps_the_record() {
    let store = MemoryRecipientStore::new();
    let ada = Recipient::new("ada@example.org", "Ada", Category::Donor).unwrap();
    store.insert(ada.clone()).await.unwrap();

    store.soft_delete(&ada.id).await.unwrap();

    let stored = store.get(&ada.id).await.unwrap().unwrap();
    assert_eq!(stored.status, Status::Unsubscribed);
    assert!(!stored.is_active());
    assert_eq!(store.count(), 1);
}

#[tokio::test]
async fn hard_delete_frees_the_email() {
    let store = MemoryRecipientStore::new();
    let ada = Recipient::new("ada@example.org", "Ada", Category::Donor).unwrap();
    store.insert(ada.clone()).await.unwrap();

    assert!(store.delete(&ada.id).await.unwrap());
    assert!(!store.delete(&ada.id).await.unwrap());
    assert!(store.find_by_email("ada@example.org").await.unwrap().is_none());

    let again = Recipient::new("ada@example.org", "Ada", Category::Donor).unwrap();
    store.insert(again).await.unwrap();
    assert_eq!(store.count(), 1);
}

#[tokio::test]
async fn apply_is_all_or_nothing() {
    let store = MemoryRecipientStore::new();
    let ada = Recipient::new("ada@example.org", "Ada", Category::Donor).unwrap();
    store.insert(ada.clone()).await.unwrap();
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

    let err = store
        .apply(&[
            RecipientUpdate::RecordOpen {
                id: ada.id.clone(),
                at,
            },
            RecipientUpdate::SetStatus {
                id: "missing".into(),
                status: Status::Unsubscribed,
            },
        ])
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::NotFound("missing".into()));

    let stored = store.get(&ada.id).await.unwrap().unwrap();
    assert_eq!(stored.open_count, 0);
    assert_eq!(stored.last_opened, None);
}

#[tokio::test]
async fn apply_several_updates_to_one_recipient() {
    let store = MemoryRecipientStore::new();
    let ada = Recipient::new("ada@example.org", "Ada", Category::Donor).unwrap();
    store.insert(ada.clone()).await.unwrap();
    let first = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let second = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();

    store
        .apply(&[
            RecipientUpdate::RecordOpen {
                id: ada.id.clone(),
                at: second,
            },
            RecipientUpdate::RecordOpen {
                id: ada.id.clone(),
                at: first,
            },
            RecipientUpdate::SetStatus {
                id: ada.id.clone(),
                status: Status::Unsubscribed,
            },
        ])
        .await
        .unwrap();

    let stored = store.get(&ada.id).await.unwrap().unwrap();
    assert_eq!(stored.open_count, 2);
    assert_eq!(stored.last_opened, Some(second));
    assert_eq!(stored.status, Status::Unsubscribed);
}

#[tokio::test]
async fn write_failure_switch() {
    let store = MemoryRecipientStore::shared();
    let ada = Recipient::new("ada@example.org", "Ada", Category::Donor).unwrap();
    store.insert(ada.clone()).await.unwrap();

    store.set_write_failure(true);
    assert!(matches!(
        store.soft_delete(&ada.id).await,
        Err(StoreError::Unavailable(_))
    ));

    store.set_write_failure(false);
    store.soft_delete(&ada.id).await.unwrap();
}

#[tokio::test]
async fn works_as_trait_object() {
    let store: Arc<dyn RecipientStore> = MemoryRecipientStore::shared();
    let report = import_recipients(
        store.as_ref(),
        rows(serde_json::json!([
            {"email": "carol@example.org", "name": "Carol", "category": "event_attendee"}
        ])),
    )
    .await;

    assert_eq!(report.created.len(), 1);
    let carol = store.find_by_email("carol@example.org").await.unwrap().unwrap();
    assert_eq!(carol.category, Category::EventAttendee);
}
