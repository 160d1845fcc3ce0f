//! Recipient store trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{RecipientError, StoreError};
use crate::recipient::{NewRecipient, Recipient, Status};

/// A single mutation of a stored recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientUpdate {
    /// Increment the open counter and advance the last-opened time.
    RecordOpen { id: String, at: DateTime<Utc> },
    SetStatus { id: String, status: Status },
}

impl RecipientUpdate {
    pub fn id(&self) -> &str {
        match self {
            Self::RecordOpen { id, .. } | Self::SetStatus { id, .. } => id,
        }
    }

    fn apply_to(&self, recipient: &mut Recipient) {
        match self {
            Self::RecordOpen { at, .. } => recipient.record_open(*at),
            Self::SetStatus { status, .. } => recipient.set_status(*status),
        }
    }
}

/// Trait for recipient storage backends.
#[async_trait]
pub trait RecipientStore: Send + Sync {
    /// Store a new recipient. Fails with `Conflict` when the email is taken.
    async fn insert(&self, recipient: Recipient) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Recipient>, StoreError>;

    /// Exact, case-sensitive match on the stored email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Recipient>, StoreError>;

    /// All recipients in insertion order.
    async fn list(&self) -> Result<Vec<Recipient>, StoreError>;

    /// Apply every update or none of them.
    ///
    /// Readers never observe a partially applied batch.
    async fn apply(&self, updates: &[RecipientUpdate]) -> Result<(), StoreError>;

    /// Remove a recipient permanently. Returns whether it existed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// The UI's "delete": mark the recipient unsubscribed, keep the record.
    async fn soft_delete(&self, id: &str) -> Result<(), StoreError> {
        self.apply(&[RecipientUpdate::SetStatus {
            id: id.to_string(),
            status: Status::Unsubscribed,
        }])
        .await
    }
}

#[async_trait]
impl<S: RecipientStore + ?Sized> RecipientStore for Arc<S> {
    async fn insert(&self, recipient: Recipient) -> Result<(), StoreError> {
        (**self).insert(recipient).await
    }

    async fn get(&self, id: &str) -> Result<Option<Recipient>, StoreError> {
        (**self).get(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Recipient>, StoreError> {
        (**self).find_by_email(email).await
    }

    async fn list(&self) -> Result<Vec<Recipient>, StoreError> {
        (**self).list().await
    }

    async fn apply(&self, updates: &[RecipientUpdate]) -> Result<(), StoreError> {
        (**self).apply(updates).await
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        (**self).delete(id).await
    }

    async fn soft_delete(&self, id: &str) -> Result<(), StoreError> {
        (**self).soft_delete(id).await
    }
}

#[derive(Debug, Default)]
struct Records {
    by_id: HashMap<String, Recipient>,
    by_email: HashMap<String, String>,
    /// Order of recipient IDs for maintaining insertion order.
    order: Vec<String>,
}

/// Thread-safe in-memory recipient store.
#[derive(Debug, Default)]
pub struct MemoryRecipientStore {
    records: RwLock<Records>,
    /// When set, `apply` fails without writing (for testing error paths).
    fail_writes: AtomicBool,
}

impl MemoryRecipientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create storage wrapped in an Arc for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Make every subsequent `apply` fail with `Unavailable`.
    pub fn set_write_failure(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.records.read().by_id.len()
    }
}

#[async_trait]
impl RecipientStore for MemoryRecipientStore {
    async fn insert(&self, recipient: Recipient) -> Result<(), StoreError> {
        let mut records = self.records.write();
        if records.by_email.contains_key(&recipient.email) {
            return Err(StoreError::Conflict(recipient.email));
        }
        if records.by_id.contains_key(&recipient.id) {
            return Err(StoreError::Conflict(recipient.id));
        }

        records.by_email.insert(recipient.email.clone(), recipient.id.clone());
        records.order.push(recipient.id.clone());
        records.by_id.insert(recipient.id.clone(), recipient);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Recipient>, StoreError> {
        Ok(self.records.read().by_id.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Recipient>, StoreError> {
        let records = self.records.read();
        Ok(records
            .by_email
            .get(email)
            .and_then(|id| records.by_id.get(id))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Recipient>, StoreError> {
        let records = self.records.read();
        Ok(records
            .order
            .iter()
            .filter_map(|id| records.by_id.get(id).cloned())
            .collect())
    }

    async fn apply(&self, updates: &[RecipientUpdate]) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }

        let mut records = self.records.write();

        // Stage changes on copies so a missing id leaves everything untouched.
        let mut staged: HashMap<&str, Recipient> = HashMap::new();
        for update in updates {
            let id = update.id();
            if !staged.contains_key(id) {
                let current = records
                    .by_id
                    .get(id)
                    .cloned()
                    .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
                staged.insert(id, current);
            }
            if let Some(recipient) = staged.get_mut(id) {
                update.apply_to(recipient);
            }
        }

        for (id, recipient) in staged {
            records.by_id.insert(id.to_string(), recipient);
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut records = self.records.write();
        match records.by_id.remove(id) {
            Some(removed) => {
                records.by_email.remove(&removed.email);
                records.order.retain(|x| x != id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Outcome of a contact import.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub created: Vec<Recipient>,
    /// Rejected rows by zero-based row index.
    pub rejected: Vec<(usize, RecipientError)>,
}

/// Import contacts row by row. A bad row is reported and skipped; the rest
/// of the import continues.
pub async fn import_recipients<S: RecipientStore + ?Sized>(
    store: &S,
    rows: Vec<NewRecipient>,
) -> ImportReport {
    let mut report = ImportReport::default();

    for (index, row) in rows.into_iter().enumerate() {
        let result = match row.into_recipient() {
            Ok(recipient) => store
                .insert(recipient.clone())
                .await
                .map(|_| recipient)
                .map_err(RecipientError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(recipient) => report.created.push(recipient),
            Err(e) => {
                tracing::warn!(row = index, error = %e, "Skipping import row");
                report.rejected.push((index, e));
            }
        }
    }

    tracing::info!(
        created = report.created.len(),
        rejected = report.rejected.len(),
        "Recipient import finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipient::Category;

    fn recipient(email: &str) -> Recipient {
        Recipient::new(email, "Test", Category::Subscriber).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = MemoryRecipientStore::new();
        let r = recipient("ada@example.org");
        store.insert(r.clone()).await.unwrap();

        assert_eq!(store.count(), 1);
        assert_eq!(store.get(&r.id).await.unwrap(), Some(r.clone()));
        assert_eq!(store.find_by_email("ada@example.org").await.unwrap(), Some(r));
        assert_eq!(store.find_by_email("ADA@example.org").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryRecipientStore::new();
        store.insert(recipient("ada@example.org")).await.unwrap();

        let err = store.insert(recipient("ada@example.org")).await.unwrap_err();
        assert_eq!(err, StoreError::Conflict("ada@example.org".into()));
    }

    #[tokio::test]
    async fn test_apply_is_all_or_nothing() {
        let store = MemoryRecipientStore::new();
        let r = recipient("ada@example.org");
        store.insert(r.clone()).await.unwrap();

        let err = store
            .apply(&[
                RecipientUpdate::RecordOpen { id: r.id.clone(), at: Utc::now() },
                RecipientUpdate::SetStatus { id: "missing".into(), status: Status::Unsubscribed },
            ])
            .await
            .unwrap_err();

        assert_eq!(err, StoreError::NotFound("missing".into()));
        assert_eq!(store.get(&r.id).await.unwrap().unwrap().open_count, 0);
    }

    #[tokio::test]
    async fn test_write_failure() {
        let store = MemoryRecipientStore::new();
        let r = recipient("ada@example.org");
        store.insert(r.clone()).await.unwrap();
        store.set_write_failure(true);

        assert!(store.soft_delete(&r.id).await.is_err());
        assert!(store.get(&r.id).await.unwrap().unwrap().is_active());
    }

    #[tokio::test]
    async fn test_soft_and_hard_delete() {
        let store = MemoryRecipientStore::new();
        let r = recipient("ada@example.org");
        store.insert(r.clone()).await.unwrap();

        store.soft_delete(&r.id).await.unwrap();
        let stored = store.get(&r.id).await.unwrap().unwrap();
        assert_eq!(stored.status, Status::Unsubscribed);

        assert!(store.delete(&r.id).await.unwrap());
        assert!(!store.delete(&r.id).await.unwrap());
        assert!(store.find_by_email("ada@example.org").await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_skips_bad_rows() {
        let store = MemoryRecipientStore::new();
        let row = |email: &str| NewRecipient {
            email: email.to_string(),
            name: "Row".into(),
            category: Category::Volunteer,
            metadata: Default::default(),
            tags: Default::default(),
        };

        let report = import_recipients(
            &store,
            vec![row("a@example.org"), row("broken"), row("a@example.org"), row("b@example.org")],
        )
        .await;

        assert_eq!(report.created.len(), 2);
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[0].0, 1);
        assert!(matches!(report.rejected[0].1, RecipientError::InvalidEmail(_)));
        assert!(matches!(report.rejected[1].1, RecipientError::Store(StoreError::Conflict(_))));

        let emails: Vec<_> = store.list().await.unwrap().into_iter().map(|r| r.email).collect();
        assert_eq!(emails, vec!["a@example.org", "b@example.org"]);
    }
}
