//! Journal session: draft capture and synchronization with the entry store.
//!
//! Mutating actions come in two halves. `begin_*` validates the action,
//! marks its slot as busy and hands back an owned future for the store call;
//! `finish_*` applies the store's answer. Between the two the caller's run loop
//! is free to keep ticking the timer. `save_draft` and `delete_entry` chain
//! both halves for callers that have nothing else to do.

use crate::navigator::SessionNavigator;
use crate::store::{EntryStore, StoreError, StoreResult};
use crate::{Catalog, DemoUser, JournalEntry, NewEntry};
use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Lifecycle of the session's connection to the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// Not initialized yet
    Loading,
    Ready,
    /// Initialization failed; only `retry` leaves this state
    Failed(String),
}

/// Outstanding store call for a draft save
pub type SaveFuture = BoxFuture<'static, StoreResult<JournalEntry>>;

/// Outstanding store call for a delete, tagged with the entry id
pub type DeleteFuture = BoxFuture<'static, (Uuid, StoreResult<()>)>;

pub struct JournalSession<S: EntryStore + 'static> {
    store: Arc<S>,
    navigator: SessionNavigator,
    status: SessionStatus,
    user: Option<DemoUser>,
    entries: Vec<JournalEntry>,
    error: Option<String>,
    /// Content submitted by the outstanding save, if any
    saving: Option<String>,
    deleting: HashSet<Uuid>,
}

impl<S: EntryStore + 'static> JournalSession<S> {
    pub fn new(catalog: Arc<Catalog>, store: Arc<S>) -> Self {
        Self {
            store,
            navigator: SessionNavigator::new(catalog),
            status: SessionStatus::Loading,
            user: None,
            entries: Vec::new(),
            error: None,
            saving: None,
            deleting: HashSet::new(),
        }
    }

    pub fn navigator(&self) -> &SessionNavigator {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut SessionNavigator {
        &mut self.navigator
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn user(&self) -> Option<&DemoUser> {
        self.user.as_ref()
    }

    /// Persisted entries, newest first
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Latest user-facing error message
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// True while a save is outstanding (the save control is disabled)
    pub fn is_saving(&self) -> bool {
        self.saving.is_some()
    }

    pub fn is_deleting(&self, entry_id: Uuid) -> bool {
        self.deleting.contains(&entry_id)
    }

    fn is_ready(&self) -> bool {
        self.status == SessionStatus::Ready
    }

    /// Establish the demo identity and load its entries.
    ///
    /// Any failure moves the session to [`SessionStatus::Failed`].
    pub async fn initialize(&mut self) -> &SessionStatus {
        self.status = SessionStatus::Loading;

        let loaded = async {
            let user = self.store.ensure_demo_user().await?;
            let entries = self.store.list_entries(user.user_id).await?;
            Ok::<_, StoreError>((user, entries))
        }
        .await;

        match loaded {
            Ok((user, entries)) => {
                tracing::info!(
                    "Journal session ready for {} with {} entries",
                    user.email,
                    entries.len()
                );
                self.user = Some(user);
                self.entries = entries;
                self.status = SessionStatus::Ready;
            }
            Err(e) => {
                tracing::warn!("Journal session failed to initialize: {}", e);
                let message = e.to_string();
                self.error = Some(message.clone());
                self.status = SessionStatus::Failed(message);
            }
        }
        &self.status
    }

    /// Reload the whole session from the store.
    ///
    /// Exercise position, timer, and draft are kept; identity, entries and
    /// the error slot are rebuilt.
    pub async fn retry(&mut self) -> &SessionStatus {
        self.user = None;
        self.entries.clear();
        self.error = None;
        self.saving = None;
        self.deleting.clear();
        self.initialize().await
    }

    /// Start saving the current draft.
    ///
    /// Returns `None` without touching the store when the draft is blank, no
    /// identity is established, the session is not ready, or a save is
    /// already outstanding.
    pub fn begin_save(&mut self) -> Option<SaveFuture> {
        if !self.is_ready() || self.saving.is_some() {
            return None;
        }
        let user_id = self.user.as_ref()?.user_id;
        let content = self.navigator.draft();
        if content.trim().is_empty() {
            return None;
        }

        let request = NewEntry {
            date: Utc::now(),
            exercise: self.navigator.active_exercise().title.clone(),
            content: content.to_string(),
            user_id,
        };
        self.saving = Some(request.content.clone());
        tracing::debug!("Submitting journal entry for '{}'", request.exercise);

        let store = Arc::clone(&self.store);
        Some(async move { store.create_entry(request).await }.boxed())
    }

    /// Apply the store's answer to the outstanding save
    pub fn finish_save(&mut self, result: StoreResult<JournalEntry>) -> Option<&JournalEntry> {
        let submitted = self.saving.take();
        match result {
            Ok(entry) => {
                // Text typed while the request was outstanding survives
                if submitted.as_deref() == Some(self.navigator.draft()) {
                    self.navigator.clear_draft();
                }
                self.error = None;
                self.entries.insert(0, entry);
                self.entries.first()
            }
            Err(e) => {
                tracing::warn!("Failed to save journal entry: {}", e);
                self.error = Some(e.to_string());
                None
            }
        }
    }

    /// Save the current draft and wait for the store
    pub async fn save_draft(&mut self) -> Option<&JournalEntry> {
        let pending = self.begin_save()?;
        let result = pending.await;
        self.finish_save(result)
    }

    /// Start deleting an entry.
    ///
    /// Returns `None` when no identity is established, the session is not
    /// ready, or the same entry is already being deleted.
    pub fn begin_delete(&mut self, entry_id: Uuid) -> Option<DeleteFuture> {
        if !self.is_ready() {
            return None;
        }
        let user_id = self.user.as_ref()?.user_id;
        if !self.deleting.insert(entry_id) {
            return None;
        }

        let store = Arc::clone(&self.store);
        Some(async move { (entry_id, store.delete_entry(entry_id, user_id).await) }.boxed())
    }

    /// Apply the store's answer to a delete. Returns true when the list changed.
    pub fn finish_delete(&mut self, entry_id: Uuid, result: StoreResult<()>) -> bool {
        self.deleting.remove(&entry_id);
        match result {
            Ok(()) => {
                self.error = None;
                let before = self.entries.len();
                self.entries.retain(|e| e.id != entry_id);
                before != self.entries.len()
            }
            Err(e) => {
                tracing::warn!("Failed to delete entry {}: {}", entry_id, e);
                self.error = Some(e.to_string());
                false
            }
        }
    }

    /// Delete an entry and wait for the store
    pub async fn delete_entry(&mut self, entry_id: Uuid) -> bool {
        match self.begin_delete(entry_id) {
            Some(pending) => {
                let (id, result) = pending.await;
                self.finish_delete(id, result)
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_default_catalog;
    use crate::config::DemoUserConfig;
    use crate::sqlite_store::SqliteEntryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Wraps the SQLite store to count calls and inject failures
    struct FlakyStore {
        inner: SqliteEntryStore,
        create_calls: AtomicUsize,
        fail_setup: AtomicBool,
        fail_create: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: SqliteEntryStore::open_in_memory(DemoUserConfig::default()).unwrap(),
                create_calls: AtomicUsize::new(0),
                fail_setup: AtomicBool::new(false),
                fail_create: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl EntryStore for FlakyStore {
        async fn ensure_demo_user(&self) -> StoreResult<DemoUser> {
            if self.fail_setup.load(Ordering::SeqCst) {
                return Err(StoreError::Internal("database offline".into()));
            }
            self.inner.ensure_demo_user().await
        }

        async fn create_entry(&self, entry: NewEntry) -> StoreResult<JournalEntry> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(StoreError::Internal("disk full".into()));
            }
            self.inner.create_entry(entry).await
        }

        async fn list_entries(&self, user_id: Uuid) -> StoreResult<Vec<JournalEntry>> {
            self.inner.list_entries(user_id).await
        }

        async fn delete_entry(&self, entry_id: Uuid, user_id: Uuid) -> StoreResult<()> {
            self.inner.delete_entry(entry_id, user_id).await
        }
    }

    async fn ready_session() -> (JournalSession<FlakyStore>, Arc<FlakyStore>) {
        let store = Arc::new(FlakyStore::new());
        let mut session = JournalSession::new(Arc::new(build_default_catalog()), store.clone());
        assert_eq!(session.initialize().await, &SessionStatus::Ready);
        (session, store)
    }

    #[tokio::test]
    async fn test_initialize_loads_identity_and_entries() {
        let store = Arc::new(FlakyStore::new());
        let user = store.ensure_demo_user().await.unwrap();
        store
            .create_entry(NewEntry {
                date: Utc::now(),
                exercise: "Object Visualization".into(),
                content: "Saw the apple rotate".into(),
                user_id: user.user_id,
            })
            .await
            .unwrap();

        let mut session = JournalSession::new(Arc::new(build_default_catalog()), store);
        session.initialize().await;

        assert_eq!(session.status(), &SessionStatus::Ready);
        assert_eq!(session.user().unwrap().user_id, user.user_id);
        assert_eq!(session.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_save_prepends_and_clears_draft() {
        let (mut session, _store) = ready_session().await;
        session.navigator_mut().set_draft("Felt calm and focused");

        let saved = session.save_draft().await.cloned().unwrap();

        assert_eq!(saved.content, "Felt calm and focused");
        assert_eq!(saved.exercise, "Mental Screen Exercise");
        assert_eq!(session.entries()[0].id, saved.id);
        assert!(session.navigator().draft().is_empty());
        assert!(!session.is_saving());
    }

    #[tokio::test]
    async fn test_blank_draft_makes_no_store_call() {
        let (mut session, store) = ready_session().await;
        session.navigator_mut().set_draft("   \n\t ");

        assert!(session.begin_save().is_none());
        assert!(session.save_draft().await.is_none());
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 0);
        assert!(session.entries().is_empty());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_draft() {
        let (mut session, store) = ready_session().await;
        store.fail_create.store(true, Ordering::SeqCst);
        session.navigator_mut().set_draft("Do not lose me");

        assert!(session.save_draft().await.is_none());

        assert_eq!(session.navigator().draft(), "Do not lose me");
        assert_eq!(session.error(), Some("Internal server error"));
        assert!(session.entries().is_empty());
        assert!(!session.is_saving());
    }

    #[tokio::test]
    async fn test_only_one_save_in_flight() {
        let (mut session, store) = ready_session().await;
        session.navigator_mut().set_draft("First");

        let pending = session.begin_save().unwrap();
        assert!(session.is_saving());
        assert!(session.begin_save().is_none());

        let result = pending.await;
        session.finish_save(result);
        assert!(!session.is_saving());
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_draft_edited_during_save_survives() {
        let (mut session, _store) = ready_session().await;
        session.navigator_mut().set_draft("First thought");

        let pending = session.begin_save().unwrap();
        session.navigator_mut().append_draft("second thought");
        let result = pending.await;
        session.finish_save(result);

        assert_eq!(session.entries()[0].content, "First thought");
        assert_eq!(
            session.navigator().draft(),
            "First thought\nsecond thought"
        );
    }

    #[tokio::test]
    async fn test_delete_removes_entry_once() {
        let (mut session, _store) = ready_session().await;
        session.navigator_mut().set_draft("Short-lived");
        let id = session.save_draft().await.unwrap().id;

        let pending = session.begin_delete(id).unwrap();
        // Same id again while outstanding is ignored
        assert!(session.begin_delete(id).is_none());
        assert!(session.is_deleting(id));

        let (deleted_id, result) = pending.await;
        assert!(session.finish_delete(deleted_id, result));
        assert!(session.entries().is_empty());

        // Removing an absent id locally is a silent no-op
        assert!(!session.finish_delete(id, Ok(())));
    }

    #[tokio::test]
    async fn test_delete_unknown_entry_keeps_list() {
        let (mut session, _store) = ready_session().await;
        session.navigator_mut().set_draft("Keep me");
        session.save_draft().await;

        assert!(!session.delete_entry(Uuid::new_v4()).await);

        assert_eq!(session.entries().len(), 1);
        assert_eq!(session.error(), Some("Entry not found or unauthorized"));
    }

    #[tokio::test]
    async fn test_failed_initialize_blocks_actions_until_retry() {
        let store = Arc::new(FlakyStore::new());
        store.fail_setup.store(true, Ordering::SeqCst);
        let mut session = JournalSession::new(Arc::new(build_default_catalog()), store.clone());

        let status = session.initialize().await.clone();
        assert!(matches!(status, SessionStatus::Failed(_)));
        assert_eq!(session.error(), Some("Internal server error"));

        session.navigator_mut().set_draft("Not yet");
        assert!(session.begin_save().is_none());
        assert!(session.begin_delete(Uuid::new_v4()).is_none());
        assert_eq!(store.create_calls.load(Ordering::SeqCst), 0);

        store.fail_setup.store(false, Ordering::SeqCst);
        assert_eq!(session.retry().await, &SessionStatus::Ready);
        assert!(session.error().is_none());
        assert!(session.save_draft().await.is_some());
    }

    #[tokio::test]
    async fn test_navigation_clears_draft_but_not_entries() {
        let (mut session, _store) = ready_session().await;
        session.navigator_mut().set_draft("Saved");
        session.save_draft().await;
        session.navigator_mut().set_draft("Abandoned");

        session.navigator_mut().next();

        assert!(session.navigator().draft().is_empty());
        assert_eq!(session.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_saved_entry_uses_active_exercise_title() {
        let (mut session, _store) = ready_session().await;
        session.navigator_mut().previous();
        session.navigator_mut().set_draft("Bright sky, still lake");

        let saved = session.save_draft().await.cloned().unwrap();
        assert_eq!(saved.exercise, "Scene Construction");
    }
}
