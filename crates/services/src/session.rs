//! The signed-in viewer and their bearer token.

use std::sync::{Arc, PoisonError, RwLock};

use lms_core::model::{Identity, Viewer};
use storage::repository::{InMemorySessionStore, SessionStore, TOKEN_KEY, USER_KEY};

use crate::error::SessionError;
use crate::events::{EventHub, Subscription};

#[derive(Debug, Clone, Default)]
struct Snapshot {
    token: Option<String>,
    viewer: Viewer,
}

/// Current session, persisted through a [`SessionStore`].
///
/// Clones share state; listeners registered with [`SessionContext::subscribe`]
/// see every sign-in and sign-out.
#[derive(Clone)]
pub struct SessionContext {
    store: Arc<dyn SessionStore>,
    snapshot: Arc<RwLock<Snapshot>>,
    changes: EventHub<Viewer>,
}

impl SessionContext {
    /// Restore the session saved in `store`.
    ///
    /// A stored user that no longer parses is discarded with a warning; the
    /// viewer is then anonymous.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the store cannot be read.
    pub async fn load(store: Arc<dyn SessionStore>) -> Result<Self, SessionError> {
        let token = store.get(TOKEN_KEY).await?;
        let user = store.get(USER_KEY).await?;

        let viewer = match (&token, user) {
            (Some(_), Some(raw)) => match serde_json::from_str::<Identity>(&raw) {
                Ok(identity) => Viewer::Signed(identity),
                Err(error) => {
                    tracing::warn!(%error, "discarding unreadable stored user");
                    Viewer::Anonymous
                }
            },
            _ => Viewer::Anonymous,
        };

        Ok(Self {
            store,
            snapshot: Arc::new(RwLock::new(Snapshot { token, viewer })),
            changes: EventHub::new(),
        })
    }

    /// Anonymous session kept only in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemorySessionStore::new()),
            snapshot: Arc::new(RwLock::new(Snapshot::default())),
            changes: EventHub::new(),
        }
    }

    /// Persist and publish a new signed-in identity.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the identity cannot be stored.
    pub async fn sign_in(
        &self,
        token: impl Into<String>,
        identity: Identity,
    ) -> Result<(), SessionError> {
        let token = token.into();
        let user = serde_json::to_string(&identity)?;
        self.store.set(TOKEN_KEY, &token).await?;
        self.store.set(USER_KEY, &user).await?;
        tracing::info!(user_id = %identity.id, role = %identity.role, "signed in");
        self.replace(Snapshot {
            token: Some(token),
            viewer: Viewer::Signed(identity),
        });
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the stored session cannot be removed.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        self.store.remove(TOKEN_KEY).await?;
        self.store.remove(USER_KEY).await?;
        self.replace(Snapshot::default());
        Ok(())
    }

    #[must_use]
    pub fn viewer(&self) -> Viewer {
        self.read().viewer.clone()
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read().token.is_some()
    }

    /// Be told about every viewer change until the handle is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, listener: impl Fn(&Viewer) + Send + Sync + 'static) -> Subscription {
        self.changes.subscribe(listener)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Snapshot> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace(&self, next: Snapshot) {
        let viewer = next.viewer.clone();
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = next;
        self.changes.publish(&viewer);
    }
}
