use crate::models::{Profile, ProfileRow, UnknownRole};
use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::PgPool;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile lookup failed: {0}")]
    Backend(#[from] sqlx::Error),
    #[error("profile {id} carries unknown role {role:?}")]
    UnknownRole { id: Uuid, role: String },
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
}

/// ProfileStore
///
/// Read-only access to the backend-owned profile records. Implementations are
/// shared behind `Arc<dyn ProfileStore>` across request tasks.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Looks up the profile keyed by the principal id. `Ok(None)` means the
    /// record does not exist; `Err` means the lookup itself failed.
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, ProfileError>;
}

pub type ProfileState = Arc<dyn ProfileStore>;

/// PostgresProfileStore
///
/// Reads `public.profiles`.
pub struct PostgresProfileStore {
    pool: PgPool,
}

impl PostgresProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PostgresProfileStore {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, ProfileError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, display_name, role FROM profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Profile::try_from(row)
                .map_err(|UnknownRole(role)| ProfileError::UnknownRole { id, role })
        })
        .transpose()
    }
}

/// InMemoryProfileStore
///
/// Process-local profile table. Used when no database is configured in local
/// mode, and by tests.
#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<Uuid, Profile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let store = Self::new();
        for profile in profiles {
            store.insert(profile);
        }
        store
    }

    pub fn insert(&self, profile: Profile) {
        self.profiles.write().insert(profile.id, profile);
    }

    pub fn remove(&self, id: Uuid) -> Option<Profile> {
        self.profiles.write().remove(&id)
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, ProfileError> {
        Ok(self.profiles.read().get(&id).cloned())
    }
}
