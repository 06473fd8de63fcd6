//! In-memory backend with failure injection and a call log.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{
    AccountCreated, AccountMetadata, LookupField, ProfileStub, ProfileUpdate, SignupBackend,
    TagKind,
};
use crate::error::BackendError;

/// A single call observed by the backend, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Lookup { field: LookupField, value: String },
    CreateAccount { email: String },
    UpdateProfile { user_id: Uuid },
    InsertTag { kind: TagKind, name: String },
    ReleaseUser { user_id: Uuid },
}

#[derive(Debug, Clone)]
struct StoredProfile {
    id: Uuid,
    username: Option<String>,
    email: String,
    update: Option<ProfileUpdate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTag {
    pub kind: TagKind,
    pub user_id: Uuid,
    pub name: String,
}

#[derive(Debug, Default)]
struct Failures {
    lookups: bool,
    account_creation: Option<String>,
    omit_user_id: bool,
    profile_update: bool,
    tags: HashSet<(TagKind, String)>,
}

#[derive(Debug, Default)]
struct MemoryState {
    profiles: Vec<StoredProfile>,
    tags: Vec<StoredTag>,
    calls: Vec<BackendCall>,
    failures: Failures,
}

/// Backend that keeps profiles and tags in process memory.
///
/// Emails are unique, mirroring the hosted auth service.
#[derive(Debug)]
pub struct InMemoryBackend {
    state: RwLock<MemoryState>,
    record_calls: bool,
}

impl InMemoryBackend {
    /// Backend with a call log, for tests.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(MemoryState::default()),
            record_calls: true,
        })
    }

    /// Backend for long-running demo servers. Nothing is logged per call.
    pub fn without_call_log() -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(MemoryState::default()),
            record_calls: false,
        })
    }

    fn record(&self, state: &mut MemoryState, call: BackendCall) {
        if self.record_calls {
            state.calls.push(call);
        }
    }

    /// Seed an existing profile (taken username/email).
    pub async fn insert_profile(&self, username: &str, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state.write().await.profiles.push(StoredProfile {
            id,
            username: Some(username.to_string()),
            email: email.to_string(),
            update: None,
        });
        id
    }

    pub async fn fail_lookups(&self, fail: bool) {
        self.state.write().await.failures.lookups = fail;
    }

    /// Make account creation fail with the given backend message.
    pub async fn fail_account_creation(&self, message: impl Into<String>) {
        self.state.write().await.failures.account_creation = Some(message.into());
    }

    /// Make account creation succeed without returning a user.
    pub async fn omit_user_id(&self, omit: bool) {
        self.state.write().await.failures.omit_user_id = omit;
    }

    pub async fn fail_profile_update(&self, fail: bool) {
        self.state.write().await.failures.profile_update = fail;
    }

    /// Make inserts of one tag name fail.
    pub async fn fail_tag(&self, kind: TagKind, name: &str) {
        self.state
            .write()
            .await
            .failures
            .tags
            .insert((kind, name.to_string()));
    }

    pub async fn calls(&self) -> Vec<BackendCall> {
        self.state.read().await.calls.clone()
    }

    pub async fn tags_for(&self, user_id: Uuid) -> Vec<StoredTag> {
        self.state
            .read()
            .await
            .tags
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn profile_update_for(&self, user_id: Uuid) -> Option<ProfileUpdate> {
        self.state
            .read()
            .await
            .profiles
            .iter()
            .find(|p| p.id == user_id)
            .and_then(|p| p.update.clone())
    }
}

#[async_trait]
impl SignupBackend for InMemoryBackend {
    async fn lookup_profile_by_field(
        &self,
        field: LookupField,
        value: &str,
    ) -> Result<Option<ProfileStub>, BackendError> {
        let mut state = self.state.write().await;
        self.record(
            &mut state,
            BackendCall::Lookup {
                field,
                value: value.to_string(),
            },
        );
        if state.failures.lookups {
            return Err(BackendError::Request("lookup unavailable".into()));
        }

        let found = state.profiles.iter().find(|p| match field {
            LookupField::Username => p.username.as_deref() == Some(value),
            LookupField::Email => p.email == value,
        });
        Ok(found.map(|p| ProfileStub {
            id: Some(p.id),
            username: p.username.clone(),
            email: Some(p.email.clone()),
        }))
    }

    async fn create_account(
        &self,
        email: &str,
        _password: &SecretString,
        metadata: &AccountMetadata,
    ) -> Result<AccountCreated, BackendError> {
        let mut state = self.state.write().await;
        self.record(
            &mut state,
            BackendCall::CreateAccount {
                email: email.to_string(),
            },
        );
        if let Some(message) = state.failures.account_creation.clone() {
            return Err(BackendError::Rejected(message));
        }
        if state.profiles.iter().any(|p| p.email == email) {
            return Err(BackendError::Rejected("User already registered".into()));
        }
        if state.failures.omit_user_id {
            return Ok(AccountCreated { user_id: None });
        }

        let id = Uuid::new_v4();
        state.profiles.push(StoredProfile {
            id,
            username: Some(metadata.username.clone()),
            email: email.to_string(),
            update: None,
        });
        debug!(user_id = %id, "In-memory account created");
        Ok(AccountCreated { user_id: Some(id) })
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        self.record(&mut state, BackendCall::UpdateProfile { user_id });
        if state.failures.profile_update {
            return Err(BackendError::Rejected("profile update rejected".into()));
        }
        let profile = state
            .profiles
            .iter_mut()
            .find(|p| p.id == user_id)
            .ok_or_else(|| BackendError::Rejected(format!("no profile for user {user_id}")))?;
        profile.username = Some(update.username.clone());
        profile.update = Some(update.clone());
        Ok(())
    }

    async fn insert_tag(
        &self,
        kind: TagKind,
        user_id: Uuid,
        name: &str,
    ) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        self.record(
            &mut state,
            BackendCall::InsertTag {
                kind,
                name: name.to_string(),
            },
        );
        if state.failures.tags.contains(&(kind, name.to_string())) {
            return Err(BackendError::Rejected(format!("{kind} insert rejected: {name}")));
        }
        state.tags.push(StoredTag {
            kind,
            user_id,
            name: name.to_string(),
        });
        Ok(())
    }

    async fn release_user(&self, user_id: Uuid) {
        let mut state = self.state.write().await;
        self.record(&mut state, BackendCall::ReleaseUser { user_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(username: &str) -> AccountMetadata {
        AccountMetadata {
            username: username.to_string(),
            full_name: username.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn seeded_profile_is_found_by_either_field() {
        let backend = InMemoryBackend::new();
        backend.insert_profile("taken", "taken@uni.edu").await;

        let by_name = backend
            .lookup_profile_by_field(LookupField::Username, "taken")
            .await
            .unwrap();
        assert!(by_name.is_some());

        let by_email = backend
            .lookup_profile_by_field(LookupField::Email, "taken@uni.edu")
            .await
            .unwrap();
        assert!(by_email.is_some());

        let missing = backend
            .lookup_profile_by_field(LookupField::Username, "free")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let backend = InMemoryBackend::new();
        let pw = SecretString::from("longenough".to_string());
        backend
            .create_account("a@b.com", &pw, &metadata("alice"))
            .await
            .unwrap();

        let err = backend
            .create_account("a@b.com", &pw, &metadata("other"))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "User already registered");
    }

    #[tokio::test]
    async fn created_account_becomes_visible_to_lookups() {
        let backend = InMemoryBackend::new();
        let pw = SecretString::from("longenough".to_string());
        let created = backend
            .create_account("new@b.com", &pw, &metadata("newbie"))
            .await
            .unwrap();
        assert!(created.user_id.is_some());

        let found = backend
            .lookup_profile_by_field(LookupField::Username, "newbie")
            .await
            .unwrap();
        assert_eq!(found.and_then(|p| p.id), created.user_id);
    }

    #[tokio::test]
    async fn injected_tag_failure_only_hits_that_name() {
        let backend = InMemoryBackend::new();
        let user = Uuid::new_v4();
        backend.fail_tag(TagKind::Skill, "chess").await;

        assert!(backend.insert_tag(TagKind::Skill, user, "chess").await.is_err());
        assert!(backend.insert_tag(TagKind::Skill, user, "reading").await.is_ok());
        assert!(backend.insert_tag(TagKind::Interest, user, "chess").await.is_ok());

        assert_eq!(backend.tags_for(user).await.len(), 2);
        assert_eq!(backend.calls().await.len(), 3);
    }

    #[tokio::test]
    async fn demo_backend_keeps_no_call_log() {
        let backend = InMemoryBackend::without_call_log();
        backend.insert_profile("taken", "taken@uni.edu").await;

        for _ in 0..100 {
            let found = backend
                .lookup_profile_by_field(LookupField::Username, "taken")
                .await
                .unwrap();
            assert!(found.is_some());
        }
        let pw = SecretString::from("longenough".to_string());
        let created = backend
            .create_account("new@b.com", &pw, &metadata("newbie"))
            .await
            .unwrap();
        backend
            .insert_tag(TagKind::Skill, created.user_id.unwrap(), "chess")
            .await
            .unwrap();

        assert!(backend.calls().await.is_empty());
        assert_eq!(backend.tags_for(created.user_id.unwrap()).await.len(), 1);
    }
}
