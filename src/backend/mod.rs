//! Hosted auth/database collaborator.
//!
//! The signup core only talks to the backend through [`SignupBackend`]. Two
//! implementations ship with the crate: an in-memory one for tests and local
//! runs, and a REST adapter for the hosted service.

pub mod memory;
pub mod rest;

pub use memory::{BackendCall, InMemoryBackend};
pub use rest::{RestBackend, RestBackendConfig};

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BackendError;
use crate::signup::draft::Gender;

/// Profile column checked for uniqueness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupField {
    Username,
    Email,
}

impl LookupField {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email",
        }
    }
}

impl std::fmt::Display for LookupField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.column())
    }
}

/// The part of a profile row a lookup returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStub {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Metadata bundle attached to the new auth user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMetadata {
    pub username: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    pub persona: String,
    pub organization: String,
    pub domain: String,
    /// Effective specialization, stored under the legacy `branch` key.
    pub branch: String,
}

/// Outcome of account creation. The hosted service may answer without a
/// user object (e.g. pending confirmation quirks), hence the `Option`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountCreated {
    pub user_id: Option<Uuid>,
}

/// Columns written to the profile row after the account exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub username: String,
    pub hobbies: String,
    pub persona: String,
    pub organization: String,
    pub domain: String,
    pub specialization: String,
    pub branch: String,
    pub college: String,
}

/// Tag tables populated from the comma-lists of the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    Interest,
    Skill,
}

impl TagKind {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Interest => "interests",
            Self::Skill => "skills",
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Self::Interest => "interest_name",
            Self::Skill => "skill_name",
        }
    }
}

impl std::fmt::Display for TagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interest => write!(f, "interest"),
            Self::Skill => write!(f, "skill"),
        }
    }
}

/// Operations the signup core consumes from the hosted backend.
#[async_trait]
pub trait SignupBackend: Send + Sync {
    /// Find a profile whose `field` column equals `value`.
    async fn lookup_profile_by_field(
        &self,
        field: LookupField,
        value: &str,
    ) -> Result<Option<ProfileStub>, BackendError>;

    /// Create the auth user.
    async fn create_account(
        &self,
        email: &str,
        password: &SecretString,
        metadata: &AccountMetadata,
    ) -> Result<AccountCreated, BackendError>;

    /// Write profile columns for an existing user.
    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate)
    -> Result<(), BackendError>;

    /// Insert one tag row tied to the user.
    async fn insert_tag(&self, kind: TagKind, user_id: Uuid, name: &str)
    -> Result<(), BackendError>;

    /// Forget any per-user state kept since `create_account`. Called once
    /// the writes for that user are done, whether they succeeded or not.
    async fn release_user(&self, _user_id: Uuid) {}
}
