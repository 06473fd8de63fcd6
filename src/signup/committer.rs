//! Completion committer — turns a finished draft into backend writes.
//!
//! Account creation must succeed; everything after it (profile columns,
//! interest and skill tags) is best-effort. Failures there are logged and
//! recorded in the [`CommitReport`] but never fail the signup, since the
//! account already exists by then.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::draft::{DraftRecord, EffectiveValues};
use crate::backend::{AccountMetadata, ProfileUpdate, SignupBackend, TagKind};
use crate::error::{SignupError, ValidationError};
use crate::validation::validate_password_strength;

/// A tag row that could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTag {
    pub kind: TagKind,
    pub name: String,
    pub error: String,
}

/// Outcome of a successful signup.
#[derive(Debug, Clone, Serialize)]
pub struct CommitReport {
    pub user_id: Uuid,
    pub username: String,
    pub effective: EffectiveValues,
    /// Set when the profile update was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_error: Option<String>,
    pub tags_inserted: usize,
    pub failed_tags: Vec<FailedTag>,
    pub completed_at: DateTime<Utc>,
}

impl CommitReport {
    /// Whether every best-effort write landed too.
    pub fn is_fully_persisted(&self) -> bool {
        self.profile_error.is_none() && self.failed_tags.is_empty()
    }
}

/// Required-field and password checks run before any network call.
pub fn validate_required(draft: &DraftRecord) -> Result<(), ValidationError> {
    if draft.username().is_empty() {
        return Err(ValidationError::MissingField("username"));
    }
    if draft.email().is_empty() {
        return Err(ValidationError::MissingField("email"));
    }
    if draft.password_str().is_empty() {
        return Err(ValidationError::MissingField("password"));
    }
    validate_password_strength(draft.password_str()).map_err(|_| ValidationError::WeakPassword)
}

pub struct CompletionCommitter {
    backend: Arc<dyn SignupBackend>,
    parallel_tag_inserts: bool,
}

impl CompletionCommitter {
    pub fn new(backend: Arc<dyn SignupBackend>, parallel_tag_inserts: bool) -> Self {
        Self {
            backend,
            parallel_tag_inserts,
        }
    }

    /// Run the signup writes in order: account, profile, interests, skills.
    pub async fn complete(&self, draft: &DraftRecord) -> Result<CommitReport, SignupError> {
        validate_required(draft)?;

        let effective = draft.effective_values();
        let metadata = AccountMetadata {
            username: draft.username().to_string(),
            full_name: draft.username().to_string(),
            age: draft.age(),
            gender: draft.gender(),
            persona: effective.persona.clone(),
            organization: draft.organization().to_string(),
            domain: effective.domain.clone(),
            branch: effective.specialization.clone(),
        };

        let created = self
            .backend
            .create_account(draft.email(), draft.password(), &metadata)
            .await
            .map_err(|e| SignupError::AccountCreation(e.user_message()))?;

        let Some(user_id) = created.user_id else {
            return Err(SignupError::AccountCreation(
                "Could not create user account".to_string(),
            ));
        };
        info!(user_id = %user_id, username = %draft.username(), "Account created");

        let update = ProfileUpdate {
            username: draft.username().to_string(),
            hobbies: draft.hobbies().to_string(),
            persona: effective.persona.clone(),
            organization: draft.organization().to_string(),
            domain: effective.domain.clone(),
            specialization: effective.specialization.clone(),
            branch: effective.specialization.clone(),
            college: draft.organization().to_string(),
        };
        let profile_error = match self.backend.update_profile(user_id, &update).await {
            Ok(()) => None,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Profile update failed");
                Some(e.to_string())
            }
        };

        let mut failed_tags = Vec::new();
        let mut tags_inserted = 0;
        for (kind, names) in [
            (TagKind::Interest, draft.interest_tags()),
            (TagKind::Skill, draft.hobby_tags()),
        ] {
            let (inserted, failed) = self.insert_tags(kind, user_id, &names).await;
            tags_inserted += inserted;
            failed_tags.extend(failed);
        }

        if !failed_tags.is_empty() {
            warn!(user_id = %user_id, failed = failed_tags.len(), "Some tags were not saved");
        }
        self.backend.release_user(user_id).await;

        Ok(CommitReport {
            user_id,
            username: draft.username().to_string(),
            effective,
            profile_error,
            tags_inserted,
            failed_tags,
            completed_at: Utc::now(),
        })
    }

    /// Insert one batch. Every name is attempted regardless of failures.
    async fn insert_tags(
        &self,
        kind: TagKind,
        user_id: Uuid,
        names: &[String],
    ) -> (usize, Vec<FailedTag>) {
        let results = if self.parallel_tag_inserts {
            futures::future::join_all(
                names
                    .iter()
                    .map(|name| self.backend.insert_tag(kind, user_id, name)),
            )
            .await
        } else {
            let mut results = Vec::with_capacity(names.len());
            for name in names {
                results.push(self.backend.insert_tag(kind, user_id, name).await);
            }
            results
        };

        let mut inserted = 0;
        let mut failed = Vec::new();
        for (name, result) in names.iter().zip(results) {
            match result {
                Ok(()) => inserted += 1,
                Err(e) => {
                    warn!(
                        user_id = %user_id,
                        kind = %kind,
                        tag = %name,
                        error = %e,
                        "Tag insert failed"
                    );
                    failed.push(FailedTag {
                        kind,
                        name: name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        (inserted, failed)
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::backend::{BackendCall, InMemoryBackend};
    use crate::signup::draft::{Domain, Persona};

    fn scenario_a() -> DraftRecord {
        let mut draft = DraftRecord::new();
        draft.set_username("alice99");
        draft.set_email("a@b.com");
        draft.set_password(SecretString::from("longenough".to_string()));
        draft.set_persona(Some(Persona::SelfLearner));
        draft.set_domain(Some(Domain::TechnologyComputing));
        draft.set_specialization("AI/ML");
        draft.set_hobbies("chess, reading");
        draft.set_interests("AI");
        draft
    }

    fn count(calls: &[BackendCall], pred: impl Fn(&BackendCall) -> bool) -> usize {
        calls.iter().filter(|c| pred(c)).count()
    }

    #[tokio::test]
    async fn scenario_a_write_fan_out_tolerates_a_failed_skill() {
        let backend = InMemoryBackend::new();
        backend.fail_tag(TagKind::Skill, "reading").await;
        let committer = CompletionCommitter::new(backend.clone(), false);

        let report = committer.complete(&scenario_a()).await.unwrap();

        let calls = backend.calls().await;
        assert_eq!(count(&calls, |c| matches!(c, BackendCall::CreateAccount { .. })), 1);
        assert_eq!(count(&calls, |c| matches!(c, BackendCall::UpdateProfile { .. })), 1);
        assert_eq!(
            calls
                .iter()
                .filter_map(|c| match c {
                    BackendCall::InsertTag { kind, name } => Some((*kind, name.as_str())),
                    _ => None,
                })
                .collect::<Vec<_>>(),
            vec![
                (TagKind::Interest, "AI"),
                (TagKind::Skill, "chess"),
                (TagKind::Skill, "reading"),
            ]
        );

        assert_eq!(report.tags_inserted, 2);
        assert_eq!(report.failed_tags.len(), 1);
        assert_eq!(report.failed_tags[0].name, "reading");
        assert!(!report.is_fully_persisted());
    }

    #[tokio::test]
    async fn writes_run_in_dependency_order() {
        let backend = InMemoryBackend::new();
        let committer = CompletionCommitter::new(backend.clone(), false);
        committer.complete(&scenario_a()).await.unwrap();

        let calls = backend.calls().await;
        assert!(matches!(calls[0], BackendCall::CreateAccount { .. }));
        assert!(matches!(calls[1], BackendCall::UpdateProfile { .. }));
        assert!(matches!(calls[2], BackendCall::InsertTag { kind: TagKind::Interest, .. }));
        assert!(matches!(calls[3], BackendCall::InsertTag { kind: TagKind::Skill, .. }));
        assert!(matches!(calls.last(), Some(BackendCall::ReleaseUser { .. })));
    }

    #[tokio::test]
    async fn user_is_released_even_when_later_writes_fail() {
        let backend = InMemoryBackend::new();
        backend.fail_profile_update(true).await;
        backend.fail_tag(TagKind::Interest, "AI").await;
        let committer = CompletionCommitter::new(backend.clone(), false);

        let report = committer.complete(&scenario_a()).await.unwrap();
        let calls = backend.calls().await;
        assert_eq!(
            calls.last(),
            Some(&BackendCall::ReleaseUser {
                user_id: report.user_id
            })
        );
        assert_eq!(count(&calls, |c| matches!(c, BackendCall::ReleaseUser { .. })), 1);
    }

    #[tokio::test]
    async fn failed_account_creation_releases_nothing() {
        let backend = InMemoryBackend::new();
        backend.fail_account_creation("Signups are closed").await;
        let committer = CompletionCommitter::new(backend.clone(), false);

        committer.complete(&scenario_a()).await.unwrap_err();
        let calls = backend.calls().await;
        assert_eq!(count(&calls, |c| matches!(c, BackendCall::ReleaseUser { .. })), 0);
    }

    #[tokio::test]
    async fn profile_columns_use_effective_values() {
        let backend = InMemoryBackend::new();
        let committer = CompletionCommitter::new(backend.clone(), false);
        let mut draft = scenario_a();
        draft.set_organization("IIT Delhi");

        let report = committer.complete(&draft).await.unwrap();
        assert!(report.is_fully_persisted());

        let update = backend.profile_update_for(report.user_id).await.unwrap();
        assert_eq!(update.persona, "Self Learner");
        assert_eq!(update.domain, "Technology & Computing");
        assert_eq!(update.specialization, "AI/ML");
        assert_eq!(update.branch, "AI/ML");
        assert_eq!(update.college, "IIT Delhi");
        assert_eq!(update.hobbies, "chess, reading");
    }

    #[tokio::test]
    async fn scenario_c_others_domain_resolves_free_text() {
        let backend = InMemoryBackend::new();
        let committer = CompletionCommitter::new(backend.clone(), false);
        let mut draft = scenario_a();
        draft.set_domain(Some(Domain::Others));
        draft.set_domain_other("Linguistics");
        draft.set_specialization_other("Phonetics");

        let report = committer.complete(&draft).await.unwrap();
        assert_eq!(report.effective.domain, "Linguistics");
        assert_eq!(report.effective.specialization, "Phonetics");

        let update = backend.profile_update_for(report.user_id).await.unwrap();
        assert_eq!(update.specialization, "Phonetics");
    }

    #[tokio::test]
    async fn missing_fields_fail_before_any_call() {
        let backend = InMemoryBackend::new();
        let committer = CompletionCommitter::new(backend.clone(), false);

        let mut draft = scenario_a();
        draft.set_email("");
        let err = committer.complete(&draft).await.unwrap_err();
        assert!(matches!(
            err,
            SignupError::Validation(ValidationError::MissingField("email"))
        ));

        let mut draft = scenario_a();
        draft.set_password(SecretString::from("short".to_string()));
        let err = committer.complete(&draft).await.unwrap_err();
        assert!(matches!(err, SignupError::Validation(ValidationError::WeakPassword)));

        assert!(backend.calls().await.is_empty());
    }

    #[tokio::test]
    async fn account_failure_aborts_with_backend_message() {
        let backend = InMemoryBackend::new();
        backend.fail_account_creation("Email rate limit exceeded").await;
        let committer = CompletionCommitter::new(backend.clone(), false);

        let err = committer.complete(&scenario_a()).await.unwrap_err();
        match err {
            SignupError::AccountCreation(msg) => assert_eq!(msg, "Email rate limit exceeded"),
            other => panic!("expected AccountCreation, got {other:?}"),
        }
        assert_eq!(backend.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn missing_user_id_aborts() {
        let backend = InMemoryBackend::new();
        backend.omit_user_id(true).await;
        let committer = CompletionCommitter::new(backend.clone(), false);

        let err = committer.complete(&scenario_a()).await.unwrap_err();
        assert!(matches!(err, SignupError::AccountCreation(_)));
        assert_eq!(backend.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn profile_failure_is_not_fatal() {
        let backend = InMemoryBackend::new();
        backend.fail_profile_update(true).await;
        let committer = CompletionCommitter::new(backend.clone(), false);

        let report = committer.complete(&scenario_a()).await.unwrap();
        assert!(report.profile_error.is_some());
        assert_eq!(report.tags_inserted, 3);
    }

    #[tokio::test]
    async fn parallel_inserts_attempt_every_tag() {
        let backend = InMemoryBackend::new();
        backend.fail_tag(TagKind::Skill, "chess").await;
        let committer = CompletionCommitter::new(backend.clone(), true);

        let report = committer.complete(&scenario_a()).await.unwrap();
        let calls = backend.calls().await;
        assert_eq!(count(&calls, |c| matches!(c, BackendCall::InsertTag { .. })), 3);
        assert_eq!(report.tags_inserted, 2);
        assert_eq!(report.failed_tags[0].name, "chess");
    }

    #[tokio::test]
    async fn empty_lists_insert_nothing() {
        let backend = InMemoryBackend::new();
        let committer = CompletionCommitter::new(backend.clone(), false);
        let mut draft = scenario_a();
        draft.set_hobbies(" , ");
        draft.set_interests("");

        let report = committer.complete(&draft).await.unwrap();
        assert_eq!(report.tags_inserted, 0);
        let calls = backend.calls().await;
        assert_eq!(count(&calls, |c| matches!(c, BackendCall::InsertTag { .. })), 0);
    }
}
