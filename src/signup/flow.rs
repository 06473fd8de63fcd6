//! SignupFlow — coordinates the draft, the step controller, the availability
//! checkers and the committer for one signup session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::committer::{CommitReport, CompletionCommitter};
use super::draft::{DraftPatch, DraftRecord, DraftView};
use super::state::{AccountChecks, SignupStep, StepController};
use crate::availability::{AvailabilityChecker, AvailabilityState, AvailabilityStatus};
use crate::backend::{LookupField, SignupBackend};
use crate::config::SignupConfig;
use crate::error::FlowError;
use crate::validation::validate_password_strength;

/// Snapshot of a signup session, returned by every flow operation.
#[derive(Debug, Clone, Serialize)]
pub struct SignupStatus {
    pub id: Uuid,
    pub step: SignupStep,
    pub step_number: u8,
    pub username: AvailabilityState,
    pub email: AvailabilityState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_error: Option<String>,
    /// Why the current step cannot be left forwards (or completed, on the
    /// last step). `None` when it can.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<DraftView>,
    pub completed: bool,
    pub started_at: DateTime<Utc>,
}

/// One user's pass through the signup steps.
///
/// The draft is `None` once a commit succeeded; it is consumed exactly once.
pub struct SignupFlow {
    id: Uuid,
    draft: RwLock<Option<DraftRecord>>,
    controller: RwLock<StepController>,
    username_check: AvailabilityChecker,
    email_check: AvailabilityChecker,
    committer: CompletionCommitter,
    started_at: DateTime<Utc>,
}

impl SignupFlow {
    pub fn new(backend: Arc<dyn SignupBackend>, config: &SignupConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            draft: RwLock::new(Some(DraftRecord::new())),
            controller: RwLock::new(StepController::new()),
            username_check: AvailabilityChecker::new(
                LookupField::Username,
                Arc::clone(&backend),
                config,
            ),
            email_check: AvailabilityChecker::new(LookupField::Email, Arc::clone(&backend), config),
            committer: CompletionCommitter::new(backend, config.parallel_tag_inserts),
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn current_step(&self) -> SignupStep {
        self.controller.read().await.current()
    }

    /// Availability checker for one of the account fields.
    pub fn checker(&self, field: LookupField) -> &AvailabilityChecker {
        match field {
            LookupField::Username => &self.username_check,
            LookupField::Email => &self.email_check,
        }
    }

    /// Apply a partial update from the current step.
    ///
    /// The whole patch is rejected if it touches a field owned by another
    /// step. Username/email changes re-trigger their availability check.
    pub async fn update(&self, patch: DraftPatch) -> Result<SignupStatus, FlowError> {
        {
            let mut guard = self.draft.write().await;
            let draft = guard.as_mut().ok_or(FlowError::AlreadyCompleted)?;

            let step = self.controller.read().await.current();
            if let Some(field) = patch.fields().into_iter().find(|f| f.owner() != step) {
                return Err(FlowError::FieldNotEditable {
                    field: field.name(),
                    step,
                });
            }

            let old_username = draft.username().to_string();
            let old_email = draft.email().to_string();
            draft.apply(patch);

            // Format errors are carried by the availability state.
            if draft.username() != old_username {
                let _ = self.username_check.on_input(draft.username());
            }
            if draft.email() != old_email {
                let _ = self.email_check.on_input(draft.email());
            }
        }
        Ok(self.status().await)
    }

    /// Move to the next step if the current one is complete.
    pub async fn advance(&self) -> Result<SignupStatus, FlowError> {
        {
            let guard = self.draft.read().await;
            let draft = guard.as_ref().ok_or(FlowError::AlreadyCompleted)?;
            let checks = self.account_checks(draft);

            let mut controller = self.controller.write().await;
            let step = controller.current();
            let next = controller
                .advance(draft, &checks)
                .map_err(|reason| FlowError::Blocked { step, reason })?;
            debug!(flow_id = %self.id, from = %step, to = %next, "Signup step advanced");
        }
        Ok(self.status().await)
    }

    /// Go back one step. Entered data is kept.
    pub async fn retreat(&self) -> Result<SignupStatus, FlowError> {
        if self.draft.read().await.is_none() {
            return Err(FlowError::AlreadyCompleted);
        }
        let step = self.controller.write().await.retreat();
        debug!(flow_id = %self.id, to = %step, "Signup step retreated");
        Ok(self.status().await)
    }

    /// Finish the signup from the last step.
    ///
    /// Holds the draft lock for the whole commit, so edits and a second
    /// submission wait for (and then observe) the outcome. On success the
    /// draft is dropped; on failure it stays editable.
    pub async fn complete(&self) -> Result<CommitReport, FlowError> {
        let mut guard = self.draft.write().await;
        let draft = guard.as_ref().ok_or(FlowError::AlreadyCompleted)?;

        let step = self.controller.read().await.current();
        if step != SignupStep::LAST {
            return Err(FlowError::NotAtFinalStep(step));
        }
        StepController::can_complete(draft).map_err(|reason| FlowError::Blocked { step, reason })?;

        let report = self.committer.complete(draft).await?;
        guard.take();

        info!(
            flow_id = %self.id,
            user_id = %report.user_id,
            fully_persisted = report.is_fully_persisted(),
            "Signup completed"
        );
        Ok(report)
    }

    pub async fn is_completed(&self) -> bool {
        self.draft.read().await.is_none()
    }

    /// Availability as seen by the step gate. A check whose value lags
    /// behind the draft counts as still checking.
    fn account_checks(&self, draft: &DraftRecord) -> AccountChecks {
        let effective = |check: &AvailabilityChecker, value: &str| {
            let state = check.state();
            if state.value == value {
                state.status
            } else {
                AvailabilityStatus::Checking
            }
        };
        AccountChecks {
            username: effective(&self.username_check, draft.username()),
            email: effective(&self.email_check, draft.email()),
        }
    }

    pub async fn status(&self) -> SignupStatus {
        let guard = self.draft.read().await;
        let controller = *self.controller.read().await;
        let step = controller.current();

        let (password_error, blocked_reason, draft) = match guard.as_ref() {
            Some(draft) => {
                let password = draft.password_str();
                let password_error = if password.is_empty() {
                    None
                } else {
                    validate_password_strength(password)
                        .err()
                        .map(|e| e.to_string())
                };
                let gate = if step == SignupStep::LAST {
                    StepController::can_complete(draft)
                } else {
                    controller.check_advance(draft, &self.account_checks(draft))
                };
                (
                    password_error,
                    gate.err().map(|e| e.to_string()),
                    Some(draft.view()),
                )
            }
            None => (None, None, None),
        };

        SignupStatus {
            id: self.id,
            step,
            step_number: step.number(),
            username: self.username_check.state(),
            email: self.email_check.state(),
            password_error,
            blocked_reason,
            draft,
            completed: guard.is_none(),
            started_at: self.started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backend::{BackendCall, InMemoryBackend, TagKind};
    use crate::error::{SignupError, StepBlocked};
    use crate::signup::draft::{Domain, Persona};

    fn patch(json: serde_json::Value) -> DraftPatch {
        serde_json::from_value(json).unwrap()
    }

    fn flow(backend: Arc<InMemoryBackend>) -> SignupFlow {
        SignupFlow::new(backend, &SignupConfig::default())
    }

    async fn wait_for_checks(flow: &SignupFlow) {
        for field in [LookupField::Username, LookupField::Email] {
            let mut rx = flow.checker(field).subscribe();
            rx.wait_for(|s| s.status != AvailabilityStatus::Checking).await.unwrap();
        }
    }

    /// Fill and leave the account step.
    async fn pass_account_step(flow: &SignupFlow) {
        flow.update(patch(serde_json::json!({
            "username": "Alice99",
            "email": "a@b.com",
            "password": "longenough"
        })))
        .await
        .unwrap();
        wait_for_checks(flow).await;
        flow.advance().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn full_walkthrough_commits_once() {
        let backend = InMemoryBackend::new();
        let flow = flow(backend.clone());

        pass_account_step(&flow).await;
        flow.update(patch(serde_json::json!({
            "age": 21, "gender": "Female", "hobbies": "chess, reading", "interests": "AI"
        })))
        .await
        .unwrap();
        flow.advance().await.unwrap();
        flow.update(patch(serde_json::json!({ "persona": "Self Learner" })))
            .await
            .unwrap();
        flow.advance().await.unwrap();
        flow.update(patch(serde_json::json!({ "organization": "IIT Delhi" })))
            .await
            .unwrap();
        flow.advance().await.unwrap();
        let status = flow
            .update(patch(serde_json::json!({
                "domain": "Technology & Computing", "specialization": "AI/ML"
            })))
            .await
            .unwrap();
        assert_eq!(status.step, SignupStep::Domain);
        assert!(status.blocked_reason.is_none());

        let report = flow.complete().await.unwrap();
        assert_eq!(report.username, "alice99");
        assert_eq!(report.tags_inserted, 3);
        assert!(flow.is_completed().await);

        assert!(matches!(flow.complete().await, Err(FlowError::AlreadyCompleted)));
        let creates = backend
            .calls()
            .await
            .into_iter()
            .filter(|c| matches!(c, BackendCall::CreateAccount { .. }))
            .count();
        assert_eq!(creates, 1);

        let status = flow.status().await;
        assert!(status.completed);
        assert!(status.draft.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn taken_username_keeps_flow_on_first_step() {
        let backend = InMemoryBackend::new();
        backend.insert_profile("alice99", "old@b.com").await;
        let flow = flow(backend);

        flow.update(patch(serde_json::json!({
            "username": "alice99", "email": "a@b.com", "password": "longenough"
        })))
        .await
        .unwrap();
        wait_for_checks(&flow).await;

        let err = flow.advance().await.unwrap_err();
        assert!(matches!(
            err,
            FlowError::Blocked {
                reason: StepBlocked::UsernameNotAvailable,
                ..
            }
        ));
        assert_eq!(flow.current_step().await, SignupStep::AccountDetails);
    }

    #[tokio::test(start_paused = true)]
    async fn advance_while_checking_is_blocked() {
        let flow = flow(InMemoryBackend::new());
        flow.update(patch(serde_json::json!({
            "username": "alice99", "email": "a@b.com", "password": "longenough"
        })))
        .await
        .unwrap();

        assert!(matches!(flow.advance().await, Err(FlowError::Blocked { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn fields_of_other_steps_are_rejected() {
        let flow = flow(InMemoryBackend::new());
        let err = flow
            .update(patch(serde_json::json!({ "username": "alice99", "persona": "Other" })))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FlowError::FieldNotEditable {
                field: "persona",
                step: SignupStep::AccountDetails
            }
        ));
        // Nothing from the rejected patch was applied.
        let status = flow.status().await;
        assert_eq!(status.draft.unwrap().username, "");
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_b_empty_other_persona_blocks_identity_step() {
        let flow = flow(InMemoryBackend::new());
        pass_account_step(&flow).await;
        flow.advance().await.unwrap();

        let status = flow
            .update(patch(serde_json::json!({ "persona": "Other", "personaOther": "" })))
            .await
            .unwrap();
        assert_eq!(
            status.blocked_reason.as_deref(),
            Some("Please specify your identity")
        );
        assert!(matches!(
            flow.advance().await,
            Err(FlowError::Blocked {
                reason: StepBlocked::PersonaOtherMissing,
                ..
            })
        ));
        assert_eq!(flow.current_step().await, SignupStep::Identity);
    }

    #[tokio::test(start_paused = true)]
    async fn retreat_keeps_entered_data() {
        let flow = flow(InMemoryBackend::new());
        pass_account_step(&flow).await;
        flow.update(patch(serde_json::json!({ "hobbies": "chess" })))
            .await
            .unwrap();

        let status = flow.retreat().await.unwrap();
        assert_eq!(status.step, SignupStep::AccountDetails);
        let draft = status.draft.unwrap();
        assert_eq!(draft.username, "alice99");
        assert_eq!(draft.hobbies, "chess");

        // Clamped at the first step.
        assert_eq!(flow.retreat().await.unwrap().step, SignupStep::AccountDetails);
    }

    #[tokio::test(start_paused = true)]
    async fn complete_requires_last_step() {
        let flow = flow(InMemoryBackend::new());
        assert!(matches!(
            flow.complete().await,
            Err(FlowError::NotAtFinalStep(SignupStep::AccountDetails))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_account_creation_keeps_draft_for_retry() {
        let backend = InMemoryBackend::new();
        let flow = flow(backend.clone());
        pass_account_step(&flow).await;
        flow.advance().await.unwrap();
        flow.update(patch(serde_json::json!({ "persona": "Drop Learner" })))
            .await
            .unwrap();
        flow.advance().await.unwrap();
        flow.advance().await.unwrap();
        flow.update(patch(serde_json::json!({
            "domain": "Others", "domainOther": "Linguistics", "specializationOther": "Phonetics"
        })))
        .await
        .unwrap();

        // Someone registers the email while this user is mid-flow.
        backend.insert_profile("someone", "a@b.com").await;
        let err = flow.complete().await.unwrap_err();
        assert!(matches!(err, FlowError::Signup(SignupError::AccountCreation(_))));
        assert!(!flow.is_completed().await);

        let status = flow.status().await;
        assert_eq!(status.draft.unwrap().domain, Some(Domain::Others));
    }

    #[tokio::test(start_paused = true)]
    async fn password_error_is_inline() {
        let flow = flow(InMemoryBackend::new());
        let status = flow
            .update(patch(serde_json::json!({ "password": "short" })))
            .await
            .unwrap();
        assert_eq!(
            status.password_error.as_deref(),
            Some("Password must be at least 8 characters")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_username_does_not_requery() {
        let backend = InMemoryBackend::new();
        let flow = flow(backend.clone());
        flow.update(patch(serde_json::json!({ "username": "alice99" })))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        // Same value after lower-casing.
        flow.update(patch(serde_json::json!({ "username": "ALICE99" })))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let lookups = backend
            .calls()
            .await
            .into_iter()
            .filter(|c| matches!(c, BackendCall::Lookup { .. }))
            .count();
        assert_eq!(lookups, 1);
        assert_eq!(flow.checker(LookupField::Username).status(), AvailabilityStatus::Available);
    }

    #[tokio::test(start_paused = true)]
    async fn best_effort_failures_still_complete() {
        let backend = InMemoryBackend::new();
        backend.fail_tag(TagKind::Skill, "chess").await;
        let flow = flow(backend.clone());
        pass_account_step(&flow).await;
        flow.update(patch(serde_json::json!({ "hobbies": "chess, reading" })))
            .await
            .unwrap();
        flow.advance().await.unwrap();
        flow.update(patch(serde_json::json!({ "persona": "Research Aspirant" })))
            .await
            .unwrap();
        flow.advance().await.unwrap();
        flow.advance().await.unwrap();
        flow.update(patch(serde_json::json!({
            "domain": "Engineering", "specialization": "Civil"
        })))
        .await
        .unwrap();

        let report = flow.complete().await.unwrap();
        assert_eq!(report.failed_tags.len(), 1);
        assert_eq!(report.effective.persona, Persona::ResearchAspirant.label());
    }
}
