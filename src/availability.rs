//! Debounced uniqueness checks for the username and email fields.
//!
//! Every input bumps a generation counter and aborts the pending lookup. A
//! lookup only publishes its result if its generation is still current, so a
//! slow lookup for an old value can never overwrite the status of a newer
//! one.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::backend::{LookupField, SignupBackend};
use crate::config::SignupConfig;
use crate::error::{BackendError, FormatError};
use crate::validation::{validate_email_format, validate_username_format};

/// Message shown when a lookup fails or times out.
pub const LOOKUP_FAILED_MESSAGE: &str = "Could not check availability, try again";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    #[default]
    Idle,
    Checking,
    Available,
    Taken,
    Error,
}

impl AvailabilityStatus {
    /// Whether a lookup has finished for the current value.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Available | Self::Taken | Self::Error)
    }
}

/// Observable state of one field's availability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityState {
    pub field: LookupField,
    /// Value the status refers to.
    pub value: String,
    pub status: AvailabilityStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AvailabilityState {
    fn new(
        field: LookupField,
        value: &str,
        status: AvailabilityStatus,
        message: Option<String>,
    ) -> Self {
        Self {
            field,
            value: value.to_string(),
            status,
            message,
        }
    }
}

fn validate_format(field: LookupField, value: &str) -> Result<(), FormatError> {
    match field {
        LookupField::Username => validate_username_format(value),
        LookupField::Email => validate_email_format(value),
    }
}

fn resolved_message(field: LookupField, status: AvailabilityStatus) -> Option<String> {
    let msg = match (field, status) {
        (LookupField::Username, AvailabilityStatus::Available) => "Username available!",
        (LookupField::Username, AvailabilityStatus::Taken) => "This username is already taken.",
        (LookupField::Email, AvailabilityStatus::Available) => "Email available!",
        (LookupField::Email, AvailabilityStatus::Taken) => "This email is already registered.",
        (_, AvailabilityStatus::Error) => LOOKUP_FAILED_MESSAGE,
        _ => return None,
    };
    Some(msg.to_string())
}

/// One-shot availability check, without debouncing.
///
/// A failed or timed-out lookup yields [`AvailabilityStatus::Error`], never
/// `Available`.
pub async fn check_availability(
    backend: &dyn SignupBackend,
    field: LookupField,
    value: &str,
    timeout: Option<Duration>,
) -> AvailabilityStatus {
    let lookup = backend.lookup_profile_by_field(field, value);
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, lookup)
            .await
            .unwrap_or(Err(BackendError::Timeout(limit))),
        None => lookup.await,
    };

    match result {
        Ok(Some(_)) => AvailabilityStatus::Taken,
        Ok(None) => AvailabilityStatus::Available,
        Err(e) => {
            warn!(field = %field, error = %e, "Availability lookup failed");
            AvailabilityStatus::Error
        }
    }
}

struct Pending {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

struct CheckerInner {
    field: LookupField,
    backend: Arc<dyn SignupBackend>,
    debounce: Duration,
    timeout: Option<Duration>,
    pending: Mutex<Pending>,
    state_tx: watch::Sender<AvailabilityState>,
}

impl CheckerInner {
    fn lock_pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn run(self: Arc<Self>, generation: u64, value: String) {
        tokio::time::sleep(self.debounce).await;
        let status =
            check_availability(self.backend.as_ref(), self.field, &value, self.timeout).await;
        self.resolve(generation, &value, status);
    }

    /// Publish a lookup result unless a newer input superseded it.
    fn resolve(&self, generation: u64, value: &str, status: AvailabilityStatus) {
        let mut pending = self.lock_pending();
        if pending.generation != generation {
            debug!(field = %self.field, value, "Discarding stale availability result");
            return;
        }
        pending.handle = None;
        self.state_tx.send_replace(AvailabilityState::new(
            self.field,
            value,
            status,
            resolved_message(self.field, status),
        ));
    }
}

/// Debounced availability check for one field.
pub struct AvailabilityChecker {
    inner: Arc<CheckerInner>,
}

impl AvailabilityChecker {
    pub fn new(field: LookupField, backend: Arc<dyn SignupBackend>, config: &SignupConfig) -> Self {
        let idle = AvailabilityState::new(field, "", AvailabilityStatus::Idle, None);
        let (state_tx, _rx) = watch::channel(idle);
        Self {
            inner: Arc::new(CheckerInner {
                field,
                backend,
                debounce: config.lookup_debounce,
                timeout: config.lookup_timeout,
                pending: Mutex::new(Pending {
                    generation: 0,
                    handle: None,
                }),
                state_tx,
            }),
        }
    }

    /// React to a new field value.
    ///
    /// Cancels any pending lookup. Empty values go straight to `Idle`;
    /// malformed ones go to `Idle` with the format message and no lookup.
    /// Otherwise the status becomes `Checking` and a lookup is issued once
    /// the debounce delay passes without further input.
    pub fn on_input(&self, value: &str) -> Result<(), FormatError> {
        let inner = &self.inner;
        let mut pending = inner.lock_pending();
        pending.generation += 1;
        if let Some(handle) = pending.handle.take() {
            handle.abort();
        }

        if value.is_empty() {
            inner.state_tx.send_replace(AvailabilityState::new(
                inner.field,
                value,
                AvailabilityStatus::Idle,
                None,
            ));
            return Ok(());
        }

        if let Err(e) = validate_format(inner.field, value) {
            inner.state_tx.send_replace(AvailabilityState::new(
                inner.field,
                value,
                AvailabilityStatus::Idle,
                Some(e.to_string()),
            ));
            return Err(e);
        }

        inner.state_tx.send_replace(AvailabilityState::new(
            inner.field,
            value,
            AvailabilityStatus::Checking,
            None,
        ));
        let generation = pending.generation;
        let task = Arc::clone(inner).run(generation, value.to_string());
        pending.handle = Some(tokio::spawn(task));
        Ok(())
    }

    pub fn state(&self) -> AvailabilityState {
        self.inner.state_tx.borrow().clone()
    }

    pub fn status(&self) -> AvailabilityStatus {
        self.inner.state_tx.borrow().status
    }

    /// Watch status changes.
    pub fn subscribe(&self) -> watch::Receiver<AvailabilityState> {
        self.inner.state_tx.subscribe()
    }
}

impl Drop for AvailabilityChecker {
    fn drop(&mut self) {
        if let Some(handle) = self.inner.lock_pending().handle.take() {
            handle.abort();
        }
    }
}
