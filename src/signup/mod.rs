//! Signup system — the multi-step registration form.
//!
//! A user fills in a draft over five steps (account, personal details,
//! identity, organization, domain). Each step is gated on its own fields;
//! the account step additionally waits for the username and email
//! availability checks. Completing the last step creates the account and
//! then writes the profile columns and tags on a best-effort basis.

pub mod committer;
pub mod draft;
pub mod flow;
pub mod routes;
pub mod sessions;
pub mod state;

pub use committer::{CommitReport, CompletionCommitter, FailedTag};
pub use draft::{Domain, DraftPatch, DraftRecord, DraftView, Gender, Persona};
pub use flow::{SignupFlow, SignupStatus};
pub use routes::{SignupRouteState, signup_routes};
pub use sessions::{SessionStore, spawn_expiry_task};
pub use state::{SignupStep, StepController};
