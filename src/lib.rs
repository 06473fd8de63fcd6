//! Twindle signup — onboarding state machine for the student network.

pub mod availability;
pub mod backend;
pub mod config;
pub mod error;
pub mod signup;
pub mod validation;
