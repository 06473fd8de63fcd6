//! Signup state machine — tracks which step the user is on.

use serde::{Deserialize, Serialize};

use super::draft::{Domain, DraftRecord, Persona};
use crate::availability::AvailabilityStatus;
use crate::error::StepBlocked;
use crate::validation::validate_password_strength;

/// The steps of the signup form.
///
/// Progresses linearly: AccountDetails → PersonalDetails → Identity →
/// Organization → Domain. Branching only happens inside Identity and Domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignupStep {
    #[default]
    AccountDetails,
    PersonalDetails,
    Identity,
    Organization,
    Domain,
}

impl SignupStep {
    pub const FIRST: SignupStep = SignupStep::AccountDetails;
    pub const LAST: SignupStep = SignupStep::Domain;

    /// 1-based position, as shown in "Step N of 5".
    pub fn number(&self) -> u8 {
        match self {
            Self::AccountDetails => 1,
            Self::PersonalDetails => 2,
            Self::Identity => 3,
            Self::Organization => 4,
            Self::Domain => 5,
        }
    }

    pub fn next(&self) -> Option<SignupStep> {
        use SignupStep::*;
        match self {
            AccountDetails => Some(PersonalDetails),
            PersonalDetails => Some(Identity),
            Identity => Some(Organization),
            Organization => Some(Domain),
            Domain => None,
        }
    }

    pub fn previous(&self) -> Option<SignupStep> {
        use SignupStep::*;
        match self {
            AccountDetails => None,
            PersonalDetails => Some(AccountDetails),
            Identity => Some(PersonalDetails),
            Organization => Some(Identity),
            Domain => Some(Organization),
        }
    }

    /// Only moves to an adjacent step are valid.
    pub fn can_transition_to(&self, target: SignupStep) -> bool {
        self.next() == Some(target) || self.previous() == Some(target)
    }
}

impl std::fmt::Display for SignupStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AccountDetails => "account_details",
            Self::PersonalDetails => "personal_details",
            Self::Identity => "identity",
            Self::Organization => "organization",
            Self::Domain => "domain",
        };
        write!(f, "{s}")
    }
}

/// Availability of the two checked account fields, as seen by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountChecks {
    pub username: AvailabilityStatus,
    pub email: AvailabilityStatus,
}

/// Holds the current step. Never touches the draft itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepController {
    step: SignupStep,
}

impl StepController {
    pub fn new() -> Self {
        Self {
            step: SignupStep::FIRST,
        }
    }

    pub fn current(&self) -> SignupStep {
        self.step
    }

    /// Whether the current step may be left forwards.
    pub fn check_advance(
        &self,
        draft: &DraftRecord,
        checks: &AccountChecks,
    ) -> Result<(), StepBlocked> {
        match self.step {
            SignupStep::AccountDetails => {
                if checks.username != AvailabilityStatus::Available {
                    return Err(StepBlocked::UsernameNotAvailable);
                }
                if checks.email != AvailabilityStatus::Available {
                    return Err(StepBlocked::EmailNotAvailable);
                }
                validate_password_strength(draft.password_str())
                    .map_err(|_| StepBlocked::WeakPassword)
            }
            SignupStep::Identity => match draft.persona() {
                None => Err(StepBlocked::PersonaMissing),
                Some(Persona::Other) if draft.persona_other().is_empty() => {
                    Err(StepBlocked::PersonaOtherMissing)
                }
                Some(_) => Ok(()),
            },
            SignupStep::PersonalDetails | SignupStep::Organization | SignupStep::Domain => Ok(()),
        }
    }

    /// Move forward one step if the gate allows it. At the last step this is
    /// a no-op; finishing goes through completion instead.
    pub fn advance(
        &mut self,
        draft: &DraftRecord,
        checks: &AccountChecks,
    ) -> Result<SignupStep, StepBlocked> {
        let Some(next) = self.step.next() else {
            return Ok(self.step);
        };
        self.check_advance(draft, checks)?;
        debug_assert!(self.step.can_transition_to(next));
        self.step = next;
        Ok(next)
    }

    /// Move back one step. No-op at the first step.
    pub fn retreat(&mut self) -> SignupStep {
        if let Some(prev) = self.step.previous() {
            self.step = prev;
        }
        self.step
    }

    /// The Domain step gate: a catalog specialization, or both free-text
    /// fields when the domain is `Others`.
    pub fn can_complete(draft: &DraftRecord) -> Result<(), StepBlocked> {
        match draft.domain() {
            None => Err(StepBlocked::DomainMissing),
            Some(Domain::Others) => {
                if draft.domain_other().is_empty() || draft.specialization_other().is_empty() {
                    Err(StepBlocked::DomainOtherMissing)
                } else {
                    Ok(())
                }
            }
            Some(domain) => {
                let specialization = draft.specialization();
                if specialization.is_empty() {
                    Err(StepBlocked::SpecializationMissing)
                } else if !domain.offers(specialization) {
                    Err(StepBlocked::UnknownSpecialization {
                        domain: domain.label().to_string(),
                        specialization: specialization.to_string(),
                    })
                } else {
                    Ok(())
                }
            }
        }
    }
}
