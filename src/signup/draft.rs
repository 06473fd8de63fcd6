//! Draft record threaded through the signup steps, and the fixed catalogs
//! its select fields draw from.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};

use super::state::SignupStep;

// ── Catalog ─────────────────────────────────────────────────────────────

/// What best describes the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Persona {
    #[serde(rename = "Undergrad Student")]
    UndergradStudent,
    #[serde(rename = "Postgrad Student")]
    PostgradStudent,
    #[serde(rename = "Drop Learner")]
    DropLearner,
    #[serde(rename = "Self Learner")]
    SelfLearner,
    #[serde(rename = "Exam Aspirant")]
    ExamAspirant,
    #[serde(rename = "Working Professional")]
    WorkingProfessional,
    #[serde(rename = "Gap Year Student")]
    GapYearStudent,
    #[serde(rename = "Competitive Programmer")]
    CompetitiveProgrammer,
    #[serde(rename = "Research Aspirant")]
    ResearchAspirant,
    Other,
}

impl Persona {
    pub const ALL: [Persona; 10] = [
        Self::UndergradStudent,
        Self::PostgradStudent,
        Self::DropLearner,
        Self::SelfLearner,
        Self::ExamAspirant,
        Self::WorkingProfessional,
        Self::GapYearStudent,
        Self::CompetitiveProgrammer,
        Self::ResearchAspirant,
        Self::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::UndergradStudent => "Undergrad Student",
            Self::PostgradStudent => "Postgrad Student",
            Self::DropLearner => "Drop Learner",
            Self::SelfLearner => "Self Learner",
            Self::ExamAspirant => "Exam Aspirant",
            Self::WorkingProfessional => "Working Professional",
            Self::GapYearStudent => "Gap Year Student",
            Self::CompetitiveProgrammer => "Competitive Programmer",
            Self::ResearchAspirant => "Research Aspirant",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Field of study or work. `Others` switches the form to free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Domain {
    #[serde(rename = "Technology & Computing")]
    TechnologyComputing,
    Engineering,
    #[serde(rename = "Design & Creative")]
    DesignCreative,
    #[serde(rename = "Business, Entrepreneurship & Startups")]
    Business,
    #[serde(rename = "Science & Research")]
    ScienceResearch,
    #[serde(rename = "Medical & Healthcare")]
    MedicalHealthcare,
    #[serde(rename = "Law & Public Policy")]
    LawPublicPolicy,
    Others,
}

impl Domain {
    pub const ALL: [Domain; 8] = [
        Self::TechnologyComputing,
        Self::Engineering,
        Self::DesignCreative,
        Self::Business,
        Self::ScienceResearch,
        Self::MedicalHealthcare,
        Self::LawPublicPolicy,
        Self::Others,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::TechnologyComputing => "Technology & Computing",
            Self::Engineering => "Engineering",
            Self::DesignCreative => "Design & Creative",
            Self::Business => "Business, Entrepreneurship & Startups",
            Self::ScienceResearch => "Science & Research",
            Self::MedicalHealthcare => "Medical & Healthcare",
            Self::LawPublicPolicy => "Law & Public Policy",
            Self::Others => "Others",
        }
    }

    /// Specializations offered for this domain. Empty for `Others`.
    pub fn specializations(&self) -> &'static [&'static str] {
        match self {
            Self::TechnologyComputing => &[
                "Computer Science",
                "AI/ML",
                "Data Science",
                "Software Engineering",
                "Cybersecurity",
                "Cloud Computing",
                "DevOps",
                "Full-stack Development",
                "Game Development",
                "Robotics",
                "IoT",
            ],
            Self::Engineering => &[
                "Mechanical",
                "Electrical",
                "Civil",
                "Chemical",
                "Mechatronics",
                "Industrial",
                "Aerospace",
                "Automobile",
                "Environmental",
                "Petroleum",
            ],
            Self::DesignCreative => &[
                "UI/UX",
                "Graphic Design",
                "Animation",
                "Game Design",
                "Architecture",
                "Interior Design",
                "Fashion Design",
                "Film/Media",
                "Music Production",
                "Visual Communication",
            ],
            Self::Business => &[
                "Entrepreneurship",
                "Business Administration",
                "Marketing",
                "Finance",
                "Operations",
                "Analytics",
            ],
            Self::ScienceResearch => &[
                "Biotechnology",
                "Microbiology",
                "Biochemistry",
                "Physics Research",
                "Chemistry",
                "Bioinformatics",
                "Earth Science",
                "Space Science",
            ],
            Self::MedicalHealthcare => &[
                "Medicine",
                "Nursing",
                "Biomedical Engineering",
                "Physiotherapy",
                "Public Health",
                "Dentistry",
            ],
            Self::LawPublicPolicy => &["Law", "Public Policy", "Criminology", "International Law"],
            Self::Others => &[],
        }
    }

    pub fn offers(&self, specialization: &str) -> bool {
        self.specializations().contains(&specialization)
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Others,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Self::Male, Self::Female, Self::Others];
}

// ── Field ownership ─────────────────────────────────────────────────────

/// Every editable field of the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftField {
    Username,
    Email,
    Password,
    Age,
    Gender,
    Hobbies,
    Interests,
    Persona,
    PersonaOther,
    Organization,
    Domain,
    DomainOther,
    Specialization,
    SpecializationOther,
}

impl DraftField {
    /// The only step allowed to edit this field.
    pub fn owner(&self) -> SignupStep {
        match self {
            Self::Username | Self::Email | Self::Password => SignupStep::AccountDetails,
            Self::Age | Self::Gender | Self::Hobbies | Self::Interests => {
                SignupStep::PersonalDetails
            }
            Self::Persona | Self::PersonaOther => SignupStep::Identity,
            Self::Organization => SignupStep::Organization,
            Self::Domain | Self::DomainOther | Self::Specialization | Self::SpecializationOther => {
                SignupStep::Domain
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email",
            Self::Password => "password",
            Self::Age => "age",
            Self::Gender => "gender",
            Self::Hobbies => "hobbies",
            Self::Interests => "interests",
            Self::Persona => "persona",
            Self::PersonaOther => "personaOther",
            Self::Organization => "organization",
            Self::Domain => "domain",
            Self::DomainOther => "domainOther",
            Self::Specialization => "specialization",
            Self::SpecializationOther => "specializationOther",
        }
    }
}

// ── Patch ───────────────────────────────────────────────────────────────

/// Distinguish "absent" (`None`) from "explicitly null" (`Some(None)`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(|v| v.map(SecretString::from))
}

/// Partial update of the draft. Absent fields are left untouched; `null`
/// clears an optional select.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DraftPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "secret")]
    pub password: Option<SecretString>,
    #[serde(default, deserialize_with = "nullable")]
    pub age: Option<Option<u8>>,
    #[serde(default, deserialize_with = "nullable")]
    pub gender: Option<Option<Gender>>,
    pub hobbies: Option<String>,
    pub interests: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub persona: Option<Option<Persona>>,
    pub persona_other: Option<String>,
    pub organization: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub domain: Option<Option<Domain>>,
    pub domain_other: Option<String>,
    pub specialization: Option<String>,
    pub specialization_other: Option<String>,
}

impl DraftPatch {
    /// Fields this patch touches.
    pub fn fields(&self) -> Vec<DraftField> {
        let present = [
            (self.username.is_some(), DraftField::Username),
            (self.email.is_some(), DraftField::Email),
            (self.password.is_some(), DraftField::Password),
            (self.age.is_some(), DraftField::Age),
            (self.gender.is_some(), DraftField::Gender),
            (self.hobbies.is_some(), DraftField::Hobbies),
            (self.interests.is_some(), DraftField::Interests),
            (self.persona.is_some(), DraftField::Persona),
            (self.persona_other.is_some(), DraftField::PersonaOther),
            (self.organization.is_some(), DraftField::Organization),
            (self.domain.is_some(), DraftField::Domain),
            (self.domain_other.is_some(), DraftField::DomainOther),
            (self.specialization.is_some(), DraftField::Specialization),
            (self.specialization_other.is_some(), DraftField::SpecializationOther),
        ];
        present
            .into_iter()
            .filter_map(|(set, field)| set.then_some(field))
            .collect()
    }
}

// ── Draft ───────────────────────────────────────────────────────────────

/// Values written at commit time after "Other" overrides are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffectiveValues {
    pub persona: String,
    pub domain: String,
    pub specialization: String,
}

/// In-progress signup data accumulated across the steps.
///
/// The select fields go through setters so the "Other" companions are
/// cleared whenever their select moves away from `Other`/`Others`.
#[derive(Debug, Clone)]
pub struct DraftRecord {
    username: String,
    email: String,
    password: SecretString,
    age: Option<u8>,
    gender: Option<Gender>,
    hobbies: String,
    interests: String,
    persona: Option<Persona>,
    persona_other: String,
    organization: String,
    domain: Option<Domain>,
    domain_other: String,
    specialization: String,
    specialization_other: String,
}

impl Default for DraftRecord {
    fn default() -> Self {
        Self {
            username: String::new(),
            email: String::new(),
            password: SecretString::from(String::new()),
            age: None,
            gender: None,
            hobbies: String::new(),
            interests: String::new(),
            persona: None,
            persona_other: String::new(),
            organization: String::new(),
            domain: None,
            domain_other: String::new(),
            specialization: String::new(),
            specialization_other: String::new(),
        }
    }
}

impl DraftRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    pub(crate) fn password_str(&self) -> &str {
        self.password.expose_secret()
    }

    pub fn age(&self) -> Option<u8> {
        self.age
    }

    pub fn gender(&self) -> Option<Gender> {
        self.gender
    }

    pub fn hobbies(&self) -> &str {
        &self.hobbies
    }

    pub fn interests(&self) -> &str {
        &self.interests
    }

    pub fn persona(&self) -> Option<Persona> {
        self.persona
    }

    pub fn persona_other(&self) -> &str {
        &self.persona_other
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn domain(&self) -> Option<Domain> {
        self.domain
    }

    pub fn domain_other(&self) -> &str {
        &self.domain_other
    }

    pub fn specialization(&self) -> &str {
        &self.specialization
    }

    pub fn specialization_other(&self) -> &str {
        &self.specialization_other
    }

    /// Usernames are stored lower-cased, as typed into the form.
    pub fn set_username(&mut self, username: &str) {
        self.username = username.to_lowercase();
    }

    pub fn set_email(&mut self, email: &str) {
        self.email = email.to_string();
    }

    pub fn set_password(&mut self, password: SecretString) {
        self.password = password;
    }

    pub fn set_age(&mut self, age: Option<u8>) {
        self.age = age;
    }

    pub fn set_gender(&mut self, gender: Option<Gender>) {
        self.gender = gender;
    }

    pub fn set_hobbies(&mut self, hobbies: &str) {
        self.hobbies = hobbies.to_string();
    }

    pub fn set_interests(&mut self, interests: &str) {
        self.interests = interests.to_string();
    }

    /// Any persona other than `Other` clears `persona_other`.
    pub fn set_persona(&mut self, persona: Option<Persona>) {
        self.persona = persona;
        if persona != Some(Persona::Other) {
            self.persona_other.clear();
        }
    }

    pub fn set_persona_other(&mut self, value: &str) {
        self.persona_other = value.to_string();
    }

    pub fn set_organization(&mut self, organization: &str) {
        self.organization = organization.to_string();
    }

    /// A domain change resets the specialization; any domain other than
    /// `Others` also clears both free-text fields. Re-selecting the current
    /// domain keeps everything.
    pub fn set_domain(&mut self, domain: Option<Domain>) {
        if self.domain == domain {
            return;
        }
        self.domain = domain;
        self.specialization.clear();
        if domain != Some(Domain::Others) {
            self.domain_other.clear();
            self.specialization_other.clear();
        }
    }

    pub fn set_domain_other(&mut self, value: &str) {
        self.domain_other = value.to_string();
    }

    pub fn set_specialization(&mut self, value: &str) {
        self.specialization = value.to_string();
    }

    pub fn set_specialization_other(&mut self, value: &str) {
        self.specialization_other = value.to_string();
    }

    /// Apply a patch. Selects are applied before their companion fields so
    /// a single patch can both pick `Other` and fill in the free text.
    pub fn apply(&mut self, patch: DraftPatch) {
        if let Some(v) = patch.username {
            self.set_username(&v);
        }
        if let Some(v) = patch.email {
            self.set_email(&v);
        }
        if let Some(v) = patch.password {
            self.set_password(v);
        }
        if let Some(v) = patch.age {
            self.set_age(v);
        }
        if let Some(v) = patch.gender {
            self.set_gender(v);
        }
        if let Some(v) = patch.hobbies {
            self.set_hobbies(&v);
        }
        if let Some(v) = patch.interests {
            self.set_interests(&v);
        }
        if let Some(v) = patch.persona {
            self.set_persona(v);
        }
        if let Some(v) = patch.persona_other {
            self.set_persona_other(&v);
        }
        if let Some(v) = patch.organization {
            self.set_organization(&v);
        }
        if let Some(v) = patch.domain {
            self.set_domain(v);
        }
        if let Some(v) = patch.domain_other {
            self.set_domain_other(&v);
        }
        if let Some(v) = patch.specialization {
            self.set_specialization(&v);
        }
        if let Some(v) = patch.specialization_other {
            self.set_specialization_other(&v);
        }
    }

    /// Resolve the "Other" overrides.
    pub fn effective_values(&self) -> EffectiveValues {
        let persona = match self.persona {
            Some(Persona::Other) => self.persona_other.clone(),
            Some(p) => p.label().to_string(),
            None => String::new(),
        };
        let (domain, specialization) = match self.domain {
            Some(Domain::Others) => (self.domain_other.clone(), self.specialization_other.clone()),
            Some(d) => (d.label().to_string(), self.specialization.clone()),
            None => (String::new(), self.specialization.clone()),
        };
        EffectiveValues {
            persona,
            domain,
            specialization,
        }
    }

    pub fn interest_tags(&self) -> Vec<String> {
        split_list(&self.interests)
    }

    pub fn hobby_tags(&self) -> Vec<String> {
        split_list(&self.hobbies)
    }

    /// Everything except the password, for display.
    pub fn view(&self) -> DraftView {
        DraftView {
            username: self.username.clone(),
            email: self.email.clone(),
            password_set: !self.password.expose_secret().is_empty(),
            age: self.age,
            gender: self.gender,
            hobbies: self.hobbies.clone(),
            interests: self.interests.clone(),
            persona: self.persona,
            persona_other: self.persona_other.clone(),
            organization: self.organization.clone(),
            domain: self.domain,
            domain_other: self.domain_other.clone(),
            specialization: self.specialization.clone(),
            specialization_other: self.specialization_other.clone(),
        }
    }
}

/// Split a comma-list into trimmed, non-empty tokens.
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Serializable snapshot of a draft without the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub username: String,
    pub email: String,
    pub password_set: bool,
    pub age: Option<u8>,
    pub gender: Option<Gender>,
    pub hobbies: String,
    pub interests: String,
    pub persona: Option<Persona>,
    pub persona_other: String,
    pub organization: String,
    pub domain: Option<Domain>,
    pub domain_other: String,
    pub specialization: String,
    pub specialization_other: String,
}
