//! Per-user answer resolution.
//!
//! `resolve(field_type, modality) -> value | None` is a pure function
//! over the applicant profile. The dispatch is a lookup table from
//! every taxonomy token to a resolver closure, enumerated once at
//! construction; a missing entry fails construction instead of
//! falling through silently at lookup time.

use std::collections::HashMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::classify::Classification;
use crate::field::InputModality;
use crate::taxonomy::FieldType;

/// Applicant profile. All fields optional; unknown keys in the file
/// are ignored on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub preferred_name: Option<String>,
    pub pronouns: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub phone_extension: Option<String>,
    pub phone_country_code: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub website: Option<String>,
    pub portfolio_url: Option<String>,
    pub current_company: Option<String>,
    pub current_title: Option<String>,
    pub years_experience: Option<u32>,
    pub notice_period: Option<String>,
    pub salary_expectation: Option<String>,
    pub how_did_you_hear: Option<String>,
    pub referral_name: Option<String>,
    pub school: Option<String>,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub gpa: Option<String>,
    pub graduation_year: Option<u32>,
    pub work_authorized: Option<bool>,
    pub requires_sponsorship: Option<bool>,
    pub visa_status: Option<String>,
    pub citizenship_country: Option<String>,
    pub over_18: Option<bool>,
    pub previous_employee: Option<bool>,
    pub willing_to_relocate: Option<bool>,
    pub wants_remote: Option<bool>,
    pub gender: Option<String>,
    pub race_ethnicity: Option<String>,
    pub hispanic_latino: Option<bool>,
    pub veteran_status: Option<String>,
    pub disability_status: Option<String>,
    pub available_start_date: Option<String>,
    pub cover_letter: Option<String>,
    pub references: Option<String>,
}

impl Profile {
    /// Compact JSON used by the oracle's direct-answer fallback.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

type Resolver = Box<dyn Fn(&Profile) -> Option<String> + Send + Sync>;

fn text(get: fn(&Profile) -> Option<&String>) -> Resolver {
    Box::new(move |p| get(p).cloned())
}

fn yes_no(get: fn(&Profile) -> Option<bool>) -> Resolver {
    Box::new(move |p| get(p).map(|b| if b { "Yes" } else { "No" }.to_string()))
}

fn number(get: fn(&Profile) -> Option<u32>) -> Resolver {
    Box::new(move |p| get(p).map(|n| n.to_string()))
}

/// Lookup table from taxonomy token to resolver.
pub struct AnswerResolver {
    table: HashMap<FieldType, Resolver>,
}

impl AnswerResolver {
    /// Build the table for the whole taxonomy. Fails if any token is
    /// left without a resolver.
    pub fn new() -> Result<Self> {
        let mut table: HashMap<FieldType, Resolver> = HashMap::new();

        table.insert(FieldType::FirstName, text(|p| p.first_name.as_ref()));
        table.insert(FieldType::LastName, text(|p| p.last_name.as_ref()));
        table.insert(
            FieldType::FullName,
            Box::new(|p| match (&p.first_name, &p.last_name) {
                (Some(first), Some(last)) => Some(format!("{first} {last}")),
                (Some(first), None) => Some(first.clone()),
                _ => None,
            }),
        );
        table.insert(FieldType::PreferredName, text(|p| p.preferred_name.as_ref()));
        table.insert(FieldType::Pronouns, text(|p| p.pronouns.as_ref()));
        table.insert(FieldType::Email, text(|p| p.email.as_ref()));
        table.insert(FieldType::Phone, text(|p| p.phone.as_ref()));
        table.insert(FieldType::PhoneExtension, text(|p| p.phone_extension.as_ref()));
        table.insert(
            FieldType::PhoneCountryCode,
            text(|p| p.phone_country_code.as_ref()),
        );
        table.insert(FieldType::AddressLine1, text(|p| p.address_line1.as_ref()));
        table.insert(FieldType::AddressLine2, text(|p| p.address_line2.as_ref()));
        table.insert(FieldType::City, text(|p| p.city.as_ref()));
        table.insert(FieldType::State, text(|p| p.state.as_ref()));
        table.insert(FieldType::PostalCode, text(|p| p.postal_code.as_ref()));
        table.insert(FieldType::Country, text(|p| p.country.as_ref()));
        table.insert(FieldType::Linkedin, text(|p| p.linkedin.as_ref()));
        table.insert(FieldType::Github, text(|p| p.github.as_ref()));
        table.insert(FieldType::Website, text(|p| p.website.as_ref()));
        table.insert(FieldType::PortfolioUrl, text(|p| p.portfolio_url.as_ref()));
        table.insert(FieldType::CurrentCompany, text(|p| p.current_company.as_ref()));
        table.insert(FieldType::CurrentTitle, text(|p| p.current_title.as_ref()));
        table.insert(FieldType::YearsExperience, number(|p| p.years_experience));
        table.insert(FieldType::NoticePeriod, text(|p| p.notice_period.as_ref()));
        table.insert(
            FieldType::SalaryExpectation,
            text(|p| p.salary_expectation.as_ref()),
        );
        table.insert(FieldType::HowDidYouHear, text(|p| p.how_did_you_hear.as_ref()));
        table.insert(FieldType::ReferralName, text(|p| p.referral_name.as_ref()));
        table.insert(FieldType::School, text(|p| p.school.as_ref()));
        table.insert(FieldType::Degree, text(|p| p.degree.as_ref()));
        table.insert(FieldType::FieldOfStudy, text(|p| p.field_of_study.as_ref()));
        table.insert(FieldType::Gpa, text(|p| p.gpa.as_ref()));
        table.insert(FieldType::GraduationYear, number(|p| p.graduation_year));
        table.insert(FieldType::WorkAuthorization, yes_no(|p| p.work_authorized));
        table.insert(FieldType::VisaSponsorship, yes_no(|p| p.requires_sponsorship));
        table.insert(FieldType::VisaStatus, text(|p| p.visa_status.as_ref()));
        table.insert(
            FieldType::CitizenshipCountry,
            text(|p| p.citizenship_country.as_ref()),
        );
        table.insert(FieldType::Over18, yes_no(|p| p.over_18));
        table.insert(FieldType::PreviousEmployee, yes_no(|p| p.previous_employee));
        table.insert(FieldType::Relocation, yes_no(|p| p.willing_to_relocate));
        table.insert(FieldType::RemoteWork, yes_no(|p| p.wants_remote));
        table.insert(FieldType::Gender, text(|p| p.gender.as_ref()));
        table.insert(FieldType::RaceEthnicity, text(|p| p.race_ethnicity.as_ref()));
        table.insert(FieldType::HispanicLatino, yes_no(|p| p.hispanic_latino));
        table.insert(FieldType::VeteranStatus, text(|p| p.veteran_status.as_ref()));
        table.insert(
            FieldType::DisabilityStatus,
            text(|p| p.disability_status.as_ref()),
        );
        table.insert(
            FieldType::AvailableStartDate,
            text(|p| p.available_start_date.as_ref()),
        );
        table.insert(FieldType::CoverLetter, text(|p| p.cover_letter.as_ref()));
        table.insert(FieldType::References, text(|p| p.references.as_ref()));
        // Free-text explanations have no canned profile value; the
        // caller decides whether to draft one.
        table.insert(FieldType::Explanation, Box::new(|_| None));

        for t in FieldType::ALL {
            if !table.contains_key(t) {
                bail!("no answer resolver registered for field type {t}");
            }
        }

        Ok(Self { table })
    }

    /// Resolve an answer. `Unknown` and unmapped values yield `None`
    /// ("do not fill").
    pub fn resolve(
        &self,
        profile: &Profile,
        field_type: FieldType,
        _modality: InputModality,
    ) -> Option<String> {
        self.table.get(&field_type).and_then(|r| r(profile))
    }
}

/// Final output handed to the form-filling collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedField {
    pub field_type: FieldType,
    pub confidence: f32,
    pub source: crate::classify::ClassificationSource,
    pub verified: bool,
    pub answer: Option<String>,
}

impl ResolvedField {
    pub fn from_classification(c: &Classification, answer: Option<String>) -> Self {
        Self {
            field_type: c.field_type,
            confidence: c.confidence,
            source: c.source,
            verified: c.verified,
            answer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile {
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            email: Some("ada@example.com".to_string()),
            work_authorized: Some(true),
            requires_sponsorship: Some(false),
            years_experience: Some(7),
            ..Profile::default()
        }
    }

    #[test]
    fn test_table_covers_whole_taxonomy() {
        // Construction itself asserts coverage.
        AnswerResolver::new().unwrap();
    }

    #[test]
    fn test_text_and_bool_resolution() {
        let resolver = AnswerResolver::new().unwrap();
        let p = profile();

        assert_eq!(
            resolver.resolve(&p, FieldType::FirstName, InputModality::Text),
            Some("Ada".to_string())
        );
        assert_eq!(
            resolver.resolve(&p, FieldType::FullName, InputModality::Text),
            Some("Ada Lovelace".to_string())
        );
        assert_eq!(
            resolver.resolve(&p, FieldType::WorkAuthorization, InputModality::Radio),
            Some("Yes".to_string())
        );
        assert_eq!(
            resolver.resolve(&p, FieldType::VisaSponsorship, InputModality::Radio),
            Some("No".to_string())
        );
        assert_eq!(
            resolver.resolve(&p, FieldType::YearsExperience, InputModality::Text),
            Some("7".to_string())
        );
    }

    #[test]
    fn test_missing_data_resolves_none() {
        let resolver = AnswerResolver::new().unwrap();
        let p = profile();
        assert_eq!(resolver.resolve(&p, FieldType::Gpa, InputModality::Text), None);
        assert_eq!(
            resolver.resolve(&p, FieldType::Unknown, InputModality::Text),
            None
        );
    }

    #[test]
    fn test_profile_ignores_unknown_keys() {
        let p: Profile =
            serde_json::from_str(r#"{"first_name": "Ada", "shoe_size": 38}"#).unwrap();
        assert_eq!(p.first_name.as_deref(), Some("Ada"));
    }
}
