//! Closed taxonomy of semantic field types.
//!
//! Every classification resolves to one of these tokens. The taxonomy
//! is closed on purpose: the oracle must answer with a known token or
//! a "none of the above" sentinel, and parsing an unknown token never
//! panics, it yields `None`.

use serde::{Deserialize, Serialize};

use crate::field::InputModality;

/// Semantic meaning of a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    // Identity
    FirstName,
    LastName,
    FullName,
    PreferredName,
    Pronouns,

    // Contact
    Email,
    Phone,
    PhoneExtension,
    PhoneCountryCode,

    // Address
    AddressLine1,
    AddressLine2,
    City,
    State,
    PostalCode,
    Country,

    // Links
    Linkedin,
    Github,
    Website,
    PortfolioUrl,

    // Employment
    CurrentCompany,
    CurrentTitle,
    YearsExperience,
    NoticePeriod,
    SalaryExpectation,
    HowDidYouHear,
    ReferralName,

    // Education
    School,
    Degree,
    FieldOfStudy,
    Gpa,
    GraduationYear,

    // Work eligibility / compliance
    WorkAuthorization,
    VisaSponsorship,
    VisaStatus,
    CitizenshipCountry,
    Over18,
    PreviousEmployee,
    Relocation,
    RemoteWork,

    // Voluntary EEO disclosures
    Gender,
    RaceEthnicity,
    HispanicLatino,
    VeteranStatus,
    DisabilityStatus,

    // Logistics
    AvailableStartDate,

    // Free text
    CoverLetter,
    References,
    Explanation,

    /// Sentinel: classification failed, do not fill.
    Unknown,
}

impl FieldType {
    /// Every real type, in taxonomy order. Excludes `Unknown`.
    pub const ALL: &'static [FieldType] = &[
        Self::FirstName,
        Self::LastName,
        Self::FullName,
        Self::PreferredName,
        Self::Pronouns,
        Self::Email,
        Self::Phone,
        Self::PhoneExtension,
        Self::PhoneCountryCode,
        Self::AddressLine1,
        Self::AddressLine2,
        Self::City,
        Self::State,
        Self::PostalCode,
        Self::Country,
        Self::Linkedin,
        Self::Github,
        Self::Website,
        Self::PortfolioUrl,
        Self::CurrentCompany,
        Self::CurrentTitle,
        Self::YearsExperience,
        Self::NoticePeriod,
        Self::SalaryExpectation,
        Self::HowDidYouHear,
        Self::ReferralName,
        Self::School,
        Self::Degree,
        Self::FieldOfStudy,
        Self::Gpa,
        Self::GraduationYear,
        Self::WorkAuthorization,
        Self::VisaSponsorship,
        Self::VisaStatus,
        Self::CitizenshipCountry,
        Self::Over18,
        Self::PreviousEmployee,
        Self::Relocation,
        Self::RemoteWork,
        Self::Gender,
        Self::RaceEthnicity,
        Self::HispanicLatino,
        Self::VeteranStatus,
        Self::DisabilityStatus,
        Self::AvailableStartDate,
        Self::CoverLetter,
        Self::References,
        Self::Explanation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::FullName => "full_name",
            Self::PreferredName => "preferred_name",
            Self::Pronouns => "pronouns",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::PhoneExtension => "phone_extension",
            Self::PhoneCountryCode => "phone_country_code",
            Self::AddressLine1 => "address_line1",
            Self::AddressLine2 => "address_line2",
            Self::City => "city",
            Self::State => "state",
            Self::PostalCode => "postal_code",
            Self::Country => "country",
            Self::Linkedin => "linkedin",
            Self::Github => "github",
            Self::Website => "website",
            Self::PortfolioUrl => "portfolio_url",
            Self::CurrentCompany => "current_company",
            Self::CurrentTitle => "current_title",
            Self::YearsExperience => "years_experience",
            Self::NoticePeriod => "notice_period",
            Self::SalaryExpectation => "salary_expectation",
            Self::HowDidYouHear => "how_did_you_hear",
            Self::ReferralName => "referral_name",
            Self::School => "school",
            Self::Degree => "degree",
            Self::FieldOfStudy => "field_of_study",
            Self::Gpa => "gpa",
            Self::GraduationYear => "graduation_year",
            Self::WorkAuthorization => "work_authorization",
            Self::VisaSponsorship => "visa_sponsorship",
            Self::VisaStatus => "visa_status",
            Self::CitizenshipCountry => "citizenship_country",
            Self::Over18 => "over_18",
            Self::PreviousEmployee => "previous_employee",
            Self::Relocation => "relocation",
            Self::RemoteWork => "remote_work",
            Self::Gender => "gender",
            Self::RaceEthnicity => "race_ethnicity",
            Self::HispanicLatino => "hispanic_latino",
            Self::VeteranStatus => "veteran_status",
            Self::DisabilityStatus => "disability_status",
            Self::AvailableStartDate => "available_start_date",
            Self::CoverLetter => "cover_letter",
            Self::References => "references",
            Self::Explanation => "explanation",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a taxonomy token. Unknown tokens yield `None`.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == token)
            .or(if token == "unknown" {
                Some(Self::Unknown)
            } else {
                None
            })
    }

    /// Natural-language description, used as the zero-shot candidate
    /// label and as the base phrasing for the embedding centroid.
    pub fn description(&self) -> &'static str {
        match self {
            Self::FirstName => "the applicant's first or given name",
            Self::LastName => "the applicant's last or family name",
            Self::FullName => "the applicant's full legal name",
            Self::PreferredName => "the name the applicant prefers to go by",
            Self::Pronouns => "the applicant's personal pronouns",
            Self::Email => "the applicant's email address",
            Self::Phone => "the applicant's phone number",
            Self::PhoneExtension => "a phone number extension",
            Self::PhoneCountryCode => "the country dialing code of a phone number",
            Self::AddressLine1 => "street address, first line",
            Self::AddressLine2 => "street address, second line or apartment number",
            Self::City => "the city of the applicant's address",
            Self::State => "the state or province of the applicant's address",
            Self::PostalCode => "the zip or postal code of the applicant's address",
            Self::Country => "the country of the applicant's address",
            Self::Linkedin => "a link to the applicant's LinkedIn profile",
            Self::Github => "a link to the applicant's GitHub profile",
            Self::Website => "the applicant's personal website",
            Self::PortfolioUrl => "a link to the applicant's portfolio of work",
            Self::CurrentCompany => "the company the applicant currently works for",
            Self::CurrentTitle => "the applicant's current job title",
            Self::YearsExperience => "how many years of relevant experience the applicant has",
            Self::NoticePeriod => "the applicant's notice period at their current job",
            Self::SalaryExpectation => "the applicant's expected salary or compensation",
            Self::HowDidYouHear => "how the applicant heard about this job opening",
            Self::ReferralName => "the name of the employee who referred the applicant",
            Self::School => "the school, college or university the applicant attended",
            Self::Degree => "the degree the applicant earned",
            Self::FieldOfStudy => "the applicant's field of study, major or discipline",
            Self::Gpa => "the applicant's grade point average",
            Self::GraduationYear => "the year the applicant graduated",
            Self::WorkAuthorization => {
                "whether the applicant is legally authorized to work in this country"
            }
            Self::VisaSponsorship => {
                "whether the applicant will now or in the future require visa sponsorship"
            }
            Self::VisaStatus => "the applicant's current visa or immigration status",
            Self::CitizenshipCountry => "the country of the applicant's citizenship",
            Self::Over18 => "whether the applicant is at least 18 years old",
            Self::PreviousEmployee => {
                "whether the applicant previously worked for this company"
            }
            Self::Relocation => "whether the applicant is willing to relocate",
            Self::RemoteWork => "whether the applicant wants to work remotely",
            Self::Gender => "the applicant's gender identity, a voluntary disclosure",
            Self::RaceEthnicity => "the applicant's race or ethnicity, a voluntary disclosure",
            Self::HispanicLatino => "whether the applicant identifies as Hispanic or Latino",
            Self::VeteranStatus => "the applicant's protected veteran status",
            Self::DisabilityStatus => "whether the applicant has a disability",
            Self::AvailableStartDate => "the earliest date the applicant can start working",
            Self::CoverLetter => "a cover letter or motivation statement",
            Self::References => "professional references the applicant can provide",
            Self::Explanation => "a free-text explanation or additional details",
            Self::Unknown => "unclassified field",
        }
    }

    /// Extra canonical phrasings averaged into the embedding centroid.
    /// Types with no extra phrasings fall back to the description only.
    pub fn phrasings(&self) -> &'static [&'static str] {
        match self {
            Self::FirstName => &["first name", "given name", "legal first name"],
            Self::LastName => &["last name", "family name", "surname"],
            Self::Email => &["email", "email address", "contact email"],
            Self::Phone => &["phone number", "mobile number", "contact phone"],
            Self::School => &["school name", "university", "college attended"],
            Self::FieldOfStudy => &["field of study", "major", "area of study"],
            Self::WorkAuthorization => &[
                "are you legally authorized to work in the united states",
                "are you eligible to work in this country",
                "do you have the right to work here",
            ],
            Self::VisaSponsorship => &[
                "will you now or in the future require sponsorship",
                "do you require visa sponsorship to work",
                "will you need employment visa sponsorship",
            ],
            Self::VisaStatus => &[
                "what is your current visa status",
                "what is your immigration status",
                "which work visa do you currently hold",
            ],
            Self::CitizenshipCountry => &[
                "what is your country of citizenship",
                "of which country are you a citizen",
            ],
            Self::Over18 => &["are you at least 18 years of age", "are you over 18"],
            Self::PreviousEmployee => &[
                "have you ever worked for this company before",
                "are you a former employee",
            ],
            Self::Relocation => &["are you willing to relocate", "open to relocation"],
            Self::RemoteWork => &["are you open to remote work", "do you want to work remotely"],
            Self::Gender => &["gender", "gender identity", "what is your gender"],
            Self::RaceEthnicity => &["race", "ethnicity", "race or ethnicity"],
            Self::HispanicLatino => &["are you hispanic or latino", "hispanic or latino origin"],
            Self::VeteranStatus => &["veteran status", "are you a protected veteran"],
            Self::DisabilityStatus => &["disability status", "do you have a disability"],
            Self::SalaryExpectation => &[
                "what are your salary expectations",
                "desired compensation",
            ],
            Self::HowDidYouHear => &[
                "how did you hear about this position",
                "how did you learn about this job",
            ],
            Self::AvailableStartDate => &["when can you start", "earliest start date"],
            Self::CoverLetter => &["cover letter", "why do you want to work here"],
            _ => &[],
        }
    }

    /// Boolean-flavored types expect a yes/no shaped answer. The guard
    /// never lets one of these reach a free-text field.
    pub fn is_boolean_flavored(&self) -> bool {
        matches!(
            self,
            Self::WorkAuthorization
                | Self::VisaSponsorship
                | Self::Over18
                | Self::PreviousEmployee
                | Self::Relocation
                | Self::RemoteWork
                | Self::HispanicLatino
        )
    }

    /// Types whose answers only make sense as free typed text.
    pub fn expects_free_text(&self) -> bool {
        matches!(self, Self::CoverLetter | Self::References | Self::Explanation)
    }

    /// Candidate set for a given modality. Checkbox/radio controls
    /// narrow to boolean-flavored and choice-style disclosure types;
    /// everything else keeps the full taxonomy.
    pub fn candidates_for_modality(modality: InputModality) -> Vec<FieldType> {
        match modality {
            InputModality::Checkbox | InputModality::Radio => Self::ALL
                .iter()
                .copied()
                .filter(|t| {
                    t.is_boolean_flavored()
                        || matches!(
                            t,
                            Self::Gender
                                | Self::RaceEthnicity
                                | Self::VeteranStatus
                                | Self::DisabilityStatus
                                | Self::VisaStatus
                        )
                })
                .collect(),
            _ => Self::ALL.to_vec(),
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_all_tokens() {
        for t in FieldType::ALL {
            assert_eq!(FieldType::parse(t.as_str()), Some(*t));
        }
        assert_eq!(FieldType::parse("unknown"), Some(FieldType::Unknown));
    }

    #[test]
    fn test_parse_unknown_token_is_none() {
        assert_eq!(FieldType::parse("favorite_color"), None);
        assert_eq!(FieldType::parse(""), None);
    }

    #[test]
    fn test_parse_tolerates_dashes_and_case() {
        assert_eq!(FieldType::parse("First-Name"), Some(FieldType::FirstName));
        assert_eq!(FieldType::parse("VISA SPONSORSHIP"), Some(FieldType::VisaSponsorship));
    }

    #[test]
    fn test_boolean_and_free_text_sets_disjoint() {
        for t in FieldType::ALL {
            assert!(
                !(t.is_boolean_flavored() && t.expects_free_text()),
                "{t} is both boolean-flavored and free-text"
            );
        }
    }

    #[test]
    fn test_checkbox_candidates_narrowed() {
        let candidates = FieldType::candidates_for_modality(InputModality::Checkbox);
        assert!(candidates.contains(&FieldType::VisaSponsorship));
        assert!(!candidates.contains(&FieldType::FirstName));
        assert!(candidates.len() < FieldType::ALL.len());
    }

    #[test]
    fn test_descriptions_nonempty() {
        for t in FieldType::ALL {
            assert!(!t.description().is_empty());
        }
    }
}
