//! Deterministic pattern matchers over identifiers, labels and
//! option lists. Zero cost, highest trust.
//!
//! Rules are evaluated in a fixed priority order: more specific
//! patterns are listed before more general ones that share a
//! substring ("field of study" before "school", "extension" before
//! "phone"). The first matching rule wins. No scoring, no ties.

use regex::Regex;

use crate::field::{normalize_label, FieldDescriptor};
use crate::taxonomy::FieldType;

/// A successful deterministic match, with the rule that fired for
/// auditability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternHit {
    pub field_type: FieldType,
    pub rule: &'static str,
}

struct Rule {
    name: &'static str,
    regex: Regex,
    field_type: FieldType,
}

/// An option-list signature: a field matches when at least
/// `min_hits` of the keywords appear among its option labels.
/// The minimum guards against one-keyword false positives.
struct OptionSignature {
    name: &'static str,
    keywords: &'static [&'static str],
    min_hits: usize,
    field_type: FieldType,
}

/// Ordered deterministic matchers. Built once, reused per field.
pub struct PatternMatcher {
    id_rules: Vec<Rule>,
    label_rules: Vec<Rule>,
    option_signatures: Vec<OptionSignature>,
}

fn rule(name: &'static str, pattern: &str, field_type: FieldType) -> Rule {
    Rule {
        name,
        // Patterns are static literals; a bad one is a programming
        // error caught by the rule-table tests.
        regex: Regex::new(pattern).unwrap_or_else(|e| panic!("bad rule {name}: {e}")),
        field_type,
    }
}

impl PatternMatcher {
    pub fn new() -> Self {
        // Order matters. Specific before general.
        let id_rules = vec![
            rule("id_first_name", r"first.?name|given.?name|fname", FieldType::FirstName),
            rule("id_last_name", r"last.?name|family.?name|surname|lname", FieldType::LastName),
            rule("id_preferred_name", r"preferred.?name|nickname", FieldType::PreferredName),
            rule("id_full_name", r"full.?name|legal.?name", FieldType::FullName),
            rule("id_email", r"e.?mail", FieldType::Email),
            // Extension and country code before the generic phone rule.
            rule("id_phone_ext", r"extension|phone.?ext", FieldType::PhoneExtension),
            rule("id_phone_cc", r"country.?code|phone.?type", FieldType::PhoneCountryCode),
            rule("id_phone", r"phone|mobile|cell", FieldType::Phone),
            rule("id_address2", r"address.?line.?2|address2|apt|unit|suite", FieldType::AddressLine2),
            rule("id_address1", r"address.?line.?1|address1|street|address", FieldType::AddressLine1),
            rule("id_city", r"city|town|locality", FieldType::City),
            rule("id_state", r"state|province|region", FieldType::State),
            rule("id_postal", r"zip|postal", FieldType::PostalCode),
            rule("id_linkedin", r"linked.?in", FieldType::Linkedin),
            rule("id_github", r"git.?hub", FieldType::Github),
            rule("id_portfolio", r"portfolio", FieldType::PortfolioUrl),
            rule("id_website", r"website|personal.?site|url", FieldType::Website),
            rule("id_company", r"current.?company|employer|company", FieldType::CurrentCompany),
            rule("id_title", r"current.?title|job.?title|title", FieldType::CurrentTitle),
            rule("id_salary", r"salary|compensation|pay.?expectation", FieldType::SalaryExpectation),
            rule("id_hear", r"how.?did.?you.?hear|source", FieldType::HowDidYouHear),
            rule("id_referral", r"referr", FieldType::ReferralName),
            // Field of study before school: both often live under an
            // "education" prefix.
            rule("id_field_of_study", r"field.?of.?study|major|discipline", FieldType::FieldOfStudy),
            rule("id_degree", r"degree", FieldType::Degree),
            rule("id_gpa", r"gpa|grade.?point", FieldType::Gpa),
            rule("id_school", r"school|university|college|institution", FieldType::School),
            rule("id_sponsorship", r"sponsor", FieldType::VisaSponsorship),
            rule("id_visa_status", r"visa.?status|immigration", FieldType::VisaStatus),
            rule("id_work_auth", r"work.?auth|authoriz|eligib", FieldType::WorkAuthorization),
            rule("id_citizenship", r"citizenship|nationality", FieldType::CitizenshipCountry),
            // Country after citizenship: "citizenshipCountry" must not
            // fall through to the address country.
            rule("id_country", r"country", FieldType::Country),
            rule("id_over18", r"over.?18|age.?18|minimum.?age", FieldType::Over18),
            rule("id_previous_employee", r"previous.?employ|former.?employ|rehire", FieldType::PreviousEmployee),
            rule("id_relocation", r"relocat", FieldType::Relocation),
            rule("id_remote", r"remote", FieldType::RemoteWork),
            rule("id_hispanic", r"hispanic|latino", FieldType::HispanicLatino),
            rule("id_gender", r"gender|sex\b", FieldType::Gender),
            rule("id_ethnicity", r"ethnicity|race", FieldType::RaceEthnicity),
            rule("id_veteran", r"veteran", FieldType::VeteranStatus),
            rule("id_disability", r"disabilit", FieldType::DisabilityStatus),
            rule("id_start_date", r"start.?date|available", FieldType::AvailableStartDate),
            rule("id_cover_letter", r"cover.?letter|motivation", FieldType::CoverLetter),
            rule("id_references", r"reference", FieldType::References),
            rule("id_pronouns", r"pronoun", FieldType::Pronouns),
            rule("id_notice", r"notice.?period", FieldType::NoticePeriod),
            rule("id_years_exp", r"years.?of.?exp|years.?exp|experience.?years", FieldType::YearsExperience),
            rule("id_grad_year", r"grad.?year|graduation", FieldType::GraduationYear),
        ];

        let label_rules = vec![
            rule("label_first_name", r"^(legal )?first name$|^given name$", FieldType::FirstName),
            rule("label_last_name", r"^(legal )?last name$|^family name$|^surname$", FieldType::LastName),
            rule("label_preferred_name", r"^preferred (first )?name$", FieldType::PreferredName),
            rule("label_full_name", r"^(full|legal) name$|^name$", FieldType::FullName),
            rule("label_email", r"^e ?mail( address)?$", FieldType::Email),
            rule("label_phone_ext", r"extension", FieldType::PhoneExtension),
            rule("label_phone", r"^(mobile |cell |primary )?phone( number)?$", FieldType::Phone),
            rule("label_address2", r"^address line 2$|apartment|suite|unit", FieldType::AddressLine2),
            rule("label_address1", r"^address( line 1)?$|^street address$", FieldType::AddressLine1),
            rule("label_city", r"^city$|^town$", FieldType::City),
            rule("label_state", r"^state$|^province$|^state province$", FieldType::State),
            rule("label_postal", r"^zip( code)?$|^postal code$|^zip postal code$", FieldType::PostalCode),
            rule("label_linkedin", r"linkedin", FieldType::Linkedin),
            rule("label_github", r"github", FieldType::Github),
            rule("label_portfolio", r"portfolio", FieldType::PortfolioUrl),
            rule("label_website", r"^(personal )?website$", FieldType::Website),
            rule("label_company", r"^(current )?(company|employer)$", FieldType::CurrentCompany),
            rule("label_title", r"^(current )?(job )?title$", FieldType::CurrentTitle),
            rule("label_salary", r"salary|compensation", FieldType::SalaryExpectation),
            rule("label_hear", r"how did you (hear|learn)", FieldType::HowDidYouHear),
            rule("label_field_of_study", r"field of study|^major$", FieldType::FieldOfStudy),
            rule("label_degree", r"^degree$|^highest degree$", FieldType::Degree),
            rule("label_gpa", r"^gpa$|grade point", FieldType::Gpa),
            rule("label_school", r"^school( name)?$|^university$|^college$", FieldType::School),
            rule("label_sponsorship", r"sponsorship|require sponsor", FieldType::VisaSponsorship),
            rule("label_work_auth", r"authorized to work|legally authorized|eligible to work", FieldType::WorkAuthorization),
            rule("label_visa_status", r"visa status|immigration status", FieldType::VisaStatus),
            rule("label_citizenship", r"citizenship|citizen of", FieldType::CitizenshipCountry),
            rule("label_country", r"^country$", FieldType::Country),
            rule("label_over18", r"(at least|over) 18", FieldType::Over18),
            rule("label_previous_employee", r"(previously|ever) (worked|been employed)", FieldType::PreviousEmployee),
            rule("label_relocation", r"willing to relocate|relocation", FieldType::Relocation),
            rule("label_hispanic", r"hispanic|latino", FieldType::HispanicLatino),
            rule("label_gender", r"^gender( identity)?$", FieldType::Gender),
            rule("label_ethnicity", r"^race$|ethnicity", FieldType::RaceEthnicity),
            rule("label_veteran", r"veteran", FieldType::VeteranStatus),
            rule("label_disability", r"disability", FieldType::DisabilityStatus),
            rule("label_start_date", r"start date|when can you start", FieldType::AvailableStartDate),
            rule("label_cover_letter", r"cover letter|why do you want", FieldType::CoverLetter),
            rule("label_pronouns", r"pronoun", FieldType::Pronouns),
            rule("label_notice", r"notice period", FieldType::NoticePeriod),
            rule("label_years_exp", r"years of .*experience", FieldType::YearsExperience),
        ];

        let option_signatures = vec![
            OptionSignature {
                name: "options_gender",
                keywords: &["male", "female", "non-binary", "nonbinary"],
                min_hits: 2,
                field_type: FieldType::Gender,
            },
            OptionSignature {
                name: "options_ethnicity",
                keywords: &["asian", "white", "black", "hispanic", "pacific islander", "american indian", "two or more races"],
                min_hits: 2,
                field_type: FieldType::RaceEthnicity,
            },
            OptionSignature {
                name: "options_veteran",
                keywords: &["protected veteran", "not a protected veteran", "i am a veteran"],
                min_hits: 2,
                field_type: FieldType::VeteranStatus,
            },
            OptionSignature {
                name: "options_disability",
                keywords: &["yes, i have a disability", "no, i do not have a disability", "i do not want to answer"],
                min_hits: 2,
                field_type: FieldType::DisabilityStatus,
            },
            OptionSignature {
                name: "options_visa_status",
                keywords: &["h-1b", "h1b", "f-1", "opt", "tn", "green card", "permanent resident"],
                min_hits: 2,
                field_type: FieldType::VisaStatus,
            },
        ];

        Self {
            id_rules,
            label_rules,
            option_signatures,
        }
    }

    /// Match against the stable platform identifier.
    pub fn match_identifier(&self, id: &str) -> Option<PatternHit> {
        let id = id.to_lowercase();
        self.id_rules
            .iter()
            .find(|r| r.regex.is_match(&id))
            .map(|r| PatternHit {
                field_type: r.field_type,
                rule: r.name,
            })
    }

    /// Match against the normalized visible label.
    pub fn match_label(&self, label: &str) -> Option<PatternHit> {
        let normalized = normalize_label(label);
        if normalized.is_empty() {
            return None;
        }
        self.label_rules
            .iter()
            .find(|r| r.regex.is_match(&normalized))
            .map(|r| PatternHit {
                field_type: r.field_type,
                rule: r.name,
            })
    }

    /// Match against the option list. A plain two-option {Yes, No}
    /// field carries no meaning on its own and never resolves here.
    pub fn match_options(&self, options: &[String]) -> Option<PatternHit> {
        if options.is_empty() || is_plain_yes_no(options) {
            return None;
        }
        let lowered: Vec<String> = options.iter().map(|o| o.to_lowercase()).collect();
        self.option_signatures
            .iter()
            .find(|sig| {
                let hits = sig
                    .keywords
                    .iter()
                    .filter(|kw| lowered.iter().any(|o| o.contains(*kw)))
                    .count();
                hits >= sig.min_hits
            })
            .map(|sig| PatternHit {
                field_type: sig.field_type,
                rule: sig.name,
            })
    }

    /// Full deterministic pass over a field: identifier, then label,
    /// then options.
    pub fn match_field(&self, field: &FieldDescriptor) -> Option<PatternHit> {
        if let Some(id) = &field.id {
            if let Some(hit) = self.match_identifier(id) {
                return Some(hit);
            }
        }
        if let Some(hit) = self.match_label(&field.label) {
            return Some(hit);
        }
        self.match_options(&field.options)
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// True when the option set is exactly {yes, no} (any order/case).
pub fn is_plain_yes_no(options: &[String]) -> bool {
    if options.len() != 2 {
        return false;
    }
    let mut normalized: Vec<String> = options.iter().map(|o| normalize_label(o)).collect();
    normalized.sort();
    normalized == ["no", "yes"]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::InputModality;

    #[test]
    fn test_id_first_name() {
        let m = PatternMatcher::new();
        let hit = m.match_identifier("legalName--firstName").unwrap();
        assert_eq!(hit.field_type, FieldType::FirstName);
        assert_eq!(hit.rule, "id_first_name");
    }

    #[test]
    fn test_specific_before_general_field_of_study() {
        let m = PatternMatcher::new();
        // "fieldOfStudy" under an education/school prefix must not
        // resolve to School.
        let hit = m.match_identifier("education--school--fieldOfStudy").unwrap();
        assert_eq!(hit.field_type, FieldType::FieldOfStudy);
    }

    #[test]
    fn test_specific_before_general_extension() {
        let m = PatternMatcher::new();
        let hit = m.match_identifier("phoneNumber--extension").unwrap();
        assert_eq!(hit.field_type, FieldType::PhoneExtension);
    }

    #[test]
    fn test_citizenship_before_country() {
        let m = PatternMatcher::new();
        let hit = m.match_identifier("citizenshipCountry").unwrap();
        assert_eq!(hit.field_type, FieldType::CitizenshipCountry);
    }

    #[test]
    fn test_address_line2_before_line1() {
        let m = PatternMatcher::new();
        let hit = m.match_identifier("addressLine2").unwrap();
        assert_eq!(hit.field_type, FieldType::AddressLine2);
    }

    #[test]
    fn test_label_match() {
        let m = PatternMatcher::new();
        let hit = m.match_label("First Name *").unwrap();
        assert_eq!(hit.field_type, FieldType::FirstName);

        let hit = m.match_label("Are you legally authorized to work in the US?").unwrap();
        assert_eq!(hit.field_type, FieldType::WorkAuthorization);
    }

    #[test]
    fn test_generic_label_no_match() {
        let m = PatternMatcher::new();
        assert!(m.match_label("Select One").is_none());
    }

    #[test]
    fn test_option_signature_needs_min_hits() {
        let m = PatternMatcher::new();
        // Single gender keyword is not enough.
        let options = vec!["Male".to_string(), "Other".to_string()];
        assert!(m.match_options(&options).is_none());

        let options = vec![
            "Male".to_string(),
            "Female".to_string(),
            "Non-binary".to_string(),
        ];
        let hit = m.match_options(&options).unwrap();
        assert_eq!(hit.field_type, FieldType::Gender);
    }

    #[test]
    fn test_plain_yes_no_never_resolves() {
        let m = PatternMatcher::new();
        let options = vec!["Yes".to_string(), "No".to_string()];
        assert!(is_plain_yes_no(&options));
        assert!(m.match_options(&options).is_none());
    }

    #[test]
    fn test_match_field_prefers_identifier() {
        let m = PatternMatcher::new();
        let field = FieldDescriptor::new("Name", InputModality::Text)
            .with_id("contact--email");
        let hit = m.match_field(&field).unwrap();
        assert_eq!(hit.field_type, FieldType::Email);
    }

    #[test]
    fn test_deterministic_across_runs() {
        let a = PatternMatcher::new();
        let b = PatternMatcher::new();
        for id in ["firstName", "lastName", "phone--extension", "school--major"] {
            assert_eq!(a.match_identifier(id), b.match_identifier(id));
        }
    }
}
