//! Form field descriptors and text normalization.
//!
//! A `FieldDescriptor` is the immutable input to the cascade: one
//! fillable control plus the textual context discovered around it.
//! Created once per form field by the DOM-discovery collaborator,
//! never mutated by the classifier.

use serde::{Deserialize, Serialize};

/// Input modality of a form control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputModality {
    Text,
    Textarea,
    Dropdown,
    Radio,
    Checkbox,
    CheckboxGroup,
    Date,
}

impl InputModality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Dropdown => "dropdown",
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
            Self::CheckboxGroup => "checkbox_group",
            Self::Date => "date",
        }
    }

    /// Free-text controls accept arbitrary typed input.
    pub fn is_free_text(&self) -> bool {
        matches!(self, Self::Text | Self::Textarea)
    }

    /// Constrained controls only accept one of a fixed option set.
    pub fn is_constrained_choice(&self) -> bool {
        matches!(
            self,
            Self::Dropdown | Self::Radio | Self::Checkbox | Self::CheckboxGroup
        )
    }
}

/// One fillable form control plus its textual/contextual metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Stable platform identifier (e.g. "legalName--firstName").
    #[serde(default)]
    pub id: Option<String>,

    /// Visible label. May be generic ("Select One").
    pub label: String,

    /// Input modality.
    pub modality: InputModality,

    /// Ordered selectable option labels, possibly empty.
    #[serde(default)]
    pub options: Vec<String>,

    /// Surrounding question text, used when the label is generic.
    #[serde(default)]
    pub section_context: Option<String>,

    /// Aria-label or alt text, if any.
    #[serde(default)]
    pub aria_text: Option<String>,

    /// Hosting platform ("workday", "greenhouse", ...), if known.
    #[serde(default)]
    pub platform: Option<String>,
}

impl FieldDescriptor {
    pub fn new(label: impl Into<String>, modality: InputModality) -> Self {
        Self {
            id: None,
            label: label.into(),
            modality,
            options: Vec::new(),
            section_context: None,
            aria_text: None,
            platform: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section_context = Some(section.into());
        self
    }

    pub fn with_aria(mut self, aria: impl Into<String>) -> Self {
        self.aria_text = Some(aria.into());
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Full textual context for embedding / zero-shot / oracle calls.
    /// Falls back to section text when the label is generic.
    pub fn context_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if !self.label.trim().is_empty() && !self.has_generic_label() {
            parts.push(self.label.trim());
        }
        if let Some(section) = &self.section_context {
            if !section.trim().is_empty() {
                parts.push(section.trim());
            }
        }
        if let Some(aria) = &self.aria_text {
            if !aria.trim().is_empty() {
                parts.push(aria.trim());
            }
        }
        if parts.is_empty() {
            parts.push(self.label.trim());
        }
        parts.join(" | ")
    }

    /// Generic labels carry no semantic signal on their own.
    pub fn has_generic_label(&self) -> bool {
        let normalized = normalize_label(&self.label);
        matches!(
            normalized.as_str(),
            "" | "select one"
                | "select"
                | "select an option"
                | "choose one"
                | "choose"
                | "please select"
                | "answer"
                | "your answer"
        )
    }

    /// A recorded prior answer appended to the label (e.g. a label
    /// ending in "*Yes") signals a conditional follow-up field.
    pub fn trailing_prior_answer(&self) -> Option<&'static str> {
        let trimmed = self.label.trim();
        let lower = trimmed.to_lowercase();
        if lower.ends_with("*yes") || lower.ends_with("* yes") {
            Some("Yes")
        } else if lower.ends_with("*no") || lower.ends_with("* no") {
            Some("No")
        } else {
            None
        }
    }
}

/// Page-level context needed for tier-3 disambiguation of generic
/// same-labeled fields (e.g. several "Select One" dropdowns).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageHint {
    /// Ordered question texts for all same-labeled fields on the page.
    pub questions: Vec<String>,
    /// 1-based ordinal of this field among the same-labeled fields.
    pub position: usize,
    /// Total number of same-labeled fields on the page.
    pub total: usize,
}

/// Tokenize text deterministically: lowercase, alphanumeric runs,
/// tokens shorter than 2 chars dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.len() >= 2)
        .map(String::from)
        .collect()
}

/// Normalize a label: lowercase, punctuation stripped, whitespace
/// collapsed, trailing required-markers ("*") removed.
pub fn normalize_label(label: &str) -> String {
    tokenize(label).join(" ")
}

/// Normalize a question for exact-cache keying: tokenized and
/// token-sorted so word-order and punctuation differences collapse
/// onto the same key.
pub fn normalize_question(question: &str) -> String {
    let mut tokens = tokenize(question);
    tokens.sort();
    tokens.dedup();
    tokens.join(" ")
}

/// Suffix of a stable platform identifier: the last alphanumeric
/// segment ("legalName--firstName" -> "firstname").
pub fn id_suffix(id: &str) -> String {
    id.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .next_back()
        .unwrap_or_default()
        .to_string()
}
