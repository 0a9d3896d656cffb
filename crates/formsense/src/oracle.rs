//! Oracle abstraction over the LLM provider.
//!
//! Two call shapes: a cheap yes/no verification ("is this field about
//! X?") and a full classification carrying the complete taxonomy,
//! plus the bounded direct-answer fallback used when the oracle
//! refuses to pick a taxonomy token. The HTTP implementation speaks
//! both the Ollama and OpenAI-compatible JSON APIs with a bounded
//! timeout; a scripted implementation backs the cascade tests with no
//! network dependency.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::field::PageHint;
use crate::taxonomy::FieldType;

/// Oracle transport and protocol errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    #[error("oracle is disabled in configuration")]
    Disabled,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("invalid JSON response: {0}")]
    InvalidJson(String),

    #[error("request timeout after {0} seconds")]
    Timeout(u64),

    #[error("oracle returned empty response")]
    Empty,
}

/// Full-classification verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaxonomyVerdict {
    /// A known taxonomy token.
    Type(FieldType),
    /// The oracle's explicit "none of the above" sentinel.
    NoneOfTheAbove,
    /// A token outside the taxonomy. The cascade treats this as an
    /// ambiguous response and may fall back to a direct answer.
    OutOfTaxonomy(String),
}

/// Opaque classification/verification function over the network.
pub trait Oracle: Send + Sync {
    /// Cheap yes/no verification: is this field about the proposed
    /// type?
    fn verify(&self, type_description: &str, evidence: &str) -> Result<bool, OracleError>;

    /// Full classification against the complete taxonomy, with
    /// optional page-level disambiguation context.
    fn classify(
        &self,
        evidence: &str,
        taxonomy: &[FieldType],
        page: Option<&PageHint>,
    ) -> Result<TaxonomyVerdict, OracleError>;

    /// Bounded fallback: answer the question directly from the
    /// user's profile data instead of forcing a taxonomy label.
    fn direct_answer(&self, question: &str, profile_json: &str) -> Result<String, OracleError>;
}

/// Oracle backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// HTTP oracle implementation.
pub struct HttpOracle {
    config: OracleConfig,
    client: reqwest::blocking::Client,
}

impl HttpOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleError::Http(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn is_ollama_endpoint(&self) -> bool {
        self.config.endpoint.contains("11434") || self.config.endpoint.contains("ollama")
    }

    /// Send a prompt and parse the JSON object the model returns.
    fn call_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<serde_json::Value, OracleError> {
        if !self.config.enabled {
            return Err(OracleError::Disabled);
        }

        if self.is_ollama_endpoint() {
            match self.call_ollama(&format!("{system_prompt}\n\n{user_prompt}")) {
                Ok(json) => return Ok(json),
                Err(e) => {
                    debug!("Ollama API failed, trying OpenAI-compatible: {e}");
                }
            }
        }

        self.call_openai_compatible(system_prompt, user_prompt)
    }

    fn call_ollama(&self, prompt: &str) -> Result<serde_json::Value, OracleError> {
        let url = format!("{}/api/generate", self.config.endpoint);
        let request_body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "format": "json",
        });

        let response = self
            .client
            .post(&url)
            .json(&request_body)
            .send()
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(OracleError::Http(format!("HTTP {} from Ollama", response.status())));
        }

        let response_json: serde_json::Value = response
            .json()
            .map_err(|e| OracleError::InvalidJson(format!("failed to parse response: {e}")))?;

        let text = response_json
            .get("response")
            .and_then(|v| v.as_str())
            .ok_or(OracleError::Empty)?;

        serde_json::from_str(text)
            .map_err(|e| OracleError::InvalidJson(format!("model output is not valid JSON: {e}")))
    }

    fn call_openai_compatible(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<serde_json::Value, OracleError> {
        let url = format!("{}/v1/chat/completions", self.config.endpoint);
        let request_body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "response_format": {"type": "json_object"},
        });

        let mut request = self.client.post(&url).json(&request_body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(OracleError::Http(format!(
                "HTTP {} from OpenAI-compatible API",
                response.status()
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .map_err(|e| OracleError::InvalidJson(format!("failed to parse response: {e}")))?;

        let text = response_json
            .get("choices")
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("message"))
            .and_then(|v| v.get("content"))
            .and_then(|v| v.as_str())
            .ok_or(OracleError::Empty)?;

        serde_json::from_str(text)
            .map_err(|e| OracleError::InvalidJson(format!("model output is not valid JSON: {e}")))
    }

    fn transport_error(&self, e: reqwest::Error) -> OracleError {
        if e.is_timeout() {
            OracleError::Timeout(self.config.timeout_secs)
        } else {
            OracleError::Http(format!("request failed: {e}"))
        }
    }
}

const NONE_TOKEN: &str = "none_of_the_above";

impl Oracle for HttpOracle {
    fn verify(&self, type_description: &str, evidence: &str) -> Result<bool, OracleError> {
        let system = "You verify form-field classifications. \
                      Answer with JSON: {\"answer\": \"yes\"} or {\"answer\": \"no\"}.";
        let user = format!(
            "Field evidence:\n{evidence}\n\nIs this field asking for {type_description}?"
        );
        let json = self.call_json(system, &user)?;
        let answer = json
            .get("answer")
            .and_then(|v| v.as_str())
            .ok_or(OracleError::Empty)?;
        Ok(answer.eq_ignore_ascii_case("yes"))
    }

    fn classify(
        &self,
        evidence: &str,
        taxonomy: &[FieldType],
        page: Option<&PageHint>,
    ) -> Result<TaxonomyVerdict, OracleError> {
        let tokens: Vec<&str> = taxonomy.iter().map(|t| t.as_str()).collect();
        let system = format!(
            "You classify job-application form fields. Respond with JSON: \
             {{\"field_type\": \"<token>\"}} where <token> is one of: {} or \"{}\".",
            tokens.join(", "),
            NONE_TOKEN
        );

        let mut user = format!("Field evidence:\n{evidence}\n");
        if let Some(page) = page {
            user.push_str(&format!(
                "\nThis page has {} fields with this same label. The questions, in page order:\n",
                page.total
            ));
            for (i, q) in page.questions.iter().enumerate() {
                user.push_str(&format!("{}. {}\n", i + 1, q));
            }
            user.push_str(&format!(
                "This field is number {} of {}. Classify this field only.\n",
                page.position, page.total
            ));
        }

        let json = self.call_json(&system, &user)?;
        let token = json
            .get("field_type")
            .and_then(|v| v.as_str())
            .ok_or(OracleError::Empty)?;

        if token.eq_ignore_ascii_case(NONE_TOKEN) {
            return Ok(TaxonomyVerdict::NoneOfTheAbove);
        }
        match FieldType::parse(token) {
            Some(t) if taxonomy.contains(&t) => Ok(TaxonomyVerdict::Type(t)),
            _ => Ok(TaxonomyVerdict::OutOfTaxonomy(token.to_string())),
        }
    }

    fn direct_answer(&self, question: &str, profile_json: &str) -> Result<String, OracleError> {
        let system = "You fill job-application forms from the applicant's profile. \
                      Respond with JSON: {\"answer\": \"<the value to type>\"}.";
        let user = format!("Applicant profile:\n{profile_json}\n\nQuestion:\n{question}");
        let json = self.call_json(system, &user)?;
        json.get("answer")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .filter(|s| !s.trim().is_empty())
            .ok_or(OracleError::Empty)
    }
}

// ============================================================================
// Scripted oracle for tests
// ============================================================================

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Test oracle with pre-scripted responses and call counters.
pub struct ScriptedOracle {
    verify_responses: Mutex<Vec<Result<bool, OracleError>>>,
    classify_responses: Mutex<Vec<Result<TaxonomyVerdict, OracleError>>>,
    direct_responses: Mutex<Vec<Result<String, OracleError>>>,
    verify_calls: AtomicUsize,
    classify_calls: AtomicUsize,
    direct_calls: AtomicUsize,
    /// Captured user-visible context of the last classify call.
    last_classify_prompt: Mutex<String>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self {
            verify_responses: Mutex::new(Vec::new()),
            classify_responses: Mutex::new(Vec::new()),
            direct_responses: Mutex::new(Vec::new()),
            verify_calls: AtomicUsize::new(0),
            classify_calls: AtomicUsize::new(0),
            direct_calls: AtomicUsize::new(0),
            last_classify_prompt: Mutex::new(String::new()),
        }
    }

    pub fn with_verify(self, response: Result<bool, OracleError>) -> Self {
        self.verify_responses.lock().unwrap().push(response);
        self
    }

    pub fn with_classify(self, response: Result<TaxonomyVerdict, OracleError>) -> Self {
        self.classify_responses.lock().unwrap().push(response);
        self
    }

    pub fn with_direct(self, response: Result<String, OracleError>) -> Self {
        self.direct_responses.lock().unwrap().push(response);
        self
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn classify_calls(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }

    pub fn direct_calls(&self) -> usize {
        self.direct_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.verify_calls() + self.classify_calls() + self.direct_calls()
    }

    pub fn last_classify_prompt(&self) -> String {
        self.last_classify_prompt.lock().unwrap().clone()
    }

    fn next<T: Clone>(queue: &Mutex<Vec<Result<T, OracleError>>>) -> Result<T, OracleError> {
        let mut responses = queue.lock().unwrap();
        if responses.is_empty() {
            return Err(OracleError::Empty);
        }
        if responses.len() == 1 {
            responses[0].clone()
        } else {
            responses.remove(0)
        }
    }
}

impl Default for ScriptedOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl Oracle for ScriptedOracle {
    fn verify(&self, _type_description: &str, _evidence: &str) -> Result<bool, OracleError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Self::next(&self.verify_responses)
    }

    fn classify(
        &self,
        evidence: &str,
        _taxonomy: &[FieldType],
        page: Option<&PageHint>,
    ) -> Result<TaxonomyVerdict, OracleError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        let mut prompt = evidence.to_string();
        if let Some(page) = page {
            prompt.push_str(&format!(
                "\n[page: position {} of {}: {}]",
                page.position,
                page.total,
                page.questions.join(" | ")
            ));
        }
        *self.last_classify_prompt.lock().unwrap() = prompt;
        Self::next(&self.classify_responses)
    }

    fn direct_answer(&self, _question: &str, _profile_json: &str) -> Result<String, OracleError> {
        self.direct_calls.fetch_add(1, Ordering::SeqCst);
        Self::next(&self.direct_responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_config_default() {
        let config = OracleConfig::default();
        assert!(config.enabled);
        assert_eq!(config.endpoint, "http://localhost:11434");
        assert!(config.api_key.is_none());
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_scripted_oracle_counts_calls() {
        let oracle = ScriptedOracle::new()
            .with_verify(Ok(true))
            .with_classify(Ok(TaxonomyVerdict::Type(FieldType::Email)));

        assert!(oracle.verify("x", "y").unwrap());
        assert_eq!(
            oracle.classify("y", FieldType::ALL, None).unwrap(),
            TaxonomyVerdict::Type(FieldType::Email)
        );
        assert_eq!(oracle.verify_calls(), 1);
        assert_eq!(oracle.classify_calls(), 1);
        assert_eq!(oracle.total_calls(), 2);
    }

    #[test]
    fn test_scripted_oracle_repeats_last_response() {
        let oracle = ScriptedOracle::new().with_verify(Ok(false));
        assert!(!oracle.verify("x", "y").unwrap());
        assert!(!oracle.verify("x", "y").unwrap());
        assert_eq!(oracle.verify_calls(), 2);
    }

    #[test]
    fn test_scripted_oracle_empty_script_errors() {
        let oracle = ScriptedOracle::new();
        assert!(matches!(oracle.verify("x", "y"), Err(OracleError::Empty)));
    }

    #[test]
    fn test_scripted_oracle_captures_page_hint() {
        let oracle = ScriptedOracle::new()
            .with_classify(Ok(TaxonomyVerdict::Type(FieldType::VisaSponsorship)));
        let page = PageHint {
            questions: vec![
                "Are you a US Citizen?".to_string(),
                "Do you require sponsorship?".to_string(),
            ],
            position: 2,
            total: 2,
        };
        oracle.classify("Select One", FieldType::ALL, Some(&page)).unwrap();
        let prompt = oracle.last_classify_prompt();
        assert!(prompt.contains("position 2 of 2"));
        assert!(prompt.contains("US Citizen"));
        assert!(prompt.contains("sponsorship"));
    }
}
