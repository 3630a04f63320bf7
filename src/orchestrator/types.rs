//! Request and result types for the orchestrator.

use crate::provider::{ChatTurn, ProviderError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// Business division the caller is talking to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Division {
    Lending,
    Investment,
    RealEstate,
    #[default]
    None,
}

impl Division {
    pub fn as_str(&self) -> &'static str {
        match self {
            Division::Lending => "lending",
            Division::Investment => "investment",
            Division::RealEstate => "real_estate",
            Division::None => "none",
        }
    }
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Division {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "lending" => Ok(Division::Lending),
            "investment" => Ok(Division::Investment),
            "real_estate" | "realestate" => Ok(Division::RealEstate),
            "none" | "" => Ok(Division::None),
            other => Err(format!("unknown division: {}", other)),
        }
    }
}

/// Per-request context used only to select prompt text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    #[serde(default)]
    pub division: Division,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

impl CallContext {
    pub fn new(division: Division) -> Self {
        Self {
            division,
            ..Self::default()
        }
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub context: CallContext,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            context: CallContext::default(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }
}

/// Which branch of the fallback chain produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Primary,
    Fallback,
    Degraded,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResponseSource::Primary => "primary",
            ResponseSource::Fallback => "fallback",
            ResponseSource::Degraded => "degraded",
        };
        f.write_str(s)
    }
}

/// Answer returned by `Orchestrator::chat`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResult {
    pub response_text: String,
    pub suggested_actions: BTreeSet<String>,
    pub next_steps: Vec<String>,
    /// In `[0, 1]`; exactly 0 for degraded responses
    pub confidence: f64,
    pub source: ResponseSource,
}

/// Action attached to every degraded response.
pub const ESCALATION_ACTION: &str = "contact_human";

impl ChatResult {
    /// Fixed response used when every provider failed.
    pub fn degraded(contact: &str) -> Self {
        Self {
            response_text: format!(
                "I'm sorry, I'm having trouble answering right now. \
                 Please reach out to {} and a member of our team will help you directly.",
                contact
            ),
            suggested_actions: BTreeSet::from([ESCALATION_ACTION.to_string()]),
            next_steps: vec![format!("Contact {}", contact)],
            confidence: 0.0,
            source: ResponseSource::Degraded,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.source == ResponseSource::Degraded
    }
}

/// Caller's hint about what a document is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    BankStatement,
    PayStub,
    TaxReturn,
    Identification,
    PropertyAppraisal,
    #[default]
    Other,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::BankStatement => "bank_statement",
            DocumentKind::PayStub => "pay_stub",
            DocumentKind::TaxReturn => "tax_return",
            DocumentKind::Identification => "identification",
            DocumentKind::PropertyAppraisal => "property_appraisal",
            DocumentKind::Other => "other",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "bank_statement" => Ok(DocumentKind::BankStatement),
            "pay_stub" | "paystub" => Ok(DocumentKind::PayStub),
            "tax_return" => Ok(DocumentKind::TaxReturn),
            "identification" | "id" => Ok(DocumentKind::Identification),
            "property_appraisal" | "appraisal" => Ok(DocumentKind::PropertyAppraisal),
            "other" => Ok(DocumentKind::Other),
            other => Err(format!("unknown document kind: {}", other)),
        }
    }
}

/// Fields extracted from a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentAnalysis {
    pub extracted_fields: HashMap<String, serde_json::Value>,
    pub confidence: f64,
    pub warnings: Vec<String>,
    pub source: ResponseSource,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChatResult {
    response_text: String,
    suggested_actions: Vec<String>,
    next_steps: Vec<String>,
    confidence: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocumentAnalysis {
    extracted_fields: HashMap<String, serde_json::Value>,
    confidence: f64,
    #[serde(default)]
    warnings: Vec<String>,
}

/// Remove one surrounding Markdown code fence, if present.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}

fn check_confidence(confidence: f64) -> Result<f64, ProviderError> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(confidence)
    } else {
        Err(ProviderError::Parse(format!(
            "confidence {} outside [0, 1]",
            confidence
        )))
    }
}

/// Decode provider output into a `ChatResult`.
///
/// ```
/// use concierge::orchestrator::{parse_chat_result, ResponseSource};
///
/// let text = r#"{"responseText":"Hi","suggestedActions":["apply"],"nextSteps":[],"confidence":0.9}"#;
/// let result = parse_chat_result(text, ResponseSource::Primary).unwrap();
/// assert_eq!(result.response_text, "Hi");
/// assert!(parse_chat_result("Hi there", ResponseSource::Primary).is_err());
/// ```
pub fn parse_chat_result(text: &str, source: ResponseSource) -> Result<ChatResult, ProviderError> {
    let raw: RawChatResult = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| ProviderError::Parse(format!("invalid chat response: {}", e)))?;

    Ok(ChatResult {
        response_text: raw.response_text,
        suggested_actions: raw.suggested_actions.into_iter().collect(),
        next_steps: raw.next_steps,
        confidence: check_confidence(raw.confidence)?,
        source,
    })
}

/// Decode provider output into a `DocumentAnalysis`.
pub fn parse_document_analysis(
    text: &str,
    source: ResponseSource,
) -> Result<DocumentAnalysis, ProviderError> {
    let raw: RawDocumentAnalysis = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| ProviderError::Parse(format!("invalid document analysis: {}", e)))?;

    Ok(DocumentAnalysis {
        extracted_fields: raw.extracted_fields,
        confidence: check_confidence(raw.confidence)?,
        warnings: raw.warnings,
        source,
    })
}
