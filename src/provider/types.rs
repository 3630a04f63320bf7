//! Supporting types for provider operations.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Speaker of a prior conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One prior message in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Raw text returned by a completion call, with usage when the provider reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Assistant text, expected to hold the structured JSON payload.
    pub text: String,
    /// Model that actually served the request.
    pub model: String,
    /// Total tokens billed for the call.
    pub tokens: Option<u32>,
}

/// Embedding vector with the model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub model: String,
    pub tokens: Option<u32>,
}

/// Reference to an uploaded document the provider can fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Fetchable URL (signed storage URL or data URL).
    pub url: String,
    /// MIME type when known, e.g. "application/pdf" or "image/png".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl DocumentRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// PDFs go through the document path; everything else is treated as an image.
    pub fn is_pdf(&self) -> bool {
        match &self.mime_type {
            Some(mime) => mime.eq_ignore_ascii_case("application/pdf"),
            None => {
                let url = self.url.to_lowercase();
                url.ends_with(".pdf") || url.starts_with("data:application/pdf")
            }
        }
    }
}

/// Per-operation request ceilings for one provider.
///
/// Completions get a longer ceiling than embeddings; document analysis gets the
/// longest because the provider has to fetch and read the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderTimeouts {
    pub completion: Duration,
    pub embedding: Duration,
    pub document: Duration,
}

impl Default for ProviderTimeouts {
    fn default() -> Self {
        Self {
            completion: Duration::from_secs(30),
            embedding: Duration::from_secs(10),
            document: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        let role: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, Role::User);
    }

    #[test]
    fn test_document_pdf_detection() {
        assert!(DocumentRef::new("https://files/statement.PDF").is_pdf());
        assert!(DocumentRef::new("https://files/blob")
            .with_mime_type("application/pdf")
            .is_pdf());
        assert!(!DocumentRef::new("https://files/paystub.png").is_pdf());
        assert!(DocumentRef::new("data:application/pdf;base64,JVBERi0=").is_pdf());
        assert!(!DocumentRef::new("https://files/scan.pdf")
            .with_mime_type("image/jpeg")
            .is_pdf());
    }
}
