//! System prompt assembly.
//!
//! [`PromptBuilder::build`] is deterministic and side-effect free. Snippet
//! retrieval happens before it is called; an empty snippet slice simply
//! omits the knowledge block.

use crate::config::KnowledgeConfig;
use crate::knowledge::KnowledgeSnippet;
use crate::orchestrator::{CallContext, Division, DocumentKind};
use std::borrow::Cow;
use std::fmt::Write;

const BASE_INSTRUCTIONS: &str = "\
You are the virtual concierge for a brokerage offering lending, investment and real estate services.
Answer clearly and accurately. Never invent rates, approvals or guarantees; offer to connect the client with an advisor instead.

Respond with a single JSON object and nothing else:
{
  \"responseText\": string,
  \"suggestedActions\": [string],
  \"nextSteps\": [string],
  \"confidence\": number between 0 and 1
}";

const LENDING_ADDENDUM: &str = "\
Division: lending.
Help with purchase and refinance loans, qualification requirements and required documents. \
Suggested actions may include \"start_application\", \"upload_documents\" and \"schedule_call\".";

const INVESTMENT_ADDENDUM: &str = "\
Division: investment.
Discuss account types and the advisory process in general terms. Do not give personalized investment advice. \
Suggested actions may include \"book_consultation\" and \"request_prospectus\".";

const REAL_ESTATE_ADDENDUM: &str = "\
Division: real estate.
Help buyers and sellers with listings, showings, market questions and the transaction timeline. \
Suggested actions may include \"schedule_showing\" and \"request_valuation\".";

const GENERAL_ADDENDUM: &str = "\
No division selected.
Find out which service the client needs and route them to lending, investment or real estate.";

const ADMIN_ADDENDUM: &str = "\
Admin mode: the user is a staff member. You may reference internal pipeline stages and workflow details, \
and be more concise.";

const ELLIPSIS: char = '…';

/// Cut `text` to at most `max_chars` characters, appending an ellipsis when cut.
///
/// Always splits on a char boundary.
///
/// ```
/// use concierge::prompt::truncate_chars;
///
/// assert_eq!(truncate_chars("héllo wörld", 5), "héllo…");
/// assert_eq!(truncate_chars("short", 10), "short");
/// ```
pub fn truncate_chars(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        None => Cow::Borrowed(text),
        Some((byte_idx, _)) => {
            let mut out = String::with_capacity(byte_idx + ELLIPSIS.len_utf8());
            out.push_str(&text[..byte_idx]);
            out.push(ELLIPSIS);
            Cow::Owned(out)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBuilder {
    max_snippets: usize,
    max_snippet_chars: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::from(&KnowledgeConfig::default())
    }
}

impl From<&KnowledgeConfig> for PromptBuilder {
    fn from(config: &KnowledgeConfig) -> Self {
        Self::new(config.max_snippets, config.max_snippet_chars)
    }
}

impl PromptBuilder {
    pub fn new(max_snippets: usize, max_snippet_chars: usize) -> Self {
        Self {
            max_snippets,
            max_snippet_chars,
        }
    }

    /// Build the chat system prompt for `context`.
    pub fn build(&self, context: &CallContext, snippets: &[KnowledgeSnippet]) -> String {
        let mut prompt = String::from(BASE_INSTRUCTIONS);

        prompt.push_str("\n\n");
        prompt.push_str(match context.division {
            Division::Lending => LENDING_ADDENDUM,
            Division::Investment => INVESTMENT_ADDENDUM,
            Division::RealEstate => REAL_ESTATE_ADDENDUM,
            Division::None => GENERAL_ADDENDUM,
        });

        if let Some(stage) = context.stage.as_deref().filter(|s| !s.trim().is_empty()) {
            let _ = write!(
                prompt,
                "\n\nConversation stage: {}. Tailor next steps to this stage.",
                stage.trim()
            );
        }

        if context.is_admin {
            prompt.push_str("\n\n");
            prompt.push_str(ADMIN_ADDENDUM);
        }

        let rendered: Vec<&KnowledgeSnippet> = snippets.iter().take(self.max_snippets).collect();
        if !rendered.is_empty() {
            prompt.push_str("\n\nRelevant knowledge base excerpts (use when helpful, do not quote verbatim):");
            for (i, snippet) in rendered.iter().enumerate() {
                let _ = write!(
                    prompt,
                    "\n[{}] {}\n{}",
                    i + 1,
                    snippet.title,
                    truncate_chars(&snippet.excerpt, self.max_snippet_chars)
                );
            }
        }

        prompt
    }

    /// Build the system prompt for document extraction.
    pub fn build_document_prompt(&self, kind: DocumentKind) -> String {
        let fields: &[&str] = match kind {
            DocumentKind::BankStatement => &[
                "accountHolder",
                "institution",
                "statementPeriod",
                "endingBalance",
                "averageBalance",
                "largeDeposits",
            ],
            DocumentKind::PayStub => &[
                "employeeName",
                "employer",
                "payPeriod",
                "grossPay",
                "netPay",
                "yearToDateGross",
            ],
            DocumentKind::TaxReturn => &[
                "taxpayerName",
                "taxYear",
                "filingStatus",
                "adjustedGrossIncome",
                "totalTax",
            ],
            DocumentKind::Identification => &[
                "fullName",
                "dateOfBirth",
                "documentNumber",
                "expirationDate",
                "issuingAuthority",
            ],
            DocumentKind::PropertyAppraisal => &[
                "propertyAddress",
                "appraisedValue",
                "effectiveDate",
                "appraiserName",
                "propertyType",
            ],
            DocumentKind::Other => &["documentType", "parties", "dates", "amounts"],
        };

        let mut prompt = format!(
            "You extract structured data from client documents for a brokerage.\n\
             Document type hint: {}.\n\
             Extract these fields when present: {}.\n",
            kind,
            fields.join(", ")
        );
        prompt.push_str(
            "Use null for fields you cannot read. Add a warning for anything illegible, \
             inconsistent or possibly altered, and when the document does not match the type hint.\n\n\
             Respond with a single JSON object and nothing else:\n\
             {\n  \"extractedFields\": object,\n  \"confidence\": number between 0 and 1,\n  \"warnings\": [string]\n}",
        );
        prompt
    }
}
