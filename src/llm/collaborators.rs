//! [`Collaborators`] backed by a local Ollama model.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use crate::capabilities::{
    CodePayload, CollaboratorError, Collaborators, MetadataPayload, SummaryPayload,
    TechnicalPayload,
};
use crate::core::category::Category;
use crate::llm::Client;

const ANALYST_SYSTEM: &str = "You are an expert in Excel EUDA analysis and Python migration. \
Provide concise, actionable insights.";

const ENGINEER_SYSTEM: &str = "You are an expert in Python development. Generate \
well-structured, maintainable Python code that follows best practices.";

const CLASSIFIER_SYSTEM: &str = "You route questions about Excel End User Developed \
Applications (EUDAs). Reply with exactly one word and nothing else.";

const ANALYSIS_MAX_TOKENS: u32 = 1000;
const CODE_MAX_TOKENS: u32 = 4000;

static PYTHON_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```python[ \t]*\r?\n(.*?)```").ok());

/// Pulls every fenced python block out of a model reply, joined by a blank
/// line. Replies without a fenced block are returned whole.
pub fn extract_python_code(response: &str) -> String {
    let Some(re) = PYTHON_BLOCK.as_ref() else {
        return response.to_string();
    };

    let blocks: Vec<&str> = re
        .captures_iter(response)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    if blocks.is_empty() {
        response.to_string()
    } else {
        blocks.join("\n\n")
    }
}

fn classifier_prompt(query: &str) -> String {
    let labels: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
    format!(
        "Classify the question into one of: {}.\n\
         - metadata: ownership, purpose, sheets, usage or complexity of the workbook\n\
         - technical: formulas, VBA macros, data connections or internals\n\
         - both: needs descriptive and technical facts, such as an overall assessment\n\
         - code: asks for a Python replacement or migration code\n\n\
         Question: {}\n\nCategory:",
        labels.join(" | "),
        query
    )
}

/// Plays the analyst roles with one chat completion each.
pub struct LlmCollaborators {
    client: Client,
}

impl LlmCollaborators {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn ask(&self, system: &str, prompt: String, max_tokens: u32) -> Result<String, CollaboratorError> {
        let reply = self
            .client
            .complete()
            .system(system)
            .user(prompt)
            .max_tokens(max_tokens)
            .execute()
            .await
            .map_err(|e| {
                log::error!("LLM call failed: {}", e);
                CollaboratorError::from(e)
            })?;
        Ok(reply)
    }
}

#[async_trait]
impl Collaborators for LlmCollaborators {
    async fn fetch_metadata(&self, query: &str) -> Result<MetadataPayload, CollaboratorError> {
        let prompt = format!(
            "Describe the EUDA this question is about: what it appears to do, who uses it, \
             its sheets, its estimated complexity and why.\n\nQuestion: {}",
            query
        );
        let content = self.ask(ANALYST_SYSTEM, prompt, ANALYSIS_MAX_TOKENS).await?;
        Ok(MetadataPayload { content })
    }

    async fn fetch_technical(&self, query: &str) -> Result<TechnicalPayload, CollaboratorError> {
        let prompt = format!(
            "List the technical internals relevant to this question: key formulas, VBA \
             modules and what they do, and the data sources or connections involved.\n\n\
             Question: {}",
            query
        );
        let content = self.ask(ANALYST_SYSTEM, prompt, ANALYSIS_MAX_TOKENS).await?;
        Ok(TechnicalPayload { content })
    }

    async fn summarize(
        &self,
        metadata: &MetadataPayload,
        technical: &TechnicalPayload,
    ) -> Result<SummaryPayload, CollaboratorError> {
        let prompt = format!(
            "Using the findings below, provide:\n\
             1. A concise summary of what this EUDA appears to be doing\n\
             2. The estimated complexity and why\n\
             3. Key data sources identified\n\
             4. A high-level recommendation on whether it could be migrated to a Python application\n\n\
             # Metadata\n{}\n\n# Technical details\n{}",
            metadata.content, technical.content
        );
        let summary = self.ask(ANALYST_SYSTEM, prompt, ANALYSIS_MAX_TOKENS).await?;
        Ok(SummaryPayload { summary })
    }

    async fn generate_code(
        &self,
        technical: &TechnicalPayload,
        query: &str,
    ) -> Result<CodePayload, CollaboratorError> {
        let prompt = format!(
            "Generate a Python application that replicates the functionality described \
             below.\nUse pandas for data manipulation and include proper error handling.\n\
             If database connections are required, use SQLAlchemy.\n\
             Include clear comments and organize the code using classes and functions.\n\n\
             # Request\n{}\n\n# Technical details\n{}\n\nProvide complete, working code.",
            query, technical.content
        );
        let reply = self.ask(ENGINEER_SYSTEM, prompt, CODE_MAX_TOKENS).await?;
        Ok(CodePayload {
            language: "python".to_string(),
            code: extract_python_code(&reply),
        })
    }

    async fn classify_intent(&self, query: &str) -> Result<String, CollaboratorError> {
        self.ask(CLASSIFIER_SYSTEM, classifier_prompt(query), 8).await
    }
}
