//! LLM feedback on paragraph summaries.
//!
//! [`build_prompt`] renders the fixed evaluation prompt for a note;
//! a [`FeedbackProvider`] sends it to a chat-completion service and returns
//! the reply verbatim. Failures are reported once and never retried.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::LlmConfig;
use crate::credentials::CredentialStore;
use crate::error::{ReaderError, Result};

const SYSTEM_MESSAGE: &str = "You are a helpful AI assistant.";

/// Which summarization rule applies at a paragraph position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryRule {
    /// Positions 1 and 2: one sentence for the paragraph.
    OneSentence,
    /// Position 3 onward: one sentence for everything before, one for the latest paragraph.
    TwoSentence,
}

impl SummaryRule {
    pub fn for_position(position: i64) -> Self {
        if position <= 2 {
            SummaryRule::OneSentence
        } else {
            SummaryRule::TwoSentence
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            SummaryRule::OneSentence => {
                "This is the first or second paragraph: the summary must be exactly one sentence \
                 capturing the main idea of this paragraph."
            }
            SummaryRule::TwoSentence => {
                "This is the third paragraph or later: the summary must be two sentences. \
                 The first sentence covers the main theme of all prior paragraphs; the second \
                 captures the main idea of the most recent paragraph."
            }
        }
    }
}

/// Render the evaluation prompt for a note on the paragraph at `position` (1-based).
pub fn build_prompt(context: &str, note_content: &str, position: i64) -> String {
    let rule = SummaryRule::for_position(position);
    format!(
        r#"## Feedback on Summaries (Notes)

## Introduction

- **YOU ARE** a **TEXT SUMMARIZATION SPECIALIST** with expertise in evaluating written summaries based on structured summarization techniques.

## Task Description

- **YOUR TASK** is to **EVALUATE** a written summary against the context provided, focusing on its adherence to a specific summarization technique and limitations.

## Summarization Technique Description

- **SUMMARIZATION TECHNIQUE** works as follows:
  1. **If it is the First or Second Paragraph:** Summarize each paragraph individually in one sentence.
      - Focus only on the main idea of the respective paragraph.
  2. **If it is the Third Paragraph or Later:** Use two sentences to summarize:
      - The first sentence summarizes the main theme of all prior paragraphs.
      - The second sentence captures the main idea of the most recent paragraph.

- **IMPORTANT:** Only one of these approaches is used at a time, depending on the paragraph number being summarized.
- **CURRENT PARAGRAPH:** Paragraph {position}. {instruction}
- **CONTENT LIMITATIONS:** Use only the provided context; avoid external knowledge or additional details.
- **CONSTRAINT:** Summaries are limited to a maximum of two sentences, or one sentence per paragraph. Many paragraphs must be condensed into one sentence, so a lot of information is left out; feedback should reflect this trade-off in completeness.

## Input Variables

- **Context of the Text:** ```{context}```
- **Provided Summary for Evaluation:** ```{note}```

## Evaluation Criteria

- **EVALUATE** the provided summary on the following:
  1. **Completeness:** Have the main key points been captured within the sentence constraint?
      - Acknowledge the impact of the sentence limitation on completeness.
      - Ensure the summary focuses on the core theme or common thread of the text without unnecessary detail.
  2. **Clarity:** Is the summary easy to understand and clearly written?
      - The language should be concise and unambiguous.
  3. **Structure:** Does the summary align with the described summarization technique?
      - Give feedback if there are more or fewer sentences than expected.

## Feedback Instructions

- **PROVIDE** concise, constructive feedback for each criterion in Markdown format:
## 1. Completeness
[Your evaluation]
- Identify the core theme or common thread that unifies the paragraphs across the text.
- Consider whether the sentence limit has led to key omissions.

## 2. Clarity
[Your evaluation]
- Comment on readability and understandability.

## 3. Structure
[Your evaluation]
- Give feedback if there are more or fewer sentences than expected.
- First or Second Paragraph: Check that the paragraph is summarized in one sentence.
- Third Paragraph or Later: Ensure the two-sentence structure is followed.

## 4. Suggestions for Improvement
[Your suggestions]
- Offer actionable and specific tips for improvement while considering the constraints.
- Provide an optimal summary for this paragraph that is short and without unnecessary details.
"#,
        position = position,
        instruction = rule.instruction(),
        context = context,
        note = note_content,
    )
}

#[async_trait]
pub trait FeedbackProvider: Send + Sync {
    /// Model identifier used in logs.
    fn model_name(&self) -> &str;

    /// Send a fully formed prompt and return the generated text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

// ============ OpenAI ============

/// Chat-completions client for OpenAI-compatible APIs.
pub struct OpenAiFeedback {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    credentials: CredentialStore,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    n: u32,
}

impl OpenAiFeedback {
    pub fn new(config: &LlmConfig, credentials: CredentialStore) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            credentials,
        })
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{}/chat/completions", base)
        }
    }
}

#[async_trait]
impl FeedbackProvider for OpenAiFeedback {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let api_key = self.credentials.llm_key()?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_MESSAGE,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            n: 1,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ReaderError::Service(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response.json().await?;
        debug!(model = %self.model, "chat completion received");
        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content`, trimmed.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    let content = json["choices"]
        .get(0)
        .and_then(|c| c["message"]["content"].as_str())
        .ok_or_else(|| {
            ReaderError::Service("Invalid OpenAI response: missing message content".to_string())
        })?;
    let feedback = content.trim().to_string();
    info!(chars = feedback.len(), "feedback generated");
    Ok(feedback)
}
