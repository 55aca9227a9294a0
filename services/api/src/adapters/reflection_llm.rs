//! services/api/src/adapters/reflection_llm.rs
//!
//! This module contains the adapter for the reflection LLM.
//! It implements the `ReflectionService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use verse_companion_core::domain::DailyVerse;
use verse_companion_core::ports::{PortError, PortResult, ReflectionService};

const SYSTEM_PROMPT: &str = "You are a helpful Bible study assistant. Provide insightful, \
respectful commentary that encourages deeper reflection.";

const USER_PROMPT_TEMPLATE: &str = r#"The user is reflecting on this Bible verse: "{verse_text}" ({verse_reference}). Here is their message: "{user_message}""#;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ReflectionService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiReflectionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiReflectionAdapter {
    /// Creates a new `OpenAiReflectionAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    fn build_prompt(verse: &DailyVerse, user_message: &str) -> String {
        USER_PROMPT_TEMPLATE
            .replace("{verse_text}", &verse.text)
            .replace("{verse_reference}", &verse.reference)
            .replace("{user_message}", user_message)
    }
}

//=========================================================================================
// `ReflectionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ReflectionService for OpenAiReflectionAdapter {
    /// Produces a single reflection reply to the user's message about
    /// today's verse.
    async fn reflect(&self, verse: &DailyVerse, user_message: &str) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(Self::build_prompt(verse, user_message))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.7)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        // Extract the text content from the first choice in the response.
        if let Some(choice) = response.choices.into_iter().next() {
            if let Some(content) = choice.message.content {
                Ok(content)
            } else {
                Err(PortError::Unexpected(
                    "Reflection LLM response contained no text content.".to_string(),
                ))
            }
        } else {
            Err(PortError::Unexpected(
                "Reflection LLM returned no choices in its response.".to_string(),
            ))
        }
    }
}
