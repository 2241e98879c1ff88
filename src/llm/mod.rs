mod openai;

pub use openai::{LlmConfig, LlmError, LlmMessage, OpenAiClient};

use crate::models::ConversationTurn;
use async_trait::async_trait;

/// Text-completion oracle: takes the full transcript, returns the raw text
/// of the top choice.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn complete(&self, transcript: &[ConversationTurn]) -> Result<String, LlmError>;
}

#[async_trait]
impl CompletionGateway for OpenAiClient {
    async fn complete(&self, transcript: &[ConversationTurn]) -> Result<String, LlmError> {
        let messages: Vec<LlmMessage> = transcript.iter().map(LlmMessage::from).collect();
        let response = self.chat(&messages).await?;
        Ok(response.text)
    }
}
