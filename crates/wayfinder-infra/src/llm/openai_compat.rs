//! Chat completions against any OpenAI-compatible endpoint, through
//! [`async_openai`]. The base URL and model come from `[generation]`.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest, FinishReason,
};
use secrecy::{ExposeSecret, SecretString};

use wayfinder_core::llm::provider::LlmProvider;
use wayfinder_types::config::GenerationConfig;
use wayfinder_types::llm::{
    CompletionRequest, CompletionResponse, Finish, LlmError, Message, MessageRole, TokenUsage,
};

const PROVIDER_NAME: &str = "openai";

/// Not `Debug`: the client carries the API key.
pub struct OpenAiCompatibleProvider {
    client: Client<OpenAIConfig>,
    default_model: String,
}

impl OpenAiCompatibleProvider {
    pub fn from_config(config: &GenerationConfig, api_key: &SecretString) -> Self {
        let client_config = OpenAIConfig::new()
            .with_api_key(api_key.expose_secret())
            .with_api_base(&config.base_url);
        Self {
            client: Client::with_config(client_config),
            default_model: config.model.clone(),
        }
    }

    fn chat_request(&self, request: &CompletionRequest) -> CreateChatCompletionRequest {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };
        CreateChatCompletionRequest {
            model,
            messages: request.messages.iter().map(prompt_message).collect(),
            max_completion_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature as f32),
            ..Default::default()
        }
    }
}

fn prompt_message(message: &Message) -> ChatCompletionRequestMessage {
    let text = message.content.clone();
    match message.role {
        MessageRole::System => ChatCompletionRequestSystemMessage {
            content: ChatCompletionRequestSystemMessageContent::Text(text),
            name: None,
        }
        .into(),
        MessageRole::User => ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(text),
            name: None,
        }
        .into(),
        #[allow(deprecated)]
        MessageRole::Assistant => ChatCompletionRequestAssistantMessage {
            content: Some(ChatCompletionRequestAssistantMessageContent::Text(text)),
            refusal: None,
            name: None,
            audio: None,
            tool_calls: None,
            function_call: None,
        }
        .into(),
    }
}

fn finish_of(reason: Option<&FinishReason>) -> Finish {
    match reason {
        Some(FinishReason::Length) => Finish::Truncated,
        Some(FinishReason::ContentFilter) => Finish::Filtered,
        _ => Finish::Complete,
    }
}

impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let response = self
            .client
            .chat()
            .create(self.chat_request(request))
            .await
            .map_err(classify_error)?;

        let choice = response.choices.first();
        let usage = response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: choice
                .and_then(|c| c.message.content.clone())
                .unwrap_or_default(),
            model: response.model,
            finish: finish_of(choice.and_then(|c| c.finish_reason.as_ref())),
            usage,
        })
    }
}

/// Match on the API error code first, then on the HTTP status.
fn classify_error(err: OpenAIError) -> LlmError {
    match &err {
        OpenAIError::ApiError(api) => {
            let code = api.code.as_deref().or(api.r#type.as_deref()).unwrap_or_default();
            match code {
                "invalid_api_key" | "authentication_error" => LlmError::Unauthorized,
                "rate_limit_exceeded" | "rate_limit_error" | "insufficient_quota" => {
                    LlmError::RateLimited
                }
                "context_length_exceeded" => LlmError::ContextTooLong,
                _ => LlmError::Provider(api.message.clone()),
            }
        }
        OpenAIError::Reqwest(http) => match http.status().map(|s| s.as_u16()) {
            Some(401 | 403) => LlmError::Unauthorized,
            Some(429) => LlmError::RateLimited,
            _ => LlmError::Provider(err.to_string()),
        },
        OpenAIError::JSONDeserialize(_, body) => LlmError::InvalidResponse(body.clone()),
        _ => LlmError::Provider(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::from_config(
            &GenerationConfig::default(),
            &SecretString::from("sk-test".to_string()),
        )
    }

    #[test]
    fn test_empty_model_uses_configured_default() {
        let request = CompletionRequest {
            model: String::new(),
            messages: vec![
                Message::system("Answer using the Da Nang guide."),
                Message::user("Is Ba Na Hills worth it?"),
                Message::new(MessageRole::Assistant, "Yes, go early."),
            ],
            max_tokens: 1000,
            temperature: 0.7,
        };
        let chat = provider().chat_request(&request);
        assert_eq!(chat.model, "gpt-4o-mini");
        assert_eq!(chat.messages.len(), 3);
        assert!(matches!(chat.messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(chat.messages[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(chat.messages[2], ChatCompletionRequestMessage::Assistant(_)));
        assert_eq!(chat.max_completion_tokens, Some(1000));
        assert_eq!(chat.temperature, Some(0.7));
    }

    #[test]
    fn test_explicit_model_wins() {
        let request = CompletionRequest {
            model: "gpt-4o".to_string(),
            messages: vec![Message::user("hi")],
            max_tokens: 10,
            temperature: 0.0,
        };
        assert_eq!(provider().chat_request(&request).model, "gpt-4o");
        assert_eq!(provider().name(), "openai");
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(finish_of(Some(&FinishReason::Length)), Finish::Truncated);
        assert_eq!(finish_of(Some(&FinishReason::ContentFilter)), Finish::Filtered);
        assert_eq!(finish_of(Some(&FinishReason::Stop)), Finish::Complete);
        assert_eq!(finish_of(None), Finish::Complete);
    }

    #[test]
    fn test_invalid_argument_is_provider_error() {
        let err = classify_error(OpenAIError::InvalidArgument("bad".to_string()));
        assert!(matches!(err, LlmError::Provider(_)));
    }
}
