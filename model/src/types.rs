use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Constrains the shape of the model's reply.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Free-form text
    Text,
    /// The reply must be a single JSON document
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub format: ResponseFormat,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            format: ResponseFormat::Text,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_json_format(mut self) -> Self {
        self.format = ResponseFormat::Json;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    pub usage: Option<Usage>,
}

impl ChatResponse {
    pub fn content(&self) -> &str {
        &self.message.content
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub modified_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let sys_msg = ChatMessage::system("You are a test engineer");
        assert_eq!(sys_msg.role, MessageRole::System);
        assert_eq!(sys_msg.content, "You are a test engineer");

        let user_msg = ChatMessage::user("Analyze this table");
        assert_eq!(user_msg.role, MessageRole::User);
        assert_eq!(user_msg.role.as_str(), "user");
    }

    #[test]
    fn test_chat_request_builder() {
        let request = ChatRequest::new("phi3:latest", vec![ChatMessage::user("Hello")])
            .with_json_format()
            .with_temperature(0.3)
            .with_max_tokens(512);

        assert_eq!(request.model, "phi3:latest");
        assert_eq!(request.format, ResponseFormat::Json);
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.max_tokens, Some(512));
    }

    #[test]
    fn test_request_defaults_to_text() {
        let request = ChatRequest::new("phi3:latest", vec![]);
        assert_eq!(request.format, ResponseFormat::Text);
        assert!(request.temperature.is_none());
    }

    #[test]
    fn test_format_serialization() {
        assert_eq!(
            serde_json::to_string(&ResponseFormat::Json).unwrap(),
            "\"json\""
        );
        let message: ChatMessage =
            serde_json::from_str(r#"{"role":"assistant","content":"{}"}"#).unwrap();
        assert_eq!(message, ChatMessage::assistant("{}"));
    }
}
