//! Model-backed analyzer.

use super::{RegisterAnalyzer, TableInput};
use crate::analysis::{AnalysisError, RegisterAnalysis};
use async_trait::async_trait;
use model::{ChatMessage, ChatRequest, ModelProvider};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced JSON pattern is valid")
});

const SYSTEM_PROMPT: &str = "You are an expert embedded systems test engineer specializing \
in automotive MCU testing. You analyze register tables from datasheets and answer with a \
single JSON object.";

const OUTPUT_SHAPE: &str = r#"{
  "register_name": "extracted register name",
  "address": "register address or offset",
  "access_type": "RW/RO/WO",
  "reset_value": "default value",
  "test_scenarios": ["scenario 1", "scenario 2", "scenario 3"],
  "boundary_conditions": ["condition 1", "condition 2"],
  "notes": "any special considerations"
}"#;

/// Locate the JSON object inside a model reply.
///
/// A fenced ```` ```json ```` block wins; otherwise the text from the first
/// `{` to the last `}` is taken.
pub fn extract_json_object(text: &str) -> Option<&str> {
    if let Some(captures) = FENCED_JSON.captures(text) {
        return captures.get(1).map(|m| m.as_str());
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Turn a raw model reply into a validated analysis.
pub fn parse_analysis_response(text: &str) -> Result<RegisterAnalysis, AnalysisError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }

    let json = extract_json_object(text).ok_or_else(|| AnalysisError::MalformedResponse {
        reason: "no JSON object in response".to_string(),
    })?;

    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| AnalysisError::MalformedResponse {
            reason: format!("could not parse response JSON: {}", e),
        })?;

    RegisterAnalysis::from_value(&value)
}

pub struct LlmAnalyzer<P> {
    provider: P,
    model: String,
    temperature: f32,
    max_rows: usize,
}

impl<P: ModelProvider> LlmAnalyzer<P> {
    pub fn new(provider: P, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.3,
            max_rows: 5,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Number of table rows included in the prompt.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn build_request(&self, input: &TableInput) -> ChatRequest {
        let rows = input
            .rows
            .iter()
            .take(self.max_rows)
            .map(|row| format!("[{}]", row.join(" | ")))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Analyze this register table.\n\n\
             Table headers: {}\n\n\
             Table rows (first {} shown):\n{}\n\n\
             Context: {}\n\n\
             Identify the register name, address or offset, access permissions (RO, WO, RW), \
             reset value, reserved or unused bits, and 3-5 critical test scenarios.\n\n\
             Output format (JSON):\n{}\n\n\
             Only output valid JSON, no additional text.",
            input.headers.join(", "),
            self.max_rows,
            rows,
            input.context(),
            OUTPUT_SHAPE
        );

        ChatRequest::new(
            self.model.clone(),
            vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
        )
        .with_json_format()
        .with_temperature(self.temperature)
    }
}

#[async_trait]
impl<P: ModelProvider> RegisterAnalyzer for LlmAnalyzer<P> {
    async fn analyze(&self, input: &TableInput) -> Result<RegisterAnalysis, AnalysisError> {
        let request = self.build_request(input);
        debug!(
            "Sending {:?} table ({} rows) to {} model {}",
            input.kind,
            input.rows.len(),
            self.provider.provider_name(),
            self.model
        );

        let response = self.provider.chat(request).await?;
        if let Some(usage) = &response.usage {
            debug!("Model usage: {} tokens", usage.total_tokens);
        }

        parse_analysis_response(response.content()).inspect_err(|e| {
            warn!("Discarding model reply: {}", e);
        })
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AccessType;
    use model::{ChatResponse, ModelError, ModelInfo, ModelResult, ResponseFormat};
    use std::sync::Mutex;

    struct ScriptedProvider {
        reply: ModelResult<String>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedProvider {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing(error: ModelError) -> Self {
            Self {
                reply: Err(error),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        async fn chat(&self, request: ChatRequest) -> ModelResult<ChatResponse> {
            self.requests.lock().unwrap().push(request);
            match &self.reply {
                Ok(text) => Ok(ChatResponse {
                    message: ChatMessage::assistant(text.clone()),
                    usage: None,
                }),
                Err(ModelError::RateLimit) => Err(ModelError::RateLimit),
                Err(_) => Err(ModelError::ModelNotFound {
                    model: "phi3:latest".to_string(),
                }),
            }
        }

        async fn list_models(&self) -> ModelResult<Vec<ModelInfo>> {
            Ok(vec![])
        }

        async fn health_check(&self) -> ModelResult<()> {
            Ok(())
        }

        fn provider_name(&self) -> &'static str {
            "scripted"
        }
    }

    fn input() -> TableInput {
        TableInput::new(
            vec!["Register".to_string(), "Offset".to_string(), "Reset".to_string()],
            (0..8)
                .map(|i| vec![format!("REG{}", i), format!("0x{:02X}", i * 4), "0x00".to_string()])
                .collect(),
        )
    }

    #[test]
    fn test_extract_fenced_json() {
        let reply = "Here you go:\n```json\n{\"register_name\": \"CTRL1\"}\n```\nDone.";
        assert_eq!(extract_json_object(reply), Some("{\"register_name\": \"CTRL1\"}"));

        let bare = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json_object(bare), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_extract_braced_json() {
        let reply = "Analysis: {\"a\": {\"b\": 1}} hope this helps";
        assert_eq!(extract_json_object(reply), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn test_parse_response_errors() {
        assert!(matches!(
            parse_analysis_response("   "),
            Err(AnalysisError::EmptyResponse)
        ));
        assert!(matches!(
            parse_analysis_response("I cannot help with that"),
            Err(AnalysisError::MalformedResponse { .. })
        ));
        assert!(matches!(
            parse_analysis_response("{\"register_name\": }"),
            Err(AnalysisError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_build_request_limits_rows() {
        let analyzer = LlmAnalyzer::new(ScriptedProvider::replying("{}"), "phi3:latest")
            .with_max_rows(3)
            .with_temperature(0.1);
        let request = analyzer.build_request(&input());

        assert_eq!(request.model, "phi3:latest");
        assert_eq!(request.format, ResponseFormat::Json);
        assert_eq!(request.temperature, Some(0.1));
        assert_eq!(request.messages.len(), 2);

        let prompt = &request.messages[1].content;
        assert!(prompt.contains("Register, Offset, Reset"));
        assert!(prompt.contains("[REG2 | 0x08 | 0x00]"));
        assert!(!prompt.contains("REG3"));
        assert!(prompt.contains("register map table"));
    }

    #[tokio::test]
    async fn test_analyze_parses_reply() {
        let provider = ScriptedProvider::replying(
            r#"{"register_name": "CTRL1", "address": "0x20", "access_type": "RW",
                "reset_value": "0x00", "boundary_conditions": ["bit 7 reserved"]}"#,
        );
        let analyzer = LlmAnalyzer::new(provider, "phi3:latest");

        let analysis = analyzer.analyze(&input()).await.unwrap();
        assert_eq!(analysis.register_name(), "CTRL1");
        assert_eq!(analysis.access_type(), &AccessType::ReadWrite);
        assert_eq!(analysis.boundary_conditions().len(), 1);
        assert_eq!(analyzer.provider().requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_provider_errors_are_classified() {
        let analyzer = LlmAnalyzer::new(ScriptedProvider::failing(ModelError::RateLimit), "m");
        let error = analyzer.analyze(&input()).await.unwrap_err();
        assert!(error.is_retryable());

        let analyzer = LlmAnalyzer::new(
            ScriptedProvider::failing(ModelError::ModelNotFound {
                model: "m".to_string(),
            }),
            "m",
        );
        let error = analyzer.analyze(&input()).await.unwrap_err();
        assert!(matches!(error, AnalysisError::Provider(_)));
        assert!(!error.is_retryable());
    }
}
