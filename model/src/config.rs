use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection and sampling settings for a local Ollama service.
///
/// Analysis requests favour low temperatures so repeated runs over the same
/// datasheet yield comparable register records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "phi3:latest".to_string(),
            timeout: Duration::from_secs(120),
            temperature: 0.3,
            max_tokens: None,
        }
    }
}

impl OllamaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("Base URL cannot be empty".to_string());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("Base URL must start with http:// or https://".to_string());
        }

        if self.model.trim().is_empty() {
            return Err("Model name cannot be empty".to_string());
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err("Temperature must be between 0.0 and 2.0".to_string());
        }

        if self.max_tokens == Some(0) {
            return Err("Max tokens must be greater than 0".to_string());
        }

        if self.timeout.is_zero() {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OllamaConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:11434");
        assert_eq!(config.model, "phi3:latest");
        assert_eq!(config.temperature, 0.3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = OllamaConfig::new()
            .with_base_url("https://ollama.internal:8443")
            .with_model("llama3.2:3b")
            .with_temperature(0.1)
            .with_max_tokens(1024)
            .with_timeout(Duration::from_secs(60));

        assert_eq!(config.base_url, "https://ollama.internal:8443");
        assert_eq!(config.model, "llama3.2:3b");
        assert_eq!(config.temperature, 0.1);
        assert_eq!(config.max_tokens, Some(1024));
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = OllamaConfig::default();

        config.base_url = "".to_string();
        assert!(config.validate().is_err());

        config.base_url = "localhost:11434".to_string();
        assert!(config.validate().is_err());

        config.base_url = "http://127.0.0.1:11434".to_string();
        config.model = "  ".to_string();
        assert!(config.validate().is_err());

        config.model = "phi3:latest".to_string();
        config.temperature = 2.5;
        assert!(config.validate().is_err());

        config.temperature = 0.3;
        config.max_tokens = Some(0);
        assert!(config.validate().is_err());

        config.max_tokens = None;
        config.timeout = Duration::from_secs(0);
        assert!(config.validate().is_err());
    }
}
