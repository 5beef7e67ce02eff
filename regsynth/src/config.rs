//! Pipeline configuration file.
//!
//! Every section and key is optional:
//!
//! ```toml
//! [ollama]
//! base_url = "http://127.0.0.1:11434"
//! model = "phi3:latest"
//! temperature = 0.3
//! timeout_secs = 120
//! max_rows = 5
//!
//! [batch]
//! workers = 4
//! max_retries = 2
//! base_delay_ms = 200
//! max_delay_ms = 5000
//! jitter_factor = 0.1
//!
//! [selection]
//! register_only = true
//! min_tables = 1
//! keywords = ["spi"]
//! ```

use crate::batch::{BatchConfig, RetryPolicy};
use crate::selection::PageSelection;
use model::OllamaConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSection {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Table rows included in each prompt
    pub max_rows: usize,
}

impl Default for OllamaSection {
    fn default() -> Self {
        let defaults = OllamaConfig::default();
        Self {
            base_url: defaults.base_url,
            model: defaults.model,
            temperature: defaults.temperature,
            timeout_secs: defaults.timeout.as_secs(),
            max_rows: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    pub workers: usize,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for BatchSection {
    fn default() -> Self {
        let config = BatchConfig::default();
        Self {
            workers: config.workers,
            max_retries: config.retry.max_retries,
            base_delay_ms: config.retry.base_delay_ms,
            max_delay_ms: config.retry.max_delay_ms,
            jitter_factor: config.retry.jitter_factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionSection {
    pub register_only: bool,
    pub min_tables: usize,
    pub keywords: Vec<String>,
}

impl Default for SelectionSection {
    fn default() -> Self {
        let selection = PageSelection::default();
        Self {
            register_only: selection.register_only,
            min_tables: selection.min_tables,
            keywords: selection.keywords,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub ollama: OllamaSection,
    pub batch: BatchSection,
    pub selection: SelectionSection,
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn ollama_config(&self) -> OllamaConfig {
        OllamaConfig::new()
            .with_base_url(self.ollama.base_url.clone())
            .with_model(self.ollama.model.clone())
            .with_temperature(self.ollama.temperature)
            .with_timeout(Duration::from_secs(self.ollama.timeout_secs))
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig::default()
            .with_workers(self.batch.workers)
            .with_retry(
                RetryPolicy::default()
                    .with_max_retries(self.batch.max_retries)
                    .with_delays(self.batch.base_delay_ms, self.batch.max_delay_ms)
                    .with_jitter(self.batch.jitter_factor),
            )
    }

    /// Apply the `[selection]` filters to a scope-only selection.
    pub fn apply_selection(&self, selection: PageSelection) -> PageSelection {
        selection
            .with_register_only(self.selection.register_only)
            .with_min_tables(self.selection.min_tables)
            .with_keywords(self.selection.keywords.clone())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::Invalid { message };

        self.ollama_config().validate().map_err(invalid)?;
        if self.ollama.max_rows == 0 {
            return Err(invalid("max_rows must be at least 1".to_string()));
        }
        self.batch_config().validate().map_err(invalid)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.ollama.model, "phi3:latest");
        assert_eq!(config.batch.workers, 4);
        assert!(config.selection.register_only);
        assert_eq!(config.batch_config(), BatchConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [ollama]
            model = "llama3.1:8b"
            timeout_secs = 30

            [batch]
            workers = 2
            max_retries = 0

            [selection]
            min_tables = 2
            keywords = ["spi", "dma"]
            "#,
        )
        .unwrap();

        let ollama = config.ollama_config();
        assert_eq!(ollama.model, "llama3.1:8b");
        assert_eq!(ollama.timeout, Duration::from_secs(30));
        assert_eq!(ollama.base_url, "http://127.0.0.1:11434");

        let batch = config.batch_config();
        assert_eq!(batch.workers, 2);
        assert_eq!(batch.retry.max_retries, 0);
        assert_eq!(batch.retry.base_delay_ms, 200);

        let selection = config.apply_selection(PageSelection::range(0, 9));
        assert!(selection.register_only);
        assert_eq!(selection.min_tables, 2);
        assert_eq!(selection.keywords, vec!["spi", "dma"]);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            PipelineConfig::from_toml_str("[batch]\nworkers = 0"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("[ollama]\ntemperature = 3.5"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("[ollama]\nmax_rows = 0"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("[batch\nworkers = 2"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[ollama]\nbase_url = \"http://gpu-box:11434\"").unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.ollama.base_url, "http://gpu-box:11434");

        assert!(matches!(
            PipelineConfig::load("/nonexistent/regsynth.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
