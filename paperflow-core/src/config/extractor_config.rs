//! Extraction-provider configuration.

use serde::{Deserialize, Serialize};

/// Credentials and model selection for the external extraction provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub api_key: String,
    pub model: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "invoice-extract-v2".to_string(),
        }
    }
}
