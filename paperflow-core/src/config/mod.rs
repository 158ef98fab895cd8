pub mod broker_config;
pub mod extractor_config;
pub mod processing_config;
pub mod review_config;
pub mod sla_config;
pub mod storage_config;

use serde::{Deserialize, Serialize};

pub use broker_config::BrokerConfig;
pub use extractor_config::ExtractorConfig;
pub use processing_config::ProcessingConfig;
pub use review_config::ReviewConfig;
pub use sla_config::SlaConfig;
pub use storage_config::StorageConfig;

/// Top-level configuration aggregating all subsystem configs.
///
/// Built once at startup and passed by value to the services that need it;
/// nothing reads configuration through module-level state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PaperflowConfig {
    pub extractor: ExtractorConfig,
    pub broker: BrokerConfig,
    pub storage: StorageConfig,
    pub processing: ProcessingConfig,
    pub sla: SlaConfig,
    pub review: ReviewConfig,
}

impl PaperflowConfig {
    /// Load config from a TOML string, falling back to defaults for missing fields.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}
