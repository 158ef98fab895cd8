//! Task-broker configuration (opaque to this workspace).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub broker_url: String,
    pub result_backend_url: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            broker_url: "redis://localhost:6379/0".to_string(),
            result_backend_url: "redis://localhost:6379/1".to_string(),
        }
    }
}
