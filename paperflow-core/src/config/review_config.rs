//! Review-queue configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Fields below this confidence always need human eyes.
    pub confidence_threshold_low: f64,
    pub confidence_threshold_high: f64,
    /// Ordered roster used by least-loaded auto-assignment.
    pub reviewer_roster: Vec<String>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            confidence_threshold_low: 0.70,
            confidence_threshold_high: 0.90,
            reviewer_roster: vec![],
        }
    }
}
