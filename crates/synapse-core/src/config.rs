use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection settings for the optional Neo4j accelerator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceleratorConfig {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// `None` when `NEO4J_URI` is unset; analytics then run in-memory only.
    pub accelerator: Option<AcceleratorConfig>,
    pub ner_endpoint: Option<String>,
    pub default_domain: String,
    pub auto_detect_domain: bool,
    pub path_cache_capacity: usize,
    pub batch_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            accelerator: None,
            ner_endpoint: None,
            default_domain: "general".into(),
            auto_detect_domain: true,
            path_cache_capacity: 256,
            batch_delay_ms: 1000,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let accelerator = std::env::var("NEO4J_URI").ok().map(|uri| AcceleratorConfig {
            neo4j_uri: uri,
            neo4j_user: std::env::var("NEO4J_USER").unwrap_or_else(|_| "neo4j".into()),
            neo4j_password: std::env::var("NEO4J_PASSWORD").unwrap_or_default(),
        });

        Self {
            accelerator,
            ner_endpoint: std::env::var("SYNAPSE_NER_ENDPOINT")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            default_domain: std::env::var("SYNAPSE_DEFAULT_DOMAIN")
                .unwrap_or(defaults.default_domain),
            auto_detect_domain: std::env::var("SYNAPSE_AUTO_DETECT")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.auto_detect_domain),
            path_cache_capacity: std::env::var("SYNAPSE_PATH_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.path_cache_capacity),
            batch_delay_ms: std::env::var("SYNAPSE_BATCH_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.batch_delay_ms),
        }
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.accelerator.is_none());
        assert_eq!(config.default_domain, "general");
        assert!(config.auto_detect_domain);
        assert_eq!(config.batch_delay(), Duration::from_millis(1000));
    }
}
