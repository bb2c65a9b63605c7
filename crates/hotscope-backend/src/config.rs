//! Backend configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning knobs for the aggregator's batching behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Coalescing window for entity-state reports (frames, cables,
    /// controllers, markers).
    #[serde(default = "default_report_debounce_ms")]
    pub report_debounce_ms: u64,
    /// Coalescing window for the Turbo config report, which depends on
    /// several independent meta-tag reads.
    #[serde(default = "default_config_debounce_ms")]
    pub config_debounce_ms: u64,
    /// Delay before snapshotting a rendered stream element. Works around
    /// an engine that loses custom event properties across the dispatch
    /// boundary; set to 0 on platforms that do not need it.
    #[serde(default = "default_stream_snapshot_delay_ms")]
    pub stream_snapshot_delay_ms: u64,
}

fn default_report_debounce_ms() -> u64 {
    10
}

fn default_config_debounce_ms() -> u64 {
    200
}

fn default_stream_snapshot_delay_ms() -> u64 {
    100
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            report_debounce_ms: default_report_debounce_ms(),
            config_debounce_ms: default_config_debounce_ms(),
            stream_snapshot_delay_ms: default_stream_snapshot_delay_ms(),
        }
    }
}

impl BackendConfig {
    pub fn report_debounce(&self) -> Duration {
        Duration::from_millis(self.report_debounce_ms)
    }

    pub fn config_debounce(&self) -> Duration {
        Duration::from_millis(self.config_debounce_ms)
    }

    pub fn stream_snapshot_delay(&self) -> Duration {
        Duration::from_millis(self.stream_snapshot_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BackendConfig::default();
        assert_eq!(config.report_debounce(), Duration::from_millis(10));
        assert_eq!(config.config_debounce(), Duration::from_millis(200));
        assert_eq!(config.stream_snapshot_delay(), Duration::from_millis(100));
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let config: BackendConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.report_debounce_ms, 10);
        assert_eq!(config.config_debounce_ms, 200);
        assert_eq!(config.stream_snapshot_delay_ms, 100);
    }

    #[test]
    fn delay_can_be_disabled() {
        let config: BackendConfig =
            serde_json::from_str(r#"{"stream_snapshot_delay_ms": 0}"#).unwrap();
        assert_eq!(config.stream_snapshot_delay(), Duration::ZERO);
    }
}
