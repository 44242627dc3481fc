//! # Runtime Limits
//!
//! Bounds applied to every invocation regardless of implementation kind.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::script::ScriptLimits;

/// Upper bound on any wall-clock budget (24 hours)
pub const MAX_TIMEOUT_MS: u64 = 24 * 60 * 60 * 1000;

/// Runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum execution time in milliseconds
    pub timeout_ms: u64,

    /// Script statement/expression budget
    pub max_steps: u64,

    /// Script call depth
    pub max_call_depth: usize,

    /// Wasm instruction fuel
    pub wasm_fuel: u64,

    /// Maximum memory in bytes (wasm linear memory, external process output)
    pub max_memory_bytes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,                  // 30 seconds
            max_steps: 10_000_000,
            max_call_depth: 64,
            wasm_fuel: 1_000_000_000,
            max_memory_bytes: 128 * 1024 * 1024, // 128 MB
        }
    }
}

impl RuntimeConfig {
    /// Wall-clock budget, capped at [`MAX_TIMEOUT_MS`]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.min(MAX_TIMEOUT_MS))
    }

    /// Same limits with a different wall-clock budget
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis())
            .unwrap_or(MAX_TIMEOUT_MS)
            .clamp(1, MAX_TIMEOUT_MS);
        self
    }

    pub fn script_limits(&self) -> ScriptLimits {
        ScriptLimits {
            max_steps: self.max_steps,
            max_call_depth: self.max_call_depth,
            timeout: self.timeout(),
        }
    }

    /// Every limit must be positive
    pub fn validate(&self) -> Result<(), String> {
        let limits: [(&str, u64); 5] = [
            ("timeout_ms", self.timeout_ms),
            ("max_steps", self.max_steps),
            ("max_call_depth", self.max_call_depth as u64),
            ("wasm_fuel", self.wasm_fuel),
            ("max_memory_bytes", self.max_memory_bytes as u64),
        ];
        match limits.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(format!("runtime.{} must be greater than 0", name)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.max_steps, 10_000_000);
        assert_eq!(config.max_call_depth, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_timeout() {
        let config = RuntimeConfig::default().with_timeout(Duration::from_millis(1500));
        assert_eq!(config.timeout_ms, 1500);
        assert_eq!(config.script_limits().timeout, Duration::from_millis(1500));

        let config = RuntimeConfig::default().with_timeout(Duration::from_micros(10));
        assert_eq!(config.timeout_ms, 1);

        let config = RuntimeConfig::default().with_timeout(Duration::MAX);
        assert_eq!(config.timeout_ms, MAX_TIMEOUT_MS);
    }

    #[test]
    fn test_configured_timeout_is_capped() {
        let config = RuntimeConfig {
            timeout_ms: u64::MAX,
            ..RuntimeConfig::default()
        };
        assert_eq!(config.timeout(), Duration::from_millis(MAX_TIMEOUT_MS));
        assert_eq!(config.script_limits().timeout, config.timeout());
    }

    #[test]
    fn test_partial_deserialize() {
        let config: RuntimeConfig = serde_json::from_str(r#"{"max_steps": 5}"#).unwrap();
        assert_eq!(config.max_steps, 5);
        assert_eq!(config.timeout_ms, 30_000);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let config = RuntimeConfig {
            wasm_fuel: 0,
            ..RuntimeConfig::default()
        };
        assert!(config.validate().unwrap_err().contains("wasm_fuel"));
    }
}
