use crate::error::{ProbeError, ProbeResult};
use log::debug;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Probe settings, read from an optional TOML file. Command line flags
/// override whatever the file sets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// Instructions decoded before the trace gives up
    pub max_steps: usize,
    /// Trace start address; the header's initial PC when unset
    pub start_pc: Option<usize>,
    /// List every property, not only the violations
    pub list_properties: bool,
    /// Raw bytes shown per trace line
    pub raw_byte_limit: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            max_steps: 50,
            start_pc: None,
            list_properties: false,
            raw_byte_limit: 8,
        }
    }
}

impl ProbeConfig {
    pub fn from_toml(text: &str) -> ProbeResult<ProbeConfig> {
        let config: ProbeConfig = toml::from_str(text)?;
        if config.max_steps == 0 {
            return Err(ProbeError::Config("max_steps must be at least 1".into()));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> ProbeResult<ProbeConfig> {
        debug!("Reading config from {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| {
            ProbeError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ProbeConfig::from_toml("").unwrap();
        assert_eq!(config, ProbeConfig::default());
        assert_eq!(config.max_steps, 50);
        assert_eq!(config.raw_byte_limit, 8);
        assert!(config.start_pc.is_none());
    }

    #[test]
    fn test_partial_config() {
        let config = ProbeConfig::from_toml(
            "max_steps = 200\nstart_pc = 0x4f05\nlist_properties = true\n",
        )
        .unwrap();
        assert_eq!(config.max_steps, 200);
        assert_eq!(config.start_pc, Some(0x4f05));
        assert!(config.list_properties);
        assert_eq!(config.raw_byte_limit, 8);
    }

    #[test]
    fn test_bad_config_is_config_error() {
        let err = ProbeConfig::from_toml("max_steps = \"lots\"").unwrap_err();
        assert!(matches!(err, ProbeError::Config(_)));
        assert_eq!(err.exit_code(), 103);

        assert!(ProbeConfig::from_toml("steps = 3").is_err());
        assert!(ProbeConfig::from_toml("max_steps = 0").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = ProbeConfig::load(Path::new("/nonexistent/probe.toml")).unwrap_err();
        assert!(matches!(err, ProbeError::Config(_)));
    }
}
