//! Engine configuration (`ascend.yaml`).

use super::error::ConfigError;
use super::queue::{DEFAULT_MAX_PER_CATEGORY, DEFAULT_MAX_TOTAL};
use crate::source::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ascend.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding `metadata.yaml` and `categories/<id>.yaml`.
    #[serde(default = "default_catalog_dir")]
    pub catalog_dir: PathBuf,

    /// Directory holding `<user>/progress.yaml` and `<user>/events.jsonl`.
    #[serde(default = "default_progress_dir")]
    pub progress_dir: PathBuf,

    #[serde(default = "default_max_per_category")]
    pub max_per_category: usize,

    #[serde(default = "default_max_total")]
    pub max_total: usize,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Fail catalog loads on graph validation errors instead of warning.
    #[serde(default)]
    pub strict_catalog: bool,

    /// Treat `root` skills as unlocked regardless of prerequisites.
    #[serde(default)]
    pub override_unlock_root: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catalog_dir: default_catalog_dir(),
            progress_dir: default_progress_dir(),
            max_per_category: default_max_per_category(),
            max_total: default_max_total(),
            retry: RetryPolicy::default(),
            strict_catalog: false,
            override_unlock_root: false,
        }
    }
}

fn default_catalog_dir() -> PathBuf {
    PathBuf::from("catalog")
}

fn default_progress_dir() -> PathBuf {
    PathBuf::from("progress")
}

fn default_max_per_category() -> usize {
    DEFAULT_MAX_PER_CATEGORY
}

fn default_max_total() -> usize {
    DEFAULT_MAX_TOTAL
}

impl EngineConfig {
    /// Reject settings that would make every queue empty or spin retries.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_per_category == 0 {
            return Err(ConfigError::Invalid(
                "max_per_category must be at least 1".to_string(),
            ));
        }
        if self.max_total == 0 {
            return Err(ConfigError::Invalid("max_total must be at least 1".to_string()));
        }
        if self.retry.max_retries > 0 && self.retry.base_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "retry.base_delay_ms must be non-zero when retries are enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve relative directories against the config file's directory.
    pub fn rebase(mut self, base: &Path) -> Self {
        if self.catalog_dir.is_relative() {
            self.catalog_dir = base.join(&self.catalog_dir);
        }
        if self.progress_dir.is_relative() {
            self.progress_dir = base.join(&self.progress_dir);
        }
        self
    }
}

/// Parse and validate a config document.
pub fn parse_config(yaml: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = serde_yaml_ng::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}

/// Load a config file. A missing file yields the defaults.
///
/// Relative directories in the file are taken relative to the file itself.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let base = path.parent().unwrap_or(Path::new(""));
    if !path.exists() {
        return Ok(EngineConfig::default().rebase(base));
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_config(&content)?.rebase(base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = EngineConfig::default();
        assert_eq!(c.catalog_dir, PathBuf::from("catalog"));
        assert_eq!(c.max_per_category, 2);
        assert_eq!(c.max_total, 4);
        assert_eq!(c.retry.max_retries, 2);
        assert!(!c.strict_catalog);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(parse_config("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let c = parse_config(
            r#"
max_total: 6
strict_catalog: true
retry:
  max_retries: 5
"#,
        )
        .unwrap();
        assert_eq!(c.max_total, 6);
        assert_eq!(c.max_per_category, 2);
        assert!(c.strict_catalog);
        assert_eq!(c.retry.max_retries, 5);
        assert_eq!(c.retry.base_delay_ms, 500);
    }

    #[test]
    fn test_rejects_zero_caps() {
        assert!(parse_config("max_per_category: 0").is_err());
        let err = parse_config("max_total: 0").unwrap_err();
        assert!(err.to_string().contains("max_total"));
    }

    #[test]
    fn test_rejects_zero_delay_with_retries() {
        assert!(parse_config("retry: { max_retries: 1, base_delay_ms: 0 }").is_err());
        assert!(parse_config("retry: { max_retries: 0, base_delay_ms: 0 }").is_ok());
    }

    #[test]
    fn test_per_category_above_total_allowed() {
        let c = parse_config("max_per_category: 5\nmax_total: 3").unwrap();
        assert_eq!(c.max_per_category, 5);
    }

    #[test]
    fn test_load_missing_file_rebases_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = load_config(&dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(c.catalog_dir, dir.path().join("catalog"));
        assert_eq!(c.progress_dir, dir.path().join("progress"));
    }

    #[test]
    fn test_load_keeps_absolute_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "catalog_dir: /srv/catalog\nprogress_dir: data\n").unwrap();
        let c = load_config(&path).unwrap();
        assert_eq!(c.catalog_dir, PathBuf::from("/srv/catalog"));
        assert_eq!(c.progress_dir, dir.path().join("data"));
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("max_total: lots").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
