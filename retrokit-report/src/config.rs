//! Pipeline configuration.

use std::path::Path;

use retrokit_core::{Result, RetroError};
use serde::{Deserialize, Serialize};

/// Options for one [`Pipeline`](crate::Pipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Generic placeholder names the oracle must never leave in a report.
    pub sentinel_reaction_names: Vec<String>,
    /// Distinct validated reactant sets needed before a template is emitted.
    pub min_template_members: usize,
    /// Run template generalization for transition reports.
    pub generalize: bool,
    /// Reasoning text for reactant sets that carry none.
    pub default_reactant_reasoning: String,
}

/// Placeholder names emitted when no descriptive reaction name fits.
pub const DEFAULT_SENTINELS: [&str; 2] = ["OtherReaction", "Other"];

/// Reasoning used for reactant sets the oracle left unexplained.
pub const MISSING_REASONING: &str = "No reasoning provided";

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            sentinel_reaction_names: DEFAULT_SENTINELS.iter().map(|s| s.to_string()).collect(),
            min_template_members: 2,
            generalize: true,
            default_reactant_reasoning: MISSING_REASONING.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)
            .map_err(|e| RetroError::Parse(format!("pipeline config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            RetroError::Io(std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sentinel_reaction_names.iter().any(|s| s.trim().is_empty()) {
            return Err(RetroError::InvalidInput(
                "sentinel_reaction_names must not contain blank names".into(),
            ));
        }
        if self.default_reactant_reasoning.trim().is_empty() {
            return Err(RetroError::InvalidInput(
                "default_reactant_reasoning must not be empty".into(),
            ));
        }
        if self.min_template_members < 2 {
            return Err(RetroError::InvalidInput(format!(
                "min_template_members must be at least 2, got {}",
                self.min_template_members
            )));
        }
        Ok(())
    }

    /// Whether `name` is missing or one of the bare placeholders.
    pub fn is_sentinel(&self, name: &str) -> bool {
        let name = name.trim();
        name.is_empty() || self.sentinel_reaction_names.iter().any(|s| s.trim() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.sentinel_reaction_names, vec!["OtherReaction", "Other"]);
        assert_eq!(config.min_template_members, 2);
        assert!(config.generalize);
        assert_eq!(config.default_reactant_reasoning, MISSING_REASONING);
        assert!(config.validate().is_ok());
        assert!(config.is_sentinel(" Other "));
        assert!(config.is_sentinel("OtherReaction"));
        assert!(config.is_sentinel(""));
        assert!(!config.is_sentinel("Other amide coupling"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{"sentinel_reaction_names": ["Unknown"]}"#;
        let config = PipelineConfig::from_json_str(json).unwrap();
        assert_eq!(config.sentinel_reaction_names, vec!["Unknown"]);
        assert!(!config.is_sentinel("OtherReaction"));
        assert_eq!(config.min_template_members, 2);
    }

    #[test]
    fn rejects_bad_json_and_values() {
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{"min_template_members": 1}"#),
            Err(RetroError::InvalidInput(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{"unknown_field": true}"#),
            Err(RetroError::Parse(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{"sentinel_reaction_names": ["Other", " "]}"#),
            Err(RetroError::InvalidInput(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{"default_reactant_reasoning": ""}"#),
            Err(RetroError::InvalidInput(_))
        ));
    }

    #[test]
    fn from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"generalize": false}"#).unwrap();
        file.flush().unwrap();
        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert!(!config.generalize);
        assert!(PipelineConfig::from_file("/nonexistent/config.json").is_err());
    }
}
