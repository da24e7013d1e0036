//! Catalog file loading and validation.

use crate::catalog::schema::{DetectionRule, SoftwareDefinition};
use crate::catalog::settings::DetectionSettings;
use crate::catalog::Catalog;
use crate::error::{Result, ScoutError};
use crate::matcher::glob;
use regex::RegexBuilder;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// On-disk catalog layout.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    settings: DetectionSettings,
    #[serde(default)]
    software: Vec<SoftwareDefinition>,
}

/// Load and validate a catalog from a YAML file.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    if !path.exists() {
        return Err(ScoutError::CatalogNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = fs::read_to_string(path)?;
    parse_catalog(&content).map_err(|e| match e {
        ScoutError::ConfigError { message } => ScoutError::ConfigError {
            message: format!("{}: {}", path.display(), message),
        },
        other => other,
    })
}

/// Parse and validate a catalog from YAML text.
pub fn parse_catalog(content: &str) -> Result<Catalog> {
    let file: CatalogFile =
        serde_yaml::from_str(content).map_err(|e| ScoutError::ConfigError {
            message: e.to_string(),
        })?;

    for def in &file.software {
        validate_definition(def)?;
    }

    Catalog::new(file.settings, file.software)
}

/// Check a single definition for problems that would only surface mid-run.
pub fn validate_definition(def: &SoftwareDefinition) -> Result<()> {
    if def.key.trim().is_empty() {
        return Err(ScoutError::ConfigError {
            message: "software definition with empty key".to_string(),
        });
    }

    for pattern in &def.identity.installer_patterns {
        glob::compile(pattern).map_err(|e| ScoutError::ConfigError {
            message: format!("invalid installer pattern '{}' for '{}': {}", pattern, def.key, e),
        })?;
    }

    for rule in &def.detection {
        match rule {
            DetectionRule::Exists { path, .. }
            | DetectionRule::ReadValue { path, .. }
            | DetectionRule::EnumerateMatch { path, .. }
                if path.trim().is_empty() =>
            {
                return Err(invalid_rule(def, rule, "rule has no path"));
            }
            DetectionRule::EnumerateMatch { pattern, .. } => {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| invalid_rule(def, rule, &e.to_string()))?;
            }
            DetectionRule::Path { paths } if paths.is_empty() => {
                return Err(invalid_rule(def, rule, "rule lists no paths"));
            }
            DetectionRule::ProductCode { code } if code.trim().is_empty() => {
                return Err(invalid_rule(def, rule, "rule has an empty product code"));
            }
            _ => {}
        }
    }

    Ok(())
}

/// Reject duplicate keys; catalog order is preserved.
pub(crate) fn check_unique_keys(software: &[SoftwareDefinition]) -> Result<()> {
    let mut seen = HashSet::new();
    for def in software {
        if !seen.insert(def.key.as_str()) {
            return Err(ScoutError::ConfigError {
                message: format!("duplicate software key '{}'", def.key),
            });
        }
    }
    Ok(())
}

fn invalid_rule(def: &SoftwareDefinition, rule: &DetectionRule, reason: &str) -> ScoutError {
    ScoutError::ConfigError {
        message: format!(
            "invalid {} rule for '{}': {}",
            rule.label(),
            def.key,
            reason
        ),
    }
}
