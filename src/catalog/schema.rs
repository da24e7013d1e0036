//! Catalog schema definitions.
//!
//! These structs map one-to-one onto the YAML catalog format. A catalog is
//! loaded once per session and is read-only afterwards.

use serde::{Deserialize, Serialize};

use crate::metadata::ArtifactKind;

/// Placeholder substituted with the quoted installer path in command templates.
pub const INSTALLER_PATH_PLACEHOLDER: &str = "{installer_path}";

/// One piece of target software the engine knows how to find and deploy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftwareDefinition {
    /// Unique catalog key (e.g. "petrel").
    pub key: String,

    /// Human readable name.
    #[serde(default)]
    pub display_name: String,

    /// Informational target version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_version: Option<String>,

    /// Criteria used to recognise this software's installer on disk.
    #[serde(default)]
    pub identity: Identity,

    /// Ordered detection rules; the first satisfied rule wins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detection: Vec<DetectionRule>,

    /// Silent install command templates per artifact type.
    #[serde(default)]
    pub install_commands: InstallCommands,
}

impl SoftwareDefinition {
    /// Name to show to users, falling back to the key.
    pub fn name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.key
        } else {
            &self.display_name
        }
    }
}

/// Installer identity criteria.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    /// Substrings expected in the artifact's product name.
    pub expected_product_names: Vec<String>,
    /// Substrings expected in the artifact's description.
    pub expected_descriptions: Vec<String>,
    /// Filename glob patterns (fnmatch syntax), matched case-insensitively.
    pub installer_patterns: Vec<String>,
}

/// Install command templates keyed by artifact type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallCommands {
    /// Template for executable installers.
    #[serde(rename = "exe", alias = ".exe", skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
    /// Template for installer packages.
    #[serde(rename = "msi", alias = ".msi", skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
}

impl InstallCommands {
    /// The template configured for an artifact type, if any.
    pub fn template_for(&self, kind: ArtifactKind) -> Option<&str> {
        match kind {
            ArtifactKind::Executable => self.executable.as_deref(),
            ArtifactKind::Package => self.package.as_deref(),
        }
    }
}

/// Configuration-store root a rule is evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hive {
    /// Machine-wide store (HKLM).
    #[default]
    #[serde(rename = "HKLM", alias = "machine")]
    Machine,
    /// Per-user store (HKCU).
    #[serde(rename = "HKCU", alias = "user")]
    User,
}

impl std::fmt::Display for Hive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Hive::Machine => write!(f, "HKLM"),
            Hive::User => write!(f, "HKCU"),
        }
    }
}

/// How to decide whether a piece of software is installed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionRule {
    /// A store path exists; optionally read a value as the version.
    Exists {
        #[serde(default)]
        hive: Hive,
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version_value: Option<String>,
    },

    /// Enumerate child entries of a path and regex-match one of their values.
    EnumerateMatch {
        #[serde(default)]
        hive: Hive,
        path: String,
        match_value: String,
        pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version_value: Option<String>,
    },

    /// Read one value from one exact path; presence of the value is presence.
    ReadValue {
        #[serde(default)]
        hive: Hive,
        path: String,
        value: String,
    },

    /// Any filesystem path exists (environment variables are expanded).
    Path { paths: Vec<String> },

    /// Installer package product code is registered as installed.
    ProductCode { code: String },
}

impl DetectionRule {
    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            DetectionRule::Exists { .. } => "exists",
            DetectionRule::EnumerateMatch { .. } => "enumerate_match",
            DetectionRule::ReadValue { .. } => "read_value",
            DetectionRule::Path { .. } => "path",
            DetectionRule::ProductCode { .. } => "product_code",
        }
    }
}
