//! Command-line construction for install and uninstall actions.
//!
//! # Semi-silent rewriting
//!
//! | Template shape | Result |
//! |----------------|--------|
//! | package artifact | `msiexec /i "<path>" /passive /norestart` |
//! | contains `/s /v"/qn` (any case) | template with lowercase `/qn` replaced by `/qb` |
//! | contains `/S`, `/SILENT` or `/VERYSILENT` | template unchanged |
//! | anything else | `"<path>"` |

use crate::catalog::INSTALLER_PATH_PLACEHOLDER;
use crate::metadata::ArtifactKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

/// Generic silent template for unidentified executables.
pub const GENERIC_EXECUTABLE_TEMPLATE: &str = "{installer_path} /S /NORESTART";

/// Generic silent template for unidentified packages.
pub const GENERIC_PACKAGE_TEMPLATE: &str = "msiexec /i {installer_path} /qn /norestart";

static PACKAGE_GUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}\}")
        .expect("PACKAGE_GUID must compile")
});

/// Switches that already make a non-package uninstaller quiet.
const SILENT_MARKERS: &[&str] = &[
    " /s", "/silent", "/verysilent", "/q", "/quiet", "-s", "-silent", "-q",
];

/// How much installer UI the user wants to see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InstallMode {
    /// Fully silent, using the configured template.
    #[default]
    Auto,
    /// Progress UI without prompts, where the installer type allows it.
    Semi,
    /// Launch the installer with no switches.
    Manual,
}

impl fmt::Display for InstallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InstallMode::Auto => "auto",
            InstallMode::Semi => "semi",
            InstallMode::Manual => "manual",
        })
    }
}

impl FromStr for InstallMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "silent" => Ok(InstallMode::Auto),
            "semi" | "passive" => Ok(InstallMode::Semi),
            "manual" | "interactive" => Ok(InstallMode::Manual),
            other => Err(format!("unknown install mode '{other}'")),
        }
    }
}

/// `path` wrapped in double quotes.
pub fn quote_path(path: &Path) -> String {
    format!("\"{}\"", path.display())
}

/// Substitute the quoted artifact path into a template.
pub fn render_template(template: &str, artifact: &Path) -> String {
    template.replace(INSTALLER_PATH_PLACEHOLDER, &quote_path(artifact))
}

/// Template used for artifacts no catalog entry describes.
pub fn generic_template(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Executable => GENERIC_EXECUTABLE_TEMPLATE,
        ArtifactKind::Package => GENERIC_PACKAGE_TEMPLATE,
    }
}

/// Build the install command line for `artifact` in the requested mode.
pub fn build_install_command(
    template: &str,
    artifact: &Path,
    kind: ArtifactKind,
    mode: InstallMode,
) -> String {
    let quoted = quote_path(artifact);
    let silent = render_template(template, artifact);
    match mode {
        InstallMode::Auto => silent,
        InstallMode::Manual => quoted,
        InstallMode::Semi => semi_silent(template, &silent, &quoted, kind),
    }
}

/// Reduced-UI variant of a rendered silent command. Switches are looked up
/// in the template so the artifact path cannot fake one.
fn semi_silent(template: &str, silent: &str, quoted: &str, kind: ArtifactKind) -> String {
    if kind == ArtifactKind::Package {
        return format!("msiexec /i {quoted} /passive /norestart");
    }
    let switches = template.replace(INSTALLER_PATH_PLACEHOLDER, "");
    if switches.to_lowercase().contains("/s /v\"/qn") {
        return silent.replace("/qn", "/qb");
    }
    if ["/S", "/SILENT", "/VERYSILENT"]
        .iter()
        .any(|switch| switches.contains(switch))
    {
        return silent.to_string();
    }
    quoted.to_string()
}

/// A ready-to-run uninstall command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallCommand {
    pub command: String,
    /// Product code, when the command removes an installer package.
    pub product_code: Option<String>,
}

/// Normalize a raw uninstall string and make it quiet.
pub fn build_uninstall_command(raw: &str) -> UninstallCommand {
    let (command, product_code) = match package_product_code(raw) {
        Some(code) => (format!("msiexec /x {code}"), Some(code)),
        None => (raw.trim().to_string(), None),
    };
    UninstallCommand {
        command: add_silent_flags(&command),
        product_code,
    }
}

/// Product code of a package-manager removal command, if `command` is one.
pub fn package_product_code(command: &str) -> Option<String> {
    let lower = command.to_lowercase();
    if !lower.contains("msiexec") || !(lower.contains("/x") || lower.contains("/uninstall")) {
        return None;
    }
    PACKAGE_GUID
        .find(command)
        .map(|m| m.as_str().to_uppercase())
}

/// Append quiet switches that are not already present.
pub fn add_silent_flags(command: &str) -> String {
    let lower = command.to_lowercase();
    let mut result = command.trim_end().to_string();

    if lower.contains("msiexec") {
        if !lower.contains("/qn") && !lower.contains("/quiet") {
            result.push_str(" /qn");
        }
        if !lower.contains("/norestart") {
            result.push_str(" /norestart");
        }
    } else if !SILENT_MARKERS.iter().any(|m| lower.contains(m)) {
        result.push_str(" /S");
    }
    result
}
