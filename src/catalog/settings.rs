//! Scan tuning: exclusion lists, size threshold and pruned directories.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Per-session detection settings used by the scanner and heuristic scorer.
///
/// All word lists are matched case-insensitively; [`DetectionSettings::normalized`]
/// lower-cases them once so the hot path never has to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Generic names that mark a file as a dependency, not a product.
    pub exclude_generic_names: Vec<String>,

    /// Property substrings that exclude a file (runtimes, drivers, tools).
    pub exclude_by_property_substrings: Vec<String>,

    /// Hints that a file is an uninstaller, patch or updater.
    pub exclude_uninstaller_hints: Vec<String>,

    /// Files smaller than this are never considered.
    pub min_file_size_bytes: u64,

    /// Directory names pruned from the walk.
    pub ignore_dirs: BTreeSet<String>,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            exclude_generic_names: strings(&[
                "driver",
                "redist",
                "runtime",
                "package",
                "library",
                "component",
            ]),
            exclude_by_property_substrings: strings(&[
                ".net framework",
                "visual c++",
                "visual studio tools",
                "vsto",
                "codemeter runtime",
                "sentinel runtime",
                "microsoft edge",
                "webview2",
                "msedge",
                "sql server",
                "sql native client",
                "odbc driver",
                "oledb driver",
                "java update",
                "jre",
                "jdk",
                "directx",
                "nvidia driver",
                "amd driver",
                "intel driver",
                "adobe reader",
                "acrobat reader",
                "silverlight",
                "flash player",
                "remote desktop",
                "anydesk",
                "teamviewer",
                "vcredist",
                "report viewer",
                "crystal reports",
                "software manager",
                "download manager",
            ]),
            exclude_uninstaller_hints: strings(&[
                "uninstall", "remove", "uninst", "cleanup", "fix", "patch", "update",
            ]),
            min_file_size_bytes: 5 * 1024 * 1024,
            ignore_dirs: [
                "$recycle.bin",
                "system volume information",
                "windows",
                "programdata",
                "temp",
                "tmp",
                "logs",
                "cache",
                "drivers",
                "fonts",
                "inf",
                "driverstore",
                "winsxs",
                "python",
                "java",
                "jre",
                "jdk",
                "dotnet",
                ".net",
                "node_modules",
                "ruby",
                "perl",
                ".git",
                ".svn",
                "__pycache__",
                ".vscode",
                ".idea",
                "common files",
                "internet explorer",
                "windows defender",
                "help",
                "documentation",
                "docs",
                "examples",
                "samples",
                "bin",
                "lib",
                "include",
                "licenses",
                "thirdparty",
                "3rdparty",
                "redistributables",
                "plugins",
                "plug-ins",
                "addins",
                "updates",
                "patches",
                "hotfixes",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl DetectionSettings {
    /// Settings with no exclusions and no size threshold.
    pub fn permissive() -> Self {
        Self {
            exclude_generic_names: Vec::new(),
            exclude_by_property_substrings: Vec::new(),
            exclude_uninstaller_hints: Vec::new(),
            min_file_size_bytes: 0,
            ignore_dirs: BTreeSet::new(),
        }
    }

    /// Lower-case and trim every word list; empty entries are dropped.
    pub fn normalized(mut self) -> Self {
        fn norm(list: &mut Vec<String>) {
            *list = list
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        norm(&mut self.exclude_generic_names);
        norm(&mut self.exclude_by_property_substrings);
        norm(&mut self.exclude_uninstaller_hints);
        self.ignore_dirs = self
            .ignore_dirs
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    /// Whether a directory name is pruned from the walk.
    pub fn is_ignored_dir(&self, name: &str) -> bool {
        self.ignore_dirs.contains(&name.to_lowercase())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
