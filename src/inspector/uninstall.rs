//! Reverse lookup of uninstall entries.
//!
//! Used when the ledger has no record of a program: every entry under the
//! machine uninstall keys is scored against a display-name hint and an
//! install-directory hint, and the best one wins.

use crate::catalog::Hive;
use crate::inspector::store::{ConfigStore, UNINSTALL_KEY, UNINSTALL_KEY_WOW64};
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

const NAME_SCORE: u32 = 5;
const LOCATION_SCORE: u32 = 3;
const BOTH_BONUS: u32 = 2;

static MSIEXEC_REMOVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/x\{[0-9a-f-]+\}").expect("MSIEXEC_REMOVE must compile")
});

/// An uninstall entry found in the configuration store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UninstallEntry {
    pub display_name: String,
    pub uninstall_string: String,
    pub install_location: Option<String>,
    pub display_version: Option<String>,
    pub publisher: Option<String>,
    /// Store path the entry was read from.
    pub key_path: String,
    pub score: u32,
}

/// Find the uninstall entry that best matches the hints.
///
/// Entries lacking a display name or uninstall string are ignored. Only a
/// strictly higher score replaces the current best, so the first entry
/// wins ties. The returned uninstall string is already cleaned up.
pub fn find_uninstall_entry(
    store: &dyn ConfigStore,
    name_hint: &str,
    directory_hint: Option<&Path>,
) -> Option<UninstallEntry> {
    let name_hint = name_hint.trim().to_lowercase();
    let dir_hint = directory_hint
        .map(|d| normalize_dir(&d.to_string_lossy()))
        .unwrap_or_default();
    debug!(
        "Searching uninstall entries for '{}' (dir hint '{}')",
        name_hint, dir_hint
    );

    let mut best: Option<UninstallEntry> = None;
    for base in [UNINSTALL_KEY, UNINSTALL_KEY_WOW64] {
        for sub in store.subkeys(Hive::Machine, base) {
            let path = format!(r"{base}\{sub}");
            let read = |name: &str| {
                store
                    .read_value(Hive::Machine, &path, name)
                    .filter(|v| !v.trim().is_empty())
            };
            let (Some(display_name), Some(uninstall_string)) =
                (read("DisplayName"), read("UninstallString"))
            else {
                continue;
            };
            let install_location = read("InstallLocation");

            let display_lower = display_name.to_lowercase();
            let mut score = 0;
            if !name_hint.is_empty()
                && (display_lower.contains(&name_hint) || name_hint.contains(&display_lower))
            {
                score += NAME_SCORE;
            }
            if let Some(location) = &install_location {
                let location = normalize_dir(location);
                if !location.is_empty() && !dir_hint.is_empty() && location == dir_hint {
                    score += LOCATION_SCORE;
                }
            }
            if score >= NAME_SCORE + LOCATION_SCORE {
                score += BOTH_BONUS;
            }
            debug!("  {} '{}' scored {}", sub, display_name, score);

            if score > best.as_ref().map_or(0, |b| b.score) {
                best = Some(UninstallEntry {
                    display_name,
                    uninstall_string,
                    install_location,
                    display_version: read("DisplayVersion"),
                    publisher: read("Publisher"),
                    key_path: path.clone(),
                    score,
                });
            }
        }
    }

    match best {
        Some(mut entry) => {
            entry.uninstall_string = clean_uninstall_string(&entry.uninstall_string);
            info!(
                "Uninstall entry for '{}': {} (score {})",
                name_hint, entry.key_path, entry.score
            );
            Some(entry)
        }
        None => {
            warn!("No uninstall entry found for '{}'", name_hint);
            None
        }
    }
}

/// Strip surrounding quotes and reduce `MsiExec.exe ... /X{GUID} ...` to the
/// executable plus its removal argument.
pub fn clean_uninstall_string(raw: &str) -> String {
    let mut command = raw.trim();
    if command.len() >= 2 && command.starts_with('"') && command.ends_with('"') {
        command = command[1..command.len() - 1].trim();
    }

    if command.to_lowercase().contains("msiexec.exe") {
        if let Some(found) = MSIEXEC_REMOVE.find(command) {
            let executable = command[..found.start()].trim();
            return format!("{} {}", executable, found.as_str());
        }
    }
    command.to_string()
}

fn normalize_dir(dir: &str) -> String {
    dir.trim()
        .trim_matches('"')
        .trim_end_matches(['\\', '/'])
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::store::MemoryStore;

    fn entry(store: &MemoryStore, base: &str, id: &str, values: &[(&str, &str)]) {
        let path = format!(r"{base}\{id}");
        for (name, value) in values {
            store.set_value(Hive::Machine, &path, name, value);
        }
    }

    #[test]
    fn name_match_selects_entry() {
        let store = MemoryStore::new();
        entry(&store, UNINSTALL_KEY, "Other", &[("DisplayName", "Other Tool"), ("UninstallString", "other.exe")]);
        entry(
            &store,
            UNINSTALL_KEY_WOW64,
            "Widget",
            &[
                ("DisplayName", "Widget Studio 2024"),
                ("UninstallString", r#""C:\Program Files\Widget\unins000.exe""#),
                ("DisplayVersion", "24.1"),
            ],
        );

        let found = find_uninstall_entry(&store, "Widget Studio", None).unwrap();
        assert_eq!(found.display_name, "Widget Studio 2024");
        assert_eq!(found.uninstall_string, r"C:\Program Files\Widget\unins000.exe");
        assert_eq!(found.display_version.as_deref(), Some("24.1"));
        assert_eq!(found.score, 5);
    }

    #[test]
    fn location_and_name_earn_bonus() {
        let store = MemoryStore::new();
        entry(&store, UNINSTALL_KEY, "A", &[("DisplayName", "Widget"), ("UninstallString", "a.exe")]);
        entry(
            &store,
            UNINSTALL_KEY,
            "B",
            &[
                ("DisplayName", "Widget"),
                ("UninstallString", "b.exe"),
                ("InstallLocation", r"D:\Share\Widget\"),
            ],
        );

        let found =
            find_uninstall_entry(&store, "widget", Some(Path::new(r"D:\Share\Widget"))).unwrap();
        assert_eq!(found.uninstall_string, "b.exe");
        assert_eq!(found.score, 10);
    }

    #[test]
    fn entries_without_uninstall_string_are_ignored() {
        let store = MemoryStore::new();
        entry(&store, UNINSTALL_KEY, "W", &[("DisplayName", "Widget")]);
        assert!(find_uninstall_entry(&store, "Widget", None).is_none());
    }

    #[test]
    fn zero_score_is_no_match() {
        let store = MemoryStore::new();
        entry(&store, UNINSTALL_KEY, "W", &[("DisplayName", "Gadget"), ("UninstallString", "g.exe")]);
        assert!(find_uninstall_entry(&store, "Widget", None).is_none());
        assert!(find_uninstall_entry(&store, "", None).is_none());
    }

    #[test]
    fn cleans_msiexec_strings() {
        assert_eq!(
            clean_uninstall_string("MsiExec.exe /I{AAAA-1111} /X{12345678-ABCD-1234-ABCD-1234567890AB} REBOOT=1"),
            "MsiExec.exe /I{AAAA-1111} /X{12345678-ABCD-1234-ABCD-1234567890AB}"
        );
        assert_eq!(
            clean_uninstall_string(r#""C:\Tools\uninst.exe" /quiet"#),
            r#""C:\Tools\uninst.exe" /quiet"#
        );
        assert_eq!(clean_uninstall_string(r#""C:\x\u.exe""#), r"C:\x\u.exe");
        assert_eq!(clean_uninstall_string("MsiExec.exe /I{AAAA}"), "MsiExec.exe /I{AAAA}");
    }
}
