//! Recursive installer discovery.
//!
//! The scanner walks a directory tree, prunes ignored directories before
//! descending, and runs every remaining file through an ordered filter
//! chain:
//!
//! 1. extension (`.exe` / `.msi`)
//! 2. minimum size
//! 3. readable metadata
//! 4. excluded property substrings
//! 5. generic names
//! 6. uninstaller hints (file name included)
//!
//! Individual file and directory errors are logged and skipped.

use crate::catalog::DetectionSettings;
use crate::engine::CancelToken;
use crate::error::{Result, ScoutError};
use crate::metadata::{keys, lowered, ArtifactKind, MetadataProvider, PropertyMap};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Properties whose values feed the exclusion filters.
const FILTERED_PROPERTIES: &[&str] = &[
    keys::PRODUCT_NAME,
    keys::FILE_DESCRIPTION,
    keys::ORIGINAL_FILENAME,
    keys::COMPANY_NAME,
];

/// A file that survived every scan filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredArtifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    /// File size in bytes; `None` if it could not be read.
    pub size: Option<u64>,
    pub properties: PropertyMap,
}

impl DiscoveredArtifact {
    /// File name as stored on disk.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Raw property value, if present.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Product name, or the file name when the artifact has none.
    pub fn display_name(&self) -> String {
        match self.property(keys::PRODUCT_NAME) {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => self.file_name(),
        }
    }

    /// Package product code, when the artifact carries one.
    pub fn product_code(&self) -> Option<&str> {
        self.property(keys::PACKAGE_PRODUCT_CODE)
            .filter(|c| !c.trim().is_empty())
    }

    /// Directory holding the artifact.
    pub fn directory(&self) -> Option<&Path> {
        self.path.parent()
    }
}

/// Counters collected during one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub directories_visited: usize,
    pub directories_pruned: usize,
    pub files_seen: usize,
    pub rejected_extension: usize,
    pub rejected_size: usize,
    pub rejected_metadata: usize,
    pub rejected_property: usize,
    pub rejected_generic: usize,
    pub rejected_uninstaller: usize,
    pub walk_errors: usize,
    pub accepted: usize,
    pub cancelled: bool,
}

/// Result of a scan: the surviving artifacts and how the rest were dropped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanOutcome {
    pub artifacts: Vec<DiscoveredArtifact>,
    pub stats: ScanStats,
}

/// Why a file was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Extension,
    Size,
    Metadata,
    Property,
    Generic,
    Uninstaller,
}

/// Walks a tree and produces [`DiscoveredArtifact`]s.
pub struct DirectoryScanner<'a> {
    settings: &'a DetectionSettings,
    provider: &'a dyn MetadataProvider,
}

impl<'a> DirectoryScanner<'a> {
    pub fn new(settings: &'a DetectionSettings, provider: &'a dyn MetadataProvider) -> Self {
        Self { settings, provider }
    }

    /// Scan `root` recursively.
    ///
    /// Fails only if `root` is not a directory. Cancellation is checked
    /// between files; a cancelled scan returns what it found so far with
    /// `stats.cancelled` set.
    pub fn scan(&self, root: &Path, cancel: &CancelToken) -> Result<ScanOutcome> {
        validate_root(root)?;
        info!("Scanning {} for installers", root.display());

        let mut outcome = ScanOutcome::default();
        let stats = &mut outcome.stats;
        let settings = self.settings;

        let mut pruned = 0usize;
        let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
            if entry.depth() > 0 && entry.file_type().is_dir() {
                let name = entry.file_name().to_string_lossy();
                if settings.is_ignored_dir(&name) {
                    debug!("Pruning {}", entry.path().display());
                    pruned += 1;
                    return false;
                }
            }
            true
        });

        for entry in walker {
            if cancel.is_cancelled() {
                info!("Scan cancelled");
                stats.cancelled = true;
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    stats.walk_errors += 1;
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                stats.directories_visited += 1;
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            stats.files_seen += 1;
            match self.inspect(entry.path()) {
                Ok(artifact) => {
                    debug!(path = %artifact.path.display(), "Candidate installer");
                    stats.accepted += 1;
                    outcome.artifacts.push(artifact);
                }
                Err(Rejection::Extension) => stats.rejected_extension += 1,
                Err(Rejection::Size) => stats.rejected_size += 1,
                Err(Rejection::Metadata) => stats.rejected_metadata += 1,
                Err(Rejection::Property) => stats.rejected_property += 1,
                Err(Rejection::Generic) => stats.rejected_generic += 1,
                Err(Rejection::Uninstaller) => stats.rejected_uninstaller += 1,
            }
        }
        outcome.stats.directories_pruned = pruned;

        let s = &outcome.stats;
        info!(
            "Scan finished: {} candidates from {} files in {} directories ({} pruned); rejected: {} extension, {} size, {} metadata, {} property, {} generic, {} uninstaller; {} errors",
            s.accepted,
            s.files_seen,
            s.directories_visited,
            s.directories_pruned,
            s.rejected_extension,
            s.rejected_size,
            s.rejected_metadata,
            s.rejected_property,
            s.rejected_generic,
            s.rejected_uninstaller,
            s.walk_errors,
        );
        Ok(outcome)
    }

    /// Run one file through the filter chain.
    fn inspect(&self, path: &Path) -> std::result::Result<DiscoveredArtifact, Rejection> {
        let kind = ArtifactKind::from_path(path).ok_or(Rejection::Extension)?;

        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!("Cannot stat {}: {}", path.display(), e);
                return Err(Rejection::Metadata);
            }
        };
        if size < self.settings.min_file_size_bytes {
            debug!(
                "Skip {}: {} bytes is below threshold",
                path.display(),
                size
            );
            return Err(Rejection::Size);
        }

        let properties = match self.provider.properties(path, kind) {
            Ok(props) => props,
            Err(e) => {
                debug!("Skip {}: {}", path.display(), e);
                return Err(Rejection::Metadata);
            }
        };

        let mut values: Vec<String> = FILTERED_PROPERTIES
            .iter()
            .map(|key| lowered(&properties, key))
            .filter(|v| !v.is_empty())
            .collect();

        if let Some(hit) = first_hit(&self.settings.exclude_by_property_substrings, &values) {
            debug!("Skip {}: property filter '{}'", path.display(), hit);
            return Err(Rejection::Property);
        }
        if let Some(hit) = first_hit(&self.settings.exclude_generic_names, &values) {
            debug!("Skip {}: generic name '{}'", path.display(), hit);
            return Err(Rejection::Generic);
        }

        if let Some(name) = path.file_name() {
            values.push(name.to_string_lossy().to_lowercase());
        }
        if let Some(hit) = first_hit(&self.settings.exclude_uninstaller_hints, &values) {
            debug!("Skip {}: uninstaller hint '{}'", path.display(), hit);
            return Err(Rejection::Uninstaller);
        }

        Ok(DiscoveredArtifact {
            path: path.to_path_buf(),
            kind,
            size: Some(size),
            properties,
        })
    }
}

/// Ensure a scan root exists and is a directory.
pub fn validate_root(root: &Path) -> Result<()> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(ScoutError::InvalidSearchPath {
            path: root.to_path_buf(),
        })
    }
}

fn first_hit<'n>(needles: &'n [String], haystacks: &[String]) -> Option<&'n str> {
    needles
        .iter()
        .find(|needle| haystacks.iter().any(|h| h.contains(needle.as_str())))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::StaticMetadataProvider;
    use std::fs;
    use tempfile::TempDir;

    const MIB: u64 = 1024 * 1024;

    fn sized(dir: &Path, rel: &str, bytes: u64) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let file = fs::File::create(&path).unwrap();
        file.set_len(bytes).unwrap();
        path
    }

    fn settings() -> DetectionSettings {
        DetectionSettings::default().normalized()
    }

    fn scan(root: &Path, provider: &StaticMetadataProvider) -> ScanOutcome {
        let settings = settings();
        DirectoryScanner::new(&settings, provider)
            .scan(root, &CancelToken::new())
            .unwrap()
    }

    #[test]
    fn accepts_installers_and_rejects_other_files() {
        let temp = TempDir::new().unwrap();
        sized(temp.path(), "Setup.exe", 50 * MIB);
        sized(temp.path(), "notes.txt", 50 * MIB);
        let provider = StaticMetadataProvider::new()
            .with_name("setup.exe", [("ProductName", "Widget Installer")]);

        let outcome = scan(temp.path(), &provider);
        assert_eq!(outcome.artifacts.len(), 1);
        assert_eq!(outcome.artifacts[0].file_name(), "Setup.exe");
        assert_eq!(outcome.artifacts[0].size, Some(50 * MIB));
        assert_eq!(outcome.stats.rejected_extension, 1);
    }

    #[test]
    fn never_descends_into_ignored_directories() {
        let temp = TempDir::new().unwrap();
        sized(temp.path(), "app/Setup.exe", 6 * MIB);
        sized(temp.path(), "app/node_modules/pkg/Setup.exe", 6 * MIB);
        sized(temp.path(), "Node_Modules/Setup.exe", 6 * MIB);
        let provider =
            StaticMetadataProvider::new().with_name("setup.exe", [("ProductName", "Widget")]);

        let outcome = scan(temp.path(), &provider);
        assert_eq!(outcome.artifacts.len(), 1);
        for artifact in &outcome.artifacts {
            assert!(!artifact
                .path
                .components()
                .any(|c| c.as_os_str().to_string_lossy().eq_ignore_ascii_case("node_modules")));
        }
        assert_eq!(outcome.stats.directories_pruned, 2);
    }

    #[test]
    fn small_files_are_rejected_before_metadata() {
        let temp = TempDir::new().unwrap();
        sized(temp.path(), "tiny.exe", 1024);
        let provider = StaticMetadataProvider::new();

        let outcome = scan(temp.path(), &provider);
        assert!(outcome.artifacts.is_empty());
        assert_eq!(outcome.stats.rejected_size, 1);
        assert_eq!(outcome.stats.rejected_metadata, 0);
    }

    #[test]
    fn unreadable_metadata_is_skipped() {
        let temp = TempDir::new().unwrap();
        sized(temp.path(), "mystery.exe", 6 * MIB);
        let outcome = scan(temp.path(), &StaticMetadataProvider::new());
        assert!(outcome.artifacts.is_empty());
        assert_eq!(outcome.stats.rejected_metadata, 1);
    }

    #[test]
    fn exclusion_filters_apply_in_order() {
        let temp = TempDir::new().unwrap();
        sized(temp.path(), "vc.exe", 6 * MIB);
        sized(temp.path(), "drv.exe", 6 * MIB);
        sized(temp.path(), "uninstall_widget.exe", 6 * MIB);
        sized(temp.path(), "widget.exe", 6 * MIB);
        let provider = StaticMetadataProvider::new()
            .with_name("vc.exe", [("ProductName", "Microsoft Visual C++ 2019 Runtime")])
            .with_name("drv.exe", [("FileDescription", "Printer Driver")])
            .with_name("uninstall_widget.exe", [("ProductName", "Widget")])
            .with_name("widget.exe", [("ProductName", "Widget")]);

        let outcome = scan(temp.path(), &provider);
        let names: Vec<_> = outcome.artifacts.iter().map(|a| a.file_name()).collect();
        assert_eq!(names, vec!["widget.exe".to_string()]);
        assert_eq!(outcome.stats.rejected_property, 1);
        assert_eq!(outcome.stats.rejected_generic, 1);
        assert_eq!(outcome.stats.rejected_uninstaller, 1);
    }

    #[test]
    fn missing_root_is_invalid_search_path() {
        let temp = TempDir::new().unwrap();
        let settings = settings();
        let provider = StaticMetadataProvider::new();
        let err = DirectoryScanner::new(&settings, &provider)
            .scan(&temp.path().join("missing"), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, ScoutError::InvalidSearchPath { .. }));
    }

    #[test]
    fn cancelled_scan_stops_early() {
        let temp = TempDir::new().unwrap();
        sized(temp.path(), "Setup.exe", 6 * MIB);
        let provider =
            StaticMetadataProvider::new().with_name("setup.exe", [("ProductName", "Widget")]);
        let settings = settings();
        let cancel = CancelToken::new();
        cancel.cancel();

        let outcome = DirectoryScanner::new(&settings, &provider)
            .scan(temp.path(), &cancel)
            .unwrap();
        assert!(outcome.stats.cancelled);
        assert!(outcome.artifacts.is_empty());
    }

    #[test]
    fn display_name_falls_back_to_file_name() {
        let artifact = DiscoveredArtifact {
            path: PathBuf::from("/x/tool.msi"),
            kind: ArtifactKind::Package,
            size: None,
            properties: PropertyMap::new(),
        };
        assert_eq!(artifact.display_name(), "tool.msi");
        assert_eq!(artifact.product_code(), None);
    }
}
