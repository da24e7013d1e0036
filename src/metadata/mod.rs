//! Artifact metadata extraction.
//!
//! A [`MetadataProvider`] turns an installer file into a flat property map.
//! Two native backends exist, selected by [`ArtifactKind`]:
//!
//! - [`version_resource`] reads the version resource embedded in executables
//! - [`package`] reads the Property table and summary stream of installer packages
//!
//! A failed read is always an error, never a partial map.

pub mod package;
pub mod version_resource;

use crate::error::{Result, ScoutError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

/// Flat property name to value map.
pub type PropertyMap = BTreeMap<String, String>;

/// Well-known property names.
pub mod keys {
    pub const PRODUCT_NAME: &str = "ProductName";
    pub const FILE_DESCRIPTION: &str = "FileDescription";
    pub const ORIGINAL_FILENAME: &str = "OriginalFilename";
    pub const COMPANY_NAME: &str = "CompanyName";
    pub const PRODUCT_VERSION: &str = "ProductVersion";
    pub const FILE_VERSION: &str = "FileVersion";
    /// Package product code, copied out of the Property table.
    pub const PACKAGE_PRODUCT_CODE: &str = "MSI_ProductCode";
}

/// Installer artifact type, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// `.exe` installer.
    #[serde(rename = ".exe")]
    Executable,
    /// `.msi` installer package.
    #[serde(rename = ".msi")]
    Package,
}

impl ArtifactKind {
    /// Classify a path by extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "exe" => Some(ArtifactKind::Executable),
            "msi" => Some(ArtifactKind::Package),
            _ => None,
        }
    }

    /// Dotted extension, as shown to users and stored in the ledger.
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Executable => ".exe",
            ArtifactKind::Package => ".msi",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Extracts descriptive properties from an installer artifact.
pub trait MetadataProvider: Send + Sync {
    /// Read the property map for `path`, or fail.
    fn properties(&self, path: &Path, kind: ArtifactKind) -> Result<PropertyMap>;
}

/// Reads real files using the native backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeMetadataProvider;

impl MetadataProvider for NativeMetadataProvider {
    fn properties(&self, path: &Path, kind: ArtifactKind) -> Result<PropertyMap> {
        match kind {
            ArtifactKind::Executable => version_resource::read_version_info(path),
            ArtifactKind::Package => package::read_package_properties(path),
        }
    }
}

/// In-memory provider for tests and dry runs.
///
/// Lookups try the full path first, then the bare file name
/// (case-insensitive). Anything unregistered fails like an unreadable file.
#[derive(Debug, Default, Clone)]
pub struct StaticMetadataProvider {
    by_path: HashMap<PathBuf, PropertyMap>,
    by_name: HashMap<String, PropertyMap>,
}

impl StaticMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register properties for an exact path.
    pub fn insert_path(&mut self, path: impl Into<PathBuf>, props: PropertyMap) {
        self.by_path.insert(path.into(), props);
    }

    /// Register properties for any file with this name.
    pub fn insert_name(&mut self, name: &str, props: PropertyMap) {
        self.by_name.insert(name.to_lowercase(), props);
    }

    /// Builder form of [`insert_name`](Self::insert_name).
    pub fn with_name<I, K, V>(mut self, name: &str, props: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.insert_name(name, property_map(props));
        self
    }
}

impl MetadataProvider for StaticMetadataProvider {
    fn properties(&self, path: &Path, _kind: ArtifactKind) -> Result<PropertyMap> {
        if let Some(props) = self.by_path.get(path) {
            return Ok(props.clone());
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.by_name
            .get(&name)
            .cloned()
            .ok_or_else(|| ScoutError::Metadata {
                path: path.to_path_buf(),
                message: "no version information".to_string(),
            })
    }
}

/// Build a [`PropertyMap`] from pairs.
pub fn property_map<I, K, V>(pairs: I) -> PropertyMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Lower-cased value of a property, empty when absent.
pub fn lowered(props: &PropertyMap, key: &str) -> String {
    props
        .get(key)
        .map(|v| v.trim().to_lowercase())
        .unwrap_or_default()
}
