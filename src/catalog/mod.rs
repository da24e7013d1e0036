//! Software catalog: what to look for and how to deploy it.
//!
//! The catalog is constructed once (usually from a YAML file) and handed to
//! the engine. Nothing in the crate mutates it afterwards.
//!
//! # Modules
//!
//! - [`schema`] - Software definitions, identity criteria and detection rules
//! - [`settings`] - Scanner tuning lists
//! - [`loader`] - YAML loading and validation

pub mod loader;
pub mod schema;
pub mod settings;

pub use loader::{load_catalog, parse_catalog, validate_definition};
pub use schema::{
    DetectionRule, Hive, Identity, InstallCommands, SoftwareDefinition,
    INSTALLER_PATH_PLACEHOLDER,
};
pub use settings::DetectionSettings;

use crate::error::Result;

/// An ordered, immutable collection of software definitions.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    settings: DetectionSettings,
    software: Vec<SoftwareDefinition>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate keys.
    pub fn new(settings: DetectionSettings, software: Vec<SoftwareDefinition>) -> Result<Self> {
        loader::check_unique_keys(&software)?;
        Ok(Self {
            settings: settings.normalized(),
            software,
        })
    }

    /// Detection settings for this catalog.
    pub fn settings(&self) -> &DetectionSettings {
        &self.settings
    }

    /// Look up a definition by key.
    pub fn get(&self, key: &str) -> Option<&SoftwareDefinition> {
        self.software.iter().find(|d| d.key == key)
    }

    /// Definitions in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &SoftwareDefinition> {
        self.software.iter()
    }

    /// Keys in catalog order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.software.iter().map(|d| d.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.software.len()
    }

    pub fn is_empty(&self) -> bool {
        self.software.is_empty()
    }
}
