//! Fixtures shared by command tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::parse_catalog;
use crate::engine::{Engine, EngineOptions};
use crate::inspector::{Inspector, MemoryStore};
use crate::metadata::StaticMetadataProvider;
use crate::shell::ScriptedRunner;

pub const MIB: u64 = 1024 * 1024;

pub const WIDGET_KEY: &str = r"SOFTWARE\Vendor\Widget";

pub const CATALOG: &str = r#"
settings:
  min_file_size_bytes: 1048576
software:
  - key: widget
    display_name: Widget Studio
    identity:
      expected_product_names: [Widget]
      installer_patterns: ["Setup*.exe"]
    detection:
      - kind: exists
        path: SOFTWARE\Vendor\Widget
        version_value: Version
    install_commands:
      exe: "{installer_path} /S"
  - key: gizmo
    display_name: Gizmo
    detection:
      - kind: exists
        path: SOFTWARE\Vendor\Gizmo
"#;

/// Create a sparse file of `bytes` length under `dir`.
pub fn sized(dir: &Path, rel: &str, bytes: u64) -> PathBuf {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::File::create(&path).unwrap().set_len(bytes).unwrap();
    path
}

/// Engine over an in-memory store and scripted runner, ledger in memory.
pub fn engine(store: &MemoryStore, runner: ScriptedRunner) -> Arc<Engine> {
    let provider = StaticMetadataProvider::new()
        .with_name("setup.exe", [("ProductName", "Widget Installer")])
        .with_name(
            "install_tool.exe",
            [("ProductName", "Acme Deployer"), ("CompanyName", "Acme")],
        );
    Arc::new(Engine::new(
        parse_catalog(CATALOG).unwrap(),
        Inspector::new(Arc::new(store.clone())),
        Arc::new(runner),
        Arc::new(provider),
        EngineOptions {
            ledger_path: None,
            ..Default::default()
        },
    ))
}
