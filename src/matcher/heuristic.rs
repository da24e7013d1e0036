//! Confidence scoring for installers no catalog entry claimed.

use crate::catalog::DetectionSettings;
use crate::metadata::{keys, lowered, ArtifactKind};
use crate::scanner::DiscoveredArtifact;

/// Minimum score for an unclaimed artifact to be reported.
pub const HEURISTIC_THRESHOLD: f64 = 0.5;

const BASE: f64 = 0.3;
const MIB: u64 = 1024 * 1024;

const PACKAGE_PATCH_WORDS: &[&str] = &["patch", "update", "hotfix", "security update"];
const PACKAGE_DEPENDENCY_WORDS: &[&str] = &["runtime", "redist", "merge module", "driver"];
const GENERIC_PACKAGE_WORDS: &[&str] = &["install", "setup", "package"];
const INSTALLER_FILENAME_WORDS: &[&str] =
    &["setup", "install", "installer", "wizard", "web", "online"];
const GENERIC_PROPERTY_WORDS: &[&str] = &["install", "setup", "package", "wizard"];
const GENERIC_COMPANIES: &[&str] = &["", "microsoft corporation"];

/// Score an artifact in `[0, 1]`; higher means more likely a real product installer.
pub fn score(artifact: &DiscoveredArtifact, settings: &DetectionSettings) -> f64 {
    let product = lowered(&artifact.properties, keys::PRODUCT_NAME);
    let mut score = BASE;

    match artifact.kind {
        ArtifactKind::Package => {
            score += 0.3;
            if contains_any(&product, PACKAGE_PATCH_WORDS) {
                score -= 0.4;
            }
            if contains_any(&product, PACKAGE_DEPENDENCY_WORDS) {
                score -= 0.5;
            }
            if !product.is_empty() && !contains_any(&product, GENERIC_PACKAGE_WORDS) {
                score += 0.1;
            }
        }
        ArtifactKind::Executable => {
            let file_name = artifact.file_name().to_lowercase();
            let hints = &settings.exclude_uninstaller_hints;

            if contains_any(&file_name, INSTALLER_FILENAME_WORDS) {
                score += 0.25;
            }
            if hints.iter().any(|h| file_name.contains(h.as_str())) {
                score -= 0.35;
            }

            match artifact.size {
                Some(size) if size > 100 * MIB => score += 0.15,
                Some(size) if size > 10 * MIB => score += 0.10,
                Some(size) if size < settings.min_file_size_bytes => score -= 0.15,
                Some(_) => {}
                None => score -= 0.1,
            }

            let description = lowered(&artifact.properties, keys::FILE_DESCRIPTION);
            let company = lowered(&artifact.properties, keys::COMPANY_NAME);

            if !product.is_empty() && !contains_any(&product, GENERIC_PROPERTY_WORDS) {
                score += 0.15;
            }
            if !description.is_empty() && !contains_any(&description, GENERIC_PROPERTY_WORDS) {
                score += 0.10;
            }
            if hints
                .iter()
                .any(|h| product.contains(h.as_str()) || description.contains(h.as_str()))
            {
                score -= 0.30;
            }
            if GENERIC_COMPANIES.contains(&company.as_str()) {
                score -= 0.05;
            }
        }
    }

    score.clamp(0.0, 1.0)
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{property_map, PropertyMap};
    use std::path::PathBuf;

    fn artifact(name: &str, kind: ArtifactKind, size: Option<u64>, props: PropertyMap) -> DiscoveredArtifact {
        DiscoveredArtifact {
            path: PathBuf::from("/installers").join(name),
            kind,
            size,
            properties: props,
        }
    }

    fn settings() -> DetectionSettings {
        DetectionSettings::default().normalized()
    }

    #[test]
    fn readme_viewer_is_below_threshold() {
        let a = artifact(
            "readme_viewer.exe",
            ArtifactKind::Executable,
            Some(2 * MIB),
            property_map([("FileDescription", "readme tool")]),
        );
        let s = score(&a, &settings());
        // 0.3 - 0.15 (small) + 0.10 (description) - 0.05 (no company)
        assert!((s - 0.2).abs() < 1e-9, "score was {s}");
        assert!(s < HEURISTIC_THRESHOLD);
    }

    #[test]
    fn large_named_setup_is_probable() {
        let a = artifact(
            "ReservoirSetup.exe",
            ArtifactKind::Executable,
            Some(300 * MIB),
            property_map([
                ("ProductName", "Reservoir Studio"),
                ("FileDescription", "Reservoir Studio"),
                ("CompanyName", "Acme"),
            ]),
        );
        let s = score(&a, &settings());
        // 0.3 + 0.25 + 0.15 + 0.15 + 0.10
        assert!((s - 0.95).abs() < 1e-9, "score was {s}");
    }

    #[test]
    fn package_with_specific_name_scores_high() {
        let a = artifact(
            "thing.msi",
            ArtifactKind::Package,
            Some(20 * MIB),
            property_map([("ProductName", "Reservoir Studio")]),
        );
        assert!((score(&a, &settings()) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn runtime_package_is_clamped_at_zero() {
        let a = artifact(
            "rt.msi",
            ArtifactKind::Package,
            Some(20 * MIB),
            property_map([("ProductName", "Security Update for Runtime Redist")]),
        );
        assert_eq!(score(&a, &settings()), 0.0);
    }

    #[test]
    fn unreadable_size_is_penalised() {
        let props = property_map([("CompanyName", "Acme")]);
        let known = artifact("tool.exe", ArtifactKind::Executable, Some(6 * MIB), props.clone());
        let unknown = artifact("tool.exe", ArtifactKind::Executable, None, props);
        let diff = score(&known, &settings()) - score(&unknown, &settings());
        assert!((diff - 0.1).abs() < 1e-9);
    }

    #[test]
    fn score_stays_in_unit_interval() {
        let names = ["setup.exe", "uninstall.exe", "x.msi", "web_online_setup_wizard.exe"];
        let sizes = [None, Some(0), Some(6 * MIB), Some(50 * MIB), Some(500 * MIB)];
        let products = ["", "Widget", "Setup Package", "Patch Update Driver"];
        for name in names {
            let kind = ArtifactKind::from_path(std::path::Path::new(name)).unwrap();
            for size in sizes {
                for product in products {
                    let a = artifact(
                        name,
                        kind,
                        size,
                        property_map([("ProductName", product), ("FileDescription", product)]),
                    );
                    let s = score(&a, &settings());
                    assert!((0.0..=1.0).contains(&s), "{name} {size:?} {product}: {s}");
                }
            }
        }
    }
}
