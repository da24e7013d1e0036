//! Catalog matching.
//!
//! Assigns scanned artifacts to catalog entries with a greedy,
//! first-claim-wins pass in catalog order, then runs the heuristic scorer
//! over whatever is left.
//!
//! # Signals
//!
//! | Signal | Weight |
//! |--------|--------|
//! | filename or original filename matches an installer pattern | +1 |
//! | expected description found in the file description | +2 |
//! | expected product name found in the product name | +3 |

pub mod glob;
pub mod heuristic;

pub use heuristic::{score, HEURISTIC_THRESHOLD};

use crate::catalog::{Catalog, SoftwareDefinition};
use crate::engine::CancelToken;
use crate::metadata::{keys, lowered};
use crate::scanner::DiscoveredArtifact;
use globset::GlobMatcher;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// An artifact bound to a catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub key: String,
    pub artifact: DiscoveredArtifact,
    pub score: u32,
}

/// A heuristically flagged artifact no catalog entry claimed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnidentifiedArtifact {
    pub artifact: DiscoveredArtifact,
    pub confidence: f64,
}

/// Result of one matching pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchOutcome {
    /// Catalog key to its matched artifact.
    pub matches: BTreeMap<String, MatchResult>,
    /// Probable installers, sorted by lower-cased file name.
    pub unidentified: Vec<UnidentifiedArtifact>,
    /// Set when the pass stopped early.
    pub cancelled: bool,
}

/// Matches artifacts against a catalog.
pub struct CatalogMatcher<'a> {
    catalog: &'a Catalog,
}

impl<'a> CatalogMatcher<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Run the full matching pass.
    ///
    /// Cancellation is checked before each catalog entry; a cancelled pass
    /// keeps the matches made so far and skips the heuristic stage.
    pub fn match_artifacts(
        &self,
        artifacts: &[DiscoveredArtifact],
        cancel: &CancelToken,
    ) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();
        let mut claimed = vec![false; artifacts.len()];

        for def in self.catalog.iter() {
            if cancel.is_cancelled() {
                info!("Matching cancelled");
                outcome.cancelled = true;
                return outcome;
            }

            let patterns = compile_patterns(def);
            let mut best: Option<(usize, u32)> = None;
            for (idx, artifact) in artifacts.iter().enumerate() {
                if claimed[idx] {
                    continue;
                }
                let score = score_signals(def, &patterns, artifact);
                if score == 0 {
                    continue;
                }
                debug!(key = %def.key, file = %artifact.file_name(), score, "Candidate");
                if best.is_none_or(|(_, s)| score > s) {
                    best = Some((idx, score));
                }
            }

            if let Some((idx, score)) = best {
                claimed[idx] = true;
                info!(
                    "Matched '{}' to {} (score {})",
                    def.key,
                    artifacts[idx].file_name(),
                    score
                );
                outcome.matches.insert(
                    def.key.clone(),
                    MatchResult {
                        key: def.key.clone(),
                        artifact: artifacts[idx].clone(),
                        score,
                    },
                );
            } else {
                debug!("No installer matched '{}'", def.key);
            }
        }

        let settings = self.catalog.settings();
        outcome.unidentified = artifacts
            .iter()
            .zip(&claimed)
            .filter(|(_, claimed)| !**claimed)
            .filter_map(|(artifact, _)| {
                let confidence = score(artifact, settings);
                debug!(file = %artifact.file_name(), confidence, "Heuristic");
                (confidence >= HEURISTIC_THRESHOLD).then(|| UnidentifiedArtifact {
                    artifact: artifact.clone(),
                    confidence,
                })
            })
            .collect();
        outcome
            .unidentified
            .sort_by_key(|u| u.artifact.file_name().to_lowercase());

        info!(
            "{} matched, {} probable unidentified installers",
            outcome.matches.len(),
            outcome.unidentified.len()
        );
        outcome
    }
}

/// Weighted identity score of one artifact against one definition.
pub fn signal_score(def: &SoftwareDefinition, artifact: &DiscoveredArtifact) -> u32 {
    score_signals(def, &compile_patterns(def), artifact)
}

/// Installer patterns of `def`. Invalid ones are dropped; a loaded catalog
/// has none.
fn compile_patterns(def: &SoftwareDefinition) -> Vec<GlobMatcher> {
    def.identity
        .installer_patterns
        .iter()
        .filter_map(|p| glob::compile(p).ok())
        .collect()
}

fn score_signals(
    def: &SoftwareDefinition,
    patterns: &[GlobMatcher],
    artifact: &DiscoveredArtifact,
) -> u32 {
    let identity = &def.identity;
    let file_name = artifact.file_name();
    let original = lowered(&artifact.properties, keys::ORIGINAL_FILENAME);
    let description = lowered(&artifact.properties, keys::FILE_DESCRIPTION);
    let product = lowered(&artifact.properties, keys::PRODUCT_NAME);

    let mut score = 0;
    if patterns
        .iter()
        .any(|p| p.is_match(&file_name) || (!original.is_empty() && p.is_match(&original)))
    {
        score += 1;
    }
    if contains_expected(&description, &identity.expected_descriptions) {
        score += 2;
    }
    if contains_expected(&product, &identity.expected_product_names) {
        score += 3;
    }
    score
}

fn contains_expected(value: &str, expected: &[String]) -> bool {
    !value.is_empty()
        && expected
            .iter()
            .map(|e| e.trim().to_lowercase())
            .any(|e| !e.is_empty() && value.contains(&e))
}
