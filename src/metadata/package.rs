//! Installer package (`.msi`) property reader.

use crate::error::{Result, ScoutError};
use crate::metadata::{keys, PropertyMap};
use std::path::Path;
use tracing::debug;

/// Read the Property table and summary information of an installer package.
///
/// The product code, when present, is additionally exposed under
/// [`keys::PACKAGE_PRODUCT_CODE`].
pub fn read_package_properties(path: &Path) -> Result<PropertyMap> {
    let fail = |message: String| ScoutError::Metadata {
        path: path.to_path_buf(),
        message,
    };

    let mut package = msi::open(path).map_err(|e| fail(e.to_string()))?;
    if !package.has_table("Property") {
        return Err(fail("package has no Property table".to_string()));
    }

    let rows = package
        .select_rows(msi::Select::table("Property"))
        .map_err(|e| fail(e.to_string()))?;
    let pairs: Vec<(String, Option<String>)> = rows
        .map(|row| {
            (
                row["Property"].as_str().unwrap_or_default().to_string(),
                row["Value"].as_str().map(str::to_string),
            )
        })
        .collect();
    let mut props = collect_properties(pairs);

    let summary = package.summary_info();
    let summary_fields = [
        ("Summary_Title", summary.title()),
        ("Summary_Subject", summary.subject()),
        ("Summary_Author", summary.author()),
        ("Summary_Comments", summary.comments()),
    ];
    for (name, value) in summary_fields {
        if let Some(value) = value {
            props.insert(name.to_string(), value.trim().to_string());
        }
    }

    debug!(
        "Read {} properties from package {}",
        props.len(),
        path.display()
    );
    Ok(props)
}

/// Build the property map from raw `(Property, Value)` rows.
///
/// Rows without a name or value are dropped; values are trimmed.
pub(crate) fn collect_properties<I>(rows: I) -> PropertyMap
where
    I: IntoIterator<Item = (String, Option<String>)>,
{
    let mut props: PropertyMap = rows
        .into_iter()
        .filter(|(name, _)| !name.is_empty())
        .filter_map(|(name, value)| value.map(|v| (name, v.trim().to_string())))
        .collect();

    if let Some(code) = props.get("ProductCode").cloned() {
        props.insert(keys::PACKAGE_PRODUCT_CODE.to_string(), code);
    }
    props
}
