//! Introspection: listing and describing installed extensions.

use std::fmt::{self, Write as _};

use serde::Serialize;

use super::facade::ExtensionRepository;
use crate::error::Result;
use crate::extension::ExtensionUnit;
use crate::types::DEFAULT_COLLECTION;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Load state of an installed extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionState {
    Ready,
    Degraded,
    Broken,
}

/// One row of `tabext list --format json`.
#[derive(Debug, Clone, Serialize)]
pub struct ExtensionSummary {
    pub collection: Option<String>,
    pub name: String,
    pub repository: String,
    pub enabled: bool,
    pub usage: String,
    pub state: ExtensionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Everything `tabext show` prints about one extension.
#[derive(Debug, Clone, Serialize)]
pub struct ExtensionDetails {
    pub name: String,
    pub repository: String,
    pub enabled: bool,
    pub install_location: String,
    pub install_time: String,
    pub doc: String,
}

impl fmt::Display for ExtensionDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "  repository: {}", self.repository)?;
        writeln!(f, "  enabled:    {}", self.enabled)?;
        writeln!(f, "  installed:  {} from {}", self.install_time, self.install_location)?;
        writeln!(f)?;
        write!(f, "{}", self.doc)
    }
}

fn summarize(unit: &ExtensionUnit) -> ExtensionSummary {
    let collection = (unit.collection() != DEFAULT_COLLECTION).then(|| unit.collection().to_string());
    let base = ExtensionSummary {
        collection,
        name: unit.name().to_string(),
        repository: unit.repository().to_string(),
        enabled: false,
        usage: format!("{}(...)", unit.qualified_name().call_path()),
        state: ExtensionState::Broken,
        detail: None,
    };

    match unit.get_callable() {
        Ok(function) => ExtensionSummary {
            enabled: function.is_enabled(),
            usage: function.usage().to_string(),
            state: if function.is_degraded() {
                ExtensionState::Degraded
            } else {
                ExtensionState::Ready
            },
            detail: function
                .missing_dependency()
                .map(|missing| format!("module: {} needs to be installed", missing.module)),
            ..base
        },
        Err(e) => ExtensionSummary {
            detail: Some(e.to_string()),
            ..base
        },
    }
}

fn listing_line(summary: &ExtensionSummary) -> String {
    let mut line = summary.usage.clone();
    if let Some(detail) = &summary.detail {
        line.push_str("  - Currently doesn't work because ");
        line.push_str(detail);
    }
    if summary.state != ExtensionState::Broken && !summary.enabled {
        line.push_str(" (disabled)");
    }
    line
}

impl ExtensionRepository {
    /// One record per indexed extension, default collection first.
    pub fn summaries(&self) -> Vec<ExtensionSummary> {
        let default = self.index().collection(DEFAULT_COLLECTION).into_iter();
        let others = self
            .index()
            .collections()
            .filter(|(name, _)| *name != DEFAULT_COLLECTION)
            .map(|(_, collection)| collection);
        default
            .chain(others)
            .flat_map(|collection| collection.values())
            .map(|unit| summarize(unit))
            .collect()
    }

    /// Human-readable overview of everything installed.
    pub fn list_all(&self) -> String {
        let mut out = format!("tabext v{}\n", VERSION);
        let total = self.index().len();
        if total == 0 {
            out.push_str("No extensions are installed\n");
            return out;
        }
        if total == 1 {
            out.push_str("There is 1 extension installed:\n\n");
        } else {
            let _ = writeln!(out, "There are {} extensions installed:\n", total);
        }

        if let Some(collection) = self.index().collection(DEFAULT_COLLECTION) {
            for unit in collection.values() {
                let _ = writeln!(out, "  {}", listing_line(&summarize(unit)));
            }
        }
        for (name, collection) in self.index().collections() {
            if name == DEFAULT_COLLECTION || collection.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\nCollection: {}", name);
            for unit in collection.values() {
                let _ = writeln!(out, "  {}", listing_line(&summarize(unit)));
            }
        }

        out.push_str("\nFor help on individual extensions, use tabext show <extension name>\n");
        out
    }

    /// Usage, documentation, and provenance of one extension.
    pub fn show(&self, name: &str) -> Result<ExtensionDetails> {
        let unit = self.unit(name)?;
        let manifest = unit.manifest()?;
        let function = unit.get_callable()?;
        Ok(ExtensionDetails {
            name: unit.qualified_name().to_string(),
            repository: unit.repository().to_string(),
            enabled: function.is_enabled(),
            install_location: manifest.install_location,
            install_time: manifest.install_time,
            doc: function.doc().to_string(),
        })
    }
}
