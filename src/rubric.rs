use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    CodeQuality,
    Testing,
    Documentation,
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Dimension::CodeQuality => "code_quality",
            Dimension::Testing => "testing",
            Dimension::Documentation => "documentation",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsMapping {
    pub source_path: String,
    #[serde(default)]
    pub required_fields: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub name: String,
    pub dimension: Dimension,
    pub max_points: u32,
    #[serde(default)]
    pub met: Vec<String>,
    #[serde(default)]
    pub partial: Vec<String>,
    #[serde(default)]
    pub unmet: Vec<String>,
    pub metrics_mapping: MetricsMapping,
}

/// Declarative rubric loaded from TOML (§3.5, §6.3). `#[serde(default)]`
/// everywhere a rubric author might legitimately add metadata this crate
/// doesn't need — the mirror image of the CLI config's strictness, since a
/// typo'd CLI flag should hard-fail but an evolving rubric file shouldn't.
#[derive(Debug, Clone, Deserialize)]
pub struct Rubric {
    #[serde(default)]
    pub checklist_items: Vec<ChecklistItem>,
}

impl Rubric {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::RubricParse(format!("failed to read rubric {}: {e}", path.display()))
        })?;
        let rubric: Rubric = toml::from_str(&content)
            .map_err(|e| Error::RubricParse(format!("failed to parse rubric: {e}")))?;
        rubric.validate()?;
        Ok(rubric)
    }

    fn validate(&self) -> Result<()> {
        if self.checklist_items.is_empty() {
            return Err(Error::RubricParse(
                "rubric must declare at least one checklist item".to_string(),
            ));
        }

        let mut seen_ids = std::collections::HashSet::new();
        for item in &self.checklist_items {
            if !seen_ids.insert(item.id.clone()) {
                return Err(Error::RubricParse(format!("duplicate item id: {}", item.id)));
            }
            if item.met.is_empty() && item.partial.is_empty() && item.unmet.is_empty() {
                return Err(Error::RubricParse(format!(
                    "item {} has no criteria in any status list",
                    item.id
                )));
            }
        }

        let total: u32 = self.checklist_items.iter().map(|i| i.max_points).sum();
        if total != 100 {
            return Err(Error::RubricParse(format!(
                "checklist_items max_points must sum to 100, got {total}"
            )));
        }

        Ok(())
    }
}

/// The bundled rubric shipped alongside the binary, used when no
/// `--checklist-config` override is given.
pub const DEFAULT_RUBRIC: &str = include_str!("../rubric/default.toml");

pub fn load_default() -> Result<Rubric> {
    let rubric: Rubric = toml::from_str(DEFAULT_RUBRIC)
        .map_err(|e| Error::RubricParse(format!("failed to parse bundled rubric: {e}")))?;
    rubric.validate()?;
    Ok(rubric)
}
