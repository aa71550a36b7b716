use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

mod state;
mod store;

pub use state::{PersistedColumn, PersistedColumnState};
pub use store::{ColumnPreferences, DEFAULT_NAMESPACE};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreferenceError {
    #[error("no column presets configured for grid '{0}'")]
    NoPresets(String),
    #[error("duplicate column preset key '{0}'")]
    DuplicateKey(String),
    #[error("column preset with an empty key")]
    EmptyKey,
}

/// Compile-time declaration of a column that a grid may show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnPreset {
    pub key: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

impl ColumnPreset {
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            width: None,
            hidden: false,
        }
    }

    pub fn width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// A column definition as the rendering layer sees it.
///
/// Columns whose key is not one of the grid's presets (an actions column, a
/// selection checkbox) pass through [`ColumnPreferences::apply_to_columns`]
/// untouched.
pub trait GridColumn: Clone {
    fn key(&self) -> &str;
    fn set_width(&mut self, width: f64);
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub key: String,
    pub title: String,
    pub width: Option<f64>,
}

impl ColumnDef {
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            width: None,
        }
    }
}

impl From<&ColumnPreset> for ColumnDef {
    fn from(preset: &ColumnPreset) -> Self {
        Self {
            key: preset.key.clone(),
            title: preset.title.clone(),
            width: preset.width,
        }
    }
}

impl GridColumn for ColumnDef {
    fn key(&self) -> &str {
        &self.key
    }

    fn set_width(&mut self, width: f64) {
        self.width = Some(width);
    }
}

/// Presets covering every key seen in `rows`, in first-seen order.
pub fn presets_from_rows<'a, I>(rows: I) -> Vec<ColumnPreset>
where
    I: IntoIterator<Item = &'a Map<String, Value>>,
{
    let mut seen = HashSet::new();
    let mut presets = Vec::new();
    for row in rows {
        for key in row.keys() {
            if seen.insert(key.clone()) {
                presets.push(ColumnPreset::new(key.clone(), key.clone()));
            }
        }
    }
    presets
}

pub(crate) fn is_valid_width(width: f64) -> bool {
    width.is_finite() && width > 0.0
}

pub(crate) fn validate_presets(grid_id: &str, presets: &[ColumnPreset]) -> Result<(), PreferenceError> {
    if presets.is_empty() {
        return Err(PreferenceError::NoPresets(grid_id.to_string()));
    }
    let mut keys = HashSet::with_capacity(presets.len());
    for preset in presets {
        if preset.key.is_empty() {
            return Err(PreferenceError::EmptyKey);
        }
        if !keys.insert(preset.key.as_str()) {
            return Err(PreferenceError::DuplicateKey(preset.key.clone()));
        }
    }
    Ok(())
}
