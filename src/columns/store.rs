use std::collections::{HashMap, HashSet};

use chrono::Utc;

use super::{
    ColumnPreset, GridColumn, PersistedColumn, PersistedColumnState, PreferenceError,
    is_valid_width, validate_presets,
};
use crate::{
    notify::{self, NotificationKind, NotifierHandle},
    storage::StorageHandle,
};

pub const DEFAULT_NAMESPACE: &str = "grid-columns";

/// Column visibility, order and width of one grid, backed by durable storage.
///
/// The preset list decides which columns exist. Stored state only refines it:
/// keys that are no longer presets are dropped and new presets fall back to
/// their declared defaults. Storage failures never reach the caller; the
/// store keeps working from memory and logs a warning.
pub struct ColumnPreferences {
    storage: StorageHandle,
    storage_key: String,
    grid_id: String,
    version: u32,
    presets: Vec<ColumnPreset>,
    visible: Vec<String>,
    ordered: Vec<String>,
    widths: HashMap<String, f64>,
    persisted: Option<Vec<PersistedColumn>>,
    notifier: Option<NotifierHandle>,
}

impl ColumnPreferences {
    pub fn init(
        storage: StorageHandle,
        grid_id: &str,
        presets: Vec<ColumnPreset>,
        expected_version: u32,
    ) -> Result<Self, PreferenceError> {
        Self::init_in(storage, DEFAULT_NAMESPACE, grid_id, presets, expected_version)
    }

    pub fn init_in(
        storage: StorageHandle,
        namespace: &str,
        grid_id: &str,
        presets: Vec<ColumnPreset>,
        expected_version: u32,
    ) -> Result<Self, PreferenceError> {
        validate_presets(grid_id, &presets)?;
        let mut prefs = Self {
            storage,
            storage_key: format!("{namespace}:{grid_id}"),
            grid_id: grid_id.to_string(),
            version: expected_version,
            visible: default_visible(&presets),
            ordered: default_order(&presets),
            presets,
            widths: HashMap::new(),
            persisted: None,
            notifier: None,
        };
        if let Some(state) = prefs.load() {
            prefs.restore(state);
        }
        Ok(prefs)
    }

    pub fn with_notifier(mut self, notifier: NotifierHandle) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn grid_id(&self) -> &str {
        &self.grid_id
    }

    pub fn presets(&self) -> &[ColumnPreset] {
        &self.presets
    }

    pub fn preset(&self, key: &str) -> Option<&ColumnPreset> {
        self.presets.iter().find(|preset| preset.key == key)
    }

    pub fn visible_keys(&self) -> &[String] {
        &self.visible
    }

    pub fn ordered_keys(&self) -> &[String] {
        &self.ordered
    }

    pub fn is_visible(&self, key: &str) -> bool {
        self.visible.iter().any(|visible| visible == key)
    }

    /// Visible keys in display order.
    pub fn display_keys(&self) -> Vec<&str> {
        self.ordered
            .iter()
            .filter(|key| self.is_visible(key))
            .map(String::as_str)
            .collect()
    }

    /// Committed width of a column, if one was ever stored.
    pub fn width(&self, key: &str) -> Option<f64> {
        self.widths.get(key).copied()
    }

    /// Show exactly `keys`. Keys that are not presets are dropped silently.
    pub fn set_visible_keys<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.visible = self.known_unique(keys);
        self.persist();
    }

    /// Reorder columns. Duplicates keep their first position and presets
    /// missing from `keys` are appended in declaration order.
    pub fn set_ordered_keys<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ordered = self.known_unique(keys);
        for preset in &self.presets {
            if !ordered.contains(&preset.key) {
                ordered.push(preset.key.clone());
            }
        }
        self.ordered = ordered;
        self.persist();
    }

    /// Store a committed width for `key`. Returns false when the key is not a
    /// preset or the width is not a positive finite number.
    pub fn set_width(&mut self, key: &str, width: f64) -> bool {
        if !self.is_preset(key) || !is_valid_width(width) {
            tracing::debug!(grid = %self.grid_id, key, width, "Ignoring column width");
            return false;
        }
        self.widths.insert(key.to_string(), width);
        self.persist();
        true
    }

    /// Restore declared visibility and order and store that as the grid's state.
    pub fn reset_to_default(&mut self) {
        self.visible = default_visible(&self.presets);
        self.ordered = default_order(&self.presets);
        self.persist();
        notify::emit(
            self.notifier.as_ref(),
            NotificationKind::Success,
            "Column settings restored to defaults",
        );
    }

    /// Shape a column list for rendering.
    ///
    /// Preset columns are limited to the visible set, take their committed
    /// width and follow the stored order. The reordered block is placed where
    /// the first preset column appeared; other columns keep their positions
    /// relative to each other.
    pub fn apply_to_columns<C: GridColumn>(&self, columns: &[C]) -> Vec<C> {
        let Some(first) = columns.iter().position(|column| self.is_preset(column.key())) else {
            return columns.to_vec();
        };

        let rank: HashMap<&str, usize> = self
            .ordered
            .iter()
            .enumerate()
            .map(|(idx, key)| (key.as_str(), idx))
            .collect();
        let mut block: Vec<C> = columns
            .iter()
            .filter(|column| self.is_preset(column.key()) && self.is_visible(column.key()))
            .cloned()
            .map(|mut column| {
                if let Some(width) = self.width(column.key())
                    && is_valid_width(width)
                {
                    column.set_width(width);
                }
                column
            })
            .collect();
        block.sort_by_key(|column| rank.get(column.key()).copied().unwrap_or(usize::MAX));

        let mut shaped = Vec::with_capacity(columns.len());
        shaped.extend(columns[..first].iter().cloned());
        shaped.extend(block);
        shaped.extend(columns[first..].iter().filter(|c| !self.is_preset(c.key())).cloned());
        shaped
    }

    fn is_preset(&self, key: &str) -> bool {
        self.preset(key).is_some()
    }

    fn known_unique<I, S>(&self, keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        keys.into_iter()
            .filter_map(|key| {
                let key = key.as_ref();
                (self.preset(key).is_some() && seen.insert(key.to_string()))
                    .then(|| key.to_string())
            })
            .collect()
    }

    fn load(&self) -> Option<PersistedColumnState> {
        let value = match self.storage.get(&self.storage_key) {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(key = %self.storage_key, error = %err, "Failed to read column preferences");
                return None;
            }
        };
        match serde_json::from_value::<PersistedColumnState>(value) {
            Ok(state) if state.version == self.version => Some(state),
            Ok(state) => {
                tracing::debug!(
                    key = %self.storage_key,
                    stored = state.version,
                    expected = self.version,
                    "Discarding column preferences from another version"
                );
                None
            }
            Err(err) => {
                tracing::warn!(key = %self.storage_key, error = %err, "Unreadable column preferences");
                None
            }
        }
    }

    fn restore(&mut self, state: PersistedColumnState) {
        self.visible = self
            .presets
            .iter()
            .filter(|preset| {
                let hidden = state
                    .column(&preset.key)
                    .and_then(|column| column.hidden)
                    .unwrap_or(preset.hidden);
                !hidden
            })
            .map(|preset| preset.key.clone())
            .collect();

        // stable sort: presets without a stored position stay in declaration order at the end
        let mut ordered = default_order(&self.presets);
        ordered.sort_by_key(|key| {
            state
                .column(key)
                .and_then(|column| column.order)
                .unwrap_or(usize::MAX)
        });
        self.ordered = ordered;

        self.widths = state
            .columns
            .iter()
            .filter(|column| self.preset(&column.key).is_some())
            .filter_map(|column| {
                column
                    .width
                    .filter(|width| is_valid_width(*width))
                    .map(|width| (column.key.clone(), width))
            })
            .collect();
        self.persisted = Some(state.columns);
    }

    fn snapshot(&self) -> Vec<PersistedColumn> {
        self.presets
            .iter()
            .map(|preset| PersistedColumn {
                key: preset.key.clone(),
                hidden: Some(!self.is_visible(&preset.key)),
                order: self.ordered.iter().position(|key| *key == preset.key),
                width: self.width(&preset.key),
            })
            .collect()
    }

    fn persist(&mut self) {
        let columns = self.snapshot();
        if self.persisted.as_ref() == Some(&columns) {
            tracing::trace!(key = %self.storage_key, "Column preferences unchanged");
            return;
        }
        let state = PersistedColumnState {
            version: self.version,
            updated_at: Utc::now(),
            columns,
        };
        let value = match serde_json::to_value(&state) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key = %self.storage_key, error = %err, "Failed to encode column preferences");
                return;
            }
        };
        match self.storage.set(&self.storage_key, &value) {
            Ok(()) => {
                tracing::debug!(
                    key = %self.storage_key,
                    visible = self.visible.len(),
                    widths = self.widths.len(),
                    "Saved column preferences"
                );
                self.persisted = Some(state.columns);
            }
            Err(err) => {
                tracing::warn!(key = %self.storage_key, error = %err, "Failed to save column preferences");
            }
        }
    }
}

fn default_visible(presets: &[ColumnPreset]) -> Vec<String> {
    presets
        .iter()
        .filter(|preset| !preset.hidden)
        .map(|preset| preset.key.clone())
        .collect()
}

fn default_order(presets: &[ColumnPreset]) -> Vec<String> {
    presets.iter().map(|preset| preset.key.clone()).collect()
}
