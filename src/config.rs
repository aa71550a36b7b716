use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::{
    columns::DEFAULT_NAMESPACE,
    export::RemoteExportOptions,
    query::DEFAULT_PAGE_SIZE,
    resize::DEFAULT_MIN_WIDTH,
    storage::FileStorage,
    util::{is_truthy, parse_override},
};

const APPLICATION: &str = "gridmate";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Limits applied by `gridmate export --paged`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportSettings {
    pub page_size: usize,
    pub max_rows: usize,
    pub max_pages: usize,
    pub start_from_current_page: bool,
    pub bom: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        let options = RemoteExportOptions::default();
        Self {
            page_size: options.page_size,
            max_rows: options.max_rows,
            max_pages: options.max_pages,
            start_from_current_page: options.start_from_current_page,
            bom: options.bom,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Rows per page when a query does not say otherwise.
    pub page_size: usize,
    pub min_column_width: f64,
    /// Stored column preferences written under another version are ignored.
    pub preference_version: u32,
    pub preference_namespace: String,
    /// Where column preferences and the viewer log live. Defaults to the
    /// platform data directory.
    pub data_dir: Option<PathBuf>,
    pub export: ExportSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            min_column_width: DEFAULT_MIN_WIDTH,
            preference_version: 1,
            preference_namespace: DEFAULT_NAMESPACE.to_string(),
            data_dir: None,
            export: ExportSettings::default(),
        }
    }
}

impl Settings {
    /// `<config dir>/gridmate/config.json`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APPLICATION).map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load from `path`, or from the default location when it exists, then
    /// apply `GRIDMATE_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|path| path.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        Ok(settings.with_overrides(|name| env::var(name).ok()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let payload = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = serde_json::from_str(&payload).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(width) = parse_override::<f64>(
            "GRIDMATE_MIN_COLUMN_WIDTH",
            lookup("GRIDMATE_MIN_COLUMN_WIDTH").as_deref(),
        ) && width.is_finite()
            && width > 0.0
        {
            self.min_column_width = width;
        }
        if let Some(size) = parse_override(
            "GRIDMATE_EXPORT_PAGE_SIZE",
            lookup("GRIDMATE_EXPORT_PAGE_SIZE").as_deref(),
        ) {
            self.export.page_size = size;
        }
        if let Some(rows) = parse_override(
            "GRIDMATE_EXPORT_MAX_ROWS",
            lookup("GRIDMATE_EXPORT_MAX_ROWS").as_deref(),
        ) {
            self.export.max_rows = rows;
        }
        if let Some(pages) = parse_override(
            "GRIDMATE_EXPORT_MAX_PAGES",
            lookup("GRIDMATE_EXPORT_MAX_PAGES").as_deref(),
        ) {
            self.export.max_pages = pages;
        }
        if let Some(version) = parse_override(
            "GRIDMATE_PREFERENCE_VERSION",
            lookup("GRIDMATE_PREFERENCE_VERSION").as_deref(),
        ) {
            self.preference_version = version;
        }
        if let Some(dir) = lookup("GRIDMATE_DATA_DIR").filter(|dir| !dir.trim().is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if lookup("GRIDMATE_NO_BOM").is_some_and(|value| is_truthy(&value)) {
            self.export.bom = false;
        }
        self
    }

    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone().or_else(|| {
            ProjectDirs::from("", "", APPLICATION).map(|dirs| dirs.data_dir().to_path_buf())
        })
    }

    /// File storage for column preferences, falling back to `./.gridmate`
    /// when no data directory can be resolved.
    pub fn preference_storage(&self) -> FileStorage {
        let base = self
            .data_dir()
            .unwrap_or_else(|| PathBuf::from(".gridmate"));
        FileStorage::new(base.join("preferences"))
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        self.data_dir().map(|dir| dir.join("gridmate.log"))
    }

    pub fn remote_export_options(&self) -> RemoteExportOptions {
        RemoteExportOptions {
            page_size: self.export.page_size,
            max_rows: self.export.max_rows,
            max_pages: self.export.max_pages,
            start_from_current_page: self.export.start_from_current_page,
            bom: self.export.bom,
            ..RemoteExportOptions::default()
        }
    }
}
