use std::{
    path::PathBuf,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use chrono::{DateTime, TimeZone};

use crate::{
    columns::{ColumnPreferences, ColumnPreset},
    util::sanitize_component,
};

mod encode;
mod local;
mod remote;
mod sink;

pub use encode::{CSV_MIME, UTF8_BOM, build_csv};
pub use local::LocalExporter;
pub use remote::{
    CancelHandle, ExportProgress, LocalSource, Page, ProgressFn, RemoteExportOptions,
    RemoteExporter, RowSource, SourceError,
};
pub use sink::{DirectorySink, FileSink, MemorySink, SinkHandle};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportError {
    #[error("no visible columns to export")]
    NoColumns,
    #[error("invalid export options: {0}")]
    InvalidOptions(String),
    #[error("an export is already running")]
    AlreadyRunning,
    #[error("export aborted: more than {limit} rows")]
    RowLimitExceeded { limit: usize },
    #[error("export aborted: more than {limit} pages")]
    PageLimitExceeded { limit: usize },
    #[error("export canceled")]
    Canceled,
    #[error("failed to fetch page {page}: {message}")]
    Source { page: usize, message: String },
    #[error("failed to encode CSV: {0}")]
    Encode(String),
    #[error("failed to save {filename}: {message}")]
    Save { filename: String, message: String },
}

/// A column as it appears in an exported file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportColumn {
    pub key: String,
    pub title: String,
}

impl ExportColumn {
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
        }
    }

    /// Visible columns of a grid in display order.
    pub fn from_preferences(prefs: &ColumnPreferences) -> Vec<Self> {
        prefs
            .display_keys()
            .into_iter()
            .filter_map(|key| prefs.preset(key))
            .map(Self::from)
            .collect()
    }
}

impl From<&ColumnPreset> for ExportColumn {
    fn from(preset: &ColumnPreset) -> Self {
        Self::new(preset.key.clone(), preset.title.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub filename: String,
    pub location: PathBuf,
    pub rows: usize,
    pub bytes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    /// No rows and empty exports are not allowed; nothing was written.
    NothingToExport,
    Saved(ExportArtifact),
}

/// `<grid>_<YYYYmmddHHMMSS>.csv`
pub fn default_filename<Tz: TimeZone>(grid_id: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}_{}.csv",
        sanitize_component(grid_id, "export"),
        at.format("%Y%m%d%H%M%S")
    )
}

/// In-progress flag and last failure of one exporter.
#[derive(Debug, Default)]
pub struct ExportStatus {
    in_progress: AtomicBool,
    last_error: Mutex<Option<ExportError>>,
}

impl ExportStatus {
    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub fn last_error(&self) -> Option<ExportError> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn start(&self) -> Result<RunGuard<'_>, ExportError> {
        if self.in_progress.swap(true, Ordering::AcqRel) {
            return Err(ExportError::AlreadyRunning);
        }
        self.set_error(None);
        Ok(RunGuard(self))
    }

    fn set_error(&self, error: Option<ExportError>) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = error;
    }
}

/// Clears the in-progress flag when the run ends, however it ends.
struct RunGuard<'a>(&'a ExportStatus);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.in_progress.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn default_filename_is_stable() {
        let at = NaiveDate::from_ymd_opt(2026, 3, 4)
            .unwrap()
            .and_hms_opt(5, 6, 7)
            .unwrap()
            .and_utc();
        assert_eq!(default_filename("Audit Log", &at), "audit_log_20260304050607.csv");
        assert_eq!(default_filename("///", &at), "export_20260304050607.csv");
        assert!(default_filename("users", &Utc::now()).starts_with("users_"));
    }

    #[test]
    fn export_columns_follow_visible_order() {
        let mut prefs = ColumnPreferences::init(
            MemoryStorage::handle(),
            "users",
            vec![
                ColumnPreset::new("name", "Name"),
                ColumnPreset::new("email", "Email"),
                ColumnPreset::new("role", "Role").hidden(),
            ],
            1,
        )
        .unwrap();
        prefs.set_ordered_keys(["email", "role", "name"]);
        let columns = ExportColumn::from_preferences(&prefs);
        assert_eq!(
            columns,
            vec![ExportColumn::new("email", "Email"), ExportColumn::new("name", "Name")]
        );
    }

    #[test]
    fn status_tracks_runs_and_errors() {
        let status = ExportStatus::default();
        {
            let _run = status.start().unwrap();
            assert!(status.is_in_progress());
            assert_eq!(status.start().err(), Some(ExportError::AlreadyRunning));
            status.set_error(Some(ExportError::Canceled));
        }
        assert!(!status.is_in_progress());
        assert_eq!(status.last_error(), Some(ExportError::Canceled));
        let _run = status.start().unwrap();
        assert_eq!(status.last_error(), None);
    }
}
