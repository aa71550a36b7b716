use super::{
    CSV_MIME, ExportArtifact, ExportColumn, ExportError, ExportOutcome, ExportStatus, SinkHandle,
    build_csv,
};
use crate::{
    notify::{self, NotificationKind, NotifierHandle},
    record::Record,
};

/// Exports rows that are already in memory.
pub struct LocalExporter {
    sink: SinkHandle,
    notifier: Option<NotifierHandle>,
    allow_empty: bool,
    bom: bool,
    status: ExportStatus,
}

impl LocalExporter {
    pub fn new(sink: SinkHandle) -> Self {
        Self {
            sink,
            notifier: None,
            allow_empty: false,
            bom: true,
            status: ExportStatus::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: NotifierHandle) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Write a header-only file instead of skipping empty exports.
    pub fn allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }

    pub fn bom(mut self, bom: bool) -> Self {
        self.bom = bom;
        self
    }

    pub fn is_in_progress(&self) -> bool {
        self.status.is_in_progress()
    }

    pub fn last_error(&self) -> Option<ExportError> {
        self.status.last_error()
    }

    pub fn export<T: Record>(
        &self,
        rows: &[T],
        columns: &[ExportColumn],
        filename: &str,
    ) -> Result<ExportOutcome, ExportError> {
        let _run = self.status.start()?;
        let result = self.write(rows, columns, filename);
        match &result {
            Ok(ExportOutcome::NothingToExport) => {
                notify::emit(self.notifier.as_ref(), NotificationKind::Info, "No data to export");
            }
            Ok(ExportOutcome::Saved(artifact)) => {
                tracing::info!(
                    filename = %artifact.filename,
                    rows = artifact.rows,
                    bytes = artifact.bytes,
                    "Export finished"
                );
                notify::emit(
                    self.notifier.as_ref(),
                    NotificationKind::Success,
                    &format!("Exported {} rows to {}", artifact.rows, artifact.filename),
                );
            }
            Err(err) => {
                tracing::warn!(filename, error = %err, "Export failed");
                self.status.set_error(Some(err.clone()));
                notify::emit(self.notifier.as_ref(), NotificationKind::Error, &err.to_string());
            }
        }
        result
    }

    fn write<T: Record>(
        &self,
        rows: &[T],
        columns: &[ExportColumn],
        filename: &str,
    ) -> Result<ExportOutcome, ExportError> {
        if rows.is_empty() && !self.allow_empty {
            return Ok(ExportOutcome::NothingToExport);
        }
        let bytes = build_csv(rows, columns, self.bom)?;
        save(&self.sink, filename, &bytes, rows.len())
    }
}

pub(super) fn save(
    sink: &SinkHandle,
    filename: &str,
    bytes: &[u8],
    rows: usize,
) -> Result<ExportOutcome, ExportError> {
    let location = sink
        .save(filename, CSV_MIME, bytes)
        .map_err(|err| ExportError::Save {
            filename: filename.to_string(),
            message: err.to_string(),
        })?;
    Ok(ExportOutcome::Saved(ExportArtifact {
        filename: filename.to_string(),
        location,
        rows,
        bytes: bytes.len(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{Value, json};

    use super::*;
    use crate::{export::MemorySink, notify::testing::RecordingNotifier};

    fn columns() -> Vec<ExportColumn> {
        vec![ExportColumn::new("name", "Name"), ExportColumn::new("score", "Score")]
    }

    #[test]
    fn saves_csv_with_mime() {
        let sink = Arc::new(MemorySink::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let exporter = LocalExporter::new(sink.clone()).with_notifier(notifier.clone());
        let rows: Vec<Value> = vec![json!({"name": "Night Run", "score": 5})];

        let outcome = exporter.export(&rows, &columns(), "runs.csv").unwrap();
        let ExportOutcome::Saved(artifact) = outcome else {
            panic!("expected a saved file");
        };
        assert_eq!(artifact.rows, 1);
        let files = sink.files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, "runs.csv");
        assert_eq!(files[0].1, CSV_MIME);
        assert_eq!(&files[0].2[3..], b"Name,Score\nNight Run,5\n");
        assert_eq!(notifier.kinds(), vec![NotificationKind::Success]);
        assert!(!exporter.is_in_progress());
    }

    #[test]
    fn empty_rows_are_a_soft_condition() {
        let sink = Arc::new(MemorySink::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let exporter = LocalExporter::new(sink.clone()).with_notifier(notifier.clone());
        let outcome = exporter.export::<Value>(&[], &columns(), "runs.csv").unwrap();
        assert_eq!(outcome, ExportOutcome::NothingToExport);
        assert!(sink.is_empty());
        assert_eq!(notifier.kinds(), vec![NotificationKind::Info]);
        assert_eq!(exporter.last_error(), None);
    }

    #[test]
    fn allow_empty_writes_header_only() {
        let sink = Arc::new(MemorySink::new());
        let exporter = LocalExporter::new(sink.clone()).allow_empty(true).bom(false);
        exporter.export::<Value>(&[], &columns(), "runs.csv").unwrap();
        assert_eq!(sink.files()[0].2, b"Name,Score\n");
    }

    #[test]
    fn failures_are_recorded() {
        let sink = Arc::new(MemorySink::new());
        let exporter = LocalExporter::new(sink.clone());
        let rows: Vec<Value> = vec![json!({"name": "x"})];
        assert_eq!(exporter.export(&rows, &[], "x.csv"), Err(ExportError::NoColumns));
        assert_eq!(exporter.last_error(), Some(ExportError::NoColumns));
        assert!(sink.is_empty());
    }
}
