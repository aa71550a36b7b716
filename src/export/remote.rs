use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;

use super::{
    ExportColumn, ExportError, ExportOutcome, ExportStatus, SinkHandle, build_csv, local::save,
};
use crate::{
    notify::{self, NotificationKind, NotifierHandle},
    query::{Query, QueryStrategy, apply_local_query},
    record::Record,
};

pub const DEFAULT_EXPORT_PAGE_SIZE: usize = 500;
pub const DEFAULT_MAX_ROWS: usize = 100_000;
pub const DEFAULT_MAX_PAGES: usize = 1_000;

/// One page of a paged source. `total` is the size of the whole result when
/// the source knows it.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub list: Vec<T>,
    pub total: Option<usize>,
}

impl<T> Page<T> {
    pub fn new(list: Vec<T>, total: Option<usize>) -> Self {
        Self { list, total }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct SourceError(pub String);

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A paged row provider. Closures `Fn(Query) -> impl Future<Output =
/// Result<Page<T>, SourceError>>` are sources too.
#[async_trait]
pub trait RowSource<T: Send>: Send + Sync {
    async fn fetch_page(&self, query: &Query) -> Result<Page<T>, SourceError>;
}

#[async_trait]
impl<T, F, Fut> RowSource<T> for F
where
    T: Send + 'static,
    F: Fn(Query) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Page<T>, SourceError>> + Send + 'static,
{
    async fn fetch_page(&self, query: &Query) -> Result<Page<T>, SourceError> {
        (self)(query.clone()).await
    }
}

/// Serves pages of an in-memory row set through the local query engine.
pub struct LocalSource<T> {
    rows: Vec<T>,
    strategy: QueryStrategy<T>,
}

impl<T> LocalSource<T> {
    pub fn new(rows: Vec<T>) -> Self {
        Self {
            rows,
            strategy: QueryStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: QueryStrategy<T>) -> Self {
        self.strategy = strategy;
        self
    }
}

#[async_trait]
impl<T> RowSource<T> for LocalSource<T>
where
    T: Record + Clone + Send + Sync,
{
    async fn fetch_page(&self, query: &Query) -> Result<Page<T>, SourceError> {
        let result = apply_local_query(&self.rows, query, &self.strategy);
        Ok(Page::new(
            result.list().iter().map(|row| (*row).clone()).collect(),
            Some(result.total()),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteExportOptions {
    pub page_size: usize,
    pub max_rows: usize,
    pub max_pages: usize,
    /// Start at the query's page instead of page 1.
    pub start_from_current_page: bool,
    pub allow_empty: bool,
    pub bom: bool,
}

impl Default for RemoteExportOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_EXPORT_PAGE_SIZE,
            max_rows: DEFAULT_MAX_ROWS,
            max_pages: DEFAULT_MAX_PAGES,
            start_from_current_page: false,
            allow_empty: false,
            bom: true,
        }
    }
}

impl RemoteExportOptions {
    fn validate(&self) -> Result<(), ExportError> {
        if self.page_size == 0 {
            return Err(ExportError::InvalidOptions("page size must be at least 1".into()));
        }
        if self.max_rows == 0 || self.max_pages == 0 {
            return Err(ExportError::InvalidOptions("limits must be at least 1".into()));
        }
        Ok(())
    }
}

/// Cooperative cancellation flag shared with the export loop.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportProgress {
    pub page: usize,
    pub rows: usize,
    pub total: Option<usize>,
}

pub type ProgressFn = Arc<dyn Fn(ExportProgress) + Send + Sync>;

/// Walks a paged source to the end and exports everything it returned.
pub struct RemoteExporter {
    options: RemoteExportOptions,
    sink: SinkHandle,
    notifier: Option<NotifierHandle>,
    progress: Option<ProgressFn>,
    cancel: CancelHandle,
    status: ExportStatus,
}

impl RemoteExporter {
    pub fn new(sink: SinkHandle, options: RemoteExportOptions) -> Self {
        Self {
            options,
            sink,
            notifier: None,
            progress: None,
            cancel: CancelHandle::new(),
            status: ExportStatus::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: NotifierHandle) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn on_progress(mut self, progress: impl Fn(ExportProgress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    pub fn options(&self) -> &RemoteExportOptions {
        &self.options
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_in_progress(&self) -> bool {
        self.status.is_in_progress()
    }

    pub fn last_error(&self) -> Option<ExportError> {
        self.status.last_error()
    }

    /// Collect every row `source` yields for `query`, one page at a time.
    ///
    /// Stops once the reported total is reached or a page comes back empty or
    /// shorter than the page size. Fails when the row or page ceiling is
    /// crossed or the cancel handle fires between pages.
    pub async fn fetch_all<T, S>(&self, source: &S, query: &Query) -> Result<Vec<T>, ExportError>
    where
        T: Send,
        S: RowSource<T> + ?Sized,
    {
        let RemoteExportOptions {
            page_size,
            max_rows,
            max_pages,
            start_from_current_page,
            ..
        } = self.options;
        self.options.validate()?;

        let mut page = if start_from_current_page {
            query.page.max(1)
        } else {
            1
        };
        let mut fetched = 0usize;
        let mut rows = Vec::new();
        loop {
            if self.cancel.is_canceled() {
                return Err(ExportError::Canceled);
            }
            fetched += 1;
            if fetched > max_pages {
                return Err(ExportError::PageLimitExceeded { limit: max_pages });
            }

            let request = query.clone().with_page(page, page_size);
            let Page { list, total } = source
                .fetch_page(&request)
                .await
                .map_err(|err| ExportError::Source {
                    page,
                    message: err.to_string(),
                })?;
            let received = list.len();
            rows.extend(list);
            tracing::trace!(page, received, rows = rows.len(), ?total, "Fetched export page");
            if let Some(progress) = &self.progress {
                progress(ExportProgress {
                    page,
                    rows: rows.len(),
                    total,
                });
            }

            if rows.len() > max_rows {
                return Err(ExportError::RowLimitExceeded { limit: max_rows });
            }
            if let Some(total) = total
                && rows.len() >= total
            {
                break;
            }
            // a short page is taken as the last one
            if received < page_size {
                break;
            }
            page += 1;
        }
        rows.truncate(max_rows);
        Ok(rows)
    }

    /// Fetch everything and save it as CSV through the sink.
    pub async fn export<T, S>(
        &self,
        source: &S,
        query: &Query,
        columns: &[ExportColumn],
        filename: &str,
    ) -> Result<ExportOutcome, ExportError>
    where
        T: Record + Send,
        S: RowSource<T> + ?Sized,
    {
        let _run = self.status.start()?;
        let result = self.fetch_and_save(source, query, columns, filename).await;
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
            Err(ExportError::Canceled) => {
                self.status.set_error(Some(ExportError::Canceled));
                notify::emit(self.notifier.as_ref(), NotificationKind::Info, "Export canceled");
            }
            Err(err) => {
                tracing::warn!(filename, error = %err, "Export failed");
                self.status.set_error(Some(err.clone()));
                notify::emit(self.notifier.as_ref(), NotificationKind::Error, &err.to_string());
            }
        }
        result
    }

    async fn fetch_and_save<T, S>(
        &self,
        source: &S,
        query: &Query,
        columns: &[ExportColumn],
        filename: &str,
    ) -> Result<ExportOutcome, ExportError>
    where
        T: Record + Send,
        S: RowSource<T> + ?Sized,
    {
        if columns.is_empty() {
            return Err(ExportError::NoColumns);
        }
        let rows = self.fetch_all(source, query).await?;
        if rows.is_empty() && !self.options.allow_empty {
            return Ok(ExportOutcome::NothingToExport);
        }
        if self.cancel.is_canceled() {
            return Err(ExportError::Canceled);
        }
        let bytes = build_csv(&rows, columns, self.options.bom)?;
        save(&self.sink, filename, &bytes, rows.len())
    }
}
