use std::{path::PathBuf, sync::Arc};

use chrono::Local;
use color_eyre::Result;
use gridmate::{
    config::Settings,
    export::{
        DirectorySink, ExportColumn, ExportOutcome, LocalExporter, LocalSource, RemoteExporter,
        default_filename,
    },
    notify::NotifierHandle,
    query::{QueryStrategy, apply_local_query},
    util::abbreviate_home,
};
use humansize::{DECIMAL, format_size};

use super::{
    ConsoleNotifier, QueryArgs, Row, grid_id, load_presets, load_rows, open_preferences,
    resolve_out_dir,
};

pub struct Options {
    pub rows: PathBuf,
    pub grid: Option<String>,
    pub presets: Option<PathBuf>,
    pub query: QueryArgs,
    pub out: Option<PathBuf>,
    pub filename: Option<String>,
    pub allow_empty: bool,
    pub paged: bool,
    pub max_rows: Option<usize>,
    pub max_pages: Option<usize>,
}

pub async fn command(settings: &Settings, options: Options) -> Result<()> {
    let rows = load_rows(&options.rows)?;
    let grid = grid_id(options.grid.as_deref(), &options.rows);
    let presets = load_presets(options.presets.as_deref(), &rows)?;
    let prefs = open_preferences(settings, &grid, presets)?;
    let columns = ExportColumn::from_preferences(&prefs);
    let query = options.query.to_query(settings)?;
    let filename = options
        .filename
        .unwrap_or_else(|| default_filename(&grid, &Local::now()));
    let sink = Arc::new(DirectorySink::new(resolve_out_dir(options.out)));
    let notifier: NotifierHandle = Arc::new(ConsoleNotifier);

    let outcome = if options.paged {
        let mut export_options = settings.remote_export_options();
        export_options.allow_empty = options.allow_empty;
        if let Some(max_rows) = options.max_rows {
            export_options.max_rows = max_rows;
        }
        if let Some(max_pages) = options.max_pages {
            export_options.max_pages = max_pages;
        }
        let exporter = RemoteExporter::new(sink, export_options)
            .with_notifier(notifier)
            .on_progress(|progress| {
                tracing::info!(page = progress.page, rows = progress.rows, "Export progress");
            });

        let cancel = exporter.cancel_handle();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
        let source = LocalSource::new(rows);
        let result = exporter.export::<Row, _>(&source, &query, &columns, &filename).await;
        watcher.abort();
        result?
    } else {
        let exporter = LocalExporter::new(sink)
            .with_notifier(notifier)
            .allow_empty(options.allow_empty)
            .bom(settings.export.bom);
        // every filtered row, not just the current page
        let all = query.with_page(0, 0);
        let result = apply_local_query(&rows, &all, &QueryStrategy::default());
        exporter.export(result.filtered(), &columns, &filename)?
    };

    match outcome {
        ExportOutcome::Saved(artifact) => {
            println!(
                "{} ({} rows, {})",
                abbreviate_home(&artifact.location),
                artifact.rows,
                format_size(artifact.bytes, DECIMAL)
            );
            Ok(())
        }
        ExportOutcome::NothingToExport => Ok(()),
    }
}
