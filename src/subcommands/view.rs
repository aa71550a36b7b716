use std::path::PathBuf;

use color_eyre::Result;
use gridmate::{config::Settings, query::QueryController};

use super::{QueryArgs, grid_id, load_presets, load_rows, open_preferences};
use crate::widgets::{App, GridView};

pub struct Options {
    pub rows: PathBuf,
    pub grid: Option<String>,
    pub presets: Option<PathBuf>,
    pub query: QueryArgs,
}

pub async fn command(settings: &Settings, options: Options) -> Result<()> {
    let rows = load_rows(&options.rows)?;
    let grid = grid_id(options.grid.as_deref(), &options.rows);
    let presets = load_presets(options.presets.as_deref(), &rows)?;
    let prefs = open_preferences(settings, &grid, presets)?;
    let controller = QueryController::new(options.query.to_query(settings)?);
    tracing::info!(grid = %grid, rows = rows.len(), "Opening grid viewer");

    let view = GridView::new(rows, prefs, controller, settings.min_column_width);
    App::new(view).run_tui().await
}
