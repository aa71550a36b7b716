use std::{path::PathBuf, sync::Arc};

use color_eyre::{Result, eyre::eyre};
use gridmate::{columns::ColumnPreferences, config::Settings};

use super::{ConsoleNotifier, load_presets, load_rows, open_preferences};

#[derive(Debug, Clone, clap::Subcommand)]
pub enum Action {
    /// Print every column with its visibility, position and width
    Show {
        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },
    /// Hide columns
    Hide { keys: Vec<String> },
    /// Show hidden columns again
    Unhide { keys: Vec<String> },
    /// Set the display order; unlisted columns keep their relative order at the end
    Order { keys: Vec<String> },
    /// Store a column width
    Width { key: String, width: f64 },
    /// Restore declared visibility and order
    Reset,
}

pub struct Options {
    pub grid: String,
    pub presets: Option<PathBuf>,
    pub rows: Option<PathBuf>,
    pub action: Action,
}

pub fn command(settings: &Settings, options: Options) -> Result<()> {
    let rows = match &options.rows {
        Some(path) => load_rows(path)?,
        None => Vec::new(),
    };
    if options.presets.is_none() && rows.is_empty() {
        return Err(eyre!("pass --presets or --rows so the grid's columns are known"));
    }
    let presets = load_presets(options.presets.as_deref(), &rows)?;
    let mut prefs =
        open_preferences(settings, &options.grid, presets)?.with_notifier(Arc::new(ConsoleNotifier));

    match options.action {
        Action::Show { json } => return show(&prefs, json),
        Action::Hide { keys } => {
            ensure_known(&prefs, &keys)?;
            let visible: Vec<String> = prefs
                .visible_keys()
                .iter()
                .filter(|key| !keys.contains(*key))
                .cloned()
                .collect();
            prefs.set_visible_keys(visible);
        }
        Action::Unhide { keys } => {
            ensure_known(&prefs, &keys)?;
            let mut visible = prefs.visible_keys().to_vec();
            visible.extend(keys);
            prefs.set_visible_keys(visible);
        }
        Action::Order { keys } => {
            ensure_known(&prefs, &keys)?;
            prefs.set_ordered_keys(keys);
        }
        Action::Width { key, width } => {
            if !prefs.set_width(&key, width) {
                return Err(eyre!("cannot set width {width} on column '{key}'"));
            }
        }
        Action::Reset => prefs.reset_to_default(),
    }
    show(&prefs, false)
}

fn ensure_known(prefs: &ColumnPreferences, keys: &[String]) -> Result<()> {
    match keys.iter().find(|key| prefs.preset(key).is_none()) {
        Some(key) => Err(eyre!(
            "unknown column '{key}' for grid '{}'",
            prefs.grid_id()
        )),
        None => Ok(()),
    }
}

fn show(prefs: &ColumnPreferences, json: bool) -> Result<()> {
    if json {
        let columns: Vec<serde_json::Value> = prefs
            .ordered_keys()
            .iter()
            .map(|key| {
                serde_json::json!({
                    "key": key,
                    "visible": prefs.is_visible(key),
                    "width": prefs.width(key),
                })
            })
            .collect();
        println!("{}", serde_json::to_string(&columns)?);
        return Ok(());
    }
    for key in prefs.ordered_keys() {
        let marker = if prefs.is_visible(key) { "x" } else { " " };
        match prefs.width(key) {
            Some(width) => println!("[{marker}] {key} ({width})"),
            None => println!("[{marker}] {key}"),
        }
    }
    Ok(())
}
