use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::{
    Result,
    eyre::{WrapErr, eyre},
};
use gridmate::{
    columns::{ColumnPreferences, ColumnPreset, presets_from_rows},
    config::Settings,
    notify::{NotificationKind, Notifier},
    query::{Filters, Query, SortOrder, Sorter},
};
use serde_json::{Map, Value};

pub mod columns;
pub mod export;
pub mod query;
pub mod view;

pub type Row = Map<String, Value>;

/// Query flags shared by `query`, `export` and `view`.
#[derive(Debug, Clone, clap::Args)]
pub struct QueryArgs {
    /// Free-text search over string and number fields
    #[arg(short, long)]
    pub keyword: Option<String>,

    /// Exact-match filter, FIELD=VALUE (VALUE may be JSON, e.g. tags=["a","b"])
    #[arg(short, long = "filter", value_name = "FIELD=VALUE")]
    pub filters: Vec<String>,

    /// Field to sort by
    #[arg(short, long)]
    pub sort: Option<String>,

    /// Sort direction
    #[arg(long, default_value = "ascend")]
    pub order: SortOrder,

    /// Page to show, starting at 1
    #[arg(long, default_value_t = 1)]
    pub page: usize,

    /// Rows per page (defaults to the configured page size)
    #[arg(long)]
    pub page_size: Option<usize>,
}

impl QueryArgs {
    pub fn to_query(&self, settings: &Settings) -> Result<Query> {
        let mut filters = Filters::new();
        for raw in &self.filters {
            let (field, value) = parse_filter(raw)?;
            filters.insert(field, value);
        }
        Ok(Query {
            page: self.page.max(1),
            page_size: self.page_size.unwrap_or(settings.page_size).max(1),
            keyword: self.keyword.clone(),
            filters,
            sorter: self
                .sort
                .as_ref()
                .map(|field| Sorter::new(field.clone(), self.order)),
        })
    }
}

fn parse_filter(raw: &str) -> Result<(String, Value)> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| eyre!("invalid filter '{raw}', expected FIELD=VALUE"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(eyre!("invalid filter '{raw}', missing field name"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((field.to_string(), value))
}

pub fn load_rows(path: &Path) -> Result<Vec<Row>> {
    let payload = fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read rows from {}", path.display()))?;
    let rows: Vec<Row> = serde_json::from_str(&payload)
        .wrap_err_with(|| format!("{} is not a JSON array of objects", path.display()))?;
    tracing::debug!(path = %path.display(), rows = rows.len(), "Loaded rows");
    Ok(rows)
}

/// Presets from `--presets`, or one per key found in `rows`.
pub fn load_presets(path: Option<&Path>, rows: &[Row]) -> Result<Vec<ColumnPreset>> {
    match path {
        Some(path) => {
            let payload = fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read presets from {}", path.display()))?;
            serde_json::from_str(&payload)
                .wrap_err_with(|| format!("{} is not a JSON array of column presets", path.display()))
        }
        None => Ok(presets_from_rows(rows)),
    }
}

/// `--grid`, or the rows file name without its extension.
pub fn grid_id(grid: Option<&str>, rows_path: &Path) -> String {
    grid.map(str::to_string)
        .or_else(|| {
            rows_path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "grid".to_string())
}

pub fn open_preferences(
    settings: &Settings,
    grid_id: &str,
    presets: Vec<ColumnPreset>,
) -> Result<ColumnPreferences> {
    let storage = settings.preference_storage();
    tracing::debug!(dir = %storage.dir().display(), grid = grid_id, "Opening column preferences");
    let prefs = ColumnPreferences::init_in(
        std::sync::Arc::new(storage),
        &settings.preference_namespace,
        grid_id,
        presets,
        settings.preference_version,
    )?;
    Ok(prefs)
}

pub fn resolve_out_dir(out: Option<PathBuf>) -> PathBuf {
    out.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| std::env::temp_dir()))
}

/// Prints notifications as single stderr lines.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        eprintln!("{kind}: {message}");
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn filters_parse_json_or_fall_back_to_strings() {
        assert_eq!(parse_filter("score=5").unwrap(), ("score".into(), json!(5)));
        assert_eq!(parse_filter("name=Ada").unwrap(), ("name".into(), json!("Ada")));
        assert_eq!(
            parse_filter(r#"tags=["a","b"]"#).unwrap(),
            ("tags".into(), json!(["a", "b"]))
        );
        assert_eq!(parse_filter("note=a=b").unwrap(), ("note".into(), json!("a=b")));
        assert!(parse_filter("novalue").is_err());
        assert!(parse_filter("=x").is_err());
    }

    #[test]
    fn grid_id_defaults_to_file_stem() {
        assert_eq!(grid_id(None, Path::new("/tmp/users.json")), "users");
        assert_eq!(grid_id(Some("audit"), Path::new("/tmp/users.json")), "audit");
    }

    #[test]
    fn query_args_build_a_query() {
        let args = QueryArgs {
            keyword: Some("run".into()),
            filters: vec!["score=5".into()],
            sort: Some("name".into()),
            order: SortOrder::Descend,
            page: 0,
            page_size: None,
        };
        let query = args.to_query(&Settings::default()).unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 10);
        assert_eq!(query.filters.get("score"), Some(&json!(5)));
        assert_eq!(query.active_sort(), Some(("name", SortOrder::Descend)));
    }
}
