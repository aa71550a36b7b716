use std::path::PathBuf;

use color_eyre::Result;
use gridmate::{
    columns::presets_from_rows,
    config::Settings,
    query::{QueryStrategy, apply_local_query},
    record::{Record, display_value},
    util::fit,
};
use serde_json::json;
use unicode_width::UnicodeWidthStr;

use super::{QueryArgs, Row, load_rows};

const MAX_CELL_WIDTH: usize = 40;

pub struct Options {
    pub rows: PathBuf,
    pub query: QueryArgs,
    pub json: bool,
}

pub fn command(settings: &Settings, options: Options) -> Result<()> {
    let rows = load_rows(&options.rows)?;
    let query = options.query.to_query(settings)?;
    let result = apply_local_query(&rows, &query, &QueryStrategy::default());

    if options.json {
        let payload = json!({
            "page": query.page,
            "pageSize": query.page_size,
            "total": result.total(),
            "list": result.list(),
        });
        println!("{}", serde_json::to_string(&payload)?);
        return Ok(());
    }

    let keys: Vec<String> = presets_from_rows(&rows).into_iter().map(|p| p.key).collect();
    for line in render_table(&keys, result.list()) {
        println!("{line}");
    }
    let window = result.window();
    if window.is_empty() {
        println!("no rows on page {} ({} total)", query.page, result.total());
    } else {
        println!(
            "rows {}-{} of {} (page {})",
            window.start + 1,
            window.end,
            result.total(),
            query.page
        );
    }
    Ok(())
}

fn render_table(keys: &[String], rows: &[&Row]) -> Vec<String> {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            keys.iter()
                .map(|key| row.field(key).map(display_value).unwrap_or_default())
                .collect()
        })
        .collect();
    let widths: Vec<usize> = keys
        .iter()
        .enumerate()
        .map(|(idx, key)| {
            cells
                .iter()
                .map(|row| row[idx].width())
                .chain(std::iter::once(key.width()))
                .max()
                .unwrap_or(0)
                .min(MAX_CELL_WIDTH)
        })
        .collect();

    let format_line = |values: &mut dyn Iterator<Item = &str>| {
        values
            .zip(&widths)
            .map(|(value, width)| fit(&value.replace('\n', " "), *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(cells.len() + 2);
    lines.push(format_line(&mut keys.iter().map(String::as_str)));
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in &cells {
        lines.push(format_line(&mut row.iter().map(String::as_str)));
    }
    lines
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn row(value: Value) -> Row {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn table_aligns_columns() {
        let rows = [
            row(json!({"name": "Night Run", "score": 5})),
            row(json!({"name": "Lecture"})),
        ];
        let refs: Vec<&Row> = rows.iter().collect();
        let keys = vec!["name".to_string(), "score".to_string()];
        let lines = render_table(&keys, &refs);
        assert_eq!(
            lines,
            vec![
                "name       score",
                "---------  -----",
                "Night Run  5",
                "Lecture",
            ]
        );
    }

    #[test]
    fn long_cells_are_truncated() {
        let long = "x".repeat(100);
        let rows = [row(json!({ "note": long }))];
        let refs: Vec<&Row> = rows.iter().collect();
        let lines = render_table(&["note".to_string()], &refs);
        assert_eq!(lines[2].chars().count(), MAX_CELL_WIDTH);
        assert!(lines[2].ends_with('…'));
    }
}
