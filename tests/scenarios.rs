use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use gridmate::{
    columns::{ColumnPreferences, ColumnPreset},
    export::{
        ExportColumn, ExportError, ExportOutcome, MemorySink, Page, RemoteExportOptions,
        RemoteExporter, SourceError,
    },
    query::{Query, QueryStrategy, apply_local_query},
    resize::{ColumnResizer, HeaderSurface},
    storage::{MemoryStorage, PreferenceStorage},
};
use serde_json::{Map, Value, json};

type Row = Map<String, Value>;

fn rows(value: Value) -> Vec<Row> {
    serde_json::from_value(value).unwrap()
}

#[derive(Default)]
struct Header {
    widths: HashMap<String, f64>,
}

impl HeaderSurface for Header {
    fn rendered_width(&self, key: &str) -> Option<f64> {
        self.widths.get(key).copied()
    }

    fn preview_width(&mut self, key: &str, width: f64) {
        self.widths.insert(key.to_string(), width);
    }
}

#[test]
fn keyword_search_matches_across_fields() {
    let rows = rows(json!([
        {"name": "Night Run", "score": 5},
        {"name": "Lecture", "score": 9},
    ]));
    let query = Query::default().with_keyword("run");
    let result = apply_local_query(&rows, &query, &QueryStrategy::default());
    assert_eq!(result.total(), 1);
    assert_eq!(result.filtered()[0]["name"], json!("Night Run"));
}

#[test]
fn second_page_is_the_second_slice() {
    let rows = rows(Value::Array((0..25).map(|id| json!({ "id": id })).collect()));
    let query = Query::default().with_page(2, 10);
    let result = apply_local_query(&rows, &query, &QueryStrategy::default());
    assert_eq!(result.total(), 25);
    let ids: Vec<&Value> = result.list().iter().map(|row| &row["id"]).collect();
    let expected: Vec<Value> = (10..20).map(|id| json!(id)).collect();
    assert_eq!(ids, expected.iter().collect::<Vec<_>>());
}

#[test]
fn stale_preference_version_falls_back_to_defaults() {
    let storage = Arc::new(MemoryStorage::new());
    storage
        .set(
            "grid-columns:audit",
            &json!({
                "version": 1,
                "updatedAt": "2026-01-01T00:00:00Z",
                "columns": [
                    {"key": "a", "hidden": true, "order": 2, "width": 300.0},
                    {"key": "b", "order": 0},
                    {"key": "c", "order": 1},
                ],
            }),
        )
        .unwrap();
    let presets = vec![
        ColumnPreset::new("a", "A"),
        ColumnPreset::new("b", "B"),
        ColumnPreset::new("c", "C"),
    ];

    let current = ColumnPreferences::init(storage.clone(), "audit", presets.clone(), 1).unwrap();
    assert_eq!(current.visible_keys(), ["b", "c"]);
    assert_eq!(current.width("a"), Some(300.0));

    let upgraded = ColumnPreferences::init(storage, "audit", presets, 2).unwrap();
    assert_eq!(upgraded.visible_keys(), ["a", "b", "c"]);
    assert_eq!(upgraded.ordered_keys(), ["a", "b", "c"]);
    assert_eq!(upgraded.width("a"), None);
}

#[tokio::test]
async fn short_page_ends_a_paged_export() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = requests.clone();
    let source = move |query: Query| {
        log.lock().unwrap().push(query.page);
        async move {
            let count = match query.page {
                1 => 500,
                2 => 120,
                _ => 0,
            };
            Ok::<_, SourceError>(Page::new(vec![json!({"id": query.page}); count], None))
        }
    };
    let sink = Arc::new(MemorySink::new());
    let exporter = RemoteExporter::new(sink.clone(), RemoteExportOptions::default());

    let rows = exporter
        .fetch_all::<Value, _>(&source, &Query::default())
        .await
        .unwrap();
    assert_eq!(rows.len(), 620);
    assert_eq!(*requests.lock().unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn row_ceiling_aborts_before_saving() {
    let source = |query: Query| async move {
        let start = (query.page - 1) * query.page_size;
        let end = (start + query.page_size).min(500);
        let list = (start..end).map(|id| json!({ "id": id })).collect();
        Ok::<_, SourceError>(Page::new(list, Some(500)))
    };
    let sink = Arc::new(MemorySink::new());
    let options = RemoteExportOptions {
        page_size: 50,
        max_rows: 100,
        ..RemoteExportOptions::default()
    };
    let exporter = RemoteExporter::new(sink.clone(), options);

    let err = exporter
        .export::<Value, _>(
            &source,
            &Query::default(),
            &[ExportColumn::new("id", "ID")],
            "ids.csv",
        )
        .await
        .unwrap_err();
    assert_eq!(err, ExportError::RowLimitExceeded { limit: 100 });
    assert!(sink.is_empty());
    assert_eq!(exporter.last_error(), Some(err));
    assert!(!exporter.is_in_progress());
}

#[tokio::test]
async fn full_export_writes_every_page() {
    let source = |query: Query| async move {
        let start = (query.page - 1) * query.page_size;
        let end = (start + query.page_size).min(7);
        let list = (start..end).map(|id| json!({ "id": id })).collect();
        Ok::<_, SourceError>(Page::new(list, Some(7)))
    };
    let sink = Arc::new(MemorySink::new());
    let options = RemoteExportOptions {
        page_size: 3,
        bom: false,
        ..RemoteExportOptions::default()
    };
    let exporter = RemoteExporter::new(sink.clone(), options);

    let outcome = exporter
        .export::<Value, _>(
            &source,
            &Query::default(),
            &[ExportColumn::new("id", "ID")],
            "ids.csv",
        )
        .await
        .unwrap();
    let ExportOutcome::Saved(artifact) = outcome else {
        panic!("expected a saved file");
    };
    assert_eq!(artifact.rows, 7);
    let files = sink.files();
    assert_eq!(files.len(), 1);
    assert_eq!(String::from_utf8(files[0].2.clone()).unwrap(), "ID\n0\n1\n2\n3\n4\n5\n6\n");
}

#[test]
fn resize_commits_on_release_only() {
    let mut prefs = ColumnPreferences::init(
        MemoryStorage::handle(),
        "runs",
        vec![ColumnPreset::new("name", "Name").width(150.0)],
        1,
    )
    .unwrap();
    let mut header = Header::default();
    header.widths.insert("name".into(), 150.0);

    let mut resizer = ColumnResizer::default();
    assert!(resizer.begin("name", 400.0, &header));
    assert_eq!(resizer.pointer_moved(420.0, &mut header), Some(170.0));
    assert_eq!(resizer.end(440.0, &mut prefs), Some(190.0));
    assert_eq!(prefs.width("name"), Some(190.0));

    assert!(resizer.begin("name", 400.0, &header));
    resizer.pointer_moved(500.0, &mut header);
    resizer.abandon();
    assert_eq!(prefs.width("name"), Some(190.0));
    assert!(!resizer.is_dragging());
}
