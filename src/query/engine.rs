use std::{cmp::Ordering, fmt, ops::Range};

use serde_json::Value;

use super::{Filters, Query, SortOrder, compare::default_compare, is_empty_filter};
use crate::record::{Record, display_value};

pub type SearchTextFn<T> = Box<dyn Fn(&T) -> String + Send + Sync>;
pub type FilterFn<T> = Box<dyn Fn(&T, &Filters) -> bool + Send + Sync>;
pub type SortValueFn<T> = Box<dyn Fn(&T, &str) -> Option<Value> + Send + Sync>;
pub type CompareFn = Box<dyn Fn(Option<&Value>, Option<&Value>) -> Ordering + Send + Sync>;

/// Caller-supplied accessors for the local query pipeline.
///
/// Every slot is optional; an empty slot falls back to the documented default,
/// which reads the row through [`Record`].
pub struct QueryStrategy<T> {
    /// Text searched by the keyword stage. Default: every string and number
    /// field of the row joined by a space.
    pub search_text: Option<SearchTextFn<T>>,
    /// Row predicate for the filter stage. Default: [`default_filter_match`].
    pub matches_filters: Option<FilterFn<T>>,
    /// Value a row sorts by for a given field. Default: direct field access.
    pub sort_value: Option<SortValueFn<T>>,
    /// Ascending comparator. Default: [`default_compare`].
    pub compare: Option<CompareFn>,
    pub trim_keyword: bool,
    pub lowercase: bool,
}

impl<T> Default for QueryStrategy<T> {
    fn default() -> Self {
        Self {
            search_text: None,
            matches_filters: None,
            sort_value: None,
            compare: None,
            trim_keyword: true,
            lowercase: true,
        }
    }
}

impl<T> fmt::Debug for QueryStrategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryStrategy")
            .field("search_text", &self.search_text.is_some())
            .field("matches_filters", &self.matches_filters.is_some())
            .field("sort_value", &self.sort_value.is_some())
            .field("compare", &self.compare.is_some())
            .field("trim_keyword", &self.trim_keyword)
            .field("lowercase", &self.lowercase)
            .finish()
    }
}

impl<T> QueryStrategy<T> {
    pub fn with_search_text(mut self, f: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        self.search_text = Some(Box::new(f));
        self
    }

    pub fn with_filter(mut self, f: impl Fn(&T, &Filters) -> bool + Send + Sync + 'static) -> Self {
        self.matches_filters = Some(Box::new(f));
        self
    }

    pub fn with_sort_value(
        mut self,
        f: impl Fn(&T, &str) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.sort_value = Some(Box::new(f));
        self
    }

    pub fn with_compare(
        mut self,
        f: impl Fn(Option<&Value>, Option<&Value>) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.compare = Some(Box::new(f));
        self
    }

    pub fn trim_keyword(mut self, trim: bool) -> Self {
        self.trim_keyword = trim;
        self
    }

    pub fn lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    fn normalize(&self, text: &str) -> String {
        let text = if self.trim_keyword { text.trim() } else { text };
        if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        }
    }
}

/// Output of [`apply_local_query`].
///
/// `filtered` is the complete keyword/filter/sort result and `list` is the
/// page window inside it, so the window is always a contiguous sub-slice.
#[derive(Debug, Clone)]
pub struct LocalQueryResult<'a, T> {
    filtered: Vec<&'a T>,
    window: Range<usize>,
}

impl<'a, T> LocalQueryResult<'a, T> {
    fn empty() -> Self {
        Self {
            filtered: Vec::new(),
            window: 0..0,
        }
    }

    pub fn filtered(&self) -> &[&'a T] {
        &self.filtered
    }

    pub fn total(&self) -> usize {
        self.filtered.len()
    }

    pub fn list(&self) -> &[&'a T] {
        &self.filtered[self.window.clone()]
    }

    pub fn window(&self) -> Range<usize> {
        self.window.clone()
    }
}

/// Run keyword matching, filtering, sorting and paging over `rows`, in that order.
///
/// The input is never reordered or mutated; identical inputs always produce
/// identical outputs.
pub fn apply_local_query<'a, T: Record>(
    rows: &'a [T],
    query: &Query,
    strategy: &QueryStrategy<T>,
) -> LocalQueryResult<'a, T> {
    if rows.is_empty() {
        return LocalQueryResult::empty();
    }

    let mut filtered: Vec<&'a T> = rows.iter().collect();

    if let Some(keyword) = query.keyword.as_deref()
        && !keyword.trim().is_empty()
    {
        let needle = strategy.normalize(keyword);
        filtered.retain(|row| {
            let haystack = match &strategy.search_text {
                Some(extract) => extract(*row),
                None => default_search_text(*row),
            };
            strategy.normalize(&haystack).contains(&needle)
        });
        tracing::trace!(keyword = %needle, remaining = filtered.len(), "Keyword stage");
    }

    if !query.filters.is_empty() {
        filtered.retain(|row| match &strategy.matches_filters {
            Some(matches) => matches(*row, &query.filters),
            None => default_filter_match(*row, &query.filters),
        });
        tracing::trace!(
            filters = query.filters.len(),
            remaining = filtered.len(),
            "Filter stage"
        );
    }

    if let Some((field, order)) = query.active_sort() {
        sort_rows(&mut filtered, field, order, strategy);
        tracing::trace!(field, order = %order, "Sort stage");
    }

    let window = page_window(filtered.len(), query.page, query.page_size);
    tracing::trace!(
        total = filtered.len(),
        start = window.start,
        end = window.end,
        "Paging stage"
    );
    LocalQueryResult { filtered, window }
}

/// The default search text: string and number fields joined by a single space.
pub fn default_search_text<T: Record + ?Sized>(row: &T) -> String {
    row.values()
        .filter(|value| value.is_string() || value.is_number())
        .map(display_value)
        .collect::<Vec<_>>()
        .join(" ")
}

/// The default filter predicate.
///
/// Blank filter values are skipped. An array filter accepts a row whose value
/// is one of its members; when the row value is itself an array, any shared
/// member is enough. A scalar filter requires equality, or membership when the
/// row value is an array. Every remaining filter key has to match.
pub fn default_filter_match<T: Record + ?Sized>(row: &T, filters: &Filters) -> bool {
    filters.iter().all(|(field, expected)| {
        if is_empty_filter(expected) {
            return true;
        }
        let Some(actual) = row.field(field) else {
            return false;
        };
        match (expected, actual) {
            (Value::Array(options), Value::Array(items)) => options
                .iter()
                .any(|option| items.iter().any(|item| values_equal(option, item))),
            (Value::Array(options), actual) => {
                options.iter().any(|option| values_equal(option, actual))
            }
            (expected, Value::Array(items)) => items.iter().any(|item| values_equal(expected, item)),
            (expected, actual) => values_equal(expected, actual),
        }
    })
}

/// Equality that treats `1` and `1.0` as the same number.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        _ => a == b,
    }
}

fn sort_rows<T: Record>(
    rows: &mut Vec<&T>,
    field: &str,
    order: SortOrder,
    strategy: &QueryStrategy<T>,
) {
    let mut keyed: Vec<(Option<Value>, &T)> = rows
        .iter()
        .map(|row| {
            let value = match &strategy.sort_value {
                Some(extract) => extract(*row, field),
                None => row.field(field).cloned(),
            };
            (value, *row)
        })
        .collect();

    // slice::sort_by is stable, equal keys keep their pre-sort order in both directions
    keyed.sort_by(|(a, _), (b, _)| {
        let ordering = match &strategy.compare {
            Some(compare) => compare(a.as_ref(), b.as_ref()),
            None => default_compare(a.as_ref(), b.as_ref()),
        };
        match order {
            SortOrder::Ascend => ordering,
            SortOrder::Descend => ordering.reverse(),
        }
    });

    rows.clear();
    rows.extend(keyed.into_iter().map(|(_, row)| row));
}

/// Slice bounds of a page, clamped to `total`. A zero page or page size selects everything.
pub fn page_window(total: usize, page: usize, page_size: usize) -> Range<usize> {
    if page == 0 || page_size == 0 {
        return 0..total;
    }
    let start = (page - 1).saturating_mul(page_size).min(total);
    let end = page.saturating_mul(page_size).min(total);
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Sorter;
    use serde_json::{Value, json};

    fn rows(values: Value) -> Vec<Value> {
        match values {
            Value::Array(items) => items,
            _ => panic!("expected array"),
        }
    }

    fn names(result: &[&Value]) -> Vec<String> {
        result
            .iter()
            .map(|row| row["name"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn empty_query_preserves_input_order() {
        let data = rows(json!([{"name": "c"}, {"name": "a"}, {"name": "b"}]));
        let query = Query::default().with_page(1, 100);
        let result = apply_local_query(&data, &query, &QueryStrategy::default());
        assert_eq!(names(result.filtered()), vec!["c", "a", "b"]);
        assert_eq!(result.total(), 3);
    }

    #[test]
    fn empty_rows_short_circuit() {
        let data: Vec<Value> = Vec::new();
        let result = apply_local_query(&data, &Query::default(), &QueryStrategy::default());
        assert_eq!(result.total(), 0);
        assert!(result.list().is_empty());
        assert!(result.filtered().is_empty());
    }

    #[test]
    fn keyword_matches_number_fields_and_ignores_others() {
        let data = rows(json!([
            {"name": "alpha", "code": 4711, "tags": ["needle"]},
            {"name": "beta", "code": 12}
        ]));
        let query = Query::default().with_keyword("471");
        let result = apply_local_query(&data, &query, &QueryStrategy::default());
        assert_eq!(names(result.filtered()), vec!["alpha"]);

        let query = Query::default().with_keyword("needle");
        let result = apply_local_query(&data, &query, &QueryStrategy::default());
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn keyword_normalization_is_configurable() {
        let data = rows(json!([{"name": "Night Run"}]));
        let query = Query::default().with_keyword("RUN");
        let strict = QueryStrategy::default().lowercase(false);
        assert_eq!(apply_local_query(&data, &query, &strict).total(), 0);
        let relaxed = QueryStrategy::default();
        assert_eq!(apply_local_query(&data, &query, &relaxed).total(), 1);
    }

    #[test]
    fn untrimmed_keyword_keeps_its_whitespace() {
        let data = rows(json!([{"name": "Nightrun"}, {"name": "Night run"}]));
        let query = Query::default().with_keyword(" run");
        let untrimmed = QueryStrategy::default().trim_keyword(false);
        let result = apply_local_query(&data, &query, &untrimmed);
        assert_eq!(names(result.filtered()), vec!["Night run"]);
        let trimmed = QueryStrategy::default();
        assert_eq!(apply_local_query(&data, &query, &trimmed).total(), 2);
    }

    #[test]
    fn blank_keyword_is_ignored_without_trimming() {
        let data = rows(json!([{"name": "a"}, {"name": "b"}]));
        let query = Query::default().with_keyword("   ");
        let untrimmed = QueryStrategy::default().trim_keyword(false);
        assert_eq!(apply_local_query(&data, &query, &untrimmed).total(), 2);
    }

    #[test]
    fn custom_search_text_replaces_default() {
        let data = rows(json!([{"name": "one", "owner": "zoe"}, {"name": "two", "owner": "max"}]));
        let strategy = QueryStrategy::default()
            .with_search_text(|row: &Value| row["owner"].as_str().unwrap_or_default().to_string());
        let query = Query::default().with_keyword("zoe");
        let result = apply_local_query(&data, &query, &strategy);
        assert_eq!(names(result.filtered()), vec!["one"]);
    }

    #[test]
    fn scalar_filter_requires_equality() {
        let data = rows(json!([
            {"name": "a", "status": "open", "level": 1},
            {"name": "b", "status": "closed", "level": 1.0},
            {"name": "c", "status": "open", "level": 2}
        ]));
        let query = Query::default()
            .with_filter("status", json!("open"))
            .with_filter("level", json!(1));
        let result = apply_local_query(&data, &query, &QueryStrategy::default());
        assert_eq!(names(result.filtered()), vec!["a"]);
    }

    #[test]
    fn array_filter_accepts_members() {
        let data = rows(json!([
            {"name": "a", "status": "open"},
            {"name": "b", "status": "closed"},
            {"name": "c", "status": "draft"}
        ]));
        let query = Query::default().with_filter("status", json!(["open", "draft"]));
        let result = apply_local_query(&data, &query, &QueryStrategy::default());
        assert_eq!(names(result.filtered()), vec!["a", "c"]);
    }

    #[test]
    fn filter_value_matches_inside_row_arrays() {
        let data = rows(json!([
            {"name": "a", "roles": ["admin", "ops"]},
            {"name": "b", "roles": ["ops"]},
            {"name": "c"}
        ]));
        let query = Query::default().with_filter("roles", json!("admin"));
        let result = apply_local_query(&data, &query, &QueryStrategy::default());
        assert_eq!(names(result.filtered()), vec!["a"]);

        let query = Query::default().with_filter("roles", json!(["ops", "dev"]));
        let result = apply_local_query(&data, &query, &QueryStrategy::default());
        assert_eq!(names(result.filtered()), vec!["a", "b"]);
    }

    #[test]
    fn blank_filter_values_are_ignored() {
        let data = rows(json!([{"name": "a"}, {"name": "b"}]));
        let query = Query::default()
            .with_filter("status", json!(""))
            .with_filter("roles", json!([]))
            .with_filter("owner", Value::Null);
        let result = apply_local_query(&data, &query, &QueryStrategy::default());
        assert_eq!(result.total(), 2);
    }

    #[test]
    fn custom_filter_predicate() {
        let data = rows(json!([{"name": "a", "score": 3}, {"name": "b", "score": 8}]));
        let strategy = QueryStrategy::default().with_filter(|row: &Value, filters: &Filters| {
            let min = filters.get("minScore").and_then(Value::as_i64).unwrap_or(0);
            row["score"].as_i64().unwrap_or(0) >= min
        });
        let query = Query::default().with_filter("minScore", json!(5));
        let result = apply_local_query(&data, &query, &strategy);
        assert_eq!(names(result.filtered()), vec!["b"]);
    }

    #[test]
    fn sort_is_stable_in_both_directions() {
        let data = rows(json!([
            {"name": "a1", "group": 2},
            {"name": "b1", "group": 1},
            {"name": "a2", "group": 2},
            {"name": "b2", "group": 1}
        ]));
        let ascend = Query::default()
            .with_page(1, 10)
            .with_sorter(Sorter::new("group", SortOrder::Ascend));
        let result = apply_local_query(&data, &ascend, &QueryStrategy::default());
        assert_eq!(names(result.filtered()), vec!["b1", "b2", "a1", "a2"]);

        let descend = Query::default()
            .with_page(1, 10)
            .with_sorter(Sorter::new("group", SortOrder::Descend));
        let result = apply_local_query(&data, &descend, &QueryStrategy::default());
        assert_eq!(names(result.filtered()), vec!["a1", "a2", "b1", "b2"]);
    }

    #[test]
    fn sorter_without_order_keeps_input_order() {
        let data = rows(json!([{"name": "b"}, {"name": "a"}]));
        let query = Query::default().with_sorter(Sorter {
            field: Some("name".into()),
            order: None,
        });
        let result = apply_local_query(&data, &query, &QueryStrategy::default());
        assert_eq!(names(result.filtered()), vec!["b", "a"]);
    }

    #[test]
    fn custom_sort_value_and_comparator() {
        let data = rows(json!([{"name": "bb"}, {"name": "a"}, {"name": "ccc"}]));
        let strategy = QueryStrategy::default()
            .with_sort_value(|row: &Value, field| {
                row[field].as_str().map(|text| Value::from(text.len()))
            })
            .with_compare(|a, b| {
                let a = a.and_then(Value::as_u64).unwrap_or(0);
                let b = b.and_then(Value::as_u64).unwrap_or(0);
                b.cmp(&a)
            });
        let query = Query::default().with_sorter(Sorter::new("name", SortOrder::Ascend));
        let result = apply_local_query(&data, &query, &strategy);
        assert_eq!(names(result.filtered()), vec!["ccc", "bb", "a"]);
    }

    #[test]
    fn input_rows_are_not_reordered() {
        let data = rows(json!([{"name": "b"}, {"name": "a"}]));
        let query = Query::default().with_sorter(Sorter::new("name", SortOrder::Ascend));
        let _ = apply_local_query(&data, &query, &QueryStrategy::default());
        assert_eq!(data[0]["name"], "b");
    }

    #[test]
    fn page_beyond_range_is_empty_with_total() {
        let data = rows(json!([{"name": "a"}, {"name": "b"}, {"name": "c"}]));
        let query = Query::default().with_page(5, 2);
        let result = apply_local_query(&data, &query, &QueryStrategy::default());
        assert_eq!(result.total(), 3);
        assert!(result.list().is_empty());
    }

    #[test]
    fn invalid_paging_includes_everything() {
        let data = rows(json!([{"name": "a"}, {"name": "b"}, {"name": "c"}]));
        let query = Query::default().with_page(0, 2);
        let result = apply_local_query(&data, &query, &QueryStrategy::default());
        assert_eq!(result.list().len(), 3);
        let query = Query::default().with_page(1, 0);
        let result = apply_local_query(&data, &query, &QueryStrategy::default());
        assert_eq!(result.list().len(), 3);
    }

    #[test]
    fn page_window_clamps() {
        assert_eq!(page_window(25, 3, 10), 20..25);
        assert_eq!(page_window(25, 4, 10), 25..25);
        assert_eq!(page_window(0, 1, 10), 0..0);
        assert_eq!(page_window(5, usize::MAX, usize::MAX), 5..5);
    }
}
