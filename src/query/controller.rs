use std::sync::Arc;

use super::{Filters, Query, Sorter};

/// Holds the query of one grid view.
///
/// Every mutation swaps in a fresh snapshot, so an `Arc<Query>` handed out
/// earlier never changes under its holder. Changing the keyword, filters or
/// sorter sends the view back to page 1; explicit page navigation does not.
#[derive(Debug, Clone)]
pub struct QueryController {
    initial: Arc<Query>,
    current: Arc<Query>,
}

impl Default for QueryController {
    fn default() -> Self {
        Self::new(Query::default())
    }
}

impl QueryController {
    pub fn new(initial: Query) -> Self {
        let initial = Arc::new(normalize(initial));
        Self {
            current: initial.clone(),
            initial,
        }
    }

    pub fn query(&self) -> Arc<Query> {
        self.current.clone()
    }

    pub fn set_page(&mut self, page: usize, page_size: Option<usize>) {
        self.update(|query| {
            query.page = page;
            if let Some(page_size) = page_size {
                query.page_size = page_size;
            }
        });
    }

    pub fn set_sorter(&mut self, sorter: Option<Sorter>) {
        self.update(|query| {
            query.sorter = sorter;
            query.page = 1;
        });
    }

    pub fn set_filters(&mut self, filters: Option<Filters>) {
        self.update(|query| {
            query.filters = filters.unwrap_or_default();
            query.page = 1;
        });
    }

    pub fn set_keyword(&mut self, keyword: Option<String>) {
        self.update(|query| {
            query.keyword = keyword;
            query.page = 1;
        });
    }

    pub fn reset(&mut self) {
        self.current = self.initial.clone();
    }

    fn update(&mut self, mutate: impl FnOnce(&mut Query)) {
        let mut next = Query::clone(&self.current);
        mutate(&mut next);
        self.current = Arc::new(normalize(next));
        tracing::trace!(
            page = self.current.page,
            page_size = self.current.page_size,
            keyword = ?self.current.keyword,
            filters = self.current.filters.len(),
            sorter = ?self.current.sorter,
            "Query updated"
        );
    }
}

fn normalize(mut query: Query) -> Query {
    query.page = query.page.max(1);
    query.page_size = query.page_size.max(1);
    query
}
