use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

/// Field access used by the default keyword, filter, sort and export accessors.
///
/// Rows never need to implement this when every accessor is supplied through a
/// [`QueryStrategy`](crate::query::QueryStrategy), but most callers hold
/// JSON-shaped records and get the defaults for free.
pub trait Record {
    /// Value of a single field, `None` when the row has no such field.
    fn field(&self, name: &str) -> Option<&Value>;

    /// Every field value in the row's natural order.
    fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_>;
}

impl<T: Record + ?Sized> Record for &T {
    fn field(&self, name: &str) -> Option<&Value> {
        (**self).field(name)
    }

    fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        (**self).values()
    }
}

impl Record for Map<String, Value> {
    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }

    fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        Box::new(Map::values(self))
    }
}

impl Record for Value {
    fn field(&self, name: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(name))
    }

    fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self.as_object() {
            Some(map) => Box::new(map.values()),
            None => Box::new(std::iter::empty()),
        }
    }
}

impl Record for HashMap<String, Value> {
    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }

    fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        Box::new(HashMap::values(self))
    }
}

impl Record for BTreeMap<String, Value> {
    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }

    fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        Box::new(BTreeMap::values(self))
    }
}

/// Render a cell value the way it is shown and exported.
///
/// Strings are taken verbatim, null becomes the empty string, arrays of
/// scalars are joined with `", "` and anything else falls back to compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Number(num) => num.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) if items.iter().all(is_scalar) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}
