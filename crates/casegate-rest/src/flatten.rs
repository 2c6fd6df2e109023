//! Page envelope → tabular rows.
//!
//! The column list is an accumulator shared by every page of one query: the
//! first property bag seen fixes it, and every later row is projected onto
//! exactly those columns (missing keys become `null`). Rows therefore always
//! have the same keys in the same order.

use crate::envelope::{Page, Row};
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct ResponseFlattener {
    projection: Option<Vec<String>>,
}

impl ResponseFlattener {
    /// Columns come from the first entry's property bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns fixed up front, regardless of what the entries carry.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            projection: Some(columns.into_iter().map(Into::into).collect()),
        }
    }

    /// Flatten one page, filling `columns` if it is still empty.
    ///
    /// Entries without a property bag are skipped, not emitted as empty rows.
    /// An empty bag never fixes the columns; its row is projected onto
    /// whatever columns are known.
    pub fn flatten(&self, page: &Page, columns: &mut Vec<String>) -> Vec<Row> {
        if columns.is_empty() {
            match &self.projection {
                Some(projection) => columns.extend(projection.iter().cloned()),
                None => {
                    if let Some(first) = page
                        .entries
                        .iter()
                        .filter_map(|e| e.properties())
                        .find(|properties| !properties.is_empty())
                    {
                        columns.extend(first.keys().cloned());
                    }
                }
            }
        }

        page.entries
            .iter()
            .filter_map(|entry| entry.properties())
            .map(|properties| project(properties, columns.as_slice()))
            .collect()
    }

    /// Flatten a page on its own (fresh column list).
    pub fn flatten_page(&self, page: &Page) -> (Vec<String>, Vec<Row>) {
        let mut columns = Vec::new();
        let rows = self.flatten(page, &mut columns);
        (columns, rows)
    }
}

/// `row` restricted to `columns`, in column order; missing keys become `null`.
pub fn project(row: &Row, columns: &[String]) -> Row {
    columns
        .iter()
        .map(|column| {
            let value = row.get(column).cloned().unwrap_or(Value::Null);
            (column.clone(), value)
        })
        .collect()
}
