use crate::database::Database;
use crate::entry::Entry;
use crate::error::SheetDbError;
use crate::options::JoinMode;
use crate::store::TabularStore;
use tracing::debug;

/// Splits `"Table.column"` at the first dot.
fn split_qualified(header: &str) -> Option<(&str, &str)> {
    header.split_once('.')
}

/// Columns fetched from `table`: the join key plus every column qualified with the table name.
fn side_columns<'a>(table: &str, key: &'a str, headers: &[&'a str]) -> Vec<&'a str> {
    let mut columns = vec![key];
    columns.extend(headers.iter().filter_map(|header| match split_qualified(header) {
        Some((qualifier, column)) if qualifier == table => Some(column),
        _ => None,
    }));
    columns
}

/// Unqualified output column names, in the order requested.
fn output_columns<'a>(headers: &[&'a str]) -> Vec<&'a str> {
    headers
        .iter()
        .map(|header| split_qualified(header).map(|(_, column)| column).unwrap_or(header))
        .collect()
}

impl<S: TabularStore> Database<S> {
    /// Joins two tables on equal values of `key`.
    ///
    /// Right-hand fields overwrite left-hand fields of the same name. The pairing of
    /// rows follows [`DatabaseOptions::join_mode`](crate::DatabaseOptions::join_mode):
    /// by default every left row yields exactly one result row, merged with the first
    /// right row whose key is equal, or left as-is when no right row matches.
    ///
    /// # Arguments
    ///
    /// * `left` - Name of the table driving the output order
    /// * `right` - Name of the table searched for matches
    /// * `key` - Column present in both tables
    /// * `headers` - Output columns qualified as `"Table.column"`, None keeps every column
    pub fn join_tables(
        &self,
        left: &str,
        right: &str,
        key: &str,
        headers: Option<&[&str]>,
    ) -> Result<Vec<Entry>, SheetDbError> {
        let left_entries = match headers {
            Some(headers) => self.get_entries(left, None, Some(&side_columns(left, key, headers)))?,
            None => self.get_entries(left, None, None)?,
        };
        let right_entries = match headers {
            Some(headers) => self.get_entries(right, None, Some(&side_columns(right, key, headers)))?,
            None => self.get_entries(right, None, None)?,
        };

        let mut joined = Vec::<Entry>::with_capacity(left_entries.len());
        for left_entry in &left_entries {
            let mut matches = right_entries
                .iter()
                .filter(|right_entry| right_entry.get(key) == left_entry.get(key));
            match self.options.join_mode {
                JoinMode::FirstMatch => {
                    let mut merged = left_entry.clone();
                    if let Some(right_entry) = matches.next() {
                        merged.overlay(right_entry);
                    }
                    joined.push(merged);
                }
                JoinMode::Inner => {
                    for right_entry in matches {
                        let mut merged = left_entry.clone();
                        merged.overlay(right_entry);
                        joined.push(merged);
                    }
                }
            }
        }
        debug!(left, right, key, rows = joined.len(), "joined tables");

        match headers {
            Some(headers) => {
                let columns = output_columns(headers);
                Ok(joined.iter().map(|entry| entry.project(&columns)).collect())
            }
            None => Ok(joined),
        }
    }
}
