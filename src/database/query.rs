use crate::criteria::Criteria;
use crate::criteria::Updates;
use crate::database::Database;
use crate::entry::Entry;
use crate::error::SheetDbError;
use crate::store::TabularStore;
use crate::value::Value;
use tracing::debug;

impl<S: TabularStore> Database<S> {
    /// Retrieves entries in row order.
    ///
    /// # Arguments
    ///
    /// * `table` - Name of the table to read
    /// * `criteria` - Filter applied to every entry, None keeps all entries
    /// * `headers` - Columns kept in each entry, None keeps every column
    pub fn get_entries(
        &self,
        table: &str,
        criteria: Option<&Criteria>,
        headers: Option<&[&str]>,
    ) -> Result<Vec<Entry>, SheetDbError> {
        let (_, snapshot) = self.read_table(table)?;
        let entries = snapshot
            .entries()
            .filter(|entry| criteria.map(|criteria| criteria.matches(entry)).unwrap_or(true))
            .map(|entry| match headers {
                Some(headers) => entry.project(headers),
                None => entry,
            })
            .collect();
        Ok(entries)
    }

    /// Appends one row. Values are positional and are not checked against the header row.
    pub fn insert_entry(&mut self, table: &str, values: &[Value]) -> Result<(), SheetDbError> {
        let handle = self.resolve(table)?;
        self.store.append_row(&handle, values)?;
        debug!(table, cells = values.len(), "inserted entry");
        Ok(())
    }

    /// Appends several rows in order.
    pub fn insert_entries(&mut self, table: &str, rows: &[Vec<Value>]) -> Result<(), SheetDbError> {
        let handle = self.resolve(table)?;
        for row in rows {
            self.store.append_row(&handle, row)?;
        }
        debug!(table, rows = rows.len(), "inserted entries");
        Ok(())
    }

    /// Appends one row laid out from an entry in header order.
    /// Headers the entry does not name are left empty; keys that name no header are dropped.
    pub fn insert_entry_values(&mut self, table: &str, entry: &Entry) -> Result<(), SheetDbError> {
        let headers = self.get_headers(table)?;
        let row: Vec<Value> = headers.iter().map(|header| entry.get(header).clone()).collect();
        self.insert_entry(table, &row)
    }

    /// Deletes every row matching `criteria` and returns how many were deleted.
    ///
    /// Matching positions come from a single read and rows are removed from the
    /// highest position down, so each removal leaves the remaining positions valid.
    pub fn delete_entries(&mut self, table: &str, criteria: &Criteria) -> Result<usize, SheetDbError> {
        let (handle, snapshot) = self.read_table(table)?;
        let positions = snapshot.matching_positions(criteria);
        for position in positions.iter().rev() {
            self.store.delete_row(&handle, *position)?;
        }
        debug!(table, rows = positions.len(), "deleted entries");
        Ok(positions.len())
    }

    /// Overwrites, on every row matching `criteria`, the cells named by `updates`.
    /// Returns the number of matching rows.
    pub fn update_entries(&mut self, table: &str, criteria: &Criteria, updates: &Updates) -> Result<usize, SheetDbError> {
        let (handle, snapshot) = self.read_table(table)?;
        let positions = snapshot.matching_positions(criteria);
        let mut writes = Vec::<(usize, Value)>::new();
        for (index, header) in snapshot.headers.iter().enumerate() {
            if let Some(value) = updates.value_for(header) {
                writes.push((index, value.clone()));
            }
        }
        for position in &positions {
            for (column, value) in &writes {
                self.store.set_cell(&handle, *position, *column, value.clone())?;
            }
        }
        debug!(table, rows = positions.len(), columns = writes.len(), "updated entries");
        Ok(positions.len())
    }

    /// Returns the header row.
    pub fn get_headers(&self, table: &str) -> Result<Vec<String>, SheetDbError> {
        let (_, snapshot) = self.read_table(table)?;
        Ok(snapshot.headers)
    }

    /// Number of data rows, regardless of their content.
    pub fn count_entries(&self, table: &str) -> Result<usize, SheetDbError> {
        let handle = self.resolve(table)?;
        Ok(self.store.row_count(&handle)?.saturating_sub(1))
    }

    /// Removes every data row and keeps the header row.
    pub fn clear_table(&mut self, table: &str) -> Result<(), SheetDbError> {
        let handle = self.resolve(table)?;
        self.store.clear_data_rows(&handle)?;
        debug!(table, "cleared table");
        Ok(())
    }
}
