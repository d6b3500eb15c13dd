use crate::error::SheetDbError;
use crate::store::TabularStore;
use crate::value::Value;
use std::fmt::Display;

/// Handle of a table held by a [`MemoryStore`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TableId(u64);

impl Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A table held in memory: its name and all rows, header row first.
#[derive(Clone, Debug)]
pub(crate) struct MemoryTable {
    id: TableId,
    pub(crate) name: String,
    pub(crate) rows: Vec<Vec<Value>>,
}

/// Tabular store keeping every table in memory, in creation order.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Vec<MemoryTable>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table with the given rows after the existing ones.
    pub(crate) fn push_table(&mut self, name: &str, rows: Vec<Vec<Value>>) -> TableId {
        let id = TableId(self.next_id);
        self.next_id += 1;
        self.tables.push(MemoryTable {
            id,
            name: name.to_owned(),
            rows,
        });
        id
    }

    /// Iterates over tables in storage order.
    pub(crate) fn tables(&self) -> impl Iterator<Item = &MemoryTable> {
        self.tables.iter()
    }

    fn index_of(&self, table: &TableId) -> Result<usize, SheetDbError> {
        self.tables
            .iter()
            .position(|it| it.id == *table)
            .ok_or_else(|| SheetDbError::StaleHandle(table.to_string()))
    }

    fn table(&self, table: &TableId) -> Result<&MemoryTable, SheetDbError> {
        let index = self.index_of(table)?;
        Ok(&self.tables[index])
    }

    fn table_mut(&mut self, table: &TableId) -> Result<&mut MemoryTable, SheetDbError> {
        let index = self.index_of(table)?;
        Ok(&mut self.tables[index])
    }

    /// Resolves a 1-based position to a row index.
    fn row_index(table: &MemoryTable, position: usize) -> Result<usize, SheetDbError> {
        if position == 0 || position > table.rows.len() {
            Err(SheetDbError::RowOutOfRange {
                table: table.name.to_owned(),
                position,
            })
        } else {
            Ok(position - 1)
        }
    }
}

impl TabularStore for MemoryStore {
    type Handle = TableId;

    fn get_table(&self, name: &str) -> Result<Option<TableId>, SheetDbError> {
        Ok(self.tables.iter().find(|table| table.name == name).map(|table| table.id))
    }

    fn create_table(&mut self, name: &str, headers: &[String]) -> Result<TableId, SheetDbError> {
        let header_row = headers.iter().map(|header| Value::from(header.as_str())).collect();
        Ok(self.push_table(name, vec![header_row]))
    }

    fn delete_table(&mut self, table: &TableId) -> Result<(), SheetDbError> {
        let index = self.index_of(table)?;
        self.tables.remove(index);
        Ok(())
    }

    fn rename_table(&mut self, table: &TableId, new_name: &str) -> Result<(), SheetDbError> {
        self.table_mut(table)?.name = new_name.to_owned();
        Ok(())
    }

    fn copy_table(&mut self, table: &TableId, new_name: &str) -> Result<TableId, SheetDbError> {
        let rows = self.table(table)?.rows.clone();
        Ok(self.push_table(new_name, rows))
    }

    fn append_row(&mut self, table: &TableId, values: &[Value]) -> Result<(), SheetDbError> {
        self.table_mut(table)?.rows.push(values.to_vec());
        Ok(())
    }

    fn get_all_rows(&self, table: &TableId) -> Result<Vec<Vec<Value>>, SheetDbError> {
        Ok(self.table(table)?.rows.clone())
    }

    fn delete_row(&mut self, table: &TableId, position: usize) -> Result<(), SheetDbError> {
        let table = self.table_mut(table)?;
        let index = Self::row_index(table, position)?;
        table.rows.remove(index);
        Ok(())
    }

    fn set_cell(&mut self, table: &TableId, position: usize, column: usize, value: Value) -> Result<(), SheetDbError> {
        let table = self.table_mut(table)?;
        let index = Self::row_index(table, position)?;
        let row = &mut table.rows[index];
        if row.len() <= column {
            row.resize(column + 1, Value::Empty);
        }
        row[column] = value;
        Ok(())
    }

    fn clear_data_rows(&mut self, table: &TableId) -> Result<(), SheetDbError> {
        self.table_mut(table)?.rows.truncate(1);
        Ok(())
    }

    fn row_count(&self, table: &TableId) -> Result<usize, SheetDbError> {
        Ok(self.table(table)?.rows.len())
    }

    fn list_tables(&self) -> Result<Vec<String>, SheetDbError> {
        Ok(self.tables.iter().map(|table| table.name.to_owned()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_users() -> (MemoryStore, TableId) {
        let mut store = MemoryStore::new();
        let users = store
            .create_table("Users", &["ID".to_owned(), "Name".to_owned()])
            .unwrap();
        store.append_row(&users, &[Value::from(1), Value::from("John")]).unwrap();
        store.append_row(&users, &[Value::from(2), Value::from("Alice")]).unwrap();
        (store, users)
    }

    #[test]
    fn create_and_read() {
        let (store, users) = store_with_users();
        assert_eq!(store.get_table("Users").unwrap(), Some(users));
        assert_eq!(store.get_table("Missing").unwrap(), None);
        assert_eq!(store.row_count(&users).unwrap(), 3);
        let rows = store.get_all_rows(&users).unwrap();
        assert_eq!(rows[0], vec![Value::from("ID"), Value::from("Name")]);
        assert_eq!(rows[2], vec![Value::from(2), Value::from("Alice")]);
    }

    #[test]
    fn handle_survives_rename() {
        let (mut store, users) = store_with_users();
        store.rename_table(&users, "People").unwrap();
        assert_eq!(store.get_table("People").unwrap(), Some(users));
        assert_eq!(store.get_table("Users").unwrap(), None);
        assert_eq!(store.row_count(&users).unwrap(), 3);
    }

    #[test]
    fn copy_goes_last() {
        let (mut store, users) = store_with_users();
        store.create_table("Cities", &["ID".to_owned()]).unwrap();
        let copy = store.copy_table(&users, "Users2").unwrap();
        assert_ne!(copy, users);
        assert_eq!(store.list_tables().unwrap(), vec!["Users", "Cities", "Users2"]);
        assert_eq!(store.get_all_rows(&copy).unwrap(), store.get_all_rows(&users).unwrap());
    }

    #[test]
    fn delete_row_shifts_positions() {
        let (mut store, users) = store_with_users();
        store.delete_row(&users, 2).unwrap();
        let rows = store.get_all_rows(&users).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][1], Value::from("Alice"));
        assert!(matches!(
            store.delete_row(&users, 3),
            Err(SheetDbError::RowOutOfRange { position: 3, .. })
        ));
        assert!(matches!(store.delete_row(&users, 0), Err(SheetDbError::RowOutOfRange { .. })));
    }

    #[test]
    fn set_cell_pads_short_rows() {
        let (mut store, users) = store_with_users();
        store.append_row(&users, &[Value::from(3)]).unwrap();
        store.set_cell(&users, 4, 2, Value::from("x")).unwrap();
        let rows = store.get_all_rows(&users).unwrap();
        assert_eq!(rows[3], vec![Value::from(3), Value::Empty, Value::from("x")]);
    }

    #[test]
    fn clear_keeps_header() {
        let (mut store, users) = store_with_users();
        store.clear_data_rows(&users).unwrap();
        assert_eq!(store.row_count(&users).unwrap(), 1);
    }

    #[test]
    fn stale_handle() {
        let (mut store, users) = store_with_users();
        store.delete_table(&users).unwrap();
        assert!(matches!(store.row_count(&users), Err(SheetDbError::StaleHandle(_))));
        assert!(store.list_tables().unwrap().is_empty());
    }
}
