//! # Database
//!
//! [`Database`] runs table lifecycle calls, queries, mutations and joins against an
//! injected [`TabularStore`]. Every call resolves the named table and re-reads it from
//! the store; nothing is cached between calls.
use crate::error::SheetDbError;
use crate::options::DatabaseOptions;
use crate::store::TabularStore;
use glob::Pattern;
use tracing::debug;
use tracing::trace;

mod join;
mod query;
pub(crate) mod table;

use table::Table;

/// A spreadsheet used as a set of named tables.
#[derive(Debug)]
pub struct Database<S: TabularStore> {
    store: S,
    options: DatabaseOptions,
}

impl<S: TabularStore> Database<S> {
    /// Creates a database over `store` with default options.
    pub fn new(store: S) -> Self {
        Self::with_options(store, DatabaseOptions::default())
    }

    pub fn with_options(store: S, options: DatabaseOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Creates a table and writes its header row.
    ///
    /// # Errors
    ///
    /// [`SheetDbError::TableAlreadyExists`] if a table named `name` is present.
    pub fn create_table<H: AsRef<str>>(&mut self, name: &str, headers: &[H]) -> Result<(), SheetDbError> {
        if self.store.get_table(name)?.is_some() {
            return Err(SheetDbError::TableAlreadyExists(name.to_owned()));
        }
        let headers: Vec<String> = headers.iter().map(|header| header.as_ref().to_owned()).collect();
        self.store.create_table(name, &headers)?;
        debug!(table = name, columns = headers.len(), "created table");
        Ok(())
    }

    /// Deletes a table with all its rows.
    pub fn delete_table(&mut self, name: &str) -> Result<(), SheetDbError> {
        let table = self.resolve(name)?;
        self.store.delete_table(&table)?;
        debug!(table = name, "deleted table");
        Ok(())
    }

    /// Renames a table.
    ///
    /// # Errors
    ///
    /// [`SheetDbError::TableNotFound`] if `old_name` is absent, and
    /// [`SheetDbError::TableAlreadyExists`] if `new_name` belongs to another table.
    pub fn rename_table(&mut self, old_name: &str, new_name: &str) -> Result<(), SheetDbError> {
        let table = self.resolve(old_name)?;
        if old_name == new_name {
            return Ok(());
        }
        if self.store.get_table(new_name)?.is_some() {
            return Err(SheetDbError::TableAlreadyExists(new_name.to_owned()));
        }
        self.store.rename_table(&table, new_name)?;
        debug!(table = old_name, new_name, "renamed table");
        Ok(())
    }

    /// Copies a table, headers and rows, under a new name placed after the existing tables.
    pub fn copy_table(&mut self, source_name: &str, destination_name: &str) -> Result<(), SheetDbError> {
        let source = self.resolve(source_name)?;
        if self.store.get_table(destination_name)?.is_some() {
            return Err(SheetDbError::TableAlreadyExists(destination_name.to_owned()));
        }
        self.store.copy_table(&source, destination_name)?;
        debug!(table = source_name, destination_name, "copied table");
        Ok(())
    }

    /// Returns the names of all tables in storage order.
    pub fn get_tables(&self) -> Result<Vec<String>, SheetDbError> {
        self.store.list_tables()
    }

    /// Returns the names of the tables matching a glob pattern such as `Users_*`.
    pub fn get_tables_matching(&self, pattern: &str) -> Result<Vec<String>, SheetDbError> {
        let pattern = Pattern::new(pattern)?;
        Ok(self
            .store
            .list_tables()?
            .into_iter()
            .filter(|name| pattern.matches(name))
            .collect())
    }

    pub fn has_table(&self, name: &str) -> Result<bool, SheetDbError> {
        Ok(self.store.get_table(name)?.is_some())
    }

    /// Resolves a table name to a store handle.
    fn resolve(&self, name: &str) -> Result<S::Handle, SheetDbError> {
        self.store
            .get_table(name)?
            .ok_or_else(|| SheetDbError::TableNotFound(name.to_owned()))
    }

    /// Reads a whole table in one pass, enforcing the scan limit before loading rows.
    fn read_table(&self, name: &str) -> Result<(S::Handle, Table), SheetDbError> {
        let handle = self.resolve(name)?;
        let data_rows = self.store.row_count(&handle)?.saturating_sub(1);
        self.options.check_scan(name, data_rows)?;
        let rows = self.store.get_all_rows(&handle)?;
        trace!(table = name, rows = rows.len(), "scanned table");
        Ok((handle, Table::from_rows(rows)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::Criteria;
    use crate::criteria::Updates;
    use crate::entry::Entry;
    use crate::store::MemoryStore;
    use crate::value::Value;

    fn database() -> Database<MemoryStore> {
        let mut db = Database::new(MemoryStore::new());
        db.create_table("Users", &["ID", "Name", "Age"]).unwrap();
        db.create_table("Cities", &["ID", "City"]).unwrap();
        db.insert_entry("Users", &[Value::from(1), Value::from("John"), Value::from(25)]).unwrap();
        db.insert_entry("Users", &[Value::from(2), Value::from("Alice"), Value::from(30)]).unwrap();
        db.insert_entry("Cities", &[Value::from(1), Value::from("New York")]).unwrap();
        db.insert_entry("Cities", &[Value::from(2), Value::from("London")]).unwrap();
        db
    }

    fn entry(fields: &[(&str, Value)]) -> Entry {
        fields.iter().cloned().collect()
    }

    #[test]
    fn users_scenario() {
        let mut db = database();

        let entries = db.get_entries("Users", Some(&Criteria::new().eq("ID", 1)), None).unwrap();
        assert_eq!(
            entries,
            vec![entry(&[("ID", Value::from(1)), ("Name", Value::from("John")), ("Age", Value::from(25))])]
        );

        db.update_entries("Users", &Criteria::new().eq("ID", 1), &Updates::new().set("Age", 26))
            .unwrap();
        let entries = db.get_entries("Users", Some(&Criteria::new().eq("ID", 1)), None).unwrap();
        assert_eq!(entries[0].get("Age"), &Value::from(26));

        db.delete_entries("Users", &Criteria::new().eq("ID", 1)).unwrap();
        assert_eq!(db.count_entries("Users").unwrap(), 1);
        assert_eq!(db.get_entries("Users", None, None).unwrap().len(), 1);

        let joined = db.join_tables("Users", "Cities", "ID", None).unwrap();
        assert_eq!(
            joined,
            vec![entry(&[
                ("ID", Value::from(2)),
                ("Name", Value::from("Alice")),
                ("Age", Value::from(30)),
                ("City", Value::from("London")),
            ])]
        );

        assert_eq!(db.get_headers("Users").unwrap(), vec!["ID", "Name", "Age"]);

        db.clear_table("Users").unwrap();
        assert!(db.get_entries("Users", None, None).unwrap().is_empty());
        assert_eq!(db.count_entries("Users").unwrap(), 0);
        assert_eq!(db.get_headers("Users").unwrap(), vec!["ID", "Name", "Age"]);

        db.delete_table("Users").unwrap();
        db.delete_table("Cities").unwrap();
        assert!(db.get_tables().unwrap().is_empty());
    }

    #[test]
    fn create_twice_fails() {
        let mut db = Database::new(MemoryStore::new());
        db.create_table("A", &["X"]).unwrap();
        assert!(matches!(db.create_table("A", &["X"]), Err(SheetDbError::TableAlreadyExists(name)) if name == "A"));
    }

    #[test]
    fn delete_missing_table_fails() {
        let mut db = Database::new(MemoryStore::new());
        assert!(matches!(db.delete_table("B"), Err(SheetDbError::TableNotFound(name)) if name == "B"));
    }

    #[test]
    fn rename_table() {
        let mut db = database();
        db.rename_table("Users", "People").unwrap();
        assert_eq!(db.get_tables().unwrap(), vec!["People", "Cities"]);
        assert_eq!(db.count_entries("People").unwrap(), 2);
        assert!(matches!(db.rename_table("Users", "X"), Err(SheetDbError::TableNotFound(_))));
        assert!(matches!(
            db.rename_table("People", "Cities"),
            Err(SheetDbError::TableAlreadyExists(name)) if name == "Cities"
        ));
        db.rename_table("People", "People").unwrap();
        assert_eq!(db.get_tables().unwrap(), vec!["People", "Cities"]);
    }

    #[test]
    fn copy_table() {
        let mut db = database();
        db.copy_table("Users", "UsersBackup").unwrap();
        assert_eq!(db.get_tables().unwrap(), vec!["Users", "Cities", "UsersBackup"]);
        assert_eq!(
            db.get_entries("UsersBackup", None, None).unwrap(),
            db.get_entries("Users", None, None).unwrap()
        );
        assert!(matches!(db.copy_table("Missing", "Y"), Err(SheetDbError::TableNotFound(_))));
        assert!(matches!(
            db.copy_table("Users", "Cities"),
            Err(SheetDbError::TableAlreadyExists(_))
        ));

        db.delete_entries("UsersBackup", &Criteria::new()).unwrap();
        assert_eq!(db.count_entries("Users").unwrap(), 2);
    }

    #[test]
    fn tables_matching_pattern() {
        let mut db = database();
        db.create_table("Users_2024", &["ID"]).unwrap();
        assert_eq!(db.get_tables_matching("Users*").unwrap(), vec!["Users", "Users_2024"]);
        assert_eq!(db.get_tables_matching("C?ties").unwrap(), vec!["Cities"]);
        assert!(matches!(db.get_tables_matching("[").unwrap_err(), SheetDbError::PatternError(_)));
        assert!(db.has_table("Cities").unwrap());
        assert!(!db.has_table("Towns").unwrap());
    }

    #[test]
    fn into_store_keeps_tables() {
        let db = database();
        let store = db.into_store();
        assert_eq!(store.list_tables().unwrap(), vec!["Users", "Cities"]);
    }
}
