//! # Tabular Store
//!
//! The row-level persistence contract the engine runs against. A store holds named
//! tables; each table is an ordered list of rows where row 1 is the header row.
//! Positions are 1-based and include the header row, column indices are 0-based.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryStore`]: tables held in memory
//! - [`XlsxStore`]: tables loaded from and saved to an `.xlsx` workbook
use crate::error::SheetDbError;
use crate::value::Value;
use std::fmt::Debug;

pub mod memory;
pub(crate) mod reference;
pub mod xlsx;

pub use memory::MemoryStore;
pub use memory::TableId;
pub use xlsx::XlsxStore;

/// Row-level operations over named, position-addressed tables.
pub trait TabularStore {
    /// Opaque reference to a table, valid across renames until the table is deleted.
    type Handle: Clone + Debug;

    /// Looks a table up by name.
    fn get_table(&self, name: &str) -> Result<Option<Self::Handle>, SheetDbError>;

    /// Creates a table whose first row holds `headers`.
    fn create_table(&mut self, name: &str, headers: &[String]) -> Result<Self::Handle, SheetDbError>;

    fn delete_table(&mut self, table: &Self::Handle) -> Result<(), SheetDbError>;

    fn rename_table(&mut self, table: &Self::Handle, new_name: &str) -> Result<(), SheetDbError>;

    /// Duplicates every row of `table`, header row included, under `new_name`.
    fn copy_table(&mut self, table: &Self::Handle, new_name: &str) -> Result<Self::Handle, SheetDbError>;

    /// Appends one row after the last row.
    fn append_row(&mut self, table: &Self::Handle, values: &[Value]) -> Result<(), SheetDbError>;

    /// Returns every row, the header row first.
    fn get_all_rows(&self, table: &Self::Handle) -> Result<Vec<Vec<Value>>, SheetDbError>;

    /// Removes the row at `position`; later rows move up by one.
    fn delete_row(&mut self, table: &Self::Handle, position: usize) -> Result<(), SheetDbError>;

    /// Writes one cell of the row at `position`.
    fn set_cell(&mut self, table: &Self::Handle, position: usize, column: usize, value: Value) -> Result<(), SheetDbError>;

    /// Removes every row after the header row.
    fn clear_data_rows(&mut self, table: &Self::Handle) -> Result<(), SheetDbError>;

    /// Number of rows, the header row included.
    fn row_count(&self, table: &Self::Handle) -> Result<usize, SheetDbError>;

    /// Table names in storage order.
    fn list_tables(&self) -> Result<Vec<String>, SheetDbError>;
}
