//! # Sheet DB
//!
//! A small record store that uses a spreadsheet as its storage: each worksheet is a
//! table, row 1 holds the column headers, and every later row is one record.
//!
//! ## Features
//!
//! - **Table lifecycle**: create, delete, rename and copy tables, list them by name or glob pattern
//! - **Queries**: filter rows with conjunctive criteria (`=`, `!=`, `>`, `>=`, `<`, `<=`, `in`, `not in`)
//!   and project the columns you need
//! - **Mutations**: insert, update and delete records, clear a table while keeping its headers
//! - **Joins**: merge two tables on a shared key column
//! - **Pluggable storage**: any [`TabularStore`]; [`MemoryStore`] and the `.xlsx` backed
//!   [`XlsxStore`] ship with the crate
//! - **JSON friendly**: [`Value`] and [`Entry`] serialize with serde, and [`Criteria`] and
//!   [`Updates`] can be read from JSON objects
//!
//! ## Example
//!
//! ```
//! use sheet_db::{Criteria, Database, MemoryStore, Updates, Value};
//!
//! let mut db = Database::new(MemoryStore::new());
//! db.create_table("Users", &["ID", "Name", "Age"])?;
//! db.insert_entry("Users", &[Value::from(1), Value::from("John"), Value::from(25)])?;
//! db.update_entries("Users", &Criteria::new().eq("ID", 1), &Updates::new().set("Age", 26))?;
//!
//! let users = db.get_entries("Users", Some(&Criteria::new().ge("Age", 26)), Some(&["Name"]))?;
//! assert_eq!(users[0].get("Name"), &Value::from("John"));
//! # Ok::<(), sheet_db::SheetDbError>(())
//! ```
mod criteria;
mod database;
mod entry;
mod error;
mod helpers;
mod options;
mod value;

pub mod store;

pub use criteria::ColumnUpdate;
pub use criteria::Criteria;
pub use criteria::Operand;
pub use criteria::Operator;
pub use criteria::Predicate;
pub use criteria::Updates;
pub use database::Database;
pub use entry::materialize;
pub use entry::Entry;
pub use error::SheetDbError;
pub use options::DatabaseOptions;
pub use options::JoinMode;
pub use store::MemoryStore;
pub use store::TabularStore;
pub use store::TableId;
pub use store::XlsxStore;
pub use value::Value;
