use crate::criteria::Criteria;
use crate::entry::materialize;
use crate::entry::Entry;
use crate::value::Value;

/// Position of the first data row; row 1 holds the headers.
pub(crate) const FIRST_DATA_ROW: usize = 2;

/// One consistent read of a table: its header row and data rows.
#[derive(Clone, Debug)]
pub(crate) struct Table {
    /// Column names from the header row
    pub(crate) headers: Vec<String>,
    /// Data rows, header row excluded
    pub(crate) rows: Vec<Vec<Value>>,
}

impl Table {
    /// Splits the store's rows into header row and data rows.
    pub(crate) fn from_rows(mut rows: Vec<Vec<Value>>) -> Self {
        let headers = if rows.is_empty() {
            Vec::new()
        } else {
            rows.remove(0).iter().map(ToString::to_string).collect()
        };
        Self { headers, rows }
    }

    /// Materializes every data row, in row order.
    pub(crate) fn entries(&self) -> impl Iterator<Item = Entry> + '_ {
        self.rows.iter().map(|row| materialize(&self.headers, row))
    }

    /// Store positions of the data rows matching `criteria`, ascending.
    pub(crate) fn matching_positions(&self, criteria: &Criteria) -> Vec<usize> {
        self.entries()
            .enumerate()
            .filter(|(_, entry)| criteria.matches(entry))
            .map(|(index, _)| index + FIRST_DATA_ROW)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Table {
        Table::from_rows(
            vec![
                vec![Value::from("ID"), Value::from("Name"), Value::from("ID")],
                vec![Value::from(1), Value::from("John")],
                vec![Value::from(2), Value::from("Alice")],
                vec![Value::from(3), Value::from("John")],
            ],
        )
    }

    #[test]
    fn splits_header_row() {
        let table = users();
        assert_eq!(table.headers, vec!["ID", "Name", "ID"]);
        assert_eq!(table.rows.len(), 3);
    }

    #[test]
    fn empty_store_rows() {
        let table = Table::from_rows(Vec::new());
        assert!(table.headers.is_empty());
        assert_eq!(table.entries().count(), 0);
    }

    #[test]
    fn positions_are_offset_by_header() {
        let table = users();
        let criteria = Criteria::new().eq("Name", "John");
        assert_eq!(table.matching_positions(&criteria), vec![2, 4]);
        assert_eq!(table.matching_positions(&Criteria::new()), vec![2, 3, 4]);
    }
}
