/// How [`Database::join_tables`](crate::Database::join_tables) pairs rows.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum JoinMode {
    /// One output row per left row, merged with the first right row whose key is equal.
    /// Left rows without a match are kept with only their own fields.
    #[default]
    FirstMatch,
    /// One output row per matching (left, right) pair; unmatched left rows are dropped.
    Inner,
}

/// Engine settings passed to [`Database::with_options`](crate::Database::with_options).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DatabaseOptions {
    /// Row pairing used by joins.
    pub join_mode: JoinMode,
    /// Maximum number of data rows an operation may read, None for unbounded.
    pub max_scan_rows: Option<usize>,
}

impl DatabaseOptions {
    pub fn with_join_mode(mut self, join_mode: JoinMode) -> Self {
        self.join_mode = join_mode;
        self
    }

    pub fn with_max_scan_rows(mut self, limit: usize) -> Self {
        self.max_scan_rows = Some(limit);
        self
    }

    /// Checks a table's data row count against the scan limit.
    pub(crate) fn check_scan(&self, table: &str, rows: usize) -> Result<(), crate::SheetDbError> {
        match self.max_scan_rows {
            Some(limit) if rows > limit => Err(crate::SheetDbError::ScanLimitExceeded {
                table: table.to_owned(),
                rows,
                limit,
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SheetDbError;

    #[test]
    fn defaults() {
        let options = DatabaseOptions::default();
        assert_eq!(options.join_mode, JoinMode::FirstMatch);
        assert_eq!(options.max_scan_rows, None);
        assert!(options.check_scan("T", usize::MAX).is_ok());
    }

    #[test]
    fn scan_limit() {
        let options = DatabaseOptions::default()
            .with_join_mode(JoinMode::Inner)
            .with_max_scan_rows(2);
        assert_eq!(options.join_mode, JoinMode::Inner);
        assert!(options.check_scan("T", 2).is_ok());
        assert!(matches!(
            options.check_scan("T", 3),
            Err(SheetDbError::ScanLimitExceeded { rows: 3, limit: 2, .. })
        ));
    }
}
