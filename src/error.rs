use thiserror::Error;

/// Main error type for the sheet database.
/// Engine failures come first, followed by errors wrapped from the standard library,
/// dependencies, and the workbook codec.
#[derive(Error, Debug)]
pub enum SheetDbError {
    #[error("Table '{0}' does not exist.")]
    TableNotFound(String),

    #[error("Table '{0}' already exists.")]
    TableAlreadyExists(String),

    #[error("Invalid operator: {0}")]
    InvalidOperator(String),

    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    #[error("Table handle {0} no longer refers to a table in the store")]
    StaleHandle(String),

    #[error("Row {position} is out of range for table '{table}'")]
    RowOutOfRange { table: String, position: usize },

    #[error("Table '{table}' has {rows} rows, more than the scan limit of {limit}")]
    ScanLimitExceeded { table: String, rows: usize, limit: usize },

    #[error("Invalid workbook: {0}")]
    WorkbookError(String),

    #[error("{0}")]
    WithContextError(String),

    #[error("{0}")]
    AnyhowError(#[from] anyhow::Error),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    // Third-party library errors
    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, SheetDbError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| SheetDbError::WithContextError(format!("{}: {}", message, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_messages() {
        assert_eq!(
            SheetDbError::TableNotFound("Users".to_owned()).to_string(),
            "Table 'Users' does not exist."
        );
        assert_eq!(
            SheetDbError::TableAlreadyExists("Users".to_owned()).to_string(),
            "Table 'Users' already exists."
        );
        assert_eq!(SheetDbError::InvalidOperator("??".to_owned()).to_string(), "Invalid operator: ??");
        assert_eq!(
            SheetDbError::StaleHandle("#3".to_owned()).to_string(),
            "Table handle #3 no longer refers to a table in the store"
        );
    }

    #[test]
    fn with_prefix_wraps_message() {
        let result: Result<(), SheetDbError> = Err(SheetDbError::TableNotFound("A".to_owned()));
        let error = result.with_prefix("Open workbook").unwrap_err();
        assert_eq!(error.to_string(), "Open workbook: Table 'A' does not exist.");
    }
}
