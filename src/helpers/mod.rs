//! Low-level readers and writers for the OOXML workbook container.
pub(crate) mod xml;
pub(crate) mod zip;
