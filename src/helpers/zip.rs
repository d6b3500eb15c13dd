//! ZIP archive helpers for the workbook container.

use crate::error::SheetDbError;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlWriter;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;

pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Gets a file by name, case-insensitive and path separator agnostic
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, SheetDbError>;

    /// Creates an XML reader over a file within the archive
    fn xml_reader(&'_ mut self, name: &str) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, SheetDbError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, SheetDbError> {
        let pattern = name.replace('\\', "/");
        let path = self
            .file_names()
            .find(|file_name| pattern.eq_ignore_ascii_case(*file_name))
            .map(|file_name| file_name.to_owned());
        match path.map(|file_name| self.by_name(&file_name)).transpose() {
            Ok(Some(file)) => Ok(Some(file)),
            Ok(None) | Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn xml_reader(&'_ mut self, name: &str) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, SheetDbError> {
        let reader = self
            .file(name)?
            .map(|file| XmlReader::new(BufReader::new(file)));
        Ok(reader)
    }
}

/// Writes archive members as deflated XML parts.
pub(crate) trait ZipWriterHelper: Write + Sized {
    /// Starts `name` and hands an XML writer to `write` for its content.
    fn xml_part<F>(&mut self, name: &str, write: F) -> Result<(), SheetDbError>
    where
        F: FnOnce(&mut XmlWriter<&mut Self>) -> Result<(), SheetDbError>;
}

impl<W: Write + Seek> ZipWriterHelper for ZipWriter<W> {
    fn xml_part<F>(&mut self, name: &str, write: F) -> Result<(), SheetDbError>
    where
        F: FnOnce(&mut XmlWriter<&mut Self>) -> Result<(), SheetDbError>,
    {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.start_file(name, options)?;
        let mut writer = XmlWriter::new(self)?;
        write(&mut writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn writes_and_finds_parts() -> Result<(), SheetDbError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::<u8>::new()));
        zip.xml_part("xl/workbook.xml", |xml| xml.element("workbook", &[], "ok"))?;
        let buffer = zip.finish()?;

        let mut archive = ZipArchive::new(Cursor::new(buffer.into_inner()))?;
        let mut content = String::new();
        archive
            .file("XL\\Workbook.xml")?
            .expect("part present")
            .read_to_string(&mut content)?;
        assert!(content.ends_with("<workbook>ok</workbook>"));
        assert!(archive.file("xl/missing.xml")?.is_none());
        assert!(archive.xml_reader("xl/workbook.xml")?.is_some());
        Ok(())
    }
}
