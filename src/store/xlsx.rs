//! # Xlsx Store
//!
//! A [`TabularStore`] backed by an Office Open XML workbook. Each worksheet is one
//! table. The workbook is read completely on [`XlsxStore::open`], edited in memory, and
//! written back by [`XlsxStore::save`].
use crate::error::ResultMessage;
use crate::error::SheetDbError;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::xml::XmlWriter;
use crate::helpers::zip::ZipHelper;
use crate::helpers::zip::ZipWriterHelper;
use crate::match_xml_events;
use crate::store::memory::MemoryStore;
use crate::store::memory::TableId;
use crate::store::reference::index_to_reference;
use crate::store::reference::reference_to_index;
use crate::store::TabularStore;
use crate::value::Value;
use anyhow::Context;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::TimeDelta;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;
use tracing::warn;
use zip::ZipArchive;
use zip::ZipWriter;

// XML tag names read from workbook parts
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts"); // Custom number formats container
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");   // Individual custom number format
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");  // Cell format indexes container
const TAG_FORMAT_INDEX: QName = QName(b"xf");         // Individual cell format index
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");   // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");       // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");                  // Text content within strings
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");
const TAG_RELATIONSHIP: &[u8] = b"Relationship";

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PACKAGE_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const REL_OFFICE_DOCUMENT: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_WORKSHEET: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const REL_STYLES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const TYPE_RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
const TYPE_WORKBOOK: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
const TYPE_WORKSHEET: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
const TYPE_STYLES: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";

/// Index of the date-time cell format in written workbooks.
const DATE_TIME_STYLE: &str = "1";
const MILLIS_PER_DAY: i64 = 86_400_000;
/// Days between the 1900 and 1904 date system epochs.
const DAYS_1904_OFFSET: i64 = 1462;

/// Workbook file holding one table per worksheet.
#[derive(Debug)]
pub struct XlsxStore {
    path: PathBuf,
    inner: MemoryStore,
    dirty: bool,
}

impl XlsxStore {
    /// Starts an empty workbook that [`save`](Self::save) will write to `path`.
    pub fn create(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_owned(),
            inner: MemoryStore::new(),
            dirty: true,
        }
    }

    /// Reads every worksheet of the workbook at `path`.
    ///
    /// Worksheets listed by the workbook but missing from the archive are skipped.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, is not a ZIP archive, or lacks `xl/workbook.xml`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SheetDbError> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open workbook '{}'", path.display()))?;
        let mut zip = ZipArchive::new(BufReader::new(file))?;
        let (sheets, is_1904) = load_workbook(&mut zip).with_prefix(&path.display().to_string())?;
        let decoder = CellDecoder {
            shared_strings: load_shared_strings(&mut zip)?,
            date_styles: load_date_styles(&mut zip)?,
            is_1904,
        };

        let mut inner = MemoryStore::new();
        for (name, zip_path) in &sheets {
            match zip.xml_reader(zip_path)? {
                Some(mut reader) => {
                    let rows = load_sheet(&mut reader, &decoder).with_prefix(&format!("Worksheet '{name}'"))?;
                    inner.push_table(name, rows);
                }
                None => warn!(table = %name, part = %zip_path, "worksheet part missing, skipped"),
            }
        }
        debug!(path = %path.display(), tables = sheets.len(), is_1904, "opened workbook");
        Ok(Self {
            path: path.to_owned(),
            inner,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether tables changed since the workbook was opened or last saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Writes every table to the workbook file, replacing its previous content.
    pub fn save(&mut self) -> Result<(), SheetDbError> {
        let file = File::create(&self.path)
            .with_context(|| format!("Failed to create workbook '{}'", self.path.display()))?;
        let count = write_workbook(file, &self.inner)?;
        debug!(path = %self.path.display(), tables = count, "saved workbook");
        self.dirty = false;
        Ok(())
    }

    /// Saves to `path` and makes it the workbook's location.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<(), SheetDbError> {
        self.path = path.as_ref().to_owned();
        self.save()
    }

    fn mark_dirty<T>(&mut self, result: Result<T, SheetDbError>) -> Result<T, SheetDbError> {
        if result.is_ok() {
            self.dirty = true;
        }
        result
    }
}

impl TabularStore for XlsxStore {
    type Handle = TableId;

    fn get_table(&self, name: &str) -> Result<Option<TableId>, SheetDbError> {
        self.inner.get_table(name)
    }

    fn create_table(&mut self, name: &str, headers: &[String]) -> Result<TableId, SheetDbError> {
        let result = self.inner.create_table(name, headers);
        self.mark_dirty(result)
    }

    fn delete_table(&mut self, table: &TableId) -> Result<(), SheetDbError> {
        let result = self.inner.delete_table(table);
        self.mark_dirty(result)
    }

    fn rename_table(&mut self, table: &TableId, new_name: &str) -> Result<(), SheetDbError> {
        let result = self.inner.rename_table(table, new_name);
        self.mark_dirty(result)
    }

    fn copy_table(&mut self, table: &TableId, new_name: &str) -> Result<TableId, SheetDbError> {
        let result = self.inner.copy_table(table, new_name);
        self.mark_dirty(result)
    }

    fn append_row(&mut self, table: &TableId, values: &[Value]) -> Result<(), SheetDbError> {
        let result = self.inner.append_row(table, values);
        self.mark_dirty(result)
    }

    fn get_all_rows(&self, table: &TableId) -> Result<Vec<Vec<Value>>, SheetDbError> {
        self.inner.get_all_rows(table)
    }

    fn delete_row(&mut self, table: &TableId, position: usize) -> Result<(), SheetDbError> {
        let result = self.inner.delete_row(table, position);
        self.mark_dirty(result)
    }

    fn set_cell(&mut self, table: &TableId, position: usize, column: usize, value: Value) -> Result<(), SheetDbError> {
        let result = self.inner.set_cell(table, position, column, value);
        self.mark_dirty(result)
    }

    fn clear_data_rows(&mut self, table: &TableId) -> Result<(), SheetDbError> {
        let result = self.inner.clear_data_rows(table);
        self.mark_dirty(result)
    }

    fn row_count(&self, table: &TableId) -> Result<usize, SheetDbError> {
        self.inner.row_count(table)
    }

    fn list_tables(&self) -> Result<Vec<String>, SheetDbError> {
        self.inner.list_tables()
    }
}

/// How the text of a `<c>` element turns into a value.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
enum CellKind {
    #[default]
    Number,
    /// Serial number under a date or time format
    Date,
    SharedString,
    /// Inline and formula strings
    InlineString,
    Boolean,
    IsoDateTime,
    /// Error cells such as `#DIV/0!`, kept as text
    Error,
}

/// Workbook-wide lookups needed to decode cells.
struct CellDecoder {
    shared_strings: Vec<String>,
    /// Whether each cell format index is a date or time format
    date_styles: Vec<bool>,
    is_1904: bool,
}

impl CellDecoder {
    fn kind(&self, cell_type: Option<&str>, style: Option<usize>) -> CellKind {
        match cell_type {
            Some("s") => CellKind::SharedString,
            Some("inlineStr") | Some("str") => CellKind::InlineString,
            Some("b") => CellKind::Boolean,
            Some("d") => CellKind::IsoDateTime,
            Some("e") => CellKind::Error,
            _ => match style.and_then(|style| self.date_styles.get(style)) {
                Some(true) => CellKind::Date,
                _ => CellKind::Number,
            },
        }
    }

    /// Decodes a cell. Empty string cells stay text; other empty cells are `Empty`.
    fn value(&self, kind: CellKind, text: &str) -> Result<Value, SheetDbError> {
        if text.is_empty() && kind != CellKind::InlineString {
            return Ok(Value::Empty);
        }
        let value = match kind {
            CellKind::Number => Value::Number(text.trim().parse::<f64>()?),
            CellKind::Date => {
                let serial = text.trim().parse::<f64>()?;
                serial_to_datetime(serial, self.is_1904)
                    .map(Value::DateTime)
                    .unwrap_or(Value::Number(serial))
            }
            CellKind::SharedString => {
                let index = text.trim().parse::<usize>()?;
                self.shared_strings
                    .get(index)
                    .map(|string| Value::Text(string.to_owned()))
                    .ok_or_else(|| SheetDbError::WorkbookError(format!("shared string {index} does not exist")))?
            }
            CellKind::InlineString | CellKind::Error => Value::Text(text.to_owned()),
            CellKind::Boolean => Value::Boolean(matches!(text.trim(), "1" | "true" | "TRUE")),
            CellKind::IsoDateTime => parse_iso_datetime(text)
                .map(Value::DateTime)
                .unwrap_or_else(|| Value::Text(text.to_owned())),
        };
        Ok(value)
    }
}

/// Normalizes a relationship target to a path inside the archive.
fn to_zip_path(path: &str) -> String {
    if let Some(path) = path.strip_prefix('/') {
        path.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

/// Loads worksheet relationship ids and their archive paths.
fn load_relationships<RS: Read + Seek>(zip: &mut ZipArchive<RS>, path: &str) -> Result<HashMap<String, String>, SheetDbError> {
    let mut reader = zip
        .xml_reader(path)?
        .ok_or_else(|| SheetDbError::WorkbookError(format!("{path} is missing")))?;
    let mut relationships = HashMap::<String, String>::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(&target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Reads worksheet names with their archive paths, in workbook order, and the date system.
fn load_workbook<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<(Vec<(String, String)>, bool), SheetDbError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip
        .xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SheetDbError::WorkbookError("xl/workbook.xml is missing".to_string()))?;
    let mut sheets = Vec::<(String, String)>::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(&*id) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event
                .get_attribute_value("date1904")?
                .map(|value| value == "1" || value == "true")
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

fn load_shared_strings<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Vec<String>, SheetDbError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Flags, per cell format index, whether the format shows a date or a time.
fn load_date_styles<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Vec<bool>, SheetDbError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<u32, bool>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<u32>::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.parse_attribute_value::<u32>("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                custom_formats.insert(id, is_date_format_code(&format));
            }
        }
        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            format_indexes.push(event.parse_attribute_value::<u32>("numFmtId")?.unwrap_or(0));
        }
    });

    Ok(format_indexes
        .into_iter()
        .map(|id| custom_formats.get(&id).copied().unwrap_or_else(|| is_builtin_date_format(id)))
        .collect())
}

/// Built-in format ids 14 to 22 and 45 to 47 show dates and times.
fn is_builtin_date_format(id: u32) -> bool {
    matches!(id, 14..=22 | 45..=47)
}

/// Scans a format code for date or time tokens outside literals, escapes and brackets.
fn is_date_format_code(format: &str) -> bool {
    let mut is_escaped = false;
    let mut is_literal = false;
    let mut is_bracket = false;
    for character in format.chars() {
        match character {
            _ if is_escaped => is_escaped = false,
            '_' | '\\' => is_escaped = true,

            '"' if is_literal => is_literal = false,
            '"' if !is_bracket => is_literal = true,

            ']' if is_bracket => is_bracket = false,
            '[' if !is_literal => is_bracket = true,
            _ if is_literal || is_bracket => (),

            'Y' | 'y' | 'D' | 'd' | 'H' | 'h' | 'S' | 's' => return true,
            _ => (),
        }
    }
    false
}

/// Reads string content up to `end_tag`, skipping phonetic runs.
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, SheetDbError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_bytes_text(&event)?,
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

/// Reads a worksheet into rows, header row first. Gaps become empty rows and cells.
fn load_sheet<R: BufRead>(reader: &mut XmlReader<R>, decoder: &CellDecoder) -> Result<Vec<Vec<Value>>, SheetDbError> {
    let mut rows = Vec::<Vec<Value>>::new();
    let mut row_count = 0usize;
    let mut col_count = 0usize;
    let mut row = 0usize;
    let mut col = 0usize;
    let mut kind = CellKind::default();
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_ROW => {
            if let Some(number) = event.parse_attribute_value::<usize>("r")? {
                row_count = number.saturating_sub(1);
            }
            col_count = 0;
        }
        Event::End(event) if event.name() == TAG_ROW => {
            row_count += 1;
            col_count = 0;
            if rows.len() < row_count {
                rows.resize_with(row_count, Vec::new);
            }
        }
        Event::Start(event) if event.name() == TAG_CELL => {
            (row, col) = event
                .get_attribute_value("r")?
                .and_then(|reference| reference_to_index(&reference))
                .unwrap_or((row_count, col_count));
            col_count = col + 1;
            let style = event.parse_attribute_value::<usize>("s")?;
            kind = decoder.kind(event.get_attribute_value("t")?.as_deref(), style);
            text.clear();
        }
        Event::Start(event) if event.name() == TAG_INLINE_STRING => {
            text = read_string_value(reader, TAG_INLINE_STRING, false)?;
        }
        Event::Start(event) if event.name() == TAG_VALUE => {
            text = read_string_value(reader, TAG_VALUE, true)?;
        }
        Event::End(event) if event.name() == TAG_CELL => {
            let value = decoder
                .value(kind, &text)
                .with_prefix(&index_to_reference(row, col))?;
            if !value.is_empty() {
                place(&mut rows, row, col, value);
            }
            text.clear();
        }
    });
    if rows.is_empty() {
        rows.push(Vec::new());
    }
    Ok(rows)
}

fn place(rows: &mut Vec<Vec<Value>>, row: usize, col: usize, value: Value) {
    if rows.len() <= row {
        rows.resize_with(row + 1, Vec::new);
    }
    let cells = &mut rows[row];
    if cells.len() <= col {
        cells.resize(col + 1, Value::Empty);
    }
    cells[col] = value;
}

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .expect("NaiveDate Literal")
        .and_time(NaiveTime::default())
}

/// Converts a serial day number to a date-time.
/// Serials below 60 in the 1900 system are shifted by the phantom 1900-02-29.
fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let millis = (serial.fract() * MILLIS_PER_DAY as f64).round() as i64;
    let offset = if is_1904 {
        DAYS_1904_OFFSET
    } else if days < 60 {
        1
    } else {
        0
    };
    epoch()
        .checked_add_signed(TimeDelta::try_days(days + offset)?)?
        .checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

/// Converts a date-time to a 1900 system serial day number.
fn datetime_to_serial(datetime: NaiveDateTime) -> f64 {
    let elapsed = datetime - epoch();
    let days = elapsed.num_days();
    let millis = elapsed.num_milliseconds() - days * MILLIS_PER_DAY;
    let days = if days < 61 { days - 1 } else { days };
    days as f64 + millis as f64 / MILLIS_PER_DAY as f64
}

fn parse_iso_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::default()))
        })
}

/// Writes the whole workbook and returns the number of worksheets.
fn write_workbook<W: Write + Seek>(inner: W, store: &MemoryStore) -> Result<usize, SheetDbError> {
    let tables: Vec<_> = store.tables().collect();
    let mut zip = ZipWriter::new(inner);
    zip.xml_part("[Content_Types].xml", |xml| {
        xml.start("Types", &[("xmlns", NS_CONTENT_TYPES)])?;
        xml.empty("Default", &[("Extension", "rels"), ("ContentType", TYPE_RELATIONSHIPS)])?;
        xml.empty("Default", &[("Extension", "xml"), ("ContentType", "application/xml")])?;
        xml.empty("Override", &[("PartName", "/xl/workbook.xml"), ("ContentType", TYPE_WORKBOOK)])?;
        xml.empty("Override", &[("PartName", "/xl/styles.xml"), ("ContentType", TYPE_STYLES)])?;
        for index in 1..=tables.len() {
            let part = format!("/xl/worksheets/sheet{index}.xml");
            xml.empty("Override", &[("PartName", part.as_str()), ("ContentType", TYPE_WORKSHEET)])?;
        }
        xml.end("Types")
    })?;
    zip.xml_part("_rels/.rels", |xml| {
        xml.start("Relationships", &[("xmlns", NS_PACKAGE_RELATIONSHIPS)])?;
        xml.empty(
            "Relationship",
            &[("Id", "rId1"), ("Type", REL_OFFICE_DOCUMENT), ("Target", "xl/workbook.xml")],
        )?;
        xml.end("Relationships")
    })?;
    zip.xml_part("xl/workbook.xml", |xml| {
        xml.start("workbook", &[("xmlns", NS_MAIN), ("xmlns:r", NS_RELATIONSHIPS)])?;
        xml.start("sheets", &[])?;
        for (index, table) in tables.iter().enumerate() {
            let sheet_id = (index + 1).to_string();
            let relationship_id = format!("rId{sheet_id}");
            xml.empty(
                "sheet",
                &[("name", table.name.as_str()), ("sheetId", sheet_id.as_str()), ("r:id", relationship_id.as_str())],
            )?;
        }
        xml.end("sheets")?;
        xml.end("workbook")
    })?;
    zip.xml_part("xl/_rels/workbook.xml.rels", |xml| {
        xml.start("Relationships", &[("xmlns", NS_PACKAGE_RELATIONSHIPS)])?;
        for index in 1..=tables.len() {
            let id = format!("rId{index}");
            let target = format!("worksheets/sheet{index}.xml");
            xml.empty("Relationship", &[("Id", id.as_str()), ("Type", REL_WORKSHEET), ("Target", target.as_str())])?;
        }
        let id = format!("rId{}", tables.len() + 1);
        xml.empty("Relationship", &[("Id", id.as_str()), ("Type", REL_STYLES), ("Target", "styles.xml")])?;
        xml.end("Relationships")
    })?;
    zip.xml_part("xl/styles.xml", |xml| write_styles(xml))?;
    for (index, table) in tables.iter().enumerate() {
        zip.xml_part(&format!("xl/worksheets/sheet{}.xml", index + 1), |xml| write_sheet(xml, &table.rows))
            .with_prefix(&format!("Worksheet '{}'", table.name))?;
    }
    zip.finish()?;
    Ok(tables.len())
}

/// Two cell formats: general, and `DATE_TIME_STYLE` showing built-in format 22.
fn write_styles<W: Write>(xml: &mut XmlWriter<W>) -> Result<(), SheetDbError> {
    let xf = [("numFmtId", "0"), ("fontId", "0"), ("fillId", "0"), ("borderId", "0")];
    xml.start("styleSheet", &[("xmlns", NS_MAIN)])?;
    xml.start("fonts", &[("count", "1")])?;
    xml.start("font", &[])?;
    xml.empty("sz", &[("val", "11")])?;
    xml.empty("name", &[("val", "Calibri")])?;
    xml.end("font")?;
    xml.end("fonts")?;
    xml.start("fills", &[("count", "2")])?;
    for pattern in ["none", "gray125"] {
        xml.start("fill", &[])?;
        xml.empty("patternFill", &[("patternType", pattern)])?;
        xml.end("fill")?;
    }
    xml.end("fills")?;
    xml.start("borders", &[("count", "1")])?;
    xml.start("border", &[])?;
    for side in ["left", "right", "top", "bottom", "diagonal"] {
        xml.empty(side, &[])?;
    }
    xml.end("border")?;
    xml.end("borders")?;
    xml.start("cellStyleXfs", &[("count", "1")])?;
    xml.empty("xf", &xf)?;
    xml.end("cellStyleXfs")?;
    xml.start("cellXfs", &[("count", "2")])?;
    xml.empty("xf", &[xf[0], xf[1], xf[2], xf[3], ("xfId", "0")])?;
    xml.empty(
        "xf",
        &[("numFmtId", "22"), xf[1], xf[2], xf[3], ("xfId", "0"), ("applyNumberFormat", "1")],
    )?;
    xml.end("cellXfs")?;
    xml.end("styleSheet")
}

fn write_sheet<W: Write>(xml: &mut XmlWriter<W>, rows: &[Vec<Value>]) -> Result<(), SheetDbError> {
    xml.start("worksheet", &[("xmlns", NS_MAIN)])?;
    xml.start("sheetData", &[])?;
    for (row, cells) in rows.iter().enumerate() {
        let row_number = (row + 1).to_string();
        xml.start("row", &[("r", row_number.as_str())])?;
        for (col, value) in cells.iter().enumerate() {
            let reference = index_to_reference(row, col);
            match value {
                Value::Empty => continue,
                Value::Boolean(flag) => {
                    xml.start("c", &[("r", reference.as_str()), ("t", "b")])?;
                    xml.element("v", &[], if *flag { "1" } else { "0" })?;
                }
                Value::Number(number) if number.is_finite() => {
                    xml.start("c", &[("r", reference.as_str())])?;
                    xml.element("v", &[], &number.to_string())?;
                }
                Value::DateTime(datetime) => {
                    xml.start("c", &[("r", reference.as_str()), ("s", DATE_TIME_STYLE)])?;
                    xml.element("v", &[], &datetime_to_serial(*datetime).to_string())?;
                }
                Value::Number(_) | Value::Text(_) => {
                    xml.start("c", &[("r", reference.as_str()), ("t", "inlineStr")])?;
                    xml.start("is", &[])?;
                    xml.element("t", &[("xml:space", "preserve")], &value.to_string())?;
                    xml.end("is")?;
                }
            }
            xml.end("c")?;
        }
        xml.end("row")?;
    }
    xml.end("sheetData")?;
    xml.end("worksheet")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::Criteria;
    use crate::criteria::Updates;
    use crate::database::Database;
    use zip::write::SimpleFileOptions;

    fn datetime(text: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn write_archive(path: &Path, parts: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, content) in parts {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn serial_numbers() {
        assert_eq!(serial_to_datetime(1.0, false), Some(datetime("1900-01-01 00:00:00")));
        assert_eq!(serial_to_datetime(59.0, false), Some(datetime("1900-02-28 00:00:00")));
        assert_eq!(serial_to_datetime(61.0, false), Some(datetime("1900-03-01 00:00:00")));
        assert_eq!(serial_to_datetime(45000.5, false), Some(datetime("2023-03-15 12:00:00")));
        assert_eq!(serial_to_datetime(0.0, true), Some(datetime("1904-01-01 00:00:00")));
        assert_eq!(serial_to_datetime(-1.0, false), None);
        assert_eq!(serial_to_datetime(f64::NAN, false), None);

        assert_eq!(datetime_to_serial(datetime("1900-01-01 00:00:00")), 1.0);
        assert_eq!(datetime_to_serial(datetime("1900-03-01 00:00:00")), 61.0);
        assert_eq!(datetime_to_serial(datetime("2023-03-15 12:00:00")), 45000.5);
        let moment = datetime("2024-07-09 17:45:31");
        assert_eq!(serial_to_datetime(datetime_to_serial(moment), false), Some(moment));
    }

    #[test]
    fn date_formats() {
        assert!(is_builtin_date_format(14));
        assert!(is_builtin_date_format(22));
        assert!(is_builtin_date_format(46));
        assert!(!is_builtin_date_format(4));
        assert!(is_date_format_code("yyyy-mm-dd"));
        assert!(is_date_format_code("h:mm AM/PM"));
        assert!(is_date_format_code("[$-409]d-mmm"));
        assert!(!is_date_format_code("0.00"));
        assert!(!is_date_format_code("[Red]#,##0"));
        assert!(!is_date_format_code("\"days\" 0"));
        assert!(!is_date_format_code("0\\d"));
    }

    #[test]
    fn iso_dates() {
        assert_eq!(parse_iso_datetime("2024-02-29T08:30:00"), Some(datetime("2024-02-29 08:30:00")));
        assert_eq!(parse_iso_datetime("2024-02-29"), Some(datetime("2024-02-29 00:00:00")));
        assert_eq!(parse_iso_datetime("yesterday"), None);
    }

    #[test]
    fn save_and_open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.xlsx");
        let joined = datetime("2021-06-01 09:15:00");

        let mut db = Database::new(XlsxStore::create(&path));
        db.create_table("Users", &["ID", "Name", "Active", "Joined", "Score"]).unwrap();
        db.create_table("Cities", &["ID", "City"]).unwrap();
        db.insert_entry(
            "Users",
            &[Value::from(1), Value::from("Tom & <Jerry>"), Value::from(true), Value::from(joined), Value::from(2.5)],
        )
        .unwrap();
        db.insert_entry("Users", &[Value::from(2), Value::from("  padded  "), Value::from(false)])
            .unwrap();
        db.insert_entry("Cities", &[Value::from(1), Value::from("Paris")]).unwrap();
        let expected = db.get_entries("Users", None, None).unwrap();

        let mut store = db.into_store();
        assert!(store.is_dirty());
        store.save().unwrap();
        assert!(!store.is_dirty());

        let mut db = Database::new(XlsxStore::open(&path).unwrap());
        assert!(!db.store().is_dirty());
        assert_eq!(db.get_tables().unwrap(), vec!["Users", "Cities"]);
        assert_eq!(db.get_headers("Users").unwrap(), vec!["ID", "Name", "Active", "Joined", "Score"]);
        assert_eq!(db.get_entries("Users", None, None).unwrap(), expected);
        assert_eq!(db.get_entries("Users", None, None).unwrap()[0].get("Joined"), &Value::from(joined));

        db.update_entries("Users", &Criteria::new().eq("ID", 2), &Updates::new().set("Score", 7))
            .unwrap();
        assert!(db.store().is_dirty());
    }

    #[test]
    fn empty_text_and_blank_rows_survive_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.xlsx");
        let mut db = Database::new(XlsxStore::create(&path));
        db.create_table("Notes", &["ID", "Note"]).unwrap();
        db.insert_entry("Notes", &[Value::from(1), Value::from("")]).unwrap();
        db.insert_entry("Notes", &[]).unwrap();
        let blank_notes = Criteria::new().eq("Note", "");
        assert_eq!(db.count_entries("Notes").unwrap(), 2);
        assert_eq!(db.get_entries("Notes", Some(&blank_notes), None).unwrap().len(), 1);
        db.into_store().save().unwrap();

        let db = Database::new(XlsxStore::open(&path).unwrap());
        assert_eq!(db.count_entries("Notes").unwrap(), 2);
        let entries = db.get_entries("Notes", Some(&blank_notes), None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].get("Note"), &Value::Text(String::new()));
        assert_eq!(entries[0].get("ID"), &Value::from(1));
    }

    #[test]
    fn empty_table_keeps_header_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");
        let mut store = XlsxStore::create(&path);
        store.create_table("Nothing", &[]).unwrap();
        store.save().unwrap();

        let store = XlsxStore::open(&path).unwrap();
        let table = store.get_table("Nothing").unwrap().unwrap();
        assert_eq!(store.row_count(&table).unwrap(), 1);
    }

    #[test]
    fn open_hand_written_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hand.xlsx");
        write_archive(
            &path,
            &[
                (
                    "xl/workbook.xml",
                    r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<workbookPr date1904="1"/>
<sheets>
<sheet name="People" sheetId="1" r:id="rId1"/>
<sheet name="Ghost" sheetId="2" r:id="rId2"/>
<sheet name="Events" sheetId="3" r:id="rId3"/>
</sheets>
</workbook>"#,
                ),
                (
                    "xl/_rels/workbook.xml.rels",
                    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/missing.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/>
<Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#,
                ),
                (
                    "xl/sharedStrings.xml",
                    r#"<sst><si><t>Name</t></si><si><r><t>Ma</t></r><r><t>ry</t></r><rPh><t>x</t></rPh></si><si><t>Joined</t></si></sst>"#,
                ),
                (
                    "xl/styles.xml",
                    r#"<styleSheet>
<numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy\-mm\-dd"/></numFmts>
<cellStyleXfs count="1"><xf numFmtId="14"/></cellStyleXfs>
<cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="164"/><xf numFmtId="4"/></cellXfs>
</styleSheet>"#,
                ),
                (
                    "xl/worksheets/sheet1.xml",
                    r#"<worksheet><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="inlineStr"><is><t>Active</t></is></c><c r="C1" t="s"><v>2</v></c><c r="D1" t="str"><f>"Score"</f><v>Score</v></c></row>
<row r="2"><c r="A2" t="s"><v>1</v></c><c r="B2" t="b"><v>1</v></c><c r="C2" s="1"><v>0</v></c><c r="D2" s="2"><v>12.5</v></c></row>
<row r="4"><c r="B4" t="b"><v>0</v></c><c r="D4" t="e"><v>#DIV/0!</v></c></row>
</sheetData></worksheet>"#,
                ),
                (
                    "xl/worksheets/sheet2.xml",
                    r#"<worksheet><sheetData><row><c t="inlineStr"><is><t>When</t></is></c></row><row><c t="d"><v>2024-02-29T08:30:00</v></c></row></sheetData></worksheet>"#,
                ),
            ],
        );

        let db = Database::new(XlsxStore::open(&path).unwrap());
        assert_eq!(db.get_tables().unwrap(), vec!["People", "Events"]);
        assert_eq!(db.get_headers("People").unwrap(), vec!["Name", "Active", "Joined", "Score"]);

        let people = db.get_entries("People", None, None).unwrap();
        assert_eq!(people.len(), 3);
        assert_eq!(people[0].get("Name"), &Value::from("Mary"));
        assert_eq!(people[0].get("Active"), &Value::from(true));
        assert_eq!(people[0].get("Joined"), &Value::from(datetime("1904-01-01 00:00:00")));
        assert_eq!(people[0].get("Score"), &Value::from(12.5));
        assert!(people[1].iter().all(|(_, value)| value.is_empty()));
        assert_eq!(people[2].get("Active"), &Value::from(false));
        assert_eq!(people[2].get("Score"), &Value::from("#DIV/0!"));

        let events = db.get_entries("Events", None, None).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].get("When"), &Value::from(datetime("2024-02-29 08:30:00")));
    }

    #[test]
    fn open_rejects_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            XlsxStore::open(dir.path().join("absent.xlsx")),
            Err(SheetDbError::AnyhowError(_))
        ));

        let path = dir.path().join("no-workbook.xlsx");
        write_archive(&path, &[("docProps/app.xml", "<Properties/>")]);
        assert!(XlsxStore::open(&path).is_err());
    }
}
