//! Workbook sources: `.xlsx` files on disk or workbooks held in memory

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, SystemTime};

use calamine::{open_workbook, Data, Ods, Reader, Sheets, Xls, Xlsx};
use tracing::debug;

use super::value::CellValue;
use super::ConfigTableError;

const WORKBOOK_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

/// One sheet as a grid of raw cells
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawSheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { name: name.into(), rows }
    }

    /// Build a sheet from text cells; empty strings become empty cells
    pub fn from_text(name: impl Into<String>, rows: &[&[&str]]) -> Self {
        Self::new(
            name,
            rows.iter()
                .map(|row| row.iter().map(|cell| CellValue::from(*cell)).collect())
                .collect(),
        )
    }

    /// Widest row length
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&CellValue::Empty)
    }

    /// Header row text; blank headers are named after their position
    pub fn column_names(&self) -> Vec<String> {
        (0..self.width())
            .map(|col| {
                let name = self.cell(0, col).text().trim().to_string();
                if name.is_empty() {
                    format!("column_{}", col)
                } else {
                    name
                }
            })
            .collect()
    }
}

/// A set of named workbooks with modification times
pub trait WorkbookReader: Send + Sync {
    /// Domain names of every workbook currently available, sorted
    fn list(&self) -> Result<Vec<String>, ConfigTableError>;

    /// Modification time of a workbook, `None` when it does not exist
    fn modified(&self, domain: &str) -> Option<SystemTime>;

    /// Every sheet of a workbook in file order
    fn read(&self, domain: &str) -> Result<Vec<RawSheet>, ConfigTableError>;

    /// Human readable location used in reports
    fn location(&self, domain: &str) -> String;
}

/// Editor lock files such as `~$nlp.xlsx` or `.~nlp.xlsx`
pub fn is_temp_file(file_name: &str) -> bool {
    file_name.starts_with("~$") || file_name.starts_with(".~")
}

/// Spreadsheet files in one directory, one workbook per domain
#[derive(Debug, Clone)]
pub struct ExcelDirectory {
    dir: PathBuf,
}

impl ExcelDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Supported workbook files in the directory as `(domain, extension rank, path)`.
    /// Extensions match case-insensitively.
    fn workbook_files(&self) -> std::io::Result<Vec<(String, usize, PathBuf)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let rank = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(|e| WORKBOOK_EXTENSIONS.iter().position(|ext| ext.eq_ignore_ascii_case(e)));
            let (Some(rank), Some(stem)) = (rank, path.file_stem().and_then(|s| s.to_str())) else {
                continue;
            };
            if is_temp_file(file_name) || !path.is_file() {
                continue;
            }
            files.push((stem.to_string(), rank, path.clone()));
        }
        Ok(files)
    }

    fn path_for(&self, domain: &str) -> PathBuf {
        self.workbook_files()
            .unwrap_or_default()
            .into_iter()
            .filter(|(stem, _, _)| stem == domain)
            .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.2.cmp(&b.2)))
            .map(|(_, _, path)| path)
            .unwrap_or_else(|| self.dir.join(format!("{}.xlsx", domain)))
    }
}

impl WorkbookReader for ExcelDirectory {
    fn list(&self) -> Result<Vec<String>, ConfigTableError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut domains: Vec<String> = self.workbook_files()?.into_iter().map(|(stem, _, _)| stem).collect();
        domains.sort();
        domains.dedup();
        Ok(domains)
    }

    fn modified(&self, domain: &str) -> Option<SystemTime> {
        fs::metadata(self.path_for(domain)).and_then(|m| m.modified()).ok()
    }

    fn read(&self, domain: &str) -> Result<Vec<RawSheet>, ConfigTableError> {
        let path = self.path_for(domain);
        debug!("Reading workbook {}", path.display());

        let mut workbook =
            open_sheets(&path).map_err(|e| ConfigTableError::Workbook(format!("{}: {}", path.display(), e)))?;

        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|e| ConfigTableError::Workbook(format!("{}[{}]: {}", path.display(), name, e)))?;

            // Ranges start at the first used cell; pad back to A1
            let (row_offset, col_offset) = range
                .start()
                .map(|(r, c)| (r as usize, c as usize))
                .unwrap_or((0, 0));
            let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); row_offset];
            for row in range.rows() {
                let mut cells = vec![CellValue::Empty; col_offset];
                cells.extend(row.iter().map(cell_from_data));
                rows.push(cells);
            }
            sheets.push(RawSheet::new(name, rows));
        }
        Ok(sheets)
    }

    fn location(&self, domain: &str) -> String {
        self.path_for(domain).display().to_string()
    }
}

/// Open by extension, ignoring its case
fn open_sheets(path: &Path) -> Result<Sheets<BufReader<File>>, String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "xls" => open_workbook::<Xls<_>, _>(path).map(Sheets::Xls).map_err(|e| e.to_string()),
        "ods" => open_workbook::<Ods<_>, _>(path).map(Sheets::Ods).map_err(|e| e.to_string()),
        _ => open_workbook::<Xlsx<_>, _>(path).map(Sheets::Xlsx).map_err(|e| e.to_string()),
    }
}

fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        other => CellValue::String(other.to_string()),
    }
}

/// Workbooks held in memory; every insert advances the modification time
#[derive(Debug, Default)]
pub struct MemoryWorkbooks {
    books: RwLock<HashMap<String, (SystemTime, Vec<RawSheet>)>>,
    clock: AtomicU64,
}

impl MemoryWorkbooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a workbook
    pub fn insert(&self, domain: impl Into<String>, sheets: Vec<RawSheet>) {
        let tick = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(tick);
        if let Ok(mut books) = self.books.write() {
            books.insert(domain.into(), (mtime, sheets));
        }
    }

    pub fn remove(&self, domain: &str) {
        if let Ok(mut books) = self.books.write() {
            books.remove(domain);
        }
    }
}

impl WorkbookReader for MemoryWorkbooks {
    fn list(&self) -> Result<Vec<String>, ConfigTableError> {
        let books = self.books.read()?;
        let mut domains: Vec<String> = books.keys().cloned().collect();
        domains.sort();
        Ok(domains)
    }

    fn modified(&self, domain: &str) -> Option<SystemTime> {
        self.books.read().ok()?.get(domain).map(|(mtime, _)| *mtime)
    }

    fn read(&self, domain: &str) -> Result<Vec<RawSheet>, ConfigTableError> {
        self.books
            .read()?
            .get(domain)
            .map(|(_, sheets)| sheets.clone())
            .ok_or_else(|| ConfigTableError::NotFound(domain.to_string()))
    }

    fn location(&self, domain: &str) -> String {
        format!("memory://{}", domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_files() {
        assert!(is_temp_file("~$nlp.xlsx"));
        assert!(is_temp_file(".~nlp.xlsx"));
        assert!(!is_temp_file("nlp.xlsx"));
    }

    #[test]
    fn test_raw_sheet_helpers() {
        let sheet = RawSheet::from_text("S", &[&["Key", "", "Third"], &["a"]]);
        assert_eq!(sheet.width(), 3);
        assert_eq!(sheet.cell(1, 2), &CellValue::Empty);
        assert_eq!(sheet.column_names(), vec!["Key", "column_1", "Third"]);
    }

    #[test]
    fn test_memory_workbooks_advance_mtime() {
        let books = MemoryWorkbooks::new();
        assert!(books.modified("nlp").is_none());

        books.insert("nlp", vec![RawSheet::from_text("Intent", &[&["a"]])]);
        let first = books.modified("nlp").unwrap();
        books.insert("nlp", vec![]);
        let second = books.modified("nlp").unwrap();

        assert!(second > first);
        assert_eq!(books.list().unwrap(), vec!["nlp".to_string()]);
        books.remove("nlp");
        assert!(matches!(books.read("nlp"), Err(ConfigTableError::NotFound(_))));
    }

    #[test]
    fn test_excel_directory_lists_workbooks() {
        let dir = std::env::temp_dir().join(format!("vc-excel-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        for name in ["nlp.xlsx", "~$nlp.xlsx", "navigation.xlsx", "notes.txt"] {
            fs::write(dir.join(name), b"").unwrap();
        }

        let source = ExcelDirectory::new(&dir);
        assert_eq!(source.list().unwrap(), vec!["navigation".to_string(), "nlp".to_string()]);
        assert!(source.modified("nlp").is_some());
        assert!(source.modified("missing").is_none());
        // Not a real workbook
        assert!(matches!(source.read("nlp"), Err(ConfigTableError::Workbook(_))));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_extension_case_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("navigation.XLSX"), b"").unwrap();

        let source = ExcelDirectory::new(dir.path());
        assert_eq!(source.list().unwrap(), vec!["navigation".to_string()]);
        assert!(source.modified("navigation").is_some());
        assert!(source.location("navigation").ends_with("navigation.XLSX"));
    }

    #[test]
    fn test_read_real_workbook_pads_to_a1() {
        let dir = tempfile::tempdir().unwrap();
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Offset").unwrap();
        sheet.write_string(1, 1, "x").unwrap();
        sheet.write_number(1, 2, 3.5).unwrap();
        sheet.write_boolean(2, 1, true).unwrap();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Second").unwrap();
        sheet.write_string(0, 0, "first").unwrap();
        workbook.save(dir.path().join("layout.xlsx")).unwrap();

        let sheets = ExcelDirectory::new(dir.path()).read("layout").unwrap();
        assert_eq!(sheets.len(), 2);

        let offset = &sheets[0];
        assert_eq!(offset.name, "Offset");
        assert_eq!(offset.rows.len(), 3);
        assert!(offset.rows[0].is_empty());
        assert_eq!(
            offset.rows[1],
            vec![CellValue::Empty, CellValue::String("x".to_string()), CellValue::Float(3.5)]
        );
        assert_eq!(offset.cell(2, 1), &CellValue::Bool(true));
        assert_eq!(offset.cell(2, 2), &CellValue::Empty);

        assert_eq!(sheets[1].name, "Second");
        assert_eq!(sheets[1].cell(0, 0), &CellValue::String("first".to_string()));
    }

    #[test]
    fn test_missing_directory_lists_nothing() {
        let source = ExcelDirectory::new("/definitely/not/here");
        assert!(source.list().unwrap().is_empty());
    }
}
