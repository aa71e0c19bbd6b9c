use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::reader::{ExcelDirectory, RawSheet, WorkbookReader};
use super::validate::{validate_workbook, ValidationReport, DESCRIPTION_SHEET};
use super::value::{convert_cell, ConfigRecord, ConfigSheet};
use super::ConfigTableError;

/// A converted workbook
#[derive(Debug, Clone, Serialize)]
pub struct ConfigTable {
    pub name: String,
    pub sheets: IndexMap<String, ConfigSheet>,
    #[serde(skip)]
    pub source_mtime: Option<SystemTime>,
    pub loaded_at: DateTime<Utc>,
}

impl ConfigTable {
    pub fn sheet(&self, sheet: &str) -> Option<&ConfigSheet> {
        self.sheets.get(sheet)
    }

    pub fn record(&self, sheet: &str, key: &str) -> Option<&ConfigRecord> {
        self.sheets.get(sheet).and_then(|s| s.get(key))
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.keys().cloned().collect()
    }
}

/// Freshness of one workbook compared with what is loaded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FreshnessDetail {
    pub excel_file: String,
    /// Seconds since the epoch
    pub excel_mtime: Option<f64>,
    /// Modification time of the version currently loaded
    pub last_loaded: Option<f64>,
    pub status: String,
}

/// Freshness of every workbook in the source
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FreshnessReport {
    pub all_up_to_date: bool,
    pub total_configs: usize,
    pub up_to_date_configs: usize,
    pub outdated_configs: Vec<String>,
    pub missing_excel_files: Vec<String>,
    pub details: BTreeMap<String, FreshnessDetail>,
}

#[derive(Default)]
struct LoaderState {
    tables: HashMap<String, Arc<ConfigTable>>,
    /// Modification times of versions that failed validation
    rejected: HashMap<String, SystemTime>,
}

/// Loaded configuration tables, reloaded when their workbooks change
pub struct ConfigTables {
    reader: Arc<dyn WorkbookReader>,
    state: RwLock<LoaderState>,
}

impl std::fmt::Debug for ConfigTables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigTables")
            .field("loaded", &self.list_configs())
            .finish()
    }
}

fn epoch_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}

/// Convert one validated sheet; rows with a blank key are skipped
pub fn convert_sheet(sheet: &RawSheet) -> ConfigSheet {
    let mut converted = ConfigSheet::new();
    if sheet.rows.len() < 4 {
        return converted;
    }

    let width = sheet.width();
    let columns = sheet.column_names();
    let types: Vec<String> = (0..width).map(|col| sheet.cell(2, col).text()).collect();

    for row in 3..sheet.rows.len() {
        let key = sheet.cell(row, 0).text().trim().to_string();
        if key.is_empty() {
            continue;
        }
        let record: ConfigRecord = (1..width)
            .map(|col| {
                let declared = if types[col].trim().is_empty() { "string" } else { types[col].as_str() };
                (columns[col].clone(), convert_cell(sheet.cell(row, col), declared))
            })
            .collect();
        converted.insert(key, record);
    }
    converted
}

impl ConfigTables {
    pub fn new(reader: Arc<dyn WorkbookReader>) -> Self {
        Self {
            reader,
            state: RwLock::new(LoaderState::default()),
        }
    }

    /// Tables backed by the spreadsheets in `dir`
    pub fn from_directory(dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(ExcelDirectory::new(dir)))
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, LoaderState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, LoaderState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read, validate and convert a workbook without touching the loaded state
    pub fn load_table(&self, domain: &str) -> Result<ConfigTable, ConfigTableError> {
        let source_mtime = self.reader.modified(domain);
        if source_mtime.is_none() {
            return Err(ConfigTableError::NotFound(self.reader.location(domain)));
        }

        let sheets = self.reader.read(domain)?;
        let report = validate_workbook(&self.reader.location(domain), &sheets);
        for warning in &report.warnings {
            warn!("Workbook {} warning: {}", domain, warning);
        }
        if !report.valid {
            return Err(ConfigTableError::Invalid {
                domain: domain.to_string(),
                errors: report.errors,
            });
        }

        let converted: IndexMap<String, ConfigSheet> = sheets
            .iter()
            .filter(|sheet| sheet.name != DESCRIPTION_SHEET)
            .map(|sheet| (sheet.name.clone(), convert_sheet(sheet)))
            .filter(|(_, data)| !data.is_empty())
            .collect();

        if converted.is_empty() {
            return Err(ConfigTableError::Invalid {
                domain: domain.to_string(),
                errors: vec!["workbook has no usable data".to_string()],
            });
        }

        Ok(ConfigTable {
            name: domain.to_string(),
            sheets: converted,
            source_mtime,
            loaded_at: Utc::now(),
        })
    }

    /// Whether the workbook changed since it was loaded (or was never loaded)
    fn needs_reload(&self, domain: &str) -> bool {
        let Some(mtime) = self.reader.modified(domain) else {
            return false;
        };
        let state = self.read_state();
        if state.rejected.get(domain) == Some(&mtime) {
            return false;
        }
        match state.tables.get(domain).and_then(|t| t.source_mtime) {
            Some(loaded) => mtime > loaded,
            None => true,
        }
    }

    /// Load the workbook when it changed. True when the domain is available afterwards;
    /// a failed load keeps whatever was loaded before.
    pub fn reload_config(&self, domain: &str) -> bool {
        if !self.needs_reload(domain) {
            return self.read_state().tables.contains_key(domain);
        }

        match self.load_table(domain) {
            Ok(table) => {
                info!(
                    "Loaded configuration {} ({} sheets)",
                    domain,
                    table.sheets.len()
                );
                let mut state = self.write_state();
                state.rejected.remove(domain);
                state.tables.insert(domain.to_string(), Arc::new(table));
                true
            }
            Err(e) => {
                error!("Failed to load configuration {}: {}", domain, e);
                let mut state = self.write_state();
                if let Some(mtime) = self.reader.modified(domain) {
                    state.rejected.insert(domain.to_string(), mtime);
                }
                state.tables.contains_key(domain)
            }
        }
    }

    /// Reload every workbook in the source
    pub fn reload_all_configs(&self) -> BTreeMap<String, bool> {
        match self.reader.list() {
            Ok(domains) => domains
                .into_iter()
                .map(|domain| {
                    let ok = self.reload_config(&domain);
                    (domain, ok)
                })
                .collect(),
            Err(e) => {
                error!("Failed to list configuration workbooks: {}", e);
                BTreeMap::new()
            }
        }
    }

    /// Reload the workbooks whose files changed, returning the domains that were reloaded
    pub fn reload_changed(&self) -> Vec<String> {
        let domains = match self.reader.list() {
            Ok(domains) => domains,
            Err(e) => {
                error!("Failed to list configuration workbooks: {}", e);
                return Vec::new();
            }
        };

        let mut reloaded = Vec::new();
        for domain in domains {
            if self.needs_reload(&domain) {
                info!("Detected workbook change: {}", self.reader.location(&domain));
                if self.reload_config(&domain) {
                    reloaded.push(domain);
                }
            }
        }
        reloaded
    }

    pub fn get_config(&self, domain: &str) -> Option<Arc<ConfigTable>> {
        self.reload_config(domain);
        self.cached_config(domain)
    }

    pub fn get_config_sheet(&self, domain: &str, sheet: &str) -> Option<ConfigSheet> {
        self.get_config(domain)?.sheet(sheet).cloned()
    }

    pub fn get_config_value(&self, domain: &str, sheet: &str, key: &str) -> Option<ConfigRecord> {
        self.get_config(domain)?.record(sheet, key).cloned()
    }

    /// The loaded table without checking the workbook
    pub fn cached_config(&self, domain: &str) -> Option<Arc<ConfigTable>> {
        self.read_state().tables.get(domain).cloned()
    }

    pub fn cached_sheet(&self, domain: &str, sheet: &str) -> Option<ConfigSheet> {
        self.cached_config(domain)?.sheet(sheet).cloned()
    }

    pub fn cached_value(&self, domain: &str, sheet: &str, key: &str) -> Option<ConfigRecord> {
        self.cached_config(domain)?.record(sheet, key).cloned()
    }

    /// `reload_config` on the blocking pool, for callers on the async runtime
    pub async fn refresh(self: Arc<Self>, domain: &str) -> bool {
        let name = domain.to_string();
        match tokio::task::spawn_blocking(move || self.reload_config(&name)).await {
            Ok(available) => available,
            Err(e) => {
                error!("Configuration refresh of {} failed: {}", domain, e);
                false
            }
        }
    }

    /// Names of the loaded domains, sorted
    pub fn list_configs(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_state().tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn list_sheets(&self, domain: &str) -> Vec<String> {
        self.get_config(domain)
            .map(|table| table.sheet_names())
            .unwrap_or_default()
    }

    /// Validate a workbook without loading it
    pub fn validate_config(&self, domain: &str) -> ValidationReport {
        let location = self.reader.location(domain);
        if self.reader.modified(domain).is_none() {
            return ValidationReport::failed(location, "Excel file not found");
        }
        match self.reader.read(domain) {
            Ok(sheets) => validate_workbook(&location, &sheets),
            Err(e) => ValidationReport::failed(location, e.to_string()),
        }
    }

    /// Compare every workbook's modification time with the loaded version
    pub fn check_all_configs_up_to_date(&self) -> FreshnessReport {
        let domains = match self.reader.list() {
            Ok(domains) => domains,
            Err(e) => {
                error!("Failed to list configuration workbooks: {}", e);
                Vec::new()
            }
        };

        let state = self.read_state();
        let mut report = FreshnessReport {
            total_configs: domains.len(),
            ..Default::default()
        };

        for domain in &domains {
            let excel_mtime = self.reader.modified(domain);
            let loaded = state.tables.get(domain).and_then(|t| t.source_mtime);
            let status = match (excel_mtime, loaded) {
                (_, None) => "not_loaded",
                (Some(current), Some(loaded)) if current > loaded => "outdated",
                _ => "up_to_date",
            };

            if status == "up_to_date" {
                report.up_to_date_configs += 1;
            } else {
                report.outdated_configs.push(domain.clone());
            }
            report.details.insert(
                domain.clone(),
                FreshnessDetail {
                    excel_file: self.reader.location(domain),
                    excel_mtime: excel_mtime.map(epoch_seconds),
                    last_loaded: loaded.map(epoch_seconds),
                    status: status.to_string(),
                },
            );
        }

        let mut missing: Vec<String> = state
            .tables
            .keys()
            .filter(|name| !domains.contains(name))
            .cloned()
            .collect();
        missing.sort();
        report.missing_excel_files = missing;

        report.all_up_to_date = report.outdated_configs.is_empty() && report.missing_excel_files.is_empty();
        report
    }

    /// Poll the source every `interval` and reload changed workbooks until the handle is aborted
    pub fn watch_and_reload(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        info!("Watching configuration workbooks every {:?}", interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let tables = Arc::clone(&self);
                match tokio::task::spawn_blocking(move || tables.reload_changed()).await {
                    Ok(reloaded) if !reloaded.is_empty() => {
                        info!(domains = ?reloaded, "Reloaded configuration workbooks");
                    }
                    Ok(_) => debug!("No configuration changes"),
                    Err(e) => error!("Configuration watch iteration failed: {}", e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_tables::reader::MemoryWorkbooks;
    use crate::config_tables::value::{CellValue, ConfigValue};

    fn intent_sheet(general_name: &str) -> RawSheet {
        RawSheet::from_text(
            "Intent",
            &[
                &["ID", "Name", "Keywords", "Catagory"],
                &["intent id", "display name", "comma separated", "category"],
                &["int", "string", "string", "string"],
                &["100001", general_name, "", "chat"],
                &["100002", "Greeting", "你好,hello", "chat"],
                &["", "ignored", "", ""],
            ],
        )
    }

    fn setup() -> (Arc<MemoryWorkbooks>, ConfigTables) {
        let books = Arc::new(MemoryWorkbooks::new());
        books.insert(
            "nlp",
            vec![RawSheet::from_text(".DESC", &[&["notes"]]), intent_sheet("General")],
        );
        let tables = ConfigTables::new(books.clone());
        (books, tables)
    }

    #[test]
    fn test_lookups() {
        let (_books, tables) = setup();

        let record = tables.get_config_value("nlp", "Intent", "100002").unwrap();
        assert_eq!(record["Name"], ConfigValue::String("Greeting".into()));
        assert_eq!(record["Keywords"].as_str(), Some("你好,hello"));
        assert!(!record.contains_key("ID"));

        let sheet = tables.get_config_sheet("nlp", "Intent").unwrap();
        assert_eq!(sheet.keys().collect::<Vec<_>>(), vec!["100001", "100002"]);
        assert!(sheet["100001"]["Keywords"].is_null());

        assert_eq!(tables.list_sheets("nlp"), vec!["Intent".to_string()]);
        assert_eq!(tables.list_configs(), vec!["nlp".to_string()]);
        assert!(tables.get_config("missing").is_none());
    }

    #[test]
    fn test_edit_is_picked_up() {
        let (books, tables) = setup();
        assert_eq!(
            tables.get_config_value("nlp", "Intent", "100001").unwrap()["Name"],
            ConfigValue::String("General".into())
        );

        books.insert("nlp", vec![intent_sheet("Chit chat")]);

        assert_eq!(
            tables.get_config_value("nlp", "Intent", "100001").unwrap()["Name"],
            ConfigValue::String("Chit chat".into())
        );
    }

    #[tokio::test]
    async fn test_refresh_then_cached_lookups() {
        let (books, tables) = setup();
        let tables = Arc::new(tables);
        assert!(tables.cached_config("nlp").is_none());

        assert!(Arc::clone(&tables).refresh("nlp").await);
        assert_eq!(
            tables.cached_value("nlp", "Intent", "100001").unwrap()["Name"],
            ConfigValue::String("General".into())
        );

        // Cached reads do not see an edit until the next refresh
        books.insert("nlp", vec![intent_sheet("Edited")]);
        assert_eq!(
            tables.cached_sheet("nlp", "Intent").unwrap()["100001"]["Name"],
            ConfigValue::String("General".into())
        );
        assert!(Arc::clone(&tables).refresh("nlp").await);
        assert_eq!(
            tables.cached_value("nlp", "Intent", "100001").unwrap()["Name"],
            ConfigValue::String("Edited".into())
        );

        assert!(!Arc::clone(&tables).refresh("missing").await);
    }

    #[test]
    fn test_invalid_edit_keeps_previous_table() {
        let (books, tables) = setup();
        assert!(tables.reload_config("nlp"));

        books.insert(
            "nlp",
            vec![RawSheet::from_text("Intent", &[&["ID", "Name"], &["", ""], &["int", "string"]])],
        );

        assert!(tables.reload_config("nlp"));
        assert!(tables.get_config_value("nlp", "Intent", "100002").is_some());

        let report = tables.check_all_configs_up_to_date();
        assert_eq!(report.details["nlp"].status, "outdated");
        assert!(!report.all_up_to_date);
    }

    #[test]
    fn test_reload_all_and_freshness() {
        let (books, tables) = setup();
        books.insert("broken", vec![RawSheet::from_text("X", &[&["only"]])]);

        let results = tables.reload_all_configs();
        assert_eq!(results["nlp"], true);
        assert_eq!(results["broken"], false);

        let report = tables.check_all_configs_up_to_date();
        assert_eq!(report.total_configs, 2);
        assert_eq!(report.up_to_date_configs, 1);
        assert_eq!(report.outdated_configs, vec!["broken".to_string()]);
        assert_eq!(report.details["broken"].status, "not_loaded");
        assert_eq!(report.details["nlp"].status, "up_to_date");
    }

    #[test]
    fn test_removed_workbook_stays_loaded() {
        let (books, tables) = setup();
        assert!(tables.reload_config("nlp"));
        books.remove("nlp");

        assert!(tables.get_config("nlp").is_some());
        let report = tables.check_all_configs_up_to_date();
        assert_eq!(report.missing_excel_files, vec!["nlp".to_string()]);
        assert!(!report.all_up_to_date);
    }

    #[test]
    fn test_validate_config() {
        let (_books, tables) = setup();
        let missing = tables.validate_config("absent");
        assert_eq!(missing.errors, vec!["Excel file not found".to_string()]);
        assert!(!missing.valid);

        let report = tables.validate_config("nlp");
        assert!(report.valid, "{:?}", report.errors);
        assert_eq!(report.total_sheets, 2);
    }

    #[test]
    fn test_convert_sheet_stringifies_keys() {
        let sheet = RawSheet::new(
            "Pages",
            vec![
                vec!["ID".into(), "Enabled".into()],
                vec![CellValue::Empty, CellValue::Empty],
                vec!["int".into(), "bool".into()],
                vec![CellValue::Float(7.0), CellValue::Int(1)],
            ],
        );
        let converted = convert_sheet(&sheet);
        assert_eq!(converted["7"]["Enabled"], ConfigValue::Bool(true));
    }

    #[test]
    fn test_real_workbook_with_uppercase_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Pages").unwrap();
        for (col, (name, kind)) in [("ID", "string"), ("Route", "string"), ("Order", "int")].iter().enumerate() {
            sheet.write_string(0, col as u16, *name).unwrap();
            sheet.write_string(2, col as u16, *kind).unwrap();
        }
        sheet.write_string(3, 0, "home").unwrap();
        sheet.write_string(3, 1, "/home").unwrap();
        sheet.write_number(3, 2, 1.0).unwrap();
        workbook.save(dir.path().join("navigation.XLSX")).unwrap();

        let tables = ConfigTables::from_directory(dir.path());
        assert_eq!(tables.reload_all_configs()["navigation"], true);

        let record = tables.get_config_value("navigation", "Pages", "home").unwrap();
        assert_eq!(record["Route"], ConfigValue::String("/home".into()));
        assert_eq!(record["Order"], ConfigValue::Int(1));

        let report = tables.check_all_configs_up_to_date();
        assert!(report.all_up_to_date);
        assert_eq!(report.details["navigation"].status, "up_to_date");
        assert!(report.details["navigation"].excel_file.ends_with("navigation.XLSX"));
    }

    #[tokio::test]
    async fn test_watch_reloads_changes() {
        let (books, tables) = setup();
        let tables = Arc::new(tables);
        let handle = Arc::clone(&tables).watch_and_reload(Duration::from_millis(10));

        let mut loaded = false;
        for _ in 0..100 {
            if tables.list_configs().contains(&"nlp".to_string()) {
                loaded = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(loaded, "watcher never loaded the workbook");

        books.insert("nlp", vec![intent_sheet("Edited")]);
        let mut edited = false;
        for _ in 0..100 {
            let state_name = tables
                .read_state()
                .tables
                .get("nlp")
                .and_then(|t| t.record("Intent", "100001").cloned());
            if state_name.map(|r| r["Name"] == ConfigValue::String("Edited".into())).unwrap_or(false) {
                edited = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert!(edited, "watcher never picked up the edit");
    }

}
