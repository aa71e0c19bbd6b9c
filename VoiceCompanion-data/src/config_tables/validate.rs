//! Workbook validation performed before any sheet is converted

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use super::reader::RawSheet;
use super::value::CellValue;

/// Documentation sheet skipped by validation and conversion
pub const DESCRIPTION_SHEET: &str = ".DESC";

const VALID_TYPES: [&str; 7] = ["string", "int", "float", "bool", "list", "json", "yaml"];
const VALID_KEY_TYPES: [&str; 2] = ["string", "int"];
const BOOL_SPELLINGS: [&str; 8] = ["true", "false", "1", "0", "yes", "no", "是", "否"];

/// Validation outcome for one sheet
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SheetValidation {
    pub sheet_name: String,
    pub total_rows: usize,
    pub total_columns: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Validation outcome for a workbook
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub file_name: String,
    pub total_sheets: usize,
    pub sheets: IndexMap<String, SheetValidation>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub valid: bool,
}

impl ValidationReport {
    /// Report for a workbook that could not be read at all
    pub fn failed(file_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            errors: vec![error.into()],
            valid: false,
            ..Default::default()
        }
    }
}

/// Validate every sheet of a workbook
pub fn validate_workbook(file_name: &str, sheets: &[RawSheet]) -> ValidationReport {
    let mut report = ValidationReport {
        file_name: file_name.to_string(),
        total_sheets: sheets.len(),
        ..Default::default()
    };

    let mut valid_sheets = 0;
    for sheet in sheets.iter().filter(|s| s.name != DESCRIPTION_SHEET) {
        let result = validate_sheet(sheet);
        if result.errors.is_empty() {
            valid_sheets += 1;
        }
        report
            .errors
            .extend(result.errors.iter().map(|e| format!("{}: {}", sheet.name, e)));
        report
            .warnings
            .extend(result.warnings.iter().map(|w| format!("{}: {}", sheet.name, w)));
        report.sheets.insert(sheet.name.clone(), result);
    }

    if valid_sheets == 0 {
        report.errors.push("no valid sheet".to_string());
    }

    for sheet in sheets {
        if sheet.name != DESCRIPTION_SHEET && !is_identifier(&sheet.name) {
            report
                .warnings
                .push(format!("sheet name '{}' contains special characters", sheet.name));
        }
        if sheet.name.chars().count() > 30 {
            report.warnings.push(format!("sheet name '{}' is too long", sheet.name));
        }
    }

    report.valid = report.errors.is_empty();
    report
}

/// Validate one sheet: header row, description row, type row, then data
pub fn validate_sheet(sheet: &RawSheet) -> SheetValidation {
    let total_columns = sheet.width();
    let mut result = SheetValidation {
        sheet_name: sheet.name.clone(),
        total_rows: sheet.rows.len(),
        total_columns,
        ..Default::default()
    };

    if sheet.rows.iter().all(|row| row.iter().all(CellValue::is_empty)) {
        result.errors.push("sheet is empty".to_string());
        return result;
    }
    if sheet.rows.len() < 4 {
        result
            .errors
            .push("at least 4 rows are required: names, descriptions, types, data".to_string());
        return result;
    }
    if total_columns < 2 {
        result
            .errors
            .push("at least 2 columns are required: key and value".to_string());
        return result;
    }

    let column_names = sheet.column_names();
    let types: Vec<Option<String>> = (0..total_columns)
        .map(|col| {
            let cell = sheet.cell(2, col);
            (!cell.is_empty()).then(|| cell.text().trim().to_lowercase())
        })
        .collect();
    let data_rows = &sheet.rows[3..];

    check_keys(data_rows, &mut result);

    match &types[0] {
        None => result.errors.push("key column has no type declaration".to_string()),
        Some(t) if !VALID_KEY_TYPES.contains(&t.as_str()) => result.errors.push(format!(
            "key column type '{}' is not valid, key columns support: {:?}",
            t, VALID_KEY_TYPES
        )),
        Some(_) => {}
    }

    for (col, declared) in types.iter().enumerate().skip(1) {
        match declared {
            None => result.warnings.push(format!("column {} has no type definition", col)),
            Some(t) if !VALID_TYPES.contains(&t.as_str()) => result.warnings.push(format!(
                "column {} type '{}' is not valid, valid types: {:?}",
                col, t, VALID_TYPES
            )),
            Some(_) => {}
        }
    }

    for col in 1..total_columns {
        let declared = types[col].as_deref().unwrap_or("string");
        for (offset, row) in data_rows.iter().enumerate() {
            let cell = row.get(col).unwrap_or(&CellValue::Empty);
            if cell.is_empty() {
                continue;
            }
            // 1-based spreadsheet row
            let row_num = offset + 4;
            let (errors, warnings) = check_value(cell, declared, row_num);
            result
                .errors
                .extend(errors.into_iter().map(|e| format!("column '{}': {}", column_names[col], e)));
            result
                .warnings
                .extend(warnings.into_iter().map(|w| format!("column '{}': {}", column_names[col], w)));
        }
    }

    let total_cells = data_rows.len() * total_columns;
    let empty_cells: usize = data_rows
        .iter()
        .map(|row| (0..total_columns).filter(|&c| row.get(c).map_or(true, CellValue::is_empty)).count())
        .sum();
    if empty_cells as f64 > total_cells as f64 * 0.8 {
        result.warnings.push(format!(
            "data is sparse ({}/{} empty cells)",
            empty_cells, total_cells
        ));
    }

    result
}

fn check_keys(data_rows: &[Vec<CellValue>], result: &mut SheetValidation) {
    let keys: Vec<String> = data_rows
        .iter()
        .filter_map(|row| row.first())
        .filter(|cell| !matches!(cell, CellValue::Empty))
        // Conversion trims keys, so "a" and "a " are the same key
        .map(|cell| cell.text().trim().to_string())
        .collect();

    let blank = keys.iter().filter(|k| k.is_empty()).count();
    if blank > 0 {
        result.errors.push(format!("found empty keys: {}", blank));
    }

    let mut seen = HashSet::new();
    let mut duplicates: Vec<&str> = Vec::new();
    for key in keys.iter().filter(|k| !k.is_empty()) {
        if !seen.insert(key.as_str()) && !duplicates.contains(&key.as_str()) {
            duplicates.push(key);
        }
    }
    if !duplicates.is_empty() {
        result.errors.push(format!("found duplicate keys: {:?}", duplicates));
    }

    for key in keys.iter().map(String::as_str).filter(|k| !k.is_empty()) {
        if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            result
                .warnings
                .push(format!("key '{}' contains special characters", key));
        }
        let len = key.chars().count();
        if len > 50 {
            result.warnings.push(format!("key '{}' is too long ({} characters)", key, len));
        }
    }
}

fn check_value(cell: &CellValue, declared: &str, row_num: usize) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match (declared, cell) {
        ("string", CellValue::String(s)) => {
            let len = s.chars().count();
            if len > 1000 {
                warnings.push(format!("row {}: string is too long ({} characters)", row_num, len));
            }
            if s.contains(['\u{0}', '\u{1}', '\u{2}']) {
                errors.push(format!("row {}: contains control characters", row_num));
            }
        }
        ("string", other) => {
            warnings.push(format!("row {}: expected a string, found {}", row_num, other.kind()));
        }
        ("int", _) => match integer_of(cell) {
            Some(i) if i < i32::MIN as i64 || i > i32::MAX as i64 => {
                warnings.push(format!("row {}: integer out of range", row_num));
            }
            Some(_) => {}
            None => errors.push(format!("row {}: cannot convert to integer", row_num)),
        },
        ("float", CellValue::String(s)) if s.trim().parse::<f64>().is_err() => {
            errors.push(format!("row {}: cannot convert to float", row_num));
        }
        ("bool", CellValue::String(s)) if !BOOL_SPELLINGS.contains(&s.to_lowercase().as_str()) => {
            warnings.push(format!("row {}: non-standard boolean value", row_num));
        }
        ("list", CellValue::String(s)) => {
            let text = s.trim();
            if !(text.starts_with('[') && text.ends_with(']')) {
                warnings.push(format!("row {}: list should look like [a, b, c], found: {}", row_num, text));
            }
        }
        ("json", CellValue::String(s)) => {
            let text = s.trim();
            if !(text.starts_with('{') && text.ends_with('}')) {
                warnings.push(format!("row {}: JSON should look like {{key: value}}, found: {}", row_num, text));
            } else if serde_json::from_str::<serde_json::Value>(text).is_err() {
                errors.push(format!("row {}: JSON does not parse", row_num));
            }
        }
        ("yaml", CellValue::String(s)) => {
            let text = s.trim();
            if !(text.starts_with('-') || text.contains(':')) {
                warnings.push(format!("row {}: irregular YAML", row_num));
            } else if serde_yaml::from_str::<serde_yaml::Value>(text).is_err() {
                errors.push(format!("row {}: YAML does not parse", row_num));
            }
        }
        _ => {}
    }

    (errors, warnings)
}

fn integer_of(cell: &CellValue) -> Option<i64> {
    match cell {
        CellValue::Int(i) => Some(*i),
        CellValue::Float(f) => Some(f.trunc() as i64),
        CellValue::Bool(b) => Some(*b as i64),
        CellValue::String(s) => s.trim().parse().ok(),
        CellValue::Empty => None,
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(name: &str, rows: &[&[&str]]) -> RawSheet {
        RawSheet::from_text(name, rows)
    }

    fn intent_sheet() -> RawSheet {
        sheet(
            "Intent",
            &[
                &["ID", "Name", "Weight", "Enabled"],
                &["id", "name", "weight", "enabled"],
                &["int", "string", "float", "bool"],
                &["100001", "General", "1.0", "true"],
                &["100002", "Greeting", "0.5", "yes"],
            ],
        )
    }

    #[test]
    fn test_valid_sheet() {
        let result = validate_sheet(&intent_sheet());
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert_eq!(result.total_rows, 5);
        assert_eq!(result.total_columns, 4);
    }

    #[test]
    fn test_structure_errors() {
        let short = validate_sheet(&sheet("S", &[&["a", "b"], &["", ""], &["string", "string"]]));
        assert!(short.errors[0].contains("at least 4 rows"));

        let narrow = validate_sheet(&sheet("N", &[&["k"], &["d"], &["string"], &["x"]]));
        assert!(narrow.errors[0].contains("at least 2 columns"));

        let empty = validate_sheet(&sheet("E", &[]));
        assert_eq!(empty.errors, vec!["sheet is empty".to_string()]);
    }

    #[test]
    fn test_key_errors() {
        let result = validate_sheet(&sheet(
            "K",
            &[
                &["Key", "Value"],
                &["", ""],
                &["float", "string"],
                &["a", "1"],
                &["a", "2"],
                &["  ", "3"],
            ],
        ));
        assert!(result.errors.iter().any(|e| e.contains("duplicate keys")));
        assert!(result.errors.iter().any(|e| e.contains("empty keys: 1")));
        assert!(result.errors.iter().any(|e| e.contains("key column type 'float'")));
    }

    #[test]
    fn test_value_errors_and_warnings() {
        let result = validate_sheet(&sheet(
            "V",
            &[
                &["Key", "Count", "Data", "Flag", "Tags"],
                &["", "", "", "", ""],
                &["string", "int", "json", "bool", "list"],
                &["row_a", "abc", "{broken", "maybe", "a, b"],
                &["row-b", "99999999999", "{\"ok\": 1}", "是", "[a]"],
            ],
        ));

        assert!(result.errors.iter().any(|e| e == "column 'Count': row 4: cannot convert to integer"));
        assert!(result.warnings.iter().any(|w| w == "column 'Count': row 5: integer out of range"));
        assert!(result.warnings.iter().any(|w| w.contains("JSON should look like")));
        assert!(result.warnings.iter().any(|w| w.contains("non-standard boolean")));
        assert!(result.warnings.iter().any(|w| w.contains("list should look like")));
        assert!(result.warnings.iter().any(|w| w.contains("key 'row-b' contains special characters")));
    }

    #[test]
    fn test_keys_are_compared_trimmed() {
        let result = validate_sheet(&sheet(
            "T",
            &[
                &["Key", "Value"],
                &["", ""],
                &["string", "string"],
                &["a", "1"],
                &["a ", "2"],
                &["b", "3"],
            ],
        ));
        assert_eq!(result.errors, vec!["found duplicate keys: [\"a\"]".to_string()]);
    }

    #[test]
    fn test_text_content_rules() {
        let long_key = "k".repeat(51);
        let long_text = "字".repeat(1001);
        let result = validate_sheet(&sheet(
            "C",
            &[
                &["Key", "Text", "Config"],
                &["", "", ""],
                &["string", "string", "yaml"],
                &["ctrl", "bad\u{1}value", "- a\n- b"],
                &["yaml_bad", "fine", "key: [unclosed"],
                &[long_key.as_str(), long_text.as_str(), "plain words"],
            ],
        ));

        assert!(result.errors.contains(&"column 'Text': row 4: contains control characters".to_string()));
        assert!(result.errors.contains(&"column 'Config': row 5: YAML does not parse".to_string()));
        assert_eq!(result.errors.len(), 2, "{:?}", result.errors);

        assert!(result.warnings.contains(&"column 'Config': row 6: irregular YAML".to_string()));
        assert!(result.warnings.contains(&"column 'Text': row 6: string is too long (1001 characters)".to_string()));
        assert!(result
            .warnings
            .contains(&format!("key '{}' is too long (51 characters)", long_key)));
    }

    #[test]
    fn test_sparse_data_warning() {
        let result = validate_sheet(&sheet(
            "Sparse",
            &[
                &["Key", "A", "B", "C", "D", "E"],
                &["", "", "", "", "", ""],
                &["string"; 6],
                &["k1", "", "", "", "", ""],
                &["k2", "", "", "", "", ""],
            ],
        ));
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.warnings, vec!["data is sparse (10/12 empty cells)".to_string()]);

        // Exactly 80 percent empty is still acceptable
        let result = validate_sheet(&sheet(
            "Edge",
            &[&["Key", "A", "B", "C", "D"], &["", "", "", "", ""], &["string"; 5], &["k1", "", "", "", ""]],
        ));
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_long_sheet_name_warning() {
        let name = "a".repeat(31);
        let mut long = intent_sheet();
        long.name = name.clone();
        let report = validate_workbook("nlp.xlsx", &[long]);

        assert!(report.valid);
        assert_eq!(report.warnings, vec![format!("sheet name '{}' is too long", name)]);

        let mut limit = intent_sheet();
        limit.name = "b".repeat(30);
        assert!(validate_workbook("nlp.xlsx", &[limit]).warnings.is_empty());
    }

    #[test]
    fn test_workbook_report() {
        let desc = sheet(DESCRIPTION_SHEET, &[&["free text"]]);
        let bad = sheet("bad sheet", &[&["a"]]);
        let report = validate_workbook("nlp.xlsx", &[desc, intent_sheet(), bad]);

        assert_eq!(report.total_sheets, 3);
        assert_eq!(report.sheets.len(), 2);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.starts_with("bad sheet: ")));
        assert!(report.warnings.iter().any(|w| w.contains("'bad sheet' contains special characters")));
    }

    #[test]
    fn test_workbook_without_valid_sheet() {
        let report = validate_workbook("empty.xlsx", &[sheet(DESCRIPTION_SHEET, &[&["x"]])]);
        assert_eq!(report.errors, vec!["no valid sheet".to_string()]);
        assert!(!report.valid);
    }
}
