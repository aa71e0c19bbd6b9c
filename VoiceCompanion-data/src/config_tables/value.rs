//! Cell values and their conversion into typed configuration values

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

/// A raw spreadsheet cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl CellValue {
    /// Empty cells and blank strings both count as empty
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Text rendering used for keys, strings and fallbacks.
    /// Integral floats render without a fraction so numeric keys read `100001`.
    pub fn text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::String(s) => s.clone(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
            CellValue::Float(f) => f.to_string(),
            CellValue::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CellValue::Empty => "empty",
            CellValue::String(_) => "string",
            CellValue::Int(_) => "int",
            CellValue::Float(_) => "float",
            CellValue::Bool(_) => "bool",
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::String(s.to_string())
        }
    }
}

/// A converted configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Null,
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<ConfigValue>),
    Json(serde_json::Value),
}

impl ConfigValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            ConfigValue::Json(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            ConfigValue::Float(f) => Some(*f as i64),
            ConfigValue::String(s) => s.trim().parse().ok(),
            ConfigValue::Json(v) => v.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Int(i) => Some(*i as f64),
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::String(s) => s.trim().parse().ok(),
            ConfigValue::Json(v) => v.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::Json(v) => v.as_bool(),
            _ => None,
        }
    }

    /// Plain JSON form of the value
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Lenient text rendering; `Null` renders empty
impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Null => Ok(()),
            ConfigValue::String(s) => f.write_str(s),
            ConfigValue::Int(i) => write!(f, "{}", i),
            ConfigValue::Float(v) => write!(f, "{}", v),
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|item| item.to_string()).collect();
                f.write_str(&parts.join(", "))
            }
            ConfigValue::Json(serde_json::Value::String(s)) => f.write_str(s),
            ConfigValue::Json(v) => write!(f, "{}", v),
        }
    }
}

/// Column name to value for one row; the key column is not repeated
pub type ConfigRecord = IndexMap<String, ConfigValue>;

/// Key to record, in file order
pub type ConfigSheet = IndexMap<String, ConfigRecord>;

/// Convert a cell according to the column's declared type
pub fn convert_cell(cell: &CellValue, type_name: &str) -> ConfigValue {
    if cell.is_empty() {
        return ConfigValue::Null;
    }

    match type_name.trim().to_lowercase().as_str() {
        "int" => ConfigValue::Int(match cell {
            CellValue::Int(i) => *i,
            CellValue::Float(f) => f.trunc() as i64,
            CellValue::Bool(b) => *b as i64,
            CellValue::String(s) => s.trim().parse().unwrap_or(0),
            CellValue::Empty => 0,
        }),
        "float" => ConfigValue::Float(match cell {
            CellValue::Int(i) => *i as f64,
            CellValue::Float(f) => *f,
            CellValue::Bool(b) => *b as i64 as f64,
            CellValue::String(s) => s.trim().parse().unwrap_or(0.0),
            CellValue::Empty => 0.0,
        }),
        "bool" => ConfigValue::Bool(match cell {
            CellValue::Bool(b) => *b,
            CellValue::Int(i) => *i != 0,
            CellValue::Float(f) => *f != 0.0,
            CellValue::String(s) => matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "是"),
            CellValue::Empty => false,
        }),
        "list" => convert_list(cell),
        "json" => convert_structured(cell, |text| {
            if text.starts_with('{') && text.ends_with('}') {
                serde_json::from_str::<serde_json::Value>(text).ok()
            } else {
                None
            }
        }),
        "yaml" => convert_structured(cell, |text| {
            if text.starts_with('-') || text.contains(':') {
                serde_yaml::from_str::<serde_json::Value>(text).ok()
            } else {
                None
            }
        }),
        _ => ConfigValue::String(cell.text().trim().to_string()),
    }
}

fn convert_list(cell: &CellValue) -> ConfigValue {
    let CellValue::String(raw) = cell else {
        return ConfigValue::List(vec![ConfigValue::String(cell.text())]);
    };
    let text = raw.trim();

    if text.starts_with('[') && text.ends_with(']') {
        let inner = text[1..text.len() - 1].trim();
        if inner.is_empty() {
            return ConfigValue::List(Vec::new());
        }
        return ConfigValue::List(inner.split(',').map(list_item).collect());
    }

    if text.contains(',') {
        return ConfigValue::List(text.split(',').map(list_item).collect());
    }

    ConfigValue::List(vec![ConfigValue::String(text.to_string())])
}

fn list_item(raw: &str) -> ConfigValue {
    let item = raw.trim();
    if item.contains('.') {
        if let Ok(f) = item.parse::<f64>() {
            return ConfigValue::Float(f);
        }
    } else if let Ok(i) = item.parse::<i64>() {
        return ConfigValue::Int(i);
    }
    ConfigValue::String(item.to_string())
}

/// Non-text cells pass through unchanged; text that does not parse stays as text
fn convert_structured(cell: &CellValue, parse: impl Fn(&str) -> Option<serde_json::Value>) -> ConfigValue {
    match cell {
        CellValue::String(raw) => {
            let text = raw.trim();
            match parse(text) {
                Some(value) => ConfigValue::Json(value),
                None => ConfigValue::String(text.to_string()),
            }
        }
        CellValue::Int(i) => ConfigValue::Int(*i),
        CellValue::Float(f) => ConfigValue::Float(*f),
        CellValue::Bool(b) => ConfigValue::Bool(*b),
        CellValue::Empty => ConfigValue::Null,
    }
}
