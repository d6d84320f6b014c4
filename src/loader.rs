//! Reads sheets from disk: CSV files (one sheet each), directories of CSV
//! files, and JSON workbook exports.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::models::{CellValue, Sheet, Workbook};

pub fn load_csv(path: &Path) -> Result<Sheet> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;

    let headers: Vec<CellValue> = reader
        .headers()?
        .iter()
        .map(|header| CellValue::Text(header.trim().to_string()))
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(CellValue::infer).collect());
    }

    let sheet = Sheet::new(file_stem(path)?, headers, rows);
    debug!(path = %path.display(), sheet = %sheet.name, rows = sheet.row_count(), "loaded csv");
    Ok(sheet)
}

/// Every `*.csv` directly inside `dir`, in lexical file-name order.
pub fn load_csv_dir(dir: &Path) -> Result<Vec<Sheet>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_extension(path, "csv"))
        .collect();
    paths.sort();
    paths.iter().map(|path| load_csv(path)).collect()
}

pub fn load_workbook_json(path: &Path) -> Result<Workbook> {
    #[derive(Deserialize)]
    struct SheetFile {
        name: String,
        #[serde(default)]
        headers: Vec<CellValue>,
        #[serde(default)]
        rows: Vec<Vec<CellValue>>,
    }

    #[derive(Deserialize)]
    struct WorkbookFile {
        name: Option<String>,
        sheets: Vec<SheetFile>,
    }

    let content = fs::read_to_string(path)?;
    let file: WorkbookFile = serde_json::from_str(&content)?;
    let name = match file.name {
        Some(name) => name,
        None => file_stem(path)?,
    };

    Ok(Workbook {
        name,
        sheets: file
            .sheets
            .into_iter()
            .map(|sheet| Sheet::new(sheet.name, sheet.headers, sheet.rows))
            .collect(),
    })
}

/// Loads every input path, keeping argument order.
pub fn load_inputs(paths: &[PathBuf]) -> Result<Vec<Sheet>> {
    let mut sheets = Vec::new();
    for path in paths {
        if path.is_dir() {
            sheets.extend(load_csv_dir(path)?);
        } else if has_extension(path, "csv") {
            sheets.push(load_csv(path)?);
        } else if has_extension(path, "json") {
            sheets.extend(load_workbook_json(path)?.sheets);
        } else {
            return Err(EngineError::InvalidInput(format!(
                "unsupported input '{}': expected a directory, .csv or .json file",
                path.display()
            )));
        }
    }
    Ok(sheets)
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(String::from)
        .ok_or_else(|| EngineError::InvalidInput(format!("no file name in '{}'", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn csv_rows_are_typed_and_ragged_rows_kept() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("Avery Lee.csv");
        fs::write(&path, "DATA,STATUS,ID\n05/01/2024,CONCLUIDO,17\n06/01/2024\n").expect("write");

        let sheet = load_csv(&path).expect("load");
        assert_eq!(sheet.name, "Avery Lee");
        assert_eq!(sheet.headers, vec!["DATA", "STATUS", "ID"]);
        assert_eq!(sheet.row_count(), 2);
        assert_eq!(sheet.rows[0][2], CellValue::Number(17.0));
        assert_eq!(sheet.rows[1].len(), 1);
        assert_eq!(sheet.records().nth(1).map(|r| r.get(1).is_empty()), Some(true));
    }

    #[test]
    fn directories_load_in_name_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("b.csv"), "DATA,STATUS\n01/01/2024,OK\n").expect("write");
        fs::write(dir.path().join("a.csv"), "DATA,STATUS\n01/01/2024,OK\n").expect("write");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

        let names: Vec<String> = load_csv_dir(dir.path())
            .expect("load")
            .into_iter()
            .map(|sheet| sheet.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn json_workbook_keeps_native_cells() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("team.json");
        fs::write(
            &path,
            r#"{"sheets":[{"name":"Jules","headers":["DATA","STATUS",7],
                "rows":[[{"datetime":"2024-01-05T09:30:00"},"PENDENTE",null],[45292,true]]}]}"#,
        )
        .expect("write");

        let workbook = load_workbook_json(&path).expect("load");
        assert_eq!(workbook.name, "team");
        let sheet = &workbook.sheets[0];
        assert_eq!(sheet.headers, vec!["DATA", "STATUS", "7"]);
        let expected = NaiveDate::from_ymd_opt(2024, 1, 5)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .expect("valid");
        assert_eq!(sheet.rows[0][0], CellValue::DateTime(expected));
        assert_eq!(sheet.rows[0][2], CellValue::Empty);
        assert_eq!(sheet.rows[1][0], CellValue::Number(45292.0));
        assert_eq!(sheet.rows[1][1], CellValue::Bool(true));
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        let err = load_inputs(&[PathBuf::from("team.xlsx")]).expect_err("unsupported");
        assert!(err.to_string().contains("team.xlsx"));
    }
}
