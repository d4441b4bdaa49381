//! Read/write the JSON files fetched data is persisted in.
//!
//! Files are pretty-printed and written once per fetch. A missing input file is
//! fatal for the run that needs it.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::error::{AppError, EXIT_INPUT};

/// Read and decode a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    if !path.exists() {
        return Err(AppError::missing_input(path));
    }
    let file = File::open(path)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to open '{}': {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Invalid JSON in '{}': {e}", path.display())))
}

/// Write `value` as pretty-printed JSON, creating parent directories as needed.
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::new(EXIT_INPUT, format!("Failed to create directory '{}': {e}", parent.display()))
        })?;
    }
    let file = File::create(path)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to create '{}': {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write '{}': {e}", path.display())))?;
    writer
        .flush()
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write '{}': {e}", path.display())))?;

    info!(path = %path.display(), "saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountGroup, TransactionFile};
    use serde_json::json;

    #[test]
    fn round_trips_through_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sorted.json");
        let groups = vec![AccountGroup {
            name: "A".into(),
            accounts: vec!["1".into()],
            account_count: 1,
        }];

        write_json_pretty(&path, &groups).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    "), "expected pretty-printed output");

        let back: Vec<AccountGroup> = read_json(&path).unwrap();
        assert_eq!(back, groups);
    }

    #[test]
    fn missing_file_is_fatal_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_json::<TransactionFile>(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_INPUT);
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn invalid_json_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = read_json::<serde_json::Value>(&path).unwrap_err();
        assert!(err.to_string().starts_with("Invalid JSON"));

        write_json_pretty(&path, &json!({"ok": true})).unwrap();
        assert_eq!(read_json::<serde_json::Value>(&path).unwrap(), json!({"ok": true}));
    }
}
