use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::mediatype::MediaTypes;

/// One discovered file, as emitted by the walker and completed by the
/// reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub base: PathBuf,
    /// Path relative to `base`.
    pub path: PathBuf,
    pub full_path: PathBuf,
    pub name: String,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    /// Directory depth below `base`.
    #[serde(default)]
    pub level: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<Value>,
}

impl FileRecord {
    /// Returns `None` when `full_path` has no file name.
    pub fn new(base: &Path, full_path: &Path, level: usize, media: &MediaTypes) -> Option<Self> {
        let name = full_path.file_name()?.to_string_lossy().into_owned();
        let extension = full_path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        let media_type = extension
            .as_deref()
            .and_then(|e| media.lookup(e))
            .map(String::from);
        let path = full_path
            .strip_prefix(base)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(&name));

        Some(Self {
            base: base.to_path_buf(),
            path,
            full_path: full_path.to_path_buf(),
            name,
            extension,
            media_type,
            level,
            contents: None,
        })
    }

    pub fn is_json(&self) -> bool {
        self.media_type.as_deref() == Some("application/json")
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Fails when required fields such as `full_path` are missing.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_fills_derived_fields() {
        let media = MediaTypes::standard();
        let record = FileRecord::new(
            Path::new("/data"),
            Path::new("/data/conf/app.JSON"),
            1,
            &media,
        )
        .unwrap();

        assert_eq!(record.name, "app.JSON");
        assert_eq!(record.path, PathBuf::from("conf/app.JSON"));
        assert_eq!(record.extension.as_deref(), Some("json"));
        assert!(record.is_json());
        assert_eq!(record.level, 1);
    }

    #[test]
    fn test_from_value_requires_full_path() {
        let err = FileRecord::from_value(json!({"base": "/", "path": "a", "name": "a"}));
        assert!(err.is_err());
    }
}
