use indexmap::IndexMap;
use std::collections::HashMap;

/// Immutable extension <-> media-type lookup, built once and shared with the
/// handlers that need it.
#[derive(Debug, Clone, Default)]
pub struct MediaTypes {
    by_extension: HashMap<String, String>,
    by_type: IndexMap<String, Vec<String>>,
}

impl MediaTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `media_type` for the given extensions. Later registrations
    /// of an extension win.
    pub fn with(mut self, media_type: &str, extensions: &[&str]) -> Self {
        let entry = self.by_type.entry(media_type.to_string()).or_default();
        for ext in extensions {
            let ext = normalize(ext);
            entry.push(ext.clone());
            self.by_extension.insert(ext, media_type.to_string());
        }
        self
    }

    pub fn standard() -> Self {
        Self::new()
            .with("application/json", &["json", "map"])
            .with("application/javascript", &["js", "mjs"])
            .with("application/pdf", &["pdf"])
            .with("application/toml", &["toml"])
            .with("application/xml", &["xml"])
            .with("application/yaml", &["yaml", "yml"])
            .with("image/gif", &["gif"])
            .with("image/jpeg", &["jpg", "jpeg"])
            .with("image/png", &["png"])
            .with("image/svg+xml", &["svg"])
            .with("text/css", &["css"])
            .with("text/csv", &["csv"])
            .with("text/html", &["html", "htm"])
            .with("text/markdown", &["md", "markdown"])
            .with("text/plain", &["txt", "text", "log"])
            .with("text/x-rust", &["rs"])
    }

    /// Media type for an extension, with or without the leading dot.
    pub fn lookup(&self, extension: &str) -> Option<&str> {
        self.by_extension
            .get(&normalize(extension))
            .map(String::as_str)
    }

    pub fn extensions(&self, media_type: &str) -> &[String] {
        self.by_type
            .get(media_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_extension.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }
}

fn normalize(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_dot_and_case() {
        let types = MediaTypes::standard();
        assert_eq!(types.lookup("json"), Some("application/json"));
        assert_eq!(types.lookup(".JSON"), Some("application/json"));
        assert_eq!(types.lookup("unknown"), None);
    }

    #[test]
    fn test_reverse_lookup() {
        let types = MediaTypes::new().with("text/html", &["html", ".htm"]);
        assert_eq!(types.extensions("text/html"), ["html", "htm"]);
        assert!(types.extensions("text/plain").is_empty());
        assert_eq!(types.len(), 2);
    }
}
