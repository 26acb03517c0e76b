use packetflow_macros::FlowHandler;
use regex::{Regex, RegexBuilder};
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::warn;

use super::mediatype::MediaTypes;
use super::record::FileRecord;
use crate::core::{Handler, Inputs, OutputPort, Outputs};

/// Recursively scans `base`, emitting one `FileRecord` per file whose name
/// matches the optional case-insensitive `mask`. Directories are scanned
/// concurrently; the stream ends once every scan has finished.
#[derive(FlowHandler)]
#[handler(name = "walker", category = "Sources", input = "base", input = "mask", output = "out")]
pub struct Walker {
    media: Rc<MediaTypes>,
}

impl Walker {
    pub fn new(media: Rc<MediaTypes>) -> Self {
        Self { media }
    }
}

impl Default for Walker {
    fn default() -> Self {
        Self::new(Rc::new(MediaTypes::standard()))
    }
}

impl Handler for Walker {
    fn process(&mut self, input: &Inputs, output: &Outputs) {
        let Some(base) = input
            .read_port("base")
            .and_then(|v| v.as_str().map(PathBuf::from))
        else {
            return;
        };
        let mask = match input.read_port("mask").as_ref().and_then(|v| v.as_str()) {
            Some(pattern) => match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(mask) => Some(mask),
                Err(e) => {
                    warn!(%pattern, error = %e, "invalid walker mask");
                    return;
                }
            },
            None => None,
        };
        let Some(out) = output.port("out") else {
            return;
        };

        let scan = Rc::new(Scan {
            base: base.clone(),
            mask,
            media: self.media.clone(),
            out,
            pending: Cell::new(0),
        });
        scan.visit(base, 0);
    }
}

struct Scan {
    base: PathBuf,
    mask: Option<Regex>,
    media: Rc<MediaTypes>,
    out: OutputPort,
    pending: Cell<usize>,
}

impl Scan {
    fn visit(self: &Rc<Self>, dir: PathBuf, level: usize) {
        self.pending.set(self.pending.get() + 1);
        let scan = self.clone();
        tokio::task::spawn_local(async move {
            scan.scan_dir(dir, level).await;
            scan.finish_one();
        });
    }

    async fn scan_dir(self: &Rc<Self>, dir: PathBuf, level: usize) {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot read directory");
                return;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "directory listing failed");
                    break;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_skipped(&name) {
                continue;
            }
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            let path = entry.path();

            if file_type.is_dir() {
                self.visit(path, level + 1);
            } else if file_type.is_file() && self.mask.as_ref().map_or(true, |m| m.is_match(&name)) {
                if let Some(record) = FileRecord::new(&self.base, &path, level, &self.media) {
                    self.out.send(record.to_value());
                }
            }
        }
    }

    fn finish_one(&self) {
        let remaining = self.pending.get().saturating_sub(1);
        self.pending.set(remaining);
        if remaining == 0 {
            self.out.close();
        }
    }
}

/// Dotfiles and license files are never emitted.
fn is_skipped(name: &str) -> bool {
    name.starts_with('.') || name.to_ascii_uppercase().starts_with("LICENSE")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skipped_names() {
        assert!(is_skipped(".git"));
        assert!(is_skipped("LICENSE"));
        assert!(is_skipped("license-mit.txt"));
        assert!(!is_skipped("README.md"));
    }
}
