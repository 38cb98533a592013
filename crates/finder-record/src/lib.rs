pub mod codec;
pub mod command;

use std::path::Path;
use std::time::SystemTime;

pub use codec::{
    entry_from_wire, entry_to_wire, from_json, from_wire, to_json, to_wire, CodecError,
    WireDetails, WirePayload, WireRecencyEntry, WireRecord,
};
pub use command::CommandError;

/// A file as the UI sees it: built from a search result or a backend recency
/// entry and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub file_name: String,
    pub file_path: String,
    pub file_size: u64,
    pub file_type: String,
    pub creation_date: Option<SystemTime>,
    pub file_extension: String,
}

impl FileRecord {
    pub fn new(file_name: impl Into<String>, file_path: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let file_extension = extension_of(&file_name);
        Self {
            file_name,
            file_path: file_path.into(),
            file_size: 0,
            file_type: String::new(),
            creation_date: None,
            file_extension,
        }
    }

    pub fn with_size(mut self, file_size: u64) -> Self {
        self.file_size = file_size;
        self
    }

    pub fn with_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = file_type.into();
        self
    }

    pub fn with_creation_date(mut self, creation_date: SystemTime) -> Self {
        self.creation_date = Some(creation_date);
        self
    }
}

/// Lower-cased extension of a file name, empty when there is none.
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_derives_lowercase_extension() {
        let record = FileRecord::new("Report.PDF", "/docs/Report.PDF");
        assert_eq!(record.file_extension, "pdf");
        assert_eq!(record.file_size, 0);
        assert!(record.creation_date.is_none());
    }

    #[test]
    fn extension_of_handles_dotfiles_and_bare_names() {
        assert_eq!(extension_of("Makefile"), "");
        assert_eq!(extension_of(".bashrc"), "");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
    }
}
