use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use finder_record::{extension_of, WireDetails, WirePayload, WireRecord};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

pub const MINIMUM_SCORE: i16 = 20;
pub const PREFIX_SCORE: i16 = 1000;
pub const SKIP_DIRECTORY: &str = "Library";

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("root folder {0} is not a directory")]
    MissingRoot(PathBuf),
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid index file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// File details keyed by file name. Same-named files collapse to the one seen
/// last during the walk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIndex {
    pub files: BTreeMap<String, WireDetails>,
}

impl FileIndex {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn search(&self, query: &str) -> Vec<WireRecord> {
        if query.is_empty() {
            return Vec::new();
        }

        self.files
            .iter()
            .filter(|(name, _)| score_filename(file_stem(name), query) >= MINIMUM_SCORE)
            .map(|(name, details)| WireRecord(name.clone(), WirePayload::Details(details.clone())))
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| IndexError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = File::create(path).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(|source| IndexError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let file = File::open(path).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| IndexError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// A file name's stem scores when it starts with the query. Case-sensitive.
pub fn score_filename(stem: &str, query: &str) -> i16 {
    if stem.starts_with(query) {
        PREFIX_SCORE
    } else {
        0
    }
}

fn file_stem(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("")
}

pub trait IndexSource {
    fn build_initial_index(&self) -> Result<FileIndex, IndexError>;
}

/// Walks a root folder. Directories are always indexed; files only when the
/// extension filter is empty or lists their extension.
#[derive(Debug, Clone)]
pub struct WalkdirSource {
    root: PathBuf,
    extensions: Vec<String>,
}

impl WalkdirSource {
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            root: root.into(),
            extensions,
        }
    }

    fn accepts(&self, file_name: &str) -> bool {
        self.extensions.is_empty() || self.extensions.contains(&extension_of(file_name))
    }
}

impl IndexSource for WalkdirSource {
    fn build_initial_index(&self) -> Result<FileIndex, IndexError> {
        if !self.root.is_dir() {
            return Err(IndexError::MissingRoot(self.root.clone()));
        }

        let mut index = FileIndex::default();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir() && entry.file_name() == SKIP_DIRECTORY)
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    tracing::debug!(%error, "skipping unreadable entry");
                    continue;
                }
            };
            let Ok(metadata) = entry.metadata() else {
                continue;
            };

            let file_name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = metadata.is_dir();
            if !is_dir && !self.accepts(&file_name) {
                continue;
            }

            let file_type = if is_dir {
                "directory"
            } else if metadata.is_file() {
                "file"
            } else {
                "unknown"
            };

            let details = WireDetails {
                file_path: entry.path().display().to_string(),
                file_size: metadata.len(),
                file_type: file_type.to_string(),
                creation_date: metadata.created().ok(),
                file_extension: Some(extension_of(&file_name)),
            };
            index.files.insert(file_name, details);
        }

        tracing::info!(root = %self.root.display(), files = index.len(), "index built");
        Ok(index)
    }
}

/// Well-known folders for quick access, label to path. Only existing ones.
pub fn key_folders() -> BTreeMap<String, String> {
    let candidates = [
        ("Home", dirs::home_dir()),
        ("Desktop", dirs::desktop_dir()),
        ("Documents", dirs::document_dir()),
        ("Downloads", dirs::download_dir()),
        ("Pictures", dirs::picture_dir()),
    ];

    candidates
        .into_iter()
        .filter_map(|(label, dir)| {
            dir.filter(|dir| dir.is_dir())
                .map(|dir| (label.to_string(), dir.display().to_string()))
        })
        .collect()
}
