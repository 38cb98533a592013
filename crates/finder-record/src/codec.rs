use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::FileRecord;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("wire record has no file name")]
    MissingFileName,
    #[error("wire record `{0}` has no file path")]
    MissingFilePath(String),
    #[error("malformed wire json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDetails {
    pub file_path: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub creation_date: Option<SystemTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
}

/// Second element of a wire record. Older backends send the bare path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WirePayload {
    Path(String),
    Details(WireDetails),
}

/// `[fileName, payload]` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRecord(pub String, pub WirePayload);

/// `[index, [fileName, payload]]` on the wire.
pub type WireRecencyEntry = (u64, WireRecord);

impl WireRecord {
    pub fn file_name(&self) -> &str {
        &self.0
    }

    pub fn file_path(&self) -> &str {
        match &self.1 {
            WirePayload::Path(path) => path,
            WirePayload::Details(details) => &details.file_path,
        }
    }
}

/// Always the details form, so size, type and dates survive the backend round trip.
pub fn to_wire(record: &FileRecord) -> WireRecord {
    WireRecord(
        record.file_name.clone(),
        WirePayload::Details(WireDetails {
            file_path: record.file_path.clone(),
            file_size: record.file_size,
            file_type: record.file_type.clone(),
            creation_date: record.creation_date,
            file_extension: Some(record.file_extension.clone()),
        }),
    )
}

pub fn from_wire(wire: WireRecord) -> Result<FileRecord, CodecError> {
    let WireRecord(file_name, payload) = wire;
    if file_name.trim().is_empty() {
        return Err(CodecError::MissingFileName);
    }

    let record = match payload {
        WirePayload::Path(file_path) => FileRecord {
            file_name,
            file_path,
            file_size: 0,
            file_type: String::new(),
            creation_date: None,
            file_extension: String::new(),
        },
        WirePayload::Details(details) => FileRecord {
            file_name,
            file_path: details.file_path,
            file_size: details.file_size,
            file_type: details.file_type,
            creation_date: details.creation_date,
            file_extension: details.file_extension.unwrap_or_default(),
        },
    };

    if record.file_path.is_empty() {
        return Err(CodecError::MissingFilePath(record.file_name));
    }

    Ok(record)
}

pub fn entry_to_wire(index: u64, record: &FileRecord) -> WireRecencyEntry {
    (index, to_wire(record))
}

pub fn entry_from_wire(entry: WireRecencyEntry) -> Result<(u64, FileRecord), CodecError> {
    let (index, wire) = entry;
    Ok((index, from_wire(wire)?))
}

pub fn to_json(record: &FileRecord) -> Result<String, CodecError> {
    Ok(serde_json::to_string(&to_wire(record))?)
}

pub fn from_json(payload: &str) -> Result<FileRecord, CodecError> {
    from_wire(serde_json::from_str(payload)?)
}
