pub const SEARCH_FILES: &str = "search_files";
pub const GET_RECENT_DATA: &str = "get_recent_data";
pub const PROCESS_RECENT: &str = "process_recent";
pub const OPEN_FILE: &str = "open_file";
pub const STARTUP: &str = "startup";
pub const SETUP_FILE_CHECK: &str = "setup_file_check";
pub const LOAD_SETUP: &str = "load_setup";
pub const SAVE_SETUP_FILE: &str = "save_setup_file";

/// Failure reported by a backend command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{command}` failed: {message}")]
pub struct CommandError {
    pub command: &'static str,
    pub message: String,
}

impl CommandError {
    pub fn new(command: &'static str, message: impl Into<String>) -> Self {
        Self {
            command,
            message: message.into(),
        }
    }
}
