use std::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("no file path provided")]
    EmptyPath,
    #[error("could not launch opener for {path}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub trait ShellActions: Send + Sync {
    fn open_path(&self, full_path: &str) -> Result<(), ShellError>;
}

/// Hands paths to the platform's default opener.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShell;

impl ShellActions for SystemShell {
    fn open_path(&self, full_path: &str) -> Result<(), ShellError> {
        if full_path.trim().is_empty() {
            return Err(ShellError::EmptyPath);
        }

        tracing::debug!(path = full_path, "opening path");
        opener_command(full_path)
            .spawn()
            .map_err(|source| ShellError::Spawn {
                path: full_path.to_string(),
                source,
            })?;

        Ok(())
    }
}

#[cfg(target_os = "windows")]
fn opener_command(path: &str) -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", "start", "", path]);
    command
}

#[cfg(target_os = "macos")]
fn opener_command(path: &str) -> Command {
    let mut command = Command::new("open");
    command.arg(path);
    command
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn opener_command(path: &str) -> Command {
    let mut command = Command::new("xdg-open");
    command.arg(path);
    command
}
