/// One line of prompt input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LineCommand {
    Query(String),
    Setup {
        root_folder: String,
        extensions: Vec<String>,
    },
    Open(usize),
    OpenRecent(usize),
    Recent,
    Refresh,
    Folders,
    Status,
    Help,
    Quit,
}

pub(crate) const HELP: &str = "\
type to search; lines starting with ':' are commands
  :setup <root folder> [ext ...]   index a folder (extensions optional)
  :open <n>                        open the n-th search result
  :open-recent <n>                 open the n-th recent file
  :recent                          list recent files, newest first
  :refresh                         reload recent files from the backend
  :folders                         list quick-access folders
  :status                          show the lifecycle state
  :help                            this text
  :quit                            exit";

/// Anything not starting with `:` is query text, kept verbatim. Returns an
/// error message for malformed commands.
pub(crate) fn parse_line(line: &str) -> Result<LineCommand, String> {
    let Some(command) = line.trim_start().strip_prefix(':') else {
        return Ok(LineCommand::Query(line.to_string()));
    };

    let mut tokens = command.split_whitespace();
    let name = tokens.next().unwrap_or_default().to_ascii_lowercase();
    let args: Vec<&str> = tokens.collect();

    match (name.as_str(), args.as_slice()) {
        ("setup", [root, extensions @ ..]) => Ok(LineCommand::Setup {
            root_folder: root.to_string(),
            extensions: extensions.iter().map(|ext| ext.to_string()).collect(),
        }),
        ("setup", []) => Err("usage: :setup <root folder> [ext ...]".into()),
        ("open" | "o", [n]) => parse_position(n).map(LineCommand::Open),
        ("open-recent" | "or", [n]) => parse_position(n).map(LineCommand::OpenRecent),
        ("open" | "o" | "open-recent" | "or", _) => Err(format!("usage: :{name} <n>")),
        ("recent" | "r", []) => Ok(LineCommand::Recent),
        ("refresh", []) => Ok(LineCommand::Refresh),
        ("folders", []) => Ok(LineCommand::Folders),
        ("status", []) => Ok(LineCommand::Status),
        ("help" | "h" | "?", _) => Ok(LineCommand::Help),
        ("quit" | "q" | "exit", _) => Ok(LineCommand::Quit),
        _ => Err(format!("unknown command :{name} (try :help)")),
    }
}

/// 1-based position as shown in listings, returned 0-based.
fn parse_position(token: &str) -> Result<usize, String> {
    match token.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("expected a position starting at 1, got {token}")),
    }
}
