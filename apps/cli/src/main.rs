mod commands;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use finder_config::{SetupConfig, Settings};
use finder_query::{SearchHandle, SearchSession, SearchStatus};
use finder_record::FileRecord;
use finderd::{FinderService, LifecycleState, LocalBackend};
use tokio::io::{AsyncBufReadExt, BufReader};

use commands::{parse_line, LineCommand, HELP};
use logging::Verbosity;

const SETTINGS_FILE: &str = "settings.json";
const MAX_LISTED_RESULTS: usize = 20;

const USAGE: &str = "\
usage: rust-finder [options]
  --data-dir <dir>      where the index, setup and recent files live
  --config <file>       settings file (default: <data dir>/settings.json)
  --debounce-ms <ms>    search debounce
  -v, --verbose         debug logging
  -q, --quiet           errors only
  -h, --help            this text";

#[derive(Debug, Default, PartialEq, Eq)]
struct CliArgs {
    data_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    debounce_ms: Option<u64>,
    verbose: bool,
    quiet: bool,
    help: bool,
}

fn parse_cli_args<I, S>(args: I) -> anyhow::Result<CliArgs>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let tokens: Vec<String> = args.into_iter().map(Into::into).collect();
    let mut parsed = CliArgs::default();
    let mut idx = 0;

    while idx < tokens.len() {
        match tokens[idx].as_str() {
            "--data-dir" => {
                parsed.data_dir = Some(PathBuf::from(expect_value(&tokens, idx)?));
                idx += 2;
            }
            "--config" => {
                parsed.config = Some(PathBuf::from(expect_value(&tokens, idx)?));
                idx += 2;
            }
            "--debounce-ms" => {
                let value = expect_value(&tokens, idx)?;
                parsed.debounce_ms = Some(
                    value
                        .parse()
                        .with_context(|| format!("--debounce-ms expects milliseconds, got {value}"))?,
                );
                idx += 2;
            }
            "-v" | "--verbose" => {
                parsed.verbose = true;
                idx += 1;
            }
            "-q" | "--quiet" => {
                parsed.quiet = true;
                idx += 1;
            }
            "-h" | "--help" => {
                parsed.help = true;
                idx += 1;
            }
            other => bail!("unknown argument {other}"),
        }
    }

    Ok(parsed)
}

fn expect_value(tokens: &[String], idx: usize) -> anyhow::Result<&str> {
    match tokens.get(idx + 1) {
        Some(value) if !value.starts_with('-') => Ok(value.as_str()),
        _ => bail!("{} expects a value", tokens[idx]),
    }
}

/// Settings file, then `RUST_FINDER_DATA_DIR`, then flags.
fn load_settings(args: &CliArgs) -> anyhow::Result<Settings> {
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => {
            let data_dir = args
                .data_dir
                .clone()
                .unwrap_or_else(|| Settings::default().with_env_overrides().data_dir);
            data_dir.join(SETTINGS_FILE)
        }
    };

    let mut settings = Settings::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?
        .with_env_overrides();
    if let Some(dir) = &args.data_dir {
        settings.data_dir = dir.clone();
    }
    if let Some(ms) = args.debounce_ms {
        settings.search_debounce_ms = ms;
    }
    settings.validate()?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = match parse_cli_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(error) => {
            eprintln!("{error:#}\n\n{USAGE}");
            std::process::exit(2);
        }
    };
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }

    logging::init_subscriber(Verbosity::from_flags(args.verbose, args.quiet));
    let settings = load_settings(&args)?;
    tracing::info!(data_dir = %settings.data_dir.display(), "starting");

    let backend = Arc::new(LocalBackend::new(settings.data_paths()));
    let service = FinderService::new(backend, settings);
    Prompt::new(service).run().await
}

struct Prompt {
    service: FinderService<LocalBackend>,
    search: Option<SearchHandle>,
}

impl Prompt {
    fn new(service: FinderService<LocalBackend>) -> Self {
        Self {
            service,
            search: None,
        }
    }

    async fn run(mut self) -> anyhow::Result<()> {
        self.watch_lifecycle();

        match self.service.boot().await {
            Ok(LifecycleState::AwaitingSetup) => {
                println!("no folder indexed yet; run :setup <root folder> [ext ...]");
            }
            Ok(_) => {}
            Err(error) => eprintln!("{error}"),
        }
        println!("{HELP}");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            match parse_line(&line) {
                Ok(LineCommand::Quit) => break,
                Ok(command) => self.handle(command).await,
                Err(message) => eprintln!("{message}"),
            }
        }

        Ok(())
    }

    async fn handle(&mut self, command: LineCommand) {
        match command {
            LineCommand::Query(text) => {
                if let Some(search) = self.search_handle() {
                    search.set_query(text);
                }
            }
            LineCommand::Setup {
                root_folder,
                extensions,
            } => {
                let setup = SetupConfig {
                    root_folder,
                    extensions,
                };
                match self.service.submit_setup(&setup).await {
                    Ok(()) => println!("indexing {}", setup.root_folder),
                    Err(error) => eprintln!("{error}"),
                }
            }
            LineCommand::Open(position) => {
                let result = self
                    .search
                    .as_ref()
                    .and_then(|search| search.session().results.get(position).cloned());
                match result {
                    Some(record) => self.open(record).await,
                    None => eprintln!("no search result at {}", position + 1),
                }
            }
            LineCommand::OpenRecent(position) => {
                match self.service.recent_items().into_iter().rev().nth(position) {
                    Some(record) => self.open(record).await,
                    None => eprintln!("no recent file at {}", position + 1),
                }
            }
            LineCommand::Recent => print_records("recent", self.service.recent_items().iter().rev()),
            LineCommand::Refresh => match self.service.refresh_recent().await {
                Ok(count) => println!("{count} recent files"),
                Err(error) => eprintln!("{error}"),
            },
            LineCommand::Folders => {
                for (label, path) in self.service.key_folders() {
                    println!("  {label:<10} {path}");
                }
            }
            LineCommand::Status => {
                println!("{}", self.service.state());
                if let Some(setup) = self.service.setup() {
                    println!("root: {}", setup.root_folder);
                }
            }
            LineCommand::Help => println!("{HELP}"),
            LineCommand::Quit => {}
        }
    }

    async fn open(&self, record: FileRecord) {
        let name = record.file_name.clone();
        match self.service.open_file(record).await {
            Ok(receipt) => {
                println!("opened {name}");
                if let Err(error) = receipt.wait().await {
                    eprintln!("{error}");
                }
            }
            Err(error) => eprintln!("{error}"),
        }
    }

    /// The search controller, started the first time it is needed once ready.
    fn search_handle(&mut self) -> Option<&SearchHandle> {
        if self.search.is_none() {
            match self.service.search() {
                Ok(handle) => {
                    watch_session(&handle);
                    self.search = Some(handle);
                }
                Err(error) => {
                    eprintln!("{error}");
                    return None;
                }
            }
        }
        self.search.as_ref()
    }

    fn watch_lifecycle(&self) {
        let mut states = self.service.lifecycle();
        tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let state = states.borrow_and_update().clone();
                println!("[{state}]");
            }
        });
    }
}

fn watch_session(handle: &SearchHandle) {
    let mut session = handle.subscribe();
    tokio::spawn(async move {
        while session.changed().await.is_ok() {
            let current = session.borrow_and_update().clone();
            render_session(&current);
        }
    });
}

fn render_session(session: &SearchSession) {
    match &session.status {
        SearchStatus::Idle => {}
        SearchStatus::Loading => println!("searching for {:?}", session.query),
        SearchStatus::Ready => {
            print_records(&format!("{:?}", session.query), session.results.iter());
        }
        SearchStatus::Failed(message) => eprintln!("{message}"),
    }
}

fn print_records<'a>(title: &str, records: impl Iterator<Item = &'a FileRecord>) {
    let records: Vec<&FileRecord> = records.collect();
    println!("{title}: {} found", records.len());
    for (position, record) in records.iter().take(MAX_LISTED_RESULTS).enumerate() {
        println!("  {:>2}. {}  {}", position + 1, record.file_name, record.file_path);
    }
    if records.len() > MAX_LISTED_RESULTS {
        println!("  ... {} more", records.len() - MAX_LISTED_RESULTS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_and_values() {
        let args = parse_cli_args([
            "--data-dir",
            "/tmp/finder",
            "--debounce-ms",
            "150",
            "-v",
        ])
        .unwrap();
        assert_eq!(
            args,
            CliArgs {
                data_dir: Some(PathBuf::from("/tmp/finder")),
                debounce_ms: Some(150),
                verbose: true,
                ..CliArgs::default()
            }
        );
    }

    #[test]
    fn rejects_unknown_flags_and_missing_values() {
        assert!(parse_cli_args(["--nope"]).is_err());
        assert!(parse_cli_args(["--config"]).is_err());
        assert!(parse_cli_args(["--data-dir", "-v"]).is_err());
        assert!(parse_cli_args(["--debounce-ms", "soon"]).is_err());
    }

    #[test]
    fn flags_override_the_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join(SETTINGS_FILE);
        std::fs::write(&config, r#"{ "search_debounce_ms": 500, "recent_capacity": 4 }"#).unwrap();

        let args = CliArgs {
            config: Some(config),
            data_dir: Some(dir.path().to_path_buf()),
            debounce_ms: Some(120),
            ..CliArgs::default()
        };
        let settings = load_settings(&args).unwrap();

        assert_eq!(settings.search_debounce_ms, 120);
        assert_eq!(settings.recent_capacity, 4);
        assert_eq!(settings.data_dir, dir.path());
    }

    #[test]
    fn settings_default_to_the_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), r#"{ "recent_capacity": 3 }"#).unwrap();

        let args = CliArgs {
            data_dir: Some(dir.path().to_path_buf()),
            ..CliArgs::default()
        };
        assert_eq!(load_settings(&args).unwrap().recent_capacity, 3);
    }

    #[test]
    fn out_of_range_debounce_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let args = CliArgs {
            data_dir: Some(dir.path().to_path_buf()),
            debounce_ms: Some(60_000),
            ..CliArgs::default()
        };
        assert!(load_settings(&args).is_err());
    }
}
