use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use env_logger::{Env, Target};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use tokio::runtime::{Builder, Runtime};

use crate::engine::LauncherEngine;
use crate::engine::state::{Entity, UserAction};
use crate::storage::ConfigKey;

mod download;
mod engine;
mod env;
mod error;
mod networking;
mod process;
mod storage;
mod translation;
mod updater;
mod util;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(
    name = "PS2JPMod",
    author,
    version,
    about = "Keeps the PlanetSide 2 Japanese translation and this launcher up to date"
)]
struct Cli {
    /// Print launcher version and exit.
    #[arg(long)]
    version_only: bool,

    /// Data directory holding config.json, downloads and fonts.
    #[arg(long, value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Release host to query instead of GitHub.
    #[arg(long, value_name = "URL", global = true, default_value = networking::GITHUB_HOST)]
    github_host: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the startup checks and show versions (default).
    Status,
    /// Check both the application and the translation for updates.
    Check,
    /// Download the latest application or translation release.
    Update {
        #[arg(value_enum)]
        entity: Entity,
    },
    /// Copy the downloaded translation into the game.
    Apply,
    /// Start PlanetSide 2 with the configured launch mode.
    Launch,
    /// List published releases as JSON.
    Releases {
        #[arg(value_enum)]
        entity: Entity,
    },
    /// Show or change settings.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
    /// Write the built-in version to DIR/version.txt.
    WriteVersion { dir: PathBuf },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Show,
    Set {
        #[arg(value_enum)]
        key: ConfigKey,
        value: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.version_only {
        println!("PS2JPMod {VERSION}");
        return ExitCode::SUCCESS;
    }
    if let Some(Command::WriteVersion { dir }) = &cli.command {
        return match write_version_file(dir) {
            Ok(path) => {
                println!("wrote {}", path.display());
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::FAILURE
            }
        };
    }

    let data_dir = cli.data_dir.clone().unwrap_or_else(env::default_data_dir);
    let layout = env::ensure_data_dirs(&data_dir);
    init_logging(&data_dir);
    if let Err(err) = layout {
        warn!("startup: failed to create {}: {err}", data_dir.display());
    }
    info!("PS2JPMod {VERSION} starting (data dir {})", data_dir.display());

    match run(cli, &data_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, data_dir: &Path) -> Result<(), String> {
    let runtime = build_runtime();
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let mut engine =
        LauncherEngine::new(runtime.clone(), data_dir, &cli.github_host, cancel_flag.clone());

    match cli.command.unwrap_or(Command::Status) {
        Command::Status => {
            if let Some(hint) = engine.initialize() {
                println!("{hint}");
            }
            print_versions(&engine);
            println!("{}", engine.status());
        }
        Command::Check => println!("{}", engine.handle_action(UserAction::CheckForUpdates)),
        Command::Update { entity } => {
            println!("{}", engine.check_for_updates());
            println!("{}", engine.handle_action(UserAction::DownloadUpdate(entity)));
            if !engine.has_pending_download() {
                return Ok(());
            }
            watch_ctrl_c(&runtime, cancel_flag);
            let message = wait_with_progress_bar(&mut engine);
            println!("{message}");
            if engine.exit_requested() {
                info!("exit: handing over to the updater");
            }
        }
        Command::Apply => println!("{}", engine.handle_action(UserAction::ApplyTranslation)),
        Command::Launch => println!("{}", engine.handle_action(UserAction::LaunchGame)),
        Command::Releases { entity } => {
            let releases = engine.list_releases(entity)?;
            let json = serde_json::to_string_pretty(&releases)
                .map_err(|err| format!("failed to render releases: {err}"))?;
            println!("{json}");
        }
        Command::Config { action } => match action {
            ConfigCommand::Show => {
                println!("# {}", engine.config().path().display());
                for (key, value) in engine.config().entries() {
                    println!("{key} = {value}");
                }
            }
            ConfigCommand::Set { key, value } => {
                engine.set_config(key, &value)?;
                println!("{} updated", key.as_str());
                if let Some(status) = engine.on_settings_closed() {
                    println!("{status}");
                }
            }
        },
        Command::WriteVersion { dir } => {
            write_version_file(&dir)?;
        }
    }
    Ok(())
}

fn print_versions(engine: &LauncherEngine) {
    for entity in [Entity::Application, Entity::Translation] {
        let descriptor = engine.descriptor(entity);
        println!(
            "{entity}: {} (latest {}, source {})",
            descriptor.current, descriptor.latest_available, descriptor.source
        );
    }
    let config = engine.config();
    println!("launch mode: {}", config.launch_mode().label());
    let path = config.local_path();
    println!(
        "install path: {}",
        if path.is_empty() { "(not set)" } else { path.as_str() }
    );
}

/// Raise the download cancel flag on Ctrl-C.
fn watch_ctrl_c(runtime: &Runtime, cancel_flag: Arc<AtomicBool>) {
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("download: interrupted, cancelling after the current file");
            cancel_flag.store(true, Ordering::SeqCst);
        }
    });
}

fn wait_with_progress_bar(engine: &mut LauncherEngine) -> String {
    let pb = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::with_template("  {msg} [{bar:30}] {bytes}/{total_bytes} ({percent}%)")
    {
        pb.set_style(style);
    }

    let mut current_file = 0;
    let message = engine.wait_for_download(|progress| {
        if progress.file_index != current_file {
            current_file = progress.file_index;
            pb.reset();
            pb.set_length(progress.total_bytes);
            pb.set_message(format!(
                "({}/{}) {}",
                progress.file_index, progress.total_files, progress.filename
            ));
        }
        pb.set_position(progress.downloaded_bytes);
        debug!("{}", progress.describe());
    });
    pb.finish_and_clear();
    message
}

fn write_version_file(dir: &Path) -> Result<PathBuf, String> {
    fs::create_dir_all(dir).map_err(|err| format!("failed to create {}: {err}", dir.display()))?;
    let path = dir.join("version.txt");
    fs::write(&path, VERSION).map_err(|err| format!("failed to write {}: {err}", path.display()))?;
    Ok(path)
}

/// Mirrors log output to stderr and the log file.
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn init_logging(data_dir: &Path) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    let log_path = env::log_file(data_dir);
    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => {
            builder.target(Target::Pipe(Box::new(TeeWriter { file })));
            builder.init();
        }
        Err(err) => {
            builder.init();
            warn!("logging: cannot open {}: {err}", log_path.display());
        }
    }
}

fn build_runtime() -> Arc<Runtime> {
    match Runtime::new() {
        Ok(rt) => Arc::new(rt),
        Err(err) => {
            warn!(
                "runtime: failed to create multithreaded runtime ({}); trying single-threaded runtime",
                err
            );
            match Builder::new_current_thread().enable_all().build() {
                Ok(rt) => Arc::new(rt),
                Err(fallback_err) => {
                    error!(
                        "runtime: failed to create any Tokio runtime ({}); terminating launcher",
                        fallback_err
                    );
                    std::process::exit(1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_update_and_config_commands() {
        let cli = Cli::parse_from(["ps2jpmod", "--data-dir", "/tmp/ps2", "update", "translation"]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/ps2")));
        assert!(matches!(cli.command, Some(Command::Update { entity: Entity::Translation })));

        let cli = Cli::parse_from(["ps2jpmod", "config", "set", "local-path", "D:/PS2"]);
        match cli.command {
            Some(Command::Config {
                action: ConfigCommand::Set { key, value },
            }) => {
                assert_eq!(key, ConfigKey::LocalPath);
                assert_eq!(value, "D:/PS2");
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.github_host, networking::GITHUB_HOST);
    }

    #[test]
    fn writes_version_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_version_file(&tmp.path().join("dist")).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), VERSION);
    }
}
