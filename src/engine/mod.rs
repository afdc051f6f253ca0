use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use log::{error, info, warn};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::download::{BUSY_MESSAGE, DownloadEvent, DownloadProgress, DownloadRunner, DownloadTask};
use crate::engine::models::{ReleaseInfo, VersionDescriptor};
use crate::engine::state::{Entity, UserAction};
use crate::networking::{AssetFetcher, ReleaseDirectory, RepositoryRef};
use crate::process::GameLauncher;
use crate::storage::{ConfigKey, ConfigStore, parse_flag, parse_launch_mode};
use crate::translation::TranslationApplier;
use crate::updater::version::Version;
use crate::updater::{self, UpdateStatus};

pub mod models;
pub mod state;

const FIRST_RUN_HINT: &str = "The game install path is not set. \
     Run `ps2jpmod config set local-path <PlanetSide 2 folder>` before applying the translation.";

/// What to do once an update's files are on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateContinuation {
    pub entity: Entity,
    pub version: String,
}

/// Owns every collaborator of the launcher and drives them from the
/// interactive thread.
pub struct LauncherEngine {
    runtime: Arc<Runtime>,
    data_dir: PathBuf,
    config: ConfigStore,
    releases: ReleaseDirectory,
    runner: DownloadRunner<AssetFetcher>,
    applier: TranslationApplier,
    launcher: GameLauncher,
    app: VersionDescriptor,
    translation: VersionDescriptor,
    previous_developer_mode: bool,
    download_events: Option<UnboundedReceiver<DownloadEvent<UpdateContinuation>>>,
    status: String,
    exit_requested: bool,
}

impl LauncherEngine {
    pub fn new(
        runtime: Arc<Runtime>,
        data_dir: &Path,
        host: &str,
        cancel_flag: Arc<AtomicBool>,
    ) -> Self {
        let config = ConfigStore::load(data_dir);
        let app = VersionDescriptor::new(config.app_version(), config.app_server_url());
        let translation = VersionDescriptor::new(
            config.translation_version(),
            config.translation_server_url(),
        );
        let runner = DownloadRunner::new(
            Arc::new(AssetFetcher::new(host)),
            runtime.handle().clone(),
            cancel_flag,
        );
        Self {
            previous_developer_mode: config.developer_mode(),
            runtime,
            data_dir: data_dir.to_path_buf(),
            config,
            releases: ReleaseDirectory::new(host),
            runner,
            applier: TranslationApplier::new(data_dir),
            launcher: GameLauncher::new(),
            app,
            translation,
            download_events: None,
            status: String::new(),
            exit_requested: false,
        }
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn descriptor(&self, entity: Entity) -> &VersionDescriptor {
        match entity {
            Entity::Application => &self.app,
            Entity::Translation => &self.translation,
        }
    }

    fn descriptor_mut(&mut self, entity: Entity) -> &mut VersionDescriptor {
        match entity {
            Entity::Application => &mut self.app,
            Entity::Translation => &mut self.translation,
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// True between a successful `download_update` and `wait_for_download`.
    pub fn has_pending_download(&self) -> bool {
        self.download_events.is_some()
    }

    /// Set after an application update handed over to the updater script.
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Startup sequence: record the built-in version, show the first-run
    /// hint when needed, then check both entities for updates.
    pub fn initialize(&mut self) -> Option<&'static str> {
        self.bump_app_version(env!("CARGO_PKG_VERSION"));
        let hint = self.first_run_hint();
        if hint.is_some() {
            info!("startup: showing first-run hint");
        }
        self.check_for_updates();
        hint
    }

    /// Replace the stored application version when `builtin` is newer or the
    /// stored one is unreadable. Returns true if the store changed.
    pub fn bump_app_version(&mut self, builtin: &str) -> bool {
        let stored = self.config.app_version();
        let outdated = match (Version::parse(builtin), Version::parse(&stored)) {
            (Some(builtin), Some(stored)) => builtin > stored,
            (Some(_), None) => true,
            (None, _) => {
                error!("startup: built-in version '{builtin}' is not a version");
                false
            }
        };
        if !outdated {
            return false;
        }
        info!("startup: application version {stored} -> {builtin}");
        self.config.set_app_version(builtin);
        self.app.advance_to(builtin);
        true
    }

    pub fn first_run_hint(&self) -> Option<&'static str> {
        (self.config.is_freshly_initialized() || self.config.local_path().trim().is_empty())
            .then_some(FIRST_RUN_HINT)
    }

    pub fn handle_action(&mut self, action: UserAction) -> String {
        let message = match action {
            UserAction::CheckForUpdates => {
                info!("action: CheckForUpdates");
                self.check_for_updates()
            }
            UserAction::DownloadUpdate(entity) => {
                info!("action: DownloadUpdate({entity})");
                match self.download_update(entity) {
                    Ok(()) => format!("Downloading {entity} update..."),
                    Err(message) => message,
                }
            }
            UserAction::ApplyTranslation => {
                info!("action: ApplyTranslation");
                self.applier
                    .apply(&self.config.local_path())
                    .unwrap_or_else(|err| {
                        error!("translation: {err}");
                        format!("Failed to apply translation: {err}")
                    })
            }
            UserAction::LaunchGame => {
                info!("action: LaunchGame");
                self.launcher
                    .launch(self.config.launch_mode(), &self.config.local_path())
                    .unwrap_or_else(|err| {
                        error!("launch: {err}");
                        format!("Failed to start the game: {err}")
                    })
            }
        };
        self.status = message.clone();
        message
    }

    /// Check both entities and return the combined status.
    pub fn check_for_updates(&mut self) -> String {
        let developer_mode = self.config.developer_mode();
        let mut messages = Vec::with_capacity(2);
        for entity in [Entity::Application, Entity::Translation] {
            let status = self.check_entity(entity, developer_mode);
            messages.push(status.message(entity));
        }
        self.status = messages.join("\n");
        self.status.clone()
    }

    fn check_entity(&mut self, entity: Entity, developer_mode: bool) -> UpdateStatus {
        let runtime = self.runtime.clone();
        let releases = self.releases.clone();
        let descriptor = self.descriptor_mut(entity);
        runtime.block_on(updater::check_update(&releases, descriptor, developer_mode))
    }

    /// Scrape the full release list of `entity`'s source.
    pub fn list_releases(&self, entity: Entity) -> Result<Vec<ReleaseInfo>, String> {
        let source = &self.descriptor(entity).source;
        let repo = RepositoryRef::parse(source)
            .ok_or_else(|| format!("'{source}' is not a repository reference"))?;
        self.runtime
            .block_on(self.releases.all_releases(&repo))
            .ok_or_else(|| format!("Could not retrieve the release list of {repo}."))
    }

    /// Start downloading the latest known version of `entity`. Returns a
    /// message instead when there is nothing to download or it cannot start.
    pub fn download_update(&mut self, entity: Entity) -> Result<(), String> {
        if self.runner.is_running() {
            return Err(BUSY_MESSAGE.to_owned());
        }
        let descriptor = self.descriptor(entity);
        if !descriptor.is_update_available() {
            return Err(format!("The {entity} is already the latest version."));
        }
        if descriptor.source.trim().is_empty() || descriptor.latest_available.trim().is_empty() {
            return Err(format!("No download source configured for the {entity}."));
        }
        let repo = RepositoryRef::parse(&descriptor.source)
            .ok_or_else(|| format!("'{}' is not a repository reference", descriptor.source))?;

        let tag = descriptor.latest_available.clone();
        let task = DownloadTask {
            repo,
            tag: tag.clone(),
            filenames: entity
                .update_filenames()
                .iter()
                .map(|name| (*name).to_owned())
                .collect(),
            dest_dir: self.data_dir.clone(),
            continuation: UpdateContinuation {
                entity,
                version: tag,
            },
        };
        let events = self.runner.start(task)?;
        self.download_events = Some(events);
        Ok(())
    }

    /// Block until the running download ends, forwarding progress to
    /// `on_progress`. Returns the final status message.
    pub fn wait_for_download(&mut self, mut on_progress: impl FnMut(&DownloadProgress)) -> String {
        let Some(mut events) = self.download_events.take() else {
            return "No download in progress.".to_owned();
        };
        let runtime = self.runtime.clone();
        loop {
            let Some(event) = runtime.block_on(events.recv()) else {
                warn!("download: worker stopped without a result");
                self.status = "Download stopped unexpectedly.".to_owned();
                return self.status.clone();
            };
            if event.is_terminal() {
                return self.process_terminal_event(event);
            }
            if let DownloadEvent::Progress(progress) = &event {
                on_progress(progress);
            }
        }
    }

    fn process_terminal_event(&mut self, event: DownloadEvent<UpdateContinuation>) -> String {
        let message = match event {
            DownloadEvent::Progress(_) => return self.status.clone(),
            DownloadEvent::Completed { paths, continuation } => {
                info!("download: {} file(s) saved", paths.len());
                self.finish_update(continuation)
            }
            DownloadEvent::Failed { kind, message } => {
                error!("download: failed ({kind}): {message}");
                message
            }
            DownloadEvent::Cancelled => "Download cancelled.".to_owned(),
        };
        self.status = message.clone();
        message
    }

    /// Record the new version, then hand over to the updater (application)
    /// or refresh the update status (translation).
    fn finish_update(&mut self, continuation: UpdateContinuation) -> String {
        let UpdateContinuation { entity, version } = continuation;
        match entity {
            Entity::Application => self.config.set_app_version(&version),
            Entity::Translation => self.config.set_translation_version(&version),
        };
        self.descriptor_mut(entity).advance_to(version.clone());

        match entity {
            Entity::Application => match self.launcher.run_updater_script(&self.data_dir) {
                Ok(()) => {
                    self.exit_requested = true;
                    format!("Application {version} downloaded. Restarting to finish the update.")
                }
                Err(err) => {
                    error!("updater: {err}");
                    let status = self.check_for_updates();
                    format!("Could not start the updater: {err}\n{status}")
                }
            },
            Entity::Translation => {
                let status = self.check_for_updates();
                format!("Translation data {version} downloaded. Apply it to use it in game.\n{status}")
            }
        }
    }

    /// Write one setting from user input.
    pub fn set_config(&mut self, key: ConfigKey, raw: &str) -> Result<(), String> {
        let saved = match key {
            ConfigKey::LaunchMode => self.config.set_launch_mode(parse_launch_mode(raw)?),
            ConfigKey::DeveloperMode => {
                let enabled = parse_flag(raw)?;
                self.previous_developer_mode = self.config.developer_mode();
                self.config.set_developer_mode(enabled)
            }
            ConfigKey::LocalPath => self.config.set_local_path(raw.trim()),
            ConfigKey::AppVersion => self.config.set_app_version(raw.trim()),
            ConfigKey::TranslationVersion => self.config.set_translation_version(raw.trim()),
            ConfigKey::AppServerUrl | ConfigKey::TranslationServerUrl => {
                self.config.set(key, key.parse_input(raw)?)
            }
        };
        if !saved {
            warn!("config: {} kept for this session only", key.as_str());
        }
        match key {
            ConfigKey::AppVersion => {
                self.app =
                    VersionDescriptor::new(self.config.app_version(), self.config.app_server_url())
            }
            ConfigKey::AppServerUrl => self.app.source = self.config.app_server_url(),
            ConfigKey::TranslationVersion => {
                self.translation = VersionDescriptor::new(
                    self.config.translation_version(),
                    self.config.translation_server_url(),
                )
            }
            ConfigKey::TranslationServerUrl => {
                self.translation.source = self.config.translation_server_url()
            }
            _ => {}
        }
        Ok(())
    }

    /// Run after a settings edit: a developer-mode change switches the
    /// release channel, so the update check runs again.
    pub fn on_settings_closed(&mut self) -> Option<String> {
        let current = self.config.developer_mode();
        if current == self.previous_developer_mode {
            return None;
        }
        info!("settings: developer mode {} -> {current}", self.previous_developer_mode);
        self.previous_developer_mode = current;
        Some(self.check_for_updates())
    }
}
