use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use log::{debug, info, warn};

use crate::engine::state::LaunchMode;
use crate::error::LaunchError;

pub const STEAM_GAME_URI: &str = "steam://rungameid/218230";
const LAUNCHPAD_EXE: &str = "LaunchPad.exe";
const UPDATER_SCRIPT: &str = "updater.bat";
const UPDATER_DELAY: Duration = Duration::from_millis(200);

const APPLY_REMINDER: &str =
    "Once the game launcher has finished patching, apply the translation before playing.";

/// Starts the game and the self-updater script.
#[derive(Clone, Default)]
pub struct GameLauncher;

impl GameLauncher {
    pub fn new() -> Self {
        Self
    }

    /// Start the game with `mode`. Returns a message for the user.
    pub fn launch(&self, mode: LaunchMode, install_dir: &str) -> Result<String, LaunchError> {
        match mode {
            LaunchMode::Normal => self.launch_normal(install_dir),
            LaunchMode::Steam => self.launch_steam(),
        }
    }

    fn launch_normal(&self, install_dir: &str) -> Result<String, LaunchError> {
        let install_dir = install_dir.trim();
        if install_dir.is_empty() {
            return Err(LaunchError::PathNotConfigured);
        }
        let install_dir = Path::new(install_dir);
        let launchpad = install_dir.join(LAUNCHPAD_EXE);
        if !launchpad.is_file() {
            warn!("launch: {} not found", launchpad.display());
            return Err(LaunchError::LauncherMissing { path: launchpad });
        }

        debug!("launch: starting {} in {}", launchpad.display(), install_dir.display());
        let mut cmd = Command::new(&launchpad);
        cmd.current_dir(install_dir);
        cmd.stdin(Stdio::null());
        cmd.spawn().map_err(|source| LaunchError::Spawn {
            program: launchpad.display().to_string(),
            source,
        })?;
        info!("launch: LaunchPad started");
        Ok(format!("Game launcher started. {APPLY_REMINDER}"))
    }

    fn launch_steam(&self) -> Result<String, LaunchError> {
        debug!("launch: opening {STEAM_GAME_URI}");
        open::that(STEAM_GAME_URI).map_err(|source| LaunchError::Spawn {
            program: STEAM_GAME_URI.to_owned(),
            source,
        })?;
        info!("launch: handed off to Steam");
        Ok(format!("Game started through Steam. {APPLY_REMINDER}"))
    }

    /// Hand over to `<data>/updater.bat`, run from the data directory's parent.
    ///
    /// Waits briefly first so the files just written are closed.
    pub fn run_updater_script(&self, data_dir: &Path) -> Result<(), LaunchError> {
        let script = updater_script(data_dir);
        if !script.is_file() {
            warn!("updater: {} not found", script.display());
            return Err(LaunchError::UpdaterMissing { path: script });
        }
        std::thread::sleep(UPDATER_DELAY);

        let work_dir = data_dir.parent().unwrap_or(data_dir);
        let mut cmd = if cfg!(target_os = "windows") {
            let mut command = Command::new("cmd");
            command.arg("/C").arg(&script);
            command
        } else {
            let mut command = Command::new("sh");
            command.arg(&script);
            command
        };
        cmd.current_dir(work_dir);
        cmd.stdin(Stdio::null());

        cmd.spawn().map_err(|source| LaunchError::Spawn {
            program: script.display().to_string(),
            source,
        })?;
        info!("updater: started {} in {}", script.display(), work_dir.display());
        Ok(())
    }
}

pub fn updater_script(data_dir: &Path) -> PathBuf {
    data_dir.join(UPDATER_SCRIPT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_launch_needs_install_path() {
        let launcher = GameLauncher::new();
        assert!(matches!(
            launcher.launch(LaunchMode::Normal, " "),
            Err(LaunchError::PathNotConfigured)
        ));
    }

    #[test]
    fn normal_launch_needs_launchpad() {
        let tmp = tempfile::tempdir().unwrap();
        let err = GameLauncher::new()
            .launch(LaunchMode::Normal, &tmp.path().to_string_lossy())
            .unwrap_err();
        match err {
            LaunchError::LauncherMissing { path } => assert!(path.ends_with(LAUNCHPAD_EXE)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_updater_script_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let err = GameLauncher::new()
            .run_updater_script(&tmp.path().join("data"))
            .unwrap_err();
        assert!(matches!(err, LaunchError::UpdaterMissing { .. }), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn updater_script_runs_from_install_root() {
        let tmp = tempfile::tempdir().unwrap();
        let data = tmp.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(updater_script(&data), "pwd > updater-ran.txt\n").unwrap();

        GameLauncher::new().run_updater_script(&data).unwrap();

        let marker = tmp.path().join("updater-ran.txt");
        for _ in 0..50 {
            if marker.exists() {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        assert!(marker.exists());
    }
}
