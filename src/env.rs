use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const FONT_DIR_NAME: &str = "fonts";
const DATA_DIR_NAME: &str = "data";
const LOG_FILE_NAME: &str = "ps2jpmod.log";

/// Directory holding the launcher executable; falls back to the working directory.
pub fn base_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default data directory (`<exe dir>/data`), shipped next to the executable.
pub fn default_data_dir() -> PathBuf {
    base_dir().join(DATA_DIR_NAME)
}

pub fn fonts_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(FONT_DIR_NAME)
}

pub fn log_file(data_dir: &Path) -> PathBuf {
    data_dir.join(LOG_FILE_NAME)
}

/// Create the on-disk folder layout expected by the launcher.
pub fn ensure_data_dirs(data_dir: &Path) -> std::io::Result<()> {
    for dir in [data_dir.to_path_buf(), fonts_dir(data_dir)] {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_data_and_font_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let data = tmp.path().join("data");
        ensure_data_dirs(&data).unwrap();
        assert!(data.is_dir());
        assert!(fonts_dir(&data).is_dir());
        // Idempotent on an existing layout.
        ensure_data_dirs(&data).unwrap();
    }
}
