use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::env::fonts_dir;
use crate::error::ApplyError;

const TRANSLATION_DATA: &str = "ja_jp_data.dat";
const TRANSLATION_INDEX: &str = "ja_jp_data.dir";
const FONT_FILES: [&str; 2] = ["Geo-Md.ttf", "Ps2GeoMdRosaVerde.ttf"];

const LOCALE_DIR: &str = "Locale";
const ENGLISH_DATA: &str = "en_us_data.dat";
const ENGLISH_INDEX: &str = "en_us_data.dir";

/// Copies downloaded translation files over the game's English locale.
pub struct TranslationApplier {
    data_dir: PathBuf,
}

struct CopyJob {
    name: &'static str,
    from: PathBuf,
    to: PathBuf,
    /// The target is a game file expected to exist already.
    replaces_game_file: bool,
}

impl TranslationApplier {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Install the translation into `install_dir`. Returns a success message.
    ///
    /// Nothing is touched unless every source file exists and the game's
    /// `Locale` folder is present. A copy failure aborts the run; files copied
    /// before it stay in place.
    pub fn apply(&self, install_dir: &str) -> Result<String, ApplyError> {
        let install_dir = install_dir.trim();
        if install_dir.is_empty() {
            return Err(ApplyError::PathNotConfigured);
        }
        let install_dir = Path::new(install_dir);

        let locale_dir = install_dir.join(LOCALE_DIR);
        let font_target = install_dir.join("UI").join("Resource").join("Fonts");
        let font_source = fonts_dir(&self.data_dir);

        let mut jobs = vec![
            CopyJob {
                name: "translation data",
                from: self.data_dir.join(TRANSLATION_DATA),
                to: locale_dir.join(ENGLISH_DATA),
                replaces_game_file: true,
            },
            CopyJob {
                name: "translation index",
                from: self.data_dir.join(TRANSLATION_INDEX),
                to: locale_dir.join(ENGLISH_INDEX),
                replaces_game_file: true,
            },
        ];
        jobs.extend(FONT_FILES.iter().map(|font| CopyJob {
            name: "font file",
            from: font_source.join(font),
            to: font_target.join(font),
            replaces_game_file: false,
        }));

        if let Some(missing) = jobs.iter().find(|job| !job.from.is_file()) {
            return Err(ApplyError::MissingSource {
                name: missing.name,
                path: missing.from.clone(),
            });
        }
        if !locale_dir.is_dir() {
            return Err(ApplyError::LocaleDirMissing { path: locale_dir });
        }
        fs::create_dir_all(&font_target).map_err(|source| ApplyError::FontsDirCreate {
            path: font_target.clone(),
            source,
        })?;

        for job in &jobs {
            if job.replaces_game_file && !job.to.exists() {
                warn!(
                    "translation: {} does not exist yet; creating it",
                    job.to.display()
                );
            }
            copy_preserving_metadata(&job.from, &job.to).map_err(|source| ApplyError::Copy {
                from: job.from.clone(),
                to: job.to.clone(),
                source,
            })?;
            info!("translation: {} -> {}", job.from.display(), job.to.display());
        }

        Ok(format!(
            "Translation applied to {}. Start the game to see it.",
            install_dir.display()
        ))
    }
}

/// Copy contents and modification time, then permissions last so a
/// read-only source still yields a finished copy.
fn copy_preserving_metadata(from: &Path, to: &Path) -> io::Result<()> {
    let metadata = fs::metadata(from)?;
    let mut source = File::open(from)?;
    let mut target = File::create(to)?;
    io::copy(&mut source, &mut target)?;
    target.set_modified(metadata.modified()?)?;
    drop(target);
    fs::set_permissions(to, metadata.permissions())
}
