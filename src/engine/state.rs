use std::fmt;

// How the game is started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaunchMode {
    Normal,
    Steam,
}

impl LaunchMode {
    pub fn label(self) -> &'static str {
        match self {
            LaunchMode::Normal => "Normal (LaunchPad.exe)",
            LaunchMode::Steam => "Steam",
        }
    }

    /// Integer written to the config file.
    pub fn stored_value(self) -> i64 {
        match self {
            LaunchMode::Normal => 0,
            LaunchMode::Steam => 1,
        }
    }

    pub fn from_stored(value: i64) -> Option<Self> {
        match value {
            0 => Some(LaunchMode::Normal),
            1 => Some(LaunchMode::Steam),
            _ => None,
        }
    }
}

/// The two independently versioned things the launcher keeps up to date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Entity {
    #[value(name = "app")]
    Application,
    Translation,
}

impl Entity {
    pub fn label(self) -> &'static str {
        match self {
            Entity::Application => "application",
            Entity::Translation => "translation data",
        }
    }

    /// Release assets that make up one update of this entity.
    pub fn update_filenames(self) -> &'static [&'static str] {
        match self {
            Entity::Application => &["PS2JPMod.exe", "default.txt"],
            Entity::Translation => &["ja_jp_data.dat", "ja_jp_data.dir"],
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// Actions triggered by the user from the front end.
#[derive(Clone, Debug)]
pub enum UserAction {
    CheckForUpdates,
    DownloadUpdate(Entity),
    ApplyTranslation,
    LaunchGame,
}
