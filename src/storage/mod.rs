use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::{Map, Value};
use serde_json::ser::PrettyFormatter;

use crate::engine::state::LaunchMode;

const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DEFAULT_TRANSLATION_VERSION: &str = "0.0.0";
pub const DEFAULT_LAUNCH_MODE: LaunchMode = LaunchMode::Steam;
pub const DEFAULT_APP_SERVER_URL: &str = "PS2-Localization-JP/PlanetSide2-nihongo-mod-ui/";
pub const DEFAULT_TRANSLATION_SERVER_URL: &str = "PS2-Localization-JP/PlanetSide2-nihongo-mod-api/";

/// Every setting the launcher knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigKey {
    AppVersion,
    TranslationVersion,
    LaunchMode,
    LocalPath,
    AppServerUrl,
    TranslationServerUrl,
    DeveloperMode,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 7] = [
        ConfigKey::AppVersion,
        ConfigKey::TranslationVersion,
        ConfigKey::LaunchMode,
        ConfigKey::LocalPath,
        ConfigKey::AppServerUrl,
        ConfigKey::TranslationServerUrl,
        ConfigKey::DeveloperMode,
    ];

    /// Key name inside `config.json`.
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::AppVersion => "app_version",
            ConfigKey::TranslationVersion => "translation_version",
            ConfigKey::LaunchMode => "launch_mode",
            ConfigKey::LocalPath => "local_path",
            ConfigKey::AppServerUrl => "app_server_url",
            ConfigKey::TranslationServerUrl => "translation_server_url",
            ConfigKey::DeveloperMode => "developer_mode",
        }
    }

    pub fn default_value(self) -> Value {
        match self {
            ConfigKey::AppVersion => Value::from(DEFAULT_APP_VERSION),
            ConfigKey::TranslationVersion => Value::from(DEFAULT_TRANSLATION_VERSION),
            ConfigKey::LaunchMode => Value::from(DEFAULT_LAUNCH_MODE.stored_value()),
            ConfigKey::LocalPath => Value::from(""),
            ConfigKey::AppServerUrl => Value::from(DEFAULT_APP_SERVER_URL),
            ConfigKey::TranslationServerUrl => Value::from(DEFAULT_TRANSLATION_SERVER_URL),
            ConfigKey::DeveloperMode => Value::from(false),
        }
    }

    /// Convert user input (e.g. from the command line) into the stored representation.
    pub fn parse_input(self, raw: &str) -> Result<Value, String> {
        match self {
            ConfigKey::LaunchMode => Ok(Value::from(parse_launch_mode(raw)?.stored_value())),
            ConfigKey::DeveloperMode => parse_flag(raw).map(Value::from),
            _ => Ok(Value::from(raw.trim())),
        }
    }
}

/// Accepts `normal`/`steam` or the stored numbers.
pub fn parse_launch_mode(raw: &str) -> Result<LaunchMode, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "0" | "normal" => Ok(LaunchMode::Normal),
        "1" | "steam" => Ok(LaunchMode::Steam),
        other => Err(format!("invalid launch mode '{other}' (expected normal or steam)")),
    }
}

pub fn parse_flag(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        other => Err(format!("invalid flag '{other}' (expected true or false)")),
    }
}

/// JSON-backed settings store. Reads once, writes through on every change.
pub struct ConfigStore {
    path: PathBuf,
    values: Map<String, Value>,
    freshly_initialized: bool,
}

impl ConfigStore {
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(CONFIG_FILE);
        debug!("config: loading {}", path.display());
        let mut store = Self {
            path,
            values: Map::new(),
            freshly_initialized: false,
        };

        match read_config_file(&store.path) {
            Ok(values) => {
                store.values = values;
                store.backfill_missing_keys();
                info!("config: loaded {}", store.path.display());
            }
            Err(err) => {
                warn!("config: {err}; recreating defaults");
                store.reset_to_defaults();
            }
        }
        store
    }

    /// True when this session created the config file from scratch.
    pub fn is_freshly_initialized(&self) -> bool {
        self.freshly_initialized
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: ConfigKey) -> Option<&Value> {
        self.values.get(key.as_str())
    }

    /// Store `value` and persist. Returns false when the write failed; the new
    /// value is kept in memory for the rest of the session either way.
    pub fn set(&mut self, key: ConfigKey, value: Value) -> bool {
        debug!("config: {} = {}", key.as_str(), value);
        self.values.insert(key.as_str().to_owned(), value);
        let saved = self.save();
        if !saved {
            error!(
                "config: '{}' could not be saved; the change only lives in memory",
                key.as_str()
            );
        }
        saved
    }

    pub fn get_string(&self, key: ConfigKey, default: &str) -> String {
        self.get(key)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| default.to_owned())
    }

    pub fn get_bool(&self, key: ConfigKey, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    /// Decode the stored launch mode; unknown values fall back to `default`.
    pub fn get_launch_mode(&self, default: LaunchMode) -> LaunchMode {
        let Some(raw) = self.get(ConfigKey::LaunchMode) else {
            return default;
        };
        match raw.as_i64().and_then(LaunchMode::from_stored) {
            Some(mode) => mode,
            None => {
                warn!("config: invalid launch mode {raw}; using {}", default.label());
                default
            }
        }
    }

    pub fn app_version(&self) -> String {
        self.get_string(ConfigKey::AppVersion, DEFAULT_APP_VERSION)
    }

    pub fn set_app_version(&mut self, version: &str) -> bool {
        self.set(ConfigKey::AppVersion, Value::from(version))
    }

    pub fn translation_version(&self) -> String {
        self.get_string(ConfigKey::TranslationVersion, DEFAULT_TRANSLATION_VERSION)
    }

    pub fn set_translation_version(&mut self, version: &str) -> bool {
        self.set(ConfigKey::TranslationVersion, Value::from(version))
    }

    pub fn launch_mode(&self) -> LaunchMode {
        self.get_launch_mode(DEFAULT_LAUNCH_MODE)
    }

    pub fn set_launch_mode(&mut self, mode: LaunchMode) -> bool {
        self.set(ConfigKey::LaunchMode, Value::from(mode.stored_value()))
    }

    pub fn local_path(&self) -> String {
        self.get_string(ConfigKey::LocalPath, "")
    }

    pub fn set_local_path(&mut self, path: &str) -> bool {
        self.set(ConfigKey::LocalPath, Value::from(path))
    }

    pub fn app_server_url(&self) -> String {
        self.get_string(ConfigKey::AppServerUrl, DEFAULT_APP_SERVER_URL)
    }

    pub fn translation_server_url(&self) -> String {
        self.get_string(ConfigKey::TranslationServerUrl, DEFAULT_TRANSLATION_SERVER_URL)
    }

    pub fn developer_mode(&self) -> bool {
        self.get_bool(ConfigKey::DeveloperMode, false)
    }

    pub fn set_developer_mode(&mut self, enabled: bool) -> bool {
        self.set(ConfigKey::DeveloperMode, Value::from(enabled))
    }

    /// All stored entries, known and unknown, in file order.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    fn reset_to_defaults(&mut self) {
        self.values = ConfigKey::ALL
            .iter()
            .map(|key| (key.as_str().to_owned(), key.default_value()))
            .collect();
        if self.save() {
            self.freshly_initialized = true;
            info!("config: wrote defaults to {}", self.path.display());
        } else {
            error!("config: failed to write defaults to {}", self.path.display());
        }
    }

    fn backfill_missing_keys(&mut self) {
        let mut added = Vec::new();
        for key in ConfigKey::ALL {
            if !self.values.contains_key(key.as_str()) {
                self.values.insert(key.as_str().to_owned(), key.default_value());
                added.push(key.as_str());
            }
        }
        if added.is_empty() {
            return;
        }
        info!("config: added missing keys {added:?}");
        if !self.save() {
            error!("config: failed to persist added keys");
        }
    }

    fn save(&self) -> bool {
        match write_config_file(&self.path, &self.values) {
            Ok(()) => true,
            Err(err) => {
                error!("config: {err}");
                false
            }
        }
    }
}

fn read_config_file(path: &Path) -> Result<Map<String, Value>, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("unable to read {}: {err}", path.display()))?;
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(values)) => Ok(values),
        Ok(_) => Err(format!("{} is not a JSON object", path.display())),
        Err(err) => Err(format!("{} is corrupt: {err}", path.display())),
    }
}

fn write_config_file(path: &Path, values: &Map<String, Value>) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed to create config dir: {err}"))?;
    }
    let mut bytes = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut bytes, PrettyFormatter::with_indent(b"    "));
    values
        .serialize(&mut serializer)
        .map_err(|err| format!("failed to serialize config: {err}"))?;
    fs::write(path, bytes).map_err(|err| format!("failed to save {}: {err}", path.display()))
}
