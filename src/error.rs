use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a release asset could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("asset not found: {url}")]
    AssetNotFound { url: String },

    #[error("server returned {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("timed out while fetching {url}")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not connect to {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request for {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    /// Classify a transport error from reqwest.
    pub fn from_transport(url: &str, source: reqwest::Error) -> Self {
        let url = url.to_owned();
        if source.is_timeout() {
            FetchError::Timeout { url, source }
        } else if source.is_connect() {
            FetchError::Connection { url, source }
        } else {
            FetchError::Request { url, source }
        }
    }

    /// Short machine-friendly name, used in logs and `Failed` events.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::AssetNotFound { .. } => "asset-not-found",
            FetchError::Status { .. } => "status",
            FetchError::Timeout { .. } => "timeout",
            FetchError::Connection { .. } => "connection",
            FetchError::Request { .. } => "request",
            FetchError::Io { .. } => "io",
        }
    }
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("game install path is not configured")]
    PathNotConfigured,

    #[error("{name} not found: {path}")]
    MissingSource { name: &'static str, path: PathBuf },

    #[error("Locale folder not found: {path}")]
    LocaleDirMissing { path: PathBuf },

    #[error("failed to create fonts folder {path}: {source}")]
    FontsDirCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("game install path is not configured")]
    PathNotConfigured,

    #[error("LaunchPad.exe not found: {path}")]
    LauncherMissing { path: PathBuf },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("updater script not found: {path}")]
    UpdaterMissing { path: PathBuf },
}
