use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, info};
use reqwest::{Client, StatusCode};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use super::{DOWNLOAD_TIMEOUT, RepositoryRef, build_client, normalize_host};
use crate::error::FetchError;

/// Progress is reported once per chunk of this size.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Downloads individual release assets.
#[derive(Clone)]
pub struct AssetFetcher {
    host: String,
    client: Client,
}

impl AssetFetcher {
    pub fn new(host: &str) -> Self {
        Self::with_timeout(host, DOWNLOAD_TIMEOUT)
    }

    pub fn with_timeout(host: &str, timeout: Duration) -> Self {
        Self {
            host: normalize_host(host),
            client: build_client(timeout, true),
        }
    }

    pub fn asset_url(&self, repo: &RepositoryRef, tag: &str, filename: &str) -> String {
        format!(
            "{}/{}/releases/download/{tag}/{filename}",
            self.host,
            repo.path()
        )
    }

    /// Stream one asset into `dest_dir/filename`.
    ///
    /// `on_progress(total, downloaded)` runs after every chunk when the
    /// server announced a non-zero length. Without a length it runs once at
    /// the end, provided anything was received.
    pub async fn download(
        &self,
        repo: &RepositoryRef,
        tag: &str,
        filename: &str,
        dest_dir: &Path,
        on_progress: &mut (dyn FnMut(u64, u64) + Send),
    ) -> Result<PathBuf, FetchError> {
        let url = self.asset_url(repo, tag, filename);
        debug!("download: GET {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::from_transport(&url, source))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::AssetNotFound { url });
        }
        if !status.is_success() {
            return Err(FetchError::Status { url, status });
        }

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|source| FetchError::Io {
                path: dest_dir.to_path_buf(),
                source,
            })?;
        let dest = dest_dir.join(filename);
        let io_error = |source| FetchError::Io {
            path: dest.clone(),
            source,
        };
        let mut file = File::create(&dest).await.map_err(io_error)?;

        let total = response.content_length().filter(|len| *len > 0);
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| FetchError::from_transport(&url, source))?;
            for piece in chunk.chunks(CHUNK_SIZE) {
                file.write_all(piece).await.map_err(io_error)?;
                downloaded += piece.len() as u64;
                if let Some(total) = total {
                    on_progress(total, downloaded);
                }
            }
        }
        file.flush().await.map_err(io_error)?;

        if total.is_none() && downloaded > 0 {
            on_progress(downloaded, downloaded);
        }

        info!("download: saved {} ({downloaded} bytes)", dest.display());
        Ok(dest)
    }
}
