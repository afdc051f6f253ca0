pub mod assets;
pub mod releases;
pub mod repo;

use std::time::Duration;

use log::warn;
use reqwest::Client;
use reqwest::redirect::Policy;

pub use assets::AssetFetcher;
pub use releases::ReleaseDirectory;
pub use repo::RepositoryRef;

pub const GITHUB_HOST: &str = "https://github.com";

/// Release pages and reachability probes.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(10);
/// One asset transfer.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

const USER_AGENT: &str = concat!("ps2jpmod/", env!("CARGO_PKG_VERSION"));

/// Build an HTTP client, falling back to reqwest's defaults if the builder fails.
pub(crate) fn build_client(timeout: Duration, follow_redirects: bool) -> Client {
    let policy = if follow_redirects {
        Policy::default()
    } else {
        Policy::none()
    };
    Client::builder()
        .timeout(timeout)
        .redirect(policy)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|err| {
            warn!("network client: falling back to default HTTP client configuration ({err})");
            Client::new()
        })
}

/// Strip trailing slashes so paths can be appended with `format!`.
pub(crate) fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('/').to_owned()
}
