pub mod version;

use log::{info, warn};

use crate::engine::models::VersionDescriptor;
use crate::engine::state::Entity;
use crate::networking::{ReleaseDirectory, RepositoryRef};
use crate::networking::releases::highest_version_tag;
use version::Version;

/// Result of one update check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// The configured source is not a valid repository reference.
    InvalidSource,
    Unreachable,
    UpdateAvailable { tag: String },
    UpToDate,
    MalformedVersion { tag: String },
    Unavailable,
}

impl UpdateStatus {
    pub fn message(&self, entity: Entity) -> String {
        match self {
            UpdateStatus::InvalidSource => {
                format!("Update source for the {entity} is not a valid repository.")
            }
            UpdateStatus::Unreachable => {
                format!("Could not reach the {entity} update server.")
            }
            UpdateStatus::UpdateAvailable { tag } => {
                format!("An update is available for the {entity}: {tag}")
            }
            UpdateStatus::UpToDate => format!("The {entity} is up to date."),
            UpdateStatus::MalformedVersion { tag } => {
                format!("The {entity} release tag '{tag}' is not a valid version.")
            }
            UpdateStatus::Unavailable => {
                format!("Could not retrieve version info for the {entity}.")
            }
        }
    }
}

/// Query the release host for `descriptor.source` and record the newest
/// version in `descriptor.latest_available`.
///
/// Normal mode follows the host's "latest" release. Developer mode scans the
/// release list and takes the highest version, pre-releases included.
pub async fn check_update(
    releases: &ReleaseDirectory,
    descriptor: &mut VersionDescriptor,
    developer_mode: bool,
) -> UpdateStatus {
    let Some(repo) = RepositoryRef::parse(&descriptor.source) else {
        warn!("updater: '{}' is not a repository reference", descriptor.source);
        descriptor.reset_latest();
        return UpdateStatus::InvalidSource;
    };

    if !releases.check_connection(&repo).await {
        descriptor.reset_latest();
        return UpdateStatus::Unreachable;
    }

    let tag = if developer_mode {
        releases
            .all_releases(&repo)
            .await
            .and_then(|list| highest_version_tag(&list, true))
    } else {
        releases.latest_release_tag(&repo).await
    };

    let Some(tag) = tag else {
        descriptor.reset_latest();
        return UpdateStatus::Unavailable;
    };

    if Version::parse(&tag).is_none() {
        warn!("updater: {repo} tag '{tag}' is not a version");
        descriptor.reset_latest();
        return UpdateStatus::MalformedVersion { tag };
    }

    descriptor.latest_available = tag.clone();
    if descriptor.is_update_available() {
        info!("updater: {repo} {} -> {tag}", descriptor.current);
        UpdateStatus::UpdateAvailable { tag }
    } else {
        info!("updater: {repo} is at {tag}");
        UpdateStatus::UpToDate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const REPO: &str = "PS2-Localization-JP/PlanetSide2-nihongo-mod-api";
    const RELEASES_PAGE: &str = include_str!("../../fixtures/releases.html");
    const LATEST_PAGE: &str = include_str!("../../fixtures/latest_release.html");

    async fn server_with_pages() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path(format!("/{REPO}/releases/latest")))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/elsewhere"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/{REPO}/releases/latest")))
            .respond_with(ResponseTemplate::new(200).set_body_string(LATEST_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/{REPO}/releases")))
            .respond_with(ResponseTemplate::new(200).set_body_string(RELEASES_PAGE))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn normal_mode_follows_latest_release() {
        let server = server_with_pages().await;
        let releases = ReleaseDirectory::new(&server.uri());
        let mut descriptor = VersionDescriptor::new("2.3.1", REPO);

        let status = check_update(&releases, &mut descriptor, false).await;
        assert_eq!(status, UpdateStatus::UpdateAvailable { tag: "v2.4.0".into() });
        assert_eq!(descriptor.latest_available, "v2.4.0");
    }

    #[tokio::test]
    async fn developer_mode_includes_prereleases() {
        let server = server_with_pages().await;
        let releases = ReleaseDirectory::new(&server.uri());
        let mut descriptor = VersionDescriptor::new("v2.4.0", REPO);

        let status = check_update(&releases, &mut descriptor, true).await;
        assert_eq!(status, UpdateStatus::UpdateAvailable { tag: "v2.5.0-beta".into() });

        let mut stable = VersionDescriptor::new("v2.4.0", REPO);
        assert_eq!(check_update(&releases, &mut stable, false).await, UpdateStatus::UpToDate);
    }

    #[tokio::test]
    async fn unreachable_server_resets_latest() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let releases = ReleaseDirectory::new(&server.uri());
        let mut descriptor = VersionDescriptor::new("1.0.0", REPO);
        descriptor.latest_available = "1.5.0".into();

        let status = check_update(&releases, &mut descriptor, false).await;
        assert_eq!(status, UpdateStatus::Unreachable);
        assert_eq!(descriptor.latest_available, "1.0.0");
    }

    #[tokio::test]
    async fn malformed_tag_is_not_an_update() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/x"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/{REPO}/releases/latest")))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "<a href=\"/{REPO}/releases/tag/nightly-build\">nightly</a>"
            )))
            .mount(&server)
            .await;

        let releases = ReleaseDirectory::new(&server.uri());
        let mut descriptor = VersionDescriptor::new("1.0.0", REPO);
        let status = check_update(&releases, &mut descriptor, false).await;

        assert_eq!(status, UpdateStatus::MalformedVersion { tag: "nightly-build".into() });
        assert_eq!(descriptor.latest_available, "1.0.0");
        assert!(!descriptor.is_update_available());
    }

    #[tokio::test]
    async fn missing_tag_reports_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/x"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let releases = ReleaseDirectory::new(&server.uri());
        let mut descriptor = VersionDescriptor::new("1.0.0", REPO);
        assert_eq!(
            check_update(&releases, &mut descriptor, false).await,
            UpdateStatus::Unavailable
        );
        assert_eq!(
            check_update(&releases, &mut descriptor, true).await,
            UpdateStatus::Unavailable
        );
    }

    #[tokio::test]
    async fn invalid_source_skips_network() {
        let releases = ReleaseDirectory::new("http://127.0.0.1:9");
        let mut descriptor = VersionDescriptor::new("1.0.0", "not a repo");
        assert_eq!(
            check_update(&releases, &mut descriptor, false).await,
            UpdateStatus::InvalidSource
        );
    }

    #[test]
    fn messages_name_the_entity() {
        let message = UpdateStatus::UpdateAvailable { tag: "v2.0.0".into() }.message(Entity::Translation);
        assert_eq!(message, "An update is available for the translation data: v2.0.0");
        assert_eq!(
            UpdateStatus::UpToDate.message(Entity::Application),
            "The application is up to date."
        );
    }
}
