use log::warn;
use serde::Serialize;

use crate::updater::version::Version;

/// Release entry scraped from a repository's releases page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReleaseInfo {
    pub tag_name: String,
    pub is_latest: bool,
    pub url: String,
}

/// Installed version of one tracked entity, the newest version seen on its
/// update source, and where that source lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionDescriptor {
    pub current: String,
    pub latest_available: String,
    pub source: String,
}

impl VersionDescriptor {
    pub fn new(current: impl Into<String>, source: impl Into<String>) -> Self {
        let current = current.into();
        Self {
            latest_available: current.clone(),
            current,
            source: source.into(),
        }
    }

    /// True whenever the latest known version differs from the installed one.
    /// A downgrade also counts, so a pulled release can be rolled back.
    pub fn is_update_available(&self) -> bool {
        match (
            Version::parse(&self.latest_available),
            Version::parse(&self.current),
        ) {
            (Some(latest), Some(current)) => latest != current,
            _ => {
                warn!(
                    "version compare skipped: current='{}', latest='{}' is not a valid version",
                    self.current, self.latest_available
                );
                false
            }
        }
    }

    pub fn reset_latest(&mut self) {
        self.latest_available = self.current.clone();
    }

    /// Record a successful update: the downloaded version becomes current.
    pub fn advance_to(&mut self, version: impl Into<String>) {
        self.current = version.into();
        self.latest_available = self.current.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(current: &str, latest: &str) -> VersionDescriptor {
        let mut info = VersionDescriptor::new(current, "owner/repo");
        info.latest_available = latest.into();
        info
    }

    #[test]
    fn latest_defaults_to_current() {
        let info = VersionDescriptor::new("1.0.0", "owner/repo");
        assert_eq!(info.latest_available, "1.0.0");
        assert!(!info.is_update_available());
    }

    #[test]
    fn newer_release_is_an_update() {
        assert!(descriptor("1.0.0", "v1.1.0").is_update_available());
        assert!(descriptor("1.0.0", "1.0.1-beta").is_update_available());
    }

    #[test]
    fn formatting_differences_are_not_updates() {
        assert!(!descriptor("1.0", "v1.0.0").is_update_available());
        assert!(!descriptor("v2.3.0", "2.3").is_update_available());
    }

    #[test]
    fn downgrade_is_reported_as_update() {
        // Rolling back to an older published release is offered as an update.
        assert!(descriptor("1.2.0", "1.1.0").is_update_available());
        assert!(descriptor("1.2.0", "1.2.0-rc1").is_update_available());
    }

    #[test]
    fn unparseable_versions_never_offer_updates() {
        assert!(!descriptor("1.0.0", "nightly").is_update_available());
        assert!(!descriptor("garbage", "1.0.0").is_update_available());
    }

    #[test]
    fn advancing_clears_pending_update() {
        let mut info = descriptor("1.0.0", "1.1.0");
        info.advance_to("1.1.0");
        assert_eq!(info.current, "1.1.0");
        assert!(!info.is_update_available());
    }
}
