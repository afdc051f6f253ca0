use std::fmt;

use reqwest::Url;

const GITHUB_DOMAIN: &str = "github.com";

/// A GitHub repository identified by owner and name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RepositoryRef {
    pub owner: String,
    pub repo: String,
}

impl RepositoryRef {
    /// Accepts `owner/repo` or `https://github.com/owner/repo[/...]`.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        match Url::parse(input) {
            Ok(url) => {
                if !url.host_str()?.eq_ignore_ascii_case(GITHUB_DOMAIN) {
                    return None;
                }
                let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
                let owner = segments.next()?;
                let repo = segments.next()?;
                Self::from_parts(owner, repo)
            }
            Err(_) => {
                let segments: Vec<&str> = input.trim_matches('/').split('/').collect();
                let [owner, repo] = segments.as_slice() else {
                    return None;
                };
                Self::from_parts(owner, repo)
            }
        }
    }

    fn from_parts(owner: &str, repo: &str) -> Option<Self> {
        let repo = strip_git_suffix(repo);
        if owner.is_empty() || repo.is_empty() {
            return None;
        }
        Some(Self {
            owner: owner.to_owned(),
            repo: repo.to_owned(),
        })
    }

    /// `owner/repo` path prefix used for every page and asset URL.
    pub fn path(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

fn strip_git_suffix(repo: &str) -> &str {
    let len = repo.len();
    if len >= 4 && repo.is_char_boundary(len - 4) && repo[len - 4..].eq_ignore_ascii_case(".git") {
        &repo[..len - 4]
    } else {
        repo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(owner: &str, name: &str) -> Option<RepositoryRef> {
        Some(RepositoryRef {
            owner: owner.into(),
            repo: name.into(),
        })
    }

    #[test]
    fn short_form_and_url_agree() {
        let expected = repo("PS2-Localization-JP", "PlanetSide2-nihongo-mod-api");
        for input in [
            "PS2-Localization-JP/PlanetSide2-nihongo-mod-api",
            "PS2-Localization-JP/PlanetSide2-nihongo-mod-api/",
            "/PS2-Localization-JP/PlanetSide2-nihongo-mod-api",
            "https://github.com/PS2-Localization-JP/PlanetSide2-nihongo-mod-api",
            "https://github.com/PS2-Localization-JP/PlanetSide2-nihongo-mod-api/releases/latest",
            "https://github.com/PS2-Localization-JP/PlanetSide2-nihongo-mod-api.git",
            "https://GitHub.com/PS2-Localization-JP/PlanetSide2-nihongo-mod-api.GIT",
        ] {
            assert_eq!(RepositoryRef::parse(input), expected, "{input}");
        }
    }

    #[test]
    fn rejects_incomplete_or_foreign_references() {
        for input in [
            "",
            "   ",
            "owner",
            "owner/",
            "/repo",
            "owner/repo/extra",
            "owner//repo",
            "https://github.com/owner",
            "https://gitlab.com/owner/repo",
            "https://github.com.evil.test/owner/repo",
            "owner/.git",
        ] {
            assert_eq!(RepositoryRef::parse(input), None, "{input:?}");
        }
    }

    #[test]
    fn displays_as_owner_slash_repo() {
        let parsed = RepositoryRef::parse("owner/tool.git").unwrap();
        assert_eq!(parsed.to_string(), "owner/tool");
        assert_eq!(parsed.path(), "owner/tool");
    }
}
