use log::{debug, warn};
use reqwest::{Client, StatusCode, Url};
use scraper::element_ref::ElementRef;
use scraper::{Html, Selector};

use super::{QUERY_TIMEOUT, RepositoryRef, build_client, normalize_host};
use crate::engine::models::ReleaseInfo;
use crate::updater::version::Version;

// Each entry is one strategy; the first that matches anything wins.
const RELEASE_BLOCK_SELECTORS: [&str; 2] = [
    "div.repository-content section[aria-labelledby='releases-label'] ol > li, \
     div.repository-content section[aria-labelledby='releases-label'] ul > li, \
     div.repository-content section[aria-labelledby='releases-label'] div.Box, \
     div.repository-content section[aria-labelledby^='hd-']",
    "div.repository-content div.col-md-9 > div.Box",
];

const TAG_ANCHOR_SELECTORS: [&str; 3] = [
    "h2 a.Link--primary",
    "div.flex-1 span.f1.text-bold a.Link--primary",
    "a.Link--primary[href*='/releases/tag/']",
];

const LATEST_BADGE_SELECTOR: &str = "span.Label.Label--success";

/// Read-only view of a host's release pages.
#[derive(Clone)]
pub struct ReleaseDirectory {
    host: String,
    client: Client,
    probe_client: Client,
}

impl ReleaseDirectory {
    pub fn new(host: &str) -> Self {
        Self {
            host: normalize_host(host),
            client: build_client(QUERY_TIMEOUT, true),
            probe_client: build_client(QUERY_TIMEOUT, false),
        }
    }

    fn latest_url(&self, repo: &RepositoryRef) -> String {
        format!("{}/{}/releases/latest", self.host, repo.path())
    }

    /// Probe the "latest release" URL without following the redirect.
    pub async fn check_connection(&self, repo: &RepositoryRef) -> bool {
        let url = self.latest_url(repo);
        let response = match self.probe_client.head(&url).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!("releases: {url} unreachable: {err}");
                return false;
            }
        };

        let status = response.status();
        if status == StatusCode::FOUND {
            debug!("releases: {url} reachable");
            true
        } else if status.is_success() {
            warn!("releases: {url} answered {status} instead of a redirect; treating as reachable");
            true
        } else {
            warn!("releases: {url} answered {status}");
            false
        }
    }

    /// Tag of the release the host marks as latest.
    pub async fn latest_release_tag(&self, repo: &RepositoryRef) -> Option<String> {
        let url = self.latest_url(repo);
        let (final_url, body) = self.fetch_page(&url).await?;

        if let Some(tag) = parse_latest_tag(&body, repo) {
            debug!("releases: latest tag for {repo} found via page link");
            return Some(tag);
        }
        if let Some(tag) = tag_from_href(final_url.path(), repo) {
            debug!("releases: latest tag for {repo} found via redirect target");
            return Some(tag);
        }
        warn!("releases: no latest tag found for {repo}");
        None
    }

    /// Every release listed on the first releases page, in page order.
    pub async fn all_releases(&self, repo: &RepositoryRef) -> Option<Vec<ReleaseInfo>> {
        let url = format!("{}/{}/releases", self.host, repo.path());
        let (_, body) = self.fetch_page(&url).await?;
        let releases = parse_releases(&body, &self.host);
        if releases.is_none() {
            warn!("releases: no releases found on {url}");
        }
        releases
    }

    async fn fetch_page(&self, url: &str) -> Option<(Url, String)> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!("releases: GET {url} failed: {err}");
                return None;
            }
        };
        let status = response.status();
        if !status.is_success() {
            warn!("releases: GET {url} returned {status}");
            return None;
        }
        let final_url = response.url().clone();
        match response.text().await {
            Ok(body) => Some((final_url, body)),
            Err(err) => {
                warn!("releases: failed to read {url}: {err}");
                None
            }
        }
    }
}

/// Extract the tag from the first link pointing at one of `repo`'s release tags.
pub fn parse_latest_tag(html: &str, repo: &RepositoryRef) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").ok()?;
    document
        .select(&selector)
        .filter_map(|link| link.value().attr("href"))
        .find_map(|href| tag_from_href(href, repo))
}

/// `.../<owner>/<repo>/releases/tag/<tag>[/?#...]` -> `<tag>`.
fn tag_from_href(href: &str, repo: &RepositoryRef) -> Option<String> {
    let marker = format!("/{}/releases/tag/", repo.path());
    let start = href.find(&marker)? + marker.len();
    let tag: String = href[start..]
        .chars()
        .take_while(|c| !matches!(c, '/' | '?' | '#') && !c.is_whitespace())
        .collect();
    (!tag.is_empty()).then_some(tag)
}

/// Scrape release entries from a releases listing page. Relative links are
/// resolved against `host`.
pub fn parse_releases(html: &str, host: &str) -> Option<Vec<ReleaseInfo>> {
    let document = Html::parse_document(html);
    let base = Url::parse(host).ok();

    let anchor_selectors: Vec<Selector> = TAG_ANCHOR_SELECTORS
        .iter()
        .filter_map(|sel| Selector::parse(sel).ok())
        .collect();
    let badge_selector = Selector::parse(LATEST_BADGE_SELECTOR).ok()?;

    let (strategy, blocks) = RELEASE_BLOCK_SELECTORS
        .iter()
        .enumerate()
        .find_map(|(index, sel)| {
            let selector = Selector::parse(sel).ok()?;
            let blocks: Vec<ElementRef<'_>> = document.select(&selector).collect();
            (!blocks.is_empty()).then_some((index, blocks))
        })?;
    debug!(
        "releases: {} release blocks matched by strategy {}",
        blocks.len(),
        strategy + 1
    );

    let mut releases = Vec::new();
    for block in blocks {
        let Some(anchor) = anchor_selectors
            .iter()
            .find_map(|selector| block.select(selector).next())
        else {
            continue;
        };
        let tag_name = element_text(anchor);
        if tag_name.is_empty() {
            continue;
        }

        let href = anchor.value().attr("href").unwrap_or_default();
        let url = match base.as_ref().and_then(|base| base.join(href).ok()) {
            Some(url) => url.to_string(),
            None => href.to_owned(),
        };

        let badge_scope = anchor
            .parent()
            .and_then(|parent| parent.parent())
            .and_then(ElementRef::wrap);
        let is_latest = badge_scope
            .is_some_and(|scope| has_latest_badge(scope, &badge_selector))
            || has_latest_badge(block, &badge_selector);

        releases.push(ReleaseInfo {
            tag_name,
            is_latest,
            url,
        });
    }

    (!releases.is_empty()).then_some(releases)
}

fn has_latest_badge(scope: ElementRef<'_>, selector: &Selector) -> bool {
    scope
        .select(selector)
        .any(|badge| element_text(badge).to_lowercase().contains("latest"))
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Highest version among `releases`. Ties keep the earlier entry.
pub fn highest_version_tag(releases: &[ReleaseInfo], include_prerelease: bool) -> Option<String> {
    let mut best: Option<(Version, &str)> = None;
    for release in releases {
        let Some(version) = Version::parse(&release.tag_name) else {
            warn!("releases: skipping tag '{}' (not a version)", release.tag_name);
            continue;
        };
        if !include_prerelease && version.is_prerelease() {
            continue;
        }
        let is_better = match &best {
            Some((current, _)) => version > *current,
            None => true,
        };
        if is_better {
            best = Some((version, &release.tag_name));
        }
    }
    best.map(|(_, tag)| tag.to_owned())
}
