use std::cmp::Ordering;
use std::fmt;

/// Release version as published in tags, e.g. `v1.2.0`, `1.1.0-beta`, `2.0rc1`.
///
/// Numeric release parts are compared with missing parts treated as zero, so
/// `1.0` and `v1.0.0` are equal. Pre-release labels follow the usual
/// alpha < beta < rc order and sort before the final release; `.postN`
/// sorts after it and `.devN` before everything else of the same release.
/// A `+local` suffix sorts after the same version without one.
#[derive(Debug, Clone)]
pub struct Version {
    release: Vec<u64>,
    pre: Option<(PreLabel, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Vec<LocalPart>,
}

/// Numeric local segments sort after alphanumeric ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum LocalPart {
    Text(String),
    Number(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PreLabel {
    Alpha,
    Beta,
    Rc,
}

// Longer spellings first so `alpha` is not read as `a` + garbage.
const PRE_LABELS: [(&str, PreLabel); 8] = [
    ("alpha", PreLabel::Alpha),
    ("beta", PreLabel::Beta),
    ("preview", PreLabel::Rc),
    ("pre", PreLabel::Rc),
    ("rc", PreLabel::Rc),
    ("a", PreLabel::Alpha),
    ("b", PreLabel::Beta),
    ("c", PreLabel::Rc),
];
const POST_LABELS: [&str; 3] = ["post", "rev", "r"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PreKey {
    DevOnly,
    Pre(PreLabel, u64),
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum DevKey {
    Dev(u64),
    Release,
}

impl Version {
    /// Parse a tag or stored version string. Returns `None` for anything that
    /// is not a version (branch names, empty strings, trailing garbage).
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let normalized = normalize_version(input);
        let (release, mut rest) = parse_release(&normalized)?;

        let mut pre = None;
        if let Some((label, after)) = take_label(rest, &PRE_LABELS) {
            let (number, after) = take_number(after);
            pre = Some((label, number));
            rest = after;
        }

        let mut post = None;
        if let Some(((), after)) = take_label(rest, &POST_LABELS.map(|label| (label, ()))) {
            let (number, after) = take_number(after);
            post = Some(number);
            rest = after;
        } else if let Some((number, after)) = take_implicit_post(rest) {
            post = Some(number);
            rest = after;
        }

        let mut dev = None;
        if let Some(((), after)) = take_label(rest, &[("dev", ())]) {
            let (number, after) = take_number(after);
            dev = Some(number);
            rest = after;
        }

        let local = match rest.strip_prefix('+') {
            Some(segment) => parse_local(segment)?,
            None if rest.is_empty() => Vec::new(),
            None => return None,
        };

        Some(Self {
            release,
            pre,
            post,
            dev,
            local,
        })
    }

    /// Alpha/beta/rc and development builds count as pre-releases.
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    fn pre_key(&self) -> PreKey {
        match (self.pre, self.post, self.dev) {
            (Some((label, number)), _, _) => PreKey::Pre(label, number),
            (None, None, Some(_)) => PreKey::DevOnly,
            _ => PreKey::Final,
        }
    }

    fn dev_key(&self) -> DevKey {
        self.dev.map(DevKey::Dev).unwrap_or(DevKey::Release)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_release(&self.release, &other.release)
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post.cmp(&other.post))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
            .then_with(|| self.local.cmp(&other.local))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let release = self
            .release
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&release)?;
        if let Some((label, number)) = self.pre {
            let label = match label {
                PreLabel::Alpha => "a",
                PreLabel::Beta => "b",
                PreLabel::Rc => "rc",
            };
            write!(f, "{label}{number}")?;
        }
        if let Some(number) = self.post {
            write!(f, ".post{number}")?;
        }
        if let Some(number) = self.dev {
            write!(f, ".dev{number}")?;
        }
        for (index, part) in self.local.iter().enumerate() {
            f.write_str(if index == 0 { "+" } else { "." })?;
            match part {
                LocalPart::Text(text) => f.write_str(text)?,
                LocalPart::Number(number) => write!(f, "{number}")?,
            }
        }
        Ok(())
    }
}

/// Normalize version string by trimming, lowercasing and removing a 'v' prefix.
fn normalize_version(version: &str) -> String {
    let lowered = version.trim().to_ascii_lowercase();
    match lowered.strip_prefix('v') {
        Some(stripped) => stripped.to_owned(),
        None => lowered,
    }
}

/// Split `1.2.3rc1` into `[1, 2, 3]` and the unparsed suffix `rc1`.
fn parse_release(version: &str) -> Option<(Vec<u64>, &str)> {
    let mut parts = Vec::new();
    let mut rest = version;
    loop {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return None;
        }
        parts.push(rest[..digits].parse::<u64>().ok()?);
        rest = &rest[digits..];

        match rest.strip_prefix('.') {
            Some(after) if after.starts_with(|c: char| c.is_ascii_digit()) => rest = after,
            _ => return Some((parts, rest)),
        }
    }
}

/// Consume an optional `-`, `_` or `.` separator followed by one of `labels`.
fn take_label<'a, T: Copy>(input: &'a str, labels: &[(&str, T)]) -> Option<(T, &'a str)> {
    let trimmed = input
        .strip_prefix(|c: char| matches!(c, '-' | '_' | '.'))
        .unwrap_or(input);
    labels.iter().find_map(|(label, value)| {
        trimmed
            .strip_prefix(*label)
            .map(|after| (*value, after))
    })
}

/// Consume an optional separator and number; an absent number counts as zero.
fn take_number(input: &str) -> (u64, &str) {
    let candidate = input
        .strip_prefix(|c: char| matches!(c, '-' | '_' | '.'))
        .unwrap_or(input);
    let digits = candidate.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return (0, input);
    }
    match candidate[..digits].parse::<u64>() {
        Ok(number) => (number, &candidate[digits..]),
        Err(_) => (0, input),
    }
}

/// `1.0-1` is shorthand for `1.0.post1`.
fn take_implicit_post(input: &str) -> Option<(u64, &str)> {
    let after = input.strip_prefix('-')?;
    let digits = after.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let number = after[..digits].parse::<u64>().ok()?;
    Some((number, &after[digits..]))
}

/// Split `jp1.2` into alphanumeric segments separated by `.`, `-` or `_`.
fn parse_local(input: &str) -> Option<Vec<LocalPart>> {
    input
        .split(['.', '-', '_'])
        .map(|segment| {
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_alphanumeric()) {
                None
            } else if segment.bytes().all(|b| b.is_ascii_digit()) {
                segment.parse().ok().map(LocalPart::Number)
            } else {
                Some(LocalPart::Text(segment.to_owned()))
            }
        })
        .collect()
}

/// Compare numeric release parts, treating missing trailing parts as zero.
fn compare_release(a: &[u64], b: &[u64]) -> Ordering {
    let max_len = a.len().max(b.len());
    for i in 0..max_len {
        let a_part = a.get(i).copied().unwrap_or(0);
        let b_part = b.get(i).copied().unwrap_or(0);
        match a_part.cmp(&b_part) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}
