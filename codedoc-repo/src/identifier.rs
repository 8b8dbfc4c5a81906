//! Repository identifiers and cache key derivation
//!
//! An identifier is whatever the user typed: an `https://` URL, an scp-like `git@host:owner/name`
//! address, a scheme-less `host.tld/owner/name`, or a local path. Every spelling of the same
//! remote resolves to the same [`CacheKey`].

use codedoc_core::{input_error, CacheKey, CodedocResult};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use url::Url;

const COMPONENT: &str = "identifier";

/// Schemes accepted for remote repositories
const REMOTE_SCHEMES: &[&str] = &["http", "https", "ssh", "git", "git+ssh"];

/// Separator between key components; percent-encoded wherever it appears inside a component
const KEY_SEPARATOR: &str = "+";

/// Hex characters of the path digest kept in local keys
const LOCAL_DIGEST_LEN: usize = 16;

/// A parsed remote repository address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepository {
    /// Lower-cased host, with `:port` when one was given
    pub host: String,
    /// Owner path (one or more segments, e.g. GitLab subgroups)
    pub owner: Vec<String>,
    /// Repository name without a trailing `.git`
    pub name: String,
    /// Address handed to version control for cloning; never carries a password
    pub clone_url: String,
}

/// What the caller asked for: a remote address or a local repository path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryIdentifier {
    Remote(RemoteRepository),
    Local(PathBuf),
}

impl RepositoryIdentifier {
    /// Classify and parse an identifier without touching the filesystem
    pub fn parse(input: &str) -> CodedocResult<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(input_error!(
                "Repository identifier is empty",
                "identifier",
                COMPONENT
            ));
        }

        if let Some(rest) = strip_prefix_ignore_case(input, "file://") {
            return parse_file_url(input, rest);
        }

        if input.contains("://") {
            return parse_url(input).map(RepositoryIdentifier::Remote);
        }

        if let Some(remote) = parse_scp_like(input)? {
            return Ok(RepositoryIdentifier::Remote(remote));
        }

        if looks_like_local_path(input) {
            return Ok(RepositoryIdentifier::Local(PathBuf::from(input)));
        }

        let segments: Vec<&str> = input.split('/').filter(|s| !s.is_empty()).collect();
        match segments.first() {
            Some(first) if is_host_like(first) => {
                let remote = remote_from_parts(
                    first,
                    segments[1..].iter().map(|s| s.to_string()).collect(),
                    format!("https://{}", input.trim_end_matches('/')),
                    input,
                )?;
                Ok(RepositoryIdentifier::Remote(remote))
            }
            _ => Ok(RepositoryIdentifier::Local(PathBuf::from(input))),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, RepositoryIdentifier::Local(_))
    }

    /// Address handed to version control
    pub fn clone_source(&self) -> String {
        match self {
            RepositoryIdentifier::Remote(remote) => remote.clone_url.clone(),
            RepositoryIdentifier::Local(path) => path.to_string_lossy().to_string(),
        }
    }

    /// Derive the cache key. Pure: the same identifier always yields the same key.
    pub fn cache_key(&self) -> CacheKey {
        match self {
            RepositoryIdentifier::Remote(remote) => {
                let mut parts = Vec::with_capacity(remote.owner.len() + 2);
                parts.push(encode_component(&remote.host));
                parts.extend(remote.owner.iter().map(|s| encode_component(s)));
                parts.push(encode_component(&remote.name));
                CacheKey::new(parts.join(KEY_SEPARATOR))
            }
            RepositoryIdentifier::Local(path) => {
                let normalized = normalize_path(path);
                let name = normalized
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "root".to_string());
                let digest = hex::encode(Sha256::digest(normalized.to_string_lossy().as_bytes()));
                CacheKey::new(format!(
                    "local{sep}{}{sep}{}",
                    encode_component(&name),
                    &digest[..LOCAL_DIGEST_LEN],
                    sep = KEY_SEPARATOR
                ))
            }
        }
    }
}

impl fmt::Display for RepositoryIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryIdentifier::Remote(remote) => {
                write!(f, "{}/{}/{}", remote.host, remote.owner.join("/"), remote.name)
            }
            RepositoryIdentifier::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Normalize an identifier into its cache key
pub fn resolve(input: &str) -> CodedocResult<CacheKey> {
    RepositoryIdentifier::parse(input).map(|id| id.cache_key())
}

fn strip_prefix_ignore_case<'a>(input: &'a str, prefix: &str) -> Option<&'a str> {
    match input.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => Some(&input[prefix.len()..]),
        _ => None,
    }
}

fn parse_file_url(input: &str, rest: &str) -> CodedocResult<RepositoryIdentifier> {
    let path = Url::parse(input)
        .ok()
        .and_then(|url| url.to_file_path().ok())
        .unwrap_or_else(|| PathBuf::from(rest));

    if path.as_os_str().is_empty() {
        return Err(input_error!(
            format!("file URL has no path: {}", input),
            "identifier",
            COMPONENT
        ));
    }

    Ok(RepositoryIdentifier::Local(path))
}

fn parse_url(input: &str) -> CodedocResult<RemoteRepository> {
    let parsed = Url::parse(input).map_err(|e| {
        input_error!(
            format!("Invalid repository URL '{}': {}", input, e),
            "identifier",
            COMPONENT
        )
    })?;

    if !REMOTE_SCHEMES.contains(&parsed.scheme()) {
        return Err(input_error!(
            format!("Unsupported URL scheme '{}'", parsed.scheme()),
            "identifier",
            COMPONENT
        ));
    }

    let clone_url = without_credentials(&parsed);
    let host = parsed.host_str().ok_or_else(|| {
        input_error!(
            format!("Repository URL has no host: {}", clone_url),
            "identifier",
            COMPONENT
        )
    })?;
    let host = match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    let segments = parsed
        .path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(|s| {
                    urlencoding::decode(s)
                        .map(|decoded| decoded.into_owned())
                        .unwrap_or_else(|_| s.to_string())
                })
                .collect()
        })
        .unwrap_or_default();

    remote_from_parts(&host, segments, clone_url.clone(), &clone_url)
}

/// `url` without a password; http(s) usernames only ever carry tokens, so they go too
fn without_credentials(url: &Url) -> String {
    if url.password().is_none() && url.username().is_empty() {
        return url.as_str().to_string();
    }

    let mut clean = url.clone();
    let _ = clean.set_password(None);
    if matches!(clean.scheme(), "http" | "https") {
        let _ = clean.set_username("");
    }
    clean.to_string()
}

/// `[user@]host:owner/name[.git]`
fn parse_scp_like(input: &str) -> CodedocResult<Option<RemoteRepository>> {
    let Some((before, path)) = input.split_once(':') else {
        return Ok(None);
    };

    if before.is_empty() || before.contains('/') || before.contains('\\') {
        return Ok(None);
    }

    let host = before.rsplit_once('@').map(|(_, h)| h).unwrap_or(before);

    // Windows drive letter, e.g. `C:\repos\x`
    if host.len() == 1 && host.chars().all(|c| c.is_ascii_alphabetic()) {
        return Ok(None);
    }

    let segments = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();

    remote_from_parts(host, segments, input.to_string(), input).map(Some)
}

fn remote_from_parts(
    host: &str,
    mut segments: Vec<String>,
    clone_url: String,
    original: &str,
) -> CodedocResult<RemoteRepository> {
    let host = host.trim().to_ascii_lowercase();
    if host.is_empty() {
        return Err(input_error!(
            format!("Repository address has no host: {}", original),
            "identifier",
            COMPONENT
        ));
    }

    if let Some(last) = segments.last_mut() {
        if let Some(stripped) = last.strip_suffix(".git") {
            *last = stripped.to_string();
        }
    }
    segments.retain(|s| !s.is_empty());

    if segments.len() < 2 {
        return Err(input_error!(
            format!(
                "Repository address must contain an owner and a name: {}",
                original
            ),
            "identifier",
            COMPONENT
        ));
    }

    let name = segments.pop().unwrap_or_default();
    Ok(RemoteRepository {
        host,
        owner: segments,
        name,
        clone_url,
    })
}

fn looks_like_local_path(input: &str) -> bool {
    input.starts_with('/')
        || input.starts_with('\\')
        || input.starts_with('~')
        || input.starts_with('.')
        || Path::new(input).is_absolute()
}

/// `example.com`, `git.example.org:8443` or `localhost`
fn is_host_like(segment: &str) -> bool {
    let host = segment.split(':').next().unwrap_or(segment);
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }

    let valid_chars = host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    let tld_is_alphabetic = host
        .rsplit_once('.')
        .map(|(_, tld)| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
        .unwrap_or(false);

    valid_chars && tld_is_alphabetic
}

fn encode_component(component: &str) -> String {
    urlencoding::encode(component).into_owned()
}

/// Lexical normalization: drops `.` components and trailing separators
fn normalize_path(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
