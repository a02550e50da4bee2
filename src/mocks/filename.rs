//! Filename convention codec.
//!
//! A mock's route identity is encoded in its path relative to the mocks
//! directory:
//!
//! ```text
//! <urlMask>[(comment)]*.<METHOD>.<STATUS>.<EXT>
//! api/user/[id](admin).GET.200.json
//! ```
//!
//! # Design Decisions
//! - Comments are stripped before tokenizing, so they may contain dots
//! - The last three dot-separated tokens are method, status and extension;
//!   everything before them is the url mask (literal dots survive)
//! - Parsing is pure; callers decide whether a bad name is fatal

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;
use uuid::Uuid;

/// Comment that marks the file selected when a broker is created.
pub const DEFAULT_COMMENT: &str = "(default)";

/// Placeholder written in place of UUID segments when collecting fixtures.
pub const ID_PLACEHOLDER: &str = "[id]";

/// Methods accepted in the `<METHOD>` token.
pub const METHODS: &[&str] = &[
    "ACL", "BIND", "CHECKOUT", "CONNECT", "COPY", "DELETE", "GET", "HEAD", "LINK", "LOCK",
    "M-SEARCH", "MERGE", "MKACTIVITY", "MKCALENDAR", "MKCOL", "MOVE", "NOTIFY", "OPTIONS",
    "PATCH", "POST", "PROPFIND", "PROPPATCH", "PURGE", "PUT", "QUERY", "REBIND", "REPORT",
    "SEARCH", "SOURCE", "SUBSCRIBE", "TRACE", "UNBIND", "UNLINK", "UNLOCK", "UNSUBSCRIBE",
];

/// Route identity derived from a mock filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameDescriptor {
    /// Route pattern, always starting with `/`. Query strings are kept verbatim.
    pub url_mask: String,
    pub method: String,
    pub status: u16,
    pub ext: String,
    /// Parenthesized annotations, parentheses included, in order of appearance.
    pub comments: Vec<String>,
}

/// Reasons a filename does not follow the convention.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilenameError {
    #[error("invalid filename convention: expected <urlMask>.<METHOD>.<STATUS>.<EXT>")]
    TooFewTokens,

    #[error("unrecognized HTTP method `{0}`")]
    UnrecognizedMethod(String),

    #[error("invalid HTTP response status `{0}`")]
    InvalidStatus(String),
}

fn comments_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(.*?\)").expect("comment pattern is valid"))
}

/// Parse a mock path (relative to the mocks directory, `/`-separated).
pub fn parse_filename(file: &str) -> Result<FilenameDescriptor, FilenameError> {
    let comments = extract_comments(file);
    let stripped = comments_regex().replace_all(file, "");

    let mut tokens: Vec<&str> = stripped.split('.').collect();
    if tokens.len() < 4 {
        return Err(FilenameError::TooFewTokens);
    }

    // len checked above
    let ext = tokens.pop().unwrap_or_default().to_string();
    let status_token = tokens.pop().unwrap_or_default();
    let method = tokens.pop().unwrap_or_default().to_string();

    if !is_method(&method) {
        return Err(FilenameError::UnrecognizedMethod(method));
    }
    let status = parse_status(status_token)
        .ok_or_else(|| FilenameError::InvalidStatus(status_token.to_string()))?;

    Ok(FilenameDescriptor {
        url_mask: normalize_mask(&tokens.join(".")),
        method,
        status,
        ext,
        comments,
    })
}

/// Every parenthesized substring of `file`, left to right, duplicates kept.
pub fn extract_comments(file: &str) -> Vec<String> {
    comments_regex()
        .find_iter(file)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Whether the file carries the `(default)` comment.
pub fn is_default(file: &str) -> bool {
    file.contains(DEFAULT_COMMENT)
}

pub fn is_method(method: &str) -> bool {
    METHODS.contains(&method)
}

/// Build a mock filename for a captured request.
///
/// UUID v4 path segments are replaced with [`ID_PLACEHOLDER`] so the
/// fixture serves any id.
pub fn make_filename(url: &str, method: &str, status: u16, ext: &str) -> String {
    let (path, tail) = match url.find(|c: char| c == '?' || c == '#') {
        Some(i) => url.split_at(i),
        None => (url, ""),
    };
    let path = path.trim_start_matches('/');
    let path = path.strip_suffix('/').unwrap_or(path);

    let masked = path
        .split('/')
        .map(|segment| if is_uuid_v4(segment) { ID_PLACEHOLDER } else { segment })
        .collect::<Vec<_>>()
        .join("/");

    format!("{masked}{tail}.{method}.{status}.{ext}")
}

/// Insert `comment` right before the `.METHOD.STATUS.EXT` suffix.
pub fn with_comment(file: &str, comment: &str) -> String {
    let mut parts: Vec<&str> = file.rsplitn(4, '.').collect();
    if parts.len() < 4 {
        return format!("{file}{comment}");
    }
    parts.reverse();
    format!("{}{}.{}", parts[0], comment, parts[1..].join("."))
}

fn parse_status(token: &str) -> Option<u16> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse::<u16>().ok().filter(|s| (100..=599).contains(s))
}

fn normalize_mask(raw: &str) -> String {
    let raw = raw.strip_suffix('/').unwrap_or(raw);
    format!("/{}", raw.strip_prefix('/').unwrap_or(raw))
}

fn is_uuid_v4(segment: &str) -> bool {
    segment.len() == 36
        && Uuid::try_parse(segment)
            .map(|id| id.get_version_num() == 4)
            .unwrap_or(false)
}
